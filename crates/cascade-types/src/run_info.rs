//! Run-level metadata published by the event source.
//!
//! Header blocks of the streaming formats are written from a [`RunInfo`]
//! captured before the first event. The source keeps refining the cross
//! section while it runs, and the final snapshot is used when the sinks are
//! finalized.

use serde::{Deserialize, Serialize};

/// One incoming beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    /// PDG identifier of the beam particle (2212 for protons).
    pub pdg_id: i32,
    /// Beam energy in GeV.
    pub energy: f64,
}

/// Run-level information about the generated sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// The two incoming beams.
    pub beams: [Beam; 2],
    /// Identifier of the generated process.
    pub process_id: i32,
    /// Accumulated cross section estimate in pb.
    pub cross_section_pb: f64,
    /// Statistical error on the cross section in pb.
    pub cross_section_error_pb: f64,
    /// Number of events accepted so far.
    pub accepted_events: u64,
}

impl RunInfo {
    /// Symmetric proton-proton collisions at the given centre-of-mass energy.
    pub fn proton_proton(sqrt_s_gev: f64, process_id: i32) -> Self {
        let beam = Beam {
            pdg_id: 2212,
            energy: sqrt_s_gev / 2.0,
        };
        Self {
            beams: [beam, beam],
            process_id,
            cross_section_pb: 0.0,
            cross_section_error_pb: 0.0,
            accepted_events: 0,
        }
    }

    /// Centre-of-mass energy in GeV.
    pub fn sqrt_s(&self) -> f64 {
        let [a, b] = self.beams;
        a.energy + b.energy
    }
}
