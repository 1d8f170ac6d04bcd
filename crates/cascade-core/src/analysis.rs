//! Per-event analysis: anchor selection, mediator kinematics, decay-product
//! kinematics, and the optional same-sign group expansion.
//!
//! The pass holds no cross-event state and performs no I/O; every effect is
//! a fill on the [`Registry`]. An event without an anchor is not an error,
//! it simply produces no fills.
//!
//! # Collections
//!
//! | Name | Shape | Filled with |
//! |---|---|---|
//! | `hPt` | 1-D | anchor pT |
//! | `a1Dr`, `a1DPhi` | 1-D | ΔR and Δφ of the anchor's first and last child |
//! | `a1Pt`, `a1Eta`, `a1Phi`, `a1P` | 1-D | mediator pT, η, φ, \|p\| |
//! | `a1DecayPt`, `a1DecayEta`, `a1DecayPhi` | 1-D | mediator children pT, η, φ |
//! | `a1DecayDr`, `a1DecayDPhi` | 1-D | ΔR and Δφ of a mediator's first and last child |
//! | `a1DecayDrVsPt` | 2-D | (decay ΔR, mediator pT) |
//! | `ssPt`, `ssEta`, `ssPhi` | 1-D | members of the selected same-sign group |
//! | `ssMultiplicity` | 1-D | size of the selected group |
//! | `ssDr` | 1-D | ΔR of the two leading-pT group members |
//! | `hVars` | table | one row per anchor |

use std::collections::BTreeMap;

use cascade_accumulator::{AccumulatorError, Binning, FillBatch, Registry};
use cascade_graph::{Descendant, GraphError, children, final_state_descendants};
use cascade_types::{ChargeSign, Event, Particle, delta_phi, delta_r};
use tracing::debug;

use crate::config::AnalysisConfig;

/// Name of the per-anchor row table.
pub const ANCHOR_TABLE: &str = "hVars";

/// Columns of [`ANCHOR_TABLE`]. `a1_dr` and `a1_dphi` are NaN (persisted as
/// `null`) when the anchor has fewer than two children.
pub const ANCHOR_TABLE_COLUMNS: [&str; 6] = ["h_pt", "h_eta", "h_phi", "a1_dr", "a1_dphi", "n_a1"];

/// Default binning of every one-dimensional collection.
const HISTOGRAMS_1D: [(&str, Binning); 17] = [
    ("hPt", Binning::new(150, 0.0, 150.0)),
    ("a1Dr", Binning::new(500, 0.0, 5.0)),
    ("a1DPhi", Binning::new(31, 0.0, 3.1)),
    ("a1Pt", Binning::new(400, 0.0, 400.0)),
    ("a1Eta", Binning::new(500, -5.0, 5.0)),
    ("a1Phi", Binning::new(64, -3.2, 3.2)),
    ("a1P", Binning::new(500, 0.0, 500.0)),
    ("a1DecayPt", Binning::new(200, 0.0, 200.0)),
    ("a1DecayEta", Binning::new(500, -5.0, 5.0)),
    ("a1DecayPhi", Binning::new(64, -3.2, 3.2)),
    ("a1DecayDr", Binning::new(500, 0.0, 5.0)),
    ("a1DecayDPhi", Binning::new(31, 0.0, 3.1)),
    ("ssPt", Binning::new(200, 0.0, 200.0)),
    ("ssEta", Binning::new(500, -5.0, 5.0)),
    ("ssPhi", Binning::new(64, -3.2, 3.2)),
    ("ssMultiplicity", Binning::new(10, 0.0, 10.0)),
    ("ssDr", Binning::new(500, 0.0, 5.0)),
];

/// Name and default axes of the decay ΔR versus mediator pT collection.
const DECAY_DR_VS_PT: (&str, Binning, Binning) = (
    "a1DecayDrVsPt",
    Binning::new(100, 0.0, 5.0),
    Binning::new(100, 0.0, 400.0),
);

/// Errors raised by the analysis pass. Both are fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The event's decay graph is malformed or an index is out of range.
    #[error("decay graph error: {source}")]
    Graph {
        /// The underlying graph error.
        #[from]
        source: GraphError,
    },

    /// A registry operation failed.
    #[error("accumulator error: {source}")]
    Accumulator {
        /// The underlying accumulator error.
        #[from]
        source: AccumulatorError,
    },
}

/// The same-sign group chosen for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SameSignSelection {
    /// Charge sign shared by the group.
    pub sign: ChargeSign,
    /// Number of members.
    pub members: usize,
}

/// What the pass found in one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// No record matched the anchor selection; nothing was filled.
    NoAnchor,
    /// The anchor was found and analyzed.
    Analyzed {
        /// Listing index of the anchor.
        anchor: usize,
        /// Number of mediators among the anchor's children.
        mediators: usize,
        /// Number of mediator children visited.
        decay_products: usize,
        /// Selected same-sign group, if the expansion ran and one qualified.
        same_sign: Option<SameSignSelection>,
    },
}

impl PassOutcome {
    /// Whether an anchor was found.
    pub const fn has_anchor(&self) -> bool {
        matches!(self, Self::Analyzed { .. })
    }
}

/// The per-event analysis.
#[derive(Debug, Clone)]
pub struct AnalysisPass {
    config: AnalysisConfig,
    binning: BTreeMap<String, Binning>,
}

impl AnalysisPass {
    /// Build a pass from its selection config and binning overrides.
    pub const fn new(config: AnalysisConfig, binning: BTreeMap<String, Binning>) -> Self {
        Self { config, binning }
    }

    /// The selection config.
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Register every collection the pass fills.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Accumulator`] if a name is already taken, an
    /// override has unusable binning, or an override names no collection
    /// the pass fills.
    pub fn register(&self, registry: &mut Registry) -> Result<(), AnalysisError> {
        let (name_2d, x, y) = DECAY_DR_VS_PT;
        let x_key = format!("{name_2d}.x");
        let y_key = format!("{name_2d}.y");
        let known = |key: &str| {
            key == x_key || key == y_key || HISTOGRAMS_1D.iter().any(|(name, _)| *name == key)
        };
        if let Some(unknown) = self.binning.keys().find(|key| !known(key)) {
            return Err(AccumulatorError::UnknownCollection {
                name: unknown.clone(),
            }
            .into());
        }

        for (name, default) in HISTOGRAMS_1D {
            let Binning { bins, low, high } = self.binning_for(name, default);
            registry.register_histogram_1d(name, bins, low, high)?;
        }
        registry.register_histogram_2d(
            name_2d,
            self.binning_for(&x_key, x),
            self.binning_for(&y_key, y),
        )?;
        registry.register_table(ANCHOR_TABLE, &ANCHOR_TABLE_COLUMNS)?;
        Ok(())
    }

    /// Analyze one event.
    ///
    /// The event's fills are staged while the decay graph is walked and
    /// committed together at the end, so an event rejected part-way leaves
    /// the registry exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Graph`] for a malformed decay graph, or
    /// [`AnalysisError::Accumulator`] if a fill fails.
    pub fn run(&self, event: &Event, registry: &mut Registry) -> Result<PassOutcome, AnalysisError> {
        let Some((anchor, particle)) = self.find_anchor(event) else {
            debug!(event = event.number, "no anchor in event");
            return Ok(PassOutcome::NoAnchor);
        };

        let mut batch = FillBatch::new();
        batch.fill_1d("hPt", particle.pt());

        let direct = children(event, anchor)?;
        let (dr, dphi) = if let [first, .., last] = direct.as_slice() {
            let dr = delta_r(&first.particle.momentum, &last.particle.momentum);
            let dphi = delta_phi(&first.particle.momentum, &last.particle.momentum);
            batch.fill_1d("a1Dr", dr);
            batch.fill_1d("a1DPhi", dphi);
            (dr, dphi)
        } else {
            (f64::NAN, f64::NAN)
        };

        let mut mediators = 0_usize;
        let mut decay_products = 0_usize;
        for mediator in direct
            .iter()
            .filter(|d| d.particle.pdg_id == self.config.mediator_pdg_id)
        {
            mediators = mediators.saturating_add(1);
            decay_products = decay_products.saturating_add(stage_mediator(event, mediator, &mut batch)?);
        }

        let same_sign = if self.config.same_sign_expansion {
            self.stage_same_sign(event, anchor, &mut batch)?
        } else {
            None
        };

        batch.append_row(
            ANCHOR_TABLE,
            &[
                particle.pt(),
                particle.eta(),
                particle.phi(),
                dr,
                dphi,
                u32::try_from(mediators).map_or(f64::from(u32::MAX), f64::from),
            ],
        );
        registry.commit(&batch)?;

        Ok(PassOutcome::Analyzed {
            anchor,
            mediators,
            decay_products,
            same_sign,
        })
    }

    /// First record, in event order, matching the anchor species and status.
    fn find_anchor<'e>(&self, event: &'e Event) -> Option<(usize, &'e Particle)> {
        event.iter().find(|(_, p)| {
            p.pdg_id.unsigned_abs() == self.config.anchor_pdg_id.unsigned_abs()
                && p.status == self.config.anchor_status
        })
    }

    fn stage_same_sign(
        &self,
        event: &Event,
        anchor: usize,
        batch: &mut FillBatch<'_>,
    ) -> Result<Option<SameSignSelection>, AnalysisError> {
        let leaves = final_state_descendants(event, anchor)?;
        let eligible = leaves.iter().filter(|d| {
            self.config
                .same_sign_species
                .iter()
                .any(|s| s.unsigned_abs() == d.particle.pdg_id.unsigned_abs())
        });

        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for d in eligible {
            match d.particle.charge_sign() {
                Some(ChargeSign::Positive) => positive.push(d.particle),
                Some(ChargeSign::Negative) => negative.push(d.particle),
                None => {}
            }
        }

        let Some((sign, mut group)) = select_group(positive, negative) else {
            return Ok(None);
        };

        for p in &group {
            batch.fill_1d("ssPt", p.pt());
            batch.fill_1d("ssEta", p.eta());
            batch.fill_1d("ssPhi", p.phi());
        }
        let members = group.len();
        batch.fill_1d(
            "ssMultiplicity",
            u32::try_from(members).map_or(f64::from(u32::MAX), f64::from),
        );

        group.sort_by(|a, b| b.pt().total_cmp(&a.pt()));
        if let [leading, second, ..] = group.as_slice() {
            batch.fill_1d("ssDr", delta_r(&leading.momentum, &second.momentum));
        }

        Ok(Some(SameSignSelection { sign, members }))
    }

    fn binning_for(&self, name: &str, default: Binning) -> Binning {
        self.binning.get(name).copied().unwrap_or(default)
    }
}

/// Stage mediator and decay-product fills. Returns the number of decay
/// products visited.
fn stage_mediator(
    event: &Event,
    mediator: &Descendant<'_>,
    batch: &mut FillBatch<'_>,
) -> Result<usize, AnalysisError> {
    let m = mediator.particle;
    batch.fill_1d("a1Pt", m.pt());
    batch.fill_1d("a1Eta", m.eta());
    batch.fill_1d("a1Phi", m.phi());
    batch.fill_1d("a1P", m.momentum.p_abs());

    let products = children(event, mediator.index)?;
    for d in &products {
        batch.fill_1d("a1DecayPt", d.particle.pt());
        batch.fill_1d("a1DecayEta", d.particle.eta());
        batch.fill_1d("a1DecayPhi", d.particle.phi());
    }

    if let [first, .., last] = products.as_slice() {
        let dr = delta_r(&first.particle.momentum, &last.particle.momentum);
        batch.fill_1d("a1DecayDr", dr);
        batch.fill_1d(
            "a1DecayDPhi",
            delta_phi(&first.particle.momentum, &last.particle.momentum),
        );
        batch.fill_2d("a1DecayDrVsPt", dr, m.pt());
    }
    Ok(products.len())
}

/// Pick the qualifying same-sign group: at least two members, the larger
/// group wins, and equal sizes go to the positive group.
fn select_group<'a>(
    positive: Vec<&'a Particle>,
    negative: Vec<&'a Particle>,
) -> Option<(ChargeSign, Vec<&'a Particle>)> {
    let positive_ok = positive.len() >= 2;
    let negative_ok = negative.len() >= 2;
    match (positive_ok, negative_ok) {
        (false, false) => None,
        (true, false) => Some((ChargeSign::Positive, positive)),
        (false, true) => Some((ChargeSign::Negative, negative)),
        (true, true) if negative.len() > positive.len() => Some((ChargeSign::Negative, negative)),
        (true, true) => Some((ChargeSign::Positive, positive)),
    }
}
