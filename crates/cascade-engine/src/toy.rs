//! Deterministic toy generator for `gg -> h -> a1 a1` cascades.
//!
//! Stands in for a full physics generator so the pipeline can be run and
//! inspected end to end. Each event has the layout
//!
//! ```text
//! 0      system record
//! 1, 2   incoming protons, both pointing at record 3
//! 3      h (status -62, or -22 when the event carries no anchor)
//! 4, 5   a1 a1
//! 6..=9  decay products of the two a1, two per mediator
//! ```
//!
//! Kinematics are two-body decays in the parent rest frame boosted to the
//! lab. The cross-section estimate is a running mean over per-event samples.

use std::f64::consts::PI;

use cascade_core::config::RunConfig;
use cascade_core::{EventSource, GenerationError};
use cascade_types::{Event, FourMomentum, Particle, RunInfo, SYSTEM_PDG_ID};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Process code of gluon-fusion Higgs production.
pub const HIGGS_PROCESS_ID: i32 = 902;

const PROTON: i32 = 2212;
const HIGGS: i32 = 25;
const A1: i32 = 36;
const HIGGS_MASS: f64 = 125.0;

/// Status of the anchor Higgs.
const ANCHOR_STATUS: i32 = -62;
/// Status of an intermediate resonance.
const INTERMEDIATE_STATUS: i32 = -22;

/// Share of events whose Higgs does not carry the anchor status.
const NO_ANCHOR_FRACTION: f64 = 0.08;
/// Mean of the exponential Higgs pT spectrum in GeV.
const HIGGS_MEAN_PT: f64 = 25.0;
/// Central cross-section value in pb.
const NOMINAL_CROSS_SECTION_PB: f64 = 48.6;

/// A decay channel: particle species, charge in thirds, and mass in GeV.
#[derive(Debug, Clone, Copy)]
struct Channel {
    pdg_id: i32,
    charge_thirds: i32,
    mass: f64,
    weight: f64,
}

const CHANNELS: [Channel; 3] = [
    Channel {
        pdg_id: 13,
        charge_thirds: -3,
        mass: 0.105_66,
        weight: 0.5,
    },
    Channel {
        pdg_id: 15,
        charge_thirds: -3,
        mass: 1.776_86,
        weight: 0.3,
    },
    Channel {
        pdg_id: 5,
        charge_thirds: -1,
        mass: 4.18,
        weight: 0.2,
    },
];

/// Used when no channel is open at the configured mediator mass.
const PHOTONS: Channel = Channel {
    pdg_id: 22,
    charge_thirds: 0,
    mass: 0.0,
    weight: 1.0,
};

/// Seeded toy event source.
#[derive(Debug)]
pub struct ToyCascadeSource {
    rng: SmallRng,
    info: RunInfo,
    a1_mass: f64,
    served: u64,
    xsec_samples: f64,
    xsec_sum: f64,
    xsec_sum_sq: f64,
}

impl ToyCascadeSource {
    /// Build a source from the run section of the config.
    pub fn new(run: &RunConfig) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(run.seed),
            info: RunInfo::proton_proton(run.energy_tev * 1_000.0, HIGGS_PROCESS_ID),
            a1_mass: run.a1_mass,
            served: 0,
            xsec_samples: 0.0,
            xsec_sum: 0.0,
            xsec_sum_sq: 0.0,
        }
    }

    fn refine_cross_section(&mut self) {
        let sample = NOMINAL_CROSS_SECTION_PB * self.rng.random_range(0.8..1.2);
        self.xsec_samples += 1.0;
        self.xsec_sum += sample;
        self.xsec_sum_sq = sample.mul_add(sample, self.xsec_sum_sq);

        let mean = self.xsec_sum / self.xsec_samples;
        let variance = mean.mul_add(-mean, self.xsec_sum_sq / self.xsec_samples).max(0.0);
        self.info.cross_section_pb = mean;
        self.info.cross_section_error_pb = (variance / self.xsec_samples).sqrt();
    }

    fn pick_channel(&mut self) -> Channel {
        let a1_mass = self.a1_mass;
        let open: Vec<Channel> = CHANNELS
            .iter()
            .copied()
            .filter(|c| 2.0 * c.mass < a1_mass)
            .collect();
        let total: f64 = open.iter().map(|c| c.weight).sum();
        if open.is_empty() || total <= 0.0 {
            return PHOTONS;
        }
        let mut roll = self.rng.random_range(0.0..total);
        for channel in &open {
            if roll < channel.weight {
                return *channel;
            }
            roll -= channel.weight;
        }
        open.last().copied().unwrap_or(PHOTONS)
    }

    fn build_event(&mut self) -> Event {
        let [forward_beam, backward_beam] = self.info.beams;
        let forward = FourMomentum::new(forward_beam.energy, 0.0, 0.0, forward_beam.energy);
        let backward = FourMomentum::new(backward_beam.energy, 0.0, 0.0, -backward_beam.energy);

        let pt = -HIGGS_MEAN_PT * (-self.rng.random_range(0.0..1.0_f64)).ln_1p();
        let eta = self.rng.random_range(-2.5..2.5);
        let phi = self.rng.random_range(-PI..PI);
        let higgs = FourMomentum::from_pt_eta_phi_m(pt, eta, phi, HIGGS_MASS);
        let higgs_status = if self.rng.random_bool(NO_ANCHOR_FRACTION) {
            INTERMEDIATE_STATUS
        } else {
            ANCHOR_STATUS
        };

        let (a, b) = two_body_decay(&mut self.rng, &higgs, HIGGS_MASS, self.a1_mass, self.a1_mass);
        let first = self.pick_channel();
        let second = self.pick_channel();
        let first_legs = two_body_decay(&mut self.rng, &a, self.a1_mass, first.mass, first.mass);
        let second_legs =
            two_body_decay(&mut self.rng, &b, self.a1_mass, second.mass, second.mass);

        let records = vec![
            Particle::new(SYSTEM_PDG_ID, -11, 0, forward.sum(&backward)).with_children(1, 2),
            Particle::new(PROTON, -12, 3, forward)
                .with_mass(0.938)
                .with_children(3, 3),
            Particle::new(PROTON, -12, 3, backward)
                .with_mass(0.938)
                .with_children(3, 3),
            Particle::new(HIGGS, higgs_status, 0, higgs)
                .with_mass(HIGGS_MASS)
                .with_children(4, 5),
            Particle::new(A1, INTERMEDIATE_STATUS, 0, a)
                .with_mass(self.a1_mass)
                .with_children(6, 7),
            Particle::new(A1, INTERMEDIATE_STATUS, 0, b)
                .with_mass(self.a1_mass)
                .with_children(8, 9),
            fermion(first, false, first_legs.0),
            fermion(first, true, first_legs.1),
            fermion(second, false, second_legs.0),
            fermion(second, true, second_legs.1),
        ];

        Event::new(self.served, records).with_scale(HIGGS_MASS)
    }
}

impl EventSource for ToyCascadeSource {
    fn run_info(&self) -> RunInfo {
        self.info.clone()
    }

    fn next_event(&mut self) -> Result<Option<Event>, GenerationError> {
        let event = self.build_event();
        self.refine_cross_section();
        self.served = self.served.saturating_add(1);
        self.info.accepted_events = self.served;
        Ok(Some(event))
    }
}

/// Final-state record for one leg of a channel. The antiparticle leg flips
/// the species sign and the charge.
const fn fermion(channel: Channel, anti: bool, momentum: FourMomentum) -> Particle {
    let (pdg_id, charge_thirds) = if anti && channel.charge_thirds != 0 {
        (channel.pdg_id.saturating_neg(), channel.charge_thirds.saturating_neg())
    } else {
        (channel.pdg_id, channel.charge_thirds)
    };
    Particle::new(pdg_id, 1, charge_thirds, momentum).with_mass(channel.mass)
}

/// Isotropic decay of `parent` (rest mass `mass`) into daughters of masses
/// `m1` and `m2`, returned in the lab frame.
fn two_body_decay(
    rng: &mut SmallRng,
    parent: &FourMomentum,
    mass: f64,
    m1: f64,
    m2: f64,
) -> (FourMomentum, FourMomentum) {
    let s = mass * mass;
    let sum = m1 + m2;
    let diff = m1 - m2;
    let p = (sum.mul_add(-sum, s) * diff.mul_add(-diff, s)).max(0.0).sqrt() / (2.0 * mass);

    let cos_theta: f64 = rng.random_range(-1.0..=1.0);
    let sin_theta = cos_theta.mul_add(-cos_theta, 1.0).max(0.0).sqrt();
    let phi: f64 = rng.random_range(-PI..PI);
    let (px, py, pz) = (p * sin_theta * phi.cos(), p * sin_theta * phi.sin(), p * cos_theta);

    let first = FourMomentum::new(m1.mul_add(m1, p * p).sqrt(), px, py, pz);
    let second = FourMomentum::new(m2.mul_add(m2, p * p).sqrt(), -px, -py, -pz);
    (boost(&first, parent, mass), boost(&second, parent, mass))
}

/// Boost `v` from the rest frame of `frame` (rest mass `mass`) to the lab.
fn boost(v: &FourMomentum, frame: &FourMomentum, mass: f64) -> FourMomentum {
    let (bx, by, bz) = (frame.px / frame.e, frame.py / frame.e, frame.pz / frame.e);
    let gamma = frame.e / mass;
    let b2 = bx.mul_add(bx, by.mul_add(by, bz * bz));
    let bp = bx.mul_add(v.px, by.mul_add(v.py, bz * v.pz));
    let gamma2 = if b2 > 0.0 { (gamma - 1.0) / b2 } else { 0.0 };
    let factor = gamma2.mul_add(bp, gamma * v.e);
    FourMomentum::new(
        gamma * (v.e + bp),
        factor.mul_add(bx, v.px),
        factor.mul_add(by, v.py),
        factor.mul_add(bz, v.pz),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cascade_graph::{DecayGraph, children, final_state_descendants, parent_map};

    use super::*;

    fn source(seed: u64) -> ToyCascadeSource {
        let run = RunConfig {
            seed,
            ..RunConfig::default()
        };
        ToyCascadeSource::new(&run)
    }

    #[test]
    fn same_seed_same_events() {
        let mut a = source(11);
        let mut b = source(11);
        for _ in 0..5 {
            assert_eq!(a.next_event().unwrap(), b.next_event().unwrap());
        }
    }

    #[test]
    fn events_form_a_valid_cascade() {
        let mut toy = source(3);
        for _ in 0..50 {
            let event = toy.next_event().unwrap().unwrap();
            assert_eq!(event.len(), 10);
            let parents = parent_map(&event).unwrap();
            assert_eq!(parents.get(3), Some(&vec![1, 2]));

            let mediators = children(&event, 3).unwrap();
            assert!(mediators.iter().all(|d| d.particle.pdg_id == A1));
            let leaves = final_state_descendants(&event, 3).unwrap();
            assert_eq!(leaves.len(), 4);
            let charge: i32 = leaves.iter().map(|d| d.particle.charge_thirds).sum();
            assert_eq!(charge, 0);
            assert!(event.child_range(0).unwrap().is_some());
        }
    }

    #[test]
    fn decays_conserve_momentum() {
        let mut toy = source(5);
        let event = toy.next_event().unwrap().unwrap();
        let higgs = event.get(3).unwrap().momentum;
        let total = (6..=9)
            .filter_map(|i| event.get(i))
            .fold(FourMomentum::default(), |acc, p| acc.sum(&p.momentum));
        assert!((total.e - higgs.e).abs() < 1e-6);
        assert!((total.pz - higgs.pz).abs() < 1e-6);
        assert!((event.get(4).unwrap().momentum.mass() - 15.0).abs() < 1e-6);
    }

    #[test]
    fn some_events_lack_the_anchor() {
        let mut toy = source(1);
        let statuses: Vec<i32> = (0..400)
            .map(|_| toy.next_event().unwrap().unwrap().get(3).unwrap().status)
            .collect();
        assert!(statuses.contains(&ANCHOR_STATUS));
        assert!(statuses.contains(&INTERMEDIATE_STATUS));
    }

    #[test]
    fn cross_section_is_refined() {
        let mut toy = source(2);
        assert!(toy.run_info().cross_section_pb.abs() < f64::EPSILON);
        for _ in 0..20 {
            toy.next_event().unwrap();
        }
        let info = toy.run_info();
        assert_eq!(info.accepted_events, 20);
        assert!((info.cross_section_pb - NOMINAL_CROSS_SECTION_PB).abs() < 10.0);
        assert!(info.cross_section_error_pb > 0.0);
    }

    #[test]
    fn light_mediator_decays_to_photons() {
        let run = RunConfig {
            a1_mass: 0.1,
            ..RunConfig::default()
        };
        let event = ToyCascadeSource::new(&run).next_event().unwrap().unwrap();
        assert_eq!(event.get(6).unwrap().pdg_id, 22);
    }
}
