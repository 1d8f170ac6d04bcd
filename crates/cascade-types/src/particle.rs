//! A single particle record of a generated event.

use core::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::kinematics::FourMomentum;

/// Charge sign of a particle, ordered so that `Positive` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChargeSign {
    /// Strictly positive charge.
    Positive,
    /// Strictly negative charge.
    Negative,
}

impl core::fmt::Display for ChargeSign {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Positive => write!(f, "+"),
            Self::Negative => write!(f, "-"),
        }
    }
}

/// One entry of an [`Event`](crate::Event).
///
/// The decay graph is encoded implicitly: `child_first..=child_last` is the
/// inclusive range of this record's direct children inside the same event.
/// A record has children only if `child_first > 0 && child_last >=
/// child_first`; index 0 is reserved for the event-as-a-whole record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// PDG species identifier (signed: antiparticles are negative).
    pub pdg_id: i32,
    /// Generator status code. Positive means final state, negative means
    /// the record decayed or was rewritten further down the listing.
    pub status: i32,
    /// Electric charge in units of e/3.
    pub charge_thirds: i32,
    /// Four-momentum in GeV.
    pub momentum: FourMomentum,
    /// Generated mass in GeV.
    pub mass: f64,
    /// Index of the first direct child (0 if none).
    pub child_first: usize,
    /// Index of the last direct child (0 if none).
    pub child_last: usize,
}

impl Particle {
    /// Create a childless record.
    pub const fn new(pdg_id: i32, status: i32, charge_thirds: i32, momentum: FourMomentum) -> Self {
        Self {
            pdg_id,
            status,
            charge_thirds,
            momentum,
            mass: 0.0,
            child_first: 0,
            child_last: 0,
        }
    }

    /// Set the generated mass.
    #[must_use]
    pub const fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Set the inclusive child range.
    #[must_use]
    pub const fn with_children(mut self, first: usize, last: usize) -> Self {
        self.child_first = first;
        self.child_last = last;
        self
    }

    /// Whether this record is a final-state (undecayed) particle.
    pub const fn is_final(&self) -> bool {
        self.status > 0
    }

    /// The inclusive child range, or `None` if the record encodes "no children".
    pub const fn child_range(&self) -> Option<RangeInclusive<usize>> {
        if self.child_first > 0 && self.child_last >= self.child_first {
            Some(self.child_first..=self.child_last)
        } else {
            None
        }
    }

    /// Electric charge in units of e.
    pub fn charge(&self) -> f64 {
        f64::from(self.charge_thirds) / 3.0
    }

    /// Sign of the charge, `None` for neutral particles.
    pub const fn charge_sign(&self) -> Option<ChargeSign> {
        if self.charge_thirds > 0 {
            Some(ChargeSign::Positive)
        } else if self.charge_thirds < 0 {
            Some(ChargeSign::Negative)
        } else {
            None
        }
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.momentum.pt()
    }

    /// Pseudorapidity.
    pub fn eta(&self) -> f64 {
        self.momentum.eta()
    }

    /// Azimuthal angle.
    pub fn phi(&self) -> f64 {
        self.momentum.phi()
    }
}
