//! Four-momentum and the derived kinematic quantities used by the analysis.
//!
//! All quantities are in natural units (GeV, c = 1). Angles are in radians.
//!
//! | Quantity | Definition |
//! |----------|------------|
//! | `pT`     | `sqrt(px^2 + py^2)` |
//! | `eta`    | `0.5 * ln((|p| + pz) / (|p| - pz))`, clamped to +/-20 along the beam |
//! | `phi`    | `atan2(py, px)` in `(-pi, pi]` |
//! | `dPhi`   | opening angle between the transverse vectors, in `[0, pi]` |
//! | `dR`     | `sqrt(dEta^2 + dPhi^2)` |

use core::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Pseudorapidity reported for momenta pointing (almost) along the beam axis.
pub const BEAM_AXIS_ETA: f64 = 20.0;

/// Below this transverse component a momentum counts as collinear with the beam.
const TINY: f64 = 1e-20;

/// Four-momentum `p = (E, px, py, pz)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FourMomentum {
    /// Energy component.
    pub e: f64,
    /// Momentum along x.
    pub px: f64,
    /// Momentum along y.
    pub py: f64,
    /// Momentum along z (the beam axis).
    pub pz: f64,
}

impl FourMomentum {
    /// Create a new four-momentum.
    pub const fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self { e, px, py, pz }
    }

    /// Build a four-momentum from collider coordinates and a mass.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let p2 = px.mul_add(px, py.mul_add(py, pz * pz));
        let e = mass.mul_add(mass, p2).sqrt();
        Self { e, px, py, pz }
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Magnitude of the three-momentum.
    pub fn p_abs(&self) -> f64 {
        self.px.mul_add(self.px, self.py.mul_add(self.py, self.pz * self.pz)).sqrt()
    }

    /// Invariant mass squared, `E^2 - |p|^2`. Negative for spacelike vectors.
    pub fn mass_squared(&self) -> f64 {
        let p = self.p_abs();
        self.e.mul_add(self.e, -(p * p))
    }

    /// Invariant mass, zero for spacelike vectors.
    pub fn mass(&self) -> f64 {
        self.mass_squared().max(0.0).sqrt()
    }

    /// Pseudorapidity.
    ///
    /// Momenta along the beam axis (including the zero vector) return
    /// [`BEAM_AXIS_ETA`] with the sign of `pz`, so the value is always finite.
    pub fn eta(&self) -> f64 {
        let p = self.p_abs();
        if p - self.pz.abs() < TINY {
            return if self.pz > 0.0 {
                BEAM_AXIS_ETA
            } else {
                -BEAM_AXIS_ETA
            };
        }
        0.5 * ((p + self.pz) / (p - self.pz)).ln()
    }

    /// Azimuthal angle in `(-pi, pi]`.
    pub fn phi(&self) -> f64 {
        self.py.atan2(self.px)
    }

    /// Component-wise sum of two four-momenta.
    pub fn sum(&self, other: &Self) -> Self {
        Self {
            e: self.e + other.e,
            px: self.px + other.px,
            py: self.py + other.py,
            pz: self.pz + other.pz,
        }
    }
}

/// Azimuthal separation of two momenta, in `[0, pi]`.
pub fn delta_phi(a: &FourMomentum, b: &FourMomentum) -> f64 {
    let mut dphi = (a.phi() - b.phi()).abs();
    if dphi > PI {
        dphi = 2.0f64.mul_add(PI, -dphi);
    }
    dphi
}

/// Angular separation `dR = sqrt(dEta^2 + dPhi^2)`.
pub fn delta_r(a: &FourMomentum, b: &FourMomentum) -> f64 {
    let deta = a.eta() - b.eta();
    deta.hypot(delta_phi(a, b))
}
