//! Shared type definitions for the Cascade analysis pipeline.
//!
//! Every crate in the workspace exchanges events through these types: the
//! event source produces them, the decay-graph traversal reads them, and the
//! output sinks serialize them.
//!
//! # Modules
//!
//! - [`kinematics`] -- [`FourMomentum`] and the derived quantities
//!   (`pT`, pseudorapidity, azimuth, `dPhi`, `dR`).
//! - [`particle`] -- [`Particle`] records with their implicit child range.
//! - [`event`] -- [`Event`], the ordered particle listing of one collision.
//! - [`run_info`] -- [`RunInfo`], beam setup and cross-section bookkeeping.

pub mod event;
pub mod kinematics;
pub mod particle;
pub mod run_info;

// Re-export all public types at crate root for convenience.
pub use event::{Event, SYSTEM_PDG_ID};
pub use kinematics::{FourMomentum, delta_phi, delta_r};
pub use particle::{ChargeSign, Particle};
pub use run_info::{Beam, RunInfo};
