//! Decay-graph view and descendant traversal for the Cascade pipeline.
//!
//! Generators encode the decay graph implicitly: each record stores an
//! inclusive index range of its direct children. This crate wraps that
//! encoding in a bounds-checked view and provides traversals that are
//! guaranteed to terminate, even on malformed input.
//!
//! # Modules
//!
//! - [`error`] -- [`GraphError`]: out-of-bounds, self-reference, and cycle.
//! - [`view`] -- The [`DecayGraph`] trait and the child-to-parent map.
//! - [`traversal`] -- [`children`] and [`all_descendants`].
//!
//! # Usage
//!
//! ```
//! use cascade_graph::{all_descendants, children};
//! use cascade_types::{FourMomentum, Particle, SYSTEM_PDG_ID};
//!
//! let p = FourMomentum::default();
//! let listing = vec![
//!     Particle::new(SYSTEM_PDG_ID, -11, 0, p).with_children(1, 1),
//!     Particle::new(25, -62, 0, p).with_children(2, 3),
//!     Particle::new(13, 1, -3, p),
//!     Particle::new(-13, 1, 3, p),
//! ];
//!
//! assert_eq!(children(listing.as_slice(), 1).ok().map(|c| c.len()), Some(2));
//! let leaves = all_descendants(listing.as_slice(), 0, true).unwrap_or_default();
//! assert_eq!(leaves.len(), 2);
//! ```

pub mod error;
pub mod traversal;
pub mod view;

// Re-export primary types at crate root.
pub use error::GraphError;
pub use traversal::{Descendant, all_descendants, children, final_state_descendants};
pub use view::{DecayGraph, parent_map};
