//! Output sinks for the Cascade pipeline.
//!
//! A sink is an external destination that receives run output: streaming
//! sinks write every event as it is generated, the accumulator sink writes the
//! registry once at the end. Each sink moves through
//! [`SinkState::Unopened`] -> [`SinkState::Open`] -> [`SinkState::Finalized`]
//! exactly once, and closes itself if dropped while still open.
//!
//! # Modules
//!
//! - [`sink`] -- The [`EventSink`] trait, [`SinkKind`], [`SinkState`], and
//!   the [`Truncate`] bound of the streaming sinks.
//! - [`hepmc`] -- [`HepMcSink`]: `IO_GenEvent` text stream.
//! - [`lhe`] -- [`LheSink`]: Les Houches file with an in-place header rewrite.
//! - [`accumulator`] -- [`AccumulatorSink`]: registry document.
//! - [`set`] -- [`SinkSet`]: ordered open, streaming, and finalize-all.
//! - [`error`] -- [`SinkError`].

pub mod accumulator;
pub mod error;
pub mod hepmc;
pub mod lhe;
pub mod set;
pub mod sink;

pub use accumulator::AccumulatorSink;
pub use error::SinkError;
pub use hepmc::HepMcSink;
pub use lhe::LheSink;
pub use set::{SinkPlan, SinkSet};
pub use sink::{EventSink, SinkKind, SinkState, Truncate};
