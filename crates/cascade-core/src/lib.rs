//! Configuration, per-event analysis, and the run loop for Cascade.
//!
//! This crate ties the decay-graph traversal, the accumulator registry, and
//! the output sinks into one run: events come from an [`EventSource`], are
//! streamed to every enabled sink, then analyzed into the registry, which is
//! persisted when the run is finalized.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `cascade-config.yaml` into
//!   strongly-typed structs.
//! - [`source`] -- [`EventSource`] trait and [`ReplaySource`].
//! - [`analysis`] -- The per-event [`AnalysisPass`] and its collections.
//! - [`session`] -- [`AnalysisSession`], which owns the registry and sinks
//!   and guarantees they are finalized.
//! - [`runner`] -- The event loop and end-of-run report.
//!
//! [`EventSource`]: source::EventSource
//! [`ReplaySource`]: source::ReplaySource
//! [`AnalysisPass`]: analysis::AnalysisPass
//! [`AnalysisSession`]: session::AnalysisSession

pub mod analysis;
pub mod config;
pub mod runner;
pub mod session;
pub mod source;

pub use analysis::{AnalysisError, AnalysisPass, PassOutcome, SameSignSelection};
pub use config::{CascadeConfig, ConfigError};
pub use runner::{EndReason, RunSummary, RunnerError, log_run_end, run, run_with_sinks};
pub use session::{AnalysisSession, SessionError};
pub use source::{EventSource, GenerationError, ReplaySource};
