//! Error types for the `cascade-sinks` crate.

use std::path::PathBuf;

use cascade_accumulator::AccumulatorError;
use cascade_graph::GraphError;

use crate::sink::SinkKind;

/// Errors raised by output sinks.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The destination could not be created or the header could not be written.
    #[error("failed to open {kind} sink at {}: {source}", path.display())]
    Open {
        /// Which sink failed.
        kind: SinkKind,
        /// Destination path (or writer label).
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing an event record failed.
    #[error("failed to write event {event} to {kind} sink: {source}")]
    Write {
        /// Which sink failed.
        kind: SinkKind,
        /// Number of the event being written.
        event: u64,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing the trailer or rewriting the header failed.
    #[error("failed to finalize {kind} sink: {source}")]
    Finalize {
        /// Which sink failed.
        kind: SinkKind,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An event was written to a sink that is not open.
    #[error("{kind} sink is not open")]
    NotOpen {
        /// The sink addressed.
        kind: SinkKind,
    },

    /// The event's decay graph could not be serialized.
    #[error("cannot serialize decay graph: {source}")]
    Graph {
        /// The underlying graph error.
        #[from]
        source: GraphError,
    },

    /// Persisting the accumulator registry failed.
    #[error("failed to persist accumulators: {source}")]
    Persist {
        /// The underlying accumulator error.
        #[from]
        source: AccumulatorError,
    },
}
