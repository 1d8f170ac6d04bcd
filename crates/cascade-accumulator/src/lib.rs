//! Named accumulator registry for the Cascade analysis pipeline.
//!
//! Analysis code registers histograms and tables under unique names during
//! setup, fills them by name for every event, and persists them once at the
//! end of the run as a single JSON document.
//!
//! # Modules
//!
//! - [`histogram`] -- [`Histogram1D`], [`Histogram2D`], and the binning policy.
//! - [`table`] -- [`Table`]: append-only rows with a fixed column schema.
//! - [`registry`] -- [`Registry`]: name lookup, fill mode, and persistence.
//! - [`batch`] -- [`FillBatch`]: fills staged for an all-or-nothing commit.

pub mod batch;
pub mod histogram;
pub mod registry;
pub mod table;

pub use batch::{Fill, FillBatch};
pub use histogram::{Axis, Binning, Clamp, Histogram1D, Histogram2D};
pub use registry::{Collection, CollectionKind, FillMode, Registry};
pub use table::Table;

/// Errors raised by the accumulator registry.
#[derive(Debug, thiserror::Error)]
pub enum AccumulatorError {
    /// A collection with this name is already registered.
    #[error("collection {name:?} is already registered")]
    DuplicateName {
        /// The contested name.
        name: String,
    },

    /// No collection is registered under this name.
    #[error("no collection registered under {name:?}")]
    UnknownCollection {
        /// The requested name.
        name: String,
    },

    /// The collection exists but has a different shape.
    #[error("collection {name:?} is a {actual}, not a {expected}")]
    KindMismatch {
        /// The requested name.
        name: String,
        /// Shape the caller asked for.
        expected: CollectionKind,
        /// Shape actually registered.
        actual: CollectionKind,
    },

    /// A table row does not match the column schema.
    #[error("table {name:?} expects {expected} columns, got {actual}")]
    RowWidth {
        /// The table name.
        name: String,
        /// Number of columns in the schema.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// A fill was attempted with a NaN value or weight.
    #[error("non-finite value filled into {name:?}")]
    NonFiniteValue {
        /// The collection name.
        name: String,
    },

    /// The requested binning cannot be used.
    #[error("invalid binning for {name:?}: {bins} bins over [{low}, {high})")]
    InvalidBinning {
        /// The collection name.
        name: String,
        /// Requested bin count.
        bins: u32,
        /// Requested lower edge.
        low: f64,
        /// Requested upper edge.
        high: f64,
    },

    /// A table was registered without columns.
    #[error("table {name:?} has no columns")]
    EmptySchema {
        /// The table name.
        name: String,
    },

    /// Writing the persisted document failed.
    #[error("failed to persist accumulators: {source}")]
    Persist {
        /// The underlying serialization or I/O error.
        #[from]
        source: serde_json::Error,
    },

    /// The writer failed after the document was serialized.
    #[error("failed to flush accumulators: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
