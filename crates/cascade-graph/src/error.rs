//! Error types for the `cascade-graph` crate.
//!
//! Every variant is fatal for the run: a malformed graph signals a generator
//! or traversal bug and is never absorbed by truncating the traversal.

/// Errors raised while reading or walking a decay graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An index points outside the event listing.
    #[error("record index {index} is out of bounds for an event of {len} records")]
    OutOfBounds {
        /// The offending index.
        index: usize,
        /// Number of records in the event.
        len: usize,
    },

    /// A record's child range contains the record itself.
    #[error("record {index} lists itself among its children ({first}..={last})")]
    SelfReference {
        /// The self-referencing record.
        index: usize,
        /// First index of its child range.
        first: usize,
        /// Last index of its child range.
        last: usize,
    },

    /// A child range loops back to a record on the current expansion path.
    #[error("cyclic decay graph: record {index} has ancestor {revisited} among its children")]
    Cycle {
        /// The record whose child range closes the loop.
        index: usize,
        /// The ancestor reached again.
        revisited: usize,
    },
}

impl GraphError {
    /// Whether this error describes a malformed graph (as opposed to a bad
    /// index supplied by the caller).
    pub const fn is_malformed_graph(&self) -> bool {
        matches!(self, Self::SelfReference { .. } | Self::Cycle { .. })
    }
}
