//! Read-only, bounds-checked view over an implicitly encoded decay graph.
//!
//! A [`DecayGraph`] turns the raw `child_first`/`child_last` pair of a
//! record into a validated child range: ranges that run off the end of the
//! listing or include the record itself are rejected here, so traversal code
//! never does pointer arithmetic on unchecked indices.

use core::ops::RangeInclusive;

use cascade_types::{Event, Particle};

use crate::error::GraphError;

/// Indexed access to the records of one event.
pub trait DecayGraph {
    /// Number of records in the listing.
    fn record_count(&self) -> usize;

    /// The record at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OutOfBounds`] if `index` is past the end.
    fn record(&self, index: usize) -> Result<&Particle, GraphError>;

    /// The validated child range of the record at `index`, or `None` if the
    /// record encodes "no children".
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OutOfBounds`] if `index` or any child index is
    /// past the end, or [`GraphError::SelfReference`] if the range contains
    /// `index` itself.
    fn child_range(&self, index: usize) -> Result<Option<RangeInclusive<usize>>, GraphError> {
        let Some(range) = self.record(index)?.child_range() else {
            return Ok(None);
        };
        if range.contains(&index) {
            return Err(GraphError::SelfReference {
                index,
                first: *range.start(),
                last: *range.end(),
            });
        }
        let len = self.record_count();
        if *range.end() >= len {
            return Err(GraphError::OutOfBounds {
                index: *range.end(),
                len,
            });
        }
        Ok(Some(range))
    }
}

impl DecayGraph for [Particle] {
    fn record_count(&self) -> usize {
        self.len()
    }

    fn record(&self, index: usize) -> Result<&Particle, GraphError> {
        self.get(index).ok_or(GraphError::OutOfBounds {
            index,
            len: self.len(),
        })
    }
}

impl DecayGraph for Event {
    fn record_count(&self) -> usize {
        self.len()
    }

    fn record(&self, index: usize) -> Result<&Particle, GraphError> {
        self.particles().record(index)
    }
}

/// Map every record to all records whose child range contains it, in
/// listing order.
///
/// The listing stores only downward links; serializers that need mother
/// indices rebuild them here. A record produced by several parents (two
/// incoming beams, say) lists every one of them. The system record and
/// orphaned records have an empty list.
///
/// # Errors
///
/// Propagates any malformed child range found while scanning.
pub fn parent_map<G: DecayGraph + ?Sized>(graph: &G) -> Result<Vec<Vec<usize>>, GraphError> {
    let len = graph.record_count();
    let mut parents = vec![Vec::new(); len];
    for index in 0..len {
        let Some(range) = graph.child_range(index)? else {
            continue;
        };
        for child in range {
            if let Some(slot) = parents.get_mut(child) {
                slot.push(index);
            }
        }
    }
    Ok(parents)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cascade_types::FourMomentum;

    use super::*;

    fn record(first: usize, last: usize) -> Particle {
        Particle::new(1, -2, 0, FourMomentum::default()).with_children(first, last)
    }

    #[test]
    fn record_out_of_bounds_is_an_error() {
        let listing = vec![record(0, 0)];
        assert_eq!(
            listing.as_slice().record(3).unwrap_err(),
            GraphError::OutOfBounds { index: 3, len: 1 }
        );
    }

    #[test]
    fn child_range_past_the_end_is_rejected() {
        let listing = vec![record(0, 0), record(2, 5), record(0, 0)];
        assert_eq!(
            listing.as_slice().child_range(1).unwrap_err(),
            GraphError::OutOfBounds { index: 5, len: 3 }
        );
    }

    #[test]
    fn self_reference_is_rejected() {
        let listing = vec![record(0, 0), record(1, 2), record(0, 0)];
        let err = listing.as_slice().child_range(1).unwrap_err();
        assert!(err.is_malformed_graph());
    }

    #[test]
    fn inverted_range_means_no_children() {
        let listing = vec![record(0, 0), record(3, 2), record(0, 0), record(0, 0)];
        assert_eq!(listing.as_slice().child_range(1).unwrap(), None);
    }

    #[test]
    fn parent_map_lists_every_parent_in_order() {
        // 1 -> {2, 3}; 2 -> {3}
        let listing = vec![record(0, 0), record(2, 3), record(3, 3), record(0, 0)];
        let parents = parent_map(listing.as_slice()).unwrap();
        assert_eq!(parents, vec![vec![], vec![], vec![1], vec![1, 2]]);
    }

    #[test]
    fn two_beams_share_one_child() {
        // system -> {1, 2}; both beams -> {3}
        let listing = vec![record(1, 2), record(3, 3), record(3, 3), record(0, 0)];
        let parents = parent_map(listing.as_slice()).unwrap();
        assert_eq!(parents.get(3), Some(&vec![1, 2]));
        assert_eq!(parents.get(1), Some(&vec![0]));
    }
}
