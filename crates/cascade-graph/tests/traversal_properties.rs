//! Property tests for descendant traversal over synthetic decay graphs.
//!
//! Trees are laid out in level order after the system record at index 0,
//! which is how generators list a cascade: every generation occupies a
//! contiguous block, so each parent's children form one inclusive range.

// Test fixtures index listings directly and build indices with plain
// arithmetic; a panic is the correct failure mode here.
#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use cascade_graph::{GraphError, all_descendants, children};
use cascade_types::{FourMomentum, Particle, SYSTEM_PDG_ID};

/// Balanced tree of `depth` generations below the root, branching `branching`.
fn balanced_tree(depth: u32, branching: usize) -> Vec<Particle> {
    let mut level_sizes = vec![1_usize];
    for _ in 0..depth {
        let last = *level_sizes.last().unwrap();
        level_sizes.push(last * branching);
    }
    let total: usize = level_sizes.iter().sum();
    let leaves_start = total - level_sizes.last().unwrap();

    let mut listing = vec![Particle::new(SYSTEM_PDG_ID, -11, 0, FourMomentum::default()).with_children(1, 1)];
    for position in 0..total {
        let momentum = FourMomentum::new(10.0, 1.0, 0.0, 0.0);
        if position >= leaves_start {
            listing.push(Particle::new(13, 1, -3, momentum));
        } else {
            let first = position * branching + 1 + 1;
            let last = first + branching - 1;
            listing.push(Particle::new(23, -22, 0, momentum).with_children(first, last));
        }
    }
    listing
}

#[test]
fn childless_events_have_no_descendants() {
    let listing: Vec<Particle> = (0..12)
        .map(|i| Particle::new(211, 1, 3, FourMomentum::default()).with_children(i + 3, i + 1))
        .collect();
    for index in 0..listing.len() {
        assert!(all_descendants(listing.as_slice(), index, false).unwrap().is_empty());
        assert!(all_descendants(listing.as_slice(), index, true).unwrap().is_empty());
        assert!(children(listing.as_slice(), index).unwrap().is_empty());
    }
}

#[test]
fn balanced_tree_yields_every_generation_in_order() {
    for (depth, branching) in [(1, 2), (2, 2), (3, 3), (4, 2), (2, 5)] {
        let listing = balanced_tree(depth, branching);
        let found = all_descendants(listing.as_slice(), 1, false).unwrap();

        let expected: usize = (1..=depth).map(|k| branching.pow(k)).sum();
        assert_eq!(found.len(), expected, "depth {depth} branching {branching}");

        for pair in found.windows(2) {
            let [a, b] = pair else { continue };
            assert!(a.generation <= b.generation);
            if a.generation == b.generation {
                assert!(a.index < b.index);
            }
        }
        assert_eq!(found.last().unwrap().generation, depth);
    }
}

#[test]
fn final_state_only_returns_the_leaves() {
    for (depth, branching) in [(1, 3), (3, 2), (4, 3)] {
        let listing = balanced_tree(depth, branching);
        let found = all_descendants(listing.as_slice(), 1, true).unwrap();
        assert_eq!(found.len(), branching.pow(depth));
        assert!(found.iter().all(|d| d.particle.is_final()));
        assert!(found.iter().all(|d| d.generation == depth));
    }
}

#[test]
fn cycle_back_to_ancestor_terminates_with_error() {
    let mut listing = balanced_tree(4, 2);
    // Rewire the first leaf into a decaying record whose children are the
    // root's direct children.
    let first_leaf = listing
        .iter()
        .position(Particle::is_final)
        .unwrap();
    listing[first_leaf] = Particle::new(23, -22, 0, FourMomentum::default()).with_children(2, 3);

    let err = all_descendants(listing.as_slice(), 1, false).unwrap_err();
    assert!(err.is_malformed_graph());
    assert!(matches!(err, GraphError::Cycle { index, .. } if index == first_leaf));
}

#[test]
fn range_past_the_end_surfaces_out_of_bounds() {
    let mut listing = balanced_tree(2, 2);
    let len = listing.len();
    listing[2] = Particle::new(23, -22, 0, FourMomentum::default()).with_children(len - 1, len + 4);

    let err = all_descendants(listing.as_slice(), 1, false).unwrap_err();
    assert_eq!(err, GraphError::OutOfBounds { index: len + 4, len });
}
