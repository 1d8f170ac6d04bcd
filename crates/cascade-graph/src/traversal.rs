//! Descendant traversal over a [`DecayGraph`].
//!
//! [`all_descendants`] runs in two passes over the reachable subgraph only:
//!
//! 1. A depth-first walk with on-path marks proves the subgraph is acyclic.
//!    Reaching a record that is still on the current path means a child
//!    range points back to an ancestor, reported as [`GraphError::Cycle`].
//! 2. A generation-by-generation expansion emits the records. Each
//!    generation is sorted into event order before it is emitted, and a
//!    record reachable along several paths is emitted once, at the first
//!    generation that reaches it.
//!
//! Only non-final records are expanded; final-state records are leaves even
//! if their child range is populated. Both passes touch each reachable record
//! once, so the work is proportional to the number of descendants and never
//! exceeds the size of the event.

use std::collections::{BTreeMap, BTreeSet};

use cascade_types::Particle;

use crate::error::GraphError;
use crate::view::DecayGraph;

/// A record reached by a traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Descendant<'a> {
    /// Index of the record in the event.
    pub index: usize,
    /// Distance from the starting record (1 = direct child).
    pub generation: u32,
    /// The record itself.
    pub particle: &'a Particle,
}

/// Direct children of the record at `index`, in event order.
///
/// Returns an empty vector when the record encodes "no children", including
/// the inverted-range form `child_last < child_first`.
///
/// # Errors
///
/// Returns [`GraphError`] if `index` or its child range is out of bounds, or
/// if the range contains `index` itself.
pub fn children<G: DecayGraph + ?Sized>(
    graph: &G,
    index: usize,
) -> Result<Vec<Descendant<'_>>, GraphError> {
    let Some(range) = graph.child_range(index)? else {
        return Ok(Vec::new());
    };
    range
        .map(|child| {
            Ok(Descendant {
                index: child,
                generation: 1,
                particle: graph.record(child)?,
            })
        })
        .collect()
}

/// All descendants of the record at `index`, generation by generation.
///
/// With `final_state_only` the result holds only final-state records;
/// otherwise it holds every intermediate and final record reached.
///
/// # Errors
///
/// Returns [`GraphError::Cycle`] or [`GraphError::SelfReference`] for a
/// malformed graph, and [`GraphError::OutOfBounds`] for ranges that leave
/// the event.
pub fn all_descendants<G: DecayGraph + ?Sized>(
    graph: &G,
    index: usize,
    final_state_only: bool,
) -> Result<Vec<Descendant<'_>>, GraphError> {
    ensure_acyclic(graph, index)?;

    let mut visited = BTreeSet::from([index]);
    let mut frontier: Vec<usize> = graph.child_range(index)?.into_iter().flatten().collect();
    let mut generation: u32 = 1;
    let mut found = Vec::new();

    while !frontier.is_empty() {
        frontier.sort_unstable();
        frontier.dedup();

        let mut next = Vec::new();
        for &current in &frontier {
            if !visited.insert(current) {
                continue;
            }
            let particle = graph.record(current)?;
            if !final_state_only || particle.is_final() {
                found.push(Descendant {
                    index: current,
                    generation,
                    particle,
                });
            }
            if !particle.is_final() {
                if let Some(range) = graph.child_range(current)? {
                    next.extend(range.filter(|child| !visited.contains(child)));
                }
            }
        }

        frontier = next;
        generation = generation.saturating_add(1);
    }

    Ok(found)
}

/// Final-state descendants of the record at `index`.
///
/// # Errors
///
/// Same as [`all_descendants`].
pub fn final_state_descendants<G: DecayGraph + ?Sized>(
    graph: &G,
    index: usize,
) -> Result<Vec<Descendant<'_>>, GraphError> {
    all_descendants(graph, index, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// Children a traversal would expand from `index`. The starting record is
/// always expanded; any other record only while it is not final.
fn expansion<G: DecayGraph + ?Sized>(
    graph: &G,
    index: usize,
    is_start: bool,
) -> Result<core::iter::Flatten<core::option::IntoIter<core::ops::RangeInclusive<usize>>>, GraphError>
{
    if !is_start && graph.record(index)?.is_final() {
        return Ok(None.into_iter().flatten());
    }
    Ok(graph.child_range(index)?.into_iter().flatten())
}

fn ensure_acyclic<G: DecayGraph + ?Sized>(graph: &G, start: usize) -> Result<(), GraphError> {
    let mut marks = BTreeMap::from([(start, Mark::OnPath)]);
    let mut stack = vec![(start, expansion(graph, start, true)?)];

    while let Some(top) = stack.last_mut() {
        let node = top.0;
        match top.1.next() {
            Some(child) => match marks.get(&child) {
                Some(Mark::OnPath) => {
                    return Err(GraphError::Cycle {
                        index: node,
                        revisited: child,
                    });
                }
                Some(Mark::Done) => {}
                None => {
                    let grandchildren = expansion(graph, child, false)?;
                    marks.insert(child, Mark::OnPath);
                    stack.push((child, grandchildren));
                }
            },
            None => {
                marks.insert(node, Mark::Done);
                stack.pop();
            }
        }
    }

    Ok(())
}
