//! Value backup along parent links.
//!
//! A backup walks from a leaf to the top of its tree and adds one visit and
//! one value to every edge on the way. An edge's statistics live in the slot
//! of the node it leads to, so the walk updates every node that has a parent.
//!
//! In [`Perspective::Alternating`] mode the value stored on the edge into `x`
//! is from the point of view of the seat acting at `parent(x)`, and the leaf
//! value must be given that way too. Moving one edge up negates the value when
//! `seats[parent(x)] != seats[parent(parent(x))]`. In
//! [`Perspective::PerSeat`] mode values are per-seat vectors and are never
//! negated.
//!
//! Every edge also carries the reward of its transition (`rewards[x]`, in the
//! same view as the edge). Entering `x` the running value becomes
//! `value + rewards[x]`, or `rewards[x]` alone when `x` is terminal, so a
//! terminal outcome replaces whatever value arrived from below.
//!
//! Backup is split in two halves so a batch can fail without any row having
//! been written: [`validate_row`] only reads, [`apply_row`] cannot fail.

use crate::config::Perspective;
use crate::error::{MctsError, Result};
use crate::tree::{RowLinks, RowView, NO_PARENT};

/// Check that the path above `leaf` is well formed and the value usable.
///
/// Returns the number of edges the path has.
pub fn validate_row(row: &RowView<'_>, leaf: i32, value: &[f32]) -> Result<usize> {
    if value.iter().any(|v| !v.is_finite()) {
        return Err(MctsError::NonFiniteValue { row: row.row });
    }

    let mut node = row.node("leaf", leaf as i64)?;
    let mut edges = 0;
    while let Some(parent) = row.parent(node)? {
        if row.rewards_of(node).iter().any(|r| !r.is_finite()) {
            return Err(MctsError::NonFiniteValue { row: row.row });
        }
        edges += 1;
        // A tree of T nodes has paths of at most T - 1 edges.
        if edges >= row.shape.nodes {
            return Err(MctsError::PathTooLong {
                row: row.row,
                bound: row.shape.nodes,
            });
        }
        node = parent;
    }
    Ok(edges)
}

/// Add `value` along the path above `leaf`.
///
/// `w` and `n` are the row's statistics. The row must have passed
/// [`validate_row`] with the same leaf and value.
pub(crate) fn apply_row(
    links: &RowLinks<'_>,
    perspective: Perspective,
    leaf: usize,
    value: &[f32],
    w: &mut [f32],
    n: &mut [u32],
) {
    let s = links.values;
    let mut running = value.to_vec();
    let mut node = leaf;

    loop {
        let parent = links.parents[node];
        if parent == NO_PARENT {
            break;
        }
        let parent = parent as usize;

        if links.terminal[node] {
            running.fill(0.0);
        }
        for (v, &r) in running.iter_mut().zip(links.rewards_of(node)) {
            *v += r;
        }
        for (acc, &v) in w[node * s..(node + 1) * s].iter_mut().zip(&running) {
            *acc += v;
        }
        n[node] += 1;

        if perspective == Perspective::Alternating {
            let up = links.parents[parent];
            if up != NO_PARENT && links.seats[parent] != links.seats[up as usize] {
                running.iter_mut().for_each(|v| *v = -*v);
            }
        }
        node = parent;
    }
}
