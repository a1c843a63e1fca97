//! PUCT descent.
//!
//! Selection at a node scores every valid action with
//!
//! ```text
//! Q(a) = w[c] / n[c]                       (0 while the edge is unvisited)
//! U(a) = c_puct * P(a) * sqrt(sum_b n[c_b]) / (1 + n[c])
//! ```
//!
//! where `c` is the child reached by `a` (unexpanded children count as
//! unvisited) and `P` is the normalized prior. The highest `Q + U` wins, lowest
//! action index on ties, so repeated calls on the same tree agree.
//!
//! Everything here works on one [`RowView`]; [`crate::Engine`] maps it over the
//! batch.

use puct_kernel::{puct, sqrt_visits, Argmax, PriorNorm, UNEXPANDED};

use crate::config::{Perspective, SearchConfig};
use crate::error::{MctsError, Result};
use crate::tree::{RowView, NO_PARENT, ROOT};

/// No action taken in this row.
pub const NO_ACTION: i32 = -1;

/// One ply of descent in a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStep {
    /// Node the action was chosen at, [`NO_PARENT`] if the row did not move.
    pub parent: i32,
    /// Chosen action, [`NO_ACTION`] if the row did not move.
    pub action: i32,
    /// Node the action leads to, [`UNEXPANDED`] if none.
    pub next: i32,
}

impl RowStep {
    pub const HALTED: RowStep = RowStep {
        parent: NO_PARENT,
        action: NO_ACTION,
        next: UNEXPANDED,
    };
}

/// Full root-to-leaf walk in a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowDescent {
    /// Node of the last selection, [`NO_PARENT`] when the root is terminal.
    pub parent: i32,
    /// Action of the last selection, [`NO_ACTION`] when the root is terminal.
    pub action: i32,
    /// Terminal node the walk stopped on, or [`UNEXPANDED`] when the last
    /// action has no child yet and must be expanded by the caller.
    pub leaf: i32,
}

/// One ply for every row, as dense `[B]` arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub parents: Vec<i32>,
    pub actions: Vec<i32>,
    pub next: Vec<i32>,
}

impl FromIterator<RowStep> for Step {
    fn from_iter<I: IntoIterator<Item = RowStep>>(iter: I) -> Self {
        let mut step = Step::default();
        for s in iter {
            step.parents.push(s.parent);
            step.actions.push(s.action);
            step.next.push(s.next);
        }
        step
    }
}

/// Root-to-leaf walks for every row, as dense `[B]` arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descent {
    pub parents: Vec<i32>,
    pub actions: Vec<i32>,
    pub leaves: Vec<i32>,
}

impl Descent {
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Whether row `row` stopped on an edge with no child node yet.
    pub fn needs_expansion(&self, row: usize) -> bool {
        self.actions[row] != NO_ACTION && self.leaves[row] == UNEXPANDED
    }
}

impl FromIterator<RowDescent> for Descent {
    fn from_iter<I: IntoIterator<Item = RowDescent>>(iter: I) -> Self {
        let mut descent = Descent::default();
        for d in iter {
            descent.parents.push(d.parent);
            descent.actions.push(d.action);
            descent.leaves.push(d.leaf);
        }
        descent
    }
}

/// Pick the best action at `node`.
pub fn select_action(row: &RowView<'_>, node: usize, config: &SearchConfig) -> Result<usize> {
    let actions = row.shape.actions;
    let logits = row.logits_of(node);
    let column = value_column(row, node, config.perspective)?;

    let mut total: u64 = 0;
    for a in 0..actions {
        if let Some(c) = row.child(node, a)? {
            total += row.visits(c) as u64;
        }
    }
    let sqrt_total = sqrt_visits(total);
    let norm = PriorNorm::fit(config.priors, logits);

    let mut best = Argmax::new();
    for (a, &raw) in logits.iter().enumerate() {
        if !config.priors.is_valid(raw) {
            continue;
        }
        let (w, n) = match row.child(node, a)? {
            Some(c) => (row.w_of(c)[column], row.visits(c)),
            None => (0.0, 0),
        };
        best.offer(a, puct(w, n, norm.prior(raw), row.c_puct, sqrt_total));
    }

    best.index().ok_or(MctsError::NoValidAction { row: row.row, node })
}

/// Value column Q is read from when selecting at `node`.
fn value_column(row: &RowView<'_>, node: usize, perspective: Perspective) -> Result<usize> {
    match perspective {
        Perspective::Alternating => Ok(0),
        Perspective::PerSeat => {
            let seat = row.seat(node);
            if seat < 0 || seat as usize >= row.shape.values {
                return Err(MctsError::SeatOutOfRange {
                    row: row.row,
                    node,
                    seat,
                    values: row.shape.values,
                });
            }
            Ok(seat as usize)
        }
    }
}

/// Advance one ply from `current`.
///
/// Rows at [`UNEXPANDED`] or at a terminal node do not move and report
/// [`RowStep::HALTED`]; callers looping on this keep their own record of the
/// last real step.
pub fn descend_step_row(row: &RowView<'_>, current: i32, config: &SearchConfig) -> Result<RowStep> {
    if current == UNEXPANDED {
        return Ok(RowStep::HALTED);
    }
    let node = row.node("current", current as i64)?;
    if row.is_terminal(node) {
        return Ok(RowStep::HALTED);
    }
    let action = select_action(row, node, config)?;
    let next = row.child(node, action)?.map_or(UNEXPANDED, |c| c as i32);
    Ok(RowStep {
        parent: node as i32,
        action: action as i32,
        next,
    })
}

/// Walk from the root until the chosen action is unexpanded or the walk lands
/// on a terminal node.
pub fn descend_row(row: &RowView<'_>, config: &SearchConfig) -> Result<RowDescent> {
    let mut current = ROOT;
    let mut parent = NO_PARENT;
    let mut action = NO_ACTION;

    // Every ply of a well-formed walk enters a new node, so capacity bounds it.
    for _ in 0..row.shape.nodes {
        if row.is_terminal(current) {
            return Ok(RowDescent {
                parent,
                action,
                leaf: current as i32,
            });
        }
        let a = select_action(row, current, config)?;
        parent = current as i32;
        action = a as i32;
        match row.child(current, a)? {
            Some(child) => current = child,
            None => {
                return Ok(RowDescent {
                    parent,
                    action,
                    leaf: UNEXPANDED,
                })
            }
        }
    }

    Err(MctsError::PathTooLong {
        row: row.row,
        bound: row.shape.nodes,
    })
}
