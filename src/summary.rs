//! Root statistics of a searched tree.

use puct_kernel::mean_value;

use crate::config::Perspective;
use crate::error::{MctsError, Result};
use crate::tree::{RowView, ROOT};

/// Per-action statistics of one row's root, from the point of view of the seat
/// acting at the root.
#[derive(Debug, Clone, PartialEq)]
pub struct RootSummary {
    /// Visit count of each root edge, 0 for unexpanded actions.
    pub visits: Vec<u32>,
    /// Mean value of each root edge, 0 for unvisited ones.
    pub q: Vec<f32>,
    /// Visit-weighted mean of every value column over the root edges, zeros
    /// before the first backup. One entry in alternating play, one per seat
    /// otherwise.
    pub values: Vec<f32>,
    /// The root seat's entry of `values`, i.e. the visit-weighted mean of `q`.
    pub value: f32,
}

impl RootSummary {
    pub fn total_visits(&self) -> u64 {
        self.visits.iter().map(|&n| n as u64).sum()
    }
}

pub fn summarize_row(row: &RowView<'_>, perspective: Perspective) -> Result<RootSummary> {
    let actions = row.shape.actions;
    let column = match perspective {
        Perspective::Alternating => 0,
        Perspective::PerSeat => {
            let seat = row.seat(ROOT);
            if seat < 0 || seat as usize >= row.shape.values {
                return Err(MctsError::SeatOutOfRange {
                    row: row.row,
                    node: ROOT,
                    seat,
                    values: row.shape.values,
                });
            }
            seat as usize
        }
    };

    let mut visits = vec![0; actions];
    let mut q = vec![0.0; actions];
    let mut total_w = vec![0.0; row.shape.values];
    let mut total_n: u64 = 0;
    for a in 0..actions {
        if let Some(c) = row.child(ROOT, a)? {
            let n = row.visits(c);
            let w = row.w_of(c);
            visits[a] = n;
            q[a] = mean_value(w[column], n);
            for (acc, &x) in total_w.iter_mut().zip(w) {
                *acc += x;
            }
            total_n += n as u64;
        }
    }

    let values: Vec<f32> = if total_n == 0 {
        vec![0.0; total_w.len()]
    } else {
        total_w.iter().map(|&w| w / total_n as f32).collect()
    };
    let value = values[column];
    Ok(RootSummary {
        visits,
        q,
        values,
        value,
    })
}
