//! Row-parallel driver for descent, backup and root queries.
//!
//! Rows of a batch are independent trees, so every batched call maps the
//! per-row functions over the rows on a private rayon pool. A call either
//! succeeds for every row or returns the error of the lowest failing row and
//! leaves the tree untouched.

use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace, warn};

use crate::backup::{apply_row, validate_row};
use crate::config::SearchConfig;
use crate::descent::{descend_row, descend_step_row, Descent, Step};
use crate::error::{MctsError, Result};
use crate::summary::{summarize_row, RootSummary};
use crate::tree::Tree;

/// Cumulative counters of an [`Engine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Batched calls that completed.
    pub calls: u64,
    /// Batched calls aborted by an error.
    pub failed_calls: u64,
    /// Rows processed by completed calls.
    pub rows: u64,
    /// Wall time spent inside completed calls.
    pub total_time_us: u64,
}

impl EngineStats {
    /// Mean wall time per completed call.
    pub fn avg_time_us(&self) -> f64 {
        if self.calls > 0 {
            self.total_time_us as f64 / self.calls as f64
        } else {
            0.0
        }
    }
}

/// Batched PUCT engine.
#[derive(Debug)]
pub struct Engine {
    config: SearchConfig,
    /// The rayon thread pool rows are spread over.
    pool: ThreadPool,
    stats: Mutex<EngineStats>,
}

impl Engine {
    /// Build an engine and its worker pool. `config.num_threads == 0` lets
    /// rayon pick the thread count.
    pub fn new(config: SearchConfig) -> Result<Self> {
        let builder = ThreadPoolBuilder::new().thread_name(|i| format!("mcts-rows-{i}"));
        let pool = if config.num_threads > 0 {
            builder.num_threads(config.num_threads).build()?
        } else {
            builder.build()?
        };
        debug!(
            threads = pool.current_num_threads(),
            perspective = config.perspective.name(),
            "engine ready"
        );
        Ok(Self {
            config,
            pool,
            stats: Mutex::new(EngineStats::default()),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        *self.stats.lock()
    }

    /// Root node of every row.
    pub fn roots(&self, tree: &Tree) -> Vec<i32> {
        tree.roots()
    }

    /// Advance every row one ply from `current`.
    pub fn descend_step(&self, tree: &Tree, current: &[i32]) -> Result<Step> {
        let start = Instant::now();
        let rows = tree.shape().rows;
        let result: Result<Step> = self.check(tree).and_then(|()| {
            check_input("current", rows, current.len())?;
            self.per_row(rows, |b| descend_step_row(&tree.row(b), current[b], &self.config))
                .into_iter()
                .collect()
        });
        self.finish("descend_step", rows, start, result)
    }

    /// Walk every row from its root to the next node needing evaluation.
    pub fn descend(&self, tree: &Tree) -> Result<Descent> {
        let start = Instant::now();
        let rows = tree.shape().rows;
        let result: Result<Descent> = self.check(tree).and_then(|()| {
            self.per_row(rows, |b| {
                let d = descend_row(&tree.row(b), &self.config)?;
                trace!(
                    row = b,
                    parent = d.parent,
                    action = d.action,
                    leaf = d.leaf,
                    "descent halted"
                );
                Ok(d)
            })
            .into_iter()
            .collect()
        });
        self.finish("descend", rows, start, result)
    }

    /// Back `values` up from `leaves`, one leaf per row.
    ///
    /// `values` holds `S` columns per row. Every row is validated before any
    /// statistic is written, so on error `w` and `n` are unchanged.
    pub fn backup(&self, tree: &mut Tree, leaves: &[i32], values: &[f32]) -> Result<()> {
        let start = Instant::now();
        let shape = tree.shape();
        let result = self.try_backup(tree, leaves, values);
        self.finish("backup", shape.rows, start, result)
    }

    fn try_backup(&self, tree: &mut Tree, leaves: &[i32], values: &[f32]) -> Result<()> {
        self.check(tree)?;
        let shape = tree.shape();
        let s = shape.values;
        check_input("leaves", shape.rows, leaves.len())?;
        check_input("values", shape.rows * s, values.len())?;

        let edges = {
            let tree = &*tree;
            self.per_row(shape.rows, |b| {
                validate_row(&tree.row(b), leaves[b], &values[b * s..(b + 1) * s])
            })
            .into_iter()
            .sum::<Result<usize>>()?
        };

        let perspective = self.config.perspective;
        let min_len = self.config.min_rows_per_task;
        let (links, w, n) = tree.split_stats_mut();
        self.pool.install(|| {
            w.par_chunks_mut(shape.nodes * s)
                .zip(n.par_chunks_mut(shape.nodes))
                .enumerate()
                .with_min_len(min_len)
                .for_each(|(b, (w_row, n_row))| {
                    let value = &values[b * s..(b + 1) * s];
                    apply_row(&links.row(b), perspective, leaves[b] as usize, value, w_row, n_row);
                });
        });
        trace!(edges, "backup applied");
        Ok(())
    }

    /// Root statistics of every row.
    pub fn root_summaries(&self, tree: &Tree) -> Result<Vec<RootSummary>> {
        let start = Instant::now();
        let rows = tree.shape().rows;
        let result: Result<Vec<RootSummary>> = self.check(tree).and_then(|()| {
            self.per_row(rows, |b| summarize_row(&tree.row(b), self.config.perspective))
                .into_iter()
                .collect()
        });
        self.finish("root_summaries", rows, start, result)
    }

    fn check(&self, tree: &Tree) -> Result<()> {
        self.config.check_tree(tree)
    }

    /// Run `f` for every row on the pool, results in row order.
    fn per_row<T, F>(&self, rows: usize, f: F) -> Vec<Result<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        let min_len = self.config.min_rows_per_task;
        self.pool.install(|| {
            (0..rows)
                .into_par_iter()
                .with_min_len(min_len)
                .map(f)
                .collect()
        })
    }

    fn finish<T>(&self, op: &'static str, rows: usize, start: Instant, result: Result<T>) -> Result<T> {
        let elapsed_us = start.elapsed().as_micros() as u64;
        let mut stats = self.stats.lock();
        match &result {
            Ok(_) => {
                stats.calls += 1;
                stats.rows += rows as u64;
                stats.total_time_us += elapsed_us;
                debug!(op, rows, elapsed_us, "batched call complete");
            }
            Err(err) => {
                stats.failed_calls += 1;
                if err.is_invariant_violation() {
                    warn!(op, row = ?err.row(), error = %err, "batched call aborted");
                } else {
                    debug!(op, error = %err, "batched call rejected");
                }
            }
        }
        result
    }
}

fn check_input(field: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(MctsError::Shape {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{blank, chain, eval};
    use crate::tree::UNEXPANDED;

    fn engine() -> Engine {
        Engine::new(SearchConfig::for_testing()).unwrap()
    }

    #[test]
    fn test_zero_threads_uses_rayon_default() {
        let engine = Engine::new(SearchConfig::for_testing().with_threads(0)).unwrap();
        assert!(engine.pool.current_num_threads() >= 1);
    }

    #[test]
    fn test_rows_are_independent() {
        let mut tree = blank(2, 4, 2, 1);
        eval(&mut tree, 0, 0, &[0.0, 0.0], 0);
        eval(&mut tree, 1, 0, &[f32::NEG_INFINITY, 0.0], 0);

        let d = engine().descend(&tree).unwrap();
        assert_eq!(d.parents, vec![0, 0]);
        assert_eq!(d.actions, vec![0, 1]);
        assert_eq!(d.leaves, vec![UNEXPANDED, UNEXPANDED]);
        assert!(d.needs_expansion(0) && d.needs_expansion(1));
    }

    #[test]
    fn test_descend_reports_lowest_failing_row() {
        let mut tree = blank(3, 4, 2, 1);
        eval(&mut tree, 0, 0, &[0.0, 0.0], 0);
        let engine = engine();

        let err = engine.descend(&tree).unwrap_err();
        assert_eq!(err, MctsError::NoValidAction { row: 1, node: 0 });
        assert_eq!(engine.stats().failed_calls, 1);
        assert_eq!(engine.stats().calls, 0);
    }

    #[test]
    fn test_backup_error_leaves_tree_untouched() {
        let mut tree = blank(2, 4, 1, 1);
        chain(&mut tree, 0, &[0, 1, 0]);
        chain(&mut tree, 1, &[0, 1, 0]);
        tree.parents[4 + 2] = 7;
        let before = (tree.w.clone(), tree.n.clone());

        let err = engine().backup(&mut tree, &[2, 2], &[1.0, 1.0]).unwrap_err();
        assert_eq!(err.row(), Some(1));
        assert_eq!((tree.w.clone(), tree.n.clone()), before);
    }

    #[test]
    fn test_backup_checks_input_lengths() {
        let mut tree = blank(2, 4, 1, 1);
        let engine = engine();
        assert!(matches!(
            engine.backup(&mut tree, &[0], &[0.0, 0.0]),
            Err(MctsError::Shape { field: "leaves", .. })
        ));
        assert!(matches!(
            engine.backup(&mut tree, &[0, 0], &[0.0]),
            Err(MctsError::Shape { field: "values", .. })
        ));
        assert!(matches!(
            engine.descend_step(&tree, &[0, 0, 0]),
            Err(MctsError::Shape { field: "current", .. })
        ));
    }

    #[test]
    fn test_perspective_mismatch_is_rejected() {
        let tree = blank(1, 4, 2, 2);
        assert!(matches!(
            engine().descend(&tree),
            Err(MctsError::PerspectiveMismatch { values: 2, .. })
        ));
    }

    #[test]
    fn test_backup_then_summary() {
        let mut tree = blank(2, 4, 1, 1);
        chain(&mut tree, 0, &[0, 1, 0]);
        chain(&mut tree, 1, &[0, 0, 0]);
        let engine = engine();

        engine.backup(&mut tree, &[2, 2], &[1.0, 1.0]).unwrap();
        let summaries = engine.root_summaries(&tree).unwrap();
        assert_eq!(summaries[0].visits, vec![1]);
        assert_eq!(summaries[0].q, vec![-1.0]);
        assert_eq!(summaries[1].q, vec![1.0]);

        let stats = engine.stats();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.rows, 4);
    }

    #[test]
    fn test_step_loop_matches_full_descent() {
        let engine = engine();
        let mut tree = blank(1, 5, 1, 1);
        chain(&mut tree, 0, &[0, 1, 0, 1]);

        let mut current = engine.roots(&tree);
        let mut last = None;
        loop {
            let step = engine.descend_step(&tree, &current).unwrap();
            if step.actions[0] < 0 {
                break;
            }
            last = Some((step.parents[0], step.actions[0]));
            current = step.next.clone();
            if current[0] == UNEXPANDED {
                break;
            }
        }

        let d = engine.descend(&tree).unwrap();
        assert_eq!(last, Some((d.parents[0], d.actions[0])));
        assert_eq!(d.parents[0], 3);
    }
}
