//! Search configuration.

use crate::error::{MctsError, Result};
use crate::tree::Tree;

pub use puct_kernel::PriorKind;

/// How backed-up values are expressed and which seat's view Q is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Perspective {
    /// One value column. Each edge stores the value from the point of view of
    /// the seat acting at its parent, and the value is negated whenever the
    /// acting seat changes on the way up. Zero-sum, alternating play.
    #[default]
    Alternating,
    /// One value column per seat. Values are never negated; descent reads the
    /// column of the seat acting at the node being expanded.
    PerSeat,
}

impl Perspective {
    pub fn name(self) -> &'static str {
        match self {
            Perspective::Alternating => "alternating",
            Perspective::PerSeat => "per-seat",
        }
    }
}

/// Configuration for the batched descent and backup engines.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Value convention shared by descent and backup.
    pub perspective: Perspective,

    /// Whether `logits` holds log-probabilities or plain probabilities.
    pub priors: PriorKind,

    /// Worker threads for the row-parallel pool. 0 lets rayon decide.
    pub num_threads: usize,

    /// Minimum number of rows handed to one rayon task. Small batches run on a
    /// single worker, where splitting costs more than it saves.
    pub min_rows_per_task: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            perspective: Perspective::Alternating,
            priors: PriorKind::Logits,
            num_threads: num_cpus::get(),
            min_rows_per_task: 64,
        }
    }
}

impl SearchConfig {
    /// Multi-agent config: one value column per seat.
    pub fn per_seat() -> Self {
        Self {
            perspective: Perspective::PerSeat,
            ..Self::default()
        }
    }

    /// Small deterministic config for tests: one worker, one row per task.
    pub fn for_testing() -> Self {
        Self {
            num_threads: 1,
            min_rows_per_task: 1,
            ..Self::default()
        }
    }

    /// Builder pattern: set the value perspective.
    pub fn with_perspective(mut self, perspective: Perspective) -> Self {
        self.perspective = perspective;
        self
    }

    /// Builder pattern: set how priors are read.
    pub fn with_priors(mut self, priors: PriorKind) -> Self {
        self.priors = priors;
        self
    }

    /// Builder pattern: set the worker count.
    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    /// Builder pattern: set the rayon split granularity.
    pub fn with_min_rows_per_task(mut self, n: usize) -> Self {
        self.min_rows_per_task = n.max(1);
        self
    }

    /// Check that a tree can be searched under this config.
    pub fn check_tree(&self, tree: &Tree) -> Result<()> {
        tree.check_shape()?;
        let values = tree.shape().values;
        let fits = match self.perspective {
            Perspective::Alternating => values == 1,
            Perspective::PerSeat => values >= 1,
        };
        if !fits {
            return Err(MctsError::PerspectiveMismatch {
                perspective: self.perspective.name(),
                values,
            });
        }
        Ok(())
    }
}
