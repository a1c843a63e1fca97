//! Error type shared by the tree, descent and backup modules.
//!
//! Every variant is fatal to the batched call that produced it: no row of the
//! batch is written when an error is returned.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MctsError>;

/// Errors raised by the batched search core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MctsError {
    /// An array does not have the length its shape requires.
    #[error("{field}: expected {expected} elements, got {actual}")]
    Shape {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A tree dimension is zero.
    #[error("tree dimension `{0}` must be non-zero")]
    EmptyDimension(&'static str),

    /// The tree dimensions multiply past `usize::MAX` for some array.
    #[error("tree shape overflows the length of `{0}`")]
    ShapeOverflow(&'static str),

    /// The value width of the tree does not fit the configured perspective.
    #[error("perspective {perspective} cannot use trees with {values} value column(s)")]
    PerspectiveMismatch {
        perspective: &'static str,
        values: usize,
    },

    /// `c_puct` must be finite and non-negative.
    #[error("row {row}: invalid c_puct {value}")]
    InvalidCPuct { row: usize, value: f32 },

    /// A non-terminal node was asked to pick a child but has no valid action.
    #[error("row {row}: node {node} is not terminal but has no valid action")]
    NoValidAction { row: usize, node: usize },

    /// A node, child, parent or action index falls outside its array.
    #[error("row {row}: {what} index {index} outside 0..{bound}")]
    IndexOutOfRange {
        row: usize,
        what: &'static str,
        index: i64,
        bound: usize,
    },

    /// A walk visited more nodes than the tree can hold, so the links form a cycle.
    #[error("row {row}: walk exceeded {bound} steps, tree links contain a cycle")]
    PathTooLong { row: usize, bound: usize },

    /// A seat cannot index the per-seat value columns.
    #[error("row {row}: node {node} has seat {seat}, value columns are 0..{values}")]
    SeatOutOfRange {
        row: usize,
        node: usize,
        seat: i32,
        values: usize,
    },

    /// A leaf value or a reward on a backup path is NaN or infinite.
    #[error("row {row}: backed-up value is not finite")]
    NonFiniteValue { row: usize },

    /// The worker pool could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for MctsError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        MctsError::ThreadPool(err.to_string())
    }
}

impl MctsError {
    /// True for errors that indicate corrupted tree contents rather than a
    /// caller passing arrays of the wrong size.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            MctsError::NoValidAction { .. }
                | MctsError::IndexOutOfRange { .. }
                | MctsError::PathTooLong { .. }
                | MctsError::SeatOutOfRange { .. }
                | MctsError::NonFiniteValue { .. }
        )
    }

    /// Batch row the error was raised for, when it concerns a single row.
    pub fn row(&self) -> Option<usize> {
        match self {
            MctsError::InvalidCPuct { row, .. }
            | MctsError::NoValidAction { row, .. }
            | MctsError::IndexOutOfRange { row, .. }
            | MctsError::PathTooLong { row, .. }
            | MctsError::SeatOutOfRange { row, .. }
            | MctsError::NonFiniteValue { row } => Some(*row),
            _ => None,
        }
    }
}
