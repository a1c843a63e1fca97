//! Batched PUCT descent and backup over structure-of-arrays search trees.
//!
//! A [`Tree`] holds `B` independent search trees in flat, row-major arrays
//! (`[B,T,A]`, `[B,T,S]`, `[B,T]`, `[B]`). The library never grows those
//! arrays or evaluates positions: the caller expands nodes and produces
//! values, this crate does the two tree walks of every simulation.
//!
//! 1. [`Engine::descend`] walks each row from its root by PUCT and reports
//!    the edge that needs a new node (or the terminal node it reached).
//! 2. The caller evaluates, writes the new node with [`Tree::write_node`] and
//!    links it with [`Tree::attach_child`].
//! 3. [`Engine::backup`] adds the leaf values to every edge on the way back
//!    to the root.
//!
//! ```
//! use batched_mcts::{Engine, NodeInit, SearchConfig, Tree, TreeShape};
//!
//! let mut tree = Tree::new(TreeShape::new(1, 8, 2, 1), 1.0)?;
//! tree.write_node(0, 0, NodeInit { logits: &[0.0, 0.0], seat: 0, terminal: false, rewards: &[0.0] })?;
//!
//! let engine = Engine::new(SearchConfig::for_testing())?;
//! let d = engine.descend(&tree)?;
//! assert_eq!((d.parents[0], d.actions[0]), (0, 0));
//!
//! tree.write_node(0, 1, NodeInit { logits: &[0.0, 0.0], seat: 1, terminal: false, rewards: &[0.0] })?;
//! tree.attach_child(0, 0, 0, 1)?;
//! engine.backup(&mut tree, &[1], &[0.5])?;
//!
//! assert_eq!(engine.root_summaries(&tree)?[0].visits, vec![1, 0]);
//! # Ok::<(), batched_mcts::MctsError>(())
//! ```

pub mod backup;
pub mod config;
pub mod descent;
pub mod engine;
pub mod error;
pub mod summary;
pub mod tree;

#[cfg(test)]
mod test_util;

pub use config::{Perspective, PriorKind, SearchConfig};
pub use descent::{Descent, RowDescent, RowStep, Step, NO_ACTION};
pub use engine::{Engine, EngineStats};
pub use error::{MctsError, Result};
pub use summary::RootSummary;
pub use tree::{NodeInit, Tree, TreeParts, TreeShape, NO_PARENT, ROOT, UNEXPANDED};
