//! Batched search trees stored as a structure of arrays.
//!
//! Each batch row is an independent tree with a fixed node capacity. Nodes are
//! integer indices into flat arrays whose leading dimension is the row, so a
//! whole batch can be handed to (or taken from) an evaluator without any
//! repacking. The statistics of the edge `(parent, action)` live in the slot of
//! the child it leads to; the root (node [`ROOT`]) has no incoming edge.

use crate::error::{MctsError, Result};

pub use puct_kernel::UNEXPANDED;

/// Node index of every row's root.
pub const ROOT: usize = 0;

/// Parent index of a root node.
pub const NO_PARENT: i32 = -1;

/// Dimensions of a batched tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeShape {
    /// Independent trees in the batch (`B`).
    pub rows: usize,
    /// Node capacity of each tree (`T`).
    pub nodes: usize,
    /// Actions per node (`A`).
    pub actions: usize,
    /// Value columns per edge (`S`): 1 for alternating play, else one per seat.
    pub values: usize,
}

impl TreeShape {
    pub fn new(rows: usize, nodes: usize, actions: usize, values: usize) -> Self {
        Self {
            rows,
            nodes,
            actions,
            values,
        }
    }

    fn check(&self) -> Result<()> {
        for (name, dim) in [
            ("rows", self.rows),
            ("nodes", self.nodes),
            ("actions", self.actions),
            ("values", self.values),
        ] {
            if dim == 0 {
                return Err(MctsError::EmptyDimension(name));
            }
        }
        // Every array length must be representable.
        let node_len = self
            .rows
            .checked_mul(self.nodes)
            .ok_or(MctsError::ShapeOverflow("parents"))?;
        node_len
            .checked_mul(self.actions)
            .ok_or(MctsError::ShapeOverflow("logits"))?;
        node_len
            .checked_mul(self.values)
            .ok_or(MctsError::ShapeOverflow("w"))?;
        // Node links are stored as i32.
        if self.nodes > i32::MAX as usize {
            return Err(MctsError::IndexOutOfRange {
                row: 0,
                what: "node capacity",
                index: self.nodes as i64,
                bound: i32::MAX as usize,
            });
        }
        Ok(())
    }

    /// Length of a `[B,T]` array.
    #[inline]
    pub fn node_len(&self) -> usize {
        self.rows * self.nodes
    }

    /// Length of a `[B,T,A]` array.
    #[inline]
    pub fn action_len(&self) -> usize {
        self.node_len() * self.actions
    }

    /// Length of a `[B,T,S]` array.
    #[inline]
    pub fn value_len(&self) -> usize {
        self.node_len() * self.values
    }
}

/// Caller-owned arrays handed to [`Tree::from_parts`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeParts {
    pub logits: Vec<f32>,
    pub children: Vec<i32>,
    pub parents: Vec<i32>,
    pub seats: Vec<i32>,
    pub terminal: Vec<bool>,
    pub rewards: Vec<f32>,
    pub c_puct: Vec<f32>,
    pub w: Vec<f32>,
    pub n: Vec<u32>,
}

/// A batch of search trees.
///
/// The arrays are public plain data. Descent only reads them; backup writes
/// `w` and `n` and needs `&mut Tree` for the whole call, which is the
/// exclusive-access window the caller must respect.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    shape: TreeShape,
    /// `[B,T,A]` prior score of each action; non-finite marks an invalid action.
    pub logits: Vec<f32>,
    /// `[B,T,A]` child reached by each action, or [`UNEXPANDED`].
    pub children: Vec<i32>,
    /// `[B,T]` parent of each node, or [`NO_PARENT`].
    pub parents: Vec<i32>,
    /// `[B,T]` seat acting at each node.
    pub seats: Vec<i32>,
    /// `[B,T]` whether the node's outcome is already resolved.
    pub terminal: Vec<bool>,
    /// `[B,T,S]` reward of the transition into each node, added to the value
    /// backed up through it.
    pub rewards: Vec<f32>,
    /// `[B]` exploration strength of each tree.
    pub c_puct: Vec<f32>,
    /// `[B,T,S]` value sum of the edge into each node.
    pub w: Vec<f32>,
    /// `[B,T]` visit count of the edge into each node.
    pub n: Vec<u32>,
}

impl Tree {
    /// Allocate a blank batch: no node evaluated, nothing linked, zero stats.
    pub fn new(shape: TreeShape, c_puct: f32) -> Result<Self> {
        shape.check()?;
        check_c_puct(0, c_puct)?;
        Ok(Self {
            shape,
            logits: vec![f32::NAN; shape.action_len()],
            children: vec![UNEXPANDED; shape.action_len()],
            parents: vec![NO_PARENT; shape.node_len()],
            seats: vec![0; shape.node_len()],
            terminal: vec![false; shape.node_len()],
            rewards: vec![0.0; shape.value_len()],
            c_puct: vec![c_puct; shape.rows],
            w: vec![0.0; shape.value_len()],
            n: vec![0; shape.node_len()],
        })
    }

    /// Adopt arrays produced elsewhere, checking every length against `shape`.
    pub fn from_parts(shape: TreeShape, parts: TreeParts) -> Result<Self> {
        shape.check()?;
        let TreeParts {
            logits,
            children,
            parents,
            seats,
            terminal,
            rewards,
            c_puct,
            w,
            n,
        } = parts;
        let tree = Self {
            shape,
            logits,
            children,
            parents,
            seats,
            terminal,
            rewards,
            c_puct,
            w,
            n,
        };
        tree.check_shape()?;
        Ok(tree)
    }

    /// Give the arrays back to the caller.
    pub fn into_parts(self) -> (TreeShape, TreeParts) {
        (
            self.shape,
            TreeParts {
                logits: self.logits,
                children: self.children,
                parents: self.parents,
                seats: self.seats,
                terminal: self.terminal,
                rewards: self.rewards,
                c_puct: self.c_puct,
                w: self.w,
                n: self.n,
            },
        )
    }

    #[inline]
    pub fn shape(&self) -> TreeShape {
        self.shape
    }

    /// Re-check array lengths and `c_puct`. The arrays are public, so every
    /// engine call runs this before touching any row.
    pub fn check_shape(&self) -> Result<()> {
        let s = self.shape;
        check_len("logits", s.action_len(), self.logits.len())?;
        check_len("children", s.action_len(), self.children.len())?;
        check_len("parents", s.node_len(), self.parents.len())?;
        check_len("seats", s.node_len(), self.seats.len())?;
        check_len("terminal", s.node_len(), self.terminal.len())?;
        check_len("rewards", s.value_len(), self.rewards.len())?;
        check_len("c_puct", s.rows, self.c_puct.len())?;
        check_len("w", s.value_len(), self.w.len())?;
        check_len("n", s.node_len(), self.n.len())?;
        for (row, &c) in self.c_puct.iter().enumerate() {
            check_c_puct(row, c)?;
        }
        Ok(())
    }

    /// Return every array to the state [`Tree::new`] produces, keeping `c_puct`.
    pub fn reset(&mut self) {
        self.logits.fill(f32::NAN);
        self.children.fill(UNEXPANDED);
        self.parents.fill(NO_PARENT);
        self.seats.fill(0);
        self.terminal.fill(false);
        self.rewards.fill(0.0);
        self.w.fill(0.0);
        self.n.fill(0);
    }

    /// Root node index of each row.
    pub fn roots(&self) -> Vec<i32> {
        vec![ROOT as i32; self.shape.rows]
    }

    /// Read-only view of one row.
    ///
    /// # Panics
    /// If `row >= shape.rows` or the arrays are shorter than the shape says;
    /// engine calls run [`Tree::check_shape`] first.
    pub fn row(&self, row: usize) -> RowView<'_> {
        let s = self.shape;
        let nodes = row * s.nodes..(row + 1) * s.nodes;
        let actions = row * s.nodes * s.actions..(row + 1) * s.nodes * s.actions;
        let values = row * s.nodes * s.values..(row + 1) * s.nodes * s.values;
        RowView {
            row,
            shape: s,
            c_puct: self.c_puct[row],
            logits: &self.logits[actions.clone()],
            children: &self.children[actions],
            parents: &self.parents[nodes.clone()],
            seats: &self.seats[nodes.clone()],
            terminal: &self.terminal[nodes.clone()],
            rewards: &self.rewards[values.clone()],
            w: &self.w[values],
            n: &self.n[nodes],
        }
    }

    /// Borrow the link arrays apart from the statistics, so backup can walk
    /// paths while writing `w` and `n`.
    pub fn split_stats_mut(&mut self) -> (Links<'_>, &mut [f32], &mut [u32]) {
        let links = Links {
            shape: self.shape,
            parents: &self.parents,
            seats: &self.seats,
            terminal: &self.terminal,
            rewards: &self.rewards,
        };
        (links, &mut self.w, &mut self.n)
    }

    /// Populate a node's evaluator outputs.
    pub fn write_node(&mut self, row: usize, node: usize, init: NodeInit<'_>) -> Result<()> {
        let s = self.shape;
        self.check_slot(row, node)?;
        check_len("node logits", s.actions, init.logits.len())?;
        check_len("node rewards", s.values, init.rewards.len())?;

        let slot = row * s.nodes + node;
        self.logits[slot * s.actions..(slot + 1) * s.actions].copy_from_slice(init.logits);
        self.rewards[slot * s.values..(slot + 1) * s.values].copy_from_slice(init.rewards);
        self.seats[slot] = init.seat;
        self.terminal[slot] = init.terminal;
        Ok(())
    }

    /// Link `child` as the node reached from `parent` by `action`.
    pub fn attach_child(
        &mut self,
        row: usize,
        parent: usize,
        action: usize,
        child: usize,
    ) -> Result<()> {
        let s = self.shape;
        self.check_slot(row, parent)?;
        self.check_slot(row, child)?;
        if action >= s.actions {
            return Err(MctsError::IndexOutOfRange {
                row,
                what: "action",
                index: action as i64,
                bound: s.actions,
            });
        }
        self.children[(row * s.nodes + parent) * s.actions + action] = child as i32;
        self.parents[row * s.nodes + child] = parent as i32;
        Ok(())
    }

    fn check_slot(&self, row: usize, node: usize) -> Result<()> {
        if row >= self.shape.rows {
            return Err(MctsError::IndexOutOfRange {
                row,
                what: "row",
                index: row as i64,
                bound: self.shape.rows,
            });
        }
        if node >= self.shape.nodes {
            return Err(MctsError::IndexOutOfRange {
                row,
                what: "node",
                index: node as i64,
                bound: self.shape.nodes,
            });
        }
        Ok(())
    }
}

/// Evaluator outputs for one node, written with [`Tree::write_node`].
#[derive(Debug, Clone, Copy)]
pub struct NodeInit<'a> {
    pub logits: &'a [f32],
    pub seat: i32,
    pub terminal: bool,
    pub rewards: &'a [f32],
}

/// Borrowed view of one row of a [`Tree`].
///
/// Node indices read from the arrays go through [`RowView::node`], which
/// reports a bad index as an error. The accessors below take a slot the caller
/// already checked.
///
/// # Panics
///
/// Every accessor taking a `node: usize` panics if `node >= shape.nodes`;
/// [`RowView::child`] also panics if `action >= shape.actions`.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub row: usize,
    pub shape: TreeShape,
    pub c_puct: f32,
    pub logits: &'a [f32],
    pub children: &'a [i32],
    pub parents: &'a [i32],
    pub seats: &'a [i32],
    pub terminal: &'a [bool],
    pub rewards: &'a [f32],
    pub w: &'a [f32],
    pub n: &'a [u32],
}

impl<'a> RowView<'a> {
    /// Check a stored node index and turn it into a slot.
    #[inline]
    pub fn node(&self, what: &'static str, index: i64) -> Result<usize> {
        if index < 0 || index as usize >= self.shape.nodes {
            return Err(MctsError::IndexOutOfRange {
                row: self.row,
                what,
                index,
                bound: self.shape.nodes,
            });
        }
        Ok(index as usize)
    }

    /// Prior scores of `node`. Panics if `node` is out of range.
    #[inline]
    pub fn logits_of(&self, node: usize) -> &'a [f32] {
        let a = self.shape.actions;
        &self.logits[node * a..(node + 1) * a]
    }

    #[inline]
    pub fn children_of(&self, node: usize) -> &'a [i32] {
        let a = self.shape.actions;
        &self.children[node * a..(node + 1) * a]
    }

    #[inline]
    pub fn rewards_of(&self, node: usize) -> &'a [f32] {
        let s = self.shape.values;
        &self.rewards[node * s..(node + 1) * s]
    }

    #[inline]
    pub fn w_of(&self, node: usize) -> &'a [f32] {
        let s = self.shape.values;
        &self.w[node * s..(node + 1) * s]
    }

    /// Child reached by `action`, `None` while unexpanded.
    ///
    /// A stored child outside the row is an error.
    ///
    /// # Panics
    ///
    /// If `node` or `action` is out of range.
    pub fn child(&self, node: usize, action: usize) -> Result<Option<usize>> {
        match self.children_of(node)[action] {
            UNEXPANDED => Ok(None),
            c => self.node("child", c as i64).map(Some),
        }
    }

    /// Parent of `node`, `None` for a root.
    ///
    /// # Panics
    ///
    /// If `node` is out of range.
    pub fn parent(&self, node: usize) -> Result<Option<usize>> {
        match self.parents[node] {
            NO_PARENT => Ok(None),
            p => self.node("parent", p as i64).map(Some),
        }
    }

    #[inline]
    pub fn is_terminal(&self, node: usize) -> bool {
        self.terminal[node]
    }

    #[inline]
    pub fn seat(&self, node: usize) -> i32 {
        self.seats[node]
    }

    #[inline]
    pub fn visits(&self, node: usize) -> u32 {
        self.n[node]
    }
}

/// Link arrays of a whole batch, see [`Tree::split_stats_mut`].
#[derive(Debug, Clone, Copy)]
pub struct Links<'a> {
    pub shape: TreeShape,
    pub parents: &'a [i32],
    pub seats: &'a [i32],
    pub terminal: &'a [bool],
    pub rewards: &'a [f32],
}

impl<'a> Links<'a> {
    pub fn row(&self, row: usize) -> RowLinks<'a> {
        let s = self.shape;
        let nodes = row * s.nodes..(row + 1) * s.nodes;
        RowLinks {
            values: s.values,
            parents: &self.parents[nodes.clone()],
            seats: &self.seats[nodes.clone()],
            terminal: &self.terminal[nodes],
            rewards: &self.rewards[row * s.nodes * s.values..(row + 1) * s.nodes * s.values],
        }
    }
}

/// Link arrays of one row.
#[derive(Debug, Clone, Copy)]
pub struct RowLinks<'a> {
    pub values: usize,
    pub parents: &'a [i32],
    pub seats: &'a [i32],
    pub terminal: &'a [bool],
    pub rewards: &'a [f32],
}

impl<'a> RowLinks<'a> {
    #[inline]
    pub fn rewards_of(&self, node: usize) -> &'a [f32] {
        &self.rewards[node * self.values..(node + 1) * self.values]
    }
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(MctsError::Shape {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_c_puct(row: usize, value: f32) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MctsError::InvalidCPuct { row, value });
    }
    Ok(())
}
