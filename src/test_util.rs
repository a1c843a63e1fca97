use crate::tree::{NodeInit, Tree, TreeShape};

/// Blank batch with `c_puct = 1`.
pub fn blank(rows: usize, nodes: usize, actions: usize, values: usize) -> Tree {
    Tree::new(TreeShape::new(rows, nodes, actions, values), 1.0).unwrap()
}

/// Evaluate a node with the given logits.
pub fn eval(tree: &mut Tree, row: usize, node: usize, logits: &[f32], seat: i32) {
    let rewards = vec![0.0; tree.shape().values];
    tree.write_node(
        row,
        node,
        NodeInit {
            logits,
            seat,
            terminal: false,
            rewards: &rewards,
        },
    )
    .unwrap();
}

/// Mark a node terminal with the given reward columns.
pub fn finish(tree: &mut Tree, row: usize, node: usize, seat: i32, rewards: &[f32]) {
    let logits = vec![f32::NAN; tree.shape().actions];
    tree.write_node(
        row,
        node,
        NodeInit {
            logits: &logits,
            seat,
            terminal: true,
            rewards,
        },
    )
    .unwrap();
}

/// Set the statistics of the edge into `node` (first value column).
pub fn visit(tree: &mut Tree, row: usize, node: usize, n: u32, w: f32) {
    let s = tree.shape();
    tree.n[row * s.nodes + node] = n;
    tree.w[(row * s.nodes + node) * s.values] = w;
}

/// A single path `0 -> 1 -> ... -> len`, always through action 0, with seats
/// given per node. The last node is left as-is for the caller to finish.
pub fn chain(tree: &mut Tree, row: usize, seats: &[i32]) {
    let actions = tree.shape().actions;
    for (node, &seat) in seats.iter().enumerate() {
        eval(tree, row, node, &vec![0.0; actions], seat);
        if node > 0 {
            tree.attach_child(row, node - 1, 0, node).unwrap();
        }
    }
}
