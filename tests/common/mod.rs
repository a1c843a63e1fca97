#![allow(dead_code)]

use batched_mcts::{Engine, NodeInit, Tree, TreeShape};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Grows a batch of random trees one simulation at a time and keeps the
/// bookkeeping needed to check the statistics afterwards.
pub struct Grower {
    rng: Xoshiro256PlusPlus,
    seats: i32,
    terminal_prob: f64,
    next_free: Vec<usize>,
    /// How many backups started at each node, `[B][T]`.
    pub leaf_hits: Vec<Vec<u32>>,
    /// Sum of the first value column actually applied at each backup's leaf edge.
    pub applied: Vec<f32>,
    pub simulations: usize,
}

impl Grower {
    pub fn new(tree: &mut Tree, seed: u64, seats: i32, terminal_prob: f64) -> Self {
        let shape = tree.shape();
        let mut grower = Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            seats: seats.max(1),
            terminal_prob,
            next_free: vec![1; shape.rows],
            leaf_hits: vec![vec![0; shape.nodes]; shape.rows],
            applied: vec![0.0; shape.rows],
            simulations: 0,
        };
        let zeros = vec![0.0; shape.values];
        for b in 0..shape.rows {
            let logits = grower.logits(shape.actions);
            tree.write_node(
                b,
                0,
                NodeInit {
                    logits: &logits,
                    seat: 0,
                    terminal: false,
                    rewards: &zeros,
                },
            )
            .unwrap();
        }
        grower
    }

    fn logits(&mut self, actions: usize) -> Vec<f32> {
        let mut logits: Vec<f32> = (0..actions)
            .map(|_| {
                if self.rng.random_bool(0.2) {
                    f32::NEG_INFINITY
                } else {
                    self.rng.random_range(-1.0..1.0)
                }
            })
            .collect();
        if logits.iter().all(|x| !x.is_finite()) {
            logits[actions - 1] = 0.0;
        }
        logits
    }

    /// One descend, expand, backup round on every row.
    pub fn simulate(&mut self, engine: &Engine, tree: &mut Tree) {
        let shape = tree.shape();
        let descent = engine.descend(tree).unwrap();

        let mut leaves = Vec::with_capacity(shape.rows);
        let mut values = Vec::with_capacity(shape.rows * shape.values);
        for b in 0..shape.rows {
            let value: Vec<f32> = (0..shape.values)
                .map(|_| self.rng.random_range(-1.0..1.0))
                .collect();

            let leaf = if descent.needs_expansion(b) {
                let parent = descent.parents[b] as usize;
                let node = self.next_free[b];
                assert!(node < shape.nodes, "grew past capacity");
                self.next_free[b] += 1;

                let seat = (tree.row(b).seat(parent) + 1) % self.seats;
                let terminal = self.rng.random_bool(self.terminal_prob);
                let rewards: Vec<f32> = if terminal {
                    (0..shape.values)
                        .map(|_| self.rng.random_range(-1i32..=1) as f32)
                        .collect()
                } else {
                    vec![0.0; shape.values]
                };
                let logits = self.logits(shape.actions);
                tree.write_node(
                    b,
                    node,
                    NodeInit {
                        logits: &logits,
                        seat,
                        terminal,
                        rewards: &rewards,
                    },
                )
                .unwrap();
                tree.attach_child(b, parent, descent.actions[b] as usize, node)
                    .unwrap();
                node
            } else {
                descent.leaves[b] as usize
            };

            let row = tree.row(b);
            self.applied[b] += if row.is_terminal(leaf) {
                row.rewards_of(leaf)[0]
            } else {
                value[0]
            };
            self.leaf_hits[b][leaf] += 1;
            leaves.push(leaf as i32);
            values.extend(value);
        }

        engine.backup(tree, &leaves, &values).unwrap();
        self.simulations += 1;
    }

    /// Fill every row to capacity.
    pub fn run(&mut self, engine: &Engine, tree: &mut Tree) {
        for _ in 1..tree.shape().nodes {
            self.simulate(engine, tree);
        }
    }
}

/// Blank batch with `c_puct = 1.25`.
pub fn blank(rows: usize, nodes: usize, actions: usize, values: usize) -> Tree {
    Tree::new(TreeShape::new(rows, nodes, actions, values), 1.25).unwrap()
}
