use batched_mcts::{Engine, NodeInit, Perspective, SearchConfig, Tree, TreeShape, UNEXPANDED};

/// Root (seat 0) -> 1 -> 2 -> 3 (terminal), always through action 0, with two
/// actions per node and uniform priors.
fn depth_three(seats: [i32; 3], values: usize, reward: &[f32]) -> Tree {
    let mut tree = Tree::new(TreeShape::new(1, 4, 2, values), 1.0).unwrap();
    let zeros = vec![0.0; values];
    for (node, &seat) in seats.iter().enumerate() {
        tree.write_node(
            0,
            node,
            NodeInit {
                logits: &[0.0, 0.0],
                seat,
                terminal: false,
                rewards: &zeros,
            },
        )
        .unwrap();
    }
    tree.write_node(
        0,
        3,
        NodeInit {
            logits: &[f32::NAN, f32::NAN],
            seat: (seats[2] + 1) % 2,
            terminal: true,
            rewards: reward,
        },
    )
    .unwrap();
    for node in 1..4 {
        tree.attach_child(0, node - 1, 0, node).unwrap();
    }
    tree
}

#[test]
fn test_first_descent_reaches_terminal_through_action_zero() {
    let tree = depth_three([0, 1, 0], 1, &[1.0]);
    let engine = Engine::new(SearchConfig::for_testing()).unwrap();

    let d = engine.descend(&tree).unwrap();
    assert_eq!(d.parents, vec![2]);
    assert_eq!(d.actions, vec![0]);
    assert_eq!(d.leaves, vec![3]);
    assert!(!d.needs_expansion(0));
}

#[test]
fn test_terminal_reward_reaches_root_with_matching_seat() {
    let mut tree = depth_three([0, 1, 0], 1, &[1.0]);
    let engine = Engine::new(SearchConfig::for_testing()).unwrap();

    let d = engine.descend(&tree).unwrap();
    engine.backup(&mut tree, &d.leaves, &[0.0]).unwrap();

    assert_eq!(tree.n, vec![0, 1, 1, 1]);
    assert_eq!(tree.w, vec![0.0, 1.0, -1.0, 1.0]);
    let root = &engine.root_summaries(&tree).unwrap()[0];
    assert_eq!(root.visits, vec![1, 0]);
    assert_eq!(root.q, vec![1.0, 0.0]);
}

#[test]
fn test_terminal_reward_is_negated_for_other_seat() {
    // The seat moving into the terminal node (node 2) differs from the root's.
    let mut tree = depth_three([0, 1, 1], 1, &[1.0]);
    let engine = Engine::new(SearchConfig::for_testing()).unwrap();

    let d = engine.descend(&tree).unwrap();
    engine.backup(&mut tree, &d.leaves, &[0.0]).unwrap();

    assert_eq!(tree.n, vec![0, 1, 1, 1]);
    assert_eq!(tree.w, vec![0.0, -1.0, 1.0, 1.0]);
}

#[test]
fn test_second_descent_explores_the_other_root_action() {
    let mut tree = depth_three([0, 1, 0], 1, &[1.0]);
    let engine = Engine::new(SearchConfig::for_testing()).unwrap();

    let d = engine.descend(&tree).unwrap();
    engine.backup(&mut tree, &d.leaves, &[0.0]).unwrap();

    // At the root 1 + 0.5 / 2 beats 0 + 0.5 / 1, so the won line is followed.
    // Seat 1 lost on that line and tries its other action instead.
    let d = engine.descend(&tree).unwrap();
    assert_eq!((d.parents[0], d.actions[0], d.leaves[0]), (1, 1, UNEXPANDED));

    // A losing terminal instead pushes the root towards the unexpanded action.
    let mut tree = depth_three([0, 1, 0], 1, &[-1.0]);
    let d = engine.descend(&tree).unwrap();
    engine.backup(&mut tree, &d.leaves, &[0.0]).unwrap();
    let d = engine.descend(&tree).unwrap();
    assert_eq!((d.parents[0], d.actions[0], d.leaves[0]), (0, 1, UNEXPANDED));
}

#[test]
fn test_per_seat_scenario_keeps_reward_vector() {
    let mut tree = depth_three([0, 1, 0], 2, &[1.0, -1.0]);
    let engine = Engine::new(SearchConfig::for_testing().with_perspective(Perspective::PerSeat)).unwrap();

    let d = engine.descend(&tree).unwrap();
    assert_eq!(d.leaves, vec![3]);
    engine.backup(&mut tree, &d.leaves, &[0.0, 0.0]).unwrap();

    assert_eq!(&tree.w[2..], &[1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
    let root = &engine.root_summaries(&tree).unwrap()[0];
    assert_eq!(root.q, vec![1.0, 0.0]);
    assert_eq!(root.value, 1.0);
    assert_eq!(root.values, vec![1.0, -1.0]);
}
