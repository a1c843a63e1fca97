use std::time::{Duration, Instant};

use batched_mcts::{
    Engine, EngineStats, MctsError, NodeInit, Perspective, RootSummary, SearchConfig, Tree,
    TreeShape,
};
use clap::Parser;
use colored::Colorize;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Independent trees in the batch
    #[arg(long, default_value_t = 1024)]
    rows: usize,

    /// Node capacity of each tree; one simulation is run per free slot
    #[arg(long, default_value_t = 64)]
    nodes: usize,

    /// Actions per node
    #[arg(long, default_value_t = 9)]
    actions: usize,

    /// Number of seats taking turns
    #[arg(long, default_value_t = 2)]
    seats: usize,

    /// Exploration strength for every tree
    #[arg(long, default_value_t = 1.5)]
    c_puct: f32,

    /// Worker threads (0 = rayon default)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Minimum rows handed to one rayon task
    #[arg(long, default_value_t = 16)]
    min_rows_per_task: usize,

    /// Chance that a newly expanded node is terminal
    #[arg(long, default_value_t = 0.1)]
    terminal_prob: f64,

    /// Seed for the synthetic evaluator
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Keep one value column per seat instead of negating a scalar
    #[arg(long, default_value_t = false, action = clap::ArgAction::SetTrue)]
    per_seat: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Random evaluator standing in for a network and a game.
struct Synthetic {
    rng: Xoshiro256PlusPlus,
    actions: usize,
    seats: usize,
    values: usize,
    terminal_prob: f64,
}

impl Synthetic {
    /// Random logits with roughly one action in ten masked, never all of them.
    fn logits(&mut self) -> Vec<f32> {
        let mut logits: Vec<f32> = (0..self.actions)
            .map(|_| {
                if self.rng.random_bool(0.1) {
                    f32::NEG_INFINITY
                } else {
                    self.rng.random_range(-2.0..2.0)
                }
            })
            .collect();
        if logits.iter().all(|x| !x.is_finite()) {
            logits[0] = 0.0;
        }
        logits
    }

    fn value(&mut self) -> Vec<f32> {
        (0..self.values).map(|_| self.rng.random_range(-1.0..1.0)).collect()
    }

    fn outcome(&mut self) -> Vec<f32> {
        (0..self.values)
            .map(|_| self.rng.random_range(-1i32..=1) as f32)
            .collect()
    }
}

struct Timings {
    descend: Duration,
    backup: Duration,
    simulations: usize,
    terminal_hits: usize,
}

fn main() -> Result<(), MctsError> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let (perspective, values) = if args.per_seat {
        (Perspective::PerSeat, args.seats)
    } else {
        (Perspective::Alternating, 1)
    };

    println!("{}", "Batched MCTS - Benchmark Tool".bold());
    println!("=============================");
    println!("Rows: {}", args.rows);
    println!("Nodes per row: {}", args.nodes);
    println!("Actions: {}", args.actions);
    println!("Seats: {} ({})", args.seats, perspective.name());
    println!("c_puct: {}", args.c_puct);
    println!("Seed: {}", args.seed);
    println!("-----------------------------");

    #[cfg(debug_assertions)]
    println!(
        "{}",
        "WARNING: Running in debug mode. Performance will be significantly lower.\nUse --release for accurate benchmarks.\n"
            .yellow()
    );

    let config = SearchConfig::default()
        .with_perspective(perspective)
        .with_threads(args.threads)
        .with_min_rows_per_task(args.min_rows_per_task);
    let engine = Engine::new(config)?;

    let shape = TreeShape::new(args.rows, args.nodes, args.actions, values);
    let mut tree = Tree::new(shape, args.c_puct)?;
    let mut eval = Synthetic {
        rng: Xoshiro256PlusPlus::seed_from_u64(args.seed),
        actions: args.actions,
        seats: args.seats.max(1),
        values,
        terminal_prob: args.terminal_prob.clamp(0.0, 1.0),
    };

    let timings = run(&engine, &mut tree, &mut eval)?;
    print_timings(&timings, args.rows, &engine.stats());

    let summaries = engine.root_summaries(&tree)?;
    if let Some(summary) = summaries.first() {
        print_summary(summary);
    }
    Ok(())
}

fn run(engine: &Engine, tree: &mut Tree, eval: &mut Synthetic) -> Result<Timings, MctsError> {
    let shape = tree.shape();
    let zeros = vec![0.0; shape.values];
    for b in 0..shape.rows {
        let logits = eval.logits();
        tree.write_node(
            b,
            0,
            NodeInit {
                logits: &logits,
                seat: 0,
                terminal: false,
                rewards: &zeros,
            },
        )?;
    }

    let mut next_free = vec![1usize; shape.rows];
    let mut timings = Timings {
        descend: Duration::ZERO,
        backup: Duration::ZERO,
        simulations: 0,
        terminal_hits: 0,
    };

    for _ in 1..shape.nodes {
        let start = Instant::now();
        let descent = engine.descend(tree)?;
        timings.descend += start.elapsed();

        let mut leaves = Vec::with_capacity(shape.rows);
        let mut values = Vec::with_capacity(shape.rows * shape.values);
        for b in 0..shape.rows {
            if !descent.needs_expansion(b) {
                timings.terminal_hits += 1;
                leaves.push(descent.leaves[b]);
                values.extend_from_slice(&zeros);
                continue;
            }

            let parent = descent.parents[b] as usize;
            let node = next_free[b];
            next_free[b] += 1;

            let seat = (tree.row(b).seat(parent) + 1) % eval.seats as i32;
            let terminal = eval.rng.random_bool(eval.terminal_prob);
            let logits = eval.logits();
            let rewards = if terminal { eval.outcome() } else { zeros.clone() };
            tree.write_node(
                b,
                node,
                NodeInit {
                    logits: &logits,
                    seat,
                    terminal,
                    rewards: &rewards,
                },
            )?;
            tree.attach_child(b, parent, descent.actions[b] as usize, node)?;

            leaves.push(node as i32);
            values.extend(eval.value());
        }

        let start = Instant::now();
        engine.backup(tree, &leaves, &values)?;
        timings.backup += start.elapsed();
        timings.simulations += 1;
    }

    Ok(timings)
}

fn print_timings(timings: &Timings, rows: usize, stats: &EngineStats) {
    let row_sims = (timings.simulations * rows).max(1) as f64;
    let descend_ns = timings.descend.as_nanos() as f64 / row_sims;
    let backup_ns = timings.backup.as_nanos() as f64 / row_sims;

    println!("\n{}", "Results:".bold());
    println!("  Simulations: {} x {} rows", timings.simulations, rows);
    println!("  Terminal hits: {}", timings.terminal_hits);
    println!("  Descend: {} ns/row", format!("{:.1}", descend_ns).green());
    println!("  Backup: {} ns/row", format!("{:.1}", backup_ns).green());
    println!(
        "  Engine: {} calls, {} rows, avg {:.1} us/call",
        stats.calls,
        stats.rows,
        stats.avg_time_us()
    );
}

fn print_summary(summary: &RootSummary) {
    println!("\n{}", "Row 0 root:".bold());
    println!("  Value: {:.3}", summary.value);
    if summary.values.len() > 1 {
        println!("  Per seat: {:.3?}", summary.values);
    }
    for (a, (n, q)) in summary.visits.iter().zip(&summary.q).enumerate() {
        if *n > 0 {
            println!("  action {:>3}: n = {:>5}  q = {:+.3}", a, n, q);
        }
    }
}
