//! Price-and-cut driver for multi-commodity flow instances.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use solver_decomp::mcf::{Commodity, McfArc, McfInstance};
use solver_decomp::{solve_node, ClarabelLpSolver, DecompSettings, OracleSet, SolverContext};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum InstanceChoice {
    /// Six-node, four-commodity instance
    Small,
    /// Random grid network
    Grid,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one node of price-and-cut on a multi-commodity flow instance")]
struct Cli {
    /// Instance to solve
    #[arg(long, value_enum, default_value = "small")]
    instance: InstanceChoice,

    /// Grid side length (grid instances)
    #[arg(long, default_value_t = 6)]
    side: usize,

    /// Number of commodities (grid instances)
    #[arg(long, default_value_t = 8)]
    commodities: usize,

    /// Random seed (grid instances)
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Disable dual smoothing
    #[arg(long)]
    no_stab: bool,

    /// Smoothing weight of the stability center
    #[arg(long)]
    alpha: Option<f64>,

    /// Pricing time budget per round, in milliseconds
    #[arg(long)]
    budget_ms: Option<u64>,

    /// Inactive rounds before a column is compressed out
    #[arg(long)]
    compression: Option<usize>,

    /// Maximum pricing rounds
    #[arg(long)]
    max_rounds: Option<usize>,

    /// Price blocks in parallel (needs the `parallel` feature)
    #[arg(long)]
    parallel: bool,

    /// Log every round
    #[arg(long, short)]
    verbose: bool,
}

/// Grid network with arcs in both directions between neighbours.
///
/// Weights are drawn from [1, 10]; capacities leave room for roughly half of
/// the commodities on any arc.
fn generate_grid_mcf(side: usize, num_commodities: usize, seed: u64) -> McfInstance {
    let mut rng_state = seed;
    let mut rand = || -> f64 {
        rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((rng_state >> 33) as f64) / (u32::MAX as f64)
    };

    let node = |r: usize, c: usize| r * side + c;
    let capacity = (num_commodities / 2).max(1) as f64;
    let mut arcs = Vec::new();
    for r in 0..side {
        for c in 0..side {
            let mut neighbours = Vec::new();
            if c + 1 < side {
                neighbours.push(node(r, c + 1));
            }
            if r + 1 < side {
                neighbours.push(node(r + 1, c));
            }
            for other in neighbours {
                for (tail, head) in [(node(r, c), other), (other, node(r, c))] {
                    arcs.push(McfArc {
                        tail,
                        head,
                        weight: (1.0 + 9.0 * rand()).round(),
                        capacity,
                    });
                }
            }
        }
    }

    let num_nodes = side * side;
    let mut commodities = Vec::with_capacity(num_commodities);
    while commodities.len() < num_commodities {
        let source = ((rand() * num_nodes as f64) as usize).min(num_nodes - 1);
        let sink = ((rand() * num_nodes as f64) as usize).min(num_nodes - 1);
        if source != sink {
            commodities.push(Commodity {
                source,
                sink,
                demand: 1.0,
            });
        }
    }

    McfInstance {
        num_nodes,
        arcs,
        commodities,
    }
}

fn settings_from(cli: &Cli) -> Result<DecompSettings> {
    let mut settings = DecompSettings::from_env().context("reading DECOMP_* environment")?;
    if cli.verbose {
        settings.verbose = true;
        settings.log_freq = 1;
    }
    settings.dual_stab = !cli.no_stab;
    settings.parallel_pricing = cli.parallel;
    if let Some(alpha) = cli.alpha {
        settings.dual_stab_alpha = alpha;
    }
    if let Some(ms) = cli.budget_ms {
        settings.pricing_time_budget = Some(Duration::from_millis(ms));
    }
    if let Some(rounds) = cli.compression {
        settings.column_compression_threshold = rounds;
    }
    if let Some(rounds) = cli.max_rounds {
        settings.max_pricing_rounds = rounds;
    }
    settings.validate()?;
    Ok(settings)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let instance = match cli.instance {
        InstanceChoice::Small => McfInstance::small(),
        InstanceChoice::Grid => {
            anyhow::ensure!(cli.side >= 2, "grid side must be at least 2");
            generate_grid_mcf(cli.side, cli.commodities, cli.seed)
        }
    };
    let settings = settings_from(&cli)?;
    let models = instance.build().context("building MCF models")?;

    println!("{}", "=".repeat(60));
    println!("MCF {:?}", cli.instance);
    println!("{}", "=".repeat(60));
    println!("Nodes:            {}", instance.num_nodes);
    println!("Arcs:             {}", instance.arcs.len());
    println!("Commodities:      {}", instance.commodities.len());
    println!("Variables (n):    {}", models.master.num_vars());
    println!("Master rows (m):  {}", models.master.num_rows());
    println!();

    let oracles = OracleSet::shared(Box::new(models.oracle.clone()));
    let mut ctx = SolverContext::new(settings, Box::new(ClarabelLpSolver::default()), oracles)?;

    let start = Instant::now();
    let node = solve_node(&mut ctx, &models.master, &models.blocks, Vec::new())
        .context("node solve failed")?;
    let elapsed = start.elapsed();

    let stats = &node.stats;
    println!("Status:           {:?}", node.status);
    println!("Objective:        {:.6e}", node.objective);
    println!("Bound:            {:.6e}", node.bound);
    println!("Gap:              {:.3e}", node.gap());
    println!("Integral:         {}", node.integral);
    println!("Pricing calls:    {}", stats.price_calls_total);
    println!("Master solves:    {}", stats.master_solves);
    println!(
        "Columns:          {} generated, {} compressed, {} final",
        stats.columns_generated,
        stats.columns_compressed,
        node.columns.len()
    );
    println!("Mispricings:      {}", stats.mispricings);
    println!("Oracle timeouts:  {}", stats.oracle_timeouts);
    println!("Solve time:       {:.3} ms", elapsed.as_secs_f64() * 1000.0);

    Ok(())
}
