use anyhow::{Context, Result, bail};
use clap::Parser;
use portfolio_frontier::config::{self, EngineConfig};
use portfolio_frontier::metrics::compute_metrics_with;
use portfolio_frontier::report::{self, RunReport};
use portfolio_frontier::synthetic::SyntheticMarket;
use portfolio_frontier::{EfficientFrontierSampler, RandomSearchOptimizer};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Portfolio risk/return metrics, random-search Sharpe optimization and efficient frontier sampling",
    after_help = "EXAMPLES:
    # Five synthetic assets, one year of history
    cargo run --release -- --assets 5 --days 252

    # Reproducible run with a larger search budget
    cargo run --release -- --seed 7 --iterations 50000

    # Machine-readable output
    cargo run --release -- --json"
)]
struct Args {
    /// Number of synthetic assets in the demo universe (2-8)
    #[arg(long, default_value_t = 5)]
    assets: usize,

    /// Days of synthetic price history
    #[arg(long, default_value_t = 252)]
    days: usize,

    /// Seed for both the synthetic data and the search (default: PORTFOLIO_SEED or random)
    #[arg(long)]
    seed: Option<u64>,

    /// Random samples for the maximum-Sharpe search (default: PORTFOLIO_ITERATIONS or 10000)
    #[arg(long)]
    iterations: Option<usize>,

    /// Target returns on the frontier grid (default: PORTFOLIO_FRONTIER_POINTS or 50)
    #[arg(long)]
    frontier_points: Option<usize>,

    /// Random samples per frontier point (default: PORTFOLIO_FRONTIER_ITERATIONS or 1000)
    #[arg(long)]
    frontier_iterations: Option<usize>,

    /// Wall-clock budget per search in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Print a JSON report instead of tables
    #[arg(long)]
    json: bool,
}

fn main() {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portfolio_frontier=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    config::init_cpu_parallelism();

    if let Err(e) = run(Args::parse()) {
        error!("Portfolio run failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if !(2..=8).contains(&args.assets) {
        bail!("--assets must be between 2 and 8, got {}", args.assets);
    }

    let mut cfg = EngineConfig::from_env();
    if let Some(seed) = args.seed {
        cfg.seed = Some(seed);
    }
    if let Some(n) = args.iterations {
        cfg.optimizer_iterations = n;
    }
    if let Some(n) = args.frontier_points {
        cfg.frontier_points = n;
    }
    if let Some(n) = args.frontier_iterations {
        cfg.frontier_iterations = n;
    }
    if let Some(ms) = args.deadline_ms {
        cfg.deadline = Some(Duration::from_millis(ms));
    }

    let data_seed = cfg.seed.unwrap_or_else(rand::random);
    info!(
        "=== Portfolio Frontier ===\n  Assets: {}\n  Days: {}\n  Data seed: {}",
        args.assets, args.days, data_seed
    );

    let (assets, market) = SyntheticMarket::new(args.days, data_seed)
        .generate(&SyntheticMarket::demo_universe(args.assets))
        .context("generating synthetic price history")?;

    let equal = vec![1.0; assets.len()];
    let equal_weight = compute_metrics_with(&assets, &equal, &market, &cfg)
        .context("computing equal-weight metrics")?;

    let optimized = RandomSearchOptimizer::new(cfg.clone())
        .optimize_against(&assets, &market, cfg.optimizer_iterations)
        .context("optimizing for maximum Sharpe ratio")?;

    let frontier = EfficientFrontierSampler::new(cfg.clone())
        .generate_frontier(&assets, cfg.frontier_points, cfg.frontier_iterations)
        .context("sampling efficient frontier")?;

    if args.json {
        let report = RunReport {
            symbols: assets.iter().map(|a| a.symbol.as_str()).collect(),
            equal_weight: &equal_weight,
            optimized: &optimized,
            frontier: &frontier,
        };
        println!("{}", report::to_json(&report)?);
    } else {
        report::print_metrics("Equal-Weight Portfolio", &assets, &equal_weight);
        report::print_metrics("Maximum-Sharpe Portfolio (random search)", &assets, &optimized);
        report::print_frontier(&frontier);
    }

    Ok(())
}
