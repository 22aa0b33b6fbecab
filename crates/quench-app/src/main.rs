use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use quench_app::{Command, Format};
use quench_core::{Execution, entropy_seed, seeded_rng};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "quench", version, about = "Quenched trap random walk simulations")]
struct Cli {
    /// Master seed; every run derives its own seed from it.
    #[arg(long, global = true, env = "QUENCH_SEED")]
    seed: Option<u64>,
    /// Worker threads for batch runs (0 picks the rayon default).
    #[arg(long, global = true, env = "QUENCH_THREADS", default_value_t = 0)]
    threads: usize,
    #[arg(long, global = true, env = "QUENCH_FORMAT", value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Evaluate runs on the calling thread only.
    #[arg(long, global = true)]
    sequential: bool,
    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("failed to configure worker pool")?;
    }

    let seed = cli.seed.unwrap_or_else(entropy_seed);
    let execution = if cli.sequential {
        Execution::Sequential
    } else {
        Execution::Parallel
    };
    let visualizer = cli.format.visualizer();
    info!(
        command = cli.command.name(),
        seed,
        threads = rayon::current_num_threads(),
        ?execution,
        visualizer = visualizer.name(),
        "Starting quench run"
    );

    let mut rng = seeded_rng(Some(seed));
    let outcome = cli
        .command
        .execute(execution, &mut rng)
        .with_context(|| format!("{} failed", cli.command.name()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    outcome.render(visualizer.as_ref(), &mut out)?;
    out.flush()?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
