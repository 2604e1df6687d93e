mod commands;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "curve-market", about = "Bonding-curve market CLI")]
struct Cli {
    /// Log debug events (router phases, individual trades)
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote buying and selling an amount at a given supply
    Quote {
        /// Market config TOML (defaults to the reference market)
        #[arg(long)]
        config: Option<String>,
        /// Current supply, in whole tokens
        #[arg(long, default_value = "0")]
        supply: String,
        /// Amount to trade, in whole tokens
        #[arg(long)]
        amount: String,
    },
    /// Validate a market config (parameters, monotone and convex cost)
    Validate {
        /// Market config TOML
        #[arg(long)]
        config: Option<String>,
        /// Largest supply to sample, in whole tokens
        #[arg(long, default_value = "1000000")]
        max_supply: String,
    },
    /// Run simulation batch
    Simulate {
        /// Simulation config TOML (market section included)
        #[arg(long)]
        config: Option<String>,
        /// Number of simulations
        #[arg(long, default_value = "100")]
        simulations: u32,
        /// Number of steps per simulation
        #[arg(long, default_value = "2000")]
        steps: u32,
        /// Number of parallel workers (0 = auto)
        #[arg(long, default_value = "0")]
        workers: usize,
        /// Starting seed for simulation config generation
        #[arg(long, default_value = "0")]
        seed_start: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Quote { config, supply, amount } => commands::quote::run(config.as_deref(), &supply, &amount),
        Commands::Validate { config, max_supply } => commands::validate::run(config.as_deref(), &max_supply),
        Commands::Simulate {
            config,
            simulations,
            steps,
            workers,
            seed_start,
        } => commands::simulate::run(config.as_deref(), simulations, steps, workers, seed_start),
    }
}
