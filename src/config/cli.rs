//! CLI argument parsing using clap

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// distmc - distributed Monte Carlo estimation
#[derive(Parser, Debug)]
#[command(name = "distmc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    // === Group Options ===
    /// Number of ranks (default: number of CPUs)
    #[arg(short = 'n', long, env = "DISTMC_RANKS")]
    pub ranks: Option<usize>,

    /// Collector rank (default: 0 for pi, last rank for integral)
    #[arg(long)]
    pub collector: Option<usize>,

    /// Abort a round that has not finished in time (e.g., 500ms, 5s, 2m)
    #[arg(long)]
    pub stall_timeout: Option<String>,

    // === Run Options ===
    /// Aggregation strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Problem to estimate
    #[arg(long, value_enum)]
    pub problem: Option<ProblemArg>,

    /// Trials per sampling rank (e.g., 1000, 10k, 1M)
    #[arg(short = 't', long)]
    pub trials: Option<String>,

    /// Global seed; rank seeds are seed + rank
    #[arg(long)]
    pub seed: Option<u64>,

    /// Collector samples too
    #[arg(long, conflicts_with = "exclude_collector")]
    pub include_collector: bool,

    /// Collector only aggregates
    #[arg(long)]
    pub exclude_collector: bool,

    /// Number of rounds
    #[arg(long)]
    pub rounds: Option<usize>,

    /// Run every strategy under the same configuration
    #[arg(long)]
    pub compare: bool,

    /// Also run the computation on a single rank and report speedup
    #[arg(long)]
    pub serial_baseline: bool,

    /// Skip the per-rank alive greeting and startup barrier
    #[arg(long)]
    pub no_greeting: bool,

    // === Output Options ===
    /// Write a JSON report to this path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Print per-rank partials and timings
    #[arg(long)]
    pub per_rank: bool,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Aggregation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Blocking point-to-point
    Blocking,
    /// Non-blocking point-to-point
    NonBlocking,
    /// Collective reduction
    Reduction,
}

/// Bundled problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProblemArg {
    /// π by quarter-circle sampling
    Pi,
    /// ∫ cos(x) over [-1, 1] by the midpoint rule
    Integral,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ranks == Some(0) {
            anyhow::bail!("ranks must be at least 1");
        }

        if self.rounds == Some(0) {
            anyhow::bail!("rounds must be at least 1");
        }

        if let (Some(collector), Some(ranks)) = (self.collector, self.ranks) {
            if collector >= ranks {
                anyhow::bail!("collector {} is not a rank of a {}-rank group", collector, ranks);
            }
        }

        Ok(())
    }

    /// Default log filter for the verbosity flag
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
