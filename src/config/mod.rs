//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! # TOML layout
//!
//! ```toml
//! [group]
//! ranks = 4
//! collector = 3
//! stall_timeout_ms = 5000
//!
//! [run]
//! strategy = "non-blocking"
//! problem = "pi"
//! trials = 1000000
//! policy = "include-collector"
//! rounds = 5
//!
//! [output]
//! json_output = "results/run.json"
//! per_rank = true
//! ```
//!
//! Every section and key is optional. CLI flags override file values.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::aggregation::{ContributionPolicy, Strategy};
use crate::distributed::Rank;
use crate::sampler::{Problem, DEFAULT_SEED};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Shape of the rank group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Number of ranks
    #[serde(default = "default_ranks")]
    pub ranks: usize,
    /// Collector rank; problem default if unset
    pub collector: Option<Rank>,
    /// Supervisor deadline per round, in milliseconds
    pub stall_timeout_ms: Option<u64>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            ranks: default_ranks(),
            collector: None,
            stall_timeout_ms: None,
        }
    }
}

fn default_ranks() -> usize {
    num_cpus::get()
}

/// What to compute and how to aggregate it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub problem: Problem,
    /// Trials (or cells) per sampling rank
    #[serde(default = "default_trials")]
    pub trials: u64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Contribution policy; strategy/problem default if unset
    pub policy: Option<ContributionPolicy>,
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// Run every strategy under the same configuration
    #[serde(default)]
    pub compare: bool,
    /// Also run the computation on a single rank
    #[serde(default)]
    pub serial_baseline: bool,
    /// Log the per-rank "alive" line and meet at a barrier first
    #[serde(default = "default_greet")]
    pub greet: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            problem: Problem::default(),
            trials: default_trials(),
            seed: default_seed(),
            policy: None,
            rounds: default_rounds(),
            compare: false,
            serial_baseline: false,
            greet: default_greet(),
        }
    }
}

fn default_trials() -> u64 {
    1_000_000
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_rounds() -> usize {
    1
}

fn default_greet() -> bool {
    true
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write a JSON report here
    pub json_output: Option<PathBuf>,
    /// Print every rank's partial and timing
    #[serde(default)]
    pub per_rank: bool,
}

impl Config {
    /// Collector rank, falling back to the problem's default
    pub fn collector(&self) -> Rank {
        self.group
            .collector
            .unwrap_or_else(|| self.run.problem.default_collector(self.group.ranks))
    }

    /// Contribution policy for `strategy`
    ///
    /// An explicit policy wins. Otherwise the integral includes its collector (every
    /// rank owns a slice of the domain) and π follows the strategy default.
    pub fn policy_for(&self, strategy: Strategy) -> ContributionPolicy {
        self.run.policy.unwrap_or(match self.run.problem {
            Problem::Integral => ContributionPolicy::IncludeCollector,
            Problem::Pi => strategy.default_policy(),
        })
    }

    /// Strategies to run, in order
    pub fn strategies(&self) -> Vec<Strategy> {
        if self.run.compare {
            Strategy::ALL.to_vec()
        } else {
            vec![self.run.strategy]
        }
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.group.stall_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.group.ranks >= 1);
        assert_eq!(config.run.trials, 1_000_000);
        assert_eq!(config.run.seed, 35791246);
        assert_eq!(config.run.rounds, 1);
        assert_eq!(config.run.strategy, Strategy::Blocking);
        assert!(config.run.greet);
        assert!(config.stall_timeout().is_none());
    }

    #[test]
    fn test_collector_fallback() {
        let mut config = Config::default();
        config.group.ranks = 6;
        assert_eq!(config.collector(), 0);

        config.run.problem = Problem::Integral;
        assert_eq!(config.collector(), 5);

        config.group.collector = Some(2);
        assert_eq!(config.collector(), 2);
    }

    #[test]
    fn test_policy_resolution() {
        let mut config = Config::default();
        assert_eq!(config.policy_for(Strategy::Blocking), ContributionPolicy::ExcludeCollector);
        assert_eq!(config.policy_for(Strategy::Reduction), ContributionPolicy::IncludeCollector);

        config.run.problem = Problem::Integral;
        assert_eq!(config.policy_for(Strategy::NonBlocking), ContributionPolicy::IncludeCollector);

        config.run.policy = Some(ContributionPolicy::ExcludeCollector);
        assert_eq!(config.policy_for(Strategy::Reduction), ContributionPolicy::ExcludeCollector);
    }

    #[test]
    fn test_compare_runs_all_strategies() {
        let mut config = Config::default();
        config.run.strategy = Strategy::Reduction;
        assert_eq!(config.strategies(), vec![Strategy::Reduction]);

        config.run.compare = true;
        assert_eq!(config.strategies(), Strategy::ALL.to_vec());
    }
}
