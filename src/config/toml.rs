//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::{convert_policy, convert_problem, convert_strategy, parse_count, parse_duration};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with a configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Group
    if let Some(ranks) = cli.ranks {
        config.group.ranks = ranks;
    }
    if let Some(collector) = cli.collector {
        config.group.collector = Some(collector);
    }
    if let Some(ref timeout) = cli.stall_timeout {
        let timeout = parse_duration(timeout).context("Invalid stall timeout")?;
        // Sub-millisecond timeouts round up to 1ms
        let millis = u64::try_from(timeout.as_nanos().div_ceil(1_000_000))
            .context("Stall timeout out of range")?;
        config.group.stall_timeout_ms = Some(millis);
    }

    // Run
    if let Some(strategy) = cli.strategy {
        config.run.strategy = convert_strategy(strategy);
    }
    if let Some(problem) = cli.problem {
        config.run.problem = convert_problem(problem);
    }
    if let Some(ref trials) = cli.trials {
        config.run.trials = parse_count(trials).context("Invalid trial count")?;
    }
    if let Some(seed) = cli.seed {
        config.run.seed = seed;
    }
    if let Some(policy) = convert_policy(cli.include_collector, cli.exclude_collector) {
        config.run.policy = Some(policy);
    }
    if let Some(rounds) = cli.rounds {
        config.run.rounds = rounds;
    }
    if cli.compare {
        config.run.compare = true;
    }
    if cli.serial_baseline {
        config.run.serial_baseline = true;
    }
    if cli.no_greeting {
        config.run.greet = false;
    }

    // Output
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.per_rank {
        config.output.per_rank = true;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [group]
        ranks = 4
        collector = 3
        stall_timeout_ms = 5000

        [run]
        strategy = "non-blocking"
        problem = "pi"
        trials = 1000
        policy = "exclude-collector"
        rounds = 3

        [output]
        per_rank = true
    "#;

    #[test]
    fn test_parse_full_file() {
        let config = parse_toml_string(SAMPLE).unwrap();

        assert_eq!(config.group.ranks, 4);
        assert_eq!(config.collector(), 3);
        assert_eq!(config.stall_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.run.strategy, Strategy::NonBlocking);
        assert_eq!(config.run.trials, 1000);
        assert_eq!(config.run.policy, Some(ContributionPolicy::ExcludeCollector));
        assert_eq!(config.run.rounds, 3);
        assert_eq!(config.run.seed, DEFAULT_SEED);
        assert!(config.output.per_rank);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = parse_toml_string("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = parse_toml_string("[run]\nstrategy = \"gossip\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.group.ranks, 4);
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = parse_toml_file(Path::new("/nonexistent/distmc.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = parse_toml_string(SAMPLE).unwrap();
        let cli = Cli::try_parse_from([
            "distmc",
            "--strategy",
            "reduction",
            "-t",
            "2k",
            "--include-collector",
            "--stall-timeout",
            "250ms",
            "--no-greeting",
        ])
        .unwrap();

        let merged = merge_cli_with_config(&cli, config).unwrap();

        assert_eq!(merged.run.strategy, Strategy::Reduction);
        assert_eq!(merged.run.trials, 2000);
        assert_eq!(merged.run.policy, Some(ContributionPolicy::IncludeCollector));
        assert_eq!(merged.group.stall_timeout_ms, Some(250));
        assert!(!merged.run.greet);
        // Untouched by the CLI
        assert_eq!(merged.group.ranks, 4);
        assert_eq!(merged.run.rounds, 3);
    }

    #[test]
    fn test_sub_millisecond_timeout_rounds_up() {
        let cli = Cli::try_parse_from(["distmc", "--stall-timeout", "500us"]).unwrap();
        let merged = merge_cli_with_config(&cli, Config::default()).unwrap();
        assert_eq!(merged.group.stall_timeout_ms, Some(1));

        let cli = Cli::try_parse_from(["distmc", "--stall-timeout", "1500us"]).unwrap();
        let merged = merge_cli_with_config(&cli, Config::default()).unwrap();
        assert_eq!(merged.group.stall_timeout_ms, Some(2));
    }

    #[test]
    fn test_invalid_cli_trials() {
        let cli = Cli::try_parse_from(["distmc", "-t", "lots"]).unwrap();
        assert!(merge_cli_with_config(&cli, Config::default()).is_err());
    }
}
