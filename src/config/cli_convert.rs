//! CLI to Config conversion utilities

use crate::aggregation::{ContributionPolicy, Strategy};
use crate::config::cli;
use crate::sampler::Problem;
use anyhow::{Context, Result};
use std::time::Duration;

/// Parse a count string (e.g., "1000", "10k", "1M", "2G") with decimal multipliers
pub fn parse_count(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix('k') {
        (num, 1_000u64)
    } else if let Some(num) = s.strip_suffix('m') {
        (num, 1_000_000)
    } else if let Some(num) = s.strip_suffix('g') {
        (num, 1_000_000_000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .replace('_', "")
        .parse()
        .with_context(|| format!("Invalid count format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Count out of range: {}", s))
}

/// Parse a duration string (e.g., "500ms", "5s", "2m", "250us")
///
/// A bare number is taken as milliseconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, to_duration): (&str, fn(u64) -> Option<Duration>) =
        if let Some(num) = s.strip_suffix("us") {
            (num, |n| Some(Duration::from_micros(n)))
        } else if let Some(num) = s.strip_suffix("ms") {
            (num, |n| Some(Duration::from_millis(n)))
        } else if let Some(num) = s.strip_suffix("min") {
            (num, |m| m.checked_mul(60).map(Duration::from_secs))
        } else if let Some(num) = s.strip_suffix('m') {
            (num, |m| m.checked_mul(60).map(Duration::from_secs))
        } else if let Some(num) = s.strip_suffix('s') {
            (num, |n| Some(Duration::from_secs(n)))
        } else {
            (s.as_str(), |n| Some(Duration::from_millis(n)))
        };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    to_duration(num).with_context(|| format!("Duration out of range: {}", s))
}

/// Convert CLI StrategyArg to Strategy
pub fn convert_strategy(arg: cli::StrategyArg) -> Strategy {
    match arg {
        cli::StrategyArg::Blocking => Strategy::Blocking,
        cli::StrategyArg::NonBlocking => Strategy::NonBlocking,
        cli::StrategyArg::Reduction => Strategy::Reduction,
    }
}

/// Convert CLI ProblemArg to Problem
pub fn convert_problem(arg: cli::ProblemArg) -> Problem {
    match arg {
        cli::ProblemArg::Pi => Problem::Pi,
        cli::ProblemArg::Integral => Problem::Integral,
    }
}

/// Convert the include/exclude flags to a policy, if either was given
pub fn convert_policy(include_collector: bool, exclude_collector: bool) -> Option<ContributionPolicy> {
    match (include_collector, exclude_collector) {
        (true, _) => Some(ContributionPolicy::IncludeCollector),
        (false, true) => Some(ContributionPolicy::ExcludeCollector),
        (false, false) => None,
    }
}
