//! Human-readable text output

use crate::config::Config;
use crate::coordinator::{RunReport, SerialBaseline, StrategyReport};
use crate::stats::histogram::DurationSummary;
use crate::util::time::{format_duration, format_rate};

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Print the resolved configuration before the run
pub fn print_configuration(config: &Config) {
    println!("Configuration:");
    println!("  Ranks:      {}", config.group.ranks);
    println!("  Collector:  {}", config.collector());
    println!("  Problem:    {}", config.run.problem);
    for strategy in config.strategies() {
        println!("  Strategy:   {} ({})", strategy, config.policy_for(strategy));
    }
    println!("  Trials:     {} per sampling rank", format_number(config.run.trials));
    println!("  Seed:       {}", config.run.seed);
    println!("  Rounds:     {}", config.run.rounds);
    if let Some(timeout) = config.stall_timeout() {
        println!("  Timeout:    {}", format_duration(timeout));
    }
}

/// Print run results
///
/// One block per strategy with the final estimate, the distributed time across
/// rounds and, if a baseline ran, speedup and efficiency.
pub fn print_results(report: &RunReport, config: &Config) {
    println!("{}", RULE);
    println!("                    RESULTS");
    println!("{}", RULE);
    println!();

    for strategy in &report.strategies {
        print_strategy(strategy);
        if config.output.per_rank {
            print_per_rank(strategy);
        }
    }

    if report.strategies.len() > 1 {
        print_comparison(&report.strategies);
    }

    println!("Elapsed Time: {}", format_duration(report.elapsed));
    println!("{}", RULE);
}

fn print_strategy(report: &StrategyReport) {
    let round = &report.last_round;
    let stats = &report.stats;

    println!(
        "Strategy: {} ({}, collector {}, {} of {} ranks sampling)",
        report.strategy, report.policy, report.collector, report.producers, report.ranks
    );
    println!(
        "  Aggregate:  value {} over {} trials from {} contributors",
        round.aggregate.total.value,
        format_number(round.aggregate.total.trials),
        round.aggregate.contributors
    );
    println!(
        "  Estimate:   {:.10} (reference {:.10})",
        round.estimate.value, round.estimate.reference
    );
    println!(
        "  Error:      {:.3e} absolute, {:.3e} relative",
        round.estimate.abs_error, round.estimate.rel_error
    );

    if stats.rounds() > 1 {
        if let (Some(mean), Some(stddev)) = (stats.estimate_mean(), stats.estimate_stddev()) {
            println!("  Rounds:     {} (estimate {:.10} ± {:.3e})", stats.rounds(), mean, stddev);
        }
    }

    println!("  Total distributed time: {}", format_duration(round.distributed_time));
    if let Some(summary) = stats.round_times().summary() {
        if summary.samples > 1 {
            print_summary("  Round time", &summary);
        }
    }
    println!("  Throughput: {} trials/s", format_rate(stats.trials_per_sec()));

    if let Some(baseline) = &report.baseline {
        print_baseline(baseline);
    }
    if let (Some(speedup), Some(efficiency)) = (report.speedup, report.efficiency()) {
        println!("  Speedup:    {:.2}x ({:.1}% efficiency)", speedup, efficiency * 100.0);
    }
    println!();
}

fn print_summary(label: &str, summary: &DurationSummary) {
    println!("{}:", label);
    println!("    Min:  {}", format_duration(summary.min));
    println!("    Mean: {}", format_duration(summary.mean));
    println!("    p50:  {}", format_duration(summary.p50));
    println!("    p99:  {}", format_duration(summary.p99));
    println!("    Max:  {}", format_duration(summary.max));
}

/// Print every rank's partial and timing for the last round
pub fn print_per_rank(report: &StrategyReport) {
    println!("  Per-rank (last round):");
    println!(
        "    {:>5}  {:<10}  {:>16}  {:>12}  {:>10}  {:>10}  {:>10}",
        "rank", "phase", "value", "trials", "compute", "exchange", "total"
    );
    for rank in &report.last_round.reports {
        let (value, trials) = match &rank.partial {
            Some(partial) => (partial.value.to_string(), format_number(partial.trials)),
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "    {:>5}  {:<10}  {:>16}  {:>12}  {:>10}  {:>10}  {:>10}",
            rank.rank,
            rank.phase.to_string(),
            value,
            trials,
            format_duration(rank.timing.compute),
            format_duration(rank.timing.exchange),
            format_duration(rank.timing.total)
        );
    }
    println!();
}

fn print_baseline(baseline: &SerialBaseline) {
    println!(
        "  Baseline:   {} trials on 1 rank in {} (estimate {:.10})",
        format_number(baseline.trials),
        format_duration(baseline.time),
        baseline.estimate.value
    );
}

fn print_comparison(strategies: &[StrategyReport]) {
    println!("Comparison:");
    println!("    {:<14}  {:>16}  {:>12}  {:>10}", "strategy", "estimate", "trials", "mean time");
    for report in strategies {
        let mean = report
            .stats
            .round_times()
            .mean()
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "    {:<14}  {:>16.10}  {:>12}  {:>10}",
            report.strategy.to_string(),
            report.last_round.estimate.value,
            format_number(report.last_round.aggregate.total.trials),
            mean
        );
    }
    println!();
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_000_000), "1,000,000");
    }
}
