//! JSON output formatting
//!
//! A run is written as one document:
//! - Run info (tool version, timestamp, hostname) and the resolved configuration
//! - One entry per strategy with its aggregate, estimate and statistics across rounds
//! - Per-rank detail for the last round (optional)
//! - Serial baseline per strategy (if enabled)

use crate::aggregation::{AggregateResult, ContributionPolicy, Strategy};
use crate::config::Config;
use crate::coordinator::{RunReport, SerialBaseline, StrategyReport};
use crate::distributed::Rank;
use crate::estimator::Estimate;
use crate::stats::StatsSummary;
use crate::util::time::format_duration;
use crate::worker::RankReport;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_duration(d),
        }
    }
}

/// Where and when the run happened
#[derive(Debug, Clone, Serialize)]
pub struct JsonRunInfo {
    pub tool: String,
    pub version: String,
    /// RFC 3339, UTC
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub elapsed: JsonDuration,
}

/// One strategy's rounds
#[derive(Debug, Clone, Serialize)]
pub struct JsonStrategy {
    pub strategy: Strategy,
    pub policy: ContributionPolicy,
    pub collector: Rank,
    pub ranks: usize,
    pub producers: usize,
    /// Last round
    pub aggregate: AggregateResult,
    /// Last round
    pub estimate: Estimate,
    pub distributed_time: JsonDuration,
    pub stats: StatsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<SerialBaseline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedup: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_rank: Option<Vec<RankReport>>,
}

/// Complete JSON document
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub run: JsonRunInfo,
    pub config: Config,
    pub strategies: Vec<JsonStrategy>,
}

/// Build a JsonStrategy from a StrategyReport
pub fn build_strategy(report: &StrategyReport, per_rank: bool) -> JsonStrategy {
    let round = &report.last_round;
    JsonStrategy {
        strategy: report.strategy,
        policy: report.policy,
        collector: report.collector,
        ranks: report.ranks,
        producers: report.producers,
        aggregate: round.aggregate.clone(),
        estimate: round.estimate,
        distributed_time: JsonDuration::from_duration(round.distributed_time),
        stats: report.stats.summary(),
        baseline: report.baseline,
        speedup: report.speedup,
        efficiency: report.efficiency(),
        per_rank: per_rank.then(|| round.reports.clone()),
    }
}

/// Build the JSON document for a finished run
pub fn build_report(report: &RunReport, config: &Config) -> JsonReport {
    JsonReport {
        run: JsonRunInfo {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            hostname: local_hostname(),
            elapsed: JsonDuration::from_duration(report.elapsed),
        },
        config: config.clone(),
        strategies: report
            .strategies
            .iter()
            .map(|strategy| build_strategy(strategy, config.output.per_rank))
            .collect(),
    }
}

fn local_hostname() -> Option<String> {
    hostname::get().ok().and_then(|name| name.into_string().ok())
}

/// Write a report to `output_path`, creating parent directories as needed
pub fn write_json_output(output_path: &Path, report: &JsonReport, pretty: bool) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }

    Ok(())
}
