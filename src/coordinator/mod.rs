//! Coordinator module
//!
//! Turns a [`Config`] into rounds: builds a [`RoundPlan`] per strategy, launches the
//! group, repeats for the configured number of rounds and collects statistics from the
//! collector's view of each round.
//!
//! Round `i` of a strategy uses global seed `seed + i × ranks`, so no two rounds share
//! a rank seed. With `compare` set, every strategy runs the same rounds with the same
//! seeds, which makes their estimates identical whenever their policies match.

use crate::aggregation::{AggregateResult, ContributionPolicy, Strategy};
use crate::config::Config;
use crate::distributed::{Rank, World};
use crate::error::{Error, Result};
use crate::estimator::Estimate;
use crate::sampler::LocalComputation;
use crate::stats::RunStats;
use crate::util::time::{calculate_efficiency, calculate_speedup, Timestamp};
use crate::worker::{RankReport, RankWorker, RoundPlan};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Collector's view of one finished round
#[derive(Debug, Clone, Serialize)]
pub struct RoundOutcome {
    pub aggregate: AggregateResult,
    pub estimate: Estimate,
    /// Collector's total: the round's distributed time
    pub distributed_time: Duration,
    /// Slowest rank's Computing phase
    pub sampling_time: Duration,
    /// Every rank's report, in rank order
    pub reports: Vec<RankReport>,
}

/// All rounds of one strategy
#[derive(Debug, Clone)]
pub struct StrategyReport {
    pub strategy: Strategy,
    pub policy: ContributionPolicy,
    pub collector: Rank,
    pub ranks: usize,
    /// Ranks that sampled
    pub producers: usize,
    pub stats: RunStats,
    pub last_round: RoundOutcome,
    /// Single-rank run of the same total work, if enabled
    pub baseline: Option<SerialBaseline>,
    /// Baseline time over mean distributed time
    pub speedup: Option<f64>,
}

impl StrategyReport {
    pub fn efficiency(&self) -> Option<f64> {
        self.speedup.map(|speedup| calculate_efficiency(speedup, self.ranks))
    }
}

/// Single-rank run of the same total work
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SerialBaseline {
    /// Sampling ranks of the distributed run this stands in for
    pub producers: usize,
    pub trials: u64,
    pub time: Duration,
    pub estimate: Estimate,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub strategies: Vec<StrategyReport>,
    pub elapsed: Duration,
}

/// Drives a configured run
pub struct Coordinator {
    config: Config,
    computation: Option<Arc<dyn LocalComputation>>,
}

impl Coordinator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            computation: None,
        }
    }

    /// Replace the problem's computation; the problem's estimator is kept
    pub fn with_computation(mut self, computation: Arc<dyn LocalComputation>) -> Self {
        self.computation = Some(computation);
        self
    }

    /// Run every configured strategy, then the serial baselines if enabled
    pub fn run(&self) -> anyhow::Result<RunReport> {
        let started = Timestamp::now();
        let world = self.world(self.config.group.ranks)?;

        let mut strategies = Vec::new();
        for strategy in self.config.strategies() {
            strategies.push(
                self.run_strategy(&world, strategy)
                    .with_context(|| format!("{} aggregation failed", strategy))?,
            );
        }

        if self.config.run.serial_baseline {
            // Baselines are shared between strategies with the same producer count
            let mut baselines: Vec<SerialBaseline> = Vec::new();
            for report in &mut strategies {
                let baseline = match baselines.iter().find(|b| b.producers == report.producers) {
                    Some(baseline) => *baseline,
                    None => {
                        let baseline = self
                            .run_baseline(report.producers)
                            .context("serial baseline failed")?;
                        baselines.push(baseline);
                        baseline
                    }
                };
                report.speedup = report
                    .stats
                    .round_times()
                    .mean()
                    .map(|mean| calculate_speedup(baseline.time, mean));
                report.baseline = Some(baseline);
            }
        }

        Ok(RunReport {
            strategies,
            elapsed: started.elapsed(),
        })
    }

    fn world(&self, ranks: usize) -> Result<World> {
        let world = World::new(ranks)?;
        Ok(match self.config.stall_timeout() {
            Some(timeout) => world.with_stall_timeout(timeout),
            None => world,
        })
    }

    fn plan(&self, strategy: Strategy, policy: ContributionPolicy, collector: Rank, trials: u64) -> RoundPlan {
        let run = &self.config.run;
        let plan = RoundPlan::new(strategy, run.problem, collector, trials).with_policy(policy);
        match &self.computation {
            Some(computation) => plan.with_computation(Arc::clone(computation)),
            None => plan,
        }
    }

    fn run_strategy(&self, world: &World, strategy: Strategy) -> Result<StrategyReport> {
        let ranks = world.size();
        let policy = self.config.policy_for(strategy);
        let collector = self.config.collector();
        let base = self.plan(strategy, policy, collector, self.config.run.trials);

        tracing::info!(%strategy, %policy, collector, ranks, "starting rounds");

        let mut stats = RunStats::new();
        let mut last_round = None;
        for round in 0..self.config.run.rounds {
            let seed = self
                .config
                .run
                .seed
                .wrapping_add((round as u64).wrapping_mul(ranks as u64));
            let plan = base
                .clone()
                .with_seed(seed)
                .with_greeting(self.config.run.greet && round == 0);

            let outcome = run_round(world, Arc::new(plan))?;
            stats.record_round(
                outcome.distributed_time,
                outcome.sampling_time,
                &outcome.estimate,
                outcome.aggregate.total.trials,
            );
            tracing::debug!(
                %strategy,
                round,
                estimate = outcome.estimate.value,
                time = ?outcome.distributed_time,
                "round complete"
            );
            last_round = Some(outcome);
        }

        let last_round = last_round.ok_or_else(|| Error::Internal("no rounds were run".into()))?;

        Ok(StrategyReport {
            strategy,
            policy,
            collector,
            ranks,
            producers: policy.producers(ranks),
            stats,
            last_round,
            baseline: None,
            speedup: None,
        })
    }

    /// One rank doing the work of `producers` sampling ranks
    fn run_baseline(&self, producers: usize) -> Result<SerialBaseline> {
        let trials = self.config.run.trials.saturating_mul(producers as u64);

        tracing::info!(producers, trials, "starting serial baseline");

        let plan = self
            .plan(self.config.run.strategy, ContributionPolicy::IncludeCollector, 0, trials)
            .with_seed(self.config.run.seed);
        let outcome = run_round(&self.world(1)?, Arc::new(plan))?;

        Ok(SerialBaseline {
            producers,
            trials,
            time: outcome.distributed_time,
            estimate: outcome.estimate,
        })
    }
}

/// Run one round on `world` and return the collector's view of it
pub fn run_round(world: &World, plan: Arc<RoundPlan>) -> Result<RoundOutcome> {
    let expected = plan.collector;
    let reports = world.run(move |comm| RankWorker::new(comm, Arc::clone(&plan)).run())?;

    let collector = reports
        .iter()
        .find(|report| report.is_collector())
        .ok_or_else(|| Error::Internal(format!("rank {} reported no aggregate", expected)))?;

    let (aggregate, estimate) = match (&collector.aggregate, collector.estimate) {
        (Some(aggregate), Some(estimate)) => (aggregate.clone(), estimate),
        _ => return Err(Error::Internal("collector finished without an estimate".into())),
    };
    let distributed_time = collector.timing.total;
    let sampling_time = reports
        .iter()
        .map(|report| report.timing.compute)
        .max()
        .unwrap_or_default();

    Ok(RoundOutcome {
        aggregate,
        estimate,
        distributed_time,
        sampling_time,
        reports,
    })
}
