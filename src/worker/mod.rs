//! Rank worker
//!
//! A [`RankWorker`] runs one rank through one round:
//!
//! 1. **Greeting** (optional): log that the rank is alive, then meet at a barrier
//! 2. **Computing**: run the local computation, unless the rank does not contribute
//! 3. **Exchanging**: hand the partial to the aggregation strategy
//! 4. **Aggregated** (collector only): all partials are in; run the estimator
//!
//! Each phase boundary is timestamped. The collector's total spans the critical path
//! of every participant, so it is the figure reported as the round's distributed time.
//!
//! # Example
//!
//! ```
//! use distmc::aggregation::Strategy;
//! use distmc::distributed::World;
//! use distmc::sampler::Problem;
//! use distmc::worker::{RankWorker, RoundPlan};
//! use std::sync::Arc;
//!
//! let plan = Arc::new(RoundPlan::new(Strategy::Reduction, Problem::Pi, 0, 10_000));
//! let reports = World::new(4)?.run(move |comm| RankWorker::new(comm, Arc::clone(&plan)).run())?;
//!
//! let estimate = reports[0].estimate.unwrap();
//! assert!(estimate.abs_error < 0.1);
//! # Ok::<(), distmc::Error>(())
//! ```

use crate::aggregation::{AggregateResult, ContributionPolicy, Phase, Strategy};
use crate::distributed::{Communicator, Rank};
use crate::error::Result;
use crate::estimator::{Estimate, Estimator};
use crate::sampler::{LocalComputation, PartialResult, Problem, RankContext, DEFAULT_SEED};
use crate::util::time::Timestamp;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Everything every rank needs to run one round
#[derive(Clone)]
pub struct RoundPlan {
    pub strategy: Strategy,
    pub policy: ContributionPolicy,
    pub collector: Rank,
    /// Trials per sampling rank
    pub trials: u64,
    /// Global seed; rank seeds derive from it
    pub seed: u64,
    pub computation: Arc<dyn LocalComputation>,
    pub estimator: Estimator,
    /// Log an "alive" line and meet at a barrier before sampling
    pub greet: bool,
}

impl RoundPlan {
    /// Plan for a bundled problem with the strategy's default policy
    pub fn new(strategy: Strategy, problem: Problem, collector: Rank, trials: u64) -> Self {
        Self {
            strategy,
            policy: strategy.default_policy(),
            collector,
            trials,
            seed: DEFAULT_SEED,
            computation: problem.computation(),
            estimator: problem.estimator(),
            greet: false,
        }
    }

    pub fn with_policy(mut self, policy: ContributionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_computation(mut self, computation: Arc<dyn LocalComputation>) -> Self {
        self.computation = computation;
        self
    }

    pub fn with_greeting(mut self, greet: bool) -> Self {
        self.greet = greet;
        self
    }
}

impl fmt::Debug for RoundPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundPlan")
            .field("strategy", &self.strategy)
            .field("policy", &self.policy)
            .field("collector", &self.collector)
            .field("trials", &self.trials)
            .field("seed", &self.seed)
            .field("estimator", &self.estimator)
            .field("greet", &self.greet)
            .finish_non_exhaustive()
    }
}

/// Wall-clock spans of one rank's round
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RankTiming {
    pub compute: Duration,
    pub exchange: Duration,
    pub total: Duration,
}

/// What one rank did in a round
#[derive(Debug, Clone, Serialize)]
pub struct RankReport {
    pub rank: Rank,
    /// Phase the rank finished in
    pub phase: Phase,
    /// Local partial; `None` if the rank did not sample
    pub partial: Option<PartialResult>,
    pub timing: RankTiming,
    /// Collector only
    pub aggregate: Option<AggregateResult>,
    /// Collector only
    pub estimate: Option<Estimate>,
}

impl RankReport {
    pub fn is_collector(&self) -> bool {
        self.aggregate.is_some()
    }
}

/// Drives one rank through one round
pub struct RankWorker {
    comm: Communicator,
    plan: Arc<RoundPlan>,
}

impl RankWorker {
    pub fn new(comm: Communicator, plan: Arc<RoundPlan>) -> Self {
        Self { comm, plan }
    }

    pub fn run(self) -> Result<RankReport> {
        let comm = &self.comm;
        let plan = &*self.plan;
        let (rank, size) = (comm.rank(), comm.size());

        if plan.greet {
            tracing::info!("process {} of {} is alive", rank, size);
            comm.barrier()?;
        }

        let ctx = RankContext::new(rank, size, plan.seed).with_producer_slot(
            plan.policy.producer_index(rank, plan.collector),
            plan.policy.producers(size),
        );

        let mut phase = Phase::Computing;
        let partial = plan
            .policy
            .samples(rank, plan.collector)
            .then(|| plan.computation.sample(&ctx, plan.trials));
        let computed = Timestamp::now();

        if let Some(partial) = &partial {
            tracing::debug!(rank, value = partial.value, trials = partial.trials, "sampled");
        }

        phase = phase.advance(Phase::Exchanging)?;
        let aggregator = plan.strategy.aggregator();
        let aggregate = aggregator.aggregate(comm, partial, plan.collector)?;
        let exchanged = Timestamp::now();

        let estimate = match &aggregate {
            Some(aggregate) => {
                phase = phase.advance(Phase::Aggregated)?;
                Some(plan.estimator.estimate(&aggregate.total)?)
            }
            None => None,
        };

        let timing = RankTiming {
            compute: computed.duration_since(ctx.started),
            exchange: exchanged.duration_since(computed),
            total: exchanged.duration_since(ctx.started),
        };

        tracing::debug!(rank, %phase, total = ?timing.total, "round finished");

        Ok(RankReport {
            rank,
            phase,
            partial,
            timing,
            aggregate,
            estimate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::World;
    use crate::error::Error;

    fn run_plan(size: usize, plan: RoundPlan) -> Result<Vec<RankReport>> {
        let plan = Arc::new(plan);
        World::new(size)?.run(move |comm| RankWorker::new(comm, Arc::clone(&plan)).run())
    }

    #[test]
    fn test_phases_per_role() {
        for strategy in Strategy::ALL {
            let reports = run_plan(4, RoundPlan::new(strategy, Problem::Pi, 2, 1000)).unwrap();

            for report in &reports {
                let expected = if report.rank == 2 { Phase::Aggregated } else { Phase::Exchanging };
                assert_eq!(report.phase, expected, "{strategy} rank {}", report.rank);
                assert_eq!(report.is_collector(), report.rank == 2);
                assert_eq!(report.estimate.is_some(), report.rank == 2);
            }
        }
    }

    #[test]
    fn test_collector_samples_per_policy() {
        let reports = run_plan(3, RoundPlan::new(Strategy::Blocking, Problem::Pi, 0, 500)).unwrap();
        assert!(reports[0].partial.is_none());
        assert!(reports[1].partial.is_some());

        let reports = run_plan(3, RoundPlan::new(Strategy::Reduction, Problem::Pi, 0, 500)).unwrap();
        assert!(reports[0].partial.is_some());
    }

    #[test]
    fn test_pi_estimate_converges() {
        let plan = RoundPlan::new(Strategy::NonBlocking, Problem::Pi, 0, 100_000);
        let reports = run_plan(5, plan).unwrap();

        let estimate = reports[0].estimate.unwrap();
        assert!(estimate.abs_error < 0.02, "pi estimate {}", estimate.value);
        assert_eq!(reports[0].aggregate.as_ref().unwrap().total.trials, 400_000);
    }

    #[test]
    fn test_integral_with_last_rank_collector() {
        let plan = RoundPlan::new(Strategy::Blocking, Problem::Integral, 5, 100)
            .with_policy(ContributionPolicy::IncludeCollector);
        let reports = run_plan(6, plan).unwrap();

        let estimate = reports[5].estimate.unwrap();
        assert!(estimate.abs_error < 1e-6);
    }

    #[test]
    fn test_integral_with_excluded_collector_covers_domain() {
        let plan = RoundPlan::new(Strategy::NonBlocking, Problem::Integral, 0, 200);
        let reports = run_plan(4, plan).unwrap();

        assert!(reports[0].estimate.unwrap().abs_error < 1e-5);
    }

    #[test]
    fn test_zero_trials_is_degenerate() {
        let result = run_plan(3, RoundPlan::new(Strategy::Reduction, Problem::Pi, 0, 0));
        assert!(matches!(result, Err(Error::DegenerateInput(_))));
    }

    #[test]
    fn test_greeting_barrier() {
        let plan = RoundPlan::new(Strategy::Blocking, Problem::Pi, 0, 10).with_greeting(true);
        let reports = run_plan(3, plan).unwrap();
        assert_eq!(reports.len(), 3);
    }

    #[test]
    fn test_timing_spans() {
        let slow = |_: &RankContext, trials: u64| {
            std::thread::sleep(Duration::from_millis(20));
            PartialResult::new(0.0, trials)
        };
        let plan = RoundPlan::new(Strategy::Blocking, Problem::Pi, 0, 10).with_computation(Arc::new(slow));
        let reports = run_plan(2, plan).unwrap();

        let sender = reports[1].timing;
        assert!(sender.compute >= Duration::from_millis(20));
        assert!(sender.total >= sender.compute);

        // The collector does not sample but waits for the sender
        let collector = reports[0].timing;
        assert!(collector.compute < Duration::from_millis(20));
        assert!(collector.total >= Duration::from_millis(10));
    }
}
