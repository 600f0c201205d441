//! Aggregation protocol
//!
//! Collects every rank's [`PartialResult`] onto one collector rank. Three
//! interchangeable strategies implement [`AggregationStrategy`]:
//!
//! - [`Blocking`]: one blocking send per rank; the collector receives from each source
//!   in increasing rank order
//! - [`NonBlocking`]: value and trial count travel on separate channels; the collector
//!   posts every receive up front and waits on the whole set
//! - [`Reduction`]: two collective sums rooted at the collector
//!
//! # Round state machine
//!
//! ```text
//! Computing ──> Exchanging ──> Aggregated     (collector)
//! Computing ──> Exchanging                    (everyone else)
//! ```
//!
//! # Contribution policy
//!
//! Whether the collector samples too is a [`ContributionPolicy`]. Point-to-point
//! strategies default to excluding it, the reduction to including it. An excluded
//! collector still takes part in the reduction with the identity element.

pub mod blocking;
pub mod nonblocking;
pub mod reduction;

use crate::distributed::{Communicator, Rank};
use crate::error::{Error, Result};
use crate::sampler::PartialResult;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use blocking::Blocking;
pub use nonblocking::NonBlocking;
pub use reduction::Reduction;

/// Strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Blocking,
    NonBlocking,
    Reduction,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Blocking, Strategy::NonBlocking, Strategy::Reduction];

    /// Policy used when none is configured
    pub fn default_policy(&self) -> ContributionPolicy {
        match self {
            Strategy::Blocking | Strategy::NonBlocking => ContributionPolicy::ExcludeCollector,
            Strategy::Reduction => ContributionPolicy::IncludeCollector,
        }
    }

    pub fn aggregator(&self) -> Box<dyn AggregationStrategy> {
        match self {
            Strategy::Blocking => Box::new(Blocking),
            Strategy::NonBlocking => Box::new(NonBlocking),
            Strategy::Reduction => Box::new(Reduction),
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Blocking
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Blocking => write!(f, "blocking"),
            Strategy::NonBlocking => write!(f, "non-blocking"),
            Strategy::Reduction => write!(f, "reduction"),
        }
    }
}

/// Whether the collector contributes its own trials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContributionPolicy {
    ExcludeCollector,
    IncludeCollector,
}

impl ContributionPolicy {
    /// Whether `rank` runs the local computation
    pub fn samples(&self, rank: Rank, collector: Rank) -> bool {
        rank != collector || *self == ContributionPolicy::IncludeCollector
    }

    /// Number of sampling ranks in a group of `size`
    pub fn producers(&self, size: usize) -> usize {
        match self {
            ContributionPolicy::IncludeCollector => size,
            ContributionPolicy::ExcludeCollector => size.saturating_sub(1),
        }
    }

    /// Position of `rank` among the sampling ranks
    pub fn producer_index(&self, rank: Rank, collector: Rank) -> usize {
        match self {
            ContributionPolicy::ExcludeCollector if rank > collector => rank - 1,
            _ => rank,
        }
    }
}

impl fmt::Display for ContributionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributionPolicy::ExcludeCollector => write!(f, "exclude-collector"),
            ContributionPolicy::IncludeCollector => write!(f, "include-collector"),
        }
    }
}

/// Phase of one rank within a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Computing,
    Exchanging,
    Aggregated,
}

impl Phase {
    /// Move to `next`, rejecting anything but the forward edges of the state machine
    pub fn advance(self, next: Phase) -> Result<Phase> {
        match (self, next) {
            (Phase::Computing, Phase::Exchanging) | (Phase::Exchanging, Phase::Aggregated) => Ok(next),
            (from, to) => Err(Error::IllegalTransition { from, to }),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Computing => write!(f, "computing"),
            Phase::Exchanging => write!(f, "exchanging"),
            Phase::Aggregated => write!(f, "aggregated"),
        }
    }
}

/// Union of all partials, held by the collector after a round
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Summed value and trial count
    pub total: PartialResult,
    /// Ranks whose partial was counted
    pub contributors: usize,
    /// Per-rank partials in rank order; empty for the reduction
    pub per_rank: Vec<(Rank, PartialResult)>,
}

impl AggregateResult {
    /// Sum `partials`, which must already be in rank order
    pub fn from_partials(per_rank: Vec<(Rank, PartialResult)>) -> Self {
        let mut total = PartialResult::empty();
        for (_, partial) in &per_rank {
            total.absorb(partial);
        }
        Self {
            total,
            contributors: per_rank.len(),
            per_rank,
        }
    }
}

/// One way of moving partials to the collector
///
/// All ranks of the group call [`aggregate`](Self::aggregate) for the same round.
/// `partial` is `None` on a collector that does not contribute. Returns `Some` on the
/// collector and `None` on every other rank.
pub trait AggregationStrategy: Send + Sync {
    fn strategy(&self) -> Strategy;

    fn aggregate(
        &self,
        comm: &Communicator,
        partial: Option<PartialResult>,
        collector: Rank,
    ) -> Result<Option<AggregateResult>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::distributed::World;

    /// Run one round with fixed partials and return what the collector holds
    pub(crate) fn collect(
        strategy: Strategy,
        size: usize,
        collector: Rank,
        policy: ContributionPolicy,
        partial_of: impl Fn(Rank) -> PartialResult + Send + Sync + 'static,
    ) -> AggregateResult {
        let aggregator = strategy.aggregator();
        let results = World::new(size)
            .unwrap()
            .run(move |comm| {
                let rank = comm.rank();
                let partial = policy.samples(rank, collector).then(|| partial_of(rank));
                aggregator.aggregate(&comm, partial, collector)
            })
            .unwrap();

        for (rank, result) in results.iter().enumerate() {
            assert_eq!(result.is_some(), rank == collector, "{strategy} rank {rank}");
        }
        results.into_iter().nth(collector).flatten().unwrap()
    }

    fn thousand(rank: Rank) -> PartialResult {
        PartialResult::new(700.0 + rank as f64, 1000)
    }

    #[test]
    fn test_exactly_once_accounting() {
        for strategy in Strategy::ALL {
            for size in 2..=6 {
                for collector in [0, size - 1] {
                    let policy = strategy.default_policy();
                    let result = collect(strategy, size, collector, policy, thousand);

                    let expected: Vec<Rank> = (0..size).filter(|&r| policy.samples(r, collector)).collect();
                    let trials: u64 = expected.iter().map(|&r| thousand(r).trials).sum();
                    let value: f64 = expected.iter().map(|&r| thousand(r).value).sum();

                    assert_eq!(result.total.trials, trials, "{strategy} size {size}");
                    assert_eq!(result.total.value, value, "{strategy} size {size}");
                    assert_eq!(result.contributors, expected.len(), "{strategy} size {size}");
                }
            }
        }
    }

    #[test]
    fn test_blocking_and_nonblocking_agree() {
        let partial_of = |rank: Rank| PartialResult::new((rank * rank) as f64 + 0.25, 10 + rank as u64);

        for size in 2..=5 {
            for policy in [ContributionPolicy::ExcludeCollector, ContributionPolicy::IncludeCollector] {
                let blocking = collect(Strategy::Blocking, size, 1, policy, partial_of);
                let nonblocking = collect(Strategy::NonBlocking, size, 1, policy, partial_of);
                assert_eq!(blocking, nonblocking);
            }
        }
    }

    #[test]
    fn test_reduction_includes_collector_by_default() {
        let size = 4;
        let collector = 3;

        let blocking = collect(Strategy::Blocking, size, collector, Strategy::Blocking.default_policy(), thousand);
        let reduction = collect(Strategy::Reduction, size, collector, Strategy::Reduction.default_policy(), thousand);

        assert_eq!(blocking.total.trials, 3000);
        assert_eq!(reduction.total.trials, 4000);
        assert_eq!(reduction.total.trials - blocking.total.trials, thousand(collector).trials);
    }

    #[test]
    fn test_policy_matched_totals() {
        for policy in [ContributionPolicy::ExcludeCollector, ContributionPolicy::IncludeCollector] {
            let totals: Vec<u64> = Strategy::ALL
                .iter()
                .map(|&strategy| collect(strategy, 5, 2, policy, thousand).total.trials)
                .collect();
            assert!(totals.iter().all(|&t| t == totals[0]), "{policy}: {totals:?}");
        }
    }

    #[test]
    fn test_per_rank_visibility() {
        let blocking = collect(Strategy::Blocking, 4, 1, ContributionPolicy::IncludeCollector, thousand);
        let ranks: Vec<Rank> = blocking.per_rank.iter().map(|(rank, _)| *rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);

        let nonblocking = collect(Strategy::NonBlocking, 4, 1, ContributionPolicy::ExcludeCollector, thousand);
        let ranks: Vec<Rank> = nonblocking.per_rank.iter().map(|(rank, _)| *rank).collect();
        assert_eq!(ranks, vec![0, 2, 3]);

        let reduction = collect(Strategy::Reduction, 4, 1, ContributionPolicy::IncludeCollector, thousand);
        assert!(reduction.per_rank.is_empty());
        assert_eq!(reduction.contributors, 4);
    }

    #[test]
    fn test_policy_producer_slots() {
        let policy = ContributionPolicy::ExcludeCollector;
        assert!(!policy.samples(2, 2));
        assert_eq!(policy.producers(4), 3);
        assert_eq!(policy.producer_index(1, 2), 1);
        assert_eq!(policy.producer_index(3, 2), 2);

        let policy = ContributionPolicy::IncludeCollector;
        assert!(policy.samples(2, 2));
        assert_eq!(policy.producers(4), 4);
        assert_eq!(policy.producer_index(3, 2), 3);
    }

    #[test]
    fn test_phase_transitions() {
        let phase = Phase::Computing.advance(Phase::Exchanging).unwrap();
        assert_eq!(phase.advance(Phase::Aggregated).unwrap(), Phase::Aggregated);

        assert!(matches!(
            Phase::Computing.advance(Phase::Aggregated),
            Err(Error::IllegalTransition {
                from: Phase::Computing,
                to: Phase::Aggregated
            })
        ));
        assert!(Phase::Aggregated.advance(Phase::Computing).is_err());
        assert!(Phase::Exchanging.advance(Phase::Exchanging).is_err());
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(Strategy::NonBlocking.to_string(), "non-blocking");
        assert_eq!(Strategy::Reduction.aggregator().strategy(), Strategy::Reduction);
    }
}
