//! Local sampling
//!
//! Each rank turns a trial count into one [`PartialResult`] by running a
//! [`LocalComputation`]. Everything a computation may depend on is passed in through
//! [`RankContext`]: there is no global seed or timer state.
//!
//! Two computations are bundled:
//!
//! - [`QuarterCircle`]: hit-or-miss sampling of the unit quarter circle (estimates π)
//! - [`MidpointIntegral`]: midpoint rule over a partition split across ranks
//!
//! Any closure `Fn(&RankContext, u64) -> PartialResult` is a computation too, which is
//! how tests inject fixed per-rank counts.

pub mod midpoint;
pub mod quarter_circle;

use crate::distributed::Rank;
use crate::estimator::Estimator;
use crate::util::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use midpoint::MidpointIntegral;
pub use quarter_circle::QuarterCircle;

/// Global seed every rank seed is derived from
pub const DEFAULT_SEED: u64 = 35791246;

/// Seed for `rank`, distinct for every rank of a group
#[inline]
pub fn rank_seed(global_seed: u64, rank: Rank) -> u64 {
    global_seed.wrapping_add(rank as u64)
}

/// Everything a rank knows about itself while sampling
#[derive(Debug, Clone, Copy)]
pub struct RankContext {
    /// Rank id in `[0, size)`
    pub rank: Rank,
    /// Group size
    pub size: usize,
    /// Derived PRNG seed for this rank
    pub seed: u64,
    /// Position of this rank among the ranks that sample
    pub producer_index: usize,
    /// Number of ranks that sample
    pub producers: usize,
    /// Start of the round on this rank
    pub started: Timestamp,
}

impl RankContext {
    /// Context for a rank where every rank of the group samples
    pub fn new(rank: Rank, size: usize, global_seed: u64) -> Self {
        Self {
            rank,
            size,
            seed: rank_seed(global_seed, rank),
            producer_index: rank,
            producers: size,
            started: Timestamp::now(),
        }
    }

    /// Restrict sampling to `producers` ranks, this one at `producer_index`
    pub fn with_producer_slot(mut self, producer_index: usize, producers: usize) -> Self {
        self.producer_index = producer_index;
        self.producers = producers;
        self
    }
}

/// One rank's contribution before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PartialResult {
    /// Qualifying count, or partial sum for integration
    pub value: f64,
    /// Trials that produced `value`
    pub trials: u64,
}

impl PartialResult {
    pub fn new(value: f64, trials: u64) -> Self {
        Self { value, trials }
    }

    /// Zero value over zero trials; also the identity of summation
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.trials == 0
    }

    /// Add another partial into this one
    pub fn absorb(&mut self, other: &PartialResult) {
        self.value += other.value;
        self.trials += other.trials;
    }
}

impl fmt::Display for PartialResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.value, self.trials)
    }
}

/// Per-rank sampling function
///
/// Implementations must be deterministic for a given context and trial count, and
/// must return a zero value over zero trials when `trials == 0`.
pub trait LocalComputation: Send + Sync {
    fn sample(&self, ctx: &RankContext, trials: u64) -> PartialResult;
}

impl<F> LocalComputation for F
where
    F: Fn(&RankContext, u64) -> PartialResult + Send + Sync,
{
    fn sample(&self, ctx: &RankContext, trials: u64) -> PartialResult {
        self(ctx, trials)
    }
}

/// Bundled problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Problem {
    /// π by quarter-circle sampling
    Pi,
    /// ∫ cos(x) dx over [-1, 1] by the midpoint rule
    Integral,
}

impl Problem {
    pub fn computation(&self) -> Arc<dyn LocalComputation> {
        match self {
            Problem::Pi => Arc::new(QuarterCircle),
            Problem::Integral => Arc::new(MidpointIntegral::cosine()),
        }
    }

    pub fn estimator(&self) -> Estimator {
        match self {
            Problem::Pi => Estimator::pi(),
            Problem::Integral => Estimator::cosine_integral(),
        }
    }

    /// Collector rank used when none is configured
    pub fn default_collector(&self, size: usize) -> Rank {
        match self {
            Problem::Pi => 0,
            Problem::Integral => size.saturating_sub(1),
        }
    }
}

impl Default for Problem {
    fn default() -> Self {
        Self::Pi
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Pi => write!(f, "pi"),
            Problem::Integral => write!(f, "integral"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rank_seeds_are_distinct() {
        let seeds: Vec<u64> = (0..8).map(|rank| rank_seed(DEFAULT_SEED, rank)).collect();
        assert_eq!(seeds[0], 35791246);
        assert_eq!(seeds[3], 35791249);

        let unique: HashSet<u64> = seeds.iter().copied().collect();
        assert_eq!(unique.len(), seeds.len());
    }

    #[test]
    fn test_rank_seed_wraps() {
        assert_eq!(rank_seed(u64::MAX, 1), 0);
    }

    #[test]
    fn test_context_defaults_to_every_rank_sampling() {
        let ctx = RankContext::new(2, 4, 100);
        assert_eq!(ctx.seed, 102);
        assert_eq!((ctx.producer_index, ctx.producers), (2, 4));

        let ctx = ctx.with_producer_slot(1, 3);
        assert_eq!((ctx.producer_index, ctx.producers), (1, 3));
    }

    #[test]
    fn test_partial_absorb() {
        let mut total = PartialResult::empty();
        assert!(total.is_empty());

        total.absorb(&PartialResult::new(780.0, 1000));
        total.absorb(&PartialResult::new(790.0, 1000));
        assert_eq!(total, PartialResult::new(1570.0, 2000));
    }

    #[test]
    fn test_closure_is_a_computation() {
        let fixed = |ctx: &RankContext, trials: u64| PartialResult::new(ctx.rank as f64, trials);
        let ctx = RankContext::new(3, 4, DEFAULT_SEED);

        assert_eq!(fixed.sample(&ctx, 10), PartialResult::new(3.0, 10));
    }

    #[test]
    fn test_problem_defaults() {
        assert_eq!(Problem::Pi.default_collector(6), 0);
        assert_eq!(Problem::Integral.default_collector(6), 5);
        assert_eq!(Problem::Integral.to_string(), "integral");
    }
}
