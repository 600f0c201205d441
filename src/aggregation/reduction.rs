//! Reduction-based collection
//!
//! Every rank, the collector included, enters two collective sums rooted at the
//! collector: one over values, one over `[trials, contributed]`. A collector that does
//! not sample supplies the identity element. There is no per-rank visibility; the
//! contributor count comes from the second reduction.

use super::{AggregateResult, AggregationStrategy, Strategy};
use crate::distributed::{Communicator, Rank, ReduceOp};
use crate::error::{Error, Result};
use crate::sampler::PartialResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct Reduction;

impl AggregationStrategy for Reduction {
    fn strategy(&self) -> Strategy {
        Strategy::Reduction
    }

    fn aggregate(
        &self,
        comm: &Communicator,
        partial: Option<PartialResult>,
        collector: Rank,
    ) -> Result<Option<AggregateResult>> {
        let own = partial.unwrap_or_default();
        let contributed = u64::from(partial.is_some());

        let value = comm.reduce_scalar(own.value, ReduceOp::Sum, collector)?;
        let counts = comm.reduce(&[own.trials, contributed], ReduceOp::Sum, collector)?;

        match (value, counts.as_deref()) {
            (Some(value), Some(&[trials, contributors])) => Ok(Some(AggregateResult {
                total: PartialResult::new(value, trials),
                contributors: contributors as usize,
                per_rank: Vec::new(),
            })),
            (None, None) => Ok(None),
            _ => Err(Error::Internal(format!(
                "rank {} got a partial reduction result",
                comm.rank()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::tests::collect;
    use crate::aggregation::ContributionPolicy;

    #[test]
    fn test_excluded_collector_supplies_identity() {
        let result = collect(Strategy::Reduction, 4, 3, ContributionPolicy::ExcludeCollector, |_| {
            PartialResult::new(785.0, 1000)
        });

        assert_eq!(result.total, PartialResult::new(2355.0, 3000));
        assert_eq!(result.contributors, 3);
    }

    #[test]
    fn test_non_zero_collector() {
        for collector in 0..5 {
            let result = collect(Strategy::Reduction, 5, collector, ContributionPolicy::IncludeCollector, |rank| {
                PartialResult::new(rank as f64, 2)
            });
            assert_eq!(result.total, PartialResult::new(10.0, 10));
        }
    }
}
