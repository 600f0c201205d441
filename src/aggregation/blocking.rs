//! Blocking point-to-point collection
//!
//! Every non-collector sends its whole partial with one blocking send. The collector
//! receives from each source in increasing rank order, naming the exact source every
//! time, so each peer is drained exactly once. A peer that never sends stalls the
//! collector until the supervisor gives up.

use super::{AggregateResult, AggregationStrategy, Strategy};
use crate::distributed::{Communicator, Rank, Tag};
use crate::error::Result;
use crate::sampler::PartialResult;

/// Channel carrying whole partials
pub const PARTIAL_TAG: Tag = 0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Blocking;

impl AggregationStrategy for Blocking {
    fn strategy(&self) -> Strategy {
        Strategy::Blocking
    }

    fn aggregate(
        &self,
        comm: &Communicator,
        partial: Option<PartialResult>,
        collector: Rank,
    ) -> Result<Option<AggregateResult>> {
        if comm.rank() != collector {
            comm.send(&partial.unwrap_or_default(), collector, PARTIAL_TAG)?;
            return Ok(None);
        }

        let mut per_rank = Vec::with_capacity(comm.size());
        for source in 0..comm.size() {
            if source == collector {
                if let Some(own) = partial {
                    per_rank.push((source, own));
                }
                continue;
            }

            let incoming: PartialResult = comm.recv(source, PARTIAL_TAG)?;
            tracing::debug!(collector, source, value = incoming.value, trials = incoming.trials, "received partial");
            per_rank.push((source, incoming));
        }

        Ok(Some(AggregateResult::from_partials(per_rank)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::tests::collect;
    use crate::aggregation::ContributionPolicy;
    use crate::distributed::World;
    use crate::error::Error;
    use std::time::Duration;

    #[test]
    fn test_collects_in_rank_order() {
        let result = collect(Strategy::Blocking, 5, 2, ContributionPolicy::ExcludeCollector, |rank| {
            PartialResult::new(rank as f64, 1)
        });

        assert_eq!(
            result.per_rank,
            vec![
                (0, PartialResult::new(0.0, 1)),
                (1, PartialResult::new(1.0, 1)),
                (3, PartialResult::new(3.0, 1)),
                (4, PartialResult::new(4.0, 1)),
            ]
        );
    }

    #[test]
    fn test_silent_peer_is_liveness_hazard() {
        let world = World::new(3).unwrap().with_stall_timeout(Duration::from_millis(100));

        let result = world.run(move |comm| {
            // Rank 1 never reaches the exchange
            if comm.rank() == 1 {
                return Ok(None);
            }
            Blocking.aggregate(&comm, Some(PartialResult::new(1.0, 1)), 0)
        });

        match result {
            Err(Error::LivenessHazard { pending, .. }) => assert_eq!(pending, vec![0]),
            other => panic!("expected liveness hazard, got {other:?}"),
        }
    }
}
