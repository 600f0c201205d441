//! Non-blocking point-to-point collection
//!
//! Value and trial count travel on two channels. A non-collector starts both sends
//! and waits only once, at the end. The collector posts both receives for every peer
//! before waiting on the full set, so transfers from different peers overlap. Received
//! values are only readable through the [`Completed`](crate::distributed::Completed)
//! set that the wait returns.

use super::{AggregateResult, AggregationStrategy, Strategy};
use crate::distributed::{Communicator, Rank, Request, RequestSet, Tag};
use crate::error::Result;
use crate::sampler::PartialResult;

/// Channel carrying partial values
pub const VALUE_TAG: Tag = 1;

/// Channel carrying trial counts
pub const TRIALS_TAG: Tag = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct NonBlocking;

impl AggregationStrategy for NonBlocking {
    fn strategy(&self) -> Strategy {
        Strategy::NonBlocking
    }

    fn aggregate(
        &self,
        comm: &Communicator,
        partial: Option<PartialResult>,
        collector: Rank,
    ) -> Result<Option<AggregateResult>> {
        if comm.rank() != collector {
            let partial = partial.unwrap_or_default();
            let sends = vec![
                comm.isend(partial.value, collector, VALUE_TAG)?,
                comm.isend(partial.trials, collector, TRIALS_TAG)?,
            ];
            Request::wait_all(sends)?;
            return Ok(None);
        }

        let mut pending = RequestSet::new(comm);
        let mut tickets = Vec::with_capacity(comm.size().saturating_sub(1));
        for source in (0..comm.size()).filter(|&source| source != collector) {
            let value = pending.push(comm.irecv::<f64>(source, VALUE_TAG)?);
            let trials = pending.push(comm.irecv::<u64>(source, TRIALS_TAG)?);
            tickets.push((source, value, trials));
        }

        tracing::debug!(collector, requests = pending.len(), "waiting on receive set");
        let mut done = pending.wait_all()?;

        let mut per_rank = Vec::with_capacity(comm.size());
        for (source, value, trials) in tickets {
            per_rank.push((source, PartialResult::new(done.take(value)?, done.take(trials)?)));
        }
        if let Some(own) = partial {
            per_rank.push((collector, own));
            per_rank.sort_by_key(|(rank, _)| *rank);
        }

        Ok(Some(AggregateResult::from_partials(per_rank)))
    }
}
