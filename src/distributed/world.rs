//! Group launcher and supervisor
//!
//! [`World::run`] spawns one thread per rank, hands each a [`Communicator`], and
//! collects the per-rank results in rank order. The calling thread acts as the
//! supervisor:
//!
//! - a rank returning an error (or panicking) aborts the rest of the group
//! - with a stall timeout set, ranks still running at the deadline are reported as a
//!   [`Error::LivenessHazard`], the group is aborted and `run` returns without
//!   waiting for them
//!
//! Aborting sets the shared abort flag and pushes an abort packet into every inbox,
//! so a rank blocked in a receive wakes up with [`Error::Aborted`].

use super::communicator::Communicator;
use super::protocol::{Packet, Rank};
use crate::error::{Error, Result};
use crate::util::time::Timestamp;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A fixed-size group of ranks
#[derive(Debug, Clone)]
pub struct World {
    size: usize,
    stall_timeout: Option<Duration>,
}

impl World {
    /// Create a group of `size` ranks.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidGroupSize(size));
        }
        Ok(Self {
            size,
            stall_timeout: None,
        })
    }

    /// Abort the group if it has not finished within `timeout` of launch.
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `body` once per rank and return the results indexed by rank.
    ///
    /// Fails with the first error any rank produced. Errors that are merely the
    /// consequence of an abort ([`Error::Aborted`]) only surface when nothing more
    /// specific was reported. On a stall timeout this returns at the deadline; ranks
    /// still running are detached and left to observe the abort on their own.
    pub fn run<F, R>(&self, body: F) -> Result<Vec<R>>
    where
        F: Fn(Communicator) -> Result<R> + Send + Sync + 'static,
        R: Send + 'static,
    {
        let (senders, inboxes): (Vec<Sender<Packet>>, Vec<Receiver<Packet>>) =
            (0..self.size).map(|_| channel::unbounded()).unzip();
        let outboxes: Arc<[Sender<Packet>]> = senders.into();
        let aborted = Arc::new(AtomicBool::new(false));
        let epoch = Timestamp::now();
        let (done_tx, done_rx) = channel::unbounded::<(Rank, Result<R>)>();
        let body = Arc::new(body);

        tracing::debug!(size = self.size, timeout = ?self.stall_timeout, "launching group");

        let mut handles = Vec::with_capacity(self.size);
        for (rank, inbox) in inboxes.into_iter().enumerate() {
            let comm = Communicator::new(
                rank,
                Arc::clone(&outboxes),
                inbox,
                Arc::clone(&aborted),
                epoch,
            );
            let done_tx = done_tx.clone();
            let body = Arc::clone(&body);

            let spawned = thread::Builder::new()
                .name(format!("rank-{rank}"))
                .spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*body)(comm)))
                        .unwrap_or_else(|payload| {
                            Err(Error::RankPanicked {
                                rank,
                                message: panic_message(payload.as_ref()),
                            })
                        });
                    // Supervisor may already have returned on a stall or spawn failure
                    let _ = done_tx.send((rank, outcome));
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    abort_all(&outboxes, &aborted);
                    return Err(Error::Internal(format!("failed to spawn rank {rank}: {e}")));
                }
            }
        }
        drop(done_tx);

        let (result, stalled) = self.supervise(&done_rx, &outboxes, &aborted);

        if stalled.is_empty() {
            for handle in handles {
                // Panics were already caught inside the rank
                let _ = handle.join();
            }
        } else {
            tracing::warn!(?stalled, "detaching stalled ranks");
        }

        result
    }

    /// Collect every rank's outcome. Also returns the ranks still running if the
    /// deadline passed first.
    fn supervise<R>(
        &self,
        done_rx: &Receiver<(Rank, Result<R>)>,
        outboxes: &[Sender<Packet>],
        aborted: &AtomicBool,
    ) -> (Result<Vec<R>>, Vec<Rank>) {
        let deadline = self.stall_timeout.map(|timeout| Instant::now() + timeout);
        let mut finished = vec![false; self.size];
        let mut results: Vec<Option<R>> = (0..self.size).map(|_| None).collect();
        let mut first_error: Option<Error> = None;
        let mut remaining = self.size;

        while remaining > 0 {
            let received = match deadline {
                Some(at) => done_rx.recv_deadline(at),
                None => done_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            let (rank, outcome) = match received {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => {
                    let pending: Vec<Rank> = finished
                        .iter()
                        .enumerate()
                        .filter(|(_, done)| !**done)
                        .map(|(rank, _)| rank)
                        .collect();
                    let timeout = self.stall_timeout.unwrap_or_default();
                    tracing::warn!(?pending, ?timeout, "ranks stalled, aborting group");

                    abort_all(outboxes, aborted);
                    let err = match first_error {
                        Some(err) if !err.is_abort() => err,
                        _ => Error::LivenessHazard {
                            pending: pending.clone(),
                            timeout,
                        },
                    };
                    return (Err(err), pending);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            remaining -= 1;
            finished[rank] = true;

            match outcome {
                Ok(value) => results[rank] = Some(value),
                Err(err) => {
                    if !err.is_abort() {
                        tracing::error!(rank, error = %err, "rank failed, aborting group");
                    }
                    abort_all(outboxes, aborted);

                    let replace = match &first_error {
                        None => true,
                        Some(existing) => existing.is_abort() && !err.is_abort(),
                    };
                    if replace {
                        first_error = Some(err);
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return (Err(err), Vec::new());
        }

        let results = results
            .into_iter()
            .enumerate()
            .map(|(rank, result)| {
                result.ok_or_else(|| Error::Internal(format!("rank {rank} produced no result")))
            })
            .collect();
        (results, Vec::new())
    }
}

/// Set the abort flag and wake every rank blocked on its inbox
fn abort_all(outboxes: &[Sender<Packet>], aborted: &AtomicBool) {
    if aborted.swap(true, Ordering::AcqRel) {
        return;
    }
    for outbox in outboxes {
        // Ranks that already finished have dropped their inbox
        let _ = outbox.send(Packet::Abort);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
