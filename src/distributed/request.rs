//! Handles for non-blocking operations.
//!
//! A [`Request`] is returned by [`Communicator::isend`] and [`Communicator::irecv`].
//! The value of a receive is only reachable by completing the request, so a buffer
//! can never be read before its transfer has finished.
//!
//! Requests of different value types are completed together through a
//! [`RequestSet`]: each pushed request yields a typed [`Ticket`], and tickets are
//! redeemed against the [`Completed`] value that only [`RequestSet::wait_all`]
//! produces.
//!
//! ```
//! use distmc::distributed::{RequestSet, World};
//!
//! let world = World::new(2).unwrap();
//! let results = world.run(move |comm| {
//!     if comm.rank() == 1 {
//!         let mut set = RequestSet::new(&comm);
//!         set.push(comm.isend(0.75f64, 0, 1)?);
//!         set.push(comm.isend(1000u64, 0, 2)?);
//!         set.wait_all()?;
//!         return Ok(None);
//!     }
//!
//!     let mut set = RequestSet::new(&comm);
//!     let value = set.push(comm.irecv::<f64>(1, 1)?);
//!     let trials = set.push(comm.irecv::<u64>(1, 2)?);
//!     let mut done = set.wait_all()?;
//!     Ok(Some((done.take(value)?, done.take(trials)?)))
//! }).unwrap();
//!
//! assert_eq!(results[0], Some((0.75, 1000)));
//! ```

use super::communicator::Communicator;
use super::protocol::decode_payload;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

#[derive(Debug)]
enum State {
    /// Eager send; the payload already left with the envelope
    Sent,
    /// Receive posted under this slot id
    Posted(u64),
    /// Completed or moved into a set
    Done,
}

/// Handle for one in-flight non-blocking operation.
///
/// Send requests carry `()`. Receive requests carry the type that was asked for.
/// Dropping a receive request that was never completed withdraws the posted
/// receive and logs a warning.
#[must_use = "a request must be completed with wait() or wait_all()"]
#[derive(Debug)]
pub struct Request<'c, T> {
    comm: &'c Communicator,
    state: State,
    _value: PhantomData<fn() -> T>,
}

impl<'c, T> Request<'c, T> {
    pub(crate) fn posted(comm: &'c Communicator, id: u64) -> Self {
        Self {
            comm,
            state: State::Posted(id),
            _value: PhantomData,
        }
    }

    /// Non-blocking completion check.
    ///
    /// Drains any envelopes that have already arrived. Never blocks.
    pub fn test(&mut self) -> Result<bool> {
        match self.state {
            State::Posted(id) => self.comm.test_slot(id),
            State::Sent | State::Done => Ok(true),
        }
    }

    fn take_state(&mut self) -> State {
        std::mem::replace(&mut self.state, State::Done)
    }
}

impl<'c> Request<'c, ()> {
    pub(crate) fn sent(comm: &'c Communicator) -> Self {
        Self {
            comm,
            state: State::Sent,
            _value: PhantomData,
        }
    }
}

impl<'c, T: DeserializeOwned> Request<'c, T> {
    /// Block until this request completes and return its value.
    pub fn wait(self) -> Result<T> {
        let mut values = Self::wait_all(vec![self])?;
        values
            .pop()
            .ok_or_else(|| Error::Internal("wait produced no value".into()))
    }

    /// Block until every request completes. Values come back in request order.
    pub fn wait_all(mut requests: Vec<Self>) -> Result<Vec<T>> {
        let Some(first) = requests.first() else {
            return Ok(Vec::new());
        };
        let comm = first.comm;

        let states: Vec<State> = requests.iter_mut().map(Request::take_state).collect();
        let ids: Vec<u64> = states
            .iter()
            .filter_map(|state| match state {
                State::Posted(id) => Some(*id),
                _ => None,
            })
            .collect();

        if let Err(err) = comm.wait_slots(&ids) {
            for id in ids {
                comm.cancel_slot(id);
            }
            return Err(err);
        }

        states
            .into_iter()
            .map(|state| match state {
                // send requests are typed `()`, which decodes from an empty payload
                State::Sent | State::Done => decode_payload(&[]),
                State::Posted(id) => {
                    let payload = comm.take_slot(id).ok_or_else(|| {
                        Error::Internal(format!("receive {id} completed without payload"))
                    })?;
                    decode_payload(&payload)
                }
            })
            .collect()
    }
}

impl<T> Drop for Request<'_, T> {
    fn drop(&mut self) {
        if let State::Posted(id) = self.state {
            let discarded = self.comm.cancel_slot(id);
            tracing::warn!(
                rank = self.comm.rank(),
                request = id,
                discarded,
                "receive request dropped before completion"
            );
        }
    }
}

/// Claim on one value inside a [`Completed`] set
#[derive(Debug)]
pub struct Ticket<T> {
    index: usize,
    _value: PhantomData<fn() -> T>,
}

#[derive(Debug)]
enum Slot {
    Sent,
    Posted(u64),
}

/// Group of requests of mixed value types, completed together.
#[derive(Debug)]
pub struct RequestSet<'c> {
    comm: &'c Communicator,
    slots: Vec<Slot>,
}

impl<'c> RequestSet<'c> {
    pub fn new(comm: &'c Communicator) -> Self {
        Self {
            comm,
            slots: Vec::new(),
        }
    }

    /// Move `request` into the set. The ticket redeems its value after `wait_all`.
    pub fn push<T>(&mut self, mut request: Request<'c, T>) -> Ticket<T> {
        debug_assert!(
            std::ptr::eq(request.comm, self.comm),
            "request belongs to a different communicator"
        );

        let slot = match request.take_state() {
            State::Posted(id) => Slot::Posted(id),
            State::Sent | State::Done => Slot::Sent,
        };
        self.slots.push(slot);

        Ticket {
            index: self.slots.len() - 1,
            _value: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Non-blocking check whether every request in the set has completed.
    pub fn test_all(&mut self) -> Result<bool> {
        for slot in &self.slots {
            if let Slot::Posted(id) = slot {
                if !self.comm.test_slot(*id)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Block until every request completes.
    pub fn wait_all(mut self) -> Result<Completed> {
        let slots = std::mem::take(&mut self.slots);
        let ids: Vec<u64> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Posted(id) => Some(*id),
                Slot::Sent => None,
            })
            .collect();

        if let Err(err) = self.comm.wait_slots(&ids) {
            for id in ids {
                self.comm.cancel_slot(id);
            }
            return Err(err);
        }

        let payloads = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Sent => Some(Vec::new()),
                Slot::Posted(id) => self.comm.take_slot(id),
            })
            .collect();

        Ok(Completed { payloads })
    }
}

impl Drop for RequestSet<'_> {
    fn drop(&mut self) {
        for slot in &self.slots {
            if let Slot::Posted(id) = slot {
                self.comm.cancel_slot(*id);
                tracing::warn!(
                    rank = self.comm.rank(),
                    request = id,
                    "request set dropped before completion"
                );
            }
        }
    }
}

/// Values of a completed [`RequestSet`]
#[derive(Debug)]
pub struct Completed {
    payloads: Vec<Option<Vec<u8>>>,
}

impl Completed {
    /// Redeem a ticket issued by the set that produced this value.
    pub fn take<T: DeserializeOwned>(&mut self, ticket: Ticket<T>) -> Result<T> {
        let payload = self
            .payloads
            .get_mut(ticket.index)
            .and_then(Option::take)
            .ok_or_else(|| Error::Internal(format!("no value for ticket {}", ticket.index)))?;
        decode_payload(&payload)
    }
}
