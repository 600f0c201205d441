//! Per-rank communicator: point-to-point transfers, matching, and collectives.

use super::datatype::{combine_into, Datatype, ReduceOp};
use super::protocol::{
    check_user_tag, decode_payload, encode_payload, Envelope, Packet, Rank, Tag,
    BARRIER_GATHER_TAG, BARRIER_RELEASE_TAG, REDUCE_TAG,
};
use super::request::Request;
use crate::error::{Error, Result};
use crate::util::time::Timestamp;
use crossbeam::channel::{Receiver, Sender, TryRecvError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A receive that has been posted but not yet consumed
#[derive(Debug)]
struct PostedRecv {
    id: u64,
    source: Rank,
    tag: Tag,
    payload: Option<Vec<u8>>,
}

/// One rank's endpoint into its group.
///
/// A `Communicator` is handed to each rank by [`World::run`](super::World::run). It can
/// move into the rank's thread but is not `Sync`: matching state is rank-local and
/// every operation must be issued by the owning rank.
///
/// # Matching
///
/// Incoming envelopes are matched to the earliest posted receive with the same
/// `(source, tag)`. Envelopes nobody has asked for yet wait in an unexpected queue,
/// in arrival order. Because delivery between two ranks is FIFO, two messages on the
/// same channel are always received in the order they were sent.
///
/// # Example
///
/// ```
/// use distmc::distributed::World;
///
/// let world = World::new(2).unwrap();
/// let echoed = world.run(move |comm| {
///     if comm.rank() == 0 {
///         comm.send(&41u64, 1, 0)?;
///         comm.recv::<u64>(1, 0)
///     } else {
///         let value: u64 = comm.recv(0, 0)?;
///         comm.send(&(value + 1), 0, 0)?;
///         Ok(value)
///     }
/// }).unwrap();
///
/// assert_eq!(echoed, vec![42, 41]);
/// ```
pub struct Communicator {
    rank: Rank,
    size: usize,
    outboxes: Arc<[Sender<Packet>]>,
    inbox: Receiver<Packet>,
    unexpected: RefCell<VecDeque<Envelope>>,
    posted: RefCell<Vec<PostedRecv>>,
    next_request_id: Cell<u64>,
    aborted: Arc<AtomicBool>,
    epoch: Timestamp,
}

impl Communicator {
    pub(crate) fn new(
        rank: Rank,
        outboxes: Arc<[Sender<Packet>]>,
        inbox: Receiver<Packet>,
        aborted: Arc<AtomicBool>,
        epoch: Timestamp,
    ) -> Self {
        Self {
            rank,
            size: outboxes.len(),
            outboxes,
            inbox,
            unexpected: RefCell::new(VecDeque::new()),
            posted: RefCell::new(Vec::new()),
            next_request_id: Cell::new(0),
            aborted,
            epoch,
        }
    }

    /// Rank of the calling participant.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Number of participants in the group.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Seconds since the group was launched.
    ///
    /// Monotonic and shared by every rank of the group, so readings from different
    /// ranks are comparable.
    pub fn wtime(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Number of envelopes that arrived before a matching receive was posted.
    pub fn unexpected_len(&self) -> usize {
        self.unexpected.borrow().len()
    }

    // ========================================================================
    // Point-to-Point Communication
    // ========================================================================

    /// Blocking send of one value to `dest` on channel `tag`.
    ///
    /// Returns once the envelope is handed to the transport. Delivery is eager, so
    /// the sender never waits for the matching receive.
    pub fn send<T: Serialize + ?Sized>(&self, value: &T, dest: Rank, tag: Tag) -> Result<()> {
        check_user_tag(tag)?;
        let payload = encode_payload(value)?;
        self.post(dest, tag, payload)
    }

    /// Blocking receive of one value from exactly `source` on channel `tag`.
    ///
    /// Blocks until that rank's message has arrived. There is no wildcard source:
    /// if `source` never sends, this call never returns unless the group is aborted.
    pub fn recv<T: DeserializeOwned>(&self, source: Rank, tag: Tag) -> Result<T> {
        check_user_tag(tag)?;
        let payload = self.recv_raw(source, tag)?;
        decode_payload(&payload)
    }

    /// Non-blocking send.
    ///
    /// Ownership of `buffer` moves into the transfer; it cannot be touched again by
    /// the caller, so a send buffer can never be mutated while in flight. The returned
    /// request must still be waited on before the send is considered complete.
    pub fn isend<T: Serialize>(&self, buffer: T, dest: Rank, tag: Tag) -> Result<Request<'_, ()>> {
        check_user_tag(tag)?;
        let payload = encode_payload(&buffer)?;
        self.post(dest, tag, payload)?;
        Ok(Request::sent(self))
    }

    /// Non-blocking receive from exactly `source` on channel `tag`.
    ///
    /// The received value is only reachable through [`Request::wait`],
    /// [`Request::wait_all`], or a [`RequestSet`](super::RequestSet).
    pub fn irecv<T: DeserializeOwned>(&self, source: Rank, tag: Tag) -> Result<Request<'_, T>> {
        check_user_tag(tag)?;
        let id = self.post_recv(source, tag)?;
        Ok(Request::posted(self, id))
    }

    // ========================================================================
    // Collectives
    // ========================================================================

    /// Barrier synchronization.
    ///
    /// All ranks must call this. No rank returns until every rank has entered.
    pub fn barrier(&self) -> Result<()> {
        if self.size == 1 {
            return self.check_live();
        }

        if self.rank == 0 {
            for source in 1..self.size {
                self.recv_raw(source, BARRIER_GATHER_TAG)?;
            }
            for dest in 1..self.size {
                self.post(dest, BARRIER_RELEASE_TAG, Vec::new())?;
            }
        } else {
            self.post(0, BARRIER_GATHER_TAG, Vec::new())?;
            self.recv_raw(0, BARRIER_RELEASE_TAG)?;
        }
        Ok(())
    }

    /// Reduce `send` element-wise onto `root`.
    ///
    /// All ranks must call this with slices of equal length. Returns `Some` with the
    /// combined values on `root` and `None` everywhere else.
    ///
    /// Values travel up a binomial tree rooted at `root`, so the root performs
    /// `log2(size)` receives instead of `size - 1`.
    pub fn reduce<T: Datatype>(&self, send: &[T], op: ReduceOp, root: Rank) -> Result<Option<Vec<T>>> {
        self.check_rank(root)?;

        let mut acc = send.to_vec();
        let relative = (self.rank + self.size - root) % self.size;
        let mut mask = 1;

        while mask < self.size {
            if relative & mask != 0 {
                let parent = (relative - mask + root) % self.size;
                self.post(parent, REDUCE_TAG, encode_payload(&acc)?)?;
                return Ok(None);
            }

            let child_relative = relative + mask;
            if child_relative < self.size {
                let child = (child_relative + root) % self.size;
                let incoming: Vec<T> = decode_payload(&self.recv_raw(child, REDUCE_TAG)?)?;
                if incoming.len() != acc.len() {
                    return Err(Error::InvalidBuffer {
                        expected: acc.len(),
                        actual: incoming.len(),
                    });
                }
                combine_into(op, &mut acc, &incoming);
            }
            mask <<= 1;
        }

        Ok(Some(acc))
    }

    /// Reduce a single value onto `root`.
    pub fn reduce_scalar<T: Datatype>(&self, value: T, op: ReduceOp, root: Rank) -> Result<Option<T>> {
        Ok(self
            .reduce(&[value], op, root)?
            .and_then(|combined| combined.into_iter().next()))
    }

    // ========================================================================
    // Matching engine
    // ========================================================================

    fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank >= self.size {
            return Err(Error::InvalidRank {
                rank,
                size: self.size,
            });
        }
        Ok(())
    }

    fn check_live(&self) -> Result<()> {
        if self.aborted.load(Ordering::Acquire) {
            return Err(Error::Aborted);
        }
        Ok(())
    }

    /// Push an already-encoded payload to `dest`
    fn post(&self, dest: Rank, tag: Tag, payload: Vec<u8>) -> Result<()> {
        self.check_live()?;
        self.check_rank(dest)?;

        tracing::trace!(source = self.rank, dest, tag, bytes = payload.len(), "send");

        let envelope = Envelope {
            source: self.rank,
            tag,
            payload,
        };
        self.outboxes[dest]
            .send(Packet::Message(envelope))
            .map_err(|_| Error::PeerGone(dest))
    }

    fn recv_raw(&self, source: Rank, tag: Tag) -> Result<Vec<u8>> {
        let id = self.post_recv(source, tag)?;
        self.wait_slots(&[id])?;
        self.take_slot(id)
            .ok_or_else(|| Error::Internal(format!("receive {id} completed without payload")))
    }

    /// Post a receive; satisfied immediately if a matching envelope is already queued
    pub(crate) fn post_recv(&self, source: Rank, tag: Tag) -> Result<u64> {
        self.check_live()?;
        self.check_rank(source)?;

        let id = self.next_request_id.get();
        self.next_request_id.set(id + 1);

        let payload = {
            let mut queue = self.unexpected.borrow_mut();
            queue
                .iter()
                .position(|env| env.matches(source, tag))
                .and_then(|index| queue.remove(index))
                .map(|env| env.payload)
        };

        self.posted.borrow_mut().push(PostedRecv {
            id,
            source,
            tag,
            payload,
        });
        Ok(id)
    }

    /// Pull one packet off the inbox. Returns `false` if none was available.
    fn progress(&self, block: bool) -> Result<bool> {
        self.check_live()?;

        let packet = if block {
            self.inbox
                .recv()
                .map_err(|_| Error::Internal(format!("inbox of rank {} disconnected", self.rank)))?
        } else {
            match self.inbox.try_recv() {
                Ok(packet) => packet,
                Err(TryRecvError::Empty) => return Ok(false),
                Err(TryRecvError::Disconnected) => {
                    return Err(Error::Internal(format!(
                        "inbox of rank {} disconnected",
                        self.rank
                    )))
                }
            }
        };

        match packet {
            Packet::Abort => {
                self.aborted.store(true, Ordering::Release);
                Err(Error::Aborted)
            }
            Packet::Message(envelope) => {
                tracing::trace!(
                    rank = self.rank,
                    source = envelope.source,
                    tag = envelope.tag,
                    "deliver"
                );
                self.deliver(envelope);
                Ok(true)
            }
        }
    }

    fn deliver(&self, envelope: Envelope) {
        let mut posted = self.posted.borrow_mut();
        match posted
            .iter_mut()
            .find(|slot| slot.payload.is_none() && envelope.matches(slot.source, slot.tag))
        {
            Some(slot) => slot.payload = Some(envelope.payload),
            None => self.unexpected.borrow_mut().push_back(envelope),
        }
    }

    /// Number of `ids` still waiting for a payload
    fn pending_among(&self, ids: &[u64]) -> Result<usize> {
        let posted = self.posted.borrow();
        let mut pending = 0;
        for id in ids {
            match posted.iter().find(|slot| slot.id == *id) {
                Some(slot) if slot.payload.is_none() => pending += 1,
                Some(_) => {}
                None => return Err(Error::Internal(format!("unknown request {id}"))),
            }
        }
        Ok(pending)
    }

    /// Drain whatever has arrived and report whether `id` is complete
    pub(crate) fn test_slot(&self, id: u64) -> Result<bool> {
        while self.progress(false)? {}
        Ok(self.pending_among(&[id])? == 0)
    }

    /// Block until every slot in `ids` holds a payload
    pub(crate) fn wait_slots(&self, ids: &[u64]) -> Result<()> {
        while self.pending_among(ids)? > 0 {
            self.progress(true)?;
        }
        Ok(())
    }

    /// Remove a completed slot and hand out its payload
    pub(crate) fn take_slot(&self, id: u64) -> Option<Vec<u8>> {
        let mut posted = self.posted.borrow_mut();
        let index = posted
            .iter()
            .position(|slot| slot.id == id && slot.payload.is_some())?;
        posted.remove(index).payload
    }

    /// Withdraw a posted receive. Returns `true` if a delivered payload was discarded.
    pub(crate) fn cancel_slot(&self, id: u64) -> bool {
        let mut posted = self.posted.borrow_mut();
        match posted.iter().position(|slot| slot.id == id) {
            Some(index) => posted.remove(index).payload.is_some(),
            None => false,
        }
    }
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("posted", &self.posted.borrow().len())
            .field("unexpected", &self.unexpected.borrow().len())
            .finish()
    }
}
