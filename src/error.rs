//! Error types for distmc

use crate::aggregation::Phase;
use crate::distributed::{Rank, Tag};
use std::time::Duration;
use thiserror::Error;

/// Result type for group and estimation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for group and estimation operations
#[derive(Error, Debug)]
pub enum Error {
    /// Rank outside `[0, size)`
    #[error("Invalid rank: {rank} (group size {size})")]
    InvalidRank {
        /// The offending rank
        rank: Rank,
        /// Size of the group
        size: usize,
    },

    /// Group size of zero
    #[error("Invalid group size: {0}")]
    InvalidGroupSize(usize),

    /// Tag in the range reserved for collective operations
    #[error("Tag {0:#x} is reserved for collective operations")]
    ReservedTag(Tag),

    /// Send and receive buffers of a collective disagree in length
    #[error("Invalid buffer: expected {expected} elements, got {actual}")]
    InvalidBuffer {
        /// Length the operation expected
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Estimation over zero trials
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Ranks that made no progress before the supervisor deadline
    #[error("Liveness hazard: ranks {pending:?} still blocked after {timeout:?}")]
    LivenessHazard {
        /// Ranks that had not finished
        pending: Vec<Rank>,
        /// Deadline that expired
        timeout: Duration,
    },

    /// Round phase change that the state machine does not allow
    #[error("Illegal phase transition: {from} -> {to}")]
    IllegalTransition {
        /// Phase the rank was in
        from: Phase,
        /// Phase that was requested
        to: Phase,
    },

    /// Destination rank has already left the group
    #[error("Rank {0} has left the group")]
    PeerGone(Rank),

    /// The group was aborted by its supervisor
    #[error("Group aborted by supervisor")]
    Aborted,

    /// A rank thread panicked
    #[error("Rank {rank} panicked: {message}")]
    RankPanicked {
        /// Rank whose thread panicked
        rank: Rank,
        /// Panic payload, if it was a string
        message: String,
    },

    /// Payload (de)serialization failure
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a consequence of an abort rather than its cause.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}
