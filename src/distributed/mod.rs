//! In-process message-passing substrate
//!
//! This module provides the group-communication layer that the aggregation
//! strategies are built on.
//!
//! # Architecture
//!
//! A [`World`] of `size` ranks runs one thread per rank:
//!
//! - **Communicator**: each rank's endpoint. Point-to-point `send`/`recv`, non-blocking
//!   `isend`/`irecv`, and the `barrier`/`reduce` collectives
//! - **Inbox**: an unbounded crossbeam channel per rank; envelopes from any source land
//!   here and are matched by exact `(source, tag)`
//! - **Supervisor**: the thread that called [`World::run`]; aborts the group on error,
//!   panic, or stall timeout
//!
//! # Modules
//!
//! - `protocol`: envelope format, tag space, payload codec
//! - `datatype`: reducible element types and reduction operations
//! - `communicator`: matching engine and collectives
//! - `request`: non-blocking request handles
//! - `world`: group launcher and supervisor

pub mod communicator;
pub mod datatype;
pub mod protocol;
pub mod request;
pub mod world;

pub use communicator::Communicator;
pub use datatype::{Datatype, ReduceOp};
pub use protocol::{Envelope, Rank, Tag, MAX_USER_TAG};
pub use request::{Completed, Request, RequestSet, Ticket};
pub use world::World;
