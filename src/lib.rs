//! distmc - distributed Monte Carlo estimation
//!
//! A group of ranks samples a problem independently and the partial results are
//! aggregated on one collector rank, which turns them into an estimate.
//!
//! # Architecture
//!
//! - **Message passing**: ranks are threads that share nothing and talk only through
//!   a [`distributed::Communicator`] (send/recv, non-blocking requests, barrier, reduce)
//! - **Aggregation strategies**: blocking point-to-point, non-blocking point-to-point
//!   and collective reduction, behind one [`aggregation::AggregationStrategy`] trait
//! - **Problems**: π by quarter-circle sampling, ∫cos over [-1, 1] by the midpoint rule
//! - **Runs**: repeated rounds, strategy comparison and a serial baseline, with timing
//!   histograms and text/JSON reports

pub mod aggregation;
pub mod config;
pub mod coordinator;
pub mod distributed;
pub mod distribution;
pub mod error;
pub mod estimator;
pub mod output;
pub mod sampler;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
