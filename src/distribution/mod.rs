//! Sample point generators
//!
//! This module provides the point sources a local computation draws from. Every
//! generator yields positions in the unit interval `[0, 1)`; the computation maps them
//! onto its own domain.
//!
//! # Distributions
//!
//! - **Uniform**: independent pseudo-random points (Monte Carlo sampling)
//! - **Sequential**: cell midpoints of a partition, in order (midpoint rule)
//!
//! # Example
//!
//! ```
//! use distmc::distribution::{Distribution, uniform::UniformDistribution};
//!
//! let mut dist = UniformDistribution::with_seed(35791246);
//! let x = dist.next_unit();
//! assert!((0.0..1.0).contains(&x));
//! ```

/// Source of sample positions in `[0, 1)`
///
/// # Thread Safety
///
/// Distributions must be `Send` so a rank thread can own one. Each rank owns its own
/// instance; nothing is shared between ranks.
pub trait Distribution: Send {
    /// Next position in `[0, 1)`
    fn next_unit(&mut self) -> f64;
}

pub mod sequential;
pub mod uniform;
