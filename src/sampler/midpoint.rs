//! Midpoint-rule integration split across ranks
//!
//! `[lower, upper]` is divided into `producers × n` equal cells. The rank at producer
//! slot `p` owns cells `p·n .. p·n + n` and sums `f(midpoint) · width` over them, so
//! the partial values of all producers add up to the whole integral.

use super::{LocalComputation, PartialResult, RankContext};
use crate::distribution::{sequential::SequentialDistribution, Distribution};

/// Midpoint rule for `integrand` over `[lower, upper]`
#[derive(Debug, Clone, Copy)]
pub struct MidpointIntegral {
    pub lower: f64,
    pub upper: f64,
    pub integrand: fn(f64) -> f64,
}

impl MidpointIntegral {
    pub fn new(lower: f64, upper: f64, integrand: fn(f64) -> f64) -> Self {
        Self {
            lower,
            upper,
            integrand,
        }
    }

    /// ∫ cos(x) dx over [-1, 1]
    pub fn cosine() -> Self {
        Self::new(-1.0, 1.0, f64::cos)
    }
}

impl LocalComputation for MidpointIntegral {
    fn sample(&self, ctx: &RankContext, cells: u64) -> PartialResult {
        let producers = ctx.producers.max(1) as u64;
        let (Some(total_cells), Some(first_cell)) = (
            producers.checked_mul(cells),
            (ctx.producer_index as u64).checked_mul(cells),
        ) else {
            tracing::warn!(rank = ctx.rank, producers, cells, "cell count overflows u64");
            return PartialResult::empty();
        };
        let span = self.upper - self.lower;

        let mut dist = SequentialDistribution::new(first_cell, cells, total_cells);
        let width = span * dist.cell_width();

        let value = (0..cells)
            .map(|_| (self.integrand)(self.lower + dist.next_unit() * span) * width)
            .sum();

        PartialResult::new(value, cells)
    }
}
