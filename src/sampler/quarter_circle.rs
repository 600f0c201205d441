//! Hit-or-miss sampling of the unit quarter circle

use super::{LocalComputation, PartialResult, RankContext};
use crate::distribution::{uniform::UniformDistribution, Distribution};

/// Counts uniform points of `[0, 1)²` with `x² + y² <= 1`.
///
/// The hit ratio converges to π/4.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuarterCircle;

impl LocalComputation for QuarterCircle {
    fn sample(&self, ctx: &RankContext, trials: u64) -> PartialResult {
        let mut dist = UniformDistribution::with_seed(ctx.seed);
        let mut hits = 0u64;

        for _ in 0..trials {
            let x = dist.next_unit();
            let y = dist.next_unit();
            if x * x + y * y <= 1.0 {
                hits += 1;
            }
        }

        PartialResult::new(hits as f64, trials)
    }
}
