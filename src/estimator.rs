//! Final estimate from an aggregate
//!
//! Runs on the collector only. Two estimate kinds are supported:
//!
//! - **Area ratio**: `4 × qualifying / trials` for hit-or-miss sampling of the unit
//!   quarter circle
//! - **Weighted sum**: the aggregated value itself, for domain integration where every
//!   partial is already weighted by its cell width
//!
//! Zero trials is reported as [`Error::DegenerateInput`]; an estimate is never NaN or
//! infinite because of an empty aggregate.

use crate::error::{Error, Result};
use crate::sampler::PartialResult;
use serde::{Deserialize, Serialize};

/// ∫ cos(x) dx over [-1, 1] = 2·sin(1)
pub const COS_INTEGRAL_REFERENCE: f64 = 1.682941969615793;

/// How the aggregate maps to an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateKind {
    /// `4 × value / trials`
    AreaRatio,
    /// `value`
    WeightedSum,
}

/// Estimate kind plus the exact value it is compared against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimator {
    pub kind: EstimateKind,
    pub reference: f64,
}

/// Outcome of one estimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    pub reference: f64,
    pub abs_error: f64,
    pub rel_error: f64,
}

impl Estimator {
    pub fn new(kind: EstimateKind, reference: f64) -> Self {
        Self { kind, reference }
    }

    pub fn pi() -> Self {
        Self::new(EstimateKind::AreaRatio, std::f64::consts::PI)
    }

    pub fn cosine_integral() -> Self {
        Self::new(EstimateKind::WeightedSum, COS_INTEGRAL_REFERENCE)
    }

    /// Estimate from the aggregated value and trial count.
    pub fn estimate(&self, total: &PartialResult) -> Result<Estimate> {
        if total.trials == 0 {
            return Err(Error::DegenerateInput(format!(
                "aggregate has zero trials (value {})",
                total.value
            )));
        }

        let value = match self.kind {
            EstimateKind::AreaRatio => 4.0 * total.value / total.trials as f64,
            EstimateKind::WeightedSum => total.value,
        };

        if !value.is_finite() {
            return Err(Error::DegenerateInput(format!("non-finite estimate {value}")));
        }

        let abs_error = (value - self.reference).abs();
        let rel_error = if self.reference != 0.0 {
            abs_error / self.reference.abs()
        } else {
            0.0
        };

        Ok(Estimate {
            value,
            reference: self.reference,
            abs_error,
            rel_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_qualifying_is_zero() {
        let estimate = Estimator::pi().estimate(&PartialResult::new(0.0, 1000)).unwrap();
        assert_eq!(estimate.value, 0.0);
        assert_eq!(estimate.abs_error, std::f64::consts::PI);
    }

    #[test]
    fn test_zero_trials_is_degenerate() {
        let result = Estimator::pi().estimate(&PartialResult::empty());
        assert!(matches!(result, Err(Error::DegenerateInput(_))));

        let result = Estimator::cosine_integral().estimate(&PartialResult::new(1.5, 0));
        assert!(matches!(result, Err(Error::DegenerateInput(_))));
    }

    #[test]
    fn test_area_ratio() {
        let estimate = Estimator::pi().estimate(&PartialResult::new(2355.0, 3000)).unwrap();
        assert!((estimate.value - 3.14).abs() < 1e-12);
        assert!((estimate.abs_error - (std::f64::consts::PI - 3.14)).abs() < 1e-12);
        assert!(estimate.rel_error > 0.0 && estimate.rel_error < 0.001);
    }

    #[test]
    fn test_weighted_sum() {
        let estimate = Estimator::cosine_integral()
            .estimate(&PartialResult::new(1.6829419, 600))
            .unwrap();
        assert_eq!(estimate.value, 1.6829419);
        assert!(estimate.abs_error < 1e-6);
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let result = Estimator::cosine_integral().estimate(&PartialResult::new(f64::NAN, 10));
        assert!(matches!(result, Err(Error::DegenerateInput(_))));
    }
}
