//! Statistics across rounds
//!
//! A run repeats the same round several times with fresh seeds. [`RunStats`] keeps:
//!
//! - **Round time**: the collector's distributed time per round, in a histogram
//! - **Sampling time**: the slowest rank's Computing phase per round
//! - **Estimate spread**: mean and standard deviation of the estimates
//!
//! # Example
//!
//! ```
//! use distmc::stats::RunStats;
//! use distmc::estimator::Estimator;
//! use distmc::sampler::PartialResult;
//! use std::time::Duration;
//!
//! let mut stats = RunStats::new();
//! let estimate = Estimator::pi().estimate(&PartialResult::new(785.0, 1000)).unwrap();
//! stats.record_round(Duration::from_millis(5), Duration::from_millis(4), &estimate, 1000);
//!
//! assert_eq!(stats.rounds(), 1);
//! assert_eq!(stats.estimate_mean(), Some(3.14));
//! ```

pub mod histogram;

use crate::estimator::Estimate;
use histogram::{DurationHistogram, DurationSummary};
use serde::Serialize;
use std::time::Duration;

/// Accumulated statistics of one strategy's rounds
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    round_times: DurationHistogram,
    sampling_times: DurationHistogram,
    estimates: Vec<f64>,
    abs_errors: Vec<f64>,
    trials: u64,
    elapsed: Duration,
}

/// Serializable snapshot of [`RunStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub rounds: usize,
    pub trials: u64,
    pub estimate_mean: Option<f64>,
    pub estimate_stddev: Option<f64>,
    pub mean_abs_error: Option<f64>,
    pub round_time: Option<DurationSummary>,
    pub sampling_time: Option<DurationSummary>,
    pub trials_per_sec: f64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one round as seen by its collector
    pub fn record_round(&mut self, round_time: Duration, sampling_time: Duration, estimate: &Estimate, trials: u64) {
        self.round_times.record(round_time);
        self.sampling_times.record(sampling_time);
        self.estimates.push(estimate.value);
        self.abs_errors.push(estimate.abs_error);
        self.trials += trials;
        self.elapsed += round_time;
    }

    pub fn rounds(&self) -> usize {
        self.estimates.len()
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }

    pub fn round_times(&self) -> &DurationHistogram {
        &self.round_times
    }

    pub fn estimate_mean(&self) -> Option<f64> {
        mean(&self.estimates)
    }

    /// Sample standard deviation; `None` below two rounds
    pub fn estimate_stddev(&self) -> Option<f64> {
        if self.estimates.len() < 2 {
            return None;
        }
        let mean = mean(&self.estimates)?;
        let variance = self
            .estimates
            .iter()
            .map(|value| (value - mean).powi(2))
            .sum::<f64>()
            / (self.estimates.len() - 1) as f64;
        Some(variance.sqrt())
    }

    pub fn mean_abs_error(&self) -> Option<f64> {
        mean(&self.abs_errors)
    }

    /// Trials per second of distributed time
    pub fn trials_per_sec(&self) -> f64 {
        crate::util::time::calculate_rate(self.trials, self.elapsed)
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            rounds: self.rounds(),
            trials: self.trials,
            estimate_mean: self.estimate_mean(),
            estimate_stddev: self.estimate_stddev(),
            mean_abs_error: self.mean_abs_error(),
            round_time: self.round_times.summary(),
            sampling_time: self.sampling_times.summary(),
            trials_per_sec: self.trials_per_sec(),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::Estimator;
    use crate::sampler::PartialResult;

    fn estimate(hits: f64) -> Estimate {
        Estimator::pi().estimate(&PartialResult::new(hits, 1000)).unwrap()
    }

    #[test]
    fn test_empty_stats() {
        let stats = RunStats::new();
        assert_eq!(stats.rounds(), 0);
        assert!(stats.estimate_mean().is_none());
        assert!(stats.estimate_stddev().is_none());
        assert_eq!(stats.trials_per_sec(), 0.0);
        assert!(stats.summary().round_time.is_none());
    }

    #[test]
    fn test_estimate_spread() {
        let mut stats = RunStats::new();
        for hits in [780.0, 790.0, 785.0, 795.0] {
            stats.record_round(Duration::from_millis(10), Duration::from_millis(8), &estimate(hits), 1000);
        }

        assert_eq!(stats.rounds(), 4);
        assert_eq!(stats.trials(), 4000);
        assert!((stats.estimate_mean().unwrap() - 3.15).abs() < 1e-12);

        // hits stddev is sqrt(41.67), scaled by 4/1000
        let stddev = stats.estimate_stddev().unwrap();
        assert!((stddev - 4.0 * 41.666_666_666_666_664f64.sqrt() / 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_rate_over_distributed_time() {
        let mut stats = RunStats::new();
        stats.record_round(Duration::from_secs(1), Duration::from_millis(900), &estimate(785.0), 2000);
        stats.record_round(Duration::from_secs(1), Duration::from_millis(900), &estimate(785.0), 2000);

        assert_eq!(stats.trials_per_sec(), 2000.0);
        assert_eq!(stats.summary().round_time.unwrap().samples, 2);
    }
}
