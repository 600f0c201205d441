//! Round duration histogram using HdrHistogram
//!
//! Records one duration per round (the collector's distributed time, or the slowest
//! sampling phase) and answers percentile queries across rounds.
//!
//! # Example
//!
//! ```
//! use distmc::stats::histogram::DurationHistogram;
//! use std::time::Duration;
//!
//! let mut hist = DurationHistogram::new();
//! hist.record(Duration::from_millis(12));
//! hist.record(Duration::from_millis(15));
//!
//! let p50 = hist.percentile(50.0).unwrap();
//! assert!(p50 >= Duration::from_millis(11));
//! ```

use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::Duration;

/// Largest trackable value: one hour in nanoseconds
const MAX_NANOS: u64 = 3_600_000_000_000;

/// Duration histogram
///
/// Tracks 1ns to 1 hour with 3 significant digits, so every reported value is within
/// 0.1% of the recorded one. Values outside the range are clamped.
#[derive(Debug, Clone)]
pub struct DurationHistogram {
    histogram: Histogram<u64>,
}

/// Fixed set of percentiles for reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DurationSummary {
    pub samples: u64,
    pub min: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl DurationHistogram {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_NANOS, 3)
            .expect("constant histogram bounds are valid");

        Self { histogram }
    }

    /// Record one duration
    #[inline]
    pub fn record(&mut self, duration: Duration) {
        let nanos = (duration.as_nanos() as u64).clamp(1, MAX_NANOS);
        // In range after clamping
        let _ = self.histogram.record(nanos);
    }

    /// Duration at `percentile` (0.0 - 100.0), or `None` if empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        self.non_empty()
            .map(|h| Duration::from_nanos(h.value_at_percentile(percentile)))
    }

    pub fn min(&self) -> Option<Duration> {
        self.non_empty().map(|h| Duration::from_nanos(h.min()))
    }

    pub fn max(&self) -> Option<Duration> {
        self.non_empty().map(|h| Duration::from_nanos(h.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        self.non_empty().map(|h| Duration::from_nanos(h.mean() as u64))
    }

    pub fn stddev(&self) -> Option<Duration> {
        self.non_empty().map(|h| Duration::from_nanos(h.stdev() as u64))
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// min / mean / p50 / p99 / max, or `None` if empty
    pub fn summary(&self) -> Option<DurationSummary> {
        Some(DurationSummary {
            samples: self.len(),
            min: self.min()?,
            mean: self.mean()?,
            p50: self.percentile(50.0)?,
            p99: self.percentile(99.0)?,
            max: self.max()?,
        })
    }

    fn non_empty(&self) -> Option<&Histogram<u64>> {
        (!self.is_empty()).then_some(&self.histogram)
    }
}

impl Default for DurationHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_histogram() {
        let hist = DurationHistogram::new();
        assert_eq!(hist.len(), 0);
        assert!(hist.is_empty());
        assert!(hist.summary().is_none());
    }

    #[test]
    fn test_percentile() {
        let mut hist = DurationHistogram::new();
        for i in 1..=100 {
            hist.record(Duration::from_micros(i * 10));
        }

        let p50 = hist.percentile(50.0).unwrap();
        let p99 = hist.percentile(99.0).unwrap();

        assert!(p50.as_micros() >= 450 && p50.as_micros() <= 550);
        assert!(p99.as_micros() >= 940 && p99.as_micros() <= 1040);
    }

    #[test]
    fn test_percentile_empty() {
        let hist = DurationHistogram::new();
        assert!(hist.percentile(50.0).is_none());
        assert!(hist.min().is_none());
    }

    #[test]
    fn test_min_max_mean() {
        let mut hist = DurationHistogram::new();
        hist.record(Duration::from_micros(100));
        hist.record(Duration::from_micros(300));
        hist.record(Duration::from_micros(200));

        assert!(hist.min().unwrap().as_micros() >= 99);
        assert!(hist.max().unwrap().as_micros() <= 301);

        let mean = hist.mean().unwrap();
        assert!(mean.as_micros() >= 190 && mean.as_micros() <= 210);

        let stddev = hist.stddev().unwrap();
        assert!(stddev.as_micros() >= 70 && stddev.as_micros() <= 90);
    }

    #[test]
    fn test_clamps_out_of_range() {
        let mut hist = DurationHistogram::new();
        hist.record(Duration::ZERO);
        hist.record(Duration::from_secs(7200));

        assert_eq!(hist.len(), 2);
        assert_eq!(hist.min().unwrap(), Duration::from_nanos(1));
        assert!(hist.max().unwrap() <= Duration::from_secs(3601));
    }

    #[test]
    fn test_summary() {
        let mut hist = DurationHistogram::new();
        for ms in [10, 20, 30] {
            hist.record(Duration::from_millis(ms));
        }

        let summary = hist.summary().unwrap();
        assert_eq!(summary.samples, 3);
        assert!(summary.min <= summary.p50 && summary.p50 <= summary.max);
    }
}
