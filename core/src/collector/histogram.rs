//! Latency histogram

use std::time::Duration;

use hdrhistogram::Histogram;

/// Upper bound of the recordable range, in milliseconds.
const MAX_LATENCY_MS: u64 = 60_000;

/// High-dynamic-range latency histogram.
///
/// Covers 1 ms to 60 s at three significant digits; values are recorded in
/// whole milliseconds and saturate at the upper bound.
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_LATENCY_MS, 3)
            .expect("histogram bounds are static and valid");
        Self { histogram }
    }

    /// Record one latency sample.
    pub fn record(&mut self, latency: Duration) {
        let ms = (latency.as_millis() as u64).min(MAX_LATENCY_MS);
        // Saturated values cannot fail to record.
        let _ = self.histogram.record(ms);
    }

    /// Number of recorded samples.
    pub fn total(&self) -> u64 {
        self.histogram.len()
    }

    /// Largest recorded value in milliseconds.
    pub fn max(&self) -> u64 {
        self.histogram.max()
    }

    /// Mean of recorded values in milliseconds.
    pub fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    /// Value at the given quantile (0.0 - 1.0) in milliseconds.
    pub fn quantile(&self, q: f64) -> u64 {
        self.histogram.value_at_quantile(q)
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("total", &self.total())
            .field("max_ms", &self.max())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_track_recorded_values() {
        let mut histogram = LatencyHistogram::new();
        for ms in 1..=100 {
            histogram.record(Duration::from_millis(ms));
        }

        assert_eq!(histogram.total(), 100);
        assert!((histogram.mean() - 50.5).abs() < 1.0);
        let p50 = histogram.quantile(0.50);
        assert!((49..=51).contains(&p50));
        assert_eq!(histogram.quantile(1.0), histogram.max());
    }

    #[test]
    fn values_saturate_at_sixty_seconds() {
        let mut histogram = LatencyHistogram::new();
        histogram.record(Duration::from_secs(3600));
        assert!(histogram.max() <= MAX_LATENCY_MS);
        assert_eq!(histogram.total(), 1);
    }

    #[test]
    fn empty_histogram_reports_zeroes() {
        let histogram = LatencyHistogram::new();
        assert_eq!(histogram.total(), 0);
        assert_eq!(histogram.max(), 0);
        assert_eq!(histogram.quantile(0.99), 0);
    }

    #[test]
    fn sub_millisecond_latencies_are_recorded() {
        let mut histogram = LatencyHistogram::new();
        histogram.record(Duration::from_micros(250));
        assert_eq!(histogram.total(), 1);
    }
}
