use std::sync::atomic::Ordering;

use crate::atomics::{AtomicF64, AtomicU64};

/// Tracks the count, total and maximum of recorded amounts.
///
/// Typical amounts are payload sizes or batch lengths: anything that is not a duration.
#[derive(Debug)]
pub struct DistributionSummary {
    count: AtomicU64,
    total: AtomicF64,
    max: AtomicF64,
    scale: f64,
}

impl DistributionSummary {
    /// Creates a new summary that records amounts unchanged.
    pub fn new() -> Self {
        Self::with_scale(1.0)
    }

    /// Creates a new summary that multiplies every recorded amount by `scale`.
    pub fn with_scale(scale: f64) -> Self {
        Self { count: AtomicU64::new(0), total: AtomicF64::new(0.0), max: AtomicF64::new(0.0), scale }
    }

    /// Records an amount.
    ///
    /// Negative and NaN amounts are ignored.
    pub fn record(&self, amount: f64) {
        if amount.is_nan() || amount < 0.0 {
            return;
        }

        let scaled = amount * self.scale;
        self.count.fetch_add(1, Ordering::Release);
        self.total.add(scaled);
        self.max.fetch_max(scaled);
    }

    /// Number of recorded amounts.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Sum of all recorded amounts.
    pub fn total_amount(&self) -> f64 {
        self.total.load()
    }

    /// Mean of all recorded amounts, or zero when nothing has been recorded.
    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.total_amount() / count as f64
    }

    /// Largest recorded amount.
    pub fn max(&self) -> f64 {
        self.max.load()
    }
}

impl Default for DistributionSummary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::DistributionSummary;
    use approx::assert_relative_eq;

    #[test]
    fn test_record() {
        let summary = DistributionSummary::new();
        assert_eq!(summary.mean(), 0.0);

        summary.record(1.0);
        summary.record(2.0);
        summary.record(3.0);

        assert_eq!(summary.count(), 3);
        assert_relative_eq!(summary.total_amount(), 6.0);
        assert_relative_eq!(summary.mean(), 2.0);
        assert_relative_eq!(summary.max(), 3.0);
    }

    #[test]
    fn test_invalid_amounts_are_ignored() {
        let summary = DistributionSummary::new();
        summary.record(-1.0);
        summary.record(f64::NAN);
        assert_eq!(summary.count(), 0);
        assert_eq!(summary.total_amount(), 0.0);
    }

    #[test]
    fn test_scale() {
        let summary = DistributionSummary::with_scale(1024.0);
        summary.record(2.0);
        summary.record(0.5);

        assert_eq!(summary.count(), 2);
        assert_relative_eq!(summary.total_amount(), 2560.0);
        assert_relative_eq!(summary.max(), 2048.0);
    }
}
