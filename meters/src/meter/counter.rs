use crate::atomics::AtomicF64;

/// A monotonically increasing count.
///
/// Counters are updated with atomic additions, so any number of threads may increment the same
/// counter concurrently without losing updates.
#[derive(Debug, Default)]
pub struct Counter {
    total: AtomicF64,
}

impl Counter {
    /// Creates a new counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by one.
    pub fn increment(&self) {
        self.total.add(1.0);
    }

    /// Increments the counter by the given amount.
    ///
    /// Negative and NaN amounts are ignored so that the total never decreases.
    pub fn increment_by(&self, amount: f64) {
        if amount >= 0.0 {
            self.total.add(amount);
        }
    }

    /// Cumulative count since the counter was created.
    pub fn count(&self) -> f64 {
        self.total.load()
    }
}

#[cfg(test)]
mod tests {
    use super::Counter;
    use quickcheck_macros::quickcheck;
    use std::{sync::Arc, thread};

    #[test]
    fn test_increment() {
        let counter = Counter::new();
        assert_eq!(counter.count(), 0.0);

        counter.increment();
        counter.increment_by(5.0);
        assert_eq!(counter.count(), 6.0);

        counter.increment_by(-3.0);
        counter.increment_by(f64::NAN);
        assert_eq!(counter.count(), 6.0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let counter = Arc::new(Counter::new());
        let handles = (1..=8u32)
            .map(|n| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        counter.increment_by(f64::from(n));
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        // 10_000 * (1 + 2 + ... + 8)
        assert_eq!(counter.count(), 360_000.0);
    }

    #[quickcheck]
    fn prop_count_is_sum_of_increments(amounts: Vec<u16>) -> bool {
        let counter = Counter::new();
        let mut expected = 0.0;
        for amount in amounts {
            counter.increment_by(f64::from(amount));
            expected += f64::from(amount);
        }
        counter.count() == expected
    }
}
