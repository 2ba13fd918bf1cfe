use std::{
    fmt,
    sync::atomic::Ordering,
    time::Duration,
};

use quanta::{Clock, Instant};

use crate::{atomics::AtomicU64, TimeUnit};

/// Tracks the count, total and maximum of recorded durations.
///
/// Durations are stored in nanoseconds and converted to the caller's unit on read. Recording is
/// lock-free; reads are a best-effort snapshot and may observe a recording that has updated the
/// count but not yet the total.
pub struct Timer {
    count: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
    clock: Clock,
}

impl Timer {
    /// Creates a new timer that measures with the given clock.
    pub fn new(clock: Clock) -> Self {
        Self {
            count: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            max_nanos: AtomicU64::new(0),
            clock,
        }
    }

    /// Records a duration.
    pub fn record(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.record_nanos(nanos);
    }

    /// Records a duration given in nanoseconds.
    ///
    /// The running total saturates at `u64::MAX` nanoseconds instead of wrapping.
    pub fn record_nanos(&self, nanos: u64) {
        self.count.fetch_add(1, Ordering::Release);
        let _ = self.total_nanos.fetch_update(Ordering::AcqRel, Ordering::Acquire, |total| {
            Some(total.saturating_add(nanos))
        });
        self.max_nanos.fetch_max(nanos, Ordering::AcqRel);
    }

    /// Runs `f`, records how long it took, and returns its result.
    pub fn record_fn<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = self.clock.now();
        let result = f();
        self.record(self.clock.now().duration_since(start));
        result
    }

    /// Starts a [`Sample`] using this timer's clock.
    pub fn start(&self) -> Sample {
        Sample::start(&self.clock)
    }

    /// Number of recorded durations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Sum of all recorded durations, in `unit`.
    pub fn total_time(&self, unit: TimeUnit) -> f64 {
        unit.from_nanos(self.total_nanos.load(Ordering::Acquire) as f64)
    }

    /// Mean of all recorded durations, in `unit`.
    ///
    /// Returns zero when nothing has been recorded.
    pub fn mean(&self, unit: TimeUnit) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        self.total_time(unit) / count as f64
    }

    /// Largest recorded duration, in `unit`.
    pub fn max(&self, unit: TimeUnit) -> f64 {
        unit.from_nanos(self.max_nanos.load(Ordering::Acquire) as f64)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("count", &self.count())
            .field("total_nanos", &self.total_nanos.load(Ordering::Acquire))
            .field("max_nanos", &self.max_nanos.load(Ordering::Acquire))
            .finish()
    }
}

/// A captured start instant, to be stopped against a timer later.
///
/// A sample is not tied to any timer until [`stop`](Sample::stop) is called. Stopping the same
/// sample more than once records the elapsed time again each time; callers should stop a sample
/// exactly once.
#[derive(Clone)]
pub struct Sample {
    clock: Clock,
    start: Instant,
}

impl Sample {
    /// Starts a sample at the current instant of `clock`.
    pub fn start(clock: &Clock) -> Self {
        Self { clock: clock.clone(), start: clock.now() }
    }

    /// Records the time elapsed since the sample started into `timer`, returning it.
    pub fn stop(&self, timer: &Timer) -> Duration {
        let elapsed = self.clock.now().duration_since(self.start);
        timer.record(elapsed);
        elapsed
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample").field("start", &self.start).finish()
    }
}
