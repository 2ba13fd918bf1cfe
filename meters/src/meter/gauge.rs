use std::{fmt, sync::Arc};

use super::{sampler, Sampler};
use crate::{atomics::AtomicF64, TimeUnit};

enum Source {
    Value(AtomicF64),
    State(Sampler<f64>),
}

/// An instantaneous value.
///
/// A gauge either samples externally-owned state at read time, or holds a value that is set
/// explicitly. State-backed gauges only hold a weak reference to the state: once all other owners
/// drop it, [`value`](Gauge::value) returns NaN.
pub struct Gauge {
    source: Source,
}

impl Gauge {
    /// Creates a gauge that samples `state` through `f` every time it is read.
    pub fn from_state<T, F>(state: &Arc<T>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Self { source: Source::State(sampler(state, f)) }
    }

    /// Creates a gauge holding an explicitly set value.
    pub fn with_value(value: f64) -> Self {
        Self { source: Source::Value(AtomicF64::new(value)) }
    }

    /// Current value of the gauge.
    ///
    /// For state-backed gauges, the accessor is invoked on every call. Returns NaN if the state has
    /// been dropped.
    pub fn value(&self) -> f64 {
        match &self.source {
            Source::Value(value) => value.load(),
            Source::State(sampler) => sampler().unwrap_or(f64::NAN),
        }
    }

    /// Sets the value of the gauge.
    ///
    /// Has no effect on gauges that sample external state.
    pub fn set(&self, value: f64) {
        if let Source::Value(inner) = &self.source {
            inner.store(value);
        }
    }

    /// Whether or not this gauge samples external state.
    pub fn is_state_backed(&self) -> bool {
        matches!(self.source, Source::State(_))
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge")
            .field("state_backed", &self.is_state_backed())
            .field("value", &self.value())
            .finish()
    }
}

/// A gauge that tracks a duration held in externally-owned state.
///
/// The accessor yields a magnitude expressed in the gauge's base unit, and reads convert it to
/// whatever unit the caller asks for.
pub struct TimeGauge {
    sampler: Sampler<f64>,
    unit: TimeUnit,
}

impl TimeGauge {
    /// Creates a time gauge that samples `state` through `f`, interpreting the result in `unit`.
    pub fn from_state<T, F>(state: &Arc<T>, unit: TimeUnit, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Self { sampler: sampler(state, f), unit }
    }

    /// Unit the accessor reports in.
    pub fn base_unit(&self) -> TimeUnit {
        self.unit
    }

    /// Current value of the gauge, converted to `unit`.
    ///
    /// Returns NaN if the state has been dropped.
    pub fn value(&self, unit: TimeUnit) -> f64 {
        match (self.sampler)() {
            Some(raw) => unit.convert(raw, self.unit),
            None => f64::NAN,
        }
    }
}

impl fmt::Debug for TimeGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeGauge")
            .field("unit", &self.unit)
            .field("value", &self.value(self.unit))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Gauge, TimeGauge};
    use crate::TimeUnit;
    use approx::assert_relative_eq;
    use std::sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    };

    #[test]
    fn test_state_backed_gauge_tracks_state() {
        let speed = Arc::new(AtomicI64::new(0));
        let gauge = Gauge::from_state(&speed, |s| s.load(Ordering::Relaxed) as f64);
        assert!(gauge.is_state_backed());

        speed.store(40, Ordering::Relaxed);
        assert_eq!(gauge.value(), 40.0);

        speed.store(100, Ordering::Relaxed);
        assert_eq!(gauge.value(), 100.0);

        // Explicit sets do not override sampled state.
        gauge.set(5.0);
        assert_eq!(gauge.value(), 100.0);
    }

    #[test]
    fn test_gauge_does_not_keep_state_alive() {
        let speed = Arc::new(AtomicI64::new(7));
        let gauge = Gauge::from_state(&speed, |s| s.load(Ordering::Relaxed) as f64);
        assert_eq!(Arc::strong_count(&speed), 1);
        assert_eq!(gauge.value(), 7.0);

        drop(speed);
        assert!(gauge.value().is_nan());
    }

    #[test]
    fn test_value_gauge() {
        let gauge = Gauge::with_value(1.0);
        assert!(!gauge.is_state_backed());
        gauge.set(20.0);
        assert_eq!(gauge.value(), 20.0);
    }

    #[test]
    fn test_time_gauge_converts_units() {
        let duration = Arc::new(AtomicI64::new(300));
        let gauge =
            TimeGauge::from_state(&duration, TimeUnit::Seconds, |d| d.load(Ordering::Relaxed) as f64);

        assert_eq!(gauge.base_unit(), TimeUnit::Seconds);
        assert_relative_eq!(gauge.value(TimeUnit::Seconds), 300.0);
        assert_relative_eq!(gauge.value(TimeUnit::Milliseconds), 300_000.0);
        assert_relative_eq!(gauge.value(TimeUnit::Minutes), 5.0);

        drop(duration);
        assert!(gauge.value(TimeUnit::Seconds).is_nan());
    }
}
