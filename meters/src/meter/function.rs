use std::{fmt, sync::Arc};

use super::{sampler, Sampler};
use crate::TimeUnit;

/// A counter whose value is read from externally-owned state.
///
/// The accessor is expected to be monotonic, but that is the caller's contract: the value is
/// read fresh on every call and is never cached or clamped. Only a weak reference to the state is
/// held; once the state is dropped, [`count`](FunctionCounter::count) returns NaN.
pub struct FunctionCounter {
    sampler: Sampler<f64>,
}

impl FunctionCounter {
    /// Creates a counter that reads `state` through `f`.
    pub fn from_state<T, F>(state: &Arc<T>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        Self { sampler: sampler(state, f) }
    }

    /// Current value of the accessor, or NaN if the state has been dropped.
    pub fn count(&self) -> f64 {
        (self.sampler)().unwrap_or(f64::NAN)
    }
}

impl fmt::Debug for FunctionCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCounter").field("count", &self.count()).finish()
    }
}

/// A timer whose count and total time are read from externally-owned state.
///
/// Like [`FunctionCounter`], nothing is cached and only a weak reference to the state is held.
pub struct FunctionTimer {
    sampler: Sampler<(f64, f64)>,
    unit: TimeUnit,
}

impl FunctionTimer {
    /// Creates a timer that reads `state` through `count` and `total_time`.
    ///
    /// `total_time` reports in `unit`.
    pub fn from_state<T, C, F>(state: &Arc<T>, count: C, total_time: F, unit: TimeUnit) -> Self
    where
        T: Send + Sync + 'static,
        C: Fn(&T) -> f64 + Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let sampler = sampler(state, move |state| (count(state), total_time(state)));
        Self { sampler, unit }
    }

    /// Unit the total time accessor reports in.
    pub fn base_unit(&self) -> TimeUnit {
        self.unit
    }

    /// Current value of the count accessor, or NaN if the state has been dropped.
    pub fn count(&self) -> f64 {
        (self.sampler)().map_or(f64::NAN, |(count, _)| count)
    }

    /// Current value of the total time accessor converted to `unit`, or NaN if the state has been
    /// dropped.
    pub fn total_time(&self, unit: TimeUnit) -> f64 {
        (self.sampler)().map_or(f64::NAN, |(_, total)| unit.convert(total, self.unit))
    }

    /// Mean time per event in `unit`.
    ///
    /// Returns zero when the count is zero, and NaN if the state has been dropped.
    pub fn mean(&self, unit: TimeUnit) -> f64 {
        match (self.sampler)() {
            Some((count, _)) if count == 0.0 => 0.0,
            Some((count, total)) => unit.convert(total, self.unit) / count,
            None => f64::NAN,
        }
    }
}

impl fmt::Debug for FunctionTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTimer")
            .field("unit", &self.unit)
            .field("count", &self.count())
            .field("total_time", &self.total_time(self.unit))
            .finish()
    }
}
