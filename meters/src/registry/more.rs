use std::sync::Arc;

use crate::{
    meter::{FunctionCounter, FunctionTimer, TimeGauge},
    Error, IntoTags, MeterOptions, MeterRegistry, SharedString, TimeUnit,
};

/// Constructors for the less common meter kinds.
///
/// Obtained through [`MeterRegistry::more`]. Every meter created here samples externally-owned
/// state through accessor functions, holding only a weak reference to that state.
///
/// All constructors return [`Error::InvalidId`] for an invalid name or tags, and
/// [`Error::KindMismatch`] if a meter of another kind is already registered under the same
/// identifier.
pub struct More<'a> {
    registry: &'a MeterRegistry,
}

impl<'a> More<'a> {
    pub(crate) fn new(registry: &'a MeterRegistry) -> Self {
        Self { registry }
    }

    /// Gets or creates a counter that reads its count from `state` through `f`.
    pub fn counter<N, T, S, F>(
        &self,
        name: N,
        tags: T,
        state: &Arc<S>,
        f: F,
    ) -> Result<Arc<FunctionCounter>, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
        S: Send + Sync + 'static,
        F: Fn(&S) -> f64 + Send + Sync + 'static,
    {
        self.register_counter(MeterOptions::new(name).with_tags(tags), state, f)
    }

    /// Gets or creates a function-tracking counter from `options`.
    pub fn register_counter<S, F>(
        &self,
        options: MeterOptions,
        state: &Arc<S>,
        f: F,
    ) -> Result<Arc<FunctionCounter>, Error>
    where
        S: Send + Sync + 'static,
        F: Fn(&S) -> f64 + Send + Sync + 'static,
    {
        self.registry.register(options, || FunctionCounter::from_state(state, f))
    }

    /// Gets or creates a timer that reads its count and total time from `state`.
    ///
    /// `total_time` reports in `unit`.
    pub fn timer<N, T, S, C, F>(
        &self,
        name: N,
        tags: T,
        state: &Arc<S>,
        count: C,
        total_time: F,
        unit: TimeUnit,
    ) -> Result<Arc<FunctionTimer>, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
        S: Send + Sync + 'static,
        C: Fn(&S) -> f64 + Send + Sync + 'static,
        F: Fn(&S) -> f64 + Send + Sync + 'static,
    {
        self.register_timer(MeterOptions::new(name).with_tags(tags), state, count, total_time, unit)
    }

    /// Gets or creates a function-tracking timer from `options`.
    pub fn register_timer<S, C, F>(
        &self,
        options: MeterOptions,
        state: &Arc<S>,
        count: C,
        total_time: F,
        unit: TimeUnit,
    ) -> Result<Arc<FunctionTimer>, Error>
    where
        S: Send + Sync + 'static,
        C: Fn(&S) -> f64 + Send + Sync + 'static,
        F: Fn(&S) -> f64 + Send + Sync + 'static,
    {
        self.registry
            .register(options, || FunctionTimer::from_state(state, count, total_time, unit))
    }

    /// Gets or creates a gauge that reads a duration, expressed in `unit`, from `state`.
    pub fn time_gauge<N, T, S, F>(
        &self,
        name: N,
        tags: T,
        state: &Arc<S>,
        unit: TimeUnit,
        f: F,
    ) -> Result<Arc<TimeGauge>, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
        S: Send + Sync + 'static,
        F: Fn(&S) -> f64 + Send + Sync + 'static,
    {
        self.register_time_gauge(MeterOptions::new(name).with_tags(tags), state, unit, f)
    }

    /// Gets or creates a time gauge from `options`.
    pub fn register_time_gauge<S, F>(
        &self,
        options: MeterOptions,
        state: &Arc<S>,
        unit: TimeUnit,
        f: F,
    ) -> Result<Arc<TimeGauge>, Error>
    where
        S: Send + Sync + 'static,
        F: Fn(&S) -> f64 + Send + Sync + 'static,
    {
        self.registry.register(options, || TimeGauge::from_state(state, unit, f))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, MeterKind, MeterRegistry, TimeUnit};
    use approx::assert_relative_eq;
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    #[derive(Default)]
    struct Cache {
        requests: AtomicU64,
        loads: AtomicU64,
        load_nanos: AtomicU64,
    }

    #[test]
    fn test_function_counter_tracks_requests() {
        let registry = MeterRegistry::new();
        let cache = Arc::new(Cache::default());
        registry
            .more()
            .counter("cache.requests", (), &cache, |c| c.requests.load(Ordering::Relaxed) as f64)
            .unwrap();

        for _ in 0..100 {
            cache.requests.fetch_add(1, Ordering::Relaxed);
        }

        let counter = registry.find("cache.requests").function_counter().unwrap();
        assert_eq!(counter.count(), 100.0);
    }

    #[test]
    fn test_function_timer_tracks_loads() {
        let registry = MeterRegistry::new();
        let cache = Arc::new(Cache::default());
        registry
            .more()
            .timer(
                "cache.loads",
                (),
                &cache,
                |c| c.loads.load(Ordering::Relaxed) as f64,
                |c| c.load_nanos.load(Ordering::Relaxed) as f64,
                TimeUnit::Nanoseconds,
            )
            .unwrap();

        for _ in 0..100 {
            cache.loads.fetch_add(1, Ordering::Relaxed);
            cache.load_nanos.fetch_add(1_000_000, Ordering::Relaxed);
        }

        let timer = registry.find("cache.loads").function_timer().unwrap();
        assert_eq!(timer.count(), 100.0);
        assert_relative_eq!(timer.total_time(TimeUnit::Seconds), 0.1);
    }

    #[test]
    fn test_time_gauges() {
        let registry = MeterRegistry::new();
        let duration = Arc::new(AtomicU64::new(300));
        let more = registry.more();
        more.time_gauge("time-gauge", (), &duration, TimeUnit::Seconds, |d| {
            d.load(Ordering::Relaxed) as f64
        })
        .unwrap();
        more.time_gauge("other.time-gauge", (), &duration, TimeUnit::Milliseconds, |d| {
            d.load(Ordering::Relaxed) as f64
        })
        .unwrap();

        let seconds = registry.find("time-gauge").time_gauge().unwrap();
        let millis = registry.find("other.time-gauge").time_gauge().unwrap();
        assert_relative_eq!(seconds.value(TimeUnit::Seconds), 300.0);
        assert_relative_eq!(millis.value(TimeUnit::Seconds), 0.3);
    }

    #[test]
    fn test_kind_mismatch() {
        let registry = MeterRegistry::new();
        let cache = Arc::new(Cache::default());
        registry.counter("cache.requests", ()).unwrap();

        let result = registry.more().counter("cache.requests", (), &cache, |_| 0.0);
        match result {
            Err(Error::KindMismatch { expected, actual, .. }) => {
                assert_eq!(expected, MeterKind::FunctionCounter);
                assert_eq!(actual, MeterKind::Counter);
            }
            other => panic!("expected kind mismatch, got {:?}", other),
        }
    }
}
