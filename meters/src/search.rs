use std::sync::Arc;

use crate::{
    meter::{
        Counter, DistributionSummary, FunctionCounter, FunctionTimer, Gauge, Meter, TimeGauge,
        Timer, Variant,
    },
    Error, IntoTags, MeterId, MeterRegistry, SharedString, Tag,
};

/// A query over the meters of a registry.
///
/// Begins with every meter carrying a given name, and is narrowed by each call to
/// [`tag`](Search::tag), [`tags`](Search::tags) or [`tag_key`](Search::tag_key). Narrowing is
/// cumulative: a meter matches only if it satisfies every constraint.
///
/// Single-result terminals such as [`counter`](Search::counter) fail unless exactly one meter
/// matches, and then cast it to the requested kind. Collection terminals such as
/// [`gauges`](Search::gauges) return every match of their kind, in identifier order.
///
/// A search reads the registry when a terminal runs, not when it is created.
///
/// ```rust
/// # use meters::MeterRegistry;
/// let registry = MeterRegistry::new();
/// registry.counter("requests", &[("user", "foo")]).unwrap().increment();
/// registry.counter("requests", &[("user", "bar")]).unwrap();
///
/// assert!(registry.find("requests").counter().is_err());
/// let foo = registry.find("requests").tag("user", "foo").counter().unwrap();
/// assert_eq!(foo.count(), 1.0);
/// ```
#[must_use = "a search does nothing until a terminal is called"]
pub struct Search<'a> {
    registry: &'a MeterRegistry,
    name: SharedString,
    tags: Vec<Tag>,
    keys: Vec<SharedString>,
}

impl<'a> Search<'a> {
    pub(crate) fn new(registry: &'a MeterRegistry, name: SharedString) -> Self {
        Self { registry, name, tags: Vec::new(), keys: Vec::new() }
    }

    /// Narrows the search to meters carrying the tag `key=value`.
    pub fn tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Narrows the search to meters carrying every one of `tags`.
    pub fn tags<T: IntoTags>(mut self, tags: T) -> Self {
        self.tags.extend(tags.into_tags());
        self
    }

    /// Narrows the search to meters carrying a tag with the given key, whatever its value.
    pub fn tag_key<K>(mut self, key: K) -> Self
    where
        K: Into<SharedString>,
    {
        self.keys.push(key.into());
        self
    }

    fn matches(&self, id: &MeterId) -> bool {
        id.name() == self.name
            && self.tags.iter().all(|tag| id.has_tag(tag))
            && self.keys.iter().all(|key| id.tag(key).is_some())
    }

    fn collect(&self) -> Vec<(MeterId, Meter)> {
        let mut found = Vec::new();
        self.registry.visit_meters(|id, meter| {
            if self.matches(id) {
                found.push((id.clone(), meter.clone()));
            }
        });
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    fn one<V: Variant>(self) -> Result<Arc<V>, Error> {
        let mut found = self.collect();
        match found.len() {
            1 => {
                let (id, meter) = found.remove(0);
                meter.into_variant(&id)
            }
            0 => Err(Error::MeterNotFound { name: self.name.into_owned(), tags: self.tags }),
            matches => {
                Err(Error::AmbiguousMeter { name: self.name.into_owned(), tags: self.tags, matches })
            }
        }
    }

    fn all<V: Variant>(self) -> Vec<Arc<V>> {
        self.collect()
            .into_iter()
            .filter_map(|(_, meter)| meter.as_variant::<V>().cloned())
            .collect()
    }

    /// The single matching meter, whatever its kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MeterNotFound`] if no meter matches, and [`Error::AmbiguousMeter`] if
    /// more than one does.
    pub fn meter(self) -> Result<(MeterId, Meter), Error> {
        let mut found = self.collect();
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(Error::MeterNotFound { name: self.name.into_owned(), tags: self.tags }),
            matches => {
                Err(Error::AmbiguousMeter { name: self.name.into_owned(), tags: self.tags, matches })
            }
        }
    }

    /// The single matching counter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MeterNotFound`] if no meter matches, [`Error::AmbiguousMeter`] if more
    /// than one does, and [`Error::KindMismatch`] if the match is not a counter.
    pub fn counter(self) -> Result<Arc<Counter>, Error> {
        self.one()
    }

    /// The single matching timer.
    ///
    /// # Errors
    ///
    /// See [`counter`](Search::counter).
    pub fn timer(self) -> Result<Arc<Timer>, Error> {
        self.one()
    }

    /// The single matching gauge.
    ///
    /// # Errors
    ///
    /// See [`counter`](Search::counter).
    pub fn gauge(self) -> Result<Arc<Gauge>, Error> {
        self.one()
    }

    /// The single matching time gauge.
    ///
    /// # Errors
    ///
    /// See [`counter`](Search::counter).
    pub fn time_gauge(self) -> Result<Arc<TimeGauge>, Error> {
        self.one()
    }

    /// The single matching distribution summary.
    ///
    /// # Errors
    ///
    /// See [`counter`](Search::counter).
    pub fn summary(self) -> Result<Arc<DistributionSummary>, Error> {
        self.one()
    }

    /// The single matching function-tracking counter.
    ///
    /// # Errors
    ///
    /// See [`counter`](Search::counter).
    pub fn function_counter(self) -> Result<Arc<FunctionCounter>, Error> {
        self.one()
    }

    /// The single matching function-tracking timer.
    ///
    /// # Errors
    ///
    /// See [`counter`](Search::counter).
    pub fn function_timer(self) -> Result<Arc<FunctionTimer>, Error> {
        self.one()
    }

    /// Every matching meter, whatever its kind.
    pub fn meters(self) -> Vec<(MeterId, Meter)> {
        self.collect()
    }

    /// Every matching counter.
    pub fn counters(self) -> Vec<Arc<Counter>> {
        self.all()
    }

    /// Every matching timer.
    pub fn timers(self) -> Vec<Arc<Timer>> {
        self.all()
    }

    /// Every matching gauge.
    pub fn gauges(self) -> Vec<Arc<Gauge>> {
        self.all()
    }

    /// Every matching distribution summary.
    pub fn summaries(self) -> Vec<Arc<DistributionSummary>> {
        self.all()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, MeterKind, MeterRegistry, Tag};
    use quickcheck_macros::quickcheck;
    use std::sync::Arc;

    #[test]
    fn test_ambiguity_resolved_by_tags() {
        let registry = MeterRegistry::new();
        let foo = registry.counter("requests", &[("user", "foo")]).unwrap();
        registry.counter("requests", &[("user", "bar")]).unwrap();

        match registry.find("requests").counter() {
            Err(Error::AmbiguousMeter { name, matches, .. }) => {
                assert_eq!(name, "requests");
                assert_eq!(matches, 2);
            }
            other => panic!("expected ambiguous meter, got {:?}", other),
        }

        let found = registry.find("requests").tag("user", "foo").counter().unwrap();
        assert!(Arc::ptr_eq(&found, &foo));
        assert_eq!(registry.find("requests").counters().len(), 2);
        assert_eq!(registry.find("requests").tag_key("user").counters().len(), 2);
    }

    #[test]
    fn test_not_found() {
        let registry = MeterRegistry::new();
        registry.counter("requests", &[("user", "foo")]).unwrap();

        assert!(matches!(registry.find("missing").counter(), Err(Error::MeterNotFound { .. })));
        assert!(matches!(
            registry.find("requests").tag("user", "baz").counter(),
            Err(Error::MeterNotFound { .. })
        ));
        assert!(matches!(
            registry.find("requests").tag_key("region").meter(),
            Err(Error::MeterNotFound { .. })
        ));
        assert!(registry.find("missing").gauges().is_empty());
    }

    #[test]
    fn test_narrowing_is_cumulative() {
        let registry = MeterRegistry::new();
        registry.timer("latency", &[("route", "/"), ("method", "GET")]).unwrap();
        registry.timer("latency", &[("route", "/"), ("method", "POST")]).unwrap();
        registry.timer("latency", &[("route", "/users"), ("method", "GET")]).unwrap();

        assert_eq!(registry.find("latency").tag("route", "/").timers().len(), 2);
        assert_eq!(registry.find("latency").tag("method", "GET").timers().len(), 2);
        assert!(registry
            .find("latency")
            .tag("route", "/")
            .tag("method", "GET")
            .timer()
            .is_ok());
        assert!(registry
            .find("latency")
            .tags([Tag::new("route", "/users"), Tag::new("method", "GET")])
            .timer()
            .is_ok());
    }

    #[test]
    fn test_kind_checked_after_narrowing() {
        let registry = MeterRegistry::new();
        registry.summary("payload", ()).unwrap().record(10.0);

        match registry.find("payload").counter() {
            Err(Error::KindMismatch { expected, actual, .. }) => {
                assert_eq!(expected, MeterKind::Counter);
                assert_eq!(actual, MeterKind::DistributionSummary);
            }
            other => panic!("expected kind mismatch, got {:?}", other),
        }

        assert_eq!(registry.find("payload").summary().unwrap().total_amount(), 10.0);
        assert!(registry.find("payload").counters().is_empty());
        assert_eq!(registry.find("payload").summaries().len(), 1);
        assert_eq!(registry.find("payload").meters()[0].1.kind(), MeterKind::DistributionSummary);
    }

    #[quickcheck]
    fn prop_unique_match_only_when_single(values: Vec<u8>) -> bool {
        let registry = MeterRegistry::new();
        for value in &values {
            registry.counter("prop", &[("v", value.to_string())]).unwrap();
        }

        let mut distinct = values.clone();
        distinct.sort_unstable();
        distinct.dedup();

        let single = registry.find("prop").counter();
        match distinct.len() {
            0 => matches!(single, Err(Error::MeterNotFound { .. })),
            1 => single.is_ok(),
            n => matches!(single, Err(Error::AmbiguousMeter { matches, .. }) if matches == n),
        }
    }
}
