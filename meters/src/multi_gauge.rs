use std::{hash::BuildHasherDefault, sync::Arc};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::{
    meter::{Gauge, Meter},
    Error, IdHasher, IntoTags, MeterId, MeterRegistry, Metadata, Tag,
};

type RowMap = HashMap<MeterId, Arc<Gauge>, BuildHasherDefault<IdHasher>>;

/// A single row of a [`MultiGauge`]: a tag set and the value reported for it.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    tags: Vec<Tag>,
    value: f64,
}

impl Row {
    /// Creates a row from its tags and value.
    pub fn new<T: IntoTags>(tags: T, value: f64) -> Self {
        Self { tags: tags.into_tags(), value }
    }

    /// Tags of this row, as given.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Value of this row.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// A set of gauges sharing a name, whose membership is replaced as a whole.
///
/// Each row is a regular gauge in the registry, identified by the base name and the base tags
/// combined with the row's own tags. Calling [`register`](MultiGauge::register) reconciles the
/// current rows with a new set: rows present in both keep their gauge and have its value
/// updated, new rows get a fresh gauge, and rows that disappeared are removed from the registry.
///
/// Created by [`MeterRegistry::register_multi_gauge`].
pub struct MultiGauge<'a> {
    registry: &'a MeterRegistry,
    base: MeterId,
    metadata: Metadata,
    rows: Mutex<RowMap>,
}

impl<'a> MultiGauge<'a> {
    pub(crate) fn new(registry: &'a MeterRegistry, base: MeterId, metadata: Metadata) -> Self {
        Self { registry, base, metadata, rows: Mutex::new(RowMap::default()) }
    }

    /// Name shared by every row.
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Replaces the rows of this gauge with `rows`.
    ///
    /// A row whose tags match a current row updates that row's gauge in place, so handles to it
    /// stay valid. When `rows` holds the same tags more than once, the last value wins.
    ///
    /// Retained rows are never absent from the registry while this runs. Concurrent calls are
    /// serialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if any row carries an empty tag key, in which case nothing
    /// changes. Returns [`Error::KindMismatch`] if a row's identifier is held by a meter that is
    /// not a gauge, and [`Error::GaugeConflict`] if it is held by a gauge sampling external
    /// state. Such rows are skipped, and left in the registry untouched, while every other row is
    /// still applied.
    pub fn register<I>(&self, rows: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut current = self.rows.lock();

        let resolved = rows
            .into_iter()
            .map(|row| self.base.with_tags(row.tags).map(|id| (id, row.value)))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut next = RowMap::default();
        let mut conflict = None;
        for (id, value) in resolved {
            let candidate = match current.remove(&id) {
                Some(gauge) => gauge,
                None => Arc::new(Gauge::with_value(value)),
            };

            let meter = self.registry.get_or_create(id.clone(), || Meter::Gauge(candidate));
            match meter.into_variant::<Gauge>(&id) {
                Ok(gauge) if gauge.is_state_backed() => {
                    conflict.get_or_insert(Error::GaugeConflict { id });
                }
                Ok(gauge) => {
                    gauge.set(value);
                    self.registry.describe(&id, self.metadata.clone());
                    let _ = next.insert(id, gauge);
                }
                Err(e) => {
                    conflict.get_or_insert(e);
                }
            }
        }

        for (id, gauge) in current.drain() {
            let ours = Meter::Gauge(gauge);
            if self.registry.get(&id).is_some_and(|stored| stored.ptr_eq(&ours)) {
                self.registry.remove(&id);
            }
        }
        *current = next;

        match conflict {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of rows currently registered.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Whether or not no rows are registered.
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Identifiers and current values of the registered rows, ordered by identifier.
    pub fn rows(&self) -> Vec<(MeterId, f64)> {
        let mut rows = self
            .rows
            .lock()
            .iter()
            .map(|(id, gauge)| (id.clone(), gauge.value()))
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::Row;
    use crate::{meter::Counter, Error, MeterId, MeterOptions, MeterRegistry, Tag};
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicI64, Ordering},
            Arc,
        },
        thread,
    };

    #[test]
    fn test_register_diffs_rows() {
        let registry = MeterRegistry::new();
        let multi = registry.register_multi_gauge(MeterOptions::new("multi-gauge")).unwrap();

        multi
            .register(vec![Row::new(&[("user", "foo")], 1.0), Row::new(&[("user", "bar")], 2.0)])
            .unwrap();
        assert_eq!(multi.len(), 2);
        assert_eq!(registry.find("multi-gauge").gauges().len(), 2);

        let bar = registry.find("multi-gauge").tag("user", "bar").gauge().unwrap();
        assert_eq!(bar.value(), 2.0);

        multi
            .register(vec![Row::new(&[("user", "bar")], 20.0), Row::new(&[("user", "baz")], 3.0)])
            .unwrap();

        let gauges = registry.find("multi-gauge").gauges();
        assert_eq!(gauges.len(), 2);

        let bar_again = registry.find("multi-gauge").tag("user", "bar").gauge().unwrap();
        assert!(Arc::ptr_eq(&bar, &bar_again));
        assert_eq!(bar.value(), 20.0);
        assert_eq!(registry.find("multi-gauge").tag("user", "baz").gauge().unwrap().value(), 3.0);
        assert!(matches!(
            registry.find("multi-gauge").tag("user", "foo").gauge(),
            Err(Error::MeterNotFound { .. })
        ));

        let rows = multi.rows();
        assert_eq!(rows[0], (MeterId::new("multi-gauge", &[("user", "bar")]).unwrap(), 20.0));
        assert_eq!(rows[1], (MeterId::new("multi-gauge", &[("user", "baz")]).unwrap(), 3.0));
    }

    #[test]
    fn test_base_tags_apply_to_rows() {
        let registry = MeterRegistry::new();
        let multi = registry
            .register_multi_gauge(MeterOptions::new("queue.depth").with_tag("service", "api"))
            .unwrap();
        multi.register([Row::new(&[("queue", "a")], 4.0)]).unwrap();

        let id = MeterId::new("queue.depth", &[("service", "api"), ("queue", "a")]).unwrap();
        assert!(registry.get(&id).is_some());
        assert_eq!(multi.name(), "queue.depth");
    }

    #[test]
    fn test_empty_register_removes_everything() {
        let registry = MeterRegistry::new();
        let multi = registry.register_multi_gauge(MeterOptions::new("rows")).unwrap();
        multi.register([Row::new(&[("k", "1")], 1.0), Row::new(&[("k", "2")], 2.0)]).unwrap();

        multi.register(Vec::new()).unwrap();
        assert!(multi.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_row_changes_nothing() {
        let registry = MeterRegistry::new();
        let multi = registry.register_multi_gauge(MeterOptions::new("rows")).unwrap();
        multi.register([Row::new(&[("k", "1")], 1.0)]).unwrap();

        let result = multi.register([Row::new(&[("k", "2")], 2.0), Row::new(&[("", "x")], 3.0)]);
        assert!(matches!(result, Err(Error::InvalidId { .. })));
        assert_eq!(multi.len(), 1);
        assert_eq!(registry.find("rows").tag("k", "1").gauge().unwrap().value(), 1.0);
    }

    #[test]
    fn test_conflicting_row_is_skipped() {
        let registry = MeterRegistry::new();
        let counter = registry.counter("rows", &[("k", "1")]).unwrap();
        let multi = registry.register_multi_gauge(MeterOptions::new("rows")).unwrap();

        let result = multi.register([Row::new(&[("k", "1")], 1.0), Row::new(&[("k", "2")], 2.0)]);
        assert!(matches!(result, Err(Error::KindMismatch { .. })));
        assert_eq!(multi.len(), 1);

        multi.register(Vec::new()).unwrap();
        let stored = registry.get(&MeterId::new("rows", &[("k", "1")]).unwrap()).unwrap();
        assert!(stored.ptr_eq(&crate::meter::Meter::Counter(Arc::clone(&counter))));
        assert_eq!(stored.as_variant::<Counter>().map(|c| c.count()), Some(0.0));
    }

    #[test]
    fn test_state_backed_row_is_not_adopted() {
        let registry = MeterRegistry::new();
        let state = Arc::new(AtomicI64::new(7));
        registry.gauge("rows", &[("k", "1")], &state, |v| v.load(Ordering::Relaxed) as f64).unwrap();
        let multi = registry.register_multi_gauge(MeterOptions::new("rows")).unwrap();

        let result = multi.register([Row::new(&[("k", "1")], 42.0), Row::new(&[("k", "2")], 2.0)]);
        match result {
            Err(Error::GaugeConflict { id }) => assert_eq!(id.tag("k"), Some("1")),
            other => panic!("expected gauge conflict, got {:?}", other),
        }
        assert_eq!(multi.len(), 1);
        assert_eq!(registry.find("rows").tag("k", "1").gauge().unwrap().value(), 7.0);

        multi.register(Vec::new()).unwrap();
        let gauge = registry.find("rows").tag("k", "1").gauge().unwrap();
        assert!(gauge.is_state_backed());
        assert_eq!(gauge.value(), 7.0);
        assert!(registry.find("rows").tag("k", "2").gauge().is_err());
    }

    #[test]
    fn test_retained_row_stays_visible_during_concurrent_registers() {
        let registry = MeterRegistry::builder().with_shards(4).build();
        let multi = registry.register_multi_gauge(MeterOptions::new("rows")).unwrap();
        multi.register([Row::new(&[("k", "keep")], 0.0)]).unwrap();
        let done = AtomicBool::new(false);

        thread::scope(|s| {
            s.spawn(|| {
                for i in 0..2_000 {
                    let other = if i % 2 == 0 { "a" } else { "b" };
                    multi
                        .register([
                            Row::new(&[("k", "keep")], i as f64),
                            Row::new([Tag::new("k", other)], 1.0),
                        ])
                        .unwrap();
                }
                done.store(true, Ordering::Release);
            });

            while !done.load(Ordering::Acquire) {
                let gauge = registry.find("rows").tag("k", "keep").gauge();
                assert!(gauge.is_ok(), "retained row went missing: {:?}", gauge.err());
            }
        });

        assert_eq!(registry.find("rows").tag("k", "keep").gauge().unwrap().value(), 1_999.0);
        assert_eq!(multi.len(), 2);
    }

    #[test]
    fn test_retained_row_survives_clear() {
        let registry = MeterRegistry::new();
        let multi = registry.register_multi_gauge(MeterOptions::new("rows")).unwrap();
        multi.register([Row::new([Tag::new("k", "1")], 1.0)]).unwrap();
        let gauge = registry.find("rows").gauge().unwrap();

        registry.clear();
        multi.register([Row::new([Tag::new("k", "1")], 5.0)]).unwrap();

        let again = registry.find("rows").gauge().unwrap();
        assert!(Arc::ptr_eq(&gauge, &again));
        assert_eq!(again.value(), 5.0);
    }
}
