//! The meter registry.

mod builder;
pub use builder::RegistryBuilder;

mod more;
pub use more::More;

mod snapshot;
pub use snapshot::{Measurement, Observer, Snapshot, Statistic};

use std::{
    hash::BuildHasherDefault,
    iter::repeat_with,
    sync::{Arc, PoisonError, RwLock},
    vec,
};

use hashbrown::{hash_map::RawEntryMut, HashMap};
use quanta::Clock;

use crate::{
    meter::{Counter, DistributionSummary, Gauge, Meter, Sample, Timer, Variant},
    Error, IdHasher, IntoTags, MeterId, MeterOptions, Metadata, MultiGauge, Search,
    SharedString, Tag,
};

type RegistryHashMap<V> = HashMap<MeterId, V, BuildHasherDefault<IdHasher>>;

/// A concurrent store of meters, keyed by [`MeterId`].
///
/// A registry owns its meters. Each distinct identifier maps to exactly one meter, which is
/// created on first request and shared by every caller that resolves the same identifier
/// afterwards. Registries are independent: nothing is shared between two instances, and there is
/// no process-wide default.
///
/// ## Concurrency
///
/// Meters are spread over a power-of-two number of shards, each guarded by its own lock. Only
/// creation and removal take a write lock, and only on a single shard; recording into a resolved
/// meter never touches the registry at all.
///
/// ## Kind mismatches
///
/// The first registration of an identifier decides its kind. Asking for the same identifier as a
/// different kind does not replace the existing meter: the typed helpers report
/// [`Error::KindMismatch`] when they would have to hand out a meter of the wrong kind, while
/// [`get_or_create`](MeterRegistry::get_or_create) returns the existing meter as-is.
pub struct MeterRegistry {
    shards: Vec<RwLock<RegistryHashMap<Meter>>>,
    shard_mask: usize,
    metadata: RwLock<RegistryHashMap<Metadata>>,
    common_tags: Vec<Tag>,
    clock: Clock,
}

impl MeterRegistry {
    /// Creates a new, empty `MeterRegistry` with default settings.
    pub fn new() -> Self {
        RegistryBuilder::new().build()
    }

    /// Creates a [`RegistryBuilder`] for configuring a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub(crate) fn from_parts(shard_count: usize, common_tags: Vec<Tag>, clock: Clock) -> Self {
        let shard_count = shard_count.max(1).next_power_of_two();
        let shards =
            repeat_with(|| RwLock::new(RegistryHashMap::default())).take(shard_count).collect();

        Self {
            shards,
            shard_mask: shard_count - 1,
            metadata: RwLock::new(RegistryHashMap::default()),
            common_tags,
            clock,
        }
    }

    /// The clock used by timers and samples created through this registry.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Tags added to every identifier built by this registry.
    pub fn common_tags(&self) -> &[Tag] {
        &self.common_tags
    }

    /// Builds the identifier this registry uses for `name` and `tags`.
    ///
    /// Common tags are included; a tag given here replaces a common tag with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if the name is empty or a tag key is empty.
    pub fn id<N, T>(&self, name: N, tags: T) -> Result<MeterId, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
    {
        if self.common_tags.is_empty() {
            return MeterId::new(name, tags);
        }

        let mut merged = self.common_tags.clone();
        merged.extend(tags.into_tags());
        MeterId::new(name, merged)
    }

    #[inline]
    fn shard_for(&self, id: &MeterId) -> (u64, &RwLock<RegistryHashMap<Meter>>) {
        let hash = id.get_hash();
        (hash, &self.shards[hash as usize & self.shard_mask])
    }

    /// Gets the meter stored under `id`, creating it with `create` if it does not exist.
    ///
    /// If a meter already exists under `id`, it is returned regardless of its kind, and `create`
    /// is never called. When several callers race to create the same meter, each may build one,
    /// but exactly one is stored: every caller gets the stored meter back and the others are
    /// dropped.
    pub fn get_or_create<F>(&self, id: MeterId, create: F) -> Meter
    where
        F: FnOnce() -> Meter,
    {
        let (hash, shard) = self.shard_for(&id);

        {
            let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((_, meter)) = shard_read.raw_entry().from_key_hashed_nocheck(hash, &id) {
                return meter.clone();
            }
        }

        let candidate = create();

        let mut shard_write = shard.write().unwrap_or_else(PoisonError::into_inner);
        match shard_write.raw_entry_mut().from_key_hashed_nocheck(hash, &id) {
            RawEntryMut::Occupied(entry) => entry.get().clone(),
            RawEntryMut::Vacant(entry) => {
                let (_, meter) = entry.insert_hashed_nocheck(hash, id, candidate);
                meter.clone()
            }
        }
    }

    /// Gets the meter stored under `id`, if any.
    pub fn get(&self, id: &MeterId) -> Option<Meter> {
        let (hash, shard) = self.shard_for(id);
        let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
        shard_read.raw_entry().from_key_hashed_nocheck(hash, id).map(|(_, meter)| meter.clone())
    }

    /// Removes the meter stored under `id`.
    ///
    /// Returns `true` if the meter existed and was removed, `false` otherwise. Handles to the
    /// meter that callers still hold keep working, but are no longer reachable from the registry.
    pub fn remove(&self, id: &MeterId) -> bool {
        let (hash, shard) = self.shard_for(id);
        let mut shard_write = shard.write().unwrap_or_else(PoisonError::into_inner);
        match shard_write.raw_entry_mut().from_key_hashed_nocheck(hash, id) {
            RawEntryMut::Occupied(entry) => {
                let _ = entry.remove_entry();
                // Lock order is always shard, then metadata.
                self.metadata.write().unwrap_or_else(PoisonError::into_inner).remove(id);
                true
            }
            RawEntryMut::Vacant(_) => false,
        }
    }

    /// Removes the given meter, wherever it is stored.
    ///
    /// Returns the identifier it was stored under, if it was found.
    pub fn remove_meter(&self, meter: &Meter) -> Option<MeterId> {
        let mut found = None;
        self.visit_meters(|id, candidate| {
            if found.is_none() && candidate.ptr_eq(meter) {
                found = Some(id.clone());
            }
        });

        found.filter(|id| self.remove(id))
    }

    /// Removes all meters from the registry.
    ///
    /// This operation is eventually consistent: meters are removed shard by shard, and callers
    /// may observe a partially cleared registry while it runs.
    pub fn clear(&self) {
        self.retain(|_, _| false);
    }

    /// Retains only the meters specified by the predicate.
    ///
    /// Removes all meters for which `f(&id, &meter)` returns `false`. This proceeds through the
    /// shards in the same way as [`visit_meters`](MeterRegistry::visit_meters).
    pub fn retain<F>(&self, mut f: F)
    where
        F: FnMut(&MeterId, &Meter) -> bool,
    {
        let mut removed = Vec::new();
        for shard in &self.shards {
            let mut shard_write = shard.write().unwrap_or_else(PoisonError::into_inner);
            shard_write.retain(|id, meter| {
                let keep = f(id, meter);
                if !keep {
                    removed.push(id.clone());
                }
                keep
            });

            if !removed.is_empty() {
                let mut metadata = self.metadata.write().unwrap_or_else(PoisonError::into_inner);
                for id in removed.drain(..) {
                    metadata.remove(&id);
                }
            }
        }
    }

    /// Number of meters in the registry.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Whether or not the registry holds no meters.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every meter stored in this registry.
    ///
    /// This operation does not lock the entire registry, but proceeds through the shards one at
    /// a time. As a result, a meter that existed at the moment `visit_meters` was called may not
    /// be observed if it is removed before its shard is reached. Likewise, a meter that is added
    /// after the call, but before it finishes, may or may not be observed. A meter is never
    /// visited twice in one pass.
    pub fn visit_meters<F>(&self, mut visit: F)
    where
        F: FnMut(&MeterId, &Meter),
    {
        for shard in &self.shards {
            let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
            for (id, meter) in shard_read.iter() {
                visit(id, meter);
            }
        }
    }

    /// Lazily iterates over every meter stored in this registry.
    ///
    /// Shards are copied one at a time as the iterator reaches them, and no lock is held between
    /// calls to `next`, so the same consistency rules as
    /// [`visit_meters`](MeterRegistry::visit_meters) apply.
    pub fn meters(&self) -> Meters<'_> {
        Meters { registry: self, next_shard: 0, current: Vec::new().into_iter() }
    }

    /// Metadata recorded for `id`, if any was given when it was registered.
    pub fn metadata(&self, id: &MeterId) -> Option<Metadata> {
        self.metadata.read().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    pub(crate) fn describe(&self, id: &MeterId, metadata: Metadata) {
        if metadata.is_empty() {
            return;
        }

        let mut entries = self.metadata.write().unwrap_or_else(PoisonError::into_inner);
        let _ = entries.entry(id.clone()).or_insert(metadata);
    }

    /// Begins a search for meters named `name`.
    pub fn find<N>(&self, name: N) -> Search<'_>
    where
        N: Into<SharedString>,
    {
        Search::new(self, name.into())
    }

    /// Starts a [`Sample`] using this registry's clock.
    pub fn start_sample(&self) -> Sample {
        Sample::start(&self.clock)
    }

    /// Access to the function-tracking and time gauge constructors.
    pub fn more(&self) -> More<'_> {
        More::new(self)
    }

    pub(crate) fn register<V, F>(&self, options: MeterOptions, create: F) -> Result<Arc<V>, Error>
    where
        V: Variant,
        F: FnOnce() -> V,
    {
        let MeterOptions { name, tags, metadata, .. } = options;
        let id = self.id(name, tags)?;
        let meter = self.get_or_create(id.clone(), || V::into_meter(Arc::new(create())));
        let variant = meter.into_variant::<V>(&id)?;
        self.describe(&id, metadata);
        Ok(variant)
    }

    /// Gets or creates a counter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] for an invalid name or tags, and [`Error::KindMismatch`] if a
    /// meter of another kind is already registered under the same identifier.
    pub fn counter<N, T>(&self, name: N, tags: T) -> Result<Arc<Counter>, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
    {
        self.register_counter(MeterOptions::new(name).with_tags(tags))
    }

    /// Gets or creates a counter from `options`.
    ///
    /// # Errors
    ///
    /// See [`counter`](MeterRegistry::counter).
    pub fn register_counter(&self, options: MeterOptions) -> Result<Arc<Counter>, Error> {
        self.register(options, Counter::new)
    }

    /// Gets or creates a timer.
    ///
    /// # Errors
    ///
    /// See [`counter`](MeterRegistry::counter).
    pub fn timer<N, T>(&self, name: N, tags: T) -> Result<Arc<Timer>, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
    {
        self.register_timer(MeterOptions::new(name).with_tags(tags))
    }

    /// Gets or creates a timer from `options`.
    ///
    /// # Errors
    ///
    /// See [`counter`](MeterRegistry::counter).
    pub fn register_timer(&self, options: MeterOptions) -> Result<Arc<Timer>, Error> {
        let clock = self.clock.clone();
        self.register(options, move || Timer::new(clock))
    }

    /// Gets or creates a distribution summary.
    ///
    /// # Errors
    ///
    /// See [`counter`](MeterRegistry::counter).
    pub fn summary<N, T>(&self, name: N, tags: T) -> Result<Arc<DistributionSummary>, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
    {
        self.register_summary(MeterOptions::new(name).with_tags(tags))
    }

    /// Gets or creates a distribution summary from `options`, applying its scale.
    ///
    /// # Errors
    ///
    /// See [`counter`](MeterRegistry::counter).
    pub fn register_summary(
        &self,
        options: MeterOptions,
    ) -> Result<Arc<DistributionSummary>, Error> {
        let scale = options.scale.unwrap_or(1.0);
        self.register(options, move || DistributionSummary::with_scale(scale))
    }

    /// Registers a gauge that samples `state` through `f`, and returns `state`.
    ///
    /// The registry only holds a weak reference to `state`. If a meter is already registered
    /// under the same identifier, it is kept as-is, whatever its kind or the state it samples.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] for an invalid name or tags.
    pub fn gauge<N, T, S, F>(&self, name: N, tags: T, state: &Arc<S>, f: F) -> Result<Arc<S>, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
        S: Send + Sync + 'static,
        F: Fn(&S) -> f64 + Send + Sync + 'static,
    {
        let id = self.id(name, tags)?;
        let _ = self.get_or_create(id, || Meter::Gauge(Arc::new(Gauge::from_state(state, f))));
        Ok(Arc::clone(state))
    }

    /// Gets or creates a gauge that samples `state` through `f`, from `options`.
    ///
    /// # Errors
    ///
    /// See [`counter`](MeterRegistry::counter).
    pub fn register_gauge<S, F>(
        &self,
        options: MeterOptions,
        state: &Arc<S>,
        f: F,
    ) -> Result<Arc<Gauge>, Error>
    where
        S: Send + Sync + 'static,
        F: Fn(&S) -> f64 + Send + Sync + 'static,
    {
        self.register(options, || Gauge::from_state(state, f))
    }

    /// Creates a [`MultiGauge`] whose rows are registered under the name of `options`.
    ///
    /// The tags of `options` are added to every row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] for an invalid name or tags.
    pub fn register_multi_gauge(&self, options: MeterOptions) -> Result<MultiGauge<'_>, Error> {
        let MeterOptions { name, tags, metadata, .. } = options;
        // Validates the name and tags up front so that row registration can only fail on row tags.
        let base = self.id(name, tags)?;
        Ok(MultiGauge::new(self, base, metadata))
    }
}

impl Default for MeterRegistry {
    fn default() -> Self {
        MeterRegistry::new()
    }
}

/// A lazy iterator over the meters of a [`MeterRegistry`].
///
/// Created by [`MeterRegistry::meters`].
pub struct Meters<'a> {
    registry: &'a MeterRegistry,
    next_shard: usize,
    current: vec::IntoIter<(MeterId, Meter)>,
}

impl Iterator for Meters<'_> {
    type Item = (MeterId, Meter);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.current.next() {
                return Some(item);
            }

            let shard = self.registry.shards.get(self.next_shard)?;
            self.next_shard += 1;

            let shard_read = shard.read().unwrap_or_else(PoisonError::into_inner);
            self.current = shard_read
                .iter()
                .map(|(id, meter)| (id.clone(), meter.clone()))
                .collect::<Vec<_>>()
                .into_iter();
        }
    }
}
