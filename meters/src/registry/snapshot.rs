use std::fmt;

use crate::{meter::Meter, MeterId, MeterKind, MeterRegistry, Metadata, TimeUnit};

/// What a [`Measurement`] represents.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Statistic {
    /// Number of events.
    Count,
    /// Sum of recorded amounts.
    Total,
    /// Sum of recorded durations, in the base time unit of the export.
    TotalTime,
    /// Largest recorded amount or duration.
    Max,
    /// Instantaneous value.
    Value,
}

impl Statistic {
    /// Gets the string form of this `Statistic`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Count => "count",
            Statistic::Total => "total",
            Statistic::TotalTime => "total_time",
            Statistic::Max => "max",
            Statistic::Value => "value",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single point-in-time value read from a meter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// What the value represents.
    pub statistic: Statistic,
    /// The value.
    pub value: f64,
}

impl Measurement {
    fn new(statistic: Statistic, value: f64) -> Self {
        Self { statistic, value }
    }
}

impl Meter {
    /// Reads the current values of this meter.
    ///
    /// Durations are expressed in `base_unit`. Meters sampling state that has been dropped
    /// report `NaN`.
    pub fn measure(&self, base_unit: TimeUnit) -> Vec<Measurement> {
        use Statistic::*;

        match self {
            Meter::Counter(counter) => vec![Measurement::new(Count, counter.count())],
            Meter::Gauge(gauge) => vec![Measurement::new(Value, gauge.value())],
            Meter::TimeGauge(gauge) => vec![Measurement::new(Value, gauge.value(base_unit))],
            Meter::Timer(timer) => vec![
                Measurement::new(Count, timer.count() as f64),
                Measurement::new(TotalTime, timer.total_time(base_unit)),
                Measurement::new(Max, timer.max(base_unit)),
            ],
            Meter::DistributionSummary(summary) => vec![
                Measurement::new(Count, summary.count() as f64),
                Measurement::new(Total, summary.total_amount()),
                Measurement::new(Max, summary.max()),
            ],
            Meter::FunctionCounter(counter) => vec![Measurement::new(Count, counter.count())],
            Meter::FunctionTimer(timer) => vec![
                Measurement::new(Count, timer.count()),
                Measurement::new(TotalTime, timer.total_time(base_unit)),
            ],
        }
    }
}

/// Receives the meters of a registry, one at a time.
///
/// Implemented by exporters. See [`MeterRegistry::observe`].
pub trait Observer {
    /// Observes a single meter.
    ///
    /// `metadata` holds the description and base unit given when the meter was registered, if
    /// any.
    fn observe_meter(
        &mut self,
        id: &MeterId,
        kind: MeterKind,
        metadata: Option<&Metadata>,
        measurements: &[Measurement],
    );
}

/// A point-in-time copy of every meter in a registry.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    entries: Vec<(MeterId, MeterKind, Vec<Measurement>)>,
}

impl Snapshot {
    /// Number of meters in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether or not the snapshot holds no meters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Measurements taken from the meter stored under `id`.
    pub fn get(&self, id: &MeterId) -> Option<&[Measurement]> {
        self.entries
            .iter()
            .find(|(candidate, _, _)| candidate == id)
            .map(|(_, _, measurements)| measurements.as_slice())
    }

    /// Value of `statistic` for the meter stored under `id`.
    pub fn value(&self, id: &MeterId, statistic: Statistic) -> Option<f64> {
        self.get(id)?.iter().find(|m| m.statistic == statistic).map(|m| m.value)
    }

    /// Iterates over the meters in the snapshot, ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = (&MeterId, MeterKind, &[Measurement])> {
        self.entries.iter().map(|(id, kind, measurements)| (id, *kind, measurements.as_slice()))
    }

    /// Consumes the snapshot, returning its entries ordered by identifier.
    pub fn into_vec(self) -> Vec<(MeterId, MeterKind, Vec<Measurement>)> {
        self.entries
    }
}

impl MeterRegistry {
    /// Takes a [`Snapshot`] of every meter in the registry, with durations in `base_unit`.
    ///
    /// Meters are read shard by shard, so the snapshot is not atomic across meters.
    pub fn snapshot(&self, base_unit: TimeUnit) -> Snapshot {
        let mut entries = Vec::new();
        self.visit_meters(|id, meter| {
            entries.push((id.clone(), meter.kind(), meter.measure(base_unit)));
        });
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Snapshot { entries }
    }

    /// Hands every meter in the registry to `observer`, with durations in `base_unit`.
    ///
    /// Meters are collected before any are observed, so the observer may call back into the
    /// registry.
    pub fn observe<O>(&self, observer: &mut O, base_unit: TimeUnit)
    where
        O: Observer + ?Sized,
    {
        for (id, meter) in self.meters() {
            let metadata = self.metadata(&id);
            let measurements = meter.measure(base_unit);
            observer.observe_meter(&id, meter.kind(), metadata.as_ref(), &measurements);
        }
    }
}
