//! Meter variants.
//!
//! Every meter stored in a registry is one of a fixed set of variants, modeled by [`Meter`].
//! Variant-specific access goes through [`Variant`], which is how a mismatch between the kind a
//! caller asked for and the kind a meter was created as is detected.
use std::{
    fmt,
    sync::{Arc, Weak},
};

mod counter;
pub use counter::Counter;

mod function;
pub use function::{FunctionCounter, FunctionTimer};

mod gauge;
pub use gauge::{Gauge, TimeGauge};

mod summary;
pub use summary::DistributionSummary;

mod timer;
pub use timer::{Sample, Timer};

use crate::{Error, MeterId};

/// A read-time sampler over externally-owned state.
///
/// Holds only a weak reference to the state: the sampler returns `None` once every other owner has
/// dropped it, and never keeps it alive between reads.
pub(crate) type Sampler<R> = Box<dyn Fn() -> Option<R> + Send + Sync>;

pub(crate) fn sampler<T, F, R>(state: &Arc<T>, f: F) -> Sampler<R>
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    let state: Weak<T> = Arc::downgrade(state);
    Box::new(move || state.upgrade().map(|state| f(&state)))
}

/// Meter kind.
///
/// Defines the kind, or type, of a meter.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MeterKind {
    /// Counter type.
    Counter,
    /// Gauge type.
    Gauge,
    /// Time gauge type.
    TimeGauge,
    /// Timer type.
    Timer,
    /// Distribution summary type.
    DistributionSummary,
    /// Function-tracking counter type.
    FunctionCounter,
    /// Function-tracking timer type.
    FunctionTimer,
}

impl MeterKind {
    /// Gets the string form of this `MeterKind`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeterKind::Counter => "counter",
            MeterKind::Gauge => "gauge",
            MeterKind::TimeGauge => "time gauge",
            MeterKind::Timer => "timer",
            MeterKind::DistributionSummary => "distribution summary",
            MeterKind::FunctionCounter => "function counter",
            MeterKind::FunctionTimer => "function timer",
        }
    }
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A meter of any kind.
///
/// Cloning a `Meter` clones the handle, not the meter: all clones refer to the same underlying
/// state.
#[derive(Clone, Debug)]
pub enum Meter {
    /// A counter.
    Counter(Arc<Counter>),
    /// A gauge.
    Gauge(Arc<Gauge>),
    /// A time gauge.
    TimeGauge(Arc<TimeGauge>),
    /// A timer.
    Timer(Arc<Timer>),
    /// A distribution summary.
    DistributionSummary(Arc<DistributionSummary>),
    /// A function-tracking counter.
    FunctionCounter(Arc<FunctionCounter>),
    /// A function-tracking timer.
    FunctionTimer(Arc<FunctionTimer>),
}

impl Meter {
    /// Kind of this meter.
    pub fn kind(&self) -> MeterKind {
        match self {
            Meter::Counter(_) => MeterKind::Counter,
            Meter::Gauge(_) => MeterKind::Gauge,
            Meter::TimeGauge(_) => MeterKind::TimeGauge,
            Meter::Timer(_) => MeterKind::Timer,
            Meter::DistributionSummary(_) => MeterKind::DistributionSummary,
            Meter::FunctionCounter(_) => MeterKind::FunctionCounter,
            Meter::FunctionTimer(_) => MeterKind::FunctionTimer,
        }
    }

    /// Whether or not both handles refer to the same meter.
    pub fn ptr_eq(&self, other: &Meter) -> bool {
        match (self, other) {
            (Meter::Counter(a), Meter::Counter(b)) => Arc::ptr_eq(a, b),
            (Meter::Gauge(a), Meter::Gauge(b)) => Arc::ptr_eq(a, b),
            (Meter::TimeGauge(a), Meter::TimeGauge(b)) => Arc::ptr_eq(a, b),
            (Meter::Timer(a), Meter::Timer(b)) => Arc::ptr_eq(a, b),
            (Meter::DistributionSummary(a), Meter::DistributionSummary(b)) => Arc::ptr_eq(a, b),
            (Meter::FunctionCounter(a), Meter::FunctionCounter(b)) => Arc::ptr_eq(a, b),
            (Meter::FunctionTimer(a), Meter::FunctionTimer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Gets a reference to the meter as the variant `V`, if it is one.
    pub fn as_variant<V: Variant>(&self) -> Option<&Arc<V>> {
        V::from_meter(self)
    }

    /// Converts this meter into the variant `V`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KindMismatch`] if the meter is of a different kind.
    pub fn into_variant<V: Variant>(self, id: &MeterId) -> Result<Arc<V>, Error> {
        match V::from_meter(&self) {
            Some(meter) => Ok(Arc::clone(meter)),
            None => {
                Err(Error::KindMismatch { id: id.clone(), expected: V::KIND, actual: self.kind() })
            }
        }
    }
}

/// A concrete meter variant that can be extracted from a [`Meter`].
pub trait Variant: Sized {
    /// The kind of meter this variant represents.
    const KIND: MeterKind;

    /// Gets a reference to the variant if `meter` is of this kind.
    fn from_meter(meter: &Meter) -> Option<&Arc<Self>>;

    /// Wraps the variant back into a [`Meter`].
    fn into_meter(this: Arc<Self>) -> Meter;
}

macro_rules! impl_variant {
    ($ty:ident, $kind:ident) => {
        impl Variant for $ty {
            const KIND: MeterKind = MeterKind::$kind;

            fn from_meter(meter: &Meter) -> Option<&Arc<Self>> {
                match meter {
                    Meter::$kind(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_meter(this: Arc<Self>) -> Meter {
                Meter::$kind(this)
            }
        }
    };
}

impl_variant!(Counter, Counter);
impl_variant!(Gauge, Gauge);
impl_variant!(TimeGauge, TimeGauge);
impl_variant!(Timer, Timer);
impl_variant!(DistributionSummary, DistributionSummary);
impl_variant!(FunctionCounter, FunctionCounter);
impl_variant!(FunctionTimer, FunctionTimer);
