//! An in-process meter registry.
//!
//! `meters` records application measurements into named, tagged meters held by a
//! [`MeterRegistry`], and lets them be read back later, either one at a time through a
//! [`Search`] or all at once through a [`Snapshot`] or an [`Observer`].
//!
//! # Overview
//!
//! ## Identity
//! Every meter is identified by a [`MeterId`]: a name plus a set of [`Tag`]s. Tag order does not
//! matter, and when a key is given more than once the last value wins. A registry holds exactly
//! one meter per identifier: the first request creates it, and every later request for the same
//! identifier returns the same meter.
//!
//! ## Meter kinds
//!
//! ### Counters
//! A [`Counter`] accumulates a monotonically increasing total. Negative increments are ignored.
//!
//! ### Gauges
//! A [`Gauge`] reports an instantaneous value. Gauges usually sample state owned by the caller
//! through an accessor function, and only hold a weak reference to that state: once the caller
//! drops it, the gauge reports `NaN`. A [`TimeGauge`] does the same for a duration, and a
//! [`MultiGauge`] manages a whole set of gauges sharing a name.
//!
//! ### Timers
//! A [`Timer`] records durations, keeping a count, a total and a maximum. Durations can be
//! recorded directly, by timing a closure, or through a [`Sample`] started ahead of time.
//!
//! ### Distribution summaries
//! A [`DistributionSummary`] does for arbitrary amounts, such as payload sizes, what a timer does
//! for durations.
//!
//! ### Function-tracking meters
//! A [`FunctionCounter`] and a [`FunctionTimer`] read a count, or a count and total time, out of
//! state the caller owns, such as the statistics of a cache. They are created through
//! [`MeterRegistry::more`].
//!
//! # Usage
//!
//! ```rust
//! use std::sync::{atomic::{AtomicU64, Ordering}, Arc};
//! use std::time::Duration;
//! use meters::{MeterRegistry, TimeUnit};
//!
//! let registry = MeterRegistry::new();
//!
//! registry.counter("requests", &[("route", "/")]).unwrap().increment();
//! registry.timer("latency", ()).unwrap().record(Duration::from_millis(250));
//!
//! let in_flight = registry
//!     .gauge("in_flight", (), &Arc::new(AtomicU64::new(3)), |v| v.load(Ordering::Relaxed) as f64)
//!     .unwrap();
//! assert_eq!(registry.find("in_flight").gauge().unwrap().value(), 3.0);
//!
//! let latency = registry.find("latency").timer().unwrap();
//! assert_eq!(latency.total_time(TimeUnit::Milliseconds), 250.0);
//! # drop(in_flight);
//! ```
//!
//! # Errors
//!
//! Registration fails with [`Error::InvalidId`] for a blank name or an empty tag key. Asking for
//! an existing meter as a different kind than it was created as fails with
//! [`Error::KindMismatch`]. A multi-gauge row that lands on a state-sampling gauge fails with
//! [`Error::GaugeConflict`]. Single-result searches fail with [`Error::MeterNotFound`] or
//! [`Error::AmbiguousMeter`]. Reading a meter whose external state is gone is not an error.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

pub mod atomics;

mod error;
pub use error::Error;

mod id;
pub use id::{IdHasher, IntoTags, MeterId, SharedString, Tag};

pub mod meter;
pub use meter::{
    Counter, DistributionSummary, FunctionCounter, FunctionTimer, Gauge, Meter, MeterKind, Sample,
    TimeGauge, Timer, Variant,
};

mod multi_gauge;
pub use multi_gauge::{MultiGauge, Row};

mod options;
pub use options::{Metadata, MeterOptions};

mod registry;
pub use registry::{
    Measurement, MeterRegistry, Meters, More, Observer, RegistryBuilder, Snapshot, Statistic,
};

mod search;
pub use search::Search;

mod units;
pub use units::TimeUnit;
