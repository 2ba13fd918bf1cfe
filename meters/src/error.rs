use thiserror::Error;

use crate::{MeterId, MeterKind, Tag};

/// Errors that can occur while registering or resolving meters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The meter identifier could not be built.
    #[error("invalid meter id: {reason}")]
    InvalidId {
        /// Details about why the identifier was rejected.
        reason: &'static str,
    },

    /// A single-result search matched no meters.
    #[error("no meter named '{name}' matching tags {tags:?}")]
    MeterNotFound {
        /// Name that was searched for.
        name: String,
        /// Tags the search was narrowed by.
        tags: Vec<Tag>,
    },

    /// A single-result search matched more than one meter.
    #[error("{matches} meters named '{name}' match tags {tags:?}; narrow the search with more tags")]
    AmbiguousMeter {
        /// Name that was searched for.
        name: String,
        /// Tags the search was narrowed by.
        tags: Vec<Tag>,
        /// How many meters matched.
        matches: usize,
    },

    /// A meter was accessed as a different kind than the one it was created as.
    #[error("meter {id} is a {actual}, not a {expected}")]
    KindMismatch {
        /// Identifier of the meter.
        id: MeterId,
        /// Kind the caller asked for.
        expected: MeterKind,
        /// Kind the meter was created as.
        actual: MeterKind,
    },

    /// A multi-gauge row resolved to a gauge that samples external state.
    #[error("meter {id} is a gauge sampling external state and cannot hold a row value")]
    GaugeConflict {
        /// Identifier of the row.
        id: MeterId,
    },
}
