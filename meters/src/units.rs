/// Units of time used when reading time-based meters.
///
/// Time-based meters store nanoseconds internally; the unit is chosen by the caller at read time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    ///
    /// One microsecond is equal to 1000 nanoseconds.
    Microseconds,
    /// Milliseconds.
    ///
    /// One millisecond is equal to 1000 microseconds.
    Milliseconds,
    /// Seconds.
    ///
    /// One second is equal to 1000 milliseconds.
    Seconds,
    /// Minutes.
    ///
    /// One minute is equal to 60 seconds.
    Minutes,
    /// Hours.
    ///
    /// One hour is equal to 60 minutes.
    Hours,
    /// Days.
    ///
    /// One day is equal to 24 hours.
    Days,
}

impl TimeUnit {
    /// Gets the string form of this `TimeUnit`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }

    /// Gets the canonical string label for the given unit.
    ///
    /// For example, the canonical label for `Seconds` would be `s`, while for `Nanoseconds`, it
    /// would be `ns`.
    pub fn as_canonical_label(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "μs",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }

    /// Converts the string representation of a unit back into `TimeUnit` if possible.
    ///
    /// The value passed here should match the output of [`TimeUnit::as_str`].
    pub fn from_string(s: &str) -> Option<TimeUnit> {
        match s {
            "nanoseconds" => Some(TimeUnit::Nanoseconds),
            "microseconds" => Some(TimeUnit::Microseconds),
            "milliseconds" => Some(TimeUnit::Milliseconds),
            "seconds" => Some(TimeUnit::Seconds),
            "minutes" => Some(TimeUnit::Minutes),
            "hours" => Some(TimeUnit::Hours),
            "days" => Some(TimeUnit::Days),
            _ => None,
        }
    }

    /// Number of nanoseconds in one of this unit.
    pub fn nanos_per_unit(&self) -> f64 {
        match self {
            TimeUnit::Nanoseconds => 1.0,
            TimeUnit::Microseconds => 1e3,
            TimeUnit::Milliseconds => 1e6,
            TimeUnit::Seconds => 1e9,
            TimeUnit::Minutes => 60e9,
            TimeUnit::Hours => 3_600e9,
            TimeUnit::Days => 86_400e9,
        }
    }

    /// Converts a nanosecond amount into this unit.
    pub fn from_nanos(&self, nanos: f64) -> f64 {
        nanos / self.nanos_per_unit()
    }

    /// Converts an amount in this unit into nanoseconds.
    pub fn to_nanos(&self, amount: f64) -> f64 {
        amount * self.nanos_per_unit()
    }

    /// Converts an amount expressed in `from` into this unit.
    pub fn convert(&self, amount: f64, from: TimeUnit) -> f64 {
        self.from_nanos(from.to_nanos(amount))
    }
}
