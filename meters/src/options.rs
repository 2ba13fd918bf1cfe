use crate::{IntoTags, SharedString, Tag};

/// Descriptive metadata for a meter.
///
/// Metadata never participates in identity: two registrations that differ only in description
/// or base unit resolve to the same meter, and the first registration's metadata is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Long-form description of what the meter measures.
    pub description: Option<SharedString>,
    /// Unit the meter's values are expressed in, such as `bytes` or `requests`.
    pub base_unit: Option<SharedString>,
}

impl Metadata {
    /// Whether or not any metadata is present.
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.base_unit.is_none()
    }
}

/// Options for registering a meter.
///
/// Collects the name, tags and optional metadata of a meter so that it can be handed to a single
/// `register_*` call on [`MeterRegistry`](crate::MeterRegistry):
///
/// ```rust
/// # use meters::{MeterOptions, MeterRegistry};
/// let registry = MeterRegistry::new();
/// let timer = registry
///     .register_timer(
///         MeterOptions::new("http.requests")
///             .with_tag("route", "/users")
///             .with_description("time spent serving requests"),
///     )
///     .expect("valid name");
/// timer.record(std::time::Duration::from_millis(12));
/// ```
#[derive(Clone, Debug)]
pub struct MeterOptions {
    /// Name of the meter.
    pub name: SharedString,
    /// Tags of the meter.
    pub tags: Vec<Tag>,
    /// Descriptive metadata.
    pub metadata: Metadata,
    /// Factor applied to every recorded amount.
    ///
    /// Only used by distribution summaries, where it defaults to `1.0`.
    pub scale: Option<f64>,
}

impl MeterOptions {
    /// Creates options for a meter with the given name and no tags.
    pub fn new<N>(name: N) -> Self
    where
        N: Into<SharedString>,
    {
        Self { name: name.into(), tags: Vec::new(), metadata: Metadata::default(), scale: None }
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Adds a set of tags.
    #[must_use]
    pub fn with_tags<T: IntoTags>(mut self, tags: T) -> Self {
        self.tags.extend(tags.into_tags());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description<D>(mut self, description: D) -> Self
    where
        D: Into<SharedString>,
    {
        self.metadata.description = Some(description.into());
        self
    }

    /// Sets the base unit.
    #[must_use]
    pub fn with_base_unit<U>(mut self, base_unit: U) -> Self
    where
        U: Into<SharedString>,
    {
        self.metadata.base_unit = Some(base_unit.into());
        self
    }

    /// Sets the scale factor used by distribution summaries.
    #[must_use]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
}
