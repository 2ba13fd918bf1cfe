use quanta::Clock;

use crate::{id::canonicalize, IntoTags, MeterRegistry, Tag};

/// Builder for [`MeterRegistry`].
#[derive(Clone)]
pub struct RegistryBuilder {
    shards: usize,
    common_tags: Vec<Tag>,
    clock: Clock,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            shards: std::cmp::max(1, num_cpus::get()).next_power_of_two(),
            common_tags: Vec::new(),
            clock: Clock::new(),
        }
    }
}

impl RegistryBuilder {
    /// Creates a new [`RegistryBuilder`] with default values.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the number of shards meters are spread across.
    ///
    /// Rounded up to the next power of two. Defaults to the number of CPUs.
    ///
    /// More shards reduce contention when many threads register meters at the same time, at the
    /// cost of slightly more expensive iteration.
    #[must_use]
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Sets tags that are added to every meter registered through the registry.
    ///
    /// Tags given at registration replace common tags with the same key.
    #[must_use]
    pub fn with_common_tags<T: IntoTags>(mut self, tags: T) -> Self {
        let mut tags = tags.into_tags();
        tags.retain(|tag| !tag.key().is_empty());
        canonicalize(&mut tags);
        self.common_tags = tags;
        self
    }

    /// Sets the clock used by timers and samples.
    ///
    /// Defaults to [`Clock::new`]. Tests can pass a mocked clock to control elapsed time.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a [`MeterRegistry`] based on this configuration.
    pub fn build(self) -> MeterRegistry {
        MeterRegistry::from_parts(self.shards, self.common_tags, self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::RegistryBuilder;
    use crate::{Tag, TimeUnit};
    use approx::assert_relative_eq;
    use quanta::Clock;
    use std::time::Duration;

    #[test]
    fn test_common_tags_are_canonical() {
        let builder =
            RegistryBuilder::new().with_common_tags(&[("b", "1"), ("a", "2"), ("b", "3"), ("", "x")]);
        let registry = builder.build();
        assert_eq!(registry.common_tags(), &[Tag::new("a", "2"), Tag::new("b", "3")][..]);
    }

    #[test]
    fn test_mocked_clock_drives_samples() {
        let (clock, mock) = Clock::mock();
        let registry = RegistryBuilder::new().with_clock(clock).with_shards(3).build();

        let sample = registry.start_sample();
        mock.increment(Duration::from_secs(1));
        let timer = registry.timer("programs.timer", ()).unwrap();
        sample.stop(&timer);

        assert_relative_eq!(
            registry.find("programs.timer").timer().unwrap().total_time(TimeUnit::Seconds),
            1.0
        );
    }
}
