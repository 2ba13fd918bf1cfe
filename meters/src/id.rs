//! Meter identity: tags and meter identifiers.
use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use rapidhash::fast::RapidHasher;

use crate::Error;

/// An owned or borrowed string used for names, tag keys and tag values.
pub type SharedString = Cow<'static, str>;

/// Dimensional metadata attached to a meter, in the form of a key/value pair.
///
/// Tags differentiate meters that share a name. For example, a request counter might be tagged
/// with the user or route that was served, and then queried either in aggregate or per tag.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
pub struct Tag(SharedString, SharedString);

impl Tag {
    /// Creates a [`Tag`] from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        Tag(key.into(), value.into())
    }

    /// Creates a [`Tag`] from a static key and value.
    pub const fn from_static_parts(key: &'static str, value: &'static str) -> Self {
        Tag(Cow::Borrowed(key), Cow::Borrowed(value))
    }

    /// Key of this tag.
    pub fn key(&self) -> &str {
        self.0.as_ref()
    }

    /// Value of this tag.
    pub fn value(&self) -> &str {
        self.1.as_ref()
    }

    /// Consumes this [`Tag`], returning the key and value.
    pub fn into_parts(self) -> (SharedString, SharedString) {
        (self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.0, self.1)
    }
}

impl<K, V> From<(K, V)> for Tag
where
    K: Into<SharedString>,
    V: Into<SharedString>,
{
    fn from(pair: (K, V)) -> Tag {
        Tag::new(pair.0, pair.1)
    }
}

impl<K, V> From<&(K, V)> for Tag
where
    K: Into<SharedString> + Clone,
    V: Into<SharedString> + Clone,
{
    fn from(pair: &(K, V)) -> Tag {
        Tag::new(pair.0.clone(), pair.1.clone())
    }
}

impl From<&Tag> for Tag {
    fn from(tag: &Tag) -> Tag {
        tag.clone()
    }
}

/// A value that can be converted to [`Tag`]s.
pub trait IntoTags {
    /// Consumes this value, turning it into a vector of [`Tag`]s.
    fn into_tags(self) -> Vec<Tag>;
}

impl IntoTags for () {
    fn into_tags(self) -> Vec<Tag> {
        Vec::new()
    }
}

impl IntoTags for Vec<Tag> {
    fn into_tags(self) -> Vec<Tag> {
        self
    }
}

impl<L, const N: usize> IntoTags for [L; N]
where
    L: Into<Tag>,
{
    fn into_tags(self) -> Vec<Tag> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T, L> IntoTags for &T
where
    T: ?Sized,
    Self: IntoIterator<Item = L>,
    L: Into<Tag>,
{
    fn into_tags(self) -> Vec<Tag> {
        self.into_iter().map(Into::into).collect()
    }
}

/// The identity of a meter: a name plus an unordered set of tags.
///
/// Tags are canonicalized on construction: they are sorted by key, and when the same key is
/// supplied more than once, the last value for that key wins. Two identifiers are therefore equal
/// whenever their names are equal and their tag sets are equal, regardless of the order in which
/// the tags were given.
///
/// The hash of the identifier is computed once, at construction, and reused for every lookup.
#[derive(Clone)]
pub struct MeterId {
    name: SharedString,
    tags: Vec<Tag>,
    hash: u64,
}

impl MeterId {
    /// Creates a `MeterId` from a name and a set of tags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if the name is empty or blank, or if any tag key is empty.
    pub fn new<N, T>(name: N, tags: T) -> Result<Self, Error>
    where
        N: Into<SharedString>,
        T: IntoTags,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidId { reason: "meter name must not be empty" });
        }

        let mut tags = tags.into_tags();
        if tags.iter().any(|tag| tag.key().is_empty()) {
            return Err(Error::InvalidId { reason: "tag keys must not be empty" });
        }

        canonicalize(&mut tags);
        let hash = Self::compute_hash(&name, &tags);
        Ok(MeterId { name, tags, hash })
    }

    /// Creates a `MeterId` from a name alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if the name is empty or blank.
    pub fn from_name<N>(name: N) -> Result<Self, Error>
    where
        N: Into<SharedString>,
    {
        Self::new(name, ())
    }

    fn compute_hash(name: &str, tags: &[Tag]) -> u64 {
        let mut hasher = RapidHasher::default();
        name.hash(&mut hasher);
        tags.hash(&mut hasher);
        hasher.finish()
    }

    /// Pre-computed hash of this identifier.
    #[inline]
    pub fn get_hash(&self) -> u64 {
        self.hash
    }

    /// Name of this identifier.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Tags of this identifier, sorted by key.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Value of the tag with the given key, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|tag| tag.key().cmp(key))
            .ok()
            .map(|idx| self.tags[idx].value())
    }

    /// Whether or not this identifier carries exactly the given tag.
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tag(tag.key()) == Some(tag.value())
    }

    /// Creates a new identifier with the same name and the given tags added.
    ///
    /// Added tags replace existing tags with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if any added tag has an empty key.
    pub fn with_tags<T: IntoTags>(&self, tags: T) -> Result<MeterId, Error> {
        let mut merged = self.tags.clone();
        merged.extend(tags.into_tags());
        MeterId::new(self.name.clone(), merged)
    }

    /// Consumes this identifier, returning the name and tags.
    pub fn into_parts(self) -> (SharedString, Vec<Tag>) {
        (self.name, self.tags)
    }
}

/// Sorts tags by key and removes duplicated keys, keeping the value supplied last.
pub(crate) fn canonicalize(tags: &mut Vec<Tag>) {
    // Reversed before the stable sort so the last-supplied tag leads its run and survives dedup.
    tags.reverse();
    tags.sort_by(|a, b| a.key().cmp(b.key()));
    tags.dedup_by(|later, earlier| later.key() == earlier.key());
}

impl PartialEq for MeterId {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.name == other.name && self.tags == other.tags
    }
}

impl Eq for MeterId {}

impl Hash for MeterId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialOrd for MeterId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MeterId {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.name, &self.tags).cmp(&(&other.name, &other.tags))
    }
}

impl fmt::Debug for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterId").field("name", &self.name).field("tags", &self.tags).finish()
    }
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            write!(f, "{}", self.name)
        } else {
            let pairs = self.tags.iter().map(ToString::to_string).collect::<Vec<_>>();
            write!(f, "{}{{{}}}", self.name, pairs.join(","))
        }
    }
}

/// A pass-through hasher for pre-hashed [`MeterId`]s.
///
/// `MeterId` computes its hash once at construction and feeds it to the hasher with
/// `write_u64`, so the registry's maps never rehash names and tags.
#[derive(Debug, Default)]
pub struct IdHasher {
    hash: u64,
}

impl Hasher for IdHasher {
    #[inline(always)]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.hash = self.hash.rotate_left(5) ^ u64::from(*byte);
        }
    }

    #[inline(always)]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

#[cfg(test)]
mod tests {
    use super::{MeterId, Tag};
    use crate::Error;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_tag_order_is_irrelevant() {
        let a = MeterId::new("x", &[("a", "1"), ("b", "2")]).unwrap();
        let b = MeterId::new("x", &[("b", "2"), ("a", "1")]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "x{a=1,b=2}");
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let id = MeterId::new("x", &[("user", "foo"), ("env", "prod"), ("user", "bar")]).unwrap();
        assert_eq!(id.tags().len(), 2);
        assert_eq!(id.tag("user"), Some("bar"));
        assert_eq!(id, MeterId::new("x", &[("env", "prod"), ("user", "bar")]).unwrap());
    }

    #[test]
    fn test_names_and_tags_distinguish() {
        let base = MeterId::new("x", &[("a", "1")]).unwrap();
        assert_ne!(base, MeterId::new("y", &[("a", "1")]).unwrap());
        assert_ne!(base, MeterId::new("x", &[("a", "2")]).unwrap());
        assert_ne!(base, MeterId::from_name("x").unwrap());
    }

    #[test]
    fn test_invalid_ids() {
        assert!(matches!(MeterId::from_name(""), Err(Error::InvalidId { .. })));
        assert!(matches!(MeterId::from_name("  "), Err(Error::InvalidId { .. })));
        assert!(matches!(MeterId::new("x", &[("", "1")]), Err(Error::InvalidId { .. })));
    }

    #[test]
    fn test_with_tags_overrides() {
        let id = MeterId::new("x", &[("a", "1"), ("b", "2")]).unwrap();
        let updated = id.with_tags([Tag::new("b", "3"), Tag::new("c", "4")]).unwrap();
        assert_eq!(updated.tag("a"), Some("1"));
        assert_eq!(updated.tag("b"), Some("3"));
        assert_eq!(updated.tag("c"), Some("4"));
        assert!(updated.has_tag(&Tag::from_static_parts("c", "4")));
        assert!(!updated.has_tag(&Tag::from_static_parts("b", "2")));

        assert!(matches!(id.with_tags([Tag::new("", "v")]), Err(Error::InvalidId { .. })));
    }

    #[quickcheck]
    fn prop_tag_order_independent(pairs: Vec<(u8, u8)>) -> bool {
        // Unique keys only: with duplicates, order decides which value wins.
        let mut seen = std::collections::HashSet::new();
        let tags: Vec<Tag> = pairs
            .into_iter()
            .filter(|(k, _)| seen.insert(*k))
            .map(|(k, v)| Tag::new(format!("k{}", k), format!("v{}", v)))
            .collect();
        let mut reversed = tags.clone();
        reversed.reverse();

        MeterId::new("prop", tags).unwrap() == MeterId::new("prop", reversed).unwrap()
    }
}
