//! Tags are the multi-entity index of the event log.
//!
//! A tag is a `key=value` pair attached to an event. Unlike a classic
//! aggregate id, a single event can carry tags for every entity it affects
//! (for example a transfer event tagging both `from_wallet_id` and
//! `to_wallet_id`), which is what lets a [`crate::query::Query`] express a
//! consistency boundary that spans more than one entity.
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single `key=value` tag attached to an event.
///
/// Both `key` and `value` must be non-empty; this is enforced at
/// construction so that a [`Tag`] can never be serialized as an ambiguous
/// empty string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    key: String,
    value: String,
}

/// A tag was constructed with an empty key or value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("tag key and value must both be non-empty (got key={key:?}, value={value:?})")]
pub struct InvalidTag {
    key: String,
    value: String,
}

impl Tag {
    /// Creates a new tag, rejecting empty keys or values.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, InvalidTag> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || value.is_empty() {
            return Err(InvalidTag { key, value });
        }
        Ok(Self { key, value })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// An ordered, duplicate-free set of [`Tag`]s.
///
/// `TagSet` canonicalizes on construction (order is never significant to
/// equality or containment) so two tag sets built in a different order
/// compare equal and hash the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self(tags.into_iter().collect())
    }

    pub fn insert(&mut self, tag: Tag) {
        self.0.insert(tag);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// Returns true if `self` contains every tag in `other` (set inclusion,
    /// not list equality — this is the containment rule §4.2 requires for
    /// `QueryItem` tag matching).
    pub fn contains_all(&self, other: &TagSet) -> bool {
        other.0.iter().all(|tag| self.0.contains(tag))
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::collections::btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Convenience macro for building a [`TagSet`] from `key: value` pairs.
///
/// ```
/// use dcb_core::tags;
///
/// let t = tags! { wallet_id: "w1", currency: "usd" };
/// assert_eq!(t.len(), 2);
/// ```
#[macro_export]
macro_rules! tags {
    {} => {
        $crate::tag::TagSet::new()
    };
    {$($key:ident: $value:expr),* $(,)?} => {{
        let mut set = $crate::tag::TagSet::new();
        $(set.insert($crate::tag::Tag::new(stringify!($key), $value).expect("tags! literal keys are never empty"));)*
        set
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key_or_value() {
        assert!(Tag::new("", "v").is_err());
        assert!(Tag::new("k", "").is_err());
        assert!(Tag::new("k", "v").is_ok());
    }

    #[test]
    fn tag_set_collapses_duplicates_and_ignores_order() {
        let a = TagSet::from_tags([
            Tag::new("b", "2").unwrap(),
            Tag::new("a", "1").unwrap(),
            Tag::new("a", "1").unwrap(),
        ]);
        let b = TagSet::from_tags([Tag::new("a", "1").unwrap(), Tag::new("b", "2").unwrap()]);
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn containment_is_set_inclusion() {
        let event_tags = tags! { wallet_id: "w1", currency: "usd" };
        let query_tags = tags! { wallet_id: "w1" };
        assert!(event_tags.contains_all(&query_tags));

        let unrelated = tags! { wallet_id: "w2" };
        assert!(!event_tags.contains_all(&unrelated));
    }
}
