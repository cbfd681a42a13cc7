//! Query compiler: translates a structured [`Query`] plus a cursor into a
//! predicate the event log can evaluate.
//!
//! A [`QueryItem`] is a conjunction: an optional set of event types (OR'd
//! together) AND an optional tag set (every tag must be present on the
//! event). A [`Query`] is a disjunction of items. This mirrors the
//! teacher's `StreamFilter::{Eq,And,Or}` tree, but built at runtime from
//! plain data instead of compile-time identifiers, since the tags here are
//! dynamic `key=value` strings rather than a statically registered schema.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tag::TagSet;

/// A `QueryItem` was built with neither event types nor tags.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("a query item must specify at least one event type or one tag")]
pub struct EmptyQueryItem;

/// A conjunction over event types and tags.
///
/// `types`, if present, is non-empty and matched as `event.type ∈ types`.
/// `tags`, if present, is non-empty and matched as `event.tags ⊇ tags`. At
/// least one of the two must be set (§3 invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryItem {
    types: Option<Vec<String>>,
    tags: Option<TagSet>,
}

impl QueryItem {
    /// Builds a query item, rejecting the case where neither `types` nor
    /// `tags` was provided.
    pub fn new(types: Option<Vec<String>>, tags: Option<TagSet>) -> Result<Self, EmptyQueryItem> {
        let types = types.filter(|t| !t.is_empty());
        let tags = tags.filter(|t| !t.is_empty());
        if types.is_none() && tags.is_none() {
            return Err(EmptyQueryItem);
        }
        Ok(Self { types, tags })
    }

    /// A query item matching only on event type.
    pub fn of_types(types: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, EmptyQueryItem> {
        Self::new(Some(types.into_iter().map(Into::into).collect()), None)
    }

    /// A query item matching only on tags.
    pub fn of_tags(tags: TagSet) -> Result<Self, EmptyQueryItem> {
        Self::new(None, Some(tags))
    }

    pub fn types(&self) -> Option<&[String]> {
        self.types.as_deref()
    }

    pub fn tag_set(&self) -> Option<&TagSet> {
        self.tags.as_ref()
    }

    /// Returns true if the given type/tags pair satisfies this item.
    pub fn matches(&self, event_type: &str, event_tags: &TagSet) -> bool {
        let type_ok = self
            .types
            .as_ref()
            .is_none_or(|types| types.iter().any(|t| t == event_type));
        let tags_ok = self
            .tags
            .as_ref()
            .is_none_or(|tags| event_tags.contains_all(tags));
        type_ok && tags_ok
    }

    /// Returns a new item with types/tags in a canonical (sorted,
    /// deduplicated) order, so that two items built differently but
    /// semantically equal compare equal.
    pub fn canonicalize(mut self) -> Self {
        if let Some(types) = self.types.as_mut() {
            types.sort();
            types.dedup();
        }
        self
    }
}

impl fmt::Display for QueryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.types, &self.tags) {
            (Some(types), Some(tags)) => write!(
                f,
                "({}) AND ({})",
                types.join(" OR "),
                tags.iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" AND ")
            ),
            (Some(types), None) => write!(f, "({})", types.join(" OR ")),
            (None, Some(tags)) => write!(
                f,
                "({})",
                tags.iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" AND ")
            ),
            (None, None) => unreachable!("QueryItem::new rejects the empty case"),
        }
    }
}

/// A disjunction of [`QueryItem`]s.
///
/// An empty query matches nothing — this is deliberate (§3): it is not
/// shorthand for "everything", it is the identity of "nothing has happened
/// yet that I care about".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query(Vec<QueryItem>);

impl Query {
    /// The query that matches nothing.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn new(items: impl IntoIterator<Item = QueryItem>) -> Self {
        Self(items.into_iter().collect())
    }

    pub fn single(item: QueryItem) -> Self {
        Self(vec![item])
    }

    /// Combines two queries as a disjunction (`self OR other`).
    pub fn or(mut self, other: Query) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn items(&self) -> &[QueryItem] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the given type/tags pair satisfies any item.
    pub fn matches(&self, event_type: &str, event_tags: &TagSet) -> bool {
        self.0.iter().any(|item| item.matches(event_type, event_tags))
    }

    /// Canonicalizes item order and item-internal order; duplicate items
    /// are removed. Item order and item-internal type/tag order carry no
    /// semantic weight (§3), so two queries built differently but
    /// equivalent compare equal after this call.
    pub fn canonicalize(self) -> Self {
        let mut items: Vec<QueryItem> = self.0.into_iter().map(QueryItem::canonicalize).collect();
        items.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        items.dedup();
        Self(items)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<empty>");
        }
        write!(
            f,
            "{}",
            self.0.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" OR ")
        )
    }
}
