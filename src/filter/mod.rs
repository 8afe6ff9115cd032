//! Filtering of the visible subset
//!
//! A query is either plain text, matched case-insensitively as a substring of the
//! entry name, or a tag query (prefixed with the configured marker, `#` by default)
//! matched exactly against the entry's tags. The empty query matches everything.

use crate::entry::Entry;
use std::collections::BTreeSet;

/// Parsed filter query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Query {
    /// Matches every entry
    #[default]
    All,
    /// Case-insensitive substring of the name (stored lowercased)
    Name(String),
    /// Exact tag
    Tag(String),
}

impl Query {
    /// Parse raw user input
    ///
    /// Input shorter than `min_len` characters behaves as the empty query. A lone
    /// marker also matches everything.
    #[must_use]
    pub fn parse(raw: &str, tag_marker: char, min_len: usize) -> Self {
        if raw.is_empty() || raw.chars().count() < min_len {
            return Self::All;
        }
        match raw.strip_prefix(tag_marker) {
            Some("") => Self::All,
            Some(tag) => Self::Tag(tag.to_string()),
            None => Self::Name(raw.to_lowercase()),
        }
    }

    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether `entry` belongs to the filtered subset
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Self::All => true,
            Self::Name(needle) => entry.name.to_lowercase().contains(needle.as_str()),
            Self::Tag(tag) => entry.has_tag(tag),
        }
    }
}

/// Match `entry` against raw query text using the default `#` marker
#[must_use]
pub fn matches(entry: &Entry, query: &str) -> bool {
    Query::parse(query, '#', 0).matches(entry)
}

/// What the visible subset looks like after filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// The directory has no entries at all
    EmptyDirectory,
    /// The directory has entries but none matches the active query
    NoResults,
    /// `count` entries are visible
    Populated { count: usize },
}

impl ListState {
    /// Classify a listing from its total and visible counts
    #[must_use]
    pub const fn classify(total: usize, visible: usize) -> Self {
        if total == 0 {
            Self::EmptyDirectory
        } else if visible == 0 {
            Self::NoResults
        } else {
            Self::Populated { count: visible }
        }
    }
}

/// Sorted union of all tags carried by `entries`
#[must_use]
pub fn tag_union<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> BTreeSet<String> {
    entries
        .into_iter()
        .flat_map(|entry| entry.tags.iter().cloned())
        .collect()
}
