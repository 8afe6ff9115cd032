//! Entry ordering
//!
//! A small comparator registry keyed by [`SortKey`]. Name ordering always lists
//! directories before files, whatever the direction; within one kind names compare
//! in natural order (digit runs by value, letters case-insensitively). Size and
//! modification time compare numerically. Descending order negates the comparison
//! but never the directories-first rule.
//!
//! Ordering is applied with a stable sort so entries that compare equal keep their
//! input order.

use crate::entry::Entry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Attribute entries are ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Mtime,
}

/// Direction of the ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// The other direction
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Where re-sorting happens
///
/// Chosen once per deployment; a session never mixes the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Re-order the loaded entries in memory
    #[default]
    Client,
    /// Discard local order and reload the listing with the new sort parameters
    Server,
}

/// Current ordering of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortState {
    #[must_use]
    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Mtime => "mtime",
        })
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

/// Compare two entries under `state`
#[must_use]
pub fn compare(a: &Entry, b: &Entry, state: SortState) -> Ordering {
    let ord = match state.key {
        SortKey::Name => {
            if a.is_dir() != b.is_dir() {
                // Directories first, independent of direction
                return if a.is_dir() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
            }
            natural_cmp(&a.name, &b.name)
        }
        SortKey::Size => a.size.bytes().cmp(&b.size.bytes()),
        SortKey::Mtime => a.modified_at.cmp(&b.modified_at),
    };

    match state.direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

/// Stable in-place sort of `entries` under `state`
pub fn sort_entries(entries: &mut [Entry], state: SortState) {
    entries.sort_by(|a, b| compare(a, b, state));
}

/// Natural, case-insensitive string ordering
///
/// Runs of ASCII digits compare by numeric value (`file2` < `file10`); with equal
/// values the run with fewer leading zeros sorts first.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let da = take_digits(&mut ai);
                let db = take_digits(&mut bi);
                let ord = cmp_digit_runs(&da, &db);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let at = a.trim_start_matches('0');
    let bt = b.trim_start_matches('0');
    at.len()
        .cmp(&bt.len())
        .then_with(|| at.cmp(bt))
        .then_with(|| a.len().cmp(&b.len()))
}
