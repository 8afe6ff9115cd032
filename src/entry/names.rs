//! Entry naming rules
//!
//! Checks applied to user-supplied names before any request leaves the client,
//! plus the helpers that derive names shown in the list.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Trash entries carry a deletion timestamp suffix, e.g. `notes.txt.d1699999999`
static TRASH_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\.d[0-9]+$").expect("static regex"));

/// Trailing copy counter, e.g. `report (2)`
static COPY_COUNTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)\)").expect("static regex"));

/// Characters a file name may never contain
const FORBIDDEN_CHARS: &[char] = &['\\', '/', '<', '>', ':', '"', '|', '?', '*'];

/// Reasons a name is rejected by a [`NamePolicy`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("File name cannot be empty")]
    Empty,

    #[error("\"{0}\" is an invalid file name")]
    Reserved(String),

    #[error("Invalid name, '{0}' is not allowed")]
    ForbiddenChar(char),

    #[error("Name is too long ({len} > {max} characters)")]
    TooLong { len: usize, max: usize },
}

/// External naming-policy check applied to rename submissions
pub trait NamePolicy {
    /// Validate a candidate name
    ///
    /// # Errors
    ///
    /// Returns the reason the name is not acceptable.
    fn check(&self, name: &str) -> Result<(), NameError>;
}

/// Policy matching the server's own file name rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultNamePolicy {
    pub max_len: usize,
}

impl Default for DefaultNamePolicy {
    fn default() -> Self {
        Self { max_len: 250 }
    }
}

impl NamePolicy for DefaultNamePolicy {
    fn check(&self, name: &str) -> Result<(), NameError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(NameError::Empty);
        }
        if trimmed == "." || trimmed == ".." {
            return Err(NameError::Reserved(trimmed.to_string()));
        }
        if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(NameError::ForbiddenChar(c));
        }
        let len = name.chars().count();
        if len > self.max_len {
            return Err(NameError::TooLong {
                len,
                max: self.max_len,
            });
        }
        Ok(())
    }
}

/// Strip the `.d<digits>` suffix trash entries carry
#[must_use]
pub fn strip_trash_suffix(name: &str) -> &str {
    TRASH_SUFFIX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map_or(name, |m| m.as_str())
}

/// Derive a name that does not collide with any name for which `taken` returns true
///
/// `a.txt` becomes `a (2).txt`, then `a (3).txt`; an existing counter is incremented
/// rather than nested.
pub fn unique_name(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut candidate = name.to_string();
    while taken(&candidate) {
        candidate = next_candidate(&candidate);
    }
    candidate
}

fn next_candidate(name: &str) -> String {
    let (base, extension) = match name.rsplit_once('.') {
        Some((base, ext)) => (base, Some(ext)),
        None => (name, None),
    };

    let last_counter = COPY_COUNTER
        .captures_iter(base)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok());

    let (stem, num) = match last_counter {
        Some(n) => {
            let stem = base.rsplit_once('(').map_or(base, |(stem, _)| stem).trim();
            (stem, n + 1)
        }
        None => (base, 2),
    };

    match extension {
        Some(ext) => format!("{stem} ({num}).{ext}"),
        None => format!("{stem} ({num})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_accepts_regular_names() {
        let policy = DefaultNamePolicy::default();
        assert!(policy.check("holiday 2024.jpg").is_ok());
        assert!(policy.check(".hidden").is_ok());
    }

    #[test]
    fn test_default_policy_rejections() {
        let policy = DefaultNamePolicy::default();
        assert_eq!(policy.check("   "), Err(NameError::Empty));
        assert_eq!(policy.check(".."), Err(NameError::Reserved("..".into())));
        assert_eq!(policy.check("a/b"), Err(NameError::ForbiddenChar('/')));
        assert_eq!(
            DefaultNamePolicy { max_len: 3 }.check("abcd"),
            Err(NameError::TooLong { len: 4, max: 3 })
        );
    }

    #[test]
    fn test_strip_trash_suffix() {
        assert_eq!(strip_trash_suffix("notes.txt.d1699999999"), "notes.txt");
        assert_eq!(strip_trash_suffix("photos.d12"), "photos");
        assert_eq!(strip_trash_suffix("notes.txt"), "notes.txt");
        assert_eq!(strip_trash_suffix(".d12"), ".d12");
    }

    #[test]
    fn test_unique_name_untaken_is_unchanged() {
        assert_eq!(unique_name("a.txt", |_| false), "a.txt");
    }

    #[test]
    fn test_unique_name_increments_counter() {
        let taken = ["a.txt", "a (2).txt", "a (3).txt"];
        assert_eq!(unique_name("a.txt", |n| taken.contains(&n)), "a (4).txt");
    }

    #[test]
    fn test_unique_name_without_extension() {
        let taken = ["New folder"];
        assert_eq!(
            unique_name("New folder", |n| taken.contains(&n)),
            "New folder (2)"
        );
    }
}
