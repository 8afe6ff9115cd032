//! Entry data types
//!
//! These mirror the file records returned by a directory listing. Field names on the
//! wire follow the listing endpoint (`type`, `mimetype`, `mtime`, `mountType`), while
//! the Rust side uses descriptive names.
//!
//! # Types
//!
//! - **`EntryId`**: Stable identifier; the wire may send it as a number or a string
//! - **`EntryKind`**: File or directory
//! - **`EntrySize`**: Byte count, or pending while the server has not computed it
//! - **`Permissions`**: Bitmask of what the current user may do with the entry
//! - **`MountKind`**: Whether the entry lives in a normal folder, a share root or the trash

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable, unique identifier of an entry within one listing
///
/// Listing endpoints send numeric ids while some callers pass them back as strings,
/// so both forms are normalized to their string representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "IdRepr", into = "String")]
pub struct EntryId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

impl From<IdRepr> for EntryId {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Number(n) => Self(n.to_string()),
            IdRepr::Text(s) => Self(s),
        }
    }
}

impl From<EntryId> for String {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

impl EntryId {
    /// Create an id from anything string-like
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! entry_id_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for EntryId {
                fn from(n: $t) -> Self {
                    Self(n.to_string())
                }
            }
        )*
    };
}

entry_id_from_int!(i32, i64, u32, u64, usize);

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// Size of an entry in bytes
///
/// Directories may report their size lazily; until the server has computed it the
/// size is `Pending`, which counts as zero in every aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum EntrySize {
    /// Known size in bytes
    Known(u64),
    /// Not yet known
    #[default]
    Pending,
}

impl EntrySize {
    /// Byte count used for ordering and aggregation (pending counts as zero)
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Known(n) => n,
            Self::Pending => 0,
        }
    }

    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl From<u64> for EntrySize {
    fn from(n: u64) -> Self {
        Self::Known(n)
    }
}

bitflags! {
    /// What the current user may do with an entry (or with the current directory)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(from = "u32", into = "u32")]
    pub struct Permissions: u32 {
        const READ = 1;
        const UPDATE = 2;
        const CREATE = 4;
        const DELETE = 8;
        const SHARE = 16;
    }
}

impl From<u32> for Permissions {
    fn from(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

impl From<Permissions> for u32 {
    fn from(permissions: Permissions) -> Self {
        permissions.bits()
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}

/// Where an entry is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MountKind {
    /// Regular entry of the user's own storage
    #[default]
    Normal,
    /// Root of a folder shared with the user
    SharedRoot,
    /// Entry living in the trash bin
    Trashbin,
}

/// Sharing statistics shown next to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ShareCounts {
    /// Number of private shares
    #[serde(default, rename = "shareCount")]
    pub private_shares: u32,

    /// Number of visits through a public link
    #[serde(default, rename = "publicVisits")]
    pub public_visits: u32,
}

/// One file or directory of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,

    pub name: String,

    #[serde(rename = "type")]
    pub kind: EntryKind,

    #[serde(default, rename = "mimetype")]
    pub mime_type: String,

    #[serde(default)]
    pub size: EntrySize,

    /// Last modification time (wire: epoch milliseconds)
    #[serde(rename = "mtime", with = "chrono::serde::ts_milliseconds")]
    pub modified_at: DateTime<Utc>,

    #[serde(default)]
    pub etag: String,

    #[serde(default)]
    pub permissions: Permissions,

    /// Parent directory; `None` means the directory currently being viewed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default, rename = "mountType")]
    pub mount: MountKind,

    #[serde(flatten)]
    pub shares: ShareCounts,
}

impl Entry {
    /// Create a file entry with default metadata
    #[must_use]
    pub fn file(id: impl Into<EntryId>, name: impl Into<String>, size: u64) -> Self {
        Self::new(id.into(), name.into(), EntryKind::File, EntrySize::Known(size))
    }

    /// Create a directory entry with default metadata
    #[must_use]
    pub fn dir(id: impl Into<EntryId>, name: impl Into<String>) -> Self {
        Self::new(id.into(), name.into(), EntryKind::Dir, EntrySize::Known(0))
    }

    fn new(id: EntryId, name: String, kind: EntryKind, size: EntrySize) -> Self {
        let mime_type = match kind {
            EntryKind::Dir => "httpd/unix-directory".to_string(),
            EntryKind::File => String::new(),
        };
        Self {
            id,
            name,
            kind,
            mime_type,
            size,
            modified_at: DateTime::<Utc>::default(),
            etag: String::new(),
            permissions: Permissions::all(),
            path: None,
            tags: Vec::new(),
            mount: MountKind::Normal,
            shares: ShareCounts::default(),
        }
    }

    /// Set the size
    #[must_use]
    pub fn with_size(mut self, size: impl Into<EntrySize>) -> Self {
        self.size = size.into();
        self
    }

    /// Set the modification time
    #[must_use]
    pub const fn with_modified(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = modified_at;
        self
    }

    /// Set the tags
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the permissions
    #[must_use]
    pub const fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Set the mount kind
    #[must_use]
    pub const fn with_mount(mut self, mount: MountKind) -> Self {
        self.mount = mount;
        self
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Whether the tag set contains `tag` (exact match)
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Directory the entry lives in, falling back to `current_dir`
    #[must_use]
    pub fn parent_dir<'a>(&'a self, current_dir: &'a str) -> &'a str {
        self.path.as_deref().unwrap_or(current_dir)
    }

    /// Name shown to the user; trash entries lose their `.d<digits>` suffix
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.mount == MountKind::Trashbin {
            super::names::strip_trash_suffix(&self.name)
        } else {
            &self.name
        }
    }
}
