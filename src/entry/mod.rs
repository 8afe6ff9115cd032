//! Entry model - files and folders of one directory listing
//!
//! - `types`: The `Entry` record and its identifier, size, permission and mount types
//! - `names`: Name validation policy and derived names (trash names, unique copies)

pub mod names;
pub mod types;

pub use names::{DefaultNamePolicy, NameError, NamePolicy, strip_trash_suffix, unique_name};
pub use types::{Entry, EntryId, EntryKind, EntrySize, MountKind, Permissions, ShareCounts};
