//! Running counts and sizes for a set of entries
//!
//! The aggregator is maintained incrementally so that toggling one entry in or out
//! of a selection costs O(1). `recompute` exists for bulk replacement (directory
//! load, filter change) and always agrees with folding `add` over the same entries.

use crate::entry::{Entry, EntryKind};
use byte_unit::{Byte, UnitType};
use thiserror::Error;

/// Aggregate over a set of entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub dir_count: usize,
    pub file_count: usize,
    pub total_size: u64,
}

impl Summary {
    /// Number of entries of either kind
    #[must_use]
    pub const fn total(&self) -> usize {
        self.dir_count + self.file_count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Total size with binary units, e.g. `1.5 KiB`
    #[must_use]
    pub fn human_size(&self) -> String {
        Byte::from_u64(self.total_size)
            .get_appropriate_unit(UnitType::Binary)
            .to_string()
    }
}

/// Removing an entry that was never added
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("Summary underflow: no {kind:?} left to remove")]
    CountUnderflow { kind: EntryKind },

    #[error("Summary underflow: cannot remove {size} bytes from {total}")]
    SizeUnderflow { size: u64, total: u128 },
}

/// Incrementally maintained [`Summary`]
///
/// Sizes are accumulated in 128 bits so that adding and removing stays exact even
/// when a listing reports sizes near `u64::MAX`; the reported total saturates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryAggregator {
    dir_count: usize,
    file_count: usize,
    bytes: u128,
}

impl SummaryAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an aggregator over `entries`
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut aggregator = Self::new();
        aggregator.recompute(entries);
        aggregator
    }

    /// Current aggregate
    #[must_use]
    pub const fn summary(&self) -> Summary {
        let total_size = if self.bytes > u64::MAX as u128 {
            u64::MAX
        } else {
            self.bytes as u64
        };
        Summary {
            dir_count: self.dir_count,
            file_count: self.file_count,
            total_size,
        }
    }

    /// Count `entry`
    pub fn add(&mut self, entry: &Entry) {
        match entry.kind {
            EntryKind::Dir => self.dir_count += 1,
            EntryKind::File => self.file_count += 1,
        }
        self.bytes += u128::from(entry.size.bytes());
    }

    /// Uncount `entry`
    ///
    /// # Panics
    ///
    /// Panics when `entry` was never added; that is a bookkeeping bug in the caller.
    pub fn remove(&mut self, entry: &Entry) {
        if let Err(e) = self.try_remove(entry) {
            panic!("{e}");
        }
    }

    /// Uncount `entry`, leaving the aggregate untouched when it would underflow
    ///
    /// # Errors
    ///
    /// Returns `SummaryError` when the count for the entry's kind is already zero or
    /// its size exceeds the running total.
    pub fn try_remove(&mut self, entry: &Entry) -> Result<(), SummaryError> {
        let count = match entry.kind {
            EntryKind::Dir => self.dir_count,
            EntryKind::File => self.file_count,
        };
        if count == 0 {
            return Err(SummaryError::CountUnderflow { kind: entry.kind });
        }
        let size = entry.size.bytes();
        let bytes = self
            .bytes
            .checked_sub(u128::from(size))
            .ok_or(SummaryError::SizeUnderflow {
                size,
                total: self.bytes,
            })?;

        match entry.kind {
            EntryKind::Dir => self.dir_count -= 1,
            EntryKind::File => self.file_count -= 1,
        }
        self.bytes = bytes;
        Ok(())
    }

    /// Rebuild from scratch over `entries`
    pub fn recompute<'a>(&mut self, entries: impl IntoIterator<Item = &'a Entry>) {
        self.clear();
        for entry in entries {
            self.add(entry);
        }
    }

    /// Reset to the empty aggregate
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
