//! The ordered entry list of one directory view
//!
//! The model owns the authoritative sequence of entries, kept in the order imposed
//! by the last applied [`SortState`], next to an id -> position index for constant
//! time lookups. Entries pending deletion stay in the sequence and are only marked
//! hidden, so an undo is a flag flip rather than a re-insert.

use crate::entry::{Entry, EntryId};
use crate::sort::{self, SortState};
use std::collections::{HashMap, HashSet};
use std::ops::Deref;

/// Ordered, id-unique list of entries
#[derive(Debug, Clone, Default)]
pub struct EntryListModel {
    entries: Vec<Entry>,
    /// Position of every entry in `entries`
    index: HashMap<EntryId, usize>,
    hidden: HashSet<EntryId>,
    sort: SortState,
}

impl EntryListModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty model that orders by `sort`
    #[must_use]
    pub fn with_sort(sort: SortState) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }

    /// Swap in a freshly loaded listing
    ///
    /// Duplicate ids collapse to one entry: the last occurrence supplies the value,
    /// the first occurrence keeps its position. Hidden marks are dropped. The result is
    /// then ordered by the current sort state.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = Entry>) {
        let mut positions: HashMap<EntryId, usize> = HashMap::new();
        let mut deduped: Vec<Entry> = Vec::new();
        for entry in entries {
            if let Some(&pos) = positions.get(&entry.id) {
                deduped[pos] = entry;
            } else {
                positions.insert(entry.id.clone(), deduped.len());
                deduped.push(entry);
            }
        }
        self.entries = deduped;
        self.hidden.clear();
        sort::sort_entries(&mut self.entries, self.sort);
        self.reindex_from(0);
    }

    /// Insert `entry` at its sorted position and return that index
    ///
    /// The scan stops at the first entry that sorts strictly after `entry`, so equal
    /// entries keep insertion order. An entry with the same id is replaced.
    pub fn insert_sorted(&mut self, entry: Entry) -> usize {
        self.remove_by_id(&entry.id);
        let index = self
            .entries
            .iter()
            .position(|existing| sort::compare(existing, &entry, self.sort).is_gt())
            .unwrap_or(self.entries.len());
        self.entries.insert(index, entry);
        self.reindex_from(index);
        index
    }

    /// Remove and return the entry with `id`
    pub fn remove_by_id(&mut self, id: &EntryId) -> Option<Entry> {
        let index = self.index.remove(id)?;
        self.hidden.remove(id);
        let entry = self.entries.remove(index);
        self.reindex_from(index);
        Some(entry)
    }

    #[must_use]
    pub fn find_by_id(&self, id: &EntryId) -> Option<&Entry> {
        self.index.get(id).and_then(|&i| self.entries.get(i))
    }

    /// First entry called exactly `name`
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    #[must_use]
    pub fn index_of(&self, id: &EntryId) -> Option<usize> {
        self.index.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: &EntryId) -> bool {
        self.index.contains_key(id)
    }

    /// Apply `update` to the entry with `id` in place
    ///
    /// The position is left untouched, so callers changing a sort-relevant field must
    /// re-insert with [`Self::insert_sorted`] afterwards.
    pub fn update(&mut self, id: &EntryId, update: impl FnOnce(&mut Entry)) -> bool {
        let Some(&index) = self.index.get(id) else {
            return false;
        };
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        update(entry);
        if &entry.id != id {
            let moved = entry.id.clone();
            self.index.remove(id);
            if self.hidden.remove(id) {
                self.hidden.insert(moved.clone());
            }
            self.index.insert(moved, index);
        }
        true
    }

    /// Re-order everything under `sort` and remember it for later inserts
    pub fn sort_by(&mut self, sort: SortState) {
        self.sort = sort;
        sort::sort_entries(&mut self.entries, sort);
        self.reindex_from(0);
    }

    /// Remember `sort` for later loads and inserts without re-ordering now
    pub fn set_sort_state(&mut self, sort: SortState) {
        self.sort = sort;
    }

    #[must_use]
    pub const fn sort_state(&self) -> SortState {
        self.sort
    }

    /// Mark `id` hidden (pending deletion); returns false if unknown or already hidden
    pub fn hide(&mut self, id: &EntryId) -> bool {
        self.contains(id) && self.hidden.insert(id.clone())
    }

    /// Clear the hidden mark of `id`
    pub fn unhide(&mut self, id: &EntryId) -> bool {
        self.hidden.remove(id)
    }

    #[must_use]
    pub fn is_hidden(&self, id: &EntryId) -> bool {
        self.hidden.contains(id)
    }

    /// Entries not hidden, in order
    pub fn shown(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| !self.hidden.contains(&e.id))
    }

    /// Whether an entry other than `except` is shown under `name`
    #[must_use]
    pub fn name_taken(&self, name: &str, except: Option<&EntryId>) -> bool {
        self.shown()
            .any(|e| e.name == name && Some(&e.id) != except)
    }

    /// Drop every entry and hidden mark, keeping the sort state
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.hidden.clear();
    }

    /// Refresh the positions of every entry from `start` on
    fn reindex_from(&mut self, start: usize) {
        if start == 0 {
            self.index.clear();
        }
        for (offset, entry) in self.entries[start..].iter().enumerate() {
            self.index.insert(entry.id.clone(), start + offset);
        }
    }
}

impl Deref for EntryListModel {
    type Target = [Entry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}
