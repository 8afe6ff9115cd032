//! Visible-list state of one directory view
//!
//! `ListView` bundles the model with everything derived from it: the filtered and
//! unhidden visible sequence, totals over that sequence, the selection and the page
//! cursor. Mutations go through the entry methods here, which keep the visible totals
//! up to date one entry at a time, and then call [`ListView::refresh`] (content
//! changed in place) or [`ListView::reset`] (ordering or filter changed; totals are
//! recomputed) so derived state never drifts.

use crate::backend::FolderInfo;
use crate::entry::{Entry, EntryId, MountKind, Permissions};
use crate::events::SessionEvent;
use crate::filter::{ListState, Query};
use crate::model::EntryListModel;
use crate::pagination::PaginationController;
use crate::selection::SelectionTracker;
use crate::summary::{Summary, SummaryAggregator};
use std::collections::HashSet;

/// Derived and owned state of the entry list
#[derive(Debug, Clone, Default)]
pub struct ListView {
    /// Directory currently shown
    pub dir: String,
    pub dir_id: Option<EntryId>,
    /// Bumped whenever a new listing replaces the model
    pub generation: u64,
    /// What the user may do in `dir`
    pub dir_permissions: Permissions,
    pub folder: Option<FolderInfo>,
    pub popular_tags: Vec<String>,

    pub model: EntryListModel,
    pub selection: SelectionTracker,
    pub query: Query,
    pub pages: PaginationController,
    pub busy: HashSet<EntryId>,

    totals: SummaryAggregator,
    /// Totals as of the last `TotalsChanged` event
    reported_totals: Summary,
    visible: Vec<EntryId>,
    list_state: Option<ListState>,
}

impl ListView {
    #[must_use]
    pub fn new(dir: impl Into<String>, model: EntryListModel, page_size: usize) -> Self {
        Self {
            dir: dir.into(),
            model,
            pages: PaginationController::new(page_size),
            ..Self::default()
        }
    }

    /// Ids of the visible sequence, in order
    #[must_use]
    pub fn visible_ids(&self) -> &[EntryId] {
        &self.visible
    }

    /// Entries of the visible sequence, in order
    #[must_use]
    pub fn visible_entries(&self) -> Vec<&Entry> {
        self.model
            .shown()
            .filter(|entry| self.query.matches(entry))
            .collect()
    }

    /// Visible entries alongside mutable access to the selection
    pub fn visible_and_selection(&mut self) -> (Vec<&Entry>, &mut SelectionTracker) {
        let query = &self.query;
        let entries = self.model.shown().filter(|entry| query.matches(entry)).collect();
        (entries, &mut self.selection)
    }

    /// Entries revealed so far
    #[must_use]
    pub fn revealed_entries(&self) -> Vec<&Entry> {
        let mut entries = self.visible_entries();
        entries.truncate(self.pages.revealed_count());
        entries
    }

    /// Totals over the visible sequence
    #[must_use]
    pub const fn totals(&self) -> Summary {
        self.totals.summary()
    }

    /// Hide `id` pending deletion; returns false if unknown or already hidden
    pub fn hide_entry(&mut self, id: &EntryId) -> bool {
        if let Some(entry) = self
            .model
            .find_by_id(id)
            .filter(|e| counted(&self.model, &self.query, e))
        {
            self.totals.remove(entry);
        }
        self.model.hide(id)
    }

    /// Show `id` again after a failed or undone delete
    pub fn unhide_entry(&mut self, id: &EntryId) -> bool {
        if !self.model.unhide(id) {
            return false;
        }
        if let Some(entry) = self.model.find_by_id(id).filter(|e| self.query.matches(e)) {
            self.totals.add(entry);
        }
        true
    }

    /// Apply `edit` to the entry with `id` in place
    ///
    /// Sort-relevant fields must go through [`Self::replace_entry`] instead.
    pub fn edit_entry(&mut self, id: &EntryId, edit: impl FnOnce(&mut Entry)) -> bool {
        let Some(index) = self.model.index_of(id) else {
            return false;
        };
        self.uncount_at(index);
        self.model.update(id, edit);
        self.count_at(index);
        true
    }

    /// Swap the entry `id` for `entry` at its sorted position
    ///
    /// A hidden mark on `id` carries over to the replacement. Returns `None` and
    /// changes nothing when `id` is not in the model.
    pub fn replace_entry(&mut self, id: &EntryId, entry: Entry) -> Option<usize> {
        let index = self.model.index_of(id)?;
        let hidden = self.model.is_hidden(id);
        self.uncount_at(index);
        self.model.remove_by_id(id);
        let new_id = entry.id.clone();
        let index = self.model.insert_sorted(entry);
        if hidden {
            self.model.hide(&new_id);
        }
        self.count_at(index);
        Some(index)
    }

    fn uncount_at(&mut self, index: usize) {
        if let Some(entry) = self
            .model
            .get(index)
            .filter(|e| counted(&self.model, &self.query, e))
        {
            self.totals.remove(entry);
        }
    }

    fn count_at(&mut self, index: usize) {
        if let Some(entry) = self
            .model
            .get(index)
            .filter(|e| counted(&self.model, &self.query, e))
        {
            self.totals.add(entry);
        }
    }

    /// Classification of the visible subset
    #[must_use]
    pub fn list_state(&self) -> ListState {
        ListState::classify(self.model.shown().count(), self.visible.len())
    }

    /// Whether the listing is the root of a share
    #[must_use]
    pub fn is_shared_root(&self) -> bool {
        self.folder
            .as_ref()
            .is_some_and(|folder| folder.mount == MountKind::SharedRoot)
    }

    fn compute_visible(&self) -> Vec<EntryId> {
        self.visible_entries()
            .into_iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Rebuild derived state after ordering, filter or listing changed
    ///
    /// The page cursor restarts and the first page is revealed at once.
    pub fn reset(&mut self) -> Vec<SessionEvent> {
        let query = &self.query;
        self.totals
            .recompute(self.model.shown().filter(|e| query.matches(e)));
        self.visible = self.compute_visible();
        let range = self.pages.restart(self.visible.len());
        self.derived_events(range)
    }

    /// Rebuild derived state after entries were inserted, removed, hidden or edited
    ///
    /// Revealed rows stay revealed and new rows above the cursor join them.
    pub fn refresh(&mut self) -> Vec<SessionEvent> {
        let previous_revealed = &self.visible[..self.pages.revealed_count().min(self.visible.len())];
        let visible = self.compute_visible();
        let range = self.pages.reconcile(previous_revealed, &visible);
        self.visible = visible;
        self.derived_events(range)
    }

    /// Reveal one more page
    pub fn show_more(&mut self) -> Vec<SessionEvent> {
        let range = self.pages.reveal_range(self.visible.len());
        if range.is_empty() {
            return Vec::new();
        }
        vec![SessionEvent::PageRevealed { range }]
    }

    fn derived_events(&mut self, range: std::ops::Range<usize>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let totals = self.totals.summary();
        if totals != self.reported_totals {
            self.reported_totals = totals;
            events.push(SessionEvent::TotalsChanged(totals));
        }
        let state = self.list_state();
        if self.list_state != Some(state) {
            self.list_state = Some(state);
            events.push(SessionEvent::ListStateChanged(state));
        }
        events.push(SessionEvent::PageRevealed { range });
        events
    }

    /// Event describing the current selection
    #[must_use]
    pub fn selection_event(&self) -> SessionEvent {
        SessionEvent::SelectionChanged {
            count: self.selection.len(),
            summary: self.selection.summary(),
        }
    }

    /// Mark `id` busy or idle; returns the event when the state changed
    pub fn set_busy(&mut self, id: &EntryId, busy: bool) -> Option<SessionEvent> {
        let changed = if busy {
            self.busy.insert(id.clone())
        } else {
            self.busy.remove(id)
        };
        changed.then(|| SessionEvent::EntryBusy {
            id: id.clone(),
            busy,
        })
    }

    /// Remove `id` from the model and the selection
    pub fn remove_entry(&mut self, id: &EntryId) -> Option<Entry> {
        let index = self.model.index_of(id)?;
        self.uncount_at(index);
        self.selection.deselect(id);
        self.busy.remove(id);
        self.model.remove_by_id(id)
    }

    /// Swap in a new listing for `dir`
    pub fn load(&mut self, dir: String, dir_id: Option<EntryId>, files: Vec<Entry>) -> Vec<SessionEvent> {
        self.dir = dir;
        self.dir_id = dir_id;
        self.generation += 1;
        self.busy.clear();
        self.selection.clear();
        self.model.replace_all(files);
        self.reset()
    }
}

/// Whether `entry` belongs to the visible sequence
fn counted(model: &EntryListModel, query: &Query, entry: &Entry) -> bool {
    !model.is_hidden(&entry.id) && query.matches(entry)
}
