//! Multi-selection over the visible entries
//!
//! The tracker records membership only: it never mutates the entry list. Every
//! membership change goes through a [`SummaryAggregator`] so the "selected" totals
//! always agree with the set of selected ids. Each selected id keeps the entry value
//! captured when it was selected; [`SelectionTracker::snapshot`] prefers the live
//! value from the model when both exist.

use crate::entry::{Entry, EntryId, Permissions};
use crate::model::EntryListModel;
use crate::summary::{Summary, SummaryAggregator};
use indexmap::IndexMap;

/// Modifier keys accompanying a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Ctrl (or Cmd/Meta) held: toggle without clearing
    pub ctrl: bool,
    /// Shift held: extend from the anchor
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Self = Self {
        ctrl: true,
        shift: false,
    };
    pub const SHIFT: Self = Self {
        ctrl: false,
        shift: true,
    };
}

/// Selected entries with running totals
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    selected: IndexMap<EntryId, Entry>,
    aggregator: SummaryAggregator,
    anchor: Option<EntryId>,
}

impl SelectionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select (`on = true`) or deselect `entry`
    ///
    /// Setting the state an entry already has leaves the summary unchanged; selecting
    /// an already selected entry refreshes its captured value. Returns whether
    /// membership changed.
    pub fn toggle(&mut self, entry: &Entry, on: bool) -> bool {
        if on {
            match self.selected.insert(entry.id.clone(), entry.clone()) {
                Some(previous) => {
                    self.aggregator.remove(&previous);
                    self.aggregator.add(entry);
                    false
                }
                None => {
                    self.aggregator.add(entry);
                    true
                }
            }
        } else {
            self.deselect(&entry.id)
        }
    }

    /// Deselect by id; returns whether the id was selected
    pub fn deselect(&mut self, id: &EntryId) -> bool {
        match self.selected.shift_remove(id) {
            Some(captured) => {
                self.aggregator.remove(&captured);
                if self.anchor.as_ref() == Some(id) {
                    self.anchor = None;
                }
                true
            }
            None => false,
        }
    }

    /// Select every entry of `visible` between positions `from` and `to` inclusive
    ///
    /// The bounds are normalized so either order works; positions past the end are
    /// clamped. Returns how many entries became newly selected.
    pub fn select_range(&mut self, visible: &[&Entry], from: usize, to: usize) -> usize {
        let Some(last) = visible.len().checked_sub(1) else {
            return 0;
        };
        let lo = from.min(to).min(last);
        let hi = from.max(to).min(last);
        visible[lo..=hi]
            .iter()
            .filter(|entry| self.toggle(entry, true))
            .count()
    }

    /// Replace the selection with all of `entries`
    pub fn select_all<'a>(&mut self, entries: impl IntoIterator<Item = &'a Entry>) {
        self.clear();
        for entry in entries {
            self.toggle(entry, true);
        }
    }

    /// Drop every selected id and the anchor
    pub fn clear(&mut self) {
        self.selected.clear();
        self.aggregator.clear();
        self.anchor = None;
    }

    /// Apply a click on `visible[index]`
    ///
    /// - no modifier: the clicked entry becomes the only selection (or nothing, if it
    ///   was the only selected entry) and the new anchor
    /// - ctrl: toggle the clicked entry and make it the anchor
    /// - shift: select everything strictly between the anchor and the clicked entry,
    ///   then toggle the clicked entry; the anchor stays
    pub fn click(&mut self, visible: &[&Entry], index: usize, modifiers: Modifiers) {
        let Some(&target) = visible.get(index) else {
            return;
        };
        let was_selected = self.is_selected(&target.id);

        if modifiers.shift {
            let anchor_pos = self
                .anchor
                .as_ref()
                .and_then(|anchor| visible.iter().position(|e| &e.id == anchor));
            if let Some(anchor_pos) = anchor_pos {
                let (lo, hi) = (anchor_pos.min(index), anchor_pos.max(index));
                for entry in &visible[lo + 1..hi] {
                    self.toggle(entry, true);
                }
            }
            self.toggle(target, !was_selected);
            if self.anchor.is_none() {
                self.anchor = Some(target.id.clone());
            }
        } else if modifiers.ctrl {
            self.toggle(target, !was_selected);
            self.anchor = Some(target.id.clone());
        } else {
            let only_this = was_selected && self.selected.len() == 1;
            self.clear();
            if !only_this {
                self.toggle(target, true);
            }
            self.anchor = Some(target.id.clone());
        }
    }

    #[must_use]
    pub fn is_selected(&self, id: &EntryId) -> bool {
        self.selected.contains_key(id)
    }

    /// Selected ids in selection order
    pub fn ids(&self) -> impl Iterator<Item = &EntryId> {
        self.selected.keys()
    }

    /// Selected entries, with live values from `model` where available
    #[must_use]
    pub fn snapshot(&self, model: &EntryListModel) -> Vec<Entry> {
        self.selected
            .iter()
            .map(|(id, captured)| model.find_by_id(id).unwrap_or(captured).clone())
            .collect()
    }

    /// Captured value for `id`
    #[must_use]
    pub fn captured(&self, id: &EntryId) -> Option<&Entry> {
        self.selected.get(id)
    }

    /// Deselect every id for which `keep` returns false; returns how many were dropped
    pub fn retain(&mut self, mut keep: impl FnMut(&EntryId) -> bool) -> usize {
        let stale: Vec<EntryId> = self
            .selected
            .keys()
            .filter(|id| !keep(id))
            .cloned()
            .collect();
        for id in &stale {
            self.deselect(id);
        }
        stale.len()
    }

    /// Deselect ids no longer present in `model`
    pub fn prune(&mut self, model: &EntryListModel) -> usize {
        self.retain(|id| model.contains(id))
    }

    /// Re-point a selected id at an updated entry (e.g. after a rename changed its id)
    pub fn replace(&mut self, old_id: &EntryId, entry: &Entry) {
        if self.deselect(old_id) {
            self.toggle(entry, true);
        }
    }

    /// Totals over the selected entries
    #[must_use]
    pub const fn summary(&self) -> Summary {
        self.aggregator.summary()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Whether every one of `total` entries is selected
    #[must_use]
    pub fn is_all_selected(&self, total: usize) -> bool {
        total > 0 && self.selected.len() == total
    }

    /// Whether the selection may be deleted given the directory's permissions
    #[must_use]
    pub fn can_delete(&self, model: &EntryListModel, dir_permissions: Permissions) -> bool {
        !self.is_empty()
            && dir_permissions.contains(Permissions::DELETE)
            && self
                .snapshot(model)
                .iter()
                .all(|e| e.permissions.contains(Permissions::DELETE))
    }

    #[must_use]
    pub const fn anchor(&self) -> Option<&EntryId> {
        self.anchor.as_ref()
    }
}
