//! Incremental reveal of the visible sequence
//!
//! The controller only tracks how many leading entries of the visible (sorted,
//! filtered, unhidden) sequence have been handed to the renderer. It never owns the
//! sequence itself, so the same cursor works over ids, entries or row handles.

use std::collections::HashSet;
use std::hash::Hash;
use std::ops::Range;

/// Number of rows that fit in a viewport of `viewport_height` with rows of
/// `row_height`, never below `min_page_size` (or 1)
#[must_use]
pub fn page_size_from_viewport(viewport_height: u32, row_height: u32, min_page_size: usize) -> usize {
    let floor = min_page_size.max(1);
    if row_height == 0 {
        return floor;
    }
    let rows = viewport_height.div_ceil(row_height) as usize;
    rows.max(floor)
}

/// Page cursor over a visible sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationController {
    revealed: usize,
    page_size: usize,
}

impl Default for PaginationController {
    fn default() -> Self {
        Self::new(20)
    }
}

impl PaginationController {
    /// Create a cursor revealing `page_size` entries per step (at least one)
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            revealed: 0,
            page_size: page_size.max(1),
        }
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    /// How many leading entries are revealed
    #[must_use]
    pub const fn revealed_count(&self) -> usize {
        self.revealed
    }

    /// Whether entries remain beyond the revealed prefix of a sequence of length `len`
    #[must_use]
    pub const fn has_more(&self, len: usize) -> bool {
        self.revealed < len
    }

    /// Advance by one page over a sequence of length `len`; returns the newly revealed
    /// positions (empty once exhausted)
    pub fn reveal_range(&mut self, len: usize) -> Range<usize> {
        let start = self.revealed.min(len);
        let end = (start + self.page_size).min(len);
        self.revealed = end;
        start..end
    }

    /// Advance by one page and return the newly revealed slice of `visible`
    pub fn reveal<'a, T>(&mut self, visible: &'a [T]) -> &'a [T] {
        let range = self.reveal_range(visible.len());
        &visible[range]
    }

    /// Forget everything revealed
    pub fn reset(&mut self) {
        self.revealed = 0;
    }

    /// Reset and immediately reveal the first page
    pub fn restart(&mut self, len: usize) -> Range<usize> {
        self.reset();
        self.reveal_range(len)
    }

    /// Re-anchor the cursor after the visible sequence changed in place
    ///
    /// `previously_revealed` is the revealed prefix before the change. The cursor is
    /// moved to just past the last of those items still present in `visible`, so
    /// entries inserted above it become revealed and removed entries shrink it. When
    /// that leaves less than a page revealed the cursor tops up to a full page.
    /// Returns the revealed range after reconciliation.
    pub fn reconcile<T: Eq + Hash>(&mut self, previously_revealed: &[T], visible: &[T]) -> Range<usize> {
        let known: HashSet<&T> = previously_revealed.iter().collect();
        self.revealed = visible
            .iter()
            .rposition(|item| known.contains(item))
            .map_or(0, |pos| pos + 1);

        if self.revealed < self.page_size {
            self.revealed = self.page_size.min(visible.len());
        }
        0..self.revealed
    }
}
