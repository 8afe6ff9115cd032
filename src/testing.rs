//! Testing utilities for dirview
//!
//! Entry constructors with short names, a ready-loaded list view and an event log
//! that can be subscribed to a session.
//!
//! Only available when compiled with `cfg(test)`.

use crate::coordinator::MutationCoordinator;
use crate::entry::{Entry, EntryId};
use crate::events::SessionEvent;
use crate::model::EntryListModel;
use crate::session::ListView;
use std::cell::RefCell;
use std::rc::Rc;

/// File entry with the given size
pub fn file(id: impl Into<EntryId>, name: impl Into<String>, size: u64) -> Entry {
    Entry::file(id, name, size)
}

/// Directory entry of size zero
pub fn dir(id: impl Into<EntryId>, name: impl Into<String>) -> Entry {
    Entry::dir(id, name)
}

/// Names of `entries`, in order
pub fn names(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

/// The listing used by most coordinator tests:
///
/// | id | name     | size | tags   |
/// |----|----------|------|--------|
/// | 1  | `photos` | dir  |        |
/// | 2  | `a.txt`  | 10   |        |
/// | 3  | `b.txt`  | 20   | `work` |
/// | 4  | `c.txt`  | 30   |        |
pub fn sample_entries() -> Vec<Entry> {
    vec![
        dir("1", "photos"),
        file("2", "a.txt", 10),
        file("3", "b.txt", 20).with_tags(["work"]),
        file("4", "c.txt", 30),
    ]
}

/// A coordinator and a view with [`sample_entries`] loaded for `/docs`
pub fn loaded() -> (MutationCoordinator, ListView) {
    let mut view = ListView::new("/", EntryListModel::new(), 20);
    view.load("/docs".to_string(), None, sample_entries());
    (MutationCoordinator::default(), view)
}

/// Shared log of published events
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<SessionEvent>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer closure appending to this log
    pub fn observer(&self) -> impl FnMut(&SessionEvent) + 'static {
        let log = Rc::clone(&self.0);
        move |event: &SessionEvent| log.borrow_mut().push(event.clone())
    }

    /// Events recorded so far
    pub fn events(&self) -> Vec<SessionEvent> {
        self.0.borrow().clone()
    }

    /// Whether any recorded event satisfies `predicate`
    pub fn any(&self, predicate: impl Fn(&SessionEvent) -> bool) -> bool {
        self.0.borrow().iter().any(predicate)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}
