//! Change notifications for rendering collaborators
//!
//! Hosts subscribe an observer and redraw from the events they receive; nothing in
//! this crate reaches into presentation state. Observers are called synchronously,
//! in subscription order, after the state change they describe has been applied.

use crate::backend::RequestId;
use crate::coordinator::{FatalSessionError, MergeToken, MutationError, RenameState};
use crate::entry::EntryId;
use crate::filter::ListState;
use crate::summary::Summary;
use std::ops::Range;
use std::time::Duration;

/// Kind of mutation a settled event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Rename,
    Move,
    Copy,
    Delete,
    Undelete,
    TagApply,
}

/// How a mutation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Committed,
    RolledBack(MutationError),
}

/// Transient message for the notification area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    /// How long the host should keep it on screen
    pub dismiss_after: Duration,
}

/// Something observers may want to redraw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A listing for `dir` was requested
    DirectoryChanged { dir: String },

    /// A listing replaced the model
    ListingLoaded { dir: String, count: usize },

    /// Positions `range` of the visible sequence are now revealed
    PageRevealed { range: Range<usize> },

    /// Visible subset classification changed
    ListStateChanged(ListState),

    /// Totals over the visible subset changed
    TotalsChanged(Summary),

    /// Selection membership changed
    SelectionChanged { count: usize, summary: Summary },

    /// A row entered or left its busy state
    EntryBusy { id: EntryId, busy: bool },

    /// Inline rename editor state of an entry changed
    RenameStateChanged { id: EntryId, state: RenameState },

    /// Entries were hidden for deletion and can be restored
    UndoAvailable { count: usize },

    /// The undo affordance is gone (undone, flushed, failed or left behind)
    UndoCleared,

    /// A tag merge needs explicit confirmation
    MergeRequested { token: MergeToken, tag: String },

    /// A dispatched mutation finished
    MutationSettled {
        id: RequestId,
        kind: MutationKind,
        targets: Vec<EntryId>,
        settlement: Settlement,
    },

    Notification(Notification),

    /// The session is unusable; the host must redirect
    Fatal(FatalSessionError),
}

/// Receiver of session events
pub trait SessionObserver {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F: FnMut(&SessionEvent)> SessionObserver for F {
    fn on_event(&mut self, event: &SessionEvent) {
        self(event);
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of observers
#[derive(Default)]
pub struct EventBus {
    observers: Vec<(SubscriptionId, Box<dyn SessionObserver>)>,
    next_id: u64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer; returns false when `id` is not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn publish(&mut self, event: &SessionEvent) {
        for (_, observer) in &mut self.observers {
            observer.on_event(event);
        }
    }

    pub fn publish_all(&mut self, events: impl IntoIterator<Item = SessionEvent>) {
        for event in events {
            self.publish(&event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_publish_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let first = Rc::clone(&log);
        bus.subscribe(move |_: &SessionEvent| first.borrow_mut().push("first"));
        let second = Rc::clone(&log);
        bus.subscribe(move |_: &SessionEvent| second.borrow_mut().push("second"));

        bus.publish(&SessionEvent::UndoCleared);
        assert_eq!(*log.borrow(), ["first", "second"]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let counter = Rc::clone(&count);
        let id = bus.subscribe(move |_: &SessionEvent| *counter.borrow_mut() += 1);

        bus.publish(&SessionEvent::UndoAvailable { count: 2 });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&SessionEvent::UndoAvailable { count: 2 });

        assert_eq!(*count.borrow(), 1);
        assert!(bus.is_empty());
    }
}
