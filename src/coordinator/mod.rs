//! Optimistic mutations against the remote store
//!
//! Every mutation follows the same protocol: validate locally, apply the change to
//! the list view, dispatch a request, then commit or roll back when the host reports
//! the completion. Everything a rollback needs is captured in a [`PendingMutation`]
//! (or the undo buffer) before the request leaves, so reverting never re-derives
//! state after the fact.
//!
//! The coordinator performs no I/O. Operations return an [`Outbox`] of requests to
//! dispatch, tickets to cancel and events to publish; the session forwards them.
//!
//! - `rename`: inline rename editor (`Editing -> Submitted -> Committed | Rejected`)
//! - `transfer`: move and copy, independently per target
//! - `delete`: two-phase delete with undo
//! - `tags`: tag apply and tag rename with merge confirmation

pub mod error;

mod delete;
mod rename;
mod tags;
mod transfer;

pub use error::{FatalSessionError, MergeToken, MutationError, ValidationError};
pub use rename::RenameState;
pub use transfer::TransferKind;

use crate::backend::{Completion, Request, RequestId, TransportError, wire};
use crate::entry::{DefaultNamePolicy, Entry, EntryId, NamePolicy};
use crate::events::{MutationKind, Notification, SessionEvent, Settlement};
use crate::session::ListView;
use delete::UndoBuffer;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tags::MergePlan;
use tracing::{debug, trace};

/// Tunables of the mutation protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSettings {
    /// Shortest accepted tag, in characters
    pub tag_min_len: usize,
    /// Fail in-flight mutations older than this; `None` waits forever
    pub timeout: Option<Duration>,
    /// How long error notifications stay on screen
    pub notification_ttl: Duration,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            tag_min_len: 3,
            timeout: None,
            notification_ttl: Duration::from_secs(10),
        }
    }
}

/// Work produced by a coordinator step
#[derive(Debug, Default)]
pub struct Outbox {
    /// Requests to hand to the backend, in order
    pub requests: Vec<(RequestId, Request)>,
    /// Tickets to cancel
    pub cancels: Vec<RequestId>,
    /// Events to publish, in order
    pub events: Vec<SessionEvent>,
    /// The listing must be reloaded (local state can no longer be reconciled)
    pub reload: bool,
}

impl Outbox {
    /// Append everything from `other`
    pub fn absorb(&mut self, other: Self) {
        self.requests.extend(other.requests);
        self.cancels.extend(other.cancels);
        self.events.extend(other.events);
        self.reload |= other.reload;
    }

    /// Ticket of the first dispatched request
    #[must_use]
    pub fn first_ticket(&self) -> Option<RequestId> {
        self.requests.first().map(|(id, _)| *id)
    }

    /// All dispatched tickets
    #[must_use]
    pub fn tickets(&self) -> Vec<RequestId> {
        self.requests.iter().map(|(id, _)| *id).collect()
    }
}

/// A mutation awaiting its completion
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub kind: MutationKind,
    pub targets: Vec<EntryId>,
    pub started_at: Instant,
    /// Listing generation the mutation was applied to
    pub generation: u64,
    payload: Payload,
}

/// Data needed to commit or roll back
#[derive(Debug, Clone)]
enum Payload {
    Rename { original: Entry },
    Transfer { source: Entry, target: String },
    Delete { ids: Vec<EntryId>, all_files: bool },
    Undelete { committed: bool },
    Tags { id: EntryId, previous: Vec<String> },
}

/// Bookkeeping of in-flight and awaiting-confirmation mutations
pub struct MutationCoordinator {
    policy: Box<dyn NamePolicy>,
    settings: MutationSettings,
    pending: HashMap<RequestId, PendingMutation>,
    rename_states: HashMap<EntryId, RenameState>,
    merges: HashMap<MergeToken, MergePlan>,
    undo: Option<UndoBuffer>,
    next_ticket: u64,
    next_merge: u64,
}

impl Default for MutationCoordinator {
    fn default() -> Self {
        Self::new(MutationSettings::default())
    }
}

impl fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("settings", &self.settings)
            .field("pending", &self.pending.len())
            .field("undo", &self.undo)
            .finish_non_exhaustive()
    }
}

impl MutationCoordinator {
    #[must_use]
    pub fn new(settings: MutationSettings) -> Self {
        Self {
            policy: Box::new(DefaultNamePolicy::default()),
            settings,
            pending: HashMap::new(),
            rename_states: HashMap::new(),
            merges: HashMap::new(),
            undo: None,
            next_ticket: 1,
            next_merge: 1,
        }
    }

    /// Replace the naming policy applied to renames
    #[must_use]
    pub fn with_name_policy(mut self, policy: impl NamePolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &MutationSettings {
        &self.settings
    }

    /// Allocate a fresh request ticket
    pub fn issue_ticket(&mut self) -> RequestId {
        let id = RequestId::new(self.next_ticket);
        self.next_ticket += 1;
        id
    }

    fn issue_merge_token(&mut self) -> MergeToken {
        let token = MergeToken(self.next_merge);
        self.next_merge += 1;
        token
    }

    /// In-flight mutation with ticket `id`
    #[must_use]
    pub fn pending(&self, id: RequestId) -> Option<&PendingMutation> {
        self.pending.get(&id)
    }

    /// Number of in-flight mutations
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ids currently held in the undo buffer
    #[must_use]
    pub fn undo_buffer(&self) -> Vec<EntryId> {
        self.undo
            .as_ref()
            .map(UndoBuffer::ids)
            .unwrap_or_default()
    }

    /// Drop state bound to the previous listing
    ///
    /// In-flight requests stay tracked; their completions are recognized as stale by
    /// generation and leave the new listing alone.
    pub fn reset_for_listing(&mut self) -> Vec<SessionEvent> {
        self.rename_states.clear();
        self.merges.clear();
        match self.undo.take() {
            Some(_) => vec![SessionEvent::UndoCleared],
            None => Vec::new(),
        }
    }

    fn track(
        &mut self,
        out: &mut Outbox,
        kind: MutationKind,
        targets: Vec<EntryId>,
        generation: u64,
        request: Request,
        payload: Payload,
    ) -> RequestId {
        let id = self.issue_ticket();
        debug!(ticket = %id, op = request.operation(), targets = targets.len(), "Dispatching mutation");
        self.pending.insert(
            id,
            PendingMutation {
                kind,
                targets,
                started_at: Instant::now(),
                generation,
                payload,
            },
        );
        out.requests.push((id, request));
        id
    }

    /// Apply the completion for ticket `id`
    ///
    /// Returns `None` when the ticket is not an in-flight mutation (already settled,
    /// expired or never issued).
    pub fn settle(&mut self, id: RequestId, completion: Completion, view: &mut ListView) -> Option<Outbox> {
        let Some(pending) = self.pending.remove(&id) else {
            trace!(ticket = %id, "Ignoring completion for unknown ticket");
            return None;
        };
        let stale = pending.generation != view.generation;
        if stale {
            debug!(ticket = %id, "Completion belongs to a previous listing");
        }

        let mut out = Outbox::default();
        let PendingMutation {
            kind,
            targets,
            payload,
            ..
        } = pending;
        let result = match payload {
            Payload::Rename { original } => {
                self.settle_rename(original, completion, view, stale, &mut out)
            }
            Payload::Transfer { source, target } => {
                self.settle_transfer(kind, source, &target, completion, view, stale, &mut out)
            }
            Payload::Delete { ids, all_files } => {
                self.settle_delete(id, &ids, all_files, completion, view, stale, &mut out)
            }
            Payload::Undelete { committed } => {
                self.settle_undelete(committed, completion, stale, &mut out)
            }
            Payload::Tags { id: entry, previous } => {
                self.settle_tags(&entry, previous, completion, view, stale, &mut out)
            }
        };

        let settlement = match result {
            Ok(()) => {
                debug!(ticket = %id, ?kind, "Mutation committed");
                Settlement::Committed
            }
            Err(e) => {
                debug!(ticket = %id, ?kind, error = %e, "Mutation rolled back");
                Settlement::RolledBack(e)
            }
        };
        out.events.push(SessionEvent::MutationSettled {
            id,
            kind,
            targets,
            settlement,
        });
        Some(out)
    }

    /// Fail every mutation in flight for longer than the configured timeout
    pub fn expire_stale(&mut self, now: Instant, view: &mut ListView) -> Outbox {
        let mut out = Outbox::default();
        let Some(timeout) = self.settings.timeout else {
            return out;
        };

        let mut expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.started_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();

        for id in expired {
            debug!(ticket = %id, "Mutation timed out");
            out.cancels.push(id);
            let error = TransportError::TimedOut {
                secs: timeout.as_secs(),
            };
            if let Some(settled) = self.settle(id, Err(error), view) {
                out.absorb(settled);
            }
        }
        out
    }

    fn notify(&self, out: &mut Outbox, message: String) {
        out.events.push(SessionEvent::Notification(Notification {
            message,
            dismiss_after: self.settings.notification_ttl,
        }));
    }
}

/// Decode a completion into the success payload `T`
fn outcome<T: DeserializeOwned>(completion: Completion) -> Result<T, MutationError> {
    let reply = completion?;
    Ok(wire::decode(&reply)?)
}

/// `dir` joined with `name`
fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Split a path into parent directory and final component
fn split_path(path: &str) -> (&str, &str) {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => ("/", trimmed),
    }
}
