//! Directory browsing session
//!
//! [`DirectorySession`] is the single entry point a host drives. It owns the list
//! view of the current directory, the mutation coordinator and the observer bus, and
//! forwards every request to the host's [`Backend`]. The host reports outcomes with
//! [`DirectorySession::complete`]; the session decides whether the ticket is the
//! current listing, a superseded listing or a mutation, and applies it.
//!
//! Everything runs on the caller's thread: operations apply their optimistic changes
//! and publish events before returning.

pub mod view;

pub use view::ListView;

use crate::backend::{
    Backend, Completion, ListRequest, Listing, Rejection, ReplyError, Request, RequestId,
    TransportError, wire,
};
use crate::config::DirviewConfig;
use crate::coordinator::{
    FatalSessionError, MergeToken, MutationCoordinator, Outbox, RenameState, TransferKind,
    ValidationError,
};
use crate::entry::{Entry, EntryId, NamePolicy, Permissions, unique_name};
use crate::events::{EventBus, Notification, SessionEvent, SessionObserver, SubscriptionId};
use crate::filter::{ListState, Query, tag_union};
use crate::model::EntryListModel;
use crate::pagination::page_size_from_viewport;
use crate::selection::Modifiers;
use crate::sort::{SortDirection, SortKey, SortMode, SortState};
use crate::summary::Summary;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

const ROOT: &str = "/";

/// Outcome of submitting a rename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameSubmission {
    /// The name did not change; the editor closed without a request
    Unchanged,
    /// A rename request was dispatched under this ticket
    Submitted(RequestId),
}

/// The listing request currently awaited
#[derive(Debug, Clone)]
struct PendingListing {
    ticket: RequestId,
    dir: String,
    dir_id: Option<EntryId>,
    /// Where to go back to if this listing fails
    revert_to: Option<(String, Option<EntryId>)>,
}

/// Browsing state of one directory view, bound to a backend
pub struct DirectorySession<B: Backend> {
    backend: B,
    config: DirviewConfig,
    view: ListView,
    coordinator: MutationCoordinator,
    bus: EventBus,
    listing: Option<PendingListing>,
    view_scope: Option<String>,
}

impl<B: Backend> DirectorySession<B> {
    /// Create a session showing nothing yet; call [`Self::change_directory`] to load
    #[must_use]
    pub fn new(backend: B, config: DirviewConfig) -> Self {
        let model = EntryListModel::with_sort(config.sort.state());
        Self {
            backend,
            view: ListView::new(ROOT, model, config.paging.page_size),
            coordinator: MutationCoordinator::new(config.mutation_settings()),
            bus: EventBus::new(),
            listing: None,
            view_scope: None,
            config,
        }
    }

    /// Replace the naming policy applied to renames
    #[must_use]
    pub fn with_name_policy(mut self, policy: impl NamePolicy + 'static) -> Self {
        self.coordinator = self.coordinator.with_name_policy(policy);
        self
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) -> SubscriptionId {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub const fn config(&self) -> &DirviewConfig {
        &self.config
    }

    /// Read access to the whole list view
    #[must_use]
    pub const fn view(&self) -> &ListView {
        &self.view
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Navigate to `dir`
    ///
    /// The filter is cleared. If the listing fails, the session goes back to the
    /// directory shown before.
    pub fn change_directory(&mut self, dir: impl Into<String>, dir_id: Option<EntryId>) -> RequestId {
        let dir = dir.into();
        info!(%dir, "Changing directory");
        if !self.view.query.is_all() {
            self.view.query = Query::All;
            let events = self.view.reset();
            self.bus.publish_all(events);
        }
        let previous = (self.view.dir.clone(), self.view.dir_id.clone());
        let revert_to = (previous.0 != dir).then_some(previous);
        self.request_listing(dir, dir_id, revert_to)
    }

    /// Fetch the current directory again
    pub fn reload(&mut self) -> RequestId {
        let dir = self.view.dir.clone();
        let dir_id = self.view.dir_id.clone();
        self.request_listing(dir, dir_id, None)
    }

    /// Whether a listing request is in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.listing.is_some()
    }

    fn request_listing(
        &mut self,
        dir: String,
        dir_id: Option<EntryId>,
        revert_to: Option<(String, Option<EntryId>)>,
    ) -> RequestId {
        if let Some(superseded) = self.listing.take() {
            debug!(ticket = %superseded.ticket, dir = %superseded.dir, "Superseding listing request");
            self.backend.cancel(superseded.ticket);
        }

        if !self.view.selection.is_empty() {
            self.view.selection.clear();
            let event = self.view.selection_event();
            self.bus.publish(&event);
        }

        let ticket = self.coordinator.issue_ticket();
        let sort = self.view.model.sort_state();
        let request = Request::ListDirectory(ListRequest {
            dir: dir.clone(),
            dir_id: dir_id.clone(),
            sort: sort.key,
            direction: sort.direction,
            view_scope: self.view_scope.clone(),
        });
        debug!(%ticket, %dir, "Requesting listing");

        self.listing = Some(PendingListing {
            ticket,
            dir: dir.clone(),
            dir_id,
            revert_to,
        });
        self.bus.publish(&SessionEvent::DirectoryChanged { dir });
        self.backend.send(ticket, request);
        ticket
    }

    /// Feed the outcome of ticket `id` back into the session
    ///
    /// Completions for superseded listings and for mutations that were already
    /// settled are ignored.
    ///
    /// # Errors
    ///
    /// Returns `FatalSessionError` when the listing was refused for a reason the
    /// session cannot recover from (expired authentication, disabled application).
    /// A `Fatal` event is published first; the host must redirect.
    pub fn complete(&mut self, id: RequestId, completion: Completion) -> Result<(), FatalSessionError> {
        if let Some(listing) = self.listing.take_if(|listing| listing.ticket == id) {
            return self.finish_listing(listing, completion);
        }

        match self.coordinator.settle(id, completion, &mut self.view) {
            Some(out) => self.dispatch(out),
            None => trace!(ticket = %id, "Ignoring completion for superseded or unknown ticket"),
        }
        Ok(())
    }

    fn finish_listing(&mut self, listing: PendingListing, completion: Completion) -> Result<(), FatalSessionError> {
        let reply = match completion {
            Ok(reply) => reply,
            Err(TransportError::Aborted) => {
                trace!(ticket = %listing.ticket, "Listing aborted");
                return Ok(());
            }
            Err(e) => {
                warn!(dir = %listing.dir, error = %e, "Listing failed");
                self.notify(e.to_string());
                self.revert(listing);
                return Ok(());
            }
        };

        match wire::decode::<Listing>(&reply) {
            Ok(decoded) => {
                self.apply_listing(listing, decoded);
                Ok(())
            }
            Err(ReplyError::Rejected(rejection)) => self.listing_rejected(listing, &rejection),
            Err(ReplyError::Transport(TransportError::Status(404))) => {
                self.listing_not_found(listing);
                Ok(())
            }
            Err(ReplyError::Transport(e)) => {
                warn!(dir = %listing.dir, error = %e, "Listing reply unusable");
                self.notify(e.to_string());
                self.revert(listing);
                Ok(())
            }
        }
    }

    fn listing_rejected(&mut self, listing: PendingListing, rejection: &Rejection) -> Result<(), FatalSessionError> {
        if let Some(fatal) = rejection.code.as_deref().and_then(FatalSessionError::from_code) {
            warn!(error = %fatal, "Session can no longer be used");
            self.bus.publish(&SessionEvent::Fatal(fatal.clone()));
            return Err(fatal);
        }
        if rejection.is_not_found() {
            self.listing_not_found(listing);
            return Ok(());
        }
        warn!(dir = %listing.dir, error = %rejection, "Listing refused");
        self.notify(rejection.message_or("Error loading directory").to_string());
        self.revert(listing);
        Ok(())
    }

    fn listing_not_found(&mut self, listing: PendingListing) {
        if listing.dir == ROOT {
            self.notify("Directory not found".to_string());
            return;
        }
        debug!(dir = %listing.dir, "Directory not found, falling back to root");
        self.change_directory(ROOT, None);
    }

    fn revert(&mut self, listing: PendingListing) {
        if let Some((dir, dir_id)) = listing.revert_to {
            debug!(from = %listing.dir, to = %dir, "Returning to previous directory");
            self.request_listing(dir, dir_id, None);
        }
    }

    fn apply_listing(&mut self, listing: PendingListing, decoded: Listing) {
        let Listing {
            files,
            current_folder,
            popular_tags,
            permissions,
        } = decoded;
        let count = files.len();
        let dir_id = listing
            .dir_id
            .or_else(|| current_folder.as_ref().and_then(|folder| folder.id.clone()));

        let mut events = self.coordinator.reset_for_listing();
        self.view.dir_permissions = permissions;
        self.view.folder = current_folder;
        self.view.popular_tags = popular_tags;
        let view_events = self.view.load(listing.dir.clone(), dir_id, files);
        info!(dir = %listing.dir, count, "Listing loaded");

        events.push(SessionEvent::ListingLoaded {
            dir: listing.dir,
            count,
        });
        events.extend(view_events);
        events.push(self.view.selection_event());
        self.bus.publish_all(events);
    }

    // ------------------------------------------------------------------
    // Ordering, filtering and paging
    // ------------------------------------------------------------------

    /// Order the listing by `key` in `direction`
    ///
    /// In client mode the loaded entries are re-ordered in place, the selection is
    /// kept and the page cursor restarts. In server mode a fresh listing is requested
    /// and its ticket returned.
    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) -> Option<RequestId> {
        let state = SortState::new(key, direction);
        match self.config.sort.mode {
            SortMode::Client => {
                debug!(%key, %direction, "Sorting locally");
                self.view.model.sort_by(state);
                let events = self.view.reset();
                self.bus.publish_all(events);
                None
            }
            SortMode::Server => {
                debug!(%key, %direction, "Sorting on the server");
                self.view.model.set_sort_state(state);
                Some(self.reload())
            }
        }
    }

    /// Sort by `key`, flipping the direction if the listing is already sorted by it
    pub fn sort_by_column(&mut self, key: SortKey) -> Option<RequestId> {
        let current = self.view.model.sort_state();
        let direction = if current.key == key {
            current.direction.flipped()
        } else {
            SortDirection::Asc
        };
        self.set_sort(key, direction)
    }

    #[must_use]
    pub const fn sort_state(&self) -> SortState {
        self.view.model.sort_state()
    }

    /// Apply the raw filter text
    ///
    /// The selection is cleared and the page cursor restarts.
    pub fn set_filter(&mut self, raw: &str) {
        let query = Query::parse(raw, self.config.filter.tag_marker, self.config.filter.min_query_len);
        if query == self.view.query {
            return;
        }
        trace!(?query, "Filter changed");
        self.view.query = query;
        let mut events = Vec::new();
        if !self.view.selection.is_empty() {
            self.view.selection.clear();
            events.push(self.view.selection_event());
        }
        events.extend(self.view.reset());
        self.bus.publish_all(events);
    }

    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.view.query
    }

    /// Reveal one more page of the visible sequence
    pub fn show_more(&mut self) {
        let events = self.view.show_more();
        self.bus.publish_all(events);
    }

    /// Size pages so that one page fills a viewport of `height`
    ///
    /// If fewer entries than the new page size are revealed, more are revealed at once.
    pub fn set_viewport(&mut self, height: u32) {
        let page_size = page_size_from_viewport(
            height,
            self.config.paging.row_height,
            self.config.paging.min_page_size,
        );
        if page_size == self.view.pages.page_size() {
            return;
        }
        debug!(height, page_size, "Viewport resized");
        self.view.pages.set_page_size(page_size);
        let events = self.view.refresh();
        self.bus.publish_all(events);
    }

    /// Deployment specific scope sent with every listing (e.g. "favorites")
    pub fn set_view_scope(&mut self, scope: Option<String>) {
        self.view_scope = scope;
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.view.pages.has_more(self.view.visible_ids().len())
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// Directory currently shown
    #[must_use]
    pub fn dir(&self) -> &str {
        &self.view.dir
    }

    /// Every loaded entry in model order, hidden ones included
    #[must_use]
    pub const fn entries(&self) -> &EntryListModel {
        &self.view.model
    }

    /// The sorted, filtered, unhidden sequence
    #[must_use]
    pub fn visible(&self) -> Vec<&Entry> {
        self.view.visible_entries()
    }

    /// Leading entries of the visible sequence revealed so far
    #[must_use]
    pub fn revealed(&self) -> Vec<&Entry> {
        self.view.revealed_entries()
    }

    /// Totals over the visible sequence
    #[must_use]
    pub const fn totals(&self) -> Summary {
        self.view.totals()
    }

    #[must_use]
    pub fn list_state(&self) -> ListState {
        self.view.list_state()
    }

    /// What the user may do in the current directory
    #[must_use]
    pub const fn dir_permissions(&self) -> Permissions {
        self.view.dir_permissions
    }

    /// Tags carried by any loaded entry, sorted
    #[must_use]
    pub fn folder_tags(&self) -> Vec<String> {
        tag_union(self.view.model.iter()).into_iter().collect()
    }

    /// Tags the server reported as frequently used
    #[must_use]
    pub fn popular_tags(&self) -> &[String] {
        &self.view.popular_tags
    }

    /// `name`, or the first `name (n)` variant not used by a loaded entry
    #[must_use]
    pub fn unique_name(&self, name: &str) -> String {
        unique_name(name, |candidate| self.view.model.find_by_name(candidate).is_some())
    }

    #[must_use]
    pub fn is_busy(&self, id: &EntryId) -> bool {
        self.view.busy.contains(id)
    }

    #[must_use]
    pub fn rename_state(&self, id: &EntryId) -> Option<&RenameState> {
        self.coordinator.rename_state(id)
    }

    /// Ids of the last delete that can still be undone
    #[must_use]
    pub fn undo_buffer(&self) -> Vec<EntryId> {
        self.coordinator.undo_buffer()
    }

    /// Number of mutations awaiting a completion
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.coordinator.pending_count()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select or deselect the visible entry `id`
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntry` when `id` is not visible.
    pub fn toggle(&mut self, id: &EntryId, on: bool) -> Result<(), ValidationError> {
        let (visible, selection) = self.view.visible_and_selection();
        let entry = visible
            .into_iter()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| ValidationError::UnknownEntry(id.clone()))?;
        if selection.toggle(entry, on) {
            self.publish_selection();
        }
        Ok(())
    }

    /// Apply a click on the visible entry `id`
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntry` when `id` is not visible.
    pub fn click(&mut self, id: &EntryId, modifiers: Modifiers) -> Result<(), ValidationError> {
        let (visible, selection) = self.view.visible_and_selection();
        let index = visible
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| ValidationError::UnknownEntry(id.clone()))?;
        selection.click(&visible, index, modifiers);
        self.publish_selection();
        Ok(())
    }

    /// Select visible positions `from..=to` (in either order); returns how many
    /// entries were newly selected
    pub fn select_range(&mut self, from: usize, to: usize) -> usize {
        let (visible, selection) = self.view.visible_and_selection();
        let added = selection.select_range(&visible, from, to);
        if added > 0 {
            self.publish_selection();
        }
        added
    }

    /// Select every visible entry
    pub fn select_all(&mut self) {
        let (visible, selection) = self.view.visible_and_selection();
        selection.select_all(visible);
        self.publish_selection();
    }

    pub fn clear_selection(&mut self) {
        if self.view.selection.is_empty() {
            return;
        }
        self.view.selection.clear();
        self.publish_selection();
    }

    /// Selected entries in selection order, with their current values
    #[must_use]
    pub fn selected(&self) -> Vec<Entry> {
        self.view.selection.snapshot(&self.view.model)
    }

    #[must_use]
    pub const fn selection_summary(&self) -> Summary {
        self.view.selection.summary()
    }

    /// Whether every visible entry is selected
    #[must_use]
    pub fn is_all_selected(&self) -> bool {
        self.view.selection.is_all_selected(self.view.visible_ids().len())
    }

    /// Whether the current selection may be deleted
    #[must_use]
    pub fn can_delete_selection(&self) -> bool {
        self.view
            .selection
            .can_delete(&self.view.model, self.view.dir_permissions)
    }

    fn publish_selection(&mut self) {
        let event = self.view.selection_event();
        self.bus.publish(&event);
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Open the inline rename editor for `id`
    ///
    /// # Errors
    ///
    /// Fails when the entry is unknown, busy or may not be renamed.
    pub fn begin_rename(&mut self, id: &EntryId) -> Result<(), ValidationError> {
        let out = self.coordinator.begin_rename(&self.view, id)?;
        self.dispatch(out);
        Ok(())
    }

    /// Close the rename editor of `id` without submitting
    pub fn cancel_rename(&mut self, id: &EntryId) -> bool {
        match self.coordinator.cancel_rename(id) {
            Some(out) => {
                self.dispatch(out);
                true
            }
            None => false,
        }
    }

    /// Submit the edited name of `id`
    ///
    /// # Errors
    ///
    /// Returns the local validation failure; nothing is sent and the editor stays open.
    pub fn submit_rename(&mut self, id: &EntryId, new_name: &str) -> Result<RenameSubmission, ValidationError> {
        let out = self.coordinator.submit_rename(&mut self.view, id, new_name)?;
        let submission = out
            .first_ticket()
            .map_or(RenameSubmission::Unchanged, RenameSubmission::Submitted);
        self.dispatch(out);
        Ok(submission)
    }

    /// Move `ids` into the directory `target`; one request per entry
    ///
    /// # Errors
    ///
    /// Fails without dispatching when `ids` is empty or names an entry not shown.
    pub fn move_entries(&mut self, ids: &[EntryId], target: &str) -> Result<Vec<RequestId>, ValidationError> {
        self.transfer(TransferKind::Move, ids, target)
    }

    /// Copy `ids` into the directory `target`; one request per entry
    ///
    /// # Errors
    ///
    /// Fails without dispatching when `ids` is empty or names an entry not shown.
    pub fn copy_entries(&mut self, ids: &[EntryId], target: &str) -> Result<Vec<RequestId>, ValidationError> {
        self.transfer(TransferKind::Copy, ids, target)
    }

    fn transfer(&mut self, kind: TransferKind, ids: &[EntryId], target: &str) -> Result<Vec<RequestId>, ValidationError> {
        let out = self.coordinator.transfer(&mut self.view, kind, ids, target)?;
        let tickets = out.tickets();
        self.dispatch(out);
        Ok(tickets)
    }

    /// Hide `ids` and request their deletion; the previous undo buffer is given up
    ///
    /// # Errors
    ///
    /// Fails without hiding anything when `ids` is empty, names an entry not shown,
    /// or the user lacks the delete permission.
    pub fn delete(&mut self, ids: &[EntryId]) -> Result<RequestId, ValidationError> {
        let out = self.coordinator.delete(&mut self.view, ids)?;
        let ticket = out.first_ticket().ok_or(ValidationError::NothingSelected)?;
        self.dispatch(out);
        Ok(ticket)
    }

    /// Delete every selected entry
    ///
    /// # Errors
    ///
    /// Same as [`Self::delete`]; `NothingSelected` when the selection is empty.
    pub fn delete_selected(&mut self) -> Result<RequestId, ValidationError> {
        let ids: Vec<EntryId> = self.view.selection.ids().cloned().collect();
        self.delete(&ids)
    }

    /// Restore the entries of the last delete
    ///
    /// # Errors
    ///
    /// Returns `NothingToUndo` when there is nothing to restore in this listing.
    pub fn undo_delete(&mut self) -> Result<RequestId, ValidationError> {
        let out = self.coordinator.undo_delete(&mut self.view)?;
        let ticket = out.first_ticket().ok_or(ValidationError::NothingToUndo)?;
        self.dispatch(out);
        Ok(ticket)
    }

    /// Add `tag` to every entry of `ids`
    ///
    /// # Errors
    ///
    /// Tag validation failures, or `TagMergeConflict` when a target already carries
    /// the tag. In that case a `MergeRequested` event is published and nothing is
    /// sent until [`Self::confirm_merge`].
    pub fn add_tag(&mut self, ids: &[EntryId], tag: &str) -> Result<Vec<RequestId>, ValidationError> {
        let result = self.coordinator.add_tag(&mut self.view, ids, tag);
        self.finish_tag_edit(result)
    }

    /// Rename tag `from` to `to` on the entries of `ids`
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_tag`].
    pub fn rename_tag(&mut self, ids: &[EntryId], from: &str, to: &str) -> Result<Vec<RequestId>, ValidationError> {
        let result = self.coordinator.rename_tag(&mut self.view, ids, from, to);
        self.finish_tag_edit(result)
    }

    fn finish_tag_edit(&mut self, result: Result<Outbox, ValidationError>) -> Result<Vec<RequestId>, ValidationError> {
        match result {
            Ok(out) => {
                let tickets = out.tickets();
                self.dispatch(out);
                Ok(tickets)
            }
            Err(ValidationError::TagMergeConflict { tag, token }) => {
                self.bus.publish(&SessionEvent::MergeRequested {
                    token,
                    tag: tag.clone(),
                });
                Err(ValidationError::TagMergeConflict { tag, token })
            }
            Err(e) => Err(e),
        }
    }

    /// Carry out a tag merge the user confirmed
    ///
    /// # Errors
    ///
    /// Returns `UnknownMerge` for a token that is not awaiting confirmation.
    pub fn confirm_merge(&mut self, token: MergeToken) -> Result<Vec<RequestId>, ValidationError> {
        let out = self.coordinator.confirm_merge(&mut self.view, token)?;
        let tickets = out.tickets();
        self.dispatch(out);
        Ok(tickets)
    }

    /// Drop a tag merge the user declined
    pub fn cancel_merge(&mut self, token: MergeToken) -> bool {
        self.coordinator.cancel_merge(token)
    }

    /// Fail and roll back mutations in flight for longer than the configured timeout
    pub fn expire_stale(&mut self, now: Instant) {
        let out = self.coordinator.expire_stale(now, &mut self.view);
        self.dispatch(out);
    }

    fn dispatch(&mut self, out: Outbox) {
        let Outbox {
            requests,
            cancels,
            events,
            reload,
        } = out;
        for ticket in cancels {
            self.backend.cancel(ticket);
        }
        for (ticket, request) in requests {
            self.backend.send(ticket, request);
        }
        self.bus.publish_all(events);
        if reload {
            self.reload();
        }
    }

    fn notify(&mut self, message: String) {
        let dismiss_after = self.coordinator.settings().notification_ttl;
        self.bus.publish(&SessionEvent::Notification(Notification {
            message,
            dismiss_after,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeleteTargets, RecordingBackend, Reply};
    use crate::coordinator::MutationError;
    use crate::testing::{EventLog, file, names, sample_entries};
    use serde_json::json;

    fn listing_reply(entries: &[Entry]) -> Completion {
        Ok(Reply::success(json!({ "files": entries, "permissions": 31 })))
    }

    fn session_with(config: DirviewConfig) -> (DirectorySession<RecordingBackend>, EventLog) {
        let mut session = DirectorySession::new(RecordingBackend::new(), config);
        let log = EventLog::new();
        session.subscribe(log.observer());
        let ticket = session.change_directory("/docs", None);
        session.complete(ticket, listing_reply(&sample_entries())).unwrap();
        session.backend_mut().clear();
        log.clear();
        (session, log)
    }

    fn session() -> (DirectorySession<RecordingBackend>, EventLog) {
        session_with(DirviewConfig::default())
    }

    fn visible_names<B: Backend>(session: &DirectorySession<B>) -> Vec<String> {
        session.visible().iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_change_directory_requests_listing() {
        let mut session = DirectorySession::new(RecordingBackend::new(), DirviewConfig::default());
        let log = EventLog::new();
        session.subscribe(log.observer());

        let ticket = session.change_directory("/docs", None);

        let (sent, Request::ListDirectory(list)) = session.backend().last().unwrap() else {
            panic!("expected a listing request");
        };
        assert_eq!(*sent, ticket);
        assert_eq!(list.dir, "/docs");
        assert_eq!(list.sort, SortKey::Name);
        assert!(session.is_loading());
        assert!(log.any(|e| matches!(e, SessionEvent::DirectoryChanged { dir } if dir == "/docs")));
    }

    #[test]
    fn test_listing_loads_entries() {
        let (session, _) = session();

        assert_eq!(session.dir(), "/docs");
        assert!(!session.is_loading());
        assert_eq!(names(session.entries()), ["photos", "a.txt", "b.txt", "c.txt"]);
        assert_eq!(session.totals().total_size, 60);
        assert_eq!(session.folder_tags(), ["work"]);
    }

    #[test]
    fn test_superseded_listing_is_ignored() {
        let (mut session, log) = session();

        let first = session.change_directory("/a", None);
        let second = session.change_directory("/b", None);
        assert!(session.backend().was_cancelled(first));

        session
            .complete(second, listing_reply(&[file("9", "b-only.txt", 1)]))
            .unwrap();
        session
            .complete(first, listing_reply(&[file("8", "a-only.txt", 1)]))
            .unwrap();

        assert_eq!(session.dir(), "/b");
        assert_eq!(visible_names(&session), ["b-only.txt"]);
        assert!(!log.any(|e| matches!(e, SessionEvent::ListingLoaded { dir, .. } if dir == "/a")));
    }

    #[test]
    fn test_reload_clears_selection_before_dispatch() {
        let (mut session, log) = session();
        session.toggle(&"2".into(), true).unwrap();
        log.clear();

        session.reload();

        assert_eq!(session.selected().len(), 0);
        let events = log.events();
        let selection_at = events
            .iter()
            .position(|e| matches!(e, SessionEvent::SelectionChanged { count: 0, .. }))
            .unwrap();
        let changed_at = events
            .iter()
            .position(|e| matches!(e, SessionEvent::DirectoryChanged { .. }))
            .unwrap();
        assert!(selection_at < changed_at);
    }

    #[test]
    fn test_listing_not_found_goes_to_root() {
        let (mut session, _) = session();
        let ticket = session.change_directory("/gone", None);

        session
            .complete(ticket, Ok(Reply::new(404, serde_json::Value::Null)))
            .unwrap();

        let Some((_, Request::ListDirectory(list))) = session.backend().last() else {
            panic!("expected a listing request");
        };
        assert_eq!(list.dir, "/");
    }

    #[test]
    fn test_listing_error_returns_to_previous_directory() {
        let (mut session, log) = session();
        let ticket = session.change_directory("/broken", None);

        session
            .complete(ticket, Ok(Reply::error("Storage unavailable", None)))
            .unwrap();

        let Some((_, Request::ListDirectory(list))) = session.backend().last() else {
            panic!("expected a listing request");
        };
        assert_eq!(list.dir, "/docs");
        assert!(log.any(|e| matches!(
            e,
            SessionEvent::Notification(n) if n.message == "Storage unavailable"
        )));
    }

    #[test]
    fn test_failed_reload_does_not_loop() {
        let (mut session, _) = session();
        let ticket = session.reload();

        session
            .complete(ticket, Err(TransportError::Failed("offline".into())))
            .unwrap();

        assert_eq!(session.backend().count("list"), 1);
        assert!(!session.is_loading());
    }

    #[test]
    fn test_fatal_listing_error() {
        let (mut session, log) = session();
        let ticket = session.reload();

        let reply = Reply::ok(json!({ "status": "error", "data": { "error": "token_expired" } }));
        let err = session.complete(ticket, Ok(reply)).unwrap_err();

        assert!(matches!(err, FatalSessionError::Unauthenticated { .. }));
        assert!(log.any(|e| matches!(e, SessionEvent::Fatal(_))));
        assert_eq!(session.backend().count("list"), 1);
    }

    #[test]
    fn test_client_sort_keeps_selection() {
        let (mut session, _) = session();
        session.toggle(&"4".into(), true).unwrap();

        assert!(session.set_sort(SortKey::Size, SortDirection::Desc).is_none());

        assert_eq!(visible_names(&session), ["c.txt", "b.txt", "a.txt", "photos"]);
        assert_eq!(session.selected().len(), 1);
        assert_eq!(session.backend().count("list"), 0);
    }

    #[test]
    fn test_server_sort_reloads() {
        let mut config = DirviewConfig::default();
        config.sort.mode = SortMode::Server;
        let (mut session, _) = session_with(config);

        let ticket = session.set_sort(SortKey::Mtime, SortDirection::Desc).unwrap();

        let Some((sent, Request::ListDirectory(list))) = session.backend().last() else {
            panic!("expected a listing request");
        };
        assert_eq!(*sent, ticket);
        assert_eq!(list.sort, SortKey::Mtime);
        assert_eq!(list.direction, SortDirection::Desc);
    }

    #[test]
    fn test_sort_by_column_flips_direction() {
        let (mut session, _) = session();
        session.sort_by_column(SortKey::Name);
        assert_eq!(session.sort_state().direction, SortDirection::Desc);

        session.sort_by_column(SortKey::Size);
        assert_eq!(session.sort_state(), SortState::new(SortKey::Size, SortDirection::Asc));
    }

    #[test]
    fn test_filter_clears_selection() {
        let (mut session, _) = session();
        session.toggle(&"2".into(), true).unwrap();

        session.set_filter("#work");

        assert_eq!(visible_names(&session), ["b.txt"]);
        assert!(session.selected().is_empty());
        assert_eq!(session.totals().total_size, 20);

        session.set_filter("");
        assert_eq!(session.visible().len(), 4);
    }

    #[test]
    fn test_toggle_hidden_entry_is_unknown() {
        let (mut session, _) = session();
        session.set_filter("a.txt");

        assert_eq!(
            session.toggle(&"3".into(), true),
            Err(ValidationError::UnknownEntry("3".into()))
        );
    }

    #[test]
    fn test_viewport_sets_page_size() {
        let mut config = DirviewConfig::default();
        config.paging.page_size = 2;
        let (mut session, _) = session_with(config);
        assert_eq!(session.revealed().len(), 2);
        assert!(session.has_more());

        session.set_viewport(160);

        assert_eq!(session.revealed().len(), 4);
        assert!(!session.has_more());
    }

    #[test]
    fn test_rename_round_trip() {
        let (mut session, _) = session();
        let id = EntryId::new("2");

        session.begin_rename(&id).unwrap();
        assert_eq!(session.submit_rename(&id, "a.txt"), Ok(RenameSubmission::Unchanged));

        session.begin_rename(&id).unwrap();
        let RenameSubmission::Submitted(ticket) = session.submit_rename(&id, "z.txt").unwrap() else {
            panic!("expected a rename request");
        };
        assert!(session.is_busy(&id));

        session
            .complete(ticket, Ok(Reply::success(json!({ "id": "2", "name": "z.txt" }))))
            .unwrap();

        assert_eq!(session.rename_state(&id), Some(&RenameState::Committed));
        assert!(!session.is_busy(&id));
        assert_eq!(names(session.entries()), ["photos", "b.txt", "c.txt", "z.txt"]);
    }

    #[test]
    fn test_tag_conflict_publishes_merge_request() {
        let (mut session, log) = session();

        let err = session.add_tag(&["2".into(), "3".into()], "work").unwrap_err();
        let ValidationError::TagMergeConflict { token, .. } = err else {
            panic!("expected a merge conflict, got {err:?}");
        };
        assert!(log.any(|e| matches!(e, SessionEvent::MergeRequested { token: t, .. } if *t == token)));
        assert_eq!(session.backend().count("tags"), 0);

        assert_eq!(session.confirm_merge(token).unwrap().len(), 1);
        assert_eq!(session.backend().count("tags"), 1);
    }

    #[test]
    fn test_delete_selected_and_undo() {
        let (mut session, log) = session();
        session.toggle(&"2".into(), true).unwrap();
        session.toggle(&"3".into(), true).unwrap();

        let ticket = session.delete_selected().unwrap();
        assert_eq!(session.visible().len(), 2);
        assert!(session.selected().is_empty());
        assert!(log.any(|e| matches!(e, SessionEvent::UndoAvailable { count: 2 })));

        session.undo_delete().unwrap();
        assert_eq!(session.visible().len(), 4);
        assert_eq!(session.backend().count("undelete"), 1);

        session.complete(ticket, Ok(Reply::success(json!(null)))).unwrap();
        assert_eq!(session.visible().len(), 4);
    }

    #[test]
    fn test_unique_name_skips_loaded_names() {
        let (session, _) = session();
        assert_eq!(session.unique_name("a.txt"), "a (2).txt");
        assert_eq!(session.unique_name("fresh.txt"), "fresh.txt");
    }

    #[test]
    fn test_timed_out_move_rolls_back_and_ignores_late_reply() {
        let mut config = DirviewConfig::default();
        config.mutations.timeout_secs = Some(5);
        let (mut session, log) = session_with(config);
        let started = Instant::now();

        let tickets = session.move_entries(&["2".into()], "/docs/photos").unwrap();
        assert!(session.is_busy(&"2".into()));

        session.expire_stale(started);
        assert_eq!(session.pending_count(), 1);

        session.expire_stale(started + std::time::Duration::from_secs(6));
        assert_eq!(session.pending_count(), 0);
        assert!(session.backend().was_cancelled(tickets[0]));
        assert!(!session.is_busy(&"2".into()));
        assert!(log.any(|e| matches!(
            e,
            SessionEvent::MutationSettled {
                settlement: crate::events::Settlement::RolledBack(MutationError::Transport(
                    TransportError::TimedOut { secs: 5 }
                )),
                ..
            }
        )));

        session.complete(tickets[0], Ok(Reply::success(json!(null)))).unwrap();
        assert_eq!(visible_names(&session), ["photos", "a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_delete_in_shared_root_addresses_ids() {
        let mut session = DirectorySession::new(RecordingBackend::new(), DirviewConfig::default());
        let ticket = session.change_directory("/shared", None);
        let reply = Reply::success(json!({
            "files": sample_entries(),
            "permissions": 31,
            "currentFolder": { "id": 7, "name": "shared", "mountType": "shared-root" }
        }));
        session.complete(ticket, Ok(reply)).unwrap();

        session.delete(&["2".into(), "4".into()]).unwrap();

        let Some((_, Request::Delete { targets, .. })) = session.backend().last() else {
            panic!("expected a delete request");
        };
        assert_eq!(
            targets,
            &DeleteTargets::SharedIds(vec!["2".into(), "4".into()])
        );
    }

    #[test]
    fn test_view_scope_is_sent_with_listing() {
        let (mut session, _) = session();
        session.set_view_scope(Some("favorites".to_string()));

        let ticket = session.reload();

        let Some((sent, Request::ListDirectory(list))) = session.backend().last() else {
            panic!("expected a listing request");
        };
        assert_eq!(*sent, ticket);
        assert_eq!(list.view_scope.as_deref(), Some("favorites"));
        assert_eq!(list.dir, "/docs");
    }

    #[test]
    fn test_tag_reply_without_envelope_commits() {
        let (mut session, _) = session();
        let tickets = session.add_tag(&["2".into()], "urgent").unwrap();

        session
            .complete(tickets[0], Ok(Reply::new(200, json!({ "data": ["urgent"] }))))
            .unwrap();

        let entry = session.entries().find_by_id(&"2".into()).unwrap();
        assert_eq!(entry.tags, ["urgent"]);
        assert!(!session.is_busy(&"2".into()));
    }
}
