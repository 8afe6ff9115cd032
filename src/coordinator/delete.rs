//! Two-phase delete with undo
//!
//! Phase one hides the entries (they stay in the model) and fills the undo buffer;
//! the delete request leaves at the same time. A successful completion removes the
//! entries that are still hidden. Undo unhides whatever the buffer holds and sends an
//! undelete for exactly those entries, whether or not the delete has completed yet.

use super::{MutationCoordinator, MutationError, Outbox, Payload, ValidationError, outcome};
use crate::backend::{Completion, DeleteTargets, Request, RequestId};
use crate::entry::{EntryId, Permissions};
use crate::events::{MutationKind, SessionEvent};
use crate::session::ListView;
use serde::de::IgnoredAny;
use tracing::debug;

/// Entries that an undo would restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct UndoBuffer {
    /// Id and name of each hidden entry
    entries: Vec<(EntryId, String)>,
    dir: String,
    generation: u64,
    /// Delete still in flight; `None` once it committed
    delete_request: Option<RequestId>,
}

impl UndoBuffer {
    pub(super) fn ids(&self) -> Vec<EntryId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }
}

impl MutationCoordinator {
    /// Hide `ids` and dispatch their deletion
    ///
    /// Any earlier undo buffer is flushed first, so at most one delete can be undone.
    /// Deleting every shown entry while all of them are selected sends a
    /// whole-directory delete; inside a share root entries are addressed by id.
    ///
    /// # Errors
    ///
    /// - `NothingSelected` when `ids` is empty
    /// - `UnknownEntry` when an id is not shown
    /// - `Busy` when an id has a rename, transfer or tag request in flight
    /// - `PermissionDenied` when the directory or an entry lacks the delete permission
    pub fn delete(&mut self, view: &mut ListView, ids: &[EntryId]) -> Result<Outbox, ValidationError> {
        if ids.is_empty() {
            return Err(ValidationError::NothingSelected);
        }
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = view
                .model
                .find_by_id(id)
                .filter(|_| !view.model.is_hidden(id))
                .ok_or_else(|| ValidationError::UnknownEntry(id.clone()))?;
            if view.busy.contains(id) {
                return Err(ValidationError::Busy(id.clone()));
            }
            if !entry.permissions.contains(Permissions::DELETE) {
                return Err(ValidationError::PermissionDenied);
            }
            if !entries.iter().any(|(known, _): &(EntryId, String)| known == id) {
                entries.push((id.clone(), entry.name.clone()));
            }
        }
        if !view.dir_permissions.contains(Permissions::DELETE) {
            return Err(ValidationError::PermissionDenied);
        }

        let mut out = Outbox::default();
        self.flush_undo(&mut out);

        let shown = view.model.shown().count();
        let all_files = entries.len() == shown && view.selection.is_all_selected(shown);
        let targets = if view.is_shared_root() {
            DeleteTargets::SharedIds(entries.iter().map(|(id, _)| id.clone()).collect())
        } else if all_files {
            DeleteTargets::AllFiles
        } else {
            DeleteTargets::Files(entries.iter().map(|(_, name)| name.clone()).collect())
        };

        let mut deselected = false;
        for (id, _) in &entries {
            view.hide_entry(id);
            deselected |= view.selection.deselect(id);
            out.events.extend(view.set_busy(id, false));
        }

        let ids: Vec<EntryId> = entries.iter().map(|(id, _)| id.clone()).collect();
        let ticket = self.track(
            &mut out,
            MutationKind::Delete,
            ids.clone(),
            view.generation,
            Request::Delete {
                dir: view.dir.clone(),
                targets,
            },
            Payload::Delete { ids, all_files },
        );
        self.undo = Some(UndoBuffer {
            dir: view.dir.clone(),
            generation: view.generation,
            delete_request: Some(ticket),
            entries,
        });

        if deselected {
            out.events.push(view.selection_event());
        }
        out.events.push(SessionEvent::UndoAvailable {
            count: self.undo_buffer().len(),
        });
        out.events.extend(view.refresh());
        Ok(out)
    }

    /// Restore the entries of the last delete
    ///
    /// # Errors
    ///
    /// Returns `NothingToUndo` when the buffer is empty or belongs to another listing.
    pub fn undo_delete(&mut self, view: &mut ListView) -> Result<Outbox, ValidationError> {
        let buffer = self
            .undo
            .take()
            .filter(|buffer| buffer.generation == view.generation)
            .ok_or(ValidationError::NothingToUndo)?;
        let committed = buffer.delete_request.is_none();
        debug!(count = buffer.entries.len(), committed, "Undoing delete");

        let mut out = Outbox::default();
        for (id, _) in &buffer.entries {
            view.unhide_entry(id);
        }
        self.track(
            &mut out,
            MutationKind::Undelete,
            buffer.ids(),
            view.generation,
            Request::Undelete {
                dir: buffer.dir,
                files: buffer.entries.into_iter().map(|(_, name)| name).collect(),
            },
            Payload::Undelete { committed },
        );
        out.events.push(SessionEvent::UndoCleared);
        out.events.extend(view.refresh());
        Ok(out)
    }

    /// Give up the undo affordance of the previous delete
    fn flush_undo(&mut self, out: &mut Outbox) {
        if self.undo.take().is_some() {
            out.events.push(SessionEvent::UndoCleared);
        }
    }

    /// Drop `id` from the undo buffer (it was removed by another mutation)
    pub(super) fn forget_undo(&mut self, id: &EntryId, out: &mut Outbox) {
        let Some(buffer) = self.undo.as_mut() else {
            return;
        };
        buffer.entries.retain(|(known, _)| known != id);
        if buffer.entries.is_empty() {
            self.flush_undo(out);
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn settle_delete(
        &mut self,
        ticket: RequestId,
        ids: &[EntryId],
        all_files: bool,
        completion: Completion,
        view: &mut ListView,
        stale: bool,
        out: &mut Outbox,
    ) -> Result<(), MutationError> {
        let result = outcome::<IgnoredAny>(completion).map(drop);
        let owns_buffer = self
            .undo
            .as_ref()
            .is_some_and(|buffer| buffer.delete_request == Some(ticket));
        if stale {
            return result;
        }

        match result {
            Ok(()) => {
                for id in ids {
                    if view.model.is_hidden(id) {
                        view.remove_entry(id);
                    }
                }
                if owns_buffer {
                    if let Some(buffer) = self.undo.as_mut() {
                        buffer.delete_request = None;
                    }
                }
                out.events.extend(view.refresh());
                Ok(())
            }
            Err(e) => {
                if all_files {
                    out.reload = true;
                } else {
                    for id in ids {
                        view.unhide_entry(id);
                    }
                }
                if owns_buffer {
                    self.flush_undo(out);
                }
                self.notify(out, e.user_message("Error deleting file."));
                out.events.extend(view.refresh());
                Err(e)
            }
        }
    }

    pub(super) fn settle_undelete(
        &self,
        committed: bool,
        completion: Completion,
        stale: bool,
        out: &mut Outbox,
    ) -> Result<(), MutationError> {
        match outcome::<IgnoredAny>(completion) {
            Ok(_) => {
                out.reload |= committed && !stale;
                Ok(())
            }
            Err(e) => {
                self.notify(out, e.user_message("Error restoring file."));
                out.reload |= !stale;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Reply, TransportError};
    use crate::testing::loaded;
    use serde_json::json;

    fn ok() -> Reply {
        Reply::success(json!({}))
    }

    #[test]
    fn test_delete_hides_without_removing() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator
            .delete(&mut view, &["2".into(), "3".into()])
            .unwrap();

        assert_eq!(view.model.len(), 4);
        assert_eq!(view.visible_ids().len(), 2);
        assert_eq!(coordinator.undo_buffer().len(), 2);
        assert!(out.events.contains(&SessionEvent::UndoAvailable { count: 2 }));
        assert!(matches!(
            &out.requests[0].1,
            Request::Delete {
                targets: DeleteTargets::Files(files),
                ..
            } if files == &["a.txt", "b.txt"]
        ));
    }

    #[test]
    fn test_success_removes_hidden_entries() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator.delete(&mut view, &["2".into()]).unwrap();
        coordinator
            .settle(out.first_ticket().unwrap(), Ok(ok()), &mut view)
            .unwrap();

        assert_eq!(view.model.len(), 3);
        assert_eq!(view.totals().total_size, 50);
        // Still undoable after commit
        assert_eq!(coordinator.undo_buffer().len(), 1);
    }

    #[test]
    fn test_undo_before_completion() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator
            .delete(&mut view, &["2".into(), "3".into()])
            .unwrap();
        let delete_ticket = out.first_ticket().unwrap();

        let undo = coordinator.undo_delete(&mut view).unwrap();
        assert!(matches!(
            &undo.requests[0].1,
            Request::Undelete { files, .. } if files == &["a.txt", "b.txt"]
        ));
        assert_eq!(view.visible_ids().len(), 4);
        assert!(coordinator.undo_buffer().is_empty());

        // The late delete completion must not remove the restored entries
        coordinator.settle(delete_ticket, Ok(ok()), &mut view).unwrap();
        assert_eq!(view.model.len(), 4);

        let settled = coordinator
            .settle(undo.first_ticket().unwrap(), Ok(ok()), &mut view)
            .unwrap();
        assert!(!settled.reload);
    }

    #[test]
    fn test_undo_after_commit_reloads() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator.delete(&mut view, &["2".into()]).unwrap();
        coordinator
            .settle(out.first_ticket().unwrap(), Ok(ok()), &mut view)
            .unwrap();

        let undo = coordinator.undo_delete(&mut view).unwrap();
        let settled = coordinator
            .settle(undo.first_ticket().unwrap(), Ok(ok()), &mut view)
            .unwrap();
        assert!(settled.reload);
    }

    #[test]
    fn test_failure_unhides_and_clears_buffer() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator.delete(&mut view, &["2".into()]).unwrap();
        let settled = coordinator
            .settle(
                out.first_ticket().unwrap(),
                Err(TransportError::Status(500)),
                &mut view,
            )
            .unwrap();

        assert_eq!(view.visible_ids().len(), 4);
        assert!(coordinator.undo_buffer().is_empty());
        assert!(settled.events.contains(&SessionEvent::UndoCleared));
    }

    #[test]
    fn test_new_delete_flushes_previous_buffer() {
        let (mut coordinator, mut view) = loaded();
        coordinator.delete(&mut view, &["2".into()]).unwrap();
        let out = coordinator.delete(&mut view, &["3".into()]).unwrap();

        assert!(out.events.contains(&SessionEvent::UndoCleared));
        assert_eq!(coordinator.undo_buffer(), [EntryId::new("3")]);
    }

    #[test]
    fn test_delete_everything_selected_sends_all_files() {
        let (mut coordinator, mut view) = loaded();
        let all: Vec<EntryId> = view.visible_ids().to_vec();
        let entries: Vec<_> = view.model.to_vec();
        view.selection.select_all(&entries);

        let out = coordinator.delete(&mut view, &all).unwrap();
        assert!(matches!(
            out.requests[0].1,
            Request::Delete {
                targets: DeleteTargets::AllFiles,
                ..
            }
        ));
        assert!(view.selection.is_empty());

        let settled = coordinator
            .settle(out.first_ticket().unwrap(), Err(TransportError::Aborted), &mut view)
            .unwrap();
        assert!(settled.reload);
    }

    #[test]
    fn test_permission_checks() {
        let (mut coordinator, mut view) = loaded();
        view.model.update(&"2".into(), |e| e.permissions = Permissions::READ);
        assert_eq!(
            coordinator.delete(&mut view, &["2".into()]).unwrap_err(),
            ValidationError::PermissionDenied
        );

        view.dir_permissions = Permissions::READ;
        assert_eq!(
            coordinator.delete(&mut view, &["3".into()]).unwrap_err(),
            ValidationError::PermissionDenied
        );
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[test]
    fn test_undo_without_delete() {
        let (mut coordinator, mut view) = loaded();
        assert_eq!(
            coordinator.undo_delete(&mut view).unwrap_err(),
            ValidationError::NothingToUndo
        );
    }

    #[test]
    fn test_busy_entry_cannot_be_deleted() {
        let (mut coordinator, mut view) = loaded();
        coordinator
            .transfer(&mut view, crate::coordinator::TransferKind::Move, &["2".into()], "/docs/photos")
            .unwrap();

        assert_eq!(
            coordinator.delete(&mut view, &["3".into(), "2".into()]).unwrap_err(),
            ValidationError::Busy("2".into())
        );
        assert!(!view.model.is_hidden(&"3".into()));
        assert!(coordinator.undo_buffer().is_empty());
    }
}
