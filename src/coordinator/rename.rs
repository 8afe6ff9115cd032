//! Inline rename

use super::{MutationCoordinator, MutationError, Outbox, Payload, ValidationError, outcome};
use crate::backend::{Renamed, Request};
use crate::entry::{Entry, EntryId, Permissions};
use crate::events::{MutationKind, SessionEvent};
use crate::session::ListView;
use tracing::debug;

/// Rename editor state of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameState {
    /// Editor open, nothing sent
    Editing,
    /// Request in flight, new name shown optimistically
    Submitted,
    /// Server confirmed (or the name was unchanged)
    Committed,
    /// Server refused; original name restored
    Rejected(String),
    /// Editor closed without submitting
    Cancelled,
}

impl MutationCoordinator {
    /// Current rename state of `id`
    #[must_use]
    pub fn rename_state(&self, id: &EntryId) -> Option<&RenameState> {
        self.rename_states.get(id)
    }

    fn set_rename_state(&mut self, out: &mut Outbox, id: &EntryId, state: RenameState) {
        self.rename_states.insert(id.clone(), state.clone());
        out.events.push(SessionEvent::RenameStateChanged {
            id: id.clone(),
            state,
        });
    }

    fn renamable<'a>(&self, view: &'a ListView, id: &EntryId) -> Result<&'a Entry, ValidationError> {
        let entry = view
            .model
            .find_by_id(id)
            .filter(|_| !view.model.is_hidden(id))
            .ok_or_else(|| ValidationError::UnknownEntry(id.clone()))?;
        if view.busy.contains(id) || self.rename_state(id) == Some(&RenameState::Submitted) {
            return Err(ValidationError::Busy(id.clone()));
        }
        if !entry.permissions.contains(Permissions::UPDATE) {
            return Err(ValidationError::PermissionDenied);
        }
        Ok(entry)
    }

    /// Open the rename editor for `id`
    ///
    /// # Errors
    ///
    /// Fails when the entry is unknown, busy or not renamable.
    pub fn begin_rename(&mut self, view: &ListView, id: &EntryId) -> Result<Outbox, ValidationError> {
        self.renamable(view, id)?;
        let mut out = Outbox::default();
        self.set_rename_state(&mut out, id, RenameState::Editing);
        Ok(out)
    }

    /// Close the editor without submitting; `None` when no editor was open
    pub fn cancel_rename(&mut self, id: &EntryId) -> Option<Outbox> {
        match self.rename_state(id) {
            Some(RenameState::Editing | RenameState::Rejected(_)) => {
                let mut out = Outbox::default();
                self.set_rename_state(&mut out, id, RenameState::Cancelled);
                Some(out)
            }
            _ => None,
        }
    }

    /// Submit `new_name` for `id`
    ///
    /// An unchanged name commits immediately with no request. Otherwise the name is
    /// checked against the naming policy and the other shown entries, relabelled
    /// optimistically and a rename request is queued.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the editor stays in `Editing` and nothing is
    /// sent.
    pub fn submit_rename(
        &mut self,
        view: &mut ListView,
        id: &EntryId,
        new_name: &str,
    ) -> Result<Outbox, ValidationError> {
        let mut out = Outbox::default();
        let original = self.renamable(view, id)?.clone();

        if original.name == new_name {
            self.set_rename_state(&mut out, id, RenameState::Committed);
            return Ok(out);
        }

        let checked = self
            .policy
            .check(new_name)
            .map_err(ValidationError::from)
            .and_then(|()| {
                if view.model.name_taken(new_name, Some(id)) {
                    Err(ValidationError::NameCollision {
                        name: new_name.to_string(),
                    })
                } else {
                    Ok(())
                }
            });
        if let Err(e) = checked {
            debug!(%id, error = %e, "Rename rejected locally");
            self.rename_states.insert(id.clone(), RenameState::Editing);
            return Err(e);
        }

        view.edit_entry(id, |entry| entry.name = new_name.to_string());
        let request = Request::Rename {
            dir: original.parent_dir(&view.dir).to_string(),
            file: original.name.clone(),
            new_name: new_name.to_string(),
        };
        self.track(
            &mut out,
            MutationKind::Rename,
            vec![id.clone()],
            view.generation,
            request,
            Payload::Rename { original },
        );
        self.set_rename_state(&mut out, id, RenameState::Submitted);
        out.events.extend(view.set_busy(id, true));
        out.events.extend(view.refresh());
        Ok(out)
    }

    pub(super) fn settle_rename(
        &mut self,
        original: Entry,
        completion: crate::backend::Completion,
        view: &mut ListView,
        stale: bool,
        out: &mut Outbox,
    ) -> Result<(), MutationError> {
        let id = original.id.clone();
        let result = outcome::<Renamed>(completion);
        if stale {
            return result.map(drop);
        }
        out.events.extend(view.set_busy(&id, false));

        match result {
            Ok(renamed) => {
                let Some(relabelled) = view.model.find_by_id(&id).cloned() else {
                    debug!(%id, "Renamed entry is no longer listed");
                    self.set_rename_state(out, &id, RenameState::Committed);
                    return Ok(());
                };
                let confirmed = renamed.merge_into(relabelled);
                view.replace_entry(&id, confirmed.clone());
                if view.selection.is_selected(&id) {
                    view.selection.replace(&id, &confirmed);
                    out.events.push(view.selection_event());
                }
                self.rename_states.remove(&id);
                self.set_rename_state(out, &confirmed.id, RenameState::Committed);
                out.events.extend(view.refresh());
                Ok(())
            }
            Err(e) => {
                if e.code() == Some("sourcenotfound") {
                    view.remove_entry(&id);
                    out.events.push(view.selection_event());
                } else {
                    view.edit_entry(&id, |entry| *entry = original.clone());
                }
                let message = e.user_message(&format!("Could not rename \"{}\"", original.name));
                self.set_rename_state(out, &id, RenameState::Rejected(message.clone()));
                self.notify(out, message);
                out.events.extend(view.refresh());
                Err(e)
            }
        }
    }
}
