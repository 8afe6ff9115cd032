//! Move and copy

use super::{MutationCoordinator, MutationError, Outbox, Payload, ValidationError, outcome, split_path};
use crate::backend::{Completion, Request};
use crate::entry::{Entry, EntryId, EntrySize};
use crate::events::MutationKind;
use crate::session::ListView;
use serde::de::IgnoredAny;
use tracing::{debug, trace};

/// Whether the source stays in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Move,
    Copy,
}

impl TransferKind {
    const fn mutation_kind(self) -> MutationKind {
        match self {
            Self::Move => MutationKind::Move,
            Self::Copy => MutationKind::Copy,
        }
    }

    const fn failure_message(self) -> &'static str {
        match self {
            Self::Move => "Error moving file.",
            Self::Copy => "Error copying file.",
        }
    }
}

impl MutationCoordinator {
    /// Move or copy each of `ids` into the directory `target`
    ///
    /// Every target gets its own request and settles independently; entries already
    /// busy are skipped.
    ///
    /// # Errors
    ///
    /// Fails without dispatching anything when `ids` is empty or names an entry
    /// that is not shown.
    pub fn transfer(
        &mut self,
        view: &mut ListView,
        kind: TransferKind,
        ids: &[EntryId],
        target: &str,
    ) -> Result<Outbox, ValidationError> {
        if ids.is_empty() {
            return Err(ValidationError::NothingSelected);
        }
        let sources: Vec<Entry> = ids
            .iter()
            .map(|id| {
                view.model
                    .find_by_id(id)
                    .filter(|_| !view.model.is_hidden(id))
                    .cloned()
                    .ok_or_else(|| ValidationError::UnknownEntry(id.clone()))
            })
            .collect::<Result<_, _>>()?;

        let mut out = Outbox::default();
        for source in sources {
            if view.busy.contains(&source.id) {
                trace!(id = %source.id, "Skipping busy entry");
                continue;
            }
            let dir = source.parent_dir(&view.dir).to_string();
            let file = source.name.clone();
            let request = match kind {
                TransferKind::Move => Request::Move {
                    dir,
                    file,
                    target: target.to_string(),
                },
                TransferKind::Copy => Request::Copy {
                    dir,
                    file,
                    target: target.to_string(),
                },
            };
            out.events.extend(view.set_busy(&source.id, true));
            self.track(
                &mut out,
                kind.mutation_kind(),
                vec![source.id.clone()],
                view.generation,
                request,
                Payload::Transfer {
                    source,
                    target: target.to_string(),
                },
            );
        }
        Ok(out)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn settle_transfer(
        &mut self,
        kind: MutationKind,
        source: Entry,
        target: &str,
        completion: Completion,
        view: &mut ListView,
        stale: bool,
        out: &mut Outbox,
    ) -> Result<(), MutationError> {
        let result = outcome::<IgnoredAny>(completion).map(drop);
        if stale {
            return result;
        }
        out.events.extend(view.set_busy(&source.id, false));
        let transfer = if kind == MutationKind::Move {
            TransferKind::Move
        } else {
            TransferKind::Copy
        };

        match result {
            Ok(()) => {
                if transfer == TransferKind::Move {
                    let was_selected = view.selection.is_selected(&source.id);
                    view.remove_entry(&source.id);
                    if was_selected {
                        out.events.push(view.selection_event());
                    }
                    self.forget_undo(&source.id, out);
                }
                account_destination(view, &source, target, out);
                out.events.extend(view.refresh());
                Ok(())
            }
            Err(e) => {
                self.notify(out, e.user_message(transfer.failure_message()));
                Err(e)
            }
        }
    }
}

/// Add the transferred size to the destination row when it is listed here
fn account_destination(view: &mut ListView, source: &Entry, target: &str, out: &mut Outbox) {
    let (parent, name) = split_path(target);
    if parent.trim_end_matches('/') != view.dir.trim_end_matches('/') {
        return;
    }
    let Some(destination) = view
        .model
        .iter()
        .find(|e| e.is_dir() && e.name == name)
        .map(|e| e.id.clone())
    else {
        return;
    };

    let added = source.size.bytes();
    view.edit_entry(&destination, |dir| {
        dir.size = EntrySize::Known(dir.size.bytes().saturating_add(added));
    });
    debug!(%destination, added, "Updated destination size");
    if view.selection.is_selected(&destination) {
        if let Some(updated) = view.model.find_by_id(&destination).cloned() {
            view.selection.toggle(&updated, true);
            out.events.push(view.selection_event());
        }
    }
}
