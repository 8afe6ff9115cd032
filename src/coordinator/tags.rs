//! Tag apply and tag rename
//!
//! Tags are stored per entry by sending the entry's complete new tag set; each target
//! entry gets its own request and rolls back on its own. A target stays busy until
//! its request settles, and busy targets are skipped by later edits. Adding a tag
//! that one of the targets already carries never happens silently: the caller
//! receives a `TagMergeConflict` with a token and must confirm the merge.

use super::{
    MergeToken, MutationCoordinator, MutationError, Outbox, Payload, ValidationError, join_path,
};
use crate::backend::{Completion, Request, wire};
use crate::entry::{Entry, EntryId};
use crate::events::MutationKind;
use crate::filter::tag_union;
use crate::session::ListView;
use tracing::{debug, trace};

/// A merge waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum MergePlan {
    /// Add `tag` to whichever of `ids` lacks it
    Add { ids: Vec<EntryId>, tag: String },
    /// Replace `from` with `to` on `ids`, merging where `to` already exists
    Rename {
        ids: Vec<EntryId>,
        from: String,
        to: String,
    },
}

impl MutationCoordinator {
    fn validate_tag(&self, tag: &str) -> Result<String, ValidationError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(ValidationError::EmptyTag);
        }
        let min = self.settings.tag_min_len;
        if tag.chars().count() < min {
            return Err(ValidationError::TagTooShort { min });
        }
        Ok(tag.to_string())
    }

    fn tag_targets<'a>(view: &'a ListView, ids: &[EntryId]) -> Result<Vec<&'a Entry>, ValidationError> {
        if ids.is_empty() {
            return Err(ValidationError::NothingSelected);
        }
        ids.iter()
            .map(|id| {
                view.model
                    .find_by_id(id)
                    .filter(|_| !view.model.is_hidden(id))
                    .ok_or_else(|| ValidationError::UnknownEntry(id.clone()))
            })
            .collect()
    }

    fn request_merge(&mut self, plan: MergePlan, tag: String) -> ValidationError {
        let token = self.issue_merge_token();
        debug!(%token, %tag, "Tag merge needs confirmation");
        self.merges.insert(token, plan);
        ValidationError::TagMergeConflict { tag, token }
    }

    /// Add `tag` to every entry of `ids`
    ///
    /// # Errors
    ///
    /// - `EmptyTag` / `TagTooShort` for a bad tag
    /// - `TagMergeConflict` when a target already carries the tag; nothing is sent
    ///   until [`Self::confirm_merge`] is called with the returned token
    pub fn add_tag(&mut self, view: &mut ListView, ids: &[EntryId], tag: &str) -> Result<Outbox, ValidationError> {
        let tag = self.validate_tag(tag)?;
        let targets = Self::tag_targets(view, ids)?;
        let ids: Vec<EntryId> = targets.iter().map(|e| e.id.clone()).collect();

        if tag_union(targets.iter().copied()).contains(&tag) {
            return Err(self.request_merge(MergePlan::Add { ids, tag: tag.clone() }, tag));
        }
        Ok(self.apply(view, &ids, |tags| tags.push(tag.clone())))
    }

    /// Rename tag `from` to `to` on the entries of `ids` that carry it
    ///
    /// # Errors
    ///
    /// - `EmptyTag` / `TagTooShort` for a bad new tag
    /// - `TagMergeConflict` when `to` already exists among the remaining tags
    pub fn rename_tag(
        &mut self,
        view: &mut ListView,
        ids: &[EntryId],
        from: &str,
        to: &str,
    ) -> Result<Outbox, ValidationError> {
        let to = self.validate_tag(to)?;
        if from == to {
            return Ok(Outbox::default());
        }
        let targets: Vec<&Entry> = Self::tag_targets(view, ids)?
            .into_iter()
            .filter(|e| e.has_tag(from))
            .collect();
        let ids: Vec<EntryId> = targets.iter().map(|e| e.id.clone()).collect();

        let mut remaining = tag_union(targets.iter().copied());
        remaining.remove(from);
        let plan = MergePlan::Rename {
            ids,
            from: from.to_string(),
            to: to.clone(),
        };
        if remaining.contains(&to) {
            return Err(self.request_merge(plan, to));
        }
        Ok(self.run_plan(view, plan))
    }

    /// Carry out a merge the user confirmed
    ///
    /// # Errors
    ///
    /// Returns `UnknownMerge` when the token was never issued, already used,
    /// cancelled or belongs to a previous listing.
    pub fn confirm_merge(&mut self, view: &mut ListView, token: MergeToken) -> Result<Outbox, ValidationError> {
        let plan = self
            .merges
            .remove(&token)
            .ok_or(ValidationError::UnknownMerge(token))?;
        Ok(self.run_plan(view, plan))
    }

    /// Drop a merge request; returns false when `token` is unknown
    pub fn cancel_merge(&mut self, token: MergeToken) -> bool {
        self.merges.remove(&token).is_some()
    }

    fn run_plan(&mut self, view: &mut ListView, plan: MergePlan) -> Outbox {
        match plan {
            MergePlan::Add { ids, tag } => self.apply(view, &ids, |tags| {
                if !tags.contains(&tag) {
                    tags.push(tag.clone());
                }
            }),
            MergePlan::Rename { ids, from, to } => self.apply(view, &ids, |tags| {
                tags.retain(|t| t != &from);
                if !tags.contains(&to) {
                    tags.push(to.clone());
                }
            }),
        }
    }

    /// Optimistically rewrite the tags of each entry and queue one request per entry
    /// whose tag set changed
    fn apply(&mut self, view: &mut ListView, ids: &[EntryId], edit: impl Fn(&mut Vec<String>)) -> Outbox {
        let mut out = Outbox::default();
        for id in ids {
            if view.busy.contains(id) {
                trace!(%id, "Skipping busy entry");
                continue;
            }
            let Some(entry) = view.model.find_by_id(id) else {
                continue;
            };
            let previous = entry.tags.clone();
            let mut tags = previous.clone();
            edit(&mut tags);
            if tags == previous {
                continue;
            }

            let request = Request::ApplyTags {
                name: join_path(entry.parent_dir(&view.dir), &entry.name),
                tags: tags.clone(),
            };
            view.edit_entry(id, |entry| entry.tags = tags);
            out.events.extend(view.set_busy(id, true));
            self.track(
                &mut out,
                MutationKind::TagApply,
                vec![id.clone()],
                view.generation,
                request,
                Payload::Tags {
                    id: id.clone(),
                    previous,
                },
            );
        }
        if !out.requests.is_empty() {
            out.events.extend(view.refresh());
        }
        out
    }

    pub(super) fn settle_tags(
        &mut self,
        id: &EntryId,
        previous: Vec<String>,
        completion: Completion,
        view: &mut ListView,
        stale: bool,
        out: &mut Outbox,
    ) -> Result<(), MutationError> {
        let result = completion
            .map_err(MutationError::from)
            .and_then(|reply| wire::decode_status(&reply).map_err(MutationError::from));
        if stale {
            return result;
        }
        out.events.extend(view.set_busy(id, false));
        if let Err(e) = &result {
            view.edit_entry(id, |entry| entry.tags = previous);
            self.notify(out, e.user_message("Could not apply tag"));
            out.events.extend(view.refresh());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Reply, TransportError};
    use crate::events::{SessionEvent, Settlement};
    use crate::testing::loaded;
    use serde_json::json;

    fn tags_of(view: &ListView, id: &str) -> Vec<String> {
        view.model.find_by_id(&id.into()).unwrap().tags.clone()
    }

    #[test]
    fn test_tag_validation() {
        let (mut coordinator, mut view) = loaded();
        assert_eq!(
            coordinator.add_tag(&mut view, &["2".into()], "  ").unwrap_err(),
            ValidationError::EmptyTag
        );
        assert_eq!(
            coordinator.add_tag(&mut view, &["2".into()], "ab").unwrap_err(),
            ValidationError::TagTooShort { min: 3 }
        );
        assert_eq!(
            coordinator.add_tag(&mut view, &[], "abc").unwrap_err(),
            ValidationError::NothingSelected
        );
    }

    #[test]
    fn test_single_entry_existing_tag_needs_confirmation() {
        let (mut coordinator, mut view) = loaded();
        let err = coordinator
            .add_tag(&mut view, &["3".into()], "work")
            .unwrap_err();
        let ValidationError::TagMergeConflict { token, .. } = err else {
            panic!("expected a merge conflict, got {err:?}");
        };
        assert_eq!(coordinator.pending_count(), 0);
        assert_eq!(tags_of(&view, "3"), ["work"]);

        // Confirmed merge on a single entry is a no-op
        let out = coordinator.confirm_merge(&mut view, token).unwrap();
        assert!(out.requests.is_empty());
        assert_eq!(tags_of(&view, "3"), ["work"]);

        assert_eq!(
            coordinator.confirm_merge(&mut view, token).unwrap_err(),
            ValidationError::UnknownMerge(token)
        );
    }

    #[test]
    fn test_multi_entry_merge_applies_only_where_missing() {
        let (mut coordinator, mut view) = loaded();
        let err = coordinator
            .add_tag(&mut view, &["2".into(), "3".into(), "4".into()], "work")
            .unwrap_err();
        let ValidationError::TagMergeConflict { token, .. } = err else {
            panic!("expected a merge conflict, got {err:?}");
        };

        let out = coordinator.confirm_merge(&mut view, token).unwrap();
        assert_eq!(out.requests.len(), 2);
        assert_eq!(tags_of(&view, "2"), ["work"]);
        assert_eq!(tags_of(&view, "3"), ["work"]);
    }

    #[test]
    fn test_cancel_merge() {
        let (mut coordinator, mut view) = loaded();
        let Err(ValidationError::TagMergeConflict { token, .. }) =
            coordinator.add_tag(&mut view, &["3".into()], "work")
        else {
            panic!("expected a merge conflict");
        };
        assert!(coordinator.cancel_merge(token));
        assert!(!coordinator.cancel_merge(token));
    }

    #[test]
    fn test_rejected_target_keeps_previous_tags() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator
            .add_tag(&mut view, &["2".into(), "4".into()], "urgent")
            .unwrap();
        let tickets = out.tickets();
        assert_eq!(tags_of(&view, "2"), ["urgent"]);

        let reply = Reply::new(404, json!({ "data": "Tag policy violation" }));
        let rejected = coordinator.settle(tickets[0], Ok(reply), &mut view).unwrap();
        coordinator
            .settle(tickets[1], Ok(Reply::success(json!({}))), &mut view)
            .unwrap();

        assert!(tags_of(&view, "2").is_empty());
        assert_eq!(tags_of(&view, "4"), ["urgent"]);
        let reason = rejected.events.iter().find_map(|e| match e {
            SessionEvent::MutationSettled {
                settlement: Settlement::RolledBack(err),
                ..
            } => Some(err.to_string()),
            _ => None,
        });
        assert_eq!(reason.as_deref(), Some("Tag policy violation"));
    }

    #[test]
    fn test_apply_request_carries_full_tag_set() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator
            .add_tag(&mut view, &["3".into()], "urgent")
            .unwrap();
        assert_eq!(
            out.requests[0].1,
            Request::ApplyTags {
                name: "/docs/b.txt".into(),
                tags: vec!["work".into(), "urgent".into()],
            }
        );
    }

    #[test]
    fn test_rename_tag() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator
            .rename_tag(&mut view, &["2".into(), "3".into()], "work", "office")
            .unwrap();

        assert_eq!(out.requests.len(), 1);
        assert_eq!(tags_of(&view, "3"), ["office"]);
        assert!(tags_of(&view, "2").is_empty());
    }

    #[test]
    fn test_rename_tag_collision_needs_confirmation() {
        let (mut coordinator, mut view) = loaded();
        view.model
            .update(&"3".into(), |e| e.tags = vec!["work".into(), "office".into()]);

        let err = coordinator
            .rename_tag(&mut view, &["3".into()], "work", "office")
            .unwrap_err();
        let ValidationError::TagMergeConflict { token, tag } = err else {
            panic!("expected a merge conflict, got {err:?}");
        };
        assert_eq!(tag, "office");

        coordinator.confirm_merge(&mut view, token).unwrap();
        assert_eq!(tags_of(&view, "3"), ["office"]);
    }

    #[test]
    fn test_plain_ok_reply_commits() {
        let (mut coordinator, mut view) = loaded();
        let out = coordinator
            .add_tag(&mut view, &["2".into()], "urgent")
            .unwrap();

        let reply = Reply::new(200, json!({ "data": ["urgent"] }));
        let settled = coordinator
            .settle(out.first_ticket().unwrap(), Ok(reply), &mut view)
            .unwrap();

        assert_eq!(tags_of(&view, "2"), ["urgent"]);
        assert!(settled.events.iter().any(|e| matches!(
            e,
            SessionEvent::MutationSettled {
                settlement: Settlement::Committed,
                ..
            }
        )));
    }

    #[test]
    fn test_entry_with_tag_request_in_flight_is_skipped() {
        let (mut coordinator, mut view) = loaded();
        let first = coordinator
            .add_tag(&mut view, &["2".into()], "aaa")
            .unwrap();
        assert!(view.busy.contains(&"2".into()));

        let second = coordinator
            .add_tag(&mut view, &["2".into(), "4".into()], "bbb")
            .unwrap();
        assert_eq!(second.requests.len(), 1);
        assert_eq!(tags_of(&view, "2"), ["aaa"]);

        coordinator
            .settle(first.first_ticket().unwrap(), Err(TransportError::Aborted), &mut view)
            .unwrap();
        assert!(tags_of(&view, "2").is_empty());
        assert!(!view.busy.contains(&"2".into()));
        assert_eq!(tags_of(&view, "4"), ["bbb"]);
    }

    #[test]
    fn test_hidden_entry_cannot_be_tagged() {
        let (mut coordinator, mut view) = loaded();
        coordinator.delete(&mut view, &["2".into()]).unwrap();

        assert_eq!(
            coordinator.add_tag(&mut view, &["2".into()], "urgent").unwrap_err(),
            ValidationError::UnknownEntry("2".into())
        );
    }
}
