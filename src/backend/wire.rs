//! Reply envelopes and typed payloads
//!
//! Every endpoint answers with the same envelope:
//!
//! ```json
//! { "status": "success", "data": { ... } }
//! { "status": "error", "data": { "message": "...", "code": "..." } }
//! ```
//!
//! The tag endpoint is the exception: it reports its outcome through the HTTP status
//! alone (see [`decode_status`]), and a 404 carries the rejection reason directly in
//! `data`, either as a string or as a `{ "message": ... }` object. Listing errors name
//! their code in `data.error` rather than `data.code`.

use super::error::{Rejection, ReplyError, TransportError};
use super::Reply;
use crate::entry::{Entry, EntryId, MountKind, Permissions};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Value,
}

/// Decode `reply` into the success payload `T`
///
/// # Errors
///
/// - `ReplyError::Rejected` when the envelope reports an error or the HTTP status is
///   a client/server error with a readable body
/// - `ReplyError::Transport` with `Status` for an error status without a readable
///   body, or `Malformed` when a success payload does not decode as `T`
pub fn decode<T: DeserializeOwned>(reply: &Reply) -> Result<T, ReplyError> {
    let envelope: Envelope = match serde_json::from_value(reply.body.clone()) {
        Ok(envelope) => envelope,
        Err(_) if reply.http_status >= 400 => {
            return Err(TransportError::Status(reply.http_status).into());
        }
        Err(e) => return Err(TransportError::from(e).into()),
    };

    if reply.http_status < 400 && envelope.status == "success" {
        return serde_json::from_value(envelope.data)
            .map_err(|e| TransportError::from(e).into());
    }

    if envelope.status.is_empty() && envelope.data.is_null() && reply.http_status >= 400 {
        return Err(TransportError::Status(reply.http_status).into());
    }

    Err(rejection(reply.http_status, &envelope.data))
}

/// Classify a reply whose HTTP status alone tells success from failure
///
/// Any 2xx commits unless the body is an explicit `"status": "error"` envelope. A
/// 404 is a policy rejection with its reason in `data` (or the bare body).
///
/// # Errors
///
/// - `ReplyError::Rejected` for a 404, an error envelope or another error status
///   with a readable reason
/// - `ReplyError::Transport` with `Status` for an error status without one
pub fn decode_status(reply: &Reply) -> Result<(), ReplyError> {
    let data = reply.body.get("data").unwrap_or(&reply.body);
    let error_envelope = reply.body.get("status").and_then(Value::as_str) == Some("error");
    match reply.http_status {
        200..=299 if !error_envelope => Ok(()),
        200..=299 | 404 => Err(rejection(reply.http_status, data)),
        status if message_of(data).is_some() => Err(rejection(status, data)),
        status => Err(TransportError::Status(status).into()),
    }
}

fn rejection(http_status: u16, data: &Value) -> ReplyError {
    Rejection {
        http_status,
        message: message_of(data),
        code: ["code", "error"]
            .iter()
            .find_map(|key| data.get(key).and_then(Value::as_str))
            .map(str::to_string),
    }
    .into()
}

fn message_of(data: &Value) -> Option<String> {
    match data {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Payload of a directory listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub files: Vec<Entry>,

    /// Metadata of the listed directory itself
    #[serde(default, rename = "currentFolder")]
    pub current_folder: Option<FolderInfo>,

    /// Tags frequently used across the user's storage
    #[serde(default, rename = "popularTags")]
    pub popular_tags: Vec<String>,

    /// What the user may do inside the listed directory
    #[serde(default)]
    pub permissions: Permissions,
}

/// Metadata of the directory being viewed
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FolderInfo {
    #[serde(default)]
    pub id: Option<EntryId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default, rename = "mountType")]
    pub mount: MountKind,
}

/// Server-confirmed identity of a renamed entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Renamed {
    pub id: EntryId,
    pub name: String,
    /// New modification time in epoch milliseconds
    #[serde(default, rename = "mtime", alias = "date")]
    pub modified_ms: Option<i64>,
    #[serde(default)]
    pub etag: Option<String>,
}

impl Renamed {
    /// Fold the confirmed fields into the entry as it was before the rename
    #[must_use]
    pub fn merge_into(self, mut original: Entry) -> Entry {
        original.id = self.id;
        original.name = self.name;
        if let Some(modified_at) = self.modified_ms.and_then(DateTime::<Utc>::from_timestamp_millis) {
            original.modified_at = modified_at;
        }
        if let Some(etag) = self.etag {
            original.etag = etag;
        }
        original
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Reply;
    use crate::testing::file;
    use serde::de::IgnoredAny;
    use serde_json::json;

    #[test]
    fn test_decode_listing() {
        let reply = Reply::ok(json!({
            "status": "success",
            "data": {
                "files": [
                    { "id": 1, "name": "a.txt", "type": "file", "size": 3, "mtime": 0 }
                ],
                "permissions": 31,
                "popularTags": ["work"],
                "currentFolder": { "id": 9, "name": "docs", "tags": ["x"] }
            }
        }));

        let listing: Listing = decode(&reply).unwrap();
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.popular_tags, ["work"]);
        assert_eq!(listing.current_folder.unwrap().id, Some(EntryId::new("9")));
    }

    #[test]
    fn test_decode_error_envelope() {
        let reply = Reply::ok(json!({
            "status": "error",
            "data": { "message": "Could not rename", "code": "sourcenotfound" }
        }));

        let err = decode::<Renamed>(&reply).unwrap_err();
        let ReplyError::Rejected(rejection) = err else {
            panic!("expected a rejection, got {err:?}");
        };
        assert_eq!(rejection.message.as_deref(), Some("Could not rename"));
        assert!(rejection.has_code("sourcenotfound"));
    }

    #[test]
    fn test_decode_tag_rejection_with_string_reason() {
        let reply = Reply::new(404, json!({ "data": "Tag is too long" }));

        let err = decode::<IgnoredAny>(&reply).unwrap_err();
        let ReplyError::Rejected(rejection) = err else {
            panic!("expected a rejection, got {err:?}");
        };
        assert!(rejection.is_not_found());
        assert_eq!(rejection.message.as_deref(), Some("Tag is too long"));
    }

    #[test]
    fn test_decode_malformed_payload() {
        let reply = Reply::ok(json!({ "status": "success", "data": { "files": 3 } }));
        assert!(matches!(
            decode::<Listing>(&reply),
            Err(ReplyError::Transport(TransportError::Malformed(_)))
        ));

        let reply = Reply::ok(json!("not an envelope"));
        assert!(matches!(
            decode::<IgnoredAny>(&reply),
            Err(ReplyError::Transport(TransportError::Malformed(_)))
        ));
    }

    #[test]
    fn test_decode_bare_http_error() {
        let reply = Reply::new(500, Value::Null);
        assert_eq!(
            decode::<IgnoredAny>(&reply).unwrap_err(),
            ReplyError::Transport(TransportError::Status(500))
        );
    }

    #[test]
    fn test_status_decoding_follows_http_status() {
        assert!(decode_status(&Reply::new(200, json!({ "data": ["urgent"] }))).is_ok());
        assert!(decode_status(&Reply::new(200, Value::Null)).is_ok());
        assert!(decode_status(&Reply::success(json!({}))).is_ok());

        let err = decode_status(&Reply::new(404, json!({ "data": "Tag is too long" }))).unwrap_err();
        let ReplyError::Rejected(rejection) = err else {
            panic!("expected a rejection, got {err:?}");
        };
        assert!(rejection.is_not_found());
        assert_eq!(rejection.message.as_deref(), Some("Tag is too long"));

        assert!(matches!(
            decode_status(&Reply::error("Denied", None)),
            Err(ReplyError::Rejected(_))
        ));
        assert_eq!(
            decode_status(&Reply::new(502, Value::Null)).unwrap_err(),
            ReplyError::Transport(TransportError::Status(502))
        );
    }

    #[test]
    fn test_success_without_data() {
        let reply = Reply::ok(json!({ "status": "success" }));
        assert!(decode::<IgnoredAny>(&reply).is_ok());
    }

    #[test]
    fn test_renamed_merge_keeps_other_fields() {
        let original = file("1", "old.txt", 42).with_tags(["work"]);
        let renamed = Renamed {
            id: EntryId::new("1"),
            name: "new.txt".into(),
            modified_ms: Some(1_700_000_000_000),
            etag: None,
        };

        let merged = renamed.merge_into(original);
        assert_eq!(merged.name, "new.txt");
        assert_eq!(merged.size.bytes(), 42);
        assert_eq!(merged.tags, ["work"]);
        assert_eq!(merged.modified_at.timestamp(), 1_700_000_000);
    }
}
