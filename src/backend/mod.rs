//! Remote store contract
//!
//! The session never performs I/O itself. It hands each [`Request`] to a host-supplied
//! [`Backend`] together with a [`RequestId`] ticket and returns immediately; the host
//! later feeds the outcome back through `DirectorySession::complete` as a
//! [`Completion`]. Cancelling a ticket asks the host to abort the request; a
//! completion for a cancelled ticket is ignored either way.
//!
//! - `error`: Transport failures and server rejections
//! - `wire`: Reply envelope decoding and typed payloads
//! - `mock`: A backend that records traffic, for tests

pub mod error;
pub mod mock;
pub mod wire;

pub use error::{Rejection, ReplyError, TransportError};
pub use mock::RecordingBackend;
pub use wire::{FolderInfo, Listing, Renamed};

use crate::entry::EntryId;
use crate::sort::{SortDirection, SortKey};
use serde_json::{Value, json};
use std::fmt;

/// Ticket identifying one dispatched request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub dir: String,
    pub dir_id: Option<EntryId>,
    pub sort: SortKey,
    pub direction: SortDirection,
    /// Deployment specific view scope (e.g. a favorites or shared-with-me view)
    pub view_scope: Option<String>,
}

/// What a delete call targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTargets {
    /// Named entries of the directory
    Files(Vec<String>),
    /// Everything in the directory
    AllFiles,
    /// Entries of a shared root, addressed by id
    SharedIds(Vec<EntryId>),
}

/// One call against the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ListDirectory(ListRequest),
    Rename {
        dir: String,
        file: String,
        new_name: String,
    },
    Move {
        dir: String,
        file: String,
        target: String,
    },
    Copy {
        dir: String,
        file: String,
        target: String,
    },
    Delete {
        dir: String,
        targets: DeleteTargets,
    },
    Undelete {
        dir: String,
        files: Vec<String>,
    },
    ApplyTags {
        /// Path of the tagged entry
        name: String,
        /// Complete tag set to store
        tags: Vec<String>,
    },
}

impl Request {
    /// Short operation name, as used in logs and endpoint routing
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::ListDirectory(_) => "list",
            Self::Rename { .. } => "rename",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Delete { .. } => "delete",
            Self::Undelete { .. } => "undelete",
            Self::ApplyTags { .. } => "tags",
        }
    }

    /// Request parameters in the shape the endpoints expect
    #[must_use]
    pub fn to_params(&self) -> Value {
        match self {
            Self::ListDirectory(list) => json!({
                "dir": list.dir,
                "id": list.dir_id,
                "sort": list.sort.to_string(),
                "sortdirection": list.direction.to_string(),
                "view": list.view_scope,
            }),
            Self::Rename {
                dir,
                file,
                new_name,
            } => json!({ "dir": dir, "file": file, "newname": new_name }),
            Self::Move { dir, file, target } | Self::Copy { dir, file, target } => {
                json!({ "dir": dir, "file": file, "target": target })
            }
            Self::Delete { dir, targets } => match targets {
                DeleteTargets::Files(files) => json!({ "dir": dir, "files": files }),
                DeleteTargets::AllFiles => json!({ "dir": dir, "allfiles": true }),
                DeleteTargets::SharedIds(ids) => json!({ "dir": dir, "ids": ids }),
            },
            Self::Undelete { dir, files } => json!({ "dir": dir, "files": files }),
            Self::ApplyTags { name, tags } => json!({ "name": name, "tags": tags }),
        }
    }
}

/// Raw reply as received by the host
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub http_status: u16,
    pub body: Value,
}

impl Reply {
    #[must_use]
    pub const fn new(http_status: u16, body: Value) -> Self {
        Self { http_status, body }
    }

    /// HTTP 200 reply
    #[must_use]
    pub const fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// HTTP 200 `{"status":"success","data":...}` reply
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self::ok(json!({ "status": "success", "data": data }))
    }

    /// HTTP 200 `{"status":"error"}` reply with a message and optional code
    #[must_use]
    pub fn error(message: &str, code: Option<&str>) -> Self {
        Self::ok(json!({
            "status": "error",
            "data": { "message": message, "code": code },
        }))
    }
}

/// Outcome the host reports for a ticket
pub type Completion = Result<Reply, TransportError>;

/// Host side of the remote store
///
/// Implementations must not call back into the session from `send`; completions
/// are delivered later from the host's event loop.
pub trait Backend {
    /// Dispatch `request` under ticket `id`
    fn send(&mut self, id: RequestId, request: Request);

    /// Abort the request with ticket `id`, if still running
    fn cancel(&mut self, id: RequestId);
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn send(&mut self, id: RequestId, request: Request) {
        (**self).send(id, request);
    }

    fn cancel(&mut self, id: RequestId) {
        (**self).cancel(id);
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn send(&mut self, id: RequestId, request: Request) {
        (**self).send(id, request);
    }

    fn cancel(&mut self, id: RequestId) {
        (**self).cancel(id);
    }
}
