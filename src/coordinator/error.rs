//! Mutation error types
//!
//! # Error Types
//!
//! - **`ValidationError`**: Rejected locally before any request is sent (bad name,
//!   bad tag, name collision, tag merge conflict, missing permission)
//! - **`MutationError`**: Why a dispatched mutation was rolled back (transport
//!   failure or server rejection), or why it never left (validation)
//! - **`FatalSessionError`**: A listing reply that invalidates the whole session;
//!   the host must redirect or reload

use crate::backend::{Rejection, ReplyError, TransportError};
use crate::entry::{EntryId, NameError};
use std::fmt;
use thiserror::Error;

/// Handle for a tag merge awaiting user confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeToken(pub(crate) u64);

impl fmt::Display for MergeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge#{}", self.0)
    }
}

/// Local rejection of a user action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The naming policy refused the name
    #[error(transparent)]
    InvalidName(#[from] NameError),

    /// Another visible entry already uses the name
    #[error("{name} already exists")]
    NameCollision { name: String },

    #[error("Tag cannot be empty")]
    EmptyTag,

    #[error("Tag must be at least {min} characters long")]
    TagTooShort { min: usize },

    /// The tag already exists on the target(s); confirm with the token to merge
    #[error("Tag \"{tag}\" already exists")]
    TagMergeConflict { tag: String, token: MergeToken },

    #[error("Unknown or expired merge request {0}")]
    UnknownMerge(MergeToken),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("No entry with id {0}")]
    UnknownEntry(EntryId),

    #[error("Entry {0} has a request in flight")]
    Busy(EntryId),

    #[error("Nothing selected")]
    NothingSelected,

    #[error("Nothing to undo")]
    NothingToUndo,
}

/// Why a mutation did not commit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Rejected(#[from] Rejection),
}

impl From<ReplyError> for MutationError {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::Transport(e) => Self::Transport(e),
            ReplyError::Rejected(r) => Self::Rejected(r),
        }
    }
}

impl MutationError {
    /// Text for a user notification, preferring the server's own message
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Rejected(rejection) => rejection.message_or(fallback).to_string(),
            Self::Validation(e) => e.to_string(),
            Self::Transport(_) => fallback.to_string(),
        }
    }

    /// Server error code, if the server supplied one
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected(rejection) => rejection.code.as_deref(),
            _ => None,
        }
    }
}

/// Listing failure that cannot be handled inside the session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalSessionError {
    /// Authentication missing or expired (`authentication_error`, `token_expired`)
    #[error("Session is no longer authenticated ({code})")]
    Unauthenticated { code: String },

    /// The application is disabled for this user (`application_not_enabled`)
    #[error("Application is not enabled")]
    ApplicationDisabled,
}

impl FatalSessionError {
    /// Classify a listing error code
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "authentication_error" | "token_expired" => Some(Self::Unauthenticated {
                code: code.to_string(),
            }),
            "application_not_enabled" => Some(Self::ApplicationDisabled),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
