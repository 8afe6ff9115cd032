//! Backend failure types
//!
//! # Error Types
//!
//! - **`TransportError`**: The request never produced a usable reply (network failure,
//!   abort, unparseable body, client-side timeout)
//! - **`Rejection`**: The server answered and refused, with an optional message and code
//! - **`ReplyError`**: Either of the above, as produced by reply decoding

use std::fmt;
use thiserror::Error;

/// A request that failed before a usable reply arrived
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Network level failure reported by the host
    #[error("Request failed: {0}")]
    Failed(String),

    /// Non-success HTTP status without a recognizable body
    #[error("Request failed with HTTP status {0}")]
    Status(u16),

    /// The request was cancelled before completing
    #[error("Request was aborted")]
    Aborted,

    /// The reply body did not have the expected shape
    #[error("Malformed server response: {0}")]
    Malformed(String),

    /// No reply within the configured mutation timeout
    #[error("Request timed out after {secs} seconds")]
    TimedOut { secs: u64 },
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// The server refused a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// HTTP status of the reply
    pub http_status: u16,
    /// Server-authored message, shown verbatim when present
    pub message: Option<String>,
    /// Machine-readable error code (e.g. `sourcenotfound`, `token_expired`)
    pub code: Option<String>,
}

impl Rejection {
    /// Whether the server signalled a missing resource
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        self.http_status == 404
    }

    /// Whether the error code equals `code`
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    /// The server message, or `fallback` when none was sent
    #[must_use]
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(fallback)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.code) {
            (Some(message), _) => f.write_str(message),
            (None, Some(code)) => write!(f, "Server rejected the request ({code})"),
            (None, None) => write!(f, "Server rejected the request (HTTP {})", self.http_status),
        }
    }
}

impl std::error::Error for Rejection {}

/// Failure outcome of a completed request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Rejected(#[from] Rejection),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
