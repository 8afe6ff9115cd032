//! Dirview - entry-list state engine for remote file browsers
//!
//! This library keeps the client-side state of one directory view consistent while
//! the user sorts, filters, pages, selects and mutates entries stored on a remote
//! server. Mutations are applied optimistically and rolled back when the server
//! refuses them. All network traffic goes through a host-supplied
//! [`backend::Backend`]; the crate itself performs no I/O besides reading its
//! configuration file.
//!
//! The usual entry point is [`session::DirectorySession`].

use thiserror::Error;

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod events;
pub mod filter;
pub mod model;
pub mod pagination;
pub mod selection;
pub mod session;
pub mod sort;
pub mod summary;

#[cfg(test)]
pub mod testing;

pub use backend::{Backend, Completion, Reply, Request, RequestId};
pub use config::DirviewConfig;
pub use coordinator::{FatalSessionError, MergeToken, MutationError, ValidationError};
pub use entry::{Entry, EntryId, Permissions};
pub use events::{SessionEvent, SessionObserver};
pub use session::{DirectorySession, RenameSubmission};

/// Error enum, contains all failure states of the library
#[derive(Debug, Error)]
pub enum DirviewError {
    /// A user action was rejected before anything was sent
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    /// A dispatched mutation did not commit
    #[error("Mutation failed: {0}")]
    Mutation(#[from] MutationError),
    /// The session can no longer be used
    #[error("Session error: {0}")]
    Fatal(#[from] FatalSessionError),
    /// Summary bookkeeping went out of balance
    #[error("Summary error: {0}")]
    Summary(#[from] summary::SummaryError),
    /// Represents a configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}
