//! Recording backend for testing

use super::{Backend, Request, RequestId};

/// Backend that records every dispatched request and cancellation
///
/// Nothing is ever sent anywhere; tests inspect the log and answer tickets by
/// calling `DirectorySession::complete` themselves.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    /// Dispatched requests, in order
    pub sent: Vec<(RequestId, Request)>,
    /// Cancelled tickets, in order
    pub cancelled: Vec<RequestId>,
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently dispatched request
    #[must_use]
    pub fn last(&self) -> Option<&(RequestId, Request)> {
        self.sent.last()
    }

    /// Ticket of the most recent request with the given operation name
    #[must_use]
    pub fn last_id_of(&self, operation: &str) -> Option<RequestId> {
        self.sent
            .iter()
            .rev()
            .find(|(_, request)| request.operation() == operation)
            .map(|(id, _)| *id)
    }

    /// All requests with the given operation name
    pub fn of<'a>(&'a self, operation: &'a str) -> impl Iterator<Item = &'a (RequestId, Request)> {
        self.sent
            .iter()
            .filter(move |(_, request)| request.operation() == operation)
    }

    /// Number of requests with the given operation name
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        self.of(operation).count()
    }

    #[must_use]
    pub fn was_cancelled(&self, id: RequestId) -> bool {
        self.cancelled.contains(&id)
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.sent.clear();
        self.cancelled.clear();
    }
}

impl Backend for RecordingBackend {
    fn send(&mut self, id: RequestId, request: Request) {
        self.sent.push((id, request));
    }

    fn cancel(&mut self, id: RequestId) {
        self.cancelled.push(id);
    }
}
