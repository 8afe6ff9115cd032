//! Unit tests for backend error types

#[cfg(test)]
mod tests {
    use crate::backend::error::{Rejection, ReplyError, TransportError};

    fn rejection(message: Option<&str>, code: Option<&str>) -> Rejection {
        Rejection {
            http_status: 200,
            message: message.map(str::to_string),
            code: code.map(str::to_string),
        }
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Aborted.to_string(), "Request was aborted");
        assert_eq!(
            TransportError::Status(502).to_string(),
            "Request failed with HTTP status 502"
        );
        assert_eq!(
            TransportError::TimedOut { secs: 30 }.to_string(),
            "Request timed out after 30 seconds"
        );
    }

    #[test]
    fn test_malformed_from_serde_json() {
        let err = serde_json::from_str::<u32>("{").unwrap_err();
        let transport: TransportError = err.into();
        assert!(matches!(transport, TransportError::Malformed(_)));
        assert!(transport.to_string().starts_with("Malformed server response"));
    }

    #[test]
    fn test_rejection_display_prefers_server_message() {
        assert_eq!(
            rejection(Some("Target already exists"), Some("exists")).to_string(),
            "Target already exists"
        );
        assert_eq!(
            rejection(None, Some("sourcenotfound")).to_string(),
            "Server rejected the request (sourcenotfound)"
        );
        assert_eq!(
            rejection(None, None).to_string(),
            "Server rejected the request (HTTP 200)"
        );
    }

    #[test]
    fn test_rejection_helpers() {
        let r = rejection(None, Some("sourcenotfound"));
        assert!(r.has_code("sourcenotfound"));
        assert!(!r.is_not_found());
        assert_eq!(r.message_or("Error moving file."), "Error moving file.");
    }

    #[test]
    fn test_reply_error_is_transparent() {
        let err: ReplyError = TransportError::Aborted.into();
        assert_eq!(err.to_string(), "Request was aborted");

        let err: ReplyError = rejection(Some("nope"), None).into();
        assert_eq!(err.to_string(), "nope");
    }
}
