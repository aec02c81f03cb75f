//! Typed errors for the recording side of the daemon.
//!
//! - `BackendError`: transport and protocol failures talking to the recorder
//! - `RecorderError`: coordinator-level failures surfaced to phase handlers

use std::time::Duration;
use thiserror::Error;

/// Failures of the recording backend connection or one of its requests.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("Authentication rejected by {address}")]
    AuthRejected { address: String },

    #[error("Recording backend connection is closed")]
    Closed,

    #[error("Request {request} failed with code {code}{}", comment_suffix(.comment))]
    Request {
        request: String,
        code: u16,
        comment: Option<String>,
    },

    #[error("Request {request} timed out after {timeout:?}")]
    Timeout { request: String, timeout: Duration },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures surfaced by the recording coordinator.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Recording did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn comment_suffix(comment: &Option<String>) -> String {
    match comment {
        Some(c) if !c.is_empty() => format!(" ({c})"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_includes_comment_when_present() {
        let err = BackendError::Request {
            request: "StopRecord".into(),
            code: 501,
            comment: Some("Output not active".into()),
        };
        assert_eq!(err.to_string(), "Request StopRecord failed with code 501 (Output not active)");
    }

    #[test]
    fn request_error_omits_empty_comment() {
        let err = BackendError::Request { request: "StartRecord".into(), code: 500, comment: None };
        assert_eq!(err.to_string(), "Request StartRecord failed with code 500");
    }

    #[test]
    fn backend_error_converts_into_recorder_error() {
        let err: RecorderError = BackendError::Closed.into();
        assert!(matches!(err, RecorderError::Backend(BackendError::Closed)));
        assert_eq!(err.to_string(), "Recording backend connection is closed");
    }
}
