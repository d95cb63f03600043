//! Error types for the request and stream clients.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur during a plain JSON request.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API fetch failed with HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while consuming a server-push event stream.
///
/// The transport branches on the variant: [`StreamError::Fatal`] ends the
/// stream, everything else is handed to the error callback and followed by a
/// reconnect.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Transient failure; reconnecting is expected to succeed.
    #[error("Retriable stream error: {reason}")]
    Retriable { reason: String },

    /// Permanent failure; the stream must not be retried.
    #[error("Fatal stream error: {detail}")]
    Fatal { detail: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stream task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// No Tokio runtime to run the stream on.
    #[error("Stream not started: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

impl StreamError {
    pub fn retriable(reason: impl Into<String>) -> Self {
        Self::Retriable {
            reason: reason.into(),
        }
    }

    pub fn fatal(detail: impl Into<String>) -> Self {
        Self::Fatal {
            detail: detail.into(),
        }
    }

    /// Whether the transport must stop instead of reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StreamError::Fatal { .. }
                | StreamError::InvalidArgument(_)
                | StreamError::Task(_)
                | StreamError::Runtime(_)
        )
    }

    pub fn is_retriable(&self) -> bool {
        !self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(StreamError::fatal("boom").is_fatal());
        assert!(!StreamError::retriable("later").is_fatal());
        assert!(StreamError::InvalidArgument("url".to_string()).is_fatal());

        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(StreamError::from(parse).is_retriable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StreamError::fatal("boom").to_string(),
            "Fatal stream error: boom"
        );

        let err = ClientError::Status {
            status: StatusCode::NOT_FOUND,
            body: "missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API fetch failed with HTTP 404 Not Found: missing"
        );
    }
}
