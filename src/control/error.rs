//! Errors from the control-plane policy query.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Any failure to obtain the project map.
///
/// Every variant means the same thing to the gateway: no policy, so deny.
/// The display text is the human-readable cause written to the audit log.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The Unix socket could not be connected.
    #[error("connection to control plane at {socket} failed: {source}")]
    Connect {
        /// Socket that was dialled.
        socket: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The HTTP exchange failed.
    #[error("HTTP error talking to control plane: {0}")]
    Http(#[from] hyper::Error),

    /// The request could not be built.
    #[error("invalid control-plane request: {0}")]
    Request(#[from] hyper::http::Error),

    /// The control plane answered with a non-success status.
    #[error("control plane returned HTTP status {0}")]
    Status(u16),

    /// The response body exceeded the configured bound.
    #[error("control-plane response exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit.
        limit: usize,
    },

    /// The response body could not be read.
    #[error("failed to read control-plane response: {0}")]
    Body(String),

    /// The response did not match the project map schema.
    #[error("malformed control-plane response: {0}")]
    Schema(String),

    /// The exchange did not complete in time.
    #[error("control plane did not answer within {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The I/O runtime for the exchange could not be started.
    #[error("failed to start I/O runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_mentions_cause() {
        let err = FetchError::Connect {
            socket: PathBuf::from("/run/cpmd.sock"),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let text = err.to_string().to_lowercase();
        assert!(text.contains("/run/cpmd.sock"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_timeout_display() {
        let err = FetchError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "control plane did not answer within 250 ms");
    }
}
