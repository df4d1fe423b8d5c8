//! Error types for ddp
//!
//! A DDP client reports very few failures back to the caller that issued an
//! operation. Transport problems and server-side method failures travel
//! through the observer channel as events (see [`crate::ClientEvent`]); what
//! remains here is the small set of conditions a caller can act on directly:
//!
//! - **Construction**: the server address could not be turned into a URI
//! - **Lifecycle**: an operation that is invalid in the current connection state
//! - **Encoding**: a frame could not be serialized or inbound text parsed
//! - **Correlation**: an id-based unsubscribe named an unknown subscription
//!
//! # Examples
//!
//! ```rust
//! use ddp_core::{CorrelationId, Error};
//!
//! let error = Error::UnknownSubscription(CorrelationId::new(7));
//! assert_eq!(error.to_string(), "Unknown subscription: 7");
//! ```

use crate::types::CorrelationId;
use thiserror::Error;

/// Result type for ddp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for ddp operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The server address is malformed
    ///
    /// Raised synchronously while building a client; fatal to that
    /// construction attempt only.
    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    /// An outbound frame could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Inbound text is not a JSON object the parsed view understands
    #[error("Parse error: {0}")]
    Parse(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The operation is not valid in the current connection state
    ///
    /// The transport underneath a connection cannot be reopened, so calling
    /// `connect()` twice on one client lands here.
    #[error("Invalid connection state: {0}")]
    InvalidState(String),

    /// Connection was closed
    ///
    /// The connection reached its terminal state; frames can no longer be
    /// written to it.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The id does not belong to a registered subscription
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(CorrelationId),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::InvalidAddress("empty host".into()).to_string(),
            "Invalid server address: empty host"
        );
        assert_eq!(Error::ConnectionClosed.to_string(), "Connection closed");
        assert_eq!(
            Error::InvalidState("already connecting".into()).to_string(),
            "Invalid connection state: already connecting"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let converted: Error = err.into();
        assert!(matches!(converted, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_clone() {
        let error = Error::WebSocket("reset".into());
        assert_eq!(error.clone(), error);
    }
}
