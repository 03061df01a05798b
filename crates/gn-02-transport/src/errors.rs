//! Transport error types.

use gn_01_query_protocol::{CodecError, CorrelationId, ProtocolMisuseError};
use std::time::Duration;
use thiserror::Error;

/// Failure to establish a connection. Reported, never panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("invalid host: {0:?} (expected hostname or IPv4)")]
    InvalidHost(String),

    #[error("invalid port: {0} (expected 1024-65535)")]
    InvalidPort(u16),

    #[error("connection to {addr} refused: {reason}")]
    Refused { addr: String, reason: String },

    #[error("connection to {addr} timed out after {timeout:?}")]
    TimedOut { addr: String, timeout: Duration },
}

/// Failure of one correlated call. The caller decides whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection dropped while the call was in flight.
    #[error("connection lost")]
    ConnectionLost,

    /// No response within the bounded wait.
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),

    /// Drained by a local disconnect.
    #[error("request cancelled by disconnect")]
    Cancelled,

    /// The transport was already closed when the call started.
    #[error("not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("duplicate correlation id {0}")]
    DuplicateCorrelation(CorrelationId),

    #[error(transparent)]
    Misuse(#[from] ProtocolMisuseError),
}

impl TransportError {
    /// Worth retrying on the same or a fresh connection.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionLost | TransportError::TimedOut(_)
        )
    }
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        if e.is_fatal() {
            TransportError::SendFailed(e.to_string())
        } else {
            TransportError::Codec(e.to_string())
        }
    }
}
