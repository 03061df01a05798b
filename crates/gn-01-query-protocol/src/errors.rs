//! # Error Types
//!
//! Misuse of the message builder and wire codec failures.

use thiserror::Error;

/// The caller set a field that is incompatible with the declared message kind.
///
/// Fatal to the single call being built, never to the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolMisuseError {
    /// A kind-specific field was set before any kind was declared.
    #[error("field `{field}` set before the message kind was declared")]
    KindNotDeclared { field: &'static str },

    /// A field was set that the declared kind does not accept.
    #[error("field `{field}` is not valid for a {kind} message")]
    IncompatibleField { field: &'static str, kind: String },

    /// A second kind was declared on the same message.
    #[error("message kind already declared as {declared}, cannot redeclare as {requested}")]
    KindAlreadyDeclared { declared: String, requested: String },

    /// Mandatory part missing at build time.
    #[error("incomplete message: {0}")]
    Incomplete(&'static str),

    /// A response was merged into a request it does not answer.
    #[error("response {response} does not answer request {request}")]
    CorrelationMismatch { request: String, response: String },

    /// The message already carries a correlation id from an earlier send.
    #[error("message {0} was already sent")]
    AlreadySent(String),

    /// The message cannot be sent through a correlated call.
    #[error("{0} messages cannot be executed as a correlated request")]
    NotExecutable(String),
}

/// Wire framing and decoding failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed message: {0}")]
    Malformed(String),
}

impl CodecError {
    /// Whether the underlying stream is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CodecError::Io(_) | CodecError::FrameTooLarge { .. })
    }
}
