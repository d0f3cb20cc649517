use thiserror::Error;

/// Errors raised by a chat connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connection failed: {0}")]
    Handshake(String),

    /// The far end hung up, or the connection was closed locally.
    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("encode error: {0}")]
    Encode(String),
}

impl ConnectionError {
    /// Whether this error means the connection is gone for good.
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionError::Closed)
    }
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        ConnectionError::Encode(err.to_string())
    }
}

/// Malformed operator input. Fatal for the input loop only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputFormatError {
    #[error("expected {expected} comma-separated fields, got {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("addressee must not be empty")]
    EmptyAddressee,
}

/// Errors from encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized message shape: {0}")]
    UnrecognizedShape(String),
}
