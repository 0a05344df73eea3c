//! Error types for the RPC layer.

use std::time::Duration;

use thiserror::Error;

use super::transport::TransportError;
use crate::protocol::codec::ProtocolError;

/// Failures surfaced to callers of `connect` and `call`.
///
/// Malformed or untrusted inbound traffic never produces an `RpcError`: it is
/// dropped inside the dispatch loop.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No response arrived within the call deadline.  Not retried.
    #[error("call to {action} timed out after {after:?}")]
    Timeout { action: String, after: Duration },

    /// The handshake was not answered within the connect deadline.
    #[error("handshake did not complete within {0:?}")]
    ConnectTimeout(Duration),

    /// The connection was destroyed while the call was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// The remote handler failed and answered with an error response.
    #[error("remote handler for {action} failed: {message}")]
    Remote {
        action: String,
        message: String,
        code: Option<String>,
    },

    /// The message could not be handed to the target window.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A payload could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure returned by a locally registered handler.
///
/// The dispatch loop converts it into an error response; it never escapes
/// to the code that posted the request on this side.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    pub code: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<ProtocolError> for HandlerError {
    fn from(e: ProtocolError) -> Self {
        Self::new(e.to_string()).with_code("invalid_arguments")
    }
}

impl From<RpcError> for HandlerError {
    fn from(e: RpcError) -> Self {
        Self::new(e.to_string())
    }
}
