//! Error types for the advisory server.

use std::net::SocketAddr;
use std::time::Duration;

use notam_proto::{FrameError, MessageError};
use thiserror::Error;

/// Errors that can occur in the advisory server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// The peer sent bytes that do not form a valid packet.
    #[error("invalid packet: {0}")]
    Frame(FrameError),

    /// The payload could not be interpreted.
    #[error("invalid message: {0}")]
    Message(#[from] MessageError),

    /// A sequence number was reused within one session.
    #[error("duplicate sequence number {0}")]
    DuplicateSequence(u64),

    /// A message arrived that is not valid in the current session state.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The registry refused the client.
    #[error("admission denied: {0}")]
    AdmissionDenied(String),

    /// Transport error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was silent for too long.
    #[error("session idle for {0:?}")]
    IdleTimeout(Duration),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Whether this error means the peer broke the wire protocol.
    ///
    /// Protocol errors are reported to the peer as `ERROR: ...` before the
    /// connection is closed.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Frame(_) | Self::Message(_) | Self::DuplicateSequence(_) | Self::Protocol(_)
        )
    }
}

impl From<FrameError> for ServerError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => Self::Io(e),
            other => Self::Frame(other),
        }
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
