//! Error types for the link engine

use std::io;

use laser_detect::DetectError;
use laser_protocol::ProtocolError;
use thiserror::Error;

/// Why a command could not run against the connection
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// No connection is open
    #[error("not connected")]
    NotConnected,

    /// The connection was closed by a disconnect while the command waited
    #[error("connection closed by disconnect")]
    Disconnected,

    /// The connection was replaced by a new connect while the command waited
    #[error("connection replaced")]
    Replaced,

    /// The transport failed while the command waited
    #[error("connection lost")]
    ConnectionLost,

    /// The link engine task has stopped
    #[error("link engine stopped")]
    Stopped,
}

/// Errors returned by link operations
#[derive(Debug, Error)]
pub enum LinkError {
    /// Failed to open the transport
    #[error("failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to write a command frame
    #[error("failed to write {command}: {source}")]
    WriteFailed {
        command: &'static str,
        #[source]
        source: io::Error,
    },

    /// Device name not present in the current enumeration
    #[error("device not found: {0}")]
    NotFound(String),

    /// Deadline elapsed before the reply arrived
    #[error("{command} timed out")]
    Timeout { command: &'static str },

    /// Framing or reply length error
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Command attempted without a usable connection
    #[error("invalid state: {0}")]
    State(#[from] StateError),

    /// Device enumeration failed
    #[error("discovery failed: {0}")]
    Discovery(#[from] DetectError),
}

/// Error taxonomy shared with adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Open, write or read failure at the transport
    Connection,
    /// Symbolic name does not resolve to a present device
    NotFound,
    /// Deadline elapsed awaiting a response
    Timeout,
    /// Argument or response length mismatch
    Protocol,
    /// Disconnected, or connection dropped mid-call
    State,
    /// Device enumeration failed
    Io,
}

/// Status codes for RPC adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Unavailable,
    NotFound,
    DeadlineExceeded,
    InvalidArgument,
    FailedPrecondition,
    Internal,
}

impl LinkError {
    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::OpenFailed { .. } | LinkError::WriteFailed { .. } => ErrorKind::Connection,
            LinkError::NotFound(_) => ErrorKind::NotFound,
            LinkError::Timeout { .. } => ErrorKind::Timeout,
            LinkError::Protocol(_) => ErrorKind::Protocol,
            LinkError::State(_) => ErrorKind::State,
            LinkError::Discovery(_) => ErrorKind::Io,
        }
    }

    /// Status code an RPC adapter should report
    pub fn status_code(&self) -> StatusCode {
        match self {
            LinkError::OpenFailed { .. } | LinkError::WriteFailed { .. } => StatusCode::Unavailable,
            LinkError::NotFound(_) => StatusCode::NotFound,
            LinkError::Timeout { .. } => StatusCode::DeadlineExceeded,
            LinkError::Protocol(ProtocolError::ArgumentLength { .. })
            | LinkError::Protocol(ProtocolError::ValueOutOfRange { .. }) => {
                StatusCode::InvalidArgument
            }
            LinkError::Protocol(_) => StatusCode::Internal,
            LinkError::State(_) => StatusCode::FailedPrecondition,
            LinkError::Discovery(_) => StatusCode::Internal,
        }
    }

    /// Whether this is the given state error
    pub fn is_state(&self, state: StateError) -> bool {
        matches!(self, LinkError::State(s) if *s == state)
    }
}
