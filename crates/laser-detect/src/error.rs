//! Error types for device discovery

use thiserror::Error;

/// Errors that can occur during discovery
///
/// Finding zero devices is not an error; only a failing enumeration is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),
}
