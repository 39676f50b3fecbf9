use crate::port::PortError;
use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Unified bridge error type.
///
/// Only [`BridgeError::PromptTimeout`], [`BridgeError::WriteFault`] and
/// [`BridgeError::SessionClosed`] reach callers of the command API. The
/// other variants describe failures that the session turns into console
/// diagnostics; they are still returned by
/// [`SessionManager::try_open`](crate::SessionManager::try_open) for callers
/// that want the value instead of a boolean.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Serial ports are not available on this platform")]
    CapabilityUnavailable,

    #[error("Failed to connect to the serial port: {0}")]
    ConnectionFailure(#[source] PortError),

    #[error("A serial port is already connected. Close it before opening another.")]
    AlreadyConnected,

    #[error("The device closed the stream")]
    StreamClosed,

    #[error("Error while reading from the serial port: {0}")]
    ReadFault(#[source] PortError),

    #[error("Error while writing to the serial port: {0}")]
    WriteFault(#[source] PortError),

    #[error("No prompt received within {0:?}")]
    PromptTimeout(Duration),

    /// The session was closed while a write or a prompt wait was in flight.
    #[error("The session was closed")]
    SessionClosed,

    #[error("Invalid session settings: {0}")]
    InvalidSettings(String),
}

impl BridgeError {
    /// Whether this is a prompt timeout, the one failure a caller is expected to handle.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::PromptTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = BridgeError::PromptTimeout(Duration::from_millis(200));
        assert!(err.to_string().contains("200ms"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_connection_failure_keeps_source() {
        let err = BridgeError::ConnectionFailure(PortError::denied("user cancelled"));
        assert!(err.to_string().contains("user cancelled"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_timeout());
    }
}
