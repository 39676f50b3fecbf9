//! Port-specific error types.
//!
//! Defines error types for the transport contract, separate from the
//! session-level [`BridgeError`](crate::error::BridgeError) so transports
//! stay independent of how the bridge reports failures.

use thiserror::Error;

/// Errors that can occur while talking to a serial transport.
#[derive(Debug, Error)]
pub enum PortError {
    /// The host platform has no serial support at all.
    #[error("Serial ports are not available on this platform")]
    Unavailable,

    /// The port request was refused (user cancelled the picker, no port selected, ...).
    #[error("Port request denied: {0}")]
    Denied(String),

    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// Attempted to use a port that's not open.
    #[error("Port is not open")]
    NotOpen,

    /// Attempted to open a port that's already open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// The reader or writer of the port is already held by someone else.
    #[error("The {0} side of the port is already locked")]
    LockHeld(&'static str),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a Denied error from a reason.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied(reason.into())
    }

    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
