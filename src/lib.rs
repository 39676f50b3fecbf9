//! Serial REPL Bridge Library
//!
//! A text console bridge to devices that speak a line-based interactive
//! prompt over a serial link, such as a MicroPython board. The bridge owns
//! one serial session at a time, logs everything sent and received, and lets
//! callers send a command and wait until the device prints its prompt again.
//!
//! # Modules
//!
//! - `port`: transport contract, tokio-serial backend and a scripted mock device
//! - `session`: the session manager (open/close)
//! - `receive`: background receive loop and UTF-8 reassembly
//! - `prompt`: prompt detection and the prompt wait
//! - `dispatch`: send, batch send and soft reset
//! - `logs`: console/sent/received logs with subscribers
//! - `config`: configuration management with TOML support
//! - `telemetry`: tracing subscriber setup
//! - `error`: unified error handling

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logs;
pub mod port;
pub mod prompt;
pub mod receive;
pub mod session;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use dispatch::{CTRL_C, CTRL_D};
pub use error::{BridgeError, BridgeResult};
pub use logs::{LogChannel, LogKind, LogSink, SubscriptionId};
pub use port::{
    MockDevice, MockPlatform, PortConfiguration, PortError, PortReader, PortWriter, ReadChunk,
    SerialPlatform, SerialTransport, DEFAULT_BAUD_RATE,
};
pub use prompt::{PromptMatcher, PromptSignal, PromptWaiter};
pub use session::{SessionInfo, SessionManager, SessionSettings};

#[cfg(feature = "async-serial")]
pub use port::NativePlatform;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
