//! Port abstraction layer for serial communication.
//!
//! Provides the async transport contract, a scripted mock device for tests,
//! and (with the `async-serial` feature) real ports through tokio-serial.

pub mod error;
pub mod mock;
pub mod traits;

#[cfg(feature = "async-serial")]
pub mod native;

pub use error::PortError;
pub use mock::{MockDevice, MockPlatform, MockTransport};
pub use traits::*;

#[cfg(feature = "async-serial")]
pub use native::{available_port_names, NativePlatform, NativeTransport};
