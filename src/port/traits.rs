//! Core traits for the serial transport contract.
//!
//! The bridge never talks to hardware directly. It asks a [`SerialPlatform`]
//! for a [`SerialTransport`], opens it, and then holds one [`PortReader`] and
//! one [`PortWriter`] for the lifetime of a session. Real ports
//! ([`NativePlatform`](super::NativePlatform)) and the scripted
//! [`MockPlatform`](super::MockPlatform) implement the same contract.

use super::error::PortError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Baud rate used when the caller does not pick one.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Configuration parameters for a serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Read/write timeout handed to the driver.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PortConfiguration {
    /// Same line settings at a different baud rate.
    pub fn with_baud_rate(&self, baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..self.clone()
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Result of a single read: either some bytes or the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    Data(Vec<u8>),
    Done,
}

/// Entry point into the host's serial support.
///
/// `request_port` is where a desktop front-end would show a port picker;
/// a denial is reported as [`PortError::Denied`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialPlatform: Send + Sync {
    /// Whether the platform can open serial ports at all.
    fn is_available(&self) -> bool;

    /// Ask for a port. The returned transport is not open yet.
    async fn request_port(&self) -> Result<Box<dyn SerialTransport>, PortError>;
}

/// A duplex byte stream to one device.
///
/// The transport hands out at most one reader and one writer at a time.
/// Both must be released before [`SerialTransport::close`] is called.
#[async_trait]
pub trait SerialTransport: Send + std::fmt::Debug {
    /// Name/path of the underlying port.
    fn name(&self) -> &str;

    /// Open the port with the given line settings.
    async fn open(&mut self, config: &PortConfiguration) -> Result<(), PortError>;

    /// Take the exclusive read side.
    fn acquire_reader(&mut self) -> Result<Box<dyn PortReader>, PortError>;

    /// Take the exclusive write side.
    fn acquire_writer(&mut self) -> Result<Box<dyn PortWriter>, PortError>;

    /// Whether the read side is still usable.
    fn is_readable(&self) -> bool;

    /// Shut down the read side. Later reads see the end of the stream.
    async fn cancel_readable(&mut self) -> Result<(), PortError>;

    /// Close the port.
    async fn close(&mut self) -> Result<(), PortError>;
}

/// Exclusive read side of a transport.
#[async_trait]
pub trait PortReader: Send {
    /// Wait for the next chunk of bytes.
    ///
    /// Must be cancel safe: dropping the future loses no data that a later
    /// read would have returned.
    async fn read(&mut self) -> Result<ReadChunk, PortError>;

    /// Abort any read in progress.
    async fn cancel(&mut self) -> Result<(), PortError>;

    /// Give the read lock back to the transport.
    fn release(self: Box<Self>);
}

/// Exclusive write side of a transport.
#[async_trait]
pub trait PortWriter: Send {
    /// Write all of `data`.
    async fn write(&mut self, data: &[u8]) -> Result<(), PortError>;

    /// Flush and close the write side.
    async fn close(&mut self) -> Result<(), PortError>;

    /// Give the write lock back to the transport.
    fn release(self: Box<Self>);
}
