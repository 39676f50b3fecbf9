//! Real serial ports through tokio-serial.
//!
//! Note: This module is gated behind the `async-serial` feature flag.

use super::error::PortError;
use super::traits::{
    PortConfiguration, PortReader, PortWriter, ReadChunk, SerialPlatform, SerialTransport,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::SerialStream;
use tracing::debug;

/// Size of the buffer handed to each read.
const READ_BUFFER_SIZE: usize = 4096;

/// Platform backed by the operating system's serial ports.
///
/// There is no interactive picker here: `request_port` resolves the
/// configured port name, or the first port the system enumerates.
#[derive(Debug, Clone, Default)]
pub struct NativePlatform {
    port_name: Option<String>,
}

impl NativePlatform {
    /// Use `port_name` when given, otherwise the first enumerated port.
    pub fn new(port_name: Option<String>) -> Self {
        Self { port_name }
    }
}

/// List the names of the serial ports the system knows about.
pub fn available_port_names() -> Result<Vec<String>, PortError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect())
}

#[async_trait]
impl SerialPlatform for NativePlatform {
    fn is_available(&self) -> bool {
        serialport::available_ports().is_ok()
    }

    async fn request_port(&self) -> Result<Box<dyn SerialTransport>, PortError> {
        let ports = available_port_names()?;
        let name = match &self.port_name {
            Some(name) if ports.iter().any(|p| p == name) => name.clone(),
            // Ports that are not enumerated (pty pairs, some USB bridges) can still open.
            Some(name) => {
                debug!(port = %name, "requested port is not enumerated, trying anyway");
                name.clone()
            }
            None => ports
                .into_iter()
                .next()
                .ok_or_else(|| PortError::denied("no serial port selected"))?,
        };
        Ok(Box::new(NativeTransport::new(name)))
    }
}

/// Halves of an open stream that are not currently lent out.
#[derive(Default)]
struct Halves {
    reader: Option<ReadHalf<SerialStream>>,
    writer: Option<WriteHalf<SerialStream>>,
}

/// One operating-system serial port.
pub struct NativeTransport {
    name: String,
    halves: Arc<Mutex<Halves>>,
    open: bool,
    readable: bool,
    reader_out: Arc<Mutex<bool>>,
}

impl NativeTransport {
    fn new(name: String) -> Self {
        Self {
            name,
            halves: Arc::new(Mutex::new(Halves::default())),
            open: false,
            readable: false,
            reader_out: Arc::new(Mutex::new(false)),
        }
    }
}

#[async_trait]
impl SerialTransport for NativeTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self, config: &PortConfiguration) -> Result<(), PortError> {
        if self.open {
            return Err(PortError::AlreadyOpen);
        }

        let builder = tokio_serial::new(&self.name, config.baud_rate)
            .data_bits(config.data_bits.into())
            .flow_control(config.flow_control.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .timeout(config.timeout);

        let stream = SerialStream::open(&builder).map_err(|e| match e.kind {
            tokio_serial::ErrorKind::NoDevice => PortError::not_found(&self.name),
            tokio_serial::ErrorKind::InvalidInput => PortError::config(e.to_string()),
            _ => PortError::Serial(e),
        })?;

        let (reader, writer) = tokio::io::split(stream);
        *self.halves.lock() = Halves {
            reader: Some(reader),
            writer: Some(writer),
        };
        self.open = true;
        self.readable = true;
        debug!(port = %self.name, baud = config.baud_rate, "serial port opened");
        Ok(())
    }

    fn acquire_reader(&mut self) -> Result<Box<dyn PortReader>, PortError> {
        if !self.open {
            return Err(PortError::NotOpen);
        }
        let half = self
            .halves
            .lock()
            .reader
            .take()
            .ok_or(PortError::LockHeld("read"))?;
        *self.reader_out.lock() = true;
        Ok(Box::new(NativeReader {
            half: Some(half),
            halves: Arc::clone(&self.halves),
            reader_out: Arc::clone(&self.reader_out),
            buffer: vec![0u8; READ_BUFFER_SIZE],
        }))
    }

    fn acquire_writer(&mut self) -> Result<Box<dyn PortWriter>, PortError> {
        if !self.open {
            return Err(PortError::NotOpen);
        }
        let half = self
            .halves
            .lock()
            .writer
            .take()
            .ok_or(PortError::LockHeld("write"))?;
        Ok(Box::new(NativeWriter {
            half: Some(half),
            halves: Arc::clone(&self.halves),
        }))
    }

    fn is_readable(&self) -> bool {
        self.open && self.readable
    }

    async fn cancel_readable(&mut self) -> Result<(), PortError> {
        self.readable = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PortError> {
        if *self.reader_out.lock() {
            return Err(PortError::LockHeld("read"));
        }
        let halves = std::mem::take(&mut *self.halves.lock());
        if let (Some(reader), Some(writer)) = (halves.reader, halves.writer) {
            drop(reader.unsplit(writer));
        }
        self.open = false;
        self.readable = false;
        debug!(port = %self.name, "serial port closed");
        Ok(())
    }
}

impl std::fmt::Debug for NativeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeTransport")
            .field("name", &self.name)
            .field("open", &self.open)
            .field("readable", &self.readable)
            .finish()
    }
}

struct NativeReader {
    half: Option<ReadHalf<SerialStream>>,
    halves: Arc<Mutex<Halves>>,
    reader_out: Arc<Mutex<bool>>,
    buffer: Vec<u8>,
}

#[async_trait]
impl PortReader for NativeReader {
    async fn read(&mut self) -> Result<ReadChunk, PortError> {
        let half = self.half.as_mut().ok_or(PortError::NotOpen)?;
        let n = half.read(&mut self.buffer).await?;
        if n == 0 {
            return Ok(ReadChunk::Done);
        }
        Ok(ReadChunk::Data(self.buffer[..n].to_vec()))
    }

    async fn cancel(&mut self) -> Result<(), PortError> {
        // Dropping the pending read future is the cancellation; nothing is buffered here.
        Ok(())
    }

    fn release(mut self: Box<Self>) {
        self.halves.lock().reader = self.half.take();
        *self.reader_out.lock() = false;
    }
}

struct NativeWriter {
    half: Option<WriteHalf<SerialStream>>,
    halves: Arc<Mutex<Halves>>,
}

#[async_trait]
impl PortWriter for NativeWriter {
    async fn write(&mut self, data: &[u8]) -> Result<(), PortError> {
        let half = self.half.as_mut().ok_or(PortError::NotOpen)?;
        half.write_all(data).await?;
        half.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PortError> {
        if let Some(half) = self.half.as_mut() {
            half.flush().await?;
        }
        Ok(())
    }

    fn release(mut self: Box<Self>) {
        self.halves.lock().writer = self.half.take();
    }
}
