//! Scripted in-memory device for testing.
//!
//! A [`MockDevice`] plays the device side of the wire: tests push bytes
//! with [`MockDevice::emit`], end the stream with [`MockDevice::hang_up`]
//! and inspect what the bridge wrote with [`MockDevice::writes`]. The
//! matching [`MockPlatform`] hands out transports bound to that device so
//! the full open/read/write/close contract can run without hardware.

use super::error::PortError;
use super::traits::{
    PortConfiguration, PortReader, PortWriter, ReadChunk, SerialPlatform, SerialTransport,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Reply hook invoked for every write; returning bytes queues them for reading.
type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// One scripted read outcome.
#[derive(Debug)]
enum MockRead {
    Data(Vec<u8>),
    Eof,
    Fault(String),
}

/// State shared between the test handle and the transport it backs.
#[derive(Default)]
struct MockDeviceState {
    /// Receiving end of the scripted reads; taken while a reader is held.
    inbox: Option<mpsc::UnboundedReceiver<MockRead>>,
    /// Every buffer passed to a writer, in order.
    write_log: Vec<Vec<u8>>,
    /// Contract calls in the order they happened (`"reader.cancel"`, ...).
    events: Vec<&'static str>,
    /// Settings of the last successful open.
    opened_with: Option<PortConfiguration>,
    open: bool,
    readable: bool,
    reader_locked: bool,
    writer_locked: bool,
    fail_open: Option<String>,
    fail_writes: bool,
    stall_writes: bool,
    responder: Option<Responder>,
}

/// Test-side handle to a simulated device.
///
/// # Example
/// ```
/// use serial_repl_bridge::port::MockDevice;
///
/// let device = MockDevice::new("MOCK0");
/// device.emit(b"MicroPython v1.22\r\n>>> ");
/// assert!(device.writes().is_empty());
/// ```
#[derive(Clone)]
pub struct MockDevice {
    name: String,
    outbox: mpsc::UnboundedSender<MockRead>,
    state: Arc<Mutex<MockDeviceState>>,
}

impl MockDevice {
    /// Create a new device with the given port name.
    pub fn new(name: impl Into<String>) -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            outbox,
            state: Arc::new(Mutex::new(MockDeviceState {
                inbox: Some(inbox),
                ..Default::default()
            })),
        }
    }

    /// A platform whose port requests resolve to this device.
    pub fn platform(&self) -> MockPlatform {
        MockPlatform {
            device: Some(self.clone()),
            available: true,
            denial: None,
        }
    }

    /// Queue bytes for the reader, as if the device had printed them.
    pub fn emit(&self, data: &[u8]) {
        let _ = self.outbox.send(MockRead::Data(data.to_vec()));
    }

    /// Queue an end-of-stream.
    pub fn hang_up(&self) {
        let _ = self.outbox.send(MockRead::Eof);
    }

    /// Queue a read failure with the given message.
    pub fn fail_read(&self, message: impl Into<String>) {
        let _ = self.outbox.send(MockRead::Fault(message.into()));
    }

    /// Make the next `open` fail with the given message.
    pub fn fail_open(&self, message: impl Into<String>) {
        self.state.lock().fail_open = Some(message.into());
    }

    /// Make every write fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Make every write hang until the future is dropped, like a device
    /// that stopped draining its input under hardware flow control.
    pub fn set_stall_writes(&self, stall: bool) {
        self.state.lock().stall_writes = stall;
    }

    /// Install a hook that answers writes.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// Behave like a REPL: echo each write, then print the prompt.
    ///
    /// Control bytes (Ctrl-C, Ctrl-D) are answered with the prompt only.
    pub fn echo_with_prompt(&self, prompt: &str) {
        let prompt = prompt.to_string();
        self.set_responder(move |data| {
            let mut reply = Vec::new();
            if data.iter().any(|b| !b.is_ascii_control() || *b == b'\r') {
                reply.extend_from_slice(data);
                reply.extend_from_slice(b"\n");
            }
            reply.extend_from_slice(prompt.as_bytes());
            Some(reply)
        });
    }

    /// Remove the reply hook.
    pub fn clear_responder(&self) {
        self.state.lock().responder = None;
    }

    /// Port name reported by the transport.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of every buffer written so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Contract calls seen so far, in order.
    pub fn events(&self) -> Vec<&'static str> {
        self.state.lock().events.clone()
    }

    /// Settings of the last successful open.
    pub fn opened_with(&self) -> Option<PortConfiguration> {
        self.state.lock().opened_with.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn reader_locked(&self) -> bool {
        self.state.lock().reader_locked
    }

    pub fn writer_locked(&self) -> bool {
        self.state.lock().writer_locked
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockDevice")
            .field("name", &self.name)
            .field("open", &state.open)
            .field("writes", &state.write_log.len())
            .finish()
    }
}

/// Platform double that resolves port requests to a [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockPlatform {
    device: Option<MockDevice>,
    available: bool,
    denial: Option<String>,
}

impl MockPlatform {
    /// A platform without serial support.
    pub fn unavailable() -> Self {
        Self {
            device: None,
            available: false,
            denial: None,
        }
    }

    /// Refuse every port request with the given reason.
    pub fn denying(mut self, reason: impl Into<String>) -> Self {
        self.denial = Some(reason.into());
        self
    }
}

#[async_trait]
impl SerialPlatform for MockPlatform {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_port(&self) -> Result<Box<dyn SerialTransport>, PortError> {
        if !self.available {
            return Err(PortError::Unavailable);
        }
        if let Some(reason) = &self.denial {
            return Err(PortError::denied(reason.clone()));
        }
        let device = self
            .device
            .clone()
            .ok_or_else(|| PortError::denied("no device attached"))?;
        Ok(Box::new(MockTransport { device }))
    }
}

/// Transport bound to a [`MockDevice`].
#[derive(Debug)]
pub struct MockTransport {
    device: MockDevice,
}

#[async_trait]
impl SerialTransport for MockTransport {
    fn name(&self) -> &str {
        self.device.name()
    }

    async fn open(&mut self, config: &PortConfiguration) -> Result<(), PortError> {
        let mut state = self.device.state.lock();
        if state.open {
            return Err(PortError::AlreadyOpen);
        }
        if let Some(message) = state.fail_open.take() {
            return Err(PortError::Io(std::io::Error::other(message)));
        }
        state.events.push("transport.open");
        state.open = true;
        state.readable = true;
        state.opened_with = Some(config.clone());
        Ok(())
    }

    fn acquire_reader(&mut self) -> Result<Box<dyn PortReader>, PortError> {
        let mut state = self.device.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        let inbox = state.inbox.take().ok_or(PortError::LockHeld("read"))?;
        state.reader_locked = true;
        state.events.push("reader.acquire");
        Ok(Box::new(MockReader {
            inbox: Some(inbox),
            state: Arc::clone(&self.device.state),
        }))
    }

    fn acquire_writer(&mut self) -> Result<Box<dyn PortWriter>, PortError> {
        let mut state = self.device.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        if state.writer_locked {
            return Err(PortError::LockHeld("write"));
        }
        state.writer_locked = true;
        state.events.push("writer.acquire");
        Ok(Box::new(MockWriter {
            outbox: self.device.outbox.clone(),
            state: Arc::clone(&self.device.state),
        }))
    }

    fn is_readable(&self) -> bool {
        let state = self.device.state.lock();
        state.open && state.readable
    }

    async fn cancel_readable(&mut self) -> Result<(), PortError> {
        let mut state = self.device.state.lock();
        state.events.push("transport.cancel_readable");
        state.readable = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PortError> {
        let mut state = self.device.state.lock();
        if state.reader_locked || state.writer_locked {
            return Err(PortError::LockHeld(if state.reader_locked {
                "read"
            } else {
                "write"
            }));
        }
        state.events.push("transport.close");
        state.open = false;
        state.readable = false;
        Ok(())
    }
}

struct MockReader {
    inbox: Option<mpsc::UnboundedReceiver<MockRead>>,
    state: Arc<Mutex<MockDeviceState>>,
}

#[async_trait]
impl PortReader for MockReader {
    async fn read(&mut self) -> Result<ReadChunk, PortError> {
        if !self.state.lock().readable {
            return Ok(ReadChunk::Done);
        }
        let inbox = self.inbox.as_mut().ok_or(PortError::NotOpen)?;
        match inbox.recv().await {
            Some(MockRead::Data(bytes)) => Ok(ReadChunk::Data(bytes)),
            Some(MockRead::Eof) | None => Ok(ReadChunk::Done),
            Some(MockRead::Fault(message)) => Err(PortError::Io(std::io::Error::other(message))),
        }
    }

    async fn cancel(&mut self) -> Result<(), PortError> {
        self.state.lock().events.push("reader.cancel");
        Ok(())
    }

    fn release(mut self: Box<Self>) {
        let mut state = self.state.lock();
        state.inbox = self.inbox.take();
        state.reader_locked = false;
        state.events.push("reader.release");
    }
}

struct MockWriter {
    outbox: mpsc::UnboundedSender<MockRead>,
    state: Arc<Mutex<MockDeviceState>>,
}

#[async_trait]
impl PortWriter for MockWriter {
    async fn write(&mut self, data: &[u8]) -> Result<(), PortError> {
        let stalled = self.state.lock().stall_writes;
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device stopped accepting data",
            )));
        }
        state.write_log.push(data.to_vec());
        if let Some(responder) = state.responder.as_mut() {
            if let Some(reply) = responder(data) {
                let _ = self.outbox.send(MockRead::Data(reply));
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PortError> {
        self.state.lock().events.push("writer.close");
        Ok(())
    }

    fn release(self: Box<Self>) {
        let mut state = self.state.lock();
        state.writer_locked = false;
        state.events.push("writer.release");
    }
}
