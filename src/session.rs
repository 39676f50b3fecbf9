//! Session management: one open connection at a time.
//!
//! [`SessionManager`] owns the transport for the lifetime of a session,
//! runs the receive loop, and tears everything down in a fixed order on
//! [`SessionManager::close`]. Failures while connecting are reported as
//! console diagnostics; `open` and `close` only return booleans.

use crate::error::{BridgeError, BridgeResult};
use crate::logs::LogSink;
use crate::port::{
    PortConfiguration, PortError, PortWriter, SerialPlatform, SerialTransport, DEFAULT_BAUD_RATE,
};
use crate::prompt::{
    PromptMatcher, PromptSignal, PromptWaiter, DEFAULT_POLL_INTERVAL, DEFAULT_PROMPT,
    DEFAULT_PROMPT_TIMEOUT,
};
use crate::receive::{ReceiveContext, ReceiveTask};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The session's writer, shared with in-flight sends so `close` never
/// waits on the session slot behind a stalled write.
pub(crate) type WriterSlot = Arc<Mutex<Option<Box<dyn PortWriter>>>>;

/// Line ending the MicroPython REPL expects after a command.
pub const DEFAULT_LINE_TERMINATOR: &str = "\r";

/// Tunables of a [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Text the device prints when it is ready for the next command.
    pub prompt: String,
    /// How often `wait_for_prompt` checks for the prompt.
    pub poll_interval: Duration,
    /// How long `wait_for_prompt` waits before failing.
    pub prompt_timeout: Duration,
    /// Appended to every line by `send_batch`.
    pub line_terminator: String,
    /// Line settings; the baud rate is replaced by the one passed to `open`.
    pub port: PortConfiguration,
}

impl SessionSettings {
    /// Reject settings a session cannot work with.
    ///
    /// An empty marker would match every chunk, and a zero poll interval
    /// would spin.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.prompt.trim_end().is_empty() {
            return Err(BridgeError::InvalidSettings(
                "prompt marker must contain a non-whitespace character".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(BridgeError::InvalidSettings(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
            line_terminator: DEFAULT_LINE_TERMINATOR.to_string(),
            port: PortConfiguration::default(),
        }
    }
}

/// Snapshot of the open session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub port_name: String,
    pub baud_rate: u32,
    pub opened_at: DateTime<Utc>,
    /// False once the receive loop has ended (stream closed or read error).
    pub receiving: bool,
}

/// State of one open connection.
pub(crate) struct Session {
    pub id: Uuid,
    pub port_name: String,
    pub baud_rate: u32,
    pub opened_at: DateTime<Utc>,
    pub transport: Option<Box<dyn SerialTransport>>,
    pub writer: WriterSlot,
    /// Owns the reader while the loop runs.
    pub receiver: Option<ReceiveTask>,
}

impl Session {
    fn new(transport: Box<dyn SerialTransport>, baud_rate: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            port_name: transport.name().to_string(),
            baud_rate,
            opened_at: Utc::now(),
            transport: Some(transport),
            writer: Arc::new(Mutex::new(None)),
            receiver: None,
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            port_name: self.port_name.clone(),
            baud_rate: self.baud_rate,
            opened_at: self.opened_at,
            receiving: self.receiver.as_ref().is_some_and(|r| !r.is_finished()),
        }
    }
}

/// Owns the single active serial session.
///
/// Construct one per front-end and share it by `Arc`:
///
/// ```no_run
/// use serial_repl_bridge::{SessionManager, SessionSettings};
/// use serial_repl_bridge::port::MockDevice;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let device = MockDevice::new("MOCK0");
/// let manager = Arc::new(SessionManager::new(
///     Arc::new(device.platform()),
///     SessionSettings::default(),
/// ));
/// if manager.open(115_200).await {
///     manager.send_batch(["import sys", "print(sys.version)"]).await?;
/// }
/// manager.close().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    pub(crate) platform: Arc<dyn SerialPlatform>,
    pub(crate) settings: SessionSettings,
    pub(crate) matcher: PromptMatcher,
    pub(crate) waiter: PromptWaiter,
    pub(crate) logs: Arc<LogSink>,
    pub(crate) signal: Arc<PromptSignal>,
    pub(crate) session: Mutex<Option<Session>>,
    /// Bumped by every `close`; in-flight sends and waits watch it.
    pub(crate) closes: watch::Sender<u64>,
}

impl SessionManager {
    pub fn new(platform: Arc<dyn SerialPlatform>, settings: SessionSettings) -> Self {
        Self::with_logs(platform, settings, Arc::new(LogSink::new()))
    }

    /// Use an existing log sink (e.g. one a front-end already subscribed to).
    pub fn with_logs(
        platform: Arc<dyn SerialPlatform>,
        settings: SessionSettings,
        logs: Arc<LogSink>,
    ) -> Self {
        Self {
            platform,
            matcher: PromptMatcher::new(&settings.prompt),
            waiter: PromptWaiter::new(settings.poll_interval, settings.prompt_timeout),
            settings,
            logs,
            signal: Arc::new(PromptSignal::default()),
            session: Mutex::new(None),
            closes: watch::Sender::new(0),
        }
    }

    pub fn logs(&self) -> &Arc<LogSink> {
        &self.logs
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether a prompt has been seen since the last write.
    pub fn is_acknowledged(&self) -> bool {
        self.signal.is_acknowledged()
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub async fn session_info(&self) -> Option<SessionInfo> {
        self.session.lock().await.as_ref().map(Session::info)
    }

    /// Open a session at the default rate of 115200 baud.
    pub async fn open_default(&self) -> bool {
        self.open(DEFAULT_BAUD_RATE).await
    }

    /// Open a session. Returns false (with a console diagnostic) on any failure.
    ///
    /// Opening while a session is active is rejected and leaves that session
    /// untouched.
    pub async fn open(&self, baud_rate: u32) -> bool {
        match self.try_open(baud_rate).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "open failed");
                false
            }
        }
    }

    /// [`open`](Self::open) returning the failure instead of a boolean.
    pub async fn try_open(&self, baud_rate: u32) -> BridgeResult<()> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            self.logs
                .diagnostic("Already connected to a serial port.\n");
            return Err(BridgeError::AlreadyConnected);
        }

        if let Err(e) = self.settings.validate() {
            self.logs.diagnostic(format!("{e}\n"));
            return Err(e);
        }

        if !self.platform.is_available() {
            self.logs.diagnostic("Serial ports are not available.\n");
            return Err(BridgeError::CapabilityUnavailable);
        }

        if baud_rate == 0 {
            return Err(self.connection_failed(PortError::config("baud rate must be positive")));
        }

        let transport = match self.platform.request_port().await {
            Ok(transport) => transport,
            Err(e) => return Err(self.connection_failed(e)),
        };

        let mut session = Session::new(transport, baud_rate);
        match self.start(&mut session).await {
            Ok(()) => {
                info!(
                    session_id = %session.id,
                    port = %session.port_name,
                    baud = baud_rate,
                    "session opened"
                );
                *slot = Some(session);
                Ok(())
            }
            Err(e) => {
                self.teardown(&mut session).await;
                Err(self.connection_failed(e))
            }
        }
    }

    /// Open the transport, take both locks and start the receive loop.
    async fn start(&self, session: &mut Session) -> Result<(), PortError> {
        let config = self.settings.port.with_baud_rate(session.baud_rate);
        let transport = session.transport.as_mut().ok_or(PortError::NotOpen)?;

        transport.open(&config).await?;
        let reader = transport.acquire_reader()?;
        let writer = match transport.acquire_writer() {
            Ok(writer) => writer,
            Err(e) => {
                reader.release();
                return Err(e);
            }
        };
        *session.writer.lock().await = Some(writer);
        self.signal.acknowledge();

        self.logs.diagnostic("Connected to the serial port.\n");

        let ctx = ReceiveContext {
            logs: Arc::clone(&self.logs),
            signal: Arc::clone(&self.signal),
            matcher: self.matcher.clone(),
            session_id: session.id,
        };
        session.receiver = Some(ReceiveTask::spawn(reader, ctx));
        Ok(())
    }

    fn connection_failed(&self, e: PortError) -> BridgeError {
        self.logs
            .diagnostic(format!("Failed to connect to the serial port: {e}\n"));
        BridgeError::ConnectionFailure(e)
    }

    /// Handle to the open session's writer, if any.
    pub(crate) async fn writer_slot(&self) -> Option<WriterSlot> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| Arc::clone(&session.writer))
    }

    /// Close the session. Safe without one; always returns true.
    ///
    /// A send stuck in a write and a pending prompt wait both end with
    /// [`BridgeError::SessionClosed`].
    pub async fn close(&self) -> bool {
        let mut slot = self.session.lock().await;
        if let Some(mut session) = slot.take() {
            self.closes.send_modify(|generation| *generation += 1);
            self.teardown(&mut session).await;
            info!(session_id = %session.id, "session closed");
        }
        self.logs.diagnostic("Disconnected from the serial port.\n");
        true
    }

    /// Release everything `session` holds: reader, writer, readable side, transport.
    ///
    /// Every step runs only if its resource is held, so half-open sessions
    /// from a failed open clean up the same way.
    async fn teardown(&self, session: &mut Session) {
        if let Some(receiver) = session.receiver.take() {
            if let Err(exit) = receiver.stop().await {
                debug!(session_id = %session.id, reason = %exit, "receive loop had already ended");
            }
        }

        let writer = session.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close().await {
                warn!(session_id = %session.id, error = %e, "failed to close writer");
            }
            writer.release();
        }

        if let Some(mut transport) = session.transport.take() {
            if transport.is_readable() {
                if let Err(e) = transport.cancel_readable().await {
                    warn!(session_id = %session.id, error = %e, "failed to cancel readable side");
                }
            }
            if let Err(e) = transport.close().await {
                warn!(session_id = %session.id, error = %e, "failed to close transport");
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.settings)
            .field("acknowledged", &self.signal.is_acknowledged())
            .finish()
    }
}
