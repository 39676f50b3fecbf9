//! Append-only logs with change notification.
//!
//! The bridge keeps three independent [`LogChannel`]s: console diagnostics,
//! text that was sent, and text that was received. Front-ends subscribe to a
//! channel and get the full ordered contents after every append.

use parking_lot::{Mutex, ReentrantMutex};
use std::fmt;
use std::sync::Arc;

/// Handle returned by [`LogChannel::subscribe`].
pub type SubscriptionId = u64;

type Subscriber = Arc<dyn Fn(&[String]) + Send + Sync>;

/// Which of the three logs an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Console,
    Sent,
    Received,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Console => write!(f, "console"),
            Self::Sent => write!(f, "sent"),
            Self::Received => write!(f, "received"),
        }
    }
}

#[derive(Default)]
struct ChannelInner {
    entries: Vec<String>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: SubscriptionId,
}

/// One append-only log.
pub struct LogChannel {
    kind: LogKind,
    inner: Mutex<ChannelInner>,
    /// Serialises notification so subscribers see snapshots in append order.
    /// Reentrant so a subscriber may append to the same channel.
    delivery: ReentrantMutex<()>,
}

impl LogChannel {
    pub fn new(kind: LogKind) -> Self {
        Self {
            kind,
            inner: Mutex::new(ChannelInner::default()),
            delivery: ReentrantMutex::new(()),
        }
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    /// Append an entry and notify every subscriber with the full log.
    pub fn append(&self, entry: impl Into<String>) {
        let _delivery = self.delivery.lock();
        let (snapshot, subscribers) = {
            let mut inner = self.inner.lock();
            inner.entries.push(entry.into());
            if inner.subscribers.is_empty() {
                return;
            }
            let subscribers: Vec<Subscriber> =
                inner.subscribers.iter().map(|(_, s)| Arc::clone(s)).collect();
            (inner.entries.clone(), subscribers)
        };
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }

    /// Register a callback fired after every append.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        inner.subscribers.len() != before
    }

    /// Copy of all entries, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().entries.clone()
    }

    /// All entries concatenated, the way a console view shows them.
    pub fn joined(&self) -> String {
        self.inner.lock().entries.concat()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LogChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LogChannel")
            .field("kind", &self.kind)
            .field("entries", &inner.entries.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

/// The three logs of a bridge.
#[derive(Debug)]
pub struct LogSink {
    pub console: LogChannel,
    pub sent: LogChannel,
    pub received: LogChannel,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            console: LogChannel::new(LogKind::Console),
            sent: LogChannel::new(LogKind::Sent),
            received: LogChannel::new(LogKind::Received),
        }
    }

    pub fn channel(&self, kind: LogKind) -> &LogChannel {
        match kind {
            LogKind::Console => &self.console,
            LogKind::Sent => &self.sent,
            LogKind::Received => &self.received,
        }
    }

    /// Append a console diagnostic and mirror it to `tracing`.
    pub fn diagnostic(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "serial_repl_bridge::console", "{}", message.trim_end());
        self.console.append(message);
    }
}
