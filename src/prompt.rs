//! Prompt detection and the "ready for the next command" wait.
//!
//! The receive loop sets a [`PromptSignal`] when a chunk ends with the
//! prompt marker, every write clears it, and [`PromptWaiter`] polls it.

use crate::error::{BridgeError, BridgeResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// The MicroPython REPL prompt.
pub const DEFAULT_PROMPT: &str = ">>>";

/// How often a pending wait re-checks the signal.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a wait lasts before giving up.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Decides whether received text ends with the prompt.
///
/// Trailing whitespace is ignored on both sides, so `">>> "` and `">>>"`
/// configure the same marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMatcher {
    marker: String,
}

impl PromptMatcher {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.trim_end().to_string(),
        }
    }

    /// The marker as it is compared (right-trimmed).
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// An empty marker never matches.
    pub fn is_prompt(&self, text: &str) -> bool {
        !self.marker.is_empty() && text.trim_end().ends_with(&self.marker)
    }
}

impl Default for PromptMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT)
    }
}

/// "Prompt seen since the last write" flag.
#[derive(Debug)]
pub struct PromptSignal {
    acknowledged: AtomicBool,
}

impl Default for PromptSignal {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PromptSignal {
    pub fn new(acknowledged: bool) -> Self {
        Self {
            acknowledged: AtomicBool::new(acknowledged),
        }
    }

    pub fn acknowledge(&self) {
        self.acknowledged.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.acknowledged.store(false, Ordering::Release);
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::Acquire)
    }
}

/// Polls a [`PromptSignal`] until it is set or the timeout passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptWaiter {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for PromptWaiter {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_PROMPT_TIMEOUT,
        }
    }
}

impl PromptWaiter {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Resolve once `signal` is set; fail with [`BridgeError::PromptTimeout`]
    /// when it stays clear for longer than the timeout.
    ///
    /// An already-set signal resolves without sleeping.
    pub async fn wait(&self, signal: &PromptSignal) -> BridgeResult<()> {
        let started = Instant::now();
        loop {
            if signal.is_acknowledged() {
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                return Err(BridgeError::PromptTimeout(self.timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
