//! Sending commands and waiting for the prompt.

use crate::error::{BridgeError, BridgeResult};
use crate::prompt::PromptWaiter;
use crate::session::SessionManager;
use std::time::Duration;
use tracing::debug;

/// Ctrl-C: interrupts the running program on a MicroPython REPL.
pub const CTRL_C: char = '\u{3}';

/// Ctrl-D: soft reboot on a MicroPython REPL.
pub const CTRL_D: char = '\u{4}';

impl SessionManager {
    /// Write `text` as UTF-8 and record it in the sent log.
    ///
    /// Does nothing when no writer is held. Does not wait for a reply; use
    /// [`wait_for_prompt`](Self::wait_for_prompt) for that. A write still in
    /// flight when [`close`](Self::close) runs is abandoned with
    /// [`BridgeError::SessionClosed`].
    pub async fn send(&self, text: &str) -> BridgeResult<()> {
        let mut closes = self.closes.subscribe();
        let Some(slot) = self.writer_slot().await else {
            debug!("send ignored, no writer held");
            return Ok(());
        };

        let mut held = tokio::select! {
            biased;
            _ = closes.changed() => return Err(BridgeError::SessionClosed),
            held = slot.lock() => held,
        };
        let Some(writer) = held.as_mut() else {
            debug!("send ignored, writer already released");
            return Ok(());
        };

        // Cleared before the write so a reply racing the write's completion is not lost.
        let was_acknowledged = self.signal.is_acknowledged();
        self.signal.clear();

        let written = tokio::select! {
            biased;
            _ = closes.changed() => None,
            result = writer.write(text.as_bytes()) => Some(result),
        };

        match written {
            Some(Ok(())) => {
                debug!(bytes = text.len(), "sent");
                self.logs.sent.append(text);
                Ok(())
            }
            Some(Err(e)) => {
                if was_acknowledged {
                    self.signal.acknowledge();
                }
                self.logs
                    .diagnostic(format!("Failed to write to the serial port: {e}\n"));
                Err(BridgeError::WriteFault(e))
            }
            None => {
                if was_acknowledged {
                    self.signal.acknowledge();
                }
                debug!("write abandoned, session closed");
                Err(BridgeError::SessionClosed)
            }
        }
    }

    /// Send each line followed by the line terminator, waiting for the prompt
    /// after every one. Stops at the first failure.
    pub async fn send_batch<I, S>(&self, lines: I) -> BridgeResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            let line = format!("{}{}", line.as_ref(), self.settings.line_terminator);
            self.send(&line).await?;
            self.wait_for_prompt().await?;
        }
        Ok(())
    }

    /// Send Ctrl-C then Ctrl-D without waiting for anything.
    pub async fn soft_reset(&self) -> BridgeResult<()> {
        self.send(&CTRL_C.to_string()).await?;
        self.send(&CTRL_D.to_string()).await
    }

    /// Wait until the device has printed its prompt since the last write.
    ///
    /// Fails with [`BridgeError::PromptTimeout`] after the configured timeout.
    /// Ends early with [`BridgeError::SessionClosed`] if the session is closed
    /// while waiting.
    pub async fn wait_for_prompt(&self) -> BridgeResult<()> {
        self.wait_with(self.waiter).await
    }

    /// [`wait_for_prompt`](Self::wait_for_prompt) with a one-off timeout.
    pub async fn wait_for_prompt_with(&self, timeout: Duration) -> BridgeResult<()> {
        let mut waiter = self.waiter;
        waiter.timeout = timeout;
        self.wait_with(waiter).await
    }

    async fn wait_with(&self, waiter: PromptWaiter) -> BridgeResult<()> {
        let mut closes = self.closes.subscribe();
        tokio::select! {
            biased;
            result = waiter.wait(&self.signal) => result,
            _ = closes.changed() => {
                debug!("prompt wait ended by close");
                Err(BridgeError::SessionClosed)
            }
        }
    }
}
