//! Background receive loop.
//!
//! One task per session owns the [`PortReader`]. It decodes each chunk,
//! appends it to the received log and raises the prompt signal when the
//! chunk ends with the prompt marker. The task never returns an error to a
//! caller: failures become console diagnostics and end the loop.

use crate::error::BridgeError;
use crate::logs::LogSink;
use crate::port::{PortReader, ReadChunk};
use crate::prompt::{PromptMatcher, PromptSignal};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across two reads is held back until the
/// rest arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as forms complete characters.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut text = String::with_capacity(self.pending.len());
        let mut input = &self.pending[..];
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    text.push_str(valid);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        // Truncated sequence at the end: wait for more bytes.
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        let consumed = self.pending.len() - input.len();
        self.pending.drain(..consumed);
        text
    }

    /// Bytes held back waiting for the rest of a character.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

/// What the receive loop shares with the session.
#[derive(Clone)]
pub(crate) struct ReceiveContext {
    pub logs: Arc<LogSink>,
    pub signal: Arc<PromptSignal>,
    pub matcher: PromptMatcher,
    pub session_id: Uuid,
}

/// Handle to a running receive loop.
pub(crate) struct ReceiveTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<Result<(), BridgeError>>,
}

impl ReceiveTask {
    /// Start the loop on the current runtime.
    pub fn spawn(reader: Box<dyn PortReader>, ctx: ReceiveContext) -> Self {
        let (cancel, cancelled) = watch::channel(false);
        let span = info_span!("receive", session_id = %ctx.session_id);
        let handle = tokio::spawn(run(reader, ctx, cancelled).instrument(span));
        Self { cancel, handle }
    }

    /// Whether the loop has ended on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the pending read and wait until the reader has been released.
    ///
    /// Returns how the loop ended: `Ok(())` if it was still running.
    pub async fn stop(self) -> Result<(), BridgeError> {
        let _ = self.cancel.send(true);
        match self.handle.await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(error = %e, "receive task did not finish cleanly");
                Ok(())
            }
        }
    }
}

async fn run(
    mut reader: Box<dyn PortReader>,
    ctx: ReceiveContext,
    mut cancelled: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    let mut decoder = Utf8Decoder::new();
    debug!("receive loop started");

    let exit = loop {
        let outcome = tokio::select! {
            biased;
            _ = cancelled.changed() => None,
            result = reader.read() => Some(result),
        };

        match outcome {
            None => {
                if let Err(e) = reader.cancel().await {
                    warn!(error = %e, "failed to cancel pending read");
                }
                break Ok(());
            }
            Some(Ok(ReadChunk::Done)) => {
                ctx.logs.diagnostic("Reader closed.\n");
                break Err(BridgeError::StreamClosed);
            }
            Some(Ok(ReadChunk::Data(bytes))) => {
                let text = decoder.decode(&bytes);
                if text.is_empty() {
                    continue;
                }
                debug!(bytes = bytes.len(), "received chunk");
                let is_prompt = ctx.matcher.is_prompt(&text);
                ctx.logs.received.append(text);
                if is_prompt {
                    ctx.signal.acknowledge();
                }
            }
            Some(Err(e)) => {
                // Errors caused by close() tearing the port down are expected.
                if !*cancelled.borrow() {
                    ctx.logs
                        .diagnostic(format!("An error occurred while reading: {e}\n"));
                }
                break Err(BridgeError::ReadFault(e));
            }
        }
    };

    reader.release();
    debug!("receive loop finished");
    exit
}
