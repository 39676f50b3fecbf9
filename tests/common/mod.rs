//! Shared test utilities for the REPL bridge integration tests.
//!
//! - a manager wired to a scripted [`MockDevice`] with short prompt timeouts
//! - helpers that wait for the receive loop to catch up

#![allow(dead_code)]

use serial_repl_bridge::logs::LogChannel;
use serial_repl_bridge::port::MockDevice;
use serial_repl_bridge::{SessionManager, SessionSettings};
use std::sync::Arc;
use std::time::Duration;

/// Prompt printed by the simulated REPL.
pub const PROMPT: &str = ">>> ";

/// Settings with a 10 ms poll and a 200 ms prompt timeout.
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        poll_interval: Duration::from_millis(10),
        prompt_timeout: Duration::from_millis(200),
        ..SessionSettings::default()
    }
}

/// A device and a manager bound to it; nothing is opened yet.
pub fn bridge(name: &str) -> (MockDevice, SessionManager) {
    let device = MockDevice::new(name);
    let manager = SessionManager::new(Arc::new(device.platform()), fast_settings());
    (device, manager)
}

/// Like [`bridge`], with the device answering every write with an echo and the prompt.
pub fn repl_bridge(name: &str) -> (MockDevice, SessionManager) {
    let (device, manager) = bridge(name);
    device.echo_with_prompt(PROMPT);
    (device, manager)
}

/// Open `manager` at 115200 baud, panicking if it fails.
pub async fn open(manager: &SessionManager) {
    assert!(manager.open(115_200).await, "open should succeed");
}

/// Yield until `channel` holds at least `count` entries, or panic after ~1 s.
pub async fn wait_for_entries(channel: &LogChannel, count: usize) -> Vec<String> {
    for _ in 0..100 {
        if channel.len() >= count {
            return channel.snapshot();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "{} log never reached {count} entries: {:?}",
        channel.kind(),
        channel.snapshot()
    );
}

/// Yield until the console log contains `needle`, or panic after ~1 s.
pub async fn wait_for_diagnostic(manager: &SessionManager, needle: &str) {
    for _ in 0..100 {
        if manager.logs().console.joined().contains(needle) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "console never mentioned {needle:?}: {:?}",
        manager.logs().console.snapshot()
    );
}
