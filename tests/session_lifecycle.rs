//! Session open/close against a scripted device.
//!
//! Covers:
//! - lock acquisition and the teardown order on close
//! - rejected opens (already connected, failing device, no capability)
//! - the receive loop ending on its own (hang-up, read fault)
//! - close interrupting a stalled write, a pending wait or a batch

mod common;

use common::{bridge, open, repl_bridge, wait_for_diagnostic};
use pretty_assertions::assert_eq;
use serial_repl_bridge::port::MockPlatform;
use serial_repl_bridge::{BridgeError, SessionManager};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_open_takes_both_locks_and_logs_connection() {
    // Arrange
    let (device, manager) = bridge("MOCK0");

    // Act
    let opened = manager.open(115_200).await;

    // Assert
    assert!(opened);
    assert!(manager.is_connected().await);
    assert!(manager.is_acknowledged(), "flag starts set after open");
    assert!(device.is_open());
    assert!(device.reader_locked());
    assert!(device.writer_locked());
    assert_eq!(
        device.events(),
        vec!["transport.open", "reader.acquire", "writer.acquire"]
    );
    assert_eq!(
        manager.logs().console.snapshot(),
        vec!["Connected to the serial port.\n"]
    );
}

#[tokio::test]
async fn test_open_uses_requested_baud_rate() {
    let (device, manager) = bridge("MOCK0");

    assert!(manager.open(9600).await);

    let config = device.opened_with().expect("device should be opened");
    assert_eq!(config.baud_rate, 9600);
    let info = manager.session_info().await.expect("session should exist");
    assert_eq!(info.baud_rate, 9600);
    assert_eq!(info.port_name, "MOCK0");
    assert!(info.receiving);
}

#[tokio::test]
async fn test_open_default_uses_115200() {
    let (device, manager) = bridge("MOCK0");

    assert!(manager.open_default().await);
    assert_eq!(device.opened_with().map(|c| c.baud_rate), Some(115_200));
}

#[tokio::test]
async fn test_close_releases_everything_in_order() {
    // Arrange
    let (device, manager) = bridge("MOCK0");
    open(&manager).await;

    // Act
    let closed = manager.close().await;

    // Assert
    assert!(closed);
    assert!(!manager.is_connected().await);
    assert!(!device.is_open());
    assert!(!device.reader_locked());
    assert!(!device.writer_locked());
    assert_eq!(
        device.events(),
        vec![
            "transport.open",
            "reader.acquire",
            "writer.acquire",
            "reader.cancel",
            "reader.release",
            "writer.close",
            "writer.release",
            "transport.cancel_readable",
            "transport.close",
        ]
    );
    assert_eq!(
        manager.logs().console.snapshot().last().map(String::as_str),
        Some("Disconnected from the serial port.\n")
    );
}

#[tokio::test]
async fn test_close_twice_is_harmless() {
    let (_device, manager) = bridge("MOCK0");
    open(&manager).await;

    assert!(manager.close().await);
    assert!(manager.close().await);

    let disconnects = manager
        .logs()
        .console
        .snapshot()
        .into_iter()
        .filter(|entry| entry.starts_with("Disconnected"))
        .count();
    assert_eq!(disconnects, 2);
}

#[tokio::test]
async fn test_reopen_after_close() {
    let (device, manager) = repl_bridge("MOCK0");
    open(&manager).await;
    let first = manager.session_info().await.map(|info| info.id);
    manager.close().await;

    open(&manager).await;
    let second = manager.session_info().await.map(|info| info.id);

    assert!(device.is_open());
    assert_ne!(first, second, "each open starts a new session");
    manager.close().await;
}

#[tokio::test]
async fn test_open_while_connected_is_rejected() {
    // Arrange
    let (device, manager) = bridge("MOCK0");
    open(&manager).await;
    let original = manager.session_info().await.map(|info| info.id);

    // Act
    let result = manager.try_open(115_200).await;

    // Assert
    assert!(matches!(result, Err(BridgeError::AlreadyConnected)));
    assert_eq!(manager.session_info().await.map(|info| info.id), original);
    assert!(device.reader_locked(), "existing session keeps its locks");
    assert!(manager
        .logs()
        .console
        .joined()
        .contains("Already connected to a serial port.\n"));
}

#[tokio::test]
async fn test_failed_device_open_leaves_no_session() {
    // Arrange
    let (device, manager) = bridge("MOCK0");
    device.fail_open("port busy");

    // Act
    let opened = manager.open(115_200).await;

    // Assert
    assert!(!opened);
    assert!(!manager.is_connected().await);
    assert!(!device.is_open());
    assert!(!device.reader_locked());
    assert!(!device.writer_locked());

    let console = manager.logs().console.joined();
    assert!(console.contains("Failed to connect to the serial port:"));
    assert!(console.contains("port busy"));

    // The failure is one-shot; the next attempt succeeds.
    assert!(manager.open(115_200).await);
    manager.close().await;
}

#[tokio::test]
async fn test_platform_without_serial_support() {
    let manager = SessionManager::new(
        Arc::new(MockPlatform::unavailable()),
        common::fast_settings(),
    );

    let result = manager.try_open(115_200).await;

    assert!(matches!(result, Err(BridgeError::CapabilityUnavailable)));
    assert_eq!(
        manager.logs().console.snapshot(),
        vec!["Serial ports are not available.\n"]
    );
}

#[tokio::test]
async fn test_denied_port_request() {
    let device = serial_repl_bridge::MockDevice::new("MOCK0");
    let manager = SessionManager::new(
        Arc::new(device.platform().denying("no port selected")),
        common::fast_settings(),
    );

    assert!(!manager.open(115_200).await);
    assert!(!device.is_open());
    assert!(manager.logs().console.joined().contains("no port selected"));
}

#[tokio::test]
async fn test_device_hang_up_ends_receive_loop_but_keeps_session() {
    // Arrange
    let (device, manager) = bridge("MOCK0");
    open(&manager).await;

    // Act
    device.hang_up();
    wait_for_diagnostic(&manager, "Reader closed.\n").await;

    // Assert
    assert!(manager.is_connected().await, "session stays until close");
    let mut receiving = true;
    for _ in 0..100 {
        receiving = manager
            .session_info()
            .await
            .is_some_and(|info| info.receiving);
        if !receiving {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!receiving);

    assert!(manager.close().await);
    assert!(!device.is_open());
    assert!(!device.reader_locked());
    assert!(!device.writer_locked());
    assert!(!device.events().contains(&"reader.cancel"));
}

#[tokio::test]
async fn test_read_fault_is_reported() {
    let (device, manager) = bridge("MOCK0");
    open(&manager).await;

    device.fail_read("framing error");
    wait_for_diagnostic(&manager, "An error occurred while reading:").await;

    assert!(manager.logs().console.joined().contains("framing error"));
    assert!(manager.close().await);
    assert!(!device.reader_locked());
}

#[tokio::test(start_paused = true)]
async fn test_close_interrupts_stalled_write() {
    // Arrange: the device stops draining its input
    let (device, manager) = bridge("MOCK0");
    let manager = Arc::new(manager);
    open(&manager).await;
    device.set_stall_writes(true);

    let sender = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.send("x\r").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Act
    let closed = tokio::time::timeout(Duration::from_secs(2), manager.close()).await;

    // Assert
    assert!(matches!(closed, Ok(true)), "close must not wait on the write");
    let sent = sender.await.expect("send task panicked");
    assert!(matches!(sent, Err(BridgeError::SessionClosed)));
    assert!(manager.logs().sent.is_empty());
    assert!(!device.is_open());
    assert!(!device.writer_locked());
}

#[tokio::test(start_paused = true)]
async fn test_close_ends_pending_prompt_wait() {
    // Arrange: a command is outstanding and the device never answers
    let (_device, manager) = bridge("MOCK0");
    let manager = Arc::new(manager);
    open(&manager).await;
    manager.send("x\r").await.unwrap();

    let waiter = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let result = manager.wait_for_prompt_with(Duration::from_secs(3)).await;
            (result, started.elapsed())
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Act
    assert!(manager.close().await);

    // Assert
    let (result, elapsed) = waiter.await.expect("wait task panicked");
    assert!(matches!(result, Err(BridgeError::SessionClosed)), "{result:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_batch_mid_way() {
    let (device, manager) = bridge("MOCK0");
    let manager = Arc::new(manager);
    open(&manager).await;

    let batch = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.send_batch(["a", "b"]).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.close().await;

    let result = batch.await.expect("batch task panicked");
    assert!(matches!(result, Err(BridgeError::SessionClosed)));
    assert_eq!(device.writes(), vec![b"a\r".to_vec()]);
}

#[tokio::test]
async fn test_send_after_reopen_is_not_treated_as_closed() {
    let (device, manager) = bridge("MOCK0");
    open(&manager).await;
    manager.close().await;

    open(&manager).await;
    manager.send("y\r").await.unwrap();

    assert_eq!(device.writes(), vec![b"y\r".to_vec()]);
    manager.close().await;
}
