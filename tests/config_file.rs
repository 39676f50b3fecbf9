//! Loading configuration files into session settings.

use pretty_assertions::assert_eq;
use serial_repl_bridge::config::{ConfigError, ConfigLoader};
use serial_repl_bridge::port::Parity;
use serial_test::serial;
use std::time::Duration;
use tempfile::TempDir;

const SAMPLE: &str = r#"
[serial]
port = "board"
default_baud = 57600
parity = "even"

[serial.port_aliases]
board = "/dev/ttyACM0"

[prompt]
marker = "=> "
poll_interval_ms = 20
timeout_ms = 1500
"#;

#[test]
#[serial]
fn test_file_values_reach_session_settings() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repl-bridge.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    // Act
    let loader = ConfigLoader::load_from(&path).unwrap();
    let config = loader.config();
    let settings = config.session_settings();

    // Assert
    assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
    assert_eq!(config.serial.resolved_port().as_deref(), Some("/dev/ttyACM0"));
    assert_eq!(settings.prompt, "=> ");
    assert_eq!(settings.poll_interval, Duration::from_millis(20));
    assert_eq!(settings.prompt_timeout, Duration::from_millis(1500));
    assert_eq!(settings.line_terminator, "\r");
    assert_eq!(settings.port.baud_rate, 57_600);
    assert_eq!(settings.port.parity, Parity::Even);
}

#[test]
#[serial]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = ConfigLoader::load_from(&path).unwrap_err();

    assert!(matches!(err, ConfigError::NotFound(p) if p == path));
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repl-bridge.toml");
    std::fs::write(&path, "[prompt]\nmarker = \"   \"\n").unwrap();

    let err = ConfigLoader::load_from(&path).unwrap_err();

    assert!(err.to_string().contains("prompt.marker"));
}

#[test]
#[serial]
fn test_malformed_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repl-bridge.toml");
    std::fs::write(&path, "[serial\nport = ").unwrap();

    assert!(matches!(
        ConfigLoader::load_from(&path),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
#[serial]
fn test_save_then_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("repl-bridge.toml");

    let mut loader = ConfigLoader::with_defaults();
    loader.config.prompt.timeout_ms = 750;
    loader.save_to(&path).unwrap();

    let reloaded = ConfigLoader::load_from(&path).unwrap();
    assert_eq!(reloaded.config().prompt.timeout_ms, 750);
    assert_eq!(reloaded.config(), loader.config());
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repl-bridge.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    std::env::set_var("REPL_BRIDGE_PROMPT_TIMEOUT_MS", "3000");

    let loader = ConfigLoader::load_from(&path);
    std::env::remove_var("REPL_BRIDGE_PROMPT_TIMEOUT_MS");

    assert_eq!(loader.unwrap().config().prompt.timeout_ms, 3000);
}

#[test]
#[serial]
fn test_save_writes_back_to_loaded_file() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repl-bridge.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    let mut loader = ConfigLoader::load_from(&path).unwrap();

    // Act
    loader.config.prompt.marker = "$ ".to_string();
    loader.save().unwrap();

    // Assert
    let reread = ConfigLoader::load_from(&path).unwrap();
    assert_eq!(reread.config().prompt.marker, "$ ");
    assert_eq!(reread.config().serial.default_baud, 57_600);
}

#[test]
#[serial]
fn test_save_without_path() {
    let loader = ConfigLoader::with_defaults();

    assert!(matches!(loader.save(), Err(ConfigError::NoPath)));
}

#[test]
#[serial]
fn test_reload_picks_up_file_changes() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repl-bridge.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    let mut loader = ConfigLoader::load_from(&path).unwrap();

    // Act
    std::fs::write(&path, "[prompt]\ntimeout_ms = 9000\n").unwrap();
    loader.reload().unwrap();

    // Assert
    assert_eq!(loader.config().prompt.timeout_ms, 9000);
    assert_eq!(loader.config().serial.default_baud, 115_200);
}

#[test]
#[serial]
fn test_reload_keeps_previous_config_on_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repl-bridge.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    let mut loader = ConfigLoader::load_from(&path).unwrap();

    std::fs::write(&path, "[serial]\ndefault_baud = 0\n").unwrap();
    let err = loader.reload().unwrap_err();

    assert!(err.to_string().contains("serial.default_baud"));
    assert_eq!(loader.config().serial.default_baud, 57_600);
}
