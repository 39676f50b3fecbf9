//! Configuration module for the REPL bridge.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `REPL_BRIDGE_CONFIG` environment variable (explicit path)
//! 2. `./repl-bridge.toml` (current directory)
//! 3. `repl-bridge.toml` in the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `REPL_BRIDGE_<SECTION>_<KEY>`:
//! - `REPL_BRIDGE_SERIAL_PORT=/dev/ttyACM0`
//! - `REPL_BRIDGE_SERIAL_BAUD=115200`
//! - `REPL_BRIDGE_PROMPT_MARKER=">>>"`
//! - `REPL_BRIDGE_PROMPT_POLL_INTERVAL_MS=50`
//! - `REPL_BRIDGE_PROMPT_TIMEOUT_MS=5000`
//! - `REPL_BRIDGE_LOGGING_LEVEL=debug`
//! - `REPL_BRIDGE_LOGGING_FORMAT=json`
//!
//! # Example
//!
//! ```rust,ignore
//! use serial_repl_bridge::config::ConfigLoader;
//!
//! let config = ConfigLoader::load()?.into_config();
//! let settings = config.session_settings();
//! println!("prompt: {:?}, timeout: {:?}", settings.prompt, settings.prompt_timeout);
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult, FileAction};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, PromptConfig, SerialConfig};
