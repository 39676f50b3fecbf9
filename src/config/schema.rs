//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits, DEFAULT_BAUD_RATE};
use crate::prompt::DEFAULT_PROMPT;
use crate::session::{SessionSettings, DEFAULT_LINE_TERMINATOR};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port configuration
    pub serial: SerialConfig,
    /// Prompt detection and command pacing
    pub prompt: PromptConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values that would make a session unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.default_baud == 0 {
            return Err(ConfigError::validation(
                "serial.default_baud",
                "must be greater than zero",
            ));
        }
        if self.prompt.marker.trim_end().is_empty() {
            return Err(ConfigError::validation(
                "prompt.marker",
                "must contain a non-whitespace character",
            ));
        }
        if self.prompt.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "prompt.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.prompt.timeout_ms < self.prompt.poll_interval_ms {
            return Err(ConfigError::validation(
                "prompt.timeout_ms",
                "must not be shorter than prompt.poll_interval_ms",
            ));
        }
        Ok(())
    }

    /// Settings for a [`SessionManager`](crate::SessionManager).
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            prompt: self.prompt.marker.clone(),
            poll_interval: self.prompt.poll_interval(),
            prompt_timeout: self.prompt.timeout(),
            line_terminator: self.prompt.line_terminator.clone(),
            port: self.serial.port_configuration(),
        }
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port to open; the first enumerated port when unset
    pub port: Option<String>,
    /// Baud rate used when none is given on the command line
    pub default_baud: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Driver timeout in milliseconds
    pub timeout_ms: u64,
    /// Port aliases for convenience
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            default_baud: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout_ms: 1000,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// The configured port, with aliases resolved.
    pub fn resolved_port(&self) -> Option<String> {
        self.port.as_deref().map(|p| self.resolve_port(p))
    }

    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.default_baud,
            data_bits: self.data_bits,
            flow_control: self.flow_control,
            parity: self.parity,
            stop_bits: self.stop_bits,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Prompt configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Text the device prints when ready; trailing whitespace is ignored
    pub marker: String,
    /// Poll interval of `wait_for_prompt` in milliseconds
    pub poll_interval_ms: u64,
    /// Prompt timeout in milliseconds
    pub timeout_ms: u64,
    /// Appended to each line of a batch
    pub line_terminator: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_PROMPT.to_string(),
            poll_interval_ms: 50,
            timeout_ms: 5000,
            line_terminator: DEFAULT_LINE_TERMINATOR.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}
