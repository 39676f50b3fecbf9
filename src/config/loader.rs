//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult, FileAction};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "REPL_BRIDGE";

/// Config file name
const CONFIG_FILE_NAME: &str = "repl-bridge.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "REPL_BRIDGE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `REPL_BRIDGE_CONFIG` environment variable (explicit path)
    /// 2. `./repl-bridge.toml` (current directory)
    /// 3. the platform config directory (`~/.config/repl-bridge/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values; the result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides still apply; invalid ones are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if apply_env_overrides(&mut config).is_err() || config.validate().is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.config_path.as_ref().ok_or(ConfigError::NoPath)?;
        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }

    /// Reload configuration from file (if path is set).
    pub fn reload(&mut self) -> ConfigResult<()> {
        if let Some(ref path) = self.config_path {
            let mut config = load_from_file(path)?;
            apply_env_overrides(&mut config)?;
            config.validate()?;
            self.config = config;
        }
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "repl-bridge").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::file(FileAction::Read, path, e))?;
    Ok(toml::from_str(&content)?)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::file(FileAction::Write, path, e))?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::file(FileAction::Write, path, e))
}

fn env_var(key: &str) -> Option<(String, String)> {
    let var = format!("{ENV_PREFIX}_{key}");
    std::env::var(&var).ok().map(|value| (var, value))
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str, what: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}")))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern `REPL_BRIDGE_<SECTION>_<KEY>`,
/// e.g. `REPL_BRIDGE_SERIAL_PORT=/dev/ttyACM0` or `REPL_BRIDGE_PROMPT_TIMEOUT_MS=10000`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some((_, value)) = env_var("SERIAL_PORT") {
        config.serial.port = Some(value);
    }
    if let Some((var, value)) = env_var("SERIAL_BAUD") {
        config.serial.default_baud = parse_env(&var, &value, "baud rate")?;
    }

    if let Some((_, value)) = env_var("PROMPT_MARKER") {
        config.prompt.marker = value;
    }
    if let Some((var, value)) = env_var("PROMPT_POLL_INTERVAL_MS") {
        config.prompt.poll_interval_ms = parse_env(&var, &value, "poll interval")?;
    }
    if let Some((var, value)) = env_var("PROMPT_TIMEOUT_MS") {
        config.prompt.timeout_ms = parse_env(&var, &value, "timeout")?;
    }

    if let Some((_, value)) = env_var("LOGGING_LEVEL") {
        config.logging.level = value;
    }
    if let Some((var, value)) = env_var("LOGGING_FORMAT") {
        config.logging.format = match value.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => return Err(ConfigError::env_parse(var, "Expected json, pretty or compact")),
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.default_baud, 115_200);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("REPL_BRIDGE_PROMPT_TIMEOUT_MS", "9999");
        env::set_var("REPL_BRIDGE_SERIAL_PORT", "/dev/ttyACM1");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().prompt.timeout_ms, 9999);
        assert_eq!(loader.config().serial.port.as_deref(), Some("/dev/ttyACM1"));

        env::remove_var("REPL_BRIDGE_PROMPT_TIMEOUT_MS");
        env::remove_var("REPL_BRIDGE_SERIAL_PORT");
    }

    #[test]
    #[serial]
    fn test_invalid_env_override_is_reported() {
        env::set_var("REPL_BRIDGE_SERIAL_BAUD", "fast");

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(err.to_string().contains("REPL_BRIDGE_SERIAL_BAUD"));

        // with_defaults falls back instead of failing
        assert_eq!(ConfigLoader::with_defaults().config().serial.default_baud, 115_200);

        env::remove_var("REPL_BRIDGE_SERIAL_BAUD");
    }
}
