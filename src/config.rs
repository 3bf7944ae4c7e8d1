//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Story store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("ephemera").to_string_lossy().to_string())
        .unwrap_or_else(|| "./ephemera_data".to_string())
}

fn default_sweep_interval() -> u64 {
    60 // 1 minute
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Playback timing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSettings {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_photo_duration")]
    pub photo_duration_ms: u64,

    /// Skip a stalled media item after this many milliseconds (unset
    /// disables the guard)
    #[serde(default)]
    pub stall_grace_ms: Option<u64>,
}

fn default_tick_ms() -> u64 {
    50
}

fn default_photo_duration() -> u64 {
    5000 // 5 seconds
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            photo_duration_ms: default_photo_duration(),
            stall_grace_ms: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("ephemera").join("config.toml")),
            Some(PathBuf::from("/etc/ephemera/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = std::env::var("EPHEMERA_DATA_DIR") {
            self.store.data_dir = data_dir;
        }
        if let Ok(secs) = std::env::var("EPHEMERA_SWEEP_INTERVAL_SECS") {
            if let Ok(s) = secs.parse() {
                self.store.sweep_interval_secs = s;
            }
        }

        if let Ok(tick) = std::env::var("EPHEMERA_TICK_MS") {
            if let Ok(t) = tick.parse() {
                self.playback.tick_ms = t;
            }
        }

        if let Ok(level) = std::env::var("EPHEMERA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("EPHEMERA_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Store-layer view of this configuration
    pub fn store_config(&self) -> crate::store::StoreConfig {
        crate::store::StoreConfig {
            sweep_interval_secs: self.store.sweep_interval_secs,
        }
    }

    /// Playback-session view of this configuration
    pub fn session_config(&self) -> crate::playback::SessionConfig {
        crate::playback::SessionConfig {
            machine: crate::playback::MachineConfig {
                tick_ms: self.playback.tick_ms,
                photo_duration_ms: self.playback.photo_duration_ms,
            },
            stall_grace_ms: self.playback.stall_grace_ms,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            playback: PlaybackSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Ephemera Configuration
#
# Environment variables override these settings:
# - EPHEMERA_DATA_DIR
# - EPHEMERA_SWEEP_INTERVAL_SECS
# - EPHEMERA_TICK_MS
# - EPHEMERA_LOG_LEVEL
# - EPHEMERA_LOG_FORMAT

[store]
# Directory for persisted collections (one JSON file per key)
data_dir = "~/.local/share/ephemera"

# How often the expiration sweep purges expired stories (seconds)
sweep_interval_secs = 60

[playback]
# Progress polling interval (ms)
tick_ms = 50

# Display duration for photos (ms)
photo_duration_ms = 5000

# Skip a media item that never reports ready after this long (ms).
# Comment out to wait indefinitely.
# stall_grace_ms = 10000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/ephemera/ephemera.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.sweep_interval_secs, 60);
        assert_eq!(config.playback.tick_ms, 50);
        assert_eq!(config.playback.photo_duration_ms, 5000);
        assert!(config.playback.stall_grace_ms.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_generated_config_parses() {
        let generated = generate_default_config();
        let config: Config = toml::from_str(&generated).unwrap();
        assert_eq!(config.playback.tick_ms, 50);
        assert_eq!(config.store.sweep_interval_secs, 60);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[playback]\ntick_ms = 100\n").unwrap();
        assert_eq!(config.playback.tick_ms, 100);
        assert_eq!(config.playback.photo_duration_ms, 5000);
        assert_eq!(config.store.sweep_interval_secs, 60);
    }
}
