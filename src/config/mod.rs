//! Configuration management for NetSentry
//!
//! This module handles loading, parsing, and managing configuration from:
//! 1. Embedded default_config.toml (compile-time defaults)
//! 2. User config at ~/.config/netsentry/config.toml (or platform-specific location)

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default configuration embedded in binary
const DEFAULT_CONFIG: &str = include_str!("../../default_config.toml");

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine process settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Explicit path to the engine binary; overrides path resolution
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// Extra arguments passed to the engine (development only; the packaged
    /// engine takes none)
    #[serde(default)]
    pub args: Vec<String>,
}

/// Feed connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Engine event stream endpoint
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Delay before the first connection attempt after spawning the engine
    #[serde(default = "default_grace_delay_ms")]
    pub grace_delay_ms: u64,
    /// Fixed interval between attempts while the connection is refused
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            grace_delay_ms: default_grace_delay_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl FeedConfig {
    /// Grace delay as a `Duration`
    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }

    /// Retry interval as a `Duration`
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Identity service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the external identity service
    #[serde(default = "default_identity_url")]
    pub identity_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_url: default_identity_url(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Include timestamps in console output
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Include file/line info
    #[serde(default)]
    pub file_line: bool,
    /// Enable rolling file output
    #[serde(default = "default_true")]
    pub file_output: bool,
    /// Log files directory (defaults to the platform data dir)
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: true,
            file_line: false,
            file_output: true,
            file_dir: None,
        }
    }
}

// Default value functions
fn default_feed_url() -> String {
    "ws://127.0.0.1:8000/ws".to_string()
}

fn default_grace_delay_ms() -> u64 {
    2500
}

fn default_retry_interval_ms() -> u64 {
    3000
}

fn default_identity_url() -> String {
    "https://identity.netsentry.dev".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration with fallback chain:
    /// 1. User config ~/.config/netsentry/config.toml
    /// 2. Embedded default_config.toml
    pub fn load() -> ConfigResult<Self> {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse default config: {}", e))
        })?;

        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::load_from_file(&user_config_path) {
                    Ok(user_config) => {
                        config = user_config;
                        tracing::info!("Loaded user config from {:?}", user_config_path);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load user config: {}", e);
                    }
                }
            }
        }

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound { path: path.clone() });
        }

        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get the user config path (~/.config/netsentry/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config_dir| config_dir.join("netsentry").join("config.toml"))
    }

    /// Save configuration to the user config path
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::user_config_path().ok_or_else(|| {
            ConfigError::ParseError("Could not determine user config directory".to_string())
        })?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.feed.url, "ws://127.0.0.1:8000/ws");
        assert_eq!(config.feed.grace_delay_ms, 2500);
        assert_eq!(config.feed.retry_interval_ms, 3000);
        assert!(config.engine.binary.is_none());
    }

    #[test]
    fn test_defaults_match_embedded() {
        let embedded: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        let programmatic = AppConfig::default();
        assert_eq!(embedded.feed.url, programmatic.feed.url);
        assert_eq!(
            embedded.feed.grace_delay_ms,
            programmatic.feed.grace_delay_ms
        );
        assert_eq!(
            embedded.feed.retry_interval_ms,
            programmatic.feed.retry_interval_ms
        );
        assert_eq!(embedded.logging.level, programmatic.logging.level);
    }

    #[test]
    fn test_duration_helpers() {
        let feed = FeedConfig::default();
        assert_eq!(feed.grace_delay(), Duration::from_millis(2500));
        assert_eq!(feed.retry_interval(), Duration::from_millis(3000));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig = toml::from_str("[feed]\nurl = \"ws://127.0.0.1:9100/ws\"\n").unwrap();
        assert_eq!(config.feed.url, "ws://127.0.0.1:9100/ws");
        assert_eq!(config.feed.grace_delay_ms, 2500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.engine.binary = Some(PathBuf::from("/tmp/engine"));
        config.feed.retry_interval_ms = 500;

        let toml_string = toml::to_string_pretty(&config).unwrap();
        std::fs::write(&path, toml_string).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.engine.binary, Some(PathBuf::from("/tmp/engine")));
        assert_eq!(loaded.feed.retry_interval_ms, 500);
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = AppConfig::load_from_file(&PathBuf::from("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
