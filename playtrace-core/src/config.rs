//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/playtrace/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/playtrace/` (~/.config/playtrace/)
//! - Data: `$XDG_DATA_HOME/playtrace/` (~/.local/share/playtrace/)
//! - State/Logs: `$XDG_STATE_HOME/playtrace/` (~/.local/state/playtrace/)
//!
//! The loaded [`Config`] is passed explicitly to whatever needs it; nothing
//! reads configuration from global state.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Steam Web API credentials and tracked players
    #[serde(default)]
    pub steam: SteamConfig,

    /// Polling schedule
    #[serde(default)]
    pub polling: PollingConfig,

    /// Snapshot database settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Steam Web API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SteamConfig {
    /// API key (the environment variable named by `api_key_env_var` wins)
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,

    /// Players to poll
    #[serde(default)]
    pub players: Vec<PlayerConfig>,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env_var: default_api_key_env_var(),
            players: vec![],
        }
    }
}

fn default_api_key_env_var() -> String {
    "STEAM_WEB_API_KEY".to_string()
}

impl SteamConfig {
    /// Resolve the API key: environment first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env_var)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .or_else(|| {
                self.api_key
                    .as_ref()
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
            })
    }

    /// Players that carry at least a steamid or a vanity URL.
    pub fn players(&self) -> Vec<PlayerConfig> {
        self.players
            .iter()
            .map(PlayerConfig::trimmed)
            .filter(|p| p.steamid.is_some() || p.vanity_url.is_some())
            .collect()
    }
}

/// One tracked player
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PlayerConfig {
    /// 64-bit Steam id
    pub steamid: Option<String>,
    /// Custom profile URL name, resolved to a steamid when `steamid` is absent
    pub vanity_url: Option<String>,
}

impl PlayerConfig {
    fn trimmed(&self) -> Self {
        let clean = |v: &Option<String>| {
            v.as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Self {
            steamid: clean(&self.steamid),
            vanity_url: clean(&self.vanity_url),
        }
    }
}

/// Polling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    /// Seconds between poll cycles in watch mode
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_poll_timeout() -> u64 {
    20
}

/// Snapshot database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Override for the database file (default: XDG data dir)
    pub database_path: Option<PathBuf>,

    /// Upper bound on waiting for a competing writer, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate values that have no sensible fallback
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_seconds == 0 {
            return Err(Error::Config(
                "polling.interval_seconds must be a positive integer".to_string(),
            ));
        }
        if self.polling.timeout_secs == 0 {
            return Err(Error::Config(
                "polling.timeout_secs must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Database file to use: the configured override or the XDG default
    pub fn resolved_database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/playtrace/config.toml` (~/.config/playtrace/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("playtrace").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/playtrace/` (~/.local/share/playtrace/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("playtrace")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/playtrace/` (~/.local/state/playtrace/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("playtrace")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/playtrace/data.db` (~/.local/share/playtrace/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/playtrace/playtrace.log` (~/.local/state/playtrace/playtrace.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("playtrace.log")
    }
}
