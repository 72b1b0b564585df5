//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/gamidash/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/gamidash/` (~/.config/gamidash/)
//! - Data: `$XDG_DATA_HOME/gamidash/` (~/.local/share/gamidash/)
//! - State/Logs: `$XDG_STATE_HOME/gamidash/` (~/.local/state/gamidash/)

use crate::error::{Error, Result};
use chrono::{FixedOffset, Local, Offset};
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
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database location and behavior
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Dashboard aggregation settings
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Database file (defaults to the XDG data directory)
    pub path: Option<PathBuf>,

    /// How long a statement waits on a locked database
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Configured path, or `$XDG_DATA_HOME/gamidash/data.db`
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Config::database_path)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Dashboard aggregation settings
#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    /// UTC offset used for calendar arithmetic, e.g. "+07:00".
    /// Defaults to the host's current local offset.
    pub utc_offset: Option<String>,

    /// Time budget for each aggregate query in milliseconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_ms: u64,

    /// Size of the student leaderboard
    #[serde(default = "default_top_students_limit")]
    pub top_students_limit: usize,

    /// Rows pulled from each completion source before merging
    #[serde(default = "default_activity_limit")]
    pub activity_source_limit: usize,

    /// Size of the merged activity feed
    #[serde(default = "default_activity_limit")]
    pub recent_activity_limit: usize,

    /// Number of active challenges with progress
    #[serde(default = "default_challenge_progress_limit")]
    pub challenge_progress_limit: usize,

    /// Trailing window for the activity feed when the period is unbounded.
    /// `None` means the feed reads all history.
    #[serde(default)]
    pub unbounded_activity_window_days: Option<u32>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            utc_offset: None,
            query_timeout_ms: default_query_timeout(),
            top_students_limit: default_top_students_limit(),
            activity_source_limit: default_activity_limit(),
            recent_activity_limit: default_activity_limit(),
            challenge_progress_limit: default_challenge_progress_limit(),
            unbounded_activity_window_days: None,
        }
    }
}

fn default_query_timeout() -> u64 {
    5000
}

fn default_top_students_limit() -> usize {
    10
}

fn default_activity_limit() -> usize {
    10
}

fn default_challenge_progress_limit() -> usize {
    5
}

/// Widest offset in use anywhere (UTC+14).
const MAX_UTC_OFFSET_SECS: i32 = 14 * 3600;

/// Longest trailing activity window, roughly a century.
pub const MAX_ACTIVITY_WINDOW_DAYS: u32 = 36_500;

impl DashboardConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Offset for calendar arithmetic.
    pub fn offset(&self) -> Result<FixedOffset> {
        match &self.utc_offset {
            Some(raw) => parse_utc_offset(raw),
            None => Ok(Local::now().offset().fix()),
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout_ms == 0 {
            return Err(Error::Config(
                "dashboard.query_timeout_ms must be greater than 0".to_string(),
            ));
        }
        for (name, value) in [
            ("top_students_limit", self.top_students_limit),
            ("activity_source_limit", self.activity_source_limit),
            ("recent_activity_limit", self.recent_activity_limit),
            ("challenge_progress_limit", self.challenge_progress_limit),
        ] {
            if value == 0 {
                return Err(Error::Config(format!(
                    "dashboard.{} must be greater than 0",
                    name
                )));
            }
        }
        if let Some(days) = self.unbounded_activity_window_days {
            if days == 0 || days > MAX_ACTIVITY_WINDOW_DAYS {
                return Err(Error::Config(format!(
                    "dashboard.unbounded_activity_window_days must be between 1 and {}",
                    MAX_ACTIVITY_WINDOW_DAYS
                )));
            }
        }
        self.offset()?;
        Ok(())
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM`, `+HH` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    let offset = if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        FixedOffset::east_opt(0)
    } else if raw.len() == 3 {
        // "+HH" shorthand
        format!("{}:00", raw).parse::<FixedOffset>().ok()
    } else {
        raw.parse::<FixedOffset>().ok()
    };

    offset
        .filter(|o| o.local_minus_utc().abs() <= MAX_UTC_OFFSET_SECS)
        .ok_or_else(|| Error::Config(format!("invalid utc_offset {:?}", raw)))
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

    /// Also write human-readable logs to stderr
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            stderr: false,
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

        config.dashboard.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/gamidash/config.toml` (~/.config/gamidash/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("gamidash").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/gamidash/` (~/.local/share/gamidash/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("gamidash")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/gamidash/` (~/.local/state/gamidash/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("gamidash")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/gamidash/data.db` (~/.local/share/gamidash/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/gamidash/gamidash.log` (~/.local/state/gamidash/gamidash.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("gamidash.log")
    }
}
