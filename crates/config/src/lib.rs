//! Configuration loading, validation, and management for toolweave.
//!
//! Loads configuration from `~/.toolweave/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolweave_core::ExecutionStrategy;

/// The root configuration structure.
///
/// Maps directly to `~/.toolweave/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Loop behaviour
    #[serde(default)]
    pub agent: AgentSettings,

    /// Worker pool and timeouts
    #[serde(default)]
    pub execution: ExecutionSettings,

    /// Observation rendering
    #[serde(default)]
    pub observation: ObservationSettings,

    /// History store selection
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Log level and format
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub strategy: ExecutionStrategy,

    /// Persona text placed before the tool listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,

    /// Identical failing calls allowed before further attempts are blocked
    #[serde(default = "default_max_identical_failures")]
    pub max_identical_failures: u32,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_max_identical_failures() -> u32 {
    3
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            strategy: ExecutionStrategy::default(),
            introduction: None,
            max_identical_failures: default_max_identical_failures(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-call timeout; 0 disables it
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_timeout_secs: Option<u64>,

    /// How long in-flight calls may run past the session deadline
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

fn default_max_workers() -> usize {
    5
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_grace_period_ms() -> u64 {
    2000
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            tool_timeout_secs: default_tool_timeout_secs(),
            session_timeout_secs: None,
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

impl ExecutionSettings {
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }

    /// Zero disables the deadline, as with `tool_timeout_secs`.
    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationSettings {
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

fn default_max_output_chars() -> usize {
    4000
}

impl Default for ObservationSettings {
    fn default() -> Self {
        Self {
            max_output_chars: default_max_output_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "none", "in_memory" or "file"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// JSONL path for the file backend (defaults under the config dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Keep only the last N records (in_memory backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
}

fn default_memory_backend() -> String {
    "none".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            window: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const MEMORY_BACKENDS: &[&str] = &["none", "in_memory", "file"];

impl AppConfig {
    /// Load configuration from the default path (~/.toolweave/config.toml).
    ///
    /// Environment variables override file values:
    /// - `TOOLWEAVE_MAX_ITERATIONS`
    /// - `TOOLWEAVE_MAX_WORKERS`
    /// - `TOOLWEAVE_STRATEGY`
    /// - `TOOLWEAVE_LOG`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_path();
        let mut config = Self::read_file(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file location, `~/.toolweave/config.toml`.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Message to log once tracing is up when `path` was absent and defaults were used.
    pub fn missing_file_notice(path: &Path) -> Option<String> {
        (!path.exists()).then(|| format!("No config file found at {}, using defaults", path.display()))
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("TOOLWEAVE_MAX_ITERATIONS") {
            self.agent.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("TOOLWEAVE_MAX_ITERATIONS is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = lookup("TOOLWEAVE_MAX_WORKERS") {
            self.execution.max_workers = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("TOOLWEAVE_MAX_WORKERS is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = lookup("TOOLWEAVE_STRATEGY") {
            self.agent.strategy = raw.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(level) = lookup("TOOLWEAVE_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolweave")
    }

    /// Path of the JSONL history file, configured or default.
    pub fn history_path(&self) -> PathBuf {
        self.memory
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("history.jsonl"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.execution.max_workers == 0 {
            return Err(ConfigError::ValidationError(
                "execution.max_workers must be at least 1".into(),
            ));
        }

        if !MEMORY_BACKENDS.contains(&self.memory.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend must be one of {}, got '{}'",
                MEMORY_BACKENDS.join(", "),
                self.memory.backend
            )));
        }

        if self.memory.window == Some(0) {
            return Err(ConfigError::ValidationError(
                "memory.window must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
