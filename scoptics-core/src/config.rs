//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/scoptics/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/scoptics/` (~/.config/scoptics/)
//! - Data: `$XDG_DATA_HOME/scoptics/` (~/.local/share/scoptics/)
//! - State/Logs: `$XDG_STATE_HOME/scoptics/` (~/.local/state/scoptics/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

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
    /// Language-model provider configuration (required to answer questions)
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    /// Query pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Rule-based detector parameters
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider type
    pub provider: LlmProvider,
    /// Model used for planning, SQL generation, validation and summaries
    pub model: String,
    /// Cheaper model for the cluster/individual decision (defaults to `model`)
    pub fast_model: Option<String>,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    /// API key (can also use env var)
    pub api_key: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_timeout() -> u64 {
    120
}

/// Supported LLM providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    Claude,
    OpenAI,
}

impl LlmProvider {
    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::Claude => "https://api.anthropic.com",
            LlmProvider::OpenAI => "https://api.openai.com",
        }
    }

    /// Environment variable consulted when `api_key` is not set
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            LlmProvider::Ollama => None,
            LlmProvider::Claude => Some("ANTHROPIC_API_KEY"),
            LlmProvider::OpenAI => Some("OPENAI_API_KEY"),
        }
    }
}

/// Query pipeline configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Re-plans allowed after the first attempt fails validation
    #[serde(default = "default_max_heal_retries")]
    pub max_heal_retries: u32,

    /// Largest frame gap that still merges a detection into the running event
    #[serde(default = "default_cluster_max_gap")]
    pub cluster_max_gap: u64,

    /// Rows included verbatim in the summarization prompt
    #[serde(default = "default_max_summary_rows")]
    pub max_result_rows_for_summary: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_heal_retries: default_max_heal_retries(),
            cluster_max_gap: default_cluster_max_gap(),
            max_result_rows_for_summary: default_max_summary_rows(),
        }
    }
}

fn default_max_heal_retries() -> u32 {
    2
}

fn default_cluster_max_gap() -> u64 {
    10
}

fn default_max_summary_rows() -> usize {
    50
}

/// Parameters for the 2v1 final-third detector
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Pitch length in metres
    #[serde(default = "default_pitch_length")]
    pub pitch_length: f64,

    /// Radius around the ball in which players count as involved
    #[serde(default = "default_local_radius")]
    pub local_radius: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pitch_length: default_pitch_length(),
            local_radius: default_local_radius(),
        }
    }
}

fn default_pitch_length() -> f64 {
    105.0
}

fn default_local_radius() -> f64 {
    10.0
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
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the LLM section or a configuration error naming what is missing
    pub fn require_llm(&self) -> Result<&LlmConfig> {
        self.llm.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "[llm] section is required in {}",
                Self::config_path().display()
            ))
        })
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/scoptics/config.toml` (~/.config/scoptics/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("scoptics").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("scoptics")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("scoptics")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/scoptics/tracking.db` (~/.local/share/scoptics/tracking.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("tracking.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("scoptics.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// CLI binaries call this once at startup so every later path lookup agrees.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
