//! Configuration loading and validation for quill.
//!
//! Loads configuration from `~/.quill/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The root configuration structure.
///
/// Maps directly to `~/.quill/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    /// Context budget configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Turn loop configuration
    #[serde(default)]
    pub turn: TurnConfig,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "qwen2.5-coder:14b".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("context", &self.context)
            .field("turn", &self.turn)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget the history must stay under
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Number of most recent messages never summarized away
    #[serde(default = "default_preserved_window")]
    pub preserved_window: usize,
}

fn default_token_budget() -> usize {
    24_000
}
fn default_preserved_window() -> usize {
    6
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            preserved_window: default_preserved_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Cap on stream/dispatch iterations within one turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Send attempts per stream, including the first
    #[serde(default = "default_max_attempts")]
    pub max_send_attempts: u32,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_max_attempts() -> u32 {
    3
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_send_attempts: default_max_attempts(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.quill/config.toml).
    ///
    /// Also checks environment variables:
    /// - `QUILL_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `QUILL_BASE_URL`
    /// - `QUILL_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(key) = std::env::var("QUILL_API_KEY") {
            config.api_key = Some(key);
        } else if config.api_key.is_none() {
            config.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        if let Ok(base_url) = std::env::var("QUILL_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(model) = std::env::var("QUILL_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".quill")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.context.token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "context.token_budget must be greater than zero".into(),
            ));
        }

        if self.turn.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "turn.max_iterations must be greater than zero".into(),
            ));
        }

        if self.turn.max_send_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "turn.max_send_attempts must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            context: ContextConfig::default(),
            turn: TurnConfig::default(),
        }
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
