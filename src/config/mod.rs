//! Configuration management for code-reranker
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::DeviceSelector;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Hard ceiling on results per request
pub const MAX_RESULTS_LIMIT: usize = 100;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Cross-encoder model configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Reranking configuration
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path the config was loaded from (internal, not user-editable)
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Overall timeout for a rerank request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for the health check model probe in seconds
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_secs: u64,
}

/// Cross-encoder model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name/identifier
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Where downloaded model files are cached
    #[serde(default = "default_model_cache_dir")]
    pub cache_dir: PathBuf,

    /// Inference device: cpu, cuda or auto
    #[serde(default = "default_device")]
    pub device: String,

    /// Force CPU inference regardless of `device`
    #[serde(default = "default_force_cpu")]
    pub force_cpu: bool,

    /// Maximum token length of a (query, document) pair
    #[serde(default = "default_model_max_length")]
    pub max_length: usize,

    /// Show a progress bar while downloading model files
    #[serde(default = "default_show_download_progress")]
    pub show_download_progress: bool,
}

/// Reranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Pairs scored per model call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Results returned when a request doesn't specify max_results
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Largest max_results a request may ask for
    #[serde(default = "default_max_allowed_results")]
    pub max_allowed_results: usize,

    /// Maximum characters per document content
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,

    /// Run a synthetic rerank at startup to load model weights
    #[serde(default = "default_warmup_on_start")]
    pub warmup_on_start: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: text or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            health_check_timeout_secs: default_health_check_timeout(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            cache_dir: default_model_cache_dir(),
            device: default_device(),
            force_cpu: default_force_cpu(),
            max_length: default_model_max_length(),
            show_download_progress: default_show_download_progress(),
        }
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            default_max_results: default_max_results(),
            max_allowed_results: default_max_allowed_results(),
            max_document_chars: default_max_document_chars(),
            warmup_on_start: default_warmup_on_start(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ServerConfig {
    /// Request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Health probe timeout as a Duration
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    /// `host:port` string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Get the default base directory (~/.code-reranker)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".code-reranker")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.config_file = config_path.to_path_buf();

        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from the default path when it exists,
    /// or fall back to defaults (environment applied).
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Self::default_config_path();
        if default_path.exists() {
            return Self::load(&default_path);
        }

        debug!("No config file found, using defaults");
        let config = Config {
            config_file: default_path,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `self.config_file`
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.config_file, content)?;
        info!("Saved config to {:?}", self.config_file);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        defaults::check_numeric_env()?;

        if self.server.port == 0 {
            return Err(Error::Config("server.port must be 1-65535".to_string()));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(Error::Config(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }

        if self.server.health_check_timeout_secs == 0 {
            return Err(Error::Config(
                "server.health_check_timeout_secs must be positive".to_string(),
            ));
        }

        if self.rerank.batch_size == 0 {
            return Err(Error::Config("rerank.batch_size must be positive".to_string()));
        }

        if self.rerank.max_allowed_results == 0
            || self.rerank.max_allowed_results > MAX_RESULTS_LIMIT
        {
            return Err(Error::Config(format!(
                "rerank.max_allowed_results must be between 1 and {}",
                MAX_RESULTS_LIMIT
            )));
        }

        if self.rerank.default_max_results == 0
            || self.rerank.default_max_results > self.rerank.max_allowed_results
        {
            return Err(Error::Config(format!(
                "rerank.default_max_results must be between 1 and {}",
                self.rerank.max_allowed_results
            )));
        }

        if self.rerank.max_document_chars == 0 {
            return Err(Error::Config(
                "rerank.max_document_chars must be positive".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::Config(format!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }

        self.model.device.parse::<DeviceSelector>()?;

        Ok(())
    }
}
