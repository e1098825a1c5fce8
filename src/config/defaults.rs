//! Default values for configuration
//!
//! Values that operators commonly set through the container environment fall
//! back to the matching environment variable before the built-in default.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

fn env_parse<T: FromStr>(key: &str, fallback: T) -> T {
    match std::env::var(key) {
        Ok(v) => match v.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Ignoring unparseable {}={:?}", key, v);
                fallback
            }
        },
        Err(_) => fallback,
    }
}

/// Fail if `key` is set but does not parse as `T`
pub(crate) fn check_env<T: FromStr>(key: &str) -> Result<()> {
    match std::env::var(key) {
        Ok(v) if v.trim().parse::<T>().is_err() => Err(Error::Config(format!(
            "Environment variable {} has an invalid value: {:?}",
            key, v
        ))),
        _ => Ok(()),
    }
}

/// Numeric settings read from the environment must parse
pub(crate) fn check_numeric_env() -> Result<()> {
    check_env::<u16>("API_PORT")?;
    check_env::<u64>("REQUEST_TIMEOUT")?;
    check_env::<usize>("BATCH_SIZE")?;
    Ok(())
}

fn env_flag(key: &str, fallback: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => v.trim().eq_ignore_ascii_case("true"),
        Err(_) => fallback,
    }
}

/// Default bind address
pub fn default_host() -> String {
    std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
}

/// Default listen port
pub fn default_port() -> u16 {
    env_parse("API_PORT", 8080)
}

/// Default request timeout in seconds
pub fn default_request_timeout() -> u64 {
    env_parse("REQUEST_TIMEOUT", 30)
}

/// Default health check timeout in seconds
pub fn default_health_check_timeout() -> u64 {
    5
}

/// Default cross-encoder model
pub fn default_model_name() -> String {
    std::env::var("MODEL_NAME").unwrap_or_else(|_| "BAAI/bge-reranker-base".to_string())
}

/// Default model cache directory
pub fn default_model_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MODEL_CACHE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("code-reranker")
        .join("models")
}

/// Default device selector (cpu, cuda or auto)
pub fn default_device() -> String {
    std::env::var("DEVICE").unwrap_or_else(|_| "auto".to_string())
}

/// Default: don't force CPU inference
pub fn default_force_cpu() -> bool {
    env_flag("FORCE_CPU", false)
}

/// Default maximum token length per (query, document) pair
pub fn default_model_max_length() -> usize {
    512
}

/// Default: show model download progress
pub fn default_show_download_progress() -> bool {
    true
}

/// Default scoring batch size
pub fn default_batch_size() -> usize {
    env_parse("BATCH_SIZE", 32)
}

/// Default number of results returned per request
pub fn default_max_results() -> usize {
    20
}

/// Upper bound for max_results
pub fn default_max_allowed_results() -> usize {
    100
}

/// Maximum characters per document
pub fn default_max_document_chars() -> usize {
    10_000
}

/// Default: warm the model up at startup
pub fn default_warmup_on_start() -> bool {
    env_flag("WARMUP_ON_START", true)
}

/// Default log level
pub fn default_log_level() -> String {
    std::env::var("LOG_LEVEL")
        .map(|v| v.to_lowercase())
        .unwrap_or_else(|_| "info".to_string())
}

/// Default log format (text or json)
pub fn default_log_format() -> String {
    std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string())
}
