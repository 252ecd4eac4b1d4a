//! TOML Configuration File Support
//!
//! Centralized configuration loading for the transport and the HTTP/SSE
//! pipeline, from an optional TOML file at
//! `~/.config/dashstream/config.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. Environment variables (`DASHSCOPE_WS_*`, `DASHSCOPE_RECORD_CAPACITY`,
//!    `DASHSCOPE_REQUEST_TIMEOUT_SECS`)
//! 2. TOML configuration file
//! 3. Default values
//!
//! [`StreamConfigFile::source`] reports the highest layer that set a value.
//!
//! # XDG Base Directory Compliance
//!
//! - `$XDG_CONFIG_HOME/dashstream/config.toml` (typically `~/.config/dashstream/config.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [transport]
//! write_wait_ms = 30000
//! pong_wait_ms = 20000
//! max_message_size = 1024
//! outbound_capacity = 100
//! inbound_capacity = 100
//! connect_timeout_ms = 10000
//!
//! [pipeline]
//! record_capacity = 100
//! request_timeout_secs = 120
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::PipelineConfig;
use crate::transport::TransportConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Transport section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// Write deadline in milliseconds
    pub write_wait_ms: Option<u64>,

    /// Pong window (read deadline) in milliseconds
    pub pong_wait_ms: Option<u64>,

    /// Largest inbound message in bytes
    pub max_message_size: Option<usize>,

    /// Outbound queue capacity
    pub outbound_capacity: Option<usize>,

    /// Inbound queue capacity
    pub inbound_capacity: Option<usize>,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Pipeline section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineToml {
    /// Record channel capacity
    pub record_capacity: Option<usize>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Transport configuration section
    pub transport: TransportToml,

    /// Pipeline configuration section
    pub pipeline: PipelineToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved configuration for both pipelines
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct StreamConfigFile {
    /// Duplex transport configuration
    pub transport: TransportConfig,

    /// HTTP/SSE pipeline configuration
    pub pipeline: PipelineConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for StreamConfigFile {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            pipeline: PipelineConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl StreamConfigFile {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Reject values the pipelines cannot run with
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let transport = &self.transport;
        if transport.pong_wait.is_zero() {
            return Err(ConfigError::ValidationError(
                "transport.pong_wait must be greater than zero".to_string(),
            ));
        }
        if transport.max_message_size == 0 {
            return Err(ConfigError::ValidationError(
                "transport.max_message_size must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("transport.outbound_capacity", transport.outbound_capacity),
            ("transport.inbound_capacity", transport.inbound_capacity),
            ("transport.error_capacity", transport.error_capacity),
            ("pipeline.record_capacity", self.pipeline.record_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/dashstream/config.toml` or
/// `~/.config/dashstream/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dashstream").join("config.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting values are invalid. A missing config file is not an error.
pub fn load_config() -> Result<StreamConfigFile, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting values are invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<StreamConfigFile, ConfigError> {
    load_layers(path, |key| std::env::var(key).ok())
}

fn load_layers<F>(path: Option<PathBuf>, env: F) -> Result<StreamConfigFile, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = StreamConfigFile::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: StreamToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Environment overrides file values
    apply_env_config(&mut config, &env);

    config.validate()?;
    Ok(config)
}

fn apply_toml_config(config: &mut StreamConfigFile, toml: &StreamToml) {
    let transport = &toml.transport;
    if let Some(ms) = transport.write_wait_ms {
        config.transport.write_wait = Duration::from_millis(ms);
    }
    if let Some(ms) = transport.pong_wait_ms {
        config.transport.pong_wait = Duration::from_millis(ms);
    }
    if let Some(size) = transport.max_message_size {
        config.transport.max_message_size = size;
    }
    if let Some(capacity) = transport.outbound_capacity {
        config.transport.outbound_capacity = capacity;
    }
    if let Some(capacity) = transport.inbound_capacity {
        config.transport.inbound_capacity = capacity;
    }
    if let Some(ms) = transport.connect_timeout_ms {
        config.transport.connect_timeout = Duration::from_millis(ms);
    }

    if let Some(capacity) = toml.pipeline.record_capacity {
        config.pipeline.record_capacity = capacity;
    }
    if let Some(secs) = toml.pipeline.request_timeout_secs {
        config.pipeline.request_timeout = Duration::from_secs(secs);
    }
}

fn env_parse<T, F>(env: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = env(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

fn apply_env_config<F>(config: &mut StreamConfigFile, env: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(ms) = env_parse::<u64, _>(env, "DASHSCOPE_WS_WRITE_WAIT_MS") {
        config.transport.write_wait = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env_parse::<u64, _>(env, "DASHSCOPE_WS_PONG_WAIT_MS") {
        config.transport.pong_wait = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(size) = env_parse::<usize, _>(env, "DASHSCOPE_WS_MAX_MESSAGE_SIZE") {
        config.transport.max_message_size = size;
        config.source = ConfigSource::Env;
    }
    if let Some(ms) = env_parse::<u64, _>(env, "DASHSCOPE_WS_CONNECT_TIMEOUT_MS") {
        config.transport.connect_timeout = Duration::from_millis(ms);
        config.source = ConfigSource::Env;
    }
    if let Some(capacity) = env_parse::<usize, _>(env, "DASHSCOPE_RECORD_CAPACITY") {
        config.pipeline.record_capacity = capacity;
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = env_parse::<u64, _>(env, "DASHSCOPE_REQUEST_TIMEOUT_SECS") {
        config.pipeline.request_timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = StreamConfigFile::default();
        assert_eq!(config.transport, TransportConfig::default());
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("dashstream/config.toml"));
        }
    }

    #[test]
    fn test_parse_valid_toml() {
        let file = write_config(
            r#"
[transport]
write_wait_ms = 5000
pong_wait_ms = 10000
max_message_size = 4096
outbound_capacity = 32
connect_timeout_ms = 2500

[pipeline]
record_capacity = 16
request_timeout_secs = 30
"#,
        );

        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();

        // Environment overrides may race with other tests; check file-only keys
        assert_eq!(config.transport.outbound_capacity, 32);
        assert_eq!(config.transport.inbound_capacity, 100);
        assert_eq!(config.transport.ping_period(), config.transport.pong_wait * 8 / 10);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
        assert!(
            config.source() == ConfigSource::File || config.source() == ConfigSource::Env,
            "Expected File or Env source, got: {:?}",
            config.source()
        );
    }

    #[test]
    fn test_parse_empty_toml() {
        let file = write_config("");
        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.transport.outbound_capacity, 100);
        assert_eq!(config.transport.error_capacity, 1);
    }

    #[test]
    fn test_missing_file_graceful() {
        let path = PathBuf::from("/nonexistent/path/dashstream.toml");
        let config = load_config_from_path(Some(path)).unwrap();
        assert!(config.config_file_path.is_none());
        assert_ne!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = write_config(
            r#"
[transport
write_wait_ms = "soon"
"#,
        );

        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let file = write_config("[transport]\ninbound_capacity = 0\n");

        let result = load_config_from_path(Some(file.path().to_path_buf()));
        match result {
            Err(ConfigError::ValidationError(message)) => {
                assert!(message.contains("inbound_capacity"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_pipeline_capacity_rejected() {
        let mut config = StreamConfigFile::default();
        config.pipeline.record_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_zero_pong_wait_rejected() {
        let mut config = StreamConfigFile::default();
        config.transport.pong_wait = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_source_reports_file_layer() {
        let file = write_config("[transport]
max_message_size = 2048
");

        let config = load_layers(Some(file.path().to_path_buf()), vars(&[])).unwrap();
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.transport.max_message_size, 2048);

        let config = load_layers(None, vars(&[])).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[transport]
max_message_size = 2048
");
        let env = vars(&[
            ("DASHSCOPE_WS_MAX_MESSAGE_SIZE", "4096"),
            ("DASHSCOPE_WS_CONNECT_TIMEOUT_MS", "1500"),
            ("DASHSCOPE_REQUEST_TIMEOUT_SECS", "45"),
        ]);

        let config = load_layers(Some(file.path().to_path_buf()), env).unwrap();
        assert_eq!(config.source(), ConfigSource::Env);
        assert_eq!(config.transport.max_message_size, 4096);
        assert_eq!(config.transport.connect_timeout, Duration::from_millis(1500));
        assert_eq!(config.pipeline.request_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_unparsable_env_value_is_ignored() {
        let env = vars(&[
            ("DASHSCOPE_WS_PONG_WAIT_MS", "soon"),
            ("DASHSCOPE_RECORD_CAPACITY", "-3"),
        ]);

        let config = load_layers(None, env).unwrap();
        assert_eq!(config.transport.pong_wait, TransportConfig::default().pong_wait);
        assert_eq!(config.pipeline.record_capacity, 100);
        assert_eq!(config.source(), ConfigSource::Default);
    }
}
