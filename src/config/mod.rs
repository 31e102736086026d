//! Configuration management for galle-bouncer
//!
//! This module handles loading, parsing, and validating the bouncer
//! configuration from a YAML file. The raw file model ([`Config`]) is
//! permissive; [`Config::validate`] turns it into the immutable
//! [`SyncConfig`] record the rest of the application consumes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration file model
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Core options shared with the original `[general]` section
    #[serde(default)]
    pub general: Option<GeneralConfig>,

    /// Upstream connection retry policy applied at startup
    #[serde(default)]
    pub startup: RetryConfig,

    /// Decision stream filters
    #[serde(default)]
    pub stream: StreamConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileRead(format!("Unable to locate {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Validate the configuration and build the immutable runtime record
    ///
    /// Required options are checked in a fixed order so the first missing
    /// one is always the one reported.
    pub fn validate(&self) -> Result<SyncConfig, ConfigError> {
        let general = self
            .general
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("general".to_string()))?;

        let log_level: LogLevel = required(&general.log_level, "log_level")?.parse()?;
        let crowdsec_api_key = required(&general.crowdsec_api_key, "crowdsec_api_key")?;
        let crowdsec_lapi_url = required(&general.crowdsec_lapi_url, "crowdsec_lapi_url")?;
        let galle_control_url = required(&general.galle_control_url, "galle_control_url")?;

        let poll_interval = general
            .poll_interval
            .ok_or_else(|| ConfigError::MissingRequired("general.poll_interval".to_string()))?;
        if poll_interval <= 0 {
            return Err(ConfigError::InvalidValue(
                "general.poll_interval must be higher than 0".to_string(),
            ));
        }

        if self.startup.backoff_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "startup.backoff_secs must be higher than 0".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "http.timeout_secs must be higher than 0".to_string(),
            ));
        }

        let log_format: LogFormat = self.logging.format.parse()?;

        Ok(SyncConfig {
            log_level,
            crowdsec_api_key,
            crowdsec_lapi_url,
            galle_control_url,
            poll_interval: Duration::from_secs(poll_interval as u64),
            startup_retry: self.startup.clone(),
            stream: self.stream.clone(),
            http: self.http.clone(),
            log_format,
            otel: self.otel.clone(),
        })
    }

    /// Generate an example configuration file
    pub fn example() -> String {
        r#"# galle-bouncer configuration

general:
  log_level: info                            # error, warn, info or debug
  crowdsec_api_key: "${CROWDSEC_API_KEY}"    # bouncer key from `cscli bouncers add`
  crowdsec_lapi_url: "http://127.0.0.1:8080/"
  galle_control_url: "http://127.0.0.1:8000/control"
  poll_interval: 10                          # seconds between ban list pushes

# Retry policy while connecting to CrowdSec at startup
startup:
  backoff_secs: 20                           # fixed delay between attempts
  max_retries: ~                             # ~ = retry forever

# Decisions kept from the CrowdSec stream
stream:
  scopes: ["ip"]
  decision_types: ["ban"]

http:
  timeout_secs: 30
  connect_timeout_secs: 10

logging:
  format: json                               # json or pretty

otel:
  enabled: false
  endpoint: ~                                # e.g. "http://localhost:4317"
  service_name: "galle-bouncer"
"#
        .to_string()
    }
}

fn required(value: &Option<String>, option: &str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => {
            if let Some(reference) = unresolved_env_var(v) {
                return Err(ConfigError::InvalidValue(format!(
                    "general.{} references unset environment variable {}",
                    option, reference
                )));
            }
            Ok(v.clone())
        }
        _ => Err(ConfigError::MissingRequired(format!("general.{}", option))),
    }
}

/// Raw `general` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Log verbosity name
    pub log_level: Option<String>,

    /// CrowdSec bouncer API key
    pub crowdsec_api_key: Option<String>,

    /// CrowdSec local API base URL
    pub crowdsec_lapi_url: Option<String>,

    /// Galle control endpoint URL
    pub galle_control_url: Option<String>,

    /// Seconds between two pushes
    pub poll_interval: Option<i64>,
}

/// Fixed-backoff retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Delay between two attempts in seconds
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,

    /// Maximum number of retries after the first attempt (None = unbounded)
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff(),
            max_retries: None,
        }
    }
}

fn default_backoff() -> u64 {
    20
}

/// Filters applied to decisions received from the stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Decision scopes to keep
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Decision types to keep
    #[serde(default = "default_decision_types")]
    pub decision_types: Vec<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            scopes: default_scopes(),
            decision_types: default_decision_types(),
        }
    }
}

fn default_scopes() -> Vec<String> {
    vec!["ip".to_string()]
}

fn default_decision_types() -> Vec<String> {
    vec!["ban".to_string()]
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

fn default_log_format() -> String {
    "json".to_string()
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry export is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for traces and metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "galle-bouncer".to_string()
}

/// Log verbosity accepted in `general.log_level`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    /// Matching tracing level
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(ConfigError::InvalidValue(
                "general.log_level must be 'error', 'warn', 'info' or 'debug'".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
        }
    }
}

/// Output format of the log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(ConfigError::InvalidValue(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                s
            ))),
        }
    }
}

/// Validated, immutable configuration record
///
/// Built once at startup by [`Config::validate`] and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub log_level: LogLevel,
    pub crowdsec_api_key: String,
    pub crowdsec_lapi_url: String,
    pub galle_control_url: String,
    pub poll_interval: Duration,
    pub startup_retry: RetryConfig,
    pub stream: StreamConfig,
    pub http: HttpConfig,
    pub log_format: LogFormat,
    pub otel: OtelConfig,
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

fn env_var_pattern() -> regex_lite::Regex {
    regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion")
}

/// First `${VAR}` reference left after expansion, if any
fn unresolved_env_var(value: &str) -> Option<String> {
    env_var_pattern()
        .find(value)
        .map(|m| m.as_str().to_string())
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax. Unknown variables are left untouched.
fn expand_env_vars(input: &str) -> String {
    let re = env_var_pattern();

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
