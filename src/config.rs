//! # Configuration Management
//!
//! Centralized configuration for the codec pool, the envelope wire format and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`CLUSTER_ENVELOPE_*`)
//!
//! ## Example
//! ```toml
//! [pool]
//! format = "bincode"
//! max_idle = 64
//! idle_timeout = 60000
//! prewarm = 4
//!
//! [wire]
//! max_payload_size = 16777216
//! max_header_len = 65536
//! ```

use crate::core::serialization::SerializationFormat;
use crate::error::{EnvelopeError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max allowed payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Max allowed header size (64 KB)
pub const MAX_HEADER_LEN: usize = 64 * 1024;

/// Default cap on idle codecs retained by a pool
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Default time an idle codec may sit unused before it is dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct EnvelopeConfig {
    /// Codec pool configuration
    #[serde(default)]
    pub pool: PoolConfig,

    /// Wire format limits
    #[serde(default)]
    pub wire: WireConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EnvelopeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| EnvelopeError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| EnvelopeError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| EnvelopeError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    ///
    /// Unparseable numeric values are ignored; an unknown format name is an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(format) = std::env::var("CLUSTER_ENVELOPE_FORMAT") {
            config.pool.format = format.parse()?;
        }

        if let Ok(max_idle) = std::env::var("CLUSTER_ENVELOPE_POOL_MAX_IDLE") {
            if let Ok(val) = max_idle.parse::<usize>() {
                config.pool.max_idle = val;
            }
        }

        if let Ok(timeout) = std::env::var("CLUSTER_ENVELOPE_POOL_IDLE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.pool.idle_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(prewarm) = std::env::var("CLUSTER_ENVELOPE_POOL_PREWARM") {
            if let Ok(val) = prewarm.parse::<usize>() {
                config.pool.prewarm = val;
            }
        }

        if let Ok(size) = std::env::var("CLUSTER_ENVELOPE_MAX_PAYLOAD_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.wire.max_payload_size = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EnvelopeError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| EnvelopeError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.pool.validate());
        errors.extend(self.wire.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EnvelopeError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Codec pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Serialization format of pooled codecs
    pub format: SerializationFormat,

    /// Maximum number of idle codecs kept for reuse
    pub max_idle: usize,

    /// Idle codecs older than this are dropped
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Number of codecs constructed when the pool is created
    #[serde(default)]
    pub prewarm: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            format: SerializationFormat::default(),
            max_idle: DEFAULT_MAX_IDLE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            prewarm: 0,
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_idle == 0 {
            errors.push("Pool max_idle must be greater than 0".to_string());
        } else if self.max_idle > 100_000 {
            errors.push(format!(
                "Pool max_idle too large: {} (max recommended: 100,000)",
                self.max_idle
            ));
        }

        if self.idle_timeout.as_millis() < 10 {
            errors.push("Pool idle timeout too short (minimum: 10ms)".to_string());
        } else if self.idle_timeout.as_secs() > 24 * 3600 {
            errors.push("Pool idle timeout too long (maximum: 24h)".to_string());
        }

        if self.prewarm > self.max_idle {
            errors.push(format!(
                "Pool prewarm ({}) cannot exceed max_idle ({})",
                self.prewarm, self.max_idle
            ));
        }

        errors
    }
}

/// Wire format limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireConfig {
    /// Maximum payload size in bytes
    pub max_payload_size: usize,

    /// Maximum header size in bytes
    pub max_header_len: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            max_header_len: MAX_HEADER_LEN,
        }
    }
}

impl WireConfig {
    /// Validate wire configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > i32::MAX as usize {
            errors.push(format!(
                "Max payload size {} exceeds the i32 length prefix",
                self.max_payload_size
            ));
        }

        if self.max_header_len > u32::MAX as usize {
            errors.push(format!(
                "Max header length {} exceeds the u32 length prefix",
                self.max_header_len
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("cluster-envelope"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
