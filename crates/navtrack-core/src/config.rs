//! Configuration management for the NavTrack target registry.
//!
//! This module provides the configuration system that supports:
//! - Loading from YAML files
//! - Environment variable overrides (`NAVTRACK__*`)
//! - Validation of all settings, failing fast at startup
//! - Tracker timing, redraw throttling, logging and metrics settings

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use navtrack_core::config::AppConfig;
///
/// // Load from file
/// let config = AppConfig::from_file("config.yaml").unwrap();
///
/// // Validate before use
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Registry timing and limits
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Redraw throttle settings
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate, layering environment
    /// variables (`NAVTRACK__TRACKER__EXPIRY_TIMEOUT_SECS=900`) over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("NAVTRACK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// Checks for:
    /// - Non-zero durations
    /// - Stale interval shorter than the expiry timeout
    /// - Throttle tick no longer than the minimum refresh interval
    /// - Parsable log level and metrics bind address
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        self.throttle.validate()?;
        self.logging.parse_level()?;
        self.metrics.validate()?;
        Ok(())
    }
}

/// Registry timing and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Silence after which a target is removed
    #[serde(default = "default_expiry_timeout")]
    pub expiry_timeout_secs: u64,

    /// Silence after which a target is marked stale
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// How often the expiry sweep runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Registry size above which a warning is logged
    #[serde(default = "default_size_warning_threshold")]
    pub size_warning_threshold: usize,

    /// Maximum number of remembered target names
    #[serde(default = "default_name_cache_capacity")]
    pub name_cache_capacity: usize,
}

fn default_expiry_timeout() -> u64 {
    600
}

fn default_stale_after() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_size_warning_threshold() -> usize {
    10_000
}

fn default_name_cache_capacity() -> usize {
    50_000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            expiry_timeout_secs: default_expiry_timeout(),
            stale_after_secs: default_stale_after(),
            sweep_interval_secs: default_sweep_interval(),
            size_warning_threshold: default_size_warning_threshold(),
            name_cache_capacity: default_name_cache_capacity(),
        }
    }
}

impl TrackerConfig {
    pub fn expiry_timeout(&self) -> Duration {
        Duration::from_secs(self.expiry_timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validates the tracker configuration.
    pub fn validate(&self) -> Result<()> {
        if self.expiry_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "tracker.expiry_timeout_secs",
                "must be greater than zero",
            )
            .into());
        }
        if self.stale_after_secs == 0 {
            return Err(ConfigError::invalid_value(
                "tracker.stale_after_secs",
                "must be greater than zero",
            )
            .into());
        }
        if self.stale_after_secs >= self.expiry_timeout_secs {
            return Err(ConfigError::validation_failed(format!(
                "stale_after_secs ({}) must be shorter than expiry_timeout_secs ({})",
                self.stale_after_secs, self.expiry_timeout_secs
            ))
            .into());
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid_value(
                "tracker.sweep_interval_secs",
                "must be greater than zero",
            )
            .into());
        }
        if self.size_warning_threshold == 0 {
            return Err(ConfigError::invalid_value(
                "tracker.size_warning_threshold",
                "must be greater than zero",
            )
            .into());
        }
        Ok(())
    }
}

/// Redraw throttle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum time between two non-forced refreshes
    #[serde(default = "default_min_refresh_interval")]
    pub min_refresh_interval_ms: u64,

    /// Scheduler polling tick
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_min_refresh_interval() -> u64 {
    5_000
}

fn default_tick_interval() -> u64 {
    1_000
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_refresh_interval_ms: default_min_refresh_interval(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl ThrottleConfig {
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.min_refresh_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validates the throttle configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "throttle.tick_interval_ms",
                "must be greater than zero",
            )
            .into());
        }
        if self.tick_interval_ms > self.min_refresh_interval_ms {
            return Err(ConfigError::validation_failed(format!(
                "tick_interval_ms ({}) must not exceed min_refresh_interval_ms ({})",
                self.tick_interval_ms, self.min_refresh_interval_ms
            ))
            .into());
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Whether to include file/line info
    #[serde(default)]
    pub file_line: bool,

    /// Per-module log levels
    #[serde(default)]
    pub module_levels: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
            file_line: false,
            module_levels: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }

    /// Builds an `EnvFilter`-style directive string from the level and the
    /// per-module overrides.
    pub fn filter_directives(&self) -> String {
        let mut modules: Vec<_> = self.module_levels.iter().collect();
        modules.sort();

        let mut directives = vec![self.level.clone()];
        directives.extend(
            modules
                .into_iter()
                .map(|(module, level)| format!("{}={}", module, level)),
        );
        directives.join(",")
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether the Prometheus endpoint is started
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus HTTP endpoint address
    #[serde(default = "default_metrics_bind_address")]
    pub bind_address: String,
}

fn default_metrics_bind_address() -> String {
    "127.0.0.1:9090".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_metrics_bind_address(),
        }
    }
}

impl MetricsConfig {
    /// Parses the bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse().map_err(|_| {
            ConfigError::invalid_value(
                "metrics.bind_address",
                format!("Invalid socket address: {}", self.bind_address),
            )
            .into()
        })
    }

    /// Validates the metrics configuration.
    pub fn validate(&self) -> Result<()> {
        if self.enabled {
            self.socket_addr()?;
        }
        Ok(())
    }
}
