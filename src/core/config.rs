//! Configuration management for vista.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Builder for programmatic construction
//! - Validation and defaults

use crate::core::types::{MeasurementDescriptor, ViewDescriptor};
use crate::core::{Result, StatsError};
use crate::stats::presets;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for vista
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event queue configuration
    pub queue: QueueConfig,
    /// View registration configuration
    pub registration: RegistrationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Event queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Bounded buffer size; producers block when it is full
    pub capacity: usize,
    /// Name of the consumer thread
    pub thread_name: String,
    /// How long `shutdown` waits for the consumer to drain
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Which view descriptors `register_view` accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationPolicy {
    /// Only the preset RPC round-trip latency view
    #[default]
    Preset,
    /// Any view over a declared measurement
    Declared,
}

/// View registration configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Registration policy
    pub policy: RegistrationPolicy,
    /// Measurements views may be declared over (besides the preset one)
    pub measurements: Vec<MeasurementDescriptor>,
    /// Views registered at startup
    pub views: Vec<ViewDescriptor>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include thread ids, targets and line numbers
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            capacity: 8192,
            thread_name: "vista-stats".to_string(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl RegistrationConfig {
    /// Returns true if the policy allows registering `view`
    pub fn admits(&self, view: &ViewDescriptor) -> bool {
        match self.policy {
            RegistrationPolicy::Preset => view == presets::rpc_client_roundtrip_latency_view(),
            RegistrationPolicy::Declared => {
                view.measurement() == presets::rpc_client_roundtrip_latency()
                    || self.measurements.iter().any(|m| m == view.measurement())
            },
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.queue.capacity == 0 {
            return Err(StatsError::config("queue capacity must be greater than 0"));
        }

        if self.queue.thread_name.is_empty() {
            return Err(StatsError::config("queue thread_name cannot be empty"));
        }

        for (i, measurement) in self.registration.measurements.iter().enumerate() {
            if measurement.name().is_empty() {
                return Err(StatsError::config(format!("measurement #{} has an empty name", i)));
            }
            let duplicate = self.registration.measurements[..i]
                .iter()
                .any(|m| m.name() == measurement.name());
            if duplicate {
                return Err(StatsError::config(format!(
                    "measurement '{}' is declared more than once",
                    measurement.name()
                )));
            }
        }

        for view in &self.registration.views {
            view.validate()
                .map_err(|e| StatsError::config(format!("view '{}': {}", view.name(), e)))?;
            if !self.registration.admits(view) {
                return Err(StatsError::config(format!(
                    "view '{}' is not allowed by the {:?} registration policy",
                    view.name(),
                    self.registration.policy
                )));
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| StatsError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded configuration from: {:?}", path);
        self.from_yaml(&content)
    }

    /// Set queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue.capacity = capacity;
        self
    }

    /// Set consumer thread name
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.queue.thread_name = name.into();
        self
    }

    /// Set registration policy
    pub fn policy(mut self, policy: RegistrationPolicy) -> Self {
        self.config.registration.policy = policy;
        self
    }

    /// Declare a measurement views may be registered over
    pub fn measurement(mut self, measurement: MeasurementDescriptor) -> Self {
        self.config.registration.measurements.push(measurement);
        self
    }

    /// Add a view registered at startup
    pub fn view(mut self, view: ViewDescriptor) -> Self {
        self.config.registration.views.push(view);
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
