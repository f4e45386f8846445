//! Configuration management
//!
//! Loads and validates pool configuration from TOML files. Every section and
//! field has a default, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::pool::{
    DEFAULT_BUFFER_SIZE, DEFAULT_MAX_IDLE, DEFAULT_QUEUE_CAPACITY, DEFAULT_ROUTINE_POOL_SIZE,
    MAX_RETAINED_CAPACITY,
};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub routine: RoutineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Buffer pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    /// Capacity of newly allocated buffers
    #[serde(default = "default_buffer_capacity")]
    pub default_capacity: usize,
    /// Returned buffers at or above this capacity are replaced
    #[serde(default = "default_max_retained_capacity")]
    pub max_retained_capacity: usize,
    /// Maximum idle buffers kept in the free list
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            default_capacity: default_buffer_capacity(),
            max_retained_capacity: default_max_retained_capacity(),
            max_idle: default_max_idle(),
        }
    }
}

/// Routine pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RoutineConfig {
    /// Number of worker threads (0 = auto)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of the wait queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Worker thread name prefix
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl RoutineConfig {
    /// Get effective worker count (auto-detect if 0)
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

impl Default for RoutineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            thread_name: default_thread_name(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder
    #[serde(default)]
    pub enabled: bool,
}

// Default value functions
fn default_buffer_capacity() -> usize { DEFAULT_BUFFER_SIZE }
fn default_max_retained_capacity() -> usize { MAX_RETAINED_CAPACITY }
fn default_max_idle() -> usize { DEFAULT_MAX_IDLE }
fn default_workers() -> usize { DEFAULT_ROUTINE_POOL_SIZE }
fn default_queue_capacity() -> usize { DEFAULT_QUEUE_CAPACITY }
fn default_thread_name() -> String { "routine".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.buffer.default_capacity == 0 {
            anyhow::bail!("buffer.default_capacity must be > 0");
        }
        if self.buffer.max_retained_capacity < self.buffer.default_capacity {
            anyhow::bail!("buffer.max_retained_capacity must be >= buffer.default_capacity");
        }
        if self.buffer.max_idle == 0 {
            anyhow::bail!("buffer.max_idle must be > 0");
        }
        if self.routine.queue_capacity == 0 {
            anyhow::bail!("routine.queue_capacity must be > 0");
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            anyhow::bail!("logging.format must be \"json\" or \"pretty\"");
        }
        Ok(())
    }
}
