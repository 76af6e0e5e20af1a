//! Engine configuration.
//!
//! Loaded from a TOML file. Every field has a default, so a missing file or
//! a partial file is valid.

use crate::completion::WaitPolicy;
use crate::error::CompletionError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    /// Waiting behavior of completion parts
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Parallel fan-out over container children
    #[serde(default)]
    pub fan_out: FanOutConfig,

    /// Async method rules
    #[serde(default)]
    pub async_checks: AsyncChecksConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Completion wait configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionConfig {
    /// Busy-poll rounds before parking
    #[serde(default = "default_spin_iterations")]
    pub spin_iterations: u32,

    /// Park slice between cancellation checks, in milliseconds
    #[serde(default = "default_wait_slice_ms")]
    pub wait_slice_ms: u64,

    /// Warn once when a single wait exceeds this many milliseconds (0 disables)
    #[serde(default = "default_stall_warning_ms")]
    pub stall_warning_ms: u64,
}

fn default_spin_iterations() -> u32 {
    64
}

fn default_wait_slice_ms() -> u64 {
    10
}

fn default_stall_warning_ms() -> u64 {
    5000
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            spin_iterations: default_spin_iterations(),
            wait_slice_ms: default_wait_slice_ms(),
            stall_warning_ms: default_stall_warning_ms(),
        }
    }
}

/// Fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FanOutConfig {
    /// Complete children on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Below this many children, completion stays on the calling thread
    #[serde(default = "default_min_children")]
    pub min_children: usize,
}

fn default_parallel() -> bool {
    true
}

fn default_min_children() -> usize {
    8
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            min_children: default_min_children(),
        }
    }
}

/// Async method check configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AsyncChecksConfig {
    /// Return type shapes an async method may declare (`Task<T>` matches any
    /// single-argument `Task`)
    #[serde(default = "default_accepted_return_shapes")]
    pub accepted_return_shapes: Vec<String>,
}

fn default_accepted_return_shapes() -> Vec<String> {
    [
        "void",
        "Task",
        "Task<T>",
        "ValueTask",
        "ValueTask<T>",
        "IAsyncEnumerable<T>",
        "IAsyncEnumerator<T>",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AsyncChecksConfig {
    fn default() -> Self {
        Self {
            accepted_return_shapes: default_accepted_return_shapes(),
        }
    }
}

impl AsyncChecksConfig {
    pub fn accepts(&self, shape: &str) -> bool {
        self.accepted_return_shapes.iter().any(|s| s == shape)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

impl EngineConfig {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, CompletionError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| CompletionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, CompletionError> {
        let config: Self = toml::from_str(content).map_err(|e| CompletionError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, CompletionError> {
        toml::to_string_pretty(self).map_err(|e| CompletionError::Config {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    fn validate(&self) -> Result<(), CompletionError> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(CompletionError::Config {
                message: format!(
                    "Invalid log level: {}. Must be one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.completion.wait_slice_ms == 0 {
            return Err(CompletionError::Config {
                message: "completion.wait_slice_ms must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Wait policy derived from the completion section
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            spin_iterations: self.completion.spin_iterations,
            wait_slice: Duration::from_millis(self.completion.wait_slice_ms),
            stall_warning: match self.completion.stall_warning_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }

    /// Get a configuration value by key path (e.g., "fan_out.parallel")
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["completion", "spin_iterations"] => Some(self.completion.spin_iterations.to_string()),
            ["completion", "wait_slice_ms"] => Some(self.completion.wait_slice_ms.to_string()),
            ["completion", "stall_warning_ms"] => {
                Some(self.completion.stall_warning_ms.to_string())
            }
            ["fan_out", "parallel"] => Some(self.fan_out.parallel.to_string()),
            ["fan_out", "min_children"] => Some(self.fan_out.min_children.to_string()),
            ["async_checks", "accepted_return_shapes"] => {
                Some(self.async_checks.accepted_return_shapes.join(", "))
            }
            ["logging", "level"] => Some(self.logging.level.clone()),
            _ => None,
        }
    }
}
