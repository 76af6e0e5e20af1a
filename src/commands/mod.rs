//! Command modules for the symbol-completion CLI
//!
//! Each command module implements a single top-level command:
//! - `complete` - Build a compilation from a manifest and drive it to completion
//! - `config` - Show the effective engine configuration
//!
//! Handlers take their `Args` struct from `cli.rs` and a shared
//! `CommandContext`, and return the text to print on stdout.

pub mod complete;
pub mod config;

pub use complete::run_complete;
pub use config::run_config;

use crate::cli::OutputFormat;
use crate::config::EngineConfig;

/// Shared context passed to all command handlers
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Output format (text, json, or jsonl)
    pub format: OutputFormat,
    /// Show verbose output
    pub verbose: bool,
    /// Effective engine configuration
    pub config: EngineConfig,
}

impl CommandContext {
    pub fn new(format: OutputFormat, verbose: bool, config: EngineConfig) -> Self {
        Self {
            format,
            verbose,
            config,
        }
    }
}
