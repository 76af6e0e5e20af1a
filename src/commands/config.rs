//! Config command handler

use crate::cli::{ConfigArgs, OutputFormat};
use crate::commands::CommandContext;
use crate::error::{CompletionError, Result};

/// Print the whole configuration, or the value at `args.key`
pub fn run_config(args: &ConfigArgs, ctx: &CommandContext) -> Result<String> {
    if let Some(key) = &args.key {
        return ctx
            .config
            .get(key)
            .map(|value| format!("{}\n", value))
            .ok_or_else(|| CompletionError::Config {
                message: format!("Unknown configuration key: {}", key),
            });
    }

    match ctx.format {
        OutputFormat::Text => ctx.config.to_toml_string(),
        OutputFormat::Json | OutputFormat::Jsonl => serde_json::to_string_pretty(&ctx.config)
            .map(|json| format!("{}\n", json))
            .map_err(|e| CompletionError::Config {
                message: format!("Failed to serialize config: {}", e),
            }),
    }
}
