//! CLI argument definitions using clap with subcommand architecture

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ops::Range;
use std::path::PathBuf;

/// Lazy, concurrent symbol completion over declaration manifests
#[derive(Parser, Debug)]
#[command(name = "symbol-completion")]
#[command(about = "Drive symbol completion over a declaration manifest and report diagnostics")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (applies to all commands)
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Engine configuration file (TOML)
    #[arg(long, global = true, env = "SYMBOL_COMPLETION_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Complete every symbol in a manifest and report diagnostics and events
    #[command(visible_alias = "c")]
    Complete(CompleteArgs),

    /// Print the effective configuration, or one value of it
    Config(ConfigArgs),
}

/// Arguments for the complete command
#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Manifest describing the declarations (.toml or .json)
    pub manifest: PathBuf,

    /// Only complete symbols declared in this file
    #[arg(long)]
    pub file: Option<String>,

    /// Only complete symbols overlapping this byte range of --file (e.g. 100..250)
    #[arg(long, value_parser = parse_range, requires = "file")]
    pub range: Option<Range<u32>>,

    /// Number of threads racing to complete the same compilation
    #[arg(long, default_value_t = 1)]
    pub threads: usize,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Key path to print (e.g. fan_out.parallel)
    pub key: Option<String>,
}

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// One JSON document
    Json,
    /// JSON lines streamed as events happen
    Jsonl,
}

/// Parse `start..end` into a byte range
pub fn parse_range(text: &str) -> Result<Range<u32>, String> {
    let (start, end) = text
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got '{}'", text))?;
    let start: u32 = start
        .trim()
        .parse()
        .map_err(|e| format!("invalid range start '{}': {}", start, e))?;
    let end: u32 = end
        .trim()
        .parse()
        .map_err(|e| format!("invalid range end '{}': {}", end, e))?;
    if end < start {
        return Err(format!("range end {} is before start {}", end, start));
    }
    Ok(start..end)
}
