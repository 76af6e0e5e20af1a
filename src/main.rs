//! symbol-completion CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use symbol_completion::cli::{Cli, Commands};
use symbol_completion::commands::{run_complete, run_config, CommandContext};
use symbol_completion::EngineConfig;

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> symbol_completion::Result<String> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::default(),
    };
    init_tracing(&config, cli.verbose);

    let ctx = CommandContext::new(cli.format, cli.verbose, config);
    match &cli.command {
        Commands::Complete(args) => run_complete(args, &ctx),
        Commands::Config(args) => run_config(args, &ctx),
    }
}

/// Logs go to stderr; stdout carries the report. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(config: &EngineConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("symbol_completion={}", level)));

    // May fail if already initialized, which is fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
