//! Error types and exit codes for symbol-completion

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

use crate::symbols::SymbolId;

/// Main error type for symbol-completion operations.
///
/// Semantic problems in the symbols themselves are diagnostics, not errors.
/// Internal invariant violations panic rather than surfacing here.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// The caller's cancellation token fired. State is left valid and a later
    /// call resumes where this one stopped.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Symbol {symbol} needs its container but has not been attached to one")]
    NotAttached { symbol: SymbolId },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid manifest: {message}")]
    Manifest { message: String },

    #[error("IO error at {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl CompletionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Convert error to a process exit code:
    /// - 1: IO error
    /// - 2: Configuration or manifest error
    /// - 3: Cancelled
    /// - 4: Internal structure error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io { .. } => ExitCode::from(1),
            Self::Config { .. } | Self::Manifest { .. } => ExitCode::from(2),
            Self::Cancelled => ExitCode::from(3),
            Self::NotAttached { .. } => ExitCode::from(4),
        }
    }
}

/// Result type alias for symbol-completion operations
pub type Result<T> = std::result::Result<T, CompletionError>;
