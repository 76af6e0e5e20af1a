//! Cooperative cancellation
//!
//! A `CancellationToken` is a cheap, cloneable handle around a shared flag.
//! Every public entry point that can block or loop takes one; cancelling it
//! makes those calls return `Err(CompletionError::Cancelled)` at their next
//! check without marking anything complete.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CompletionError, Result};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// A token nobody else holds, so it can never be cancelled
    pub fn none() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CompletionError::Cancelled)
        } else {
            Ok(())
        }
    }
}
