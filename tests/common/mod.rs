//! Common test utilities and fixtures for symbol-completion integration tests
//!
//! This module provides:
//! - `TestCompilation` for building a compilation from an inline manifest
//! - Binders that wrap the manifest binder to slow down or cancel binding
//! - Custom assertions over published diagnostics and events

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod assertions;
pub mod harness;

pub use assertions::*;
pub use harness::*;
