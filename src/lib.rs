//! symbol-completion: lazy, concurrent completion of symbol facts
//!
//! Symbols (modules, namespaces, methods, locals) compute their derived facts
//! on demand. Any number of threads may ask for the same fact at once; the
//! work runs at most once per fact, and the diagnostics and declaration
//! events it produces are published exactly once, by the thread that wins
//! the fact's completion part.
//!
//! # Layers
//!
//! - [`completion`] - parts, per-symbol state, write-once slots, the driver
//! - [`symbols`] - the symbol kinds and their part handlers
//! - [`binder`] - the seam to the semantic rules that produce facts
//! - [`compilation`] - the root owning services and modules
//! - [`manifest`] - a data front-end and binder used by the CLI and tests
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use symbol_completion::*;
//!
//! let (binder, modules) = Manifest::load(path)?.lower()?;
//! let sink = Arc::new(DiagnosticBag::new());
//! let services = CompilationServices::new(
//!     Arc::new(binder),
//!     sink.clone(),
//!     Arc::new(NullNotifier),
//!     EngineConfig::default(),
//! );
//! let compilation = Compilation::new(services, modules);
//! compilation.force_complete(None, &CancellationToken::none())?;
//! for diagnostic in sink.sorted_diagnostics() {
//!     println!("{}", diagnostic);
//! }
//! ```

pub mod binder;
pub mod cli;
pub mod commands;
pub mod compilation;
pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod location;
pub mod manifest;
pub mod symbols;

// Re-export commonly used types
pub use binder::{
    AssemblyReference, AttributeTarget, ConstantValue, LookupScope, SemanticBinder, SyntaxId,
    WellKnownAttributeData,
};
pub use compilation::{Compilation, CompilationServices};
pub use completion::{Bound, CancellationToken, CompletionPart, CompletionState, LazySlot, WaitPolicy};
pub use config::EngineConfig;
pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticSink, ErrorCode, Severity};
pub use error::{CompletionError, Result};
pub use events::{ChannelNotifier, DeclarationNotifier, EventEmitter, NullNotifier, RecordingNotifier};
pub use location::{LocationFilter, SourceSpan};
pub use manifest::{Manifest, ManifestBinder};
pub use symbols::local::ConstantContext;
pub use symbols::signature::{Parameter, RefKind, Signature, TypeRef};
pub use symbols::{
    Completable, DeclaredSymbol, LocalSymbol, MethodSymbol, ModuleSymbol, NamespaceSymbol, Symbol,
    SymbolId, SymbolKind,
};
