//! Compilation root
//!
//! A `Compilation` owns the shared services (binder, diagnostics sink,
//! declaration notifier, configuration) and the module symbols built from a
//! set of declarations. Symbols hold an `Arc` to the services so any thread
//! can drive any symbol without going back through the compilation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::binder::SemanticBinder;
use crate::completion::{CancellationToken, CompletionPart, WaitPolicy};
use crate::config::EngineConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::events::DeclarationNotifier;
use crate::location::LocationFilter;
use crate::symbols::module::ModuleDecl;
use crate::symbols::{Completable, ModuleSymbol, Symbol, SymbolId};

/// Collaborators shared by every symbol of one compilation
pub struct CompilationServices {
    pub binder: Arc<dyn SemanticBinder>,
    pub sink: Arc<dyn DiagnosticSink>,
    pub notifier: Arc<dyn DeclarationNotifier>,
    pub config: EngineConfig,
    wait_policy: WaitPolicy,
    next_id: AtomicU32,
}

impl CompilationServices {
    pub fn new(
        binder: Arc<dyn SemanticBinder>,
        sink: Arc<dyn DiagnosticSink>,
        notifier: Arc<dyn DeclarationNotifier>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            binder,
            sink,
            notifier,
            wait_policy: config.wait_policy(),
            config,
            next_id: AtomicU32::new(0),
        })
    }

    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait_policy
    }

    pub(crate) fn allocate_id(&self) -> SymbolId {
        SymbolId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Debug for CompilationServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationServices")
            .field("config", &self.config)
            .field("symbols", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// A snapshot of modules whose symbols complete lazily
#[derive(Debug)]
pub struct Compilation {
    services: Arc<CompilationServices>,
    modules: Vec<Arc<ModuleSymbol>>,
}

impl Compilation {
    /// Build every module's symbol tree. No semantic work happens here
    /// except eager binding of partial method signatures.
    pub fn new(services: Arc<CompilationServices>, modules: Vec<ModuleDecl>) -> Self {
        let modules = modules
            .into_iter()
            .map(|decl| ModuleSymbol::build(decl, &services))
            .collect();
        Self { services, modules }
    }

    pub fn services(&self) -> &Arc<CompilationServices> {
        &self.services
    }

    pub fn modules(&self) -> &[Arc<ModuleSymbol>] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&Arc<ModuleSymbol>> {
        self.modules.iter().find(|m| m.name() == name)
    }

    /// Drive every module. Safe to call from several threads at once and to
    /// repeat after cancellation or a filtered run.
    pub fn force_complete(
        &self,
        filter: Option<&LocationFilter>,
        token: &CancellationToken,
    ) -> Result<()> {
        tracing::debug!(
            "[DRIVE] Completing {} module(s){}",
            self.modules.len(),
            filter.map(|f| format!(" filtered to {}", f)).unwrap_or_default()
        );
        let fan_out = &self.services.config.fan_out;
        if fan_out.parallel && self.modules.len() > 1 {
            self.modules
                .par_iter()
                .try_for_each(|module| module.force_complete(filter, token))
        } else {
            self.modules
                .iter()
                .try_for_each(|module| module.force_complete(filter, token))
        }
    }

    pub fn is_complete(&self) -> bool {
        self.modules
            .iter()
            .all(|m| m.has_complete(CompletionPart::ALL))
    }

    /// Look up a namespace or method by dotted name, searching every module.
    /// A `Method.local` suffix reaches a method's locals.
    pub fn find(&self, path: &str, token: &CancellationToken) -> Result<Option<Symbol>> {
        for module in &self.modules {
            if let Some(found) = module.find(path, token)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}
