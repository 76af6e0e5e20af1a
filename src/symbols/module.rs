//! Module symbols
//!
//! A module is a compilation root: it owns the global namespace and a list of
//! assembly references. Its parts run attributes first, then reference
//! validation, then completion of the whole namespace tree.

use std::fmt;
use std::sync::Arc;

use crate::binder::{AssemblyReference, SyntaxId, WellKnownAttributeData};
use crate::compilation::CompilationServices;
use crate::completion::{
    Bound, CancellationToken, CompletionPart, CompletionRequest, CompletionState, LazySlot,
    PartHandler, Step,
};
use crate::diagnostics::Diagnostic;
use crate::error::Result;
use crate::location::{LocationFilter, SourceSpan};

use super::namespace::{NamespaceDecl, NamespaceSymbol};
use super::{complete_attributes, drive, Completable, DeclaredSymbol, Symbol, SymbolId, SymbolKind};

#[derive(Debug, Clone)]
pub struct ModuleDecl {
    pub name: String,
    pub syntax: SyntaxId,
    pub references: Vec<AssemblyReference>,
    pub global_namespace: NamespaceDecl,
}

pub struct ModuleSymbol {
    id: SymbolId,
    name: String,
    syntax: SyntaxId,
    references: Vec<AssemblyReference>,
    services: Arc<CompilationServices>,
    state: CompletionState,
    global_namespace: Arc<NamespaceSymbol>,
    attributes: LazySlot<Bound<WellKnownAttributeData>>,
    reference_diagnostics: LazySlot<Vec<Diagnostic>>,
}

const MODULE_PARTS: &[PartHandler<ModuleSymbol>] = &[
    PartHandler::new(CompletionPart::ATTRIBUTES, ModuleSymbol::complete_attributes),
    PartHandler::new(
        CompletionPart::VALIDATING_REFERENCED_ASSEMBLIES,
        ModuleSymbol::complete_reference_validation,
    ),
    PartHandler::new(CompletionPart::MEMBERS_COMPLETED, ModuleSymbol::complete_members),
];

impl ModuleSymbol {
    pub(crate) fn build(decl: ModuleDecl, services: &Arc<CompilationServices>) -> Arc<Self> {
        let id = services.allocate_id();
        let mut global = decl.global_namespace;
        global.name.clear();
        let global_namespace = NamespaceSymbol::build(global, "", services);

        Arc::new(Self {
            id,
            name: decl.name,
            syntax: decl.syntax,
            references: decl.references,
            services: Arc::clone(services),
            state: CompletionState::new(),
            global_namespace,
            attributes: LazySlot::new(),
            reference_diagnostics: LazySlot::new(),
        })
    }

    pub fn references(&self) -> &[AssemblyReference] {
        &self.references
    }

    pub fn syntax(&self) -> SyntaxId {
        self.syntax
    }

    pub fn global_namespace(&self) -> &Arc<NamespaceSymbol> {
        &self.global_namespace
    }

    /// Diagnostics from reference validation, once it has run
    pub fn reference_diagnostics(&self) -> Option<&[Diagnostic]> {
        self.reference_diagnostics.get().map(Vec::as_slice)
    }

    pub fn attributes(&self, token: &CancellationToken) -> Result<&WellKnownAttributeData> {
        if !self.state.has_complete(CompletionPart::ATTRIBUTES) {
            token.check()?;
            complete_attributes(self, self.syntax, &self.attributes, &self.services);
        }
        match self.attributes.get() {
            Some(bound) => Ok(&bound.value),
            None => unreachable!("ATTRIBUTES is set only after the attribute slot"),
        }
    }

    /// Resolve a dotted path from the global namespace. The last segment may
    /// name a local of the method before it.
    pub fn find(&self, path: &str, token: &CancellationToken) -> Result<Option<Symbol>> {
        let mut namespace = Arc::clone(&self.global_namespace);
        let mut segments = path.split('.').filter(|s| !s.is_empty()).peekable();

        while let Some(segment) = segments.next() {
            let members = namespace.members_named(segment, token)?;
            let is_last = segments.peek().is_none();

            if is_last {
                return Ok(members.first().cloned());
            }

            if let Some(child) = members.iter().find_map(Symbol::as_namespace) {
                let child = Arc::clone(child);
                namespace = child;
                continue;
            }

            // `Method.local`
            let local_name = segments.next();
            if segments.peek().is_some() {
                return Ok(None);
            }
            return Ok(local_name.and_then(|local| {
                members
                    .iter()
                    .filter_map(Symbol::as_method)
                    .find_map(|method| method.local_named(local).cloned())
                    .map(Symbol::Local)
            }));
        }

        Ok(None)
    }

    fn complete_attributes(&self, _request: &CompletionRequest<'_>) -> Result<Step> {
        Ok(complete_attributes(
            self,
            self.syntax,
            &self.attributes,
            &self.services,
        ))
    }

    fn complete_reference_validation(&self, request: &CompletionRequest<'_>) -> Result<Step> {
        if self
            .state
            .note_part_complete(CompletionPart::START_VALIDATING_REFERENCED_ASSEMBLIES)
        {
            let diagnostics = self.services.binder.validate_references(self);
            let (stored, _) = self.reference_diagnostics.publish(diagnostics);
            tracing::debug!(
                "[DRIVE] Validated {} reference(s) of module '{}': {} diagnostic(s)",
                self.references.len(),
                self.name,
                stored.len()
            );
            self.services.sink.publish(
                self.id,
                CompletionPart::FINISH_VALIDATING_REFERENCED_ASSEMBLIES,
                stored,
            );
            self.state
                .note_part_complete(CompletionPart::FINISH_VALIDATING_REFERENCED_ASSEMBLIES);
        }

        self.state.wait_complete(
            CompletionPart::FINISH_VALIDATING_REFERENCED_ASSEMBLIES,
            request.token,
            request.wait,
        )?;
        Ok(Step::Continue)
    }

    fn complete_members(&self, request: &CompletionRequest<'_>) -> Result<Step> {
        self.global_namespace
            .force_complete(request.filter, request.token)?;
        if !self.global_namespace.has_complete(CompletionPart::ALL) {
            return Ok(Step::Suspend);
        }

        if self.state.note_part_complete(CompletionPart::MEMBERS_COMPLETED) {
            tracing::debug!("[EVENTS] Module declared: {}", self.name);
            self.services.notifier.symbol_declared(&DeclaredSymbol {
                id: self.id,
                kind: SymbolKind::Module,
                name: self.name.clone(),
            });
        }
        Ok(Step::Continue)
    }
}

impl Completable for ModuleSymbol {
    fn id(&self) -> SymbolId {
        self.id
    }

    fn kind(&self) -> SymbolKind {
        SymbolKind::Module
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn declared_spans(&self) -> &[SourceSpan] {
        self.global_namespace.declared_spans()
    }

    fn completion_state(&self) -> &CompletionState {
        &self.state
    }

    fn force_complete(
        &self,
        filter: Option<&LocationFilter>,
        token: &CancellationToken,
    ) -> Result<()> {
        drive(self, MODULE_PARTS, &self.services, filter, token)
    }
}

impl fmt::Debug for ModuleSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSymbol")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("references", &self.references.len())
            .field("completed", &self.state.completed_parts())
            .finish()
    }
}
