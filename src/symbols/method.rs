//! Method symbols
//!
//! A method's signature is guarded by the `START/FINISH_METHOD_CHECKS` pair:
//! the thread that wins `START_METHOD_CHECKS` binds the signature (borrowing
//! custom modifiers from an overridden member), publishes its diagnostics and
//! sets `FINISH_METHOD_CHECKS` last. Async rules run in a second tier under
//! `START/FINISH_ASYNC_METHOD_CHECKS`, which is only entered once the first
//! tier is finished.
//!
//! Partial methods are the exception to lazy binding: their signatures are
//! bound while the containing namespace is being built, in declaration scope,
//! so definitions and implementations can be paired before the member list is
//! final.

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::binder::{LookupScope, SyntaxId, WellKnownAttributeData};
use crate::compilation::CompilationServices;
use crate::completion::{
    Bound, CancellationToken, CompletionPart, CompletionRequest, CompletionState, LazySlot,
    PartHandler, Step,
};
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::error::{CompletionError, Result};
use crate::location::{LocationFilter, SourceSpan};

use super::fanout::complete_children;
use super::local::{LocalDecl, LocalSymbol};
use super::namespace::NamespaceSymbol;
use super::signature::{Parameter, Signature, TypeRef};
use super::{complete_attributes, drive, qualify, Completable, DeclaredSymbol, SymbolId, SymbolKind};

/// Which half of a partial method a declaration is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialRole {
    /// Signature only, no body
    Definition,
    /// The body for an earlier definition
    Implementation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodModifiers {
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub is_override: bool,
    #[serde(default)]
    pub partial: Option<PartialRole>,
}

/// Declaration of a method
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub span: SourceSpan,
    pub syntax: SyntaxId,
    pub modifiers: MethodModifiers,
    pub locals: Vec<LocalDecl>,
}

pub struct MethodSymbol {
    id: SymbolId,
    name: String,
    spans: Vec<SourceSpan>,
    syntax: SyntaxId,
    modifiers: MethodModifiers,
    services: Arc<CompilationServices>,
    state: CompletionState,
    container: OnceCell<Weak<NamespaceSymbol>>,
    partner: OnceCell<Weak<MethodSymbol>>,
    locals: Vec<Arc<LocalSymbol>>,
    attributes: LazySlot<Bound<WellKnownAttributeData>>,
    signature: LazySlot<Bound<Signature>>,
    /// Pairing problems found while the container was built
    pairing_diagnostics: LazySlot<Vec<Diagnostic>>,
}

const METHOD_PARTS: &[PartHandler<MethodSymbol>] = &[
    PartHandler::new(CompletionPart::ATTRIBUTES, MethodSymbol::complete_attributes),
    PartHandler::new(CompletionPart::METHOD_CHECKS, MethodSymbol::complete_method_checks),
    PartHandler::new(
        CompletionPart::ASYNC_METHOD_CHECKS,
        MethodSymbol::complete_async_method_checks,
    ),
    PartHandler::new(CompletionPart::MEMBERS_COMPLETED, MethodSymbol::complete_members),
];

impl MethodSymbol {
    /// Construct-minimal: no binding, no container yet
    pub(crate) fn new(decl: MethodDecl, services: &Arc<CompilationServices>) -> Arc<Self> {
        let id = services.allocate_id();
        Arc::new_cyclic(|me: &Weak<MethodSymbol>| {
            let locals = decl
                .locals
                .into_iter()
                .map(|local| Arc::new(LocalSymbol::new(local, me.clone(), services)))
                .collect();
            Self {
                id,
                name: decl.name,
                spans: vec![decl.span],
                syntax: decl.syntax,
                modifiers: decl.modifiers,
                services: Arc::clone(services),
                state: CompletionState::new(),
                container: OnceCell::new(),
                partner: OnceCell::new(),
                locals,
                attributes: LazySlot::new(),
                signature: LazySlot::new(),
                pairing_diagnostics: LazySlot::new(),
            }
        })
    }

    pub fn syntax(&self) -> SyntaxId {
        self.syntax
    }

    pub fn modifiers(&self) -> MethodModifiers {
        self.modifiers
    }

    pub fn partial_role(&self) -> Option<PartialRole> {
        self.modifiers.partial
    }

    pub fn is_partial_definition(&self) -> bool {
        self.modifiers.partial == Some(PartialRole::Definition)
    }

    pub fn span(&self) -> &SourceSpan {
        &self.spans[0]
    }

    pub fn locals(&self) -> &[Arc<LocalSymbol>] {
        &self.locals
    }

    pub fn local_named(&self, name: &str) -> Option<&Arc<LocalSymbol>> {
        self.locals.iter().find(|local| local.name() == name)
    }

    /// The other half of a paired partial method
    pub fn partial_partner(&self) -> Option<Arc<MethodSymbol>> {
        self.partner.get().and_then(Weak::upgrade)
    }

    pub fn containing_namespace(&self) -> Result<Arc<NamespaceSymbol>> {
        self.container
            .get()
            .and_then(Weak::upgrade)
            .ok_or(CompletionError::NotAttached { symbol: self.id })
    }

    pub fn qualified_name(&self) -> String {
        match self.containing_namespace() {
            Ok(container) => qualify(container.qualified_name(), &self.name),
            Err(_) => self.name.clone(),
        }
    }

    pub(crate) fn attach(&self, container: Weak<NamespaceSymbol>) {
        assert!(
            self.container.set(container).is_ok(),
            "method '{}' attached twice",
            self.name
        );
    }

    pub(crate) fn link_partner(&self, partner: &Arc<MethodSymbol>) {
        let _ = self.partner.set(Arc::downgrade(partner));
    }

    pub(crate) fn set_pairing_diagnostics(&self, diagnostics: Vec<Diagnostic>) {
        self.pairing_diagnostics.publish(diagnostics);
    }

    /// Bind in declaration scope. Used for partial methods while the
    /// container is still being built.
    pub(crate) fn compute_declaration_signature(&self) -> &Signature {
        &self
            .signature
            .get_or_publish(|| self.compute_signature(LookupScope::Declaration))
            .value
    }

    /// Signature already bound during construction, if any
    pub(crate) fn declaration_signature(&self) -> Option<&Signature> {
        self.signature.get().map(|bound| &bound.value)
    }

    fn compute_signature(&self, scope: LookupScope<'_>) -> Bound<Signature> {
        let binder = &self.services.binder;
        let Bound {
            value: mut signature,
            mut diagnostics,
        } = binder.bind_signature(self, scope);

        if self.modifiers.is_override {
            let candidates = binder.override_candidates(self, scope);
            match candidates
                .iter()
                .find(|candidate| signature.parameters_match_relaxed(candidate))
            {
                Some(overridden) => signature.borrow_modifiers_from(overridden),
                None => diagnostics.push(Diagnostic::new(
                    ErrorCode::OverrideNotFound,
                    format!("'{}': no suitable method found to override", self.name),
                    Some(self.span().clone()),
                )),
            }
        }

        tracing::trace!(
            "[DRIVE] Bound '{}' as {} ({} scope)",
            self.name,
            signature,
            if scope.is_declaration() { "declaration" } else { "container" }
        );
        Bound::new(signature, diagnostics)
    }

    fn ensure_method_checks(&self, token: &CancellationToken) -> Result<&Signature> {
        if !self.state.has_complete(CompletionPart::FINISH_METHOD_CHECKS) {
            token.check()?;
            let request = CompletionRequest::new(None, token, self.services.wait_policy());
            self.complete_method_checks(&request)?;
        }
        match self.signature.get() {
            Some(bound) => Ok(&bound.value),
            None => unreachable!("FINISH_METHOD_CHECKS is set only after the signature"),
        }
    }

    /// Full signature, with borrowed override modifiers applied
    pub fn signature(&self, token: &CancellationToken) -> Result<&Signature> {
        self.ensure_method_checks(token)
    }

    pub fn return_type(&self, token: &CancellationToken) -> Result<&TypeRef> {
        Ok(&self.ensure_method_checks(token)?.return_type)
    }

    pub fn parameters(&self, token: &CancellationToken) -> Result<&[Parameter]> {
        Ok(&self.ensure_method_checks(token)?.parameters)
    }

    pub fn is_vararg(&self, token: &CancellationToken) -> Result<bool> {
        Ok(self.ensure_method_checks(token)?.is_vararg)
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

    fn declare(&self) {
        let declared = DeclaredSymbol {
            id: self.id,
            kind: SymbolKind::Method,
            name: self.qualified_name(),
        };
        tracing::debug!("[EVENTS] Method declared: {}", declared.name);
        self.services.notifier.symbol_declared(&declared);
    }

    fn complete_attributes(&self, _request: &CompletionRequest<'_>) -> Result<Step> {
        Ok(complete_attributes(
            self,
            self.syntax,
            &self.attributes,
            &self.services,
        ))
    }

    fn complete_method_checks(&self, request: &CompletionRequest<'_>) -> Result<Step> {
        // Resolve the container before claiming the part, so the winner
        // cannot fail between START and FINISH.
        let container = if self.signature.is_set() {
            None
        } else {
            Some(self.containing_namespace()?)
        };

        if self.state.note_part_complete(CompletionPart::START_METHOD_CHECKS) {
            let signature = match &container {
                Some(container) => self.signature.get_or_publish(|| {
                    self.compute_signature(LookupScope::Container(container))
                }),
                None => self
                    .signature
                    .get_or_publish(|| self.compute_signature(LookupScope::Declaration)),
            };

            let mut diagnostics = signature.diagnostics.clone();
            if let Some(pairing) = self.pairing_diagnostics.get() {
                diagnostics.extend(pairing.iter().cloned());
            }
            self.services
                .sink
                .publish(self.id, CompletionPart::FINISH_METHOD_CHECKS, &diagnostics);

            // The definition half of a partial method declares from the async tier.
            if !self.is_partial_definition() {
                self.declare();
            }
            self.state.note_part_complete(CompletionPart::FINISH_METHOD_CHECKS);
        }

        self.state
            .wait_complete(CompletionPart::FINISH_METHOD_CHECKS, request.token, request.wait)?;
        Ok(Step::Continue)
    }

    fn complete_async_method_checks(&self, request: &CompletionRequest<'_>) -> Result<Step> {
        self.complete_method_checks(request)?;

        if self.state.note_part_complete(CompletionPart::START_ASYNC_METHOD_CHECKS) {
            let diagnostics = match self.signature.get() {
                Some(bound) if self.modifiers.is_async => self.async_diagnostics(&bound.value),
                _ => Vec::new(),
            };
            self.services.sink.publish(
                self.id,
                CompletionPart::FINISH_ASYNC_METHOD_CHECKS,
                &diagnostics,
            );

            if self.is_partial_definition() {
                self.declare();
            }
            self.state
                .note_part_complete(CompletionPart::FINISH_ASYNC_METHOD_CHECKS);
        }

        self.state.wait_complete(
            CompletionPart::FINISH_ASYNC_METHOD_CHECKS,
            request.token,
            request.wait,
        )?;
        Ok(Step::Continue)
    }

    fn async_diagnostics(&self, signature: &Signature) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let span = Some(self.span().clone());
        let accepted = &self.services.config.async_checks;

        let return_type = &signature.return_type;
        if !return_type.is_error() && !accepted.accepts(&return_type.shape()) {
            diagnostics.push(Diagnostic::new(
                ErrorCode::BadAsyncReturnType,
                format!(
                    "The return type of async method '{}' must be void, Task, Task<T>, a task-like type, IAsyncEnumerable<T>, or IAsyncEnumerator<T>; found '{}'",
                    self.name, return_type.name
                ),
                span.clone(),
            ));
        }

        for parameter in &signature.parameters {
            if parameter.ref_kind.is_by_ref() {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::BadAsyncByRefParameter,
                    format!(
                        "Async method '{}' cannot have ref, in or out parameter '{}'",
                        self.name, parameter.name
                    ),
                    span.clone(),
                ));
            }
        }

        if signature.is_vararg {
            diagnostics.push(Diagnostic::new(
                ErrorCode::BadAsyncVarargs,
                format!("__arglist is not allowed in the parameter list of async method '{}'", self.name),
                span,
            ));
        }

        diagnostics
    }

    fn complete_members(&self, request: &CompletionRequest<'_>) -> Result<Step> {
        if complete_children(&self.locals, request, &self.services.config.fan_out)? {
            self.state.note_part_complete(CompletionPart::MEMBERS_COMPLETED);
            Ok(Step::Continue)
        } else {
            Ok(Step::Suspend)
        }
    }
}

impl Completable for MethodSymbol {
    fn id(&self) -> SymbolId {
        self.id
    }

    fn kind(&self) -> SymbolKind {
        SymbolKind::Method
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn declared_spans(&self) -> &[SourceSpan] {
        &self.spans
    }

    fn completion_state(&self) -> &CompletionState {
        &self.state
    }

    fn force_complete(
        &self,
        filter: Option<&LocationFilter>,
        token: &CancellationToken,
    ) -> Result<()> {
        drive(self, METHOD_PARTS, &self.services, filter, token)
    }
}

impl fmt::Debug for MethodSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSymbol")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("modifiers", &self.modifiers)
            .field("locals", &self.locals.len())
            .field("completed", &self.state.completed_parts())
            .finish()
    }
}
