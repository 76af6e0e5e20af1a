//! Local symbols and cycle-safe constant evaluation
//!
//! A const local's value is computed lazily and cached together with its
//! diagnostics. Evaluation threads an `InProgress` chain through the binder:
//! a lookup that finds its own symbol on the chain reports a circular
//! definition instead of recursing. The cache is checked before the chain,
//! so once a value is stored every later read gets that value.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::binder::{ConstantValue, SyntaxId};
use crate::compilation::CompilationServices;
use crate::completion::{
    Bound, CancellationToken, CompletionPart, CompletionRequest, CompletionState, LazySlot,
    PartHandler, Step,
};
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::error::Result;
use crate::location::{LocationFilter, SourceSpan};

use super::method::MethodSymbol;
use super::{drive, Completable, SymbolId, SymbolKind};

/// Declaration of a local inside a method body
#[derive(Debug, Clone)]
pub struct LocalDecl {
    pub name: String,
    pub span: SourceSpan,
    pub syntax: SyntaxId,
    pub is_const: bool,
}

/// Link in the chain of constants currently being evaluated by one call stack
#[derive(Debug, Clone, Copy)]
pub struct InProgress<'a> {
    symbol: SymbolId,
    parent: Option<&'a InProgress<'a>>,
}

impl<'a> InProgress<'a> {
    pub fn root(symbol: SymbolId) -> Self {
        Self {
            symbol,
            parent: None,
        }
    }

    /// Extend the chain with `symbol`
    pub fn enter(&'a self, symbol: SymbolId) -> InProgress<'a> {
        InProgress {
            symbol,
            parent: Some(self),
        }
    }

    pub fn contains(&self, symbol: SymbolId) -> bool {
        let mut link = Some(self);
        while let Some(current) = link {
            if current.symbol == symbol {
                return true;
            }
            link = current.parent;
        }
        false
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut link = Some(self);
        while let Some(current) = link {
            depth += 1;
            link = current.parent;
        }
        depth
    }
}

/// Result of reading a constant during another constant's evaluation
#[derive(Debug)]
pub enum ConstantLookup<'s> {
    /// The stored (or just computed and stored) value
    Cached(&'s Bound<ConstantValue>),
    /// The symbol is already on the chain. Nothing was cached.
    Circular(Diagnostic),
}

/// Evaluation context handed to `SemanticBinder::bind_constant`
#[derive(Debug)]
pub struct ConstantContext<'a> {
    chain: InProgress<'a>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ConstantContext<'a> {
    fn new(chain: InProgress<'a>) -> Self {
        Self {
            chain,
            diagnostics: Vec::new(),
        }
    }

    /// Read another constant's value.
    ///
    /// A circular reference yields `Bad` and records the circularity here.
    /// Diagnostics of a successfully evaluated constant belong to that
    /// constant and are not copied.
    pub fn value_of(&mut self, local: &LocalSymbol) -> ConstantValue {
        match local.get_constant_value(Some(&self.chain)) {
            ConstantLookup::Cached(bound) => bound.value.clone(),
            ConstantLookup::Circular(diagnostic) => {
                self.diagnostics.push(diagnostic);
                ConstantValue::Bad
            }
        }
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

pub struct LocalSymbol {
    id: SymbolId,
    decl: LocalDecl,
    spans: Vec<SourceSpan>,
    services: Arc<CompilationServices>,
    container: Weak<MethodSymbol>,
    state: CompletionState,
    constant: LazySlot<Bound<ConstantValue>>,
}

const LOCAL_PARTS: &[PartHandler<LocalSymbol>] = &[PartHandler::new(
    CompletionPart::CONSTANT_VALUE,
    LocalSymbol::complete_constant_value,
)];

impl LocalSymbol {
    pub(crate) fn new(
        decl: LocalDecl,
        container: Weak<MethodSymbol>,
        services: &Arc<CompilationServices>,
    ) -> Self {
        Self {
            id: services.allocate_id(),
            spans: vec![decl.span.clone()],
            decl,
            services: Arc::clone(services),
            container,
            state: CompletionState::new(),
            constant: LazySlot::new(),
        }
    }

    pub fn is_const(&self) -> bool {
        self.decl.is_const
    }

    pub fn syntax(&self) -> SyntaxId {
        self.decl.syntax
    }

    pub fn span(&self) -> &SourceSpan {
        &self.decl.span
    }

    pub fn containing_method(&self) -> Option<Arc<MethodSymbol>> {
        self.container.upgrade()
    }

    /// The constant value, evaluating it on first use.
    ///
    /// `None` for locals that are not `const`.
    pub fn constant_value(&self, token: &CancellationToken) -> Result<Option<&ConstantValue>> {
        if !self.decl.is_const {
            return Ok(None);
        }
        if !self.state.has_complete(CompletionPart::CONSTANT_VALUE) {
            let request = CompletionRequest::new(None, token, self.services.wait_policy());
            token.check()?;
            self.complete_constant_value(&request)?;
        }
        Ok(self.constant.get().map(|bound| &bound.value))
    }

    /// Cycle-aware read used while evaluating constants.
    ///
    /// Checks the cache first, then the chain, then evaluates and stores.
    pub fn get_constant_value(&self, in_progress: Option<&InProgress<'_>>) -> ConstantLookup<'_> {
        if let Some(bound) = self.constant.get() {
            return ConstantLookup::Cached(bound);
        }

        if let Some(chain) = in_progress {
            if self.decl.is_const && chain.contains(self.id) {
                tracing::debug!(
                    "[CONST] Circular reference to '{}' at depth {}",
                    self.decl.name,
                    chain.depth()
                );
                return ConstantLookup::Circular(Diagnostic::new(
                    ErrorCode::CircularConstant,
                    format!(
                        "The evaluation of the constant value for '{}' involves a circular definition",
                        self.decl.name
                    ),
                    Some(self.decl.span.clone()),
                ));
            }
        }

        ConstantLookup::Cached(self.evaluate(in_progress))
    }

    fn evaluate(&self, in_progress: Option<&InProgress<'_>>) -> &Bound<ConstantValue> {
        if let Some(bound) = self.constant.get() {
            return bound;
        }
        if !self.decl.is_const {
            return self
                .constant
                .get_or_publish(|| Bound::clean(ConstantValue::Bad));
        }

        let chain = match in_progress {
            Some(parent) => parent.enter(self.id),
            None => InProgress::root(self.id),
        };
        let mut context = ConstantContext::new(chain);
        let value = self.services.binder.bind_constant(self, &mut context);

        let (stored, won) = self
            .constant
            .publish(Bound::new(value, context.diagnostics));
        if won {
            tracing::trace!("[CONST] '{}' = {}", self.decl.name, stored.value);
        }
        stored
    }

    fn complete_constant_value(&self, _request: &CompletionRequest<'_>) -> Result<Step> {
        let bound = self.evaluate(None);
        if self.state.note_part_complete(CompletionPart::CONSTANT_VALUE) {
            self.services
                .sink
                .publish(self.id, CompletionPart::CONSTANT_VALUE, &bound.diagnostics);
        }
        Ok(Step::Continue)
    }
}

impl Completable for LocalSymbol {
    fn id(&self) -> SymbolId {
        self.id
    }

    fn kind(&self) -> SymbolKind {
        SymbolKind::Local
    }

    fn name(&self) -> &str {
        &self.decl.name
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
        drive(self, LOCAL_PARTS, &self.services, filter, token)
    }
}

impl fmt::Debug for LocalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSymbol")
            .field("id", &self.id)
            .field("name", &self.decl.name)
            .field("is_const", &self.decl.is_const)
            .field("completed", &self.state.completed_parts())
            .finish()
    }
}
