//! Symbol kinds and the completion contract they share
//!
//! Every symbol owns a `CompletionState` and a static dispatch table of part
//! handlers. Namespaces, methods and locals live in the closed `Symbol` enum;
//! modules are the roots that own a global namespace.

pub mod fanout;
pub mod local;
pub mod method;
pub mod module;
pub mod namespace;
pub mod signature;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::binder::{AttributeTarget, SyntaxId, WellKnownAttributeData};
use crate::compilation::CompilationServices;
use crate::completion::{Bound, CompletionPart, CompletionRequest, CompletionState, LazySlot, Step};
use crate::completion::CancellationToken;
use crate::error::Result;
use crate::location::{LocationFilter, SourceSpan};

pub use local::LocalSymbol;
pub use method::MethodSymbol;
pub use module::ModuleSymbol;
pub use namespace::NamespaceSymbol;

/// Unique symbol identifier within one compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SymbolId(u32);

impl SymbolId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Module,
    Namespace,
    Method,
    Local,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Namespace => "namespace",
            Self::Method => "method",
            Self::Local => "local",
        }
    }

    /// Parts this kind does real work for. Everything else is trivially complete.
    pub fn recognized_parts(&self) -> CompletionPart {
        match self {
            Self::Module => {
                CompletionPart::ATTRIBUTES
                    | CompletionPart::VALIDATING_REFERENCED_ASSEMBLIES
                    | CompletionPart::MEMBERS_COMPLETED
            }
            Self::Namespace => {
                CompletionPart::NAME_TO_MEMBERS_MAP | CompletionPart::MEMBERS_COMPLETED
            }
            Self::Method => {
                CompletionPart::ATTRIBUTES
                    | CompletionPart::METHOD_CHECKS
                    | CompletionPart::ASYNC_METHOD_CHECKS
                    | CompletionPart::MEMBERS_COMPLETED
            }
            Self::Local => CompletionPart::CONSTANT_VALUE,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lazy-completion contract every symbol kind implements
pub trait Completable: Send + Sync {
    fn id(&self) -> SymbolId;

    fn kind(&self) -> SymbolKind;

    fn name(&self) -> &str;

    /// Source spans the symbol is declared at, used by location filters
    fn declared_spans(&self) -> &[SourceSpan];

    fn completion_state(&self) -> &CompletionState;

    fn has_complete(&self, part: CompletionPart) -> bool {
        self.completion_state().has_complete(part)
    }

    /// Drive the symbol (and its children) as far as `filter` allows.
    ///
    /// Best effort: returning `Ok(())` does not mean every part is complete.
    /// Check `has_complete(CompletionPart::ALL)` and call again if needed.
    fn force_complete(&self, filter: Option<&LocationFilter>, token: &CancellationToken)
        -> Result<()>;
}

impl<T: Completable + ?Sized> Completable for Arc<T> {
    fn id(&self) -> SymbolId {
        (**self).id()
    }

    fn kind(&self) -> SymbolKind {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn declared_spans(&self) -> &[SourceSpan] {
        (**self).declared_spans()
    }

    fn completion_state(&self) -> &CompletionState {
        (**self).completion_state()
    }

    fn force_complete(
        &self,
        filter: Option<&LocationFilter>,
        token: &CancellationToken,
    ) -> Result<()> {
        (**self).force_complete(filter, token)
    }
}

/// A member of a namespace or method
#[derive(Debug, Clone)]
pub enum Symbol {
    Namespace(Arc<NamespaceSymbol>),
    Method(Arc<MethodSymbol>),
    Local(Arc<LocalSymbol>),
}

impl Symbol {
    fn as_completable(&self) -> &dyn Completable {
        match self {
            Self::Namespace(ns) => ns.as_ref(),
            Self::Method(method) => method.as_ref(),
            Self::Local(local) => local.as_ref(),
        }
    }

    pub fn as_namespace(&self) -> Option<&Arc<NamespaceSymbol>> {
        match self {
            Self::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&Arc<MethodSymbol>> {
        match self {
            Self::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn as_local(&self) -> Option<&Arc<LocalSymbol>> {
        match self {
            Self::Local(local) => Some(local),
            _ => None,
        }
    }
}

impl Completable for Symbol {
    fn id(&self) -> SymbolId {
        self.as_completable().id()
    }

    fn kind(&self) -> SymbolKind {
        self.as_completable().kind()
    }

    fn name(&self) -> &str {
        self.as_completable().name()
    }

    fn declared_spans(&self) -> &[SourceSpan] {
        self.as_completable().declared_spans()
    }

    fn completion_state(&self) -> &CompletionState {
        self.as_completable().completion_state()
    }

    fn force_complete(
        &self,
        filter: Option<&LocationFilter>,
        token: &CancellationToken,
    ) -> Result<()> {
        self.as_completable().force_complete(filter, token)
    }
}

/// Payload of a declaration event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredSymbol {
    pub id: SymbolId,
    pub kind: SymbolKind,
    /// Dotted name from the global namespace down
    pub name: String,
}

/// Shared `ATTRIBUTES` handler: bind into `slot`, then let the part winner
/// publish the diagnostics that belong to the stored value.
pub(crate) fn complete_attributes<S: Completable>(
    symbol: &S,
    syntax: SyntaxId,
    slot: &LazySlot<Bound<WellKnownAttributeData>>,
    services: &CompilationServices,
) -> Step {
    let bound = slot.get_or_publish(|| {
        services.binder.bind_attributes(AttributeTarget {
            symbol: symbol.id(),
            kind: symbol.kind(),
            name: symbol.name(),
            syntax,
            span: symbol.declared_spans().first(),
        })
    });

    if symbol.completion_state().note_part_complete(CompletionPart::ATTRIBUTES) {
        services
            .sink
            .publish(symbol.id(), CompletionPart::ATTRIBUTES, &bound.diagnostics);
    }
    Step::Continue
}

/// Build a request for `symbol` using the compilation's wait policy and run
/// the kind's dispatch table.
pub(crate) fn drive<S: Completable>(
    symbol: &S,
    table: &[crate::completion::PartHandler<S>],
    services: &CompilationServices,
    filter: Option<&LocationFilter>,
    token: &CancellationToken,
) -> Result<()> {
    let request = CompletionRequest::new(filter, token, services.wait_policy());
    crate::completion::force_complete(symbol, table, &request)
}

/// Join a container's qualified name with a member name
pub(crate) fn qualify(container: &str, name: &str) -> String {
    if container.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", container, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_parts_are_disjoint_where_expected() {
        assert!(SymbolKind::Local
            .recognized_parts()
            .contains(CompletionPart::CONSTANT_VALUE));
        assert!(!SymbolKind::Namespace
            .recognized_parts()
            .intersects(CompletionPart::METHOD_CHECKS));
        assert!(SymbolKind::Module
            .recognized_parts()
            .contains(CompletionPart::VALIDATING_REFERENCED_ASSEMBLIES));
        assert!(SymbolKind::Method
            .recognized_parts()
            .contains(CompletionPart::ASYNC_METHOD_CHECKS));
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("", "System"), "System");
        assert_eq!(qualify("System", "IO"), "System.IO");
    }
}
