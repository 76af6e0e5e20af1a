//! Namespace symbols and two-phase member construction
//!
//! Building a namespace runs in phases:
//!
//! 1. merge same-named nested namespace declarations
//! 2. construct every member minimally, with no binding
//! 3. bind partial method signatures in declaration scope and pair
//!    definitions with implementations
//! 4. finalize the member list
//! 5. attach every member to the new namespace
//!
//! Only after step 5 can a member look up its container, which is what the
//! ordinary (non-partial) signature binding needs.

use std::fmt;
use std::sync::{Arc, Weak};

use ahash::AHashMap;

use crate::compilation::CompilationServices;
use crate::completion::{
    Bound, CancellationToken, CompletionPart, CompletionRequest, CompletionState, LazySlot,
    PartHandler, Step,
};
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::error::Result;
use crate::location::{LocationFilter, SourceSpan};

use super::fanout::complete_children;
use super::method::{MethodDecl, MethodSymbol, PartialRole};
use super::{drive, qualify, Completable, DeclaredSymbol, Symbol, SymbolId, SymbolKind};

/// Declaration of a namespace. The same name may be declared several times.
#[derive(Debug, Clone, Default)]
pub struct NamespaceDecl {
    pub name: String,
    pub spans: Vec<SourceSpan>,
    pub members: Vec<MemberDecl>,
}

#[derive(Debug, Clone)]
pub enum MemberDecl {
    Namespace(NamespaceDecl),
    Method(MethodDecl),
}

type NameMap = AHashMap<String, Vec<Symbol>>;

pub struct NamespaceSymbol {
    id: SymbolId,
    name: String,
    qualified_name: String,
    spans: Vec<SourceSpan>,
    services: Arc<CompilationServices>,
    state: CompletionState,
    members: Vec<Symbol>,
    name_map: LazySlot<Bound<NameMap>>,
}

const NAMESPACE_PARTS: &[PartHandler<NamespaceSymbol>] = &[
    PartHandler::new(
        CompletionPart::NAME_TO_MEMBERS_MAP,
        NamespaceSymbol::complete_name_map,
    ),
    PartHandler::new(
        CompletionPart::MEMBERS_COMPLETED,
        NamespaceSymbol::complete_members,
    ),
];

impl NamespaceSymbol {
    pub(crate) fn build(
        decl: NamespaceDecl,
        parent: &str,
        services: &Arc<CompilationServices>,
    ) -> Arc<Self> {
        let id = services.allocate_id();
        let qualified_name = qualify(parent, &decl.name);

        // Phase 1 and 2
        let mut members = Vec::new();
        let mut methods = Vec::new();
        for member in merge_namespaces(decl.members) {
            match member {
                MemberDecl::Namespace(child) => {
                    members.push(Symbol::Namespace(Self::build(child, &qualified_name, services)));
                }
                MemberDecl::Method(method) => {
                    let method = MethodSymbol::new(method, services);
                    methods.push(Arc::clone(&method));
                    members.push(Symbol::Method(method));
                }
            }
        }

        // Phase 3
        pair_partial_methods(&methods);

        // Phase 4: a namespace is located at its own declarations and at
        // every member declared outside them.
        let spans = located_spans(decl.spans, &members);

        tracing::trace!(
            "[DRIVE] Built namespace '{}' with {} member(s)",
            qualified_name,
            members.len()
        );

        // Phase 5
        Arc::new_cyclic(|me: &Weak<NamespaceSymbol>| {
            for method in &methods {
                method.attach(me.clone());
            }
            Self {
                id,
                name: decl.name,
                qualified_name,
                spans,
                services: Arc::clone(services),
                state: CompletionState::new(),
                members,
                name_map: LazySlot::new(),
            }
        })
    }

    /// Dotted name from the global namespace. Empty for the global namespace.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn is_global(&self) -> bool {
        self.name.is_empty()
    }

    /// Finalized member list in declaration order
    pub fn members(&self) -> &[Symbol] {
        &self.members
    }

    /// Members named `name`, building the name map on first use
    pub fn members_named(&self, name: &str, token: &CancellationToken) -> Result<&[Symbol]> {
        if !self.state.has_complete(CompletionPart::NAME_TO_MEMBERS_MAP) {
            token.check()?;
            let request = CompletionRequest::new(None, token, self.services.wait_policy());
            self.complete_name_map(&request)?;
        }
        Ok(self
            .name_map
            .get()
            .and_then(|map| map.value.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    fn build_name_map(&self) -> Bound<NameMap> {
        let mut map: NameMap = AHashMap::with_capacity(self.members.len());
        let mut diagnostics = Vec::new();

        for member in &self.members {
            let entry = map.entry(member.name().to_string()).or_default();
            if let Some(existing) = entry.iter().find(|other| other.kind() != member.kind()) {
                diagnostics.push(Diagnostic::new(
                    ErrorCode::DuplicateMemberName,
                    format!(
                        "The namespace '{}' already contains a {} named '{}'",
                        self.display_name(),
                        existing.kind(),
                        member.name()
                    ),
                    member.declared_spans().first().cloned(),
                ));
            }
            entry.push(member.clone());
        }

        Bound::new(map, diagnostics)
    }

    fn display_name(&self) -> &str {
        if self.is_global() {
            "<global namespace>"
        } else {
            &self.qualified_name
        }
    }

    fn complete_name_map(&self, _request: &CompletionRequest<'_>) -> Result<Step> {
        let map = self.name_map.get_or_publish(|| self.build_name_map());
        if self.state.note_part_complete(CompletionPart::NAME_TO_MEMBERS_MAP) {
            self.services
                .sink
                .publish(self.id, CompletionPart::NAME_TO_MEMBERS_MAP, &map.diagnostics);
        }
        Ok(Step::Continue)
    }

    fn complete_members(&self, request: &CompletionRequest<'_>) -> Result<Step> {
        if !complete_children(&self.members, request, &self.services.config.fan_out)? {
            return Ok(Step::Suspend);
        }

        if self.state.note_part_complete(CompletionPart::MEMBERS_COMPLETED) {
            let declared = DeclaredSymbol {
                id: self.id,
                kind: SymbolKind::Namespace,
                name: self.qualified_name.clone(),
            };
            tracing::debug!("[EVENTS] Namespace declared: {}", self.display_name());
            self.services.notifier.symbol_declared(&declared);
        }
        Ok(Step::Continue)
    }
}

/// Fold repeated declarations of one namespace into the first, keeping
/// first-declaration order.
fn merge_namespaces(members: Vec<MemberDecl>) -> Vec<MemberDecl> {
    let mut merged: Vec<MemberDecl> = Vec::with_capacity(members.len());
    let mut namespace_index: AHashMap<String, usize> = AHashMap::new();

    for member in members {
        match member {
            MemberDecl::Namespace(ns) => match namespace_index.get(&ns.name) {
                Some(&index) => {
                    if let MemberDecl::Namespace(existing) = &mut merged[index] {
                        existing.spans.extend(ns.spans);
                        existing.members.extend(ns.members);
                    }
                }
                None => {
                    namespace_index.insert(ns.name.clone(), merged.len());
                    merged.push(MemberDecl::Namespace(ns));
                }
            },
            method => merged.push(method),
        }
    }

    merged
}

/// Own declaration spans followed by member spans not already inside one.
/// Location filters match a namespace whenever they could match a member.
fn located_spans(own: Vec<SourceSpan>, members: &[Symbol]) -> Vec<SourceSpan> {
    let mut spans = own;
    for span in members.iter().flat_map(|member| member.declared_spans()) {
        if !spans.iter().any(|existing| existing.contains(span)) {
            spans.push(span.clone());
        }
    }
    spans
}

/// Bind partial signatures in declaration scope and link each
/// implementation to its definition.
fn pair_partial_methods(methods: &[Arc<MethodSymbol>]) {
    let mut definitions: Vec<&Arc<MethodSymbol>> = Vec::new();
    let mut implementations: Vec<&Arc<MethodSymbol>> = Vec::new();

    for method in methods {
        match method.partial_role() {
            Some(PartialRole::Definition) => definitions.push(method),
            Some(PartialRole::Implementation) => implementations.push(method),
            None => continue,
        }
        method.compute_declaration_signature();
    }

    // Duplicate definitions: same name, same relaxed parameter list.
    let mut unique_definitions: Vec<&Arc<MethodSymbol>> = Vec::new();
    for definition in definitions {
        let duplicate = unique_definitions.iter().any(|earlier| {
            earlier.name() == definition.name()
                && same_parameters(earlier, definition)
        });
        if duplicate {
            definition.set_pairing_diagnostics(vec![Diagnostic::new(
                ErrorCode::DuplicatePartialDefinition,
                format!(
                    "A partial method '{}' may not have multiple defining declarations",
                    definition.name()
                ),
                Some(definition.span().clone()),
            )]);
        } else {
            unique_definitions.push(definition);
        }
    }

    let mut paired = vec![false; unique_definitions.len()];
    for implementation in implementations {
        let found = unique_definitions.iter().enumerate().find(|(index, definition)| {
            !paired[*index]
                && definition.name() == implementation.name()
                && same_parameters(definition, implementation)
        });

        match found {
            Some((index, definition)) => {
                paired[index] = true;
                definition.link_partner(implementation);
                implementation.link_partner(definition);
            }
            None => implementation.set_pairing_diagnostics(vec![Diagnostic::new(
                ErrorCode::PartialImplementationWithoutDefinition,
                format!(
                    "No defining declaration found for implementing declaration of partial method '{}'",
                    implementation.name()
                ),
                Some(implementation.span().clone()),
            )]),
        }
    }
}

fn same_parameters(a: &MethodSymbol, b: &MethodSymbol) -> bool {
    match (a.declaration_signature(), b.declaration_signature()) {
        (Some(a), Some(b)) => a.parameters_match_relaxed(b),
        _ => false,
    }
}

impl Completable for NamespaceSymbol {
    fn id(&self) -> SymbolId {
        self.id
    }

    fn kind(&self) -> SymbolKind {
        SymbolKind::Namespace
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
        drive(self, NAMESPACE_PARTS, &self.services, filter, token)
    }
}

impl fmt::Debug for NamespaceSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceSymbol")
            .field("id", &self.id)
            .field("name", &self.display_name())
            .field("members", &self.members.len())
            .field("completed", &self.state.completed_parts())
            .finish()
    }
}
