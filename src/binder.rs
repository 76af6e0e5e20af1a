//! The semantic binder seam
//!
//! The completion engine never interprets syntax itself. Everything it needs
//! to know about declared attributes, signatures, constant initializers and
//! assembly references comes from a `SemanticBinder`. The manifest front-end
//! provides one; hosts embedding the engine provide their own.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::completion::Bound;
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::location::SourceSpan;
use crate::symbols::local::{ConstantContext, LocalSymbol};
use crate::symbols::method::MethodSymbol;
use crate::symbols::module::ModuleSymbol;
use crate::symbols::namespace::NamespaceSymbol;
use crate::symbols::signature::Signature;
use crate::symbols::{SymbolId, SymbolKind};

/// Opaque handle to the declaration a symbol was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyntaxId(pub u32);

/// Where a signature is being bound from.
///
/// Partial methods are bound while their container is still being built, so
/// only `Declaration` lookups are possible then. Everything else binds with
/// the attached container in scope.
#[derive(Debug, Clone, Copy)]
pub enum LookupScope<'a> {
    Declaration,
    Container(&'a NamespaceSymbol),
}

impl LookupScope<'_> {
    pub fn is_declaration(&self) -> bool {
        matches!(self, Self::Declaration)
    }
}

/// Decoded well-known attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WellKnownAttributeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obsolete: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditional: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub others: Vec<String>,
}

impl WellKnownAttributeData {
    pub fn is_obsolete(&self) -> bool {
        self.obsolete.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.obsolete.is_none() && self.conditional.is_empty() && self.others.is_empty()
    }
}

/// The value of a constant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum ConstantValue {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
    /// Evaluation failed; an error has already been reported somewhere
    Bad,
}

impl ConstantValue {
    pub fn is_bad(&self) -> bool {
        matches!(self, Self::Bad)
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "{:?}", v),
            Self::Null => f.write_str("null"),
            Self::Bad => f.write_str("<bad>"),
        }
    }
}

/// A module's reference to another assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReference {
    pub name: String,
    #[serde(default)]
    pub embed_interop_types: bool,
    #[serde(default)]
    pub is_interop_assembly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

/// The symbol whose attributes are being bound
#[derive(Debug, Clone, Copy)]
pub struct AttributeTarget<'a> {
    pub symbol: SymbolId,
    pub kind: SymbolKind,
    pub name: &'a str,
    pub syntax: SyntaxId,
    pub span: Option<&'a SourceSpan>,
}

/// Produces semantic facts from stored declarations.
///
/// Implementations must be pure with respect to their inputs: the engine may
/// call any method more than once for the same symbol when threads race, and
/// keeps only one result.
pub trait SemanticBinder: Send + Sync {
    /// Bind and decode the attributes declared on `target`
    fn bind_attributes(&self, target: AttributeTarget<'_>) -> Bound<WellKnownAttributeData>;

    /// Bind a method's signature. Custom modifiers borrowed from an
    /// overridden member are applied by the engine afterwards.
    fn bind_signature(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Bound<Signature>;

    /// Signatures of the members `method` could be overriding
    fn override_candidates(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Vec<Signature> {
        let _ = (method, scope);
        Vec::new()
    }

    /// Evaluate a const local's initializer. Other constants must be read
    /// through `context.value_of` so cycles are caught.
    fn bind_constant(&self, local: &LocalSymbol, context: &mut ConstantContext<'_>) -> ConstantValue;

    /// Validate a module's assembly references
    fn validate_references(&self, module: &ModuleSymbol) -> Vec<Diagnostic> {
        default_reference_rules(module.references())
    }
}

/// Reference rules every binder gets unless it overrides them:
/// embedding interop types from a non-interop assembly is an error, and
/// referencing the same assembly twice is a warning.
pub fn default_reference_rules(references: &[AssemblyReference]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (index, reference) in references.iter().enumerate() {
        if reference.embed_interop_types && !reference.is_interop_assembly {
            diagnostics.push(Diagnostic::new(
                ErrorCode::EmbedInteropFromNonInteropAssembly,
                format!(
                    "Cannot embed interop types from assembly '{}' because it is not marked as an interop assembly",
                    reference.name
                ),
                reference.span.clone(),
            ));
        }

        let seen_before = references[..index]
            .iter()
            .any(|earlier| earlier.name.eq_ignore_ascii_case(&reference.name));
        if seen_before {
            diagnostics.push(Diagnostic::new(
                ErrorCode::DuplicateReference,
                format!("Assembly '{}' is referenced more than once", reference.name),
                reference.span.clone(),
            ));
        }
    }

    diagnostics
}
