//! Declaration manifests
//!
//! A manifest describes modules, namespaces, methods and locals as data
//! (TOML or JSON), with literal signatures and small constant expressions.
//! `Manifest::lower` turns it into module declarations plus a
//! `ManifestBinder` that answers the engine's binding questions from the
//! same data.
//!
//! ```toml
//! [[modules]]
//! name = "App"
//! file = "app.cs"
//!
//! [[modules.namespaces]]
//! name = "App.Core"
//! span = [0, 400]
//!
//! [[modules.namespaces.methods]]
//! name = "RunAsync"
//! span = [10, 80]
//! returns = "Task<int>"
//! async = true
//!
//! [[modules.namespaces.methods.locals]]
//! name = "limit"
//! span = [20, 30]
//! const = true
//! value = { mul = [{ int = 4 }, { local = "width" }] }
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::binder::{
    AssemblyReference, AttributeTarget, ConstantValue, LookupScope, SemanticBinder, SyntaxId,
    WellKnownAttributeData,
};
use crate::completion::Bound;
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::{CompletionError, Result};
use crate::location::SourceSpan;
use crate::symbols::local::{ConstantContext, LocalDecl, LocalSymbol};
use crate::symbols::method::{MethodDecl, MethodModifiers, MethodSymbol, PartialRole};
use crate::symbols::module::ModuleDecl;
use crate::symbols::namespace::{MemberDecl, NamespaceDecl};
use crate::symbols::signature::{Parameter, RefKind, Signature, TypeRef};
use crate::symbols::Completable;

/// Binder-defined diagnostic codes
pub mod codes {
    pub const TYPE_NOT_FOUND: &str = "SC0246";
    pub const NAME_NOT_FOUND: &str = "SC0103";
    pub const NOT_CONSTANT: &str = "SC0133";
    pub const CONSTANT_WITHOUT_VALUE: &str = "SC0145";
    pub const BAD_OPERANDS: &str = "SC0019";
    pub const CONSTANT_OVERFLOW: &str = "SC0220";
    pub const MISSING_RETURN_TYPE: &str = "SC1520";
}

/// Attribute names the manifest binder decodes without complaint
const KNOWN_ATTRIBUTES: &[&str] = &[
    "Obsolete",
    "Conditional",
    "Serializable",
    "Flags",
    "MethodImpl",
    "DllImport",
    "CLSCompliant",
    "AssemblyVersion",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub name: String,
    /// Default file for declarations that do not name one
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub references: Vec<AssemblyReference>,
    #[serde(default)]
    pub namespaces: Vec<NamespaceEntry>,
    /// Methods declared directly in the global namespace
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceEntry {
    /// Dotted names declare nested namespaces
    pub name: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub span: Option<(u32, u32)>,
    #[serde(default)]
    pub namespaces: Vec<NamespaceEntry>,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub ref_kind: RefKind,
}

/// A literal signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntry {
    #[serde(default = "default_return_type")]
    pub returns: String,
    #[serde(default)]
    pub return_modifiers: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterEntry>,
    #[serde(default)]
    pub vararg: bool,
}

fn default_return_type() -> String {
    "void".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodEntry {
    pub name: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub span: Option<(u32, u32)>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default = "default_return_type")]
    pub returns: String,
    #[serde(default)]
    pub return_modifiers: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterEntry>,
    #[serde(default)]
    pub vararg: bool,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default, rename = "override")]
    pub is_override: bool,
    #[serde(default)]
    pub partial: Option<PartialRole>,
    /// Signatures of the members an override may be overriding
    #[serde(default)]
    pub base: Vec<SignatureEntry>,
    #[serde(default)]
    pub locals: Vec<LocalEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEntry {
    pub name: String,
    #[serde(default)]
    pub span: Option<(u32, u32)>,
    #[serde(default, rename = "const")]
    pub is_const: bool,
    #[serde(default)]
    pub value: Option<ConstExpr>,
}

/// Constant initializer expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstExpr {
    Int(i64),
    Bool(bool),
    Str(String),
    Null,
    /// Another local of the same method
    Local(String),
    Add(Box<ConstExpr>, Box<ConstExpr>),
    Mul(Box<ConstExpr>, Box<ConstExpr>),
}

impl Manifest {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CompletionError::Manifest {
            message: format!("Failed to parse TOML manifest: {}", e),
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| CompletionError::Manifest {
            message: format!("Failed to parse JSON manifest: {}", e),
        })
    }

    /// Load a manifest, choosing the format by extension (`.json` or TOML)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CompletionError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Split the manifest into declarations and the binder that understands them
    pub fn lower(self) -> Result<(ManifestBinder, Vec<ModuleDecl>)> {
        let mut lowering = Lowering::default();
        let mut modules = Vec::with_capacity(self.modules.len());

        for module in self.modules {
            if module.name.trim().is_empty() {
                return Err(CompletionError::Manifest {
                    message: "module name must not be empty".to_string(),
                });
            }
            let file = module
                .file
                .clone()
                .unwrap_or_else(|| format!("{}.cs", module.name));

            let syntax = lowering.push(SyntaxNode::Module {
                attributes: module.attributes,
            });

            let mut global = NamespaceDecl::default();
            for namespace in module.namespaces {
                global
                    .members
                    .push(MemberDecl::Namespace(lowering.namespace(namespace, &file)?));
            }
            for method in module.methods {
                global
                    .members
                    .push(MemberDecl::Method(lowering.method(method, &file)?));
            }

            modules.push(ModuleDecl {
                name: module.name,
                syntax,
                references: module.references,
                global_namespace: global,
            });
        }

        Ok((
            ManifestBinder {
                syntax: lowering.syntax,
                counts: BindCounts::default(),
            },
            modules,
        ))
    }
}

enum SyntaxNode {
    Module {
        attributes: Vec<String>,
    },
    Method {
        attributes: Vec<String>,
        signature: SignatureEntry,
        base: Vec<SignatureEntry>,
    },
    Local {
        value: Option<ConstExpr>,
    },
}

#[derive(Default)]
struct Lowering {
    syntax: Vec<SyntaxNode>,
}

impl Lowering {
    fn push(&mut self, node: SyntaxNode) -> SyntaxId {
        self.syntax.push(node);
        SyntaxId((self.syntax.len() - 1) as u32)
    }

    fn namespace(&mut self, entry: NamespaceEntry, file: &str) -> Result<NamespaceDecl> {
        let file = entry.file.as_deref().unwrap_or(file).to_string();
        let spans = match entry.span {
            Some(span) => vec![span_of(&file, span, &entry.name)?],
            None => Vec::new(),
        };

        let mut members = Vec::new();
        for child in entry.namespaces {
            members.push(MemberDecl::Namespace(self.namespace(child, &file)?));
        }
        for method in entry.methods {
            members.push(MemberDecl::Method(self.method(method, &file)?));
        }

        // `A.B.C` declares C inside B inside A
        let mut segments: Vec<&str> = entry.name.split('.').filter(|s| !s.is_empty()).collect();
        let innermost = segments.pop().ok_or_else(|| CompletionError::Manifest {
            message: "namespace name must not be empty".to_string(),
        })?;
        let mut decl = NamespaceDecl {
            name: innermost.to_string(),
            spans: spans.clone(),
            members,
        };
        while let Some(outer) = segments.pop() {
            decl = NamespaceDecl {
                name: outer.to_string(),
                spans: spans.clone(),
                members: vec![MemberDecl::Namespace(decl)],
            };
        }
        Ok(decl)
    }

    fn method(&mut self, entry: MethodEntry, file: &str) -> Result<MethodDecl> {
        let file = entry.file.as_deref().unwrap_or(file).to_string();
        let span = span_of(&file, entry.span.unwrap_or((0, 0)), &entry.name)?;

        let mut locals = Vec::with_capacity(entry.locals.len());
        for local in entry.locals {
            let local_span = span_of(&file, local.span.unwrap_or((span.start, span.start)), &local.name)?;
            let syntax = self.push(SyntaxNode::Local { value: local.value });
            locals.push(LocalDecl {
                name: local.name,
                span: local_span,
                syntax,
                is_const: local.is_const,
            });
        }

        let syntax = self.push(SyntaxNode::Method {
            attributes: entry.attributes,
            signature: SignatureEntry {
                returns: entry.returns,
                return_modifiers: entry.return_modifiers,
                parameters: entry.parameters,
                vararg: entry.vararg,
            },
            base: entry.base,
        });

        Ok(MethodDecl {
            name: entry.name,
            span,
            syntax,
            modifiers: MethodModifiers {
                is_async: entry.is_async,
                is_override: entry.is_override,
                partial: entry.partial,
            },
            locals,
        })
    }
}

fn span_of(file: &str, (start, end): (u32, u32), name: &str) -> Result<SourceSpan> {
    if end < start {
        return Err(CompletionError::Manifest {
            message: format!("span of '{}' ends before it starts ({}..{})", name, start, end),
        });
    }
    Ok(SourceSpan::new(file, start, end))
}

/// How often each binder entry point ran
#[derive(Debug, Default)]
pub struct BindCounts {
    pub attributes: AtomicUsize,
    pub signatures: AtomicUsize,
    pub declaration_signatures: AtomicUsize,
    pub constants: AtomicUsize,
}

impl BindCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// `SemanticBinder` over a lowered manifest
pub struct ManifestBinder {
    syntax: Vec<SyntaxNode>,
    counts: BindCounts,
}

impl ManifestBinder {
    pub fn counts(&self) -> &BindCounts {
        &self.counts
    }

    fn node(&self, syntax: SyntaxId) -> Option<&SyntaxNode> {
        self.syntax.get(syntax.0 as usize)
    }

    fn eval(&self, expr: &ConstExpr, local: &LocalSymbol, context: &mut ConstantContext<'_>) -> ConstantValue {
        match expr {
            ConstExpr::Int(v) => ConstantValue::Int(*v),
            ConstExpr::Bool(v) => ConstantValue::Bool(*v),
            ConstExpr::Str(v) => ConstantValue::Str(v.clone()),
            ConstExpr::Null => ConstantValue::Null,
            ConstExpr::Local(name) => {
                let target = local
                    .containing_method()
                    .and_then(|method| method.local_named(name).cloned());
                match target {
                    None => {
                        context.report(error(
                            codes::NAME_NOT_FOUND,
                            format!("The name '{}' does not exist in the current context", name),
                            local,
                        ));
                        ConstantValue::Bad
                    }
                    Some(target) if !target.is_const() => {
                        context.report(error(
                            codes::NOT_CONSTANT,
                            format!("The expression being assigned to '{}' must be constant", local.name()),
                            local,
                        ));
                        ConstantValue::Bad
                    }
                    Some(target) => context.value_of(&target),
                }
            }
            ConstExpr::Add(a, b) => {
                let (a, b) = (self.eval(a, local, context), self.eval(b, local, context));
                match (a, b) {
                    (ConstantValue::Bad, _) | (_, ConstantValue::Bad) => ConstantValue::Bad,
                    (ConstantValue::Int(a), ConstantValue::Int(b)) => checked(a.checked_add(b), local, context),
                    (ConstantValue::Str(a), b) => ConstantValue::Str(format!("{}{}", a, unquoted(&b))),
                    (a, ConstantValue::Str(b)) => ConstantValue::Str(format!("{}{}", unquoted(&a), b)),
                    (a, b) => bad_operands("+", &a, &b, local, context),
                }
            }
            ConstExpr::Mul(a, b) => {
                let (a, b) = (self.eval(a, local, context), self.eval(b, local, context));
                match (a, b) {
                    (ConstantValue::Bad, _) | (_, ConstantValue::Bad) => ConstantValue::Bad,
                    (ConstantValue::Int(a), ConstantValue::Int(b)) => checked(a.checked_mul(b), local, context),
                    (a, b) => bad_operands("*", &a, &b, local, context),
                }
            }
        }
    }
}

fn error(code: &str, message: String, local: &LocalSymbol) -> Diagnostic {
    Diagnostic::custom(code, Severity::Error, message, Some(local.span().clone()))
}

fn checked(value: Option<i64>, local: &LocalSymbol, context: &mut ConstantContext<'_>) -> ConstantValue {
    match value {
        Some(v) => ConstantValue::Int(v),
        None => {
            context.report(error(
                codes::CONSTANT_OVERFLOW,
                "The operation overflows at compile time".to_string(),
                local,
            ));
            ConstantValue::Bad
        }
    }
}

fn bad_operands(
    op: &str,
    a: &ConstantValue,
    b: &ConstantValue,
    local: &LocalSymbol,
    context: &mut ConstantContext<'_>,
) -> ConstantValue {
    context.report(error(
        codes::BAD_OPERANDS,
        format!("Operator '{}' cannot be applied to operands '{}' and '{}'", op, a, b),
        local,
    ));
    ConstantValue::Bad
}

fn unquoted(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Str(s) => s.clone(),
        ConstantValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn type_ref(name: &str, modifiers: &[String]) -> TypeRef {
    TypeRef::named(name.trim()).with_modifiers(modifiers.to_vec())
}

fn lower_signature(entry: &SignatureEntry) -> Signature {
    let return_type = if entry.returns.trim().is_empty() {
        TypeRef::error()
    } else {
        type_ref(&entry.returns, &entry.return_modifiers)
    };
    let mut signature = Signature::new(
        return_type,
        entry.parameters
            .iter()
            .map(|p| Parameter::new(p.name.clone(), type_ref(&p.ty, &p.modifiers)).with_ref_kind(p.ref_kind))
            .collect(),
    );
    signature.is_vararg = entry.vararg;
    signature
}

/// Split `Name("arg")` into its name and optional string argument
fn parse_attribute(text: &str) -> (&str, Option<&str>) {
    let text = text.trim();
    match text.find('(') {
        Some(open) => {
            let name = text[..open].trim();
            let arg = text[open + 1..]
                .trim_end_matches(')')
                .trim()
                .trim_matches('"');
            (name, if arg.is_empty() { None } else { Some(arg) })
        }
        None => (text, None),
    }
}

impl SemanticBinder for ManifestBinder {
    fn bind_attributes(&self, target: AttributeTarget<'_>) -> Bound<WellKnownAttributeData> {
        self.counts.attributes.fetch_add(1, Ordering::SeqCst);
        let attributes = match self.node(target.syntax) {
            Some(SyntaxNode::Module { attributes }) | Some(SyntaxNode::Method { attributes, .. }) => {
                attributes.as_slice()
            }
            _ => &[],
        };

        let mut data = WellKnownAttributeData::default();
        let mut diagnostics = Vec::new();
        for attribute in attributes {
            let (name, arg) = parse_attribute(attribute);
            let name = name.strip_suffix("Attribute").unwrap_or(name);
            match name {
                "Obsolete" => data.obsolete = Some(arg.unwrap_or_default().to_string()),
                "Conditional" => data.conditional.extend(arg.map(str::to_string)),
                known if KNOWN_ATTRIBUTES.contains(&known) => data.others.push(known.to_string()),
                unknown => diagnostics.push(Diagnostic::custom(
                    codes::TYPE_NOT_FOUND,
                    Severity::Error,
                    format!(
                        "The type or namespace name '{}Attribute' could not be found (on {} '{}')",
                        unknown, target.kind, target.name
                    ),
                    target.span.cloned(),
                )),
            }
        }
        Bound::new(data, diagnostics)
    }

    fn bind_signature(&self, method: &MethodSymbol, scope: LookupScope<'_>) -> Bound<Signature> {
        if scope.is_declaration() {
            self.counts.declaration_signatures.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counts.signatures.fetch_add(1, Ordering::SeqCst);
        }

        let Some(SyntaxNode::Method { signature, .. }) = self.node(method.syntax()) else {
            return Bound::clean(Signature::error());
        };

        let lowered = lower_signature(signature);
        let mut diagnostics = Vec::new();
        if lowered.return_type.is_error() {
            diagnostics.push(Diagnostic::custom(
                codes::MISSING_RETURN_TYPE,
                Severity::Error,
                format!("Method '{}' must have a return type", method.name()),
                Some(method.span().clone()),
            ));
        }
        Bound::new(lowered, diagnostics)
    }

    fn override_candidates(&self, method: &MethodSymbol, _scope: LookupScope<'_>) -> Vec<Signature> {
        match self.node(method.syntax()) {
            Some(SyntaxNode::Method { base, .. }) => base.iter().map(lower_signature).collect(),
            _ => Vec::new(),
        }
    }

    fn bind_constant(&self, local: &LocalSymbol, context: &mut ConstantContext<'_>) -> ConstantValue {
        self.counts.constants.fetch_add(1, Ordering::SeqCst);
        match self.node(local.syntax()) {
            Some(SyntaxNode::Local { value: Some(expr) }) => self.eval(expr, local, context),
            _ => {
                context.report(error(
                    codes::CONSTANT_WITHOUT_VALUE,
                    "A const field requires a value to be provided".to_string(),
                    local,
                ));
                ConstantValue::Bad
            }
        }
    }
}
