//! Diagnostics and the append-only diagnostics sink
//!
//! Diagnostics are produced by completion parts and by the binder. They are
//! never written straight to a sink by the code that computes them: they are
//! stored alongside the computed value and handed to the sink by whichever
//! thread wins the owning part. A sink therefore sees each (symbol, part)
//! batch exactly once.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::completion::CompletionPart;
use crate::location::SourceSpan;
use crate::symbols::SymbolId;

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Stable codes for the diagnostics the completion engine itself reports.
///
/// Binders are free to report their own codes through `Diagnostic::custom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A constant's value depends on itself
    CircularConstant,
    /// `override` with no matching member in the candidates
    OverrideNotFound,
    /// Async method returns a type outside the accepted shapes
    BadAsyncReturnType,
    /// Async method declares a by-reference parameter
    BadAsyncByRefParameter,
    /// Async method declares varargs
    BadAsyncVarargs,
    /// Two members of different kinds share a name
    DuplicateMemberName,
    /// Partial implementation without a matching partial definition
    PartialImplementationWithoutDefinition,
    /// Two partial definitions with the same signature
    DuplicatePartialDefinition,
    /// Interop types embedded from an assembly that is not an interop assembly
    EmbedInteropFromNonInteropAssembly,
    /// The same assembly referenced twice
    DuplicateReference,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CircularConstant => "SC0110",
            Self::OverrideNotFound => "SC0115",
            Self::BadAsyncReturnType => "SC1983",
            Self::BadAsyncByRefParameter => "SC1988",
            Self::BadAsyncVarargs => "SC4006",
            Self::DuplicateMemberName => "SC0101",
            Self::PartialImplementationWithoutDefinition => "SC0759",
            Self::DuplicatePartialDefinition => "SC0756",
            Self::EmbedInteropFromNonInteropAssembly => "SC1747",
            Self::DuplicateReference => "SC1701",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateReference => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    /// Diagnostic with one of the engine's own codes
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Option<SourceSpan>) -> Self {
        Self {
            code: code.as_str().to_string(),
            severity: code.severity(),
            message: message.into(),
            span,
        }
    }

    /// Diagnostic with a binder-defined code
    pub fn custom(
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        span: Option<SourceSpan>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.code == code.as_str()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity.as_str(), self.code, self.message)?;
        if let Some(span) = &self.span {
            write!(f, " ({})", span)?;
        }
        Ok(())
    }
}

/// Receives the diagnostics of a completion part from its winning thread
pub trait DiagnosticSink: Send + Sync {
    fn publish(&self, symbol: SymbolId, part: CompletionPart, diagnostics: &[Diagnostic]);
}

/// One published batch
#[derive(Debug, Clone, Serialize)]
pub struct PublishedBatch {
    pub symbol: SymbolId,
    pub part: CompletionPart,
    pub diagnostics: Vec<Diagnostic>,
}

/// In-memory, append-only sink that keeps every batch it receives
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    batches: Mutex<Vec<PublishedBatch>>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch in publication order
    pub fn batches(&self) -> Vec<PublishedBatch> {
        self.batches.lock().clone()
    }

    /// Every diagnostic, flattened in publication order
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.batches
            .lock()
            .iter()
            .flat_map(|batch| batch.diagnostics.iter().cloned())
            .collect()
    }

    /// Every diagnostic, ordered by location then code for stable output
    pub fn sorted_diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics();
        diagnostics.sort_by(|a, b| {
            let key = |d: &Diagnostic| {
                d.span
                    .as_ref()
                    .map(|s| (s.file.clone(), s.start, s.end))
                    .unwrap_or_default()
            };
            key(a).cmp(&key(b)).then_with(|| a.code.cmp(&b.code))
        });
        diagnostics
    }

    /// How many times the (symbol, part) pair was published
    pub fn publish_count(&self, symbol: SymbolId, part: CompletionPart) -> usize {
        self.batches
            .lock()
            .iter()
            .filter(|batch| batch.symbol == symbol && batch.part == part)
            .count()
    }

    /// Diagnostics carrying `code`
    pub fn with_code(&self, code: ErrorCode) -> Vec<Diagnostic> {
        self.diagnostics()
            .into_iter()
            .filter(|d| d.has_code(code))
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics().iter().filter(|d| d.is_error()).count()
    }
}

impl DiagnosticSink for DiagnosticBag {
    fn publish(&self, symbol: SymbolId, part: CompletionPart, diagnostics: &[Diagnostic]) {
        if !diagnostics.is_empty() {
            tracing::debug!(
                "[DIAG] {} diagnostic(s) for symbol {} ({:?})",
                diagnostics.len(),
                symbol,
                part
            );
        }
        self.batches.lock().push(PublishedBatch {
            symbol,
            part,
            diagnostics: diagnostics.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bag_counts_batches_per_part() {
        let bag = DiagnosticBag::new();
        let symbol = SymbolId::new(7);
        bag.publish(symbol, CompletionPart::ATTRIBUTES, &[]);
        bag.publish(
            symbol,
            CompletionPart::FINISH_METHOD_CHECKS,
            &[Diagnostic::new(ErrorCode::OverrideNotFound, "no match", None)],
        );

        assert_eq!(bag.publish_count(symbol, CompletionPart::ATTRIBUTES), 1);
        assert_eq!(bag.publish_count(symbol, CompletionPart::FINISH_METHOD_CHECKS), 1);
        assert_eq!(bag.diagnostics().len(), 1);
        assert_eq!(bag.with_code(ErrorCode::OverrideNotFound).len(), 1);
        assert_eq!(bag.error_count(), 1);
    }

    #[test]
    fn test_sorted_diagnostics_orders_by_span() {
        let bag = DiagnosticBag::new();
        let symbol = SymbolId::new(1);
        bag.publish(
            symbol,
            CompletionPart::ATTRIBUTES,
            &[
                Diagnostic::new(
                    ErrorCode::DuplicateMemberName,
                    "late",
                    Some(SourceSpan::new("a.cs", 40, 45)),
                ),
                Diagnostic::new(
                    ErrorCode::DuplicateMemberName,
                    "early",
                    Some(SourceSpan::new("a.cs", 1, 5)),
                ),
            ],
        );
        let sorted = bag.sorted_diagnostics();
        assert_eq!(sorted[0].message, "early");
    }

    #[test]
    fn test_display_includes_code_and_span() {
        let d = Diagnostic::new(
            ErrorCode::CircularConstant,
            "The evaluation of the constant value for 'x' involves a circular definition",
            Some(SourceSpan::new("a.cs", 3, 4)),
        );
        let text = d.to_string();
        assert!(text.starts_with("error[SC0110]"));
        assert!(text.ends_with("(a.cs:3..4)"));
    }
}
