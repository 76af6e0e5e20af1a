//! Complete command handler
//!
//! Loads a manifest, builds a compilation and lets `--threads` threads race
//! to complete it. Every thread drives the same symbols; the completion
//! protocol makes sure each diagnostic and declaration event is reported once
//! no matter how many threads ran.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::cli::{CompleteArgs, OutputFormat};
use crate::commands::CommandContext;
use crate::compilation::{Compilation, CompilationServices};
use crate::completion::CancellationToken;
use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::error::{CompletionError, Result};
use crate::events::{
    CompletionSummaryEvent, DeclarationNotifier, DiagnosticEvent, EventEmitter, RecordingNotifier,
};
use crate::location::LocationFilter;
use crate::manifest::Manifest;
use crate::symbols::DeclaredSymbol;

/// Result of a completion run
#[derive(Debug, Serialize)]
pub struct CompletionReport {
    pub complete: bool,
    pub modules: usize,
    pub duration_ms: u64,
    pub diagnostics: Vec<Diagnostic>,
    pub declared: Vec<DeclaredSymbol>,
}

impl CompletionReport {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

pub fn run_complete(args: &CompleteArgs, ctx: &CommandContext) -> Result<String> {
    let manifest = Manifest::load(&args.manifest)?;
    let (binder, modules) = manifest.lower()?;

    let filter = match (&args.file, &args.range) {
        (Some(file), Some(range)) => Some(LocationFilter::range(file.clone(), range.clone())),
        (Some(file), None) => Some(LocationFilter::file(file.clone())),
        _ => None,
    };

    // jsonl streams declaration events as they fire
    let recorder = Arc::new(RecordingNotifier::new());
    let emitter = Arc::new(EventEmitter::new(ctx.format == OutputFormat::Jsonl));
    let notifier: Arc<dyn DeclarationNotifier> = if ctx.format == OutputFormat::Jsonl {
        emitter.clone()
    } else {
        recorder.clone()
    };

    let sink = Arc::new(DiagnosticBag::new());
    let services = CompilationServices::new(Arc::new(binder), sink.clone(), notifier, ctx.config.clone());
    let compilation = Compilation::new(services, modules);

    let started = Instant::now();
    drive_concurrently(&compilation, filter.as_ref(), args.threads.max(1))?;

    let report = CompletionReport {
        complete: compilation.is_complete(),
        modules: compilation.modules().len(),
        duration_ms: started.elapsed().as_millis() as u64,
        diagnostics: sink.sorted_diagnostics(),
        declared: recorder.events(),
    };

    if ctx.verbose {
        eprintln!(
            "Completed {} module(s) with {} thread(s) in {}ms",
            report.modules, args.threads, report.duration_ms
        );
    }

    match ctx.format {
        OutputFormat::Text => Ok(format_text(&report, filter.as_ref())),
        OutputFormat::Json => serde_json::to_string_pretty(&report)
            .map(|json| format!("{}\n", json))
            .map_err(|e| CompletionError::Config {
                message: format!("JSON serialization failed: {}", e),
            }),
        OutputFormat::Jsonl => {
            for diagnostic in &report.diagnostics {
                emitter.emit(&DiagnosticEvent {
                    diagnostic: diagnostic.clone(),
                });
            }
            emitter.emit(&CompletionSummaryEvent {
                complete: report.complete,
                modules: report.modules,
                diagnostics: report.diagnostics.len(),
                errors: report.error_count(),
                duration_ms: report.duration_ms,
                timestamp: chrono::Utc::now().to_rfc3339(),
            });
            Ok(String::new())
        }
    }
}

/// Run `threads` force-completion calls against the same compilation
fn drive_concurrently(
    compilation: &Compilation,
    filter: Option<&LocationFilter>,
    threads: usize,
) -> Result<()> {
    let token = CancellationToken::new();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let token = &token;
                scope.spawn(move || {
                    let result = compilation.force_complete(filter, token);
                    if result.is_err() {
                        // Stop the other readers too.
                        token.cancel();
                    }
                    result
                })
            })
            .collect();

        let results: Vec<Result<()>> = handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect();

        // Report the failure that triggered the cancellation, not the cancellation.
        results
            .into_iter()
            .find(|result| matches!(result, Err(e) if !e.is_cancelled()))
            .unwrap_or(Ok(()))
    })
}

fn format_text(report: &CompletionReport, filter: Option<&LocationFilter>) -> String {
    let mut out = String::new();

    for diagnostic in &report.diagnostics {
        out.push_str(&format!("{}\n", diagnostic));
    }
    if !report.diagnostics.is_empty() {
        out.push('\n');
    }

    for declared in &report.declared {
        out.push_str(&format!("declared {} {}\n", declared.kind, display_name(declared)));
    }

    out.push_str(&format!(
        "\n{} module(s), {} diagnostic(s) ({} error(s)), {} declaration(s) in {}ms\n",
        report.modules,
        report.diagnostics.len(),
        report.error_count(),
        report.declared.len(),
        report.duration_ms
    ));
    if !report.complete {
        match filter {
            Some(filter) => out.push_str(&format!(
                "completion limited to {}; run without a filter to finish\n",
                filter
            )),
            None => out.push_str("completion did not finish\n"),
        }
    }
    out
}

fn display_name(declared: &DeclaredSymbol) -> &str {
    if declared.name.is_empty() {
        "<global namespace>"
    } else {
        &declared.name
    }
}
