//! Declaration events
//!
//! A symbol's declaration event fires exactly once, from the thread that wins
//! the symbol's terminal completion part. Notifiers only deliver; they never
//! need to deduplicate.
//!
//! # Event Format
//!
//! `EventEmitter` writes one JSON object per line (JSON Lines format):
//! ```json
//! {"type":"symbol_declared","id":3,"kind":"method","name":"App.Run","timestamp":"..."}
//! ```
//!
//! # Event Types
//!
//! - `symbol_declared` - A symbol finished its declaration-time checks
//! - `diagnostic` - A diagnostic reported during completion
//! - `completion_summary` - Totals at the end of a CLI run

use serde::Serialize;
use std::io::{self, Write};
use std::sync::mpsc::Sender;

use parking_lot::Mutex;

use crate::diagnostics::Diagnostic;
use crate::symbols::{DeclaredSymbol, SymbolKind};

/// Receives declaration events
pub trait DeclarationNotifier: Send + Sync {
    fn symbol_declared(&self, symbol: &DeclaredSymbol);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl DeclarationNotifier for NullNotifier {
    fn symbol_declared(&self, _symbol: &DeclaredSymbol) {}
}

/// Keeps every event in memory, in delivery order
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<DeclaredSymbol>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeclaredSymbol> {
        self.events.lock().clone()
    }

    /// How many events named `name`
    pub fn count_for(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name == name).count()
    }

    pub fn count_of_kind(&self, kind: SymbolKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl DeclarationNotifier for RecordingNotifier {
    fn symbol_declared(&self, symbol: &DeclaredSymbol) {
        self.events.lock().push(symbol.clone());
    }
}

/// Forwards events to a channel, for consumers on another thread
pub struct ChannelNotifier {
    sender: Mutex<Sender<DeclaredSymbol>>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<DeclaredSymbol>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl DeclarationNotifier for ChannelNotifier {
    fn symbol_declared(&self, symbol: &DeclaredSymbol) {
        if self.sender.lock().send(symbol.clone()).is_err() {
            tracing::warn!("[EVENTS] Receiver gone, dropping event for {}", symbol.name);
        }
    }
}

/// Event emitter writing JSON lines to stdout or any writer
pub struct EventEmitter {
    enabled: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl EventEmitter {
    /// Emitter writing to stdout
    pub fn new(enabled: bool) -> Self {
        Self::with_writer(enabled, Box::new(io::stdout()))
    }

    pub fn with_writer(enabled: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            enabled,
            out: Mutex::new(out),
        }
    }

    /// Emit an event as one JSON line
    pub fn emit<E: EngineEvent>(&self, event: &E) {
        if !self.enabled {
            return;
        }

        let wrapper = EventWrapper {
            event_type: E::event_type(),
            payload: event,
        };

        match serde_json::to_string(&wrapper) {
            Ok(json) => {
                let mut out = self.out.lock();
                // Ignore write errors (reader may have closed)
                let _ = writeln!(out, "{}", json);
                let _ = out.flush();
            }
            Err(e) => tracing::warn!("[EVENTS] Failed to serialize {}: {}", E::event_type(), e),
        }
    }
}

impl DeclarationNotifier for EventEmitter {
    fn symbol_declared(&self, symbol: &DeclaredSymbol) {
        self.emit(&SymbolDeclaredEvent::from_symbol(symbol));
    }
}

/// Wrapper for events with type field
#[derive(Serialize)]
struct EventWrapper<'a, P: Serialize> {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(flatten)]
    payload: &'a P,
}

/// Trait for engine events
pub trait EngineEvent: Serialize {
    fn event_type() -> &'static str;
}

// ============================================================================
// Event Types
// ============================================================================

/// Event emitted when a symbol is declared
#[derive(Debug, Clone, Serialize)]
pub struct SymbolDeclaredEvent {
    #[serde(flatten)]
    pub symbol: DeclaredSymbol,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl EngineEvent for SymbolDeclaredEvent {
    fn event_type() -> &'static str {
        "symbol_declared"
    }
}

impl SymbolDeclaredEvent {
    pub fn from_symbol(symbol: &DeclaredSymbol) -> Self {
        Self {
            symbol: symbol.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Event emitted for each reported diagnostic
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
}

impl EngineEvent for DiagnosticEvent {
    fn event_type() -> &'static str {
        "diagnostic"
    }
}

/// Event emitted when a completion run ends
#[derive(Debug, Clone, Serialize)]
pub struct CompletionSummaryEvent {
    /// Whether every symbol reached full completion
    pub complete: bool,
    /// Modules in the compilation
    pub modules: usize,
    /// Diagnostics reported
    pub diagnostics: usize,
    /// Errors among them
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Timestamp
    pub timestamp: String,
}

impl EngineEvent for CompletionSummaryEvent {
    fn event_type() -> &'static str {
        "completion_summary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolId;
    use std::sync::{mpsc, Arc};

    /// Writer that appends into a shared buffer
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn declared(name: &str) -> DeclaredSymbol {
        DeclaredSymbol {
            id: SymbolId::new(3),
            kind: SymbolKind::Method,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_emitter_writes_json_lines() {
        let buffer = SharedBuffer::default();
        let emitter = EventEmitter::with_writer(true, Box::new(buffer.clone()));
        emitter.symbol_declared(&declared("App.Run"));

        let text = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let line: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(line["type"], "symbol_declared");
        assert_eq!(line["kind"], "method");
        assert_eq!(line["name"], "App.Run");
        assert_eq!(line["id"], 3);
        assert!(line["timestamp"].is_string());
    }

    #[test]
    fn test_disabled_emitter_writes_nothing() {
        let buffer = SharedBuffer::default();
        let emitter = EventEmitter::with_writer(false, Box::new(buffer.clone()));
        emitter.symbol_declared(&declared("App.Run"));
        assert!(buffer.0.lock().is_empty());
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (tx, rx) = mpsc::channel();
        let notifier = ChannelNotifier::new(tx);
        notifier.symbol_declared(&declared("A"));
        assert_eq!(rx.recv().unwrap().name, "A");

        drop(rx);
        // A closed channel only logs.
        notifier.symbol_declared(&declared("B"));
    }

    #[test]
    fn test_recording_notifier_counts() {
        let notifier = RecordingNotifier::new();
        notifier.symbol_declared(&declared("A"));
        notifier.symbol_declared(&declared("A"));
        assert_eq!(notifier.count_for("A"), 2);
        assert_eq!(notifier.count_of_kind(SymbolKind::Method), 2);
    }
}
