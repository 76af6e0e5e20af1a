//! Custom assertions for integration tests
//!
//! Helpers for checking that diagnostics and declaration events were
//! published exactly once.

use std::collections::HashMap;

use symbol_completion::{CompletionPart, DiagnosticBag, ErrorCode, RecordingNotifier, SymbolId};

/// Assert that no (symbol, part) pair was published more than once
pub fn assert_each_part_published_once(sink: &DiagnosticBag) {
    let mut seen: HashMap<(SymbolId, CompletionPart), usize> = HashMap::new();
    for batch in sink.batches() {
        *seen.entry((batch.symbol, batch.part)).or_default() += 1;
    }
    let repeated: Vec<_> = seen.iter().filter(|(_, count)| **count > 1).collect();
    assert!(
        repeated.is_empty(),
        "Expected every part to be published once, repeated: {:?}",
        repeated
    );
}

/// Assert that every declaration event names a distinct symbol
pub fn assert_each_symbol_declared_once(events: &RecordingNotifier) {
    let mut seen: HashMap<SymbolId, usize> = HashMap::new();
    for event in events.events() {
        *seen.entry(event.id).or_default() += 1;
    }
    let repeated: Vec<_> = seen.iter().filter(|(_, count)| **count > 1).collect();
    assert!(
        repeated.is_empty(),
        "Expected one declaration event per symbol, repeated: {:?}",
        repeated
    );
}

/// Assert exactly `expected` diagnostics carry `code`
pub fn assert_code_count(sink: &DiagnosticBag, code: ErrorCode, expected: usize) {
    let found = sink.with_code(code);
    assert_eq!(
        found.len(),
        expected,
        "Expected {} diagnostic(s) with code {}, got: {:#?}",
        expected,
        code,
        found
    );
}

/// Assert exactly `expected` diagnostics carry the binder-defined `code`
pub fn assert_custom_code_count(sink: &DiagnosticBag, code: &str, expected: usize) {
    let found: Vec<_> = sink
        .diagnostics()
        .into_iter()
        .filter(|d| d.code == code)
        .collect();
    assert_eq!(
        found.len(),
        expected,
        "Expected {} diagnostic(s) with code {}, got: {:#?}",
        expected,
        code,
        found
    );
}
