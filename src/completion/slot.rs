//! Write-once lazy slots
//!
//! A `LazySlot` holds one lazily computed fact. Racing threads may each
//! compute a candidate, but only the first `publish` is stored; every other
//! caller gets the stored value back and drops its own. Once set, reads need
//! no synchronization beyond the cell's acquire load.

use once_cell::sync::OnceCell;

use crate::diagnostics::Diagnostic;

/// Write-once slot with compare-and-swap publication
#[derive(Debug)]
pub struct LazySlot<T> {
    cell: OnceCell<T>,
}

impl<T> Default for LazySlot<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T> LazySlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The published value, if any
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Store `value` unless another thread got there first.
    ///
    /// Returns the value that ended up in the slot and whether it was ours.
    pub fn publish(&self, value: T) -> (&T, bool) {
        match self.cell.set(value) {
            Ok(()) => (self.stored(), true),
            Err(_) => (self.stored(), false),
        }
    }

    /// Return the stored value, computing and publishing one if the slot is
    /// empty. `compute` may run on several threads at once; only one result
    /// is kept.
    pub fn get_or_publish(&self, compute: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.cell.get() {
            return value;
        }
        self.publish(compute()).0
    }

    fn stored(&self) -> &T {
        match self.cell.get() {
            Some(value) => value,
            None => unreachable!("OnceCell::set returned without a stored value"),
        }
    }
}

/// A computed value together with the diagnostics produced while computing it.
///
/// Value and diagnostics are published as one unit so the thread that wins
/// the owning completion part always publishes the diagnostics that belong to
/// the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Bound<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    /// A value that produced no diagnostics
    pub fn clean(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Bound<U> {
        Bound {
            value: f(self.value),
            diagnostics: self.diagnostics,
        }
    }
}
