//! Per-symbol completion state
//!
//! `CompletionState` tracks which completion parts of one symbol are done,
//! as an atomic bitmask that only ever gains bits.
//!
//! # Ordering
//!
//! - A lazily computed slot is always written *before* the bit that guards it
//!   is set, and bits are set with at least release ordering. Any reader that
//!   observes a bit with `has_complete` therefore also observes the slot.
//! - `note_part_complete` returns `true` only to the caller that flipped a bit
//!   from 0 to 1. That caller alone may publish the part's side effects.
//!
//! # Waiting
//!
//! Threads that need a part another thread is computing call `wait_complete`.
//! It busy-polls for a few rounds, then parks on a condition variable in
//! bounded slices, re-checking the cancellation token between slices.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::cancel::CancellationToken;
use super::part::CompletionPart;
use crate::error::Result;

/// How `wait_complete` spends its time while another thread finishes a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Busy-poll rounds before parking
    pub spin_iterations: u32,
    /// Longest single park between cancellation checks
    pub wait_slice: Duration,
    /// Log a warning once a single wait has lasted this long
    pub stall_warning: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            spin_iterations: 64,
            wait_slice: Duration::from_millis(10),
            stall_warning: Some(Duration::from_secs(5)),
        }
    }
}

/// Atomic completion bitmask for one symbol
#[derive(Default)]
pub struct CompletionState {
    completed: AtomicU32,
    /// Threads currently parked (or about to park) in `wait_complete`
    waiters: AtomicUsize,
    lock: Mutex<()>,
    changed: Condvar,
}

impl CompletionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every completed part
    pub fn completed_parts(&self) -> CompletionPart {
        CompletionPart::from_bits_truncate(self.completed.load(Ordering::Acquire))
    }

    /// True when every bit of `part` is complete
    pub fn has_complete(&self, part: CompletionPart) -> bool {
        self.completed_parts().contains(part)
    }

    /// Lowest incomplete part in canonical order, or `CompletionPart::NONE`
    pub fn next_incomplete_part(&self) -> CompletionPart {
        (!self.completed_parts()).lowest()
    }

    /// Lowest incomplete part among `relevant`, or `CompletionPart::NONE`
    pub fn next_incomplete_part_in(&self, relevant: CompletionPart) -> CompletionPart {
        relevant.difference(self.completed_parts()).lowest()
    }

    /// Mark `part` complete.
    ///
    /// Returns `true` only for the call that actually set a previously unset
    /// bit. For a single-bit part that is exactly the 0→1 winner; duplicate and
    /// losing calls return `false`.
    pub fn note_part_complete(&self, part: CompletionPart) -> bool {
        let previous = self.completed.fetch_or(part.bits(), Ordering::SeqCst);
        let newly_set = part.bits() & !previous;
        if newly_set == 0 {
            return false;
        }

        tracing::trace!(
            "[STATE] {:?} complete",
            CompletionPart::from_bits_truncate(newly_set)
        );

        if self.waiters.load(Ordering::SeqCst) > 0 {
            // Holding the lock orders this wakeup after any waiter's re-check.
            let _guard = self.lock.lock();
            self.changed.notify_all();
        }
        true
    }

    /// Block until `part` is complete or `token` is cancelled.
    ///
    /// Returns `Ok(())` only when `has_complete(part)` is true.
    pub fn wait_complete(
        &self,
        part: CompletionPart,
        token: &CancellationToken,
        policy: &WaitPolicy,
    ) -> Result<()> {
        for _ in 0..policy.spin_iterations {
            if self.has_complete(part) {
                return Ok(());
            }
            token.check()?;
            std::hint::spin_loop();
        }

        self.waiters.fetch_add(1, Ordering::SeqCst);
        let result = self.park_until_complete(part, token, policy);
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn park_until_complete(
        &self,
        part: CompletionPart,
        token: &CancellationToken,
        policy: &WaitPolicy,
    ) -> Result<()> {
        let started = Instant::now();
        let mut warned = false;

        loop {
            if self.has_complete_seq_cst(part) {
                return Ok(());
            }
            token.check()?;

            {
                let mut guard = self.lock.lock();
                if !self.has_complete_seq_cst(part) {
                    self.changed.wait_for(&mut guard, policy.wait_slice);
                }
            }

            if let Some(threshold) = policy.stall_warning {
                let waited = started.elapsed();
                if !warned && waited >= threshold {
                    warned = true;
                    tracing::warn!(
                        "[STATE] Still waiting for {:?} after {}ms (completed: {:?})",
                        part,
                        waited.as_millis(),
                        self.completed_parts()
                    );
                }
            }
        }
    }

    fn has_complete_seq_cst(&self, part: CompletionPart) -> bool {
        CompletionPart::from_bits_truncate(self.completed.load(Ordering::SeqCst)).contains(part)
    }
}

impl std::fmt::Debug for CompletionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionState")
            .field("completed", &self.completed_parts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn quick_policy() -> WaitPolicy {
        WaitPolicy {
            spin_iterations: 4,
            wait_slice: Duration::from_millis(2),
            stall_warning: None,
        }
    }

    #[test]
    fn test_next_incomplete_part_walks_in_order() {
        let state = CompletionState::new();
        assert_eq!(state.next_incomplete_part(), CompletionPart::ATTRIBUTES);

        state.note_part_complete(CompletionPart::ATTRIBUTES);
        state.note_part_complete(CompletionPart::START_VALIDATING_REFERENCED_ASSEMBLIES);
        assert_eq!(
            state.next_incomplete_part(),
            CompletionPart::FINISH_VALIDATING_REFERENCED_ASSEMBLIES
        );

        state.note_part_complete(CompletionPart::ALL);
        assert_eq!(state.next_incomplete_part(), CompletionPart::NONE);
    }

    #[test]
    fn test_next_incomplete_part_in_ignores_irrelevant_parts() {
        let state = CompletionState::new();
        let relevant = CompletionPart::METHOD_CHECKS | CompletionPart::MEMBERS_COMPLETED;
        assert_eq!(
            state.next_incomplete_part_in(relevant),
            CompletionPart::START_METHOD_CHECKS
        );
        state.note_part_complete(CompletionPart::METHOD_CHECKS);
        assert_eq!(
            state.next_incomplete_part_in(relevant),
            CompletionPart::MEMBERS_COMPLETED
        );
    }

    #[test]
    fn test_note_part_complete_is_idempotent() {
        let state = CompletionState::new();
        assert!(state.note_part_complete(CompletionPart::ATTRIBUTES));
        assert!(!state.note_part_complete(CompletionPart::ATTRIBUTES));
        assert!(state.has_complete(CompletionPart::ATTRIBUTES));
    }

    #[test]
    fn test_parts_never_uncomplete() {
        let state = CompletionState::new();
        let mut seen = CompletionPart::NONE;
        for part in CompletionPart::ALL.iter() {
            state.note_part_complete(part);
            let now = state.completed_parts();
            assert!(now.contains(seen));
            seen = now;
        }
        assert_eq!(seen, CompletionPart::ALL);
    }

    #[test]
    fn test_exactly_one_winner_across_threads() {
        let state = Arc::new(CompletionState::new());
        let barrier = Arc::new(Barrier::new(16));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let state = Arc::clone(&state);
                let barrier = Arc::clone(&barrier);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    barrier.wait();
                    if state.note_part_complete(CompletionPart::START_METHOD_CHECKS) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_returns_once_part_completes() {
        let state = Arc::new(CompletionState::new());
        let waiter = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                let result = state.wait_complete(
                    CompletionPart::FINISH_METHOD_CHECKS,
                    &CancellationToken::none(),
                    &quick_policy(),
                );
                (result.is_ok(), state.has_complete(CompletionPart::FINISH_METHOD_CHECKS))
            })
        };

        thread::sleep(Duration::from_millis(20));
        state.note_part_complete(CompletionPart::START_METHOD_CHECKS);
        state.note_part_complete(CompletionPart::FINISH_METHOD_CHECKS);

        assert_eq!(waiter.join().unwrap(), (true, true));
    }

    #[test]
    fn test_wait_observes_cancellation() {
        let state = Arc::new(CompletionState::new());
        let token = CancellationToken::new();
        let waiter = {
            let state = Arc::clone(&state);
            let token = token.clone();
            thread::spawn(move || {
                state.wait_complete(CompletionPart::MEMBERS_COMPLETED, &token, &quick_policy())
            })
        };

        thread::sleep(Duration::from_millis(20));
        token.cancel();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(CompletionError::Cancelled)));
        assert!(!state.has_complete(CompletionPart::MEMBERS_COMPLETED));
    }

    #[test]
    fn test_wait_on_completed_part_returns_immediately() {
        let state = CompletionState::new();
        state.note_part_complete(CompletionPart::ATTRIBUTES);
        let token = CancellationToken::new();
        token.cancel();
        // Completion is checked before the token.
        assert!(state
            .wait_complete(CompletionPart::ATTRIBUTES, &token, &quick_policy())
            .is_ok());
    }
}
