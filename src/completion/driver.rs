//! Force-completion driver
//!
//! One loop serves every symbol kind. Each kind supplies a static dispatch
//! table mapping the parts it recognizes to handler functions; the driver
//! walks incomplete parts in canonical order and calls the matching handler.
//! Parts a kind does not recognize are marked complete in one step, which is
//! what lets a single part enumeration serve heterogeneous kinds.

use crate::error::Result;
use crate::location::LocationFilter;
use crate::symbols::Completable;

use super::cancel::CancellationToken;
use super::part::CompletionPart;
use super::state::WaitPolicy;

/// What the driver should do after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep going: the handled part is complete or another thread is finishing it
    Continue,
    /// Stop driving for now and leave the part incomplete. Used when a
    /// location filter kept some children from completing.
    Suspend,
}

/// Arguments threaded through one force-completion call
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub filter: Option<&'a LocationFilter>,
    pub token: &'a CancellationToken,
    pub wait: &'a WaitPolicy,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(
        filter: Option<&'a LocationFilter>,
        token: &'a CancellationToken,
        wait: &'a WaitPolicy,
    ) -> Self {
        Self {
            filter,
            token,
            wait,
        }
    }
}

pub type PartFn<S> = fn(&S, &CompletionRequest<'_>) -> Result<Step>;

/// One row of a kind's dispatch table
pub struct PartHandler<S> {
    /// Parts this handler is responsible for (a Start/Finish pair shares one handler)
    pub parts: CompletionPart,
    pub run: PartFn<S>,
}

impl<S> PartHandler<S> {
    pub const fn new(parts: CompletionPart, run: PartFn<S>) -> Self {
        Self { parts, run }
    }
}

/// Advance `symbol` through every part it can currently reach.
///
/// Returns `Ok(())` when every part is complete or a handler suspended,
/// and `Err(Cancelled)` when the token fired. Either way nothing is left
/// half-done and the call can be repeated.
///
/// # Panics
///
/// Panics if the symbol's kind recognizes a part that `table` has no handler
/// for. That is a construction bug, not a user error.
pub fn force_complete<S: Completable>(
    symbol: &S,
    table: &[PartHandler<S>],
    request: &CompletionRequest<'_>,
) -> Result<()> {
    let state = symbol.completion_state();
    let recognized = symbol.kind().recognized_parts();

    loop {
        request.token.check()?;

        let part = state.next_incomplete_part();
        if part.is_none() {
            return Ok(());
        }

        match table.iter().find(|handler| handler.parts.contains(part)) {
            Some(handler) => {
                tracing::trace!(
                    "[DRIVE] {} '{}' ({}) running {:?}",
                    symbol.kind(),
                    symbol.name(),
                    symbol.id(),
                    part
                );
                if (handler.run)(symbol, request)? == Step::Suspend {
                    tracing::debug!(
                        "[DRIVE] {} '{}' suspended at {:?}",
                        symbol.kind(),
                        symbol.name(),
                        part
                    );
                    return Ok(());
                }
            }
            None if recognized.intersects(part) => {
                panic!(
                    "{} '{}' recognizes {:?} but its dispatch table has no handler for it",
                    symbol.kind(),
                    symbol.name(),
                    part
                );
            }
            None => {
                // Parts meant for other kinds are trivially satisfied.
                state.note_part_complete(!recognized);
            }
        }

        state.wait_complete(part, request.token, request.wait)?;
    }
}
