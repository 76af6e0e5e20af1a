//! Child fan-out for composite symbols
//!
//! A container's `MEMBERS_COMPLETED` part drives each child to completion,
//! in parallel on the rayon pool when there are enough of them. A location
//! filter skips children declared elsewhere, which leaves the parent
//! incomplete until a later unfiltered call.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::completion::{CompletionPart, CompletionRequest};
use crate::config::FanOutConfig;
use crate::error::Result;

use super::Completable;

/// Drive `children` and report whether every one of them is fully complete.
///
/// Cancellation stops scheduling new children; children already running
/// finish their current part and return.
pub fn complete_children<C: Completable>(
    children: &[C],
    request: &CompletionRequest<'_>,
    config: &FanOutConfig,
) -> Result<bool> {
    let skipped = AtomicUsize::new(0);

    let visit = |child: &C| -> Result<()> {
        request.token.check()?;
        if child.has_complete(CompletionPart::ALL) {
            return Ok(());
        }
        if let Some(filter) = request.filter {
            if !filter.matches_any(child.declared_spans()) {
                skipped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }
        child.force_complete(request.filter, request.token)
    };

    if config.parallel && children.len() >= config.min_children.max(1) {
        tracing::trace!("[FANOUT] Completing {} children in parallel", children.len());
        children.par_iter().try_for_each(visit)?;
    } else {
        children.iter().try_for_each(visit)?;
    }

    let skipped = skipped.into_inner();
    if skipped > 0 {
        tracing::debug!(
            "[FANOUT] {} of {} children outside the location filter",
            skipped,
            children.len()
        );
    }

    Ok(children
        .iter()
        .all(|child| child.has_complete(CompletionPart::ALL)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CancellationToken, CompletionState, WaitPolicy};
    use crate::error::CompletionError;
    use crate::location::{LocationFilter, SourceSpan};
    use crate::symbols::{SymbolId, SymbolKind};
    use std::sync::atomic::AtomicUsize;

    struct Leaf {
        id: u32,
        spans: Vec<SourceSpan>,
        state: CompletionState,
        runs: AtomicUsize,
    }

    impl Leaf {
        fn at(id: u32, file: &str, start: u32) -> Self {
            Self {
                id,
                spans: vec![SourceSpan::new(file, start, start + 10)],
                state: CompletionState::new(),
                runs: AtomicUsize::new(0),
            }
        }
    }

    impl Completable for Leaf {
        fn id(&self) -> SymbolId {
            SymbolId::new(self.id)
        }

        fn kind(&self) -> SymbolKind {
            SymbolKind::Local
        }

        fn name(&self) -> &str {
            "leaf"
        }

        fn declared_spans(&self) -> &[SourceSpan] {
            &self.spans
        }

        fn completion_state(&self) -> &CompletionState {
            &self.state
        }

        fn force_complete(
            &self,
            _filter: Option<&LocationFilter>,
            token: &CancellationToken,
        ) -> Result<()> {
            token.check()?;
            if self.state.note_part_complete(CompletionPart::ALL) {
                self.runs.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn config(parallel: bool) -> FanOutConfig {
        FanOutConfig {
            parallel,
            min_children: 2,
        }
    }

    #[test]
    fn test_all_children_complete() {
        let children: Vec<Leaf> = (0..16).map(|i| Leaf::at(i, "a.cs", i * 20)).collect();
        let token = CancellationToken::none();
        let wait = WaitPolicy::default();
        let request = CompletionRequest::new(None, &token, &wait);

        for parallel in [false, true] {
            assert!(complete_children(&children, &request, &config(parallel)).unwrap());
        }
        assert!(children.iter().all(|c| c.runs.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_filter_skips_children_elsewhere() {
        let children = vec![Leaf::at(1, "a.cs", 0), Leaf::at(2, "b.cs", 0)];
        let token = CancellationToken::none();
        let wait = WaitPolicy::default();
        let filter = LocationFilter::file("a.cs");
        let request = CompletionRequest::new(Some(&filter), &token, &wait);

        assert!(!complete_children(&children, &request, &config(true)).unwrap());
        assert!(children[0].has_complete(CompletionPart::ALL));
        assert!(!children[1].has_complete(CompletionPart::ALL));
    }

    #[test]
    fn test_cancelled_fan_out_returns_error() {
        let children: Vec<Leaf> = (0..8).map(|i| Leaf::at(i, "a.cs", i * 20)).collect();
        let token = CancellationToken::new();
        token.cancel();
        let wait = WaitPolicy::default();
        let request = CompletionRequest::new(None, &token, &wait);

        let result = complete_children(&children, &request, &config(true));
        assert!(matches!(result, Err(CompletionError::Cancelled)));
        assert!(children.iter().all(|c| !c.has_complete(CompletionPart::ALL)));
    }
}
