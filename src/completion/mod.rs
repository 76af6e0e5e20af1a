//! Lazy completion coordination
//!
//! The pieces every symbol kind is built from:
//!
//! - `part` - the ordered set of completion parts
//! - `state` - per-symbol atomic bitmask with win detection and waiting
//! - `slot` - write-once lazily computed fields
//! - `cancel` - cooperative cancellation tokens
//! - `driver` - the table-driven force-completion loop
//!
//! # Protocol
//!
//! A symbol fact is guarded by one part (or a Start/Finish pair of parts).
//! The thread that wins `note_part_complete` on the guarding part is the only
//! one allowed to publish the fact's diagnostics or declaration event. For a
//! pair, the `Start` winner does the work and sets `Finish` last; every other
//! thread waits on `Finish`.

pub mod cancel;
pub mod driver;
pub mod part;
pub mod slot;
pub mod state;

pub use cancel::CancellationToken;
pub use driver::{force_complete, CompletionRequest, PartFn, PartHandler, Step};
pub use part::CompletionPart;
pub use slot::{Bound, LazySlot};
pub use state::{CompletionState, WaitPolicy};
