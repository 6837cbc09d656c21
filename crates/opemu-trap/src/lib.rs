#![forbid(unsafe_code)]

//! Trap-side sequencing of instruction-family emulators.
//!
//! An invalid-opcode trap hands the faulting bytes to [`TrapDispatcher::handle`].
//! The dispatcher tries each enabled core family (see [`DispatchConfig`]) in
//! the fixed priority order, then any sibling families the embedder
//! registered. The first family that accepts the bytes wins; a family that
//! recognizes the bytes but cannot emulate them ends the search.
//!
//! The caller advances the instruction pointer by
//! [`TrapOutcome::bytes_consumed`]; zero means the fault is genuine.

mod config;
mod dispatcher;

pub use config::{DispatchConfig, FamilySet};
pub use dispatcher::{CoreFamily, FamilyDecoder, Handled, TrapDispatcher, TrapOutcome};
