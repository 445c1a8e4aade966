#![doc = include_str!("../README.md")]

//! Signatures, action bodies and programs for the ravel model checker.
//!
//! Everything here is plain data plus well-formedness checks. Translating
//! actions into logic is the engine's job.

pub mod action;
pub mod program;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod signature;

pub use action::{Action, ActionDecl};
pub use program::{load_program, Conjecture, LoadError, Program, ValidationError};
pub use signature::{is_user_identifier, Scope, Signature, SortError, SymbolDecl};
