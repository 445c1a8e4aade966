#![doc = include_str!("../README.md")]

//! Symbolic execution and bounded model checking over ravel programs.

pub mod bmc;
pub mod checker;
pub mod counterexample;
pub mod error;
pub mod graph;
pub mod namespace;
pub mod pipeline;
pub mod transrel;
pub mod witness;
