#![doc = include_str!("../README.md")]

//! SMT terms and solver integration for bounded model checking.
//!
//! This crate provides the term/clause substrate the ravel engine builds
//! transition relations from, plus pluggable Z3 and cvc5 backends that
//! answer first-order satisfiability queries over booleans, integers,
//! uninterpreted sorts and uninterpreted functions.

pub mod backends;
pub mod solver;
pub mod sorts;
pub mod terms;
