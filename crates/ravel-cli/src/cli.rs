//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Bounded model checker for transition-system specifications.\n\n\
    A program (JSON) declares state symbols, actions and conjectures. `check`\n\
    unrolls the exported actions step by step and asks an SMT solver whether\n\
    any conjecture can fail within the bound.\n\n\
    No violation within the bound is not a proof of safety.";

#[derive(Parser)]
#[command(name = "ravel")]
#[command(about = "Bounded model checker for transition-system specifications")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Search for a conjecture violation within a bounded number of steps
    Check {
        /// Path to the program (.json)
        file: PathBuf,

        /// Maximum number of steps to explore
        #[arg(long, default_value_t = 10)]
        bound: usize,

        /// Solver backend: z3 | cvc5
        #[arg(long, default_value = "z3")]
        solver: String,

        /// Per-query solver timeout in seconds (0 disables it)
        #[arg(long, default_value_t = 300)]
        timeout: u64,

        /// Output format: text | json
        #[arg(long, default_value = "text")]
        format: String,

        /// Write every solver query to this file as SMT-LIB2
        #[arg(long)]
        dump_smt: Option<String>,

        /// Check each conjecture separately and report every violated one
        #[arg(long, default_value_t = false)]
        report_all: bool,

        /// Rebuild the solver context at every depth
        #[arg(long, default_value_t = false)]
        no_incremental: bool,

        /// What a solver `unknown` does to the run: abort | continue
        #[arg(long, default_value = "abort")]
        on_unknown: String,
    },

    /// Load and validate a program without running the solver
    Validate {
        /// Path to the program (.json)
        file: PathBuf,

        /// Output format: text | json
        #[arg(long, default_value = "text")]
        format: String,
    },
}
