//! Argument parsing and small shared helpers for the subcommands.

use std::path::Path;

use miette::IntoDiagnostic;
use ravel_engine::bmc::{BmcOutcome, UnknownPolicy};
use ravel_engine::pipeline::SolverChoice;
use ravel_ir::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

pub(crate) fn parse_solver_choice(raw: &str) -> miette::Result<SolverChoice> {
    match raw {
        "z3" => Ok(SolverChoice::Z3),
        "cvc5" => Ok(SolverChoice::Cvc5),
        other => miette::bail!("Unknown solver: {other}. Use 'z3' or 'cvc5'."),
    }
}

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => miette::bail!("Unknown output format: {other}. Use 'text' or 'json'."),
    }
}

pub(crate) fn parse_unknown_policy(raw: &str) -> miette::Result<UnknownPolicy> {
    match raw {
        "abort" => Ok(UnknownPolicy::Abort),
        "continue" => Ok(UnknownPolicy::Continue),
        other => miette::bail!("Unknown --on-unknown policy: {other}. Use 'abort' or 'continue'."),
    }
}

pub(crate) fn solver_name(solver: SolverChoice) -> &'static str {
    match solver {
        SolverChoice::Z3 => "z3",
        SolverChoice::Cvc5 => "cvc5",
    }
}

pub(crate) fn load_program_file(file: &Path) -> miette::Result<Program> {
    ravel_ir::load_program(file).into_diagnostic()
}

/// Exit status for a finished check.
pub(crate) fn outcome_exit_code(outcome: &BmcOutcome) -> u8 {
    match outcome {
        // Depths skipped under `--on-unknown continue` leave the bound unchecked.
        BmcOutcome::Exhausted {
            inconclusive_depths,
            ..
        } if !inconclusive_depths.is_empty() => 2,
        BmcOutcome::Exhausted { .. } => 0,
        BmcOutcome::Violation { .. } => 1,
        BmcOutcome::Inconclusive { .. } => 2,
    }
}

/// Input and usage errors.
pub(crate) const ERROR_EXIT: u8 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_choices() {
        assert_eq!(parse_solver_choice("cvc5").unwrap(), SolverChoice::Cvc5);
        assert_eq!(parse_output_format("json").unwrap(), OutputFormat::Json);
        assert_eq!(
            parse_unknown_policy("continue").unwrap(),
            UnknownPolicy::Continue
        );
    }

    #[test]
    fn rejects_unknown_choices() {
        assert!(parse_solver_choice("yices").is_err());
        assert!(parse_output_format("xml").is_err());
        assert!(parse_unknown_policy("retry").is_err());
    }

    #[test]
    fn exit_codes_distinguish_verdicts() {
        let exhausted = BmcOutcome::Exhausted {
            bound: 3,
            inconclusive_depths: vec![],
        };
        let inconclusive = BmcOutcome::Inconclusive {
            depth: 1,
            reason: "timeout".into(),
        };
        assert_eq!(outcome_exit_code(&exhausted), 0);
        assert_eq!(outcome_exit_code(&inconclusive), 2);
    }

    #[test]
    fn exhaustion_with_undecided_depths_is_not_clean() {
        let partial = BmcOutcome::Exhausted {
            bound: 3,
            inconclusive_depths: vec![2],
        };
        assert_eq!(outcome_exit_code(&partial), 2);
    }
}
