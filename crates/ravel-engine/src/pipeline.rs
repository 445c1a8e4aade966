//! Validate a program, pick a solver, run the driver.

use std::fmt::Write as _;

use ravel_ir::{LoadError, Program, ValidationError};
use ravel_smt::backends::cvc5_backend::Cvc5Solver;
use ravel_smt::backends::z3_backend::Z3Solver;
use thiserror::Error;
use tracing::{info, warn};

use crate::bmc::{run_bmc_with_observer, BmcEvent, BmcOptions, BmcOutcome, UnknownPolicy};
use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Solver error: {0}")]
    Solver(String),
}

/// Which solver backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverChoice {
    #[default]
    Z3,
    Cvc5,
}

/// Options for a checking run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub solver: SolverChoice,
    pub bound: usize,
    /// Per-query solver timeout; 0 disables it.
    pub timeout_secs: u64,
    /// Write every query of the run to this file as SMT-LIB2.
    pub dump_smt: Option<String>,
    pub report_first: bool,
    pub incremental: bool,
    pub unknown_policy: UnknownPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            solver: SolverChoice::Z3,
            bound: 10,
            timeout_secs: 300,
            dump_smt: None,
            report_first: true,
            incremental: true,
            unknown_policy: UnknownPolicy::Abort,
        }
    }
}

impl PipelineOptions {
    fn bmc_options(&self) -> BmcOptions {
        BmcOptions {
            bound: self.bound,
            report_first: self.report_first,
            incremental: self.incremental,
            unknown_policy: self.unknown_policy,
            deadline: None,
            record_queries: self.dump_smt.is_some(),
        }
    }
}

/// Check `program` up to `options.bound` steps.
pub fn check(program: &Program, options: &PipelineOptions) -> Result<BmcOutcome, PipelineError> {
    check_with_observer(program, options, |_| {})
}

/// [`check`], forwarding driver progress to `observer`.
pub fn check_with_observer(
    program: &Program,
    options: &PipelineOptions,
    mut observer: impl FnMut(&BmcEvent<'_>),
) -> Result<BmcOutcome, PipelineError> {
    program.validate()?;
    info!(
        program = %program.name,
        solver = ?options.solver,
        bound = options.bound,
        "Starting bounded model check..."
    );

    let bmc = options.bmc_options();
    let mut dump = String::new();
    let mut forward = |event: &BmcEvent<'_>| {
        if let BmcEvent::Query { depth, smtlib } = event {
            let _ = writeln!(dump, "; depth {depth}\n{smtlib}");
        }
        observer(event);
    };

    let outcome = match options.solver {
        SolverChoice::Z3 => {
            let mut solver = Z3Solver::with_timeout_secs(options.timeout_secs);
            run_bmc_with_observer(&mut solver, program, &bmc, &mut forward)?
        }
        SolverChoice::Cvc5 => {
            let mut solver = Cvc5Solver::with_timeout_secs(options.timeout_secs)
                .map_err(|e| PipelineError::Solver(e.to_string()))?;
            run_bmc_with_observer(&mut solver, program, &bmc, &mut forward)?
        }
    };

    if let Some(ref path) = options.dump_smt {
        if let Err(e) = std::fs::write(path, &dump) {
            warn!(path = %path, error = %e, "could not write SMT dump");
        } else {
            info!("SMT dump written to {path}");
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravel_ir::proptest_generators::counter_program;

    #[test]
    fn invalid_programs_never_reach_the_solver() {
        let mut program = counter_program(0, 1, 2);
        program.exported.push("missing".into());
        let err = check(&program, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn dump_contains_one_query_per_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queries.smt2");
        let options = PipelineOptions {
            bound: 2,
            dump_smt: Some(path.to_string_lossy().into_owned()),
            ..PipelineOptions::default()
        };
        let outcome = check(&counter_program(0, 1, 10), &options).unwrap();
        assert!(matches!(outcome, BmcOutcome::Exhausted { bound: 2, .. }));

        let dump = std::fs::read_to_string(&path).unwrap();
        assert_eq!(dump.matches("(check-sat)").count(), 3);
        assert!(dump.starts_with("; depth 0"));
        assert!(dump.contains("; depth 2"));
    }
}
