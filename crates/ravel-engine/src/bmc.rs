//! The bounded model-checking driver.

use std::time::Instant;

use ravel_ir::Program;
use ravel_smt::solver::SmtSolver;
use ravel_smt::terms::SmtTerm;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::checker::{CheckOutcome, FinalConditionChecker};
use crate::counterexample::Counterexample;
use crate::error::{EngineError, UsageError};
use crate::graph::AnalysisGraph;
use crate::witness::DualClause;

const DEADLINE_REASON: &str = "overall deadline exceeded";

/// What to do when the solver answers `unknown` at some depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    /// Stop and report the whole run as inconclusive.
    #[default]
    Abort,
    /// Record the depth and keep going; exhaustion then lists it.
    Continue,
}

#[derive(Debug, Clone)]
pub struct BmcOptions {
    pub bound: usize,
    pub report_first: bool,
    pub incremental: bool,
    pub unknown_policy: UnknownPolicy,
    /// Checked between depths; running past it ends the run as inconclusive.
    pub deadline: Option<Instant>,
    /// Emit every query as SMT-LIB2 through [`BmcEvent::Query`].
    pub record_queries: bool,
}

impl Default for BmcOptions {
    fn default() -> Self {
        Self {
            bound: 10,
            report_first: true,
            incremental: true,
            unknown_policy: UnknownPolicy::Abort,
            deadline: None,
            record_queries: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmcPhase {
    Init,
    Stepping(usize),
    FoundCounterexample,
    Exhausted,
}

/// Progress notifications delivered while the driver runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BmcEvent<'a> {
    DepthStarted(usize),
    Query { depth: usize, smtlib: &'a str },
    DepthInconclusive { depth: usize, reason: &'a str },
    CounterexampleFound { depth: usize },
    Exhausted { bound: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum BmcOutcome {
    /// A conjecture fails after `depth` steps.
    Violation {
        depth: usize,
        counterexample: Box<Counterexample>,
    },
    /// No violation within `bound` steps. Not a proof of safety.
    Exhausted {
        bound: usize,
        /// Depths where the solver could not decide (only with
        /// [`UnknownPolicy::Continue`]).
        inconclusive_depths: Vec<usize>,
    },
    /// The run stopped without a verdict.
    Inconclusive { depth: usize, reason: String },
}

/// Run bounded model checking on `program` up to `options.bound` steps.
pub fn run_bmc<S: SmtSolver>(
    solver: &mut S,
    program: &Program,
    options: &BmcOptions,
) -> Result<BmcOutcome, EngineError> {
    run_bmc_with_observer(solver, program, options, |_| {})
}

/// [`run_bmc`], reporting progress to `observer`.
pub fn run_bmc_with_observer<S: SmtSolver>(
    solver: &mut S,
    program: &Program,
    options: &BmcOptions,
    mut observer: impl FnMut(&BmcEvent<'_>),
) -> Result<BmcOutcome, EngineError> {
    let mut graph = AnalysisGraph::new(program);
    let mut checker = FinalConditionChecker::new(solver, options.incremental)
        .with_query_recording(options.record_queries);
    let step = program.step_action();
    let history: Vec<SmtTerm> = Vec::new();
    let mut dual = DualClause::default();
    let mut inconclusive_depths = Vec::new();
    let mut outcome = None;

    let mut phase = BmcPhase::Init;
    loop {
        debug!(?phase, "bmc phase");
        match phase {
            BmcPhase::Init => {
                dual = DualClause::build(&program.conjectures, graph.namespace_mut())?;
                let init = SmtTerm::conjoin(
                    program
                        .axioms
                        .iter()
                        .cloned()
                        .chain(std::iter::once(program.initial_condition())),
                );
                graph.add_initial_state(init)?;
                if let Some(initializer) = program.initializer() {
                    graph.execute(initializer, None, None, &initializer.name)?;
                }
                phase = BmcPhase::Stepping(0);
            }
            BmcPhase::Stepping(depth) => {
                if options.deadline.is_some_and(|d| Instant::now() >= d) {
                    warn!(depth, "BMC: deadline exceeded");
                    return Ok(BmcOutcome::Inconclusive {
                        depth,
                        reason: DEADLINE_REASON.into(),
                    });
                }
                observer(&BmcEvent::DepthStarted(depth));
                info!(depth, "BMC: checking invariants");

                let frontier = graph.latest().ok_or(UsageError::NoInitialState)?;
                let result =
                    checker.check(&graph, frontier, &dual, &history, options.report_first)?;
                if let Some(smtlib) = checker.last_query() {
                    observer(&BmcEvent::Query { depth, smtlib });
                }
                match result {
                    CheckOutcome::Counterexample(counterexample) => {
                        info!(
                            depth,
                            violated = ?counterexample.violated,
                            "BMC: counterexample found"
                        );
                        observer(&BmcEvent::CounterexampleFound { depth });
                        outcome = Some(BmcOutcome::Violation {
                            depth,
                            counterexample,
                        });
                        phase = BmcPhase::FoundCounterexample;
                        continue;
                    }
                    CheckOutcome::Inconclusive { reason } => {
                        warn!(depth, %reason, "BMC: inconclusive at this depth");
                        observer(&BmcEvent::DepthInconclusive {
                            depth,
                            reason: &reason,
                        });
                        if options.unknown_policy == UnknownPolicy::Abort {
                            return Ok(BmcOutcome::Inconclusive { depth, reason });
                        }
                        inconclusive_depths.push(depth);
                    }
                    CheckOutcome::NoCounterexample => {
                        debug!(depth, "BMC: no counterexample at this depth");
                    }
                }

                if depth >= options.bound {
                    phase = BmcPhase::Exhausted;
                } else {
                    graph.execute(&step, None, None, &step.name)?;
                    phase = BmcPhase::Stepping(depth + 1);
                }
            }
            BmcPhase::FoundCounterexample => break,
            BmcPhase::Exhausted => {
                info!(bound = options.bound, "BMC: no violation within bound");
                observer(&BmcEvent::Exhausted {
                    bound: options.bound,
                });
                outcome = Some(BmcOutcome::Exhausted {
                    bound: options.bound,
                    inconclusive_depths: std::mem::take(&mut inconclusive_depths),
                });
                break;
            }
        }
    }

    outcome.ok_or_else(|| EngineError::Solver("driver stopped without an outcome".into()))
}
