//! Final-condition queries: does the path to a state admit a violation?

use std::collections::HashSet;
use std::fmt::Display;

use ravel_smt::backends::smtlib_printer::query_to_smt2_script;
use ravel_smt::solver::{SatResult, SmtSolver};
use ravel_smt::sorts::SmtSort;
use ravel_smt::terms::SmtTerm;
use tracing::{debug, warn};

use crate::counterexample::{extract_counterexample, model_symbols, Counterexample};
use crate::error::EngineError;
use crate::graph::{AnalysisGraph, StateId};
use crate::witness::DualClause;

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Every goal was unsatisfiable.
    NoCounterexample,
    Counterexample(Box<Counterexample>),
    /// No violation found, but at least one goal came back `unknown`.
    Inconclusive { reason: String },
}

fn solver_error(e: impl Display) -> EngineError {
    EngineError::Solver(e.to_string())
}

/// Checks the negated conjectures against the path formula of a state.
///
/// In incremental mode the path conjuncts already asserted stay on the
/// solver and each goal is checked inside a push/pop scope. When the next
/// path does not extend the asserted one the solver is reset.
pub struct FinalConditionChecker<'s, S: SmtSolver> {
    solver: &'s mut S,
    incremental: bool,
    sorts: Vec<String>,
    declarations: Vec<(String, Vec<SmtSort>, SmtSort)>,
    declared: HashSet<String>,
    asserted: Vec<SmtTerm>,
    record_queries: bool,
    last_query: Option<String>,
}

impl<'s, S: SmtSolver> FinalConditionChecker<'s, S> {
    pub fn new(solver: &'s mut S, incremental: bool) -> Self {
        Self {
            solver,
            incremental,
            sorts: Vec::new(),
            declarations: Vec::new(),
            declared: HashSet::new(),
            asserted: Vec::new(),
            record_queries: false,
            last_query: None,
        }
    }

    /// Keep an SMT-LIB2 rendering of the most recent query.
    pub fn with_query_recording(mut self, on: bool) -> Self {
        self.record_queries = on;
        self
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Query the solver for a model of `path(state) & history & dual`.
    ///
    /// With `report_first` one query covers all conjectures and the
    /// indicators in its model name the violated ones; otherwise each
    /// conjecture is checked on its own and every violated one is listed.
    /// Neither the graph nor the solver's asserted prefix is changed by a
    /// goal, so repeating a check gives the same answer.
    pub fn check(
        &mut self,
        graph: &AnalysisGraph<'_>,
        state: StateId,
        dual: &DualClause,
        history: &[SmtTerm],
        report_first: bool,
    ) -> Result<CheckOutcome, EngineError> {
        self.last_query = None;
        if dual.is_empty() {
            return Ok(CheckOutcome::NoCounterexample);
        }
        let path = graph.path_conjuncts(state)?;
        let vocab = &graph.state(state)?.vocabulary;
        self.prepare(graph, &path)?;

        let goals: Vec<(Option<usize>, SmtTerm)> = if report_first {
            vec![(None, dual.formula(vocab))]
        } else {
            (0..dual.parts.len())
                .filter_map(|i| dual.part_formula(i, vocab).map(|g| (Some(i), g)))
                .collect()
        };

        let symbols = model_symbols(graph, state, dual)?;
        let symbol_refs: Vec<(&str, &SmtSort)> =
            symbols.iter().map(|(n, s)| (n.as_str(), s)).collect();

        let mut violated = Vec::new();
        let mut witness_model = None;
        let mut unknown = None;
        for (part, goal) in goals {
            self.solver.push().map_err(solver_error)?;
            for h in history {
                self.solver.assert(h).map_err(solver_error)?;
            }
            self.solver.assert(&goal).map_err(solver_error)?;
            if self.record_queries {
                self.last_query = Some(self.render(history, &goal));
            }
            let answer = self.solver.check_sat_with_model(&symbol_refs);
            self.solver.pop().map_err(solver_error)?;
            let (result, model) = answer.map_err(solver_error)?;

            match result {
                SatResult::Sat => {
                    let Some(model) = model else {
                        warn!(state = %state, "solver returned SAT without a model");
                        unknown = Some("solver returned SAT without a model".to_string());
                        continue;
                    };
                    match part {
                        Some(i) => violated.push(dual.parts[i].conjecture.clone()),
                        None => violated.extend(
                            dual.parts
                                .iter()
                                .filter(|p| model.get_bool(&p.indicator) == Some(true))
                                .map(|p| p.conjecture.clone()),
                        ),
                    }
                    if witness_model.is_none() {
                        witness_model = Some(model);
                    }
                }
                SatResult::Unsat => {}
                SatResult::Unknown(reason) => {
                    warn!(state = %state, %reason, "solver returned unknown");
                    unknown = Some(reason);
                }
            }
        }

        if let Some(model) = witness_model {
            let cex = extract_counterexample(graph, state, dual, &model, violated)?;
            return Ok(CheckOutcome::Counterexample(Box::new(cex)));
        }
        Ok(match unknown {
            Some(reason) => CheckOutcome::Inconclusive { reason },
            None => CheckOutcome::NoCounterexample,
        })
    }

    /// Bring the solver's base level in line with `path`.
    fn prepare(&mut self, graph: &AnalysisGraph<'_>, path: &[SmtTerm]) -> Result<(), EngineError> {
        if !self.incremental || !path.starts_with(&self.asserted) {
            self.solver.reset().map_err(solver_error)?;
            self.sorts.clear();
            self.declarations.clear();
            self.declared.clear();
            self.asserted.clear();
        }

        let sig = &graph.program().signature;
        for sort in &sig.sorts {
            if self.declared.insert(sort.clone()) {
                self.solver.declare_sort(sort).map_err(solver_error)?;
                self.sorts.push(sort.clone());
            }
        }
        let symbols = sig
            .symbols
            .iter()
            .map(|(n, d)| (n, &d.domain, &d.range))
            .chain(
                graph
                    .namespace()
                    .allocated()
                    .map(|(n, a)| (n, &a.domain, &a.range)),
            );
        let mut fresh = 0usize;
        for (name, domain, range) in symbols {
            if self.declared.insert(name.clone()) {
                self.solver
                    .declare_fun(name, domain, range)
                    .map_err(solver_error)?;
                self.declarations
                    .push((name.clone(), domain.clone(), range.clone()));
                fresh += 1;
            }
        }

        let reused = self.asserted.len();
        for conjunct in &path[reused..] {
            self.solver.assert(conjunct).map_err(solver_error)?;
            self.asserted.push(conjunct.clone());
        }
        debug!(
            declared = fresh,
            reused,
            asserted = path.len() - reused,
            "prepared solver for final-condition check"
        );
        Ok(())
    }

    fn render(&self, history: &[SmtTerm], goal: &SmtTerm) -> String {
        let mut assertions = self.asserted.clone();
        assertions.extend(history.iter().cloned());
        assertions.push(goal.clone());
        query_to_smt2_script(&self.sorts, &self.declarations, &assertions)
    }
}
