#![allow(dead_code)]

use ravel_engine::bmc::{BmcOptions, BmcOutcome};
use ravel_engine::counterexample::Counterexample;
use ravel_engine::graph::AnalysisGraph;
use ravel_engine::pipeline::{PipelineOptions, SolverChoice};
use ravel_ir::Program;
use ravel_smt::solver::SmtSolver;

pub fn demo_path(name: &str) -> String {
    format!("{}/../../demos/{name}", env!("CARGO_MANIFEST_DIR"))
}

pub fn load_demo(name: &str) -> Program {
    let path = demo_path(name);
    ravel_ir::load_program(&path).unwrap_or_else(|e| panic!("Failed to load {path}: {e}"))
}

pub fn check_options(bound: usize) -> PipelineOptions {
    PipelineOptions {
        solver: SolverChoice::Z3,
        bound,
        timeout_secs: 60,
        ..PipelineOptions::default()
    }
}

pub fn bmc_options(bound: usize) -> BmcOptions {
    BmcOptions {
        bound,
        ..BmcOptions::default()
    }
}

pub fn expect_violation(outcome: BmcOutcome) -> (usize, Counterexample) {
    match outcome {
        BmcOutcome::Violation {
            depth,
            counterexample,
        } => (depth, *counterexample),
        other => panic!("expected a counterexample, got {other:?}"),
    }
}

/// Declare every sort and symbol the graph knows about on `solver`.
pub fn declare_graph<S: SmtSolver>(solver: &mut S, graph: &AnalysisGraph<'_>) {
    let sig = &graph.program().signature;
    for sort in &sig.sorts {
        solver.declare_sort(sort).unwrap();
    }
    for (name, decl) in &sig.symbols {
        solver.declare_fun(name, &decl.domain, &decl.range).unwrap();
    }
    for (name, allocated) in graph.namespace().allocated() {
        solver
            .declare_fun(name, &allocated.domain, &allocated.range)
            .unwrap();
    }
}
