#![no_main]
use libfuzzer_sys::fuzz_target;
use ravel_engine::graph::AnalysisGraph;
use ravel_engine::witness::DualClause;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(program) = ravel_ir::Program::from_json(s) else {
        return;
    };
    if program.validate().is_err() {
        return;
    }
    // A validated program must unroll without translation errors; skip solving.
    let mut graph = AnalysisGraph::new(&program);
    DualClause::build(&program.conjectures, graph.namespace_mut()).unwrap();
    graph.add_initial_state(program.initial_condition()).unwrap();
    if let Some(init) = program.initializer() {
        graph.execute(init, None, None, &init.name).unwrap();
    }
    let step = program.step_action();
    for _ in 0..3 {
        graph.execute(&step, None, None, &step.name).unwrap();
    }
});
