use std::collections::BTreeMap;

use ravel_smt::solver::{Model, ModelValue};
use ravel_smt::sorts::SmtSort;
use serde::Serialize;

use crate::error::UsageError;
use crate::graph::{AnalysisGraph, StateId};
use crate::transrel::TransitionRelation;
use crate::witness::DualClause;

/// Values of the nullary state symbols in one state of the trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateValuation {
    pub state: StateId,
    pub values: BTreeMap<String, ModelValue>,
}

/// One executed action between two consecutive states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub label: String,
    /// The action actually executed; differs from `label` when the step
    /// chose among several actions.
    pub action: String,
    /// Environment-chosen arguments of `action`, keyed `action.param`.
    pub arguments: BTreeMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WitnessValue {
    pub conjecture: String,
    pub variable: String,
    pub value: ModelValue,
}

/// A concrete execution violating at least one conjecture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counterexample {
    pub violated: Vec<String>,
    /// Rigid nullary constants.
    pub constants: BTreeMap<String, ModelValue>,
    pub witnesses: Vec<WitnessValue>,
    /// `states[i + 1]` is reached from `states[i]` by `steps[i]`.
    pub states: Vec<StateValuation>,
    pub steps: Vec<StepRecord>,
}

/// Nullary symbols worth reading back from a model of a query at `state`.
pub fn model_symbols(
    graph: &AnalysisGraph<'_>,
    state: StateId,
    dual: &DualClause,
) -> Result<Vec<(String, SmtSort)>, UsageError> {
    let sig = &graph.program().signature;
    let mut out: BTreeMap<String, SmtSort> = sig
        .symbols
        .iter()
        .filter(|(_, d)| d.domain.is_empty())
        .map(|(n, d)| (n.clone(), d.range.clone()))
        .collect();

    for id in graph.trace(state)? {
        let s = graph.state(id)?;
        for (symbol, version) in s.vocabulary.iter() {
            if let Some(decl) = sig.symbol(symbol).filter(|d| d.domain.is_empty()) {
                out.insert(version.clone(), decl.range.clone());
            }
        }
        let Some(edge) = s.via.and_then(|e| graph.edge(e)) else {
            continue;
        };
        let selectors = edge
            .relation
            .choices
            .iter()
            .filter_map(|c| c.selector.as_ref());
        for constant in edge
            .relation
            .arguments
            .iter()
            .map(|a| &a.constant)
            .chain(selectors)
        {
            if let Some(allocated) = graph.namespace().get(constant) {
                out.insert(constant.clone(), allocated.range.clone());
            }
        }
    }
    for part in &dual.parts {
        out.insert(part.indicator.clone(), SmtSort::Bool);
        for w in &part.witnesses {
            out.insert(w.name.clone(), w.sort.clone());
        }
    }
    Ok(out.into_iter().collect())
}

/// Read the execution leading to `state` back out of `model`.
pub fn extract_counterexample(
    graph: &AnalysisGraph<'_>,
    state: StateId,
    dual: &DualClause,
    model: &Model,
    violated: Vec<String>,
) -> Result<Counterexample, UsageError> {
    let sig = &graph.program().signature;

    let constants = sig
        .symbols
        .iter()
        .filter(|(_, d)| !d.mutable && d.domain.is_empty())
        .filter_map(|(n, _)| model.get(n).map(|v| (n.clone(), v.clone())))
        .collect();

    let mut witnesses = Vec::new();
    for part in dual.parts.iter().filter(|p| violated.contains(&p.conjecture)) {
        for w in &part.witnesses {
            if let Some(value) = model.get(&w.name) {
                witnesses.push(WitnessValue {
                    conjecture: part.conjecture.clone(),
                    variable: w.variable.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    let mut states = Vec::new();
    let mut steps = Vec::new();
    for id in graph.trace(state)? {
        let s = graph.state(id)?;
        if let Some(edge) = s.via.and_then(|e| graph.edge(e)) {
            let taken = taken_branch(&edge.relation, model);
            let action = executed_action(&edge.relation, taken);
            // Arguments of branches the step did not take are meaningless.
            let arguments = edge
                .relation
                .arguments
                .iter()
                .filter(|a| match (a.branch, taken) {
                    (Some((0, arm)), Some(t)) => arm == t,
                    _ => true,
                })
                .filter_map(|a| model.get(&a.constant).map(|v| (a.param.clone(), v.clone())))
                .collect();
            steps.push(StepRecord {
                label: edge.label.clone(),
                action,
                arguments,
            });
        }
        let values = s
            .vocabulary
            .iter()
            .filter(|(symbol, _)| sig.symbol(symbol).is_some_and(|d| d.domain.is_empty()))
            .filter_map(|(symbol, version)| model.get(version).map(|v| (symbol.clone(), v.clone())))
            .collect();
        states.push(StateValuation { state: id, values });
    }

    Ok(Counterexample {
        violated,
        constants,
        witnesses,
        states,
        steps,
    })
}

/// Branch index the first choice of `relation` took in `model`.
fn taken_branch(relation: &TransitionRelation, model: &Model) -> Option<usize> {
    let choice = relation.choices.first()?;
    match &choice.selector {
        None => Some(0),
        Some(sel) => model.get_int(sel).and_then(|i| usize::try_from(i).ok()),
    }
}

/// The action a step ran: the branch its outermost choice took, or the
/// relation's own action when the body makes no choice.
fn executed_action(relation: &TransitionRelation, taken: Option<usize>) -> String {
    relation
        .choices
        .first()
        .and_then(|choice| choice.label(taken))
        .unwrap_or(relation.action.as_str())
        .to_string()
}

/// Pretty-print a counterexample trace.
pub fn format_counterexample(cex: &Counterexample) -> String {
    let mut out = String::new();
    out.push_str("Counterexample trace:\n");
    out.push_str(&format!("  Violated: {}\n", cex.violated.join(", ")));
    if !cex.constants.is_empty() {
        out.push_str("  Constants:\n");
        for (name, value) in &cex.constants {
            out.push_str(&format!("    {name} = {value}\n"));
        }
    }
    if !cex.witnesses.is_empty() {
        out.push_str("  Witnesses:\n");
        for w in &cex.witnesses {
            out.push_str(&format!("    {} = {}  ({})\n", w.variable, w.value, w.conjecture));
        }
    }
    for (i, state) in cex.states.iter().enumerate() {
        if i > 0 {
            if let Some(step) = cex.steps.get(i - 1) {
                out.push_str(&format!("  Step {i}: {}", step.label));
                if step.action != step.label {
                    out.push_str(&format!(" ({})", step.action));
                }
                out.push('\n');
                for (param, value) in &step.arguments {
                    out.push_str(&format!("    {param} = {value}\n"));
                }
            }
        }
        if i == 0 {
            out.push_str("  State 0 (initial):\n");
        } else {
            out.push_str(&format!("  State {i}:\n"));
        }
        if state.values.is_empty() {
            out.push_str("    (no scalar state)\n");
        }
        for (name, value) in &state.values {
            out.push_str(&format!("    {name} = {value}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravel_ir::{Action, ActionDecl, Conjecture, Program, Signature, SymbolDecl};
    use ravel_smt::terms::SmtTerm;

    fn program() -> Program {
        let sig = Signature::new()
            .with_symbol("x", SymbolDecl::state(vec![], SmtSort::Int))
            .with_symbol("limit", SymbolDecl::rigid(vec![], SmtSort::Int));
        let mut p = Program::new("counter", sig);
        p.actions.push(ActionDecl::new(
            "add",
            vec![("k".into(), SmtSort::Int)],
            Action::assign("x", SmtTerm::var("x").add(SmtTerm::var("k"))),
        ));
        p.conjectures.push(Conjecture::new(
            "bounded",
            SmtTerm::var("x").lt(SmtTerm::var("limit")),
        ));
        p
    }

    fn model(pairs: &[(&str, ModelValue)]) -> Model {
        Model {
            values: pairs
                .iter()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn reads_each_state_at_its_own_version() {
        let p = program();
        let mut g = AnalysisGraph::new(&p);
        let root = g.add_initial_state(SmtTerm::bool(true)).unwrap();
        let add = p.action("add").unwrap().clone();
        let s1 = g.execute(&add, None, Some(root), "ext").unwrap();
        let dual = DualClause::build(&p.conjectures, g.namespace_mut()).unwrap();

        let m = model(&[
            ("x", ModelValue::Int(0)),
            ("x#1", ModelValue::Int(5)),
            ("add.k#1", ModelValue::Int(5)),
            ("limit", ModelValue::Int(3)),
        ]);
        let cex = extract_counterexample(&g, s1, &dual, &m, vec!["bounded".into()]).unwrap();

        assert_eq!(cex.states.len(), 2);
        assert_eq!(cex.states[0].values.get("x"), Some(&ModelValue::Int(0)));
        assert_eq!(cex.states[1].values.get("x"), Some(&ModelValue::Int(5)));
        assert_eq!(cex.steps[0].label, "ext");
        assert_eq!(
            cex.steps[0].arguments.get("add.k"),
            Some(&ModelValue::Int(5))
        );
        assert_eq!(cex.constants.get("limit"), Some(&ModelValue::Int(3)));

        let text = format_counterexample(&cex);
        assert!(text.contains("Violated: bounded"));
        assert!(text.contains("Step 1: ext (add)"));
        assert!(text.contains("add.k = 5"));
    }

    #[test]
    fn step_names_the_branch_its_selector_picked() {
        let mut p = program();
        p.actions.push(ActionDecl::new(
            "reset",
            vec![],
            Action::assign("x", SmtTerm::int(0)),
        ));
        p.exported = vec!["add".into(), "reset".into()];
        let mut g = AnalysisGraph::new(&p);
        g.add_initial_state(SmtTerm::bool(true)).unwrap();
        let step = p.step_action();
        let s1 = g.execute(&step, None, None, &step.name).unwrap();
        let dual = DualClause::build(&p.conjectures, g.namespace_mut()).unwrap();

        let names: Vec<String> = model_symbols(&g, s1, &dual)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert!(names.iter().any(|n| n == "@choice#1"));

        let m = model(&[
            ("x", ModelValue::Int(4)),
            ("x#3", ModelValue::Int(0)),
            ("@choice#1", ModelValue::Int(1)),
            ("add.k#1", ModelValue::Int(9)),
        ]);
        let cex = extract_counterexample(&g, s1, &dual, &m, vec!["bounded".into()]).unwrap();
        assert_eq!(cex.steps[0].label, "ext");
        assert_eq!(cex.steps[0].action, "reset");
        assert!(cex.steps[0].arguments.is_empty());
        assert_eq!(cex.states[1].values.get("x"), Some(&ModelValue::Int(0)));
        assert!(format_counterexample(&cex).contains("Step 1: ext (reset)"));
    }

    #[test]
    fn nested_call_arguments_stay_with_the_taken_branch() {
        let mut p = program();
        p.actions.push(ActionDecl::new("relay", vec![], Action::call("add")));
        p.exported = vec!["relay".into(), "add".into()];
        let mut g = AnalysisGraph::new(&p);
        g.add_initial_state(SmtTerm::bool(true)).unwrap();
        let step = p.step_action();
        let s1 = g.execute(&step, None, None, &step.name).unwrap();
        let dual = DualClause::build(&p.conjectures, g.namespace_mut()).unwrap();

        let m = model(&[
            ("x", ModelValue::Int(0)),
            ("x#1", ModelValue::Int(3)),
            ("x#3", ModelValue::Int(3)),
            ("@choice#1", ModelValue::Int(0)),
            ("add.k#1", ModelValue::Int(3)),
            ("add.k#2", ModelValue::Int(7)),
        ]);
        let cex = extract_counterexample(&g, s1, &dual, &m, vec!["bounded".into()]).unwrap();
        assert_eq!(cex.steps[0].action, "relay");
        assert_eq!(
            cex.steps[0].arguments,
            [("add.k".to_string(), ModelValue::Int(3))].into_iter().collect()
        );
        assert_eq!(cex.states[1].values.get("x"), Some(&ModelValue::Int(3)));
    }

    #[test]
    fn model_symbols_cover_versions_arguments_and_indicators() {
        let p = program();
        let mut g = AnalysisGraph::new(&p);
        g.add_initial_state(SmtTerm::bool(true)).unwrap();
        let add = p.action("add").unwrap().clone();
        let s1 = g.execute(&add, None, None, "ext").unwrap();
        let dual = DualClause::build(&p.conjectures, g.namespace_mut()).unwrap();

        let names: Vec<String> = model_symbols(&g, s1, &dual)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        for expected in ["x", "x#1", "limit", "add.k#1", dual.parts[0].indicator.as_str()] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn serializes_to_json() {
        let cex = Counterexample {
            violated: vec!["c".into()],
            constants: BTreeMap::new(),
            witnesses: vec![],
            states: vec![StateValuation {
                state: StateId(0),
                values: [("x".to_string(), ModelValue::Int(2))].into_iter().collect(),
            }],
            steps: vec![],
        };
        let json = serde_json::to_value(&cex).unwrap();
        assert_eq!(json["states"][0]["values"]["x"], 2);
        assert_eq!(json["violated"][0], "c");
    }
}
