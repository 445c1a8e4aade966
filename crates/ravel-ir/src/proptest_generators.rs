//! Proptest strategies for generating small well-formed programs.

use proptest::prelude::*;
use ravel_smt::sorts::SmtSort;
use ravel_smt::terms::SmtTerm;

use crate::action::{Action, ActionDecl};
use crate::program::{Conjecture, Program};
use crate::signature::{Signature, SymbolDecl};

/// A counter program together with the depth of its shortest violation.
#[derive(Debug, Clone)]
pub struct CounterCase {
    pub program: Program,
    pub start: i64,
    pub stride: i64,
    pub limit: i64,
    /// Number of steps after which `x < limit` first fails.
    pub violation_depth: usize,
}

/// Strategy for counter programs: `x := start` initially, one exported
/// action `x := x + stride`, an untouched `y`, and the conjecture
/// `x < limit`.
///
/// Generated cases have:
/// - `start` in -3..=3
/// - `stride` in 1..=3
/// - a violation within 0..=5 steps
pub fn arb_counter_program() -> impl Strategy<Value = CounterCase> {
    (-3i64..=3, 1i64..=3, 0usize..=5, 0i64..3).prop_map(|(start, stride, depth, slack)| {
        // Shortest violation after exactly `depth` steps: the counter is
        // still below `limit` after depth-1 steps and reaches it after depth.
        let limit = if depth == 0 {
            start - slack
        } else {
            start + stride * (depth as i64 - 1) + 1 + slack.min(stride - 1)
        };
        CounterCase {
            program: counter_program(start, stride, limit),
            start,
            stride,
            limit,
            violation_depth: depth,
        }
    })
}

pub fn counter_program(start: i64, stride: i64, limit: i64) -> Program {
    let sig = Signature::new()
        .with_symbol("x", SymbolDecl::state(vec![], SmtSort::Int))
        .with_symbol("y", SymbolDecl::state(vec![], SmtSort::Int));
    let mut program = Program::new("counter", sig);
    program.init.push(SmtTerm::var("x").eq(SmtTerm::int(start)));
    program.init.push(SmtTerm::var("y").eq(SmtTerm::int(0)));
    program.actions.push(ActionDecl::new(
        "inc",
        vec![],
        Action::assign("x", SmtTerm::var("x").add(SmtTerm::int(stride))),
    ));
    program.exported.push("inc".into());
    program.conjectures.push(Conjecture::new(
        "below_limit",
        SmtTerm::var("x").lt(SmtTerm::int(limit)),
    ));
    program
}
