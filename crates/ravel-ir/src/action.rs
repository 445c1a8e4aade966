use std::collections::BTreeSet;

use ravel_smt::sorts::SmtSort;
use ravel_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};

/// Body of an action. A closed variant type: every construct the engine
/// translates is listed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Leave the state unchanged.
    Skip,
    /// `target(params) := value`. With empty `params` this assigns a
    /// constant; otherwise it replaces the whole function pointwise, with
    /// `params` bound in `value`.
    Assign {
        target: String,
        #[serde(default)]
        params: Vec<(String, SmtSort)>,
        value: SmtTerm,
    },
    /// Give `target` an arbitrary new value.
    Havoc { target: String },
    /// Block every execution where the formula is false.
    Assume(SmtTerm),
    Sequence(Vec<Action>),
    If {
        guard: SmtTerm,
        then: Box<Action>,
        #[serde(default)]
        otherwise: Option<Box<Action>>,
    },
    /// Non-deterministic choice among the branches.
    Choice(Vec<Action>),
    /// Call another action. `args: None` lets the environment pick the
    /// arguments.
    Call {
        callee: String,
        #[serde(default)]
        args: Option<Vec<SmtTerm>>,
    },
}

impl Action {
    pub fn assign(target: impl Into<String>, value: SmtTerm) -> Self {
        Action::Assign {
            target: target.into(),
            params: Vec::new(),
            value,
        }
    }

    pub fn update(target: impl Into<String>, params: Vec<(String, SmtSort)>, value: SmtTerm) -> Self {
        Action::Assign {
            target: target.into(),
            params,
            value,
        }
    }

    /// `target(at) := value`, leaving every other point unchanged.
    pub fn point_update(
        target: impl Into<String>,
        params: Vec<(String, SmtSort)>,
        at: Vec<SmtTerm>,
        value: SmtTerm,
    ) -> Self {
        let target = target.into();
        let hit = SmtTerm::conjoin(
            params
                .iter()
                .zip(at)
                .map(|((p, _), a)| SmtTerm::var(p.clone()).eq(a)),
        );
        let old = SmtTerm::app(
            target.clone(),
            params.iter().map(|(p, _)| SmtTerm::var(p.clone())).collect(),
        );
        Action::Assign {
            target,
            params,
            value: SmtTerm::ite(hit, value, old),
        }
    }

    pub fn havoc(target: impl Into<String>) -> Self {
        Action::Havoc {
            target: target.into(),
        }
    }

    pub fn assume(cond: SmtTerm) -> Self {
        Action::Assume(cond)
    }

    pub fn seq(actions: Vec<Action>) -> Self {
        Action::Sequence(actions)
    }

    pub fn if_then(guard: SmtTerm, then: Action) -> Self {
        Action::If {
            guard,
            then: Box::new(then),
            otherwise: None,
        }
    }

    pub fn if_then_else(guard: SmtTerm, then: Action, otherwise: Action) -> Self {
        Action::If {
            guard,
            then: Box::new(then),
            otherwise: Some(Box::new(otherwise)),
        }
    }

    pub fn choice(branches: Vec<Action>) -> Self {
        Action::Choice(branches)
    }

    pub fn call(callee: impl Into<String>) -> Self {
        Action::Call {
            callee: callee.into(),
            args: None,
        }
    }

    pub fn call_with(callee: impl Into<String>, args: Vec<SmtTerm>) -> Self {
        Action::Call {
            callee: callee.into(),
            args: Some(args),
        }
    }

    /// Symbols assigned or havocked directly in this body, ignoring calls.
    pub fn assigned_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.walk(&mut |a| match a {
            Action::Assign { target, .. } | Action::Havoc { target } => {
                out.insert(target.clone());
            }
            _ => {}
        });
        out
    }

    /// Names of actions called directly from this body.
    pub fn callees(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.walk(&mut |a| {
            if let Action::Call { callee, .. } = a {
                out.insert(callee.clone());
            }
        });
        out
    }

    fn walk(&self, f: &mut impl FnMut(&Action)) {
        f(self);
        match self {
            Action::Sequence(items) | Action::Choice(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            Action::If {
                then, otherwise, ..
            } => {
                then.walk(f);
                if let Some(otherwise) = otherwise {
                    otherwise.walk(f);
                }
            }
            Action::Skip
            | Action::Assign { .. }
            | Action::Havoc { .. }
            | Action::Assume(_)
            | Action::Call { .. } => {}
        }
    }
}

/// A named action with sorted formal parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<(String, SmtSort)>,
    pub body: Action,
}

impl ActionDecl {
    pub fn new(name: impl Into<String>, params: Vec<(String, SmtSort)>, body: Action) -> Self {
        Self {
            name: name.into(),
            params,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_targets_and_callees_through_nesting() {
        let body = Action::seq(vec![
            Action::assign("x", SmtTerm::int(1)),
            Action::if_then_else(
                SmtTerm::var("b"),
                Action::havoc("y"),
                Action::choice(vec![Action::call("grant"), Action::Skip]),
            ),
        ]);
        let assigned: Vec<String> = body.assigned_symbols().into_iter().collect();
        assert_eq!(assigned, vec!["x".to_string(), "y".to_string()]);
        let callees: Vec<String> = body.callees().into_iter().collect();
        assert_eq!(callees, vec!["grant".to_string()]);
    }

    #[test]
    fn point_update_keeps_other_points() {
        let node = SmtSort::uninterpreted("node");
        let a = Action::point_update(
            "held",
            vec![("N".into(), node)],
            vec![SmtTerm::var("n")],
            SmtTerm::bool(true),
        );
        let Action::Assign { value, .. } = a else {
            panic!("expected assignment");
        };
        assert_eq!(
            value,
            SmtTerm::ite(
                SmtTerm::var("N").eq(SmtTerm::var("n")),
                SmtTerm::bool(true),
                SmtTerm::app("held", vec![SmtTerm::var("N")]),
            )
        );
    }

    #[test]
    fn decodes_from_json() {
        let json = r#"{
            "name": "inc",
            "body": {"Sequence": [
                {"Assume": {"Lt": [{"Var": "x"}, {"IntLit": 10}]}},
                {"Assign": {"target": "x", "value": {"Add": [{"Var": "x"}, {"IntLit": 1}]}}},
                "Skip"
            ]}
        }"#;
        let decl: ActionDecl = serde_json::from_str(json).unwrap();
        assert_eq!(decl.name, "inc");
        assert!(decl.params.is_empty());
        assert_eq!(
            decl.body,
            Action::seq(vec![
                Action::assume(SmtTerm::var("x").lt(SmtTerm::int(10))),
                Action::assign("x", SmtTerm::var("x").add(SmtTerm::int(1))),
                Action::Skip,
            ])
        );
    }
}
