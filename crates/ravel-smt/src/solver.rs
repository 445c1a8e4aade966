use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// A model (constant assignments) extracted from a SAT result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Model {
    pub values: BTreeMap<String, ModelValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
    /// An element of an uninterpreted sort, as printed by the solver.
    Element(String),
}

impl fmt::Display for ModelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelValue::Int(n) => write!(f, "{n}"),
            ModelValue::Bool(b) => write!(f, "{b}"),
            ModelValue::Element(e) => write!(f, "{e}"),
        }
    }
}

impl Model {
    pub fn get(&self, name: &str) -> Option<&ModelValue> {
        self.values.get(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ModelValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ModelValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare an uninterpreted sort.
    fn declare_sort(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Declare a function symbol; an empty domain declares a constant.
    fn declare_fun(
        &mut self,
        name: &str,
        domain: &[SmtSort],
        range: &SmtSort,
    ) -> Result<(), Self::Error>;

    /// Declare a new constant.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error> {
        self.declare_fun(name, &[], sort)
    }

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract a model over the given constants if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    /// Reset the solver state, dropping all declarations and assertions.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct MockSolver {
        sat_result: SatResult,
        declared: Vec<String>,
        check_sat_calls: usize,
    }

    impl MockSolver {
        fn new(sat_result: SatResult) -> Self {
            Self {
                sat_result,
                declared: Vec::new(),
                check_sat_calls: 0,
            }
        }
    }

    impl SmtSolver for MockSolver {
        type Error = io::Error;

        fn declare_sort(&mut self, name: &str) -> Result<(), Self::Error> {
            self.declared.push(format!("sort {name}"));
            Ok(())
        }

        fn declare_fun(
            &mut self,
            name: &str,
            domain: &[SmtSort],
            _range: &SmtSort,
        ) -> Result<(), Self::Error> {
            self.declared.push(format!("{name}/{}", domain.len()));
            Ok(())
        }

        fn assert(&mut self, _term: &SmtTerm) -> Result<(), Self::Error> {
            Ok(())
        }

        fn push(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn pop(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, Self::Error> {
            self.check_sat_calls += 1;
            Ok(self.sat_result.clone())
        }

        fn check_sat_with_model(
            &mut self,
            _var_names: &[(&str, &SmtSort)],
        ) -> Result<(SatResult, Option<Model>), Self::Error> {
            Ok((self.sat_result.clone(), None))
        }

        fn reset(&mut self) -> Result<(), Self::Error> {
            self.declared.clear();
            Ok(())
        }
    }

    #[test]
    fn model_getters_return_typed_values_only() {
        let mut values = BTreeMap::new();
        values.insert("x".to_string(), ModelValue::Int(42));
        values.insert("flag".to_string(), ModelValue::Bool(true));
        values.insert("n".to_string(), ModelValue::Element("node!val!0".into()));
        let model = Model { values };

        assert_eq!(model.get_int("x"), Some(42));
        assert_eq!(model.get_bool("flag"), Some(true));
        assert_eq!(model.get_int("flag"), None);
        assert_eq!(model.get_bool("x"), None);
        assert_eq!(model.get_int("n"), None);
        assert_eq!(model.get("n").map(|v| v.to_string()).as_deref(), Some("node!val!0"));
        assert_eq!(model.get_int("missing"), None);
    }

    #[test]
    fn default_declare_var_declares_nullary_function() {
        let mut solver = MockSolver::new(SatResult::Sat);
        solver
            .declare_var("x", &SmtSort::Int)
            .expect("declare_var should succeed");
        assert_eq!(solver.declared, vec!["x/0".to_string()]);
    }

    #[test]
    fn reset_drops_declarations() {
        let mut solver = MockSolver::new(SatResult::Unknown("timeout".to_string()));
        solver.declare_sort("node").expect("declare_sort should succeed");
        assert_eq!(solver.check_sat().expect("check"), SatResult::Unknown("timeout".into()));
        solver.reset().expect("reset should succeed");
        assert!(solver.declared.is_empty());
        assert_eq!(solver.check_sat_calls, 1);
    }
}
