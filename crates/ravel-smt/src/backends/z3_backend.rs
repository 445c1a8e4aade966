use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use z3::ast::{Ast, Bool, Dynamic, Int};
use z3::SatResult as Z3SatResult;

use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Unknown sort: {0}")]
    UnknownSort(String),
    #[error("Sort mismatch: {0}")]
    SortMismatch(String),
}

struct FunEntry {
    decl: z3::FuncDecl,
    arity: usize,
}

pub struct Z3Solver {
    solver: z3::Solver,
    sorts: HashMap<String, z3::Sort>,
    funs: HashMap<String, FunEntry>,
    consts: HashMap<String, Dynamic>,
    _params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            sorts: HashMap::new(),
            funs: HashMap::new(),
            consts: HashMap::new(),
            _params: None,
        }
    }

    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            return Self::new();
        }
        let solver = z3::Solver::new();
        let mut params = z3::Params::new();
        let timeout_ms = timeout_secs.saturating_mul(1000);
        params.set_u32("timeout", timeout_ms.min(u32::MAX as u64) as u32);
        solver.set_params(&params);
        Self {
            solver,
            sorts: HashMap::new(),
            funs: HashMap::new(),
            consts: HashMap::new(),
            _params: Some(params),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new()
    }

    fn z3_sort(&self, sort: &SmtSort) -> Result<z3::Sort, Z3Error> {
        match sort {
            SmtSort::Bool => Ok(z3::Sort::bool()),
            SmtSort::Int => Ok(z3::Sort::int()),
            SmtSort::Uninterpreted(name) => self
                .sorts
                .get(name)
                .cloned()
                .ok_or_else(|| Z3Error::UnknownSort(name.clone())),
        }
    }

    fn translate_bool(
        &self,
        term: &SmtTerm,
        bound: &mut Vec<(String, Dynamic)>,
    ) -> Result<Bool, Z3Error> {
        self.translate_term(term, bound)?
            .as_bool()
            .ok_or_else(|| Z3Error::SortMismatch(format!("expected Bool in {term:?}")))
    }

    fn translate_int(
        &self,
        term: &SmtTerm,
        bound: &mut Vec<(String, Dynamic)>,
    ) -> Result<Int, Z3Error> {
        self.translate_term(term, bound)?
            .as_int()
            .ok_or_else(|| Z3Error::SortMismatch(format!("expected Int in {term:?}")))
    }

    fn translate_term(
        &self,
        term: &SmtTerm,
        bound: &mut Vec<(String, Dynamic)>,
    ) -> Result<Dynamic, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some((_, v)) = bound.iter().rev().find(|(n, _)| n == name) {
                    Ok(v.clone())
                } else if let Some(v) = self.consts.get(name) {
                    Ok(v.clone())
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::App(head, args) => {
                if args.is_empty() {
                    return self.translate_term(&SmtTerm::Var(head.clone()), bound);
                }
                let entry = self
                    .funs
                    .get(head)
                    .ok_or_else(|| Z3Error::UnknownFunction(head.clone()))?;
                if entry.arity != args.len() {
                    return Err(Z3Error::SortMismatch(format!(
                        "{head} expects {} arguments, got {}",
                        entry.arity,
                        args.len()
                    )));
                }
                let values = args
                    .iter()
                    .map(|a| self.translate_term(a, bound))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&dyn Ast> = values.iter().map(|v| v as &dyn Ast).collect();
                Ok(entry.decl.apply(&refs))
            }
            SmtTerm::IntLit(n) => Ok(Dynamic::from_ast(&Int::from_i64(*n))),
            SmtTerm::BoolLit(b) => Ok(Dynamic::from_ast(&Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => {
                let l = self.translate_int(lhs, bound)?;
                let r = self.translate_int(rhs, bound)?;
                Ok(Dynamic::from_ast(&(&l + &r)))
            }
            SmtTerm::Sub(lhs, rhs) => {
                let l = self.translate_int(lhs, bound)?;
                let r = self.translate_int(rhs, bound)?;
                Ok(Dynamic::from_ast(&(&l - &r)))
            }
            SmtTerm::Mul(lhs, rhs) => {
                let l = self.translate_int(lhs, bound)?;
                let r = self.translate_int(rhs, bound)?;
                Ok(Dynamic::from_ast(&(&l * &r)))
            }
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs, bound)?;
                let r = self.translate_term(rhs, bound)?;
                if l.get_sort() != r.get_sort() {
                    return Err(Z3Error::SortMismatch(format!("in Eq {term:?}")));
                }
                Ok(Dynamic::from_ast(&l.eq(&r)))
            }
            SmtTerm::Lt(lhs, rhs) => {
                let l = self.translate_int(lhs, bound)?;
                let r = self.translate_int(rhs, bound)?;
                Ok(Dynamic::from_ast(&l.lt(&r)))
            }
            SmtTerm::Le(lhs, rhs) => {
                let l = self.translate_int(lhs, bound)?;
                let r = self.translate_int(rhs, bound)?;
                Ok(Dynamic::from_ast(&l.le(&r)))
            }
            SmtTerm::Gt(lhs, rhs) => {
                let l = self.translate_int(lhs, bound)?;
                let r = self.translate_int(rhs, bound)?;
                Ok(Dynamic::from_ast(&l.gt(&r)))
            }
            SmtTerm::Ge(lhs, rhs) => {
                let l = self.translate_int(lhs, bound)?;
                let r = self.translate_int(rhs, bound)?;
                Ok(Dynamic::from_ast(&l.ge(&r)))
            }
            SmtTerm::And(terms) => {
                let bools = terms
                    .iter()
                    .map(|t| self.translate_bool(t, bound))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Dynamic::from_ast(&Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = terms
                    .iter()
                    .map(|t| self.translate_bool(t, bound))
                    .collect::<Result<Vec<_>, _>>()?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Dynamic::from_ast(&Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_bool(inner, bound)?;
                Ok(Dynamic::from_ast(&b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_bool(lhs, bound)?;
                let r = self.translate_bool(rhs, bound)?;
                Ok(Dynamic::from_ast(&l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_bool(cond, bound)?;
                let t = self.translate_term(then, bound)?;
                let e = self.translate_term(els, bound)?;
                if t.get_sort() != e.get_sort() {
                    return Err(Z3Error::SortMismatch("branches of ITE differ".into()));
                }
                Ok(c.ite(&t, &e))
            }
            SmtTerm::ForAll(binders, body) | SmtTerm::Exists(binders, body) => {
                let depth = bound.len();
                for (name, sort) in binders {
                    let z3_sort = self.z3_sort(sort)?;
                    let var = z3::FuncDecl::new(name.as_str(), &[], &z3_sort).apply(&[]);
                    bound.push((name.clone(), var));
                }
                let body = self.translate_bool(body, bound);
                let vars: Vec<Dynamic> = bound.drain(depth..).map(|(_, v)| v).collect();
                let body = body?;
                let refs: Vec<&dyn Ast> = vars.iter().map(|v| v as &dyn Ast).collect();
                let quantified = match term {
                    SmtTerm::ForAll(..) => z3::ast::forall_const(&refs, &[], &body),
                    _ => z3::ast::exists_const(&refs, &[], &body),
                };
                Ok(Dynamic::from_ast(&quantified))
            }
        }
    }

    fn sat_result(result: Z3SatResult, solver: &z3::Solver) -> SatResult {
        match result {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => SatResult::Unknown(
                solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "Z3 returned unknown".into()),
            ),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_sort(&mut self, name: &str) -> Result<(), Z3Error> {
        let sort = z3::Sort::uninterpreted(z3::Symbol::String(name.to_string()));
        self.sorts.insert(name.to_string(), sort);
        Ok(())
    }

    fn declare_fun(
        &mut self,
        name: &str,
        domain: &[SmtSort],
        range: &SmtSort,
    ) -> Result<(), Z3Error> {
        let domain = domain
            .iter()
            .map(|s| self.z3_sort(s))
            .collect::<Result<Vec<_>, _>>()?;
        let domain_refs: Vec<&z3::Sort> = domain.iter().collect();
        let range = self.z3_sort(range)?;
        let decl = z3::FuncDecl::new(name, &domain_refs, &range);
        if domain.is_empty() {
            self.consts.insert(name.to_string(), decl.apply(&[]));
        }
        self.funs.insert(
            name.to_string(),
            FunEntry {
                decl,
                arity: domain.len(),
            },
        );
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_bool(term, &mut Vec::new())?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        let result = self.solver.check();
        Ok(Self::sat_result(result, &self.solver))
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => {
                let z3_model = self
                    .solver
                    .get_model()
                    .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
                let mut values = BTreeMap::new();

                for &(name, sort) in var_names {
                    let Some(v) = self.consts.get(name) else {
                        continue;
                    };
                    let Some(val) = z3_model.eval(v, true) else {
                        continue;
                    };
                    let value = match sort {
                        SmtSort::Int => val.as_int().and_then(|i| i.as_i64()).map(ModelValue::Int),
                        SmtSort::Bool => val.as_bool().and_then(|b| b.as_bool()).map(ModelValue::Bool),
                        SmtSort::Uninterpreted(_) => Some(ModelValue::Element(val.to_string())),
                    };
                    if let Some(value) = value {
                        values.insert(name.to_string(), value);
                    }
                }

                Ok((SatResult::Sat, Some(Model { values })))
            }
            other => Ok((Self::sat_result(other, &self.solver), None)),
        }
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply timeout if configured.
        if let Some(params) = &self._params {
            self.solver.set_params(params);
        }
        self.sorts.clear();
        self.funs.clear();
        self.consts.clear();
        Ok(())
    }
}
