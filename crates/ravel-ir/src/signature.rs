use indexmap::{IndexMap, IndexSet};
use ravel_smt::sorts::SmtSort;
use ravel_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical variables in scope while sort-checking, innermost last.
pub type Scope = [(String, SmtSort)];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    #[error("undeclared symbol '{0}'")]
    UndeclaredSymbol(String),
    #[error("undeclared sort '{0}'")]
    UndeclaredSort(String),
    #[error("'{symbol}' expects {expected} argument(s), got {found}")]
    Arity {
        symbol: String,
        expected: usize,
        found: usize,
    },
    #[error("sort mismatch in {context}: expected {expected}, found {found}")]
    Mismatch {
        context: String,
        expected: SmtSort,
        found: SmtSort,
    },
}

/// A declared constant, function or relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDecl {
    #[serde(default)]
    pub domain: Vec<SmtSort>,
    pub range: SmtSort,
    /// Mutable symbols are state; immutable ones are rigid across steps.
    #[serde(default = "default_mutable")]
    pub mutable: bool,
}

fn default_mutable() -> bool {
    true
}

impl SymbolDecl {
    pub fn state(domain: Vec<SmtSort>, range: SmtSort) -> Self {
        Self {
            domain,
            range,
            mutable: true,
        }
    }

    pub fn rigid(domain: Vec<SmtSort>, range: SmtSort) -> Self {
        Self {
            domain,
            range,
            mutable: false,
        }
    }

    pub fn arity(&self) -> usize {
        self.domain.len()
    }
}

/// The symbol table: uninterpreted sorts and every declared symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub sorts: IndexSet<String>,
    #[serde(default)]
    pub symbols: IndexMap<String, SymbolDecl>,
}

/// `[A-Za-z_][A-Za-z0-9_]*`. Engine-generated names use characters outside
/// this set, so a user identifier can never collide with one.
pub fn is_user_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, name: impl Into<String>) -> Self {
        self.sorts.insert(name.into());
        self
    }

    pub fn with_symbol(mut self, name: impl Into<String>, decl: SymbolDecl) -> Self {
        self.symbols.insert(name.into(), decl);
        self
    }

    pub fn symbol(&self, name: &str) -> Option<&SymbolDecl> {
        self.symbols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name) || self.sorts.contains(name)
    }

    /// Mutable symbols, in declaration order.
    pub fn state_symbols(&self) -> impl Iterator<Item = (&String, &SymbolDecl)> {
        self.symbols.iter().filter(|(_, d)| d.mutable)
    }

    pub fn check_sort(&self, sort: &SmtSort) -> Result<(), SortError> {
        match sort {
            SmtSort::Uninterpreted(name) if !self.sorts.contains(name) => {
                Err(SortError::UndeclaredSort(name.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Infer the sort of `term` with `locals` bound as logical variables.
    pub fn sort_of(&self, term: &SmtTerm, locals: &Scope) -> Result<SmtSort, SortError> {
        let mut scope = locals.to_vec();
        self.infer(term, &mut scope)
    }

    /// Require `term` to have sort `expected`.
    pub fn expect_sort(
        &self,
        term: &SmtTerm,
        locals: &Scope,
        expected: &SmtSort,
        context: &str,
    ) -> Result<(), SortError> {
        let found = self.sort_of(term, locals)?;
        if &found == expected {
            Ok(())
        } else {
            Err(SortError::Mismatch {
                context: context.to_string(),
                expected: expected.clone(),
                found,
            })
        }
    }

    pub fn check_formula(
        &self,
        term: &SmtTerm,
        locals: &Scope,
        context: &str,
    ) -> Result<(), SortError> {
        self.expect_sort(term, locals, &SmtSort::Bool, context)
    }

    fn infer(&self, term: &SmtTerm, scope: &mut Vec<(String, SmtSort)>) -> Result<SmtSort, SortError> {
        match term {
            SmtTerm::Var(name) => {
                if let Some((_, sort)) = scope.iter().rev().find(|(n, _)| n == name) {
                    return Ok(sort.clone());
                }
                self.apply(name, &[], scope)
            }
            SmtTerm::App(head, args) => {
                if args.is_empty() {
                    return self.infer(&SmtTerm::Var(head.clone()), scope);
                }
                self.apply(head, args, scope)
            }
            SmtTerm::IntLit(_) => Ok(SmtSort::Int),
            SmtTerm::BoolLit(_) => Ok(SmtSort::Bool),
            SmtTerm::Add(l, r) | SmtTerm::Sub(l, r) | SmtTerm::Mul(l, r) => {
                self.require(l, scope, &SmtSort::Int, "arithmetic")?;
                self.require(r, scope, &SmtSort::Int, "arithmetic")?;
                Ok(SmtSort::Int)
            }
            SmtTerm::Lt(l, r) | SmtTerm::Le(l, r) | SmtTerm::Gt(l, r) | SmtTerm::Ge(l, r) => {
                self.require(l, scope, &SmtSort::Int, "comparison")?;
                self.require(r, scope, &SmtSort::Int, "comparison")?;
                Ok(SmtSort::Bool)
            }
            SmtTerm::Eq(l, r) => {
                let left = self.infer(l, scope)?;
                self.require(r, scope, &left, "equality")?;
                Ok(SmtSort::Bool)
            }
            SmtTerm::And(terms) | SmtTerm::Or(terms) => {
                for t in terms {
                    self.require(t, scope, &SmtSort::Bool, "connective")?;
                }
                Ok(SmtSort::Bool)
            }
            SmtTerm::Not(inner) => {
                self.require(inner, scope, &SmtSort::Bool, "negation")?;
                Ok(SmtSort::Bool)
            }
            SmtTerm::Implies(l, r) => {
                self.require(l, scope, &SmtSort::Bool, "implication")?;
                self.require(r, scope, &SmtSort::Bool, "implication")?;
                Ok(SmtSort::Bool)
            }
            SmtTerm::ForAll(binders, body) | SmtTerm::Exists(binders, body) => {
                for (_, sort) in binders {
                    self.check_sort(sort)?;
                }
                let depth = scope.len();
                scope.extend(binders.iter().cloned());
                let result = self.require(body, scope, &SmtSort::Bool, "quantifier body");
                scope.truncate(depth);
                result.map(|_| SmtSort::Bool)
            }
            SmtTerm::Ite(c, t, e) => {
                self.require(c, scope, &SmtSort::Bool, "ite condition")?;
                let sort = self.infer(t, scope)?;
                self.require(e, scope, &sort, "ite branches")?;
                Ok(sort)
            }
        }
    }

    fn require(
        &self,
        term: &SmtTerm,
        scope: &mut Vec<(String, SmtSort)>,
        expected: &SmtSort,
        context: &str,
    ) -> Result<(), SortError> {
        let found = self.infer(term, scope)?;
        if &found == expected {
            Ok(())
        } else {
            Err(SortError::Mismatch {
                context: context.to_string(),
                expected: expected.clone(),
                found,
            })
        }
    }

    fn apply(
        &self,
        head: &str,
        args: &[SmtTerm],
        scope: &mut Vec<(String, SmtSort)>,
    ) -> Result<SmtSort, SortError> {
        let decl = self
            .symbols
            .get(head)
            .ok_or_else(|| SortError::UndeclaredSymbol(head.to_string()))?;
        if decl.domain.len() != args.len() {
            return Err(SortError::Arity {
                symbol: head.to_string(),
                expected: decl.domain.len(),
                found: args.len(),
            });
        }
        for (arg, sort) in args.iter().zip(&decl.domain) {
            self.require(arg, scope, sort, &format!("argument of '{head}'"))?;
        }
        Ok(decl.range.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> SmtSort {
        SmtSort::uninterpreted("node")
    }

    fn lock_signature() -> Signature {
        Signature::new()
            .with_sort("node")
            .with_symbol("x", SymbolDecl::state(vec![], SmtSort::Int))
            .with_symbol("held", SymbolDecl::state(vec![node()], SmtSort::Bool))
            .with_symbol("leader", SymbolDecl::rigid(vec![], node()))
    }

    #[test]
    fn identifiers_exclude_reserved_characters() {
        assert!(is_user_identifier("x"));
        assert!(is_user_identifier("_tmp9"));
        assert!(!is_user_identifier("9x"));
        assert!(!is_user_identifier("x#1"));
        assert!(!is_user_identifier("@X"));
        assert!(!is_user_identifier("send.n"));
        assert!(!is_user_identifier(""));
    }

    #[test]
    fn infers_application_and_quantifier_sorts() {
        let sig = lock_signature();
        let held_leader = SmtTerm::app("held", vec![SmtTerm::var("leader")]);
        assert_eq!(sig.sort_of(&held_leader, &[]).unwrap(), SmtSort::Bool);

        let all_held = SmtTerm::forall(
            vec![("N".into(), node())],
            SmtTerm::app("held", vec![SmtTerm::var("N")]),
        );
        sig.check_formula(&all_held, &[], "test").unwrap();

        let bumped = SmtTerm::var("x").add(SmtTerm::int(1));
        assert_eq!(sig.sort_of(&bumped, &[]).unwrap(), SmtSort::Int);
    }

    #[test]
    fn local_binding_shadows_symbol() {
        let sig = lock_signature();
        let locals = vec![("x".to_string(), node())];
        assert_eq!(sig.sort_of(&SmtTerm::var("x"), &locals).unwrap(), node());
    }

    #[test]
    fn rejects_undeclared_symbols_and_sorts() {
        let sig = lock_signature();
        assert_eq!(
            sig.sort_of(&SmtTerm::var("y"), &[]),
            Err(SortError::UndeclaredSymbol("y".into()))
        );
        let bad = SmtTerm::exists(
            vec![("K".into(), SmtSort::uninterpreted("key"))],
            SmtTerm::bool(true),
        );
        assert_eq!(
            sig.sort_of(&bad, &[]),
            Err(SortError::UndeclaredSort("key".into()))
        );
    }

    #[test]
    fn rejects_arity_and_sort_mismatches() {
        let sig = lock_signature();
        let err = sig.sort_of(&SmtTerm::var("held"), &[]).unwrap_err();
        assert!(matches!(err, SortError::Arity { expected: 1, found: 0, .. }));

        let err = sig
            .sort_of(&SmtTerm::app("held", vec![SmtTerm::int(3)]), &[])
            .unwrap_err();
        assert!(matches!(err, SortError::Mismatch { .. }));

        let err = sig
            .check_formula(&SmtTerm::var("x"), &[], "conjecture")
            .unwrap_err();
        assert_eq!(
            err,
            SortError::Mismatch {
                context: "conjecture".into(),
                expected: SmtSort::Bool,
                found: SmtSort::Int,
            }
        );
    }

    #[test]
    fn state_symbols_skip_rigid_ones() {
        let sig = lock_signature();
        let names: Vec<&str> = sig.state_symbols().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["x", "held"]);
    }
}
