use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::sorts::SmtSort;

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmtTerm {
    /// Constant or bound-variable reference by name.
    Var(String),
    /// Application of a declared function or relation.
    App(String, Vec<SmtTerm>),
    /// Integer literal.
    IntLit(i64),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // Quantifiers
    ForAll(Vec<(String, SmtSort)>, Box<SmtTerm>),
    Exists(Vec<(String, SmtSort)>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn app(name: impl Into<String>, args: Vec<SmtTerm>) -> Self {
        SmtTerm::App(name.into(), args)
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    pub fn forall(binders: Vec<(String, SmtSort)>, body: SmtTerm) -> Self {
        if binders.is_empty() {
            body
        } else {
            SmtTerm::ForAll(binders, Box::new(body))
        }
    }

    pub fn exists(binders: Vec<(String, SmtSort)>, body: SmtTerm) -> Self {
        if binders.is_empty() {
            body
        } else {
            SmtTerm::Exists(binders, Box::new(body))
        }
    }

    /// Conjunction that flattens nested `And`s and drops `true` conjuncts.
    ///
    /// Any `false` conjunct collapses the whole result to `false`.
    pub fn conjoin(terms: impl IntoIterator<Item = SmtTerm>) -> Self {
        let mut out = Vec::new();
        for term in terms {
            match term {
                SmtTerm::BoolLit(true) => {}
                SmtTerm::BoolLit(false) => return SmtTerm::BoolLit(false),
                SmtTerm::And(inner) => match SmtTerm::conjoin(inner) {
                    SmtTerm::BoolLit(true) => {}
                    SmtTerm::BoolLit(false) => return SmtTerm::BoolLit(false),
                    SmtTerm::And(flat) => out.extend(flat),
                    other => out.push(other),
                },
                other => out.push(other),
            }
        }
        match out.len() {
            0 => SmtTerm::BoolLit(true),
            1 => out.pop().unwrap_or(SmtTerm::BoolLit(true)),
            _ => SmtTerm::And(out),
        }
    }

    /// Disjunction that flattens nested `Or`s and drops `false` disjuncts.
    pub fn disjoin(terms: impl IntoIterator<Item = SmtTerm>) -> Self {
        let mut out = Vec::new();
        for term in terms {
            match term {
                SmtTerm::BoolLit(false) => {}
                SmtTerm::BoolLit(true) => return SmtTerm::BoolLit(true),
                SmtTerm::Or(inner) => match SmtTerm::disjoin(inner) {
                    SmtTerm::BoolLit(false) => {}
                    SmtTerm::BoolLit(true) => return SmtTerm::BoolLit(true),
                    SmtTerm::Or(flat) => out.extend(flat),
                    other => out.push(other),
                },
                other => out.push(other),
            }
        }
        match out.len() {
            0 => SmtTerm::BoolLit(false),
            1 => out.pop().unwrap_or(SmtTerm::BoolLit(false)),
            _ => SmtTerm::Or(out),
        }
    }

    /// Negation that removes double negations and folds literals.
    pub fn negate(self) -> Self {
        match self {
            SmtTerm::Not(inner) => *inner,
            SmtTerm::BoolLit(b) => SmtTerm::BoolLit(!b),
            other => other.not(),
        }
    }

    /// Split a formula into its top-level conjuncts.
    pub fn conjuncts(&self) -> Vec<&SmtTerm> {
        match self {
            SmtTerm::And(terms) => terms.iter().flat_map(|t| t.conjuncts()).collect(),
            SmtTerm::BoolLit(true) => Vec::new(),
            other => vec![other],
        }
    }

    /// Names of constants and function heads occurring free in the term.
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut bound = Vec::new();
        collect_free(self, &mut bound, &mut out);
        out
    }

    /// Rename free constants and function heads according to `map`.
    ///
    /// Bound variables are left untouched, including when a binder shadows
    /// a name that `map` would otherwise rename.
    pub fn rename_symbols(&self, map: &HashMap<String, String>) -> SmtTerm {
        if map.is_empty() {
            return self.clone();
        }
        match self {
            SmtTerm::Var(name) => SmtTerm::Var(map.get(name).unwrap_or(name).clone()),
            SmtTerm::App(head, args) => SmtTerm::App(
                map.get(head).unwrap_or(head).clone(),
                args.iter().map(|a| a.rename_symbols(map)).collect(),
            ),
            SmtTerm::ForAll(binders, body) | SmtTerm::Exists(binders, body) => {
                let inner = shadowed(map, binders);
                let body = Box::new(body.rename_symbols(&inner));
                match self {
                    SmtTerm::ForAll(..) => SmtTerm::ForAll(binders.clone(), body),
                    _ => SmtTerm::Exists(binders.clone(), body),
                }
            }
            other => other.map_children(|child| child.rename_symbols(map)),
        }
    }

    /// Capture-avoiding substitution of free constants by terms.
    ///
    /// A binder whose name occurs free in one of the replacements is
    /// alpha-renamed before descending into its body.
    pub fn substitute(&self, map: &HashMap<String, SmtTerm>) -> SmtTerm {
        if map.is_empty() {
            return self.clone();
        }
        match self {
            SmtTerm::Var(name) => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            SmtTerm::ForAll(binders, body) | SmtTerm::Exists(binders, body) => {
                let mut inner: HashMap<String, SmtTerm> = map
                    .iter()
                    .filter(|(k, _)| !binders.iter().any(|(b, _)| b == *k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let captured: BTreeSet<String> =
                    inner.values().flat_map(|v| v.free_symbols()).collect();
                let mut taken = captured.clone();
                taken.extend(body.free_symbols());
                let mut new_binders = Vec::with_capacity(binders.len());
                for (name, sort) in binders {
                    if captured.contains(name) {
                        let mut k = 1usize;
                        let mut candidate = format!("{name}_{k}");
                        while taken.contains(&candidate) {
                            k += 1;
                            candidate = format!("{name}_{k}");
                        }
                        taken.insert(candidate.clone());
                        inner.insert(name.clone(), SmtTerm::Var(candidate.clone()));
                        new_binders.push((candidate, sort.clone()));
                    } else {
                        new_binders.push((name.clone(), sort.clone()));
                    }
                }
                let body = Box::new(body.substitute(&inner));
                match self {
                    SmtTerm::ForAll(..) => SmtTerm::ForAll(new_binders, body),
                    _ => SmtTerm::Exists(new_binders, body),
                }
            }
            other => other.map_children(|child| child.substitute(map)),
        }
    }

    /// Rebuild the term with `f` applied to every direct child.
    ///
    /// Binders are kept as-is; callers that care about scoping handle
    /// quantifiers before delegating here.
    pub fn map_children(&self, mut f: impl FnMut(&SmtTerm) -> SmtTerm) -> SmtTerm {
        let mut bx = |t: &SmtTerm| Box::new(f(t));
        match self {
            SmtTerm::Var(_) | SmtTerm::IntLit(_) | SmtTerm::BoolLit(_) => self.clone(),
            SmtTerm::App(head, args) => {
                SmtTerm::App(head.clone(), args.iter().map(|a| *bx(a)).collect())
            }
            SmtTerm::Add(l, r) => SmtTerm::Add(bx(l), bx(r)),
            SmtTerm::Sub(l, r) => SmtTerm::Sub(bx(l), bx(r)),
            SmtTerm::Mul(l, r) => SmtTerm::Mul(bx(l), bx(r)),
            SmtTerm::Eq(l, r) => SmtTerm::Eq(bx(l), bx(r)),
            SmtTerm::Lt(l, r) => SmtTerm::Lt(bx(l), bx(r)),
            SmtTerm::Le(l, r) => SmtTerm::Le(bx(l), bx(r)),
            SmtTerm::Gt(l, r) => SmtTerm::Gt(bx(l), bx(r)),
            SmtTerm::Ge(l, r) => SmtTerm::Ge(bx(l), bx(r)),
            SmtTerm::And(terms) => SmtTerm::And(terms.iter().map(|t| *bx(t)).collect()),
            SmtTerm::Or(terms) => SmtTerm::Or(terms.iter().map(|t| *bx(t)).collect()),
            SmtTerm::Not(inner) => SmtTerm::Not(bx(inner)),
            SmtTerm::Implies(l, r) => SmtTerm::Implies(bx(l), bx(r)),
            SmtTerm::ForAll(binders, body) => SmtTerm::ForAll(binders.clone(), bx(body)),
            SmtTerm::Exists(binders, body) => SmtTerm::Exists(binders.clone(), bx(body)),
            SmtTerm::Ite(c, t, e) => SmtTerm::Ite(bx(c), bx(t), bx(e)),
        }
    }

    /// Direct children of the term, in left-to-right order.
    pub fn children(&self) -> Vec<&SmtTerm> {
        match self {
            SmtTerm::Var(_) | SmtTerm::IntLit(_) | SmtTerm::BoolLit(_) => Vec::new(),
            SmtTerm::App(_, args) | SmtTerm::And(args) | SmtTerm::Or(args) => args.iter().collect(),
            SmtTerm::Add(l, r)
            | SmtTerm::Sub(l, r)
            | SmtTerm::Mul(l, r)
            | SmtTerm::Eq(l, r)
            | SmtTerm::Lt(l, r)
            | SmtTerm::Le(l, r)
            | SmtTerm::Gt(l, r)
            | SmtTerm::Ge(l, r)
            | SmtTerm::Implies(l, r) => vec![l.as_ref(), r.as_ref()],
            SmtTerm::Not(inner) => vec![inner.as_ref()],
            SmtTerm::ForAll(_, body) | SmtTerm::Exists(_, body) => vec![body.as_ref()],
            SmtTerm::Ite(c, t, e) => vec![c.as_ref(), t.as_ref(), e.as_ref()],
        }
    }
}

fn shadowed(map: &HashMap<String, String>, binders: &[(String, SmtSort)]) -> HashMap<String, String> {
    map.iter()
        .filter(|(k, _)| !binders.iter().any(|(b, _)| b == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn collect_free(term: &SmtTerm, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
    match term {
        SmtTerm::Var(name) => {
            if !bound.iter().any(|b| b == name) {
                out.insert(name.clone());
            }
        }
        SmtTerm::App(head, args) => {
            out.insert(head.clone());
            for arg in args {
                collect_free(arg, bound, out);
            }
        }
        SmtTerm::ForAll(binders, body) | SmtTerm::Exists(binders, body) => {
            let depth = bound.len();
            bound.extend(binders.iter().map(|(name, _)| name.clone()));
            collect_free(body, bound, out);
            bound.truncate(depth);
        }
        other => {
            for child in other.children() {
                collect_free(child, bound, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conjoin_flattens_and_drops_true() {
        let t = SmtTerm::conjoin(vec![
            SmtTerm::bool(true),
            SmtTerm::and(vec![SmtTerm::var("a"), SmtTerm::and(vec![SmtTerm::var("b")])]),
            SmtTerm::var("c"),
        ]);
        assert_eq!(
            t,
            SmtTerm::And(vec![SmtTerm::var("a"), SmtTerm::var("b"), SmtTerm::var("c")])
        );
        assert_eq!(SmtTerm::conjoin(Vec::new()), SmtTerm::bool(true));
        assert_eq!(
            SmtTerm::conjoin(vec![SmtTerm::var("a"), SmtTerm::bool(false)]),
            SmtTerm::bool(false)
        );
    }

    #[test]
    fn disjoin_of_single_term_is_the_term() {
        assert_eq!(
            SmtTerm::disjoin(vec![SmtTerm::bool(false), SmtTerm::var("p")]),
            SmtTerm::var("p")
        );
    }

    #[test]
    fn negate_removes_double_negation() {
        let p = SmtTerm::var("p");
        assert_eq!(p.clone().not().negate(), p);
        assert_eq!(SmtTerm::bool(true).negate(), SmtTerm::bool(false));
    }

    #[test]
    fn free_symbols_skip_bound_variables() {
        let t = SmtTerm::forall(
            vec![("X".into(), SmtSort::uninterpreted("node"))],
            SmtTerm::app("leader", vec![SmtTerm::var("X")]).implies(SmtTerm::var("X").eq(SmtTerm::var("n"))),
        );
        let free: Vec<String> = t.free_symbols().into_iter().collect();
        assert_eq!(free, vec!["leader".to_string(), "n".to_string()]);
    }

    #[test]
    fn rename_symbols_respects_shadowing() {
        let t = SmtTerm::and(vec![
            SmtTerm::var("x"),
            SmtTerm::exists(vec![("x".into(), SmtSort::Bool)], SmtTerm::var("x")),
            SmtTerm::app("r", vec![SmtTerm::var("x")]),
        ]);
        let map = HashMap::from([
            ("x".to_string(), "x#1".to_string()),
            ("r".to_string(), "r#2".to_string()),
        ]);
        let renamed = t.rename_symbols(&map);
        assert_eq!(
            renamed,
            SmtTerm::and(vec![
                SmtTerm::var("x#1"),
                SmtTerm::exists(vec![("x".into(), SmtSort::Bool)], SmtTerm::var("x")),
                SmtTerm::app("r#2", vec![SmtTerm::var("x#1")]),
            ])
        );
    }

    #[test]
    fn substitute_avoids_capture() {
        // forall Y. p(X, Y) with X := Y must not capture the free Y.
        let t = SmtTerm::forall(
            vec![("Y".into(), SmtSort::Int)],
            SmtTerm::app("p", vec![SmtTerm::var("X"), SmtTerm::var("Y")]),
        );
        let map = HashMap::from([("X".to_string(), SmtTerm::var("Y"))]);
        let out = t.substitute(&map);
        match out {
            SmtTerm::ForAll(binders, body) => {
                assert_eq!(binders, vec![("Y_1".to_string(), SmtSort::Int)]);
                assert_eq!(
                    *body,
                    SmtTerm::app("p", vec![SmtTerm::var("Y"), SmtTerm::var("Y_1")])
                );
            }
            other => panic!("expected forall, got {other:?}"),
        }
    }

    #[test]
    fn substitute_leaves_bound_occurrences() {
        let t = SmtTerm::exists(
            vec![("x".into(), SmtSort::Int)],
            SmtTerm::var("x").lt(SmtTerm::var("y")),
        );
        let map = HashMap::from([
            ("x".to_string(), SmtTerm::int(3)),
            ("y".to_string(), SmtTerm::int(4)),
        ]);
        assert_eq!(
            t.substitute(&map),
            SmtTerm::exists(
                vec![("x".into(), SmtSort::Int)],
                SmtTerm::var("x").lt(SmtTerm::int(4)),
            )
        );
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn arb_term() -> impl Strategy<Value = SmtTerm> {
            let leaf = prop_oneof![
                prop::sample::select(vec!["x", "y", "z"]).prop_map(SmtTerm::var),
                (-5i64..5).prop_map(SmtTerm::int),
            ];
            leaf.prop_recursive(4, 24, 3, |inner| {
                prop_oneof![
                    (inner.clone(), inner.clone()).prop_map(|(a, b)| a.add(b)),
                    (inner.clone(), inner.clone()).prop_map(|(a, b)| a.lt(b)),
                    prop::collection::vec(inner.clone(), 0..3).prop_map(SmtTerm::And),
                    inner.clone().prop_map(|t| SmtTerm::app("f", vec![t])),
                    inner.prop_map(|t| SmtTerm::exists(vec![("x".into(), SmtSort::Int)], t)),
                ]
            })
        }

        proptest! {
            #[test]
            fn renaming_round_trips_through_fresh_names(term in arb_term()) {
                let there = HashMap::from([
                    ("y".to_string(), "y#1".to_string()),
                    ("f".to_string(), "f#1".to_string()),
                ]);
                let back = HashMap::from([
                    ("y#1".to_string(), "y".to_string()),
                    ("f#1".to_string(), "f".to_string()),
                ]);
                prop_assert_eq!(term.rename_symbols(&there).rename_symbols(&back), term);
            }

            #[test]
            fn substituting_absent_symbol_is_identity(term in arb_term()) {
                let map = HashMap::from([("absent".to_string(), SmtTerm::int(9))]);
                prop_assert_eq!(term.substitute(&map), term);
            }

            #[test]
            fn renamed_free_symbols_follow_the_map(term in arb_term()) {
                let map = HashMap::from([("z".to_string(), "z#7".to_string())]);
                let renamed = term.rename_symbols(&map).free_symbols();
                prop_assert!(!renamed.contains("z"));
                prop_assert_eq!(
                    renamed.contains("z#7"),
                    term.free_symbols().contains("z")
                );
            }
        }
    }
}
