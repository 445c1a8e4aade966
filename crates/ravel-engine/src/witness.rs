//! Skolem witnesses and the dual (negated) clause of a conjecture set.

use std::collections::HashMap;

use ravel_ir::Conjecture;
use ravel_smt::sorts::SmtSort;
use ravel_smt::terms::SmtTerm;
use serde::Serialize;

use crate::error::EngineError;
use crate::namespace::Namespace;
use crate::transrel::Vocabulary;

/// A fresh constant standing for a universally quantified variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Witness {
    pub name: String,
    pub variable: String,
    pub sort: SmtSort,
}

/// Allocate the witness for `variable`.
pub fn witness(
    namespace: &mut Namespace,
    variable: &str,
    sort: &SmtSort,
) -> Result<Witness, EngineError> {
    let name = namespace.fresh_witness(variable, sort)?;
    Ok(Witness {
        name,
        variable: variable.to_string(),
        sort: sort.clone(),
    })
}

/// The negation of one conjecture, with its leading universals skolemized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualPart {
    pub conjecture: String,
    /// Boolean constant that holds in a model violating this conjecture.
    pub indicator: String,
    /// Negated conjecture over declared symbols and witnesses.
    pub negated: SmtTerm,
    pub witnesses: Vec<Witness>,
}

/// Negation of a whole conjecture set, one part per conjecture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DualClause {
    pub parts: Vec<DualPart>,
}

impl DualClause {
    pub fn build(
        conjectures: &[Conjecture],
        namespace: &mut Namespace,
    ) -> Result<Self, EngineError> {
        let mut parts = Vec::with_capacity(conjectures.len());
        for conj in conjectures {
            let mut witnesses = Vec::new();
            let negated = skolemize(&conj.formula, false, namespace, &mut witnesses)?;
            let indicator = namespace.fresh_indicator(&conj.name);
            parts.push(DualPart {
                conjecture: conj.name.clone(),
                indicator,
                negated,
                witnesses,
            });
        }
        Ok(Self { parts })
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Some indicator holds, and each indicator implies its negated
    /// conjecture in `vocab`.
    pub fn formula(&self, vocab: &Vocabulary) -> SmtTerm {
        let some = SmtTerm::disjoin(self.parts.iter().map(|p| SmtTerm::var(p.indicator.clone())));
        SmtTerm::conjoin(std::iter::once(some).chain(self.parts.iter().map(|p| {
            SmtTerm::var(p.indicator.clone()).implies(vocab.instantiate(&p.negated))
        })))
    }

    /// The negation of a single part in `vocab`.
    pub fn part_formula(&self, index: usize, vocab: &Vocabulary) -> Option<SmtTerm> {
        self.parts.get(index).map(|p| vocab.instantiate(&p.negated))
    }

    pub fn witnesses(&self) -> impl Iterator<Item = &Witness> {
        self.parts.iter().flat_map(|p| p.witnesses.iter())
    }
}

/// Negate (when `positive` is false) and push the negation inwards,
/// replacing every universal that becomes existential, and every existential
/// that stays one, with witnesses. Stops at quantifiers that would remain
/// universal.
fn skolemize(
    term: &SmtTerm,
    positive: bool,
    namespace: &mut Namespace,
    witnesses: &mut Vec<Witness>,
) -> Result<SmtTerm, EngineError> {
    match (term, positive) {
        (SmtTerm::ForAll(binders, body), false) | (SmtTerm::Exists(binders, body), true) => {
            let mut map = HashMap::new();
            for (var, sort) in binders {
                let w = witness(namespace, var, sort)?;
                map.insert(var.clone(), SmtTerm::var(w.name.clone()));
                witnesses.push(w);
            }
            skolemize(&body.substitute(&map), positive, namespace, witnesses)
        }
        (SmtTerm::Not(inner), _) => skolemize(inner, !positive, namespace, witnesses),
        (SmtTerm::And(items), true) | (SmtTerm::Or(items), false) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(skolemize(item, positive, namespace, witnesses)?);
            }
            Ok(SmtTerm::conjoin(out))
        }
        (SmtTerm::Or(items), true) | (SmtTerm::And(items), false) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(skolemize(item, positive, namespace, witnesses)?);
            }
            Ok(SmtTerm::disjoin(out))
        }
        (SmtTerm::Implies(lhs, rhs), false) => {
            let lhs = skolemize(lhs, true, namespace, witnesses)?;
            let rhs = skolemize(rhs, false, namespace, witnesses)?;
            Ok(SmtTerm::conjoin([lhs, rhs]))
        }
        (other, true) => Ok(other.clone()),
        (other, false) => Ok(other.clone().negate()),
    }
}
