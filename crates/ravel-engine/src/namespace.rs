//! Per-run allocation of engine-generated symbol names.
//!
//! Every name the engine invents (state versions, environment-chosen
//! arguments, witnesses, indicators, choice selectors) comes from one
//! [`Namespace`], seeded with the program's declared sorts and symbols.
//! Names are never reused within a run, and a namespace is never shared
//! between runs.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use ravel_ir::Signature;
use ravel_smt::sorts::SmtSort;

use crate::error::EngineError;

/// What an allocated symbol stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOrigin {
    /// A new version of a state symbol.
    Version { symbol: String },
    /// An argument chosen by the environment for an action call.
    Argument { action: String, param: String },
    /// A Skolem constant for a universally quantified conjecture variable.
    Witness { variable: String },
    /// Marks which conjecture a model violates.
    Indicator { conjecture: String },
    /// Index of the branch taken at a non-deterministic choice.
    Selector { action: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedSymbol {
    pub domain: Vec<SmtSort>,
    pub range: SmtSort,
    pub origin: SymbolOrigin,
}

#[derive(Debug, Clone)]
pub struct Namespace {
    declared: HashSet<String>,
    taken: HashSet<String>,
    counters: HashMap<String, usize>,
    allocated: IndexMap<String, AllocatedSymbol>,
}

impl Namespace {
    pub fn new(signature: &Signature) -> Self {
        let declared: HashSet<String> = signature
            .sorts
            .iter()
            .chain(signature.symbols.keys())
            .cloned()
            .collect();
        Self {
            taken: declared.clone(),
            declared,
            counters: HashMap::new(),
            allocated: IndexMap::new(),
        }
    }

    /// True if `name` is declared or was already handed out.
    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    pub fn allocated(&self) -> impl Iterator<Item = (&String, &AllocatedSymbol)> {
        self.allocated.iter()
    }

    pub fn get(&self, name: &str) -> Option<&AllocatedSymbol> {
        self.allocated.get(name)
    }

    /// `symbol#n`, the next version of a state symbol.
    pub fn fresh_version(&mut self, symbol: &str, domain: &[SmtSort], range: &SmtSort) -> String {
        let name = self.next(symbol);
        self.record(
            &name,
            domain.to_vec(),
            range.clone(),
            SymbolOrigin::Version {
                symbol: symbol.to_string(),
            },
        );
        name
    }

    /// `action.param#n`, an argument picked by the environment.
    pub fn fresh_argument(&mut self, action: &str, param: &str, sort: &SmtSort) -> String {
        let name = self.next(&format!("{action}.{param}"));
        self.record(
            &name,
            Vec::new(),
            sort.clone(),
            SymbolOrigin::Argument {
                action: action.to_string(),
                param: param.to_string(),
            },
        );
        name
    }

    /// `@var`, then `@var#1`, `@var#2`, ... on later requests.
    ///
    /// Fails if the base name `@var` is itself a declared symbol: the
    /// witness would shadow it.
    pub fn fresh_witness(&mut self, variable: &str, sort: &SmtSort) -> Result<String, EngineError> {
        let base = format!("@{variable}");
        if self.declared.contains(&base) {
            return Err(EngineError::NameCollision(base));
        }
        let name = if self.taken.contains(&base) {
            self.next(&base)
        } else {
            base
        };
        self.record(
            &name,
            Vec::new(),
            sort.clone(),
            SymbolOrigin::Witness {
                variable: variable.to_string(),
            },
        );
        Ok(name)
    }

    pub fn fresh_indicator(&mut self, conjecture: &str) -> String {
        let name = self.next("@violated");
        self.record(
            &name,
            Vec::new(),
            SmtSort::Bool,
            SymbolOrigin::Indicator {
                conjecture: conjecture.to_string(),
            },
        );
        name
    }

    /// `@choice#n`, an integer naming the branch a choice in `action` took.
    pub fn fresh_selector(&mut self, action: &str) -> String {
        let name = self.next("@choice");
        self.record(
            &name,
            Vec::new(),
            SmtSort::Int,
            SymbolOrigin::Selector {
                action: action.to_string(),
            },
        );
        name
    }

    fn next(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{base}#{counter}");
            if !self.taken.contains(&candidate) {
                return candidate;
            }
        }
    }

    fn record(&mut self, name: &str, domain: Vec<SmtSort>, range: SmtSort, origin: SymbolOrigin) {
        self.taken.insert(name.to_string());
        self.allocated.insert(
            name.to_string(),
            AllocatedSymbol {
                domain,
                range,
                origin,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravel_ir::SymbolDecl;

    fn signature() -> Signature {
        Signature::new()
            .with_sort("node")
            .with_symbol("x", SymbolDecl::state(vec![], SmtSort::Int))
            .with_symbol("x#1", SymbolDecl::state(vec![], SmtSort::Int))
    }

    #[test]
    fn versions_skip_declared_names() {
        let mut ns = Namespace::new(&signature());
        assert_eq!(ns.fresh_version("x", &[], &SmtSort::Int), "x#2");
        assert_eq!(ns.fresh_version("x", &[], &SmtSort::Int), "x#3");
        assert!(ns.is_taken("x#3"));
        assert_eq!(
            ns.get("x#2").map(|s| &s.origin),
            Some(&SymbolOrigin::Version { symbol: "x".into() })
        );
    }

    #[test]
    fn arguments_are_qualified_by_action() {
        let mut ns = Namespace::new(&signature());
        let node = SmtSort::uninterpreted("node");
        assert_eq!(ns.fresh_argument("grant", "n", &node), "grant.n#1");
        assert_eq!(ns.fresh_argument("grant", "n", &node), "grant.n#2");
        assert_eq!(ns.fresh_argument("release", "n", &node), "release.n#1");
    }

    #[test]
    fn selectors_are_integers_counted_per_run() {
        let mut ns = Namespace::new(&signature());
        assert_eq!(ns.fresh_selector("ext"), "@choice#1");
        assert_eq!(ns.fresh_selector("ext"), "@choice#2");
        let allocated = ns.get("@choice#2").unwrap();
        assert_eq!(allocated.range, SmtSort::Int);
        assert_eq!(
            allocated.origin,
            SymbolOrigin::Selector {
                action: "ext".into()
            }
        );
    }

    #[test]
    fn witnesses_are_never_reused() {
        let mut ns = Namespace::new(&signature());
        let a = ns.fresh_witness("N", &SmtSort::Int).unwrap();
        let b = ns.fresh_witness("N", &SmtSort::Int).unwrap();
        assert_eq!(a, "@N");
        assert_eq!(b, "@N#1");
    }

    #[test]
    fn witness_colliding_with_declared_symbol_is_fatal() {
        let sig = signature().with_symbol("@N", SymbolDecl::rigid(vec![], SmtSort::Int));
        let mut ns = Namespace::new(&sig);
        let err = ns.fresh_witness("N", &SmtSort::Int).unwrap_err();
        assert!(matches!(err, EngineError::NameCollision(name) if name == "@N"));
    }
}
