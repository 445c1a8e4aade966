use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use ravel_smt::sorts::SmtSort;
use ravel_smt::terms::SmtTerm;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{Action, ActionDecl};
use crate::signature::{is_user_identifier, Signature, SortError};

/// Name of the optional action run once before the first step.
pub const INITIALIZER: &str = "initialize";

/// Label of the step pseudo-action built from the exported actions.
pub const STEP_LABEL: &str = "ext";

/// A named safety property, closed over the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conjecture {
    pub name: String,
    pub formula: SmtTerm,
}

impl Conjecture {
    pub fn new(name: impl Into<String>, formula: SmtTerm) -> Self {
        Self {
            name: name.into(),
            formula,
        }
    }
}

/// A complete specification ready for checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub name: String,
    pub signature: Signature,
    /// Background facts about rigid symbols, assumed in every state.
    #[serde(default)]
    pub axioms: Vec<SmtTerm>,
    /// Conjuncts of the initial-state condition.
    #[serde(default)]
    pub init: Vec<SmtTerm>,
    #[serde(default)]
    pub actions: Vec<ActionDecl>,
    /// Actions the environment may invoke in one step.
    #[serde(default)]
    pub exported: Vec<String>,
    #[serde(default)]
    pub conjectures: Vec<Conjecture>,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid identifier '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier(String),
    #[error("duplicate declaration of '{0}'")]
    Duplicate(String),
    #[error("exported action '{0}' is not declared")]
    UnknownExport(String),
    #[error("action '{caller}' calls undeclared action '{callee}'")]
    UnknownCallee { caller: String, callee: String },
    #[error("action '{0}' is recursive")]
    Recursive(String),
    #[error("action '{action}' assigns immutable symbol '{symbol}'")]
    ImmutableTarget { action: String, symbol: String },
    #[error("action '{action}': {detail}")]
    MalformedAction { action: String, detail: String },
    #[error("axiom #{index} mentions state symbol '{symbol}'")]
    AxiomOverState { index: usize, symbol: String },
    #[error("{context}: {source}")]
    Sort {
        context: String,
        #[source]
        source: SortError,
    },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed program: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read and decode a JSON program. The result is not yet validated.
pub fn load_program(path: impl AsRef<Path>) -> Result<Program, LoadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Program::from_json(&text)
}

impl Program {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            signature,
            axioms: Vec::new(),
            init: Vec::new(),
            actions: Vec::new(),
            exported: Vec::new(),
            conjectures: Vec::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn action(&self, name: &str) -> Option<&ActionDecl> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn initializer(&self) -> Option<&ActionDecl> {
        self.action(INITIALIZER)
    }

    pub fn initial_condition(&self) -> SmtTerm {
        SmtTerm::conjoin(self.init.iter().cloned())
    }

    /// One environment step: a non-deterministic choice among the exported
    /// actions, each with environment-chosen arguments. Stutters when
    /// nothing is exported.
    pub fn step_action(&self) -> ActionDecl {
        let body = if self.exported.is_empty() {
            Action::Skip
        } else {
            Action::Choice(self.exported.iter().map(Action::call).collect())
        };
        ActionDecl::new(STEP_LABEL, Vec::new(), body)
    }

    /// Check the program is well-formed before it reaches the engine.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let sig = &self.signature;

        let mut seen = BTreeSet::new();
        for sort in &sig.sorts {
            ident(sort)?;
            if !seen.insert(sort.as_str()) {
                return Err(ValidationError::Duplicate(sort.clone()));
            }
        }
        for (name, decl) in &sig.symbols {
            ident(name)?;
            if !seen.insert(name.as_str()) {
                return Err(ValidationError::Duplicate(name.clone()));
            }
            for sort in decl.domain.iter().chain(std::iter::once(&decl.range)) {
                sig.check_sort(sort).map_err(|source| ValidationError::Sort {
                    context: format!("declaration of '{name}'"),
                    source,
                })?;
            }
        }

        for (i, axiom) in self.axioms.iter().enumerate() {
            formula(sig, axiom, &format!("axiom #{i}"))?;
            let state = axiom
                .free_symbols()
                .into_iter()
                .find(|s| sig.symbol(s).is_some_and(|d| d.mutable));
            if let Some(symbol) = state {
                return Err(ValidationError::AxiomOverState { index: i, symbol });
            }
        }
        for (i, conjunct) in self.init.iter().enumerate() {
            formula(sig, conjunct, &format!("initial condition #{i}"))?;
        }
        let mut names = BTreeSet::new();
        for conj in &self.conjectures {
            if !names.insert(conj.name.as_str()) {
                return Err(ValidationError::Duplicate(conj.name.clone()));
            }
            formula(sig, &conj.formula, &format!("conjecture '{}'", conj.name))?;
        }

        let mut by_name: HashMap<&str, &ActionDecl> = HashMap::new();
        for decl in &self.actions {
            ident(&decl.name)?;
            if by_name.insert(decl.name.as_str(), decl).is_some() {
                return Err(ValidationError::Duplicate(decl.name.clone()));
            }
        }
        for decl in &self.actions {
            let mut locals = Vec::new();
            for (param, sort) in &decl.params {
                ident(param)?;
                sig.check_sort(sort).map_err(|source| ValidationError::Sort {
                    context: format!("parameter '{param}' of '{}'", decl.name),
                    source,
                })?;
                locals.push((param.clone(), sort.clone()));
            }
            check_body(sig, &by_name, &decl.name, &decl.body, &mut locals)?;
        }
        if let Some(init) = self.initializer() {
            if !init.params.is_empty() {
                return Err(ValidationError::MalformedAction {
                    action: INITIALIZER.into(),
                    detail: "must not take parameters".into(),
                });
            }
        }
        for name in &self.exported {
            if !by_name.contains_key(name.as_str()) {
                return Err(ValidationError::UnknownExport(name.clone()));
            }
        }
        check_acyclic(&self.actions, &by_name)
    }
}

fn ident(name: &str) -> Result<(), ValidationError> {
    if is_user_identifier(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier(name.to_string()))
    }
}

/// A closed Bool formula whose binders are user identifiers.
fn formula(sig: &Signature, term: &SmtTerm, context: &str) -> Result<(), ValidationError> {
    sig.check_formula(term, &[], context)
        .map_err(|source| ValidationError::Sort {
            context: context.to_string(),
            source,
        })?;
    binders_are_identifiers(term)
}

fn binders_are_identifiers(term: &SmtTerm) -> Result<(), ValidationError> {
    if let SmtTerm::ForAll(binders, _) | SmtTerm::Exists(binders, _) = term {
        for (name, _) in binders {
            ident(name)?;
        }
    }
    term.children().into_iter().try_for_each(binders_are_identifiers)
}

fn check_body(
    sig: &Signature,
    actions: &HashMap<&str, &ActionDecl>,
    action: &str,
    body: &Action,
    locals: &mut Vec<(String, SmtSort)>,
) -> Result<(), ValidationError> {
    let sort_err = |what: &str| {
        let context = format!("action '{action}', {what}");
        move |source: SortError| ValidationError::Sort { context, source }
    };
    let malformed = |detail: String| ValidationError::MalformedAction {
        action: action.to_string(),
        detail,
    };

    match body {
        Action::Skip => Ok(()),
        Action::Assign {
            target,
            params,
            value,
        } => {
            let decl = mutable_target(sig, action, target)?;
            if params.len() != decl.domain.len() {
                return Err(malformed(format!(
                    "assignment to '{target}' binds {} parameter(s), expected {}",
                    params.len(),
                    decl.domain.len()
                )));
            }
            for ((param, sort), expected) in params.iter().zip(&decl.domain) {
                ident(param)?;
                if sort != expected {
                    return Err(malformed(format!(
                        "parameter '{param}' of '{target}' has sort {sort}, expected {expected}"
                    )));
                }
            }
            let depth = locals.len();
            locals.extend(params.iter().cloned());
            let result = sig
                .expect_sort(value, locals, &decl.range, &format!("assignment to '{target}'"))
                .map_err(sort_err("assignment"));
            locals.truncate(depth);
            result?;
            binders_are_identifiers(value)
        }
        Action::Havoc { target } => mutable_target(sig, action, target).map(|_| ()),
        Action::Assume(cond) => {
            sig.check_formula(cond, locals, "assumption")
                .map_err(sort_err("assumption"))?;
            binders_are_identifiers(cond)
        }
        Action::Sequence(items) => items
            .iter()
            .try_for_each(|item| check_body(sig, actions, action, item, locals)),
        Action::Choice(items) => {
            if items.is_empty() {
                return Err(malformed("choice with no branches".into()));
            }
            items
                .iter()
                .try_for_each(|item| check_body(sig, actions, action, item, locals))
        }
        Action::If {
            guard,
            then,
            otherwise,
        } => {
            sig.check_formula(guard, locals, "guard")
                .map_err(sort_err("guard"))?;
            binders_are_identifiers(guard)?;
            check_body(sig, actions, action, then, locals)?;
            match otherwise {
                Some(otherwise) => check_body(sig, actions, action, otherwise, locals),
                None => Ok(()),
            }
        }
        Action::Call { callee, args } => {
            let decl = actions
                .get(callee.as_str())
                .ok_or_else(|| ValidationError::UnknownCallee {
                    caller: action.to_string(),
                    callee: callee.clone(),
                })?;
            let Some(args) = args else {
                return Ok(());
            };
            if args.len() != decl.params.len() {
                return Err(malformed(format!(
                    "call to '{callee}' passes {} argument(s), expected {}",
                    args.len(),
                    decl.params.len()
                )));
            }
            for (arg, (param, sort)) in args.iter().zip(&decl.params) {
                sig.expect_sort(arg, locals, sort, &format!("argument '{param}' of '{callee}'"))
                    .map_err(sort_err("call"))?;
            }
            Ok(())
        }
    }
}

fn mutable_target<'a>(
    sig: &'a Signature,
    action: &str,
    target: &str,
) -> Result<&'a crate::signature::SymbolDecl, ValidationError> {
    let decl = sig.symbol(target).ok_or_else(|| ValidationError::Sort {
        context: format!("action '{action}'"),
        source: SortError::UndeclaredSymbol(target.to_string()),
    })?;
    if !decl.mutable {
        return Err(ValidationError::ImmutableTarget {
            action: action.to_string(),
            symbol: target.to_string(),
        });
    }
    Ok(decl)
}

fn check_acyclic(
    decls: &[ActionDecl],
    by_name: &HashMap<&str, &ActionDecl>,
) -> Result<(), ValidationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }

    fn visit<'a>(
        name: &'a str,
        by_name: &HashMap<&'a str, &'a ActionDecl>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Result<(), ValidationError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Active) => return Err(ValidationError::Recursive(name.to_string())),
            None => {}
        }
        marks.insert(name, Mark::Active);
        if let Some(decl) = by_name.get(name) {
            for callee in decl.body.callees() {
                if let Some((key, _)) = by_name.get_key_value(callee.as_str()) {
                    visit(*key, by_name, marks)?;
                }
            }
        }
        marks.insert(name, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for decl in decls {
        visit(decl.name.as_str(), by_name, &mut marks)?;
    }
    Ok(())
}
