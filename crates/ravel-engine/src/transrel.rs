//! Translation of action bodies into transition relations.
//!
//! State symbols are versioned: a [`Vocabulary`] maps every mutable symbol
//! to the name of its current version. Translating an action starts from
//! the pre-state vocabulary and allocates a fresh version for each
//! assignment, so the relation only constrains what the action touches and
//! every untouched symbol keeps its pre-state name in the post-state.
//! Intermediate versions are implicitly existential: nothing outside the
//! relation mentions them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ravel_ir::{Action, ActionDecl, Program, Signature, SymbolDecl};
use ravel_smt::sorts::SmtSort;
use ravel_smt::terms::SmtTerm;
use tracing::debug;

use crate::error::{TranslationError, TranslationErrorKind};
use crate::namespace::Namespace;

/// Current version of every mutable symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vocabulary {
    versions: BTreeMap<String, String>,
}

impl Vocabulary {
    /// Every state symbol at its unversioned name.
    pub fn root(signature: &Signature) -> Self {
        Self {
            versions: signature
                .state_symbols()
                .map(|(name, _)| (name.clone(), name.clone()))
                .collect(),
        }
    }

    /// The live name of `symbol`. Rigid symbols are their own version.
    pub fn version<'a>(&'a self, symbol: &'a str) -> &'a str {
        self.versions.get(symbol).map(String::as_str).unwrap_or(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.versions.iter()
    }

    /// Symbols whose version differs from `other`.
    pub fn changed_from(&self, other: &Vocabulary) -> BTreeSet<String> {
        self.versions
            .iter()
            .filter(|(s, v)| other.version(s) != v.as_str())
            .map(|(s, _)| s.clone())
            .collect()
    }

    /// Rewrite a formula over declared symbols into this vocabulary.
    pub fn instantiate(&self, term: &SmtTerm) -> SmtTerm {
        term.rename_symbols(&self.renaming(&[]))
    }

    fn set(&mut self, symbol: &str, version: String) {
        self.versions.insert(symbol.to_string(), version);
    }

    /// Renaming into this vocabulary, skipping names shadowed by locals.
    fn renaming(&self, shadowed: &[&str]) -> HashMap<String, String> {
        self.versions
            .iter()
            .filter(|(s, v)| s != v && !shadowed.contains(&s.as_str()))
            .map(|(s, v)| (s.clone(), v.clone()))
            .collect()
    }
}

/// The logical effect of one action execution.
#[derive(Debug, Clone)]
pub struct TransitionRelation {
    pub action: String,
    pub pre: Vocabulary,
    pub post: Vocabulary,
    /// Conjuncts relating `pre` and `post` versions.
    pub constraints: Vec<SmtTerm>,
    /// Environment-chosen arguments, in allocation order.
    pub arguments: Vec<EnvArgument>,
    /// Every non-deterministic choice in the body, outermost first.
    pub choices: Vec<ChoicePoint>,
}

/// A parameter value left to the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvArgument {
    /// `action.param`
    pub param: String,
    pub constant: String,
    /// Outermost enclosing choice (index into `choices`) and the branch
    /// of it the argument belongs to.
    pub branch: Option<(usize, usize)>,
}

/// A non-deterministic choice and the branches it could take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePoint {
    /// Integer constant equal to the index of the taken branch. Absent
    /// when there is only one branch.
    pub selector: Option<String>,
    /// The callee for branches that are calls, `action[i]` otherwise.
    pub labels: Vec<String>,
}

impl ChoicePoint {
    /// Label of the branch with index `taken`.
    pub fn label(&self, taken: Option<usize>) -> Option<&str> {
        let index = match (&self.selector, taken) {
            (None, _) => 0,
            (Some(_), Some(i)) => i,
            (Some(_), None) => return None,
        };
        self.labels.get(index).map(String::as_str)
    }
}

impl TransitionRelation {
    pub fn formula(&self) -> SmtTerm {
        SmtTerm::conjoin(self.constraints.iter().cloned())
    }

    /// State symbols whose post version differs from the pre version.
    pub fn modified(&self) -> BTreeSet<String> {
        self.post.changed_from(&self.pre)
    }
}

/// Action parameters in scope, with the terms they stand for.
#[derive(Debug, Clone, Default)]
struct Env {
    sorts: Vec<(String, SmtSort)>,
    values: HashMap<String, SmtTerm>,
}

impl Env {
    fn bind(&mut self, name: &str, sort: &SmtSort, value: SmtTerm) {
        self.sorts.push((name.to_string(), sort.clone()));
        self.values.insert(name.to_string(), value);
    }
}

pub struct TransitionBuilder<'a> {
    program: &'a Program,
    namespace: &'a mut Namespace,
    stack: Vec<String>,
    arguments: Vec<EnvArgument>,
    choices: Vec<ChoicePoint>,
    within: Option<(usize, usize)>,
}

impl<'a> TransitionBuilder<'a> {
    pub fn new(program: &'a Program, namespace: &'a mut Namespace) -> Self {
        Self {
            program,
            namespace,
            stack: Vec::new(),
            arguments: Vec::new(),
            choices: Vec::new(),
            within: None,
        }
    }

    /// Translate `decl` starting from `pre`.
    ///
    /// `args` are terms over declared symbols, evaluated in `pre`. `None`
    /// lets the environment choose every parameter.
    pub fn build(
        &mut self,
        decl: &ActionDecl,
        args: Option<&[SmtTerm]>,
        pre: &Vocabulary,
    ) -> Result<TransitionRelation, TranslationError> {
        self.stack.clear();
        self.arguments.clear();
        self.choices.clear();
        self.within = None;

        let caller = Env::default();
        let env = self.bind_params(&decl.name, decl, args, &caller, pre, &decl.name)?;

        let mut post = pre.clone();
        let mut constraints = Vec::new();
        self.stack.push(decl.name.clone());
        self.exec(&decl.name, &decl.body, &env, &mut post, &mut constraints)?;
        self.stack.pop();

        debug!(
            action = %decl.name,
            constraints = constraints.len(),
            modified = post.changed_from(pre).len(),
            "built transition relation"
        );
        Ok(TransitionRelation {
            action: decl.name.clone(),
            pre: pre.clone(),
            post,
            constraints,
            arguments: std::mem::take(&mut self.arguments),
            choices: std::mem::take(&mut self.choices),
        })
    }

    fn signature(&self) -> &'a Signature {
        &self.program.signature
    }

    /// Bind the formals of `callee`, either to the caller's actuals or to
    /// fresh environment-chosen constants.
    fn bind_params(
        &mut self,
        caller_name: &str,
        callee: &ActionDecl,
        args: Option<&[SmtTerm]>,
        caller: &Env,
        vocab: &Vocabulary,
        label: &str,
    ) -> Result<Env, TranslationError> {
        let mut env = Env::default();
        match args {
            Some(args) => {
                if args.len() != callee.params.len() {
                    return Err(TranslationError::new(
                        caller_name,
                        TranslationErrorKind::CallArity {
                            callee: callee.name.clone(),
                            expected: callee.params.len(),
                            found: args.len(),
                        },
                    ));
                }
                for (arg, (param, sort)) in args.iter().zip(&callee.params) {
                    let value = self.expr(caller_name, arg, sort, caller, vocab)?;
                    env.bind(param, sort, value);
                }
            }
            None => {
                for (param, sort) in &callee.params {
                    self.signature()
                        .check_sort(sort)
                        .map_err(|e| TranslationError::new(callee.name.as_str(), e))?;
                    let constant = self.namespace.fresh_argument(label, param, sort);
                    self.arguments.push(EnvArgument {
                        param: format!("{label}.{param}"),
                        constant: constant.clone(),
                        branch: self.within,
                    });
                    env.bind(param, sort, SmtTerm::var(constant));
                }
            }
        }
        Ok(env)
    }

    fn exec(
        &mut self,
        action: &str,
        body: &Action,
        env: &Env,
        vocab: &mut Vocabulary,
        out: &mut Vec<SmtTerm>,
    ) -> Result<(), TranslationError> {
        match body {
            Action::Skip => Ok(()),
            Action::Assume(cond) => {
                let cond = self.expr(action, cond, &SmtSort::Bool, env, vocab)?;
                out.push(cond);
                Ok(())
            }
            Action::Assign {
                target,
                params,
                value,
            } => {
                let decl = self.mutable_target(action, target)?;
                if params.len() != decl.domain.len() {
                    return Err(TranslationError::new(
                        action,
                        TranslationErrorKind::AssignArity {
                            target: target.clone(),
                            expected: decl.domain.len(),
                            found: params.len(),
                        },
                    ));
                }
                if let Some(((param, sort), expected)) = params
                    .iter()
                    .zip(&decl.domain)
                    .find(|((_, sort), expected)| sort != *expected)
                {
                    return Err(TranslationError::new(
                        action,
                        ravel_ir::SortError::Mismatch {
                            context: format!("parameter '{param}' of '{target}'"),
                            expected: expected.clone(),
                            found: sort.clone(),
                        },
                    ));
                }
                // Parameter values go in after quantifying so that a value
                // mentioning a binder's name renames the binder instead.
                let value = self.open_expr(action, value, &decl.range, env, vocab, params)?;
                let next = self
                    .namespace
                    .fresh_version(target, &decl.domain, &decl.range);
                out.push(define(&next, params, value).substitute(&env.values));
                vocab.set(target, next);
                Ok(())
            }
            Action::Havoc { target } => {
                let decl = self.mutable_target(action, target)?;
                let next = self
                    .namespace
                    .fresh_version(target, &decl.domain, &decl.range);
                vocab.set(target, next);
                Ok(())
            }
            Action::Sequence(items) => {
                for item in items {
                    self.exec(action, item, env, vocab, out)?;
                }
                Ok(())
            }
            Action::If {
                guard,
                then,
                otherwise,
            } => {
                let guard = self.expr(action, guard, &SmtSort::Bool, env, vocab)?;
                let taken = self.branch(action, then, env, vocab)?;
                let skipped = match otherwise {
                    Some(otherwise) => self.branch(action, otherwise, env, vocab)?,
                    None => (vocab.clone(), Vec::new()),
                };
                self.merge(
                    vec![(guard.clone(), taken), (guard.negate(), skipped)],
                    vocab,
                    out,
                );
                Ok(())
            }
            Action::Choice(branches) => {
                if branches.is_empty() {
                    return Err(TranslationError::new(action, TranslationErrorKind::EmptyChoice));
                }
                let slot = self.choices.len();
                let selector = (branches.len() > 1).then(|| self.namespace.fresh_selector(action));
                let mut arms = Vec::with_capacity(branches.len());
                for (i, branch) in branches.iter().enumerate() {
                    let guard = match &selector {
                        Some(sel) => SmtTerm::var(sel.clone()).eq(SmtTerm::int(i as i64)),
                        None => SmtTerm::bool(true),
                    };
                    let outer = self.within;
                    self.within = outer.or(Some((slot, i)));
                    let arm = self.branch(action, branch, env, vocab);
                    self.within = outer;
                    arms.push((guard, arm?));
                }
                let labels = branches
                    .iter()
                    .enumerate()
                    .map(|(i, branch)| match branch {
                        Action::Call { callee, .. } => callee.clone(),
                        _ => format!("{action}[{i}]"),
                    })
                    .collect();
                self.choices.insert(slot, ChoicePoint { selector, labels });
                self.merge(arms, vocab, out);
                Ok(())
            }
            Action::Call { callee, args } => {
                let decl = self.program.action(callee).ok_or_else(|| {
                    TranslationError::new(
                        action,
                        TranslationErrorKind::UnknownAction(callee.clone()),
                    )
                })?;
                if self.stack.iter().any(|a| a == callee) {
                    return Err(TranslationError::new(
                        action,
                        TranslationErrorKind::Recursive(callee.clone()),
                    ));
                }
                let inner = self.bind_params(action, decl, args.as_deref(), env, vocab, callee)?;
                self.stack.push(callee.clone());
                let result = self.exec(callee, &decl.body, &inner, vocab, out);
                self.stack.pop();
                result
            }
        }
    }

    fn branch(
        &mut self,
        action: &str,
        body: &Action,
        env: &Env,
        vocab: &Vocabulary,
    ) -> Result<(Vocabulary, Vec<SmtTerm>), TranslationError> {
        let mut local = vocab.clone();
        let mut out = Vec::new();
        self.exec(action, body, env, &mut local, &mut out)?;
        Ok((local, out))
    }

    /// Join branches `(guard, (vocabulary, constraints))` into `vocab`.
    ///
    /// Any symbol some branch changed gets a merge version equated with
    /// that branch's version inside each disjunct.
    fn merge(
        &mut self,
        mut arms: Vec<(SmtTerm, (Vocabulary, Vec<SmtTerm>))>,
        vocab: &mut Vocabulary,
        out: &mut Vec<SmtTerm>,
    ) {
        if arms.len() == 1 {
            if let Some((guard, (local, constraints))) = arms.pop() {
                if guard != SmtTerm::bool(true) {
                    out.push(guard);
                }
                out.extend(constraints);
                *vocab = local;
            }
            return;
        }

        let base = vocab.clone();
        let changed: BTreeSet<String> = arms
            .iter()
            .flat_map(|(_, (local, _))| local.changed_from(&base))
            .collect();
        let mut merged = Vec::with_capacity(changed.len());
        for symbol in &changed {
            let Some(decl) = self.signature().symbol(symbol) else {
                continue;
            };
            let version = self
                .namespace
                .fresh_version(symbol, &decl.domain, &decl.range);
            merged.push((symbol.clone(), version, decl.domain.clone()));
        }

        let disjuncts = arms.into_iter().map(|(guard, (local, mut constraints))| {
            for (symbol, version, domain) in &merged {
                constraints.push(equate(version, local.version(symbol), domain));
            }
            SmtTerm::conjoin(std::iter::once(guard).chain(constraints))
        });
        out.push(SmtTerm::disjoin(disjuncts.collect::<Vec<_>>()));
        for (symbol, version, _) in merged {
            vocab.set(&symbol, version);
        }
    }

    fn mutable_target(&self, action: &str, target: &str) -> Result<&'a SymbolDecl, TranslationError> {
        let decl = self.signature().symbol(target).ok_or_else(|| {
            TranslationError::new(action, ravel_ir::SortError::UndeclaredSymbol(target.into()))
        })?;
        if !decl.mutable {
            return Err(TranslationError::new(
                action,
                TranslationErrorKind::ImmutableTarget(target.to_string()),
            ));
        }
        Ok(decl)
    }

    /// Sort-check `term` against `expected` and rewrite it into `vocab`,
    /// replacing parameters by their values.
    fn expr(
        &self,
        action: &str,
        term: &SmtTerm,
        expected: &SmtSort,
        env: &Env,
        vocab: &Vocabulary,
    ) -> Result<SmtTerm, TranslationError> {
        Ok(self
            .open_expr(action, term, expected, env, vocab, &[])?
            .substitute(&env.values))
    }

    /// Like [`Self::expr`] but leaves parameters free. `bound` are logical
    /// variables bound around the term (assignment parameters).
    fn open_expr(
        &self,
        action: &str,
        term: &SmtTerm,
        expected: &SmtSort,
        env: &Env,
        vocab: &Vocabulary,
        bound: &[(String, SmtSort)],
    ) -> Result<SmtTerm, TranslationError> {
        let mut scope = env.sorts.clone();
        scope.extend(bound.iter().cloned());
        self.signature()
            .expect_sort(term, &scope, expected, "expression")
            .map_err(|e| TranslationError::new(action, e))?;

        let shadowed: Vec<&str> = scope.iter().map(|(n, _)| n.as_str()).collect();
        Ok(term.rename_symbols(&vocab.renaming(&shadowed)))
    }
}

/// `name = value`, or `forall params. name(params) = value`.
fn define(name: &str, params: &[(String, SmtSort)], value: SmtTerm) -> SmtTerm {
    let args: Vec<SmtTerm> = params.iter().map(|(p, _)| SmtTerm::var(p.clone())).collect();
    SmtTerm::forall(params.to_vec(), apply(name, args).eq(value))
}

fn apply(name: &str, args: Vec<SmtTerm>) -> SmtTerm {
    if args.is_empty() {
        SmtTerm::var(name)
    } else {
        SmtTerm::app(name, args)
    }
}

/// Extensional equality of two versions of a symbol with `domain`.
fn equate(left: &str, right: &str, domain: &[SmtSort]) -> SmtTerm {
    let params: Vec<(String, SmtSort)> = domain
        .iter()
        .enumerate()
        .map(|(i, sort)| (format!("A{i}"), sort.clone()))
        .collect();
    let args: Vec<SmtTerm> = params.iter().map(|(p, _)| SmtTerm::var(p.clone())).collect();
    SmtTerm::forall(params, apply(left, args.clone()).eq(apply(right, args)))
}
