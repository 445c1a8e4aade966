//! The analysis graph: symbolic states joined by action-labelled edges.

use std::fmt;

use ravel_ir::{ActionDecl, Program};
use ravel_smt::terms::SmtTerm;
use serde::Serialize;
use tracing::debug;

use crate::error::{EngineError, UsageError};
use crate::namespace::Namespace;
use crate::transrel::{TransitionBuilder, TransitionRelation, Vocabulary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StateId(pub usize);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EdgeId(pub usize);

/// A node of the graph. Never modified after creation.
#[derive(Debug, Clone)]
pub struct SymbolicState {
    pub id: StateId,
    /// Conjuncts this state adds to its predecessor's path formula.
    pub constraints: Vec<SmtTerm>,
    /// Live version of every state symbol.
    pub vocabulary: Vocabulary,
    pub predecessor: Option<StateId>,
    pub via: Option<EdgeId>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub from: StateId,
    pub to: StateId,
    pub label: String,
    pub relation: TransitionRelation,
}

/// Append-only record of a symbolic exploration of one program.
///
/// Every successor's path formula is its predecessor's plus the new
/// transition relation, so deeper states only ever strengthen the path.
pub struct AnalysisGraph<'p> {
    program: &'p Program,
    namespace: Namespace,
    states: Vec<SymbolicState>,
    edges: Vec<Edge>,
}

impl<'p> AnalysisGraph<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            namespace: Namespace::new(&program.signature),
            states: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }

    /// Create the root state constrained by `init_condition`. Allowed once.
    pub fn add_initial_state(&mut self, init_condition: SmtTerm) -> Result<StateId, UsageError> {
        if !self.states.is_empty() {
            return Err(UsageError::InitialStateTwice);
        }
        let id = StateId(0);
        self.states.push(SymbolicState {
            id,
            constraints: init_condition.conjuncts().into_iter().cloned().collect(),
            vocabulary: Vocabulary::root(&self.program.signature),
            predecessor: None,
            via: None,
        });
        debug!(state = %id, "added initial state");
        Ok(id)
    }

    /// Execute `action` from `frontier` (the newest state if `None`) and
    /// return the new state.
    pub fn execute(
        &mut self,
        action: &ActionDecl,
        args: Option<&[SmtTerm]>,
        frontier: Option<StateId>,
        label: &str,
    ) -> Result<StateId, EngineError> {
        let from = match frontier {
            Some(id) => self.state(id)?.id,
            None => self.latest().ok_or(UsageError::NoInitialState)?,
        };
        let pre = self.states[from.0].vocabulary.clone();
        let relation =
            TransitionBuilder::new(self.program, &mut self.namespace).build(action, args, &pre)?;

        let to = StateId(self.states.len());
        let via = EdgeId(self.edges.len());
        self.states.push(SymbolicState {
            id: to,
            constraints: relation.constraints.clone(),
            vocabulary: relation.post.clone(),
            predecessor: Some(from),
            via: Some(via),
        });
        self.edges.push(Edge {
            id: via,
            from,
            to,
            label: label.to_string(),
            relation,
        });
        debug!(from = %from, to = %to, label, "executed action");
        Ok(to)
    }

    pub fn state(&self, id: StateId) -> Result<&SymbolicState, UsageError> {
        self.states.get(id.0).ok_or(UsageError::UnknownState(id))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0)
    }

    pub fn latest(&self) -> Option<StateId> {
        self.states.last().map(|s| s.id)
    }

    pub fn states(&self) -> &[SymbolicState] {
        &self.states
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// States from the root to `id`, inclusive.
    pub fn trace(&self, id: StateId) -> Result<Vec<StateId>, UsageError> {
        let mut out = vec![self.state(id)?.id];
        let mut cursor = self.states[id.0].predecessor;
        while let Some(prev) = cursor {
            out.push(prev);
            cursor = self.states[prev.0].predecessor;
        }
        out.reverse();
        Ok(out)
    }

    /// Every conjunct of the path formula leading to `id`, root first.
    pub fn path_conjuncts(&self, id: StateId) -> Result<Vec<SmtTerm>, UsageError> {
        Ok(self
            .trace(id)?
            .into_iter()
            .flat_map(|s| self.states[s.0].constraints.iter().cloned())
            .collect())
    }

    pub fn path_formula(&self, id: StateId) -> Result<SmtTerm, UsageError> {
        Ok(SmtTerm::conjoin(self.path_conjuncts(id)?))
    }
}
