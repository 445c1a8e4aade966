use ravel_ir::SortError;
use thiserror::Error;

use crate::graph::StateId;

/// Why an action body could not be turned into a transition relation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationErrorKind {
    #[error(transparent)]
    Sort(#[from] SortError),
    #[error("call to undeclared action '{0}'")]
    UnknownAction(String),
    #[error("recursive call to '{0}'")]
    Recursive(String),
    #[error("assignment to immutable symbol '{0}'")]
    ImmutableTarget(String),
    #[error("call to '{callee}' passes {found} argument(s), expected {expected}")]
    CallArity {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("assignment to '{target}' binds {found} parameter(s), expected {expected}")]
    AssignArity {
        target: String,
        expected: usize,
        found: usize,
    },
    #[error("choice with no branches")]
    EmptyChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("in action '{action}': {kind}")]
pub struct TranslationError {
    pub action: String,
    pub kind: TranslationErrorKind,
}

impl TranslationError {
    pub fn new(action: impl Into<String>, kind: impl Into<TranslationErrorKind>) -> Self {
        Self {
            action: action.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("the initial state has already been added")]
    InitialStateTwice,
    #[error("no initial state has been added")]
    NoInitialState,
    #[error("no state with id {0}")]
    UnknownState(StateId),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("translation error {0}")]
    Translation(#[from] TranslationError),
    /// A generated name shadows a declared symbol. Always a namespace bug.
    #[error("generated name '{0}' collides with a declared symbol")]
    NameCollision(String),
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),
    #[error("solver error: {0}")]
    Solver(String),
}
