use serde::{Deserialize, Serialize};

/// SMT sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SmtSort {
    Bool,
    Int,
    /// A declared uninterpreted sort, e.g. `node`.
    Uninterpreted(String),
}

impl SmtSort {
    pub fn uninterpreted(name: impl Into<String>) -> Self {
        SmtSort::Uninterpreted(name.into())
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, SmtSort::Bool)
    }
}

impl std::fmt::Display for SmtSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Int => write!(f, "Int"),
            SmtSort::Uninterpreted(name) => write!(f, "{name}"),
        }
    }
}
