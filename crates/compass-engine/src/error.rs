use serde::{Deserialize, Serialize};

use compass_core::errors::GenerationError;
use compass_store::StoreError;

/// A part of the wants intake that blocks completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPart {
    Stream,
    FutureSelf,
    Reverse,
    Envy,
    Regrets,
    Plan5y,
}

impl std::fmt::Display for MissingPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::FutureSelf => write!(f, "future_self"),
            Self::Reverse => write!(f, "reverse"),
            Self::Envy => write!(f, "envy"),
            Self::Regrets => write!(f, "regrets"),
            Self::Plan5y => write!(f, "plan_5y"),
        }
    }
}

/// Service-boundary error taxonomy. Every failure is scoped to one request
/// and one owner's data; nothing here is fatal at the process level.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("completed record is immutable")]
    Immutable,

    #[error("not ready: missing {}", format_missing(.0))]
    NotReady(Vec<MissingPart>),

    #[error("ritual already completed for this slot")]
    AlreadyCompleted,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

fn format_missing(parts: &[MissingPart]) -> String {
    parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
