//! Engine error types

use crate::dice::FormulaError;
use crate::host::{LedgerError, StoreError};
use sheet_core::RecordError;
use thiserror::Error;

/// Missing or inconsistent input from the invoking participant
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("unknown combatant: {0}")]
    UnknownCombatant(String),

    #[error("unknown opposed test: {0}")]
    UnknownTest(String),

    #[error("an opposed test needs at least one defender")]
    NoDefenders,

    #[error("test {test_id} has no defender #{index}")]
    UnknownDefender { test_id: String, index: usize },

    #[error("{participant} cannot commit a {choice} choice")]
    ChoiceMismatch {
        participant: String,
        choice: &'static str,
    },

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

#[derive(Debug, Error)]
pub enum ContestError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("{actor} cannot attack while {condition}")]
    ConditionBlocked { actor: String, condition: String },

    #[error("{actor} has {available} {resource}, needs {needed}")]
    ResourceInsufficient {
        actor: String,
        resource: String,
        needed: f64,
        available: f64,
    },

    #[error("malformed record: {0}")]
    Record(#[from] RecordError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("test record could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<LedgerError> for ContestError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Insufficient {
                actor,
                resource,
                needed,
                available,
            } => ContestError::ResourceInsufficient {
                actor,
                resource,
                needed,
                available,
            },
            LedgerError::Store(err) => ContestError::Store(err),
        }
    }
}

impl ContestError {
    pub fn is_input(&self) -> bool {
        matches!(self, ContestError::Input(_))
    }

    pub fn is_resource_insufficient(&self) -> bool {
        matches!(self, ContestError::ResourceInsufficient { .. })
    }
}

pub type Result<T> = std::result::Result<T, ContestError>;
