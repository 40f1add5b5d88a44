//! Host collaborators - document store, resource ledger, condition registry
//!
//! The engine never owns persistence. Hosts plug in implementations of these
//! traits; [`MemoryStore`] with [`StoreLedger`] and [`StoreConditions`] cover
//! tests and local runs.

mod locks;
mod memory;

pub use locks::KeyedLocks;
pub use memory::{MemoryStore, StoreConditions, StoreLedger};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sheet_core::RecordError;
use std::fmt;
use thiserror::Error;

/// Record collections the engine reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Combatants,
    Tests,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Combatants => write!(f, "combatants"),
            Collection::Tests => write!(f, "tests"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    #[error("malformed record: {0}")]
    Record(#[from] RecordError),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Schemaless key-value document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;

    async fn put(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{actor} has {available} {resource}, needs {needed}")]
    Insufficient {
        actor: String,
        resource: String,
        needed: f64,
        available: f64,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Action economy: spend or refund named resources
#[async_trait]
pub trait ResourceLedger: Send + Sync {
    async fn available(&self, actor: &str, resource: &str) -> Result<f64, LedgerError>;

    /// Deduct `amount`, refusing without change when the actor cannot afford it.
    /// Returns the remaining amount.
    async fn spend(&self, actor: &str, resource: &str, amount: f64) -> Result<f64, LedgerError>;

    async fn refund(&self, actor: &str, resource: &str, amount: f64) -> Result<f64, LedgerError>;
}

/// Status lookups the engine consults but does not own
#[async_trait]
pub trait ConditionRegistry: Send + Sync {
    async fn has(&self, actor: &str, condition: &str) -> Result<bool, StoreError>;

    /// Returns false when the condition was already present
    async fn add(&self, actor: &str, condition: &str) -> Result<bool, StoreError>;

    /// Returns false when the condition was not present
    async fn remove(&self, actor: &str, condition: &str) -> Result<bool, StoreError>;
}
