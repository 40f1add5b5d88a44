//! In-memory store and store-backed ledger/conditions for tests and local runs

use super::{Collection, ConditionRegistry, DocumentStore, KeyedLocks, LedgerError, ResourceLedger, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use sheet_core::coerce::coerce_number;
use sheet_core::{write_resource, write_statuses};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of DocumentStore
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(Collection, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a combatant record keyed by its `id` field
    pub async fn insert_combatant(&self, record: Value) -> Result<(), StoreError> {
        let id = sheet_core::coerce::string_field(&record, "id")
            .ok_or(StoreError::Record(sheet_core::RecordError::MissingId))?;
        self.put(Collection::Combatants, &id, record).await
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.records.read().await.get(&(collection, id.to_string())).cloned())
    }

    async fn put(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert((collection, id.to_string()), record);
        Ok(())
    }
}

async fn load_combatant(store: &dyn DocumentStore, actor: &str) -> Result<Value, StoreError> {
    store
        .get(Collection::Combatants, actor)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            collection: Collection::Combatants,
            id: actor.to_string(),
        })
}

fn pool_value(record: &Value, resource: &str) -> f64 {
    coerce_number(record.get("resources").and_then(|r| r.get(resource)))
}

fn pool_max(record: &Value, resource: &str) -> Option<f64> {
    match record.get("resources").and_then(|r| r.get(resource)) {
        Some(Value::Object(pool)) if pool.contains_key("max") => Some(coerce_number(pool.get("max"))),
        _ => None,
    }
}

/// Resource ledger over combatant records (`resources.<name>`)
///
/// Read-modify-write cycles hold the combatant's record lock, so two spends
/// cannot both pass the availability check and writers sharing the same
/// [`KeyedLocks`] never overwrite each other.
pub struct StoreLedger {
    store: Arc<dyn DocumentStore>,
    records: Arc<KeyedLocks>,
}

impl StoreLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_locks(store, Arc::new(KeyedLocks::new()))
    }

    pub fn with_locks(store: Arc<dyn DocumentStore>, records: Arc<KeyedLocks>) -> Self {
        StoreLedger { store, records }
    }
}

#[async_trait]
impl ResourceLedger for StoreLedger {
    async fn available(&self, actor: &str, resource: &str) -> Result<f64, LedgerError> {
        let record = load_combatant(self.store.as_ref(), actor).await?;
        Ok(pool_value(&record, resource))
    }

    async fn spend(&self, actor: &str, resource: &str, amount: f64) -> Result<f64, LedgerError> {
        let _guard = self.records.acquire(actor).await;
        let mut record = load_combatant(self.store.as_ref(), actor).await?;
        let available = pool_value(&record, resource);
        if amount <= 0.0 {
            return Ok(available);
        }
        if available < amount {
            return Err(LedgerError::Insufficient {
                actor: actor.to_string(),
                resource: resource.to_string(),
                needed: amount,
                available,
            });
        }
        let remaining = available - amount;
        write_resource(&mut record, resource, remaining).map_err(StoreError::from)?;
        self.store.put(Collection::Combatants, actor, record).await?;
        tracing::debug!(actor, resource, amount, remaining, "resource spent");
        Ok(remaining)
    }

    async fn refund(&self, actor: &str, resource: &str, amount: f64) -> Result<f64, LedgerError> {
        let _guard = self.records.acquire(actor).await;
        let mut record = load_combatant(self.store.as_ref(), actor).await?;
        let current = pool_value(&record, resource);
        if amount <= 0.0 {
            return Ok(current);
        }
        let mut restored = current + amount;
        if let Some(max) = pool_max(&record, resource) {
            restored = restored.min(max.max(current));
        }
        write_resource(&mut record, resource, restored).map_err(StoreError::from)?;
        self.store.put(Collection::Combatants, actor, record).await?;
        tracing::debug!(actor, resource, amount, restored, "resource refunded");
        Ok(restored)
    }
}

/// Condition registry over combatant records (`statuses`)
pub struct StoreConditions {
    store: Arc<dyn DocumentStore>,
    records: Arc<KeyedLocks>,
}

impl StoreConditions {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_locks(store, Arc::new(KeyedLocks::new()))
    }

    pub fn with_locks(store: Arc<dyn DocumentStore>, records: Arc<KeyedLocks>) -> Self {
        StoreConditions { store, records }
    }

    fn statuses(record: &Value) -> BTreeSet<String> {
        record
            .get("statuses")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    }

    async fn update(&self, actor: &str, condition: &str, present: bool) -> Result<bool, StoreError> {
        let _guard = self.records.acquire(actor).await;
        let mut record = load_combatant(self.store.as_ref(), actor).await?;
        let mut statuses = Self::statuses(&record);
        let changed = if present {
            statuses.insert(condition.to_string())
        } else {
            statuses.remove(condition)
        };
        if changed {
            write_statuses(&mut record, &statuses)?;
            self.store.put(Collection::Combatants, actor, record).await?;
            tracing::debug!(actor, condition, present, "condition updated");
        }
        Ok(changed)
    }
}

#[async_trait]
impl ConditionRegistry for StoreConditions {
    async fn has(&self, actor: &str, condition: &str) -> Result<bool, StoreError> {
        let record = load_combatant(self.store.as_ref(), actor).await?;
        Ok(Self::statuses(&record).contains(condition))
    }

    async fn add(&self, actor: &str, condition: &str) -> Result<bool, StoreError> {
        self.update(actor, condition, true).await
    }

    async fn remove(&self, actor: &str, condition: &str) -> Result<bool, StoreError> {
        self.update(actor, condition, false).await
    }
}
