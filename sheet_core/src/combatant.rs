//! Combatant snapshots built from schemaless records

use crate::coerce::{coerce_number, string_field};
use crate::effect::{Effect, EffectOrigin};
use crate::possession::Possession;
use crate::RecordError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// A current/max pair (health, action points, magicka...)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub value: f64,
    pub max: f64,
}

impl Pool {
    pub fn new(value: f64, max: f64) -> Self {
        Pool { value, max }
    }

    /// Accepts `{value, max}` objects or a bare number (max = value)
    pub fn from_record(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Pool {
                value: coerce_number(map.get("value")),
                max: coerce_number(map.get("max")),
            },
            other => {
                let v = coerce_number(other);
                Pool { value: v, max: v }
            }
        }
    }
}

/// Read-only snapshot of a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: String,
    pub name: String,
    pub health: Pool,
    /// Named resource pools (action points, stamina, magicka)
    pub resources: BTreeMap<String, Pool>,
    /// Named ratings (combat, evade, agility, toughness...)
    pub characteristics: BTreeMap<String, f64>,
    pub statuses: BTreeSet<String>,
    /// Effects attached directly to the combatant
    pub effects: Vec<Effect>,
    pub possessions: Vec<Possession>,
    /// Slot name -> possession id
    pub slot_bindings: BTreeMap<String, String>,
}

impl Combatant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Combatant {
            id: id.into(),
            name: name.into(),
            health: Pool::default(),
            resources: BTreeMap::new(),
            characteristics: BTreeMap::new(),
            statuses: BTreeSet::new(),
            effects: Vec::new(),
            possessions: Vec::new(),
            slot_bindings: BTreeMap::new(),
        }
    }

    pub fn with_health(mut self, value: f64, max: f64) -> Self {
        self.health = Pool::new(value, max);
        self
    }

    pub fn with_characteristic(mut self, key: impl Into<String>, value: f64) -> Self {
        self.characteristics.insert(key.into(), value);
        self
    }

    pub fn with_resource(mut self, key: impl Into<String>, value: f64, max: f64) -> Self {
        self.resources.insert(key.into(), Pool::new(value, max));
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect.with_origin(EffectOrigin::Combatant));
        self
    }

    pub fn with_possession(mut self, possession: Possession) -> Self {
        self.possessions.push(possession);
        self
    }

    pub fn with_slot(mut self, slot: impl Into<String>, possession_id: impl Into<String>) -> Self {
        self.slot_bindings.insert(slot.into(), possession_id.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.statuses.insert(status.into());
        self
    }

    /// Characteristic value, 0 when absent
    pub fn characteristic(&self, key: &str) -> f64 {
        self.characteristics.get(key).copied().unwrap_or(0.0)
    }

    /// Current value of a resource pool, 0 when absent
    pub fn resource(&self, key: &str) -> f64 {
        self.resources.get(key).map(|p| p.value).unwrap_or(0.0)
    }

    pub fn has_status(&self, status: &str) -> bool {
        self.statuses.contains(status)
    }

    pub fn possession(&self, id: &str) -> Option<&Possession> {
        self.possessions.iter().find(|p| p.id == id)
    }

    pub fn is_alive(&self) -> bool {
        self.health.value > 0.0
    }

    /// Build a snapshot from a store record
    pub fn from_record(record: &Value) -> Result<Self, RecordError> {
        if !record.is_object() {
            return Err(RecordError::NotAnObject);
        }
        let id = string_field(record, "id").ok_or(RecordError::MissingId)?;
        let name = string_field(record, "name").unwrap_or_else(|| id.clone());

        let resources = record
            .get("resources")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), Pool::from_record(Some(v))))
                    .collect()
            })
            .unwrap_or_default();

        let characteristics = record
            .get("characteristics")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), coerce_number(Some(v))))
                    .collect()
            })
            .unwrap_or_default();

        let statuses = record
            .get("statuses")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let effects = record
            .get("effects")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(idx, fx)| {
                        Effect::from_record(fx, EffectOrigin::Combatant, &format!("{id}.effect.{idx}"))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let possessions = record
            .get("possessions")
            .or_else(|| record.get("items"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Possession::from_record).collect())
            .unwrap_or_default();

        let slot_bindings = record
            .get("slots")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(slot, id)| match id {
                        Value::String(s) if !s.is_empty() => Some((slot.clone(), s.clone())),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Combatant {
            id,
            name,
            health: Pool::from_record(record.get("health")),
            resources,
            characteristics,
            statuses,
            effects,
            possessions,
            slot_bindings,
        })
    }
}

/// Write a new current health into a combatant record, preserving the pool shape
pub fn write_health(record: &mut Value, value: f64) -> Result<(), RecordError> {
    let obj = record.as_object_mut().ok_or(RecordError::NotAnObject)?;
    match obj.get_mut("health") {
        Some(Value::Object(pool)) => {
            pool.insert("value".to_string(), json!(value));
        }
        _ => {
            let max = coerce_number(obj.get("health"));
            obj.insert("health".to_string(), json!({ "value": value, "max": max }));
        }
    }
    Ok(())
}

/// Write a resource pool's current value into a combatant record
pub fn write_resource(record: &mut Value, key: &str, value: f64) -> Result<(), RecordError> {
    let obj = record.as_object_mut().ok_or(RecordError::NotAnObject)?;
    let resources = obj
        .entry("resources")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or(RecordError::Malformed("resources"))?;
    match resources.get_mut(key) {
        Some(Value::Object(pool)) => {
            pool.insert("value".to_string(), json!(value));
        }
        Some(bare) => {
            // A bare number was the full pool; it becomes the max
            let max = coerce_number(Some(&*bare)).max(value);
            *bare = json!({ "value": value, "max": max });
        }
        None => {
            resources.insert(key.to_string(), json!({ "value": value, "max": value }));
        }
    }
    Ok(())
}

/// Write an armour piece's durability into a combatant record
pub fn write_durability(record: &mut Value, possession_id: &str, durability: f64) -> Result<(), RecordError> {
    // Older records keep the item list under `items`
    let key = if record.get("possessions").is_some_and(Value::is_array) {
        "possessions"
    } else {
        "items"
    };
    let list = record
        .get_mut(key)
        .and_then(Value::as_array_mut)
        .ok_or(RecordError::Malformed("possessions"))?;
    let item = list
        .iter_mut()
        .find(|item| string_field(item, "id").as_deref() == Some(possession_id))
        .ok_or_else(|| RecordError::UnknownPossession(possession_id.to_string()))?;
    if let Some(obj) = item.as_object_mut() {
        obj.insert("durability".to_string(), json!(durability));
    }
    Ok(())
}

/// Replace the status list of a combatant record
pub fn write_statuses(record: &mut Value, statuses: &BTreeSet<String>) -> Result<(), RecordError> {
    let obj = record.as_object_mut().ok_or(RecordError::NotAnObject)?;
    obj.insert("statuses".to_string(), json!(statuses));
    Ok(())
}

const APPLIED_DAMAGE: &str = "applied_damage";

/// Whether the record already carries the damage identified by `key`
pub fn damage_applied(record: &Value, key: &str) -> bool {
    record
        .get(APPLIED_DAMAGE)
        .and_then(Value::as_array)
        .is_some_and(|keys| keys.iter().any(|k| k.as_str() == Some(key)))
}

/// Tag the record as carrying the damage identified by `key`.
///
/// Returns false when the tag was already present.
pub fn mark_damage_applied(record: &mut Value, key: &str) -> Result<bool, RecordError> {
    if damage_applied(record, key) {
        return Ok(false);
    }
    let obj = record.as_object_mut().ok_or(RecordError::NotAnObject)?;
    obj.entry(APPLIED_DAMAGE)
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or(RecordError::Malformed(APPLIED_DAMAGE))?
        .push(json!(key));
    Ok(true)
}

/// Drop the tag once the damage no longer needs guarding
pub fn clear_damage_applied(record: &mut Value, key: &str) -> Result<bool, RecordError> {
    let obj = record.as_object_mut().ok_or(RecordError::NotAnObject)?;
    let Some(keys) = obj.get_mut(APPLIED_DAMAGE).and_then(Value::as_array_mut) else {
        return Ok(false);
    };
    let before = keys.len();
    keys.retain(|k| k.as_str() != Some(key));
    let removed = keys.len() != before;
    if keys.is_empty() {
        obj.remove(APPLIED_DAMAGE);
    }
    Ok(removed)
}
