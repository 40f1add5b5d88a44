//! Effects and the modifier changes they carry

use crate::coerce::{coerce_bool, coerce_number, leading_number, string_field};
use crate::types::{DamageType, ModifierMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An amount of damage tagged with its type, used by bonus-damage keys.
///
/// Never summed as a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    pub amount: f64,
    pub damage_type: DamageType,
}

impl TypedValue {
    pub fn new(amount: f64, damage_type: DamageType) -> Self {
        TypedValue { amount, damage_type }
    }

    /// Parse the stored string forms `"3 fire"`, `"3[fire]"` and `"+3 Fire"`.
    ///
    /// A bare number is not a typed value.
    pub fn parse(s: &str) -> Option<Self> {
        let (amount, rest) = leading_number(s)?;
        let tag = rest.trim().trim_start_matches('[').trim_end_matches(']').trim();
        if tag.is_empty() {
            return None;
        }
        let damage_type = tag.parse::<DamageType>().ok()?;
        Some(TypedValue { amount, damage_type })
    }
}

/// The value side of a modifier change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ModifierValue {
    Number(f64),
    Typed(TypedValue),
    /// Raw text from the store, coerced when read as a number
    Text(String),
}

impl ModifierValue {
    pub fn from_record(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) => match TypedValue::parse(s) {
                Some(typed) => ModifierValue::Typed(typed),
                None => ModifierValue::Text(s.clone()),
            },
            Some(Value::Object(map)) if map.contains_key("damage_type") => {
                match map.get("damage_type").and_then(Value::as_str).map(str::parse::<DamageType>) {
                    Some(Ok(damage_type)) => ModifierValue::Typed(TypedValue {
                        amount: coerce_number(map.get("amount")),
                        damage_type,
                    }),
                    _ => ModifierValue::Number(coerce_number(map.get("amount"))),
                }
            }
            other => ModifierValue::Number(coerce_number(other)),
        }
    }

    /// Numeric reading of this value; `None` for typed values
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ModifierValue::Number(n) => Some(*n),
            ModifierValue::Typed(_) => None,
            ModifierValue::Text(s) => Some(coerce_number(Some(&Value::String(s.clone())))),
        }
    }

    pub fn as_typed(&self) -> Option<TypedValue> {
        match self {
            ModifierValue::Typed(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, ModifierValue::Typed(_))
    }
}

impl From<f64> for ModifierValue {
    fn from(n: f64) -> Self {
        ModifierValue::Number(n)
    }
}

impl From<TypedValue> for ModifierValue {
    fn from(t: TypedValue) -> Self {
        ModifierValue::Typed(t)
    }
}

/// One `(key, mode, value)` instruction contributed by an effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierChange {
    pub key: String,
    pub mode: ModifierMode,
    pub value: ModifierValue,
}

impl ModifierChange {
    pub fn add(key: impl Into<String>, value: impl Into<ModifierValue>) -> Self {
        ModifierChange {
            key: key.into(),
            mode: ModifierMode::Add,
            value: value.into(),
        }
    }

    pub fn overriding(key: impl Into<String>, value: impl Into<ModifierValue>) -> Self {
        ModifierChange {
            key: key.into(),
            mode: ModifierMode::Override,
            value: value.into(),
        }
    }

    /// Parse a change record. Changes without a key or with an unknown mode are dropped.
    pub fn from_record(record: &Value) -> Option<Self> {
        let key = string_field(record, "key")?;
        let mode = match record.get("mode") {
            None => ModifierMode::Add,
            Some(raw) => match ModifierMode::from_record(raw) {
                Some(mode) => mode,
                None => {
                    tracing::debug!(key = %key, mode = %raw, "dropping change with unsupported mode");
                    return None;
                }
            },
        };
        Some(ModifierChange {
            key,
            mode,
            value: ModifierValue::from_record(record.get("value")),
        })
    }
}

/// Where an effect is attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum EffectOrigin {
    /// Attached directly to the combatant; always eligible while enabled
    Combatant,
    /// Attached to the possession with this id
    Possession(String),
}

/// A bundle of modifier changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub id: String,
    /// Source label used for provenance in breakdowns
    pub label: String,
    pub origin: EffectOrigin,
    pub disabled: bool,
    pub priority: f64,
    /// Whether a possession effect transfers to the owning combatant
    pub transfer: bool,
    pub changes: Vec<ModifierChange>,
}

impl Effect {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Effect {
            id: id.into(),
            label: label.into(),
            origin: EffectOrigin::Combatant,
            disabled: false,
            priority: 0.0,
            transfer: true,
            changes: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_change(mut self, change: ModifierChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn with_origin(mut self, origin: EffectOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn without_transfer(mut self) -> Self {
        self.transfer = false;
        self
    }

    /// Parse an effect record. `fallback_id` is used when the record has no id.
    pub fn from_record(record: &Value, origin: EffectOrigin, fallback_id: &str) -> Self {
        let id = string_field(record, "id").unwrap_or_else(|| fallback_id.to_string());
        let label = string_field(record, "label")
            .or_else(|| string_field(record, "name"))
            .unwrap_or_else(|| id.clone());
        let changes = record
            .get("changes")
            .and_then(Value::as_array)
            .map(|changes| changes.iter().filter_map(ModifierChange::from_record).collect())
            .unwrap_or_default();
        let transfer = match record.get("transfer") {
            None | Some(Value::Null) => true,
            raw => coerce_bool(raw),
        };

        Effect {
            id,
            label,
            origin,
            disabled: coerce_bool(record.get("disabled")),
            priority: coerce_number(record.get("priority")),
            transfer,
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_value_forms() {
        assert_eq!(TypedValue::parse("3 fire"), Some(TypedValue::new(3.0, DamageType::Fire)));
        assert_eq!(TypedValue::parse("+2[Frost]"), Some(TypedValue::new(2.0, DamageType::Frost)));
        assert_eq!(TypedValue::parse("4"), None);
        assert_eq!(TypedValue::parse("4 bananas"), None);
        assert_eq!(TypedValue::parse("fire"), None);
    }

    #[test]
    fn test_value_from_record() {
        assert_eq!(ModifierValue::from_record(Some(&json!(3))), ModifierValue::Number(3.0));
        assert_eq!(
            ModifierValue::from_record(Some(&json!("1 shock"))),
            ModifierValue::Typed(TypedValue::new(1.0, DamageType::Shock))
        );
        assert_eq!(
            ModifierValue::from_record(Some(&json!({"amount": "2", "damage_type": "poison"}))),
            ModifierValue::Typed(TypedValue::new(2.0, DamageType::Poison))
        );
        let text = ModifierValue::from_record(Some(&json!("5 ranks")));
        assert_eq!(text, ModifierValue::Text("5 ranks".to_string()));
        assert_eq!(text.as_number(), Some(5.0));
    }

    #[test]
    fn test_typed_value_is_not_numeric() {
        let typed = ModifierValue::Typed(TypedValue::new(3.0, DamageType::Fire));
        assert_eq!(typed.as_number(), None);
        assert!(typed.is_typed());
    }

    #[test]
    fn test_effect_from_record() {
        let record = json!({
            "id": "fx-1",
            "name": "Bless",
            "priority": "10",
            "changes": [
                {"key": "damage.taken", "mode": "override", "value": 5},
                {"key": "combat", "mode": 2, "value": "10"},
                {"key": "ignored", "mode": "multiply", "value": 2},
                {"mode": "add", "value": 1}
            ]
        });

        let effect = Effect::from_record(&record, EffectOrigin::Combatant, "fallback");
        assert_eq!(effect.id, "fx-1");
        assert_eq!(effect.label, "Bless");
        assert_eq!(effect.priority, 10.0);
        assert!(effect.transfer);
        assert!(!effect.disabled);
        assert_eq!(effect.changes.len(), 2);
        assert_eq!(effect.changes[0].mode, ModifierMode::Override);
    }

    #[test]
    fn test_effect_fallback_id() {
        let effect = Effect::from_record(&json!({"transfer": false}), EffectOrigin::Combatant, "idx-0");
        assert_eq!(effect.id, "idx-0");
        assert_eq!(effect.label, "idx-0");
        assert!(!effect.transfer);
    }
}
