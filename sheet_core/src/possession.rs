//! Possessions - weapons, armour, spells and passive features owned by a combatant

use crate::coerce::{coerce_bool, coerce_number, string_field};
use crate::effect::{Effect, EffectOrigin};
use crate::types::HitLocation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activation state carried by a weapon record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeaponState {
    /// Explicit equipped flag, when the record carries one
    pub equipped: Option<bool>,
    /// Raw `system` block of older records, which nested the binding inside it
    pub legacy: Option<Value>,
}

/// Protection carried by an armour record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmorState {
    pub equipped: bool,
    /// Armour rating soaked from physical hits on a covered location
    pub rating: f64,
    /// Locations this piece explicitly covers
    pub coverage: Vec<HitLocation>,
    pub durability: f64,
}

impl ArmorState {
    pub fn covers(&self, location: HitLocation) -> bool {
        self.coverage.contains(&location)
    }
}

/// Possession kinds. Each kind decides its own activation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PossessionKind {
    Weapon(WeaponState),
    Armor(ArmorState),
    Passive,
    Spell,
    /// Any type string the engine does not know about
    Other { type_name: String },
}

impl PossessionKind {
    pub fn name(&self) -> &str {
        match self {
            PossessionKind::Weapon(_) => "weapon",
            PossessionKind::Armor(_) => "armor",
            PossessionKind::Passive => "passive",
            PossessionKind::Spell => "spell",
            PossessionKind::Other { type_name } => type_name,
        }
    }
}

/// An item owned by a combatant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Possession {
    pub id: String,
    pub name: String,
    pub kind: PossessionKind,
    pub effects: Vec<Effect>,
}

impl Possession {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: PossessionKind) -> Self {
        Possession {
            id: id.into(),
            name: name.into(),
            kind,
            effects: Vec::new(),
        }
    }

    /// Attach an effect, stamping it with this possession as origin
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects
            .push(effect.with_origin(EffectOrigin::Possession(self.id.clone())));
        self
    }

    pub fn armor(&self) -> Option<&ArmorState> {
        match &self.kind {
            PossessionKind::Armor(armor) => Some(armor),
            _ => None,
        }
    }

    pub fn armor_mut(&mut self) -> Option<&mut ArmorState> {
        match &mut self.kind {
            PossessionKind::Armor(armor) => Some(armor),
            _ => None,
        }
    }

    /// Parse a possession record. Returns `None` for records without an id.
    pub fn from_record(record: &Value) -> Option<Self> {
        let id = string_field(record, "id")?;
        let name = string_field(record, "name").unwrap_or_else(|| id.clone());
        let type_name = string_field(record, "type")
            .or_else(|| string_field(record, "kind"))
            .unwrap_or_default()
            .to_ascii_lowercase();

        let kind = match type_name.as_str() {
            "weapon" => PossessionKind::Weapon(WeaponState {
                equipped: record.get("equipped").and_then(Value::as_bool),
                legacy: record.get("system").filter(|v| v.is_object()).cloned(),
            }),
            "armor" | "armour" => PossessionKind::Armor(ArmorState {
                equipped: coerce_bool(record.get("equipped")),
                rating: coerce_number(record.get("rating")),
                coverage: parse_coverage(record.get("coverage")),
                durability: coerce_number(record.get("durability")),
            }),
            "passive" | "talent" | "trait" | "power" => PossessionKind::Passive,
            "spell" => PossessionKind::Spell,
            _ => PossessionKind::Other { type_name },
        };

        let effects = record
            .get("effects")
            .and_then(Value::as_array)
            .map(|effects| {
                effects
                    .iter()
                    .enumerate()
                    .map(|(idx, fx)| {
                        Effect::from_record(
                            fx,
                            EffectOrigin::Possession(id.clone()),
                            &format!("{id}.effect.{idx}"),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Possession { id, name, kind, effects })
    }
}

fn parse_coverage(value: Option<&Value>) -> Vec<HitLocation> {
    let mut locations: Vec<HitLocation> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|s| s.parse().ok())
            .collect(),
        // Older records stored coverage as `{ "head": true, "body": false }`
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, covered)| coerce_bool(Some(covered)))
            .filter_map(|(name, _)| name.parse().ok())
            .collect(),
        Some(Value::String(s)) => s.split(',').filter_map(|s| s.parse().ok()).collect(),
        _ => Vec::new(),
    };
    locations.sort();
    locations.dedup();
    locations
}
