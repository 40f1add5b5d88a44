//! Modifier resolution - effect activation and per-key aggregation

pub mod gate;
pub mod legacy;
mod resolver;

pub use gate::{eligible_effects, is_active, possession_is_active};
pub use resolver::{aggregate, bonus_damage, resolve, resolve_one, total};

use serde::{Deserialize, Serialize};
use sheet_core::{DamageType, ModifierMode};

/// How a key's total was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedMode {
    Add,
    Override,
    /// Nothing targets the key
    None,
}

/// One line of provenance behind a resolved total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub label: String,
    pub value: f64,
    pub mode: ModifierMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// Deterministic value of one modifier key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierResult {
    pub key: String,
    pub total: f64,
    pub mode: ResolvedMode,
    pub contributions: Vec<Contribution>,
}

impl ModifierResult {
    pub fn none(key: impl Into<String>) -> Self {
        ModifierResult {
            key: key.into(),
            total: 0.0,
            mode: ResolvedMode::None,
            contributions: Vec::new(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.mode == ResolvedMode::None
    }
}

/// Typed bonus damage collected from an eligible effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedBonus {
    pub label: String,
    pub source_id: String,
    pub amount: f64,
    pub damage_type: DamageType,
}
