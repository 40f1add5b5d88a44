//! Damage resolution - mitigation and application of damage components

mod mitigation;
mod pipeline;

pub use mitigation::{armor_at, calculate_mitigation, DefenderProfile};
pub use pipeline::{apply_damage, attack_components};

use serde::{Deserialize, Serialize};
use sheet_core::{DamageType, HitLocation};

/// One independently mitigated slice of an attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageComponent {
    pub amount: f64,
    pub damage_type: DamageType,
    /// Only the primary component receives defender-side flat adjustments
    pub applies_defender_adjustments: bool,
    pub source_label: String,
}

impl DamageComponent {
    pub fn primary(amount: f64, damage_type: DamageType, source_label: impl Into<String>) -> Self {
        DamageComponent {
            amount,
            damage_type,
            applies_defender_adjustments: true,
            source_label: source_label.into(),
        }
    }

    pub fn bonus(amount: f64, damage_type: DamageType, source_label: impl Into<String>) -> Self {
        DamageComponent {
            amount,
            damage_type,
            applies_defender_adjustments: false,
            source_label: source_label.into(),
        }
    }
}

/// Attack-wide inputs to the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageContext {
    pub location: HitLocation,
    /// Reduces the armour term only
    pub penetration: f64,
    /// Added to every component before mitigation
    pub success_degree_bonus: f64,
    pub ignore_reduction: bool,
    pub forceful: bool,
}

impl Default for DamageContext {
    fn default() -> Self {
        DamageContext {
            location: HitLocation::Body,
            penetration: 0.0,
            success_degree_bonus: 0.0,
            ignore_reduction: false,
            forceful: false,
        }
    }
}

impl DamageContext {
    pub fn at(location: HitLocation) -> Self {
        DamageContext {
            location,
            ..Default::default()
        }
    }

    pub fn with_penetration(mut self, penetration: f64) -> Self {
        self.penetration = penetration;
        self
    }

    pub fn with_degree_bonus(mut self, bonus: f64) -> Self {
        self.success_degree_bonus = bonus;
        self
    }

    pub fn ignoring_reduction(mut self) -> Self {
        self.ignore_reduction = true;
        self
    }

    pub fn forceful(mut self) -> Self {
        self.forceful = true;
        self
    }
}

/// Mitigation applied to one component
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Mitigation {
    /// Armour at the struck location before penetration
    pub armor: f64,
    /// Armour left after penetration, never negative
    pub effective_armor: f64,
    pub toughness: f64,
    pub resistance: f64,
    /// Defender `mitigation.flat`, primary component only
    pub flat: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub source_label: String,
    pub damage_type: DamageType,
    pub raw: f64,
    pub degree_bonus: f64,
    /// Defender `damage.taken`, primary component only
    pub taken_adjustment: f64,
    pub mitigation: Mitigation,
    pub applied: f64,
}

/// Durability lost by an armour piece on a forceful hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurabilityEvent {
    pub possession_id: String,
    pub previous: f64,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageApplicationResult {
    pub location: HitLocation,
    pub per_component: Vec<ComponentResult>,
    pub total_applied: f64,
    pub previous_health: f64,
    pub new_health: f64,
    /// Status newly added because health reached zero
    pub status_triggered: Option<String>,
    /// A single component met the wound threshold
    pub wounded: bool,
    pub durability: Vec<DurabilityEvent>,
}

impl DamageApplicationResult {
    pub fn is_knockout(&self) -> bool {
        self.new_health <= 0.0
    }
}
