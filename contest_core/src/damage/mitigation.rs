//! Mitigation - armour, toughness and resistance per component
//!
//! Physical: max(0, armour - penetration) + toughness
//! Typed:    resistance for that damage type only

use super::{DamageComponent, DamageContext, Mitigation};
use crate::config::DamageConstants;
use crate::modifiers::resolve;
use sheet_core::{Combatant, DamageType, HitLocation};
use std::collections::BTreeMap;

/// Defender values read once per pipeline call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefenderProfile {
    pub armor: f64,
    pub toughness: f64,
    pub resistances: BTreeMap<DamageType, f64>,
    pub flat_mitigation: f64,
    pub damage_taken: f64,
    pub wound_threshold: f64,
}

/// Summed rating of equipped armour pieces covering `location`
pub fn armor_at(defender: &Combatant, location: HitLocation) -> f64 {
    defender
        .possessions
        .iter()
        .filter_map(|p| p.armor())
        .filter(|armor| armor.equipped && armor.covers(location))
        .map(|armor| armor.rating.max(0.0))
        .sum()
}

fn resistance_key(damage_type: DamageType) -> String {
    format!("resistance.{}", damage_type.as_str())
}

impl DefenderProfile {
    /// Snapshot every mitigation input for one hit
    pub fn snapshot(defender: &Combatant, location: HitLocation, constants: &DamageConstants) -> Self {
        let location_key = format!("armor.{}", location.as_str());
        let mut keys = vec![
            "armor".to_string(),
            location_key.clone(),
            constants.toughness_key.clone(),
            constants.wound_threshold_key.clone(),
            "mitigation.flat".to_string(),
            "damage.taken".to_string(),
        ];
        keys.extend(DamageType::all().iter().filter(|t| !t.is_physical()).map(|t| resistance_key(*t)));

        let resolved = resolve(defender, &keys);
        let modifier = |key: &str| resolved.get(key).map_or(0.0, |r| r.total);

        let resistances = DamageType::all()
            .iter()
            .filter(|t| !t.is_physical())
            .map(|t| {
                let key = resistance_key(*t);
                (*t, defender.characteristic(&key) + modifier(&key))
            })
            .collect();

        DefenderProfile {
            armor: armor_at(defender, location) + modifier("armor") + modifier(&location_key),
            toughness: defender.characteristic(&constants.toughness_key) + modifier(&constants.toughness_key),
            resistances,
            flat_mitigation: modifier("mitigation.flat"),
            damage_taken: modifier("damage.taken"),
            wound_threshold: defender.characteristic(&constants.wound_threshold_key)
                + modifier(&constants.wound_threshold_key),
        }
    }

    pub fn resistance(&self, damage_type: DamageType) -> f64 {
        self.resistances.get(&damage_type).copied().unwrap_or(0.0)
    }
}

/// Mitigation for one component
pub fn calculate_mitigation(
    component: &DamageComponent,
    profile: &DefenderProfile,
    context: &DamageContext,
) -> Mitigation {
    if context.ignore_reduction {
        return Mitigation::default();
    }

    let mut mitigation = Mitigation::default();
    if component.damage_type.is_physical() {
        mitigation.armor = profile.armor.max(0.0);
        mitigation.effective_armor = (mitigation.armor - context.penetration.max(0.0)).max(0.0);
        mitigation.toughness = profile.toughness.max(0.0);
    } else {
        mitigation.resistance = profile.resistance(component.damage_type).max(0.0);
    }
    if component.applies_defender_adjustments {
        mitigation.flat = profile.flat_mitigation;
    }
    mitigation.total = mitigation.effective_armor + mitigation.toughness + mitigation.resistance + mitigation.flat;
    mitigation
}
