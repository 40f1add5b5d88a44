//! Compatibility shim for the historical shapes of "this weapon is equipped"
//!
//! Records written by different releases of the host bound weapons in different
//! places. The strategies below are tried in order and the first one with an
//! opinion decides. Dropping support for a shape means deleting its entry here.

use sheet_core::coerce::coerce_bool;
use sheet_core::{Combatant, Possession, WeaponState};

/// One historical location of the equipped-weapon binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStrategy {
    /// `equipped: true` on the weapon record itself
    ExplicitFlag,
    /// The owner's `slots` map names the weapon
    SlotBinding,
    /// `system.equipped.value` / `system.equipped` / `system.wielded` on older records
    LegacyNested,
}

/// Strategies in the order they are consulted
pub const BINDING_STRATEGIES: &[BindingStrategy] = &[
    BindingStrategy::ExplicitFlag,
    BindingStrategy::SlotBinding,
    BindingStrategy::LegacyNested,
];

impl BindingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            BindingStrategy::ExplicitFlag => "explicit_flag",
            BindingStrategy::SlotBinding => "slot_binding",
            BindingStrategy::LegacyNested => "legacy_nested",
        }
    }

    /// `Some(bound)` when this shape is present on the records, `None` otherwise
    pub fn check(&self, owner: &Combatant, weapon: &Possession, state: &WeaponState) -> Option<bool> {
        match self {
            // Records default the flag to false, so only a set flag carries information
            BindingStrategy::ExplicitFlag => state.equipped.filter(|equipped| *equipped),
            BindingStrategy::SlotBinding => {
                if owner.slot_bindings.is_empty() {
                    None
                } else {
                    Some(owner.slot_bindings.values().any(|id| *id == weapon.id))
                }
            }
            BindingStrategy::LegacyNested => {
                let system = state.legacy.as_ref()?;
                if let Some(value) = system.pointer("/equipped/value") {
                    return Some(coerce_bool(Some(value)));
                }
                if let Some(value) = system.get("equipped") {
                    return Some(coerce_bool(Some(value)));
                }
                system
                    .get("wielded")
                    .and_then(|v| v.as_str())
                    .map(|slot| !slot.trim().is_empty())
            }
        }
    }
}

/// Whether a weapon is bound into an equip slot of its owner
pub fn weapon_is_bound(owner: &Combatant, weapon: &Possession, state: &WeaponState) -> bool {
    for strategy in BINDING_STRATEGIES {
        if let Some(bound) = strategy.check(owner, weapon, state) {
            tracing::trace!(
                weapon = %weapon.id,
                strategy = strategy.name(),
                bound,
                "weapon binding resolved"
            );
            return bound;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sheet_core::PossessionKind;

    fn weapon(state: WeaponState) -> Possession {
        Possession::new("w1", "Sword", PossessionKind::Weapon(state))
    }

    fn state_of(p: &Possession) -> &WeaponState {
        match &p.kind {
            PossessionKind::Weapon(state) => state,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_explicit_flag_wins() {
        let owner = Combatant::new("hero", "Hero").with_slot("primary", "other");
        let sword = weapon(WeaponState { equipped: Some(true), legacy: None });
        assert!(weapon_is_bound(&owner, &sword, state_of(&sword)));
    }

    #[test]
    fn test_slot_binding_decides_when_flag_unset() {
        let owner = Combatant::new("hero", "Hero").with_slot("primary", "w1");
        let sword = weapon(WeaponState { equipped: Some(false), legacy: None });
        assert!(weapon_is_bound(&owner, &sword, state_of(&sword)));

        let elsewhere = Combatant::new("hero", "Hero").with_slot("primary", "w2");
        assert!(!weapon_is_bound(&elsewhere, &sword, state_of(&sword)));
    }

    #[test]
    fn test_slot_binding_beats_legacy_shape() {
        let owner = Combatant::new("hero", "Hero").with_slot("primary", "w2");
        let sword = weapon(WeaponState {
            equipped: None,
            legacy: Some(json!({"equipped": {"value": true}})),
        });
        assert!(!weapon_is_bound(&owner, &sword, state_of(&sword)));
    }

    #[test]
    fn test_legacy_shapes() {
        let owner = Combatant::new("hero", "Hero");
        for (legacy, expected) in [
            (json!({"equipped": {"value": true}}), true),
            (json!({"equipped": {"value": false}}), false),
            (json!({"equipped": "true"}), true),
            (json!({"wielded": "main_hand"}), true),
            (json!({"wielded": ""}), false),
            (json!({"weight": 3}), false),
        ] {
            let sword = weapon(WeaponState { equipped: None, legacy: Some(legacy.clone()) });
            assert_eq!(weapon_is_bound(&owner, &sword, state_of(&sword)), expected, "{legacy}");
        }
    }

    #[test]
    fn test_no_shape_means_unbound() {
        let owner = Combatant::new("hero", "Hero");
        let sword = weapon(WeaponState::default());
        assert!(!weapon_is_bound(&owner, &sword, state_of(&sword)));
    }
}
