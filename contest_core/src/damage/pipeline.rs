//! Damage pipeline - apply components to a defender (immutable API)
//!
//! 1. Snapshot defender mitigation once
//! 2. Mitigate each component independently
//! 3. Sum into one health delta
//! 4. Wound and unconscious transitions
//! 5. Forceful impact wears covering armour

use super::mitigation::{calculate_mitigation, DefenderProfile};
use super::{ComponentResult, DamageApplicationResult, DamageComponent, DamageContext, DurabilityEvent};
use crate::config::DamageConstants;
use crate::modifiers::{bonus_damage, resolve_one};
use sheet_core::{Combatant, DamageType};

/// Build the components of an attack: the rolled primary plus typed bonuses.
///
/// Numeric bonuses on the attacker's bonus key are folded into the primary.
pub fn attack_components(
    attacker: &Combatant,
    rolled: f64,
    damage_type: DamageType,
    label: &str,
    constants: &DamageConstants,
) -> Vec<DamageComponent> {
    let flat = resolve_one(attacker, &constants.bonus_key).total;
    let mut components = vec![DamageComponent::primary(rolled + flat, damage_type, label)];
    components.extend(
        bonus_damage(attacker, &constants.bonus_key)
            .into_iter()
            .map(|bonus| DamageComponent::bonus(bonus.amount, bonus.damage_type, bonus.label)),
    );
    components
}

/// Apply damage components to a defender
///
/// Returns the new defender state and the per-component breakdown. Health is
/// written once with the summed delta.
pub fn apply_damage(
    defender: &Combatant,
    components: &[DamageComponent],
    context: &DamageContext,
    constants: &DamageConstants,
) -> (Combatant, DamageApplicationResult) {
    let mut new_defender = defender.clone();
    let profile = DefenderProfile::snapshot(defender, context.location, constants);

    let per_component: Vec<ComponentResult> = components
        .iter()
        .map(|component| {
            let mitigation = calculate_mitigation(component, &profile, context);
            let taken_adjustment = if component.applies_defender_adjustments {
                profile.damage_taken
            } else {
                0.0
            };
            let incoming = component.amount.max(0.0) + context.success_degree_bonus + taken_adjustment;
            ComponentResult {
                source_label: component.source_label.clone(),
                damage_type: component.damage_type,
                raw: component.amount,
                degree_bonus: context.success_degree_bonus,
                taken_adjustment,
                mitigation,
                applied: (incoming - mitigation.total).max(0.0),
            }
        })
        .collect();

    let total_applied: f64 = per_component.iter().map(|c| c.applied).sum();
    let previous_health = defender.health.value;
    let new_health = (previous_health - total_applied).max(0.0);
    new_defender.health.value = new_health;

    let wounded = profile.wound_threshold > 0.0
        && per_component.iter().any(|c| c.applied >= profile.wound_threshold);
    if wounded {
        new_defender.statuses.insert(constants.wounded_status.clone());
    }

    let mut status_triggered = None;
    if new_health <= 0.0 && !defender.has_status(&constants.unconscious_status) {
        new_defender.statuses.insert(constants.unconscious_status.clone());
        status_triggered = Some(constants.unconscious_status.clone());
    }

    let primary_hit = components
        .iter()
        .zip(&per_component)
        .any(|(component, result)| {
            component.applies_defender_adjustments && component.damage_type.is_physical() && result.applied > 0.0
        });
    let mut durability = Vec::new();
    if context.forceful && primary_hit {
        for possession in &mut new_defender.possessions {
            let id = possession.id.clone();
            let Some(armor) = possession.armor_mut() else {
                continue;
            };
            if !armor.equipped || !armor.covers(context.location) || armor.durability <= 0.0 {
                continue;
            }
            let previous = armor.durability;
            armor.durability = (previous - constants.forceful_durability_loss).max(0.0);
            durability.push(DurabilityEvent {
                possession_id: id,
                previous,
                current: armor.durability,
            });
        }
    }

    tracing::debug!(
        defender = %defender.id,
        total_applied,
        previous_health,
        new_health,
        wounded,
        "damage applied"
    );

    let result = DamageApplicationResult {
        location: context.location,
        per_component,
        total_applied,
        previous_health,
        new_health,
        status_triggered,
        wounded,
        durability,
    };
    (new_defender, result)
}
