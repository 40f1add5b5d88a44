//! Modifier aggregation - collapse every change targeting a key into one value
//!
//! Rules per key:
//! 1. Typed values (bonus damage) never enter the numeric total.
//! 2. If any OVERRIDE exists, the highest priority wins; equal priorities go to
//!    the lexicographically greatest source id. All ADD entries are discarded.
//! 3. Otherwise ADD entries are summed, grouped by source label, zeros skipped.

use super::gate::eligible_effects;
use super::{Contribution, ModifierResult, ResolvedMode, TypedBonus};
use sheet_core::{Combatant, Effect, ModifierMode};
use std::collections::BTreeMap;

/// Resolve a set of keys against one snapshot of the combatant's effects
pub fn resolve<S: AsRef<str>>(combatant: &Combatant, keys: &[S]) -> BTreeMap<String, ModifierResult> {
    let effects = eligible_effects(combatant);
    keys.iter()
        .map(|key| {
            let key = key.as_ref();
            (key.to_string(), aggregate(key, &effects))
        })
        .collect()
}

/// Resolve a single key
pub fn resolve_one(combatant: &Combatant, key: &str) -> ModifierResult {
    aggregate(key, &eligible_effects(combatant))
}

/// Resolved total for a key, 0 when nothing contributes
pub fn total(combatant: &Combatant, key: &str) -> f64 {
    resolve_one(combatant, key).total
}

/// Aggregate one key over an already-gated effect set
pub fn aggregate(key: &str, effects: &[&Effect]) -> ModifierResult {
    let mut overrides: Vec<(&Effect, f64)> = Vec::new();
    let mut adds: Vec<(&Effect, f64)> = Vec::new();

    for effect in effects {
        for change in effect.changes.iter().filter(|c| c.key == key) {
            let Some(value) = change.value.as_number() else {
                continue;
            };
            match change.mode {
                ModifierMode::Override => overrides.push((effect, value)),
                ModifierMode::Add => adds.push((effect, value)),
            }
        }
    }

    let selected = overrides.into_iter().max_by(|(a, _), (b, _)| {
        a.priority
            .total_cmp(&b.priority)
            .then_with(|| a.id.cmp(&b.id))
    });
    if let Some((effect, value)) = selected {
        return ModifierResult {
            key: key.to_string(),
            total: value,
            mode: ResolvedMode::Override,
            contributions: vec![Contribution {
                label: effect.label.clone(),
                value,
                mode: ModifierMode::Override,
                priority: Some(effect.priority),
                source_id: Some(effect.id.clone()),
            }],
        };
    }

    let mut contributions: Vec<Contribution> = Vec::new();
    for (effect, value) in adds {
        if value == 0.0 {
            continue;
        }
        match contributions.iter_mut().find(|c| c.label == effect.label) {
            Some(group) => group.value += value,
            None => contributions.push(Contribution {
                label: effect.label.clone(),
                value,
                mode: ModifierMode::Add,
                priority: None,
                source_id: Some(effect.id.clone()),
            }),
        }
    }

    if contributions.is_empty() {
        return ModifierResult::none(key);
    }

    ModifierResult {
        key: key.to_string(),
        total: contributions.iter().map(|c| c.value).sum(),
        mode: ResolvedMode::Add,
        contributions,
    }
}

/// Collect typed bonus damage targeting `key`, in effect order
pub fn bonus_damage(combatant: &Combatant, key: &str) -> Vec<TypedBonus> {
    eligible_effects(combatant)
        .into_iter()
        .flat_map(|effect| {
            effect
                .changes
                .iter()
                .filter(move |c| c.key == key)
                .filter_map(|c| c.value.as_typed())
                .filter(|typed| typed.amount != 0.0)
                .map(move |typed| TypedBonus {
                    label: effect.label.clone(),
                    source_id: effect.id.clone(),
                    amount: typed.amount,
                    damage_type: typed.damage_type,
                })
        })
        .collect()
}
