//! Effect activation - which possession effects count toward their owner

use super::legacy::weapon_is_bound;
use sheet_core::{Combatant, Effect, Possession, PossessionKind};

/// Whether a possession is currently in a state that lets its effects apply
pub fn possession_is_active(owner: &Combatant, possession: &Possession) -> bool {
    match &possession.kind {
        PossessionKind::Passive => true,
        PossessionKind::Weapon(state) => weapon_is_bound(owner, possession, state),
        PossessionKind::Armor(state) => state.equipped,
        // Spells apply their effects explicitly when cast
        PossessionKind::Spell => false,
        PossessionKind::Other { .. } => false,
    }
}

/// Whether an effect attached to `possession` currently counts toward `owner`
pub fn is_active(owner: &Combatant, possession: &Possession, effect: &Effect) -> bool {
    !effect.disabled && possession_is_active(owner, possession)
}

/// Snapshot of every effect that currently applies to a combatant.
///
/// Direct effects come first, then possession effects in possession order.
pub fn eligible_effects(combatant: &Combatant) -> Vec<&Effect> {
    let direct = combatant.effects.iter().filter(|effect| !effect.disabled);
    let transferred = combatant.possessions.iter().flat_map(|possession| {
        possession
            .effects
            .iter()
            .filter(move |effect| effect.transfer && is_active(combatant, possession, effect))
    });
    direct.chain(transferred).collect()
}
