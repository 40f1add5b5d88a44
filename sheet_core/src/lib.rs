//! sheet_core - Combatant records for opposed-action resolution
//!
//! This library provides:
//! - Combatant: read-only snapshot of a participant (pools, characteristics, statuses)
//! - Possession: weapons, armour, spells and passive features with their effects
//! - Effect / ModifierChange: the modifier instructions the engine aggregates
//! - Coercion helpers that read schemaless store records without failing
//!
//! # Quick Start
//!
//! ```rust
//! use sheet_core::{Combatant, Effect, ModifierChange};
//! use serde_json::json;
//!
//! let record = json!({
//!     "id": "hero",
//!     "health": {"value": 12, "max": 15},
//!     "characteristics": {"combat": "45"}
//! });
//! let hero = Combatant::from_record(&record).unwrap()
//!     .with_effect(Effect::new("bless", "Bless").with_change(ModifierChange::add("combat", 5.0)));
//! assert_eq!(hero.characteristic("combat"), 45.0);
//! ```

pub mod coerce;
pub mod combatant;
pub mod effect;
pub mod possession;
pub mod types;

pub use combatant::{
    clear_damage_applied, damage_applied, mark_damage_applied, write_durability, write_health, write_resource,
    write_statuses, Combatant, Pool,
};
pub use effect::{Effect, EffectOrigin, ModifierChange, ModifierValue, TypedValue};
pub use possession::{ArmorState, Possession, PossessionKind, WeaponState};
pub use types::{DamageType, HitLocation, ModifierMode};

use thiserror::Error;

/// Error reading or patching a combatant record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("record has no id")]
    MissingId,
    #[error("record field '{0}' has an unexpected shape")]
    Malformed(&'static str),
    #[error("unknown possession: {0}")]
    UnknownPossession(String),
}
