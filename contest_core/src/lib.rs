//! contest_core - Deterministic opposed-action resolution
//!
//! This library provides:
//! - Modifier resolution: effect activation gating and per-key aggregation
//! - Target numbers: base rating, difficulty, situational terms, modifiers, conditions
//! - Contest rules: percentile tests, degrees, criticals, block/evade/no-defense
//! - OpposedTestCoordinator: commit -> roll -> resolve over a shared document store
//! - Damage pipeline: per-component mitigation applied as one health update
//!
//! # Quick Start
//!
//! ```rust
//! use contest_core::prelude::*;
//! use sheet_core::{Combatant, DamageType};
//!
//! let orc = Combatant::new("orc", "Orc").with_health(12.0, 12.0);
//! let hit = [DamageComponent::primary(15.0, DamageType::Physical, "Maul")];
//! let (orc, result) = apply_damage(&orc, &hit, &DamageContext::default(), &DamageConstants::default());
//! assert_eq!(result.new_health, 0.0);
//! assert!(orc.has_status("unconscious"));
//! ```

pub mod config;
pub mod contest;
pub mod coordinator;
pub mod damage;
pub mod dice;
pub mod error;
pub mod host;
pub mod modifiers;
pub mod prelude;
pub mod target;

// Core API
pub use coordinator::{OpposedTestCoordinator, Transition};
pub use error::{ContestError, InputError, Result};
pub use modifiers::{resolve, ModifierResult};
pub use target::{target_number, TargetNumber, TargetRequest};
pub use damage::{apply_damage, DamageApplicationResult};

// Configuration
pub use config::{constants, init_constants, init_constants_default, EngineConstants};
