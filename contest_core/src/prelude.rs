//! Prelude module for convenient imports
//!
//! ```rust
//! use contest_core::prelude::*;
//! ```

// Modifiers
pub use crate::modifiers::{bonus_damage, eligible_effects, is_active, resolve, resolve_one, ModifierResult, ResolvedMode};

// Target numbers and dice
pub use crate::dice::{DiceFormula, ReplayRoller, RollSource, SeededRoller, TestResult};
pub use crate::target::{target_number, TargetNumber, TargetRequest};

// Contest
pub use crate::contest::{decide, DefenseChoice, Winner};
pub use crate::coordinator::{
    ActionSpec, AttackChoice, Choice, DamageSpec, OpposedTest, OpposedTestCoordinator, Participant, Phase,
    Transition,
};

// Damage
pub use crate::damage::{apply_damage, DamageApplicationResult, DamageComponent, DamageContext};

// Host
pub use crate::host::{Collection, ConditionRegistry, DocumentStore, KeyedLocks, MemoryStore, ResourceLedger};

// Config and errors
pub use crate::config::{constants, init_constants, init_constants_default, DamageConstants, EngineConstants};
pub use crate::error::{ContestError, InputError};
