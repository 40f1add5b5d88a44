//! Engine constants configuration

use serde::{Deserialize, Serialize};
use sheet_core::HitLocation;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use super::ConfigError;

/// Global engine constants instance
static ENGINE_CONSTANTS: OnceLock<EngineConstants> = OnceLock::new();

/// Initialize the global engine constants from a TOML file
///
/// Returns error if already initialized or if loading fails.
pub fn init_constants(path: &Path) -> Result<(), ConfigError> {
    let constants = EngineConstants::load_from_path(path)?;
    ENGINE_CONSTANTS
        .set(constants)
        .map_err(|_| ConfigError::ValidationError("EngineConstants already initialized".to_string()))
}

/// Initialize the global engine constants with default values
pub fn init_constants_default() -> Result<(), ConfigError> {
    ENGINE_CONSTANTS
        .set(EngineConstants::default())
        .map_err(|_| ConfigError::ValidationError("EngineConstants already initialized".to_string()))
}

/// Get a reference to the global engine constants
///
/// Falls back to the defaults when nothing was initialized.
pub fn constants() -> &'static EngineConstants {
    ENGINE_CONSTANTS.get_or_init(EngineConstants::default)
}

/// Check if constants have been initialized
pub fn constants_initialized() -> bool {
    ENGINE_CONSTANTS.get().is_some()
}

/// Tunable engine constants
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConstants {
    #[serde(default)]
    pub contest: ContestConstants,
    #[serde(default)]
    pub difficulty: DifficultyConstants,
    #[serde(default)]
    pub defense: DefenseConstants,
    #[serde(default)]
    pub actions: ActionConstants,
    #[serde(default)]
    pub conditions: ConditionConstants,
    #[serde(default)]
    pub damage: DamageConstants,
    #[serde(default)]
    pub hit_locations: HitLocationTable,
}

impl EngineConstants {
    /// Load constants from a TOML file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let constants: EngineConstants = super::load_toml(path)?;
        constants.validate()?;
        Ok(constants)
    }

    /// Parse constants from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let constants: EngineConstants = super::parse_toml(content)?;
        constants.validate()?;
        Ok(constants)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contest.degree_step == 0 {
            return Err(ConfigError::ValidationError(
                "contest.degree_step must be positive".to_string(),
            ));
        }
        if self.contest.critical_success_max >= self.contest.critical_failure_min {
            return Err(ConfigError::ValidationError(format!(
                "contest.critical_success_max ({}) must be below critical_failure_min ({})",
                self.contest.critical_success_max, self.contest.critical_failure_min
            )));
        }
        if self.hit_locations.by_digit.len() != 10 {
            return Err(ConfigError::ValidationError(format!(
                "hit_locations.by_digit needs 10 entries, found {}",
                self.hit_locations.by_digit.len()
            )));
        }
        if self.actions.attack_cost < 0.0 || self.actions.defense_cost < 0.0 {
            return Err(ConfigError::ValidationError(
                "action costs cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestConstants {
    /// Successful rolls at or below this are critical successes
    #[serde(default = "default_critical_success_max")]
    pub critical_success_max: u32,
    /// Failed rolls at or above this are critical failures
    #[serde(default = "default_critical_failure_min")]
    pub critical_failure_min: u32,
    /// Points of margin per degree of success/failure
    #[serde(default = "default_degree_step")]
    pub degree_step: u32,
    /// Target number adjustment for an aimed attack
    #[serde(default = "default_aimed_penalty")]
    pub aimed_penalty: f64,
}

impl Default for ContestConstants {
    fn default() -> Self {
        ContestConstants {
            critical_success_max: 3,
            critical_failure_min: 98,
            degree_step: 10,
            aimed_penalty: -20.0,
        }
    }
}

fn default_critical_success_max() -> u32 {
    3
}
fn default_critical_failure_min() -> u32 {
    98
}
fn default_degree_step() -> u32 {
    10
}
fn default_aimed_penalty() -> f64 {
    -20.0
}

/// Named difficulty levels and their target number adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConstants {
    #[serde(default = "default_difficulty_levels")]
    pub levels: BTreeMap<String, f64>,
}

impl Default for DifficultyConstants {
    fn default() -> Self {
        DifficultyConstants {
            levels: default_difficulty_levels(),
        }
    }
}

impl DifficultyConstants {
    pub fn modifier(&self, level: &str) -> Option<f64> {
        self.levels.get(&level.trim().to_ascii_lowercase()).copied()
    }
}

fn default_difficulty_levels() -> BTreeMap<String, f64> {
    [
        ("trivial", 40.0),
        ("simple", 20.0),
        ("easy", 10.0),
        ("average", 0.0),
        ("challenging", -10.0),
        ("difficult", -20.0),
        ("hard", -30.0),
        ("very_hard", -40.0),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect()
}

/// Ratings used to size each defensive option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseConstants {
    #[serde(default = "default_block_characteristic")]
    pub block_characteristic: String,
    #[serde(default = "default_evade_characteristic")]
    pub evade_characteristic: String,
    #[serde(default = "default_area_escape_characteristic")]
    pub area_escape_characteristic: String,
}

impl Default for DefenseConstants {
    fn default() -> Self {
        DefenseConstants {
            block_characteristic: default_block_characteristic(),
            evade_characteristic: default_evade_characteristic(),
            area_escape_characteristic: default_area_escape_characteristic(),
        }
    }
}

fn default_block_characteristic() -> String {
    "combat".to_string()
}
fn default_evade_characteristic() -> String {
    "evade".to_string()
}
fn default_area_escape_characteristic() -> String {
    "agility".to_string()
}

/// Action economy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConstants {
    /// Resource pool spent when rolling
    #[serde(default = "default_action_resource")]
    pub resource: String,
    #[serde(default = "default_action_cost")]
    pub attack_cost: f64,
    #[serde(default = "default_action_cost")]
    pub defense_cost: f64,
}

impl Default for ActionConstants {
    fn default() -> Self {
        ActionConstants {
            resource: default_action_resource(),
            attack_cost: 1.0,
            defense_cost: 1.0,
        }
    }
}

fn default_action_resource() -> String {
    "action_points".to_string()
}
fn default_action_cost() -> f64 {
    1.0
}

/// Conditions the engine consults but does not own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConstants {
    /// An attacker carrying any of these cannot start an attack
    #[serde(default = "default_attack_blocking")]
    pub attack_blocking: Vec<String>,
    /// Target number adjustment applied while a condition is present
    #[serde(default = "default_condition_penalties")]
    pub penalties: BTreeMap<String, f64>,
}

impl Default for ConditionConstants {
    fn default() -> Self {
        ConditionConstants {
            attack_blocking: default_attack_blocking(),
            penalties: default_condition_penalties(),
        }
    }
}

fn default_attack_blocking() -> Vec<String> {
    vec!["defensive_stance".to_string(), "unconscious".to_string()]
}
fn default_condition_penalties() -> BTreeMap<String, f64> {
    BTreeMap::from([("wounded".to_string(), -20.0)])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageConstants {
    #[serde(default = "default_unconscious_status")]
    pub unconscious_status: String,
    #[serde(default = "default_wounded_status")]
    pub wounded_status: String,
    /// Characteristic and modifier key holding the wound threshold
    #[serde(default = "default_wound_threshold_key")]
    pub wound_threshold_key: String,
    /// Characteristic and modifier key holding natural toughness
    #[serde(default = "default_toughness_key")]
    pub toughness_key: String,
    /// Durability lost by each covering armour piece on a forceful hit
    #[serde(default = "default_forceful_durability_loss")]
    pub forceful_durability_loss: f64,
    /// Extra damage per attacker degree of success
    #[serde(default)]
    pub degree_bonus: f64,
    /// Modifier key collecting typed bonus damage on the attacker
    #[serde(default = "default_bonus_key")]
    pub bonus_key: String,
}

impl Default for DamageConstants {
    fn default() -> Self {
        DamageConstants {
            unconscious_status: default_unconscious_status(),
            wounded_status: default_wounded_status(),
            wound_threshold_key: default_wound_threshold_key(),
            toughness_key: default_toughness_key(),
            forceful_durability_loss: 1.0,
            degree_bonus: 0.0,
            bonus_key: default_bonus_key(),
        }
    }
}

fn default_unconscious_status() -> String {
    "unconscious".to_string()
}
fn default_wounded_status() -> String {
    "wounded".to_string()
}
fn default_wound_threshold_key() -> String {
    "wound_threshold".to_string()
}
fn default_toughness_key() -> String {
    "toughness".to_string()
}
fn default_forceful_durability_loss() -> f64 {
    1.0
}
fn default_bonus_key() -> String {
    "damage.bonus".to_string()
}

/// Ones digit of the attack roll -> struck location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitLocationTable {
    #[serde(default = "default_hit_locations")]
    pub by_digit: Vec<HitLocation>,
}

impl Default for HitLocationTable {
    fn default() -> Self {
        HitLocationTable {
            by_digit: default_hit_locations(),
        }
    }
}

impl HitLocationTable {
    pub fn locate(&self, roll: u32) -> HitLocation {
        if self.by_digit.is_empty() {
            return HitLocation::Body;
        }
        let idx = (roll % 10) as usize % self.by_digit.len();
        self.by_digit[idx]
    }
}

fn default_hit_locations() -> Vec<HitLocation> {
    vec![
        HitLocation::Body,
        HitLocation::Head,
        HitLocation::RightArm,
        HitLocation::LeftArm,
        HitLocation::Body,
        HitLocation::Body,
        HitLocation::Body,
        HitLocation::RightLeg,
        HitLocation::LeftLeg,
        HitLocation::Body,
    ]
}
