use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Damage types an attack component can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[default]
    Physical,
    Fire,
    Frost,
    Shock,
    Poison,
    Magic,
}

impl DamageType {
    /// Get all damage type variants
    pub fn all() -> &'static [DamageType] {
        &[
            DamageType::Physical,
            DamageType::Fire,
            DamageType::Frost,
            DamageType::Shock,
            DamageType::Poison,
            DamageType::Magic,
        ]
    }

    /// Physical damage is soaked by armour and toughness, everything else by resistance
    pub fn is_physical(&self) -> bool {
        matches!(self, DamageType::Physical)
    }

    /// Stable lowercase key used in modifier keys (`resistance.fire`)
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageType::Physical => "physical",
            DamageType::Fire => "fire",
            DamageType::Frost => "frost",
            DamageType::Shock => "shock",
            DamageType::Poison => "poison",
            DamageType::Magic => "magic",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DamageType::Physical => write!(f, "Physical"),
            DamageType::Fire => write!(f, "Fire"),
            DamageType::Frost => write!(f, "Frost"),
            DamageType::Shock => write!(f, "Shock"),
            DamageType::Poison => write!(f, "Poison"),
            DamageType::Magic => write!(f, "Magic"),
        }
    }
}

impl FromStr for DamageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "physical" => Ok(DamageType::Physical),
            "fire" => Ok(DamageType::Fire),
            "frost" | "cold" => Ok(DamageType::Frost),
            "shock" | "lightning" => Ok(DamageType::Shock),
            "poison" => Ok(DamageType::Poison),
            "magic" => Ok(DamageType::Magic),
            _ => Err(()),
        }
    }
}

/// Body location struck by an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HitLocation {
    Head,
    #[default]
    Body,
    RightArm,
    LeftArm,
    RightLeg,
    LeftLeg,
}

impl HitLocation {
    pub fn all() -> &'static [HitLocation] {
        &[
            HitLocation::Head,
            HitLocation::Body,
            HitLocation::RightArm,
            HitLocation::LeftArm,
            HitLocation::RightLeg,
            HitLocation::LeftLeg,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HitLocation::Head => "head",
            HitLocation::Body => "body",
            HitLocation::RightArm => "right_arm",
            HitLocation::LeftArm => "left_arm",
            HitLocation::RightLeg => "right_leg",
            HitLocation::LeftLeg => "left_leg",
        }
    }
}

impl fmt::Display for HitLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HitLocation::Head => write!(f, "Head"),
            HitLocation::Body => write!(f, "Body"),
            HitLocation::RightArm => write!(f, "Right Arm"),
            HitLocation::LeftArm => write!(f, "Left Arm"),
            HitLocation::RightLeg => write!(f, "Right Leg"),
            HitLocation::LeftLeg => write!(f, "Left Leg"),
        }
    }
}

impl FromStr for HitLocation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "head" => Ok(HitLocation::Head),
            "body" | "torso" => Ok(HitLocation::Body),
            "right_arm" | "r_arm" => Ok(HitLocation::RightArm),
            "left_arm" | "l_arm" => Ok(HitLocation::LeftArm),
            "right_leg" | "r_leg" => Ok(HitLocation::RightLeg),
            "left_leg" | "l_leg" => Ok(HitLocation::LeftLeg),
            _ => Err(()),
        }
    }
}

/// How a modifier change combines with others targeting the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierMode {
    Add,
    Override,
}

impl ModifierMode {
    /// Parse a stored mode. Accepts names and the legacy numeric codes (2 = add, 5 = override).
    pub fn from_record(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "add" | "2" => Some(ModifierMode::Add),
                "override" | "5" => Some(ModifierMode::Override),
                _ => None,
            },
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(2) => Some(ModifierMode::Add),
                Some(5) => Some(ModifierMode::Override),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ModifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierMode::Add => write!(f, "Add"),
            ModifierMode::Override => write!(f, "Override"),
        }
    }
}
