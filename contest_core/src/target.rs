//! Target number composition with a labeled breakdown
//!
//! A target number is the sum of:
//! 1. A base rating (a characteristic of the combatant, or a fixed value)
//! 2. A named difficulty level from the configured table
//! 3. Caller-supplied situational terms
//! 4. Resolved modifier keys
//! 5. Penalties for conditions the combatant currently carries
//!
//! The total is rounded and floored at 0.

use crate::config::EngineConstants;
use crate::modifiers::{resolve, ResolvedMode};
use serde::{Deserialize, Serialize};
use sheet_core::Combatant;

/// Where a target number starts from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum BaseRating {
    Characteristic(String),
    Fixed(f64),
}

/// A caller-supplied adjustment ("Prone target", "Darkness")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SituationalTerm {
    pub label: String,
    pub value: f64,
}

/// Everything needed to size one side's target number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRequest {
    pub base: BaseRating,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub situational: Vec<SituationalTerm>,
    #[serde(default)]
    pub modifier_keys: Vec<String>,
}

impl TargetRequest {
    /// Test against a characteristic; its own modifier key is resolved too
    pub fn characteristic(key: impl Into<String>) -> Self {
        let key = key.into();
        TargetRequest {
            base: BaseRating::Characteristic(key.clone()),
            difficulty: None,
            situational: Vec::new(),
            modifier_keys: vec![key],
        }
    }

    pub fn fixed(value: f64) -> Self {
        TargetRequest {
            base: BaseRating::Fixed(value),
            difficulty: None,
            situational: Vec::new(),
            modifier_keys: Vec::new(),
        }
    }

    pub fn with_difficulty(mut self, level: impl Into<String>) -> Self {
        self.difficulty = Some(level.into());
        self
    }

    pub fn with_term(mut self, label: impl Into<String>, value: f64) -> Self {
        self.situational.push(SituationalTerm {
            label: label.into(),
            value,
        });
        self
    }

    pub fn with_modifier_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.modifier_keys.contains(&key) {
            self.modifier_keys.push(key);
        }
        self
    }
}

/// Provenance of one breakdown line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BreakdownSource {
    Base,
    Difficulty,
    Situational,
    Modifier {
        key: String,
        mode: ResolvedMode,
        sources: Vec<String>,
    },
    Condition {
        status: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownLine {
    pub label: String,
    pub value: f64,
    pub source: BreakdownSource,
}

/// A composed target number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetNumber {
    pub value: u32,
    pub breakdown: Vec<BreakdownLine>,
}

impl TargetNumber {
    fn from_breakdown(breakdown: Vec<BreakdownLine>) -> Self {
        let raw: f64 = breakdown.iter().map(|line| line.value).sum();
        TargetNumber {
            value: raw.round().max(0.0) as u32,
            breakdown,
        }
    }

    /// Add a line after the fact and recompute the value
    pub fn with_term(mut self, label: impl Into<String>, value: f64, source: BreakdownSource) -> Self {
        self.breakdown.push(BreakdownLine {
            label: label.into(),
            value,
            source,
        });
        Self::from_breakdown(self.breakdown)
    }

    /// Drop every line with `label` and recompute the value
    pub fn without_term(mut self, label: &str) -> Self {
        self.breakdown.retain(|line| line.label != label);
        Self::from_breakdown(self.breakdown)
    }
}

/// Compose a target number for `combatant`
pub fn target_number(
    combatant: &Combatant,
    request: &TargetRequest,
    constants: &EngineConstants,
) -> TargetNumber {
    let mut breakdown = Vec::new();

    let (label, base) = match &request.base {
        BaseRating::Characteristic(key) => (key.clone(), combatant.characteristic(key)),
        BaseRating::Fixed(value) => ("Base".to_string(), *value),
    };
    breakdown.push(BreakdownLine {
        label,
        value: base,
        source: BreakdownSource::Base,
    });

    if let Some(level) = &request.difficulty {
        match constants.difficulty.modifier(level) {
            Some(value) => breakdown.push(BreakdownLine {
                label: level.clone(),
                value,
                source: BreakdownSource::Difficulty,
            }),
            None => tracing::warn!(level = %level, "unknown difficulty level ignored"),
        }
    }

    for term in &request.situational {
        breakdown.push(BreakdownLine {
            label: term.label.clone(),
            value: term.value,
            source: BreakdownSource::Situational,
        });
    }

    let resolved = resolve(combatant, &request.modifier_keys);
    for key in &request.modifier_keys {
        let Some(result) = resolved.get(key) else {
            continue;
        };
        if result.is_none() {
            continue;
        }
        breakdown.push(BreakdownLine {
            label: format!("{key} modifiers"),
            value: result.total,
            source: BreakdownSource::Modifier {
                key: key.clone(),
                mode: result.mode,
                sources: result.contributions.iter().map(|c| c.label.clone()).collect(),
            },
        });
    }

    for (status, penalty) in &constants.conditions.penalties {
        if combatant.has_status(status) {
            breakdown.push(BreakdownLine {
                label: status.clone(),
                value: *penalty,
                source: BreakdownSource::Condition {
                    status: status.clone(),
                },
            });
        }
    }

    let target = TargetNumber::from_breakdown(breakdown);
    tracing::debug!(actor = %combatant.id, target = target.value, "target number composed");
    target
}
