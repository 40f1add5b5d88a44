//! Dice - percentile tests and damage formulas
//!
//! A test succeeds when the d100 roll is at or below the target number.
//! Degrees count whole steps of margin (10 points by default) on either side.

use crate::config::ContestConstants;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Source of die rolls
pub trait RollSource: Send {
    /// Roll one die with `sides` faces, 1..=sides
    fn roll_die(&mut self, sides: u32) -> u32;

    fn d100(&mut self) -> u32 {
        self.roll_die(100)
    }
}

/// Seedable production roller
#[derive(Debug, Clone)]
pub struct SeededRoller {
    rng: ChaCha8Rng,
}

impl SeededRoller {
    pub fn new(seed: u64) -> Self {
        SeededRoller {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        SeededRoller {
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl RollSource for SeededRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides.max(1))
    }
}

/// Scripted roller that replays queued results
///
/// Values are clamped into the die's range. Once the script runs out every
/// roll returns the die's maximum.
#[derive(Debug, Clone, Default)]
pub struct ReplayRoller {
    queue: VecDeque<u32>,
}

impl ReplayRoller {
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        ReplayRoller {
            queue: rolls.into_iter().collect(),
        }
    }

    pub fn push(&mut self, roll: u32) {
        self.queue.push_back(roll);
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl RollSource for ReplayRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        match self.queue.pop_front() {
            Some(roll) => roll.clamp(1, sides),
            None => {
                tracing::warn!(sides, "replay script exhausted");
                sides
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Critical {
    Success,
    Failure,
}

/// Outcome of one percentile test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub roll: u32,
    pub target: u32,
    pub success: bool,
    /// Degrees of success when `success`, of failure otherwise
    pub degree: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<Critical>,
}

impl TestResult {
    pub fn is_critical_success(&self) -> bool {
        self.critical == Some(Critical::Success)
    }

    pub fn is_critical_failure(&self) -> bool {
        self.critical == Some(Critical::Failure)
    }

    /// Ones digit of the roll, used for hit locations
    pub fn ones(&self) -> u32 {
        self.roll % 10
    }
}

/// Evaluate a roll against a target number
pub fn evaluate(roll: u32, target: u32, constants: &ContestConstants) -> TestResult {
    let step = constants.degree_step.max(1);
    let success = roll <= target;
    let degree = if success {
        (target - roll) / step
    } else {
        (roll - target) / step
    };
    let critical = if success && roll <= constants.critical_success_max {
        Some(Critical::Success)
    } else if !success && roll >= constants.critical_failure_min {
        Some(Critical::Failure)
    } else {
        None
    };

    TestResult {
        roll,
        target,
        success,
        degree,
        critical,
    }
}

/// Roll a percentile test
pub fn roll_test(roller: &mut dyn RollSource, target: u32, constants: &ContestConstants) -> TestResult {
    evaluate(roller.d100(), target, constants)
}

/// Error parsing a damage formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("Invalid damage formula: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("Too many dice: {0}")]
    TooManyDice(u32),
}

const MAX_DICE: u32 = 100;

/// `NdM+K` damage formula. A bare number is a flat amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceFormula {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl DiceFormula {
    pub fn flat(amount: i32) -> Self {
        DiceFormula {
            count: 0,
            sides: 0,
            modifier: amount,
        }
    }

    pub fn parse(notation: &str) -> Result<Self, FormulaError> {
        let compact: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let invalid = || FormulaError::InvalidNotation(notation.to_string());
        if compact.is_empty() {
            return Err(invalid());
        }

        let Some(d_pos) = compact.find('d') else {
            let modifier: i32 = compact.parse().map_err(|_| invalid())?;
            return Ok(DiceFormula::flat(modifier));
        };

        let count_str = &compact[..d_pos];
        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| invalid())?
        };
        if count > MAX_DICE {
            return Err(FormulaError::TooManyDice(count));
        }

        let rest = &compact[d_pos + 1..];
        let (sides_str, modifier) = match rest.find(['+', '-']) {
            Some(pos) => {
                let modifier: i32 = rest[pos..].parse().map_err(|_| invalid())?;
                (&rest[..pos], modifier)
            }
            None => (rest, 0),
        };
        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;
        if sides == 0 {
            return Err(FormulaError::InvalidDieSize(sides));
        }

        Ok(DiceFormula {
            count,
            sides,
            modifier,
        })
    }

    /// Roll the formula; the total never drops below 0
    pub fn roll(&self, roller: &mut dyn RollSource) -> DamageRoll {
        let dice: Vec<u32> = (0..self.count).map(|_| roller.roll_die(self.sides)).collect();
        let sum: i64 = dice.iter().map(|d| i64::from(*d)).sum();
        let total = (sum + i64::from(self.modifier)).max(0) as u32;
        DamageRoll {
            formula: *self,
            dice,
            modifier: self.modifier,
            total,
        }
    }
}

impl FromStr for DiceFormula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceFormula::parse(s)
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "{}", self.modifier);
        }
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

/// A rolled damage formula with its individual dice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    pub formula: DiceFormula,
    pub dice: Vec<u32>,
    pub modifier: i32,
    pub total: u32,
}
