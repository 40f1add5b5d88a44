//! Contest rules - who wins an attacker/defender exchange

use crate::dice::TestResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a defender answers an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseChoice {
    Block,
    Evade,
    NoDefense,
}

impl fmt::Display for DefenseChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefenseChoice::Block => write!(f, "Block"),
            DefenseChoice::Evade => write!(f, "Evade"),
            DefenseChoice::NoDefense => write!(f, "No defense"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Attacker,
    Defender,
    None,
}

/// Which rule decided the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestReason {
    BothFailed,
    OnlyAttackerSucceeded,
    OnlyDefenderSucceeded,
    HigherDegree,
    Tied,
    /// Block stops an attack that did not beat it outright
    BlockHeld,
    Undefended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDecision {
    pub winner: Winner,
    pub reason: ContestReason,
    /// Narrative weight from criticals; not used by the damage path
    pub attacker_advantage: u32,
    pub defender_advantage: u32,
}

fn advantage(own: &TestResult, opponent: Option<&TestResult>) -> u32 {
    let mut weight = 0;
    if own.is_critical_success() {
        weight += 1;
    }
    if opponent.is_some_and(TestResult::is_critical_failure) {
        weight += 1;
    }
    weight
}

/// Decide one exchange.
///
/// `defender` is `None` when the defender did not roll (no defense).
pub fn decide(attacker: &TestResult, defender: Option<&TestResult>, choice: DefenseChoice) -> ContestDecision {
    let attacker_advantage = advantage(attacker, defender);
    let defender_advantage = defender.map_or(0, |d| advantage(d, Some(attacker)));

    let (winner, reason) = match (choice, defender) {
        (DefenseChoice::NoDefense, _) | (_, None) => {
            if attacker.success {
                (Winner::Attacker, ContestReason::Undefended)
            } else {
                (Winner::None, ContestReason::BothFailed)
            }
        }
        (choice, Some(defender)) => match (attacker.success, defender.success) {
            (false, false) => (Winner::None, ContestReason::BothFailed),
            (true, false) => (Winner::Attacker, ContestReason::OnlyAttackerSucceeded),
            (false, true) => (Winner::Defender, ContestReason::OnlyDefenderSucceeded),
            (true, true) if choice == DefenseChoice::Block => {
                (Winner::Defender, ContestReason::BlockHeld)
            }
            (true, true) => match attacker.degree.cmp(&defender.degree) {
                std::cmp::Ordering::Greater => (Winner::Attacker, ContestReason::HigherDegree),
                std::cmp::Ordering::Less => (Winner::Defender, ContestReason::HigherDegree),
                std::cmp::Ordering::Equal => (Winner::None, ContestReason::Tied),
            },
        },
    };

    ContestDecision {
        winner,
        reason,
        attacker_advantage,
        defender_advantage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContestConstants;
    use crate::dice::evaluate;

    fn test(roll: u32, target: u32) -> TestResult {
        evaluate(roll, target, &ContestConstants::default())
    }

    #[test]
    fn test_block_holds_against_better_degree() {
        let attack = test(30, 45);
        let block = test(38, 40);
        let decision = decide(&attack, Some(&block), DefenseChoice::Block);
        assert_eq!(decision.winner, Winner::Defender);
        assert_eq!(decision.reason, ContestReason::BlockHeld);
    }

    #[test]
    fn test_evade_compares_degrees() {
        let attack = test(30, 45);
        let evade = test(38, 40);
        assert_eq!(decide(&attack, Some(&evade), DefenseChoice::Evade).winner, Winner::Attacker);

        let good_evade = test(10, 40);
        assert_eq!(decide(&attack, Some(&good_evade), DefenseChoice::Evade).winner, Winner::Defender);

        let even_evade = test(25, 40);
        let decision = decide(&attack, Some(&even_evade), DefenseChoice::Evade);
        assert_eq!(decision.winner, Winner::None);
        assert_eq!(decision.reason, ContestReason::Tied);
    }

    #[test]
    fn test_single_success_wins() {
        let hit = test(30, 45);
        let miss = test(80, 45);
        assert_eq!(decide(&hit, Some(&miss), DefenseChoice::Block).winner, Winner::Attacker);
        assert_eq!(decide(&miss, Some(&hit), DefenseChoice::Evade).winner, Winner::Defender);
        assert_eq!(decide(&miss, Some(&miss), DefenseChoice::Block).winner, Winner::None);
    }

    #[test]
    fn test_no_defense() {
        let hit = test(30, 45);
        let miss = test(80, 45);
        assert_eq!(decide(&hit, None, DefenseChoice::NoDefense).winner, Winner::Attacker);
        assert_eq!(decide(&miss, None, DefenseChoice::NoDefense).winner, Winner::None);
    }

    #[test]
    fn test_critical_advantage() {
        let crit = test(2, 45);
        let fumble = test(99, 40);
        let decision = decide(&crit, Some(&fumble), DefenseChoice::Evade);
        assert_eq!(decision.attacker_advantage, 2);
        assert_eq!(decision.defender_advantage, 0);

        let decision = decide(&fumble, Some(&crit), DefenseChoice::Block);
        assert_eq!(decision.winner, Winner::Defender);
        assert_eq!(decision.attacker_advantage, 0);
        assert_eq!(decision.defender_advantage, 2);
    }
}
