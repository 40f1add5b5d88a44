//! Round contexts - which multi-round encounter each combatant belongs to

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// `combatant id -> round context id`, owned by one coordinator
#[derive(Debug, Default)]
pub struct RoundContexts {
    members: Mutex<HashMap<String, String>>,
}

impl RoundContexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a combatant in a round context, returning the one it left
    pub fn join(&self, combatant: &str, round: &str) -> Option<String> {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(combatant.to_string(), round.to_string())
    }

    pub fn leave(&self, combatant: &str) -> Option<String> {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(combatant)
    }

    pub fn round_of(&self, combatant: &str) -> Option<String> {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(combatant)
            .cloned()
    }

    /// Drop every membership of a round, returning the combatants removed
    pub fn end_round(&self, round: &str) -> Vec<String> {
        let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed: Vec<String> = members
            .iter()
            .filter(|(_, r)| r.as_str() == round)
            .map(|(c, _)| c.clone())
            .collect();
        for combatant in &removed {
            members.remove(combatant);
        }
        removed.sort();
        removed
    }
}
