//! Opposed test coordinator - commit, roll and resolve over a shared store
//!
//! Every transition re-reads the test record, no-ops when the requested step
//! has already happened, and persists the new snapshot before returning it.
//! Transitions on the same test are serialized by a per-test lock; writes to a
//! combatant record are serialized by a per-combatant lock shared with the
//! ledger and condition registry.
//!
//! Flow:
//! 1. `create_pending` sizes the attacker's target number
//! 2. `commit` records each side's hidden choice; once the attacker and every
//!    defender have committed, all sides roll in one pass, attacker first
//! 3. `resolve` decides each defender and applies damage to losers
//!
//! Damage lands at most once per defender: the outcome is saved first, the
//! record is tagged with the test and defender when health changes, and a
//! resolve that finds an outcome with uncommitted damage finishes the job.

mod rounds;

pub use rounds::RoundContexts;
pub use test::{
    ActionSpec, AttackChoice, Choice, DamageSpec, DefenderProgress, OpposedTest, Outcome, Participant, Phase,
    Side,
};

use crate::config::EngineConstants;
use crate::contest::{decide, DefenseChoice, Winner};
use crate::damage::{apply_damage, attack_components, DamageApplicationResult, DamageContext};
use crate::dice::{evaluate, RollSource};
use crate::error::{ContestError, InputError, Result};
use crate::host::{
    Collection, ConditionRegistry, DocumentStore, KeyedLocks, MemoryStore, ResourceLedger, StoreConditions,
    StoreLedger,
};
use crate::target::{target_number, BreakdownSource, TargetRequest};
use serde::{Deserialize, Serialize};
use sheet_core::{
    clear_damage_applied, damage_applied, mark_damage_applied, write_durability, write_health, Combatant, Possession,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const AIMED_LABEL: &str = "Aimed";

/// Why a transition left the test untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skip {
    AlreadyCommitted,
    AlreadyRolled,
    AlreadyResolved,
    BarrierNotMet,
    AttackerNotRolled,
    DefenderNotReady,
    NoDefense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Applied,
    Unchanged(Skip),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

pub struct OpposedTestCoordinator {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<dyn ResourceLedger>,
    conditions: Arc<dyn ConditionRegistry>,
    roller: Mutex<Box<dyn RollSource>>,
    constants: Arc<EngineConstants>,
    rounds: RoundContexts,
    test_locks: KeyedLocks,
    record_locks: Arc<KeyedLocks>,
}

impl OpposedTestCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ledger: Arc<dyn ResourceLedger>,
        conditions: Arc<dyn ConditionRegistry>,
        roller: Box<dyn RollSource>,
        constants: Arc<EngineConstants>,
    ) -> Self {
        OpposedTestCoordinator {
            store,
            ledger,
            conditions,
            roller: Mutex::new(roller),
            constants,
            rounds: RoundContexts::new(),
            test_locks: KeyedLocks::new(),
            record_locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Share combatant record locks with the host's ledger and registry
    pub fn with_record_locks(mut self, records: Arc<KeyedLocks>) -> Self {
        self.record_locks = records;
        self
    }

    /// Coordinator whose ledger and conditions live in `store`, all writing
    /// combatant records under the same locks
    pub fn over_store(
        store: Arc<dyn DocumentStore>,
        roller: impl RollSource + 'static,
        constants: Arc<EngineConstants>,
    ) -> Self {
        let records = Arc::new(KeyedLocks::new());
        Self::new(
            store.clone(),
            Arc::new(StoreLedger::with_locks(store.clone(), records.clone())),
            Arc::new(StoreConditions::with_locks(store.clone(), records.clone())),
            Box::new(roller),
            constants,
        )
        .with_record_locks(records)
    }

    pub fn in_memory(
        store: Arc<MemoryStore>,
        roller: impl RollSource + 'static,
        constants: Arc<EngineConstants>,
    ) -> Self {
        Self::over_store(store, roller, constants)
    }

    pub fn constants(&self) -> &EngineConstants {
        &self.constants
    }

    pub fn rounds(&self) -> &RoundContexts {
        &self.rounds
    }

    /// Current persisted state of a test
    pub async fn test(&self, test_id: &str) -> Result<OpposedTest> {
        self.load_test(test_id).await
    }

    /// Current state as one participant may see it
    pub async fn view(&self, test_id: &str, viewer: Participant) -> Result<OpposedTest> {
        Ok(self.load_test(test_id).await?.view_for(viewer))
    }

    /// Open a test for `action` against one or more defenders
    pub async fn create_pending<S: AsRef<str>>(
        &self,
        attacker_id: &str,
        defender_ids: &[S],
        action: ActionSpec,
    ) -> Result<OpposedTest> {
        if defender_ids.is_empty() {
            return Err(InputError::NoDefenders.into());
        }
        let attacker = self.load_combatant(attacker_id).await?;
        let defender_ids: Vec<String> = defender_ids.iter().map(|id| id.as_ref().to_string()).collect();
        for id in &defender_ids {
            self.load_combatant(id).await?;
        }

        for condition in &self.constants.conditions.attack_blocking {
            if self.conditions.has(attacker_id, condition).await? {
                tracing::info!(actor = attacker_id, condition = %condition, "attack refused by condition");
                return Err(ContestError::ConditionBlocked {
                    actor: attacker_id.to_string(),
                    condition: condition.clone(),
                });
            }
        }

        let mut side = Side::new(attacker_id);
        side.target = Some(target_number(&attacker, &action.attack, &self.constants));
        let mut test = OpposedTest::new(Uuid::new_v4().to_string(), action, side, &defender_ids);
        test.round_context = self.rounds.round_of(attacker_id);
        self.save_test(&mut test).await?;

        tracing::info!(
            test_id = %test.id,
            actor = attacker_id,
            defenders = defender_ids.len(),
            action = %test.action.name,
            "opposed test created"
        );
        Ok(test)
    }

    /// Record one participant's choice; rolls every side once all have committed.
    ///
    /// The returned test is `participant`'s view of it.
    pub async fn commit(
        &self,
        test_id: &str,
        participant: Participant,
        choice: Choice,
    ) -> Result<(OpposedTest, Transition)> {
        let (test, transition) = self.commit_choice(test_id, participant, choice).await?;
        Ok((test.view_for(participant), transition))
    }

    async fn commit_choice(
        &self,
        test_id: &str,
        participant: Participant,
        choice: Choice,
    ) -> Result<(OpposedTest, Transition)> {
        let _guard = self.test_locks.acquire(test_id).await;
        let mut test = self.load_test(test_id).await?;
        if test.is_resolved() {
            return Ok(unchanged(test, Skip::AlreadyResolved));
        }

        match (participant, choice) {
            (Participant::Attacker, Choice::Attack(attack)) => {
                if test.attacker.is_committed() {
                    return Ok(unchanged(test, Skip::AlreadyCommitted));
                }
                let cost = self.attack_cost(&test.action);
                self.ensure_affordable(&test.attacker.actor_id, cost).await?;
                if let AttackChoice::Aimed { .. } = attack {
                    let penalty = self.constants.contest.aimed_penalty;
                    test.attacker.target = test
                        .attacker
                        .target
                        .take()
                        .map(|target| target.with_term(AIMED_LABEL, penalty, BreakdownSource::Situational));
                }
                test.attacker.committed = Some(attack);
                test.advance(Phase::AwaitingDefense);
            }
            (Participant::Defender(idx), Choice::Defense(defense)) => {
                let side = self.defender_side(&test, idx)?;
                if side.is_committed() {
                    return Ok(unchanged(test, Skip::AlreadyCommitted));
                }
                let actor = side.actor_id.clone();
                let target = match self.defense_request(defense) {
                    Some(request) => {
                        self.ensure_affordable(&actor, self.constants.actions.defense_cost).await?;
                        let defender = self.load_combatant(&actor).await?;
                        Some(target_number(&defender, &request, &self.constants))
                    }
                    None => None,
                };
                let side = &mut test.defenders[idx];
                side.committed = Some(defense);
                side.target = target;
            }
            (participant, choice) => {
                return Err(InputError::ChoiceMismatch {
                    participant: participant.to_string(),
                    choice: choice.kind(),
                }
                .into());
            }
        }

        self.save_test(&mut test).await?;
        tracing::debug!(test_id, participant = %participant, revision = test.revision, "choice committed");

        if test.barrier_met() {
            self.roll_all(&mut test).await?;
        }
        Ok((test, Transition::Applied))
    }

    /// Roll one side explicitly. Only valid once the barrier is met.
    ///
    /// The returned test is `participant`'s view of it.
    pub async fn roll(&self, test_id: &str, participant: Participant) -> Result<(OpposedTest, Transition)> {
        let (test, transition) = self.roll_participant(test_id, participant).await?;
        Ok((test.view_for(participant), transition))
    }

    async fn roll_participant(&self, test_id: &str, participant: Participant) -> Result<(OpposedTest, Transition)> {
        let _guard = self.test_locks.acquire(test_id).await;
        let mut test = self.load_test(test_id).await?;
        if test.is_resolved() {
            return Ok(unchanged(test, Skip::AlreadyResolved));
        }
        if !test.barrier_met() {
            return Ok(unchanged(test, Skip::BarrierNotMet));
        }

        match participant {
            Participant::Attacker => {
                if test.attacker.has_rolled() {
                    return Ok(unchanged(test, Skip::AlreadyRolled));
                }
            }
            Participant::Defender(idx) => {
                let side = self.defender_side(&test, idx)?;
                if side.is_no_defense() {
                    return Ok(unchanged(test, Skip::NoDefense));
                }
                if side.has_rolled() {
                    return Ok(unchanged(test, Skip::AlreadyRolled));
                }
                if !test.attacker.has_rolled() {
                    return Ok(unchanged(test, Skip::AttackerNotRolled));
                }
            }
        }

        self.roll_side(&mut test, participant).await?;
        Ok((test, Transition::Applied))
    }

    /// Decide one defender and apply damage when the attack lands.
    ///
    /// A defender whose outcome was saved but whose damage never reached the
    /// record gets that damage now.
    pub async fn resolve(&self, test_id: &str, defender: usize) -> Result<(OpposedTest, Transition)> {
        let _guard = self.test_locks.acquire(test_id).await;
        let mut test = self.load_test(test_id).await?;
        let side = self.defender_side(&test, defender)?.clone();

        let pending_damage = test
            .outcome(defender)
            .map(|outcome| outcome.damage.is_some() && !outcome.damage_committed);
        match pending_damage {
            Some(false) => return Ok(unchanged(test, Skip::AlreadyResolved)),
            Some(true) => {
                tracing::warn!(test_id, defender = %side.actor_id, "resuming uncommitted damage");
                self.finish_damage(&mut test, defender).await?;
                return Ok((test, Transition::Applied));
            }
            None => {}
        }
        let Some(attack) = test.attacker.roll else {
            return Ok(unchanged(test, Skip::AttackerNotRolled));
        };
        let Some(choice) = side.committed else {
            return Ok(unchanged(test, Skip::DefenderNotReady));
        };
        if !side.is_ready() {
            return Ok(unchanged(test, Skip::DefenderNotReady));
        }

        let decision = decide(&attack, side.roll.as_ref(), choice);
        let mut hit = decision.winner == Winner::Attacker;

        let mut area_escape = None;
        if test.action.area && choice == DefenseChoice::Evade && decision.winner == Winner::Defender {
            let target = self.load_combatant(&side.actor_id).await?;
            let request = TargetRequest::characteristic(self.constants.defense.area_escape_characteristic.clone());
            let tn = target_number(&target, &request, &self.constants);
            let roll = self.roller.lock().await.d100();
            let escape = evaluate(roll, tn.value, &self.constants.contest);
            hit = !escape.success;
            area_escape = Some(escape);
        }

        let location = hit.then(|| match test.attacker.committed {
            Some(AttackChoice::Aimed { location }) => location,
            _ => self.constants.hit_locations.locate(attack.roll),
        });

        let mut damage = None;
        if let (Some(location), Some(spec)) = (location, test.action.damage.clone()) {
            let attacker = self.load_combatant(&test.attacker.actor_id).await?;
            let target = self.load_combatant(&side.actor_id).await?;
            let rolled = {
                let mut roller = self.roller.lock().await;
                spec.formula.roll(&mut **roller)
            };
            let components = attack_components(
                &attacker,
                f64::from(rolled.total),
                spec.damage_type,
                &test.action.name,
                &self.constants.damage,
            );
            let context = DamageContext {
                location,
                penetration: spec.penetration,
                success_degree_bonus: f64::from(attack.degree) * self.constants.damage.degree_bonus,
                ignore_reduction: spec.ignore_reduction,
                forceful: spec.forceful,
            };
            let (_, result) = apply_damage(&target, &components, &context, &self.constants.damage);
            damage = Some(result);
        }

        let has_damage = damage.is_some();
        test.outcomes[defender] = Some(Outcome {
            decision,
            area_escape,
            hit,
            location,
            damage,
            damage_committed: false,
        });
        if test.outcomes.iter().all(Option::is_some) {
            test.advance(Phase::Resolved);
        }
        // The outcome lands first; damage follows under the record tag
        self.save_test(&mut test).await?;

        tracing::info!(
            test_id,
            defender = %side.actor_id,
            winner = ?decision.winner,
            reason = ?decision.reason,
            hit,
            "defender resolved"
        );

        if has_damage {
            self.finish_damage(&mut test, defender).await?;
        }

        Ok((test, Transition::Applied))
    }

    /// Resolve every defender in order
    pub async fn resolve_all(&self, test_id: &str) -> Result<(OpposedTest, Vec<Transition>)> {
        let mut test = self.load_test(test_id).await?;
        let mut transitions = Vec::with_capacity(test.defenders.len());
        for idx in 0..test.defenders.len() {
            let (latest, transition) = self.resolve(test_id, idx).await?;
            transitions.push(transition);
            test = latest;
        }
        Ok((test, transitions))
    }

    async fn roll_all(&self, test: &mut OpposedTest) -> Result<()> {
        if !test.attacker.has_rolled() {
            match self.roll_side(test, Participant::Attacker).await {
                Ok(()) => {}
                Err(err) if err.is_resource_insufficient() => {
                    tracing::warn!(test_id = %test.id, error = %err, "attacker could not pay to roll");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        for idx in 0..test.defenders.len() {
            let side = &test.defenders[idx];
            if side.has_rolled() || side.is_no_defense() || !side.is_committed() {
                continue;
            }
            match self.roll_side(test, Participant::Defender(idx)).await {
                Ok(()) => {}
                Err(err) if err.is_resource_insufficient() => {
                    tracing::warn!(test_id = %test.id, defender = idx, error = %err, "defender could not pay to roll");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Spend the side's cost and record its roll as one unit.
    ///
    /// A refused spend withdraws the side's commitment; a failed save refunds
    /// the spend.
    async fn roll_side(&self, test: &mut OpposedTest, participant: Participant) -> Result<()> {
        let (actor, target, cost) = match participant {
            Participant::Attacker => (
                test.attacker.actor_id.clone(),
                test.attacker.target.as_ref().map_or(0, |t| t.value),
                self.attack_cost(&test.action),
            ),
            Participant::Defender(idx) => {
                let side = self.defender_side(test, idx)?;
                (
                    side.actor_id.clone(),
                    side.target.as_ref().map_or(0, |t| t.value),
                    self.constants.actions.defense_cost,
                )
            }
        };
        let resource = self.constants.actions.resource.as_str();

        if let Err(err) = self.ledger.spend(&actor, resource, cost).await {
            let err = ContestError::from(err);
            if err.is_resource_insufficient() {
                withdraw(test, participant);
                self.save_test(test).await?;
                tracing::info!(test_id = %test.id, actor = %actor, "commitment withdrawn, roll refused");
            }
            return Err(err);
        }

        let roll = self.roller.lock().await.d100();
        let result = evaluate(roll, target, &self.constants.contest);
        set_roll(test, participant, Some(result));

        if let Err(err) = self.save_test(test).await {
            set_roll(test, participant, None);
            if let Err(refund_err) = self.ledger.refund(&actor, resource, cost).await {
                tracing::error!(actor = %actor, error = %refund_err, "refund after failed save also failed");
            }
            return Err(err);
        }

        tracing::info!(
            test_id = %test.id,
            participant = %participant,
            actor = %actor,
            roll,
            target,
            success = result.success,
            degree = result.degree,
            "side rolled"
        );
        Ok(())
    }

    /// Commit a saved outcome's damage and mark the outcome committed
    async fn finish_damage(&self, test: &mut OpposedTest, defender: usize) -> Result<()> {
        let actor = self.defender_side(test, defender)?.actor_id.clone();
        let tag = damage_tag(&test.id, defender);
        let Some(outcome) = test.outcomes.get_mut(defender).and_then(Option::as_mut) else {
            return Ok(());
        };
        let Some(result) = outcome.damage.as_mut() else {
            return Ok(());
        };
        self.commit_damage(&actor, &tag, result).await?;
        outcome.damage_committed = true;
        self.save_test(test).await?;
        self.release_tag(&actor, &tag).await;
        Ok(())
    }

    /// Apply `result` to the defender's current record in one write.
    ///
    /// Health and durability move by the computed amounts from whatever the
    /// record holds now, floored at 0. A record already tagged with `tag` is
    /// left alone. `result` is updated to the values actually written.
    async fn commit_damage(&self, actor: &str, tag: &str, result: &mut DamageApplicationResult) -> Result<()> {
        {
            let _record_guard = self.record_locks.acquire(actor).await;
            let mut record = self
                .store
                .get(Collection::Combatants, actor)
                .await?
                .ok_or_else(|| InputError::UnknownCombatant(actor.to_string()))?;
            let current = Combatant::from_record(&record)?;

            if damage_applied(&record, tag) {
                tracing::debug!(actor, tag, "damage already on record");
            } else {
                let previous = current.health.value;
                let new_health = (previous - result.total_applied).max(0.0);
                write_health(&mut record, new_health)?;
                for event in &mut result.durability {
                    let loss = (event.previous - event.current).max(0.0);
                    let before = current
                        .possession(&event.possession_id)
                        .and_then(Possession::armor)
                        .map_or(event.previous, |armor| armor.durability);
                    event.previous = before;
                    event.current = (before - loss).max(0.0);
                    write_durability(&mut record, &event.possession_id, event.current)?;
                }
                mark_damage_applied(&mut record, tag)?;
                self.store.put(Collection::Combatants, actor, record).await?;
                result.previous_health = previous;
                result.new_health = new_health;
            }
        }

        let damage = &self.constants.damage;
        if result.wounded {
            self.conditions.add(actor, &damage.wounded_status).await?;
        }
        result.status_triggered = None;
        if result.is_knockout() {
            if !self.conditions.has(actor, &damage.unconscious_status).await? {
                self.conditions.add(actor, &damage.unconscious_status).await?;
            }
            if result.previous_health > 0.0 {
                result.status_triggered = Some(damage.unconscious_status.clone());
            }
        }
        tracing::debug!(actor, tag, new_health = result.new_health, "damage committed");
        Ok(())
    }

    /// Drop the record tag once the outcome says the damage is committed
    async fn release_tag(&self, actor: &str, tag: &str) {
        let _record_guard = self.record_locks.acquire(actor).await;
        let released = async {
            if let Some(mut record) = self.store.get(Collection::Combatants, actor).await? {
                if clear_damage_applied(&mut record, tag)? {
                    self.store.put(Collection::Combatants, actor, record).await?;
                }
            }
            Ok::<(), ContestError>(())
        }
        .await;
        if let Err(err) = released {
            tracing::warn!(actor, tag, error = %err, "damage tag left on record");
        }
    }

    async fn ensure_affordable(&self, actor: &str, cost: f64) -> Result<()> {
        if cost <= 0.0 {
            return Ok(());
        }
        let resource = &self.constants.actions.resource;
        let available = self.ledger.available(actor, resource).await?;
        if available < cost {
            return Err(ContestError::ResourceInsufficient {
                actor: actor.to_string(),
                resource: resource.clone(),
                needed: cost,
                available,
            });
        }
        Ok(())
    }

    fn attack_cost(&self, action: &ActionSpec) -> f64 {
        action.attack_cost.unwrap_or(self.constants.actions.attack_cost)
    }

    fn defense_request(&self, choice: DefenseChoice) -> Option<TargetRequest> {
        let defense = &self.constants.defense;
        match choice {
            DefenseChoice::Block => Some(TargetRequest::characteristic(defense.block_characteristic.clone())),
            DefenseChoice::Evade => Some(TargetRequest::characteristic(defense.evade_characteristic.clone())),
            DefenseChoice::NoDefense => None,
        }
    }

    fn defender_side<'a>(&self, test: &'a OpposedTest, idx: usize) -> Result<&'a Side<DefenseChoice>> {
        test.defenders.get(idx).ok_or_else(|| {
            InputError::UnknownDefender {
                test_id: test.id.clone(),
                index: idx,
            }
            .into()
        })
    }

    async fn load_combatant(&self, id: &str) -> Result<Combatant> {
        let record = self
            .store
            .get(Collection::Combatants, id)
            .await?
            .ok_or_else(|| InputError::UnknownCombatant(id.to_string()))?;
        Ok(Combatant::from_record(&record)?)
    }

    async fn load_test(&self, id: &str) -> Result<OpposedTest> {
        let record = self
            .store
            .get(Collection::Tests, id)
            .await?
            .ok_or_else(|| InputError::UnknownTest(id.to_string()))?;
        Ok(serde_json::from_value(record)?)
    }

    async fn save_test(&self, test: &mut OpposedTest) -> Result<()> {
        test.revision += 1;
        let record = serde_json::to_value(&*test)?;
        self.store.put(Collection::Tests, &test.id, record).await?;
        Ok(())
    }
}

fn damage_tag(test_id: &str, defender: usize) -> String {
    format!("{test_id}:{defender}")
}

fn unchanged(test: OpposedTest, skip: Skip) -> (OpposedTest, Transition) {
    tracing::debug!(test_id = %test.id, ?skip, "transition skipped");
    (test, Transition::Unchanged(skip))
}

fn withdraw(test: &mut OpposedTest, participant: Participant) {
    match participant {
        Participant::Attacker => {
            test.attacker.committed = None;
            test.attacker.target = test.attacker.target.take().map(|t| t.without_term(AIMED_LABEL));
        }
        Participant::Defender(idx) => {
            if let Some(side) = test.defenders.get_mut(idx) {
                side.committed = None;
                side.target = None;
            }
        }
    }
}

fn set_roll(test: &mut OpposedTest, participant: Participant, roll: Option<crate::dice::TestResult>) {
    match participant {
        Participant::Attacker => test.attacker.roll = roll,
        Participant::Defender(idx) => {
            if let Some(side) = test.defenders.get_mut(idx) {
                side.roll = roll;
            }
        }
    }
}
