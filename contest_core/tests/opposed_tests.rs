//! End-to-end opposed tests against an in-memory store

use contest_core::contest::ContestReason;
use contest_core::coordinator::{DefenderProgress, Skip};
use contest_core::dice::DiceFormula;
use async_trait::async_trait;
use contest_core::host::{StoreError, StoreLedger};
use contest_core::prelude::*;
use serde_json::{json, Value};
use sheet_core::{DamageType, HitLocation};
use std::sync::{Arc, Mutex};

fn combatant(id: &str, health: f64, combat: f64, evade: f64, action_points: f64) -> Value {
    json!({
        "id": id,
        "name": id,
        "health": {"value": health, "max": health},
        "characteristics": {"combat": combat, "evade": evade, "agility": 50},
        "resources": {"action_points": {"value": action_points, "max": 3}},
        "statuses": []
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn arena(records: Vec<Value>, rolls: Vec<u32>) -> (Arc<MemoryStore>, OpposedTestCoordinator) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    for record in records {
        store.insert_combatant(record).await.unwrap();
    }
    let coordinator =
        OpposedTestCoordinator::in_memory(store.clone(), ReplayRoller::new(rolls), Arc::new(EngineConstants::default()));
    (store, coordinator)
}

async fn record(store: &MemoryStore, id: &str) -> Value {
    store.get(Collection::Combatants, id).await.unwrap().unwrap()
}

/// Yields on every call, and fails one armed `put` after letting `skip`
/// matching writes through
#[derive(Default)]
struct ShakyStore {
    inner: MemoryStore,
    armed: Mutex<Option<(Collection, String, usize)>>,
}

impl ShakyStore {
    fn fail_put(&self, collection: Collection, id: &str, skip: usize) {
        *self.armed.lock().unwrap() = Some((collection, id.to_string(), skip));
    }

    fn should_fail(&self, collection: Collection, id: &str) -> bool {
        let mut armed = self.armed.lock().unwrap();
        match armed.as_mut() {
            Some((c, target, skip)) if *c == collection && target == id => {
                if *skip == 0 {
                    *armed = None;
                    true
                } else {
                    *skip -= 1;
                    false
                }
            }
            _ => false,
        }
    }
}

#[async_trait]
impl DocumentStore for ShakyStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(collection, id).await
    }

    async fn put(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        if self.should_fail(collection, id) {
            return Err(StoreError::Backend(format!("write to {collection}/{id} dropped")));
        }
        self.inner.put(collection, id, record).await
    }
}

async fn shaky_arena(records: Vec<Value>, rolls: Vec<u32>) -> (Arc<ShakyStore>, OpposedTestCoordinator) {
    init_tracing();
    let store = Arc::new(ShakyStore::default());
    for record in records {
        store.inner.insert_combatant(record).await.unwrap();
    }
    let coordinator =
        OpposedTestCoordinator::over_store(store.clone(), ReplayRoller::new(rolls), Arc::new(EngineConstants::default()));
    (store, coordinator)
}

/// Open a test against `defender`, who takes the hit, and roll it
async fn undefended(coordinator: &OpposedTestCoordinator, attacker: &str, defender: &str, damage: i32) -> String {
    let jab = ActionSpec::new("Jab", TargetRequest::characteristic("combat"))
        .with_damage(DamageSpec::new(DiceFormula::flat(damage), DamageType::Physical));
    let test = coordinator.create_pending(attacker, &[defender], jab).await.unwrap();
    coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::NoDefense))
        .await
        .unwrap();
    coordinator
        .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
        .await
        .unwrap();
    test.id
}

fn sword() -> ActionSpec {
    ActionSpec::new("Sword", TargetRequest::characteristic("combat"))
        .with_damage(DamageSpec::new(DiceFormula::parse("1d6+4").unwrap(), DamageType::Physical))
}

#[tokio::test]
async fn block_holds_against_better_attack() {
    let (store, coordinator) = arena(
        vec![combatant("hero", 20.0, 45.0, 30.0, 3.0), combatant("orc", 12.0, 40.0, 30.0, 3.0)],
        vec![30, 38],
    )
    .await;

    let test = coordinator.create_pending("hero", &["orc"], sword()).await.unwrap();
    assert_eq!(test.phase, Phase::Pending);
    assert_eq!(test.attacker.target.as_ref().map(|t| t.value), Some(45));

    let (test, transition) = coordinator
        .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
        .await
        .unwrap();
    assert!(transition.is_applied());
    assert_eq!(test.phase, Phase::AwaitingDefense);
    assert!(test.attacker.roll.is_none());

    let (test, _) = coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::Block))
        .await
        .unwrap();
    let attack = test.attacker.roll.unwrap();
    let block = test.defenders[0].roll.unwrap();
    assert_eq!((attack.roll, attack.success, attack.degree), (30, true, 1));
    assert_eq!((block.roll, block.target, block.success, block.degree), (38, 40, true, 0));

    let (test, _) = coordinator.resolve(&test.id, 0).await.unwrap();
    let outcome = test.outcome(0).unwrap();
    assert_eq!(outcome.decision.winner, Winner::Defender);
    assert_eq!(outcome.decision.reason, ContestReason::BlockHeld);
    assert!(!outcome.hit);
    assert!(outcome.damage.is_none());
    assert_eq!(test.phase, Phase::Resolved);

    let orc = record(&store, "orc").await;
    assert_eq!(orc["health"]["value"], json!(12.0));
    assert_eq!(orc["resources"]["action_points"]["value"], json!(2.0));
    assert_eq!(record(&store, "hero").await["resources"]["action_points"]["value"], json!(2.0));
}

#[tokio::test]
async fn repeated_transitions_are_no_ops() {
    let (store, coordinator) = arena(
        vec![combatant("hero", 20.0, 45.0, 30.0, 3.0), combatant("orc", 12.0, 40.0, 30.0, 3.0)],
        vec![10, 80, 3],
    )
    .await;
    let test = coordinator.create_pending("hero", &["orc"], sword()).await.unwrap();

    let (first, _) = coordinator
        .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
        .await
        .unwrap();
    let (again, transition) = coordinator
        .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
        .await
        .unwrap();
    assert_eq!(transition, Transition::Unchanged(Skip::AlreadyCommitted));
    assert_eq!(again, first);

    let (_, transition) = coordinator.roll(&test.id, Participant::Attacker).await.unwrap();
    assert_eq!(transition, Transition::Unchanged(Skip::BarrierNotMet));

    let (rolled, _) = coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::Evade))
        .await
        .unwrap();
    let (_, transition) = coordinator.roll(&test.id, Participant::Defender(0)).await.unwrap();
    assert_eq!(transition, Transition::Unchanged(Skip::AlreadyRolled));

    let (resolved, transition) = coordinator.resolve(&test.id, 0).await.unwrap();
    assert!(transition.is_applied());
    let outcome = resolved.outcome(0).unwrap();
    assert!(outcome.hit);
    assert!(outcome.damage_committed);
    let damage = outcome.damage.clone().unwrap();
    // 1d6 rolled 3, +4
    assert_eq!(damage.total_applied, 7.0);
    assert!(resolved.revision > rolled.revision);

    let (twice, transition) = coordinator.resolve(&test.id, 0).await.unwrap();
    assert_eq!(transition, Transition::Unchanged(Skip::AlreadyResolved));
    assert_eq!(twice, resolved);
    assert_eq!(record(&store, "orc").await["health"]["value"], json!(5.0));

    for participant in [Participant::Attacker, Participant::Defender(0)] {
        let (_, transition) = coordinator.roll(&test.id, participant).await.unwrap();
        assert_eq!(transition, Transition::Unchanged(Skip::AlreadyResolved));
    }
}

#[tokio::test]
async fn area_evade_needs_escape() {
    let (store, coordinator) = arena(
        vec![
            combatant("mage", 20.0, 45.0, 30.0, 3.0),
            combatant("quick", 12.0, 30.0, 30.0, 3.0),
            combatant("slow", 12.0, 30.0, 30.0, 3.0),
        ],
        // attack, quick evade, slow evade, quick escape, slow escape, damage die
        vec![30, 5, 8, 20, 90, 6],
    )
    .await;
    let fireball = ActionSpec::new("Fireball", TargetRequest::characteristic("combat"))
        .with_damage(DamageSpec::new(DiceFormula::parse("1d6+4").unwrap(), DamageType::Fire))
        .area();

    let test = coordinator.create_pending("mage", &["quick", "slow"], fireball).await.unwrap();
    coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::Evade))
        .await
        .unwrap();
    coordinator
        .commit(&test.id, Participant::Defender(1), Choice::Defense(DefenseChoice::Evade))
        .await
        .unwrap();
    let (test, _) = coordinator
        .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
        .await
        .unwrap();
    assert!(test.defenders.iter().all(|d| d.roll.is_some()));

    let (test, transitions) = coordinator.resolve_all(&test.id).await.unwrap();
    assert!(transitions.iter().all(Transition::is_applied));
    assert_eq!(test.phase, Phase::Resolved);

    let quick = test.outcome(0).unwrap();
    assert_eq!(quick.decision.winner, Winner::Defender);
    assert!(quick.area_escape.unwrap().success);
    assert!(!quick.hit);

    let slow = test.outcome(1).unwrap();
    assert_eq!(slow.decision.winner, Winner::Defender);
    assert!(!slow.area_escape.unwrap().success);
    assert!(slow.hit);
    assert_eq!(slow.location, Some(HitLocation::Body));
    assert_eq!(slow.damage.as_ref().map(|d| d.total_applied), Some(10.0));

    assert_eq!(record(&store, "quick").await["health"]["value"], json!(12.0));
    assert_eq!(record(&store, "slow").await["health"]["value"], json!(2.0));
}

#[tokio::test]
async fn commit_refused_without_resources() {
    let (_, coordinator) = arena(
        vec![combatant("hero", 20.0, 45.0, 30.0, 3.0), combatant("tired", 12.0, 40.0, 30.0, 0.0)],
        vec![30],
    )
    .await;
    let test = coordinator.create_pending("hero", &["tired"], sword()).await.unwrap();

    let err = coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::Block))
        .await
        .unwrap_err();
    assert!(err.is_resource_insufficient());

    let after = coordinator.test(&test.id).await.unwrap();
    assert_eq!(after, test);
    assert_eq!(after.defender_progress(0), Some(DefenderProgress::Uncommitted));

    // Taking the hit costs nothing
    let (after, transition) = coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::NoDefense))
        .await
        .unwrap();
    assert!(transition.is_applied());
    assert!(after.defenders[0].is_no_defense());
}

#[tokio::test]
async fn roll_refusal_withdraws_commitment() {
    let (store, coordinator) = arena(
        vec![combatant("hero", 20.0, 45.0, 30.0, 3.0), combatant("orc", 12.0, 40.0, 30.0, 1.0)],
        vec![30],
    )
    .await;
    let test = coordinator.create_pending("hero", &["orc"], sword()).await.unwrap();
    coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::Block))
        .await
        .unwrap();

    // Spent elsewhere before the barrier fired
    StoreLedger::new(store.clone()).spend("orc", "action_points", 1.0).await.unwrap();

    let (test, _) = coordinator
        .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
        .await
        .unwrap();
    assert!(test.attacker.roll.is_some());
    assert!(test.defenders[0].committed.is_none());
    assert!(test.defenders[0].roll.is_none());
    assert!(!test.barrier_met());

    let (_, transition) = coordinator.resolve(&test.id, 0).await.unwrap();
    assert_eq!(transition, Transition::Unchanged(Skip::DefenderNotReady));
    assert_eq!(record(&store, "hero").await["resources"]["action_points"]["value"], json!(2.0));
}

#[tokio::test]
async fn uncommitted_defender_never_resolves() {
    let (_, coordinator) = arena(
        vec![
            combatant("hero", 20.0, 45.0, 30.0, 3.0),
            combatant("orc", 12.0, 40.0, 30.0, 3.0),
            combatant("goblin", 8.0, 30.0, 30.0, 3.0),
        ],
        vec![30, 50],
    )
    .await;
    let test = coordinator.create_pending("hero", &["orc", "goblin"], sword()).await.unwrap();
    coordinator
        .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
        .await
        .unwrap();
    coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::Block))
        .await
        .unwrap();

    let (test, transitions) = coordinator.resolve_all(&test.id).await.unwrap();
    assert!(transitions.iter().all(|t| !t.is_applied()));
    assert!(test.outcomes.iter().all(Option::is_none));
    assert_ne!(test.phase, Phase::Resolved);
    assert_eq!(test.defender_progress(1), Some(DefenderProgress::Uncommitted));

    // The orc's block choice stays hidden from the goblin
    let view = coordinator.view(&test.id, Participant::Defender(1)).await.unwrap();
    assert_eq!(view.defenders[0].committed, None);
    assert_eq!(view.attacker.committed, None);
}

#[tokio::test]
async fn knockout_marks_unconscious_once() {
    let (store, coordinator) = arena(
        vec![combatant("ogre", 30.0, 60.0, 30.0, 3.0), combatant("orc", 12.0, 40.0, 30.0, 3.0)],
        vec![20, 25],
    )
    .await;
    let club = ActionSpec::new("Club", TargetRequest::characteristic("combat"))
        .with_damage(DamageSpec::new(DiceFormula::flat(15), DamageType::Physical));

    for _ in 0..2 {
        let test = coordinator.create_pending("ogre", &["orc"], club.clone()).await.unwrap();
        coordinator
            .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::NoDefense))
            .await
            .unwrap();
        coordinator
            .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
            .await
            .unwrap();
        let (test, _) = coordinator.resolve(&test.id, 0).await.unwrap();
        assert!(test.outcome(0).unwrap().hit);
    }

    let orc = record(&store, "orc").await;
    assert_eq!(orc["health"]["value"], json!(0.0));
    assert_eq!(orc["statuses"], json!(["unconscious"]));
}

#[tokio::test]
async fn unknown_test_is_input_error() {
    let (_, coordinator) = arena(vec![], vec![]).await;
    let err = coordinator.resolve("missing", 0).await.unwrap_err();
    assert!(matches!(err, ContestError::Input(InputError::UnknownTest(_))));
}

#[tokio::test]
async fn concurrent_hits_on_one_defender_both_land() {
    let (store, coordinator) = shaky_arena(
        vec![
            combatant("a1", 20.0, 45.0, 30.0, 3.0),
            combatant("a2", 20.0, 45.0, 30.0, 3.0),
            combatant("orc", 20.0, 40.0, 30.0, 3.0),
        ],
        vec![10, 10],
    )
    .await;
    let first = undefended(&coordinator, "a1", "orc", 5).await;
    let second = undefended(&coordinator, "a2", "orc", 5).await;

    let (left, right) = tokio::join!(coordinator.resolve(&first, 0), coordinator.resolve(&second, 0));
    let (left, _) = left.unwrap();
    let (right, _) = right.unwrap();

    let mut healths: Vec<f64> = [left, right]
        .iter()
        .map(|test| test.outcome(0).and_then(|o| o.damage.as_ref()).unwrap().new_health)
        .collect();
    healths.sort_by(f64::total_cmp);
    assert_eq!(healths, vec![10.0, 15.0]);

    let orc = store.get(Collection::Combatants, "orc").await.unwrap().unwrap();
    assert_eq!(orc["health"]["value"], json!(10.0));
    assert!(orc.get("applied_damage").is_none());
}

#[tokio::test]
async fn failed_health_write_is_finished_on_retry() {
    let (store, coordinator) = shaky_arena(
        vec![combatant("hero", 20.0, 45.0, 30.0, 3.0), combatant("orc", 20.0, 40.0, 30.0, 3.0)],
        vec![10],
    )
    .await;
    let test_id = undefended(&coordinator, "hero", "orc", 5).await;

    store.fail_put(Collection::Combatants, "orc", 0);
    let err = coordinator.resolve(&test_id, 0).await.unwrap_err();
    assert!(matches!(err, ContestError::Store(_)));
    let stalled = coordinator.test(&test_id).await.unwrap();
    assert!(!stalled.outcome(0).unwrap().damage_committed);
    let orc = store.get(Collection::Combatants, "orc").await.unwrap().unwrap();
    assert_eq!(orc["health"]["value"], json!(20.0));

    let (test, transition) = coordinator.resolve(&test_id, 0).await.unwrap();
    assert!(transition.is_applied());
    assert!(test.outcome(0).unwrap().damage_committed);

    let (_, transition) = coordinator.resolve(&test_id, 0).await.unwrap();
    assert_eq!(transition, Transition::Unchanged(Skip::AlreadyResolved));
    let orc = store.get(Collection::Combatants, "orc").await.unwrap().unwrap();
    assert_eq!(orc["health"]["value"], json!(15.0));
}

#[tokio::test]
async fn lost_commit_flag_does_not_double_damage() {
    let (store, coordinator) = shaky_arena(
        vec![combatant("hero", 20.0, 45.0, 30.0, 3.0), combatant("orc", 20.0, 40.0, 30.0, 3.0)],
        vec![10],
    )
    .await;
    let test_id = undefended(&coordinator, "hero", "orc", 5).await;

    // The outcome save goes through, the damage-committed save does not
    store.fail_put(Collection::Tests, &test_id, 1);
    assert!(coordinator.resolve(&test_id, 0).await.is_err());
    let orc = store.get(Collection::Combatants, "orc").await.unwrap().unwrap();
    assert_eq!(orc["health"]["value"], json!(15.0));

    let (test, transition) = coordinator.resolve(&test_id, 0).await.unwrap();
    assert!(transition.is_applied());
    assert!(test.outcome(0).unwrap().damage_committed);

    let orc = store.get(Collection::Combatants, "orc").await.unwrap().unwrap();
    assert_eq!(orc["health"]["value"], json!(15.0));
    assert!(orc.get("applied_damage").is_none());
}

#[tokio::test]
async fn commit_returns_only_what_the_participant_may_see() {
    let (_, coordinator) = arena(
        vec![
            combatant("hero", 20.0, 45.0, 30.0, 3.0),
            combatant("orc", 12.0, 40.0, 30.0, 3.0),
            combatant("goblin", 8.0, 30.0, 30.0, 3.0),
        ],
        vec![30, 50, 60],
    )
    .await;
    let test = coordinator.create_pending("hero", &["orc", "goblin"], sword()).await.unwrap();
    coordinator
        .commit(&test.id, Participant::Defender(0), Choice::Defense(DefenseChoice::Block))
        .await
        .unwrap();

    let (seen, _) = coordinator
        .commit(&test.id, Participant::Defender(1), Choice::Defense(DefenseChoice::Evade))
        .await
        .unwrap();
    assert!(!seen.barrier_met());
    assert_eq!(seen.defenders[0].committed, None);
    assert_eq!(seen.defenders[0].target, None);
    assert_eq!(seen.defenders[1].committed, Some(DefenseChoice::Evade));

    let (again, transition) = coordinator
        .commit(&test.id, Participant::Defender(1), Choice::Defense(DefenseChoice::Block))
        .await
        .unwrap();
    assert_eq!(transition, Transition::Unchanged(Skip::AlreadyCommitted));
    assert_eq!(again.defenders[0].committed, None);

    let (seen, transition) = coordinator.roll(&test.id, Participant::Defender(1)).await.unwrap();
    assert_eq!(transition, Transition::Unchanged(Skip::BarrierNotMet));
    assert_eq!(seen.defenders[0].committed, None);

    // Once everyone is in, nothing is withheld
    let (open, _) = coordinator
        .commit(&test.id, Participant::Attacker, Choice::Attack(AttackChoice::Standard))
        .await
        .unwrap();
    assert!(open.barrier_met());
    assert_eq!(open.defenders[0].committed, Some(DefenseChoice::Block));
}
