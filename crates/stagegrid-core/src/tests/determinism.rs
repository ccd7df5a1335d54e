//! Determinism verification tests.
//!
//! These tests verify that a battle produces identical results when given
//! identical spawns and identical call sequences. Event logs, entity state
//! and the serialized registry must all match.

use crate::battle::Battle;
use crate::behavior::Explosive;
use crate::entity::EntityId;
use crate::events::BattleEvent;
use crate::grid::{Cell, Team};
use crate::payload::{AttackPayload, Element};
use crate::status::StatusEffectKind;

use super::helpers::{fighter, new_battle, run_for, spawn_fighter, spawn_with};

// =============================================================================
// Scripted Scenario
// =============================================================================

/// Spawns a small skirmish and drives it through every subsystem.
fn scripted_battle() -> (Battle, Vec<BattleEvent>) {
    let mut battle = new_battle();
    let mut log = Vec::new();

    let player = spawn_fighter(&mut battle, Team::Player, 1, 1);
    let ally = spawn_fighter(&mut battle, Team::Player, 0, 2);
    let grunt = spawn_fighter(&mut battle, Team::Enemy, 3, 1);
    let bomb = spawn_with(&mut battle, &fighter(Team::Enemy, 30), 4, 1);
    let tank = spawn_with(&mut battle, &fighter(Team::Enemy, 300).with_defense(0.5), 5, 1);
    battle
        .set_behavior(bomb, Explosive::cross(AttackPayload::new(20).piercing()))
        .unwrap_or_else(|err| panic!("behavior rejected: {err}"));

    battle.apply_status(grunt, StatusEffectKind::Bleeding);
    battle.mark_for_death(tank);
    let _ = battle.move_by(player, 0, -1);
    let _ = battle.move_by(ally, 1, 0);
    run_for(&mut battle, 0.25);
    log.extend(battle.take_events());

    battle.resolve_attack(
        tank,
        &AttackPayload::new(25).with_element(Element::Fire).from_attacker(player),
    );
    battle.shove(grunt, 1, 0);
    battle.apply_direct_damage(bomb, 10, Some((0.2, 1.0)));
    run_for(&mut battle, 0.5);
    log.extend(battle.take_events());

    battle.resolve_attack(bomb, &AttackPayload::new(60).with_status(StatusEffectKind::Frozen));
    let _ = battle.move_by(player, 1, 0);
    battle.apply_status(player, StatusEffectKind::Rooted);
    run_for(&mut battle, 3.0);
    log.extend(battle.take_events());

    (battle, log)
}

fn snapshot(battle: &Battle) -> String {
    serde_json::to_string(battle.registry())
        .unwrap_or_else(|err| panic!("registry should serialize: {err}"))
}

// =============================================================================
// Determinism Tests
// =============================================================================

/// Two identical scripted runs produce identical event logs.
#[test]
fn identical_scripts_produce_identical_logs() {
    let (_, log1) = scripted_battle();
    let (_, log2) = scripted_battle();

    assert!(!log1.is_empty());
    assert_eq!(log1.len(), log2.len(), "Event counts should match");
    assert_eq!(log1, log2, "Event logs should be identical");
}

/// Two identical scripted runs end in identical entity state.
#[test]
fn identical_scripts_produce_identical_state() {
    let (battle1, _) = scripted_battle();
    let (battle2, _) = scripted_battle();

    let ids1: Vec<EntityId> = battle1.registry().ids_sorted().collect();
    let ids2: Vec<EntityId> = battle2.registry().ids_sorted().collect();
    assert_eq!(ids1, ids2, "Surviving entity IDs should be identical");

    for id in &ids1 {
        assert_eq!(
            battle1.entity(*id),
            battle2.entity(*id),
            "Entity state should be identical for {id:?}"
        );
    }
    assert_eq!(snapshot(&battle1), snapshot(&battle2));
    assert!((battle1.elapsed() - battle2.elapsed()).abs() < f64::EPSILON);
}

/// The scripted skirmish actually kills the bomb and its blast reaches the grunt.
#[test]
fn scripted_battle_exercises_destruction() {
    let (battle, log) = scripted_battle();
    let deaths: Vec<EntityId> = log
        .iter()
        .filter(|e| e.is_death())
        .map(BattleEvent::entity)
        .collect();

    assert!(!deaths.is_empty());
    for id in &deaths {
        assert!(battle.entity(*id).is_none());
    }
    assert!(battle.entity_at(Cell::new(4, 1)).is_none());
}

/// Repeated runs of the same setup agree on every intermediate tick.
#[test]
fn per_tick_events_match() {
    let mut runs: Vec<Vec<Vec<BattleEvent>>> = Vec::new();
    for _ in 0..3 {
        let mut battle = new_battle();
        let player = spawn_fighter(&mut battle, Team::Player, 1, 1);
        let enemy = spawn_fighter(&mut battle, Team::Enemy, 4, 1);
        battle.apply_status(enemy, StatusEffectKind::Burning);
        battle.apply_direct_damage(player, 3, Some((0.1, 0.5)));
        let _ = battle.move_by(player, 1, 0);

        let frames = (0..120)
            .map(|_| {
                battle.step();
                battle.take_events()
            })
            .collect();
        runs.push(frames);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}
