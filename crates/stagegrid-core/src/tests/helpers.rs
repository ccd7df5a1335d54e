//! Test helper functions for setting up battles and entities.
//!
//! This module provides factory functions and setup utilities that make
//! writing tests more ergonomic and consistent.

use std::cell::RefCell;
use std::rc::Rc;

use crate::battle::Battle;
use crate::entity::{EntityId, EntitySpec, Traits};
use crate::events::BattleEvent;
use crate::grid::{Cell, StageDefinition, Team};

/// Installs a test-writer `tracing` subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// =============================================================================
// Battle Setup
// =============================================================================

/// A 6x3 stage: player columns 0-2, enemy columns 3-5.
pub fn standard_stage() -> StageDefinition {
    StageDefinition::rectangle(6, 3, 3)
}

/// A battle on the standard stage with default tuning.
pub fn new_battle() -> Battle {
    init_tracing();
    Battle::from_stage(&standard_stage())
}

/// A grounded, stunnable combatant spec.
pub fn fighter(team: Team, health: i32) -> EntitySpec {
    EntitySpec::new(team, health).with_traits(Traits::GROUNDED | Traits::STUNNABLE)
}

/// Spawns a fighter and discards the spawn notification.
pub fn spawn_fighter(battle: &mut Battle, team: Team, x: i32, y: i32) -> EntityId {
    spawn_with(battle, &fighter(team, 100), x, y)
}

/// Spawns from a spec and discards the spawn notification.
pub fn spawn_with(battle: &mut Battle, spec: &EntitySpec, x: i32, y: i32) -> EntityId {
    let id = battle
        .spawn(spec, Cell::new(x, y))
        .unwrap_or_else(|err| panic!("spawn at ({x}, {y}) failed: {err}"));
    battle.take_events();
    id
}

/// Sets up a player at (1, 1) facing an enemy at (4, 1).
pub fn setup_duel(battle: &mut Battle) -> (EntityId, EntityId) {
    let player = spawn_fighter(battle, Team::Player, 1, 1);
    let enemy = spawn_fighter(battle, Team::Enemy, 4, 1);
    (player, enemy)
}

// =============================================================================
// Time and Events
// =============================================================================

/// Ticks in fixed steps until `seconds` have elapsed.
pub fn run_for(battle: &mut Battle, seconds: f32) {
    let dt = battle.config().fixed_dt;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = (seconds / dt).round() as u32;
    for _ in 0..steps {
        battle.step();
    }
}

/// Records every event into a shared list.
pub fn record_events(battle: &mut Battle) -> Rc<RefCell<Vec<BattleEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    battle.subscribe_all(move |event| sink.borrow_mut().push(event.clone()));
    log
}

/// Counts hurt notifications for `entity`.
pub fn hurt_count(events: &[BattleEvent], entity: EntityId) -> usize {
    events
        .iter()
        .filter(|e| e.is_hurt() && e.entity() == entity)
        .count()
}

/// Counts death notifications for `entity`.
pub fn death_count(events: &[BattleEvent], entity: EntityId) -> usize {
    events
        .iter()
        .filter(|e| e.is_death() && e.entity() == entity)
        .count()
}

/// Current health, or zero once despawned.
pub fn health(battle: &Battle, entity: EntityId) -> i32 {
    battle.entity(entity).map_or(0, |e| e.current_health())
}
