//! Battle driver.
//!
//! [`Battlefield`] is the shared mutable state of one battle: grid, entity
//! registry, scheduler, event bus, injected behaviors and deferred commands.
//! The subsystems ([`StatusEngine`], [`DamagePipeline`],
//! [`MovementController`]) hold only tuning and operate on a borrowed
//! battlefield, so every dependency is passed in explicitly.
//!
//! [`Battle`] wires them together and is the public entry point. Each call
//! runs to completion synchronously; timed work is suspended in the
//! scheduler and resumed by [`Battle::tick`]:
//!
//! 1. **ADVANCE**: every pending task counts down by `dt`
//! 2. **DISPATCH**: due tasks run earliest-deadline first, ties by task ID
//! 3. **COMMANDS**: behavior commands queued by a dispatch run in order
//!    before the next task is dispatched
//!
//! # Determinism
//!
//! The same stage, config and call sequence produce the same event log:
//! - Entities, tiles and tasks live in `BTreeMap`s (ordered iteration)
//! - IDs for entities and tasks are assigned monotonically
//! - Nothing reads wall-clock time or randomness
//!
//! # Example
//!
//! ```
//! use stagegrid_core::battle::Battle;
//! use stagegrid_core::entity::{EntitySpec, Traits};
//! use stagegrid_core::events::BattleEvent;
//! use stagegrid_core::grid::{Cell, StageDefinition, Team};
//! use stagegrid_core::payload::AttackPayload;
//!
//! let mut battle = Battle::from_stage(&StageDefinition::rectangle(6, 3, 3));
//! let spec = EntitySpec::new(Team::Enemy, 100).with_traits(Traits::GROUNDED);
//! let enemy = battle.spawn(&spec, Cell::new(4, 1)).unwrap();
//! battle.take_events();
//!
//! let outcome = battle.resolve_attack(enemy, &AttackPayload::new(30));
//! assert_eq!(outcome.applied_damage, 30);
//! assert_eq!(battle.entity(enemy).unwrap().current_health(), 70);
//!
//! let events = battle.take_events();
//! assert!(matches!(events[0], BattleEvent::Hurt { damage: 30, .. }));
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use tracing::{debug, info};

use crate::behavior::{BattleCommand, EntityBehavior};
use crate::config::{BattleConfig, DamageOverTime};
use crate::damage::{AttackOutcome, DamagePipeline, DirectDamageOutcome};
use crate::entity::{Entity, EntityId, EntityRegistry, EntitySpec};
use crate::error::{BattleError, Blocked, ConfigError, GridError};
use crate::events::{BattleEvent, EventBus};
use crate::grid::{Cell, Grid, StageDefinition, Tile};
use crate::movement::{MovementController, ShoveOutcome};
use crate::payload::{AttackPayload, HitParams};
use crate::scheduler::{Buff, Job, Scheduler, Task, TaskId};
use crate::status::{StatusEffectInstance, StatusEffectKind, StatusEngine, StatusOutcome};

// =============================================================================
// Battlefield
// =============================================================================

/// Mutable state shared by every subsystem.
pub struct Battlefield {
    pub(crate) grid: Grid,
    pub(crate) registry: EntityRegistry,
    pub(crate) scheduler: Scheduler,
    pub(crate) events: EventBus,
    pub(crate) behaviors: BTreeMap<EntityId, Box<dyn EntityBehavior>>,
    pub(crate) pending: VecDeque<BattleCommand>,
}

impl fmt::Debug for Battlefield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Battlefield")
            .field("grid", &self.grid)
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .field("events", &self.events)
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .field("pending", &self.pending)
            .finish()
    }
}

impl Battlefield {
    /// Creates an empty battlefield on the given stage.
    #[must_use]
    pub fn new(stage: &StageDefinition) -> Self {
        Self {
            grid: Grid::from_stage(stage),
            registry: EntityRegistry::new(),
            scheduler: Scheduler::new(),
            events: EventBus::new(),
            behaviors: BTreeMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// The grid.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// The entity registry.
    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// The scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Registers an entity on a free cell and marks the tile occupied.
    pub(crate) fn insert_entity(
        &mut self,
        spec: &EntitySpec,
        cell: Cell,
    ) -> Result<EntityId, BattleError> {
        spec.validate()?;
        let tile = self.grid.tile(cell)?;
        if tile.occupied {
            return Err(BattleError::CellUnavailable(cell));
        }
        let id = self.registry.insert(spec, cell);
        self.grid.set_occupant(cell, Some(id))?;
        self.events.emit(BattleEvent::TileEnter { cell, entity: id });
        info!(entity = %id, %cell, team = %spec.team, "entity spawned");
        Ok(id)
    }

    /// Releases every tile `entity` still holds a claim on.
    pub(crate) fn release_claims(&mut self, entity: EntityId) {
        let Some(record) = self.registry.get_mut(entity) else {
            return;
        };
        for cell in record.take_claims() {
            let held = self
                .grid
                .tile(cell)
                .is_ok_and(|tile| tile.is_claimed_by(entity));
            if held {
                if let Err(err) = self.grid.release(cell) {
                    debug!(%entity, %err, "claim release failed");
                }
            }
        }
    }
}

// =============================================================================
// Battle
// =============================================================================

/// One battle session.
#[derive(Debug)]
pub struct Battle {
    config: BattleConfig,
    field: Battlefield,
    pipeline: DamagePipeline,
    movement: MovementController,
}

impl Battle {
    /// Creates a battle on `stage` with validated tuning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the config is out of range.
    pub fn new(stage: &StageDefinition, config: BattleConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(stage, config))
    }

    /// Creates a battle on `stage` with default tuning.
    #[must_use]
    pub fn from_stage(stage: &StageDefinition) -> Self {
        Self::build(stage, BattleConfig::default())
    }

    fn build(stage: &StageDefinition, config: BattleConfig) -> Self {
        Self {
            field: Battlefield::new(stage),
            pipeline: DamagePipeline::new(&config),
            movement: MovementController::new(&config),
            config,
        }
    }

    /// Tuning in use.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// The shared battle state.
    #[must_use]
    pub const fn field(&self) -> &Battlefield {
        &self.field
    }

    /// The status engine.
    #[must_use]
    pub const fn statuses(&self) -> &StatusEngine {
        self.pipeline.statuses()
    }

    // -------------------------------------------------------------------------
    // Entities
    // -------------------------------------------------------------------------

    /// Spawns an entity on `cell`.
    ///
    /// # Errors
    ///
    /// - [`BattleError::InvalidSpec`] if the spec breaks a health invariant
    /// - [`BattleError::Grid`] if the cell is not part of the stage
    /// - [`BattleError::CellUnavailable`] if the tile is occupied or claimed
    pub fn spawn(&mut self, spec: &EntitySpec, cell: Cell) -> Result<EntityId, BattleError> {
        self.field.insert_entity(spec, cell)
    }

    /// Attaches a behavior to an entity, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the entity is not registered.
    pub fn set_behavior(
        &mut self,
        entity: EntityId,
        behavior: impl EntityBehavior + 'static,
    ) -> Result<(), BattleError> {
        if !self.field.registry.contains(entity) {
            return Err(BattleError::UnknownEntity(entity));
        }
        self.field.behaviors.insert(entity, Box::new(behavior));
        Ok(())
    }

    /// Registers an observer for events about `entity`.
    pub fn subscribe(&mut self, entity: EntityId, observer: impl FnMut(&BattleEvent) + 'static) {
        self.field.events.subscribe(entity, observer);
    }

    /// Registers an observer for every event.
    pub fn subscribe_all(&mut self, observer: impl FnMut(&BattleEvent) + 'static) {
        self.field.events.subscribe_all(observer);
    }

    /// Looks up a live entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.field.registry.get(id)
    }

    /// The live entity standing on `cell`.
    #[must_use]
    pub fn entity_at(&self, cell: Cell) -> Option<&Entity> {
        self.field.registry.entity_at(&self.field.grid, cell)
    }

    /// Looks up a tile.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::TileNotFound`] for undefined cells.
    pub fn tile(&self, cell: Cell) -> Result<&Tile, GridError> {
        self.field.grid.tile(cell)
    }

    /// The grid.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.field.grid
    }

    /// The entity registry.
    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.field.registry
    }

    // -------------------------------------------------------------------------
    // Damage
    // -------------------------------------------------------------------------

    /// Resolves a payload against `target`.
    pub fn resolve_attack(&mut self, target: EntityId, payload: &AttackPayload) -> AttackOutcome {
        let outcome = self.pipeline.resolve_attack(&mut self.field, target, payload);
        self.run_pending();
        outcome
    }

    /// Resolves a parameter-list hit.
    pub fn hurt(&mut self, target: EntityId, params: HitParams) -> AttackOutcome {
        let outcome = self.pipeline.hurt(&mut self.field, target, &params);
        self.run_pending();
        outcome
    }

    /// Deals true damage.
    ///
    /// With `over_time = Some((tickrate, duration))` the damage is applied
    /// as repeating ticks instead (see
    /// [`apply_damage_over_time`](Self::apply_damage_over_time)). A tickrate
    /// or duration that yields no ticks falls back to immediate damage.
    pub fn apply_direct_damage(
        &mut self,
        target: EntityId,
        amount: i32,
        over_time: Option<(f32, f32)>,
    ) -> DirectDamageOutcome {
        let over_time = over_time
            .map(|(tickrate, duration)| DamageOverTime::new(amount, tickrate, duration))
            .filter(|dot| dot.tick_count() > 0);
        let outcome = match over_time {
            Some(dot) => self
                .apply_damage_over_time(target, dot)
                .map_or(DirectDamageOutcome::Ignored, DirectDamageOutcome::Scheduled),
            None => self
                .pipeline
                .apply_direct_damage(&mut self.field, target, amount),
        };
        self.run_pending();
        outcome
    }

    /// Schedules repeating true damage. Returns `None` if nothing was scheduled.
    pub fn apply_damage_over_time(
        &mut self,
        target: EntityId,
        dot: DamageOverTime,
    ) -> Option<TaskId> {
        self.pipeline
            .apply_damage_over_time(&mut self.field, target, dot)
    }

    // -------------------------------------------------------------------------
    // Statuses and buffs
    // -------------------------------------------------------------------------

    /// Applies a status effect.
    pub fn apply_status(&mut self, target: EntityId, kind: StatusEffectKind) -> StatusOutcome {
        self.pipeline.statuses().apply(&mut self.field, target, kind)
    }

    /// Sets the mark-for-death latch.
    pub fn mark_for_death(&mut self, target: EntityId) -> StatusOutcome {
        self.apply_status(target, StatusEffectKind::MarkForDeath)
    }

    /// Effects active on `target`.
    #[must_use]
    pub fn active_statuses(&self, target: EntityId) -> Vec<StatusEffectInstance> {
        self.pipeline.statuses().active(&self.field, target)
    }

    /// Makes `target` untargetable for `duration` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn grant_untargetable(&mut self, target: EntityId, duration: f32) -> Result<TaskId, BattleError> {
        self.pipeline
            .grant_buff(&mut self.field, target, Buff::Untargetable, duration)
    }

    /// Makes `target` invincible for `duration` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn grant_invincibility(&mut self, target: EntityId, duration: f32) -> Result<TaskId, BattleError> {
        self.pipeline
            .grant_buff(&mut self.field, target, Buff::Invincible, duration)
    }

    /// Sets the untargetable flag.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn set_untargetable(&mut self, target: EntityId, value: bool) -> Result<(), BattleError> {
        self.pipeline
            .set_buff(&mut self.field, target, Buff::Untargetable, value)
    }

    /// Sets the invincible flag.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn set_invincible(&mut self, target: EntityId, value: bool) -> Result<(), BattleError> {
        self.pipeline
            .set_buff(&mut self.field, target, Buff::Invincible, value)
    }

    /// Flips the untargetable flag and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn toggle_untargetable(&mut self, target: EntityId) -> Result<bool, BattleError> {
        self.pipeline
            .toggle_buff(&mut self.field, target, Buff::Untargetable)
    }

    /// Flips the invincible flag and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn toggle_invincible(&mut self, target: EntityId) -> Result<bool, BattleError> {
        self.pipeline
            .toggle_buff(&mut self.field, target, Buff::Invincible)
    }

    // -------------------------------------------------------------------------
    // Movement
    // -------------------------------------------------------------------------

    /// Starts a voluntary move. Returns the destination.
    ///
    /// # Errors
    ///
    /// Returns [`Blocked`] without changing state if the move is not allowed.
    pub fn move_by(&mut self, entity: EntityId, dx: i32, dy: i32) -> Result<Cell, Blocked> {
        self.movement.move_by(&mut self.field, entity, dx, dy)
    }

    /// Starts a voluntary move with a custom transition duration.
    ///
    /// # Errors
    ///
    /// Returns [`Blocked`] without changing state if the move is not allowed.
    pub fn move_by_with_duration(
        &mut self,
        entity: EntityId,
        dx: i32,
        dy: i32,
        duration: f32,
    ) -> Result<Cell, Blocked> {
        self.movement
            .move_by_with_duration(&mut self.field, entity, dx, dy, duration)
    }

    /// Moves an entity instantly.
    ///
    /// # Errors
    ///
    /// Fails without changing state for undefined cells or unknown entities.
    pub fn teleport_to(&mut self, entity: EntityId, cell: Cell) -> Result<(), BattleError> {
        self.movement.teleport_to(&mut self.field, entity, cell)
    }

    /// Shoves an entity, dealing the configured damage on collision.
    pub fn shove(&mut self, entity: EntityId, dx: i32, dy: i32) -> ShoveOutcome {
        self.shove_with_damage(entity, dx, dy, self.movement.shove_damage())
    }

    /// Shoves an entity, dealing `damage` on collision.
    pub fn shove_with_damage(&mut self, entity: EntityId, dx: i32, dy: i32, damage: i32) -> ShoveOutcome {
        let outcome = self
            .movement
            .shove(&self.pipeline, &mut self.field, entity, dx, dy, damage);
        self.run_pending();
        outcome
    }

    /// Whether `entity` may move onto `cell`.
    #[must_use]
    pub fn check_valid_tile(&self, entity: EntityId, cell: Cell) -> bool {
        self.movement.check_valid_tile(&self.field, entity, cell)
    }

    /// Whether `cell` is free for `entity`, ignoring teams.
    #[must_use]
    pub fn check_free_tile(&self, entity: EntityId, cell: Cell) -> bool {
        self.movement.check_free_tile(&self.field, entity, cell)
    }

    /// Claims several tiles for `entity`. Returns the cells claimed.
    pub fn claim_tiles(&mut self, entity: EntityId, cells: impl IntoIterator<Item = Cell>) -> Vec<Cell> {
        self.movement.claim_tiles(&mut self.field, entity, cells)
    }

    /// Releases every claim `entity` holds.
    pub fn clear_claims(&mut self, entity: EntityId) {
        self.field.release_claims(entity);
    }

    // -------------------------------------------------------------------------
    // Time
    // -------------------------------------------------------------------------

    /// Advances time by `dt` seconds and runs every task that comes due.
    pub fn tick(&mut self, dt: f32) {
        self.field.scheduler.advance(dt);
        while let Some(task) = self.field.scheduler.pop_due() {
            self.dispatch(task);
            self.run_pending();
        }
    }

    /// Advances time by the configured fixed timestep.
    pub fn step(&mut self) {
        self.tick(self.config.fixed_dt);
    }

    /// Seconds advanced since the battle started.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.field.scheduler.elapsed()
    }

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<BattleEvent> {
        self.field.events.take_events()
    }

    fn dispatch(&mut self, task: Task) {
        let owner = task.owner;
        match task.job {
            Job::StatusExpiry { kind } => {
                self.pipeline.statuses().expire(&mut self.field, owner, kind);
            }
            Job::DamageTick { .. } => self.pipeline.on_damage_tick(&mut self.field, task),
            Job::TransitionLand { destination } => {
                self.movement.land(&mut self.field, owner, destination);
            }
            Job::ShoveLand { destination } => {
                self.movement.land_shove(&mut self.field, owner, destination);
            }
            Job::ShoveRecover => self.movement.recover_shove(&mut self.field, owner),
            Job::BuffExpiry(buff) => self.pipeline.expire_buff(&mut self.field, owner, buff),
            Job::HealthCounter { .. } => self.pipeline.on_counter_step(&mut self.field, task),
            Job::DestructionComplete => {
                self.pipeline.complete_destruction(&mut self.field, owner);
            }
        }
    }

    fn run_pending(&mut self) {
        while let Some(command) = self.field.pending.pop_front() {
            debug!(?command, "running behavior command");
            match command {
                BattleCommand::AttackCell { cell, payload } => {
                    if let Some(target) = self.field.grid.occupant_at(cell) {
                        self.pipeline
                            .resolve_attack(&mut self.field, target, &payload);
                    }
                }
                BattleCommand::ApplyStatus { target, kind } => {
                    self.pipeline.statuses().apply(&mut self.field, target, kind);
                }
                BattleCommand::DirectDamage { target, amount } => {
                    self.pipeline
                        .apply_direct_damage(&mut self.field, target, amount);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Traits;
    use crate::grid::Team;

    fn battle() -> Battle {
        Battle::from_stage(&StageDefinition::rectangle(6, 3, 3))
    }

    fn fighter(team: Team) -> EntitySpec {
        EntitySpec::new(team, 100).with_traits(Traits::GROUNDED | Traits::STUNNABLE)
    }

    mod spawn_tests {
        use super::*;

        #[test]
        fn spawn_occupies_tile_and_fires_enter() {
            let mut battle = battle();
            let id = battle.spawn(&fighter(Team::Player), Cell::new(1, 1)).unwrap();
            assert_eq!(battle.entity_at(Cell::new(1, 1)).map(Entity::id), Some(id));
            assert!(battle.tile(Cell::new(1, 1)).unwrap().occupied);
            assert_eq!(
                battle.take_events(),
                vec![BattleEvent::TileEnter {
                    cell: Cell::new(1, 1),
                    entity: id
                }]
            );
        }

        #[test]
        fn spawn_rejects_occupied_and_missing() {
            let mut battle = battle();
            battle.spawn(&fighter(Team::Player), Cell::new(1, 1)).unwrap();
            assert_eq!(
                battle.spawn(&fighter(Team::Player), Cell::new(1, 1)),
                Err(BattleError::CellUnavailable(Cell::new(1, 1)))
            );
            assert!(matches!(
                battle.spawn(&fighter(Team::Player), Cell::new(10, 1)),
                Err(BattleError::Grid(GridError::TileNotFound(_)))
            ));
            assert!(matches!(
                battle.spawn(&EntitySpec::new(Team::Player, 0), Cell::new(0, 0)),
                Err(BattleError::InvalidSpec(_))
            ));
            assert_eq!(battle.registry().len(), 1);
        }

        #[test]
        fn new_rejects_invalid_config() {
            let config = BattleConfig {
                fixed_dt: 0.0,
                ..BattleConfig::default()
            };
            assert!(Battle::new(&StageDefinition::rectangle(2, 1, 1), config).is_err());
        }

        #[test]
        fn set_behavior_requires_entity() {
            struct Nothing;
            impl EntityBehavior for Nothing {}

            let mut battle = battle();
            assert_eq!(
                battle.set_behavior(EntityId::new(3), Nothing),
                Err(BattleError::UnknownEntity(EntityId::new(3)))
            );
        }
    }

    mod tick_tests {
        use super::*;

        #[test]
        fn step_uses_fixed_dt() {
            let mut battle = battle();
            for _ in 0..60 {
                battle.step();
            }
            assert!((battle.elapsed() - 1.0).abs() < 1e-4);
        }

        #[test]
        fn timed_buff_expires() {
            let mut battle = battle();
            let id = battle.spawn(&fighter(Team::Player), Cell::new(1, 1)).unwrap();
            battle.grant_invincibility(id, 0.5).unwrap();
            battle.tick(0.25);
            assert!(battle.entity(id).unwrap().is_invincible());
            battle.tick(0.25);
            assert!(!battle.entity(id).unwrap().is_invincible());
        }

        #[test]
        fn set_clears_timed_grant() {
            let mut battle = battle();
            let id = battle.spawn(&fighter(Team::Player), Cell::new(1, 1)).unwrap();
            battle.grant_untargetable(id, 0.5).unwrap();
            battle.set_untargetable(id, true).unwrap();
            battle.tick(1.0);
            assert!(battle.entity(id).unwrap().is_untargetable());
        }

        #[test]
        fn status_expires_through_tick() {
            let mut battle = battle();
            let id = battle.spawn(&fighter(Team::Player), Cell::new(1, 1)).unwrap();
            battle.apply_status(id, StatusEffectKind::Frozen);
            battle.tick(0.5);
            assert!(battle.entity(id).unwrap().is_stunned());
            battle.tick(0.5);
            assert!(!battle.entity(id).unwrap().is_stunned());
            assert!(battle.active_statuses(id).is_empty());
        }
    }

    mod command_tests {
        use super::*;
        use crate::behavior::Explosive;

        #[test]
        fn destruction_hook_runs_after_call() {
            let mut battle = battle();
            let bomb = battle.spawn(&fighter(Team::Enemy).with_health(10), Cell::new(4, 1)).unwrap();
            let neighbour = battle.spawn(&fighter(Team::Enemy), Cell::new(5, 1)).unwrap();
            battle
                .set_behavior(bomb, Explosive::cross(AttackPayload::new(25)))
                .unwrap();

            let outcome = battle.resolve_attack(bomb, &AttackPayload::new(10));
            assert!(outcome.lethal);
            assert_eq!(battle.entity(neighbour).unwrap().current_health(), 75);
        }
    }
}
