//! Movement & Occupancy Controller.
//!
//! Validates and executes every cell-to-cell transition:
//!
//! - [`MovementController::move_by`]: a voluntary move. The destination is
//!   claimed, the source is vacated, and the entity lands (occupies the
//!   destination, drops its claims) halfway through the transition.
//! - [`MovementController::shove`]: forced displacement. Relocates into a
//!   free tile, or turns into a mutual hit when another entity is in the way.
//! - [`MovementController::teleport_to`]: instant relocation with no
//!   validity check.
//!
//! This is the only module that writes tile claims and occupants after spawn.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::battle::Battlefield;
use crate::config::BattleConfig;
use crate::damage::DamagePipeline;
use crate::entity::{Conditions, Entity, EntityId};
use crate::error::{BattleError, Blocked};
use crate::events::BattleEvent;
use crate::grid::{Cell, ClaimOutcome};
use crate::payload::HitParams;
use crate::scheduler::Job;

/// Result of a shove.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShoveOutcome {
    /// The entity is sliding into a free tile.
    Relocated {
        /// Cell left.
        from: Cell,
        /// Cell being entered.
        to: Cell,
    },
    /// Another entity blocked the way; both took the shove damage.
    Collided {
        /// The entity standing in the way.
        occupant: EntityId,
    },
    /// Nothing happened.
    NoOp,
}

/// Executes moves, shoves and teleports.
#[derive(Debug, Clone, Copy)]
pub struct MovementController {
    move_duration: f32,
    shove_duration: f32,
    shove_recoil_duration: f32,
    shove_damage: i32,
}

impl Default for MovementController {
    fn default() -> Self {
        Self::new(&BattleConfig::default())
    }
}

impl MovementController {
    /// Creates a controller from battle tuning.
    #[must_use]
    pub const fn new(config: &BattleConfig) -> Self {
        Self {
            move_duration: config.move_duration,
            shove_duration: config.shove_duration,
            shove_recoil_duration: config.shove_recoil_duration,
            shove_damage: config.shove_damage,
        }
    }

    /// Damage dealt by [`shove`](Self::shove) when none is given.
    #[must_use]
    pub const fn shove_damage(&self) -> i32 {
        self.shove_damage
    }

    /// Returns `true` if `mover` may move onto `cell`.
    ///
    /// The tile must exist and belong to the mover's team. It must hold no
    /// other occupant and no claim by another entity. Grounded movers also
    /// need it to be passable. A tile the mover already stands on is valid.
    #[must_use]
    pub fn check_valid_tile(&self, field: &Battlefield, mover: EntityId, cell: Cell) -> bool {
        field
            .registry
            .get(mover)
            .is_some_and(|entity| tile_accepts(field, entity, cell, true))
    }

    /// Like [`check_valid_tile`](Self::check_valid_tile) without the team check.
    #[must_use]
    pub fn check_free_tile(&self, field: &Battlefield, mover: EntityId, cell: Cell) -> bool {
        field
            .registry
            .get(mover)
            .is_some_and(|entity| tile_accepts(field, entity, cell, false))
    }

    /// Starts a voluntary move by `(dx, dy)` with the configured duration.
    ///
    /// # Errors
    ///
    /// Returns [`Blocked`] if the mover cannot move or the destination is
    /// invalid. A blocked move changes nothing.
    pub fn move_by(
        &self,
        field: &mut Battlefield,
        mover: EntityId,
        dx: i32,
        dy: i32,
    ) -> Result<Cell, Blocked> {
        self.move_by_with_duration(field, mover, dx, dy, self.move_duration)
    }

    /// Starts a voluntary move that lands after `duration / 2` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`Blocked`] if the mover cannot move or the destination is
    /// invalid. A blocked move changes nothing.
    pub fn move_by_with_duration(
        &self,
        field: &mut Battlefield,
        mover: EntityId,
        dx: i32,
        dy: i32,
        duration: f32,
    ) -> Result<Cell, Blocked> {
        let entity = field
            .registry
            .get(mover)
            .ok_or(Blocked::UnknownEntity(mover))?;
        let from = entity.current_cell();
        let to = from.offset(dx, dy);
        if let Err(reason) = movable(entity).and_then(|()| {
            if tile_accepts(field, entity, to, true) {
                Ok(())
            } else {
                Err(Blocked::InvalidDestination(to))
            }
        }) {
            debug!(entity = %mover, %from, %to, %reason, "move blocked");
            return Err(reason);
        }

        match field.grid.claim(to, mover) {
            Ok(ClaimOutcome::Claimed) => {}
            Ok(ClaimOutcome::AlreadyClaimed(_)) | Err(_) => {
                return Err(Blocked::InvalidDestination(to));
            }
        }
        field.grid.vacate(from, mover);
        if let Some(entity) = field.registry.get_mut(mover) {
            entity.record_claim(to);
            entity.relocate(to);
            entity.set_condition(Conditions::MOVING, true);
        }
        field.events.emit(BattleEvent::TileExit {
            cell: from,
            entity: mover,
        });
        field
            .scheduler
            .schedule(mover, duration / 2.0, Job::TransitionLand { destination: to });
        trace!(entity = %mover, %from, %to, "move started");
        Ok(to)
    }

    /// Lands an in-flight move on `destination`.
    pub(crate) fn land(&self, field: &mut Battlefield, mover: EntityId, destination: Cell) {
        field.release_claims(mover);
        let Some(entity) = field.registry.get_mut(mover) else {
            return;
        };
        entity.set_condition(Conditions::MOVING, false);
        if field.grid.set_occupant(destination, Some(mover)).is_ok() {
            field.events.emit(BattleEvent::TileEnter {
                cell: destination,
                entity: mover,
            });
        }
    }

    /// Shoves `target` by `(dx, dy)`.
    ///
    /// - A free destination (see [`check_free_tile`](Self::check_free_tile))
    ///   starts a short relocation during which the target is locked.
    /// - A destination holding another entity deals `damage` to the target
    ///   and then to that entity as plain hits; the target stays put.
    /// - Anything else is a no-op, as is shoving a stationary, destroying or
    ///   already-shoved entity.
    ///
    /// A move still in flight lands first.
    pub fn shove(
        &self,
        pipeline: &DamagePipeline,
        field: &mut Battlefield,
        target: EntityId,
        dx: i32,
        dy: i32,
        damage: i32,
    ) -> ShoveOutcome {
        let Some(entity) = field.registry.get(target) else {
            return ShoveOutcome::NoOp;
        };
        if entity.is_stationary() || entity.is_destroying() || entity.is_being_shoved() {
            return ShoveOutcome::NoOp;
        }
        if entity.is_moving() {
            let destination = entity.current_cell();
            field
                .scheduler
                .cancel_matching(target, |job| matches!(job, Job::TransitionLand { .. }));
            self.land(field, target, destination);
        }

        let Some(from) = field.registry.get(target).map(Entity::current_cell) else {
            return ShoveOutcome::NoOp;
        };
        let to = from.offset(dx, dy);

        if self.check_free_tile(field, target, to) {
            if field.grid.claim(to, target) != Ok(ClaimOutcome::Claimed) {
                return ShoveOutcome::NoOp;
            }
            field.grid.vacate(from, target);
            if let Some(entity) = field.registry.get_mut(target) {
                entity.record_claim(to);
                entity.relocate(to);
                entity.set_condition(Conditions::BEING_SHOVED, true);
            }
            field.events.emit(BattleEvent::TileExit {
                cell: from,
                entity: target,
            });
            field.scheduler.schedule(
                target,
                self.shove_duration / 2.0,
                Job::ShoveLand { destination: to },
            );
            trace!(entity = %target, %from, %to, "shove started");
            return ShoveOutcome::Relocated { from, to };
        }

        let occupant = field
            .grid
            .occupant_at(to)
            .filter(|&id| id != target && field.registry.contains(id));
        let Some(occupant) = occupant else {
            debug!(entity = %target, %to, "shove blocked by terrain");
            return ShoveOutcome::NoOp;
        };

        let hit = HitParams::new(damage);
        pipeline.hurt(field, target, &hit);
        pipeline.hurt(field, occupant, &hit);
        if let Some(entity) = field.registry.get_mut(target).filter(|e| !e.is_destroying()) {
            entity.set_condition(Conditions::BEING_SHOVED, true);
            field
                .scheduler
                .schedule(target, self.shove_recoil_duration, Job::ShoveRecover);
        }
        debug!(entity = %target, %occupant, damage, "shove collision");
        ShoveOutcome::Collided { occupant }
    }

    /// Lands a shove relocation and schedules the end of the lock.
    pub(crate) fn land_shove(&self, field: &mut Battlefield, target: EntityId, destination: Cell) {
        field.release_claims(target);
        if !field.registry.contains(target) {
            return;
        }
        if field.grid.set_occupant(destination, Some(target)).is_ok() {
            field.events.emit(BattleEvent::TileEnter {
                cell: destination,
                entity: target,
            });
        }
        field
            .scheduler
            .schedule(target, self.shove_duration / 2.0, Job::ShoveRecover);
    }

    /// Ends the shove lock.
    pub(crate) fn recover_shove(&self, field: &mut Battlefield, target: EntityId) {
        if let Some(entity) = field.registry.get_mut(target) {
            entity.set_condition(Conditions::BEING_SHOVED, false);
        }
    }

    /// Moves `target` onto `cell` instantly.
    ///
    /// Cancels any move or shove in flight and releases its claims. The
    /// destination is not validated beyond existing. An exit is only
    /// reported for a tile the entity actually stood on, so a teleport
    /// mid-transition emits just the enter.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::Grid`] for undefined cells and
    /// [`BattleError::UnknownEntity`] for unregistered entities; neither
    /// changes state.
    pub fn teleport_to(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        cell: Cell,
    ) -> Result<(), BattleError> {
        field.grid.tile(cell)?;
        if !field.registry.contains(target) {
            return Err(BattleError::UnknownEntity(target));
        }

        field.scheduler.cancel_matching(target, |job| {
            matches!(
                job,
                Job::TransitionLand { .. } | Job::ShoveLand { .. } | Job::ShoveRecover
            )
        });
        field.release_claims(target);
        let Some(entity) = field.registry.get_mut(target) else {
            return Err(BattleError::UnknownEntity(target));
        };
        entity.set_condition(Conditions::MOVING | Conditions::BEING_SHOVED, false);
        let from = entity.current_cell();
        entity.relocate(cell);

        let left = field.grid.vacate(from, target);
        field.grid.set_occupant(cell, Some(target))?;
        if left {
            field.events.emit(BattleEvent::TileExit {
                cell: from,
                entity: target,
            });
        }
        field.events.emit(BattleEvent::TileEnter {
            cell,
            entity: target,
        });
        trace!(entity = %target, %from, to = %cell, "teleported");
        Ok(())
    }

    /// Claims each listed cell for `entity`, skipping undefined cells and
    /// cells claimed by others. Returns the cells now claimed.
    pub fn claim_tiles(
        &self,
        field: &mut Battlefield,
        entity: EntityId,
        cells: impl IntoIterator<Item = Cell>,
    ) -> Vec<Cell> {
        if !field.registry.contains(entity) {
            return Vec::new();
        }
        let mut claimed = Vec::new();
        for cell in cells {
            if field.grid.claim(cell, entity) == Ok(ClaimOutcome::Claimed) {
                claimed.push(cell);
            }
        }
        if let Some(record) = field.registry.get_mut(entity) {
            for &cell in &claimed {
                record.record_claim(cell);
            }
        }
        claimed
    }
}

fn movable(entity: &Entity) -> Result<(), Blocked> {
    let id = entity.id();
    if entity.is_destroying() {
        Err(Blocked::Destroying(id))
    } else if entity.is_stationary() {
        Err(Blocked::Stationary(id))
    } else if entity.is_stunned() {
        Err(Blocked::Stunned(id))
    } else if entity.is_rooted() {
        Err(Blocked::Rooted(id))
    } else if entity.is_moving() {
        Err(Blocked::InTransit(id))
    } else {
        Ok(())
    }
}

fn tile_accepts(field: &Battlefield, entity: &Entity, cell: Cell, check_team: bool) -> bool {
    let Ok(tile) = field.grid.tile(cell) else {
        return false;
    };
    let id = entity.id();
    if tile.occupant == Some(id) {
        return true;
    }
    if check_team && tile.team != entity.team() {
        return false;
    }
    if tile.occupant.is_some() || tile.is_claimed_by_other(id) {
        return false;
    }
    !(entity.is_grounded() && !tile.passable)
}
