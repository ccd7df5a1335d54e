//! Injected entity behaviors.
//!
//! Entities are plain data. Anything specific to one kind of entity (a
//! bomb that explodes on destruction, a totem that roots its neighbours)
//! is supplied as an [`EntityBehavior`] registered with
//! [`Battle::set_behavior`](crate::battle::Battle::set_behavior).
//!
//! Hooks never mutate the battle directly. They return [`BattleCommand`]s,
//! which the driver runs in order once the triggering call has finished.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::grid::Cell;
use crate::payload::AttackPayload;
use crate::status::StatusEffectKind;

/// A deferred action requested by a behavior hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleCommand {
    /// Resolve a payload against whatever entity stands on `cell`.
    AttackCell {
        /// Target cell.
        cell: Cell,
        /// The hit.
        payload: AttackPayload,
    },
    /// Apply a status to an entity.
    ApplyStatus {
        /// Target entity.
        target: EntityId,
        /// The effect.
        kind: StatusEffectKind,
    },
    /// Deal true damage to an entity.
    DirectDamage {
        /// Target entity.
        target: EntityId,
        /// Damage dealt.
        amount: i32,
    },
}

/// Strategy hooks for specialized entities.
pub trait EntityBehavior {
    /// Extra effects fired when `entity` starts its destruction sequence.
    ///
    /// The entity is already at zero health when this runs.
    fn additional_destruction_events(&mut self, entity: &Entity) -> Vec<BattleCommand> {
        let _ = entity;
        Vec::new()
    }
}

/// A behavior that attacks every listed offset around the entity when it
/// is destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explosive {
    /// Cells hit, relative to the entity.
    pub offsets: Vec<(i32, i32)>,
    /// The hit dealt to each cell.
    pub payload: AttackPayload,
}

impl Explosive {
    /// Hits the four orthogonal neighbours.
    #[must_use]
    pub fn cross(payload: AttackPayload) -> Self {
        Self {
            offsets: vec![(1, 0), (-1, 0), (0, 1), (0, -1)],
            payload,
        }
    }
}

impl EntityBehavior for Explosive {
    fn additional_destruction_events(&mut self, entity: &Entity) -> Vec<BattleCommand> {
        let origin = entity.current_cell();
        self.offsets
            .iter()
            .map(|&(dx, dy)| BattleCommand::AttackCell {
                cell: origin.offset(dx, dy),
                payload: self.payload.clone().from_attacker(entity.id()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntitySpec;
    use crate::grid::Team;

    struct Inert;

    impl EntityBehavior for Inert {}

    fn entity() -> Entity {
        Entity::from_spec(EntityId::new(4), &EntitySpec::new(Team::Neutral, 10), Cell::new(2, 1))
    }

    #[test]
    fn default_hook_is_empty() {
        assert!(Inert.additional_destruction_events(&entity()).is_empty());
    }

    #[test]
    fn explosive_targets_neighbours() {
        let mut bomb = Explosive::cross(AttackPayload::new(50));
        let commands = bomb.additional_destruction_events(&entity());
        assert_eq!(commands.len(), 4);
        assert_eq!(
            commands[0],
            BattleCommand::AttackCell {
                cell: Cell::new(3, 1),
                payload: AttackPayload::new(50).from_attacker(EntityId::new(4)),
            }
        );
    }
}
