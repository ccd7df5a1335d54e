//! Status Effect Engine.
//!
//! Each entity carries a [`StatusSlots`] record with three kinds of slot:
//!
//! - one **non-volatile** slot (paralysis, freeze): mutually exclusive, needs
//!   the `STUNNABLE` trait, holds the entity's update rate at zero
//! - one **root** slot: independent of stunnability; re-applying replaces
//!   the running root
//! - any number of **volatile** effects (bleed, burn): stack independently,
//!   each driven by its own damage-over-time task
//!
//! Mark-for-death is a latch stored in [`Conditions::MARKED_FOR_DEATH`]; it
//! has no duration and is consumed by the damage pipeline.
//!
//! Durations live in the [`Scheduler`](crate::scheduler::Scheduler). A slot
//! only records the task driving it, so remaining time is read back from the
//! scheduler rather than counted down twice.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::battle::Battlefield;
use crate::config::{DamageOverTime, StatusTuning};
use crate::entity::{Conditions, EntityId};
use crate::events::BattleEvent;
use crate::scheduler::{Job, TaskId};

/// Status effect kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusEffectKind {
    /// Non-volatile stun.
    #[serde(alias = "Stunned", alias = "Stun")]
    Paralyzed,
    /// Non-volatile freeze.
    Frozen,
    /// Prevents voluntary movement.
    Rooted,
    /// Volatile damage-over-time.
    Bleeding,
    /// Volatile damage-over-time.
    Burning,
    /// Latch consumed by the next incoming payload.
    MarkForDeath,
    /// Any enumerator this build does not recognize.
    #[serde(other)]
    Unknown,
}

impl StatusEffectKind {
    /// Returns `true` for kinds that occupy the exclusive non-volatile slot.
    #[must_use]
    pub const fn is_non_volatile(self) -> bool {
        matches!(self, Self::Paralyzed | Self::Frozen)
    }

    /// Returns `true` for stacking damage-over-time kinds.
    #[must_use]
    pub const fn is_volatile(self) -> bool {
        matches!(self, Self::Bleeding | Self::Burning)
    }
}

/// Snapshot of one active effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectInstance {
    /// Effect kind.
    pub kind: StatusEffectKind,
    /// Seconds left. Latches report zero.
    pub remaining_duration: f32,
    /// Occupies the exclusive slot.
    pub non_volatile: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct ActiveStatus {
    pub(crate) kind: StatusEffectKind,
    pub(crate) task: TaskId,
}

/// Per-entity status slots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSlots {
    pub(crate) non_volatile: Option<ActiveStatus>,
    pub(crate) root: Option<ActiveStatus>,
    pub(crate) volatile: Vec<ActiveStatus>,
}

impl StatusSlots {
    /// Returns `true` if no timed effect is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.non_volatile.is_none() && self.root.is_none() && self.volatile.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Why a status application was dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusRejection {
    /// The target is not registered.
    UnknownEntity,
    /// The target is at zero health or being destroyed.
    Defeated,
    /// Non-volatile kinds need the `STUNNABLE` trait.
    NotStunnable,
    /// Another non-volatile effect is still active.
    NonVolatileActive(StatusEffectKind),
    /// The kind was not recognized.
    Unrecognized,
}

/// Result of [`StatusEngine::apply`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The effect started.
    Started,
    /// An effect of the same kind was already running and has been replaced.
    Refreshed,
    /// The effect was dropped.
    Rejected(StatusRejection),
}

impl StatusOutcome {
    /// Returns `true` unless the effect was dropped.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Applies and expires status effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusEngine {
    tuning: StatusTuning,
}

impl StatusEngine {
    /// Creates an engine with the given durations.
    #[must_use]
    pub const fn new(tuning: StatusTuning) -> Self {
        Self { tuning }
    }

    /// Durations in use.
    #[must_use]
    pub const fn tuning(&self) -> &StatusTuning {
        &self.tuning
    }

    /// Damage-over-time parameters for a volatile kind.
    #[must_use]
    pub const fn damage_over_time(&self, kind: StatusEffectKind) -> Option<DamageOverTime> {
        match kind {
            StatusEffectKind::Bleeding => Some(self.tuning.bleed),
            StatusEffectKind::Burning => Some(self.tuning.burn),
            _ => None,
        }
    }

    /// Applies `kind` to `target`.
    ///
    /// Never fails: every guard violation is reported as
    /// [`StatusOutcome::Rejected`] and leaves state untouched.
    pub fn apply(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        kind: StatusEffectKind,
    ) -> StatusOutcome {
        let outcome = self.try_apply(field, target, kind);
        match outcome {
            StatusOutcome::Started => {
                field.events.emit(BattleEvent::StatusStarted { entity: target, kind });
            }
            StatusOutcome::Refreshed => {}
            StatusOutcome::Rejected(reason) => {
                debug!(entity = %target, ?kind, ?reason, "status rejected");
            }
        }
        outcome
    }

    fn try_apply(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        kind: StatusEffectKind,
    ) -> StatusOutcome {
        if kind == StatusEffectKind::Unknown {
            warn!(entity = %target, "unrecognized status effect ignored");
            return StatusOutcome::Rejected(StatusRejection::Unrecognized);
        }
        let Some(entity) = field.registry.get_mut(target) else {
            return StatusOutcome::Rejected(StatusRejection::UnknownEntity);
        };
        if entity.is_defeated() {
            return StatusOutcome::Rejected(StatusRejection::Defeated);
        }

        match kind {
            StatusEffectKind::Paralyzed | StatusEffectKind::Frozen => {
                if !entity.is_stunnable() {
                    return StatusOutcome::Rejected(StatusRejection::NotStunnable);
                }
                if let Some(active) = entity.statuses.non_volatile {
                    return StatusOutcome::Rejected(StatusRejection::NonVolatileActive(
                        active.kind,
                    ));
                }
                let duration = if kind == StatusEffectKind::Paralyzed {
                    self.tuning.paralyze_duration
                } else {
                    self.tuning.freeze_duration
                };
                entity.set_condition(Conditions::STUNNED | Conditions::NON_VOLATILE, true);
                entity.set_update_rate(0.0);
                let task = field
                    .scheduler
                    .schedule(target, duration, Job::StatusExpiry { kind });
                entity.statuses.non_volatile = Some(ActiveStatus { kind, task });
                StatusOutcome::Started
            }
            StatusEffectKind::Rooted => {
                let replaced = entity.statuses.root.take();
                if let Some(previous) = replaced {
                    field.scheduler.cancel(previous.task);
                }
                entity.set_condition(Conditions::ROOTED, true);
                let task = field.scheduler.schedule(
                    target,
                    self.tuning.root_duration,
                    Job::StatusExpiry { kind },
                );
                entity.statuses.root = Some(ActiveStatus { kind, task });
                if replaced.is_some() {
                    StatusOutcome::Refreshed
                } else {
                    StatusOutcome::Started
                }
            }
            StatusEffectKind::Bleeding | StatusEffectKind::Burning => {
                let Some(dot) = self.damage_over_time(kind) else {
                    return StatusOutcome::Rejected(StatusRejection::Unrecognized);
                };
                let task = field.scheduler.schedule(
                    target,
                    0.0,
                    Job::DamageTick {
                        damage: dot.damage,
                        tickrate: dot.tickrate,
                        remaining: dot.duration,
                        ticks: dot.tick_count(),
                        source: Some(kind),
                    },
                );
                entity.statuses.volatile.push(ActiveStatus { kind, task });
                StatusOutcome::Started
            }
            StatusEffectKind::MarkForDeath => {
                if entity.is_marked_for_death() {
                    return StatusOutcome::Refreshed;
                }
                entity.set_condition(Conditions::MARKED_FOR_DEATH, true);
                StatusOutcome::Started
            }
            StatusEffectKind::Unknown => StatusOutcome::Rejected(StatusRejection::Unrecognized),
        }
    }

    /// Ends a duration status whose expiry task fired.
    pub(crate) fn expire(&self, field: &mut Battlefield, target: EntityId, kind: StatusEffectKind) {
        let Some(entity) = field.registry.get_mut(target) else {
            return;
        };
        if kind.is_non_volatile() {
            if entity.statuses.non_volatile.take().is_none() {
                return;
            }
            entity.set_condition(Conditions::STUNNED | Conditions::NON_VOLATILE, false);
            entity.set_update_rate(1.0);
        } else if kind == StatusEffectKind::Rooted {
            if entity.statuses.root.take().is_none() {
                return;
            }
            entity.set_condition(Conditions::ROOTED, false);
        } else {
            return;
        }
        field.events.emit(BattleEvent::StatusEnded { entity: target, kind });
    }

    /// Drops a finished volatile effect from its slot.
    pub(crate) fn finish_volatile(&self, field: &mut Battlefield, target: EntityId, task: TaskId) {
        let Some(entity) = field.registry.get_mut(target) else {
            return;
        };
        let Some(index) = entity.statuses.volatile.iter().position(|s| s.task == task) else {
            return;
        };
        let finished = entity.statuses.volatile.remove(index);
        field.events.emit(BattleEvent::StatusEnded {
            entity: target,
            kind: finished.kind,
        });
    }

    /// Clears the mark-for-death latch. Returns `true` if it was set.
    pub(crate) fn consume_mark(&self, field: &mut Battlefield, target: EntityId) -> bool {
        let Some(entity) = field.registry.get_mut(target) else {
            return false;
        };
        if !entity.is_marked_for_death() {
            return false;
        }
        entity.set_condition(Conditions::MARKED_FOR_DEATH, false);
        field.events.emit(BattleEvent::StatusEnded {
            entity: target,
            kind: StatusEffectKind::MarkForDeath,
        });
        true
    }

    /// Snapshot of the effects active on `target`, in slot order.
    #[must_use]
    pub fn active(&self, field: &Battlefield, target: EntityId) -> Vec<StatusEffectInstance> {
        let Some(entity) = field.registry.get(target) else {
            return Vec::new();
        };
        let slots = &entity.statuses;
        let mut active = Vec::new();

        for status in slots.non_volatile.iter().chain(slots.root.iter()) {
            if let Some(remaining) = field.scheduler.remaining(status.task) {
                active.push(StatusEffectInstance {
                    kind: status.kind,
                    remaining_duration: remaining,
                    non_volatile: status.kind.is_non_volatile(),
                });
            }
        }
        for status in &slots.volatile {
            if let Some(task) = field.scheduler.get(status.task) {
                if let Job::DamageTick { remaining, .. } = task.job {
                    active.push(StatusEffectInstance {
                        kind: status.kind,
                        remaining_duration: remaining + task.remaining.max(0.0),
                        non_volatile: false,
                    });
                }
            }
        }
        if entity.is_marked_for_death() {
            active.push(StatusEffectInstance {
                kind: StatusEffectKind::MarkForDeath,
                remaining_duration: 0.0,
                non_volatile: false,
            });
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntitySpec, Traits};
    use crate::grid::{Cell, StageDefinition, Team};

    fn field() -> (Battlefield, EntityId, EntityId) {
        let mut field = Battlefield::new(&StageDefinition::rectangle(6, 3, 3));
        let stunnable = field
            .insert_entity(
                &EntitySpec::new(Team::Player, 100).with_traits(Traits::GROUNDED | Traits::STUNNABLE),
                Cell::new(1, 1),
            )
            .unwrap();
        let sturdy = field
            .insert_entity(&EntitySpec::new(Team::Enemy, 100), Cell::new(4, 1))
            .unwrap();
        field.events.take_events();
        (field, stunnable, sturdy)
    }

    fn engine() -> StatusEngine {
        StatusEngine::new(StatusTuning::default())
    }

    mod non_volatile_tests {
        use super::*;

        #[test]
        fn paralysis_stuns_and_freezes_update_rate() {
            let (mut field, id, _) = field();
            let outcome = engine().apply(&mut field, id, StatusEffectKind::Paralyzed);
            assert_eq!(outcome, StatusOutcome::Started);

            let entity = field.registry.get(id).unwrap();
            assert!(entity.is_stunned());
            assert!(entity.has_non_volatile_status());
            assert_eq!(entity.update_rate(), 0.0);
        }

        #[test]
        fn second_non_volatile_is_dropped() {
            let (mut field, id, _) = field();
            let engine = engine();
            engine.apply(&mut field, id, StatusEffectKind::Frozen);
            let outcome = engine.apply(&mut field, id, StatusEffectKind::Paralyzed);
            assert_eq!(
                outcome,
                StatusOutcome::Rejected(StatusRejection::NonVolatileActive(StatusEffectKind::Frozen))
            );
            let active = engine.active(&field, id);
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].kind, StatusEffectKind::Frozen);
        }

        #[test]
        fn requires_stunnable() {
            let (mut field, _, sturdy) = field();
            let outcome = engine().apply(&mut field, sturdy, StatusEffectKind::Paralyzed);
            assert_eq!(outcome, StatusOutcome::Rejected(StatusRejection::NotStunnable));
            assert!(!field.registry.get(sturdy).unwrap().is_stunned());
        }

        #[test]
        fn expiry_restores_entity() {
            let (mut field, id, _) = field();
            let engine = engine();
            engine.apply(&mut field, id, StatusEffectKind::Paralyzed);
            engine.expire(&mut field, id, StatusEffectKind::Paralyzed);

            let entity = field.registry.get(id).unwrap();
            assert!(!entity.is_stunned());
            assert!(!entity.has_non_volatile_status());
            assert_eq!(entity.update_rate(), 1.0);
            assert!(entity.statuses.is_empty());

            let events = field.events.take_events();
            assert!(events.contains(&BattleEvent::StatusEnded {
                entity: id,
                kind: StatusEffectKind::Paralyzed
            }));
        }
    }

    mod root_tests {
        use super::*;

        #[test]
        fn root_ignores_stunnability() {
            let (mut field, _, sturdy) = field();
            let outcome = engine().apply(&mut field, sturdy, StatusEffectKind::Rooted);
            assert_eq!(outcome, StatusOutcome::Started);
            assert!(field.registry.get(sturdy).unwrap().is_rooted());
        }

        #[test]
        fn reapplying_root_replaces_task() {
            let (mut field, id, _) = field();
            let engine = engine();
            engine.apply(&mut field, id, StatusEffectKind::Rooted);
            field.scheduler.advance(0.5);
            let outcome = engine.apply(&mut field, id, StatusEffectKind::Rooted);
            assert_eq!(outcome, StatusOutcome::Refreshed);
            assert_eq!(field.scheduler.len(), 1);

            let active = engine.active(&field, id);
            assert!((active[0].remaining_duration - 1.0).abs() < 1e-6);
        }

        #[test]
        fn root_coexists_with_stun() {
            let (mut field, id, _) = field();
            let engine = engine();
            engine.apply(&mut field, id, StatusEffectKind::Paralyzed);
            assert!(engine.apply(&mut field, id, StatusEffectKind::Rooted).is_applied());
            assert_eq!(engine.active(&field, id).len(), 2);
        }
    }

    mod volatile_tests {
        use super::*;

        #[test]
        fn volatile_effects_stack() {
            let (mut field, id, _) = field();
            let engine = engine();
            engine.apply(&mut field, id, StatusEffectKind::Bleeding);
            engine.apply(&mut field, id, StatusEffectKind::Bleeding);
            engine.apply(&mut field, id, StatusEffectKind::Burning);
            assert_eq!(field.registry.get(id).unwrap().statuses.volatile.len(), 3);
            assert_eq!(field.scheduler.len(), 3);
        }

        #[test]
        fn finished_volatile_emits_end() {
            let (mut field, id, _) = field();
            let engine = engine();
            engine.apply(&mut field, id, StatusEffectKind::Burning);
            let task = field.registry.get(id).unwrap().statuses.volatile[0].task;
            engine.finish_volatile(&mut field, id, task);

            assert!(field.registry.get(id).unwrap().statuses.is_empty());
            let events = field.events.take_events();
            assert_eq!(
                events.last(),
                Some(&BattleEvent::StatusEnded {
                    entity: id,
                    kind: StatusEffectKind::Burning
                })
            );
        }
    }

    mod latch_tests {
        use super::*;

        #[test]
        fn mark_is_consumed_once() {
            let (mut field, id, _) = field();
            let engine = engine();
            assert_eq!(
                engine.apply(&mut field, id, StatusEffectKind::MarkForDeath),
                StatusOutcome::Started
            );
            assert_eq!(
                engine.apply(&mut field, id, StatusEffectKind::MarkForDeath),
                StatusOutcome::Refreshed
            );
            assert!(engine.consume_mark(&mut field, id));
            assert!(!engine.consume_mark(&mut field, id));
            assert!(!field.registry.get(id).unwrap().is_marked_for_death());
        }
    }

    mod rejection_tests {
        use super::*;

        #[test]
        fn unknown_kind_is_a_no_op() {
            let (mut field, id, _) = field();
            let outcome = engine().apply(&mut field, id, StatusEffectKind::Unknown);
            assert_eq!(outcome, StatusOutcome::Rejected(StatusRejection::Unrecognized));
            assert!(field.scheduler.is_empty());
            assert!(field.events.take_events().is_empty());
        }

        #[test]
        fn unknown_kind_parses_from_json() {
            let kind: StatusEffectKind = serde_json::from_str(r#""Petrified""#).unwrap();
            assert_eq!(kind, StatusEffectKind::Unknown);
            let kind: StatusEffectKind = serde_json::from_str(r#""Stunned""#).unwrap();
            assert_eq!(kind, StatusEffectKind::Paralyzed);
        }

        #[test]
        fn unknown_entity() {
            let (mut field, _, _) = field();
            let outcome = engine().apply(&mut field, EntityId::new(99), StatusEffectKind::Rooted);
            assert_eq!(outcome, StatusOutcome::Rejected(StatusRejection::UnknownEntity));
        }

        #[test]
        fn defeated_target() {
            let (mut field, id, _) = field();
            field.registry.get_mut(id).unwrap().set_current_health(0);
            let outcome = engine().apply(&mut field, id, StatusEffectKind::Burning);
            assert_eq!(outcome, StatusOutcome::Rejected(StatusRejection::Defeated));
        }
    }
}
