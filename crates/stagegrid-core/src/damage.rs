//! Damage Resolution Pipeline.
//!
//! [`DamagePipeline::resolve_attack`] runs one payload against one target:
//!
//! 1. Invincible targets, untargetable targets (unless the payload pierces)
//!    and defeated targets absorb the hit: nothing changes.
//! 2. A marked target consumes its mark and the payload is replaced by its
//!    [`mark_effect`] transform.
//! 3. Damage is scaled by the defense multiplier, rounded, then clamped to
//!    the configured `[min_damage, max_damage]` range ([`mitigate`]).
//! 4. Health drops by the mitigated amount, never below zero.
//! 5. Statuses are dispatched: primary first, then additional in order.
//! 6. A hurt notification is emitted.
//! 7. At zero health the destruction sequence starts, exactly once.
//!
//! [`DamagePipeline::hurt`] is the parameter-list form: same math, one
//! optional status, no mark handling. Direct damage bypasses mitigation and
//! defensive buffs entirely.
//!
//! The pipeline also owns the defensive buffs (untargetable, invincible),
//! the health counter animation and the destruction sequence.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::battle::Battlefield;
use crate::config::{BattleConfig, DamageOverTime};
use crate::entity::{Conditions, Entity, EntityId};
use crate::error::BattleError;
use crate::events::BattleEvent;
use crate::payload::{AttackPayload, Element, HitParams};
use crate::scheduler::{Buff, Job, Task, TaskId};
use crate::status::{StatusEffectKind, StatusEngine};

/// Result of a mitigated hit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttackOutcome {
    /// Health actually removed.
    pub applied_damage: i32,
    /// Statuses that started or refreshed, in dispatch order.
    pub statuses_applied: Vec<StatusEffectKind>,
    /// The hit brought the target to zero health.
    pub lethal: bool,
}

impl AttackOutcome {
    /// Outcome of an absorbed hit.
    #[must_use]
    pub const fn nullified() -> Self {
        Self {
            applied_damage: 0,
            statuses_applied: Vec::new(),
            lethal: false,
        }
    }
}

/// Result of an immediate direct-damage call.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectDamageOutcome {
    /// Health was reduced.
    Applied {
        /// Health removed.
        damage: i32,
        /// Health left.
        health: i32,
    },
    /// The damage met or exceeded the remaining health; destruction started.
    Lethal,
    /// Ticks were scheduled instead of applying damage now.
    Scheduled(TaskId),
    /// Non-positive amount, unknown or defeated target.
    Ignored,
}

/// Scales a hit by the defense multiplier: `clamp(round(damage * defense), min, max)`.
///
/// Rounds half away from zero.
///
/// ```
/// use stagegrid_core::damage::mitigate;
///
/// assert_eq!(mitigate(30, 1.0, 1, 999_999), 30);
/// assert_eq!(mitigate(5, 0.5, 1, 999_999), 3);
/// assert_eq!(mitigate(10, 0.0, 1, 999_999), 1);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn mitigate(damage: i32, defense_multiplier: f64, min_damage: i32, max_damage: i32) -> i32 {
    let scaled = (f64::from(damage) * defense_multiplier).round();
    scaled.clamp(f64::from(min_damage), f64::from(max_damage)) as i32
}

/// The one-time transform a marked target applies to an incoming payload.
///
/// Normal doubles damage. Blade, Fire, Water and Electric append bleeding,
/// burning, freeze and paralysis respectively. Other elements pass through.
#[must_use]
pub fn mark_effect(payload: &AttackPayload) -> AttackPayload {
    let mut marked = payload.clone();
    match payload.element {
        Element::Normal => marked.damage = payload.damage.saturating_mul(2),
        Element::Unknown => warn!("unrecognized element in mark effect"),
        element => {
            if let Some(status) = element.mark_status() {
                marked.additional_statuses.push(status);
            }
        }
    }
    marked
}

const fn buff_condition(buff: Buff) -> Conditions {
    match buff {
        Buff::Untargetable => Conditions::UNTARGETABLE,
        Buff::Invincible => Conditions::INVINCIBLE,
    }
}

fn absorbs(entity: &Entity, pierces_untargetable: bool) -> Option<&'static str> {
    if entity.is_defeated() {
        Some("defeated")
    } else if entity.is_invincible() {
        Some("invincible")
    } else if entity.is_untargetable() && !pierces_untargetable {
        Some("untargetable")
    } else {
        None
    }
}

struct Hit {
    damage: i32,
    light: bool,
    flinch: bool,
    attacker: Option<EntityId>,
}

/// Resolves hits, direct damage, buffs and destruction.
#[derive(Debug, Clone, Copy)]
pub struct DamagePipeline {
    min_damage: i32,
    max_damage: i32,
    destruction_delay: f32,
    counter_duration: f32,
    counter_max_steps: u32,
    hit_counter_threshold: i32,
    direct_counter_threshold: i32,
    statuses: StatusEngine,
}

impl Default for DamagePipeline {
    fn default() -> Self {
        Self::new(&BattleConfig::default())
    }
}

impl DamagePipeline {
    /// Creates a pipeline from battle tuning.
    #[must_use]
    pub fn new(config: &BattleConfig) -> Self {
        Self {
            min_damage: config.min_damage,
            max_damage: config.max_damage,
            destruction_delay: config.destruction_delay,
            counter_duration: config.health_counter_duration,
            counter_max_steps: config.health_counter_max_steps,
            hit_counter_threshold: config.hit_counter_threshold,
            direct_counter_threshold: config.direct_counter_threshold,
            statuses: StatusEngine::new(config.statuses),
        }
    }

    /// The status engine hits dispatch to.
    #[must_use]
    pub const fn statuses(&self) -> &StatusEngine {
        &self.statuses
    }

    /// Resolves a full payload against `target`.
    pub fn resolve_attack(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        payload: &AttackPayload,
    ) -> AttackOutcome {
        let Some(entity) = field.registry.get(target) else {
            return AttackOutcome::nullified();
        };
        if let Some(reason) = absorbs(entity, payload.pierces_untargetable) {
            debug!(entity = %target, reason, "hit absorbed");
            return AttackOutcome::nullified();
        }

        let marked;
        let payload = if self.statuses.consume_mark(field, target) {
            marked = mark_effect(payload);
            debug!(entity = %target, element = ?payload.element, "mark effect triggered");
            &marked
        } else {
            payload
        };

        let hit = Hit {
            damage: payload.damage,
            light: payload.is_light_attack,
            flinch: payload.causes_flinch,
            attacker: payload.attacker,
        };
        self.land_hit(field, target, &hit, payload.statuses())
    }

    /// Resolves a parameter-list hit: at most one status, no mark handling.
    pub fn hurt(&self, field: &mut Battlefield, target: EntityId, params: &HitParams) -> AttackOutcome {
        let Some(entity) = field.registry.get(target) else {
            return AttackOutcome::nullified();
        };
        if let Some(reason) = absorbs(entity, params.pierces_untargetable) {
            debug!(entity = %target, reason, "hit absorbed");
            return AttackOutcome::nullified();
        }
        let hit = Hit {
            damage: params.damage,
            light: params.is_light_attack,
            flinch: params.causes_flinch,
            attacker: params.attacker,
        };
        self.land_hit(field, target, &hit, params.status)
    }

    fn land_hit(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        hit: &Hit,
        statuses: impl IntoIterator<Item = StatusEffectKind>,
    ) -> AttackOutcome {
        let Some(entity) = field.registry.get_mut(target) else {
            return AttackOutcome::nullified();
        };
        let prior = entity.current_health();
        let mitigated = mitigate(
            hit.damage,
            entity.defense_multiplier(),
            self.min_damage,
            self.max_damage,
        );
        let health = (prior - mitigated).clamp(0, prior);
        entity.set_current_health(health);
        self.animate_health(field, target, mitigated, self.hit_counter_threshold);

        let statuses_applied = statuses
            .into_iter()
            .filter(|&kind| self.statuses.apply(field, target, kind).is_applied())
            .collect();

        field.events.emit(BattleEvent::Hurt {
            entity: target,
            damage: prior - health,
            health,
            light: hit.light,
            flinch: hit.flinch,
            attacker: hit.attacker,
        });

        let lethal = health == 0;
        if lethal {
            self.start_destruction(field, target);
        }
        AttackOutcome {
            applied_damage: prior - health,
            statuses_applied,
            lethal,
        }
    }

    /// Deals `amount` true damage immediately.
    ///
    /// Damage that meets or exceeds the remaining health starts destruction
    /// instead of clamping.
    pub fn apply_direct_damage(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        amount: i32,
    ) -> DirectDamageOutcome {
        let Some(entity) = field.registry.get_mut(target) else {
            return DirectDamageOutcome::Ignored;
        };
        if amount <= 0 || entity.is_defeated() {
            return DirectDamageOutcome::Ignored;
        }
        if amount >= entity.current_health() {
            self.start_destruction(field, target);
            return DirectDamageOutcome::Lethal;
        }
        let health = entity.current_health() - amount;
        entity.set_current_health(health);
        self.animate_health(field, target, amount, self.direct_counter_threshold);
        DirectDamageOutcome::Applied {
            damage: amount,
            health,
        }
    }

    /// Schedules repeating true damage.
    ///
    /// The first tick lands on the next scheduler advance; `ceil(duration /
    /// tickrate)` ticks land in total unless the target dies first.
    /// Returns `None` for non-positive damage, an effect with no ticks, or a
    /// defeated target.
    pub fn apply_damage_over_time(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        dot: DamageOverTime,
    ) -> Option<TaskId> {
        let alive = field.registry.get(target).is_some_and(|e| !e.is_defeated());
        let ticks = dot.tick_count();
        if !alive || dot.damage <= 0 || ticks == 0 {
            return None;
        }
        Some(field.scheduler.schedule(
            target,
            0.0,
            Job::DamageTick {
                damage: dot.damage,
                tickrate: dot.tickrate,
                remaining: dot.duration,
                ticks,
                source: None,
            },
        ))
    }

    /// Lands one damage-over-time tick and re-suspends the task while ticks
    /// are left. The tick count, not the float duration, ends the effect.
    pub(crate) fn on_damage_tick(&self, field: &mut Battlefield, mut task: Task) {
        let Job::DamageTick {
            damage,
            tickrate,
            remaining,
            ticks,
            source,
        } = task.job
        else {
            return;
        };
        self.apply_direct_damage(field, task.owner, damage);

        let ticks = ticks.saturating_sub(1);
        let alive = field
            .registry
            .get(task.owner)
            .is_some_and(|e| !e.is_defeated());
        if alive && ticks > 0 {
            task.job = Job::DamageTick {
                damage,
                tickrate,
                remaining: (remaining - tickrate).max(0.0),
                ticks,
                source,
            };
            field.scheduler.resume(task, tickrate);
        } else if source.is_some() {
            self.statuses.finish_volatile(field, task.owner, task.id);
        }
    }

    /// Raises or clears a defensive buff, cancelling any timed grant of it.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn set_buff(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        buff: Buff,
        value: bool,
    ) -> Result<(), BattleError> {
        let entity = field
            .registry
            .get_mut(target)
            .ok_or(BattleError::UnknownEntity(target))?;
        entity.set_condition(buff_condition(buff), value);
        field
            .scheduler
            .cancel_matching(target, |job| *job == Job::BuffExpiry(buff));
        Ok(())
    }

    /// Flips a defensive buff. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn toggle_buff(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        buff: Buff,
    ) -> Result<bool, BattleError> {
        let current = field
            .registry
            .get(target)
            .ok_or(BattleError::UnknownEntity(target))?
            .conditions()
            .contains(buff_condition(buff));
        self.set_buff(field, target, buff, !current)?;
        Ok(!current)
    }

    /// Raises a defensive buff for `duration` seconds.
    ///
    /// A new grant replaces a running grant of the same buff.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnknownEntity`] if the target is not registered.
    pub fn grant_buff(
        &self,
        field: &mut Battlefield,
        target: EntityId,
        buff: Buff,
        duration: f32,
    ) -> Result<TaskId, BattleError> {
        self.set_buff(field, target, buff, true)?;
        Ok(field
            .scheduler
            .schedule(target, duration, Job::BuffExpiry(buff)))
    }

    pub(crate) fn expire_buff(&self, field: &mut Battlefield, target: EntityId, buff: Buff) {
        if let Some(entity) = field.registry.get_mut(target) {
            entity.set_condition(buff_condition(buff), false);
        }
    }

    /// Starts the health counter toward the current health, or snaps it.
    ///
    /// Replaces a counter already running on the entity.
    fn animate_health(&self, field: &mut Battlefield, target: EntityId, amount: i32, threshold: i32) {
        field
            .scheduler
            .cancel_matching(target, |job| matches!(job, Job::HealthCounter { .. }));
        let Some(entity) = field.registry.get_mut(target) else {
            return;
        };
        let from = entity.displayed_health();
        let to = entity.current_health();
        if amount < threshold || from == to {
            entity.set_displayed_health(to);
            return;
        }

        let difference = from.abs_diff(to);
        let step = difference.div_ceil(self.counter_max_steps.max(1));
        #[allow(clippy::cast_precision_loss)]
        let interval = self.counter_duration / (difference / step) as f32;
        let step = i32::try_from(step).unwrap_or(i32::MAX);
        field.scheduler.schedule(
            target,
            interval,
            Job::HealthCounter {
                step: if to < from { -step } else { step },
                target: to,
                interval,
            },
        );
    }

    /// Advances the health counter by one step.
    pub(crate) fn on_counter_step(&self, field: &mut Battlefield, task: Task) {
        let Job::HealthCounter {
            step,
            target,
            interval,
        } = task.job
        else {
            return;
        };
        let Some(entity) = field.registry.get_mut(task.owner) else {
            return;
        };
        let next = entity.displayed_health() + step;
        let reached = if step < 0 { next <= target } else { next >= target };
        if reached {
            entity.set_displayed_health(target);
        } else {
            entity.set_displayed_health(next);
            field.scheduler.resume(task, interval);
        }
    }

    /// Starts the destruction sequence. Returns `false` if it already ran.
    ///
    /// The entity drops to zero health, becomes invincible, loses all its
    /// pending tasks and statuses, and its behavior hook runs. Death follows
    /// after the destruction delay.
    pub(crate) fn start_destruction(&self, field: &mut Battlefield, target: EntityId) -> bool {
        let Some(entity) = field.registry.get_mut(target) else {
            return false;
        };
        if entity.is_destroying() {
            return false;
        }
        entity.set_current_health(0);
        entity.set_displayed_health(0);
        entity.set_condition(Conditions::DESTROYING | Conditions::INVINCIBLE, true);
        entity.set_update_rate(0.0);
        entity.statuses.clear();
        let cell = entity.current_cell();

        field.scheduler.cancel_owner(target);
        if let (Some(behavior), Some(entity)) =
            (field.behaviors.get_mut(&target), field.registry.get(target))
        {
            field
                .pending
                .extend(behavior.additional_destruction_events(entity));
        }
        field
            .scheduler
            .schedule(target, self.destruction_delay, Job::DestructionComplete);
        debug!(entity = %target, %cell, "destruction started");
        true
    }

    /// Releases the entity's grid state, announces its death and deregisters it.
    pub(crate) fn complete_destruction(&self, field: &mut Battlefield, target: EntityId) {
        field.release_claims(target);
        let Some(entity) = field.registry.remove(target) else {
            return;
        };
        let cell = entity.current_cell();
        field.grid.vacate(cell, target);
        field.behaviors.remove(&target);
        field.events.emit(BattleEvent::Death { entity: target });
        field.events.unsubscribe(target);
        info!(entity = %target, %cell, "entity destroyed");
    }
}
