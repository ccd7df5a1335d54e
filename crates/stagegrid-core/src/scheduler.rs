//! Cooperative scheduler for every timed behavior in a battle.
//!
//! Status durations, damage-over-time ticks, move transitions, shove phases,
//! timed buffs, health counters and the destruction delay are all [`Task`]s:
//! plain data describing "run [`Job`] for `owner` after N more seconds".
//! There is no implicit control flow. The battle driver calls
//! [`Scheduler::advance`] once per step, then drains due tasks with
//! [`Scheduler::pop_due`] and dispatches each one.
//!
//! # Determinism
//!
//! Due tasks are popped earliest-deadline first; ties break by task ID, which
//! is assigned monotonically. A task rescheduled from inside dispatch with a
//! non-positive delay fires later in the same drain, so a short tickrate
//! inside a long step still lands every tick in order.
//!
//! # Example
//!
//! ```
//! use stagegrid_core::entity::EntityId;
//! use stagegrid_core::scheduler::{Buff, Job, Scheduler};
//!
//! let mut scheduler = Scheduler::new();
//! let owner = EntityId::new(1);
//! scheduler.schedule(owner, 0.5, Job::BuffExpiry(Buff::Untargetable));
//!
//! scheduler.advance(0.25);
//! assert!(scheduler.pop_due().is_none());
//!
//! scheduler.advance(0.25);
//! let task = scheduler.pop_due().unwrap();
//! assert_eq!(task.owner, owner);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::grid::Cell;
use crate::status::StatusEffectKind;

/// Remaining-time threshold under which a task counts as due.
///
/// Absorbs `f32` drift from summing many small steps.
pub const DUE_EPSILON: f32 = 1e-5;

/// Unique identifier for a scheduled task.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Creates a task ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// Timed buffs toggled on and off by the scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Buff {
    /// Non-piercing attacks are ignored.
    Untargetable,
    /// Every attack is ignored.
    Invincible,
}

/// Work performed when a task comes due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Job {
    /// A duration status (paralysis, freeze, root) ends.
    StatusExpiry {
        /// The status that ends.
        kind: StatusEffectKind,
    },
    /// One true-damage tick of a damage-over-time effect.
    DamageTick {
        /// Damage per tick.
        damage: i32,
        /// Seconds between ticks.
        tickrate: f32,
        /// Effect duration left when this tick lands.
        remaining: f32,
        /// Ticks still to land, this one included.
        ticks: u32,
        /// The volatile status driving this effect, if any.
        source: Option<StatusEffectKind>,
    },
    /// A voluntary move reaches the half of its transition.
    TransitionLand {
        /// The cell being entered.
        destination: Cell,
    },
    /// A shove relocation reaches the half of its transition.
    ShoveLand {
        /// The cell being entered.
        destination: Cell,
    },
    /// A shove (relocation or collision recoil) releases its movement lock.
    ShoveRecover,
    /// A timed buff ends.
    BuffExpiry(Buff),
    /// One step of the health counter animation.
    HealthCounter {
        /// Amount added to the displayed health per step.
        step: i32,
        /// Value the counter settles on.
        target: i32,
        /// Seconds between steps.
        interval: f32,
    },
    /// The destruction delay has elapsed.
    DestructionComplete,
}

impl Job {
    /// Short label for logging.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::StatusExpiry { .. } => "status_expiry",
            Self::DamageTick { .. } => "damage_tick",
            Self::TransitionLand { .. } => "transition_land",
            Self::ShoveLand { .. } => "shove_land",
            Self::ShoveRecover => "shove_recover",
            Self::BuffExpiry(_) => "buff_expiry",
            Self::HealthCounter { .. } => "health_counter",
            Self::DestructionComplete => "destruction_complete",
        }
    }
}

/// A suspended unit of timed work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// The entity this task acts on.
    pub owner: EntityId,
    /// Seconds until the task is due; zero or negative once due.
    pub remaining: f32,
    /// Work to perform.
    pub job: Job,
}

/// Timer driver for all suspended tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    next_id: u64,
    tasks: BTreeMap<TaskId, Task>,
    elapsed: f64,
}

impl Scheduler {
    /// Creates an empty scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspends `job` for `owner` until `delay` more seconds have elapsed.
    ///
    /// A non-positive delay makes the task due immediately.
    pub fn schedule(&mut self, owner: EntityId, delay: f32, job: Job) -> TaskId {
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        self.tasks.insert(
            id,
            Task {
                id,
                owner,
                remaining: delay,
                job,
            },
        );
        id
    }

    /// Re-suspends a task popped by [`pop_due`](Self::pop_due), keeping its ID.
    ///
    /// Any overshoot past the task's deadline is carried into the new delay,
    /// so a repeating task does not drift.
    pub fn resume(&mut self, mut task: Task, delay: f32) -> TaskId {
        task.remaining += delay;
        let id = task.id;
        self.tasks.insert(id, task);
        id
    }

    /// Cancels a task. Returns `true` if it was pending.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    /// Cancels every task of `owner` whose job matches `predicate`.
    ///
    /// Returns the number of tasks cancelled.
    pub fn cancel_matching(&mut self, owner: EntityId, predicate: impl Fn(&Job) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks
            .retain(|_, task| task.owner != owner || !predicate(&task.job));
        before - self.tasks.len()
    }

    /// Cancels every task owned by `owner`.
    pub fn cancel_owner(&mut self, owner: EntityId) -> usize {
        self.cancel_matching(owner, |_| true)
    }

    /// Seconds until a pending task is due.
    #[must_use]
    pub fn remaining(&self, id: TaskId) -> Option<f32> {
        self.tasks.get(&id).map(|t| t.remaining.max(0.0))
    }

    /// Returns a pending task.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Iterates over pending tasks of one owner in ID order.
    pub fn tasks_of(&self, owner: EntityId) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.values().filter(move |t| t.owner == owner)
    }

    /// Advances every pending task by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += f64::from(dt);
        for task in self.tasks.values_mut() {
            task.remaining -= dt;
        }
    }

    /// Removes and returns the earliest due task, if any.
    pub fn pop_due(&mut self) -> Option<Task> {
        let id = self
            .tasks
            .values()
            .filter(|t| t.remaining <= DUE_EPSILON)
            .min_by(|a, b| match a.remaining.total_cmp(&b.remaining) {
                Ordering::Equal => a.id.cmp(&b.id),
                other => other,
            })
            .map(|t| t.id)?;
        let task = self.tasks.remove(&id)?;
        tracing::trace!(task = id.as_u64(), owner = %task.owner, job = task.job.label(), "task due");
        Some(task)
    }

    /// Total seconds advanced since creation.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
