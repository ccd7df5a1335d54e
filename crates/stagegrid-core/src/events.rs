//! Battle notifications and the event bus.
//!
//! Every observable change the core makes is announced as a [`BattleEvent`].
//! The [`EventBus`] does two things with each event:
//!
//! 1. Appends it to an internal log, drained with [`EventBus::take_events`].
//!    Tests and replays compare logs across runs.
//! 2. Calls registered observers synchronously, in registration order:
//!    per-entity observers of the affected entity first, then global ones.
//!
//! Per-entity observers are dropped when the entity despawns, right after
//! its death notification.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::grid::Cell;
use crate::status::StatusEffectKind;

/// A notification emitted by the battle core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEvent {
    /// Health was reduced by a mitigated hit.
    Hurt {
        /// The entity hit.
        entity: EntityId,
        /// Health removed by this hit.
        damage: i32,
        /// Health after the hit.
        health: i32,
        /// The hit was a light attack.
        light: bool,
        /// The hit makes the target flinch.
        flinch: bool,
        /// Who dealt the hit.
        attacker: Option<EntityId>,
    },
    /// The destruction sequence finished and the entity was deregistered.
    Death {
        /// The destroyed entity.
        entity: EntityId,
    },
    /// An entity finished entering a tile.
    TileEnter {
        /// The tile entered.
        cell: Cell,
        /// The entity now standing there.
        entity: EntityId,
    },
    /// An entity left a tile.
    TileExit {
        /// The tile left.
        cell: Cell,
        /// The departing entity.
        entity: EntityId,
    },
    /// A status effect started.
    StatusStarted {
        /// The affected entity.
        entity: EntityId,
        /// The effect.
        kind: StatusEffectKind,
    },
    /// A status effect ended or was consumed.
    StatusEnded {
        /// The affected entity.
        entity: EntityId,
        /// The effect.
        kind: StatusEffectKind,
    },
}

impl BattleEvent {
    /// The entity the event is about.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        match self {
            Self::Hurt { entity, .. }
            | Self::Death { entity }
            | Self::TileEnter { entity, .. }
            | Self::TileExit { entity, .. }
            | Self::StatusStarted { entity, .. }
            | Self::StatusEnded { entity, .. } => *entity,
        }
    }

    /// Returns `true` for hurt notifications.
    #[must_use]
    pub const fn is_hurt(&self) -> bool {
        matches!(self, Self::Hurt { .. })
    }

    /// Returns `true` for death notifications.
    #[must_use]
    pub const fn is_death(&self) -> bool {
        matches!(self, Self::Death { .. })
    }

    /// Returns `true` for tile enter/exit notifications.
    #[must_use]
    pub const fn is_tile_transition(&self) -> bool {
        matches!(self, Self::TileEnter { .. } | Self::TileExit { .. })
    }
}

/// Callback invoked for each matching event.
pub type Observer = Box<dyn FnMut(&BattleEvent)>;

/// Event log plus observer registry.
#[derive(Default)]
pub struct EventBus {
    log: Vec<BattleEvent>,
    per_entity: BTreeMap<EntityId, Vec<Observer>>,
    global: Vec<Observer>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("log", &self.log)
            .field(
                "per_entity",
                &self
                    .per_entity
                    .iter()
                    .map(|(id, list)| (*id, list.len()))
                    .collect::<Vec<_>>(),
            )
            .field("global", &self.global.len())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for events about `entity`.
    pub fn subscribe(&mut self, entity: EntityId, observer: impl FnMut(&BattleEvent) + 'static) {
        self.per_entity
            .entry(entity)
            .or_default()
            .push(Box::new(observer));
    }

    /// Registers an observer for every event.
    pub fn subscribe_all(&mut self, observer: impl FnMut(&BattleEvent) + 'static) {
        self.global.push(Box::new(observer));
    }

    /// Drops every observer of `entity`.
    pub fn unsubscribe(&mut self, entity: EntityId) {
        self.per_entity.remove(&entity);
    }

    /// Records an event and notifies observers.
    pub fn emit(&mut self, event: BattleEvent) {
        tracing::trace!(?event, "battle event");
        if let Some(observers) = self.per_entity.get_mut(&event.entity()) {
            for observer in observers.iter_mut() {
                observer(&event);
            }
        }
        for observer in &mut self.global {
            observer(&event);
        }
        self.log.push(event);
    }

    /// Drains and returns the recorded events in emission order.
    pub fn take_events(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.log)
    }

    /// Events recorded since the last drain.
    #[must_use]
    pub fn events(&self) -> &[BattleEvent] {
        &self.log
    }

    /// Number of events recorded since the last drain.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.log.len()
    }

    /// Returns `true` if nothing was recorded since the last drain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
