//! # Stagegrid Core
//!
//! Deterministic combat and occupancy core for tile-grid tactical battles.
//!
//! Entities stand on the cells of a stage grid, trade attacks described by
//! payloads, carry status effects and move between cells under claim and
//! occupancy rules. Presentation (sprites, audio, UI) lives outside the core
//! and reacts to the [`BattleEvent`]s it emits.
//!
//! ## Architecture
//!
//! - **Grid Store** ([`grid`]): cell-to-tile state, claims and occupants
//! - **Entity Registry** ([`entity`]): live entities in ID order
//! - **Status Effect Engine** ([`status`]): stuns, roots, damage-over-time
//! - **Damage Resolution Pipeline** ([`damage`]): mitigation, marks, death
//! - **Movement & Occupancy Controller** ([`movement`]): moves, shoves, teleports
//! - **Scheduler** ([`scheduler`]): every timed behavior as a suspended task
//!
//! [`Battle`] ties them together and is driven by [`Battle::tick`].
//!
//! ## Usage
//!
//! ```
//! use stagegrid_core::{Battle, Cell, EntitySpec, StageDefinition, Team, Traits};
//!
//! let mut battle = Battle::from_stage(&StageDefinition::rectangle(6, 3, 3));
//! let player = battle
//!     .spawn(&EntitySpec::new(Team::Player, 100).with_traits(Traits::GROUNDED), Cell::new(1, 1))
//!     .unwrap();
//!
//! battle.move_by(player, 1, 0).unwrap();
//! battle.tick(0.1);
//! assert_eq!(battle.entity_at(Cell::new(2, 1)).map(|e| e.id()), Some(player));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod battle;
pub mod behavior;
pub mod config;
pub mod damage;
pub mod entity;
pub mod error;
pub mod events;
pub mod grid;
pub mod movement;
pub mod payload;
pub mod scheduler;
pub mod status;

pub use battle::{Battle, Battlefield};
pub use behavior::{BattleCommand, EntityBehavior};
pub use config::{BattleConfig, DamageOverTime, StatusTuning, FIXED_DT};
pub use damage::{AttackOutcome, DamagePipeline, DirectDamageOutcome};
pub use entity::{Conditions, Entity, EntityId, EntityRegistry, EntitySpec, Traits};
pub use error::{BattleError, Blocked, ConfigError, GridError};
pub use events::{BattleEvent, EventBus};
pub use grid::{Cell, Grid, StageDefinition, Team, Tile};
pub use movement::{MovementController, ShoveOutcome};
pub use payload::{AttackPayload, AttackProfile, AttackSource, Element, HitParams};
pub use scheduler::{Scheduler, TaskId};
pub use status::{StatusEffectInstance, StatusEffectKind, StatusEngine, StatusOutcome};

#[cfg(test)]
mod tests;
