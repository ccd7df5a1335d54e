//! Error types for the battle core.
//!
//! Nothing in the core is fatal. Every error here is a local, recoverable
//! result the caller inspects before choosing a different action next tick:
//!
//! - [`GridError`]: lookup misses on undefined cells
//! - [`Blocked`]: rejected move requests
//! - [`BattleError`]: driver-level failures (unknown entity, bad spawn)
//! - [`ConfigError`]: configuration and stage-definition parsing

use thiserror::Error;

use crate::entity::EntityId;
use crate::grid::Cell;

/// Grid Store lookup failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    /// The cell is not part of the stage's tile set.
    #[error("no tile at {0}")]
    TileNotFound(Cell),
}

/// Reasons a move request was rejected.
///
/// A blocked move never mutates grid or entity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Blocked {
    /// The mover is not registered.
    #[error("entity {0} is not registered")]
    UnknownEntity(EntityId),
    /// The mover is in its destruction sequence.
    #[error("entity {0} is being destroyed")]
    Destroying(EntityId),
    /// The mover is rooted or being shoved.
    #[error("entity {0} is rooted")]
    Rooted(EntityId),
    /// The mover is stunned or frozen.
    #[error("entity {0} is stunned")]
    Stunned(EntityId),
    /// The mover already has a transition in flight.
    #[error("entity {0} already has a move in flight")]
    InTransit(EntityId),
    /// The mover cannot leave its cell.
    #[error("entity {0} is stationary")]
    Stationary(EntityId),
    /// The destination failed tile validation.
    #[error("destination {0} is not a valid tile")]
    InvalidDestination(Cell),
}

/// Driver-level failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BattleError {
    /// The entity is not registered (never spawned, or already despawned).
    #[error("entity {0} is not registered")]
    UnknownEntity(EntityId),
    /// The cell exists but cannot accept a new occupant.
    #[error("cell {0} is occupied or claimed")]
    CellUnavailable(Cell),
    /// An entity spec violated a construction invariant.
    #[error("invalid entity spec: {0}")]
    InvalidSpec(String),
    /// A grid lookup failed.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Configuration and stage-definition loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The input was not valid JSON for the expected shape.
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// The input parsed but holds out-of-range values.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
