//! Entity Registry: the set of live combat entities.
//!
//! Entities are stored in a `BTreeMap` keyed by [`EntityId`] so that every
//! iteration is in ascending ID order. IDs are assigned monotonically and
//! never reused.
//!
//! The registry does not touch the grid. Spawning and destruction are
//! coordinated by the battle driver, which registers the entity here and
//! marks its tile occupied in the same call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Entity, EntityId, EntitySpec};
use crate::grid::{Cell, Grid};

/// Live entities of one battle.
///
/// # Example
///
/// ```
/// use stagegrid_core::entity::{EntityRegistry, EntitySpec};
/// use stagegrid_core::grid::{Cell, Team};
///
/// let mut registry = EntityRegistry::new();
/// let a = registry.insert(&EntitySpec::new(Team::Player, 100), Cell::new(0, 0));
/// let b = registry.insert(&EntitySpec::new(Team::Enemy, 80), Cell::new(4, 0));
///
/// assert!(a < b);
/// assert_eq!(registry.ids_sorted().collect::<Vec<_>>(), vec![a, b]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRegistry {
    /// Monotonically increasing entity ID counter.
    next_id: u64,
    /// Entity storage with deterministic iteration order.
    entities: BTreeMap<EntityId, Entity>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new entity standing on `cell` and returns its ID.
    pub fn insert(&mut self, spec: &EntitySpec, cell: Cell) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, Entity::from_spec(id, spec, cell));
        id
    }

    /// Deregisters an entity, returning it if it was live.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Returns a reference to an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns a mutable reference to an entity by ID.
    #[must_use]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Returns `true` if the entity is live.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// The live entity physically standing on `cell`, if any.
    ///
    /// An entity mid-transition is found on its destination only once it
    /// has landed.
    #[must_use]
    pub fn entity_at(&self, grid: &Grid, cell: Cell) -> Option<&Entity> {
        grid.occupant_at(cell).and_then(|id| self.entities.get(&id))
    }

    /// Iterates over entity IDs in ascending order.
    pub fn ids_sorted(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Iterates over entities in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entities are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
