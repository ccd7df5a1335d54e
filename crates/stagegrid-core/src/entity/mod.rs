//! Entity module for combatants and obstacles on the stage grid.
//!
//! This module provides the core entity types:
//! - [`EntityId`]: Unique identifier for entities
//! - [`Traits`]: Static capabilities fixed at spawn (grounded, stunnable, ...)
//! - [`Conditions`]: Runtime state toggled by combat and movement
//! - [`EntitySpec`]: Construction parameters for spawning
//! - [`Entity`]: The complete entity record
//!
//! Entities are plain data. Specialized reactions (extra destruction effects)
//! are supplied separately through [`EntityBehavior`](crate::behavior::EntityBehavior).
//!
//! # Example
//!
//! ```
//! use stagegrid_core::entity::{Entity, EntityId, EntitySpec, Traits};
//! use stagegrid_core::grid::{Cell, Team};
//!
//! let spec = EntitySpec::new(Team::Player, 100).with_traits(Traits::GROUNDED | Traits::STUNNABLE);
//! let entity = Entity::from_spec(EntityId::new(1), &spec, Cell::new(1, 1));
//!
//! assert_eq!(entity.current_health(), 100);
//! assert!(entity.is_grounded());
//! assert!(!entity.is_stationary());
//! ```

pub mod registry;

use std::collections::BTreeSet;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::BattleError;
use crate::grid::{Cell, Team};
use crate::status::StatusSlots;

pub use registry::EntityRegistry;

/// Unique identifier for an entity.
///
/// `EntityId` is a newtype wrapper around `u64`. Entity IDs are assigned
/// monotonically by the [`EntityRegistry`] and never reused within a battle.
///
/// # Ordering
///
/// Entity IDs are ordered by their numeric value, which is used to ensure
/// deterministic iteration order across all entities.
///
/// ```
/// use stagegrid_core::entity::EntityId;
///
/// let id1 = EntityId::new(1);
/// let id2 = EntityId::new(2);
///
/// assert!(id1 < id2);
/// assert_eq!(id1.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

bitflags! {
    /// Static capabilities of an entity, fixed at spawn.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Traits: u8 {
        /// Affected by tile passability and tile effects.
        const GROUNDED = 1 << 0;
        /// Can enter non-volatile statuses (paralysis, freeze).
        const STUNNABLE = 1 << 1;
        /// Never leaves its spawn cell.
        const STATIONARY = 1 << 2;
        /// Structure that blocks effects passing through it.
        const OBSTACLE = 1 << 3;
        /// Controlled by the player.
        const PLAYER = 1 << 4;
    }
}

bitflags! {
    /// Runtime conditions toggled by combat, statuses and movement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Conditions: u16 {
        /// Ignored by attacks that do not pierce.
        const UNTARGETABLE = 1 << 0;
        /// Ignored by every attack.
        const INVINCIBLE = 1 << 1;
        /// Held in place by paralysis or freeze.
        const STUNNED = 1 << 2;
        /// Held in place by a root status.
        const ROOTED = 1 << 3;
        /// The next incoming payload triggers a mark effect.
        const MARKED_FOR_DEATH = 1 << 4;
        /// Mid-shove; movement is locked.
        const BEING_SHOVED = 1 << 5;
        /// A voluntary move is in flight.
        const MOVING = 1 << 6;
        /// The destruction sequence has started.
        const DESTROYING = 1 << 7;
        /// A non-volatile status is active.
        const NON_VOLATILE = 1 << 8;
    }
}

/// Construction parameters for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Owning side; movement is restricted to tiles of this team.
    pub team: Team,
    /// Maximum health, must be positive.
    pub max_health: i32,
    /// Starting health; defaults to `max_health`.
    #[serde(default)]
    pub current_health: Option<i32>,
    /// Shield pool.
    #[serde(default)]
    pub shield_health: i32,
    /// Multiplier applied to incoming mitigated hits.
    #[serde(default = "unit_multiplier")]
    pub defense_multiplier: f64,
    /// Multiplier applied to outgoing attack profiles.
    #[serde(default = "unit_multiplier")]
    pub attack_multiplier: f64,
    /// Static capabilities.
    #[serde(default)]
    pub traits: Traits,
}

const fn unit_multiplier() -> f64 {
    1.0
}

impl EntitySpec {
    /// Creates a spec with full health, unit multipliers and no traits.
    #[must_use]
    pub const fn new(team: Team, max_health: i32) -> Self {
        Self {
            team,
            max_health,
            current_health: None,
            shield_health: 0,
            defense_multiplier: 1.0,
            attack_multiplier: 1.0,
            traits: Traits::empty(),
        }
    }

    /// Sets the static traits.
    #[must_use]
    pub const fn with_traits(mut self, traits: Traits) -> Self {
        self.traits = traits;
        self
    }

    /// Sets the starting health.
    #[must_use]
    pub const fn with_health(mut self, current_health: i32) -> Self {
        self.current_health = Some(current_health);
        self
    }

    /// Sets the shield pool.
    #[must_use]
    pub const fn with_shield(mut self, shield_health: i32) -> Self {
        self.shield_health = shield_health;
        self
    }

    /// Sets the defense multiplier.
    #[must_use]
    pub const fn with_defense(mut self, defense_multiplier: f64) -> Self {
        self.defense_multiplier = defense_multiplier;
        self
    }

    /// Sets the attack multiplier.
    #[must_use]
    pub const fn with_attack(mut self, attack_multiplier: f64) -> Self {
        self.attack_multiplier = attack_multiplier;
        self
    }

    /// Checks the health invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidSpec`] if `max_health <= 0`, the starting
    /// health is outside `1..=max_health`, the shield is negative, or a
    /// multiplier is not finite and non-negative.
    pub fn validate(&self) -> Result<(), BattleError> {
        if self.max_health <= 0 {
            return Err(BattleError::InvalidSpec("max_health must be positive".into()));
        }
        if let Some(hp) = self.current_health {
            if hp <= 0 || hp > self.max_health {
                return Err(BattleError::InvalidSpec(format!(
                    "current_health {hp} outside 1..={}",
                    self.max_health
                )));
            }
        }
        if self.shield_health < 0 {
            return Err(BattleError::InvalidSpec("shield_health must not be negative".into()));
        }
        for (name, m) in [
            ("defense_multiplier", self.defense_multiplier),
            ("attack_multiplier", self.attack_multiplier),
        ] {
            if !m.is_finite() || m < 0.0 {
                return Err(BattleError::InvalidSpec(format!(
                    "{name} must be finite and non-negative"
                )));
            }
        }
        Ok(())
    }
}

/// A combatant or obstacle on the stage.
///
/// # Invariants
///
/// - `0 <= current_health <= max_health`
/// - `claimed_tiles` mirrors exactly the tiles whose claimant is this entity
/// - Once spawned the entity occupies (or is landing on) exactly one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    team: Team,
    current_health: i32,
    max_health: i32,
    shield_health: i32,
    displayed_health: i32,
    defense_multiplier: f64,
    attack_multiplier: f64,
    traits: Traits,
    conditions: Conditions,
    update_rate: f32,
    current_cell: Cell,
    previous_cell: Cell,
    claimed_tiles: BTreeSet<Cell>,
    pub(crate) statuses: StatusSlots,
}

impl Entity {
    /// Builds an entity standing on `cell`.
    ///
    /// The spec is assumed valid; see [`EntitySpec::validate`].
    #[must_use]
    pub fn from_spec(id: EntityId, spec: &EntitySpec, cell: Cell) -> Self {
        let health = spec.current_health.unwrap_or(spec.max_health);
        Self {
            id,
            team: spec.team,
            current_health: health,
            max_health: spec.max_health,
            shield_health: spec.shield_health,
            displayed_health: health,
            defense_multiplier: spec.defense_multiplier,
            attack_multiplier: spec.attack_multiplier,
            traits: spec.traits,
            conditions: Conditions::empty(),
            update_rate: 1.0,
            current_cell: cell,
            previous_cell: cell,
            claimed_tiles: BTreeSet::new(),
            statuses: StatusSlots::default(),
        }
    }

    /// Returns the entity's unique identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the entity's team.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.team
    }

    /// Current health.
    #[must_use]
    pub const fn current_health(&self) -> i32 {
        self.current_health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> i32 {
        self.max_health
    }

    /// Shield pool.
    #[must_use]
    pub const fn shield_health(&self) -> i32 {
        self.shield_health
    }

    /// Health value shown by the health counter.
    #[must_use]
    pub const fn displayed_health(&self) -> i32 {
        self.displayed_health
    }

    /// Defense multiplier applied to mitigated hits.
    #[must_use]
    pub const fn defense_multiplier(&self) -> f64 {
        self.defense_multiplier
    }

    /// Attack multiplier applied to outgoing attack profiles.
    #[must_use]
    pub const fn attack_multiplier(&self) -> f64 {
        self.attack_multiplier
    }

    /// Static traits.
    #[must_use]
    pub const fn traits(&self) -> Traits {
        self.traits
    }

    /// Runtime conditions.
    #[must_use]
    pub const fn conditions(&self) -> Conditions {
        self.conditions
    }

    /// Animation/update rate; zero while stunned or destroying.
    #[must_use]
    pub const fn update_rate(&self) -> f32 {
        self.update_rate
    }

    /// The cell the entity occupies, or is landing on mid-transition.
    #[must_use]
    pub const fn current_cell(&self) -> Cell {
        self.current_cell
    }

    /// The cell the entity last left.
    #[must_use]
    pub const fn previous_cell(&self) -> Cell {
        self.previous_cell
    }

    /// Tiles currently claimed by this entity.
    #[must_use]
    pub const fn claimed_tiles(&self) -> &BTreeSet<Cell> {
        &self.claimed_tiles
    }

    /// Affected by passability.
    #[must_use]
    pub const fn is_grounded(&self) -> bool {
        self.traits.contains(Traits::GROUNDED)
    }

    /// Can receive non-volatile statuses.
    #[must_use]
    pub const fn is_stunnable(&self) -> bool {
        self.traits.contains(Traits::STUNNABLE)
    }

    /// Never leaves its cell.
    #[must_use]
    pub const fn is_stationary(&self) -> bool {
        self.traits.contains(Traits::STATIONARY)
    }

    /// Blocks effects passing through.
    #[must_use]
    pub const fn is_obstacle(&self) -> bool {
        self.traits.contains(Traits::OBSTACLE)
    }

    /// Ignored by non-piercing attacks.
    #[must_use]
    pub const fn is_untargetable(&self) -> bool {
        self.conditions.contains(Conditions::UNTARGETABLE)
    }

    /// Ignored by every attack.
    #[must_use]
    pub const fn is_invincible(&self) -> bool {
        self.conditions.contains(Conditions::INVINCIBLE)
    }

    /// Held by paralysis or freeze.
    #[must_use]
    pub const fn is_stunned(&self) -> bool {
        self.conditions.contains(Conditions::STUNNED)
    }

    /// Movement locked by a root status or an ongoing shove.
    #[must_use]
    pub const fn is_rooted(&self) -> bool {
        self.conditions
            .intersects(Conditions::ROOTED.union(Conditions::BEING_SHOVED))
    }

    /// The next incoming payload triggers a mark effect.
    #[must_use]
    pub const fn is_marked_for_death(&self) -> bool {
        self.conditions.contains(Conditions::MARKED_FOR_DEATH)
    }

    /// Mid-shove.
    #[must_use]
    pub const fn is_being_shoved(&self) -> bool {
        self.conditions.contains(Conditions::BEING_SHOVED)
    }

    /// A voluntary move is in flight.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.conditions.contains(Conditions::MOVING)
    }

    /// The destruction sequence has started.
    #[must_use]
    pub const fn is_destroying(&self) -> bool {
        self.conditions.contains(Conditions::DESTROYING)
    }

    /// A non-volatile status is active.
    #[must_use]
    pub const fn has_non_volatile_status(&self) -> bool {
        self.conditions.contains(Conditions::NON_VOLATILE)
    }

    /// Zero health or already destroying: further hits are no-ops.
    #[must_use]
    pub const fn is_defeated(&self) -> bool {
        self.current_health <= 0 || self.is_destroying()
    }

    /// Sets whether the entity is affected by passability.
    pub fn set_grounded(&mut self, grounded: bool) {
        self.traits.set(Traits::GROUNDED, grounded);
    }

    pub(crate) fn set_condition(&mut self, condition: Conditions, value: bool) {
        self.conditions.set(condition, value);
    }

    pub(crate) fn set_current_health(&mut self, health: i32) {
        self.current_health = health.clamp(0, self.max_health);
    }

    pub(crate) fn set_displayed_health(&mut self, health: i32) {
        self.displayed_health = health;
    }

    pub(crate) fn set_update_rate(&mut self, rate: f32) {
        self.update_rate = rate;
    }

    /// Records the current cell as previous and moves to `cell`.
    pub(crate) fn relocate(&mut self, cell: Cell) {
        self.previous_cell = self.current_cell;
        self.current_cell = cell;
    }

    pub(crate) fn record_claim(&mut self, cell: Cell) {
        self.claimed_tiles.insert(cell);
    }

    pub(crate) fn take_claims(&mut self) -> BTreeSet<Cell> {
        std::mem::take(&mut self.claimed_tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> EntitySpec {
        EntitySpec::new(Team::Player, 100).with_traits(Traits::GROUNDED | Traits::STUNNABLE)
    }

    mod entity_id_tests {
        use super::*;

        #[test]
        fn new_creates_id_with_value() {
            let id = EntityId::new(42);
            assert_eq!(id.as_u64(), 42);
        }

        #[test]
        fn ordering() {
            let mut ids = vec![EntityId::new(3), EntityId::new(1), EntityId::new(2)];
            ids.sort();
            assert_eq!(ids, vec![EntityId::new(1), EntityId::new(2), EntityId::new(3)]);
        }

        #[test]
        fn debug_and_display_format() {
            let id = EntityId::new(42);
            assert_eq!(format!("{:?}", id), "EntityId(42)");
            assert_eq!(format!("{}", id), "42");
        }

        #[test]
        fn u64_conversions() {
            let id: EntityId = 42u64.into();
            let value: u64 = id.into();
            assert_eq!(value, 42);
        }
    }

    mod spec_tests {
        use super::*;

        #[test]
        fn defaults_to_full_health() {
            let entity = Entity::from_spec(EntityId::new(1), &spec(), Cell::new(0, 0));
            assert_eq!(entity.current_health(), 100);
            assert_eq!(entity.displayed_health(), 100);
            assert_eq!(entity.max_health(), 100);
        }

        #[test]
        fn validate_accepts_default_spec() {
            assert!(spec().validate().is_ok());
        }

        #[test]
        fn validate_rejects_bad_health() {
            assert!(EntitySpec::new(Team::Enemy, 0).validate().is_err());
            assert!(spec().with_health(101).validate().is_err());
            assert!(spec().with_health(0).validate().is_err());
            assert!(spec().with_shield(-1).validate().is_err());
        }

        #[test]
        fn validate_rejects_bad_multipliers() {
            assert!(spec().with_defense(-0.5).validate().is_err());
            assert!(spec().with_attack(f64::NAN).validate().is_err());
            assert!(spec().with_defense(0.0).validate().is_ok());
        }

        #[test]
        fn deserializes_with_defaults() {
            let spec: EntitySpec =
                serde_json::from_str(r#"{ "team": "Enemy", "max_health": 60 }"#).unwrap();
            assert_eq!(spec, EntitySpec::new(Team::Enemy, 60));
        }
    }

    mod condition_tests {
        use super::*;

        #[test]
        fn trait_predicates() {
            let entity = Entity::from_spec(EntityId::new(1), &spec(), Cell::new(0, 0));
            assert!(entity.is_grounded());
            assert!(entity.is_stunnable());
            assert!(!entity.is_stationary());
            assert!(!entity.is_obstacle());
        }

        #[test]
        fn rooted_includes_being_shoved() {
            let mut entity = Entity::from_spec(EntityId::new(1), &spec(), Cell::new(0, 0));
            assert!(!entity.is_rooted());
            entity.set_condition(Conditions::BEING_SHOVED, true);
            assert!(entity.is_rooted());
            entity.set_condition(Conditions::BEING_SHOVED, false);
            entity.set_condition(Conditions::ROOTED, true);
            assert!(entity.is_rooted());
        }

        #[test]
        fn set_grounded_toggles_trait() {
            let mut entity = Entity::from_spec(EntityId::new(1), &spec(), Cell::new(0, 0));
            entity.set_grounded(false);
            assert!(!entity.is_grounded());
        }

        #[test]
        fn health_is_clamped() {
            let mut entity = Entity::from_spec(EntityId::new(1), &spec(), Cell::new(0, 0));
            entity.set_current_health(-5);
            assert_eq!(entity.current_health(), 0);
            assert!(entity.is_defeated());
            entity.set_current_health(500);
            assert_eq!(entity.current_health(), 100);
        }

        #[test]
        fn relocate_records_previous() {
            let mut entity = Entity::from_spec(EntityId::new(1), &spec(), Cell::new(0, 0));
            entity.relocate(Cell::new(1, 0));
            assert_eq!(entity.previous_cell(), Cell::new(0, 0));
            assert_eq!(entity.current_cell(), Cell::new(1, 0));
        }

        #[test]
        fn claims_are_tracked() {
            let mut entity = Entity::from_spec(EntityId::new(1), &spec(), Cell::new(0, 0));
            entity.record_claim(Cell::new(1, 0));
            entity.record_claim(Cell::new(1, 0));
            assert_eq!(entity.claimed_tiles().len(), 1);
            let taken = entity.take_claims();
            assert!(taken.contains(&Cell::new(1, 0)));
            assert!(entity.claimed_tiles().is_empty());
        }

        #[test]
        fn conditions_serialize() {
            let flags = Conditions::STUNNED | Conditions::ROOTED;
            let json = serde_json::to_string(&flags).unwrap();
            let back: Conditions = serde_json::from_str(&json).unwrap();
            assert_eq!(flags, back);
        }
    }
}
