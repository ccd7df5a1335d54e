//! Attack payloads and the profiles that build them.
//!
//! An [`AttackPayload`] describes one hit. It is an immutable input to the
//! damage pipeline: transforms such as the mark effect produce a new payload
//! and leave the caller's value untouched.
//!
//! Payloads are usually built from an [`AttackProfile`] (the static
//! description of a chip, weapon or hitbox) and an [`AttackSource`] that
//! supplies the attacker's identity and attack multiplier:
//!
//! ```
//! use stagegrid_core::entity::{Entity, EntityId, EntitySpec};
//! use stagegrid_core::grid::{Cell, Team};
//! use stagegrid_core::payload::{AttackProfile, Element};
//!
//! let spec = EntitySpec::new(Team::Player, 100).with_attack(1.5);
//! let attacker = Entity::from_spec(EntityId::new(0), &spec, Cell::new(1, 1));
//!
//! let sword = AttackProfile::new(80).with_element(Element::Blade);
//! let payload = sword.build_payload(&attacker);
//! assert_eq!(payload.damage, 120);
//! assert_eq!(payload.attacker, Some(EntityId::new(0)));
//! ```

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::status::StatusEffectKind;

/// Elemental affinity of a hit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Element {
    /// No affinity. Mark effect doubles damage.
    #[default]
    Normal,
    /// Wind.
    Air,
    /// Cutting. Mark effect inflicts bleeding.
    Blade,
    /// Mark effect inflicts burning.
    Fire,
    /// Mark effect inflicts freeze.
    Water,
    /// Mark effect inflicts paralysis.
    Electric,
    /// Plant.
    Grass,
    /// Shield-piercing.
    Breaking,
    /// Any enumerator this build does not recognize.
    #[serde(other)]
    Unknown,
}

impl Element {
    /// Status appended by the mark effect for this element.
    #[must_use]
    pub const fn mark_status(self) -> Option<StatusEffectKind> {
        match self {
            Self::Blade => Some(StatusEffectKind::Bleeding),
            Self::Fire => Some(StatusEffectKind::Burning),
            Self::Water => Some(StatusEffectKind::Frozen),
            Self::Electric => Some(StatusEffectKind::Paralyzed),
            Self::Normal | Self::Air | Self::Grass | Self::Breaking | Self::Unknown => None,
        }
    }
}

/// One hit, consumed by
/// [`DamagePipeline::resolve_attack`](crate::damage::DamagePipeline::resolve_attack).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPayload {
    /// Damage before mitigation.
    pub damage: i32,
    /// Light hits do not interrupt the target.
    #[serde(default)]
    pub is_light_attack: bool,
    /// The hit makes the target flinch.
    #[serde(default)]
    pub causes_flinch: bool,
    /// The hit lands on untargetable entities.
    #[serde(default)]
    pub pierces_untargetable: bool,
    /// Who dealt the hit.
    #[serde(default)]
    pub attacker: Option<EntityId>,
    /// Status dispatched first.
    #[serde(default)]
    pub primary_status: Option<StatusEffectKind>,
    /// Statuses dispatched after the primary, in order.
    #[serde(default)]
    pub additional_statuses: Vec<StatusEffectKind>,
    /// Elemental affinity.
    #[serde(default)]
    pub element: Element,
}

impl AttackPayload {
    /// A plain hit: normal element, flinching, no statuses.
    #[must_use]
    pub const fn new(damage: i32) -> Self {
        Self {
            damage,
            is_light_attack: false,
            causes_flinch: true,
            pierces_untargetable: false,
            attacker: None,
            primary_status: None,
            additional_statuses: Vec::new(),
            element: Element::Normal,
        }
    }

    /// Sets the attacker.
    #[must_use]
    pub const fn from_attacker(mut self, attacker: EntityId) -> Self {
        self.attacker = Some(attacker);
        self
    }

    /// Sets the element.
    #[must_use]
    pub const fn with_element(mut self, element: Element) -> Self {
        self.element = element;
        self
    }

    /// Sets the primary status.
    #[must_use]
    pub const fn with_status(mut self, status: StatusEffectKind) -> Self {
        self.primary_status = Some(status);
        self
    }

    /// Appends an additional status.
    #[must_use]
    pub fn with_additional_status(mut self, status: StatusEffectKind) -> Self {
        self.additional_statuses.push(status);
        self
    }

    /// Marks the hit as light.
    #[must_use]
    pub const fn light(mut self) -> Self {
        self.is_light_attack = true;
        self
    }

    /// Sets whether the hit causes flinching.
    #[must_use]
    pub const fn with_flinch(mut self, causes_flinch: bool) -> Self {
        self.causes_flinch = causes_flinch;
        self
    }

    /// Lets the hit land on untargetable entities.
    #[must_use]
    pub const fn piercing(mut self) -> Self {
        self.pierces_untargetable = true;
        self
    }

    /// Every status the hit dispatches, primary first.
    pub fn statuses(&self) -> impl Iterator<Item = StatusEffectKind> + '_ {
        self.primary_status
            .into_iter()
            .chain(self.additional_statuses.iter().copied())
    }
}

/// Parameter-list form of a hit: at most one status, no mark handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitParams {
    /// Damage before mitigation.
    pub damage: i32,
    /// Light hits do not interrupt the target.
    pub is_light_attack: bool,
    /// The hit makes the target flinch.
    pub causes_flinch: bool,
    /// The hit lands on untargetable entities.
    pub pierces_untargetable: bool,
    /// Who dealt the hit.
    pub attacker: Option<EntityId>,
    /// Status dispatched after the hit.
    pub status: Option<StatusEffectKind>,
}

impl HitParams {
    /// A plain, flinching hit.
    #[must_use]
    pub const fn new(damage: i32) -> Self {
        Self {
            damage,
            is_light_attack: false,
            causes_flinch: true,
            pierces_untargetable: false,
            attacker: None,
            status: None,
        }
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: StatusEffectKind) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the attacker.
    #[must_use]
    pub const fn from_attacker(mut self, attacker: EntityId) -> Self {
        self.attacker = Some(attacker);
        self
    }
}

/// Anything that deals attacks.
pub trait AttackSource {
    /// Identity recorded as the payload's attacker.
    fn id(&self) -> EntityId;

    /// Multiplier applied to profile damage.
    fn attack_multiplier(&self) -> f64;
}

impl AttackSource for Entity {
    fn id(&self) -> EntityId {
        Entity::id(self)
    }

    fn attack_multiplier(&self) -> f64 {
        Entity::attack_multiplier(self)
    }
}

/// Static description of an attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackProfile {
    /// Base damage.
    pub base_damage: i32,
    /// Flat bonus added before the multiplier.
    #[serde(default)]
    pub damage_modifier: i32,
    /// Primary status.
    #[serde(default)]
    pub status: Option<StatusEffectKind>,
    /// Additional statuses, dispatched in order.
    #[serde(default)]
    pub additional_statuses: Vec<StatusEffectKind>,
    /// Light hit.
    #[serde(default)]
    pub is_light_attack: bool,
    /// Flinching hit.
    #[serde(default)]
    pub causes_flinch: bool,
    /// Pierces untargetable.
    #[serde(default)]
    pub pierces_untargetable: bool,
    /// Elemental affinity.
    #[serde(default)]
    pub element: Element,
}

impl AttackProfile {
    /// A normal-element profile with no statuses.
    #[must_use]
    pub const fn new(base_damage: i32) -> Self {
        Self {
            base_damage,
            damage_modifier: 0,
            status: None,
            additional_statuses: Vec::new(),
            is_light_attack: false,
            causes_flinch: true,
            pierces_untargetable: false,
            element: Element::Normal,
        }
    }

    /// Sets the element.
    #[must_use]
    pub const fn with_element(mut self, element: Element) -> Self {
        self.element = element;
        self
    }

    /// Sets the flat damage modifier.
    #[must_use]
    pub const fn with_modifier(mut self, damage_modifier: i32) -> Self {
        self.damage_modifier = damage_modifier;
        self
    }

    /// Sets the primary status.
    #[must_use]
    pub const fn with_status(mut self, status: StatusEffectKind) -> Self {
        self.status = Some(status);
        self
    }

    /// Payload damage for a source: `trunc((base + modifier) * multiplier)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn damage_for(&self, source: &impl AttackSource) -> i32 {
        let raw = f64::from(self.base_damage) + f64::from(self.damage_modifier);
        (raw * source.attack_multiplier()).trunc() as i32
    }

    /// Builds the payload this profile deals when used by `source`.
    #[must_use]
    pub fn build_payload(&self, source: &impl AttackSource) -> AttackPayload {
        AttackPayload {
            damage: self.damage_for(source),
            is_light_attack: self.is_light_attack,
            causes_flinch: self.causes_flinch,
            pierces_untargetable: self.pierces_untargetable,
            attacker: Some(source.id()),
            primary_status: self.status,
            additional_statuses: self.additional_statuses.clone(),
            element: self.element,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntitySpec;
    use crate::grid::{Cell, Team};

    struct Turret(f64);

    impl AttackSource for Turret {
        fn id(&self) -> EntityId {
            EntityId::new(9)
        }

        fn attack_multiplier(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn profile_damage_truncates() {
        let profile = AttackProfile::new(10).with_modifier(5);
        assert_eq!(profile.damage_for(&Turret(1.0)), 15);
        assert_eq!(profile.damage_for(&Turret(1.19)), 17);
        assert_eq!(profile.damage_for(&Turret(0.0)), 0);
    }

    #[test]
    fn payload_copies_profile_fields() {
        let mut profile = AttackProfile::new(30)
            .with_element(Element::Fire)
            .with_status(StatusEffectKind::Rooted);
        profile.additional_statuses.push(StatusEffectKind::Burning);
        profile.pierces_untargetable = true;

        let payload = profile.build_payload(&Turret(2.0));
        assert_eq!(payload.damage, 60);
        assert_eq!(payload.attacker, Some(EntityId::new(9)));
        assert_eq!(payload.element, Element::Fire);
        assert!(payload.pierces_untargetable);
        assert_eq!(
            payload.statuses().collect::<Vec<_>>(),
            vec![StatusEffectKind::Rooted, StatusEffectKind::Burning]
        );
    }

    #[test]
    fn entity_is_an_attack_source() {
        let entity = Entity::from_spec(
            EntityId::new(3),
            &EntitySpec::new(Team::Enemy, 50).with_attack(0.5),
            Cell::new(0, 0),
        );
        let payload = AttackProfile::new(41).build_payload(&entity);
        assert_eq!(payload.damage, 20);
        assert_eq!(payload.attacker, Some(EntityId::new(3)));
    }

    #[test]
    fn mark_statuses_by_element() {
        assert_eq!(Element::Blade.mark_status(), Some(StatusEffectKind::Bleeding));
        assert_eq!(Element::Water.mark_status(), Some(StatusEffectKind::Frozen));
        assert_eq!(Element::Electric.mark_status(), Some(StatusEffectKind::Paralyzed));
        assert_eq!(Element::Normal.mark_status(), None);
        assert_eq!(Element::Breaking.mark_status(), None);
    }

    #[test]
    fn payload_json_defaults() {
        let payload: AttackPayload =
            serde_json::from_str(r#"{ "damage": 12, "element": "Plasma" }"#).unwrap();
        assert_eq!(payload.damage, 12);
        assert_eq!(payload.element, Element::Unknown);
        assert!(payload.additional_statuses.is_empty());
    }
}
