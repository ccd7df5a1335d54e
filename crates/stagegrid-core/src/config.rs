//! Battle tuning configuration.
//!
//! [`BattleConfig`] collects every timing and numeric constant the core uses.
//! It deserializes from JSON with per-field defaults, so a config file only
//! needs to name the values it overrides:
//!
//! ```
//! use stagegrid_core::config::BattleConfig;
//!
//! let config = BattleConfig::from_json(r#"{ "shove_damage": 60 }"#).unwrap();
//! assert_eq!(config.shove_damage, 60);
//! assert_eq!(config.max_damage, 999_999);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fixed simulation timestep (1/60 second).
pub const FIXED_DT: f32 = 1.0 / 60.0;

/// Parameters for a repeating true-damage effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageOverTime {
    /// Damage applied per tick.
    pub damage: i32,
    /// Seconds between ticks.
    pub tickrate: f32,
    /// Total seconds the effect runs.
    pub duration: f32,
}

impl DamageOverTime {
    /// Creates a new damage-over-time description.
    #[must_use]
    pub const fn new(damage: i32, tickrate: f32, duration: f32) -> Self {
        Self {
            damage,
            tickrate,
            duration,
        }
    }

    /// Number of ticks this effect lands: `ceil(duration / tickrate)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn tick_count(&self) -> u32 {
        if self.tickrate <= 0.0 || self.duration <= 0.0 {
            return 0;
        }
        (self.duration / self.tickrate).ceil() as u32
    }
}

/// Default durations for each status effect kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTuning {
    /// Seconds a paralysis (stun) holds the entity.
    pub paralyze_duration: f32,
    /// Seconds a freeze holds the entity.
    pub freeze_duration: f32,
    /// Seconds a root prevents movement.
    pub root_duration: f32,
    /// Bleeding damage-over-time.
    pub bleed: DamageOverTime,
    /// Burning damage-over-time.
    pub burn: DamageOverTime,
}

impl Default for StatusTuning {
    fn default() -> Self {
        Self {
            paralyze_duration: 1.0,
            freeze_duration: 1.0,
            root_duration: 1.0,
            bleed: DamageOverTime::new(2, 0.25, 2.0),
            burn: DamageOverTime::new(5, 0.5, 3.0),
        }
    }
}

/// Tuning for a battle session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Timestep used by [`Battle::step`](crate::battle::Battle::step).
    pub fixed_dt: f32,
    /// Lower clamp for a mitigated hit.
    pub min_damage: i32,
    /// Upper clamp for a mitigated hit.
    pub max_damage: i32,
    /// Full duration of a voluntary move; the mover lands at the half.
    pub move_duration: f32,
    /// Full duration of a shove relocation; the entity lands at the half.
    pub shove_duration: f32,
    /// Seconds a shoved entity stays rooted after colliding with an occupant.
    pub shove_recoil_duration: f32,
    /// Damage dealt to both parties of a shove collision.
    pub shove_damage: i32,
    /// Seconds between the start of destruction and the death notification.
    pub destruction_delay: f32,
    /// Seconds the health counter takes to reach its target.
    pub health_counter_duration: f32,
    /// Maximum number of steps in a health counter animation.
    pub health_counter_max_steps: u32,
    /// Minimum incoming attack damage that animates the health counter.
    pub hit_counter_threshold: i32,
    /// Minimum direct damage that animates the health counter.
    pub direct_counter_threshold: i32,
    /// Status effect durations.
    pub statuses: StatusTuning,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            fixed_dt: FIXED_DT,
            min_damage: 1,
            max_damage: 999_999,
            move_duration: 0.1,
            shove_duration: 0.15,
            shove_recoil_duration: 0.25,
            shove_damage: 40,
            destruction_delay: 0.4,
            health_counter_duration: 0.12,
            health_counter_max_steps: 24,
            hit_counter_threshold: 10,
            direct_counter_threshold: 5,
            statuses: StatusTuning::default(),
        }
    }
}

impl BattleConfig {
    /// Parses a config from JSON and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed input and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that all values are in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("fixed_dt", self.fixed_dt),
            ("move_duration", self.move_duration),
            ("shove_duration", self.shove_duration),
            ("health_counter_duration", self.health_counter_duration),
            ("statuses.bleed.tickrate", self.statuses.bleed.tickrate),
            ("statuses.burn.tickrate", self.statuses.burn.tickrate),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }

        let non_negative = [
            ("shove_recoil_duration", self.shove_recoil_duration),
            ("destruction_delay", self.destruction_delay),
            ("statuses.paralyze_duration", self.statuses.paralyze_duration),
            ("statuses.freeze_duration", self.statuses.freeze_duration),
            ("statuses.root_duration", self.statuses.root_duration),
        ];
        for (name, value) in non_negative {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must not be negative"
                )));
            }
        }

        if self.min_damage < 0 || self.min_damage > self.max_damage {
            return Err(ConfigError::Invalid(
                "damage clamp must satisfy 0 <= min_damage <= max_damage".to_string(),
            ));
        }
        if self.health_counter_max_steps == 0 {
            return Err(ConfigError::Invalid(
                "health_counter_max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(BattleConfig::default().validate().is_ok());
    }

    #[test]
    fn default_values() {
        let config = BattleConfig::default();
        assert_eq!(config.min_damage, 1);
        assert_eq!(config.max_damage, 999_999);
        assert_eq!(config.shove_damage, 40);
        assert!((config.fixed_dt - 1.0 / 60.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            BattleConfig::from_json(r#"{ "move_duration": 0.2, "statuses": { "root_duration": 3.0 } }"#)
                .unwrap();
        assert!((config.move_duration - 0.2).abs() < f32::EPSILON);
        assert!((config.statuses.root_duration - 3.0).abs() < f32::EPSILON);
        assert_eq!(config.statuses.burn, StatusTuning::default().burn);
        assert_eq!(config.shove_damage, 40);
    }

    #[test]
    fn rejects_zero_timestep() {
        let err = BattleConfig::from_json(r#"{ "fixed_dt": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_inverted_damage_clamp() {
        let err = BattleConfig::from_json(r#"{ "min_damage": 10, "max_damage": 5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = BattleConfig::from_json("{ shove_damage: }").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn tick_count_rounds_up() {
        assert_eq!(DamageOverTime::new(10, 0.5, 10.0).tick_count(), 20);
        assert_eq!(DamageOverTime::new(1, 0.5, 1.25).tick_count(), 3);
        assert_eq!(DamageOverTime::new(1, 0.0, 1.0).tick_count(), 0);
    }
}
