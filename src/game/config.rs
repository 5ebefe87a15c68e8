//! Race Tuning
//!
//! Every number the simulation depends on lives here. `RaceConfig::default()`
//! carries the contract values; rooms may load overrides from JSON.

use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::core::clock::Millis;

/// Width of a car, in track percent.
pub const PLAYER_WIDTH: f64 = 8.0;
/// Width of an obstacle or token, in track percent.
pub const OBJECT_WIDTH: f64 = 6.0;
/// Rightmost lane position a car may occupy.
pub const LANE_MAX: f64 = 92.0;
/// Rightmost x at which an object may spawn (exclusive).
pub const OBJECT_X_MAX: f64 = 94.0;
/// Units a player must cover to finish.
pub const RACE_DISTANCE: f64 = 1000.0;
/// Lives every player starts a race with.
pub const INITIAL_LIVES: u32 = 3;
/// Simulation tick period.
pub const SIMULATION_PERIOD_MS: Millis = 16;

/// Tuning for one race engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Car width (collision footprint).
    pub player_width: f64,
    /// Object width (collision footprint).
    pub object_width: f64,
    /// Upper clamp for lane positions; the lower clamp is 0.
    pub lane_max: f64,
    /// Objects spawn with x in `[0, object_x_max)`.
    pub object_x_max: f64,
    /// Lane position given to a freshly added player.
    pub start_position: f64,
    /// Lane change applied by one steer command.
    pub lane_step: f64,

    /// Simulation (motion + collision) period.
    pub simulation_period_ms: Millis,
    /// Object spawn period.
    pub spawn_period_ms: Millis,
    /// Distance accrual period.
    pub progress_period_ms: Millis,
    /// Event ring garbage collection period.
    pub event_gc_period_ms: Millis,

    /// Chance that a spawned object is a token.
    pub token_probability: f64,
    /// Spawn height of new objects.
    pub spawn_y: f64,
    /// Objects at or below this height are culled.
    pub cull_y: f64,
    /// Exclusive lower bound of the collision band.
    pub collision_band_min: f64,
    /// Exclusive upper bound of the collision band.
    pub collision_band_max: f64,

    /// Speed at race start.
    pub initial_speed: f64,
    /// Speed ceiling.
    pub max_speed: f64,
    /// Milliseconds for speed to grow by one unit.
    pub speed_ramp_ms: f64,

    /// Distance to finish.
    pub race_distance: f64,
    /// Fraction of game speed credited per progress update.
    pub progress_factor: f64,
    /// Distance credited per accepted move command.
    pub move_distance_bonus: f64,

    /// Lives at race start.
    pub initial_lives: u32,
    /// Score per token.
    pub token_value: u32,

    /// Maximum retained events.
    pub event_ring_size: usize,
    /// Events older than this are discarded.
    pub event_ttl_ms: Millis,
    /// Time after the first finish before the race is closed.
    pub finish_grace_ms: Millis,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            player_width: PLAYER_WIDTH,
            object_width: OBJECT_WIDTH,
            lane_max: LANE_MAX,
            object_x_max: OBJECT_X_MAX,
            start_position: 50.0,
            lane_step: 15.0,

            simulation_period_ms: SIMULATION_PERIOD_MS,
            spawn_period_ms: 1200,
            progress_period_ms: 100,
            event_gc_period_ms: 50,

            token_probability: 0.35,
            spawn_y: -10.0,
            cull_y: 110.0,
            collision_band_min: 70.0,
            collision_band_max: 90.0,

            initial_speed: 2.0,
            max_speed: 4.0,
            speed_ramp_ms: 30_000.0,

            race_distance: RACE_DISTANCE,
            progress_factor: 0.1,
            move_distance_bonus: 0.5,

            initial_lives: INITIAL_LIVES,
            token_value: 10,

            event_ring_size: 100,
            event_ttl_ms: 10_000,
            finish_grace_ms: 30_000,
        }
    }
}

impl RaceConfig {
    /// Parse a (possibly partial) JSON config; missing fields keep defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Half the summed widths: centers closer than this overlap.
    #[inline]
    pub fn hit_distance(&self) -> f64 {
        (self.player_width + self.object_width) / 2.0
    }

    /// Check that the tuning describes a playable race.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("simulation_period_ms", self.simulation_period_ms),
            ("spawn_period_ms", self.spawn_period_ms),
            ("progress_period_ms", self.progress_period_ms),
            ("event_gc_period_ms", self.event_gc_period_ms),
        ];
        for (field, value) in periods {
            if value == 0 {
                return Err(ConfigError::invalid(field, "period must be positive"));
            }
        }

        if !(0.0..=1.0).contains(&self.token_probability) {
            return Err(ConfigError::invalid("token_probability", "must be within [0, 1]"));
        }
        if self.lane_max <= 0.0 {
            return Err(ConfigError::invalid("lane_max", "lane must have positive width"));
        }
        if self.object_x_max <= 0.0 {
            return Err(ConfigError::invalid("object_x_max", "spawn range must have positive width"));
        }
        if !(0.0..=self.lane_max).contains(&self.start_position) {
            return Err(ConfigError::invalid("start_position", "must lie inside the lane"));
        }
        if self.collision_band_min >= self.collision_band_max {
            return Err(ConfigError::invalid("collision_band_min", "band must be non-empty"));
        }
        if self.spawn_y >= self.cull_y {
            return Err(ConfigError::invalid("spawn_y", "objects would be culled on spawn"));
        }
        if self.initial_speed <= 0.0 || self.max_speed < self.initial_speed {
            return Err(ConfigError::invalid("max_speed", "need 0 < initial_speed <= max_speed"));
        }
        if self.speed_ramp_ms <= 0.0 {
            return Err(ConfigError::invalid("speed_ramp_ms", "must be positive"));
        }
        if self.race_distance <= 0.0 {
            return Err(ConfigError::invalid("race_distance", "must be positive"));
        }
        if self.initial_lives == 0 {
            return Err(ConfigError::invalid("initial_lives", "players need at least one life"));
        }
        if self.event_ring_size == 0 {
            return Err(ConfigError::invalid("event_ring_size", "ring must hold at least one event"));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field holds an unusable value.
    #[error("Invalid config field `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// JSON could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Config file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &str) -> Self {
        Self::Invalid { field, reason: reason.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RaceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.hit_distance(), 7.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RaceConfig::from_json_str(r#"{ "race_distance": 250.0, "token_probability": 1.0 }"#)
            .unwrap();
        assert_eq!(config.race_distance, 250.0);
        assert_eq!(config.token_probability, 1.0);
        assert_eq!(config.spawn_period_ms, 1200);
        assert_eq!(config.initial_lives, 3);
    }

    #[test]
    fn test_rejects_bad_probability() {
        let err = RaceConfig::from_json_str(r#"{ "token_probability": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "token_probability", .. }));
    }

    #[test]
    fn test_rejects_zero_period() {
        let config = RaceConfig {
            spawn_period_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "spawn_period_ms", .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            RaceConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
