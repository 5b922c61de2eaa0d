// Tunables for the level, the tanks and every steering behaviour.
//
// Loaded once at startup from RON. Every field has a default, so a config
// file only needs the values it wants to change. A missing or broken file
// falls back to the defaults with an error in the log.

use std::path::Path;

use log::{error, info};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::navigation::ObstacleShape;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "assets/game_config.ron";

// ============================================================================
// LEVEL / TANK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub screen_width: f32,
    pub screen_height: f32,
    pub tile_width: f32,
    pub tile_height: f32,
    /// Share of tiles turned into rocks at startup, in [0, 1].
    pub obstacle_fraction: f32,
    pub obstacle_shape: ObstacleShape,
    /// Seed for level generation and steering noise. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            screen_width: 1280.0,
            screen_height: 720.0,
            tile_width: 32.0,
            tile_height: 32.0,
            obstacle_fraction: 0.0,
            obstacle_shape: ObstacleShape::InscribedCircle,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankConfig {
    /// Side-to-side extent in pixels.
    pub width: f32,
    /// Front-to-back extent in pixels.
    pub length: f32,
    pub count: usize,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            width: 57.0,
            length: 72.0,
            count: 1,
        }
    }
}

// ============================================================================
// STEERING
// ============================================================================

/// Speed held while roaming with no destination in sight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CruiseConfig {
    pub speed: f32,
    pub max_accel: f32,
    /// Half-width of the speed window where acceleration tapers off.
    pub band: f32,
}

impl Default for CruiseConfig {
    fn default() -> Self {
        Self {
            speed: 150.0,
            max_accel: 150.0,
            band: 10.0,
        }
    }
}

/// Seeking and braking toward a visible waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArriveConfig {
    pub speed: f32,
    pub max_accel: f32,
    pub band: f32,
    pub turn_gain: f32,
    /// Inside this distance the tank stops accelerating and brakes.
    pub radius: f32,
    pub brake_gain: f32,
    /// When set, arriving also needs speed at or below this. `None` clears
    /// the target as soon as the tank is inside `radius`.
    pub settle_speed: Option<f32>,
}

impl Default for ArriveConfig {
    fn default() -> Self {
        Self {
            speed: 250.0,
            max_accel: 250.0,
            band: 10.0,
            turn_gain: 10.0,
            radius: 20.0,
            brake_gain: 20.0,
            settle_speed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WanderConfig {
    pub radius: f32,
    /// Largest distance the wander point moves along its circle per change.
    pub change_radius: f32,
    /// Seconds between wander changes.
    pub change_interval: f32,
    /// Distance the wander circle sits ahead of the tank.
    pub offset: f32,
    pub gain: f32,
}

impl Default for WanderConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            change_radius: 5.0,
            change_interval: 0.05,
            offset: 20.0,
            gain: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidConfig {
    /// Extra whisker reach beyond the front of the tank.
    pub turn_distance: f32,
    pub turn_gain: f32,
    pub brake_gain: f32,
}

impl Default for AvoidConfig {
    fn default() -> Self {
        Self {
            turn_distance: 50.0,
            turn_gain: 10.0,
            brake_gain: 20.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Drop the wander force on ticks where obstacle avoidance is steering.
    pub suppress_wander_while_avoiding: bool,
}

/// Everything `Agent::tick` needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringTuning {
    pub cruise: CruiseConfig,
    pub arrive: ArriveConfig,
    pub wander: WanderConfig,
    pub avoid: AvoidConfig,
    pub policy: PolicyConfig,
}

// ============================================================================
// GAME CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub level: LevelConfig,
    pub tank: TankConfig,
    pub steering: SteeringTuning,
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    // Written this way round so NaN fails too.
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: "must be a positive finite number" })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: "must be zero or a positive finite number" })
    }
}

impl GameConfig {
    /// Read, parse and validate a RON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GameConfig = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but logs the failure and returns the defaults instead.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded game config from {}", path.display());
                config
            }
            Err(e) => {
                error!("{}", e);
                error!("Using default GameConfig");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = &self.level;
        positive("level.screen_width", level.screen_width)?;
        positive("level.screen_height", level.screen_height)?;
        positive("level.tile_width", level.tile_width)?;
        positive("level.tile_height", level.tile_height)?;
        if !(0.0..=1.0).contains(&level.obstacle_fraction) {
            return Err(ConfigError::Invalid {
                field: "level.obstacle_fraction",
                reason: "must be between 0 and 1",
            });
        }

        positive("tank.width", self.tank.width)?;
        positive("tank.length", self.tank.length)?;

        let s = &self.steering;
        non_negative("steering.cruise.speed", s.cruise.speed)?;
        non_negative("steering.cruise.max_accel", s.cruise.max_accel)?;
        non_negative("steering.cruise.band", s.cruise.band)?;

        non_negative("steering.arrive.speed", s.arrive.speed)?;
        non_negative("steering.arrive.max_accel", s.arrive.max_accel)?;
        non_negative("steering.arrive.band", s.arrive.band)?;
        non_negative("steering.arrive.turn_gain", s.arrive.turn_gain)?;
        positive("steering.arrive.radius", s.arrive.radius)?;
        non_negative("steering.arrive.brake_gain", s.arrive.brake_gain)?;
        if let Some(settle_speed) = s.arrive.settle_speed {
            non_negative("steering.arrive.settle_speed", settle_speed)?;
        }

        positive("steering.wander.radius", s.wander.radius)?;
        non_negative("steering.wander.change_radius", s.wander.change_radius)?;
        positive("steering.wander.change_interval", s.wander.change_interval)?;
        non_negative("steering.wander.offset", s.wander.offset)?;
        non_negative("steering.wander.gain", s.wander.gain)?;

        non_negative("steering.avoid.turn_distance", s.avoid.turn_distance)?;
        non_negative("steering.avoid.turn_gain", s.avoid.turn_gain)?;
        non_negative("steering.avoid.brake_gain", s.avoid.brake_gain)?;
        Ok(())
    }
}
