// Engine module - tank steering on a toroidal tile grid
//
// Core (no window, no ECS): geometry, navigation, steering, agent, config.
// Host (winit/wgpu/bevy_ecs glue): input, camera, components, systems,
// debug_overlay.

pub mod agent;
pub mod camera;
pub mod components;
pub mod config;
pub mod debug_overlay;
pub mod error;
pub mod geometry;
pub mod input;
pub mod navigation;
pub mod steering;
pub mod systems;

// Re-export commonly used items
pub use agent::{Agent, PositionProvider, SteeringMode, Turret};
pub use components::*;
pub use config::{GameConfig, SteeringTuning};
pub use error::ConfigError;
pub use navigation::{ObstacleShape, SubscriptionId, TileGrid};
pub use steering::{ForceBreakdown, KinematicState, WanderState};
