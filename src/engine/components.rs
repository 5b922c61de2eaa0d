// ECS components and resources for the tank demo
// The steering core knows nothing about bevy_ecs; these wrap it for the host.

use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::rngs::StdRng;

use super::agent::{Agent, Turret};
use super::camera::ScreenCamera;
use super::config::SteeringTuning;
use super::input::{InputState, PointerButton, PointerSource};
use super::navigation::TileGrid;

// ============================================================================
// COMPONENTS
// ============================================================================

/// Hull of one tank, driven by its steering agent.
#[derive(Component, Debug)]
pub struct TankBody {
    pub agent: Agent,
}

/// Turret entity riding on the tank `owner`.
#[derive(Component, Debug, Clone, Copy)]
pub struct TurretMount {
    pub owner: Entity,
    pub turret: Turret,
}

/// RGB color for rendering
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Tint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Tint {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Same hue, scaled toward black.
    pub fn darker(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn to_rgba(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}

// ============================================================================
// RESOURCES
// ============================================================================

/// The level grid. Systems that toggle tiles take it mutably.
#[derive(Resource, Debug)]
pub struct Level(pub TileGrid);

/// Single RNG for all simulation noise, so a seed reproduces a run.
#[derive(Resource, Debug)]
pub struct SimRng(pub StdRng);

/// Seconds since the previous frame, already clamped by the host.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct FrameTime {
    pub dt: f32,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct Settings(pub SteeringTuning);

/// Pointer state for this frame, in world pixels.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSnapshot {
    pub position: Vec2,
    pub primary_held: bool,
    pub primary_released: bool,
    pub secondary_held: bool,
    pub secondary_released: bool,
}

impl PointerSnapshot {
    /// Freeze the window input, mapping the cursor into the level.
    pub fn capture(input: &InputState, camera: &ScreenCamera) -> Self {
        let (x, y) = input.mouse_position;
        Self {
            position: camera.window_to_world(Vec2::new(x, y)),
            primary_held: input.is_button_held(PointerButton::Primary),
            primary_released: input.was_button_released(PointerButton::Primary),
            secondary_held: input.is_button_held(PointerButton::Secondary),
            secondary_released: input.was_button_released(PointerButton::Secondary),
        }
    }
}

impl PointerSource for PointerSnapshot {
    fn pointer(&self) -> Vec2 {
        self.position
    }

    fn button_held(&self, button: PointerButton) -> bool {
        match button {
            PointerButton::Primary => self.primary_held,
            PointerButton::Secondary => self.secondary_held,
        }
    }

    fn button_released(&self, button: PointerButton) -> bool {
        match button {
            PointerButton::Primary => self.primary_released,
            PointerButton::Secondary => self.secondary_released,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_maps_cursor_into_the_level() {
        let camera = ScreenCamera::new(Vec2::new(640.0, 360.0), Vec2::new(1280.0, 720.0));
        let mut input = InputState::new();
        input.mouse_position = (200.0, 100.0);

        let snapshot = PointerSnapshot::capture(&input, &camera);
        assert_eq!(snapshot.pointer(), Vec2::new(100.0, 50.0));
        assert!(!snapshot.button_held(PointerButton::Primary));
        assert!(!snapshot.button_released(PointerButton::Secondary));
    }

    #[test]
    fn darker_tint_keeps_alpha() {
        let tint = Tint::new(0.5, 1.0, 0.25).darker(0.5);
        assert_eq!(tint.to_rgba(), [0.25, 0.5, 0.125, 1.0]);
    }
}
