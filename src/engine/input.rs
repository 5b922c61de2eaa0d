// Input state tracking for the pointer.
// Abstracts winit events into a queryable per-frame snapshot, and defines the
// host-agnostic `PointerSource` capability the level and agents read from.

use std::collections::HashSet;
use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};

/// The two buttons the game uses: primary toggles tiles, secondary sets the
/// tank's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
}

impl PointerButton {
    fn from_winit(button: MouseButton) -> Option<Self> {
        match button {
            MouseButton::Left => Some(Self::Primary),
            MouseButton::Right => Some(Self::Secondary),
            _ => None,
        }
    }
}

/// Per-frame pointer queries, in world pixels.
///
/// Implemented by the host's snapshot of winit input and by fakes in tests.
pub trait PointerSource {
    /// Cursor position this frame.
    fn pointer(&self) -> Vec2;
    /// True every frame the button is down.
    fn button_held(&self, button: PointerButton) -> bool;
    /// True only on the frame the button came up.
    fn button_released(&self, button: PointerButton) -> bool;
}

pub struct InputState {
    // Mouse, in physical window pixels
    pub mouse_position: (f32, f32),
    buttons_held: HashSet<PointerButton>,
    // Released since the last end_frame()
    buttons_released: HashSet<PointerButton>,

    // Window dimensions (used to map the cursor into the level)
    pub window_size: (u32, u32),
}

impl InputState {
    pub fn new() -> Self {
        Self {
            mouse_position: (0.0, 0.0),
            buttons_held: HashSet::new(),
            buttons_released: HashSet::new(),
            window_size: (0, 0),
        }
    }

    /// Feed a winit WindowEvent into the input state.
    /// Call this once per event before the game's own event handling.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = PointerButton::from_winit(*button) {
                    match state {
                        ElementState::Pressed => {
                            self.buttons_held.insert(button);
                        }
                        ElementState::Released => {
                            self.buttons_held.remove(&button);
                            self.buttons_released.insert(button);
                        }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_position = (position.x as f32, position.y as f32);
            }
            WindowEvent::Resized(size) => {
                self.window_size = (size.width, size.height);
            }
            _ => {}
        }
    }

    /// Call once per frame after update() has consumed input.
    /// Resets per-frame edges.
    pub fn end_frame(&mut self) {
        self.buttons_released.clear();
    }

    pub fn is_button_held(&self, button: PointerButton) -> bool {
        self.buttons_held.contains(&button)
    }

    pub fn was_button_released(&self, button: PointerButton) -> bool {
        self.buttons_released.contains(&button)
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;
    use winit::event::DeviceId;

    fn click(input: &mut InputState, button: MouseButton, state: ElementState) {
        input.process_event(&WindowEvent::MouseInput {
            device_id: unsafe { DeviceId::dummy() },
            state,
            button,
        });
    }

    #[test]
    fn release_edge_lasts_one_frame() {
        let mut input = InputState::new();
        click(&mut input, MouseButton::Right, ElementState::Pressed);
        assert!(input.is_button_held(PointerButton::Secondary));
        assert!(!input.was_button_released(PointerButton::Secondary));

        click(&mut input, MouseButton::Right, ElementState::Released);
        assert!(!input.is_button_held(PointerButton::Secondary));
        assert!(input.was_button_released(PointerButton::Secondary));

        input.end_frame();
        assert!(!input.was_button_released(PointerButton::Secondary));
    }

    #[test]
    fn middle_button_is_ignored() {
        let mut input = InputState::new();
        click(&mut input, MouseButton::Middle, ElementState::Pressed);
        assert!(!input.is_button_held(PointerButton::Primary));
        assert!(!input.is_button_held(PointerButton::Secondary));
    }

    #[test]
    fn cursor_and_resize_are_tracked() {
        let mut input = InputState::new();
        input.process_event(&WindowEvent::CursorMoved {
            device_id: unsafe { DeviceId::dummy() },
            position: PhysicalPosition::new(12.5, 40.0),
        });
        input.process_event(&WindowEvent::Resized(winit::dpi::PhysicalSize::new(800, 600)));
        assert_eq!(input.mouse_position, (12.5, 40.0));
        assert_eq!(input.window_size, (800, 600));
    }
}
