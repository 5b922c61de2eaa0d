// Screen camera for a flat, y-down level
//
// Camera model:
//   - World space is level pixels: origin top-left, x right, y down. The grid
//     and the tanks share it.
//   - The whole level is fitted into the window at one uniform scale and
//     centred; spare window space is letterboxed.
//   - No panning or zoom: the level is the screen.

use glam::{Mat4, Vec2};

pub struct ScreenCamera {
    world_size: Vec2,
    /// Window size in physical pixels.
    viewport: Vec2,
}

impl ScreenCamera {
    pub fn new(world_size: Vec2, viewport: Vec2) -> Self {
        Self { world_size, viewport }
    }

    /// Track a new window size. Zero sizes (minimised window) are ignored.
    pub fn resize(&mut self, viewport: Vec2) {
        if viewport.x > 0.0 && viewport.y > 0.0 {
            self.viewport = viewport;
        }
    }

    pub fn world_size(&self) -> Vec2 {
        self.world_size
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Window pixels per world pixel.
    pub fn scale(&self) -> f32 {
        let fit = self.viewport / self.world_size;
        fit.min_element().max(f32::EPSILON)
    }

    // Window-space position of the world origin.
    fn offset(&self) -> Vec2 {
        (self.viewport - self.world_size * self.scale()) * 0.5
    }

    /// Window pixel (e.g. cursor position) to world pixel.
    pub fn window_to_world(&self, window: Vec2) -> Vec2 {
        (window - self.offset()) / self.scale()
    }

    pub fn world_to_window(&self, world: Vec2) -> Vec2 {
        world * self.scale() + self.offset()
    }

    /// Orthographic projection of the visible world rectangle, y flipped so
    /// world y grows down the screen.
    pub fn view_projection(&self) -> Mat4 {
        let scale = self.scale();
        let top_left = -self.offset() / scale;
        let bottom_right = top_left + self.viewport / scale;
        Mat4::orthographic_rh(top_left.x, bottom_right.x, bottom_right.y, top_left.y, -1.0, 1.0)
    }
}
