// Tank steering library: toroidal tile grid with line of sight, steering
// behaviours, and the agent that blends them. The demo binary in main.rs
// draws it with wgpu.

pub mod engine;
