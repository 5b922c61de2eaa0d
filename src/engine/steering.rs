// Steering behaviours for a point-mass tank.
//
// Every behaviour is a pure function of kinematic state plus tuning and
// returns a force. Tanks have unit mass, so force == acceleration. The agent
// blends forces by plain vector sum: gains must be picked so the sum stays
// bounded, nothing here normalises.
//
// Rotation convention: screen space, y down.
//   rotation = atan2(-vy, vx)      facing(rotation) = (cos r, -sin r)
//
// Randomness (wander drift, the avoidance tie-break) always comes from the
// caller's RNG so runs can be reproduced with a seeded generator.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

use super::config::{AvoidConfig, WanderConfig};
use super::navigation::{TileGrid, step_toward};

// ============================================================================
// KINEMATICS
// ============================================================================

/// Rotation for a non-zero velocity, in the y-down convention.
#[inline]
pub fn rotation_of(velocity: Vec2) -> f32 {
    (-velocity.y).atan2(velocity.x)
}

/// Unit facing vector for a rotation. Inverse of `rotation_of`.
#[inline]
pub fn facing(rotation: f32) -> Vec2 {
    Vec2::new(rotation.cos(), -rotation.sin())
}

/// Velocity's unit vector, or the facing direction when stationary.
#[inline]
pub fn travel_direction(velocity: Vec2, rotation: f32) -> Vec2 {
    let speed = velocity.length();
    if speed > 0.0 { velocity / speed } else { facing(rotation) }
}

/// Position, velocity and rotation of one tank.
///
/// `rotation` is only meaningful once the velocity has been non-zero; it
/// keeps its last value whenever the tank comes to a full stop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KinematicState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
}

impl KinematicState {
    pub fn at(position: Vec2) -> Self {
        Self { position, ..Default::default() }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Advance one step under constant acceleration, then wrap the position
    /// onto the `world` torus.
    pub fn integrate(&mut self, acceleration: Vec2, dt: f32, world: Vec2) {
        let moved = self.position + self.velocity * dt + 0.5 * acceleration * dt * dt;
        self.position = Vec2::new(moved.x.rem_euclid(world.x), moved.y.rem_euclid(world.y));
        self.velocity += acceleration * dt;
        if self.velocity != Vec2::ZERO {
            self.rotation = rotation_of(self.velocity);
        }
    }
}

// ============================================================================
// BEHAVIOURS
// ============================================================================

/// Turn the velocity toward `target` without changing speed.
///
/// The desired velocity points at the target with the current speed; the
/// force is `turn_gain` times the difference. Zero when already at the target.
pub fn seek(position: Vec2, velocity: Vec2, target: Vec2, turn_gain: f32) -> Vec2 {
    let displacement = position - target;
    let distance_sq = displacement.length_squared();
    if distance_sq <= 0.0 {
        return Vec2::ZERO;
    }
    let distance = distance_sq.sqrt();
    let speed = velocity.length();
    -turn_gain * (displacement * (speed / distance) + velocity)
}

/// Brake inside `radius` of `target`, harder the closer the tank gets.
///
/// Strength is `brake_gain * (1 - (d / radius)^2)`, applied against the
/// velocity; full strength exactly at the target, zero at and beyond the
/// radius. A stationary tank gets no force.
pub fn slow_within(position: Vec2, velocity: Vec2, target: Vec2, radius: f32, brake_gain: f32) -> Vec2 {
    if position == target {
        return -velocity * brake_gain;
    }
    let distance_sq = position.distance_squared(target);
    let radius_sq = radius * radius;
    if distance_sq >= radius_sq {
        return Vec2::ZERO;
    }
    -velocity * brake_gain * (1.0 - distance_sq / radius_sq)
}

/// Push the current speed toward `desired_speed`.
///
/// Full `max_accel` outside `[desired - band, desired + band]`, tapering
/// linearly to zero at `desired_speed` inside it, from either side. Acts
/// along the velocity, or along the facing direction from a standstill.
pub fn accelerate_to_speed(velocity: Vec2, rotation: f32, desired_speed: f32, max_accel: f32, cruise_band: f32) -> Vec2 {
    let speed_sq = velocity.length_squared();
    if speed_sq == desired_speed * desired_speed {
        return Vec2::ZERO;
    }

    let speed = speed_sq.sqrt();
    let direction = if speed > 0.0 { velocity / speed } else { facing(rotation) };

    let cruise_min = desired_speed - desired_speed.min(cruise_band);
    let cruise_max = desired_speed + cruise_band;
    let below = speed < desired_speed;
    let mut magnitude = if below { max_accel } else { -max_accel };
    if cruise_min < speed && speed < cruise_max {
        let threshold = if below { cruise_min } else { cruise_max };
        magnitude *= (speed - desired_speed) / (threshold - desired_speed);
    }
    direction * magnitude
}

/// Angle of the wander point on its circle plus the clock that paces changes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WanderState {
    pub phase: f32,
    pub clock: f32,
}

/// Random drift, returned with the advanced wander state.
///
/// Every `change_interval` seconds the phase takes a uniform random step of
/// at most `change_radius / radius` radians. The clock keeps the remainder
/// past each interval so the drift rate does not depend on frame rate. The
/// wander point sits on a circle `offset` ahead of the tank; the force
/// matches the velocity to "current speed toward that point".
pub fn wander<R: Rng + ?Sized>(
    rotation: f32,
    velocity: Vec2,
    state: WanderState,
    params: &WanderConfig,
    dt: f32,
    rng: &mut R,
) -> (Vec2, WanderState) {
    let mut state = state;
    state.clock += dt;
    let max_step = params.change_radius / params.radius;
    if params.change_interval > 0.0 {
        while state.clock >= params.change_interval {
            state.clock -= params.change_interval;
            state.phase += rng.gen_range(-1.0_f32..=1.0) * max_step;
        }
    }
    state.phase = state.phase.rem_euclid(TAU);

    let forward = facing(rotation);
    let side = forward.perp();
    let local = Vec2::new(
        params.offset + params.radius * state.phase.cos(),
        params.radius * state.phase.sin(),
    );
    let point = forward * local.x + side * local.y;

    let desired = point.normalize_or_zero() * velocity.length();
    ((desired - velocity) * params.gain, state)
}

/// Vector sum of forces. No normalisation.
pub fn blend(forces: impl IntoIterator<Item = Vec2>) -> Vec2 {
    forces.into_iter().fold(Vec2::ZERO, |sum, force| sum + force)
}

// ============================================================================
// WHISKERS / COLLISION AVOIDANCE
// ============================================================================

/// Three parallel probes cast forward from the back of the tank.
///
/// `left`/`right` run along the tank's sides (left as seen by the driver on
/// a y-down screen), `center` down the middle. All share `direction` and
/// `length`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Whiskers {
    pub left: Vec2,
    pub right: Vec2,
    pub center: Vec2,
    pub direction: Vec2,
    pub length: f32,
}

impl Whiskers {
    /// Unit vector from the left whisker toward the right one.
    pub fn rightward(&self) -> Vec2 {
        self.direction.perp()
    }

    pub fn tip(&self, origin: Vec2) -> Vec2 {
        origin + self.direction * self.length
    }

    /// `(origin, tip)` of each probe: left, center, right.
    pub fn segments(&self) -> [(Vec2, Vec2); 3] {
        [self.left, self.center, self.right].map(|o| (o, self.tip(o)))
    }
}

/// Whisker geometry for a tank of `size` = (width, length).
///
/// Origins sit half a length behind the centre, half a width apart; reach is
/// half the length plus `turn_distance` plus one frame of travel.
pub fn whiskers(kinematic: &KinematicState, size: Vec2, turn_distance: f32, dt: f32) -> Whiskers {
    let direction = travel_direction(kinematic.velocity, kinematic.rotation);
    let rightward = direction.perp();
    let back = kinematic.position - direction * (size.y * 0.5);
    let half_width = size.x * 0.5;
    Whiskers {
        left: back - rightward * half_width,
        right: back + rightward * half_width,
        center: back,
        direction,
        length: size.y * 0.5 + turn_distance + kinematic.speed() * dt,
    }
}

/// Steer around obstacle tiles ahead of the tank.
///
/// Only the tiles returned by `gather_obstacles_ahead` are probed. The
/// nearest whisker hit decides braking; which side was hit decides the turn.
/// A tank already on an obstacle tile gets nothing: it is too late, and
/// fighting it out of the rock only makes it stick.
pub fn avoid_collisions<R: Rng + ?Sized>(
    kinematic: &KinematicState,
    size: Vec2,
    grid: &TileGrid,
    params: &AvoidConfig,
    dt: f32,
    rng: &mut R,
) -> Vec2 {
    let cell = grid.to_grid(kinematic.position);
    if grid.is_obstacle(cell) {
        return Vec2::ZERO;
    }

    let probes = whiskers(kinematic, size, params.turn_distance, dt);
    let obstacles = grid.gather_obstacles_ahead(cell, step_toward(probes.direction), false);
    if obstacles.is_empty() {
        return Vec2::ZERO;
    }

    let rightward = probes.rightward();
    let mut nearest: Option<f32> = None;
    let mut left_hit: Option<f32> = None;
    let mut right_hit: Option<f32> = None;

    for obstacle in obstacles {
        let cast = |origin: Vec2| {
            grid.nearest_obstacle_along_ray(obstacle, origin, probes.direction)
                .filter(|&d| d < probes.length)
        };
        let mut left = cast(probes.left);
        let mut right = cast(probes.right);
        let center = cast(probes.center);

        let Some(closest) = [left, right, center].into_iter().flatten().reduce(f32::min) else {
            continue;
        };

        // Obstacle slips between the side whiskers: blame the side whose tip
        // is closer to it, measured across toward the centre line.
        if let (None, None, Some(c)) = (left, right, center) {
            let inf = f32::INFINITY;
            let from_left = grid
                .nearest_obstacle_along_ray(obstacle, probes.tip(probes.left), rightward)
                .unwrap_or(inf);
            let from_right = grid
                .nearest_obstacle_along_ray(obstacle, probes.tip(probes.right), -rightward)
                .unwrap_or(inf);
            let left_closer = if from_left == from_right {
                rng.gen_bool(0.5)
            } else {
                from_left < from_right
            };
            if left_closer {
                left = Some(c);
            } else {
                right = Some(c);
            }
        }

        nearest = Some(nearest.map_or(closest, |n| n.min(closest)));
        left_hit = min_hit(left_hit, left);
        right_hit = min_hit(right_hit, right);
    }

    // Steer away from the side that sees the obstacle first.
    let steer_right = match (left_hit, right_hit) {
        (None, None) => return Vec2::ZERO,
        (Some(l), Some(r)) if l == r => rng.gen_bool(0.5),
        (Some(l), Some(r)) => l < r,
        (Some(_), None) => true,
        (None, Some(_)) => false,
    };

    let speed = kinematic.speed();
    let turn = speed * params.turn_gain;
    let turn = if steer_right { turn } else { -turn };

    let brake = match nearest {
        Some(distance) => {
            let lower = 0.5 * grid.tile_size().min_element();
            let upper = probes.length;
            let falloff = if upper > lower {
                let t = ((distance - lower) / (upper - lower)).clamp(0.0, 1.0);
                t * t - 1.0
            } else {
                -1.0
            };
            falloff * speed * params.brake_gain
        }
        None => 0.0,
    };

    probes.direction * brake + rightward * turn
}

fn min_hit(current: Option<f32>, candidate: Option<f32>) -> Option<f32> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

// ============================================================================
// FORCE BREAKDOWN
// ============================================================================

/// Every force that went into one tick, kept for tests and the debug overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceBreakdown {
    pub seek: Vec2,
    pub accelerate: Vec2,
    pub slow: Vec2,
    pub wander: Vec2,
    pub avoid: Vec2,
}

impl ForceBreakdown {
    pub fn total(&self) -> Vec2 {
        blend([self.seek, self.accelerate, self.slow, self.wander, self.avoid])
    }
}
