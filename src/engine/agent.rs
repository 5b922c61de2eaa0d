// Tank agent: owns kinematic state, a target and a waypoint, and blends the
// steering behaviours into one acceleration per tick.
//
// Two modes:
//   Free     - no visible waypoint. Cruise at a set speed with wander noise,
//              re-testing line of sight every tick.
//   Arriving - waypoint in sight. Seek it, brake inside the arrival radius.
// Collision avoidance runs in both.
//
// Arriving only drops back to Free when the grid reports a passability
// change (through the subscription) or when the tank arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec2;
use log::{debug, info, trace};
use rand::Rng;

use super::config::SteeringTuning;
use super::navigation::{SubscriptionId, TileGrid};
use super::steering::{
    self, ForceBreakdown, KinematicState, WanderState, Whiskers, accelerate_to_speed, avoid_collisions, seek,
    slow_within, wander,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SteeringMode {
    #[default]
    Free,
    Arriving,
}

/// Read access to something with a position and rotation, for attachments
/// like a turret that follow their owner.
pub trait PositionProvider {
    fn position(&self) -> Vec2;
    fn rotation(&self) -> f32;
}

// ============================================================================
// AGENT
// ============================================================================

#[derive(Debug)]
pub struct Agent {
    kinematic: KinematicState,
    /// (width, length) in pixels.
    size: Vec2,
    target: Option<Vec2>,
    /// Next point actually steered at. Equal to the target until a planner
    /// exists to produce intermediate points.
    waypoint: Option<Vec2>,
    mode: SteeringMode,
    wander: WanderState,
    /// Raised by the grid listener, consumed at the start of the next tick.
    route_stale: Arc<AtomicBool>,
    subscription: Option<SubscriptionId>,
    last_forces: ForceBreakdown,
}

impl Agent {
    /// Stationary tank at `position`, heading for `default_target`.
    pub fn new(position: Vec2, size: Vec2, default_target: Vec2) -> Self {
        Self {
            kinematic: KinematicState::at(position),
            size,
            target: Some(default_target),
            waypoint: Some(default_target),
            mode: SteeringMode::Free,
            wander: WanderState::default(),
            route_stale: Arc::new(AtomicBool::new(false)),
            subscription: None,
            last_forces: ForceBreakdown::default(),
        }
    }

    pub fn kinematic(&self) -> &KinematicState {
        &self.kinematic
    }

    pub fn velocity(&self) -> Vec2 {
        self.kinematic.velocity
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn target(&self) -> Option<Vec2> {
        self.target
    }

    pub fn waypoint(&self) -> Option<Vec2> {
        self.waypoint
    }

    pub fn mode(&self) -> SteeringMode {
        self.mode
    }

    pub fn wander_state(&self) -> WanderState {
        self.wander
    }

    /// Forces from the most recent `tick`.
    pub fn last_forces(&self) -> &ForceBreakdown {
        &self.last_forces
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Current whisker probes, for drawing.
    pub fn whiskers(&self, tuning: &SteeringTuning, dt: f32) -> Whiskers {
        steering::whiskers(&self.kinematic, self.size, tuning.avoid.turn_distance, dt)
    }

    /// Place the tank somewhere else, keeping its velocity.
    pub fn teleport(&mut self, position: Vec2) {
        self.kinematic.position = position;
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.kinematic.velocity = velocity;
        if velocity != Vec2::ZERO {
            self.kinematic.rotation = steering::rotation_of(velocity);
        }
    }

    /// New destination. The waypoint follows it and the mode is re-derived
    /// from line of sight straight away.
    pub fn set_target(&mut self, point: Vec2, grid: &TileGrid) {
        debug!("agent target set to ({:.1}, {:.1})", point.x, point.y);
        self.target = Some(point);
        self.waypoint = Some(point);
        self.refresh_mode(grid);
    }

    /// Forget the destination and roam.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.waypoint = None;
        self.set_mode(SteeringMode::Free);
    }

    /// React to a passability change: re-test the waypoint.
    pub fn on_obstacle_changed(&mut self, grid: &TileGrid) {
        if self.waypoint.is_some() {
            self.refresh_mode(grid);
        }
    }

    /// Listen for obstacle changes on `grid`. Replaces an earlier
    /// subscription, which must have been on the same grid.
    ///
    /// Dropping the agent leaves the listener registered; call
    /// `unsubscribe` first (`systems::despawn_tank` does this for tanks).
    pub fn subscribe(&mut self, grid: &mut TileGrid) {
        self.unsubscribe(grid);
        let stale = Arc::clone(&self.route_stale);
        let id = grid.register(Box::new(move |_: &TileGrid| {
            stale.store(true, Ordering::Release);
        }));
        self.subscription = Some(id);
    }

    pub fn unsubscribe(&mut self, grid: &mut TileGrid) {
        if let Some(id) = self.subscription.take() {
            grid.deregister(id);
        }
    }

    /// Advance one step of `dt` seconds. Returns the forces that were applied.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        grid: &TileGrid,
        tuning: &SteeringTuning,
        rng: &mut R,
    ) -> ForceBreakdown {
        if self.route_stale.swap(false, Ordering::AcqRel) {
            self.on_obstacle_changed(grid);
        } else if self.mode == SteeringMode::Free && self.waypoint.is_some() {
            self.refresh_mode(grid);
        }

        self.check_arrival(tuning);

        let k = self.kinematic;
        let mut forces = ForceBreakdown {
            avoid: avoid_collisions(&k, self.size, grid, &tuning.avoid, dt, rng),
            ..Default::default()
        };

        match (self.mode, self.waypoint) {
            (SteeringMode::Arriving, Some(waypoint)) => {
                let arrive = &tuning.arrive;
                forces.seek = seek(k.position, k.velocity, waypoint, arrive.turn_gain);
                if k.position.distance_squared(waypoint) < arrive.radius * arrive.radius {
                    forces.slow = slow_within(k.position, k.velocity, waypoint, arrive.radius, arrive.brake_gain);
                } else {
                    forces.accelerate =
                        accelerate_to_speed(k.velocity, k.rotation, arrive.speed, arrive.max_accel, arrive.band);
                }
            }
            _ => {
                let cruise = &tuning.cruise;
                forces.accelerate =
                    accelerate_to_speed(k.velocity, k.rotation, cruise.speed, cruise.max_accel, cruise.band);
                // Always advance the wander state so the RNG stream does not
                // depend on the suppression policy.
                let (drift, state) = wander(k.rotation, k.velocity, self.wander, &tuning.wander, dt, rng);
                self.wander = state;
                let suppressed = tuning.policy.suppress_wander_while_avoiding && forces.avoid != Vec2::ZERO;
                if !suppressed {
                    forces.wander = drift;
                }
            }
        }

        let acceleration = forces.total();
        self.kinematic.integrate(acceleration, dt, grid.screen_size());
        self.check_arrival(tuning);
        trace!(
            "tick {:?} seek={} accel={} slow={} wander={} avoid={} -> pos={} vel={}",
            self.mode,
            forces.seek,
            forces.accelerate,
            forces.slow,
            forces.wander,
            forces.avoid,
            self.kinematic.position,
            self.kinematic.velocity
        );

        self.last_forces = forces;
        forces
    }

    fn check_arrival(&mut self, tuning: &SteeringTuning) {
        let Some(target) = self.target else {
            return;
        };
        let arrive = &tuning.arrive;
        let inside = self.kinematic.position.distance_squared(target) < arrive.radius * arrive.radius;
        let settled = arrive.settle_speed.is_none_or(|limit| self.kinematic.speed() <= limit);
        if inside && settled {
            info!("agent arrived at ({:.1}, {:.1})", target.x, target.y);
            self.clear_target();
        }
    }

    fn refresh_mode(&mut self, grid: &TileGrid) {
        let mode = match self.waypoint {
            Some(waypoint) if grid.line_of_sight(self.kinematic.position, waypoint, true, false) => {
                SteeringMode::Arriving
            }
            _ => SteeringMode::Free,
        };
        self.set_mode(mode);
    }

    fn set_mode(&mut self, mode: SteeringMode) {
        if mode != self.mode {
            debug!("agent mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }
}

impl PositionProvider for Agent {
    fn position(&self) -> Vec2 {
        self.kinematic.position
    }

    fn rotation(&self) -> f32 {
        self.kinematic.rotation
    }
}

// ============================================================================
// TURRET
// ============================================================================

/// Gun turret riding on an owner, aimed independently of the hull.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Turret {
    pub position: Vec2,
    pub rotation: f32,
}

impl Turret {
    /// Follow the owner and face `aim`. Keeps the previous rotation when the
    /// aim point sits exactly on the turret.
    pub fn update(&mut self, owner: &impl PositionProvider, aim: Vec2) {
        self.position = owner.position();
        let to_aim = aim - self.position;
        if to_aim != Vec2::ZERO {
            self.rotation = steering::rotation_of(to_aim);
        }
    }

    /// Turret sitting on `owner`, facing the same way as the hull.
    pub fn mounted_on(owner: &impl PositionProvider) -> Self {
        Self { position: owner.position(), rotation: owner.rotation() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const DT: f32 = 1.0 / 60.0;
    const TANK: Vec2 = Vec2::new(57.0, 72.0);

    fn level() -> TileGrid {
        TileGrid::new(Vec2::new(640.0, 480.0), Vec2::new(32.0, 32.0))
    }

    fn wall_at_column(grid: &mut TileGrid, column: i32) {
        for y in 0..grid.height() {
            grid.set_obstacle(IVec2::new(column, y), true);
        }
    }

    #[test]
    fn new_agent_heads_for_default_target() {
        let agent = Agent::new(Vec2::new(10.0, 10.0), TANK, Vec2::new(320.0, 240.0));
        assert_eq!(agent.target(), Some(Vec2::new(320.0, 240.0)));
        assert_eq!(agent.waypoint(), agent.target());
        assert_eq!(agent.mode(), SteeringMode::Free);
        assert_eq!(agent.velocity(), Vec2::ZERO);
    }

    #[test]
    fn free_agent_switches_to_arriving_when_target_visible() {
        let grid = level();
        let mut rng = StdRng::seed_from_u64(1);
        let mut agent = Agent::new(Vec2::new(48.0, 48.0), TANK, Vec2::new(400.0, 48.0));
        agent.tick(DT, &grid, &SteeringTuning::default(), &mut rng);
        assert_eq!(agent.mode(), SteeringMode::Arriving);
    }

    #[test]
    fn set_target_behind_wall_stays_free() {
        let mut grid = level();
        wall_at_column(&mut grid, 8);
        let mut agent = Agent::new(Vec2::new(48.0, 48.0), TANK, Vec2::new(48.0, 48.0));
        agent.set_target(Vec2::new(400.0, 48.0), &grid);
        assert_eq!(agent.mode(), SteeringMode::Free);
        assert_eq!(agent.waypoint(), Some(Vec2::new(400.0, 48.0)));
    }

    #[test]
    fn free_mode_uses_cruise_and_wander() {
        let grid = level();
        let mut rng = StdRng::seed_from_u64(5);
        let mut agent = Agent::new(Vec2::new(48.0, 240.0), TANK, Vec2::ZERO);
        agent.clear_target();
        agent.set_velocity(Vec2::new(100.0, 0.0));
        let forces = agent.tick(DT, &grid, &SteeringTuning::default(), &mut rng);
        assert_eq!(forces.seek, Vec2::ZERO);
        assert_eq!(forces.slow, Vec2::ZERO);
        assert!(forces.accelerate.x > 0.0);
        assert_ne!(agent.wander_state(), WanderState::default());
    }

    #[test]
    fn wander_suppression_only_drops_the_force() {
        let mut grid = level();
        // Rock ahead and to the driver's left.
        grid.set_obstacle(IVec2::new(3, 4), true);

        let run = |suppress: bool| {
            let mut tuning = SteeringTuning::default();
            tuning.policy.suppress_wander_while_avoiding = suppress;
            let mut rng = StdRng::seed_from_u64(11);
            let mut agent = Agent::new(Vec2::new(70.0, 176.0), TANK, Vec2::ZERO);
            agent.clear_target();
            agent.set_velocity(Vec2::new(100.0, 0.0));
            // Longer than the change interval, so the wander point moves.
            let forces = agent.tick(0.1, &grid, &tuning, &mut rng);
            (forces, agent.wander_state())
        };

        let (suppressed, state_on) = run(true);
        let (blended, state_off) = run(false);
        assert_ne!(suppressed.avoid, Vec2::ZERO);
        assert_eq!(suppressed.wander, Vec2::ZERO);
        assert_ne!(blended.wander, Vec2::ZERO);
        assert_ne!(state_on, WanderState::default());
        assert_eq!(state_on, state_off);
    }

    #[test]
    fn arrival_clears_target_inside_radius() {
        let grid = level();
        let mut rng = StdRng::seed_from_u64(2);
        let target = Vec2::new(200.0, 200.0);
        let mut agent = Agent::new(Vec2::new(205.0, 200.0), TANK, target);
        agent.set_target(target, &grid);
        agent.tick(DT, &grid, &SteeringTuning::default(), &mut rng);
        assert_eq!(agent.target(), None);
        assert_eq!(agent.waypoint(), None);
        assert_eq!(agent.mode(), SteeringMode::Free);
    }

    #[test]
    fn entering_radius_at_speed_arrives_on_that_tick() {
        let grid = level();
        let mut rng = StdRng::seed_from_u64(2);
        let tuning = SteeringTuning::default();
        let target = Vec2::new(500.0, 240.0);
        let mut agent = Agent::new(Vec2::new(300.0, 240.0), TANK, target);
        agent.set_velocity(Vec2::new(250.0, 0.0));
        agent.set_target(target, &grid);

        for _ in 0..120 {
            agent.tick(DT, &grid, &tuning, &mut rng);
            if agent.position().distance(target) < tuning.arrive.radius {
                break;
            }
            assert_eq!(agent.target(), Some(target));
        }
        assert!(agent.position().distance(target) < tuning.arrive.radius);
        assert!(agent.velocity().length() > 100.0);
        assert_eq!(agent.target(), None);
        assert_eq!(agent.waypoint(), None);
        assert_eq!(agent.mode(), SteeringMode::Free);
    }

    #[test]
    fn settle_speed_keeps_target_until_slow() {
        let grid = level();
        let mut rng = StdRng::seed_from_u64(2);
        let mut tuning = SteeringTuning::default();
        tuning.arrive.settle_speed = Some(10.0);
        let target = Vec2::new(200.0, 200.0);
        let mut agent = Agent::new(Vec2::new(195.0, 200.0), TANK, target);
        agent.set_velocity(Vec2::new(200.0, 0.0));
        agent.set_target(target, &grid);
        let forces = agent.tick(DT, &grid, &tuning, &mut rng);
        assert_eq!(agent.target(), Some(target));
        assert!(forces.slow.x < 0.0);
        assert_eq!(forces.accelerate, Vec2::ZERO);
    }

    #[test]
    fn obstacle_change_is_picked_up_through_subscription() {
        let mut grid = level();
        let mut rng = StdRng::seed_from_u64(3);
        let tuning = SteeringTuning::default();
        let mut agent = Agent::new(Vec2::new(48.0, 48.0), TANK, Vec2::new(400.0, 48.0));
        agent.subscribe(&mut grid);
        assert!(agent.is_subscribed());
        agent.tick(DT, &grid, &tuning, &mut rng);
        assert_eq!(agent.mode(), SteeringMode::Arriving);

        // Rock dropped between tank and target.
        grid.toggle(IVec2::new(8, 1));
        agent.tick(DT, &grid, &tuning, &mut rng);
        assert_eq!(agent.mode(), SteeringMode::Free);

        // Cleared again: Free re-tests line of sight on its own.
        grid.toggle(IVec2::new(8, 1));
        agent.tick(DT, &grid, &tuning, &mut rng);
        assert_eq!(agent.mode(), SteeringMode::Arriving);

        agent.unsubscribe(&mut grid);
        assert!(!agent.is_subscribed());
        assert_eq!(grid.listener_count(), 0);
    }

    #[test]
    fn unsubscribed_arriving_agent_ignores_new_rocks() {
        let mut grid = level();
        let mut rng = StdRng::seed_from_u64(3);
        let tuning = SteeringTuning::default();
        let mut agent = Agent::new(Vec2::new(48.0, 48.0), TANK, Vec2::new(400.0, 48.0));
        agent.tick(DT, &grid, &tuning, &mut rng);
        grid.toggle(IVec2::new(8, 1));
        agent.tick(DT, &grid, &tuning, &mut rng);
        assert_eq!(agent.mode(), SteeringMode::Arriving);

        agent.on_obstacle_changed(&grid);
        assert_eq!(agent.mode(), SteeringMode::Free);
    }

    #[test]
    fn resubscribe_replaces_listener() {
        let mut grid = level();
        let mut agent = Agent::new(Vec2::ZERO, TANK, Vec2::ZERO);
        agent.subscribe(&mut grid);
        agent.subscribe(&mut grid);
        assert_eq!(grid.listener_count(), 1);
    }

    #[test]
    fn position_wraps_around_level() {
        let grid = level();
        let mut rng = StdRng::seed_from_u64(4);
        let mut agent = Agent::new(Vec2::new(639.0, 100.0), TANK, Vec2::ZERO);
        agent.clear_target();
        agent.set_velocity(Vec2::new(150.0, 0.0));
        agent.tick(0.1, &grid, &SteeringTuning::default(), &mut rng);
        let p = agent.position();
        assert!(p.x >= 0.0 && p.x < 640.0);
        assert!(p.x < 100.0);
    }

    #[test]
    fn turret_tracks_owner_and_aim() {
        let mut agent = Agent::new(Vec2::new(100.0, 100.0), TANK, Vec2::ZERO);
        agent.set_velocity(Vec2::new(0.0, 10.0));
        let mut turret = Turret::default();

        turret.update(&agent, Vec2::new(100.0, 50.0));
        assert_eq!(turret.position, Vec2::new(100.0, 100.0));
        // Straight up the screen.
        assert!((turret.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

        turret.update(&agent, Vec2::new(100.0, 100.0));
        assert!((turret.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }
}
