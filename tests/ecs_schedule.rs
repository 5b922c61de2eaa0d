// Headless run of the demo schedule: no window, no GPU.

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};
use tank_steering::engine::systems::{build_schedule, build_world};
use tank_steering::engine::{
    FrameTime, GameConfig, Level, PointerSnapshot, PositionProvider, SteeringMode, TankBody, TurretMount,
};

fn one_tank_world() -> World {
    let mut config = GameConfig::default();
    config.level.seed = Some(99);
    config.tank.count = 1;
    let mut world = build_world(&config);
    world.resource_mut::<FrameTime>().dt = 1.0 / 60.0;
    world
}

fn lead_tank(world: &mut World) -> (Vec2, Option<Vec2>, SteeringMode) {
    let mut tanks = world.query::<&TankBody>();
    let tank = tanks.single(world);
    (tank.agent.position(), tank.agent.target(), tank.agent.mode())
}

#[test]
fn right_click_sends_tank_to_pointer_and_it_arrives() {
    let mut world = one_tank_world();
    let mut schedule = build_schedule();

    let (start, _, _) = lead_tank(&mut world);
    let goal = start + Vec2::new(320.0, 0.0);

    *world.resource_mut::<PointerSnapshot>() = PointerSnapshot {
        position: goal,
        secondary_held: true,
        ..Default::default()
    };
    schedule.run(&mut world);
    let (_, target, mode) = lead_tank(&mut world);
    assert_eq!(target, Some(goal));
    assert_eq!(mode, SteeringMode::Arriving);

    *world.resource_mut::<PointerSnapshot>() = PointerSnapshot {
        position: goal,
        secondary_released: true,
        ..Default::default()
    };
    for _ in 0..600 {
        schedule.run(&mut world);
        if lead_tank(&mut world).1.is_none() {
            break;
        }
    }

    let (position, target, mode) = lead_tank(&mut world);
    assert_eq!(target, None);
    assert_eq!(mode, SteeringMode::Free);
    assert!(position.distance(goal) < 20.0, "stopped at {position}");
}

#[test]
fn rock_dropped_in_path_sends_tank_back_to_roaming() {
    let mut world = one_tank_world();
    let mut schedule = build_schedule();

    let (start, _, _) = lead_tank(&mut world);
    let goal = start + Vec2::new(320.0, 0.0);
    *world.resource_mut::<PointerSnapshot>() = PointerSnapshot {
        position: goal,
        secondary_held: true,
        ..Default::default()
    };
    schedule.run(&mut world);
    assert_eq!(lead_tank(&mut world).2, SteeringMode::Arriving);

    // Left click on a tile between tank and goal.
    let level = &world.resource::<Level>().0;
    let blocker = level.to_grid(start + Vec2::new(200.0, 0.0));
    let blocker_center = level.tile_center(blocker);
    *world.resource_mut::<PointerSnapshot>() = PointerSnapshot {
        position: blocker_center,
        primary_held: true,
        ..Default::default()
    };
    schedule.run(&mut world);

    assert!(world.resource::<Level>().0.is_obstacle(blocker));
    assert_eq!(lead_tank(&mut world).2, SteeringMode::Free);
}

#[test]
fn turrets_follow_hull_and_face_pointer() {
    let mut world = one_tank_world();
    let mut schedule = build_schedule();

    let (start, _, _) = lead_tank(&mut world);
    *world.resource_mut::<PointerSnapshot>() = PointerSnapshot {
        position: start + Vec2::new(0.0, -100.0),
        ..Default::default()
    };
    schedule.run(&mut world);

    let (hull, _, _) = lead_tank(&mut world);
    let mut turrets = world.query::<&TurretMount>();
    let mount = turrets.single(&world);
    assert_eq!(mount.turret.position, hull);
    assert!((mount.turret.rotation - std::f32::consts::FRAC_PI_2).abs() < 0.05);
}

#[test]
fn spawn_area_is_cleared_of_rocks() {
    let mut config = GameConfig::default();
    config.level.seed = Some(3);
    config.level.obstacle_fraction = 1.0;
    config.tank.count = 1;
    let mut world = build_world(&config);

    let (start, _, _) = lead_tank(&mut world);
    let level = &world.resource::<Level>().0;
    let cell = level.to_grid(start);
    for dy in -1..=1 {
        for dx in -1..=1 {
            assert!(!level.is_obstacle(cell + IVec2::new(dx, dy)));
        }
    }
    assert_eq!(level.obstacle_count(), (level.width() * level.height()) as usize - 9);
}
