// ECS systems for the tank demo
// One chained schedule per frame: toggle tiles -> command tanks -> steer -> aim.
// The host writes FrameTime and PointerSnapshot before running it.

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec2};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::agent::{Agent, PositionProvider, Turret};
use super::components::*;
use super::config::GameConfig;
use super::input::{PointerButton, PointerSource};
use super::navigation::TileGrid;

const TANK_TINTS: [Tint; 4] = [
    Tint::new(0.35, 0.55, 0.25),
    Tint::new(0.65, 0.55, 0.30),
    Tint::new(0.30, 0.45, 0.65),
    Tint::new(0.60, 0.30, 0.30),
];

/// Primary click toggles the tile under the pointer.
pub fn toggle_tiles_system(mut level: ResMut<Level>, pointer: Res<PointerSnapshot>) {
    level.0.update(&*pointer);
}

/// While the secondary button is held, every tank heads for the pointer.
pub fn command_tanks_system(
    level: Res<Level>,
    pointer: Res<PointerSnapshot>,
    mut tanks: Query<&mut TankBody>,
) {
    if !pointer.button_held(PointerButton::Secondary) {
        return;
    }
    for mut tank in tanks.iter_mut() {
        tank.agent.set_target(pointer.pointer(), &level.0);
    }
}

/// Run one steering tick per tank.
pub fn steer_tanks_system(
    level: Res<Level>,
    settings: Res<Settings>,
    time: Res<FrameTime>,
    mut rng: ResMut<SimRng>,
    mut tanks: Query<&mut TankBody>,
) {
    if time.dt <= 0.0 {
        return;
    }
    for mut tank in tanks.iter_mut() {
        tank.agent.tick(time.dt, &level.0, &settings.0, &mut rng.0);
    }
}

/// Turrets follow their hull and look at the pointer.
pub fn aim_turrets_system(
    pointer: Res<PointerSnapshot>,
    tanks: Query<&TankBody>,
    mut turrets: Query<&mut TurretMount>,
) {
    for mut mount in turrets.iter_mut() {
        if let Ok(body) = tanks.get(mount.owner) {
            mount.turret.update(&body.agent, pointer.pointer());
        }
    }
}

pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            toggle_tiles_system,
            command_tanks_system,
            steer_tanks_system,
            aim_turrets_system,
        )
            .chain(),
    );
    schedule
}

// ============================================================================
// WORLD SETUP
// ============================================================================

/// Level, resources and tanks for `config`.
///
/// Rocks are scattered first, then each tank's 3x3 neighbourhood is cleared
/// so nothing spawns inside an obstacle. Tanks are subscribed to the grid
/// afterwards, so setup itself raises no route-stale flags.
pub fn build_world(config: &GameConfig) -> World {
    let mut rng = match config.level.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let level_cfg = &config.level;
    let mut grid = TileGrid::new(
        Vec2::new(level_cfg.screen_width, level_cfg.screen_height),
        Vec2::new(level_cfg.tile_width, level_cfg.tile_height),
    )
    .with_obstacle_shape(level_cfg.obstacle_shape);
    grid.scatter_obstacles(&mut rng, level_cfg.obstacle_fraction);

    let world_center = grid.screen_size() * 0.5;
    let tank_size = Vec2::new(config.tank.width, config.tank.length);

    let spawn_cells: Vec<IVec2> = (0..config.tank.count)
        .map(|i| {
            let cell = if i == 0 {
                grid.to_grid(world_center)
            } else {
                IVec2::new(rng.gen_range(0..grid.width()), rng.gen_range(0..grid.height()))
            };
            for dy in -1..=1 {
                for dx in -1..=1 {
                    grid.set_obstacle(cell + IVec2::new(dx, dy), false);
                }
            }
            cell
        })
        .collect();

    let mut agents: Vec<Agent> = spawn_cells
        .iter()
        .map(|&cell| Agent::new(grid.tile_center(cell), tank_size, world_center))
        .collect();
    for agent in &mut agents {
        agent.subscribe(&mut grid);
    }

    let mut world = World::new();
    for (i, agent) in agents.into_iter().enumerate() {
        let tint = TANK_TINTS[i % TANK_TINTS.len()];
        let turret = Turret::mounted_on(&agent);
        info!(
            "spawned tank {} at ({:.0}, {:.0})",
            i,
            agent.position().x,
            agent.position().y
        );
        let owner = world.spawn((TankBody { agent }, tint)).id();
        world.spawn((TurretMount { owner, turret }, tint.darker(0.6)));
    }

    world.insert_resource(Level(grid));
    world.insert_resource(SimRng(rng));
    world.insert_resource(FrameTime::default());
    world.insert_resource(Settings(config.steering.clone()));
    world.insert_resource(PointerSnapshot::default());
    world
}

/// Remove a tank, its turrets, and its grid listener. Returns false if
/// `tank` is not a live tank.
pub fn despawn_tank(world: &mut World, tank: Entity) -> bool {
    let found = world.resource_scope(|world, mut level: Mut<Level>| match world.get_mut::<TankBody>(tank) {
        Some(mut body) => {
            body.agent.unsubscribe(&mut level.0);
            true
        }
        None => false,
    });
    if !found {
        return false;
    }

    let turrets: Vec<Entity> = world
        .query::<(Entity, &TurretMount)>()
        .iter(world)
        .filter(|(_, mount)| mount.owner == tank)
        .map(|(entity, _)| entity)
        .collect();
    for turret in turrets {
        world.despawn(turret);
    }
    info!("despawned tank {:?}", tank);
    world.despawn(tank)
}
