// Tile grid for a toroidal, screen-sized level.
//
// Layer 1: TileGrid: per-tile passability with wrapped (toroidal) indexing.
// Layer 2: the spatial queries steering depends on: line of sight, obstacles
//          ahead of a mover, distance to an obstacle along a ray.
//
// Tiles are toggled from input between frames. Registered listeners are told
// synchronously after every change so agents can mark their route stale
// instead of re-querying the whole path each tick.

use glam::{IVec2, Vec2};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::geometry;
use super::input::{PointerButton, PointerSource};

// ============================================================================
// TILES
// ============================================================================

/// One grid cell. The only mutable obstacle state in the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// False when the tile holds a rock.
    pub passable: bool,
}

impl Default for Tile {
    fn default() -> Self {
        Self { passable: true }
    }
}

/// How an obstacle tile is approximated for ray queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObstacleShape {
    /// Circle inscribed in the tile (radius = half tile width). Cheap and
    /// rounds off corners, which gives smoother whisker steering.
    #[default]
    InscribedCircle,
    /// The full tile rectangle.
    TileBox,
}

/// Callback run after passability changes. Receives the grid read-only.
pub type ObstacleListener = Box<dyn FnMut(&TileGrid) + Send + Sync>;

/// Handle returned by `TileGrid::register`, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Convert a direction into a per-axis step of -1, 0 or 1.
/// Exact zero stays zero (unlike `f32::signum`).
pub fn step_toward(direction: Vec2) -> IVec2 {
    let axis = |v: f32| {
        if v > 0.0 {
            1
        } else if v < 0.0 {
            -1
        } else {
            0
        }
    };
    IVec2::new(axis(direction.x), axis(direction.y))
}

// ============================================================================
// TILE GRID
// ============================================================================

/// Rectangular, row-major array of tiles covering the screen.
///
/// Grid coordinates outside `[0, width) x [0, height)` are wrapped, never
/// rejected: the world is a torus.
pub struct TileGrid {
    tiles: Vec<Tile>,
    width: i32,
    height: i32,
    tile_size: Vec2,
    screen_size: Vec2,
    obstacle_shape: ObstacleShape,
    listeners: Vec<(SubscriptionId, ObstacleListener)>,
    next_subscription: u64,
    /// Set while the primary button is held after a toggle, so one click
    /// toggles one tile.
    button_latched: bool,
}

impl std::fmt::Debug for TileGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGrid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("tile_size", &self.tile_size)
            .field("obstacles", &self.obstacle_count())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TileGrid {
    /// Fully passable grid covering `screen`. The level is rounded up to whole
    /// tiles, so `screen_size()` may be slightly larger than `screen`.
    pub fn new(screen: Vec2, tile_size: Vec2) -> Self {
        let width = ((screen.x / tile_size.x).ceil() as i32).max(1);
        let height = ((screen.y / tile_size.y).ceil() as i32).max(1);
        let screen_size = Vec2::new(width as f32 * tile_size.x, height as f32 * tile_size.y);
        info!(
            "level grid {}x{} tiles of {}x{} px ({}x{} px)",
            width, height, tile_size.x, tile_size.y, screen_size.x, screen_size.y
        );
        Self {
            tiles: vec![Tile::default(); (width * height) as usize],
            width,
            height,
            tile_size,
            screen_size,
            obstacle_shape: ObstacleShape::default(),
            listeners: Vec::new(),
            next_subscription: 0,
            button_latched: false,
        }
    }

    pub fn with_obstacle_shape(mut self, shape: ObstacleShape) -> Self {
        self.obstacle_shape = shape;
        self
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tile_size(&self) -> Vec2 {
        self.tile_size
    }

    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    pub fn obstacle_shape(&self) -> ObstacleShape {
        self.obstacle_shape
    }

    /// Wrap a grid coordinate into range.
    #[inline]
    pub fn wrap(&self, cell: IVec2) -> IVec2 {
        IVec2::new(cell.x.rem_euclid(self.width), cell.y.rem_euclid(self.height))
    }

    #[inline]
    fn idx(&self, cell: IVec2) -> usize {
        let cell = self.wrap(cell);
        (cell.y * self.width + cell.x) as usize
    }

    pub fn tile(&self, cell: IVec2) -> &Tile {
        &self.tiles[self.idx(cell)]
    }

    /// Every tile with its (in-range) grid coordinate, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = (IVec2, &Tile)> + '_ {
        let width = self.width;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, tile)| (IVec2::new(i as i32 % width, i as i32 / width), tile))
    }

    pub fn obstacle_count(&self) -> usize {
        self.tiles.iter().filter(|t| !t.passable).count()
    }

    // ------------------------------------------------------------------------
    // Coordinate conversion
    // ------------------------------------------------------------------------

    /// Grid cell containing a pixel position (floor division, not wrapped).
    pub fn to_grid(&self, pixel: Vec2) -> IVec2 {
        (pixel / self.tile_size).floor().as_ivec2()
    }

    /// Pixel-space `(min, max)` box of a cell.
    pub fn to_pixel_corners(&self, cell: IVec2) -> (Vec2, Vec2) {
        let min = cell.as_vec2() * self.tile_size;
        (min, min + self.tile_size)
    }

    pub fn tile_center(&self, cell: IVec2) -> Vec2 {
        (cell.as_vec2() + Vec2::splat(0.5)) * self.tile_size
    }

    // ------------------------------------------------------------------------
    // Occupancy
    // ------------------------------------------------------------------------

    pub fn is_obstacle(&self, cell: IVec2) -> bool {
        !self.tile(cell).passable
    }

    /// Set a tile's obstacle state, notifying listeners if it changed.
    pub fn set_obstacle(&mut self, cell: IVec2, obstacle: bool) {
        let idx = self.idx(cell);
        if self.tiles[idx].passable == obstacle {
            self.tiles[idx].passable = !obstacle;
            self.notify_all();
        }
    }

    /// Flip a tile between passable and obstacle, then notify listeners once.
    pub fn toggle(&mut self, cell: IVec2) {
        let idx = self.idx(cell);
        let tile = &mut self.tiles[idx];
        tile.passable = !tile.passable;
        let wrapped = self.wrap(cell);
        debug!(
            "tile ({}, {}) is now {}",
            wrapped.x,
            wrapped.y,
            if self.tiles[idx].passable { "passable" } else { "an obstacle" }
        );
        self.notify_all();
    }

    /// Turn roughly `fraction` of all tiles into obstacles. Used to seed a
    /// procedural level at startup. Returns how many rocks were placed.
    /// A non-finite `fraction` places nothing.
    pub fn scatter_obstacles<R: Rng + ?Sized>(&mut self, rng: &mut R, fraction: f32) -> usize {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let p = f64::from(fraction);
        let mut placed = 0;
        for tile in &mut self.tiles {
            if tile.passable && rng.gen_bool(p) {
                tile.passable = false;
                placed += 1;
            }
        }
        if placed > 0 {
            info!("scattered {} obstacles", placed);
            self.notify_all();
        }
        placed
    }

    /// Toggle-on-click hook, called once per frame by the host.
    ///
    /// The tile under the pointer toggles on the first frame the primary
    /// button is held; further toggles wait for a release. Clicks outside the
    /// level are ignored. Returns the toggled cell, if any.
    pub fn update(&mut self, pointer: &impl PointerSource) -> Option<IVec2> {
        let mut toggled = None;
        if pointer.button_held(PointerButton::Primary) && !self.button_latched {
            self.button_latched = true;
            let pixel = pointer.pointer();
            if pixel.cmpge(Vec2::ZERO).all() && pixel.cmplt(self.screen_size).all() {
                let cell = self.to_grid(pixel);
                self.toggle(cell);
                toggled = Some(cell);
            }
        }
        if pointer.button_released(PointerButton::Primary) {
            self.button_latched = false;
        }
        toggled
    }

    // ------------------------------------------------------------------------
    // Geometry queries
    // ------------------------------------------------------------------------

    /// The edge (or corner) of `cell` a mover heading `dir` crosses first.
    ///
    /// Returned as a degenerate `(min, max)` box: a vertical or horizontal
    /// line for axis-aligned directions, a single point for diagonals, and
    /// the whole tile for a zero direction.
    pub fn tile_edge_toward(&self, cell: IVec2, dir: IVec2) -> (Vec2, Vec2) {
        let (min, max) = self.to_pixel_corners(cell);
        let x = if dir.x < 0 { min.x } else { max.x };
        let y = if dir.y < 0 { min.y } else { max.y };
        match (dir.x, dir.y) {
            (0, 0) => (min, max),
            (0, _) => (Vec2::new(min.x, y), Vec2::new(max.x, y)),
            (_, 0) => (Vec2::new(x, min.y), Vec2::new(x, max.y)),
            _ => (Vec2::new(x, y), Vec2::new(x, y)),
        }
    }

    /// True if no tile between `from` and `to` is an obstacle.
    ///
    /// The tiles containing `from` and `to` are skipped when the matching
    /// `ignore_*` flag is set. Same or neighbouring tiles only check the two
    /// endpoints; otherwise the walk steps tile by tile along the segment,
    /// advancing on whichever border (x first on ties) the segment crosses.
    pub fn line_of_sight(&self, from: Vec2, to: Vec2, ignore_from_tile: bool, ignore_to_tile: bool) -> bool {
        let start = self.to_grid(from);
        let end = self.to_grid(to);

        let blocked = |cell: IVec2| {
            self.is_obstacle(cell)
                && !(ignore_from_tile && cell == start)
                && !(ignore_to_tile && cell == end)
        };

        let delta = end - start;
        if delta.x.abs() <= 1 && delta.y.abs() <= 1 {
            return !blocked(start) && !blocked(end);
        }

        let step = IVec2::new(delta.x.signum(), delta.y.signum());
        let lo = start.min(end);
        let hi = start.max(end);

        let mut cell = start;
        while cell.cmpge(lo).all() && cell.cmple(hi).all() {
            if blocked(cell) {
                return false;
            }
            if cell == end {
                break;
            }

            let crosses = |dir: IVec2| {
                let (min, max) = self.tile_edge_toward(cell, dir);
                geometry::segment_intersects_box(from, to, min, max)
            };
            let cross_x = step.x != 0 && crosses(IVec2::new(step.x, 0));
            let cross_y = step.y != 0 && crosses(IVec2::new(0, step.y));

            match (cross_x, cross_y) {
                (true, true) => cell += step,
                (true, false) => cell.x += step.x,
                (false, true) => cell.y += step.y,
                // Float slop: the segment slipped past both borders at the
                // corner. Step diagonally to keep making progress.
                (false, false) => cell += step,
            }
        }
        // A segment ending exactly on a corner can step past the end tile.
        !blocked(end)
    }

    /// Obstacle tiles among the neighbours ahead of a mover in `cell`
    /// heading `dir` (per-axis -1/0/1), plus `cell` itself if asked.
    ///
    /// Axis-aligned travel looks at the two side tiles and the three tiles in
    /// front; diagonal travel looks at the five tiles wrapping the leading
    /// corner. Coordinates are returned unwrapped so their pixel geometry
    /// stays next to the mover near the level edge.
    pub fn gather_obstacles_ahead(&self, cell: IVec2, dir: IVec2, include_current: bool) -> Vec<IVec2> {
        let (dx, dy) = (dir.x, dir.y);
        let offsets: Vec<IVec2> = match (dx, dy) {
            (0, 0) => vec![
                IVec2::new(-1, -1), IVec2::new(0, -1), IVec2::new(1, -1),
                IVec2::new(-1, 0),                     IVec2::new(1, 0),
                IVec2::new(-1, 1),  IVec2::new(0, 1),  IVec2::new(1, 1),
            ],
            (0, _) => vec![
                IVec2::new(-1, 0),
                IVec2::new(-1, dy),
                IVec2::new(0, dy),
                IVec2::new(1, dy),
                IVec2::new(1, 0),
            ],
            (_, 0) => vec![
                IVec2::new(0, -1),
                IVec2::new(dx, -1),
                IVec2::new(dx, 0),
                IVec2::new(dx, 1),
                IVec2::new(0, 1),
            ],
            _ => vec![
                IVec2::new(-dx, dy),
                IVec2::new(0, dy),
                IVec2::new(dx, dy),
                IVec2::new(dx, 0),
                IVec2::new(dx, -dy),
            ],
        };

        let mut found = Vec::with_capacity(offsets.len() + 1);
        if include_current && self.is_obstacle(cell) {
            found.push(cell);
        }
        found.extend(
            offsets
                .into_iter()
                .map(|offset| cell + offset)
                .filter(|&c| self.is_obstacle(c)),
        );
        found
    }

    /// Distance from `origin` along unit `direction` to the obstacle shape of
    /// `cell`, or `None` if the ray misses. An origin already inside the
    /// shape reports 0.
    ///
    /// For the inscribed circle on non-square tiles, y is scaled by the tile
    /// aspect ratio so the tile becomes square, the circle test runs there,
    /// and the distance is mapped back to pixel space.
    pub fn nearest_obstacle_along_ray(&self, cell: IVec2, origin: Vec2, direction: Vec2) -> Option<f32> {
        match self.obstacle_shape {
            ObstacleShape::InscribedCircle => {
                let aspect = self.tile_size.x / self.tile_size.y;
                let scale = Vec2::new(1.0, aspect);
                let origin_s = origin * scale;
                let dir_s = direction * scale;
                let len = dir_s.length();
                if len <= f32::EPSILON {
                    return None;
                }

                let center = (cell.as_vec2() + Vec2::splat(0.5)) * self.tile_size.x;
                let radius = 0.5 * self.tile_size.x;
                if origin_s.distance_squared(center) <= radius * radius {
                    return Some(0.0);
                }
                geometry::ray_distance_to_circle(origin_s, dir_s / len, center, radius).map(|t| t / len)
            }
            ObstacleShape::TileBox => {
                let (min, max) = self.to_pixel_corners(cell);
                geometry::ray_distance_to_box(origin, direction, min, max)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Register a callback run after every passability change.
    pub fn register(&mut self, listener: ObstacleListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn deregister(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Run every listener once, in registration order.
    pub fn notify_all(&mut self) {
        // Detach the list so listeners can read the grid while we iterate.
        let mut listeners = std::mem::take(&mut self.listeners);
        for (_, listener) in listeners.iter_mut() {
            listener(self);
        }
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn grid_10x10() -> TileGrid {
        TileGrid::new(Vec2::new(320.0, 320.0), Vec2::new(32.0, 32.0))
    }

    #[derive(Default)]
    struct FakePointer {
        at: Vec2,
        held: bool,
        released: bool,
    }

    impl PointerSource for FakePointer {
        fn pointer(&self) -> Vec2 {
            self.at
        }
        fn button_held(&self, button: PointerButton) -> bool {
            button == PointerButton::Primary && self.held
        }
        fn button_released(&self, button: PointerButton) -> bool {
            button == PointerButton::Primary && self.released
        }
    }

    #[test]
    fn level_rounds_up_to_whole_tiles() {
        let grid = TileGrid::new(Vec2::new(1280.0, 720.0), Vec2::new(32.0, 32.0));
        assert_eq!(grid.width(), 40);
        assert_eq!(grid.height(), 23);
        assert_eq!(grid.screen_size(), Vec2::new(1280.0, 736.0));
    }

    #[test]
    fn pixel_corners_round_trip() {
        let grid = grid_10x10();
        for gy in -3..13 {
            for gx in -3..13 {
                let cell = IVec2::new(gx, gy);
                let (min, max) = grid.to_pixel_corners(cell);
                assert_eq!(grid.to_grid(min), cell);
                assert_eq!(max - min, grid.tile_size());
            }
        }
    }

    #[test]
    fn obstacle_lookup_wraps() {
        let mut grid = grid_10x10();
        grid.set_obstacle(IVec2::new(3, 7), true);
        for gy in -10..20 {
            for gx in -10..20 {
                let cell = IVec2::new(gx, gy);
                assert_eq!(grid.is_obstacle(cell), grid.is_obstacle(cell + IVec2::new(10, 0)));
                assert_eq!(grid.is_obstacle(cell), grid.is_obstacle(cell - IVec2::new(0, 10)));
            }
        }
        assert!(grid.is_obstacle(IVec2::new(-7, 17)));
    }

    #[test]
    fn edge_toward_axis_and_corner() {
        let grid = grid_10x10();
        let cell = IVec2::new(1, 1);
        assert_eq!(
            grid.tile_edge_toward(cell, IVec2::new(1, 0)),
            (Vec2::new(64.0, 32.0), Vec2::new(64.0, 64.0))
        );
        assert_eq!(
            grid.tile_edge_toward(cell, IVec2::new(0, -1)),
            (Vec2::new(32.0, 32.0), Vec2::new(64.0, 32.0))
        );
        assert_eq!(
            grid.tile_edge_toward(cell, IVec2::new(-1, 1)),
            (Vec2::new(32.0, 64.0), Vec2::new(32.0, 64.0))
        );
        assert_eq!(grid.tile_edge_toward(cell, IVec2::ZERO), grid.to_pixel_corners(cell));
    }

    #[test]
    fn line_of_sight_blocked_by_obstacle_on_row() {
        let mut grid = grid_10x10();
        grid.set_obstacle(IVec2::new(5, 5), true);
        assert!(!grid.line_of_sight(Vec2::new(0.0, 160.0), Vec2::new(320.0, 160.0), false, false));
        assert!(grid.line_of_sight(Vec2::new(0.0, 160.0), Vec2::new(320.0, 0.0), false, false));
    }

    #[test]
    fn line_of_sight_neighbours_only_check_endpoints() {
        let mut grid = grid_10x10();
        // Diagonal neighbours with both side tiles blocked still see each other.
        grid.set_obstacle(IVec2::new(4, 3), true);
        grid.set_obstacle(IVec2::new(3, 4), true);
        assert!(grid.line_of_sight(Vec2::new(100.0, 100.0), Vec2::new(140.0, 140.0), false, false));

        grid.set_obstacle(IVec2::new(4, 4), true);
        assert!(!grid.line_of_sight(Vec2::new(100.0, 100.0), Vec2::new(140.0, 140.0), false, false));
        assert!(grid.line_of_sight(Vec2::new(100.0, 100.0), Vec2::new(140.0, 140.0), false, true));
    }

    #[test]
    fn line_of_sight_ignores_start_tile_when_asked() {
        let mut grid = grid_10x10();
        grid.set_obstacle(IVec2::new(0, 0), true);
        let from = Vec2::new(16.0, 16.0);
        let to = Vec2::new(16.0, 300.0);
        assert!(!grid.line_of_sight(from, to, false, false));
        assert!(grid.line_of_sight(from, to, true, false));
    }

    #[test]
    fn line_of_sight_along_tile_border() {
        let mut grid = grid_10x10();
        // Segment runs exactly on x = 64, the border between columns 1 and 2.
        grid.set_obstacle(IVec2::new(2, 6), true);
        assert!(!grid.line_of_sight(Vec2::new(64.0, 10.0), Vec2::new(64.0, 300.0), false, false));
    }

    #[test]
    fn diagonal_through_tile_corners_steps_both_axes() {
        let mut grid = grid_10x10();
        // The line passes exactly through the shared corners, so the side
        // tiles are never entered.
        grid.set_obstacle(IVec2::new(2, 1), true);
        grid.set_obstacle(IVec2::new(1, 2), true);
        let from = Vec2::new(16.0, 16.0);
        let to = Vec2::new(176.0, 176.0);
        assert!(grid.line_of_sight(from, to, false, false));
        assert!(grid.line_of_sight(to, from, false, false));

        grid.set_obstacle(IVec2::new(3, 3), true);
        assert!(!grid.line_of_sight(from, to, false, false));
    }

    #[test]
    fn scatter_ignores_non_finite_fraction() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut grid = grid_10x10();
        assert_eq!(grid.scatter_obstacles(&mut rng, f32::NAN), 0);
        assert_eq!(grid.scatter_obstacles(&mut rng, f32::INFINITY), 0);
        assert_eq!(grid.obstacle_count(), 0);
        assert_eq!(grid.scatter_obstacles(&mut rng, 2.0), 100);
    }

    #[test]
    fn gather_ahead_axis_and_diagonal() {
        let mut grid = grid_10x10();
        for c in [IVec2::new(6, 4), IVec2::new(6, 5), IVec2::new(4, 5), IVec2::new(5, 5)] {
            grid.set_obstacle(c, true);
        }
        let cell = IVec2::new(5, 5);

        let ahead = grid.gather_obstacles_ahead(cell, IVec2::new(1, 0), false);
        assert_eq!(ahead, vec![IVec2::new(6, 4), IVec2::new(6, 5)]);

        let with_current = grid.gather_obstacles_ahead(cell, IVec2::new(1, 0), true);
        assert_eq!(with_current[0], cell);

        // Heading up-right: (4,4),(5,4),(6,4),(6,5),(6,6) are examined.
        let diagonal = grid.gather_obstacles_ahead(cell, IVec2::new(1, -1), false);
        assert_eq!(diagonal, vec![IVec2::new(6, 4), IVec2::new(6, 5)]);

        // (4,5) is behind when moving right.
        assert!(!ahead.contains(&IVec2::new(4, 5)));
    }

    #[test]
    fn gather_ahead_returns_unwrapped_neighbours() {
        let mut grid = grid_10x10();
        grid.set_obstacle(IVec2::new(9, 0), true);
        let ahead = grid.gather_obstacles_ahead(IVec2::new(0, 0), IVec2::new(-1, 0), false);
        assert_eq!(ahead, vec![IVec2::new(-1, 0)]);
    }

    #[test]
    fn ray_distance_to_inscribed_circle() {
        let grid = grid_10x10();
        // Tile (5,5) centre is (176,176), radius 16.
        let d = grid.nearest_obstacle_along_ray(IVec2::new(5, 5), Vec2::new(100.0, 176.0), Vec2::X);
        assert_eq!(d, Some(60.0));
        let miss = grid.nearest_obstacle_along_ray(IVec2::new(5, 5), Vec2::new(100.0, 100.0), Vec2::X);
        assert_eq!(miss, None);
        let inside = grid.nearest_obstacle_along_ray(IVec2::new(5, 5), Vec2::new(176.0, 176.0), Vec2::X);
        assert_eq!(inside, Some(0.0));
    }

    #[test]
    fn ray_distance_corrects_for_tall_tiles() {
        // 32 wide, 64 tall: the "circle" is an ellipse 32 x 64 in pixels.
        let grid = TileGrid::new(Vec2::new(320.0, 640.0), Vec2::new(32.0, 64.0));
        let cell = IVec2::new(0, 2);
        // Centre (16, 160), vertical semi-axis 32.
        let d = grid
            .nearest_obstacle_along_ray(cell, Vec2::new(16.0, 20.0), Vec2::Y)
            .expect("ray straight down hits");
        assert!((d - 108.0).abs() < 1e-3, "got {d}");
        let d = grid
            .nearest_obstacle_along_ray(cell, Vec2::new(-50.0, 160.0), Vec2::X)
            .expect("ray straight across hits");
        assert!((d - 50.0).abs() < 1e-3, "got {d}");
    }

    #[test]
    fn ray_distance_to_tile_box() {
        let grid = grid_10x10().with_obstacle_shape(ObstacleShape::TileBox);
        let d = grid.nearest_obstacle_along_ray(IVec2::new(5, 5), Vec2::new(100.0, 170.0), Vec2::X);
        assert_eq!(d, Some(60.0));
        // Corner region the circle would round off.
        let d = grid.nearest_obstacle_along_ray(IVec2::new(5, 5), Vec2::new(100.0, 161.0), Vec2::X);
        assert_eq!(d, Some(60.0));
    }

    #[test]
    fn listeners_fire_once_per_toggle_and_deregister() {
        let mut grid = grid_10x10();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let id = grid.register(Box::new(move |_grid: &TileGrid| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        grid.toggle(IVec2::new(2, 2));
        grid.toggle(IVec2::new(2, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(grid.deregister(id));
        assert!(!grid.deregister(id));
        grid.toggle(IVec2::new(2, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_sees_updated_grid() {
        let mut grid = grid_10x10();
        let seen = Arc::new(AtomicUsize::new(0));
        let out = seen.clone();
        grid.register(Box::new(move |grid: &TileGrid| {
            out.store(grid.obstacle_count(), Ordering::SeqCst);
        }));
        grid.set_obstacle(IVec2::new(1, 1), true);
        grid.set_obstacle(IVec2::new(1, 2), true);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        // Setting the same state again is not a change.
        grid.set_obstacle(IVec2::new(1, 2), true);
        assert_eq!(grid.listener_count(), 1);
    }

    #[test]
    fn click_toggles_once_until_release() {
        let mut grid = grid_10x10();
        let mut pointer = FakePointer { at: Vec2::new(40.0, 70.0), held: true, ..Default::default() };

        assert_eq!(grid.update(&pointer), Some(IVec2::new(1, 2)));
        assert!(grid.is_obstacle(IVec2::new(1, 2)));
        // Still held: no second toggle.
        assert_eq!(grid.update(&pointer), None);

        pointer.held = false;
        pointer.released = true;
        assert_eq!(grid.update(&pointer), None);

        pointer.held = true;
        pointer.released = false;
        assert_eq!(grid.update(&pointer), Some(IVec2::new(1, 2)));
        assert!(!grid.is_obstacle(IVec2::new(1, 2)));
    }

    #[test]
    fn click_outside_level_is_ignored() {
        let mut grid = grid_10x10();
        let pointer = FakePointer { at: Vec2::new(-5.0, 70.0), held: true, ..Default::default() };
        assert_eq!(grid.update(&pointer), None);
        assert_eq!(grid.obstacle_count(), 0);
    }

    #[test]
    fn scatter_respects_fraction_bounds() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut grid = grid_10x10();
        assert_eq!(grid.scatter_obstacles(&mut rng, 0.0), 0);
        assert_eq!(grid.scatter_obstacles(&mut rng, 1.0), 100);
        assert_eq!(grid.obstacle_count(), 100);
    }
}
