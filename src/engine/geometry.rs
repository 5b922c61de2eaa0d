// Pure 2D intersection and raycast helpers used by the tile grid.
//
// Everything here is stateless. Degenerate inputs (zero-length directions,
// zero radii) are the caller's responsibility: steering checks for zero
// velocity before it derives any unit vector that ends up in these functions.

use glam::Vec2;

// ============================================================================
// SEGMENTS
// ============================================================================

/// Twice the signed area of the triangle (a, b, c).
#[inline]
fn orient(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

/// True if `p` lies inside the bounding box of segment a–b.
/// Only meaningful once `p` is known to be collinear with a–b.
#[inline]
fn on_segment(a: Vec2, b: Vec2, p: Vec2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Orientation-based segment/segment test. Endpoints are closed: touching
/// counts as intersecting, and collinear overlap counts too.
///
/// Zero-length segments are fine here, which matters for the corner
/// "borders" produced by `TileGrid::tile_edge_toward` on diagonal moves.
pub fn segments_intersect(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> bool {
    let d1 = orient(p3, p4, p1);
    let d2 = orient(p3, p4, p2);
    let d3 = orient(p1, p2, p3);
    let d4 = orient(p1, p2, p4);

    let straddles_34 = (d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0);
    let straddles_12 = (d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0);
    if straddles_34 && straddles_12 {
        return true;
    }

    (d1 == 0.0 && on_segment(p3, p4, p1))
        || (d2 == 0.0 && on_segment(p3, p4, p2))
        || (d3 == 0.0 && on_segment(p1, p2, p3))
        || (d4 == 0.0 && on_segment(p1, p2, p4))
}

/// Closed containment test for an axis-aligned box.
#[inline]
pub fn point_in_box(p: Vec2, box_min: Vec2, box_max: Vec2) -> bool {
    p.x >= box_min.x && p.x <= box_max.x && p.y >= box_min.y && p.y <= box_max.y
}

/// True if segment p1–p2 crosses any edge of the box or lies inside it.
/// A box with zero width or height degenerates into a line (or a point)
/// and still works.
pub fn segment_intersects_box(p1: Vec2, p2: Vec2, box_min: Vec2, box_max: Vec2) -> bool {
    if point_in_box(p1, box_min, box_max) || point_in_box(p2, box_min, box_max) {
        return true;
    }
    let a = box_min;
    let b = Vec2::new(box_max.x, box_min.y);
    let c = box_max;
    let d = Vec2::new(box_min.x, box_max.y);
    segments_intersect(p1, p2, a, b)
        || segments_intersect(p1, p2, b, c)
        || segments_intersect(p1, p2, c, d)
        || segments_intersect(p1, p2, d, a)
}

// ============================================================================
// RAYS
// ============================================================================

/// Smallest `t >= 0` with `origin + t * direction` on the circle, or `None`
/// if the forward ray misses. `direction` must already be unit length.
///
/// A ray starting inside the circle reports the exit distance.
pub fn ray_distance_to_circle(origin: Vec2, direction: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let m = origin - center;
    let b = m.dot(direction);
    let c = m.length_squared() - radius * radius;

    // Outside and pointing away.
    if c > 0.0 && b > 0.0 {
        return None;
    }

    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }

    let sq = disc.sqrt();
    let near = -b - sq;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + sq;
    if far >= 0.0 { Some(far) } else { None }
}

/// Slab-test distance from `origin` along unit `direction` to the box.
/// Returns `Some(0.0)` when the origin is already inside.
pub fn ray_distance_to_box(origin: Vec2, direction: Vec2, box_min: Vec2, box_max: Vec2) -> Option<f32> {
    let mut t_min = 0.0_f32;
    let mut t_max = f32::INFINITY;

    for axis in 0..2 {
        let o = origin[axis];
        let d = direction[axis];
        let (lo, hi) = (box_min[axis], box_max[axis]);

        if d.abs() <= f32::EPSILON {
            // Parallel to this slab: must already be between its planes.
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t0 = (lo - o) * inv;
        let mut t1 = (hi - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    Some(t_min)
}
