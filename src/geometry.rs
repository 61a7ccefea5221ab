//! Spatial helpers shared by the phantom families.
//!
//! Everything here is a pure function over positions supplied by the caller
//! (plus read-only [`WorldView`] queries), so active phantoms may call these
//! concurrently without synchronization.

use std::ops::{Add, Mul, Sub};

use rand::Rng;
use serde::Serialize;

use crate::world::{Location, WorldId, WorldView};

/// Squared length below which a direction is treated as degenerate.
const DEGENERATE_LENGTH_SQ: f64 = 0.01;

/// Distance below which two points are trivially mutually visible.
const LINE_OF_SIGHT_EPSILON: f64 = 0.01;

// ============================================================================
// Vectors
// ============================================================================

/// A point or direction in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec3 {
    /// East-west axis.
    pub x: f64,
    /// Vertical axis.
    pub y: f64,
    /// North-south axis.
    pub z: f64,
}

impl Vec3 {
    /// The zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a vector.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.z.mul_add(other.z, self.x.mul_add(other.x, self.y * other.y))
    }

    /// Squared euclidean length.
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns the unit vector, or `None` for a zero-length vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len <= f64::EPSILON {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    /// Squared distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        (self - other).length_squared()
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Returns `self` with `dy` added to the vertical axis.
    #[must_use]
    pub const fn raised(self, dy: f64) -> Self {
        Self::new(self.x, self.y + dy, self.z)
    }

    /// Horizontal (x/z) component with `y` zeroed.
    #[must_use]
    pub const fn horizontal(self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }

    /// The block containing this point.
    #[must_use]
    pub fn block(self) -> BlockPos {
        #[allow(clippy::cast_possible_truncation)]
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockPos {
    /// East-west axis.
    pub x: i32,
    /// Vertical axis.
    pub y: i32,
    /// North-south axis.
    pub z: i32,
}

impl BlockPos {
    /// Creates a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Center of the block's bottom face.
    #[must_use]
    pub fn bottom_center(self) -> Vec3 {
        Vec3::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y),
            f64::from(self.z) + 0.5,
        )
    }

    /// Returns the position offset by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Facing of a rendered figure, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Orientation {
    /// Horizontal rotation.
    pub yaw: f32,
    /// Vertical rotation; positive looks down.
    pub pitch: f32,
}

// ============================================================================
// View geometry
// ============================================================================

/// Angle in degrees between `look` and the direction from `observer` to `target`.
///
/// Returns `None` when either direction is degenerate (target on top of the
/// observer, or a zero look vector).
#[must_use]
pub fn view_angle_degrees(observer: Vec3, look: Vec3, target: Vec3) -> Option<f64> {
    let to_target = target - observer;
    if to_target.length_squared() <= DEGENERATE_LENGTH_SQ {
        return None;
    }
    let look = look.normalized()?;
    let to_target = to_target.normalized()?;
    Some(look.dot(to_target).clamp(-1.0, 1.0).acos().to_degrees())
}

/// Whether `target` lies within `threshold_degrees` of the observer's look direction.
///
/// Degenerate geometry never counts as "seen".
#[must_use]
pub fn view_angle_within(observer: Vec3, look: Vec3, target: Vec3, threshold_degrees: f64) -> bool {
    view_angle_degrees(observer, look, target).is_some_and(|angle| angle <= threshold_degrees)
}

/// Orientation that makes a figure at `from` face `to`.
#[must_use]
pub fn orientation_towards(from: Vec3, to: Vec3) -> Orientation {
    let d = to - from;
    let yaw = d.z.atan2(d.x).to_degrees() - 90.0;
    let pitch = -d.y.atan2(d.x.hypot(d.z)).to_degrees();
    #[allow(clippy::cast_possible_truncation)]
    Orientation {
        yaw: yaw as f32,
        pitch: pitch as f32,
    }
}

/// Unit look vector for a yaw/pitch pair.
#[must_use]
pub fn look_vector(orientation: Orientation) -> Vec3 {
    let yaw = f64::from(orientation.yaw).to_radians();
    let pitch = f64::from(orientation.pitch).to_radians();
    let xz = pitch.cos();
    Vec3::new(-xz * yaw.sin(), -pitch.sin(), xz * yaw.cos())
}

/// Random horizontal offset whose length lies in `[min, max)`.
pub fn ring_offset<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> Vec3 {
    let angle = rng.random_range(0.0..std::f64::consts::TAU);
    let distance = if max > min {
        rng.random_range(min..max)
    } else {
        min
    };
    Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance)
}

// ============================================================================
// World queries
// ============================================================================

/// Finds the standing height below `origin`.
///
/// Scans downward from `origin`'s block to the world floor and returns the
/// level just above the first non-passable block, or `None` when the column
/// is empty.
#[must_use]
pub fn find_ground_level(world: &dyn WorldView, world_id: &WorldId, origin: Vec3) -> Option<i32> {
    let start = origin.block();
    let floor = world.min_height(world_id);
    (floor..=start.y)
        .rev()
        .find(|&y| !world.is_passable(world_id, BlockPos::new(start.x, y, start.z)))
        .map(|y| y + 1)
}

/// Occlusion test along the straight segment between two locations.
///
/// Missing endpoints or endpoints in different worlds are never visible to
/// each other. Coincident points always are.
#[must_use]
pub fn has_line_of_sight(world: &dyn WorldView, a: Option<&Location>, b: Option<&Location>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };
    if a.world != b.world {
        return false;
    }
    if a.position.distance(b.position) <= LINE_OF_SIGHT_EPSILON {
        return true;
    }
    !world.is_occluded(&a.world, a.position, b.position)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::memory::InMemoryWorld;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const EPS: f64 = 1e-6;

    #[test]
    fn target_ahead_is_within_threshold() {
        assert!(view_angle_within(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 10.0),
            70.0
        ));
    }

    #[test]
    fn target_behind_is_outside_threshold() {
        assert!(!view_angle_within(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -10.0),
            70.0
        ));
    }

    #[test]
    fn threshold_is_inclusive() {
        let angle =
            view_angle_degrees(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 5.0))
                .unwrap();
        assert!((angle - 90.0).abs() < EPS);
        assert!(view_angle_within(
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
            90.0
        ));
    }

    #[test]
    fn degenerate_target_is_never_seen() {
        assert!(!view_angle_within(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 0.05),
            180.0
        ));
        assert!(!view_angle_within(
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 5.0),
            180.0
        ));
    }

    #[test]
    fn orientation_towards_matches_look_vector() {
        let from = Vec3::new(1.0, 64.0, 1.0);
        let to = Vec3::new(-4.0, 66.0, 9.0);
        let facing = orientation_towards(from, to);
        let look = look_vector(facing);
        let expected = (to - from).normalized().unwrap();
        assert!((look.dot(expected) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn ring_offset_respects_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let off = ring_offset(&mut rng, 60.0, 100.0);
            let len = off.length();
            assert!((60.0..100.0 + EPS).contains(&len), "len {len}");
            assert!(off.y.abs() < EPS);
        }
    }

    #[test]
    fn ground_level_is_one_above_first_solid_block() {
        let world = InMemoryWorld::new();
        let id = WorldId::overworld();
        world.set_ground_level(&id, 64);
        assert_eq!(
            find_ground_level(&world, &id, Vec3::new(0.5, 80.0, 0.5)),
            Some(64)
        );
        world.set_block(&id, BlockPos::new(0, 70, 0), "stone");
        assert_eq!(
            find_ground_level(&world, &id, Vec3::new(0.5, 80.0, 0.5)),
            Some(71)
        );
    }

    #[test]
    fn ground_level_none_over_void() {
        let world = InMemoryWorld::new();
        let id = WorldId::new("void");
        assert_eq!(find_ground_level(&world, &id, Vec3::new(0.0, 10.0, 0.0)), None);
    }

    #[test]
    fn line_of_sight_rules() {
        let world = InMemoryWorld::new();
        let id = WorldId::overworld();
        world.set_ground_level(&id, 64);
        let a = Location::new(id.clone(), Vec3::new(0.5, 66.0, 0.5));
        let b = Location::new(id.clone(), Vec3::new(10.5, 66.0, 0.5));
        assert!(has_line_of_sight(&world, Some(&a), Some(&b)));
        assert!(!has_line_of_sight(&world, None, Some(&b)));

        let elsewhere = Location::new(WorldId::new("nether"), b.position);
        assert!(!has_line_of_sight(&world, Some(&a), Some(&elsewhere)));
        assert!(has_line_of_sight(&world, Some(&a), Some(&a)));

        world.set_block(&id, BlockPos::new(5, 66, 0), "stone");
        assert!(!has_line_of_sight(&world, Some(&a), Some(&b)));
    }

    proptest! {
        #[test]
        fn view_angle_is_bounded(
            lx in -1.0f64..1.0, ly in -1.0f64..1.0, lz in -1.0f64..1.0,
            tx in -50.0f64..50.0, ty in -50.0f64..50.0, tz in -50.0f64..50.0,
        ) {
            if let Some(angle) = view_angle_degrees(Vec3::ZERO, Vec3::new(lx, ly, lz), Vec3::new(tx, ty, tz)) {
                prop_assert!((0.0..=180.0).contains(&angle));
            }
        }

        #[test]
        fn full_threshold_accepts_every_valid_target(
            tx in 1.0f64..50.0, ty in -50.0f64..50.0, tz in -50.0f64..50.0,
        ) {
            prop_assert!(view_angle_within(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0), Vec3::new(tx, ty, tz), 180.0));
        }
    }
}
