//! Block raycasting using the DDA (Amanatides & Woo) algorithm.

use glam::{IVec3, Vec3};
use strata_voxel::BlockId;

/// Hard cap on grid steps, whatever `max_distance` says.
const MAX_STEPS: usize = 1 << 16;

/// Result of a successful raycast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit {
    /// World position of the block that was hit.
    pub block_pos: IVec3,
    /// Normal of the face the ray entered through. Zero if the ray started
    /// inside the block.
    pub face_normal: IVec3,
    /// Distance from the origin to the entry point, in blocks.
    pub distance: f32,
    /// The block that was hit.
    pub block: BlockId,
}

/// Walks the block grid from `origin` along `direction` and returns the first
/// non-air block, or `None` past `max_distance`.
///
/// Non-finite inputs hit nothing.
pub fn raycast<F>(origin: Vec3, direction: Vec3, max_distance: f32, block_at: F) -> Option<RaycastHit>
where
    F: Fn(IVec3) -> BlockId,
{
    if !(origin.is_finite() && direction.is_finite() && max_distance.is_finite()) {
        return None;
    }
    let dir = direction.normalize_or_zero();
    if dir == Vec3::ZERO {
        return None;
    }

    let base = origin.floor();
    let sub = origin - base;
    let mut block_pos = base.as_ivec3();

    let step = IVec3::new(step_of(dir.x), step_of(dir.y), step_of(dir.z));
    let t_delta = Vec3::new(
        safe_inv(dir.x.abs()),
        safe_inv(dir.y.abs()),
        safe_inv(dir.z.abs()),
    );
    let mut t_max = Vec3::new(
        initial_t_max(sub.x, dir.x, t_delta.x),
        initial_t_max(sub.y, dir.y, t_delta.y),
        initial_t_max(sub.z, dir.z, t_delta.z),
    );

    let mut normal = IVec3::ZERO;
    let mut t = 0.0_f32;

    // A ray of length d crosses at most d + 1 planes per axis.
    let steps = (max_distance.max(0.0).ceil() as usize)
        .saturating_add(1)
        .saturating_mul(3)
        .min(MAX_STEPS);

    for _ in 0..=steps {
        let block = block_at(block_pos);
        if !block.is_air() {
            return Some(RaycastHit {
                block_pos,
                face_normal: normal,
                distance: t,
                block,
            });
        }

        if t_max.x < t_max.y && t_max.x < t_max.z {
            t = t_max.x;
            t_max.x += t_delta.x;
            block_pos.x += step.x;
            normal = IVec3::new(-step.x, 0, 0);
        } else if t_max.y < t_max.z {
            t = t_max.y;
            t_max.y += t_delta.y;
            block_pos.y += step.y;
            normal = IVec3::new(0, -step.y, 0);
        } else {
            t = t_max.z;
            t_max.z += t_delta.z;
            block_pos.z += step.z;
            normal = IVec3::new(0, 0, -step.z);
        }

        if t > max_distance {
            return None;
        }
    }
    None
}

fn step_of(component: f32) -> i32 {
    if component >= 0.0 { 1 } else { -1 }
}

/// `1 / x`, or `f32::MAX` when `x` is about zero.
fn safe_inv(x: f32) -> f32 {
    if x.abs() < f32::EPSILON {
        f32::MAX
    } else {
        1.0 / x
    }
}

fn initial_t_max(sub: f32, dir: f32, t_delta: f32) -> f32 {
    if dir > 0.0 {
        (1.0 - sub) * t_delta
    } else if dir < 0.0 {
        sub * t_delta
    } else {
        f32::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use strata_voxel::blocks;

    fn grid(solid: &[(IVec3, BlockId)]) -> FxHashMap<IVec3, BlockId> {
        solid.iter().copied().collect()
    }

    fn cast(map: &FxHashMap<IVec3, BlockId>, origin: Vec3, dir: Vec3, max: f32) -> Option<RaycastHit> {
        raycast(origin, dir, max, |p| map.get(&p).copied().unwrap_or(BlockId::AIR))
    }

    #[test]
    fn test_hit_straight_down() {
        let map = grid(&[(IVec3::new(0, 0, 0), blocks::STONE)]);
        let hit = cast(&map, Vec3::new(0.5, 5.5, 0.5), Vec3::NEG_Y, 10.0).unwrap();
        assert_eq!(hit.block_pos, IVec3::ZERO);
        assert_eq!(hit.face_normal, IVec3::Y);
        assert_eq!(hit.block, blocks::STONE);
        assert!((hit.distance - 4.5).abs() < 1e-4);
    }

    #[test]
    fn test_negative_coordinates() {
        let map = grid(&[(IVec3::new(-10, 0, 0), blocks::DIRT)]);
        let hit = cast(&map, Vec3::new(0.5, 0.5, 0.5), Vec3::NEG_X, 20.0).unwrap();
        assert_eq!(hit.block_pos, IVec3::new(-10, 0, 0));
        assert_eq!(hit.face_normal, IVec3::X);
    }

    #[test]
    fn test_miss_beyond_max_distance() {
        let map = grid(&[(IVec3::new(0, 0, 20), blocks::STONE)]);
        assert!(cast(&map, Vec3::splat(0.5), Vec3::Z, 10.0).is_none());
    }

    #[test]
    fn test_start_inside_block() {
        let map = grid(&[(IVec3::new(2, 2, 2), blocks::STONE)]);
        let hit = cast(&map, Vec3::splat(2.5), Vec3::X, 5.0).unwrap();
        assert_eq!(hit.face_normal, IVec3::ZERO);
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn test_diagonal_ray() {
        let map = grid(&[(IVec3::new(3, 3, 3), blocks::GLASS)]);
        let hit = cast(&map, Vec3::splat(0.5), Vec3::ONE, 10.0).unwrap();
        assert_eq!(hit.block_pos, IVec3::new(3, 3, 3));
    }

    #[test]
    fn test_non_finite_distance_misses() {
        let map = grid(&[]);
        let origin = Vec3::splat(0.5);
        assert!(cast(&map, origin, Vec3::X, f32::NAN).is_none());
        assert!(cast(&map, origin, Vec3::X, f32::INFINITY).is_none());
    }

    #[test]
    fn test_non_finite_ray_misses() {
        let map = grid(&[(IVec3::ZERO, blocks::STONE)]);
        assert!(cast(&map, Vec3::NAN, Vec3::X, 10.0).is_none());
        assert!(cast(&map, Vec3::splat(0.5), Vec3::new(f32::INFINITY, 0.0, 0.0), 10.0).is_none());
        assert!(cast(&map, Vec3::new(f32::NEG_INFINITY, 0.0, 0.0), Vec3::X, 10.0).is_none());
    }

    #[test]
    fn test_huge_distance_is_capped() {
        let map = grid(&[]);
        assert!(cast(&map, Vec3::splat(0.5), Vec3::new(1.0, 0.3, 0.2), f32::MAX).is_none());
    }

    #[test]
    fn test_zero_direction() {
        let map = grid(&[]);
        assert!(cast(&map, Vec3::ZERO, Vec3::ZERO, 10.0).is_none());
    }
}
