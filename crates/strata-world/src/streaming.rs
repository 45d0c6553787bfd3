//! Render-distance demand: which chunk offsets around the camera to request.

use glam::IVec3;

/// Chunk offsets within `radius` chunks of the origin, nearest first.
///
/// Offsets at equal distance are ordered by `(y, z, x)` so the list is the
/// same on every run.
pub fn sphere_offsets(radius: u32) -> Vec<IVec3> {
    let r = radius as i32;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for y in -r..=r {
        for z in -r..=r {
            for x in -r..=r {
                let offset = IVec3::new(x, y, z);
                if offset.length_squared() <= r2 {
                    offsets.push(offset);
                }
            }
        }
    }
    offsets.sort_by_key(|o| (o.length_squared(), o.y, o.z, o.x));
    offsets
}
