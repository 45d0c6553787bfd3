//! The 3×3×3 block of chunks a mesh needs, flattened into padded grids.
//!
//! Meshing a chunk samples one cell beyond each of its faces, edges and
//! corners. Those samples are copied out of the 26 neighbors once, into an
//! 18×18×18 grid whose interior is the chunk itself, so the face loop never
//! has to route lookups across chunk boundaries.

use std::sync::Arc;

use glam::IVec3;
use strata_voxel::{BlockId, CHUNK_SIZE, CHUNK_VOLUME, Chunk, Light, offset_to_index};

/// Side length of the padded grid.
pub const PADDED: usize = CHUNK_SIZE + 2;

/// Number of cells in the padded grid.
pub const PADDED_VOLUME: usize = PADDED * PADDED * PADDED;

/// Index into the padded grid for chunk-local coordinates in `-1..=16`.
#[inline]
pub fn padded_index(x: i32, y: i32, z: i32) -> usize {
    debug_assert!((-1..=CHUNK_SIZE as i32).contains(&x));
    debug_assert!((-1..=CHUNK_SIZE as i32).contains(&y));
    debug_assert!((-1..=CHUNK_SIZE as i32).contains(&z));
    (x + 1) as usize + (z + 1) as usize * PADDED + (y + 1) as usize * PADDED * PADDED
}

/// A chunk together with all 26 of its neighbors.
pub struct ChunkNeighborhood {
    /// Indexed by `(dx + 1) + (dz + 1) * 3 + (dy + 1) * 9`; slot 13 is the center.
    chunks: Vec<Arc<Chunk>>,
}

impl ChunkNeighborhood {
    /// Collects the chunk at `center` and its neighbors through `lookup`.
    ///
    /// Returns `None` if any of the 27 chunks is missing or not yet decorated.
    pub fn gather<F>(center: IVec3, lookup: F) -> Option<Self>
    where
        F: Fn(IVec3) -> Option<Arc<Chunk>>,
    {
        let mut chunks = Vec::with_capacity(27);
        for dy in -1..=1 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    let chunk = lookup(center + IVec3::new(dx, dy, dz))?;
                    if !chunk.is_decorated() {
                        return None;
                    }
                    chunks.push(chunk);
                }
            }
        }
        Some(Self { chunks })
    }

    /// The center chunk.
    pub fn center(&self) -> &Arc<Chunk> {
        &self.chunks[13]
    }

    /// The chunk at `delta` (each component in `-1..=1`) from the center.
    pub fn get(&self, delta: IVec3) -> &Arc<Chunk> {
        let i = (delta.x + 1) + (delta.z + 1) * 3 + (delta.y + 1) * 9;
        &self.chunks[i as usize]
    }

    /// Copies blocks and light into padded grids.
    ///
    /// `scratch` receives the center chunk's unpacked cells.
    pub fn fill_padded(
        &self,
        scratch: &mut [BlockId],
        blocks: &mut [BlockId],
        light: &mut [Light],
    ) {
        debug_assert_eq!(scratch.len(), CHUNK_VOLUME);
        debug_assert_eq!(blocks.len(), PADDED_VOLUME);
        debug_assert_eq!(light.len(), PADDED_VOLUME);

        let size = CHUNK_SIZE as i32;
        let center = self.center();
        center.blocks().unpack_into(scratch);
        for y in 0..size {
            for z in 0..size {
                for x in 0..size {
                    let local = offset_to_index(IVec3::new(x, y, z));
                    let padded = padded_index(x, y, z);
                    blocks[padded] = scratch[local];
                    light[padded] = center.light_at(local);
                }
            }
        }

        // Border shell: wrap each out-of-range coordinate into its neighbor.
        for y in -1..=size {
            for z in -1..=size {
                for x in -1..=size {
                    let pos = IVec3::new(x, y, z);
                    let delta = pos.div_euclid(IVec3::splat(size));
                    if delta == IVec3::ZERO {
                        continue;
                    }
                    let local = offset_to_index(pos.rem_euclid(IVec3::splat(size)));
                    let chunk = self.get(delta);
                    let padded = padded_index(x, y, z);
                    blocks[padded] = chunk.get_block(local);
                    light[padded] = chunk.light_at(local);
                }
            }
        }
    }
}
