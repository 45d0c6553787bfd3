//! Chunk shaping and decoration.
//!
//! Shaping turns the noise field into stone, dirt, grass, sand and water.
//! Decoration then scatters plants and trees on exposed grass. Every random
//! choice is keyed on the world seed and the block's world position, and
//! decorations never reach outside their own chunk, so a chunk decorates
//! identically no matter which chunks were generated before it.

use glam::IVec3;
use rand::Rng;
use strata_voxel::{BlockId, CHUNK_SIZE, Chunk, blocks, chunk_to_world, offset_to_index};

use crate::field::{NoiseTerrain, TerrainField};
use crate::hash::{position_hash, position_rng};

/// Cave density at or below which a cell is hollowed out.
pub const CAVE_THRESHOLD: f64 = -0.35;

/// Caves never open closer than this to the surface.
const CAVE_MIN_DEPTH: i32 = 5;

/// Layers of dirt (or sand) under the top block.
const SOIL_DEPTH: i32 = 3;

// Decoration rolls out of 1000.
const TREE_ROLL: u64 = 10;
const TALL_GRASS_ROLL: u64 = 120;
const FLOWER_ROLL: u64 = 140;

/// Generates chunk contents from a [`TerrainField`].
pub struct TerrainGenerator {
    field: Box<dyn TerrainField>,
    seed: u64,
    sea_level: i32,
}

impl TerrainGenerator {
    pub fn new(field: Box<dyn TerrainField>, seed: u64, sea_level: i32) -> Self {
        Self {
            field,
            seed,
            sea_level,
        }
    }

    /// A generator over the default noise field.
    pub fn from_seed(seed: u64, sea_level: i32) -> Self {
        Self::new(Box::new(NoiseTerrain::with_seed(seed)), seed, sea_level)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn sea_level(&self) -> i32 {
        self.sea_level
    }

    pub fn field(&self) -> &dyn TerrainField {
        self.field.as_ref()
    }

    /// The block shaping places at world position `pos`, given the column's
    /// surface height.
    pub fn block_at(&self, pos: IVec3, surface: i32) -> BlockId {
        if pos.y > surface {
            return if pos.y <= self.sea_level {
                blocks::WATER
            } else {
                BlockId::AIR
            };
        }

        let depth = surface - pos.y;
        if depth >= CAVE_MIN_DEPTH && self.field.cave_density(pos) <= CAVE_THRESHOLD {
            return BlockId::AIR;
        }

        let beach = surface <= self.sea_level + 1;
        match depth {
            0 if beach => blocks::SAND,
            0 => blocks::GRASS,
            d if d <= SOIL_DEPTH && beach => blocks::SAND,
            d if d <= SOIL_DEPTH => blocks::DIRT,
            _ => blocks::STONE,
        }
    }

    /// Writes terrain into `chunk`. Returns the number of non-air cells.
    pub fn shape(&self, chunk: &Chunk) -> usize {
        let size = CHUNK_SIZE as i32;
        let origin = chunk_to_world(chunk.position(), IVec3::ZERO);
        let mut written = 0;

        for z in 0..size {
            for x in 0..size {
                let surface = self.field.surface_height(origin.x + x, origin.z + z);
                if origin.y > surface && origin.y > self.sea_level {
                    continue;
                }
                for y in 0..size {
                    let offset = IVec3::new(x, y, z);
                    let block = self.block_at(origin + offset, surface);
                    if !block.is_air() {
                        chunk.set_block_at(offset, block);
                        written += 1;
                    }
                }
            }
        }

        tracing::trace!(chunk = ?chunk.position(), written, "chunk shaped");
        written
    }

    /// Scatters plants and trees over exposed grass in `chunk`. Returns the
    /// number of features placed.
    pub fn decorate(&self, chunk: &Chunk) -> usize {
        let size = CHUNK_SIZE as i32;
        let origin = chunk_to_world(chunk.position(), IVec3::ZERO);
        let mut placed = 0;

        for z in 0..size {
            for x in 0..size {
                let surface = self.field.surface_height(origin.x + x, origin.z + z);
                let local_y = surface - origin.y;
                if !(0..size - 1).contains(&local_y) {
                    continue;
                }
                let ground = IVec3::new(x, local_y, z);
                let above = ground + IVec3::Y;
                if chunk.get_block(offset_to_index(ground)) != blocks::GRASS
                    || !chunk.get_block(offset_to_index(above)).is_air()
                {
                    continue;
                }

                let world = origin + ground;
                let roll = position_hash(self.seed, world) % 1000;
                if roll < TREE_ROLL {
                    let height = position_rng(self.seed, world).random_range(4..=6);
                    if place_tree(chunk, above, height) {
                        placed += 1;
                    }
                } else if roll < TALL_GRASS_ROLL {
                    chunk.set_block_at(above, blocks::TALL_GRASS);
                    placed += 1;
                } else if roll < FLOWER_ROLL {
                    chunk.set_block_at(above, blocks::FLOWER);
                    placed += 1;
                }
            }
        }

        tracing::trace!(chunk = ?chunk.position(), placed, "chunk decorated");
        placed
    }
}

/// Grows a tree with its trunk starting at `base`. Returns `false` and leaves
/// the chunk untouched if the canopy would cross the chunk boundary.
pub fn place_tree(chunk: &Chunk, base: IVec3, height: i32) -> bool {
    let size = CHUNK_SIZE as i32;
    let fits_x = (2..size - 2).contains(&base.x) && (2..size - 2).contains(&base.z);
    if !fits_x || base.y < 0 || base.y + height >= size {
        return false;
    }

    for dy in 0..height {
        chunk.set_block_at(base + IVec3::new(0, dy, 0), blocks::LOG);
    }

    for dy in height - 2..=height {
        let radius: i32 = if dy == height { 1 } else { 2 };
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                if radius == 2 && dx.abs() == 2 && dz.abs() == 2 {
                    continue;
                }
                let cell = base + IVec3::new(dx, dy, dz);
                if chunk.get_block(offset_to_index(cell)).is_air() {
                    chunk.set_block_at(cell, blocks::LEAVES);
                }
            }
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
