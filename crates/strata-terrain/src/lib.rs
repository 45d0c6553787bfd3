//! Procedural terrain: deterministic noise fields, position hashing, and the
//! shaping and decoration passes run by the world pipeline.

mod field;
mod generator;
mod hash;

pub use field::{FlatField, NoiseTerrain, NoiseTerrainParams, TerrainField};
pub use generator::{CAVE_THRESHOLD, TerrainGenerator, place_tree};
pub use hash::{position_hash, position_rng};
