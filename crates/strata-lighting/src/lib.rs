//! Block light: breadth-first flood fill with removal and reseeding.
//!
//! The algorithms are written against [`LightVolume`], so they work on a
//! single chunk in tests and on the whole chunk map in the world.

pub mod flood_fill;

pub use flood_fill::{LightVolume, add_light, propagate, remove_light};
pub use strata_voxel::{LIGHT_FULL, LIGHT_NONE, Light, MAX_LEVEL, intensity, pack_light, with_intensity};
