//! The voxel world: the sparse chunk map, the concurrent generation and
//! meshing pipeline, light entry points, raycasting, and persistence hooks.

pub mod executor;
pub mod raycast;
pub mod streaming;
pub mod world;

pub use executor::ParallelExecutor;
pub use raycast::{RaycastHit, raycast};
pub use streaming::sphere_offsets;
pub use world::{PipelineStats, World, WorldConfig, WorldError};
