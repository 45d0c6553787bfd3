//! Chunk meshing: face culling, smooth per-corner lighting, and a pool of
//! reusable builders shared by the pipeline workers.

pub mod builder;
pub mod neighborhood;
pub mod pool;
pub mod vertex;

pub use builder::ChunkMeshBuilder;
pub use neighborhood::{ChunkNeighborhood, PADDED, PADDED_VOLUME, padded_index};
pub use pool::MeshBuilderPool;
pub use vertex::{BlockFace, TransparentVertex};
