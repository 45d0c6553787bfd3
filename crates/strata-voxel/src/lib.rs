//! Block storage for the voxel world: bit packing, palette compression,
//! the block registry, chunks, and chunk persistence.

pub mod block_storage;
pub mod chunk;
mod chunk_serial;
pub mod coords;
pub mod face;
pub mod light;
pub mod packed_array;
pub mod registry;
pub mod serial;

pub use block_storage::{BlockStorage, Indices, MAX_BITS_PER_INDEX, PaletteEntry};
pub use chunk::{AppliedChanges, BlockEdit, Chunk};
pub use coords::{
    CHUNK_SIZE, CHUNK_VOLUME, boundary_faces, boundary_neighbors, chunk_to_world, faces_in_mask, in_chunk,
    index_to_offset, neighbor_offsets, offset_to_index, world_to_chunk,
};
pub use face::Face;
pub use light::{LIGHT_FULL, LIGHT_NONE, Light, MAX_LEVEL, channel, intensity, pack_light, with_intensity};
pub use packed_array::{PackedArray, compute_bits_per_item};
pub use registry::{BlockData, BlockId, BlockRegistry, BlockShape, RegistryError, blocks};
pub use serial::{SerialBuffer, SerialError};
