//! Conversions between world block coordinates, chunk coordinates, and
//! chunk-local cell indices.
//!
//! Cells are linearised with x varying fastest, then z, then y, which is the
//! same order the mesher walks a chunk in.

use glam::IVec3;

use crate::face::Face;

/// Side length of a chunk in blocks.
pub const CHUNK_SIZE: usize = 16;

/// Total number of cells in a chunk (16³).
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

const SIZE: i32 = CHUNK_SIZE as i32;

/// Splits a world block position into `(chunk_position, local_offset)`.
///
/// Uses floor division so negative coordinates land in the correct chunk.
pub fn world_to_chunk(world: IVec3) -> (IVec3, IVec3) {
    let size = IVec3::splat(SIZE);
    (world.div_euclid(size), world.rem_euclid(size))
}

/// Returns the world position of the block at `offset` inside chunk `chunk`.
pub fn chunk_to_world(chunk: IVec3, offset: IVec3) -> IVec3 {
    chunk * SIZE + offset
}

/// Returns `true` if every component of `offset` is inside `[0, 16)`.
pub fn in_chunk(offset: IVec3) -> bool {
    offset.cmpge(IVec3::ZERO).all() && offset.cmplt(IVec3::splat(SIZE)).all()
}

/// Converts a chunk-local offset to a linear cell index.
pub fn offset_to_index(offset: IVec3) -> usize {
    debug_assert!(in_chunk(offset), "offset {offset} outside chunk");
    offset.x as usize + offset.z as usize * CHUNK_SIZE + offset.y as usize * CHUNK_SIZE * CHUNK_SIZE
}

/// Converts a linear cell index back to a chunk-local offset.
pub fn index_to_offset(index: usize) -> IVec3 {
    debug_assert!(index < CHUNK_VOLUME);
    IVec3::new(
        (index % CHUNK_SIZE) as i32,
        (index / (CHUNK_SIZE * CHUNK_SIZE)) as i32,
        ((index / CHUNK_SIZE) % CHUNK_SIZE) as i32,
    )
}

/// Returns a mask of the faces of the chunk that `offset` touches.
///
/// A cell on the `x = 0` plane touches [`Face::NegX`], one on `x = 15`
/// touches [`Face::PosX`], and so on. Interior cells return 0.
pub fn boundary_faces(offset: IVec3) -> u8 {
    let mut mask = 0;
    for face in Face::ALL {
        let n = face.normal();
        let axis = if n.x != 0 {
            offset.x
        } else if n.y != 0 {
            offset.y
        } else {
            offset.z
        };
        let edge = if n.x + n.y + n.z > 0 { SIZE - 1 } else { 0 };
        if axis == edge {
            mask |= face.bit();
        }
    }
    mask
}

/// Iterates the faces whose bits are set in `mask`, in index order.
pub fn faces_in_mask(mask: u8) -> impl Iterator<Item = Face> {
    Face::ALL.into_iter().filter(move |f| mask & f.bit() != 0)
}

/// Returns all 26 chunk offsets surrounding a chunk (the 3×3×3 cube minus
/// its center), in y, z, x order.
pub fn neighbor_offsets() -> impl Iterator<Item = IVec3> {
    (-1..=1).flat_map(|y| {
        (-1..=1).flat_map(move |z| {
            (-1..=1)
                .map(move |x| IVec3::new(x, y, z))
                .filter(|d| *d != IVec3::ZERO)
        })
    })
}

/// Neighbor chunk offsets whose one-cell border overlaps the faces in `mask`.
///
/// A face neighbor is included when its face is in the mask. Edge and corner
/// neighbors are included only when every face they sit across is.
pub fn boundary_neighbors(mask: u8) -> impl Iterator<Item = IVec3> {
    neighbor_offsets().filter(move |d| {
        Face::ALL.into_iter().all(|face| {
            let n = face.normal();
            let across = (n.x != 0 && n.x == d.x) || (n.y != 0 && n.y == d.y) || (n.z != 0 && n.z == d.z);
            !across || mask & face.bit() != 0
        })
    })
}
