//! GPU-ready mesh records.
//!
//! Opaque cubes are drawn from [`BlockFace`] records, one per visible face,
//! expanded to a quad on the GPU. Everything else (see-through cubes and
//! cross-shaped plants) is emitted as explicit [`TransparentVertex`] lists.

use strata_voxel::Face;

/// One visible face of an opaque block, packed to 12 bytes.
///
/// Layout of `packed` (low bit first):
///   - bits `0..4`   x in chunk-local coords
///   - bits `4..8`   y
///   - bits `8..12`  z
///   - bits `12..15` face index (see [`Face`])
///   - bits `15..31` texture layer
///
/// `light` holds one packed light value per quad corner, in the order
/// `(u, v) = (0, 0), (1, 0), (1, 1), (0, 1)` of [`Face::tangents`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BlockFace {
    pub packed: u32,
    pub light: [u16; 4],
}

static_assertions::assert_eq_size!(BlockFace, [u8; 12]);

impl BlockFace {
    pub fn new(x: u32, y: u32, z: u32, face: Face, texture: u16, light: [u16; 4]) -> Self {
        debug_assert!(x < 16 && y < 16 && z < 16);
        let packed = x | (y << 4) | (z << 8) | ((face as u32) << 12) | (u32::from(texture) << 15);
        Self { packed, light }
    }

    /// Chunk-local cell coordinates.
    pub fn position(&self) -> [u32; 3] {
        [self.packed & 0xF, (self.packed >> 4) & 0xF, (self.packed >> 8) & 0xF]
    }

    /// Face index (0–5).
    pub fn face_index(&self) -> usize {
        ((self.packed >> 12) & 0x7) as usize
    }

    /// Texture layer.
    pub fn texture(&self) -> u16 {
        (self.packed >> 15) as u16
    }
}

/// A vertex of see-through or non-cubic geometry (28 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransparentVertex {
    /// Position in chunk-local space.
    pub position: [f32; 3],
    /// Texture coordinates within the layer.
    pub uv: [f32; 2],
    /// Texture layer.
    pub texture: u32,
    /// Packed light value, widened for alignment.
    pub light: u32,
}

static_assertions::assert_eq_size!(TransparentVertex, [u8; 28]);
