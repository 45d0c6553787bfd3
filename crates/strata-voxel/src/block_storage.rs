//! Palette-compressed block storage for one 16×16×16 chunk.
//!
//! Cells hold indices into a per-chunk palette of `(ref_count, block)`
//! entries. A chunk made of a single block type keeps no index array at all.
//! Once a second type appears the indices live in a [`PackedArray`] whose
//! width doubles whenever the palette has no free slot left.
//!
//! The palette never shrinks. Slots whose reference count drops to zero are
//! reused by later insertions instead.

use crate::coords::CHUNK_VOLUME;
use crate::packed_array::PackedArray;
use crate::registry::BlockId;

/// Widest index the palette can grow to.
///
/// A chunk has at most [`CHUNK_VOLUME`] live slots and growth only happens
/// when every slot is live, so `2^16` slots can never be exhausted.
pub const MAX_BITS_PER_INDEX: u32 = 16;

/// One palette slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PaletteEntry {
    /// Number of cells currently pointing at this slot.
    pub ref_count: u32,
    /// Block type stored in this slot. Meaningless when `ref_count == 0`.
    pub block: BlockId,
}

/// How cells map to palette slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Indices {
    /// Every cell uses palette slot 0.
    Single,
    /// Per-cell palette indices.
    Packed(PackedArray),
}

/// Palette-compressed block grid for one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockStorage {
    palette: Vec<PaletteEntry>,
    indices: Indices,
}

impl BlockStorage {
    /// Creates storage where every cell is `block`.
    pub fn new(block: BlockId) -> Self {
        Self {
            palette: vec![PaletteEntry {
                ref_count: CHUNK_VOLUME as u32,
                block,
            }],
            indices: Indices::Single,
        }
    }

    /// Creates storage filled with air.
    pub fn new_air() -> Self {
        Self::new(BlockId::AIR)
    }

    /// Returns the block at cell `index`.
    pub fn get_block(&self, index: usize) -> BlockId {
        debug_assert!(index < CHUNK_VOLUME);
        match &self.indices {
            Indices::Single => self.palette[0].block,
            Indices::Packed(packed) => self.palette[packed.get(index) as usize].block,
        }
    }

    /// Sets cell `index` to `block`, keeping reference counts exact.
    pub fn set_block(&mut self, index: usize, block: BlockId) {
        debug_assert!(index < CHUNK_VOLUME);
        if matches!(self.indices, Indices::Single) {
            if self.palette[0].block == block {
                return;
            }
            self.palette[0].ref_count -= 1;
            self.palette.push(PaletteEntry { ref_count: 1, block });
            let mut packed = PackedArray::new(1, CHUNK_VOLUME);
            packed.set(index, 1);
            self.indices = Indices::Packed(packed);
            return;
        }
        let Indices::Packed(packed) = &mut self.indices else {
            return;
        };

        let old_slot = packed.get(index) as usize;
        if self.palette[old_slot].block == block {
            return;
        }
        self.palette[old_slot].ref_count -= 1;

        // Dedup against an existing entry first.
        if let Some(slot) = self.palette.iter().position(|e| e.ref_count > 0 && e.block == block) {
            self.palette[slot].ref_count += 1;
            packed.set(index, slot as u32);
            return;
        }

        // The cell was the last user of its slot: rewrite it in place.
        if self.palette[old_slot].ref_count == 0 {
            self.palette[old_slot] = PaletteEntry { ref_count: 1, block };
            return;
        }

        let slot = match self.palette.iter().position(|e| e.ref_count == 0) {
            Some(free) => free,
            None => {
                let first_new = self.palette.len();
                grow(&mut self.palette, packed);
                first_new
            }
        };
        self.palette[slot] = PaletteEntry { ref_count: 1, block };
        packed.set(index, slot as u32);
    }

    /// Returns the current index width, 0 in single-value mode.
    pub fn bits_per_index(&self) -> u32 {
        match &self.indices {
            Indices::Single => 0,
            Indices::Packed(packed) => packed.bits(),
        }
    }

    /// Returns the palette, including dead slots.
    pub fn palette(&self) -> &[PaletteEntry] {
        &self.palette
    }

    /// Returns the index layout.
    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    /// Returns the number of palette slots with a non-zero reference count.
    pub fn live_types(&self) -> usize {
        self.palette.iter().filter(|e| e.ref_count > 0).count()
    }

    /// Returns `true` if every cell holds `block`.
    pub fn is_uniform(&self, block: BlockId) -> bool {
        self.palette
            .iter()
            .filter(|e| e.ref_count > 0)
            .all(|e| e.block == block)
    }

    /// Decodes every cell into `out`, in cell-index order.
    pub fn unpack_into(&self, out: &mut [BlockId]) {
        debug_assert_eq!(out.len(), CHUNK_VOLUME);
        match &self.indices {
            Indices::Single => out.fill(self.palette[0].block),
            Indices::Packed(packed) => {
                let mut raw = vec![0u32; CHUNK_VOLUME];
                packed.unpack(0, &mut raw);
                for (cell, slot) in out.iter_mut().zip(raw) {
                    *cell = self.palette[slot as usize].block;
                }
            }
        }
    }

    /// Rebuilds storage from its parts, as produced by the serializer.
    ///
    /// Returns `None` if the parts are inconsistent: wrong palette length for
    /// the index width, an index pointing past the palette, or reference
    /// counts that disagree with the indices.
    pub fn from_parts(palette: Vec<PaletteEntry>, indices: Indices) -> Option<Self> {
        match &indices {
            Indices::Single => {
                if palette.len() != 1 || palette[0].ref_count != CHUNK_VOLUME as u32 {
                    return None;
                }
            }
            Indices::Packed(packed) => {
                if packed.len() != CHUNK_VOLUME
                    || packed.bits() > MAX_BITS_PER_INDEX
                    || palette.len() > 1usize << packed.bits()
                {
                    return None;
                }
                let mut counts = vec![0u32; palette.len()];
                for slot in packed.to_vec() {
                    *counts.get_mut(slot as usize)? += 1;
                }
                if counts.iter().zip(&palette).any(|(c, e)| *c != e.ref_count) {
                    return None;
                }
            }
        }
        Some(Self { palette, indices })
    }
}

impl Default for BlockStorage {
    fn default() -> Self {
        Self::new_air()
    }
}

/// Doubles the index width and repacks every cell.
fn grow(palette: &mut Vec<PaletteEntry>, packed: &mut PackedArray) {
    let old_bits = packed.bits();
    let new_bits = (old_bits * 2).min(MAX_BITS_PER_INDEX);
    debug_assert!(new_bits > old_bits, "palette exceeded {MAX_BITS_PER_INDEX}-bit indices");

    let values = packed.to_vec();
    *packed = PackedArray::from_values(new_bits, &values);
    palette.resize(1usize << new_bits, PaletteEntry::default());
    tracing::trace!(old_bits, new_bits, "palette grown");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
