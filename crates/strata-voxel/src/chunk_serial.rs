//! Chunk persistence: palette-compressed blocks plus the light map, LZ4
//! compressed and pushed onto a [`SerialBuffer`].
//!
//! ## Buffer layout (pushed in this order)
//!
//! | Field | Size |
//! |-------|------|
//! | LZ4 block | `compressed_size` bytes |
//! | `compressed_size` | `i32` |
//! | `original_size` | `i32` |
//!
//! ## Uncompressed payload
//!
//! | Field | Size |
//! |-------|------|
//! | index width (0 = single block) | `u8` |
//! | palette length `P` | `u32` |
//! | palette type width `T` | `u8` |
//! | palette types, packed at `T` bits | `u32` words |
//! | palette reference counts | `P × u16` |
//! | cell indices (omitted when width is 0) | `u32` words |
//! | light map | `4096 × u16` |

use glam::IVec3;

use crate::block_storage::{BlockStorage, Indices, MAX_BITS_PER_INDEX, PaletteEntry};
use crate::chunk::Chunk;
use crate::coords::CHUNK_VOLUME;
use crate::light::Light;
use crate::packed_array::{PackedArray, compute_bits_per_item};
use crate::registry::BlockId;
use crate::serial::{SerialBuffer, SerialError};

/// Upper bound on the uncompressed payload: a full 16-bit palette with
/// 16-bit types, plus 16-bit cell indices and the light map.
const MAX_PAYLOAD_SIZE: usize =
    6 + (1 << MAX_BITS_PER_INDEX) * (2 + 2) + CHUNK_VOLUME * (2 + size_of::<Light>());

impl Chunk {
    /// Pushes this chunk's blocks and light map onto `buf`.
    pub fn serialize(&self, buf: &mut SerialBuffer) {
        let payload = encode_payload(&self.blocks(), &self.light_snapshot());
        let compressed = lz4_flex::block::compress(&payload);
        buf.push_bytes(&compressed);
        buf.push_i32(compressed.len() as i32);
        buf.push_i32(payload.len() as i32);
    }

    /// Pops a chunk previously written by [`serialize`](Self::serialize).
    ///
    /// The returned chunk has all flags clear; callers decide whether it
    /// counts as decorated.
    pub fn deserialize(position: IVec3, buf: &mut SerialBuffer) -> Result<Chunk, SerialError> {
        let original_size = non_negative(buf.pop_i32()?)?;
        if original_size > MAX_PAYLOAD_SIZE {
            return Err(SerialError::PayloadTooLarge {
                size: original_size,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let compressed_size = non_negative(buf.pop_i32()?)?;
        let compressed = buf.pop_bytes(compressed_size)?;

        let payload = lz4_flex::block::decompress(&compressed, original_size)?;
        if payload.len() != original_size {
            return Err(SerialError::SizeMismatch {
                expected: original_size,
                actual: payload.len(),
            });
        }

        let (blocks, light) = decode_payload(&payload)?;
        Ok(Chunk::from_parts(position, blocks, &light))
    }
}

fn non_negative(size: i32) -> Result<usize, SerialError> {
    usize::try_from(size).map_err(|_| SerialError::NegativeSize(size))
}

fn encode_payload(blocks: &BlockStorage, light: &[Light]) -> Vec<u8> {
    let palette = blocks.palette();
    let types: Vec<u32> = palette.iter().map(|e| u32::from(e.block.0)).collect();
    let type_bits = compute_bits_per_item(&types);
    let packed_types = PackedArray::from_values(type_bits, &types);

    let mut out = Vec::with_capacity(CHUNK_VOLUME * 3);
    out.push(blocks.bits_per_index() as u8);
    out.extend_from_slice(&(palette.len() as u32).to_le_bytes());
    out.push(type_bits as u8);
    for word in packed_types.words() {
        out.extend_from_slice(&word.to_le_bytes());
    }
    for entry in palette {
        out.extend_from_slice(&(entry.ref_count as u16).to_le_bytes());
    }
    if let Indices::Packed(indices) = blocks.indices() {
        for word in indices.words() {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    for value in light {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

fn decode_payload(payload: &[u8]) -> Result<(BlockStorage, Vec<Light>), SerialError> {
    let mut reader = ByteReader::new(payload);

    let index_bits = reader.u8()?;
    let palette_len = reader.u32()? as usize;
    let type_bits = reader.u8()?;
    if !(1..=16).contains(&type_bits) {
        return Err(SerialError::InvalidBitWidth(type_bits));
    }

    let type_words = reader.words(PackedArray::word_count(u32::from(type_bits), palette_len))?;
    let types = PackedArray::from_raw(u32::from(type_bits), palette_len, type_words)
        .ok_or(SerialError::InvalidBitWidth(type_bits))?;

    let mut palette = Vec::with_capacity(palette_len);
    for slot in 0..palette_len {
        palette.push(PaletteEntry {
            ref_count: u32::from(reader.u16()?),
            block: BlockId(types.get(slot) as u16),
        });
    }

    let indices = match index_bits {
        0 => Indices::Single,
        1 | 2 | 4 | 8 | 16 => {
            let bits = u32::from(index_bits);
            let words = reader.words(PackedArray::word_count(bits, CHUNK_VOLUME))?;
            Indices::Packed(
                PackedArray::from_raw(bits, CHUNK_VOLUME, words)
                    .ok_or(SerialError::InvalidBitWidth(index_bits))?,
            )
        }
        other => return Err(SerialError::InvalidBitWidth(other)),
    };

    let mut light = Vec::with_capacity(CHUNK_VOLUME);
    for _ in 0..CHUNK_VOLUME {
        light.push(reader.u16()?);
    }

    if reader.remaining() != 0 {
        return Err(SerialError::TrailingBytes(reader.remaining()));
    }

    let blocks = BlockStorage::from_parts(palette, indices).ok_or(SerialError::CorruptPalette)?;
    Ok((blocks, light))
}

/// Forward little-endian reader over the decompressed payload.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SerialError> {
        if n > self.remaining() {
            return Err(SerialError::Underflow {
                requested: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, SerialError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, SerialError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, SerialError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn words(&mut self, count: usize) -> Result<Vec<u32>, SerialError> {
        let bytes = self.take(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::index_to_offset;
    use crate::light::pack_light;

    fn assert_same(a: &Chunk, b: &Chunk) {
        assert_eq!(*a.blocks(), *b.blocks());
        assert_eq!(a.light_snapshot(), b.light_snapshot());
    }

    #[test]
    fn test_roundtrip_uniform_chunk() {
        let chunk = Chunk::new(IVec3::ZERO);
        let mut buf = SerialBuffer::new();
        chunk.serialize(&mut buf);
        let restored = Chunk::deserialize(IVec3::ZERO, &mut buf).unwrap();
        assert_same(&chunk, &restored);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_roundtrip_mixed_chunk_with_light() {
        let chunk = Chunk::new(IVec3::new(-3, 1, 9));
        for index in (0..CHUNK_VOLUME).step_by(7) {
            chunk.set_block_at(index_to_offset(index), BlockId((index % 300) as u16));
            chunk.set_light(index, pack_light((index % 16) as u8, 1, 2, 3));
        }
        // Leave a dead slot in the palette.
        chunk.set_block_at(index_to_offset(7), BlockId(2000));
        chunk.set_block_at(index_to_offset(7), BlockId::AIR);

        let mut buf = SerialBuffer::new();
        chunk.serialize(&mut buf);
        let restored = Chunk::deserialize(chunk.position(), &mut buf).unwrap();
        assert_same(&chunk, &restored);
        assert_eq!(restored.position(), IVec3::new(-3, 1, 9));
    }

    #[test]
    fn test_trailer_is_two_i32_sizes() {
        let chunk = Chunk::new(IVec3::ZERO);
        let mut buf = SerialBuffer::new();
        chunk.serialize(&mut buf);

        let original = buf.pop_i32().unwrap();
        let compressed = buf.pop_i32().unwrap();
        assert_eq!(compressed as usize, buf.len());
        // width + palette len + type width + 1 type word + 1 ref count + light
        assert_eq!(original as usize, 1 + 4 + 1 + 4 + 2 + CHUNK_VOLUME * 2);
    }

    #[test]
    fn test_truncated_buffer_errors() {
        let chunk = Chunk::new(IVec3::ZERO);
        let mut buf = SerialBuffer::new();
        chunk.serialize(&mut buf);
        let bytes = buf.into_bytes();
        let mut short = SerialBuffer::from_bytes(bytes[4..].to_vec());
        assert!(Chunk::deserialize(IVec3::ZERO, &mut short).is_err());
    }

    #[test]
    fn test_negative_size_rejected() {
        let mut buf = SerialBuffer::new();
        buf.push_i32(10);
        buf.push_i32(-1);
        let err = Chunk::deserialize(IVec3::ZERO, &mut buf).unwrap_err();
        assert!(matches!(err, SerialError::NegativeSize(-1)));
    }

    #[test]
    fn test_oversized_payload_rejected_before_decompressing() {
        let mut buf = SerialBuffer::new();
        buf.push_bytes(&[0; 8]);
        buf.push_i32(8);
        buf.push_i32(i32::MAX);
        let err = Chunk::deserialize(IVec3::ZERO, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            SerialError::PayloadTooLarge { size, max } if size == i32::MAX as usize && max == MAX_PAYLOAD_SIZE
        ));
    }

    #[test]
    fn test_worst_case_chunk_fits_payload_limit() {
        let chunk = Chunk::new(IVec3::ZERO);
        for index in 0..CHUNK_VOLUME {
            chunk.set_block_at(index_to_offset(index), BlockId(index as u16 + 1));
        }
        let mut buf = SerialBuffer::new();
        chunk.serialize(&mut buf);
        let restored = Chunk::deserialize(IVec3::ZERO, &mut buf).unwrap();
        assert_same(&chunk, &restored);
    }

    #[test]
    fn test_several_chunks_share_one_buffer() {
        let a = Chunk::new(IVec3::X);
        a.set_block_at(IVec3::new(1, 1, 1), BlockId(4));
        let b = Chunk::new(IVec3::Y);

        let mut buf = SerialBuffer::new();
        a.serialize(&mut buf);
        b.serialize(&mut buf);

        let b2 = Chunk::deserialize(IVec3::Y, &mut buf).unwrap();
        let a2 = Chunk::deserialize(IVec3::X, &mut buf).unwrap();
        assert_same(&a, &a2);
        assert_same(&b, &b2);
    }
}
