//! A stack-like byte buffer used by chunk persistence.
//!
//! Fields are pushed onto the tail and popped back off the tail, so they must
//! be read in the reverse order they were written. All multi-byte values are
//! little-endian.

/// Errors produced while reading serialized chunk data.
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    /// A read asked for more bytes than remain.
    #[error("buffer underflow: requested {requested} bytes, {available} available")]
    Underflow {
        /// Bytes requested.
        requested: usize,
        /// Bytes remaining.
        available: usize,
    },
    /// A size field was negative.
    #[error("negative size field: {0}")]
    NegativeSize(i32),
    /// The header recorded a payload no chunk can encode to.
    #[error("payload size {size} exceeds the {max} byte limit")]
    PayloadTooLarge {
        /// Size recorded in the header.
        size: usize,
        /// Largest valid payload.
        max: usize,
    },
    /// Decompression yielded a different length than the header recorded.
    #[error("decompressed {actual} bytes, header recorded {expected}")]
    SizeMismatch {
        /// Length recorded in the header.
        expected: usize,
        /// Length actually produced.
        actual: usize,
    },
    /// The LZ4 block could not be decoded.
    #[error("lz4 decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
    /// An index or palette width byte is out of range.
    #[error("invalid bit width: {0}")]
    InvalidBitWidth(u8),
    /// Palette reference counts disagree with the cell indices.
    #[error("palette does not match cell indices")]
    CorruptPalette,
    /// The payload had bytes left over after the last field.
    #[error("{0} trailing bytes after chunk payload")]
    TrailingBytes(usize),
}

/// Growable byte buffer written and read from its tail.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerialBuffer {
    bytes: Vec<u8>,
}

impl SerialBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps existing bytes, e.g. read back from disk.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Consumes the buffer and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the buffered bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn push_i32(&mut self, value: i32) {
        self.push_bytes(&value.to_le_bytes());
    }

    pub fn push_u32(&mut self, value: u32) {
        self.push_bytes(&value.to_le_bytes());
    }

    /// Removes and returns the last `n` bytes.
    pub fn pop_bytes(&mut self, n: usize) -> Result<Vec<u8>, SerialError> {
        if n > self.bytes.len() {
            return Err(SerialError::Underflow {
                requested: n,
                available: self.bytes.len(),
            });
        }
        let at = self.bytes.len() - n;
        Ok(self.bytes.split_off(at))
    }

    pub fn pop_i32(&mut self) -> Result<i32, SerialError> {
        Ok(i32::from_le_bytes(self.pop_array()?))
    }

    pub fn pop_u32(&mut self) -> Result<u32, SerialError> {
        Ok(u32::from_le_bytes(self.pop_array()?))
    }

    fn pop_array<const N: usize>(&mut self) -> Result<[u8; N], SerialError> {
        let bytes = self.pop_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_pop_in_reverse_order() {
        let mut buf = SerialBuffer::new();
        buf.push_bytes(b"abc");
        buf.push_i32(-7);
        buf.push_u32(42);
        assert_eq!(buf.pop_u32().unwrap(), 42);
        assert_eq!(buf.pop_i32().unwrap(), -7);
        assert_eq!(buf.pop_bytes(3).unwrap(), b"abc");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_underflow_is_an_error() {
        let mut buf = SerialBuffer::from_bytes(vec![1, 2]);
        let err = buf.pop_i32().unwrap_err();
        assert!(matches!(err, SerialError::Underflow { requested: 4, available: 2 }));
        // Nothing was consumed.
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut buf = SerialBuffer::new();
        buf.push_i32(0x0102_0304);
        assert_eq!(buf.as_bytes(), &[4, 3, 2, 1]);
    }
}
