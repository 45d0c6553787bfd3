//! Bit-packed array of fixed-width unsigned integers stored in `u32` words.
//!
//! Item `i` occupies bits `[i * bits, (i + 1) * bits)` of a conceptual
//! little-endian bitstream laid across the words. Any width from 1 to 32 bits
//! is supported, so items may straddle a word boundary when the width does
//! not evenly divide 32.

/// A compact array where each item is stored using a fixed number of bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedArray {
    /// Raw storage. Items are packed into 32-bit words.
    words: Vec<u32>,
    /// Bits per item, in `1..=32`.
    bits: u32,
    /// Total number of logical items.
    count: usize,
}

impl PackedArray {
    /// Creates a new array of `count` items, all zero.
    ///
    /// Allocates `ceil(bits * count / 32)` words, but never fewer than one.
    pub fn new(bits: u32, count: usize) -> Self {
        debug_assert!((1..=32).contains(&bits), "bits must be in 1..=32, got {bits}");
        Self {
            words: vec![0u32; Self::word_count(bits, count)],
            bits,
            count,
        }
    }

    /// Creates an array sized exactly for `values` and packs them in.
    pub fn from_values(bits: u32, values: &[u32]) -> Self {
        let mut array = Self::new(bits, values.len());
        array.pack(0, values);
        array
    }

    /// Number of `u32` words needed for `count` items of `bits` width.
    pub fn word_count(bits: u32, count: usize) -> usize {
        let total_bits = count as u64 * u64::from(bits);
        (total_bits.div_ceil(32) as usize).max(1)
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> u32 {
        debug_assert!(index < self.count, "index {index} out of bounds ({})", self.count);
        let bit = index as u64 * u64::from(self.bits);
        let word = (bit / 32) as usize;
        let shift = (bit % 32) as u32;
        let mask = Self::mask(self.bits);

        if shift + self.bits <= 32 {
            (self.words[word] >> shift) & mask
        } else {
            // Low part from this word, high part from the next.
            let lo = self.words[word] >> shift;
            let hi = self.words[word + 1] << (32 - shift);
            (lo | hi) & mask
        }
    }

    /// Sets the item at `index` to `value`.
    ///
    /// `value` must fit in the array's bit width. This is only checked in
    /// debug builds.
    pub fn set(&mut self, index: usize, value: u32) {
        debug_assert!(index < self.count, "index {index} out of bounds ({})", self.count);
        debug_assert!(
            u64::from(value) <= u64::from(Self::mask(self.bits)),
            "value {value} exceeds {}-bit capacity",
            self.bits
        );
        let bit = index as u64 * u64::from(self.bits);
        let word = (bit / 32) as usize;
        let shift = (bit % 32) as u32;
        let mask = Self::mask(self.bits);

        self.words[word] = (self.words[word] & !(mask << shift)) | (value << shift);

        if shift + self.bits > 32 {
            let spill = shift + self.bits - 32;
            let hi_mask = Self::mask(spill);
            let hi = value >> (32 - shift);
            self.words[word + 1] = (self.words[word + 1] & !hi_mask) | (hi & hi_mask);
        }
    }

    /// Writes `values` into consecutive items starting at `offset`.
    pub fn pack(&mut self, offset: usize, values: &[u32]) {
        debug_assert!(offset + values.len() <= self.count);
        for (i, &value) in values.iter().enumerate() {
            self.set(offset + i, value);
        }
    }

    /// Reads `out.len()` consecutive items starting at `offset` into `out`.
    pub fn unpack(&self, offset: usize, out: &mut [u32]) {
        debug_assert!(offset + out.len() <= self.count);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.get(offset + i);
        }
    }

    /// Unpacks the entire array into a new vector.
    pub fn to_vec(&self) -> Vec<u32> {
        let mut out = vec![0u32; self.count];
        self.unpack(0, &mut out);
        out
    }

    /// Returns the number of bits per item.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns the number of logical items.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if the array has no items.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the raw backing words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Constructs an array from raw parts.
    ///
    /// Returns `None` if `words` does not have exactly the length that
    /// [`word_count`](Self::word_count) prescribes.
    pub fn from_raw(bits: u32, count: usize, words: Vec<u32>) -> Option<Self> {
        if !(1..=32).contains(&bits) || words.len() != Self::word_count(bits, count) {
            return None;
        }
        Some(Self { words, bits, count })
    }

    fn mask(bits: u32) -> u32 {
        if bits >= 32 {
            u32::MAX
        } else {
            (1u32 << bits) - 1
        }
    }
}

/// Returns the minimum bit width able to represent every value in `values`.
///
/// This is `max(1, floor(log2(max)) + 1)`, so an empty slice or an all-zero
/// slice still yields 1.
pub fn compute_bits_per_item(values: &[u32]) -> u32 {
    let max = values.iter().copied().max().unwrap_or(0);
    (32 - max.leading_zeros()).max(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
