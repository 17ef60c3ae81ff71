//! Piece bitmap.
//!
//! A fixed-size set of piece indices, one bit per piece. The same type backs
//! the storage engine's record of verified pieces, the wire protocol's
//! `bitfield` message and the persisted session's `pieceMap`.

use bytes::Bytes;

/// A bitfield with one bit per piece.
///
/// Bits are numbered from the high bit of the first byte, which is the order
/// used on the wire. Spare bits past the last piece are always zero. The size
/// is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitfield {
    bits: Vec<u8>,
    piece_count: usize,
}

impl Bitfield {
    /// Creates an empty bitfield (no piece present).
    pub fn new(piece_count: usize) -> Self {
        Self {
            bits: vec![0; piece_count.div_ceil(8)],
            piece_count,
        }
    }

    /// Creates a full bitfield (every piece present).
    pub fn full(piece_count: usize) -> Self {
        let mut bf = Self::new(piece_count);
        bf.fill(true);
        bf
    }

    /// Creates a bitfield from raw bytes.
    ///
    /// Returns `None` if `bytes` is too short to hold `piece_count` bits.
    /// Extra bytes and spare bits are discarded.
    pub fn from_bytes(bytes: &[u8], piece_count: usize) -> Option<Self> {
        let byte_count = piece_count.div_ceil(8);
        if bytes.len() < byte_count {
            return None;
        }

        let mut bf = Self {
            bits: bytes[..byte_count].to_vec(),
            piece_count,
        };
        bf.clear_spare_bits();
        Some(bf)
    }

    /// Returns true if the piece at the given index is present.
    pub fn has(&self, index: usize) -> bool {
        if index >= self.piece_count {
            return false;
        }
        (self.bits[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    /// Sets the bit for the piece at the given index. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize) {
        if index < self.piece_count {
            self.bits[index / 8] |= 1 << (7 - index % 8);
        }
    }

    /// Clears the bit for the piece at the given index. Out-of-range indices are ignored.
    pub fn clear(&mut self, index: usize) {
        if index < self.piece_count {
            self.bits[index / 8] &= !(1 << (7 - index % 8));
        }
    }

    /// Sets or clears every bit.
    pub fn fill(&mut self, value: bool) {
        let byte = if value { 0xFF } else { 0x00 };
        self.bits.iter_mut().for_each(|b| *b = byte);
        self.clear_spare_bits();
    }

    /// Sets or clears every bit in `range`, clamped to the piece count.
    pub fn fill_range(&mut self, range: std::ops::Range<usize>, value: bool) {
        for index in range.start..range.end.min(self.piece_count) {
            if value {
                self.set(index);
            } else {
                self.clear(index);
            }
        }
    }

    /// Returns the number of pieces present.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.count() == self.piece_count
    }

    /// Returns true if no piece is present.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    pub fn len(&self) -> usize {
        self.piece_count
    }

    /// Iterates over every bit in piece order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.piece_count).map(|i| self.has(i))
    }

    /// Iterates over the indices of present pieces.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.piece_count).filter(|&i| self.has(i))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.bits)
    }

    fn clear_spare_bits(&mut self) {
        let spare = self.bits.len() * 8 - self.piece_count;
        if spare > 0 {
            if let Some(last) = self.bits.last_mut() {
                *last &= 0xFFu8 << spare;
            }
        }
    }
}
