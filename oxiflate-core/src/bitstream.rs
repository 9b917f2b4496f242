//! Bit-level I/O for the deflate bitstream.
//!
//! DEFLATE packs fields LSB-first: the first bit of a field lands in the least
//! significant unused bit of the current byte. Huffman codes are the exception
//! only in that their bits are stored reversed, which the code tables account
//! for, so both reader and writer deal purely in LSB-first fields.
//!
//! Neither type owns the stream. [`BitReader`] is an accumulator that pulls
//! bytes from a [`ZParams`] one at a time and keeps partial bytes across
//! calls, so a decoder can stop in the middle of a symbol and resume on the
//! next call. [`BitWriter`] packs fields into an internal pending buffer that
//! the encoder drains into caller output as space allows.
//!
//! # Example
//!
//! ```
//! use oxiflate_core::bitstream::{BitReader, BitWriter};
//! use oxiflate_core::ZParams;
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0b101, 3);
//! writer.write_bits(0b1100, 4);
//! writer.align_to_byte();
//!
//! let mut packed = [0u8; 4];
//! let mut zp = ZParams::new(&[], &mut packed);
//! assert_eq!(writer.flush_pending(&mut zp), 1);
//!
//! let mut reader = BitReader::new();
//! let mut zp = ZParams::new(&packed[..1], &mut []);
//! assert!(reader.need(&mut zp, 7));
//! assert_eq!(reader.take(3), 0b101);
//! assert_eq!(reader.take(4), 0b1100);
//! ```

use crate::stream::ZParams;

/// Resumable LSB-first bit accumulator.
///
/// Bytes enter the accumulator only when a caller asks for more bits than it
/// holds, so after any field is consumed fewer than eight unread bits remain.
/// Byte-aligned reads (stored blocks, trailers) rely on that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitReader {
    /// Bit buffer, next bit in the least significant position.
    hold: u64,
    /// Number of valid bits in `hold`.
    bits: u32,
}

impl BitReader {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all buffered bits.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of buffered bits.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Raw buffered bits. Bits at or above [`bits`](Self::bits) are zero.
    #[inline]
    pub fn hold(&self) -> u64 {
        self.hold
    }

    /// Pull one byte of input into the accumulator. Returns false when the
    /// input is exhausted.
    #[inline]
    pub fn pull_byte(&mut self, zp: &mut ZParams<'_>) -> bool {
        match zp.next_byte() {
            Some(byte) => {
                self.hold |= (byte as u64) << self.bits;
                self.bits += 8;
                true
            }
            None => false,
        }
    }

    /// Ensure at least `n` bits (at most 32) are buffered, pulling input as
    /// needed. Returns false when input ran out first; the bits pulled so far
    /// stay buffered.
    #[inline]
    pub fn need(&mut self, zp: &mut ZParams<'_>, n: u32) -> bool {
        debug_assert!(n <= 32);
        while self.bits < n {
            if !self.pull_byte(zp) {
                return false;
            }
        }
        true
    }

    /// Look at the low `n` buffered bits without consuming them.
    #[inline]
    pub fn peek(&self, n: u32) -> u32 {
        (self.hold & ((1u64 << n) - 1)) as u32
    }

    /// Drop `n` buffered bits.
    #[inline]
    pub fn drop_bits(&mut self, n: u32) {
        debug_assert!(n <= self.bits);
        self.hold >>= n;
        self.bits -= n;
    }

    /// Consume and return the low `n` buffered bits.
    #[inline]
    pub fn take(&mut self, n: u32) -> u32 {
        let value = self.peek(n);
        self.drop_bits(n);
        value
    }

    /// Discard bits up to the next byte boundary of the input.
    #[inline]
    pub fn align_to_byte(&mut self) {
        self.drop_bits(self.bits & 7);
    }
}

/// LSB-first bit packer writing into an owned pending buffer.
///
/// Whole bytes move to the pending buffer as soon as they are complete, so at
/// most seven bits are ever held back.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    /// Completed bytes not yet handed to the caller.
    pending: Vec<u8>,
    /// Read offset of the first undelivered byte in `pending`.
    start: usize,
    /// Bits not yet forming a whole byte.
    bit_buf: u64,
    /// Number of valid bits in `bit_buf`.
    bit_count: u32,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `capacity` pending bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Discard everything, keeping the allocation.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.start = 0;
        self.bit_buf = 0;
        self.bit_count = 0;
    }

    /// Append the low `count` bits of `value` (`count` at most 32).
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u32) {
        debug_assert!(count <= 32);
        debug_assert!(count == 32 || value >> count == 0);
        self.bit_buf |= (value as u64) << self.bit_count;
        self.bit_count += count;
        while self.bit_count >= 8 {
            self.pending.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
    }

    /// Pad with zero bits to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            self.pending.push(self.bit_buf as u8);
            self.bit_buf = 0;
            self.bit_count = 0;
        }
    }

    /// Append whole bytes. The writer must be byte aligned.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.bit_count, 0);
        self.pending.extend_from_slice(bytes);
    }

    /// Number of bits held back waiting for a full byte.
    #[inline]
    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    /// Number of complete bytes waiting for delivery.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len() - self.start
    }

    /// True if nothing is waiting, including partial bits.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending() == 0 && self.bit_count == 0
    }

    /// Deliver as many pending bytes as fit into `zp`'s output.
    /// Returns the number of bytes delivered.
    pub fn flush_pending(&mut self, zp: &mut ZParams<'_>) -> usize {
        let n = zp.produce(&self.pending[self.start..]);
        self.start += n;
        if self.start == self.pending.len() {
            self.pending.clear();
            self.start = 0;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_lsb_first() {
        let mut writer = BitWriter::new();
        writer.write_bits(1, 1);
        writer.write_bits(0b01, 2);
        writer.write_bits(0x1F, 5);
        assert_eq!(writer.pending(), 1);

        let mut out = [0u8; 1];
        let mut zp = ZParams::new(&[], &mut out);
        writer.flush_pending(&mut zp);
        assert_eq!(out[0], 0b1111_1011);
    }

    #[test]
    fn test_reader_suspends_mid_field() {
        let data = [0xAB, 0xCD];
        let mut reader = BitReader::new();

        let mut zp = ZParams::new(&data[..1], &mut []);
        assert!(!reader.need(&mut zp, 12));
        assert_eq!(reader.bits(), 8);

        let mut zp = ZParams::new(&data[1..], &mut []);
        assert!(reader.need(&mut zp, 12));
        assert_eq!(reader.take(12), 0xDAB);
        assert_eq!(reader.bits(), 4);
        assert_eq!(reader.take(4), 0xC);
    }

    #[test]
    fn test_reader_align() {
        let data = [0xFF, 0x12];
        let mut reader = BitReader::new();
        let mut zp = ZParams::new(&data, &mut []);
        assert!(reader.need(&mut zp, 3));
        reader.drop_bits(3);
        reader.align_to_byte();
        assert_eq!(reader.bits(), 0);
        assert!(reader.need(&mut zp, 8));
        assert_eq!(reader.take(8), 0x12);
    }

    #[test]
    fn test_writer_align_and_bytes() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1, 3);
        writer.align_to_byte();
        writer.write_bytes(&[0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(writer.pending(), 5);
        assert!(!writer.is_empty());
    }

    #[test]
    fn test_flush_pending_partial_delivery() {
        let mut writer = BitWriter::new();
        writer.write_bytes(b"abcdef");

        let mut first = [0u8; 4];
        let mut zp = ZParams::new(&[], &mut first);
        assert_eq!(writer.flush_pending(&mut zp), 4);
        assert_eq!(writer.pending(), 2);

        let mut second = [0u8; 4];
        let mut zp = ZParams::new(&[], &mut second);
        assert_eq!(writer.flush_pending(&mut zp), 2);
        assert!(writer.is_empty());
        assert_eq!(&first, b"abcd");
        assert_eq!(&second[..2], b"ef");
    }

    #[test]
    fn test_write_32_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1, 1);
        writer.write_bits(0xDEAD_BEEF, 32);
        writer.align_to_byte();

        let mut out = [0u8; 5];
        let mut zp = ZParams::new(&[], &mut out);
        writer.flush_pending(&mut zp);

        let mut reader = BitReader::new();
        let mut zp = ZParams::new(&out, &mut []);
        assert!(reader.need(&mut zp, 1));
        assert_eq!(reader.take(1), 1);
        assert!(reader.need(&mut zp, 32));
        assert_eq!(reader.take(32), 0xDEAD_BEEF);
    }
}
