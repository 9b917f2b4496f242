//! Sliding window for back-reference decoding.
//!
//! The window keeps the most recent `2^windowBits` bytes of decompressed
//! output. Back-references address it by distance from the newest byte, never
//! by absolute position, so the buffer can wrap freely.

use crate::error::{Error, Result};

/// A ring buffer holding decompression history.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    /// The underlying buffer.
    buffer: Vec<u8>,
    /// Next write position.
    position: usize,
    /// Number of valid history bytes (up to capacity).
    size: usize,
    /// Mask for efficient modulo (capacity - 1).
    mask: usize,
}

impl Default for RingBuffer {
    /// A 32 KiB window, the largest a DEFLATE stream can reference.
    fn default() -> Self {
        Self::allocate(1 << 15)
    }
}

impl RingBuffer {
    /// Create a ring buffer with the specified capacity.
    ///
    /// Returns [`Error::StreamError`] unless `capacity` is a power of 2.
    pub fn new(capacity: usize) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(Error::StreamError);
        }
        Ok(Self::allocate(capacity))
    }

    /// Create a ring buffer of `2^window_bits` bytes, for `window_bits` 8-15.
    pub fn with_window_bits(window_bits: u8) -> Result<Self> {
        if !(8..=15).contains(&window_bits) {
            return Err(Error::StreamError);
        }
        Ok(Self::allocate(1 << window_bits))
    }

    fn allocate(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity],
            position: 0,
            size: 0,
            mask: capacity - 1,
        }
    }

    /// Capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of history bytes a back-reference may reach.
    pub fn len(&self) -> usize {
        self.size
    }

    /// True before anything has been written.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.position = 0;
        self.size = 0;
    }

    /// Append one byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.size <= self.mask {
            self.size += 1;
        }
    }

    /// Append a run of bytes. Only the last `capacity` bytes are retained.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let capacity = self.capacity();
        let bytes = &bytes[bytes.len().saturating_sub(capacity)..];

        let first = bytes.len().min(capacity - self.position);
        self.buffer[self.position..self.position + first].copy_from_slice(&bytes[..first]);
        self.buffer[..bytes.len() - first].copy_from_slice(&bytes[first..]);

        self.position = (self.position + bytes.len()) & self.mask;
        self.size = (self.size + bytes.len()).min(capacity);
    }

    /// Resolve a back-reference: fill `out` with bytes copied from `distance`
    /// back, appending each byte to the history as it is produced.
    ///
    /// The copy runs byte by byte, so a distance shorter than `out` repeats the
    /// most recent bytes: "AB" with distance 2 and 6 bytes yields "ABABAB".
    /// The caller must have checked `distance` against [`len`](Self::len).
    pub fn copy_from_history(&mut self, distance: usize, out: &mut [u8]) {
        debug_assert!(distance >= 1 && distance <= self.size);
        let mut src = self.position.wrapping_sub(distance) & self.mask;

        for slot in out.iter_mut() {
            let byte = self.buffer[src];
            *slot = byte;
            self.buffer[self.position] = byte;
            self.position = (self.position + 1) & self.mask;
            src = (src + 1) & self.mask;
        }
        self.size = (self.size + out.len()).min(self.capacity());
    }
}
