//! Huffman coding for DEFLATE.
//!
//! DEFLATE uses canonical Huffman codes: codes of the same length are
//! assigned consecutive values in symbol order, so a code is fully described
//! by its code lengths.
//!
//! # Alphabets
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)
//! - **Code Length**: 0-18 (for encoding dynamic Huffman trees)
//!
//! The decoder side is [`HuffmanTree`], a resumable table decoder working on a
//! [`BitReader`]. The encoder side is [`HuffmanBuilder`], which turns symbol
//! frequencies into length-limited code lengths, and [`canonical_codes`],
//! which turns code lengths into bit-reversed codes ready for a bit writer.

use crate::tables::LITLEN_TABLE_SIZE;
use oxiflate_core::bitstream::BitReader;
use oxiflate_core::error::{Error, Result};

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: usize = 15;

/// Number of bits resolved by a single table lookup.
const FAST_BITS: u32 = 9;

/// Which code a set of lengths describes. Validation differs per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// The 19-symbol code that encodes the lengths of the other two.
    CodeLengths,
    /// The literal/length code.
    LitLen,
    /// The distance code.
    Distance,
}

/// Result of one decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A symbol and the number of bits its code occupies.
    Symbol {
        /// Decoded symbol.
        symbol: u16,
        /// Code length in bits.
        length: u32,
    },
    /// The buffered bits are a prefix of a longer code.
    NeedBits,
    /// The buffered bits match no code.
    Invalid,
}

/// A Huffman code prepared for decoding.
///
/// Codes up to nine bits resolve with one lookup in a direct table. Longer
/// codes fall back to a canonical walk over the code length counts. Storage is
/// fixed-size so a stream can rebuild its dynamic tables in place for every
/// block without allocating.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    /// Direct lookup: `(symbol, code_length)`, length 0 for "not resolved here".
    fast_table: [(u16, u8); 1 << FAST_BITS],
    /// Number of bits indexing `fast_table`.
    fast_bits: u32,
    /// Longest code length present, 0 for an empty code.
    max_code_length: u32,
    /// Symbols ordered by (code length, symbol).
    symbols: [u16; LITLEN_TABLE_SIZE],
    /// Number of codes of each length.
    counts: [u16; MAX_CODE_LENGTH + 1],
}

impl Default for HuffmanTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HuffmanTree {
    /// An empty code. Every decode attempt on it is [`Decoded::Invalid`].
    pub fn new() -> Self {
        Self {
            fast_table: [(0, 0); 1 << FAST_BITS],
            fast_bits: 0,
            max_code_length: 0,
            symbols: [0; LITLEN_TABLE_SIZE],
            counts: [0; MAX_CODE_LENGTH + 1],
        }
    }

    /// Build a code from code lengths.
    pub fn build(kind: CodeKind, code_lengths: &[u8]) -> Result<Self> {
        let mut tree = Self::new();
        tree.rebuild(kind, code_lengths)?;
        Ok(tree)
    }

    /// Replace this code with the one described by `code_lengths`.
    ///
    /// A set whose codes overflow the code space is
    /// [`Error::OverSubscribedLength`]. A set that leaves code space unused is
    /// [`Error::IncompleteLengthSet`], except that a literal/length or distance
    /// code may consist of a single one-bit code, and may be empty. On error
    /// the tree is left empty.
    pub fn rebuild(&mut self, kind: CodeKind, code_lengths: &[u8]) -> Result<()> {
        debug_assert!(code_lengths.len() <= LITLEN_TABLE_SIZE);
        self.max_code_length = 0;
        self.fast_bits = 0;

        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        for &len in code_lengths {
            if len as usize > MAX_CODE_LENGTH {
                return Err(Error::InvalidCodeLengths);
            }
            counts[len as usize] += 1;
        }
        counts[0] = 0;

        let max_length = (1..=MAX_CODE_LENGTH)
            .rev()
            .find(|&len| counts[len] != 0)
            .unwrap_or(0);

        if max_length == 0 {
            return match kind {
                CodeKind::CodeLengths => Err(Error::IncompleteLengthSet),
                CodeKind::LitLen | CodeKind::Distance => Ok(()),
            };
        }

        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left <<= 1;
            left -= count as i32;
            if left < 0 {
                return Err(Error::OverSubscribedLength);
            }
        }
        if left > 0 && (kind == CodeKind::CodeLengths || max_length != 1) {
            return Err(Error::IncompleteLengthSet);
        }

        // Sort symbols by code length
        let mut offsets = [0u16; MAX_CODE_LENGTH + 2];
        for len in 1..=MAX_CODE_LENGTH {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len != 0 {
                let slot = &mut offsets[len as usize];
                self.symbols[*slot as usize] = symbol as u16;
                *slot += 1;
            }
        }

        // First canonical code of each length (RFC 1951 algorithm)
        let mut next_code = [0u32; MAX_CODE_LENGTH + 1];
        let mut code = 0u32;
        for bits in 1..=MAX_CODE_LENGTH {
            code = (code + counts[bits - 1] as u32) << 1;
            next_code[bits] = code;
        }

        let fast_bits = FAST_BITS.min(max_length as u32);
        let table_size = 1usize << fast_bits;
        self.fast_table[..table_size].fill((0, 0));

        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;

            if len as u32 <= fast_bits {
                // Fill all entries that share this prefix
                let mut index = reverse_bits(code as u16, len) as usize;
                while index < table_size {
                    self.fast_table[index] = (symbol as u16, len);
                    index += 1 << len;
                }
            }
        }

        self.counts = counts;
        self.fast_bits = fast_bits;
        self.max_code_length = max_length as u32;
        Ok(())
    }

    /// Try to decode one symbol from the bits buffered in `reader`.
    ///
    /// Nothing is consumed; on [`Decoded::Symbol`] the caller drops `length`
    /// bits. [`Decoded::NeedBits`] means a byte must be pulled before the
    /// next attempt.
    #[inline]
    pub fn decode(&self, reader: &BitReader) -> Decoded {
        if self.max_code_length == 0 {
            return Decoded::Invalid;
        }
        let bits = reader.bits();
        let hold = reader.hold();

        let (symbol, len) = self.fast_table[(hold & ((1u64 << self.fast_bits) - 1)) as usize];
        if len > 0 {
            return if len as u32 <= bits {
                Decoded::Symbol {
                    symbol,
                    length: len as u32,
                }
            } else {
                Decoded::NeedBits
            };
        }
        if bits < self.fast_bits {
            return Decoded::NeedBits;
        }

        self.decode_slow(hold, bits)
    }

    /// Canonical decode, one bit at a time.
    fn decode_slow(&self, hold: u64, bits: u32) -> Decoded {
        let mut code = 0u32;
        let mut first = 0u32;
        let mut index = 0usize;

        for len in 1..=self.max_code_length {
            if len > bits {
                return Decoded::NeedBits;
            }
            code |= ((hold >> (len - 1)) & 1) as u32;
            let count = self.counts[len as usize] as u32;
            if code < first + count {
                return Decoded::Symbol {
                    symbol: self.symbols[index + (code - first) as usize],
                    length: len,
                };
            }
            index += count as usize;
            first = (first + count) << 1;
            code <<= 1;
        }

        Decoded::Invalid
    }
}

/// An encoder code: bit-reversed so it can go straight to an LSB-first writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Code {
    /// Code bits, first bit in the least significant position.
    pub code: u16,
    /// Code length in bits, 0 for an unused symbol.
    pub len: u8,
}

/// Assign canonical codes for `lengths` into `codes`.
pub fn canonical_codes(lengths: &[u8], codes: &mut [Code]) {
    let mut bl_count = [0u16; MAX_CODE_LENGTH + 1];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u16; MAX_CODE_LENGTH + 1];
    let mut code = 0u16;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    for (slot, &len) in codes.iter_mut().zip(lengths) {
        *slot = if len == 0 {
            Code::default()
        } else {
            let code = next_code[len as usize];
            next_code[len as usize] += 1;
            Code {
                code: reverse_bits(code, len),
                len,
            }
        };
    }
}

/// Reverse the low `length` bits of `code`.
#[inline]
pub fn reverse_bits(code: u16, length: u8) -> u16 {
    if length == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - length as u32)
}

/// Heap capacity: every leaf plus every internal node of the largest code.
const HEAP_SIZE: usize = 2 * crate::tables::LITLEN_CODES + 1;

/// Builder for length-limited code lengths from symbol frequencies.
///
/// This is the classic two-least-frequent merge over a binary heap, with ties
/// broken toward shallower subtrees. When the tree is deeper than the limit,
/// overflowing leaves are moved up and the lengths are redistributed by
/// frequency. At least two symbols always receive a code, since a decoder
/// cannot read a one-symbol code of length zero.
///
/// All scratch space is owned, so building a block's trees never allocates.
#[derive(Debug, Clone)]
pub struct HuffmanBuilder {
    /// 1-based heap in the low slots; the sorted merge order in the high slots.
    heap: [u16; HEAP_SIZE],
    freq: [u32; HEAP_SIZE],
    depth: [u8; HEAP_SIZE],
    parent: [u16; HEAP_SIZE],
    node_len: [u8; HEAP_SIZE],
}

impl Default for HuffmanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HuffmanBuilder {
    /// Create a builder.
    pub fn new() -> Self {
        Self {
            heap: [0; HEAP_SIZE],
            freq: [0; HEAP_SIZE],
            depth: [0; HEAP_SIZE],
            parent: [0; HEAP_SIZE],
            node_len: [0; HEAP_SIZE],
        }
    }

    /// Build code lengths no longer than `max_length` for `freqs`.
    ///
    /// `lengths[i]` receives the length for symbol `i`, 0 if unused. The
    /// resulting code is always complete.
    pub fn build_lengths(&mut self, freqs: &[u32], max_length: u8, lengths: &mut [u8]) {
        let elems = freqs.len();
        debug_assert!((3..=crate::tables::LITLEN_CODES).contains(&elems));
        debug_assert_eq!(lengths.len(), elems);
        lengths.fill(0);

        let mut heap_len = 0usize;
        let mut max_code: Option<usize> = None;
        for (symbol, &freq) in freqs.iter().enumerate() {
            self.freq[symbol] = freq;
            self.depth[symbol] = 0;
            if freq != 0 {
                heap_len += 1;
                self.heap[heap_len] = symbol as u16;
                max_code = Some(symbol);
            }
        }

        // Force at least two codes of non-zero frequency
        while heap_len < 2 {
            let node = match max_code {
                Some(code) if code >= 2 => 0,
                Some(code) => {
                    max_code = Some(code + 1);
                    code + 1
                }
                None => {
                    max_code = Some(0);
                    0
                }
            };
            heap_len += 1;
            self.heap[heap_len] = node as u16;
            self.freq[node] = 1;
            self.depth[node] = 0;
        }
        let max_code = max_code.unwrap_or_default();

        for k in (1..=heap_len / 2).rev() {
            self.sift_down(k, heap_len);
        }

        let mut node = elems;
        let mut heap_max = HEAP_SIZE;
        loop {
            let n = self.heap[1] as usize;
            self.heap[1] = self.heap[heap_len];
            heap_len -= 1;
            self.sift_down(1, heap_len);
            let m = self.heap[1] as usize;

            heap_max -= 1;
            self.heap[heap_max] = n as u16;
            heap_max -= 1;
            self.heap[heap_max] = m as u16;

            self.freq[node] = self.freq[n] + self.freq[m];
            self.depth[node] = self.depth[n].max(self.depth[m]).saturating_add(1);
            self.parent[n] = node as u16;
            self.parent[m] = node as u16;

            self.heap[1] = node as u16;
            node += 1;
            self.sift_down(1, heap_len);

            if heap_len < 2 {
                break;
            }
        }
        heap_max -= 1;
        self.heap[heap_max] = self.heap[1];

        self.assign_lengths(heap_max, max_code, max_length, lengths);
    }

    /// Node `n` sorts before node `m`.
    fn smaller(&self, n: usize, m: usize) -> bool {
        self.freq[n] < self.freq[m] || (self.freq[n] == self.freq[m] && self.depth[n] <= self.depth[m])
    }

    /// Restore the heap property below slot `k`.
    fn sift_down(&mut self, mut k: usize, heap_len: usize) {
        let v = self.heap[k] as usize;
        let mut j = k << 1;
        while j <= heap_len {
            if j < heap_len && self.smaller(self.heap[j + 1] as usize, self.heap[j] as usize) {
                j += 1;
            }
            if self.smaller(v, self.heap[j] as usize) {
                break;
            }
            self.heap[k] = self.heap[j];
            k = j;
            j <<= 1;
        }
        self.heap[k] = v as u16;
    }

    /// Walk the merge order from the root down, clamping at `max_length`.
    fn assign_lengths(&mut self, heap_max: usize, max_code: usize, max_length: u8, lengths: &mut [u8]) {
        let max_length = max_length as usize;
        let mut bl_count = [0u16; MAX_CODE_LENGTH + 1];
        let mut overflow = 0i32;

        self.node_len[self.heap[heap_max] as usize] = 0;
        for h in heap_max + 1..HEAP_SIZE {
            let n = self.heap[h] as usize;
            let mut bits = self.node_len[self.parent[n] as usize] as usize + 1;
            if bits > max_length {
                bits = max_length;
                overflow += 1;
            }
            self.node_len[n] = bits as u8;
            if n > max_code {
                continue;
            }
            bl_count[bits] += 1;
        }

        if overflow > 0 {
            // Move a leaf from the deepest non-full level down one, making
            // room for an overflowing pair one level above the limit.
            while overflow > 0 {
                let mut bits = max_length - 1;
                while bl_count[bits] == 0 {
                    bits -= 1;
                }
                bl_count[bits] -= 1;
                bl_count[bits + 1] += 2;
                bl_count[max_length] -= 1;
                overflow -= 2;
            }

            // Hand the adjusted lengths back out, least frequent first.
            let mut h = HEAP_SIZE;
            for bits in (1..=max_length).rev() {
                let mut n = bl_count[bits];
                while n != 0 {
                    h -= 1;
                    let m = self.heap[h] as usize;
                    if m > max_code {
                        continue;
                    }
                    self.node_len[m] = bits as u8;
                    n -= 1;
                }
            }
        }

        for h in heap_max..HEAP_SIZE {
            let n = self.heap[h] as usize;
            if n <= max_code {
                lengths[n] = self.node_len[n];
            }
        }
    }
}
