//! Block assembly for the deflater.
//!
//! Symbols chosen by the matcher are buffered here, with their frequencies,
//! until a block is cut. Cutting a block builds the dynamic trees, prices the
//! three encodings exactly and writes the cheapest one:
//!
//! - **Stored** when the raw bytes are still in the window and no larger than
//!   the coded form
//! - **Fixed** when the fixed code costs no more than the dynamic code plus
//!   its tree description, or when the strategy demands it
//! - **Dynamic** otherwise
//!
//! All tables are fixed-size arrays owned by the writer, so cutting a block
//! never allocates.

use crate::huffman::{Code, HuffmanBuilder, canonical_codes};
use crate::lz77::Lz77Token;
use crate::tables::{
    CODE_LENGTH_ORDER, CODELEN_CODES, CODELEN_EXTRA_BITS, DIST_CODES, DISTANCE_EXTRA_BITS,
    END_OF_BLOCK, LENGTH_EXTRA_BITS, LITLEN_CODES, MAX_BITS, MAX_BL_BITS, REP_3_6, REPZ_3_10,
    REPZ_11_138, distance_to_code, fixed_distance_codes, fixed_litlen_codes, length_to_code,
};
use oxiflate_core::bitstream::BitWriter;

/// Largest payload of one stored block.
pub const MAX_STORED: usize = 0xFFFF;

/// Block type field values (RFC 1951 Section 3.2.3).
const STORED_BLOCK: u32 = 0;
const FIXED_BLOCK: u32 = 1;
const DYNAMIC_BLOCK: u32 = 2;

/// Code tables a compressed block is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCodes {
    /// The fixed code of RFC 1951 Section 3.2.6.
    Fixed,
    /// The trees built for this block.
    Dynamic,
}

/// How a block may be encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockOptions {
    /// Never use dynamic trees.
    pub force_fixed: bool,
    /// Level 0: no symbols were tallied, store the raw bytes.
    pub stored_only: bool,
    /// Stop after the block header and trees; the symbols follow on
    /// [`BlockWriter::finish_deferred`].
    pub split_trees: bool,
}

/// Symbol buffer and tree builder for the block being assembled.
#[derive(Debug, Clone)]
pub struct BlockWriter {
    symbols: Vec<Lz77Token>,
    /// Symbol count at which the buffer reports full.
    limit: usize,

    litlen_freq: [u32; LITLEN_CODES],
    dist_freq: [u32; DIST_CODES],
    codelen_freq: [u32; CODELEN_CODES],

    litlen_lengths: [u8; LITLEN_CODES],
    dist_lengths: [u8; DIST_CODES],
    codelen_lengths: [u8; CODELEN_CODES],

    litlen_codes: [Code; LITLEN_CODES],
    dist_codes: [Code; DIST_CODES],
    codelen_codes: [Code; CODELEN_CODES],

    /// Run-length coded tree description: (code-length symbol, extra value).
    rle: Vec<(u8, u8)>,
    /// Literal/length codes sent (HLIT + 257).
    hlit: usize,
    /// Distance codes sent (HDIST + 1).
    hdist: usize,
    /// Code-length codes sent (HCLEN + 4).
    hclen: usize,

    builder: HuffmanBuilder,
    /// Tables of a block whose symbols are still to be written.
    deferred: Option<BlockCodes>,
}

impl BlockWriter {
    /// Create a writer buffering up to `lit_bufsize - 1` symbols per block.
    pub fn new(lit_bufsize: usize) -> Self {
        let mut writer = Self {
            symbols: Vec::with_capacity(lit_bufsize),
            limit: lit_bufsize - 1,
            litlen_freq: [0; LITLEN_CODES],
            dist_freq: [0; DIST_CODES],
            codelen_freq: [0; CODELEN_CODES],
            litlen_lengths: [0; LITLEN_CODES],
            dist_lengths: [0; DIST_CODES],
            codelen_lengths: [0; CODELEN_CODES],
            litlen_codes: [Code::default(); LITLEN_CODES],
            dist_codes: [Code::default(); DIST_CODES],
            codelen_codes: [Code::default(); CODELEN_CODES],
            rle: Vec::with_capacity(LITLEN_CODES + DIST_CODES),
            hlit: 0,
            hdist: 0,
            hclen: 0,
            builder: HuffmanBuilder::new(),
            deferred: None,
        };
        writer.init_block();
        writer
    }

    /// Start over with a buffer of `lit_bufsize` symbols.
    pub fn reset(&mut self, lit_bufsize: usize) {
        if self.symbols.capacity() < lit_bufsize {
            self.symbols = Vec::with_capacity(lit_bufsize);
        }
        self.limit = lit_bufsize - 1;
        self.deferred = None;
        self.init_block();
    }

    fn init_block(&mut self) {
        self.symbols.clear();
        self.litlen_freq = [0; LITLEN_CODES];
        self.dist_freq = [0; DIST_CODES];
        self.litlen_freq[END_OF_BLOCK as usize] = 1;
    }

    /// Number of symbols buffered for the current block.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True if no symbol is buffered.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Record a literal. Returns true when the block must be cut.
    #[inline]
    pub fn tally_literal(&mut self, byte: u8) -> bool {
        self.symbols.push(Lz77Token::Literal(byte));
        self.litlen_freq[byte as usize] += 1;
        self.symbols.len() == self.limit
    }

    /// Record a match. Returns true when the block must be cut.
    #[inline]
    pub fn tally_match(&mut self, distance: usize, length: usize) -> bool {
        debug_assert!((3..=258).contains(&length));
        debug_assert!((1..=32768).contains(&distance));
        let (length, distance) = (length as u16, distance as u16);
        self.symbols.push(Lz77Token::Match { length, distance });
        self.litlen_freq[length_to_code(length).0 as usize] += 1;
        self.dist_freq[distance_to_code(distance).0 as usize] += 1;
        self.symbols.len() == self.limit
    }

    /// True if a block's symbols are waiting for [`finish_deferred`](Self::finish_deferred).
    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Cut the current block and write it to `out`.
    ///
    /// `stored` holds the block's source bytes when they are still available,
    /// which makes a stored block possible. A final block is padded to a byte
    /// boundary.
    pub fn flush_block(
        &mut self,
        out: &mut BitWriter,
        stored: Option<&[u8]>,
        last: bool,
        options: BlockOptions,
    ) {
        let stored_len = stored.map_or(0, <[u8]>::len);

        let (opt_lenb, static_lenb) = if options.stored_only {
            (stored_len + 5, stored_len + 5)
        } else {
            let (opt_bits, static_bits) = self.build_trees();
            ((opt_bits + 3 + 7) >> 3, (static_bits + 3 + 7) >> 3)
        };
        let codes = if options.stored_only || options.force_fixed || static_lenb <= opt_lenb {
            BlockCodes::Fixed
        } else {
            BlockCodes::Dynamic
        };
        let best = match codes {
            BlockCodes::Fixed => static_lenb,
            BlockCodes::Dynamic => opt_lenb,
        };

        match stored {
            Some(data) if data.len() + 4 <= best => {
                stored_block(out, data, last);
            }
            _ => {
                let block_type = match codes {
                    BlockCodes::Fixed => FIXED_BLOCK,
                    BlockCodes::Dynamic => DYNAMIC_BLOCK,
                };
                out.write_bits((block_type << 1) | last as u32, 3);
                if codes == BlockCodes::Dynamic {
                    self.send_trees(out);
                }
                if options.split_trees && !last {
                    self.deferred = Some(codes);
                    return;
                }
                self.compress(out, codes);
            }
        }

        self.init_block();
        if last {
            out.align_to_byte();
        }
    }

    /// Write the symbols of a block cut with `split_trees`. Returns false if
    /// there was none.
    pub fn finish_deferred(&mut self, out: &mut BitWriter) -> bool {
        match self.deferred.take() {
            Some(codes) => {
                self.compress(out, codes);
                self.init_block();
                true
            }
            None => false,
        }
    }

    /// Build both trees and the code-length code. Returns the cost in bits
    /// of the symbols with dynamic trees (including the tree description) and
    /// with the fixed code, block header excluded.
    fn build_trees(&mut self) -> (usize, usize) {
        self.builder
            .build_lengths(&self.litlen_freq, MAX_BITS, &mut self.litlen_lengths);
        self.builder
            .build_lengths(&self.dist_freq, MAX_BITS, &mut self.dist_lengths);
        canonical_codes(&self.litlen_lengths, &mut self.litlen_codes);
        canonical_codes(&self.dist_lengths, &mut self.dist_codes);

        let fixed_litlen = fixed_litlen_codes();
        let mut opt_bits = 0usize;
        let mut static_bits = 0usize;

        for (symbol, &freq) in self.litlen_freq.iter().enumerate() {
            if freq == 0 {
                continue;
            }
            let extra = if symbol > END_OF_BLOCK as usize {
                LENGTH_EXTRA_BITS[symbol - 257] as usize
            } else {
                0
            };
            opt_bits += freq as usize * (self.litlen_lengths[symbol] as usize + extra);
            static_bits += freq as usize * (fixed_litlen[symbol].len as usize + extra);
        }
        for (symbol, &freq) in self.dist_freq.iter().enumerate() {
            if freq == 0 {
                continue;
            }
            let extra = DISTANCE_EXTRA_BITS[symbol] as usize;
            opt_bits += freq as usize * (self.dist_lengths[symbol] as usize + extra);
            static_bits += freq as usize * (5 + extra);
        }

        // Tree description
        self.hlit = used_codes(&self.litlen_lengths).max(257);
        self.hdist = used_codes(&self.dist_lengths).max(1);
        let mut combined = [0u8; LITLEN_CODES + DIST_CODES];
        combined[..self.hlit].copy_from_slice(&self.litlen_lengths[..self.hlit]);
        combined[self.hlit..self.hlit + self.hdist]
            .copy_from_slice(&self.dist_lengths[..self.hdist]);
        rle_encode(
            &combined[..self.hlit + self.hdist],
            &mut self.rle,
            &mut self.codelen_freq,
        );

        self.builder
            .build_lengths(&self.codelen_freq, MAX_BL_BITS, &mut self.codelen_lengths);
        canonical_codes(&self.codelen_lengths, &mut self.codelen_codes);

        self.hclen = CODELEN_CODES;
        while self.hclen > 4 && self.codelen_lengths[CODE_LENGTH_ORDER[self.hclen - 1]] == 0 {
            self.hclen -= 1;
        }

        opt_bits += 5 + 5 + 4 + 3 * self.hclen;
        for (symbol, &freq) in self.codelen_freq.iter().enumerate() {
            opt_bits += freq as usize
                * (self.codelen_lengths[symbol] as usize + CODELEN_EXTRA_BITS[symbol] as usize);
        }

        (opt_bits, static_bits)
    }

    /// Write HLIT/HDIST/HCLEN, the code-length code and the coded lengths.
    fn send_trees(&self, out: &mut BitWriter) {
        out.write_bits((self.hlit - 257) as u32, 5);
        out.write_bits((self.hdist - 1) as u32, 5);
        out.write_bits((self.hclen - 4) as u32, 4);

        for &symbol in &CODE_LENGTH_ORDER[..self.hclen] {
            out.write_bits(self.codelen_lengths[symbol] as u32, 3);
        }
        for &(symbol, extra) in &self.rle {
            let code = self.codelen_codes[symbol as usize];
            out.write_bits(code.code as u32, code.len as u32);
            let bits = CODELEN_EXTRA_BITS[symbol as usize];
            if bits > 0 {
                out.write_bits(extra as u32, bits as u32);
            }
        }
    }

    fn compress(&self, out: &mut BitWriter, codes: BlockCodes) {
        match codes {
            BlockCodes::Fixed => compress_block(
                out,
                &self.symbols,
                fixed_litlen_codes(),
                fixed_distance_codes(),
            ),
            BlockCodes::Dynamic => {
                compress_block(out, &self.symbols, &self.litlen_codes, &self.dist_codes)
            }
        }
    }
}

/// Number of codes up to and including the last one in use.
fn used_codes(lengths: &[u8]) -> usize {
    lengths.iter().rposition(|&len| len != 0).map_or(0, |i| i + 1)
}

/// Run-length code a sequence of code lengths with symbols 16, 17 and 18.
///
/// Fills `rle` with `(symbol, extra value)` pairs and `freq` with the number
/// of times each code-length symbol is used.
pub fn rle_encode(lengths: &[u8], rle: &mut Vec<(u8, u8)>, freq: &mut [u32; CODELEN_CODES]) {
    rle.clear();
    freq.fill(0);

    let mut emit = |symbol: u8, extra: usize| {
        rle.push((symbol, extra as u8));
        freq[symbol as usize] += 1;
    };

    let mut i = 0;
    while i < lengths.len() {
        let len = lengths[i];
        let run = lengths[i..].iter().take_while(|&&l| l == len).count();
        i += run;

        if len == 0 {
            let mut left = run;
            while left >= 11 {
                let n = left.min(138);
                emit(REPZ_11_138, n - 11);
                left -= n;
            }
            if left >= 3 {
                emit(REPZ_3_10, left - 3);
                left = 0;
            }
            for _ in 0..left {
                emit(0, 0);
            }
        } else {
            emit(len, 0);
            let mut left = run - 1;
            while left >= 3 {
                let n = left.min(6);
                emit(REP_3_6, n - 3);
                left -= n;
            }
            for _ in 0..left {
                emit(len, 0);
            }
        }
    }
}

/// Write `data` as stored blocks, splitting at [`MAX_STORED`] bytes.
/// Empty data still produces one (empty) block.
pub fn stored_block(out: &mut BitWriter, data: &[u8], last: bool) {
    let mut chunks = data.chunks(MAX_STORED).peekable();
    if chunks.peek().is_none() {
        stored_header(out, 0, last);
        return;
    }
    while let Some(chunk) = chunks.next() {
        stored_header(out, chunk.len(), last && chunks.peek().is_none());
        out.write_bytes(chunk);
    }
}

fn stored_header(out: &mut BitWriter, len: usize, last: bool) {
    out.write_bits((STORED_BLOCK << 1) | last as u32, 3);
    out.align_to_byte();
    let len = len as u16;
    out.write_bytes(&len.to_le_bytes());
    out.write_bytes(&(!len).to_le_bytes());
}

/// Write an empty fixed block: ten bits that let a decoder finish the
/// previous block without byte-aligning the stream.
pub fn align(out: &mut BitWriter) {
    out.write_bits(FIXED_BLOCK << 1, 3);
    let eob = fixed_litlen_codes()[END_OF_BLOCK as usize];
    out.write_bits(eob.code as u32, eob.len as u32);
}

/// Write `symbols` and the end-of-block code.
pub fn compress_block(out: &mut BitWriter, symbols: &[Lz77Token], litlen: &[Code], dist: &[Code]) {
    for token in symbols {
        match *token {
            Lz77Token::Literal(byte) => {
                let code = litlen[byte as usize];
                out.write_bits(code.code as u32, code.len as u32);
            }
            Lz77Token::Match { length, distance } => {
                let (symbol, extra_bits, extra) = length_to_code(length);
                let code = litlen[symbol as usize];
                out.write_bits(code.code as u32, code.len as u32);
                if extra_bits > 0 {
                    out.write_bits(extra as u32, extra_bits as u32);
                }

                let (symbol, extra_bits, extra) = distance_to_code(distance);
                let code = dist[symbol as usize];
                out.write_bits(code.code as u32, code.len as u32);
                if extra_bits > 0 {
                    out.write_bits(extra as u32, extra_bits as u32);
                }
            }
        }
    }
    let eob = litlen[END_OF_BLOCK as usize];
    out.write_bits(eob.code as u32, eob.len as u32);
}
