//! DEFLATE decompression (inflate) as a resumable state machine.
//!
//! An [`Inflater`] is driven by repeated [`write`](Inflater::write) calls,
//! each given whatever input and output space the caller has. When either
//! runs out the call returns with every piece of progress stored in the
//! inflater: the partial bit accumulator, the tree being read, the match
//! being copied. The next call picks up exactly there.
//!
//! ```text
//! header ─► type ─┬─► stored ─► copy ──────────────┐
//!                 ├─► table ─► lenlens ─► codelens ─┤
//!                 └─► (fixed) ──────────────────────┴─► len ⇄ dist ─► match/lit
//!                                                        │
//!                          type ◄── end of block ◄──────┘
//!                          └─(last)─► check ─► length ─► done
//! ```
//!
//! # Example
//!
//! ```
//! use oxiflate::Inflater;
//! use oxiflate_core::{Error, Flush, Wrap, ZParams};
//!
//! // A stored block holding "Hello"
//! let input = [0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o'];
//! let mut output = [0u8; 16];
//!
//! let mut inflater = Inflater::new();
//! inflater.reset(15, Wrap::None).unwrap();
//! let mut zp = ZParams::new(&input, &mut output);
//! assert_eq!(inflater.write(&mut zp, Flush::None), Err(Error::EndOfStream));
//! assert_eq!(zp.total_out, 5);
//! assert_eq!(&output[..5], b"Hello");
//! ```

use crate::header::{TrailerCheck, check_gzip_method, flags, parse_zlib_header};
use crate::huffman::{CodeKind, Decoded, HuffmanTree};
use crate::tables::{
    CODE_LENGTH_ORDER, CODELEN_CODES, CODELEN_EXTRA_BITS, DIST_CODES, END_OF_BLOCK,
    LITLEN_CODES, distance_base, fixed_distance_tree, fixed_litlen_tree, length_base,
};
use oxiflate_core::bitstream::BitReader;
use oxiflate_core::checksum::{Adler32, Crc32};
use oxiflate_core::error::{Error, Result};
use oxiflate_core::stream::{Flush, Wrap, ZParams};
use oxiflate_core::window::RingBuffer;

/// Where the decoder is in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Nothing read yet.
    Head,
    GzipFlags,
    GzipTime,
    GzipOs,
    GzipExtraLen,
    GzipExtra,
    GzipName,
    GzipComment,
    GzipHcrc,
    /// zlib dictionary id.
    DictId,
    /// Waiting for [`Inflater::set_dictionary`].
    Dict,
    /// At a block boundary; `Block` and `Trees` flushes stop here.
    Type,
    /// At a block boundary, reading the block header.
    TypeDo,
    /// Stored block length and its complement.
    Stored,
    /// Copying stored bytes.
    Copy,
    /// Dynamic block counts.
    Table,
    /// Code-length code lengths.
    LenLens,
    /// Literal/length and distance code lengths.
    CodeLens,
    /// Literal/length symbol.
    Len,
    /// Distance symbol.
    Dist,
    /// Copying a back-reference.
    Match,
    /// Writing a decoded literal.
    Lit,
    /// Trailer checksum.
    Check,
    /// gzip trailer length.
    Length,
    /// End of stream reached.
    Done,
    /// A data error was found; it is reported until the next reset.
    Bad(Error),
    /// The last reset was rejected.
    Invalid,
}

/// Streaming DEFLATE decompressor with optional zlib or gzip framing.
#[derive(Debug, Clone)]
pub struct Inflater {
    mode: Mode,
    wrap: Wrap,
    window_bits: u8,
    /// The block being decoded is the last one.
    last: bool,

    bits: BitReader,
    window: RingBuffer,
    check: TrailerCheck,

    gzip_flags: u8,
    head_crc: Crc32,
    dict_id: Option<u32>,
    have_dict: bool,

    /// Decode with the fixed code instead of the dynamic trees.
    fixed: bool,
    nlen: usize,
    ndist: usize,
    ncode: usize,
    /// Code lengths read so far.
    have: usize,
    codelen_lens: [u8; CODELEN_CODES],
    lens: [u8; LITLEN_CODES + DIST_CODES],
    codelen_tree: HuffmanTree,
    litlen_tree: HuffmanTree,
    dist_tree: HuffmanTree,

    /// Bytes left in a stored block, a match or a gzip extra field.
    length: usize,
    distance: usize,
    literal: u8,

    total_in: u64,
    total_out: u64,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    /// Create an inflater for zlib streams with a 32 KiB window.
    pub fn new() -> Self {
        Self {
            mode: Mode::Head,
            wrap: Wrap::Zlib,
            window_bits: 15,
            last: false,
            bits: BitReader::new(),
            window: RingBuffer::default(),
            check: TrailerCheck::new(Wrap::Zlib),
            gzip_flags: 0,
            head_crc: Crc32::new(),
            dict_id: None,
            have_dict: false,
            fixed: false,
            nlen: 0,
            ndist: 0,
            ncode: 0,
            have: 0,
            codelen_lens: [0; CODELEN_CODES],
            lens: [0; LITLEN_CODES + DIST_CODES],
            codelen_tree: HuffmanTree::new(),
            litlen_tree: HuffmanTree::new(),
            dist_tree: HuffmanTree::new(),
            length: 0,
            distance: 0,
            literal: 0,
            total_in: 0,
            total_out: 0,
        }
    }

    /// Prepare for a new stream.
    ///
    /// `window_bits` (8-15) sizes the history window and must be at least the
    /// encoder's. Out of range values return [`Error::StreamError`] and leave
    /// the inflater unusable until a valid reset.
    pub fn reset(&mut self, window_bits: u8, wrap: Wrap) -> Result<()> {
        if !(8..=15).contains(&window_bits) {
            self.mode = Mode::Invalid;
            return Err(Error::StreamError);
        }

        if self.window.capacity() != 1 << window_bits {
            self.window = RingBuffer::with_window_bits(window_bits)?;
        } else {
            self.window.clear();
        }
        self.mode = Mode::Head;
        self.wrap = wrap;
        self.window_bits = window_bits;
        self.last = false;
        self.bits.reset();
        self.check = TrailerCheck::new(wrap);
        self.gzip_flags = 0;
        self.head_crc.reset();
        self.dict_id = None;
        self.have_dict = false;
        self.fixed = false;
        self.have = 0;
        self.length = 0;
        self.total_in = 0;
        self.total_out = 0;
        Ok(())
    }

    /// Decompress from `zp.next_in` into `zp.next_out`.
    ///
    /// Returns `Ok(())` when progress was made. Otherwise:
    ///
    /// - [`Error::EndOfStream`] once the stream (and its trailer) is complete
    /// - [`Error::NeedBuffers`] when no progress was possible, or when
    ///   `Flush::Finish` was requested and the stream is not complete
    /// - [`Error::NeedDict`] when a zlib header asks for a preset dictionary
    /// - a data error for malformed input, repeated by every later call
    ///
    /// `Flush::Block` stops at the next block boundary. `Flush::Trees` also
    /// stops right after a block's code tables are ready.
    pub fn write(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> Result<()> {
        let (avail_in, avail_out) = (zp.avail_in(), zp.avail_out());
        let result = self.run(zp, flush);

        let consumed = (avail_in - zp.avail_in()) as u64;
        let produced = (avail_out - zp.avail_out()) as u64;
        self.total_in += consumed;
        self.total_out += produced;

        match result {
            Ok(()) if (consumed == 0 && produced == 0) || flush == Flush::Finish => {
                Err(Error::NeedBuffers)
            }
            Err(e) if e.is_data_error() => {
                self.mode = Mode::Bad(e);
                Err(e)
            }
            other => other,
        }
    }

    /// Install a preset dictionary.
    ///
    /// For zlib streams this is only valid after [`write`](Self::write)
    /// returned [`Error::NeedDict`], and the dictionary's Adler-32 must match
    /// the id in the header. Raw streams accept a dictionary at any time.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<()> {
        match (self.wrap, self.mode) {
            (Wrap::Zlib, Mode::Dict) => {
                if Some(Adler32::compute(dictionary)) != self.dict_id {
                    return Err(Error::IncorrectDataCheck);
                }
            }
            (Wrap::None, mode) if !matches!(mode, Mode::Bad(_) | Mode::Invalid) => {}
            _ => return Err(Error::StreamError),
        }
        self.window.write_bytes(dictionary);
        self.have_dict = true;
        Ok(())
    }

    /// Dictionary id announced by a zlib header.
    pub fn dictionary_id(&self) -> Option<u32> {
        self.dict_id
    }

    /// Running checksum of the output: CRC-32 for gzip, Adler-32 otherwise.
    pub fn adler(&self) -> u32 {
        self.check.value()
    }

    /// Total compressed bytes consumed since the last reset.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total decompressed bytes produced since the last reset.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// True once the end of the stream has been reached.
    pub fn is_finished(&self) -> bool {
        self.mode == Mode::Done
    }

    fn litlen_tree(&self) -> Result<&HuffmanTree> {
        if self.fixed {
            fixed_litlen_tree()
        } else {
            Ok(&self.litlen_tree)
        }
    }

    fn dist_tree(&self) -> Result<&HuffmanTree> {
        if self.fixed {
            fixed_distance_tree()
        } else {
            Ok(&self.dist_tree)
        }
    }

    /// Take a whole-byte header field of `n` bytes, feeding it to the header CRC.
    fn header_field(&mut self, zp: &mut ZParams<'_>, n: u32) -> Option<u32> {
        if !self.bits.need(zp, 8 * n) {
            return None;
        }
        let value = self.bits.take(8 * n);
        self.head_crc.update(&value.to_le_bytes()[..n as usize]);
        Some(value)
    }

    /// Skip a NUL-terminated gzip field. Returns false if input ran out first.
    fn skip_string(&mut self, zp: &mut ZParams<'_>) -> bool {
        while let Some(byte) = zp.next_byte() {
            self.head_crc.update(&[byte]);
            if byte == 0 {
                return true;
            }
        }
        false
    }

    fn run(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> Result<()> {
        if self.mode == Mode::Type {
            self.mode = Mode::TypeDo;
        }

        loop {
            match self.mode {
                Mode::Head => match self.wrap {
                    Wrap::None => self.mode = Mode::TypeDo,
                    Wrap::Zlib => {
                        if !self.bits.need(zp, 16) {
                            return Ok(());
                        }
                        let word = self.bits.take(16);
                        let info = parse_zlib_header(word as u8, (word >> 8) as u8, self.window_bits)?;
                        self.check.reset();
                        self.mode = if info.has_dictionary {
                            Mode::DictId
                        } else {
                            Mode::Type
                        };
                    }
                    Wrap::Gzip => {
                        self.head_crc.reset();
                        let Some(magic) = self.header_field(zp, 2) else {
                            return Ok(());
                        };
                        if magic != 0x8B1F {
                            return Err(Error::IncorrectHeaderCheck);
                        }
                        self.mode = Mode::GzipFlags;
                    }
                },

                Mode::GzipFlags => {
                    let Some(word) = self.header_field(zp, 2) else {
                        return Ok(());
                    };
                    let flag_byte = (word >> 8) as u8;
                    check_gzip_method(word as u8, flag_byte)?;
                    self.gzip_flags = flag_byte;
                    self.mode = Mode::GzipTime;
                }
                Mode::GzipTime => {
                    if self.header_field(zp, 4).is_none() {
                        return Ok(());
                    }
                    self.mode = Mode::GzipOs;
                }
                Mode::GzipOs => {
                    if self.header_field(zp, 2).is_none() {
                        return Ok(());
                    }
                    self.mode = Mode::GzipExtraLen;
                }
                Mode::GzipExtraLen => {
                    self.length = 0;
                    if self.gzip_flags & flags::FEXTRA != 0 {
                        let Some(len) = self.header_field(zp, 2) else {
                            return Ok(());
                        };
                        self.length = len as usize;
                    }
                    self.mode = Mode::GzipExtra;
                }
                Mode::GzipExtra => {
                    while self.length > 0 {
                        let data = zp.consume(self.length);
                        if data.is_empty() {
                            return Ok(());
                        }
                        self.head_crc.update(data);
                        self.length -= data.len();
                    }
                    self.mode = Mode::GzipName;
                }
                Mode::GzipName => {
                    if self.gzip_flags & flags::FNAME != 0 && !self.skip_string(zp) {
                        return Ok(());
                    }
                    self.mode = Mode::GzipComment;
                }
                Mode::GzipComment => {
                    if self.gzip_flags & flags::FCOMMENT != 0 && !self.skip_string(zp) {
                        return Ok(());
                    }
                    self.mode = Mode::GzipHcrc;
                }
                Mode::GzipHcrc => {
                    if self.gzip_flags & flags::FHCRC != 0 {
                        let expected = self.head_crc.value() & 0xFFFF;
                        if !self.bits.need(zp, 16) {
                            return Ok(());
                        }
                        if self.bits.take(16) != expected {
                            return Err(Error::HeaderCrcMismatch);
                        }
                    }
                    self.check.reset();
                    self.mode = Mode::Type;
                }

                Mode::DictId => {
                    if !self.bits.need(zp, 32) {
                        return Ok(());
                    }
                    self.dict_id = Some(self.bits.take(32).swap_bytes());
                    self.mode = Mode::Dict;
                }
                Mode::Dict => {
                    if !self.have_dict {
                        return Err(Error::NeedDict);
                    }
                    self.check.reset();
                    self.mode = Mode::Type;
                }

                Mode::Type => {
                    if matches!(flush, Flush::Block | Flush::Trees) {
                        return Ok(());
                    }
                    self.mode = Mode::TypeDo;
                }
                Mode::TypeDo => {
                    if self.last {
                        self.bits.align_to_byte();
                        self.mode = Mode::Check;
                        continue;
                    }
                    if !self.bits.need(zp, 3) {
                        return Ok(());
                    }
                    self.last = self.bits.take(1) == 1;
                    match self.bits.take(2) {
                        0 => self.mode = Mode::Stored,
                        1 => {
                            self.fixed = true;
                            self.mode = Mode::Len;
                            if flush == Flush::Trees {
                                return Ok(());
                            }
                        }
                        2 => self.mode = Mode::Table,
                        _ => return Err(Error::InvalidBlockType),
                    }
                }

                Mode::Stored => {
                    self.bits.align_to_byte();
                    if !self.bits.need(zp, 32) {
                        return Ok(());
                    }
                    let word = self.bits.take(32);
                    if word & 0xFFFF != (word >> 16) ^ 0xFFFF {
                        return Err(Error::InvalidStoredLength);
                    }
                    self.length = (word & 0xFFFF) as usize;
                    self.mode = Mode::Copy;
                    if flush == Flush::Trees {
                        return Ok(());
                    }
                }
                Mode::Copy => {
                    while self.length > 0 {
                        let n = self.length.min(zp.avail_in()).min(zp.avail_out());
                        if n == 0 {
                            return Ok(());
                        }
                        let data = zp.consume(n);
                        zp.produce(data);
                        self.window.write_bytes(data);
                        self.check.update(data);
                        self.length -= n;
                    }
                    self.mode = Mode::Type;
                }

                Mode::Table => {
                    if !self.bits.need(zp, 14) {
                        return Ok(());
                    }
                    self.nlen = self.bits.take(5) as usize + 257;
                    self.ndist = self.bits.take(5) as usize + 1;
                    self.ncode = self.bits.take(4) as usize + 4;
                    if self.nlen > LITLEN_CODES || self.ndist > DIST_CODES {
                        return Err(Error::TooManySymbols);
                    }
                    self.have = 0;
                    self.mode = Mode::LenLens;
                }
                Mode::LenLens => {
                    while self.have < self.ncode {
                        if !self.bits.need(zp, 3) {
                            return Ok(());
                        }
                        self.codelen_lens[CODE_LENGTH_ORDER[self.have]] = self.bits.take(3) as u8;
                        self.have += 1;
                    }
                    for &symbol in &CODE_LENGTH_ORDER[self.ncode..] {
                        self.codelen_lens[symbol] = 0;
                    }
                    self.codelen_tree
                        .rebuild(CodeKind::CodeLengths, &self.codelen_lens)?;
                    self.have = 0;
                    self.mode = Mode::CodeLens;
                }
                Mode::CodeLens => {
                    let total = self.nlen + self.ndist;
                    while self.have < total {
                        let (symbol, length) = match self.codelen_tree.decode(&self.bits) {
                            Decoded::Symbol { symbol, length } => (symbol as usize, length),
                            Decoded::NeedBits => {
                                if !self.bits.pull_byte(zp) {
                                    return Ok(());
                                }
                                continue;
                            }
                            Decoded::Invalid => return Err(Error::InvalidCodeLengths),
                        };

                        if symbol < 16 {
                            self.bits.drop_bits(length);
                            self.lens[self.have] = symbol as u8;
                            self.have += 1;
                            continue;
                        }

                        let extra = CODELEN_EXTRA_BITS[symbol] as u32;
                        if !self.bits.need(zp, length + extra) {
                            return Ok(());
                        }
                        self.bits.drop_bits(length);
                        let (value, count) = match symbol {
                            16 => {
                                if self.have == 0 {
                                    return Err(Error::InvalidBitLengthRepeat);
                                }
                                (self.lens[self.have - 1], 3 + self.bits.take(2) as usize)
                            }
                            17 => (0, 3 + self.bits.take(3) as usize),
                            _ => (0, 11 + self.bits.take(7) as usize),
                        };
                        if self.have + count > total {
                            return Err(Error::InvalidBitLengthRepeat);
                        }
                        self.lens[self.have..self.have + count].fill(value);
                        self.have += count;
                    }

                    if self.lens[END_OF_BLOCK as usize] == 0 {
                        return Err(Error::MissingEob);
                    }
                    let (litlen, dist) = self.lens[..total].split_at(self.nlen);
                    self.litlen_tree.rebuild(CodeKind::LitLen, litlen)?;
                    self.dist_tree.rebuild(CodeKind::Distance, dist)?;
                    self.fixed = false;
                    self.mode = Mode::Len;
                    if flush == Flush::Trees {
                        return Ok(());
                    }
                }

                Mode::Len => {
                    let (symbol, length) = match self.litlen_tree()?.decode(&self.bits) {
                        Decoded::Symbol { symbol, length } => (symbol, length),
                        Decoded::NeedBits => {
                            if !self.bits.pull_byte(zp) {
                                return Ok(());
                            }
                            continue;
                        }
                        Decoded::Invalid => return Err(Error::InvalidLiteralLength),
                    };

                    if symbol < END_OF_BLOCK {
                        self.bits.drop_bits(length);
                        self.literal = symbol as u8;
                        self.mode = Mode::Lit;
                        continue;
                    }
                    if symbol == END_OF_BLOCK {
                        self.bits.drop_bits(length);
                        self.mode = Mode::Type;
                        continue;
                    }
                    if symbol as usize >= LITLEN_CODES {
                        return Err(Error::InvalidLiteralLength);
                    }

                    let (base, extra) = length_base(symbol);
                    if !self.bits.need(zp, length + extra as u32) {
                        return Ok(());
                    }
                    self.bits.drop_bits(length);
                    self.length = base as usize + self.bits.take(extra as u32) as usize;
                    self.mode = Mode::Dist;
                }
                Mode::Dist => {
                    let (symbol, length) = match self.dist_tree()?.decode(&self.bits) {
                        Decoded::Symbol { symbol, length } => (symbol, length),
                        Decoded::NeedBits => {
                            if !self.bits.pull_byte(zp) {
                                return Ok(());
                            }
                            continue;
                        }
                        Decoded::Invalid => return Err(Error::InvalidDistanceCode),
                    };
                    if symbol as usize >= DIST_CODES {
                        return Err(Error::InvalidDistanceCode);
                    }

                    let (base, extra) = distance_base(symbol);
                    if !self.bits.need(zp, length + extra as u32) {
                        return Ok(());
                    }
                    self.bits.drop_bits(length);
                    self.distance = base as usize + self.bits.take(extra as u32) as usize;
                    if self.distance > self.window.len() {
                        return Err(Error::InvalidDistance);
                    }
                    self.mode = Mode::Match;
                }
                Mode::Match => {
                    while self.length > 0 {
                        let n = self.length.min(zp.avail_out());
                        if n == 0 {
                            return Ok(());
                        }
                        let (window, check, distance) =
                            (&mut self.window, &mut self.check, self.distance);
                        zp.produce_with(n, |out| {
                            window.copy_from_history(distance, out);
                            check.update(out);
                        });
                        self.length -= n;
                    }
                    self.mode = Mode::Len;
                }
                Mode::Lit => {
                    if !zp.push_byte(self.literal) {
                        return Ok(());
                    }
                    self.window.write_byte(self.literal);
                    self.check.update(&[self.literal]);
                    self.mode = Mode::Len;
                }

                Mode::Check => {
                    if self.wrap == Wrap::None {
                        self.mode = Mode::Done;
                        continue;
                    }
                    if !self.bits.need(zp, 32) {
                        return Ok(());
                    }
                    self.check.verify_check(self.bits.take(32))?;
                    self.mode = if self.wrap == Wrap::Gzip {
                        Mode::Length
                    } else {
                        Mode::Done
                    };
                }
                Mode::Length => {
                    if !self.bits.need(zp, 32) {
                        return Ok(());
                    }
                    self.check.verify_length(self.bits.take(32))?;
                    self.mode = Mode::Done;
                }

                Mode::Done => return Err(Error::EndOfStream),
                Mode::Bad(e) => return Err(e),
                Mode::Invalid => return Err(Error::StreamError),
            }
        }
    }
}
