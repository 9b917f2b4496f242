//! DEFLATE compression (deflate) as a resumable state machine.
//!
//! A [`Deflater`] accepts input in whatever pieces the caller has and
//! produces output into whatever space it is given. Input is pulled into the
//! matcher's window, turned into literals and matches, and buffered as
//! symbols until a block is cut. Encoded bytes wait in a pending buffer until
//! the caller supplies output space.
//!
//! Levels pick the matching routine:
//!
//! | level | routine |
//! |---|---|
//! | 0 | stored blocks only |
//! | 1-3 | greedy: take the first acceptable match |
//! | 4-9 | lazy: check one byte ahead for a longer match |
//!
//! `Strategy::Huffman` and `Strategy::Rle` replace the routine whatever the
//! level. The flush argument of [`write`](Deflater::write) controls how much
//! of the buffered state is forced out.
//!
//! # Example
//!
//! ```
//! use oxiflate::Deflater;
//! use oxiflate_core::{Error, Flush, ZParams};
//!
//! let mut deflater = Deflater::new();
//! let mut output = [0u8; 64];
//! let mut zp = ZParams::new(b"hello hello hello", &mut output);
//! assert_eq!(deflater.write(&mut zp, Flush::Finish), Err(Error::EndOfStream));
//! let len = zp.total_out as usize;
//! assert_eq!(&output[..2], &[0x78, 0x9C]);
//! assert!(len < 17 + 6);
//! ```

use crate::block::{BlockOptions, BlockWriter, MAX_STORED, align, stored_block};
use crate::header::{GzipHeader, TrailerCheck, ZlibLevel, encode_zlib_header, gzip_xfl};
use crate::lz77::{MIN_LOOKAHEAD, MatchMode, Matcher, level_config};
use crate::tables::{MAX_MATCH, MIN_MATCH};
use oxiflate_core::bitstream::BitWriter;
use oxiflate_core::checksum::Adler32;
use oxiflate_core::error::{Error, Result};
use oxiflate_core::stream::{Flush, Strategy, Wrap, ZParams};

/// Compression level used by [`Deflater::new`].
pub const DEFAULT_LEVEL: u8 = 6;

/// Hash and symbol buffer size used by [`Deflater::new`].
pub const DEFAULT_MEM_LEVEL: u8 = 8;

/// Lazy matching drops length-3 matches farther back than this.
const TOO_FAR: usize = 4096;

/// Lifecycle of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    /// Header not written yet.
    Init,
    /// Compressing.
    Busy,
    /// The final block has been cut.
    Finish,
    /// The last reset was rejected.
    Invalid,
}

/// Outcome of one run of a matching routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    /// More input or output space is needed.
    NeedMore,
    /// A flush finished the current block.
    BlockDone,
    /// The final block was cut but not fully delivered.
    FinishStarted,
    /// The final block was cut and delivered.
    FinishDone,
}

/// Streaming DEFLATE compressor with optional zlib or gzip framing.
#[derive(Debug, Clone)]
pub struct Deflater {
    status: Status,
    level: u8,
    window_bits: u8,
    mem_level: u8,
    strategy: Strategy,
    wrap: Wrap,
    mode: MatchMode,
    /// Symbols per block (`2^(mem_level + 6)`).
    lit_bufsize: usize,

    matcher: Matcher,
    blocks: BlockWriter,
    out: BitWriter,
    check: TrailerCheck,

    gzip_header: Option<GzipHeader>,
    dict_id: Option<u32>,
    /// Flush of the previous call; `None` after a call that filled the output.
    last_flush: Option<Flush>,
    trailer_written: bool,

    total_in: u64,
    total_out: u64,
}

impl Default for Deflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Deflater {
    /// Create a zlib deflater at the default level with a 32 KiB window.
    pub fn new() -> Self {
        Self::build(DEFAULT_LEVEL, 15, DEFAULT_MEM_LEVEL, Strategy::Normal, Wrap::Zlib)
    }

    fn build(level: u8, window_bits: u8, mem_level: u8, strategy: Strategy, wrap: Wrap) -> Self {
        let lit_bufsize = 1usize << (mem_level + 6);
        let (config, mode) = level_config(level);
        let mut matcher = Matcher::new(window_bits, mem_level);
        matcher.config = config;

        Self {
            status: Status::Init,
            level,
            window_bits,
            mem_level,
            strategy,
            wrap,
            mode,
            lit_bufsize,
            matcher,
            blocks: BlockWriter::new(lit_bufsize),
            out: BitWriter::with_capacity(lit_bufsize * 4),
            check: TrailerCheck::new(wrap),
            gzip_header: None,
            dict_id: None,
            last_flush: None,
            trailer_written: false,
            total_in: 0,
            total_out: 0,
        }
    }

    /// Prepare for a new stream.
    ///
    /// - `level`: 0 (store) to 9 (best)
    /// - `window_bits`: 8-15; 8 is raised to 9
    /// - `mem_level`: 1-9, sizing the hash table and the block symbol buffer
    ///
    /// Out of range values return [`Error::StreamError`] and leave the
    /// deflater unusable until a valid reset.
    pub fn reset(
        &mut self,
        level: u8,
        window_bits: u8,
        mem_level: u8,
        strategy: Strategy,
        wrap: Wrap,
    ) -> Result<()> {
        if level > 9 || !(8..=15).contains(&window_bits) || !(1..=9).contains(&mem_level) {
            self.status = Status::Invalid;
            return Err(Error::StreamError);
        }
        let window_bits = window_bits.max(9);

        if window_bits != self.window_bits || mem_level != self.mem_level {
            *self = Self::build(level, window_bits, mem_level, strategy, wrap);
            return Ok(());
        }

        let (config, mode) = level_config(level);
        self.matcher.reset();
        self.matcher.config = config;
        self.blocks.reset(self.lit_bufsize);
        self.out.reset();
        self.check = TrailerCheck::new(wrap);

        self.status = Status::Init;
        self.level = level;
        self.strategy = strategy;
        self.wrap = wrap;
        self.mode = mode;
        self.gzip_header = None;
        self.dict_id = None;
        self.last_flush = None;
        self.trailer_written = false;
        self.total_in = 0;
        self.total_out = 0;
        Ok(())
    }

    /// Install a preset dictionary before the first [`write`](Self::write).
    ///
    /// Only the last window-size bytes are used. Returns the dictionary's
    /// Adler-32, which a zlib header then announces. gzip streams cannot
    /// carry a dictionary.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<u32> {
        if self.status != Status::Init || self.wrap == Wrap::Gzip {
            return Err(Error::StreamError);
        }
        let id = Adler32::compute(dictionary);

        self.matcher.reset();
        self.matcher.set_dictionary(dictionary);
        if self.wrap == Wrap::Zlib {
            self.dict_id = Some(id);
        }
        Ok(id)
    }

    /// Set the header fields of a gzip stream before the first
    /// [`write`](Self::write).
    pub fn set_gzip_header(&mut self, header: GzipHeader) -> Result<()> {
        if self.status != Status::Init || self.wrap != Wrap::Gzip {
            return Err(Error::StreamError);
        }
        self.gzip_header = Some(header);
        Ok(())
    }

    /// Upper bound of the compressed size of `source_len` bytes written with
    /// a single `Flush::Finish`, framing included.
    pub fn bound(&self, source_len: usize) -> usize {
        let wrap_len = match self.wrap {
            Wrap::None => 0,
            Wrap::Zlib => 6 + if self.dict_id.is_some() { 4 } else { 0 },
            Wrap::Gzip => 8 + self.gzip_header.as_ref().map_or(10, GzipHeader::encoded_len),
        };
        source_len + ((source_len + 7) >> 3) + ((source_len + 63) >> 6) + 5 + wrap_len
    }

    /// Running checksum of the input: CRC-32 for gzip, Adler-32 otherwise.
    pub fn adler(&self) -> u32 {
        self.check.value()
    }

    /// Total uncompressed bytes consumed since the last reset.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total compressed bytes produced since the last reset.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Compress from `zp.next_in` into `zp.next_out`.
    ///
    /// Returns `Ok(())` while the stream is in progress. Otherwise:
    ///
    /// - [`Error::EndOfStream`] once `Flush::Finish` has delivered the whole
    ///   stream, trailer included
    /// - [`Error::NeedBuffers`] when there is no output space, or when
    ///   nothing new can be done (no input and no stronger flush than last
    ///   time)
    /// - [`Error::StreamError`] for input after the stream was finished, or
    ///   after a rejected reset
    pub fn write(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> Result<()> {
        let (avail_in, avail_out) = (zp.avail_in(), zp.avail_out());
        let result = self.run(zp, flush);
        self.total_in += (avail_in - zp.avail_in()) as u64;
        self.total_out += (avail_out - zp.avail_out()) as u64;
        result
    }

    fn run(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> Result<()> {
        if self.status == Status::Invalid
            || (self.status == Status::Finish && flush != Flush::Finish)
        {
            return Err(Error::StreamError);
        }
        if zp.avail_out() == 0 {
            return Err(Error::NeedBuffers);
        }

        let old_rank = self.last_flush.map_or(-1, Flush::rank);
        self.last_flush = Some(flush);

        if self.status == Status::Init {
            self.write_header();
            self.status = Status::Busy;
        }
        self.blocks.finish_deferred(&mut self.out);

        if self.out.pending() != 0 {
            self.out.flush_pending(zp);
            if zp.avail_out() == 0 {
                self.last_flush = None;
                return Ok(());
            }
        } else if zp.avail_in() == 0 && flush.rank() <= old_rank && flush != Flush::Finish {
            return Err(Error::NeedBuffers);
        }

        if self.status == Status::Finish && zp.avail_in() != 0 {
            return Err(Error::NeedBuffers);
        }

        if zp.avail_in() != 0
            || self.matcher.lookahead != 0
            || (flush != Flush::None && self.status != Status::Finish)
        {
            let state = match (self.mode, self.strategy) {
                (MatchMode::Stored, _) => self.deflate_stored(zp, flush),
                (_, Strategy::Huffman) => self.deflate_huff(zp, flush),
                (_, Strategy::Rle) => self.deflate_rle(zp, flush),
                (MatchMode::Fast, _) => self.deflate_fast(zp, flush),
                (MatchMode::Slow, _) => self.deflate_slow(zp, flush),
            };

            if matches!(state, BlockState::FinishStarted | BlockState::FinishDone) {
                self.status = Status::Finish;
            }
            if matches!(state, BlockState::NeedMore | BlockState::FinishStarted) {
                if zp.avail_out() == 0 {
                    self.last_flush = None;
                }
                return Ok(());
            }
            if state == BlockState::BlockDone {
                match flush {
                    Flush::Partial => align(&mut self.out),
                    Flush::Block | Flush::Trees => {}
                    _ => {
                        // Empty stored block: byte-aligns the stream for a decoder
                        stored_block(&mut self.out, &[], false);
                        if flush == Flush::Full {
                            self.matcher.clear_hash();
                            if self.matcher.lookahead == 0 {
                                self.matcher.strstart = 0;
                                self.matcher.block_start = 0;
                                self.matcher.insert = 0;
                            }
                        }
                    }
                }
                self.out.flush_pending(zp);
                if zp.avail_out() == 0 {
                    self.last_flush = None;
                    return Ok(());
                }
            }
        }

        if flush != Flush::Finish {
            return Ok(());
        }

        if !self.trailer_written {
            let mut trailer = [0u8; 8];
            let n = self.check.encode(&mut trailer);
            self.out.write_bytes(&trailer[..n]);
            self.trailer_written = true;
            self.out.flush_pending(zp);
        }
        if self.out.pending() != 0 {
            Ok(())
        } else {
            Err(Error::EndOfStream)
        }
    }

    fn write_header(&mut self) {
        let mut header = Vec::new();
        match self.wrap {
            Wrap::None => return,
            Wrap::Zlib => encode_zlib_header(
                self.window_bits,
                ZlibLevel::new(self.level, self.strategy),
                self.dict_id,
                &mut header,
            ),
            Wrap::Gzip => {
                let xfl = gzip_xfl(self.level, self.strategy);
                match &self.gzip_header {
                    Some(fields) => fields.encode(xfl, &mut header),
                    None => GzipHeader::default().encode(xfl, &mut header),
                }
            }
        }
        self.out.write_bytes(&header);
    }

    fn fill_window(&mut self, zp: &mut ZParams<'_>) {
        let check = &mut self.check;
        self.matcher.fill_window(zp, |data| check.update(data));
    }

    /// Cut the current block and deliver what fits. Returns true when the
    /// routine has to return: the output is full or the block's symbols
    /// were deferred by a `Trees` flush.
    fn flush_block(&mut self, zp: &mut ZParams<'_>, last: bool, flush: Flush) -> bool {
        self.flush_block_only(last, flush);
        self.out.flush_pending(zp);
        zp.avail_out() == 0 || self.blocks.has_deferred()
    }

    fn flush_block_only(&mut self, last: bool, flush: Flush) {
        let options = BlockOptions {
            force_fixed: self.strategy == Strategy::Fixed,
            stored_only: self.mode == MatchMode::Stored,
            split_trees: flush == Flush::Trees,
        };
        let m = &mut self.matcher;
        let stored = usize::try_from(m.block_start)
            .ok()
            .map(|start| &m.window[start..m.strstart]);
        self.blocks.flush_block(&mut self.out, stored, last, options);
        m.block_start = m.strstart as isize;
    }

    /// Close out a routine once input is exhausted.
    fn finish_routine(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> BlockState {
        if flush == Flush::Finish {
            return if self.flush_block(zp, true, flush) {
                BlockState::FinishStarted
            } else {
                BlockState::FinishDone
            };
        }
        if !self.blocks.is_empty() && self.flush_block(zp, false, flush) {
            return BlockState::NeedMore;
        }
        BlockState::BlockDone
    }

    /// Level 0: copy input into stored blocks as large as the pending buffer
    /// allows.
    fn deflate_stored(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> BlockState {
        let max_block = MAX_STORED.min(self.lit_bufsize * 4 - 5) as isize;

        loop {
            if self.matcher.lookahead <= 1 {
                self.fill_window(zp);
                if self.matcher.lookahead == 0 {
                    if flush == Flush::None {
                        return BlockState::NeedMore;
                    }
                    break;
                }
            }

            let m = &mut self.matcher;
            m.strstart += m.lookahead;
            m.lookahead = 0;

            let max_start = m.block_start + max_block;
            if m.strstart as isize >= max_start {
                m.lookahead = (m.strstart as isize - max_start) as usize;
                m.strstart = max_start as usize;
                if self.flush_block(zp, false, flush) {
                    return BlockState::NeedMore;
                }
            }

            // The block's bytes must not slide out of the window
            let m = &self.matcher;
            if m.strstart as isize - m.block_start >= m.max_dist() as isize
                && self.flush_block(zp, false, flush)
            {
                return BlockState::NeedMore;
            }
        }

        self.matcher.insert = 0;
        if flush == Flush::Finish {
            return self.finish_routine(zp, flush);
        }
        let m = &self.matcher;
        if m.strstart as isize > m.block_start && self.flush_block(zp, false, flush) {
            return BlockState::NeedMore;
        }
        BlockState::BlockDone
    }

    /// Levels 1-3: emit the first match found at each position. Short
    /// matches have all their positions hashed; longer ones are skipped over.
    fn deflate_fast(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> BlockState {
        loop {
            if self.matcher.lookahead < MIN_LOOKAHEAD {
                self.fill_window(zp);
                if self.matcher.lookahead < MIN_LOOKAHEAD && flush == Flush::None {
                    return BlockState::NeedMore;
                }
                if self.matcher.lookahead == 0 {
                    break;
                }
            }

            let m = &mut self.matcher;
            let mut hash_head = 0;
            if m.lookahead >= MIN_MATCH {
                hash_head = m.insert_string(m.strstart);
            }
            let mut match_length = 0;
            if hash_head != 0 && m.strstart - hash_head <= m.max_dist() {
                match_length = m.longest_match(hash_head);
            }

            let full = if match_length >= MIN_MATCH {
                let full = self
                    .blocks
                    .tally_match(m.strstart - m.match_start, match_length);
                m.lookahead -= match_length;

                if match_length <= m.config.max_lazy && m.lookahead >= MIN_MATCH {
                    for _ in 1..match_length {
                        m.strstart += 1;
                        m.insert_string(m.strstart);
                    }
                    m.strstart += 1;
                } else {
                    m.strstart += match_length;
                }
                full
            } else {
                let full = self.blocks.tally_literal(m.window[m.strstart]);
                m.lookahead -= 1;
                m.strstart += 1;
                full
            };

            if full && self.flush_block(zp, false, flush) {
                return BlockState::NeedMore;
            }
        }

        self.matcher.insert = self.matcher.strstart.min(MIN_MATCH - 1);
        self.finish_routine(zp, flush)
    }

    /// Levels 4-9: hold each match back one position and emit the longer of
    /// it and the match starting at the next byte.
    fn deflate_slow(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> BlockState {
        loop {
            if self.matcher.lookahead < MIN_LOOKAHEAD {
                self.fill_window(zp);
                if self.matcher.lookahead < MIN_LOOKAHEAD && flush == Flush::None {
                    return BlockState::NeedMore;
                }
                if self.matcher.lookahead == 0 {
                    break;
                }
            }

            let m = &mut self.matcher;
            let mut hash_head = 0;
            if m.lookahead >= MIN_MATCH {
                hash_head = m.insert_string(m.strstart);
            }

            m.prev_length = m.match_length;
            m.prev_match = m.match_start;
            m.match_length = MIN_MATCH - 1;

            if hash_head != 0
                && m.prev_length < m.config.max_lazy
                && m.strstart - hash_head <= m.max_dist()
            {
                m.match_length = m.longest_match(hash_head);
                if m.match_length <= 5
                    && (self.strategy == Strategy::Filtered
                        || (m.match_length == MIN_MATCH && m.strstart - m.match_start > TOO_FAR))
                {
                    m.match_length = MIN_MATCH - 1;
                }
            }

            if m.prev_length >= MIN_MATCH && m.match_length <= m.prev_length {
                // The previous match is at least as good: emit it
                let max_insert = m.strstart + m.lookahead - MIN_MATCH;
                let full = self
                    .blocks
                    .tally_match(m.strstart - 1 - m.prev_match, m.prev_length);

                m.lookahead -= m.prev_length - 1;
                for _ in 2..m.prev_length {
                    m.strstart += 1;
                    if m.strstart <= max_insert {
                        m.insert_string(m.strstart);
                    }
                }
                m.match_available = false;
                m.match_length = MIN_MATCH - 1;
                m.strstart += 1;

                if full && self.flush_block(zp, false, flush) {
                    return BlockState::NeedMore;
                }
            } else if m.match_available {
                // The match here is better: the previous byte goes out alone
                let full = self.blocks.tally_literal(m.window[m.strstart - 1]);
                if full {
                    self.flush_block_only(false, flush);
                    self.out.flush_pending(zp);
                }
                let m = &mut self.matcher;
                m.strstart += 1;
                m.lookahead -= 1;
                if zp.avail_out() == 0 || self.blocks.has_deferred() {
                    return BlockState::NeedMore;
                }
            } else {
                m.match_available = true;
                m.strstart += 1;
                m.lookahead -= 1;
            }
        }

        let m = &mut self.matcher;
        if m.match_available {
            self.blocks.tally_literal(m.window[m.strstart - 1]);
            m.match_available = false;
        }
        m.insert = m.strstart.min(MIN_MATCH - 1);
        self.finish_routine(zp, flush)
    }

    /// `Strategy::Rle`: only matches at distance one.
    fn deflate_rle(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> BlockState {
        loop {
            if self.matcher.lookahead <= MAX_MATCH {
                self.fill_window(zp);
                if self.matcher.lookahead <= MAX_MATCH && flush == Flush::None {
                    return BlockState::NeedMore;
                }
                if self.matcher.lookahead == 0 {
                    break;
                }
            }

            let m = &mut self.matcher;
            let mut run = 0;
            if m.lookahead >= MIN_MATCH && m.strstart > 0 {
                let prev = m.window[m.strstart - 1];
                let max_len = MAX_MATCH.min(m.lookahead);
                while run < max_len && m.window[m.strstart + run] == prev {
                    run += 1;
                }
            }

            let full = if run >= MIN_MATCH {
                let full = self.blocks.tally_match(1, run);
                m.lookahead -= run;
                m.strstart += run;
                full
            } else {
                let full = self.blocks.tally_literal(m.window[m.strstart]);
                m.lookahead -= 1;
                m.strstart += 1;
                full
            };

            if full && self.flush_block(zp, false, flush) {
                return BlockState::NeedMore;
            }
        }

        self.matcher.insert = 0;
        self.finish_routine(zp, flush)
    }

    /// `Strategy::Huffman`: literals only.
    fn deflate_huff(&mut self, zp: &mut ZParams<'_>, flush: Flush) -> BlockState {
        loop {
            if self.matcher.lookahead == 0 {
                self.fill_window(zp);
                if self.matcher.lookahead == 0 {
                    if flush == Flush::None {
                        return BlockState::NeedMore;
                    }
                    break;
                }
            }

            let m = &mut self.matcher;
            let full = self.blocks.tally_literal(m.window[m.strstart]);
            m.lookahead -= 1;
            m.strstart += 1;

            if full && self.flush_block(zp, false, flush) {
                return BlockState::NeedMore;
            }
        }

        self.matcher.insert = 0;
        self.finish_routine(zp, flush)
    }
}
