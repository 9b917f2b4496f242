//! LZ77 match finding for DEFLATE.
//!
//! The matcher keeps a window of twice the history size. New input is
//! appended after the current position; once the position passes the upper
//! half the window slides down by one history size, so every byte a match
//! may reference stays addressable without wrapping.
//!
//! # Algorithm
//!
//! Every position with at least three bytes of lookahead is inserted into a
//! hash table keyed on those three bytes. The table holds the most recent
//! position per hash, and `prev` chains each position to the one before it
//! with the same hash. A search walks the chain from newest to oldest,
//! bounded by the level's chain length and by the maximum distance.

use crate::tables::{MAX_MATCH, MIN_MATCH};
use oxiflate_core::stream::ZParams;

/// Lookahead needed to be sure a match of maximal length can be found.
pub const MIN_LOOKAHEAD: usize = MAX_MATCH + MIN_MATCH + 1;

/// A symbol recorded for the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

/// Search parameters of one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchConfig {
    /// Quarter the chain search once the previous match is at least this long.
    pub good_length: usize,
    /// Lazy levels: skip the lazy search past this length.
    /// Greedy levels: only insert hashes for matches up to this length.
    pub max_lazy: usize,
    /// Stop searching once a match is this long.
    pub nice_length: usize,
    /// Maximum hash chain positions examined per search.
    pub max_chain: usize,
}

/// How a level drives the matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// No matching, stored blocks only.
    Stored,
    /// Take the first acceptable match.
    Fast,
    /// Defer each match by one byte to look for a longer one.
    Slow,
}

/// Matcher parameters for `level` (0-9).
pub const fn level_config(level: u8) -> (MatchConfig, MatchMode) {
    let (good_length, max_lazy, nice_length, max_chain, mode) = match level {
        0 => (0, 0, 0, 0, MatchMode::Stored),
        1 => (4, 4, 8, 4, MatchMode::Fast),
        2 => (4, 5, 16, 8, MatchMode::Fast),
        3 => (4, 6, 32, 32, MatchMode::Fast),
        4 => (4, 4, 16, 16, MatchMode::Slow),
        5 => (8, 16, 32, 32, MatchMode::Slow),
        6 => (8, 16, 128, 128, MatchMode::Slow),
        7 => (8, 32, 128, 256, MatchMode::Slow),
        8 => (32, 128, 258, 1024, MatchMode::Slow),
        _ => (32, 258, 258, 4096, MatchMode::Slow),
    };
    (
        MatchConfig {
            good_length,
            max_lazy,
            nice_length,
            max_chain,
        },
        mode,
    )
}

/// Hash-chained match finder over a sliding window.
#[derive(Debug, Clone)]
pub struct Matcher {
    /// Source bytes: history below `strstart`, lookahead from it.
    pub(crate) window: Vec<u8>,
    /// History size (`2^window_bits`).
    w_size: usize,
    w_mask: usize,
    /// Previous position with the same hash, indexed by position & `w_mask`.
    prev: Vec<u16>,
    /// Most recent position per hash. 0 means empty.
    head: Vec<u16>,
    hash_mask: usize,

    /// Current position in the window.
    pub(crate) strstart: usize,
    /// Window position where the current block began; negative once slid out.
    pub(crate) block_start: isize,
    /// Valid bytes from `strstart` onward.
    pub(crate) lookahead: usize,
    /// Positions before `strstart` whose hashes are still to be inserted.
    pub(crate) insert: usize,

    /// Length of the best match at `strstart`.
    pub(crate) match_length: usize,
    /// Start of that match.
    pub(crate) match_start: usize,
    /// Length of the match at the previous position (lazy evaluation).
    pub(crate) prev_length: usize,
    /// Start of that match.
    pub(crate) prev_match: usize,
    /// The byte at `strstart - 1` is still waiting to be emitted.
    pub(crate) match_available: bool,

    pub(crate) config: MatchConfig,
}

impl Matcher {
    /// Create a matcher with `2^window_bits` bytes of history and
    /// `2^(mem_level + 7)` hash heads.
    pub fn new(window_bits: u8, mem_level: u8) -> Self {
        let w_size = 1usize << window_bits;
        let hash_size = 1usize << (mem_level as u32 + 7);
        let (config, _) = level_config(6);

        Self {
            window: vec![0; 2 * w_size],
            w_size,
            w_mask: w_size - 1,
            prev: vec![0; w_size],
            head: vec![0; hash_size],
            hash_mask: hash_size - 1,
            strstart: 0,
            block_start: 0,
            lookahead: 0,
            insert: 0,
            match_length: MIN_MATCH - 1,
            match_start: 0,
            prev_length: MIN_MATCH - 1,
            prev_match: 0,
            match_available: false,
            config,
        }
    }

    /// Forget all input and history. Allocations are kept.
    pub fn reset(&mut self) {
        self.clear_hash();
        self.strstart = 0;
        self.block_start = 0;
        self.lookahead = 0;
        self.insert = 0;
        self.match_length = MIN_MATCH - 1;
        self.match_start = 0;
        self.prev_length = MIN_MATCH - 1;
        self.prev_match = 0;
        self.match_available = false;
    }

    /// Empty the hash table so no later match can reach current history.
    pub fn clear_hash(&mut self) {
        self.head.fill(0);
    }

    /// History size in bytes.
    pub fn w_size(&self) -> usize {
        self.w_size
    }

    /// Farthest distance a match may reach, keeping a full lookahead in view.
    pub fn max_dist(&self) -> usize {
        self.w_size - MIN_LOOKAHEAD
    }

    /// Compute hash for 3 bytes, masked to the table size.
    #[inline(always)]
    fn hash(&self, pos: usize) -> usize {
        let (b0, b1, b2) = (self.window[pos], self.window[pos + 1], self.window[pos + 2]);
        let h = ((b0 as usize).wrapping_mul(506832829))
            ^ ((b1 as usize).wrapping_mul(2654435761) << 8)
            ^ ((b2 as usize).wrapping_mul(374761393) << 16);
        (h ^ (h >> 15)) & self.hash_mask
    }

    /// Insert the string at `pos` and return the previous head of its chain
    /// (0 when the chain was empty).
    #[inline]
    pub fn insert_string(&mut self, pos: usize) -> usize {
        let h = self.hash(pos);
        let head = self.head[h];
        self.prev[pos & self.w_mask] = head;
        self.head[h] = pos as u16;
        head as usize
    }

    /// Load a preset dictionary. Only its last `w_size` bytes are kept.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) {
        let dictionary = &dictionary[dictionary.len().saturating_sub(self.w_size)..];
        let n = dictionary.len();
        self.window[..n].copy_from_slice(dictionary);

        let hashed = n.saturating_sub(MIN_MATCH - 1);
        for pos in 0..hashed {
            self.insert_string(pos);
        }
        self.strstart = n;
        self.block_start = n as isize;
        self.insert = n - hashed;
        self.lookahead = 0;
    }

    /// Read input until the lookahead is full or input runs out, sliding the
    /// window first when the position is in the upper half. `on_read` sees
    /// every byte taken from `zp`, in order.
    pub fn fill_window(&mut self, zp: &mut ZParams<'_>, mut on_read: impl FnMut(&[u8])) {
        loop {
            let mut more = self.window.len() - self.lookahead - self.strstart;

            if self.strstart >= self.w_size + self.max_dist() {
                self.slide();
                more += self.w_size;
            }
            if zp.avail_in() == 0 {
                break;
            }

            let start = self.strstart + self.lookahead;
            let src = zp.consume(more);
            self.window[start..start + src.len()].copy_from_slice(src);
            on_read(src);
            self.lookahead += src.len();

            // Insert hashes deferred until enough bytes followed them
            if self.lookahead + self.insert >= MIN_MATCH {
                let mut pos = self.strstart - self.insert;
                while self.insert > 0 {
                    self.insert_string(pos);
                    pos += 1;
                    self.insert -= 1;
                    if self.lookahead + self.insert < MIN_MATCH {
                        break;
                    }
                }
            }

            if self.lookahead >= MIN_LOOKAHEAD || zp.avail_in() == 0 {
                break;
            }
        }
    }

    /// Move the upper half of the window down and rebase every position.
    fn slide(&mut self) {
        let w_size = self.w_size;
        self.window.copy_within(w_size..2 * w_size, 0);
        self.match_start = self.match_start.saturating_sub(w_size);
        self.strstart -= w_size;
        self.block_start -= w_size as isize;
        self.insert = self.insert.min(self.strstart);

        // Positions that slid out of the window become empty
        for entry in self.head.iter_mut().chain(self.prev.iter_mut()) {
            *entry = entry.saturating_sub(w_size as u16);
        }
    }

    /// Longest match at `strstart` along the chain starting at `cur_match`.
    ///
    /// Only matches longer than `prev_length` are considered. Updates
    /// `match_start` when one is found and returns the best length, never
    /// more than the lookahead.
    pub fn longest_match(&mut self, mut cur_match: usize) -> usize {
        let scan = self.strstart;
        let mut best_len = self.prev_length;
        let max_len = MAX_MATCH.min(self.lookahead);
        if best_len >= max_len {
            return best_len.min(self.lookahead);
        }

        let mut chain_length = self.config.max_chain;
        if self.prev_length >= self.config.good_length {
            chain_length = (chain_length >> 2).max(1);
        }
        let nice_match = self.config.nice_length.min(self.lookahead);
        let limit = self.strstart.saturating_sub(self.max_dist());
        let window = &self.window;

        loop {
            let m = cur_match;
            // Reject quickly on the byte that would make the match longer
            if window[m + best_len] == window[scan + best_len]
                && window[m + best_len - 1] == window[scan + best_len - 1]
                && window[m] == window[scan]
                && window[m + 1] == window[scan + 1]
            {
                let mut len = 2;
                while len < max_len && window[scan + len] == window[m + len] {
                    len += 1;
                }
                if len > best_len {
                    self.match_start = m;
                    best_len = len;
                    if len >= nice_match {
                        break;
                    }
                }
            }

            cur_match = self.prev[m & self.w_mask] as usize;
            chain_length -= 1;
            if cur_match <= limit || chain_length == 0 {
                break;
            }
        }

        best_len.min(self.lookahead)
    }
}
