//! Constant tables for DEFLATE (RFC 1951).
//!
//! Length and distance symbols carry a base value plus extra bits; the fixed
//! Huffman code of block type 1 is fully determined by its code lengths. All
//! tables here are immutable and shared by every stream.

use crate::huffman::{Code, CodeKind, HuffmanTree, canonical_codes};
use oxiflate_core::error::Result;
use std::sync::OnceLock;

/// Shortest match length.
pub const MIN_MATCH: usize = 3;

/// Longest match length.
pub const MAX_MATCH: usize = 258;

/// Longest code length of the literal/length and distance codes.
pub const MAX_BITS: u8 = 15;

/// Longest code length of the code-length code.
pub const MAX_BL_BITS: u8 = 7;

/// Literal/length symbols an encoder may use (0-285).
pub const LITLEN_CODES: usize = 286;

/// Literal/length symbols addressable by a code (0-287, 286 and 287 invalid).
pub const LITLEN_TABLE_SIZE: usize = 288;

/// Distance symbols an encoder may use (0-29).
pub const DIST_CODES: usize = 30;

/// Distance symbols addressable by a code (0-31, 30 and 31 invalid).
pub const DIST_TABLE_SIZE: usize = 32;

/// Code-length alphabet size (0-18).
pub const CODELEN_CODES: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Repeat previous length 3-6 times (2 extra bits).
pub const REP_3_6: u8 = 16;

/// Repeat a zero length 3-10 times (3 extra bits).
pub const REPZ_3_10: u8 = 17;

/// Repeat a zero length 11-138 times (7 extra bits).
pub const REPZ_11_138: u8 = 18;

/// Fixed literal/length code lengths (RFC 1951 Section 3.2.6).
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
pub fn fixed_litlen_lengths() -> [u8; LITLEN_TABLE_SIZE] {
    let mut lengths = [8u8; LITLEN_TABLE_SIZE];
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths
}

/// Fixed distance code lengths: all 32 symbols use 5 bits.
///
/// Symbols 30 and 31 complete the code but never appear in valid data.
pub fn fixed_distance_lengths() -> [u8; DIST_TABLE_SIZE] {
    [5u8; DIST_TABLE_SIZE]
}

/// The fixed literal/length decoding table, built on first use.
pub fn fixed_litlen_tree() -> Result<&'static HuffmanTree> {
    static TREE: OnceLock<Result<HuffmanTree>> = OnceLock::new();

    TREE.get_or_init(|| HuffmanTree::build(CodeKind::LitLen, &fixed_litlen_lengths()))
        .as_ref()
        .map_err(|&e| e)
}

/// The fixed distance decoding table, built on first use.
pub fn fixed_distance_tree() -> Result<&'static HuffmanTree> {
    static TREE: OnceLock<Result<HuffmanTree>> = OnceLock::new();

    TREE.get_or_init(|| HuffmanTree::build(CodeKind::Distance, &fixed_distance_lengths()))
        .as_ref()
        .map_err(|&e| e)
}

/// Fixed literal/length codes for encoding.
pub fn fixed_litlen_codes() -> &'static [Code; LITLEN_TABLE_SIZE] {
    static CODES: OnceLock<[Code; LITLEN_TABLE_SIZE]> = OnceLock::new();

    CODES.get_or_init(|| {
        let mut codes = [Code::default(); LITLEN_TABLE_SIZE];
        canonical_codes(&fixed_litlen_lengths(), &mut codes);
        codes
    })
}

/// Fixed distance codes for encoding.
pub fn fixed_distance_codes() -> &'static [Code; DIST_CODES] {
    static CODES: OnceLock<[Code; DIST_CODES]> = OnceLock::new();

    CODES.get_or_init(|| {
        let mut codes = [Code::default(); DIST_CODES];
        canonical_codes(&fixed_distance_lengths()[..DIST_CODES], &mut codes);
        codes
    })
}

/// Length code base values (RFC 1951 Section 3.2.5).
///
/// For length codes 257-285, this gives the base length value.
/// Extra bits are added to get the final length.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, // 257-264: 0 extra bits
    11, 13, 15, 17, // 265-268: 1 extra bit
    19, 23, 27, 31, // 269-272: 2 extra bits
    35, 43, 51, 59, // 273-276: 3 extra bits
    67, 83, 99, 115, // 277-280: 4 extra bits
    131, 163, 195, 227, // 281-284: 5 extra bits
    258, // 285: 0 extra bits
];

/// Number of extra bits for length codes 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, // 257-264
    1, 1, 1, 1, // 265-268
    2, 2, 2, 2, // 269-272
    3, 3, 3, 3, // 273-276
    4, 4, 4, 4, // 277-280
    5, 5, 5, 5, // 281-284
    0, // 285
];

/// Distance code base values (RFC 1951 Section 3.2.5).
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, // 0-3: 0 extra bits
    5, 7, // 4-5: 1 extra bit
    9, 13, // 6-7: 2 extra bits
    17, 25, // 8-9: 3 extra bits
    33, 49, // 10-11: 4 extra bits
    65, 97, // 12-13: 5 extra bits
    129, 193, // 14-15: 6 extra bits
    257, 385, // 16-17: 7 extra bits
    513, 769, // 18-19: 8 extra bits
    1025, 1537, // 20-21: 9 extra bits
    2049, 3073, // 22-23: 10 extra bits
    4097, 6145, // 24-25: 11 extra bits
    8193, 12289, // 26-27: 12 extra bits
    16385, 24577, // 28-29: 13 extra bits
];

/// Number of extra bits for distance codes 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Number of extra bits for code-length symbols 0-18.
pub const CODELEN_EXTRA_BITS: [u8; CODELEN_CODES] =
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 3, 7];

/// Order of code length codes in a dynamic block header (RFC 1951 Section 3.2.7).
pub const CODE_LENGTH_ORDER: [usize; CODELEN_CODES] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Convert a match length (3-258) to `(symbol, extra_bits, extra_value)`.
pub fn length_to_code(length: u16) -> (u16, u8, u16) {
    debug_assert!(
        (3..=258).contains(&length),
        "Length out of range: {}",
        length
    );

    let length = length as usize;
    let code = match length {
        3..=10 => length - 3 + 257,
        11..=18 => (length - 11) / 2 + 265,
        19..=34 => (length - 19) / 4 + 269,
        35..=66 => (length - 35) / 8 + 273,
        67..=130 => (length - 67) / 16 + 277,
        131..=257 => (length - 131) / 32 + 281,
        _ => 285,
    };

    let base = LENGTH_BASE[code - 257] as usize;
    let extra_bits = LENGTH_EXTRA_BITS[code - 257];

    (code as u16, extra_bits, (length - base) as u16)
}

/// Convert a distance (1-32768) to `(symbol, extra_bits, extra_value)`.
pub fn distance_to_code(distance: u16) -> (u16, u8, u16) {
    debug_assert!(distance >= 1, "Distance out of range: {}", distance);

    // Distances above 4 fall in pairs of codes per power of two.
    let code = if distance <= 4 {
        distance as usize - 1
    } else {
        let d = distance as u32 - 1;
        let msb = 31 - d.leading_zeros() as usize;
        2 * msb + ((d >> (msb - 1)) & 1) as usize
    };

    let base = DISTANCE_BASE[code];
    (code as u16, DISTANCE_EXTRA_BITS[code], distance - base)
}

/// Base and extra bit count of a length symbol (257-285).
#[inline]
pub fn length_base(symbol: u16) -> (u16, u8) {
    let i = (symbol - 257) as usize;
    (LENGTH_BASE[i], LENGTH_EXTRA_BITS[i])
}

/// Base and extra bit count of a distance symbol (0-29).
#[inline]
pub fn distance_base(symbol: u16) -> (u16, u8) {
    let i = symbol as usize;
    (DISTANCE_BASE[i], DISTANCE_EXTRA_BITS[i])
}
