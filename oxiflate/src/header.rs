//! zlib (RFC 1950) and gzip (RFC 1952) framing.
//!
//! # zlib
//!
//! ```text
//! +---+---+============+---+---+---+---+
//! |CMF|FLG| compressed |    ADLER32    |
//! +---+---+============+---+---+---+---+
//! ```
//!
//! - CMF: bits 0-3 CM (must be 8), bits 4-7 CINFO (log2(window size) - 8)
//! - FLG: bits 0-4 FCHECK so that (CMF*256 + FLG) mod 31 == 0,
//!   bit 5 FDICT (a 4-byte dictionary id follows), bits 6-7 FLEVEL
//! - ADLER32 of the uncompressed data, big-endian
//!
//! # gzip
//!
//! A ten byte fixed part (magic, method, flags, mtime, xfl, os), then the
//! optional extra field, file name, comment and header CRC selected by the
//! flags. The trailer is the CRC-32 and the length modulo 2^32 of the
//! uncompressed data, both little-endian.
//!
//! Encoding lives here. Decoding is done byte by byte by the inflater, which
//! uses the validation helpers below so the two sides agree.

use oxiflate_core::checksum::{Adler32, Crc32};
use oxiflate_core::error::{Error, Result};
use oxiflate_core::stream::{Strategy, Wrap};

/// gzip magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compression method: DEFLATE.
pub const CM_DEFLATE: u8 = 8;

/// Operating system byte for Unix.
pub const OS_UNIX: u8 = 3;

/// Operating system byte for "unknown".
pub const OS_UNKNOWN: u8 = 255;

/// gzip header flags.
pub mod flags {
    /// Text file.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original filename present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
    /// Bits that must be zero.
    pub const RESERVED: u8 = 0xE0;
}

/// zlib FDICT flag.
pub const ZLIB_FDICT: u8 = 0x20;

/// zlib compression level indicator in header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ZlibLevel {
    /// Fastest compression.
    Fastest = 0,
    /// Fast compression.
    Fast = 1,
    /// Default compression.
    Default = 2,
    /// Maximum compression.
    Maximum = 3,
}

impl ZlibLevel {
    /// The indicator for a stream compressed at `level` with `strategy`.
    pub fn new(level: u8, strategy: Strategy) -> Self {
        if matches!(strategy, Strategy::Huffman | Strategy::Rle) {
            return Self::Fastest;
        }
        match level {
            0..=1 => Self::Fastest,
            2..=5 => Self::Fast,
            6 => Self::Default,
            _ => Self::Maximum,
        }
    }
}

/// Encode a zlib header into `out`.
///
/// `window_bits` is 9-15. With a dictionary id the header carries FDICT and
/// the id, big-endian.
pub fn encode_zlib_header(
    window_bits: u8,
    level: ZlibLevel,
    dict_id: Option<u32>,
    out: &mut Vec<u8>,
) {
    let cmf = ((window_bits - 8) << 4) | CM_DEFLATE;
    let mut flg = (level as u8) << 6;
    if dict_id.is_some() {
        flg |= ZLIB_FDICT;
    }
    let remainder = ((cmf as u16) * 256 + flg as u16) % 31;
    if remainder != 0 {
        flg += (31 - remainder) as u8;
    }

    out.extend_from_slice(&[cmf, flg]);
    if let Some(id) = dict_id {
        out.extend_from_slice(&id.to_be_bytes());
    }
}

/// The parts of a zlib header a decoder acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibHeaderInfo {
    /// Window size the encoder used, as log2.
    pub window_bits: u8,
    /// A dictionary id follows the header.
    pub has_dictionary: bool,
}

/// Validate a zlib header against a decoder configured for `window_bits`.
pub fn parse_zlib_header(cmf: u8, flg: u8, window_bits: u8) -> Result<ZlibHeaderInfo> {
    if ((cmf as u16) * 256 + flg as u16) % 31 != 0 {
        return Err(Error::IncorrectHeaderCheck);
    }
    if cmf & 0x0F != CM_DEFLATE {
        return Err(Error::UnknownCompressionMethod);
    }
    let bits = (cmf >> 4) + 8;
    if bits > 15 || bits > window_bits {
        return Err(Error::InvalidWindowSize);
    }
    Ok(ZlibHeaderInfo {
        window_bits: bits,
        has_dictionary: flg & ZLIB_FDICT != 0,
    })
}

/// Validate the method and flag bytes of a gzip header.
pub fn check_gzip_method(method: u8, flag_byte: u8) -> Result<()> {
    if method != CM_DEFLATE {
        return Err(Error::UnknownCompressionMethod);
    }
    if flag_byte & flags::RESERVED != 0 {
        return Err(Error::UnknownHeaderFlags);
    }
    Ok(())
}

/// gzip header fields an encoder can set.
///
/// Optional fields are written only when present. The file name and comment
/// must not contain NUL bytes; the extra field is at most 65535 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader {
    /// Hint that the data is text (FTEXT).
    pub text: bool,
    /// Modification time (Unix timestamp), 0 if unknown.
    pub mtime: u32,
    /// Operating system byte.
    pub os: u8,
    /// Extra field (FEXTRA).
    pub extra: Option<Vec<u8>>,
    /// Original file name (FNAME), without the terminating NUL.
    pub name: Option<Vec<u8>>,
    /// Comment (FCOMMENT), without the terminating NUL.
    pub comment: Option<Vec<u8>>,
    /// Append a CRC-16 of the header (FHCRC).
    pub hcrc: bool,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            text: false,
            mtime: 0,
            os: OS_UNIX,
            extra: None,
            name: None,
            comment: None,
            hcrc: false,
        }
    }
}

impl GzipHeader {
    /// Create a header with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a header carrying a file name.
    pub fn with_name(name: &[u8]) -> Self {
        Self {
            name: Some(name.to_vec()),
            ..Self::default()
        }
    }

    /// The flag byte these fields produce.
    pub fn flags(&self) -> u8 {
        let mut value = 0;
        if self.text {
            value |= flags::FTEXT;
        }
        if self.hcrc {
            value |= flags::FHCRC;
        }
        if self.extra.is_some() {
            value |= flags::FEXTRA;
        }
        if self.name.is_some() {
            value |= flags::FNAME;
        }
        if self.comment.is_some() {
            value |= flags::FCOMMENT;
        }
        value
    }

    /// Encoded size of the header in bytes.
    pub fn encoded_len(&self) -> usize {
        10 + self.extra.as_ref().map_or(0, |e| 2 + e.len().min(0xFFFF))
            + self.name.as_ref().map_or(0, |n| n.len() + 1)
            + self.comment.as_ref().map_or(0, |c| c.len() + 1)
            + if self.hcrc { 2 } else { 0 }
    }

    /// Append the encoded header to `out`. `xfl` is the extra flags byte.
    pub fn encode(&self, xfl: u8, out: &mut Vec<u8>) {
        let start = out.len();

        out.extend_from_slice(&GZIP_MAGIC);
        out.push(CM_DEFLATE);
        out.push(self.flags());
        out.extend_from_slice(&self.mtime.to_le_bytes());
        out.push(xfl);
        out.push(self.os);

        if let Some(extra) = &self.extra {
            let extra = &extra[..extra.len().min(0xFFFF)];
            out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            out.extend_from_slice(extra);
        }
        if let Some(name) = &self.name {
            out.extend_from_slice(name);
            out.push(0);
        }
        if let Some(comment) = &self.comment {
            out.extend_from_slice(comment);
            out.push(0);
        }
        if self.hcrc {
            let crc = Crc32::compute(&out[start..]) as u16;
            out.extend_from_slice(&crc.to_le_bytes());
        }
    }
}

/// gzip XFL byte for a stream compressed at `level` with `strategy`.
pub fn gzip_xfl(level: u8, strategy: Strategy) -> u8 {
    if level == 9 {
        2
    } else if level < 2 || matches!(strategy, Strategy::Huffman | Strategy::Rle) {
        4
    } else {
        0
    }
}

/// Running checksum and length of the uncompressed data of one stream.
///
/// zlib streams carry an Adler-32, gzip streams a CRC-32 and the length
/// modulo 2^32. Raw streams carry nothing; only the length is kept.
#[derive(Debug, Clone)]
pub struct TrailerCheck {
    wrap: Wrap,
    adler: Adler32,
    crc: Crc32,
    total: u64,
}

impl TrailerCheck {
    /// A fresh check for a stream with the given framing.
    pub fn new(wrap: Wrap) -> Self {
        Self {
            wrap,
            adler: Adler32::new(),
            crc: Crc32::new(),
            total: 0,
        }
    }

    /// Start over, keeping the framing.
    pub fn reset(&mut self) {
        *self = Self::new(self.wrap);
    }

    /// Account for `data`.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        match self.wrap {
            Wrap::None => {}
            Wrap::Zlib => self.adler.update(data),
            Wrap::Gzip => self.crc.update(data),
        }
        self.total += data.len() as u64;
    }

    /// Current checksum: CRC-32 for gzip, Adler-32 otherwise.
    pub fn value(&self) -> u32 {
        match self.wrap {
            Wrap::Gzip => self.crc.value(),
            _ => self.adler.value(),
        }
    }

    /// Bytes accounted for so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Encode the stream trailer into `out`, returning its length.
    pub fn encode(&self, out: &mut [u8; 8]) -> usize {
        match self.wrap {
            Wrap::None => 0,
            Wrap::Zlib => {
                out[..4].copy_from_slice(&self.adler.value().to_be_bytes());
                4
            }
            Wrap::Gzip => {
                out[..4].copy_from_slice(&self.crc.value().to_le_bytes());
                out[4..].copy_from_slice(&(self.total as u32).to_le_bytes());
                8
            }
        }
    }

    /// Check a trailer checksum read as a little-endian word.
    pub fn verify_check(&self, word: u32) -> Result<()> {
        let expected = match self.wrap {
            Wrap::Zlib => word.swap_bytes(),
            _ => word,
        };
        if expected != self.value() {
            return Err(Error::IncorrectDataCheck);
        }
        Ok(())
    }

    /// Check a gzip trailer length field.
    pub fn verify_length(&self, word: u32) -> Result<()> {
        if word != self.total as u32 {
            return Err(Error::IncorrectLengthCheck);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_header_default() {
        let mut out = Vec::new();
        encode_zlib_header(15, ZlibLevel::new(6, Strategy::Normal), None, &mut out);
        assert_eq!(out, [0x78, 0x9C]);
    }

    #[test]
    fn test_zlib_header_levels() {
        for (level, expected) in [(1, 0x01), (2, 0x5E), (9, 0xDA)] {
            let mut out = Vec::new();
            encode_zlib_header(15, ZlibLevel::new(level, Strategy::Normal), None, &mut out);
            assert_eq!(out, [0x78, expected], "level {}", level);
        }
    }

    #[test]
    fn test_zlib_header_with_dictionary() {
        let mut out = Vec::new();
        encode_zlib_header(15, ZlibLevel::Default, Some(0x0102_0304), &mut out);
        assert_eq!(out.len(), 6);
        assert_eq!(&out[2..], &[1, 2, 3, 4]);

        let info = parse_zlib_header(out[0], out[1], 15).unwrap();
        assert!(info.has_dictionary);
        assert_eq!(info.window_bits, 15);
    }

    #[test]
    fn test_zlib_header_checks() {
        assert_eq!(
            parse_zlib_header(0x14, 0x00, 15),
            Err(Error::IncorrectHeaderCheck)
        );
        assert_eq!(
            parse_zlib_header(0x17, 0x02, 15),
            Err(Error::UnknownCompressionMethod)
        );
        assert_eq!(
            parse_zlib_header(0xF8, 0x00, 15),
            Err(Error::InvalidWindowSize)
        );
        assert_eq!(
            parse_zlib_header(0x78, 0x9C, 10),
            Err(Error::InvalidWindowSize)
        );
        assert_eq!(
            parse_zlib_header(0x28, 0x15, 10).map(|i| i.window_bits),
            Ok(10)
        );
    }

    #[test]
    fn test_gzip_header_minimal() {
        let mut out = Vec::new();
        GzipHeader::new().encode(0, &mut out);
        assert_eq!(out, [0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, OS_UNIX]);
    }

    #[test]
    fn test_gzip_header_fields() {
        let header = GzipHeader {
            text: true,
            mtime: 0x1234_5678,
            os: OS_UNKNOWN,
            extra: Some(vec![1, 2, 3]),
            name: Some(b"file.txt".to_vec()),
            comment: Some(b"hi".to_vec()),
            hcrc: true,
        };
        let mut out = Vec::new();
        header.encode(2, &mut out);

        assert_eq!(out.len(), header.encoded_len());
        assert_eq!(out[3], 0x1F);
        assert_eq!(&out[4..8], &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(out[8], 2);
        assert_eq!(&out[10..15], &[3, 0, 1, 2, 3]);
        assert_eq!(&out[15..24], b"file.txt\0");
        assert_eq!(&out[24..27], b"hi\0");

        let crc = Crc32::compute(&out[..27]) as u16;
        assert_eq!(&out[27..], &crc.to_le_bytes());
    }

    #[test]
    fn test_gzip_method_checks() {
        assert_eq!(check_gzip_method(7, 0), Err(Error::UnknownCompressionMethod));
        assert_eq!(check_gzip_method(8, 0xE0), Err(Error::UnknownHeaderFlags));
        assert!(check_gzip_method(8, 0x1F).is_ok());
    }

    #[test]
    fn test_xfl() {
        assert_eq!(gzip_xfl(9, Strategy::Normal), 2);
        assert_eq!(gzip_xfl(1, Strategy::Normal), 4);
        assert_eq!(gzip_xfl(6, Strategy::Huffman), 4);
        assert_eq!(gzip_xfl(6, Strategy::Normal), 0);
    }

    #[test]
    fn test_trailer_zlib() {
        let mut check = TrailerCheck::new(Wrap::Zlib);
        check.update(b"Wikipedia");
        assert_eq!(check.value(), 0x11E6_0398);

        let mut out = [0u8; 8];
        assert_eq!(check.encode(&mut out), 4);
        assert_eq!(&out[..4], &[0x11, 0xE6, 0x03, 0x98]);

        let word = u32::from_le_bytes([0x11, 0xE6, 0x03, 0x98]);
        assert!(check.verify_check(word).is_ok());
        assert_eq!(check.verify_check(0), Err(Error::IncorrectDataCheck));
    }

    #[test]
    fn test_trailer_gzip() {
        let mut check = TrailerCheck::new(Wrap::Gzip);
        check.update(b"Hello, ");
        check.update(b"World!");
        assert_eq!(check.value(), 0xEC4A_C3D0);
        assert_eq!(check.total(), 13);

        let mut out = [0u8; 8];
        assert_eq!(check.encode(&mut out), 8);
        assert_eq!(&out[..4], &0xEC4A_C3D0u32.to_le_bytes());
        assert_eq!(&out[4..], &13u32.to_le_bytes());
        assert!(check.verify_length(13).is_ok());
        assert_eq!(check.verify_length(14), Err(Error::IncorrectLengthCheck));
    }

    #[test]
    fn test_trailer_raw() {
        let mut check = TrailerCheck::new(Wrap::None);
        check.update(b"abc");
        assert_eq!(check.value(), 1);
        assert_eq!(check.total(), 3);
        assert_eq!(check.encode(&mut [0u8; 8]), 0);

        check.reset();
        assert_eq!(check.total(), 0);
    }
}
