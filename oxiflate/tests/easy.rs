//! One-shot helpers against streams produced elsewhere.

use oxiflate::{compress, uncompress};
use oxiflate_core::{Crc32, Wrap};

#[test]
fn test_known_zlib_stream() {
    // zlib.compress(b"hello")
    let stream = [
        0x78, 0x9C, 0xCB, 0x48, 0xCD, 0xC9, 0xC9, 0x07, 0x00, 0x06, 0x2C, 0x02, 0x15,
    ];
    assert_eq!(uncompress(&stream, Wrap::Zlib).unwrap(), b"hello");
}

#[test]
fn test_known_gzip_stream() {
    // Minimal gzip member holding "hello" in a stored block
    let mut stream = vec![0x1F, 0x8B, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0xFF];
    stream.extend_from_slice(&[0x01, 0x05, 0x00, 0xFA, 0xFF]);
    stream.extend_from_slice(b"hello");
    stream.extend_from_slice(&Crc32::compute(b"hello").to_le_bytes());
    stream.extend_from_slice(&5u32.to_le_bytes());
    assert_eq!(uncompress(&stream, Wrap::Gzip).unwrap(), b"hello");
}

#[test]
fn test_gzip_output_layout() {
    let packed = compress(b"hello", Wrap::Gzip).unwrap();
    assert_eq!(&packed[..4], &[0x1F, 0x8B, 0x08, 0x00]);
    assert_eq!(packed[9], 3);
    let trailer = &packed[packed.len() - 8..];
    assert_eq!(&trailer[..4], &Crc32::compute(b"hello").to_le_bytes());
    assert_eq!(&trailer[4..], &5u32.to_le_bytes());
}

#[test]
fn test_trailing_garbage_is_ignored() {
    let mut packed = compress(b"payload", Wrap::Zlib).unwrap();
    packed.extend_from_slice(b"junk");
    assert_eq!(uncompress(&packed, Wrap::Zlib).unwrap(), b"payload");
}

#[test]
fn test_wrong_framing() {
    let raw = compress(b"payload", Wrap::None).unwrap();
    assert_eq!(uncompress(&raw, Wrap::Gzip), None);
    assert_eq!(uncompress(b"\x00", Wrap::None), None);
}
