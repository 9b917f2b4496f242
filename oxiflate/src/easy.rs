//! One-shot helpers over the streaming API.
//!
//! Both helpers drive a single stream with repeated `write` calls, growing
//! the output buffer whenever it fills.
//!
//! ```
//! use oxiflate::easy::{compress, uncompress};
//! use oxiflate_core::Wrap;
//!
//! let data = b"one-shot, one-shot, one-shot";
//! let packed = compress(data, Wrap::Gzip).unwrap();
//! assert_eq!(uncompress(&packed, Wrap::Gzip).unwrap(), data);
//! ```

use crate::deflate::{DEFAULT_LEVEL, DEFAULT_MEM_LEVEL, Deflater};
use crate::inflate::Inflater;
use oxiflate_core::error::Error;
use oxiflate_core::stream::{Flush, Strategy, Wrap, ZParams};

/// Smallest output buffer handed to a `write` call.
const MIN_CHUNK: usize = 64;

/// Compress `input` at the default level with the given framing.
///
/// Returns `None` only if the deflater reports an error, which does not
/// happen for valid parameters.
pub fn compress(input: &[u8], wrap: Wrap) -> Option<Vec<u8>> {
    let mut deflater = Deflater::new();
    deflater
        .reset(DEFAULT_LEVEL, 15, DEFAULT_MEM_LEVEL, Strategy::Normal, wrap)
        .ok()?;

    let mut output = vec![0u8; deflater.bound(input.len()).max(MIN_CHUNK)];
    let mut consumed = 0;
    let mut produced = 0;

    loop {
        if produced == output.len() {
            output.resize(output.len() * 2, 0);
        }
        let mut zp = ZParams::new(&input[consumed..], &mut output[produced..]);
        let result = deflater.write(&mut zp, Flush::Finish);
        consumed += zp.total_in as usize;
        produced += zp.total_out as usize;

        match result {
            Ok(()) => {}
            Err(Error::EndOfStream) => break,
            Err(_) => return None,
        }
    }

    output.truncate(produced);
    Some(output)
}

/// Decompress a complete stream with the given framing.
///
/// Empty input decompresses to empty output. Otherwise the result is `Some`
/// only if the stream ends properly: truncated or malformed input, or a
/// stream that needs a preset dictionary, yields `None`.
pub fn uncompress(input: &[u8], wrap: Wrap) -> Option<Vec<u8>> {
    if input.is_empty() {
        return Some(Vec::new());
    }

    let mut inflater = Inflater::new();
    inflater.reset(15, wrap).ok()?;

    let mut output = vec![0u8; input.len().saturating_mul(4).max(MIN_CHUNK)];
    let mut consumed = 0;
    let mut produced = 0;

    loop {
        if produced == output.len() {
            output.resize(output.len() * 2, 0);
        }
        let mut zp = ZParams::new(&input[consumed..], &mut output[produced..]);
        let result = inflater.write(&mut zp, Flush::None);
        consumed += zp.total_in as usize;
        produced += zp.total_out as usize;

        match result {
            Ok(()) => {}
            Err(Error::EndOfStream) => break,
            // No progress with output space left: the input is truncated
            Err(_) => return None,
        }
    }

    output.truncate(produced);
    Some(output)
}
