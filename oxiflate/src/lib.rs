//! # OxiFlate
//!
//! Pure Rust streaming DEFLATE (RFC 1951) codec with zlib (RFC 1950) and
//! gzip (RFC 1952) framing.
//!
//! Both directions are resumable state machines driven by a `write` call
//! that takes whatever input and output space the caller has at hand. No
//! call blocks or needs the whole stream in memory: when a buffer runs out
//! the call returns, and the next call continues where it stopped.
//!
//! ## Features
//!
//! - **Decompression**: stored, fixed and dynamic Huffman blocks
//!   - Raw, zlib and gzip streams with trailer verification
//!   - Preset dictionaries, gzip optional header fields and header CRC
//!   - `Block`/`Trees` flushes to stop at block boundaries
//! - **Compression**: LZ77 with hash chains + exact-cost block selection
//!   - Levels 0-9, five strategies
//!   - `Partial`, `Sync`, `Full`, `Block`, `Trees` and `Finish` flushes
//!
//! ## Example
//!
//! ```rust
//! use oxiflate::{Deflater, Inflater};
//! use oxiflate_core::{Error, Flush, Wrap, ZParams};
//!
//! let original = b"Hello, World! Hello, World!";
//!
//! let mut deflater = Deflater::new();
//! let mut compressed = vec![0u8; deflater.bound(original.len())];
//! let mut zp = ZParams::new(original, &mut compressed);
//! assert_eq!(deflater.write(&mut zp, Flush::Finish), Err(Error::EndOfStream));
//! let len = zp.total_out as usize;
//! compressed.truncate(len);
//!
//! let mut inflater = Inflater::new();
//! inflater.reset(15, Wrap::Zlib).unwrap();
//! let mut restored = vec![0u8; original.len()];
//! let mut zp = ZParams::new(&compressed, &mut restored);
//! assert_eq!(inflater.write(&mut zp, Flush::None), Err(Error::EndOfStream));
//! assert_eq!(&restored, original);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: No compression (stored blocks)
//! - Level 1-3: Fast compression
//! - Level 4-6: Balanced (default is 6)
//! - Level 7-9: Best compression (slower)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod deflate;
pub mod easy;
pub mod header;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;

// Re-exports
pub use deflate::{DEFAULT_LEVEL, DEFAULT_MEM_LEVEL, Deflater};
pub use easy::{compress, uncompress};
pub use header::GzipHeader;
pub use huffman::{HuffmanBuilder, HuffmanTree};
pub use inflate::Inflater;
pub use lz77::{Lz77Token, Matcher};
