//! # OxiFlate Core
//!
//! Core components for the OxiFlate streaming codec.
//!
//! This crate provides the leaves the deflate and inflate state machines are
//! built from:
//!
//! - [`bitstream`]: LSB-first bit accumulator and bit packer
//! - [`checksum`]: Adler-32 and CRC-32, seedable and incremental
//! - [`window`]: Sliding history window for back-references
//! - [`stream`]: Stream parameters and the `Flush`/`Wrap`/`Strategy` enums
//! - [`error`]: Error codes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Tools                                               │
//! │     one-shot helpers, CLI                               │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     Deflater / Inflater state machines, zlib/gzip heads │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Entropy + matching                                  │
//! │     Huffman build/encode/decode, LZ77 hash chains       │
//! ├─────────────────────────────────────────────────────────┤
//! │ L0: Primitives (this crate)                             │
//! │     BitReader/BitWriter, RingBuffer, Adler-32, CRC-32   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_core::checksum::{Adler32, Crc32};
//!
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! assert_eq!(Adler32::compute(b""), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod checksum;
pub mod error;
pub mod stream;
pub mod window;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use checksum::{Adler32, Crc32};
pub use error::{Error, ErrorCategory, Result};
pub use stream::{Flush, Strategy, Wrap, ZParams};
pub use window::RingBuffer;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::stream::{Flush, Strategy, Wrap, ZParams};
}
