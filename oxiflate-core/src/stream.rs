//! Stream parameters and the enumerations that drive a stream.
//!
//! A [`ZParams`] is the caller's view of one `write` call: the input still to
//! be consumed, the output space still to be filled, and running totals. The
//! codec advances the slices in place, so after a call `next_in` starts at the
//! first unconsumed byte and `next_out` at the first unwritten byte.

/// Input/output cursors for one `write` call.
///
/// # Example
///
/// ```
/// use oxiflate_core::ZParams;
///
/// let input = b"abc";
/// let mut output = [0u8; 8];
/// let mut zp = ZParams::new(input, &mut output);
/// assert_eq!(zp.avail_in(), 3);
/// assert_eq!(zp.avail_out(), 8);
///
/// let taken = zp.consume(2);
/// assert_eq!(taken, b"ab");
/// assert_eq!(zp.produce(b"xyz"), 3);
/// assert_eq!((zp.total_in, zp.total_out), (2, 3));
/// ```
#[derive(Debug, Default)]
pub struct ZParams<'a> {
    /// Input not yet consumed.
    pub next_in: &'a [u8],
    /// Output space not yet written.
    pub next_out: &'a mut [u8],
    /// Bytes consumed through this view.
    pub total_in: u64,
    /// Bytes produced through this view.
    pub total_out: u64,
}

impl<'a> ZParams<'a> {
    /// Create a view over `input` and `output` with zeroed totals.
    pub fn new(input: &'a [u8], output: &'a mut [u8]) -> Self {
        Self {
            next_in: input,
            next_out: output,
            total_in: 0,
            total_out: 0,
        }
    }

    /// Bytes of input remaining.
    #[inline]
    pub fn avail_in(&self) -> usize {
        self.next_in.len()
    }

    /// Bytes of output space remaining.
    #[inline]
    pub fn avail_out(&self) -> usize {
        self.next_out.len()
    }

    /// Consume up to `n` input bytes and return them.
    #[inline]
    pub fn consume(&mut self, n: usize) -> &'a [u8] {
        let n = n.min(self.next_in.len());
        let (head, tail) = self.next_in.split_at(n);
        self.next_in = tail;
        self.total_in += n as u64;
        head
    }

    /// Consume a single input byte.
    #[inline]
    pub fn next_byte(&mut self) -> Option<u8> {
        let (&byte, tail) = self.next_in.split_first()?;
        self.next_in = tail;
        self.total_in += 1;
        Some(byte)
    }

    /// Copy as much of `data` as fits into the output. Returns the count copied.
    #[inline]
    pub fn produce(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.next_out.len());
        self.produce_with(n, |out| out.copy_from_slice(&data[..n]));
        n
    }

    /// Write one byte of output. Returns false when there is no space.
    #[inline]
    pub fn push_byte(&mut self, byte: u8) -> bool {
        self.produce_with(1, |out| out[0] = byte) == 1
    }

    /// Hand the next `n` output bytes (clamped to the space left) to `fill`,
    /// then advance past them. Returns the count handed over.
    pub fn produce_with(&mut self, n: usize, fill: impl FnOnce(&mut [u8])) -> usize {
        let n = n.min(self.next_out.len());
        if n == 0 {
            return 0;
        }
        let out = std::mem::take(&mut self.next_out);
        let (head, tail) = out.split_at_mut(n);
        fill(head);
        self.next_out = tail;
        self.total_out += n as u64;
        n
    }
}

/// Flush behavior requested from a `write` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flush {
    /// Compress or decompress as much as is convenient.
    #[default]
    None,
    /// Stop at the next block boundary.
    Block,
    /// Flush pending output, emitting an empty fixed block.
    Partial,
    /// Flush pending output to a byte boundary with an empty stored block.
    Sync,
    /// Like `Sync`, and forget all history.
    Full,
    /// Finish the stream.
    Finish,
    /// Stop once a block's code tables are complete, before its symbols.
    Trees,
}

impl Flush {
    /// Ordering used to tell a stronger flush request from a repeated one.
    ///
    /// `Block` and `Trees` slot between the others so that requesting the same
    /// or a weaker flush twice with no new input is recognized as no progress.
    pub fn rank(self) -> i32 {
        match self {
            Flush::None => 0,
            Flush::Block => 1,
            Flush::Partial => 2,
            Flush::Trees => 3,
            Flush::Sync => 4,
            Flush::Full => 6,
            Flush::Finish => 8,
        }
    }
}

/// Container framing around a raw deflate stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    /// Raw deflate, no header or trailer.
    None,
    /// zlib header and Adler-32 trailer.
    #[default]
    Zlib,
    /// gzip header and CRC-32/size trailer.
    Gzip,
}

/// Compression strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Hash-chained matching with lazy evaluation at higher levels.
    #[default]
    Normal,
    /// Treat short matches as literals, for data with small scattered values.
    Filtered,
    /// Literals only, entropy-coded.
    Huffman,
    /// Matches of distance one only.
    Rle,
    /// Never build dynamic trees.
    Fixed,
}
