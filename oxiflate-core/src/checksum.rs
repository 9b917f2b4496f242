//! Checksums used by the zlib and gzip wrappers.
//!
//! - **Adler-32 (RFC 1950)**: zlib trailer and preset dictionary id
//! - **CRC-32 (ISO 3309)**: gzip trailer and header CRC
//!
//! Both accumulators are incremental and seedable: a running value obtained
//! from [`Adler32::value`] or [`Crc32::value`] can be fed back through
//! `with_seed` to continue the computation later.
//!
//! ## Performance
//!
//! CRC-32 uses the "slicing-by-8" technique for runs of 16 bytes or more,
//! processing 8 bytes per step with 8 pre-computed tables. Shorter runs use
//! the single-table byte loop. Adler-32 defers the modulo reduction to every
//! `NMAX` bytes, the largest run that cannot overflow a `u32`.

/// CRC-32 slicing-by-8 lookup tables (polynomial 0xEDB88320, reflected).
///
/// Table 0 is the classic byte-at-a-time table.
const CRC32_TABLE: [[u32; 256]; 8] = {
    let mut tables = [[0u32; 256]; 8];

    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        tables[0][i] = crc;
        i += 1;
    }

    let mut t = 1;
    while t < 8 {
        let mut i = 0usize;
        while i < 256 {
            let prev = tables[t - 1][i];
            tables[t][i] = tables[0][(prev & 0xFF) as usize] ^ (prev >> 8);
            i += 1;
        }
        t += 1;
    }

    tables
};

/// Largest prime smaller than 65536.
const ADLER_MOD: u32 = 65521;

/// Number of bytes that can be summed before a reduction is required.
const NMAX: usize = 5552;

/// CRC-32 calculator (ISO 3309).
///
/// - Polynomial: 0x04C11DB7 (reflected: 0xEDB88320)
/// - Initial value: 0xFFFFFFFF
/// - Final XOR: 0xFFFFFFFF
///
/// # Example
///
/// ```
/// use oxiflate_core::checksum::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"Hello, ");
/// crc.update(b"World!");
/// assert_eq!(crc.value(), 0xEC4AC3D0);
///
/// // Resume from a previously observed value.
/// let mut resumed = Crc32::with_seed(Crc32::compute(b"Hello, "));
/// resumed.update(b"World!");
/// assert_eq!(resumed.value(), 0xEC4AC3D0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    crc: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a calculator that continues from a previous CRC value.
    pub fn with_seed(value: u32) -> Self {
        Self { crc: !value }
    }

    /// Reset the CRC to its initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        if data.len() >= 16 {
            crc32_slice8(&mut self.crc, data);
        } else {
            crc32_sw(&mut self.crc, data);
        }
    }

    /// Current CRC value of everything seen so far.
    #[inline(always)]
    pub fn value(&self) -> u32 {
        !self.crc
    }

    /// Compute CRC-32 for a slice in one call.
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.value()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn crc32_sw(crc: &mut u32, data: &[u8]) {
    for &byte in data {
        let index = ((*crc ^ byte as u32) & 0xFF) as usize;
        *crc = CRC32_TABLE[0][index] ^ (*crc >> 8);
    }
}

#[inline]
fn crc32_slice8(crc: &mut u32, data: &[u8]) {
    let mut c = *crc;
    let mut chunks = data.chunks_exact(8);

    for bytes in &mut chunks {
        let low = c ^ u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        c = CRC32_TABLE[7][(low & 0xFF) as usize]
            ^ CRC32_TABLE[6][((low >> 8) & 0xFF) as usize]
            ^ CRC32_TABLE[5][((low >> 16) & 0xFF) as usize]
            ^ CRC32_TABLE[4][(low >> 24) as usize]
            ^ CRC32_TABLE[3][bytes[4] as usize]
            ^ CRC32_TABLE[2][bytes[5] as usize]
            ^ CRC32_TABLE[1][bytes[6] as usize]
            ^ CRC32_TABLE[0][bytes[7] as usize];
    }

    *crc = c;
    crc32_sw(crc, chunks.remainder());
}

/// Adler-32 checksum calculator.
///
/// Two running sums modulo 65521: `a` is one plus the sum of all bytes,
/// `b` is the sum of every intermediate `a`. The checksum is `b << 16 | a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new Adler-32 calculator (value 1).
    pub fn new() -> Self {
        Self::with_seed(1)
    }

    /// Create a calculator that continues from a previous Adler-32 value.
    pub fn with_seed(value: u32) -> Self {
        Self {
            a: (value & 0xFFFF) % ADLER_MOD,
            b: (value >> 16) % ADLER_MOD,
        }
    }

    /// Reset to the initial value.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Update the checksum with more data.
    pub fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                a += byte as u32;
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }

        self.a = a;
        self.b = b;
    }

    /// Current checksum value.
    #[inline]
    pub fn value(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Compute the Adler-32 of `data` in one shot.
    pub fn compute(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.value()
    }

    /// Combine `adler1` (of sequence A) with `adler2` (of sequence B, `len2`
    /// bytes long) into the checksum of A followed by B.
    pub fn combine(adler1: u32, adler2: u32, len2: u64) -> u32 {
        let rem = (len2 % ADLER_MOD as u64) as u32;
        let mut sum1 = adler1 & 0xFFFF;
        let mut sum2 = (rem * sum1) % ADLER_MOD;

        sum1 += (adler2 & 0xFFFF) + ADLER_MOD - 1;
        sum2 += ((adler1 >> 16) & 0xFFFF) + ((adler2 >> 16) & 0xFFFF) + ADLER_MOD - rem;

        if sum1 >= ADLER_MOD {
            sum1 -= ADLER_MOD;
        }
        if sum1 >= ADLER_MOD {
            sum1 -= ADLER_MOD;
        }
        if sum2 >= ADLER_MOD << 1 {
            sum2 -= ADLER_MOD << 1;
        }
        if sum2 >= ADLER_MOD {
            sum2 -= ADLER_MOD;
        }

        (sum2 << 16) | sum1
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Bitwise reference CRC-32, no tables.
    fn crc32_reference(data: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &byte in data {
            crc ^= byte as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB88320
                } else {
                    crc >> 1
                };
            }
        }
        !crc
    }

    /// Direct-definition reference Adler-32.
    fn adler32_reference(data: &[u8]) -> u32 {
        let mut a = 1u64;
        let mut b = 0u64;
        for &byte in data {
            a = (a + byte as u64) % 65521;
            b = (b + a) % 65521;
        }
        ((b << 16) | a) as u32
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(Crc32::compute(b""), 0);
    }

    #[test]
    fn test_crc32_check() {
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_crc32_hello_world() {
        assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
    }

    #[test]
    fn test_crc32_matches_reference() {
        let mut rng = StdRng::seed_from_u64(0x0C0F_FEE0);
        for len in [0usize, 1, 7, 8, 15, 16, 17, 63, 64, 1000, 4099] {
            let data: Vec<u8> = (0..len).map(|_| rng.r#gen()).collect();
            assert_eq!(Crc32::compute(&data), crc32_reference(&data), "len {}", len);
        }
    }

    #[test]
    fn test_crc32_seed_resumes() {
        let data = b"The quick brown fox jumps over the lazy dog";
        for split in 0..data.len() {
            let mut crc = Crc32::with_seed(Crc32::compute(&data[..split]));
            crc.update(&data[split..]);
            assert_eq!(crc.value(), Crc32::compute(data));
        }
    }

    #[test]
    fn test_adler32_empty() {
        assert_eq!(Adler32::compute(&[]), 1);
    }

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(Adler32::compute(b"Hello"), 0x058C01F5);
        assert_eq!(Adler32::compute(b"Wikipedia"), 0x11E60398);
    }

    #[test]
    fn test_adler32_large_matches_reference() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data = vec![0xFFu8; NMAX * 3 + 11];
        rng.fill(&mut data[..100]);
        assert_eq!(Adler32::compute(&data), adler32_reference(&data));
    }

    #[test]
    fn test_adler32_seed_resumes() {
        let data = b"Hello, World!";
        let mut adler = Adler32::with_seed(Adler32::compute(&data[..6]));
        adler.update(&data[6..]);
        assert_eq!(adler.value(), Adler32::compute(data));
    }

    #[test]
    fn test_adler32_combine() {
        let mut rng = StdRng::seed_from_u64(99);
        let data: Vec<u8> = (0..70_000).map(|_| rng.r#gen()).collect();
        for split in [0usize, 1, 5552, 65521, 69_999, 70_000] {
            let (left, right) = data.split_at(split);
            let combined =
                Adler32::combine(Adler32::compute(left), Adler32::compute(right), right.len() as u64);
            assert_eq!(combined, Adler32::compute(&data), "split {}", split);
        }
    }
}
