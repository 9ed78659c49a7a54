//! Reflected CRC-32 (ISO-HDLC / IEEE 802.3) used for per-frame integrity.
//!
//! The 256-entry lookup table is generated at compile time from the
//! reflected generator polynomial and shared read-only by every [`Crc32`].

/// Reflected generator polynomial.
pub const GENERATOR: u32 = 0xEDB8_8320;
/// Default initial accumulator.
pub const INITIAL: u32 = 0xFFFF_FFFF;
const FINAL_XOR: u32 = 0xFFFF_FFFF;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut bit = 0;
        while bit < 8 {
            c = if c & 1 != 0 { GENERATOR ^ (c >> 1) } else { c >> 1 };
            bit += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

/// Running CRC-32 accumulator.
///
/// Reading the digest with [`Crc32::value`] does not reset or consume the
/// state; more bytes can be pushed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub const fn new() -> Self {
        Self::with_initial(INITIAL)
    }

    /// Start from a custom accumulator value.
    pub const fn with_initial(initial: u32) -> Self {
        Self { state: initial }
    }

    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.state = TABLE[((self.state ^ byte as u32) & 0xFF) as usize] ^ (self.state >> 8);
    }

    pub fn push_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    pub fn push_block<const N: usize>(&mut self, block: &[u8; N]) {
        self.push_slice(block);
    }

    pub fn value(&self) -> u32 {
        self.state ^ FINAL_XOR
    }
}

/// One-shot digest of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.push_slice(bytes);
    crc.value()
}
