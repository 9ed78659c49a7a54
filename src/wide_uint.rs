//! 128-bit unsigned integer used for frame counts and byte totals.
//!
//! # Representation
//! Two 64-bit limbs, least-significant limb first.  On the wire a value
//! occupies 16 bytes: the low limb followed by the high limb, each in the
//! platform's native byte order (see [`WideUint::to_ne_bytes`]).
//!
//! # Arithmetic
//! Every operation wraps modulo 2^128.  There is no overflow detection.
//! Division and remainder share one restoring long-division scan; dividing
//! by zero panics, the same way primitive integers do.  Use
//! [`WideUint::checked_div`] / [`WideUint::checked_rem`] when the divisor
//! may be zero.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{
    Add, AddAssign, BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Div,
    DivAssign, Mul, MulAssign, Not, Rem, RemAssign, Shl, ShlAssign, Shr, ShrAssign, Sub,
    SubAssign,
};

use byteorder::{ByteOrder, NativeEndian};
use serde::{Serialize, Serializer};

const LIMBS: usize = 2;
const LIMB_BITS: u32 = u64::BITS;

/// Encoded width in bytes.
pub const WIDE_UINT_SIZE: usize = 16;

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WideUint {
    limbs: [u64; LIMBS],
}

impl WideUint {
    pub const BITS: u32 = 128;
    pub const ZERO: Self = Self { limbs: [0, 0] };
    pub const ONE: Self = Self { limbs: [1, 0] };
    pub const MAX: Self = Self { limbs: [u64::MAX, u64::MAX] };

    pub const fn from_limbs(low: u64, high: u64) -> Self {
        Self { limbs: [low, high] }
    }

    pub const fn low(self) -> u64 {
        self.limbs[0]
    }

    pub const fn high(self) -> u64 {
        self.limbs[1]
    }

    pub const fn from_u128(value: u128) -> Self {
        Self::from_limbs(value as u64, (value >> 64) as u64)
    }

    pub const fn to_u128(self) -> u128 {
        ((self.limbs[1] as u128) << 64) | self.limbs[0] as u128
    }

    pub const fn is_zero(self) -> bool {
        self.limbs[0] == 0 && self.limbs[1] == 0
    }

    // ── Narrowing (keeps the low-order bits) ─────────────────────────────────

    pub const fn low_u64(self) -> u64 {
        self.limbs[0]
    }

    pub const fn low_u32(self) -> u32 {
        self.limbs[0] as u32
    }

    pub const fn low_u16(self) -> u16 {
        self.limbs[0] as u16
    }

    pub const fn low_u8(self) -> u8 {
        self.limbs[0] as u8
    }

    // ── Bits ─────────────────────────────────────────────────────────────────

    /// Whether bit `index` is set.  Indices ≥ 128 read as zero.
    pub fn bit(self, index: u32) -> bool {
        if index >= Self::BITS {
            return false;
        }
        let limb = (index / LIMB_BITS) as usize;
        (self.limbs[limb] >> (index % LIMB_BITS)) & 1 == 1
    }

    fn with_bit(mut self, index: u32) -> Self {
        let limb = (index / LIMB_BITS) as usize;
        self.limbs[limb] |= 1 << (index % LIMB_BITS);
        self
    }

    pub fn leading_zeros(self) -> u32 {
        if self.limbs[1] != 0 {
            self.limbs[1].leading_zeros()
        } else {
            LIMB_BITS + self.limbs[0].leading_zeros()
        }
    }

    /// Logical left shift.  A count of 128 or more yields zero.
    pub fn shl_bits(self, count: u32) -> Self {
        if count >= Self::BITS {
            return Self::ZERO;
        }
        let limb_shift = (count / LIMB_BITS) as usize;
        let bit_shift = count % LIMB_BITS;
        let mut out = [0u64; LIMBS];
        for i in limb_shift..LIMBS {
            let src = i - limb_shift;
            out[i] = self.limbs[src] << bit_shift;
            if bit_shift != 0 && src > 0 {
                out[i] |= self.limbs[src - 1] >> (LIMB_BITS - bit_shift);
            }
        }
        Self { limbs: out }
    }

    /// Logical right shift.  A count of 128 or more yields zero.
    pub fn shr_bits(self, count: u32) -> Self {
        if count >= Self::BITS {
            return Self::ZERO;
        }
        let limb_shift = (count / LIMB_BITS) as usize;
        let bit_shift = count % LIMB_BITS;
        let mut out = [0u64; LIMBS];
        for i in 0..LIMBS - limb_shift {
            let src = i + limb_shift;
            out[i] = self.limbs[src] >> bit_shift;
            if bit_shift != 0 && src + 1 < LIMBS {
                out[i] |= self.limbs[src + 1] << (LIMB_BITS - bit_shift);
            }
        }
        Self { limbs: out }
    }

    // ── Arithmetic ───────────────────────────────────────────────────────────

    pub fn wrapping_add(self, rhs: Self) -> Self {
        let mut out = [0u64; LIMBS];
        let mut carry = false;
        for i in 0..LIMBS {
            let (sum, c1) = self.limbs[i].overflowing_add(rhs.limbs[i]);
            let (sum, c2) = sum.overflowing_add(carry as u64);
            out[i] = sum;
            carry = c1 || c2;
        }
        Self { limbs: out }
    }

    pub fn wrapping_sub(self, rhs: Self) -> Self {
        let mut out = [0u64; LIMBS];
        let mut borrow = false;
        for i in 0..LIMBS {
            let (diff, b1) = self.limbs[i].overflowing_sub(rhs.limbs[i]);
            let (diff, b2) = diff.overflowing_sub(borrow as u64);
            out[i] = diff;
            borrow = b1 || b2;
        }
        Self { limbs: out }
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        if self > rhs {
            self.wrapping_sub(rhs)
        } else {
            Self::ZERO
        }
    }

    /// Shift-and-add multiplication over all 128 multiplier bits.
    pub fn wrapping_mul(self, rhs: Self) -> Self {
        let mut acc = Self::ZERO;
        for i in 0..Self::BITS {
            if rhs.bit(i) {
                acc = acc.wrapping_add(self.shl_bits(i));
            }
        }
        acc
    }

    /// Quotient and remainder in one restoring long-division pass.
    ///
    /// # Panics
    /// If `divisor` is zero.
    pub fn div_rem(self, divisor: Self) -> (Self, Self) {
        assert!(!divisor.is_zero(), "attempt to divide by zero");
        // Largest shift that keeps the divisor's top bit inside bit 127.
        let top = divisor.leading_zeros();
        let mut quotient = Self::ZERO;
        let mut remainder = self;
        for i in (0..=top).rev() {
            let shifted = divisor.shl_bits(i);
            if shifted <= remainder {
                quotient = quotient.with_bit(i);
                remainder = remainder.wrapping_sub(shifted);
            }
        }
        (quotient, remainder)
    }

    pub fn checked_div(self, divisor: Self) -> Option<Self> {
        (!divisor.is_zero()).then(|| self.div_rem(divisor).0)
    }

    pub fn checked_rem(self, divisor: Self) -> Option<Self> {
        (!divisor.is_zero()).then(|| self.div_rem(divisor).1)
    }

    pub fn increment(&mut self) {
        *self = self.wrapping_add(Self::ONE);
    }

    pub fn decrement(&mut self) {
        *self = self.wrapping_sub(Self::ONE);
    }

    // ── Encoding ─────────────────────────────────────────────────────────────

    /// Low limb then high limb, each in native byte order.
    pub fn to_ne_bytes(self) -> [u8; WIDE_UINT_SIZE] {
        let mut out = [0u8; WIDE_UINT_SIZE];
        NativeEndian::write_u64(&mut out[..8], self.limbs[0]);
        NativeEndian::write_u64(&mut out[8..], self.limbs[1]);
        out
    }

    pub fn from_ne_bytes(bytes: [u8; WIDE_UINT_SIZE]) -> Self {
        Self::read_ne(&bytes)
    }

    /// Decode from the first 16 bytes of `buf`.
    ///
    /// # Panics
    /// If `buf` is shorter than 16 bytes.
    pub fn read_ne(buf: &[u8]) -> Self {
        Self::from_limbs(
            NativeEndian::read_u64(&buf[..8]),
            NativeEndian::read_u64(&buf[8..WIDE_UINT_SIZE]),
        )
    }

    /// Encode into the first 16 bytes of `buf`.
    ///
    /// # Panics
    /// If `buf` is shorter than 16 bytes.
    pub fn write_ne(self, buf: &mut [u8]) {
        buf[..WIDE_UINT_SIZE].copy_from_slice(&self.to_ne_bytes());
    }
}

// ── Conversions ──────────────────────────────────────────────────────────────

impl From<u64> for WideUint {
    fn from(value: u64) -> Self {
        Self::from_limbs(value, 0)
    }
}

impl From<u32> for WideUint {
    fn from(value: u32) -> Self {
        Self::from(value as u64)
    }
}

impl From<u16> for WideUint {
    fn from(value: u16) -> Self {
        Self::from(value as u64)
    }
}

impl From<u8> for WideUint {
    fn from(value: u8) -> Self {
        Self::from(value as u64)
    }
}

impl From<usize> for WideUint {
    fn from(value: usize) -> Self {
        Self::from(value as u64)
    }
}

// ── Ordering ─────────────────────────────────────────────────────────────────

impl Ord for WideUint {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..LIMBS).rev() {
            match self.limbs[i].cmp(&other.limbs[i]) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for WideUint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── Operators ────────────────────────────────────────────────────────────────

impl Add for WideUint {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

impl Sub for WideUint {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.wrapping_sub(rhs)
    }
}

impl Mul for WideUint {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.wrapping_mul(rhs)
    }
}

impl Div for WideUint {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        self.div_rem(rhs).0
    }
}

impl Rem for WideUint {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        self.div_rem(rhs).1
    }
}

impl BitAnd for WideUint {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self::from_limbs(self.limbs[0] & rhs.limbs[0], self.limbs[1] & rhs.limbs[1])
    }
}

impl BitOr for WideUint {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self::from_limbs(self.limbs[0] | rhs.limbs[0], self.limbs[1] | rhs.limbs[1])
    }
}

impl BitXor for WideUint {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        Self::from_limbs(self.limbs[0] ^ rhs.limbs[0], self.limbs[1] ^ rhs.limbs[1])
    }
}

impl Not for WideUint {
    type Output = Self;
    fn not(self) -> Self {
        Self::from_limbs(!self.limbs[0], !self.limbs[1])
    }
}

impl Shl<u32> for WideUint {
    type Output = Self;
    fn shl(self, count: u32) -> Self {
        self.shl_bits(count)
    }
}

impl Shr<u32> for WideUint {
    type Output = Self;
    fn shr(self, count: u32) -> Self {
        self.shr_bits(count)
    }
}

impl AddAssign for WideUint {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for WideUint {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for WideUint {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for WideUint {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl RemAssign for WideUint {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl BitAndAssign for WideUint {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}

impl BitOrAssign for WideUint {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl BitXorAssign for WideUint {
    fn bitxor_assign(&mut self, rhs: Self) {
        *self = *self ^ rhs;
    }
}

impl ShlAssign<u32> for WideUint {
    fn shl_assign(&mut self, count: u32) {
        *self = *self << count;
    }
}

impl ShrAssign<u32> for WideUint {
    fn shr_assign(&mut self, count: u32) {
        *self = *self >> count;
    }
}

// ── Formatting ───────────────────────────────────────────────────────────────

impl fmt::Display for WideUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.pad_integral(true, "", "0");
        }
        let ten = Self::from(10u64);
        let mut digits = Vec::with_capacity(39);
        let mut rest = *self;
        while !rest.is_zero() {
            let (q, r) = rest.div_rem(ten);
            digits.push(b'0' + r.low_u8());
            rest = q;
        }
        digits.reverse();
        // Only ASCII digits were pushed.
        let text = String::from_utf8_lossy(&digits);
        f.pad_integral(true, "", &text)
    }
}

impl fmt::Debug for WideUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WideUint({self})")
    }
}

impl fmt::LowerHex for WideUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = if self.limbs[1] == 0 {
            format!("{:x}", self.limbs[0])
        } else {
            format!("{:x}{:016x}", self.limbs[1], self.limbs[0])
        };
        f.pad_integral(true, "0x", &text)
    }
}

impl Serialize for WideUint {
    /// Serialised as a decimal string; JSON numbers cannot hold 128 bits.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
