//! Fixed-width 128-bit unsigned arithmetic
//!
//! IPv6 range keys are 128 bits wide, which is wider than the machine word
//! the rest of the engine is written against. This module provides `U128`,
//! a two-limb (high/low u64) unsigned integer with exactly the operations
//! the range tree and the subnet decomposer need: comparison, wrapping
//! add/subtract with explicit carry propagation, and bit shifts that are
//! aware of limb crossings. No multiplication or division.
//!
//! The limb split doubles as the on-disk layout: `.v6` records store each
//! 128-bit bound as two little-endian u64 limbs (see [`crate::table`]).

use std::fmt;
use std::net::Ipv6Addr;

/// A 128-bit unsigned integer as two 64-bit limbs.
///
/// Field order is significant: `hi` before `lo` gives the derived
/// `Ord`/`PartialOrd` the correct numeric comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct U128 {
    hi: u64,
    lo: u64,
}

impl U128 {
    /// The value 0.
    pub const ZERO: U128 = U128 { hi: 0, lo: 0 };
    /// The value 1.
    pub const ONE: U128 = U128 { hi: 0, lo: 1 };
    /// The smallest value (0).
    pub const MIN: U128 = U128::ZERO;
    /// The largest value (2^128 - 1).
    pub const MAX: U128 = U128 {
        hi: u64::MAX,
        lo: u64::MAX,
    };

    /// Construct from high and low limbs.
    #[inline]
    pub const fn new(hi: u64, lo: u64) -> Self {
        U128 { hi, lo }
    }

    /// Widen a 64-bit value.
    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        U128 { hi: 0, lo: value }
    }

    /// High 64 bits.
    #[inline]
    pub const fn hi(self) -> u64 {
        self.hi
    }

    /// Low 64 bits.
    #[inline]
    pub const fn lo(self) -> u64 {
        self.lo
    }

    /// Addition modulo 2^128: the carry out of the low limb propagates
    /// into the high limb and overflow of the high limb is discarded.
    #[inline]
    pub const fn wrapping_add(self, rhs: U128) -> Self {
        let (lo, carry) = self.lo.overflowing_add(rhs.lo);
        let hi = self.hi.wrapping_add(rhs.hi).wrapping_add(carry as u64);
        U128 { hi, lo }
    }

    /// Subtraction modulo 2^128 with borrow propagation.
    #[inline]
    pub const fn wrapping_sub(self, rhs: U128) -> Self {
        let (lo, borrow) = self.lo.overflowing_sub(rhs.lo);
        let hi = self.hi.wrapping_sub(rhs.hi).wrapping_sub(borrow as u64);
        U128 { hi, lo }
    }

    /// Addition that reports overflow instead of wrapping.
    #[inline]
    pub fn checked_add(self, rhs: U128) -> Option<Self> {
        let sum = self.wrapping_add(rhs);
        if sum < self {
            None
        } else {
            Some(sum)
        }
    }

    /// Subtraction that reports underflow instead of wrapping.
    #[inline]
    pub fn checked_sub(self, rhs: U128) -> Option<Self> {
        if self < rhs {
            None
        } else {
            Some(self.wrapping_sub(rhs))
        }
    }

    /// Left shift by `count` bits; `count` must be in 0..=127.
    ///
    /// Shifts of 64 or more move the low limb into the high limb, so the
    /// per-limb shift amounts always stay below 64.
    #[inline]
    pub const fn shl(self, count: u32) -> Self {
        debug_assert!(count < 128);
        if count == 0 {
            self
        } else if count < 64 {
            U128 {
                hi: (self.hi << count) | (self.lo >> (64 - count)),
                lo: self.lo << count,
            }
        } else {
            U128 {
                hi: self.lo << (count - 64),
                lo: 0,
            }
        }
    }

    /// Right shift by `count` bits; `count` must be in 0..=127.
    #[inline]
    pub const fn shr(self, count: u32) -> Self {
        debug_assert!(count < 128);
        if count == 0 {
            self
        } else if count < 64 {
            U128 {
                hi: self.hi >> count,
                lo: (self.lo >> count) | (self.hi << (64 - count)),
            }
        } else {
            U128 {
                hi: 0,
                lo: self.hi >> (count - 64),
            }
        }
    }

    /// Number of leading zero bits (128 for zero).
    #[inline]
    pub const fn leading_zeros(self) -> u32 {
        if self.hi != 0 {
            self.hi.leading_zeros()
        } else {
            64 + self.lo.leading_zeros()
        }
    }

    /// Number of trailing zero bits (128 for zero).
    #[inline]
    pub const fn trailing_zeros(self) -> u32 {
        if self.lo != 0 {
            self.lo.trailing_zeros()
        } else {
            64 + self.hi.trailing_zeros()
        }
    }

    /// Whether the value is zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.hi == 0 && self.lo == 0
    }

    /// The value as a native `u128` (for formatting and tests).
    #[inline]
    pub const fn as_u128(self) -> u128 {
        ((self.hi as u128) << 64) | self.lo as u128
    }
}

impl From<u64> for U128 {
    fn from(value: u64) -> Self {
        U128::from_u64(value)
    }
}

impl From<Ipv6Addr> for U128 {
    fn from(addr: Ipv6Addr) -> Self {
        let octets = addr.octets();
        let mut hi = [0u8; 8];
        let mut lo = [0u8; 8];
        hi.copy_from_slice(&octets[..8]);
        lo.copy_from_slice(&octets[8..]);
        U128 {
            hi: u64::from_be_bytes(hi),
            lo: u64::from_be_bytes(lo),
        }
    }
}

impl From<U128> for Ipv6Addr {
    fn from(value: U128) -> Self {
        let mut octets = [0u8; 16];
        octets[..8].copy_from_slice(&value.hi.to_be_bytes());
        octets[8..].copy_from_slice(&value.lo.to_be_bytes());
        Ipv6Addr::from(octets)
    }
}

impl fmt::Display for U128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u128())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wide(v: u128) -> U128 {
        U128::new((v >> 64) as u64, v as u64)
    }

    #[test]
    fn test_constants() {
        assert_eq!(U128::ZERO.as_u128(), 0);
        assert_eq!(U128::ONE.as_u128(), 1);
        assert_eq!(U128::MAX.as_u128(), u128::MAX);
    }

    #[test]
    fn test_carry_propagation() {
        let a = U128::new(0, u64::MAX);
        let sum = a.wrapping_add(U128::ONE);
        assert_eq!(sum, U128::new(1, 0));
        assert_eq!(sum.wrapping_sub(U128::ONE), a);
    }

    #[test]
    fn test_wraparound() {
        assert_eq!(U128::MAX.wrapping_add(U128::ONE), U128::ZERO);
        assert_eq!(U128::ZERO.wrapping_sub(U128::ONE), U128::MAX);
        assert_eq!(U128::MAX.checked_add(U128::ONE), None);
        assert_eq!(U128::ZERO.checked_sub(U128::ONE), None);
    }

    #[test]
    fn test_shift_limb_crossing() {
        let one = U128::ONE;
        assert_eq!(one.shl(64), U128::new(1, 0));
        assert_eq!(one.shl(127), U128::new(1 << 63, 0));
        assert_eq!(U128::new(1 << 63, 0).shr(127), U128::ONE);
        assert_eq!(U128::new(0x8000_0000_0000_0001, 0).shr(64).lo(), 0x8000_0000_0000_0001);
    }

    #[test]
    fn test_ordering() {
        assert!(U128::new(1, 0) > U128::new(0, u64::MAX));
        assert!(U128::ZERO < U128::ONE);
        assert!(U128::new(2, 5) > U128::new(2, 4));
    }

    #[test]
    fn test_bit_counts() {
        assert_eq!(U128::ZERO.leading_zeros(), 128);
        assert_eq!(U128::ZERO.trailing_zeros(), 128);
        assert_eq!(U128::ONE.leading_zeros(), 127);
        assert_eq!(U128::new(1, 0).trailing_zeros(), 64);
        assert_eq!(U128::MAX.leading_zeros(), 0);
    }

    #[test]
    fn test_ipv6_round_trip() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let value = U128::from(addr);
        assert_eq!(Ipv6Addr::from(value), addr);
        assert_eq!(value.hi(), 0x2001_0db8_0000_0000);
        assert_eq!(value.lo(), 1);
    }

    proptest! {
        #[test]
        fn prop_add_matches_native(a: u128, b: u128) {
            prop_assert_eq!(wide(a).wrapping_add(wide(b)).as_u128(), a.wrapping_add(b));
        }

        #[test]
        fn prop_sub_matches_native(a: u128, b: u128) {
            prop_assert_eq!(wide(a).wrapping_sub(wide(b)).as_u128(), a.wrapping_sub(b));
        }

        #[test]
        fn prop_add_then_sub_is_identity(a: u128, b: u128) {
            let w = wide(a).wrapping_add(wide(b)).wrapping_sub(wide(b));
            prop_assert_eq!(w, wide(a));
        }

        #[test]
        fn prop_shifts_match_native(a: u128, count in 0u32..128) {
            prop_assert_eq!(wide(a).shl(count).as_u128(), a << count);
            prop_assert_eq!(wide(a).shr(count).as_u128(), a >> count);
        }

        #[test]
        fn prop_shift_round_trip(a: u128, count in 0u32..128) {
            // Shifting back recovers the original when no bits fall off.
            if a.leading_zeros() >= count {
                prop_assert_eq!(wide(a).shl(count).shr(count), wide(a));
            }
            if a.trailing_zeros() >= count {
                prop_assert_eq!(wide(a).shr(count).shl(count), wide(a));
            }
        }

        #[test]
        fn prop_ordering_matches_native(a: u128, b: u128) {
            prop_assert_eq!(wide(a).cmp(&wide(b)), a.cmp(&b));
        }

        #[test]
        fn prop_bit_counts_match_native(a: u128) {
            prop_assert_eq!(wide(a).leading_zeros(), a.leading_zeros());
            prop_assert_eq!(wide(a).trailing_zeros(), a.trailing_zeros());
        }
    }
}
