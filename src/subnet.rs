//! Subnet decomposition of address ranges
//!
//! Range tables store arbitrary `[lo, hi]` spans, but firewall tables and
//! routing configs want CIDR blocks. [`subnets`] decomposes a range into
//! the minimal set of power-of-two-aligned blocks covering exactly
//! `[lo, hi]`: greedily take the largest `2^m` such that `lo` is
//! `2^m`-aligned and `lo + 2^m - 1 ≤ hi`, emit `lo/(W-m)`, advance, repeat.
//! The greedy choice is exact and terminates in O(address width) steps.

use crate::range_tree::RangeKey;
use crate::wide::U128;

/// An address key that supports the bit arithmetic decomposition needs.
pub trait Address: RangeKey {
    /// Address width in bits (32 or 128).
    const BITS: u32;

    /// Number of trailing zero bits (`BITS` for zero): the alignment of
    /// the largest block that can start at this address.
    fn trailing_zeros(self) -> u32;

    /// Number of leading zero bits (`BITS` for zero).
    fn leading_zeros(self) -> u32;

    /// `2^exp`; `exp` must be below `BITS`.
    fn pow2(exp: u32) -> Self;

    /// `self - rhs`; callers guarantee `self >= rhs`.
    fn distance_down(self, rhs: Self) -> Self;

    /// `self + rhs`, or `None` past the top of the address space.
    fn checked_add(self, rhs: Self) -> Option<Self>;
}

impl Address for u32 {
    const BITS: u32 = 32;

    fn trailing_zeros(self) -> u32 {
        self.trailing_zeros()
    }
    fn leading_zeros(self) -> u32 {
        self.leading_zeros()
    }
    fn pow2(exp: u32) -> Self {
        1u32 << exp
    }
    fn distance_down(self, rhs: Self) -> Self {
        self - rhs
    }
    fn checked_add(self, rhs: Self) -> Option<Self> {
        self.checked_add(rhs)
    }
}

impl Address for U128 {
    const BITS: u32 = 128;

    fn trailing_zeros(self) -> u32 {
        U128::trailing_zeros(self)
    }
    fn leading_zeros(self) -> u32 {
        U128::leading_zeros(self)
    }
    fn pow2(exp: u32) -> Self {
        U128::ONE.shl(exp)
    }
    fn distance_down(self, rhs: Self) -> Self {
        self.wrapping_sub(rhs)
    }
    fn checked_add(self, rhs: Self) -> Option<Self> {
        U128::checked_add(self, rhs)
    }
}

/// Iterator over the minimal CIDR blocks covering `[lo, hi]` exactly.
///
/// Yields `(block_start, prefix_len)` pairs in ascending order.
pub struct Subnets<A> {
    cur: A,
    hi: A,
    done: bool,
}

/// Decompose the inclusive range `[lo, hi]` into CIDR blocks.
pub fn subnets<A: Address>(lo: A, hi: A) -> Subnets<A> {
    debug_assert!(lo <= hi);
    Subnets {
        cur: lo,
        hi,
        done: lo > hi,
    }
}

impl<A: Address> Iterator for Subnets<A> {
    type Item = (A, u8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Largest block that fits in the remaining span...
        let span = self.hi.distance_down(self.cur);
        let mut m = match span.checked_incr() {
            // span + 1 overflowed: the range is the whole address space.
            None => A::BITS,
            Some(count) => A::BITS - 1 - count.leading_zeros(),
        };
        // ...clamped to the alignment of the current start.
        m = m.min(self.cur.trailing_zeros());

        let start = self.cur;
        if m >= A::BITS {
            self.done = true;
            return Some((start, 0));
        }
        match self.cur.checked_add(A::pow2(m)) {
            Some(next) if next <= self.hi => self.cur = next,
            _ => self.done = true,
        }
        Some((start, (A::BITS - m) as u8))
    }
}
