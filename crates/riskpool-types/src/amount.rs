//! Integer amount arithmetic.
//!
//! Amounts are `u128`. Price comparisons and proportional fills multiply two
//! amounts before dividing, so they go through a 256-bit intermediate
//! ([`Wide`]) and never overflow before the division.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Result, RiskpoolError, constants::BASIS_POINTS_DENOMINATOR};

const LOW_MASK: u128 = u64::MAX as u128;

/// Unsigned 256-bit intermediate, `hi * 2^128 + lo`.
///
/// Field order matters: the derived `Ord` compares `hi` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Wide {
    hi: u128,
    lo: u128,
}

impl Wide {
    /// Full product of two `u128` values.
    #[must_use]
    pub fn mul(a: u128, b: u128) -> Self {
        let (a_lo, a_hi) = (a & LOW_MASK, a >> 64);
        let (b_lo, b_hi) = (b & LOW_MASK, b >> 64);

        let ll = a_lo * b_lo;
        let lh = a_lo * b_hi;
        let hl = a_hi * b_lo;
        let hh = a_hi * b_hi;

        // Each term is below 2^64, so the sum fits comfortably.
        let mid = (ll >> 64) + (lh & LOW_MASK) + (hl & LOW_MASK);
        let lo = (ll & LOW_MASK) | ((mid & LOW_MASK) << 64);
        let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
        Self { hi, lo }
    }

    /// Floor division by a `u128` divisor. `None` on a zero divisor or when
    /// the quotient does not fit in `u128`.
    #[must_use]
    pub fn div_floor(self, divisor: u128) -> Option<u128> {
        if divisor == 0 || self.hi >= divisor {
            return None;
        }
        let mut rem = self.hi;
        let mut quot: u128 = 0;
        for bit in (0..128).rev() {
            let carry = rem >> 127;
            rem = (rem << 1) | ((self.lo >> bit) & 1);
            quot <<= 1;
            if carry == 1 || rem >= divisor {
                rem = rem.wrapping_sub(divisor);
                quot |= 1;
            }
        }
        Some(quot)
    }
}

/// `floor(a * b / denom)` without intermediate overflow.
pub fn mul_div_floor(a: u128, b: u128, denom: u128) -> Result<u128> {
    Wide::mul(a, b)
        .div_floor(denom)
        .ok_or(RiskpoolError::Overflow {
            context: "mul_div_floor",
        })
}

/// Compare `a * b` against `c * d` exactly.
#[must_use]
pub fn cmp_products(a: u128, b: u128, c: u128, d: u128) -> Ordering {
    Wide::mul(a, b).cmp(&Wide::mul(c, d))
}

/// Checked addition with a named overflow context.
pub fn checked_add(a: u128, b: u128, context: &'static str) -> Result<u128> {
    a.checked_add(b).ok_or(RiskpoolError::Overflow { context })
}

/// Checked subtraction with a named overflow context.
pub fn checked_sub(a: u128, b: u128, context: &'static str) -> Result<u128> {
    a.checked_sub(b).ok_or(RiskpoolError::Overflow { context })
}

/// Lossless `u128` → `Decimal` for display purposes, `None` when out of range.
#[must_use]
pub fn to_decimal(value: u128) -> Option<Decimal> {
    let signed = i128::try_from(value).ok()?;
    Decimal::try_from_i128_with_scale(signed, 0).ok()
}

// ---------------------------------------------------------------------------
// BasisPoints
// ---------------------------------------------------------------------------

/// A commission rate out of 10,000.
///
/// `fraction_of(P) = floor(P * bp / 10000)`. This scale is fixed: fixtures
/// carrying values such as 300 mean 3%.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BasisPoints(pub u16);

impl BasisPoints {
    pub const ZERO: Self = Self(0);

    /// Floor-rounded share of `amount`.
    pub fn fraction_of(self, amount: u128) -> Result<u128> {
        mul_div_floor(amount, u128::from(self.0), BASIS_POINTS_DENOMINATOR)
    }

    /// The rate as a percentage, e.g. `BasisPoints(250)` → `2.50`.
    #[must_use]
    pub fn as_percent(self) -> Decimal {
        Decimal::new(i64::from(self.0), 2)
    }
}

impl std::fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bp", self.0)
    }
}
