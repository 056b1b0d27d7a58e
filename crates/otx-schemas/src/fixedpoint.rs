//! Fixed-point money/price type shared by every crate in the workspace.
//!
//! # Motivation
//!
//! All prices, P&L, and position-value amounts in this system use a 1e-6
//! (micros) fixed-point representation stored as `i64`. Raw `i64` for money
//! is error-prone: it allows accidental arithmetic with unrelated integers
//! (quantities, instrument tokens, timestamps) without any compile-time
//! signal. `Micros` wraps the raw `i64` so the type system prevents mixing
//! it with unrelated `i64` values.
//!
//! # Scale
//!
//! 1 unit of quote currency = `Micros(1_000_000)`. Quantities (lots, legs,
//! counts) remain plain `i64`/`u32` and are never implicitly convertible.

use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(i64);

impl Micros {
    pub const ZERO: Micros = Micros(0);
    pub const MAX: Micros = Micros(i64::MAX);
    pub const MIN: Micros = Micros(i64::MIN);
    pub const SCALE: i64 = 1_000_000;

    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn saturating_add(self, rhs: Micros) -> Micros {
        Micros(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Micros) -> Micros {
        Micros(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub fn abs(self) -> Micros {
        Micros(self.0.saturating_abs())
    }

    #[inline]
    pub fn is_non_negative(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Multiply a per-unit price by an integer quantity. `None` on overflow —
    /// callers must handle it explicitly; a silent clamp would corrupt a
    /// position-value calculation feeding the risk gate.
    #[inline]
    pub fn checked_mul_qty(self, qty: i64) -> Option<Micros> {
        self.0.checked_mul(qty).map(Micros)
    }

    /// Round to `decimal_places` of precision (half-up), expressed in micros.
    /// `decimal_places` must be within `[0, 6]`.
    ///
    /// Used for indicator snapshot rounding (4 d.p.) and VWAP average fill
    /// price rounding (2 d.p.) per the testable-properties invariants.
    pub fn round_half_up(self, decimal_places: u32) -> Micros {
        debug_assert!(decimal_places <= 6);
        let step = 10i64.pow(6 - decimal_places);
        if step <= 1 {
            return self;
        }
        let v = self.0;
        let sign = if v < 0 { -1 } else { 1 };
        let abs = v.abs();
        let rounded = ((abs + step / 2) / step) * step;
        Micros(sign * rounded)
    }

    /// Convert to an `f64` for display/serialization contexts that need it.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Construct from a decimal string value (e.g. a config literal).
    pub fn from_decimal_str(s: &str) -> Option<Micros> {
        let f: f64 = s.parse().ok()?;
        Some(Micros((f * Self::SCALE as f64).round() as i64))
    }
}

impl Add for Micros {
    type Output = Micros;
    #[inline]
    fn add(self, rhs: Micros) -> Micros {
        Micros(self.0 + rhs.0)
    }
}

impl Sub for Micros {
    type Output = Micros;
    #[inline]
    fn sub(self, rhs: Micros) -> Micros {
        Micros(self.0 - rhs.0)
    }
}

impl Neg for Micros {
    type Output = Micros;
    #[inline]
    fn neg(self) -> Micros {
        Micros(-self.0)
    }
}

impl AddAssign for Micros {
    #[inline]
    fn add_assign(&mut self, rhs: Micros) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Micros {
    #[inline]
    fn sub_assign(&mut self, rhs: Micros) {
        self.0 -= rhs.0;
    }
}

/// Scale by a plain integer multiplier (e.g. lot size). Panics on overflow
/// in debug builds, matching standard integer semantics.
impl Mul<i64> for Micros {
    type Output = Micros;
    #[inline]
    fn mul(self, rhs: i64) -> Micros {
        Micros(self.0 * rhs)
    }
}

impl std::fmt::Display for Micros {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / Self::SCALE;
        let frac = (self.0 % Self::SCALE).abs();
        if self.0 < 0 && whole == 0 {
            write!(f, "-{whole}.{frac:06}")
        } else {
            write!(f, "{whole}.{frac:06}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_roundtrip() {
        let a = Micros::new(100_000_000);
        let b = Micros::new(25_000_000);
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn checked_mul_qty_overflow_returns_none() {
        assert_eq!(Micros::MAX.checked_mul_qty(2), None);
    }

    #[test]
    fn round_half_up_4dp() {
        // 1.234649 -> 1.2346 (half-up at the 5th decimal: .49 rounds down... check boundary)
        let v = Micros::new(1_234_650); // 1.23465
        assert_eq!(v.round_half_up(4), Micros::new(1_234_700));
    }

    #[test]
    fn round_half_up_2dp_vwap_style() {
        let v = Micros::new(150_125_000); // 150.125
        assert_eq!(v.round_half_up(2), Micros::new(150_130_000));
    }

    #[test]
    fn round_half_up_negative() {
        let v = Micros::new(-1_234_650);
        assert_eq!(v.round_half_up(4), Micros::new(-1_234_700));
    }

    #[test]
    fn display_formats_six_decimals() {
        assert_eq!(format!("{}", Micros::new(1_500_000)), "1.500000");
    }
}
