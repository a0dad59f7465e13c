//! Deterministic numeric model.
//!
//! Every quantity that can grow past ~10^15 (resource balances, owned
//! counts, production, costs, multipliers) is a [`BigNum`]: a normalized
//! decimal mantissa in `[1, 10)` paired with a base-10 exponent. The mantissa
//! is a [`rust_decimal::Decimal`], so all arithmetic is carried out in
//! software and produces identical bits on every platform. Hardware floats are
//! never used for simulation state.
//!
//! Small bounded ratios handed to hosts (progress fractions) use the
//! fixed-point [`Fixed`] type.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use fixed::types::I32F32;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GameError;

/// Fixed-point type for bounded ratios (progress fractions, percentages).
pub type Fixed = I32F32;

/// Decimal places kept in a normalized mantissa.
///
/// Rounding every result to a fixed number of places keeps the textual
/// representation canonical, which makes serialized state comparable byte for
/// byte.
const MANTISSA_DP: u32 = 24;

/// Largest exponent gap at which the smaller addend still affects the sum.
const MAX_ALIGN: i64 = 28;

/// Exponent used when a result saturates.
const SATURATED_EXPONENT: i64 = i64::MAX / 4;

/// Arbitrary-magnitude decimal number.
///
/// Invariant: either the mantissa is zero and the exponent is zero, or
/// `1 <= |mantissa| < 10` with at most [`MANTISSA_DP`] decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BigNum {
    mantissa: Decimal,
    exponent: i64,
}

/// Returns `10^n` for `n <= 28`.
fn pow10(n: u32) -> Decimal {
    debug_assert!(n <= 28);
    Decimal::from_i128_with_scale(10_i128.pow(n), 0)
}

impl BigNum {
    /// Zero.
    pub const ZERO: Self = Self {
        mantissa: Decimal::ZERO,
        exponent: 0,
    };

    /// One.
    pub const ONE: Self = Self {
        mantissa: Decimal::ONE,
        exponent: 0,
    };

    /// Build a normalized value from `mantissa × 10^exponent`.
    #[must_use]
    pub fn from_parts(mantissa: Decimal, exponent: i64) -> Self {
        if mantissa.is_zero() {
            return Self::ZERO;
        }
        let ten = Decimal::TEN;
        let mut m = mantissa;
        let mut e = exponent;
        while m.abs() >= ten {
            m /= ten;
            e = e.saturating_add(1);
        }
        while m.abs() < Decimal::ONE {
            m *= ten;
            e = e.saturating_sub(1);
        }
        m = m.round_dp(MANTISSA_DP);
        if m.abs() >= ten {
            m /= ten;
            e = e.saturating_add(1);
        }
        Self {
            mantissa: m.normalize(),
            exponent: e,
        }
    }

    /// Build a value from a plain decimal.
    #[must_use]
    pub fn from_decimal(value: Decimal) -> Self {
        Self::from_parts(value, 0)
    }

    /// Normalized mantissa.
    #[must_use]
    pub const fn mantissa(&self) -> Decimal {
        self.mantissa
    }

    /// Base-10 exponent.
    #[must_use]
    pub const fn exponent(&self) -> i64 {
        self.exponent
    }

    /// Check if this value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// Check if this value is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.mantissa.is_sign_negative() && !self.mantissa.is_zero()
    }

    /// Check if this value is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && !self.is_negative()
    }

    fn signum(&self) -> i8 {
        if self.is_zero() {
            0
        } else if self.is_negative() {
            -1
        } else {
            1
        }
    }

    /// Largest of two values.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }

    /// Round toward negative infinity.
    #[must_use]
    pub fn floor(self) -> Self {
        if self.is_zero() || self.exponent >= i64::from(MANTISSA_DP) {
            return self;
        }
        if self.exponent < 0 {
            return if self.is_negative() {
                -Self::ONE
            } else {
                Self::ZERO
            };
        }
        let whole = (self.mantissa * pow10(self.exponent as u32)).floor();
        Self::from_decimal(whole)
    }

    /// Convert to a plain decimal when the magnitude fits.
    #[must_use]
    pub fn to_decimal(&self) -> Option<Decimal> {
        if self.is_zero() {
            return Some(Decimal::ZERO);
        }
        match self.exponent {
            e if e > 27 => None,
            e if e < -28 => Some(Decimal::ZERO),
            e if e >= 0 => self.mantissa.checked_mul(pow10(e as u32)),
            e => self.mantissa.checked_div(pow10((-e) as u32)),
        }
    }

    /// Whole part as `u64`, saturating at both ends.
    #[must_use]
    pub fn to_u64_saturating(&self) -> u64 {
        if !self.is_positive() || self.exponent < 0 {
            return 0;
        }
        if self.exponent > 19 {
            return u64::MAX;
        }
        (self.mantissa * pow10(self.exponent as u32))
            .floor()
            .to_u64()
            .unwrap_or(u64::MAX)
    }

    /// Base-10 logarithm of a positive value.
    ///
    /// Returns `None` for zero and negative values.
    #[must_use]
    pub fn log10(&self) -> Option<Decimal> {
        if !self.is_positive() {
            return None;
        }
        Some(self.mantissa.log10() + Decimal::from(self.exponent))
    }

    /// Inverse of [`log10`](Self::log10): build `10^log`.
    #[must_use]
    pub fn from_log10(log: Decimal) -> Self {
        let whole = log.floor();
        let frac = log - whole;
        let Some(exponent) = whole.to_i64() else {
            return if log.is_sign_negative() {
                Self::ZERO
            } else {
                Self::saturated()
            };
        };
        let mantissa = Decimal::TEN.checked_powd(frac).unwrap_or(Decimal::ONE);
        Self::from_parts(mantissa, exponent)
    }

    /// Value used when a computation overflows the exponent range.
    #[must_use]
    pub fn saturated() -> Self {
        Self {
            mantissa: Decimal::ONE,
            exponent: SATURATED_EXPONENT,
        }
    }

    /// Raise a positive value to a decimal power.
    ///
    /// Zero stays zero; negative bases have no real result here and also
    /// return zero.
    #[must_use]
    pub fn pow(self, exponent: Decimal) -> Self {
        if exponent.is_zero() || self == Self::ONE {
            return Self::ONE;
        }
        let Some(log) = self.log10() else {
            debug_assert!(!self.is_negative(), "pow of a negative base");
            return Self::ZERO;
        };
        match log.checked_mul(exponent) {
            Some(scaled) => Self::from_log10(scaled),
            None if log.is_sign_negative() != exponent.is_sign_negative() => Self::ZERO,
            None => Self::saturated(),
        }
    }

    /// Raise to a non-negative integer power by repeated squaring.
    #[must_use]
    pub fn powi(self, mut n: u64) -> Self {
        let mut result = Self::ONE;
        let mut base = self;
        while n > 0 {
            if n & 1 == 1 {
                result = result * base;
            }
            n >>= 1;
            if n > 0 {
                base = base * base;
            }
        }
        result
    }

    /// Multiply by a plain decimal factor.
    #[must_use]
    pub fn scale(self, factor: Decimal) -> Self {
        self * Self::from_decimal(factor)
    }
}

impl Default for BigNum {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<u64> for BigNum {
    fn from(value: u64) -> Self {
        Self::from_decimal(Decimal::from(value))
    }
}

impl From<u32> for BigNum {
    fn from(value: u32) -> Self {
        Self::from_decimal(Decimal::from(value))
    }
}

impl From<Decimal> for BigNum {
    fn from(value: Decimal) -> Self {
        Self::from_decimal(value)
    }
}

impl PartialOrd for BigNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigNum {
    fn cmp(&self, other: &Self) -> Ordering {
        let (sa, sb) = (self.signum(), other.signum());
        if sa != sb {
            return sa.cmp(&sb);
        }
        if sa == 0 {
            return Ordering::Equal;
        }
        let magnitude = self
            .exponent
            .cmp(&other.exponent)
            .then_with(|| self.mantissa.abs().cmp(&other.mantissa.abs()));
        if sa > 0 {
            magnitude
        } else {
            magnitude.reverse()
        }
    }
}

impl Neg for BigNum {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            mantissa: -self.mantissa,
            exponent: self.exponent,
        }
    }
}

impl Add for BigNum {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let (big, small) = if self.exponent >= rhs.exponent {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let gap = big.exponent.saturating_sub(small.exponent);
        if gap > MAX_ALIGN {
            return big;
        }
        let aligned = small.mantissa / pow10(gap as u32);
        Self::from_parts(big.mantissa + aligned, big.exponent)
    }
}

impl Sub for BigNum {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self + (-rhs)
    }
}

impl Mul for BigNum {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.is_zero() || rhs.is_zero() {
            return Self::ZERO;
        }
        Self::from_parts(
            self.mantissa * rhs.mantissa,
            self.exponent.saturating_add(rhs.exponent),
        )
    }
}

impl Div for BigNum {
    type Output = Self;

    /// Division by zero yields zero.
    fn div(self, rhs: Self) -> Self::Output {
        if rhs.is_zero() {
            debug_assert!(false, "BigNum division by zero");
            return Self::ZERO;
        }
        if self.is_zero() {
            return Self::ZERO;
        }
        Self::from_parts(
            self.mantissa / rhs.mantissa,
            self.exponent.saturating_sub(rhs.exponent),
        )
    }
}

impl AddAssign for BigNum {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for BigNum {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for BigNum {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Sum for BigNum {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl fmt::Display for BigNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        if self.exponent == 0 {
            return write!(f, "{}", self.mantissa);
        }
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

impl FromStr for BigNum {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || GameError::InvalidNumber(s.to_string());
        let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
            Some(pos) => (&trimmed[..pos], &trimmed[pos + 1..]),
            None => (trimmed, "0"),
        };
        let mantissa = Decimal::from_str(mantissa).map_err(|_| invalid())?;
        let exponent = exponent.parse::<i64>().map_err(|_| invalid())?;
        Ok(Self::from_parts(mantissa, exponent))
    }
}

impl Serialize for BigNum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

struct BigNumVisitor;

impl Visitor<'_> for BigNumVisitor {
    type Value = BigNum;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string such as \"1.5e42\" or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        BigNum::from_str(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(BigNum::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(BigNum::from_decimal(Decimal::from(v)))
    }
}

impl<'de> Deserialize<'de> for BigNum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(BigNumVisitor)
    }
}

/// Bounded ratio `num / den` as a fixed-point value in `[0, 1]`.
///
/// A zero denominator counts as complete.
#[must_use]
pub fn ratio(num: u64, den: u64) -> Fixed {
    if den == 0 {
        return Fixed::from_num(1);
    }
    let num = num.min(den);
    let shift = (64 - den.leading_zeros()).saturating_sub(31);
    let (n, d) = (num >> shift, den >> shift);
    if d == 0 {
        return Fixed::from_num(1);
    }
    Fixed::from_num(n) / Fixed::from_num(d)
}

/// `base^n` for plain decimals by repeated squaring.
///
/// Saturates at [`Decimal::MAX`] instead of overflowing. Results too small to
/// represent round to zero.
#[must_use]
pub fn decimal_powi(base: Decimal, mut n: u64) -> Decimal {
    let mut result = Decimal::ONE;
    let mut acc = base;
    while n > 0 {
        if n & 1 == 1 {
            result = result.checked_mul(acc).unwrap_or(Decimal::MAX);
        }
        n >>= 1;
        if n > 0 {
            acc = acc.checked_mul(acc).unwrap_or(Decimal::MAX);
        }
    }
    result
}

/// Whole part of a non-negative decimal as `u64`, saturating.
#[must_use]
pub fn decimal_floor_u64(value: Decimal) -> u64 {
    if value.is_sign_negative() {
        return 0;
    }
    value.floor().to_u64().unwrap_or(u64::MAX)
}

/// Smallest whole number not below a non-negative decimal, saturating.
#[must_use]
pub fn decimal_ceil_u64(value: Decimal) -> u64 {
    if value.is_sign_negative() {
        return 0;
    }
    value.ceil().to_u64().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn num(s: &str) -> BigNum {
        s.parse().unwrap()
    }

    #[test]
    fn test_normalization() {
        let n = BigNum::from(12_345_u64);
        assert_eq!(n.mantissa(), Decimal::new(12345, 4));
        assert_eq!(n.exponent(), 4);
        assert_eq!(BigNum::from(0_u64), BigNum::ZERO);
    }

    #[test]
    fn test_add_aligns_exponents() {
        let sum = num("1e3") + num("5e1");
        assert_eq!(sum, BigNum::from(1050_u64));

        // Far smaller addends vanish instead of overflowing the mantissa
        let huge = num("1e100");
        assert_eq!(huge + BigNum::ONE, huge);
    }

    #[test]
    fn test_sub_and_sign() {
        let diff = BigNum::from(3_u64) - BigNum::from(5_u64);
        assert!(diff.is_negative());
        assert_eq!(diff, -BigNum::from(2_u64));
        assert_eq!(BigNum::from(5_u64) - BigNum::from(5_u64), BigNum::ZERO);
    }

    #[test]
    fn test_mul_div() {
        let a = num("2.5e40");
        let b = num("4e2");
        assert_eq!(a * b, num("1e43"));
        assert_eq!((a * b) / b, a);
    }

    #[test]
    fn test_ordering() {
        assert!(num("9.99e10") < num("1e11"));
        assert!(num("-1e11") < num("-9e10"));
        assert!(BigNum::ZERO > num("-1e-5"));
        assert!(num("1e-5") > BigNum::ZERO);
    }

    #[test]
    fn test_floor() {
        assert_eq!(num("4.7").floor(), BigNum::from(4_u64));
        assert_eq!(num("0.3").floor(), BigNum::ZERO);
        assert_eq!(num("1.23456e3").floor(), BigNum::from(1234_u64));
        assert_eq!(num("1.5e80").floor(), num("1.5e80"));
    }

    #[test]
    fn test_pow_integer_exponent() {
        let cubed = BigNum::from(10_u64).pow(Decimal::from(3));
        assert_eq!(cubed.floor(), BigNum::from(1000_u64));
        assert_eq!(BigNum::from(2_u64).powi(10), BigNum::from(1024_u64));
        assert_eq!(BigNum::from(7_u64).powi(0), BigNum::ONE);
    }

    #[test]
    fn test_pow_large_magnitude() {
        // 1.065^10000 ≈ 10^273.5
        let big = BigNum::from_decimal(Decimal::new(1065, 3)).pow(Decimal::from(10_000));
        assert_eq!(big.exponent(), 273);
    }

    #[test]
    fn test_display_parse_roundtrip() {
        for s in ["0", "1", "1.5e42", "-3.25e-7", "123.5"] {
            let n = num(s);
            assert_eq!(num(&n.to_string()), n);
        }
        assert!("abc".parse::<BigNum>().is_err());
        assert!("1.5e".parse::<BigNum>().is_err());
    }

    #[test]
    fn test_serde_string_encoding() {
        let n = num("6.02e23");
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, "\"6.02e23\"");
        let back: BigNum = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
        let from_int: BigNum = serde_json::from_str("42").unwrap();
        assert_eq!(from_int, BigNum::from(42_u64));
    }

    #[test]
    fn test_to_u64_saturating() {
        assert_eq!(num("4.2e3").to_u64_saturating(), 4200);
        assert_eq!(num("1e30").to_u64_saturating(), u64::MAX);
        assert_eq!(num("-5").to_u64_saturating(), 0);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(1, 2), Fixed::from_num(0.5));
        assert_eq!(ratio(5, 0), Fixed::from_num(1));
        assert_eq!(ratio(10, 5), Fixed::from_num(1));
        assert!(ratio(u64::MAX / 2, u64::MAX) > Fixed::from_num(0.49));
    }

    #[test]
    fn test_decimal_powi_saturates() {
        assert_eq!(decimal_powi(Decimal::new(15, 1), 2), Decimal::new(225, 2));
        assert_eq!(decimal_powi(Decimal::TEN, 40), Decimal::MAX);
        assert_eq!(decimal_powi(Decimal::new(5, 1), 0), Decimal::ONE);
        assert_eq!(decimal_floor_u64(Decimal::new(47, 1)), 4);
        assert_eq!(decimal_ceil_u64(Decimal::new(395, 2)), 4);
    }

    proptest! {
        #[test]
        fn ordering_matches_u64(a in 0u64..1_000_000_000_000, b in 0u64..1_000_000_000_000) {
            prop_assert_eq!(BigNum::from(a).cmp(&BigNum::from(b)), a.cmp(&b));
        }

        #[test]
        fn addition_matches_u64(a in 0u64..1_000_000_000, b in 0u64..1_000_000_000) {
            prop_assert_eq!(BigNum::from(a) + BigNum::from(b), BigNum::from(a + b));
        }
    }
}
