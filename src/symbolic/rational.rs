//! Exact rational numbers used as numeric atoms of the expression tree.
//!
//! All arithmetic is checked: an `i64` overflow yields `None` so that callers
//! can turn it into a symbolic error instead of silently losing precision.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Computed on magnitudes so that `i64::MIN` has no sign to flip.
fn gcd(a: i64, b: i64) -> u64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Common divisor of a pair whose second member is a positive denominator,
/// so the result always fits back into `i64`.
fn common_divisor(a: i64, den: i64) -> i64 {
    i64::try_from(gcd(a, den)).unwrap_or(1).max(1)
}

/// A reduced fraction `num / den`.
///
/// Invariant: `den > 0` and `gcd(num, den) == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    num: i64,
    den: i64,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };
    pub const NEG_ONE: Rational = Rational { num: -1, den: 1 };

    /// Create an integer value.
    pub fn int(n: i64) -> Self {
        Rational { num: n, den: 1 }
    }

    /// Create a reduced fraction. Returns `None` for a zero denominator.
    pub fn new(num: i64, den: i64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let (num, den) = if den < 0 {
            (num.checked_neg()?, den.checked_neg()?)
        } else {
            (num, den)
        };
        let g = common_divisor(num, den);
        Some(Rational {
            num: num / g,
            den: den / g,
        })
    }

    /// Parse a decimal literal such as `12`, `0.5` or `3.` into an exact value.
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        let digits = format!("{int_part}{frac_part}");
        let num: i64 = digits.parse().ok()?;
        let den = 10_i64.checked_pow(u32::try_from(frac_part.len()).ok()?)?;
        Rational::new(num, den)
    }

    pub fn numer(&self) -> i64 {
        self.num
    }

    pub fn denom(&self) -> i64 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_one(&self) -> bool {
        self.num == 1 && self.den == 1
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    /// The value as an integer, when it is one.
    pub fn as_integer(&self) -> Option<i64> {
        self.is_integer().then_some(self.num)
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn checked_neg(self) -> Option<Self> {
        Some(Rational {
            num: self.num.checked_neg()?,
            den: self.den,
        })
    }

    pub fn abs(self) -> Option<Self> {
        if self.num < 0 { self.checked_neg() } else { Some(self) }
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let num = self
            .num
            .checked_mul(rhs.den)?
            .checked_add(rhs.num.checked_mul(self.den)?)?;
        Rational::new(num, self.den.checked_mul(rhs.den)?)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.checked_add(rhs.checked_neg()?)
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        // Cross-reduce first to keep intermediates small.
        let g1 = common_divisor(self.num, rhs.den);
        let g2 = common_divisor(rhs.num, self.den);
        let num = (self.num / g1).checked_mul(rhs.num / g2)?;
        let den = (self.den / g2).checked_mul(rhs.den / g1)?;
        Rational::new(num, den)
    }

    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        self.checked_mul(rhs.recip()?)
    }

    pub fn recip(self) -> Option<Self> {
        Rational::new(self.den, self.num)
    }

    /// Raise to an integer power. Negative exponents invert first.
    ///
    /// Bases `0`, `1` and `-1` fold for any exponent; other bases overflow
    /// long before the exponent leaves `u32`.
    pub fn checked_pow(self, exp: i64) -> Option<Self> {
        if exp == 0 {
            return Some(Rational::ONE);
        }
        let base = if exp < 0 { self.recip()? } else { self };
        match (base.num, base.den) {
            (0, _) => return Some(Rational::ZERO),
            (1, 1) => return Some(Rational::ONE),
            (-1, 1) if exp % 2 == 0 => return Some(Rational::ONE),
            (-1, 1) => return Some(Rational::NEG_ONE),
            _ => {}
        }
        let e = u32::try_from(exp.unsigned_abs()).ok()?;
        Rational::new(base.num.checked_pow(e)?, base.den.checked_pow(e)?)
    }

    /// Exact square root when both numerator and denominator are perfect squares.
    pub fn exact_sqrt(self) -> Option<Self> {
        if self.num < 0 {
            return None;
        }
        Rational::new(isqrt_exact(self.num)?, isqrt_exact(self.den)?)
    }
}

/// Integer square root, only when `n` is a perfect square.
pub(crate) fn isqrt_exact(n: i64) -> Option<i64> {
    if n < 0 {
        return None;
    }
    let r = isqrt(n);
    (r.checked_mul(r)? == n).then_some(r)
}

/// Floor of the square root of a non-negative integer.
pub(crate) fn isqrt(n: i64) -> i64 {
    if n < 2 {
        return n.max(0);
    }
    let mut r = (n as f64).sqrt() as i64;
    while r.checked_mul(r).is_none_or(|sq| sq > n) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).is_some_and(|sq| sq <= n) {
        r += 1;
    }
    r
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = i128::from(self.num) * i128::from(other.den);
        let rhs = i128::from(other.num) * i128::from(self.den);
        lhs.cmp(&rhs)
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Rational::int(n)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn test_rational_arithmetic() {
        let a = r(1, 2);
        let b = r(1, 3);
        assert_eq!(a.checked_add(b), Some(r(5, 6)));
        assert_eq!(a.checked_sub(b), Some(r(1, 6)));
        assert_eq!(a.checked_mul(b), Some(r(1, 6)));
        assert_eq!(a.checked_div(b), Some(r(3, 2)));
    }

    #[test]
    fn test_reduction_and_sign() {
        assert_eq!(r(4, 6), r(2, 3));
        let neg = r(3, -9);
        assert_eq!(neg.numer(), -1);
        assert_eq!(neg.denom(), 3);
        assert!(Rational::new(1, 0).is_none());
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Rational::parse_decimal("12"), Some(Rational::int(12)));
        assert_eq!(Rational::parse_decimal("2.5"), Some(r(5, 2)));
        assert_eq!(Rational::parse_decimal(".25"), Some(r(1, 4)));
        assert_eq!(Rational::parse_decimal("."), None);
        assert_eq!(Rational::parse_decimal("1a"), None);
    }

    #[test]
    fn test_power_and_sqrt() {
        assert_eq!(r(2, 3).checked_pow(2), Some(r(4, 9)));
        assert_eq!(r(2, 3).checked_pow(-1), Some(r(3, 2)));
        assert_eq!(r(9, 4).exact_sqrt(), Some(r(3, 2)));
        assert_eq!(Rational::int(2).exact_sqrt(), None);
        assert_eq!(Rational::ZERO.checked_pow(-1), None);
    }

    #[test]
    fn test_unit_bases_fold_for_huge_exponents() {
        assert_eq!(Rational::ONE.checked_pow(999_999_999_999), Some(Rational::ONE));
        assert_eq!(Rational::NEG_ONE.checked_pow(i64::MAX), Some(Rational::NEG_ONE));
        assert_eq!(Rational::NEG_ONE.checked_pow(i64::MIN), Some(Rational::ONE));
        assert_eq!(Rational::ZERO.checked_pow(1 << 40), Some(Rational::ZERO));
        assert_eq!(Rational::int(2).checked_pow(1 << 40), None);
        assert_eq!(Rational::int(7).checked_pow(0), Some(Rational::ONE));
    }

    #[test]
    fn test_overflow_is_reported() {
        let big = Rational::int(i64::MAX);
        assert!(big.checked_add(Rational::ONE).is_none());
        assert!(big.checked_mul(Rational::int(2)).is_none());
    }

    #[test]
    fn test_min_value_reduces_without_overflow() {
        let min = Rational::new(i64::MIN, 1).unwrap();
        assert_eq!(min.numer(), i64::MIN);
        assert_eq!(Rational::new(i64::MIN, 4), Some(r(i64::MIN / 4, 1)));
        assert_eq!(Rational::new(i64::MIN, 3).unwrap().denom(), 3);
        assert!(Rational::new(1, i64::MIN).is_none());
        assert!(min.checked_neg().is_none());
        assert!(min.abs().is_none());
        assert_eq!(min.checked_mul(r(1, 2)), Some(Rational::int(i64::MIN / 2)));

        let sum = Rational::int(-i64::MAX).checked_add(Rational::NEG_ONE);
        assert_eq!(sum, Some(min));
    }

    #[test]
    fn test_display_and_order() {
        assert_eq!(r(3, 4).to_string(), "3/4");
        assert_eq!(Rational::int(-2).to_string(), "-2");
        assert!(r(1, 3) < r(1, 2));
        assert_eq!(isqrt(17), 4);
        assert_eq!(isqrt_exact(16), Some(4));
    }
}
