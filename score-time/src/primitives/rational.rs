//! Exact offsets and durations.
//!
//! [Rational] wraps a [fraction::GenericFraction] over `u128` and keeps it
//! finite: there is no way to build NaN or infinity through this API,
//! because every division goes through [Rational::checked_div] and friends,
//! which return [TimeError::DivisionByZero] instead.
//!
//! Values built from `i64` parts leave enough headroom for a single
//! operation to stay exact. Results that do not fit the store are reported
//! by the `checked_*` family as [TimeError::Overflow].

use std::{
    cmp::Ordering,
    collections::VecDeque,
    fmt,
    iter::Sum,
    num::NonZeroU64,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use fraction::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, GenericFraction};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{TimeError, TimeResult};

type Inner = GenericFraction<u128>;

/// Durations of this length and longer can not be carried by one notehead.
pub static MAX_ASSIGNABLE: u64 = 16;

/// Rational offset or duration in whole notes.
///
/// Always kept in lowest terms, so equality does not depend on how the
/// value was built.
///
/// ```
/// # use score_time::primitives::Rational;
/// let half = Rational::new(2, 4).unwrap();
/// assert_eq!(half, Rational::new(-1, -2).unwrap());
/// assert_eq!(half.to_pair().unwrap(), (1, 2));
/// assert_eq!(Rational::new(1, -2).unwrap().to_pair().unwrap(), (-1, 2));
/// assert!(Rational::new(1, 0).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational(Inner);

impl Rational {
    /// Fails if the value in lowest terms has no `i64` parts, so
    /// [Rational::to_pair] always succeeds on the result.
    pub fn new(numerator: i64, denominator: i64) -> TimeResult<Self> {
        if denominator == 0 {
            return Err(TimeError::DivisionByZero);
        }
        let negative = (numerator < 0) != (denominator < 0);
        let value = Self::from_parts(
            negative,
            numerator.unsigned_abs().into(),
            denominator.unsigned_abs().into(),
        );
        match value.to_pair() {
            Ok(_) => Ok(value),
            Err(_) => Err(TimeError::InvalidArgument(format!(
                "{}/{} has no 64 bit numerator and denominator",
                numerator, denominator
            ))),
        }
    }

    /// `denominator` must not be zero.
    fn from_parts(negative: bool, numerator: u128, denominator: u128) -> Self {
        match (numerator, negative) {
            (0, _) => Self::zero(),
            (_, false) => Self(Inner::new(numerator, denominator)),
            (_, true) => Self(Inner::new_neg(numerator, denominator)),
        }
    }

    /// Fraction arithmetic may yield a signed zero.
    fn from_fraction(fraction: Inner) -> Self {
        match fraction.numer() {
            Some(&0) => Self::zero(),
            _ => Self(fraction),
        }
    }

    fn from_checked(result: Option<Inner>, operation: fmt::Arguments) -> TimeResult<Self> {
        result
            .map(Self::from_fraction)
            .ok_or_else(|| TimeError::Overflow(operation.to_string()))
    }

    pub fn zero() -> Self {
        Self(Inner::new(0u128, 1u128))
    }

    pub fn one() -> Self {
        Self(Inner::new(1u128, 1u128))
    }

    fn magnitude(&self) -> (u128, u128) {
        (
            self.0.numer().copied().unwrap_or(0),
            self.0.denom().copied().unwrap_or(1),
        )
    }

    /// Signed numerator in lowest terms.
    ///
    /// Fails with [TimeError::Overflow] if it does not fit `i64`.
    pub fn numerator(&self) -> TimeResult<i64> {
        let magnitude = self.magnitude().0;
        i128::try_from(magnitude)
            .ok()
            .map(|numerator| match self.is_negative() {
                true => -numerator,
                false => numerator,
            })
            .and_then(|numerator| i64::try_from(numerator).ok())
            .ok_or_else(|| {
                TimeError::Overflow(format!("numerator of {} does not fit i64", self))
            })
    }

    /// Always positive.
    ///
    /// Fails with [TimeError::Overflow] if it does not fit `i64`.
    pub fn denominator(&self) -> TimeResult<i64> {
        i64::try_from(self.magnitude().1).map_err(|_| {
            TimeError::Overflow(format!("denominator of {} does not fit i64", self))
        })
    }

    pub fn to_pair(&self) -> TimeResult<(i64, i64)> {
        Ok((self.numerator()?, self.denominator()?))
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude().0 == 0
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && !self.0.is_sign_negative()
    }

    pub fn is_integer(&self) -> bool {
        self.magnitude().1 == 1
    }

    pub fn abs(&self) -> Self {
        let (numerator, denominator) = self.magnitude();
        Self::from_parts(false, numerator, denominator)
    }

    /// Largest integer not greater than self.
    pub fn floor(&self) -> Self {
        let (numerator, denominator) = self.magnitude();
        let quotient = numerator / denominator;
        match (self.is_negative(), numerator % denominator) {
            (false, _) => Self::from_parts(false, quotient, 1),
            (true, 0) => Self::from_parts(true, quotient, 1),
            // denominator is at least 2 here, so the quotient has headroom
            (true, _) => Self::from_parts(true, quotient + 1, 1),
        }
    }

    pub fn checked_add(&self, rhs: Self) -> TimeResult<Self> {
        Self::from_checked(self.0.checked_add(&rhs.0), format_args!("{} + {}", self, rhs))
    }

    pub fn checked_sub(&self, rhs: Self) -> TimeResult<Self> {
        Self::from_checked(self.0.checked_sub(&rhs.0), format_args!("{} - {}", self, rhs))
    }

    pub fn checked_mul(&self, rhs: Self) -> TimeResult<Self> {
        Self::from_checked(self.0.checked_mul(&rhs.0), format_args!("{} * {}", self, rhs))
    }

    pub fn checked_div(&self, divisor: Self) -> TimeResult<Self> {
        if divisor.is_zero() {
            return Err(TimeError::DivisionByZero);
        }
        Self::from_checked(
            self.0.checked_div(&divisor.0),
            format_args!("{} / {}", self, divisor),
        )
    }

    /// Divide by a positive integer.
    pub fn divided_by(&self, parts: NonZeroU64) -> TimeResult<Self> {
        self.checked_mul(Self::from_parts(false, 1, parts.get().into()))
    }

    /// Halfway between self and other.
    pub fn mean(&self, other: Self) -> Self {
        (*self + other) * Self::from_parts(false, 1, 2)
    }

    /// Floor division.
    ///
    /// ```
    /// # use score_time::primitives::Rational;
    /// let a = Rational::new(-7, 2).unwrap();
    /// let b = Rational::from(2);
    /// assert_eq!(a.floor_div(b).unwrap(), Rational::from(-2));
    /// assert_eq!(a.modulo(b).unwrap(), Rational::new(1, 2).unwrap());
    /// ```
    pub fn floor_div(&self, divisor: Self) -> TimeResult<Self> {
        Ok(self.checked_div(divisor)?.floor())
    }

    /// Remainder of [Rational::floor_div]; takes the sign of the divisor.
    pub fn modulo(&self, divisor: Self) -> TimeResult<Self> {
        let quotient = self.floor_div(divisor)?;
        self.checked_sub(quotient.checked_mul(divisor)?)
    }

    pub fn has_power_of_two_denominator(&self) -> bool {
        is_power_of_two(self.magnitude().1)
    }

    /// True if a single notehead (with dots) can carry the duration.
    ///
    /// ```
    /// # use score_time::primitives::Rational;
    /// let r = |n, d| Rational::new(n, d).unwrap();
    /// assert!(r(3, 8).is_assignable());
    /// assert!(r(7, 16).is_assignable());
    /// assert!(!r(5, 16).is_assignable());
    /// assert!(!r(1, 3).is_assignable());
    /// assert!(!Rational::from(16).is_assignable());
    /// ```
    pub fn is_assignable(&self) -> bool {
        if !self.is_positive() || !self.has_power_of_two_denominator() {
            return false;
        }
        if *self >= Self::from_parts(false, MAX_ASSIGNABLE.into(), 1) {
            return false;
        }
        let numerator = self.magnitude().0;
        let ones = numerator >> numerator.trailing_zeros();
        // only a full run of ones overflows here
        ones.checked_add(1).map_or(true, is_power_of_two)
    }

    /// Split duration by assignable durations.
    ///
    /// # Returns
    ///
    /// Parts, started with the largest, summing up to self.
    ///
    /// # Example
    ///
    /// ```
    /// # use score_time::primitives::Rational;
    /// let r = |n, d| Rational::new(n, d).unwrap();
    /// assert_eq!(
    ///     r(13, 16).split_assignable().unwrap(),
    ///     vec![r(3, 4), r(1, 16)]
    /// );
    /// assert_eq!(r(5, 16).split_assignable().unwrap(), vec![r(1, 4), r(1, 16)]);
    /// ```
    pub fn split_assignable(&self) -> TimeResult<VecDeque<Rational>> {
        if !self.is_positive() || !self.has_power_of_two_denominator() {
            return Err(TimeError::InvalidArgument(format!(
                "can not split {} by assignable durations",
                self
            )));
        }
        let mut parts = VecDeque::new();
        let mut rest = *self;
        let limit = Self::from_parts(false, MAX_ASSIGNABLE.into(), 1);
        let longest = Self::from_parts(false, (MAX_ASSIGNABLE / 2).into(), 1);
        while rest >= limit {
            parts.push_back(longest);
            rest = rest.checked_sub(longest)?;
        }
        let (mut numerator, denominator) = rest.magnitude();
        while numerator > 0 {
            let high = 127 - numerator.leading_zeros();
            let mut run = 1u128 << high;
            let mut bit = high;
            while bit > 0 && numerator & (1u128 << (bit - 1)) != 0 {
                bit -= 1;
                run |= 1u128 << bit;
            }
            numerator &= !run;
            parts.push_back(Self::from_parts(false, run, denominator));
        }
        Ok(parts)
    }
}

pub fn is_power_of_two(num: u128) -> bool {
    num != 0 && num & (num - 1) == 0
}

impl Default for Rational {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_parts(value < 0, value.unsigned_abs().into(), 1)
    }
}
impl From<i32> for Rational {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}
impl From<u32> for Rational {
    fn from(value: u32) -> Self {
        Self::from(i64::from(value))
    }
}

// Operators stay exact within the store and panic past it, the way integer
// operators do. Use the `checked_*` family where that can happen.
impl Add for Rational {
    fn add(self, rhs: Self) -> Self::Output {
        self.checked_add(rhs).unwrap_or_else(|err| panic!("{}", err))
    }
    type Output = Self;
}
impl AddAssign for Rational {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs
    }
}
impl Sub for Rational {
    fn sub(self, rhs: Self) -> Self::Output {
        self.checked_sub(rhs).unwrap_or_else(|err| panic!("{}", err))
    }
    type Output = Self;
}
impl SubAssign for Rational {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs
    }
}
impl Mul for Rational {
    fn mul(self, rhs: Self) -> Self::Output {
        self.checked_mul(rhs).unwrap_or_else(|err| panic!("{}", err))
    }
    type Output = Self;
}
impl Neg for Rational {
    fn neg(self) -> Self::Output {
        let (numerator, denominator) = self.magnitude();
        Self::from_parts(!self.is_negative(), numerator, denominator)
    }
    type Output = Self;
}
impl Sum for Rational {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, item| acc + item)
    }
}
impl<'a> Sum<&'a Rational> for Rational {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (numerator, denominator) = self.magnitude();
        let sign = match self.is_negative() {
            true => "-",
            false => "",
        };
        match denominator {
            1 => write!(f, "{}{}", sign, numerator),
            _ => write!(f, "{}{}/{}", sign, numerator, denominator),
        }
    }
}
impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({})", self)
    }
}

impl FromStr for Rational {
    type Err = TimeError;

    /// Parses `n/d` or `n`. Accepts every value [fmt::Display] prints.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |token: &str| {
            let token = token.trim();
            let (negative, digits) = match token.strip_prefix('-') {
                Some(digits) => (true, digits),
                None => (false, token),
            };
            match digits.parse::<u128>() {
                Ok(magnitude) => Ok((negative, magnitude)),
                Err(_) => Err(TimeError::InvalidArgument(format!(
                    "can not parse rational from `{}`",
                    s
                ))),
            }
        };
        let ((numerator_negative, numerator), (denominator_negative, denominator)) =
            match s.split_once('/') {
                None => (parse(s)?, (false, 1)),
                Some((numerator, denominator)) => (parse(numerator)?, parse(denominator)?),
            };
        if denominator == 0 {
            return Err(TimeError::DivisionByZero);
        }
        Ok(Self::from_parts(
            numerator_negative != denominator_negative,
            numerator,
            denominator,
        ))
    }
}

impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{is_power_of_two, Rational};
    use crate::error::TimeError;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn normalization() {
        assert_eq!(r(2, 4), r(1, 2));
        assert_eq!(r(-2, -4), r(1, 2));
        assert_eq!(r(2, -4).to_pair().unwrap(), (-1, 2));
        assert_eq!(r(0, -5), Rational::zero());
        assert_eq!(r(1, 2) - r(1, 2), Rational::zero());
        assert!(!(r(1, 2) - r(1, 2)).is_negative());
    }

    #[test]
    fn arithmetic() {
        assert_eq!(r(1, 4) + r(1, 16), r(5, 16));
        assert_eq!(r(1, 4) - r(1, 2), r(-1, 4));
        assert_eq!(r(2, 3) * r(3, 4), r(1, 2));
        assert_eq!(r(1, 2).checked_div(r(1, 4)).unwrap(), Rational::from(2));
        assert_eq!(-r(1, 3), r(-1, 3));
        assert_eq!(r(-1, 3).abs(), r(1, 3));
        assert_eq!(
            r(1, 2).checked_div(Rational::zero()),
            Err(TimeError::DivisionByZero)
        );
        assert_eq!(
            r(1, 2).modulo(Rational::zero()),
            Err(TimeError::DivisionByZero)
        );
    }

    #[test]
    fn floor_division_identity() {
        let values = [r(7, 2), r(-7, 2), r(5, 3), r(-1, 8), Rational::zero()];
        let divisors = [r(1, 2), r(2, 3), Rational::from(3), r(-3, 4)];
        for a in values {
            for b in divisors {
                let q = a.floor_div(b).unwrap();
                let m = a.modulo(b).unwrap();
                assert!(q.is_integer());
                assert_eq!(q * b + m, a);
                if b.is_positive() {
                    assert!(m >= Rational::zero() && m < b, "{a} % {b} = {m}");
                }
            }
        }
    }

    #[test]
    fn ordering() {
        let mut values = vec![r(1, 2), r(-3, 4), Rational::zero(), r(1, 3), r(5, 2)];
        values.sort();
        assert_eq!(values, vec![r(-3, 4), Rational::zero(), r(1, 3), r(1, 2), r(5, 2)]);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("3/4".parse::<Rational>().unwrap(), r(3, 4));
        assert_eq!("-6/8".parse::<Rational>().unwrap(), r(-3, 4));
        assert_eq!("5".parse::<Rational>().unwrap(), Rational::from(5));
        assert!("1/0".parse::<Rational>().is_err());
        assert!("x/2".parse::<Rational>().is_err());
        assert_eq!(r(-3, 4).to_string(), "-3/4");
        assert_eq!(Rational::from(2).to_string(), "2");
    }

    #[test]
    fn split_assignable_sums_up() {
        for (n, d) in [(5, 16), (13, 16), (9, 8), (17, 1), (1, 4), (31, 32)] {
            let value = r(n, d);
            let parts = value.split_assignable().unwrap();
            assert!(parts.iter().all(|part| part.is_assignable()), "{:?}", parts);
            assert_eq!(parts.iter().sum::<Rational>(), value);
        }
        assert!(r(1, 3).split_assignable().is_err());
        assert!(Rational::zero().split_assignable().is_err());
    }

    #[test]
    fn boundaries_of_i64_parts() {
        let min = Rational::new(i64::MIN, 1).unwrap();
        assert_eq!(min.to_pair().unwrap(), (i64::MIN, 1));
        assert_eq!(min.to_string(), "-9223372036854775808");
        assert_eq!(min.floor(), min);
        assert!(matches!(
            Rational::new(1, i64::MIN),
            Err(TimeError::InvalidArgument(_))
        ));
        assert!(matches!(
            Rational::new(i64::MIN, -1),
            Err(TimeError::InvalidArgument(_))
        ));
        assert_eq!(Rational::new(i64::MIN, i64::MIN).unwrap(), Rational::one());
        assert_eq!(Rational::new(i64::MIN, 2).unwrap().numerator().unwrap(), i64::MIN / 2);

        let past_max = Rational::from(i64::MAX) + Rational::one();
        assert!(past_max.is_positive());
        assert_eq!(past_max.to_string(), "9223372036854775808");
        assert!(matches!(past_max.numerator(), Err(TimeError::Overflow(_))));
        assert_eq!(past_max - Rational::one(), Rational::from(i64::MAX));
        assert_eq!((-min).to_string(), "9223372036854775808");

        let tiny = r(1, 1 << 32) * r(1, 1 << 32);
        assert_eq!(tiny.to_string(), "1/18446744073709551616");
        assert!(matches!(tiny.denominator(), Err(TimeError::Overflow(_))));
        assert_eq!(tiny.to_string().parse::<Rational>().unwrap(), tiny);
        assert_eq!(tiny.checked_mul(Rational::from(1_i64 << 32)).unwrap(), r(1, 1 << 32));
    }

    #[test]
    fn overflow_is_reported() {
        let huge = "340282366920938463463374607431768211455".parse::<Rational>().unwrap();
        assert!(matches!(huge.checked_add(Rational::one()), Err(TimeError::Overflow(_))));
        assert!(matches!(huge.checked_mul(Rational::from(2)), Err(TimeError::Overflow(_))));
        assert!(matches!((-huge).checked_sub(huge), Err(TimeError::Overflow(_))));
        assert_eq!(huge.checked_sub(huge).unwrap(), Rational::zero());
        let fine = huge.checked_div(Rational::from(3)).unwrap();
        assert_eq!(fine.checked_mul(Rational::from(3)).unwrap(), huge);
        assert!("1/340282366920938463463374607431768211456".parse::<Rational>().is_err());
    }

    #[test]
    fn powers_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(8));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(6));
    }
}
