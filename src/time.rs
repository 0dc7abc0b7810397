//! Model time for the discrete-event core.
//!
//! Represents a logical timestamp with no dependency on `std::time`.
//! Time advances only when a director fires components at a later tag,
//! never from wall-clock observation.
//!
//! Model time is fixed-point: a signed count of ticks at a resolution of
//! 1e-10 model seconds. Equality is therefore exact, which the delay
//! element relies on when matching a buffered sample against the
//! center time.

use std::cmp::Ordering;
use std::ops::{Add, Sub};

use crate::error::KairosError;

/// Ticks per model second (resolution 1e-10).
pub const TICKS_PER_SECOND: i64 = 10_000_000_000;

/// A point (or span) of model time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelTime(i64);

impl ModelTime {
    /// The zero-point of model time.
    pub const ZERO: ModelTime = ModelTime(0);

    /// Later than every finite time. Used for unknown execution budgets.
    pub const POSITIVE_INFINITY: ModelTime = ModelTime(i64::MAX);

    /// Earlier than every finite time.
    pub const NEGATIVE_INFINITY: ModelTime = ModelTime(i64::MIN);

    /// Create a `ModelTime` from a raw tick count.
    ///
    /// `i64::MAX` and `i64::MIN` are the infinities.
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        ModelTime(ticks)
    }

    /// Return the raw tick count.
    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Create a `ModelTime` from seconds, rounding to the nearest tick.
    ///
    /// Infinite inputs map to the matching infinity.
    ///
    /// # Panics
    /// Panics if `secs` is NaN or its magnitude does not fit the tick range.
    /// Use `ModelTime::try_from` for untrusted input.
    pub fn from_secs(secs: f64) -> Self {
        match ModelTime::try_from(secs) {
            Ok(t) => t,
            Err(e) => panic!("{}", e),
        }
    }

    /// Value in model seconds. Infinities map to `f64` infinities.
    pub fn as_secs_f64(self) -> f64 {
        match self {
            ModelTime::POSITIVE_INFINITY => f64::INFINITY,
            ModelTime::NEGATIVE_INFINITY => f64::NEG_INFINITY,
            ModelTime(t) => t as f64 / TICKS_PER_SECOND as f64,
        }
    }

    #[inline]
    pub fn is_infinite(self) -> bool {
        self == ModelTime::POSITIVE_INFINITY || self == ModelTime::NEGATIVE_INFINITY
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        !self.is_infinite()
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: ModelTime) -> bool {
        self < other
    }

    /// Returns `true` for strictly negative finite values and `-inf`.
    #[inline]
    pub fn is_negative(self) -> bool {
        self < ModelTime::ZERO
    }

    /// `self + other`, or `None` if the result is indeterminate
    /// (`+inf + -inf`) or overflows the finite range.
    pub fn checked_add(self, other: ModelTime) -> Option<ModelTime> {
        match (self, other) {
            (ModelTime::POSITIVE_INFINITY, ModelTime::NEGATIVE_INFINITY)
            | (ModelTime::NEGATIVE_INFINITY, ModelTime::POSITIVE_INFINITY) => None,
            (inf, _) if inf.is_infinite() => Some(inf),
            (_, inf) if inf.is_infinite() => Some(inf),
            (ModelTime(a), ModelTime(b)) => a
                .checked_add(b)
                .map(ModelTime)
                .filter(|t| t.is_finite()),
        }
    }

    /// `self - other`, or `None` if indeterminate (`inf - inf` of the
    /// same sign) or out of the finite range.
    pub fn checked_sub(self, other: ModelTime) -> Option<ModelTime> {
        let negated = match other {
            ModelTime::POSITIVE_INFINITY => ModelTime::NEGATIVE_INFINITY,
            ModelTime::NEGATIVE_INFINITY => ModelTime::POSITIVE_INFINITY,
            ModelTime(t) => ModelTime(-t),
        };
        self.checked_add(negated)
    }

    /// The larger of `self` and `other`.
    #[inline]
    pub fn max(self, other: ModelTime) -> ModelTime {
        Ord::max(self, other)
    }
}

impl TryFrom<f64> for ModelTime {
    type Error = KairosError;

    fn try_from(secs: f64) -> Result<Self, Self::Error> {
        if secs.is_nan() {
            return Err(KairosError::InvalidTime("NaN is not a model time".into()));
        }
        if secs == f64::INFINITY {
            return Ok(ModelTime::POSITIVE_INFINITY);
        }
        if secs == f64::NEG_INFINITY {
            return Ok(ModelTime::NEGATIVE_INFINITY);
        }
        let ticks = (secs * TICKS_PER_SECOND as f64).round();
        // The extremes of i64 are reserved for the infinities.
        if ticks >= i64::MAX as f64 || ticks <= i64::MIN as f64 {
            return Err(KairosError::InvalidTime(format!(
                "{} seconds is outside the representable range",
                secs
            )));
        }
        Ok(ModelTime(ticks as i64))
    }
}

impl Add for ModelTime {
    type Output = ModelTime;

    /// # Panics
    /// Panics on `+inf + -inf` and on finite overflow.
    fn add(self, rhs: ModelTime) -> ModelTime {
        self.checked_add(rhs)
            .unwrap_or_else(|| panic!("indeterminate model time: {} + {}", self, rhs))
    }
}

impl Sub for ModelTime {
    type Output = ModelTime;

    /// # Panics
    /// Panics on `inf - inf` and on finite overflow.
    fn sub(self, rhs: ModelTime) -> ModelTime {
        self.checked_sub(rhs)
            .unwrap_or_else(|| panic!("indeterminate model time: {} - {}", self, rhs))
    }
}

impl std::fmt::Display for ModelTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ModelTime::POSITIVE_INFINITY => write!(f, "T=+inf"),
            ModelTime::NEGATIVE_INFINITY => write!(f, "T=-inf"),
            t => write!(f, "T={}", t.as_secs_f64()),
        }
    }
}

// ── Tag ───────────────────────────────────────────────────────────────

/// Superdense time: a model time plus a microstep.
///
/// Events at the same model time are "simultaneous" but still ordered
/// by microstep. A component that asks to be fired again at the current
/// time is fired at the next microstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    pub time: ModelTime,
    pub microstep: u32,
}

impl Tag {
    #[inline]
    pub fn new(time: ModelTime, microstep: u32) -> Self {
        Tag { time, microstep }
    }

    /// The first tag at `time`.
    #[inline]
    pub fn at(time: ModelTime) -> Self {
        Tag::new(time, 0)
    }

    /// The same model time, one microstep later.
    ///
    /// # Panics
    /// Panics if the microstep counter overflows.
    #[inline]
    pub fn next_microstep(self) -> Self {
        let microstep = self
            .microstep
            .checked_add(1)
            .expect("microstep overflow at a single model time");
        Tag::new(self.time, microstep)
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.microstep.cmp(&other.microstep))
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, m={})", self.time, self.microstep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(ModelTime::ZERO.ticks(), 0);
        assert_eq!(ModelTime::from_secs(0.0), ModelTime::ZERO);
    }

    #[test]
    fn test_ordering() {
        let t1 = ModelTime::from_secs(1.0);
        let t2 = ModelTime::from_secs(2.0);
        assert!(t1 < t2);
        assert!(t1.is_before(t2));
        assert!(!t2.is_before(t1));
        assert!(ModelTime::NEGATIVE_INFINITY < t1);
        assert!(t2 < ModelTime::POSITIVE_INFINITY);
    }

    #[test]
    fn test_exact_decimal_arithmetic() {
        // 0.1 + 0.2 is not 0.3 in f64, but it is in fixed-point ticks.
        let sum = ModelTime::from_secs(0.1) + ModelTime::from_secs(0.2);
        assert_eq!(sum, ModelTime::from_secs(0.3));

        let center = ModelTime::from_secs(2.0) - ModelTime::from_secs(0.5);
        assert_eq!(center, ModelTime::from_secs(1.5));
    }

    #[test]
    fn test_infinity_absorbs_finite() {
        let inf = ModelTime::POSITIVE_INFINITY;
        let five = ModelTime::from_secs(5.0);
        assert_eq!(inf + five, inf);
        assert_eq!(five + inf, inf);
        assert_eq!(inf - five, inf);
        assert_eq!(five - inf, ModelTime::NEGATIVE_INFINITY);
        assert!(inf.is_infinite());
        assert!(five.is_finite());
    }

    #[test]
    fn test_indeterminate_forms() {
        let inf = ModelTime::POSITIVE_INFINITY;
        assert!(inf.checked_sub(inf).is_none());
        assert!(inf.checked_add(ModelTime::NEGATIVE_INFINITY).is_none());
    }

    #[test]
    #[should_panic(expected = "indeterminate")]
    fn test_inf_minus_inf_panics() {
        let _ = ModelTime::POSITIVE_INFINITY - ModelTime::POSITIVE_INFINITY;
    }

    #[test]
    fn test_try_from_rejects_nan() {
        assert!(ModelTime::try_from(f64::NAN).is_err());
        assert_eq!(
            ModelTime::try_from(f64::INFINITY).unwrap(),
            ModelTime::POSITIVE_INFINITY
        );
        assert!(ModelTime::try_from(1e300).is_err());
    }

    #[test]
    fn test_as_secs_round_trip() {
        assert_eq!(ModelTime::from_secs(1.5).as_secs_f64(), 1.5);
        assert_eq!(ModelTime::POSITIVE_INFINITY.as_secs_f64(), f64::INFINITY);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ModelTime::from_secs(2.5)), "T=2.5");
        assert_eq!(format!("{}", ModelTime::POSITIVE_INFINITY), "T=+inf");
    }

    #[test]
    fn test_tag_ordering() {
        let t = ModelTime::from_secs(1.0);
        let a = Tag::at(t);
        let b = a.next_microstep();
        let c = Tag::at(ModelTime::from_secs(1.5));
        assert!(a < b);
        assert!(b < c);
        assert_eq!(b.microstep, 1);
        assert_eq!(b.time, t);
    }
}
