//! Immutable span of musical time with a payload.
use serde::{Deserialize, Serialize};

use super::Rational;
use crate::error::{TimeError, TimeResult};

/// Half-open `[start, stop)` span carrying a payload.
///
/// Zero-duration intervals are allowed and represent instants.
///
/// # Example
/// ```
/// # use score_time::primitives::TimeInterval;
/// let a = TimeInterval::new(0, 15).unwrap();
/// let b = TimeInterval::new(-10, 25).unwrap();
/// assert!(a.trisects(&b));
/// assert!(!a.trisects(&a));
/// assert!(TimeInterval::new(3, 1).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
#[serde(
    try_from = "IntervalFields<P>",
    bound(deserialize = "P: Deserialize<'de>")
)]
pub struct TimeInterval<P = ()> {
    start: Rational,
    stop: Rational,
    payload: P,
}

/// Unchecked form, in which intervals are deserialized.
#[derive(Deserialize)]
struct IntervalFields<P> {
    start: Rational,
    stop: Rational,
    payload: P,
}
impl<P> TryFrom<IntervalFields<P>> for TimeInterval<P> {
    type Error = TimeError;
    fn try_from(fields: IntervalFields<P>) -> Result<Self, Self::Error> {
        Self::with_payload(fields.start, fields.stop, fields.payload)
    }
}

impl TimeInterval<()> {
    pub fn new(
        start: impl Into<Rational>,
        stop: impl Into<Rational>,
    ) -> TimeResult<Self> {
        Self::with_payload(start, stop, ())
    }
}

impl<P> TimeInterval<P> {
    pub fn with_payload(
        start: impl Into<Rational>,
        stop: impl Into<Rational>,
        payload: P,
    ) -> TimeResult<Self> {
        let (start, stop) = (start.into(), stop.into());
        if start > stop {
            return Err(TimeError::InvalidInterval { start, stop });
        }
        Ok(Self {
            start,
            stop,
            payload,
        })
    }

    /// Caller guarantees `start <= stop`.
    pub(crate) fn with_payload_unchecked(
        start: Rational,
        stop: Rational,
        payload: P,
    ) -> Self {
        debug_assert!(start <= stop, "{} > {}", start, stop);
        Self {
            start,
            stop,
            payload,
        }
    }

    pub fn start(&self) -> Rational {
        self.start
    }
    pub fn stop(&self) -> Rational {
        self.stop
    }
    pub fn payload(&self) -> &P {
        &self.payload
    }
    pub fn into_payload(self) -> P {
        self.payload
    }
    pub fn signature(&self) -> (Rational, Rational) {
        (self.start, self.stop)
    }
    pub fn duration(&self) -> Rational {
        self.stop - self.start
    }
    pub fn center(&self) -> Rational {
        self.start.mean(self.stop)
    }
    pub fn is_instant(&self) -> bool {
        self.start == self.stop
    }

    /// Same bounds with other payload.
    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> TimeInterval<Q> {
        TimeInterval {
            start: self.start,
            stop: self.stop,
            payload: f(self.payload),
        }
    }
    pub fn with_payload_of<Q>(&self, payload: Q) -> TimeInterval<Q> {
        TimeInterval {
            start: self.start,
            stop: self.stop,
            payload,
        }
    }
    /// Bounds only.
    pub fn bare(&self) -> TimeInterval {
        self.with_payload_of(())
    }

    /// True if spans share some time.
    ///
    /// Touching endpoints do not overlap. Two instants overlap only if
    /// they are the same instant.
    ///
    /// # Example
    /// ```
    /// # use score_time::primitives::TimeInterval;
    /// let a = TimeInterval::new(0, 4).unwrap();
    /// assert!(a.overlaps(&TimeInterval::new(3, 6).unwrap()));
    /// assert!(!a.overlaps(&TimeInterval::new(4, 6).unwrap()));
    /// assert!(a.overlaps(&TimeInterval::new(2, 2).unwrap()));
    /// assert!(!a.overlaps(&TimeInterval::new(0, 0).unwrap()));
    /// ```
    pub fn overlaps<Q>(&self, other: &TimeInterval<Q>) -> bool {
        if self.is_instant() && other.is_instant() {
            return self.start == other.start;
        }
        self.start < other.stop && other.start < self.stop
    }

    pub fn starts_at_or_after_offset(&self, offset: Rational) -> bool {
        self.start >= offset
    }

    /// True if other starts strictly before and stops strictly after self,
    /// cutting the timeline into three pieces around it.
    pub fn trisects<Q>(&self, other: &TimeInterval<Q>) -> bool {
        other.start < self.start && self.stop < other.stop
    }

    pub fn is_tangent_to<Q>(&self, other: &TimeInterval<Q>) -> bool {
        self.stop == other.start || other.stop == self.start
    }

    pub fn is_contained_by<Q>(&self, other: &TimeInterval<Q>) -> bool {
        other.start <= self.start && self.stop <= other.stop
    }

    pub fn is_container_of<Q>(&self, other: &TimeInterval<Q>) -> bool {
        other.is_contained_by(self)
    }

    /// `[start, stop)`; an instant contains its own offset.
    pub fn contains_offset(&self, offset: Rational) -> bool {
        match self.is_instant() {
            true => self.start == offset,
            false => self.start <= offset && offset < self.stop,
        }
    }

    /// Length of the shared part, zero if none.
    pub fn get_overlap_with<Q>(&self, other: &TimeInterval<Q>) -> Rational {
        let start = self.start.max(other.start);
        let stop = self.stop.min(other.stop);
        match start < stop {
            true => stop - start,
            false => Rational::zero(),
        }
    }
}

impl<P: Clone> TimeInterval<P> {
    pub fn shift_by_rational(&self, rational: Rational) -> Self {
        Self {
            start: self.start + rational,
            stop: self.stop + rational,
            payload: self.payload.clone(),
        }
    }

    pub fn shift_to_rational(&self, rational: Rational) -> Self {
        self.shift_by_rational(rational - self.start)
    }

    /// Multiply duration, keeping start.
    pub fn scale_by_rational(&self, rational: Rational) -> TimeResult<Self> {
        if !rational.is_positive() {
            return Err(TimeError::InvalidArgument(format!(
                "scale factor must be positive, got {}",
                rational
            )));
        }
        Ok(Self {
            start: self.start,
            stop: self.start + self.duration() * rational,
            payload: self.payload.clone(),
        })
    }

    /// Set duration, keeping start.
    ///
    /// # Example
    /// ```
    /// # use score_time::primitives::{Rational, TimeInterval};
    /// let a = TimeInterval::new(1, 2).unwrap();
    /// let b = a.scale_to_rational(Rational::new(3, 2).unwrap()).unwrap();
    /// assert_eq!(b.signature(), (Rational::from(1), Rational::new(5, 2).unwrap()));
    /// assert!(a.scale_to_rational(Rational::zero()).is_err());
    /// ```
    pub fn scale_to_rational(&self, rational: Rational) -> TimeResult<Self> {
        if !rational.is_positive() {
            return Err(TimeError::InvalidArgument(format!(
                "target duration must be positive, got {}",
                rational
            )));
        }
        Ok(Self {
            start: self.start,
            stop: self.start + rational,
            payload: self.payload.clone(),
        })
    }

    /// Split at every offset strictly inside the interval.
    ///
    /// Offsets outside of the interval are ignored, duplicates are
    /// collapsed. Every piece gets a clone of the payload.
    pub fn split_at_rationals(
        &self,
        offsets: impl IntoIterator<Item = Rational>,
    ) -> Vec<Self> {
        let mut cuts: Vec<Rational> = offsets
            .into_iter()
            .filter(|offset| self.start < *offset && *offset < self.stop)
            .collect();
        cuts.sort();
        cuts.dedup();
        let mut pieces = Vec::with_capacity(cuts.len() + 1);
        let mut start = self.start;
        for cut in cuts.into_iter().chain(std::iter::once(self.stop)) {
            pieces.push(Self {
                start,
                stop: cut,
                payload: self.payload.clone(),
            });
            start = cut;
        }
        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::TimeInterval;
    use crate::primitives::Rational;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn construction() {
        let a = TimeInterval::with_payload(r(1, 4), r(3, 4), "a").unwrap();
        assert_eq!(a.duration(), r(1, 2));
        assert_eq!(a.center(), r(1, 2));
        assert_eq!(a.signature(), (r(1, 4), r(3, 4)));
        assert_eq!(*a.payload(), "a");
        assert!(TimeInterval::new(2, 2).unwrap().is_instant());
        let err = TimeInterval::new(3, 2).unwrap_err();
        assert_eq!(
            err,
            crate::error::TimeError::InvalidInterval {
                start: Rational::from(3),
                stop: Rational::from(2)
            }
        );
    }

    #[test]
    fn overlapping() {
        let a = TimeInterval::new(0, 10).unwrap();
        let touching = TimeInterval::new(10, 20).unwrap();
        let inside = TimeInterval::new(2, 3).unwrap();
        let instant = TimeInterval::new(5, 5).unwrap();
        let edge_instant = TimeInterval::new(10, 10).unwrap();
        assert!(a.overlaps(&inside));
        assert!(inside.overlaps(&a));
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&instant));
        assert!(instant.overlaps(&a));
        assert!(!a.overlaps(&edge_instant));
        assert!(instant.overlaps(&TimeInterval::new(5, 5).unwrap()));
        assert!(!instant.overlaps(&TimeInterval::new(6, 6).unwrap()));
        assert!(a.is_tangent_to(&touching));
        assert!(inside.is_contained_by(&a));
        assert!(a.is_container_of(&inside));
        assert_eq!(a.get_overlap_with(&TimeInterval::new(8, 12).unwrap()), Rational::from(2));
        assert_eq!(a.get_overlap_with(&touching), Rational::zero());
    }

    #[test]
    fn trisection() {
        let a = TimeInterval::new(0, 15).unwrap();
        assert!(a.trisects(&TimeInterval::new(-10, 25).unwrap()));
        assert!(!a.trisects(&a));
        assert!(!a.trisects(&TimeInterval::new(0, 25).unwrap()));
        assert!(!a.trisects(&TimeInterval::new(-10, 15).unwrap()));
        assert!(!a.trisects(&TimeInterval::new(5, 10).unwrap()));
    }

    #[test]
    fn offsets() {
        let a = TimeInterval::new(1, 3).unwrap();
        assert!(a.starts_at_or_after_offset(Rational::from(1)));
        assert!(a.starts_at_or_after_offset(Rational::zero()));
        assert!(!a.starts_at_or_after_offset(r(3, 2)));
        assert!(a.contains_offset(Rational::from(1)));
        assert!(!a.contains_offset(Rational::from(3)));
        assert!(TimeInterval::new(2, 2).unwrap().contains_offset(Rational::from(2)));
    }

    #[test]
    fn transforms() {
        let a = TimeInterval::with_payload(1, 3, 'x').unwrap();
        assert_eq!(a.shift_by_rational(r(1, 2)).signature(), (r(3, 2), r(7, 2)));
        assert_eq!(a.shift_to_rational(Rational::zero()).signature(), (r(0, 1), r(2, 1)));
        assert_eq!(a.scale_by_rational(r(3, 2)).unwrap().signature(), (r(1, 1), r(4, 1)));
        assert!(a.scale_by_rational(r(-1, 2)).is_err());
        assert!(a.scale_to_rational(Rational::from(-1)).is_err());

        let pieces = a.split_at_rationals(vec![
            Rational::from(2),
            Rational::from(0),
            r(3, 2),
            Rational::from(2),
            Rational::from(3),
        ]);
        let signatures: Vec<_> = pieces.iter().map(|p| p.signature()).collect();
        assert_eq!(
            signatures,
            vec![(r(1, 1), r(3, 2)), (r(3, 2), r(2, 1)), (r(2, 1), r(3, 1))]
        );
        assert!(pieces.iter().all(|p| *p.payload() == 'x'));

        let upper = a.clone().map_payload(|c| c.to_ascii_uppercase());
        assert_eq!(*upper.payload(), 'X');
        assert_eq!(upper.bare(), TimeInterval::new(1, 3).unwrap());
    }
}
