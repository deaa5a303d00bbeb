//! Ordered collection of [TimeInterval]s with fast overlap queries.
//!
//! [TimeIntervalTree] is a self-balancing (AVL) search tree, keyed by
//! interval start. Every node also knows the earliest start and the latest
//! stop of its subtree, so queries skip subtrees, that can not hold an
//! answer. Bulk operations, that build new trees, live in [algebra].
use std::fmt::Debug;

use derivative::Derivative;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::primitives::{Rational, TimeInterval};

pub mod algebra;
mod node;

use node::{Link, Node};

/// Intervals, iterated by start, and then by insertion order.
///
/// # Example
/// ```
/// # use score_time::{primitives::{Rational, TimeInterval}, tree::TimeIntervalTree};
/// let tree: TimeIntervalTree = vec![
///     TimeInterval::new(0, 3).unwrap(),
///     TimeInterval::new(5, 13).unwrap(),
///     TimeInterval::new(2, 5).unwrap(),
/// ]
/// .into_iter()
/// .collect();
/// assert_eq!(tree.len(), 3);
/// assert_eq!(tree.aggregate_duration(), 13.into());
/// let probe = TimeInterval::new(4, 6).unwrap();
/// let found: Vec<_> =
///     tree.query_overlapping(&probe).iter().map(|i| i.signature()).collect();
/// let r = |n: i64| Rational::from(n);
/// assert_eq!(found, vec![(r(2), r(5)), (r(5), r(13))]);
/// ```
#[derive(Derivative)]
#[derivative(Default(bound = ""), Clone(bound = "P: Clone"))]
pub struct TimeIntervalTree<P = ()> {
    root: Link<P>,
    len: usize,
    next_order: u64,
}

impl<P> TimeIntervalTree<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_intervals(
        intervals: impl IntoIterator<Item = TimeInterval<P>>,
    ) -> Self {
        intervals.into_iter().collect()
    }

    pub fn insert(&mut self, interval: TimeInterval<P>) {
        let node = Node::new(interval, self.next_order);
        self.next_order += 1;
        self.root = Some(node::insert(self.root.take(), node));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, P> {
        Iter::new(&self.root, self.len)
    }

    /// Intervals in iteration order.
    pub fn into_vec(self) -> Vec<TimeInterval<P>> {
        let mut intervals = Vec::with_capacity(self.len);
        node::drain(self.root, &mut intervals);
        intervals
    }

    pub fn earliest_start(&self) -> Option<Rational> {
        self.root.as_ref().map(|root| root.min_start)
    }
    pub fn latest_stop(&self) -> Option<Rational> {
        self.root.as_ref().map(|root| root.max_stop)
    }

    /// From the earliest start to the latest stop, zero for empty tree.
    ///
    /// Gaps are counted, overlaps are not: it is not a sum of durations.
    pub fn aggregate_duration(&self) -> Rational {
        self.bounds()
            .map_or(Rational::zero(), |bounds| bounds.duration())
    }

    /// The whole span of the tree.
    pub fn bounds(&self) -> Option<TimeInterval> {
        self.root.as_ref().map(|root| {
            TimeInterval::with_payload_unchecked(
                root.min_start,
                root.max_stop,
                (),
            )
        })
    }

    /// All intervals, which [overlap](TimeInterval::overlaps) the probe.
    pub fn query_overlapping<Q>(
        &self,
        probe: &TimeInterval<Q>,
    ) -> Vec<&TimeInterval<P>> {
        self.collect_within(probe.start(), probe.stop(), |interval| {
            interval.overlaps(probe)
        })
    }

    pub fn find_intervals_starting_at_offset(
        &self,
        offset: Rational,
    ) -> Vec<&TimeInterval<P>> {
        self.collect_within(offset, offset, |interval| {
            interval.start() == offset
        })
    }

    pub fn find_intervals_stopping_at_offset(
        &self,
        offset: Rational,
    ) -> Vec<&TimeInterval<P>> {
        self.collect_within(offset, offset, |interval| {
            interval.stop() == offset
        })
    }

    /// Intervals, which hold the offset, or touch it by start or stop.
    pub fn find_intervals_intersecting_or_tangent_to_offset(
        &self,
        offset: Rational,
    ) -> Vec<&TimeInterval<P>> {
        self.collect_within(offset, offset, |interval| {
            interval.start() <= offset && offset <= interval.stop()
        })
    }

    pub fn find_intervals_intersecting_or_tangent_to_interval<Q>(
        &self,
        other: &TimeInterval<Q>,
    ) -> Vec<&TimeInterval<P>> {
        self.collect_within(other.start(), other.stop(), |interval| {
            interval.start() <= other.stop()
                && other.start() <= interval.stop()
        })
    }

    pub fn find_intervals_starting_after_offset(
        &self,
        offset: Rational,
    ) -> Vec<&TimeInterval<P>> {
        match self.latest_stop() {
            None => Vec::new(),
            Some(stop) => self.collect_within(offset, stop, |interval| {
                interval.start() > offset
            }),
        }
    }

    fn collect_within(
        &self,
        low: Rational,
        high: Rational,
        predicate: impl Fn(&TimeInterval<P>) -> bool,
    ) -> Vec<&TimeInterval<P>> {
        let mut found = Vec::new();
        node::collect_within(&self.root, low, high, &predicate, &mut found);
        found
    }
}

impl<P: PartialEq> TimeIntervalTree<P> {
    /// Remove one interval, equal to the given by offsets and payload.
    ///
    /// # Returns
    /// false if there was no such interval.
    pub fn remove(&mut self, interval: &TimeInterval<P>) -> bool {
        let Some(key) = node::find_key(&self.root, interval) else {
            return false;
        };
        let (root, removed) = node::remove(self.root.take(), key);
        self.root = root;
        match removed {
            Some(removed) => {
                debug!("removed {:?}", removed.signature());
                self.len -= 1;
                true
            }
            None => false,
        }
    }
}

impl<P> FromIterator<TimeInterval<P>> for TimeIntervalTree<P> {
    fn from_iter<T: IntoIterator<Item = TimeInterval<P>>>(iter: T) -> Self {
        let mut tree = Self::new();
        for interval in iter {
            tree.insert(interval);
        }
        tree
    }
}

impl<P> Extend<TimeInterval<P>> for TimeIntervalTree<P> {
    fn extend<T: IntoIterator<Item = TimeInterval<P>>>(&mut self, iter: T) {
        for interval in iter {
            self.insert(interval);
        }
    }
}

impl<'a, P> IntoIterator for &'a TimeIntervalTree<P> {
    type Item = &'a TimeInterval<P>;
    type IntoIter = Iter<'a, P>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<P> IntoIterator for TimeIntervalTree<P> {
    type Item = TimeInterval<P>;
    type IntoIter = std::vec::IntoIter<TimeInterval<P>>;
    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

/// Trees are equal, if they hold equal intervals in the same order.
impl<P: PartialEq> PartialEq for TimeIntervalTree<P> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}
impl<P: Eq> Eq for TimeIntervalTree<P> {}

impl<P: Debug> Debug for TimeIntervalTree<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Serialized as a plain sequence of intervals.
impl<P: Serialize> Serialize for TimeIntervalTree<P> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
impl<'de, P: Deserialize<'de>> Deserialize<'de> for TimeIntervalTree<P> {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let intervals = Vec::<TimeInterval<P>>::deserialize(deserializer)?;
        Ok(intervals.into_iter().collect())
    }
}

/// In-order iterator over a [TimeIntervalTree].
pub struct Iter<'a, P> {
    stack: Vec<&'a Node<P>>,
    remaining: usize,
}
impl<'a, P> Iter<'a, P> {
    fn new(root: &'a Link<P>, len: usize) -> Self {
        let mut iter = Self {
            stack: Vec::new(),
            remaining: len,
        };
        iter.descend(root.as_deref());
        iter
    }
    fn descend(&mut self, mut node: Option<&'a Node<P>>) {
        while let Some(current) = node {
            self.stack.push(current);
            node = current.left.as_deref();
        }
    }
}
impl<'a, P> Iterator for Iter<'a, P> {
    type Item = &'a TimeInterval<P>;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.descend(node.right.as_deref());
        self.remaining -= 1;
        Some(&node.interval)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
impl<'a, P> ExactSizeIterator for Iter<'a, P> {}
