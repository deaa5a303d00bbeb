//! AVL nodes, annotated with subtree extents.
use std::cmp::Ordering;

use log::trace;

use crate::primitives::{Rational, TimeInterval};

pub(super) type Link<P> = Option<Box<Node<P>>>;

/// Nodes are ordered by `(start, order)`, where `order` is the insertion
/// number, so intervals with equal start keep insertion order.
#[derive(Debug, Clone)]
pub(super) struct Node<P> {
    pub interval: TimeInterval<P>,
    pub order: u64,
    height: u32,
    /// Earliest start in the subtree.
    pub min_start: Rational,
    /// Latest stop in the subtree.
    pub max_stop: Rational,
    pub left: Link<P>,
    pub right: Link<P>,
}
impl<P> Node<P> {
    pub fn new(interval: TimeInterval<P>, order: u64) -> Box<Self> {
        Box::new(Self {
            min_start: interval.start(),
            max_stop: interval.stop(),
            interval,
            order,
            height: 1,
            left: None,
            right: None,
        })
    }

    pub fn key(&self) -> (Rational, u64) {
        (self.interval.start(), self.order)
    }

    fn update(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.min_start = self.interval.start();
        self.max_stop = self.interval.stop();
        for child in [&self.left, &self.right].into_iter().flatten() {
            self.min_start = self.min_start.min(child.min_start);
            self.max_stop = self.max_stop.max(child.max_stop);
        }
    }

    fn balance_factor(&self) -> i64 {
        height(&self.left) as i64 - height(&self.right) as i64
    }
}

fn height<P>(link: &Link<P>) -> u32 {
    link.as_ref().map_or(0, |node| node.height)
}

fn rotate_left<P>(mut node: Box<Node<P>>) -> Box<Node<P>> {
    match node.right.take() {
        None => node,
        Some(mut right) => {
            node.right = right.left.take();
            node.update();
            right.left = Some(node);
            right.update();
            right
        }
    }
}

fn rotate_right<P>(mut node: Box<Node<P>>) -> Box<Node<P>> {
    match node.left.take() {
        None => node,
        Some(mut left) => {
            node.left = left.right.take();
            node.update();
            left.right = Some(node);
            left.update();
            left
        }
    }
}

fn rebalance<P>(mut node: Box<Node<P>>) -> Box<Node<P>> {
    node.update();
    let balance = node.balance_factor();
    if balance > 1 {
        trace!("rotating right at {:?}", node.key());
        if let Some(left) = node.left.take() {
            node.left = Some(match left.balance_factor() < 0 {
                true => rotate_left(left),
                false => left,
            });
        }
        return rotate_right(node);
    }
    if balance < -1 {
        trace!("rotating left at {:?}", node.key());
        if let Some(right) = node.right.take() {
            node.right = Some(match right.balance_factor() > 0 {
                true => rotate_right(right),
                false => right,
            });
        }
        return rotate_left(node);
    }
    node
}

pub(super) fn insert<P>(link: Link<P>, new: Box<Node<P>>) -> Box<Node<P>> {
    match link {
        None => new,
        Some(mut node) => {
            if new.key() < node.key() {
                node.left = Some(insert(node.left.take(), new));
            } else {
                node.right = Some(insert(node.right.take(), new));
            }
            rebalance(node)
        }
    }
}

/// Detach the leftmost node of the subtree.
fn take_min<P>(mut node: Box<Node<P>>) -> (Link<P>, Box<Node<P>>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

pub(super) fn remove<P>(
    link: Link<P>,
    key: (Rational, u64),
) -> (Link<P>, Option<TimeInterval<P>>) {
    let Some(mut node) = link else {
        return (None, None);
    };
    match key.cmp(&node.key()) {
        Ordering::Less => {
            let (left, removed) = remove(node.left.take(), key);
            node.left = left;
            (Some(rebalance(node)), removed)
        }
        Ordering::Greater => {
            let (right, removed) = remove(node.right.take(), key);
            node.right = right;
            (Some(rebalance(node)), removed)
        }
        Ordering::Equal => {
            let Node {
                interval,
                left,
                right,
                ..
            } = *node;
            let replacement = match (left, right) {
                (None, None) => None,
                (Some(child), None) | (None, Some(child)) => Some(child),
                (Some(left), Some(right)) => {
                    let (rest, mut successor) = take_min(right);
                    successor.left = Some(left);
                    successor.right = rest;
                    Some(rebalance(successor))
                }
            };
            (replacement, Some(interval))
        }
    }
}

/// Key of the first node in order, which interval is equal to the given.
pub(super) fn find_key<P: PartialEq>(
    link: &Link<P>,
    interval: &TimeInterval<P>,
) -> Option<(Rational, u64)> {
    let node = link.as_ref()?;
    match interval.start().cmp(&node.interval.start()) {
        Ordering::Less => find_key(&node.left, interval),
        Ordering::Greater => find_key(&node.right, interval),
        Ordering::Equal => find_key(&node.left, interval)
            .or_else(|| match node.interval == *interval {
                true => Some(node.key()),
                false => None,
            })
            .or_else(|| find_key(&node.right, interval)),
    }
}

/// Push to `found` in start order every interval, matching `predicate`,
/// from subtrees, which extents touch `[low, high]`.
pub(super) fn collect_within<'a, P>(
    link: &'a Link<P>,
    low: Rational,
    high: Rational,
    predicate: &impl Fn(&TimeInterval<P>) -> bool,
    found: &mut Vec<&'a TimeInterval<P>>,
) {
    let Some(node) = link else {
        return;
    };
    if node.max_stop < low || node.min_start > high {
        trace!("pruned subtree at {:?}", node.key());
        return;
    }
    collect_within(&node.left, low, high, predicate, found);
    if predicate(&node.interval) {
        found.push(&node.interval);
    }
    if node.interval.start() <= high {
        collect_within(&node.right, low, high, predicate, found);
    }
}

pub(super) fn drain<P>(link: Link<P>, out: &mut Vec<TimeInterval<P>>) {
    if let Some(node) = link {
        let Node {
            interval,
            left,
            right,
            ..
        } = *node;
        drain(left, out);
        out.push(interval);
        drain(right, out);
    }
}

#[cfg(test)]
pub(super) fn check_invariants<P>(link: &Link<P>) -> u32 {
    let Some(node) = link else {
        return 0;
    };
    let (left, right) = (
        check_invariants(&node.left),
        check_invariants(&node.right),
    );
    assert!((left as i64 - right as i64).abs() <= 1);
    assert_eq!(node.height, 1 + left.max(right));
    if let Some(child) = &node.left {
        assert!(child.key() < node.key());
    }
    if let Some(child) = &node.right {
        assert!(child.key() > node.key());
    }
    let mut min_start = node.interval.start();
    let mut max_stop = node.interval.stop();
    for child in [&node.left, &node.right].into_iter().flatten() {
        min_start = min_start.min(child.min_start);
        max_stop = max_stop.max(child.max_stop);
    }
    assert_eq!(node.min_start, min_start);
    assert_eq!(node.max_stop, max_stop);
    node.height
}
