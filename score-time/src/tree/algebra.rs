//! Operations over whole trees.
//!
//! Every function here leaves its argument untouched and builds a new
//! tree. Operations, that look at coverage rather than at single
//! intervals (fuse, depth, logical ones), drop payloads and return
//! `TimeIntervalTree<()>` or `TimeIntervalTree<usize>` for depth.
use itertools::Itertools;
use log::{debug, trace};

use super::TimeIntervalTree;
use crate::{
    error::{TimeError, TimeResult},
    primitives::{Rational, TimeInterval},
};

/// Runs of intervals, where every interval starts not later than some
/// previous interval of the run stops. Touching intervals share a run.
///
/// Intervals keep tree order inside the runs, runs are ordered by start.
pub fn group_overlapping_intervals<P>(
    tree: &TimeIntervalTree<P>,
) -> Vec<Vec<&TimeInterval<P>>> {
    let mut groups = Vec::new();
    let mut current: Vec<&TimeInterval<P>> = Vec::new();
    let mut stop = Rational::zero();
    for interval in tree.iter() {
        if !current.is_empty() && interval.start() > stop {
            groups.push(std::mem::take(&mut current));
        }
        stop = match current.is_empty() {
            true => interval.stop(),
            false => stop.max(interval.stop()),
        };
        current.push(interval);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Replace every run of overlapping or touching intervals by one interval
/// from the earliest start to the latest stop of the run.
///
/// # Example
/// ```
/// # use score_time::{primitives::TimeInterval, tree::{algebra, TimeIntervalTree}};
/// let tree: TimeIntervalTree = [(0, 3), (2, 5), (5, 13), (15, 23)]
///     .into_iter()
///     .map(|(start, stop)| TimeInterval::new(start, stop).unwrap())
///     .collect();
/// let fused = algebra::fuse_overlapping_intervals(&tree);
/// assert_eq!(
///     fused.into_vec(),
///     vec![TimeInterval::new(0, 13).unwrap(), TimeInterval::new(15, 23).unwrap()]
/// );
/// ```
pub fn fuse_overlapping_intervals<P>(
    tree: &TimeIntervalTree<P>,
) -> TimeIntervalTree {
    let fused: TimeIntervalTree = group_overlapping_intervals(tree)
        .into_iter()
        .filter_map(|group| {
            let start = group.first()?.start();
            let stop = group.iter().map(|interval| interval.stop()).max()?;
            Some(TimeInterval::with_payload_unchecked(start, stop, ()))
        })
        .collect();
    debug!("fused {} intervals into {}", tree.len(), fused.len());
    fused
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Event {
    // Stops go first, so touching intervals do not overlap.
    Stop,
    Bound,
    Start,
}

/// Depth regions between `low` and `high`, merged when adjacent and equal.
fn depth_regions<P>(
    tree: &TimeIntervalTree<P>,
    low: Rational,
    high: Rational,
) -> Vec<TimeInterval<usize>> {
    let mut events = vec![(low, Event::Bound), (high, Event::Bound)];
    for interval in tree.iter().filter(|interval| !interval.is_instant()) {
        events.push((interval.start(), Event::Start));
        events.push((interval.stop(), Event::Stop));
    }
    events.sort();

    let mut regions = Vec::new();
    let mut depth = 0_usize;
    let mut previous = None;
    for (offset, event) in events {
        if let Some(previous) = previous {
            let (start, stop) = (Rational::max(previous, low), offset.min(high));
            if start < stop {
                regions.push(TimeInterval::with_payload_unchecked(
                    start, stop, depth,
                ));
            }
        }
        match event {
            Event::Start => depth += 1,
            Event::Stop => depth = depth.saturating_sub(1),
            Event::Bound => (),
        }
        previous = Some(offset);
    }
    trace!("depth sweep over [{}, {}]: {:?}", low, high, regions);
    regions
        .into_iter()
        .coalesce(|a, b| match a.payload() == b.payload() && a.stop() == b.start() {
            true => Ok(TimeInterval::with_payload_unchecked(
                a.start(),
                b.stop(),
                *a.payload(),
            )),
            false => Err((a, b)),
        })
        .collect()
}

/// Maximal regions of constant depth between the earliest start and the
/// latest stop. Payload is the count of intervals covering the region.
///
/// Instants do not add depth. Empty tree gives empty tree.
pub fn compute_depth_of_intervals<P>(
    tree: &TimeIntervalTree<P>,
) -> TimeIntervalTree<usize> {
    match tree.bounds() {
        None => TimeIntervalTree::new(),
        Some(bounds) => compute_depth_of_intervals_in_interval(tree, &bounds),
    }
}

/// As [compute_depth_of_intervals], but over the given bounds: parts of
/// the tree outside are cut off, uncovered parts of bounds get depth 0.
pub fn compute_depth_of_intervals_in_interval<P, Q>(
    tree: &TimeIntervalTree<P>,
    bounds: &TimeInterval<Q>,
) -> TimeIntervalTree<usize> {
    depth_regions(tree, bounds.start(), bounds.stop())
        .into_iter()
        .collect()
}

fn fused_where(
    depth: TimeIntervalTree<usize>,
    keep: impl Fn(usize) -> bool,
) -> TimeIntervalTree {
    let kept: TimeIntervalTree = depth
        .into_iter()
        .filter(|region| keep(*region.payload()))
        .map(|region| region.bare())
        .collect();
    fuse_overlapping_intervals(&kept)
}

/// Gaps between intervals of the tree.
pub fn compute_logical_not<P>(tree: &TimeIntervalTree<P>) -> TimeIntervalTree {
    fused_where(compute_depth_of_intervals(tree), |depth| depth == 0)
}

/// Parts of bounds, that are not covered by the tree.
///
/// ```
/// # use score_time::{primitives::TimeInterval, tree::{algebra, TimeIntervalTree}};
/// let tree: TimeIntervalTree =
///     std::iter::once(TimeInterval::new(2, 5).unwrap()).collect();
/// let bounds = TimeInterval::new(0, 10).unwrap();
/// let not = algebra::compute_logical_not_in_interval(&tree, &bounds);
/// assert_eq!(
///     not.into_vec(),
///     vec![TimeInterval::new(0, 2).unwrap(), TimeInterval::new(5, 10).unwrap()]
/// );
/// ```
pub fn compute_logical_not_in_interval<P, Q>(
    tree: &TimeIntervalTree<P>,
    bounds: &TimeInterval<Q>,
) -> TimeIntervalTree {
    fused_where(
        compute_depth_of_intervals_in_interval(tree, bounds),
        |depth| depth == 0,
    )
}

/// Regions covered by at least two intervals.
pub fn compute_logical_and<P>(tree: &TimeIntervalTree<P>) -> TimeIntervalTree {
    fused_where(compute_depth_of_intervals(tree), |depth| depth > 1)
}

/// Regions covered by at least one interval.
pub fn compute_logical_or<P>(tree: &TimeIntervalTree<P>) -> TimeIntervalTree {
    fused_where(compute_depth_of_intervals(tree), |depth| depth >= 1)
}

/// Regions covered by exactly one interval.
pub fn compute_logical_xor<P>(tree: &TimeIntervalTree<P>) -> TimeIntervalTree {
    fused_where(compute_depth_of_intervals(tree), |depth| depth == 1)
}

/// Every start and stop of the tree, sorted, without duplicates.
pub fn get_all_unique_bounds_in_intervals<P>(
    tree: &TimeIntervalTree<P>,
) -> Vec<Rational> {
    tree.iter()
        .flat_map(|interval| [interval.start(), interval.stop()])
        .sorted()
        .dedup()
        .collect()
}

fn must_be_positive(value: Rational, what: &str) -> TimeResult<()> {
    match value.is_positive() {
        true => Ok(()),
        false => Err(TimeError::InvalidArgument(format!(
            "{} must be positive, got {}",
            what, value
        ))),
    }
}

/// New tree, where every interval gets offsets from `offsets`, called
/// with its old `(start, stop)`.
///
/// `offsets` must keep `start <= stop`.
fn remap<P: Clone>(
    tree: &TimeIntervalTree<P>,
    offsets: impl Fn(Rational, Rational) -> TimeResult<(Rational, Rational)>,
) -> TimeResult<TimeIntervalTree<P>> {
    tree.iter()
        .map(|interval| {
            let (start, stop) = offsets(interval.start(), interval.stop())?;
            Ok(TimeInterval::with_payload_unchecked(
                start,
                stop,
                interval.payload().clone(),
            ))
        })
        .collect()
}

/// Stretch the tree, so its aggregate duration becomes `rational`.
///
/// Earliest start stays in place, every other offset moves
/// proportionally to its distance from it.
///
/// # Errors
/// [TimeError::InvalidArgument] if `rational` is not positive, or if
/// non-empty tree has zero aggregate duration.
/// [TimeError::Overflow] if a scaled offset does not fit [Rational].
pub fn scale_aggregate_duration_to_rational<P: Clone>(
    tree: &TimeIntervalTree<P>,
    rational: Rational,
) -> TimeResult<TimeIntervalTree<P>> {
    must_be_positive(rational, "aggregate duration")?;
    let Some(bounds) = tree.bounds() else {
        return Ok(TimeIntervalTree::new());
    };
    let ratio = rational.checked_div(bounds.duration()).map_err(|_| {
        TimeError::InvalidArgument(format!(
            "can not scale tree of zero duration at {}",
            bounds.start()
        ))
    })?;
    let origin = bounds.start();
    debug!("scaling tree by {} around {}", ratio, origin);
    let scale = |offset: Rational| {
        origin.checked_add(offset.checked_sub(origin)?.checked_mul(ratio)?)
    };
    remap(tree, |start, stop| Ok((scale(start)?, scale(stop)?)))
}

/// Multiply distances of starts from the earliest start, keeping
/// durations.
pub fn scale_interval_offsets_by_rational<P: Clone>(
    tree: &TimeIntervalTree<P>,
    rational: Rational,
) -> TimeResult<TimeIntervalTree<P>> {
    must_be_positive(rational, "offset factor")?;
    let Some(origin) = tree.earliest_start() else {
        return Ok(TimeIntervalTree::new());
    };
    remap(tree, |start, stop| {
        let new_start =
            origin.checked_add(start.checked_sub(origin)?.checked_mul(rational)?)?;
        Ok((new_start, new_start.checked_add(stop.checked_sub(start)?)?))
    })
}

/// Multiply every duration, keeping starts.
pub fn scale_interval_durations_by_rational<P: Clone>(
    tree: &TimeIntervalTree<P>,
    rational: Rational,
) -> TimeResult<TimeIntervalTree<P>> {
    must_be_positive(rational, "duration factor")?;
    remap(tree, |start, stop| {
        let duration = stop.checked_sub(start)?.checked_mul(rational)?;
        Ok((start, start.checked_add(duration)?))
    })
}

/// Move the whole tree, so it starts at `rational`.
///
/// # Errors
/// [TimeError::Overflow] if a shifted offset does not fit [Rational].
pub fn shift_aggregate_offset_to_rational<P: Clone>(
    tree: &TimeIntervalTree<P>,
    rational: Rational,
) -> TimeResult<TimeIntervalTree<P>> {
    match tree.earliest_start() {
        None => Ok(TimeIntervalTree::new()),
        Some(origin) => {
            let delta = rational.checked_sub(origin)?;
            remap(tree, |start, stop| {
                Ok((start.checked_add(delta)?, stop.checked_add(delta)?))
            })
        }
    }
}

/// Split every interval at the offsets, that are strictly inside it.
pub fn split_intervals_at_rationals<P: Clone>(
    tree: &TimeIntervalTree<P>,
    rationals: &[Rational],
) -> TimeIntervalTree<P> {
    tree.iter()
        .flat_map(|interval| {
            interval.split_at_rationals(rationals.iter().copied())
        })
        .collect()
}

/// Lengthen intervals shorter than `minimum` and shorten ones longer than
/// `maximum`, keeping starts.
///
/// # Errors
/// [TimeError::InvalidArgument] if `minimum` is negative, `maximum` is
/// not positive, or `minimum > maximum`.
pub fn clip_interval_durations_to_range<P: Clone>(
    tree: &TimeIntervalTree<P>,
    minimum: Option<Rational>,
    maximum: Option<Rational>,
) -> TimeResult<TimeIntervalTree<P>> {
    if let Some(minimum) = minimum {
        if minimum.is_negative() {
            return Err(TimeError::InvalidArgument(format!(
                "minimum duration can not be negative, got {}",
                minimum
            )));
        }
    }
    if let Some(maximum) = maximum {
        must_be_positive(maximum, "maximum duration")?;
    }
    if let (Some(minimum), Some(maximum)) = (minimum, maximum) {
        if minimum > maximum {
            return Err(TimeError::InvalidArgument(format!(
                "minimum {} is greater than maximum {}",
                minimum, maximum
            )));
        }
    }
    remap(tree, |start, stop| {
        let mut duration = stop.checked_sub(start)?;
        if let Some(minimum) = minimum {
            duration = duration.max(minimum);
        }
        if let Some(maximum) = maximum {
            duration = duration.min(maximum);
        }
        Ok((start, start.checked_add(duration)?))
    })
}

/// Keep only the parts of `masked` intervals, that lie inside the fused
/// regions of `mask`.
///
/// Pieces get clones of payloads. Instants are kept if some mask region
/// contains them.
pub fn mask_intervals_with_intervals<P: Clone, Q>(
    masked: &TimeIntervalTree<P>,
    mask: &TimeIntervalTree<Q>,
) -> TimeIntervalTree<P> {
    let regions = fuse_overlapping_intervals(mask);
    let mut result = TimeIntervalTree::new();
    for interval in masked.iter() {
        if interval.is_instant() {
            let inside = regions
                .find_intervals_intersecting_or_tangent_to_offset(
                    interval.start(),
                )
                .into_iter()
                .any(|region| region.contains_offset(interval.start()));
            if inside {
                result.insert(interval.clone());
            }
            continue;
        }
        for region in regions.query_overlapping(interval) {
            let start = region.start().max(interval.start());
            let stop = region.stop().min(interval.stop());
            result.insert(TimeInterval::with_payload_unchecked(
                start,
                stop,
                interval.payload().clone(),
            ));
        }
    }
    result
}

/// Put trees one after another: every next tree starts at the latest
/// stop of the previous one plus `padding`. The first tree stays in place,
/// empty trees are skipped.
pub fn concatenate_trees<P>(
    trees: impl IntoIterator<Item = TimeIntervalTree<P>>,
    padding: Rational,
) -> TimeResult<TimeIntervalTree<P>> {
    if padding.is_negative() {
        return Err(TimeError::InvalidArgument(format!(
            "padding can not be negative, got {}",
            padding
        )));
    }
    let mut result = TimeIntervalTree::new();
    for tree in trees {
        let (Some(start), Some(stop)) = (tree.earliest_start(), tree.latest_stop())
        else {
            continue;
        };
        let delta = match result.latest_stop() {
            None => Rational::zero(),
            Some(previous) => previous.checked_add(padding)?.checked_sub(start)?,
        };
        trace!("appending tree [{}, {}] shifted by {}", start, stop, delta);
        for interval in tree {
            let (start, stop) = interval.signature();
            result.insert(TimeInterval::with_payload_unchecked(
                start.checked_add(delta)?,
                stop.checked_add(delta)?,
                interval.into_payload(),
            ));
        }
    }
    Ok(result)
}
