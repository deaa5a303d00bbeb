//! Splitting one leaf into equal parts.
use std::num::NonZeroU64;

use log::debug;

use super::{is_power_of_two, voice::LeafId, TimedEvent, Voice};
use crate::error::{TimeError, TimeResult};

/// Replace the leaf by `n` leaves of `1/n` of its written duration.
///
/// `n` must be a positive power of two. Ties and spanners, which started
/// at the leaf, start at the first new leaf; ties and spanners, which
/// stopped at the leaf, stop at the last one. New leaves are not tied to
/// each other.
///
/// # Example
/// ```
/// # use score_time::primitives::{divide_leaf_meiotically, Leaf, Rational, TimedEvent, Voice};
/// let mut voice = Voice::new();
/// let leaf = voice.push(Leaf::note(60, Rational::new(1, 4).unwrap()).unwrap());
/// let parts = divide_leaf_meiotically(&mut voice, leaf, 4).unwrap();
/// assert_eq!(parts.len(), 4);
/// for id in parts {
///     assert_eq!(
///         voice.get(id).unwrap().written_duration(),
///         Rational::new(1, 16).unwrap()
///     );
/// }
/// assert!(divide_leaf_meiotically(&mut voice, leaf, 2).is_err());
/// ```
pub fn divide_leaf_meiotically<L: TimedEvent>(
    voice: &mut Voice<L>,
    leaf: LeafId,
    n: usize,
) -> TimeResult<Vec<LeafId>> {
    let parts = NonZeroU64::new(n as u64)
        .filter(|parts| is_power_of_two(parts.get().into()))
        .ok_or_else(|| {
            TimeError::InvalidArgument(format!(
                "leaf can be divided only by positive power of two, got {}",
                n
            ))
        })?;
    let original = voice.get(leaf)?;
    let duration = original.written_duration().divided_by(parts)?;
    let replacements = (0..n)
        .map(|_| original.with_written_duration(duration))
        .collect();
    let ids = voice.replace_run(leaf, leaf, replacements)?;
    debug!("divided {:?} by {} into {:?}", leaf, n, ids);
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::divide_leaf_meiotically;
    use crate::{
        error::TimeError,
        primitives::{Leaf, Rational, SpannerKind, TimedEvent, Voice},
    };

    fn quarter() -> Leaf {
        Leaf::note(60, Rational::new(1, 4).unwrap()).unwrap()
    }

    #[test]
    fn keeps_total_duration() {
        for n in [1, 2, 4, 8] {
            let mut voice = Voice::new();
            let mut leaf = Leaf::note(62, Rational::new(3, 8).unwrap()).unwrap();
            leaf.set_multiplier(Rational::new(4, 5).unwrap()).unwrap();
            let id = voice.push(leaf);
            let before = voice.duration();
            let parts = divide_leaf_meiotically(&mut voice, id, n).unwrap();
            assert_eq!(parts.len(), n);
            let written: Rational = parts
                .iter()
                .map(|id| voice.get(*id).unwrap().written_duration())
                .sum();
            assert_eq!(written, Rational::new(3, 8).unwrap());
            assert_eq!(voice.duration(), before);
        }
    }

    #[test]
    fn rejects_bad_counts() {
        let mut voice = Voice::new();
        let id = voice.push(quarter());
        for n in [0, 3, 6, 12] {
            assert!(matches!(
                divide_leaf_meiotically(&mut voice, id, n),
                Err(TimeError::InvalidArgument(_))
            ));
        }
        assert_eq!(voice.len(), 1);
        assert_eq!(voice.ids().next(), Some(id));
    }

    #[test]
    fn detached_leaf() {
        let mut voice = Voice::new();
        let id = voice.push(quarter());
        voice.remove(id).unwrap();
        assert_eq!(
            divide_leaf_meiotically(&mut voice, id, 2),
            Err(TimeError::DetachedLeaf(id))
        );
    }

    #[test]
    fn reattaches_ties_and_spanners() {
        let mut voice = Voice::new();
        let a = voice.push(quarter());
        let b = voice.push(quarter());
        let c = voice.push(quarter());
        voice.tie(a, b).unwrap();
        voice.tie(b, c).unwrap();
        let into = voice.add_spanner(SpannerKind::Slur, a, b).unwrap();
        let from = voice.add_spanner(SpannerKind::Hairpin, b, c).unwrap();

        let parts = divide_leaf_meiotically(&mut voice, b, 2).unwrap();
        let ids: Vec<_> = voice.ids().collect();
        assert_eq!(ids, vec![a, parts[0], parts[1], c]);
        assert_eq!(voice.tied_to(a), Some(parts[0]));
        assert_eq!(voice.tied_to(parts[0]), None);
        assert_eq!(voice.tied_to(parts[1]), Some(c));
        assert_eq!(voice.spanner(into).unwrap().stop(), parts[1]);
        assert_eq!(voice.spanner(from).unwrap().start(), parts[0]);
    }
}
