//! Runs of tied leaves, sounding as one event.
//!
//! [TieChain] does not own anything: it is just a list of ids, taken
//! from the [Voice] at the moment of the call. Every duration is computed
//! against the voice passed in, so after voice edits the chain should be
//! taken again with [get_tie_chain].

use log::debug;
use serde::{Deserialize, Serialize};

use super::{voice::LeafId, Rational, TimedEvent, Voice};
use crate::{
    error::{TimeError, TimeResult},
    primitives::TimeInterval,
    tree::TimeIntervalTree,
};

#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
pub struct TieChain {
    leaves: Vec<LeafId>,
}
impl TieChain {
    pub fn leaves(&self) -> &[LeafId] {
        &self.leaves
    }
    pub fn head(&self) -> LeafId {
        self.leaves[0]
    }
    pub fn tail(&self) -> LeafId {
        self.leaves[self.leaves.len() - 1]
    }
    pub fn len(&self) -> usize {
        self.leaves.len()
    }
    /// Chain is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }
    /// True for a leaf without ties.
    pub fn is_trivial(&self) -> bool {
        self.leaves.len() == 1
    }

    /// Sum of written durations of chain leaves.
    ///
    /// Fails if some leaf has left the voice since the chain was taken.
    pub fn preprolated_duration<L: TimedEvent>(
        &self,
        voice: &Voice<L>,
    ) -> TimeResult<Rational> {
        let mut duration = Rational::zero();
        for id in self.leaves.iter() {
            duration += voice.get(*id)?.written_duration();
        }
        Ok(duration)
    }

    /// The same as [TieChain::preprolated_duration].
    pub fn written_duration<L: TimedEvent>(
        &self,
        voice: &Voice<L>,
    ) -> TimeResult<Rational> {
        self.preprolated_duration(voice)
    }

    /// Sum of durations with tuplet and tremolo multipliers applied.
    pub fn prolated_duration<L: TimedEvent>(
        &self,
        voice: &Voice<L>,
    ) -> TimeResult<Rational> {
        let mut duration = Rational::zero();
        for id in self.leaves.iter() {
            duration += voice.get(*id)?.prolated_duration();
        }
        Ok(duration)
    }
}

/// Get the maximal run of tied leaves, which contains the given one.
///
/// # Example
/// ```
/// # use score_time::primitives::{get_tie_chain, Leaf, Rational, Voice};
/// let r = |n, d| Rational::new(n, d).unwrap();
/// let voice = Voice::from_leaves(vec![
///     (Leaf::note(60, r(1, 4)).unwrap(), true),
///     (Leaf::note(60, r(1, 16)).unwrap(), false),
/// ])
/// .unwrap();
/// let last = voice.ids().last().unwrap();
/// let chain = get_tie_chain(&voice, last).unwrap();
/// assert_eq!(chain.len(), 2);
/// assert_eq!(chain.preprolated_duration(&voice).unwrap(), r(5, 16));
/// ```
pub fn get_tie_chain<L>(voice: &Voice<L>, leaf: LeafId) -> TimeResult<TieChain> {
    if !voice.contains(leaf) {
        return Err(TimeError::DetachedLeaf(leaf));
    }
    let mut head = leaf;
    while let Some(previous) = voice.tied_from(head) {
        head = previous;
    }
    let mut leaves = vec![head];
    let mut current = head;
    while let Some(next) = voice.tied_to(current) {
        leaves.push(next);
        current = next;
    }
    Ok(TieChain { leaves })
}

impl<L> Voice<L> {
    /// All chains of the voice in order. Every leaf is in exactly one chain.
    pub fn tie_chains(&self) -> Vec<TieChain> {
        let mut chains = Vec::new();
        for id in self.ids() {
            if self.tied_from(id).is_some() {
                continue;
            }
            let mut leaves = vec![id];
            let mut current = id;
            while let Some(next) = self.tied_to(current) {
                leaves.push(next);
                current = next;
            }
            chains.push(TieChain { leaves });
        }
        chains
    }
}

impl<L: TimedEvent> Voice<L> {
    /// Every chain as an interval of its sounding time, starting from
    /// `origin`.
    pub fn tie_chain_timespans(
        &self,
        origin: Rational,
    ) -> TimeResult<TimeIntervalTree<TieChain>> {
        let mut offset = origin;
        let mut tree = TimeIntervalTree::new();
        for chain in self.tie_chains() {
            let stop = offset + chain.prolated_duration(self)?;
            tree.insert(TimeInterval::with_payload(offset, stop, chain)?);
            offset = stop;
        }
        Ok(tree)
    }
}

/// Replace the chain, holding the leaf, by as few tied leaves as possible.
///
/// New leaves are copies of the chain head with written durations from
/// [Rational::split_assignable], so one leaf is left if the chain
/// duration is assignable. Ties and spanners around the chain are kept.
///
/// Fails if chain leaves have different multipliers.
///
/// # Returns
/// Ids of the new leaves.
pub fn fuse_tie_chain<L: TimedEvent>(
    voice: &mut Voice<L>,
    leaf: LeafId,
) -> TimeResult<Vec<LeafId>> {
    let chain = get_tie_chain(voice, leaf)?;
    let head = voice.get(chain.head())?.clone();
    for id in chain.leaves() {
        if voice.get(*id)?.multiplier() != head.multiplier() {
            return Err(TimeError::InvalidArgument(format!(
                "can not fuse {:?}: leaves have different multipliers",
                chain.leaves()
            )));
        }
    }
    let duration = chain.preprolated_duration(voice)?;
    let replacements = duration
        .split_assignable()?
        .into_iter()
        .map(|part| head.with_written_duration(part))
        .collect();
    let ids = voice.replace_run(chain.head(), chain.tail(), replacements)?;
    for pair in ids.windows(2) {
        voice.tie(pair[0], pair[1])?;
    }
    debug!(
        "fused tie chain {:?} of {} into {:?}",
        chain.leaves(),
        duration,
        ids
    );
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::{fuse_tie_chain, get_tie_chain};
    use crate::{
        error::TimeError,
        primitives::{Leaf, Rational, SpannerKind, TimedEvent, Voice},
    };

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }
    fn note(n: i64, d: i64) -> Leaf {
        Leaf::note(60, r(n, d)).unwrap()
    }

    #[test]
    fn chains_partition_voice() {
        let voice = Voice::from_leaves(vec![
            (note(1, 4), false),
            (note(1, 8), true),
            (note(1, 8), true),
            (note(1, 2), false),
            (Leaf::rest(r(1, 4)).unwrap(), false),
        ])
        .unwrap();
        let ids: Vec<_> = voice.ids().collect();
        let chains = voice.tie_chains();
        assert_eq!(chains.len(), 3);
        assert!(chains[0].is_trivial());
        assert_eq!(chains[1].leaves(), &ids[1..4]);
        assert_eq!(get_tie_chain(&voice, ids[2]).unwrap(), chains[1]);
        assert_eq!(chains[1].preprolated_duration(&voice).unwrap(), r(3, 4));
        assert_eq!(
            get_tie_chain(&voice, ids[0]).unwrap().preprolated_duration(&voice).unwrap(),
            r(1, 4)
        );

        let spans = voice.tie_chain_timespans(Rational::zero()).unwrap();
        let signatures: Vec<_> = spans.iter().map(|i| i.signature()).collect();
        assert_eq!(
            signatures,
            vec![(r(0, 1), r(1, 4)), (r(1, 4), r(1, 1)), (r(1, 1), r(5, 4))]
        );
    }

    #[test]
    fn detached_leaf() {
        let mut voice = Voice::new();
        let a = voice.push(note(1, 4));
        voice.remove(a).unwrap();
        assert_eq!(get_tie_chain(&voice, a), Err(TimeError::DetachedLeaf(a)));
    }

    #[test]
    fn prolated_duration() {
        let mut first = note(1, 8);
        first.set_multiplier(r(2, 3)).unwrap();
        let voice = Voice::from_leaves(vec![(first, true), (note(1, 4), false)]).unwrap();
        let chain = voice.tie_chains().remove(0);
        assert_eq!(chain.preprolated_duration(&voice).unwrap(), r(3, 8));
        assert_eq!(chain.prolated_duration(&voice).unwrap(), r(1, 3));
    }

    #[test]
    fn fuse() {
        let mut voice = Voice::from_leaves(vec![
            (note(1, 4), true),
            (note(1, 8), true),
            (note(1, 16), true),
            (note(1, 4), false),
        ])
        .unwrap();
        let ids: Vec<_> = voice.ids().collect();
        let slur = voice.add_spanner(SpannerKind::Slur, ids[1], ids[3]).unwrap();
        let fused = fuse_tie_chain(&mut voice, ids[2]).unwrap();
        // 11/16 = 1/2 + 3/16
        assert_eq!(fused.len(), 2);
        let durations: Vec<_> = voice.leaves().map(|(_, l)| l.written_duration()).collect();
        assert_eq!(durations, vec![r(1, 2), r(3, 16)]);
        assert_eq!(voice.tied_to(fused[0]), Some(fused[1]));
        assert_eq!(voice.spanner(slur).unwrap().start(), fused[0]);
        assert_eq!(voice.spanner(slur).unwrap().stop(), fused[1]);

        let mut voice = Voice::from_leaves(vec![(note(1, 4), true), (note(1, 8), false)]).unwrap();
        let head = voice.ids().next().unwrap();
        let fused = fuse_tie_chain(&mut voice, head).unwrap();
        assert_eq!(fused.len(), 1);
        assert_eq!(voice.get(fused[0]).unwrap().written_duration(), r(3, 8));
    }

    #[test]
    fn fuse_rejects_mixed_multipliers() {
        let mut tuplet = note(1, 8);
        tuplet.set_multiplier(r(2, 3)).unwrap();
        let mut voice = Voice::from_leaves(vec![(note(1, 8), true), (tuplet, false)]).unwrap();
        let head = voice.ids().next().unwrap();
        assert!(matches!(
            fuse_tie_chain(&mut voice, head),
            Err(TimeError::InvalidArgument(_))
        ));
        assert_eq!(voice.len(), 2);
    }
}
