//! Voice holds leaves of one musical line.
//!
//! Every leaf gets a [LeafId] on insertion, which stays the same while the
//! leaf lives in the voice and is never given to another leaf.
//!
//! Ties and spanners are not stored in leaves. Voice keeps them in tables,
//! keyed by ids: a tie links a leaf to the one directly following it, and a
//! spanner covers the run of leaves from its start to its stop.
//!
//! # Developer Note
//! Voice operates ids and positions, but does not decide on durations.
//! Everything, that splits or fuses leaves lives in the [meiotic](super::meiotic)
//! and [tie_chain](super::tie_chain) modules, and goes through
//! [Voice::replace_run].

use std::collections::{BTreeMap, HashMap};

use derivative::Derivative;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{Rational, TimedEvent};
use crate::{
    error::{TimeError, TimeResult},
    primitives::TimeInterval,
    tree::TimeIntervalTree,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LeafId(u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SpannerId(u64);

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum SpannerKind {
    Slur,
    Beam,
    Hairpin,
    Trill,
    Text(String),
}

/// Something, that is drawn over the run of leaves.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Spanner {
    pub kind: SpannerKind,
    start: LeafId,
    stop: LeafId,
}
impl Spanner {
    pub fn start(&self) -> LeafId {
        self.start
    }
    pub fn stop(&self) -> LeafId {
        self.stop
    }
}

#[derive(Derivative, Debug, Clone)]
#[derivative(Default(bound = ""))]
pub struct Voice<L> {
    leaves: Vec<(LeafId, L)>,
    /// leaf -> the leaf it is tied to
    ties: HashMap<LeafId, LeafId>,
    /// leaf -> the leaf tied to it
    tied_from: HashMap<LeafId, LeafId>,
    spanners: BTreeMap<SpannerId, Spanner>,
    next_leaf: u64,
    next_spanner: u64,
}

impl<L> Voice<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build voice from leaves, each carrying the "tied to next" flag.
    ///
    /// # Example
    /// ```
    /// # use score_time::primitives::{Leaf, Rational, Voice};
    /// let q = Rational::new(1, 4).unwrap();
    /// let voice = Voice::from_leaves(vec![
    ///     (Leaf::note(60, q).unwrap(), true),
    ///     (Leaf::note(60, q).unwrap(), false),
    ///     (Leaf::rest(q).unwrap(), false),
    /// ])
    /// .unwrap();
    /// let ids: Vec<_> = voice.ids().collect();
    /// assert!(voice.is_tied_to_next(ids[0]).unwrap());
    /// assert!(!voice.is_tied_to_next(ids[1]).unwrap());
    /// ```
    pub fn from_leaves(
        leaves: impl IntoIterator<Item = (L, bool)>,
    ) -> TimeResult<Self> {
        let mut voice = Self::new();
        let mut pending_tie: Option<LeafId> = None;
        for (leaf, tied_to_next) in leaves {
            let id = voice.push(leaf);
            if let Some(previous) = pending_tie.take() {
                voice.tie(previous, id)?;
            }
            if tied_to_next {
                pending_tie = Some(id);
            }
        }
        match pending_tie {
            None => Ok(voice),
            Some(id) => Err(TimeError::InvalidArgument(format!(
                "last leaf {:?} is tied, but nothing follows it",
                id
            ))),
        }
    }

    fn allocate_leaf_id(&mut self) -> LeafId {
        let id = LeafId(self.next_leaf);
        self.next_leaf += 1;
        id
    }

    pub fn push(&mut self, leaf: L) -> LeafId {
        let id = self.allocate_leaf_id();
        self.leaves.push((id, leaf));
        id
    }

    /// Insert leaf at index.
    ///
    /// Fails if index is out of bounds, or if it would split a tie.
    pub fn insert(&mut self, index: usize, leaf: L) -> TimeResult<LeafId> {
        if index > self.leaves.len() {
            return Err(TimeError::InvalidArgument(format!(
                "index {} is out of voice of {} leaves",
                index,
                self.leaves.len()
            )));
        }
        if index > 0 {
            let previous = self.leaves[index - 1].0;
            if let Some(next) = self.ties.get(&previous) {
                return Err(TimeError::InvalidArgument(format!(
                    "can not insert between tied {:?} and {:?}",
                    previous, next
                )));
            }
        }
        let id = self.allocate_leaf_id();
        self.leaves.insert(index, (id, leaf));
        Ok(id)
    }

    /// Remove leaf, dropping its ties.
    ///
    /// Spanners, started or stopped by the leaf, shrink to its neighbors.
    /// Spanners over this leaf only are removed.
    pub fn remove(&mut self, id: LeafId) -> TimeResult<L> {
        let index = self.index_of(id)?;
        self.detach_ties(id);
        let next = self.leaves.get(index + 1).map(|(id, _)| *id);
        let previous = match index {
            0 => None,
            _ => Some(self.leaves[index - 1].0),
        };
        self.spanners.retain(|_, spanner| {
            if spanner.start == id && spanner.stop == id {
                return false;
            }
            if spanner.start == id {
                if let Some(next) = next {
                    spanner.start = next;
                }
            }
            if spanner.stop == id {
                if let Some(previous) = previous {
                    spanner.stop = previous;
                }
            }
            true
        });
        let (_, leaf) = self.leaves.remove(index);
        debug!("removed leaf {:?} at index {}", id, index);
        Ok(leaf)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
    pub fn contains(&self, id: LeafId) -> bool {
        self.leaves.iter().any(|(leaf_id, _)| *leaf_id == id)
    }

    pub fn index_of(&self, id: LeafId) -> TimeResult<usize> {
        self.leaves
            .iter()
            .position(|(leaf_id, _)| *leaf_id == id)
            .ok_or(TimeError::DetachedLeaf(id))
    }
    pub fn get(&self, id: LeafId) -> TimeResult<&L> {
        let index = self.index_of(id)?;
        Ok(&self.leaves[index].1)
    }
    pub fn get_mut(&mut self, id: LeafId) -> TimeResult<&mut L> {
        let index = self.index_of(id)?;
        Ok(&mut self.leaves[index].1)
    }
    pub fn ids(&self) -> impl Iterator<Item = LeafId> + '_ {
        self.leaves.iter().map(|(id, _)| *id)
    }
    pub fn leaves(&self) -> impl Iterator<Item = (LeafId, &L)> + '_ {
        self.leaves.iter().map(|(id, leaf)| (*id, leaf))
    }

    /// Tie leaf to the one, directly following it.
    pub fn tie(&mut self, from: LeafId, to: LeafId) -> TimeResult<()> {
        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;
        if to_index != from_index + 1 {
            return Err(TimeError::InvalidArgument(format!(
                "{:?} does not directly follow {:?}",
                to, from
            )));
        }
        if let Some(existing) = self.ties.get(&from) {
            return Err(TimeError::InvalidArgument(format!(
                "{:?} is already tied to {:?}",
                from, existing
            )));
        }
        if let Some(existing) = self.tied_from.get(&to) {
            return Err(TimeError::InvalidArgument(format!(
                "{:?} is already tied from {:?}",
                to, existing
            )));
        }
        self.ties.insert(from, to);
        self.tied_from.insert(to, from);
        debug!("tied {:?} to {:?}", from, to);
        Ok(())
    }

    /// Remove outgoing tie of the leaf.
    ///
    /// # Returns
    /// The leaf, which was tied to.
    pub fn untie(&mut self, from: LeafId) -> TimeResult<Option<LeafId>> {
        self.index_of(from)?;
        let to = self.ties.remove(&from);
        if let Some(to) = to {
            self.tied_from.remove(&to);
            debug!("untied {:?} from {:?}", from, to);
        }
        Ok(to)
    }

    pub fn is_tied_to_next(&self, id: LeafId) -> TimeResult<bool> {
        self.index_of(id)?;
        Ok(self.ties.contains_key(&id))
    }
    pub fn tied_to(&self, id: LeafId) -> Option<LeafId> {
        self.ties.get(&id).copied()
    }
    pub fn tied_from(&self, id: LeafId) -> Option<LeafId> {
        self.tied_from.get(&id).copied()
    }

    fn detach_ties(&mut self, id: LeafId) {
        if let Some(next) = self.ties.remove(&id) {
            self.tied_from.remove(&next);
        }
        if let Some(previous) = self.tied_from.remove(&id) {
            self.ties.remove(&previous);
        }
    }

    pub fn add_spanner(
        &mut self,
        kind: SpannerKind,
        start: LeafId,
        stop: LeafId,
    ) -> TimeResult<SpannerId> {
        if self.index_of(start)? > self.index_of(stop)? {
            return Err(TimeError::InvalidArgument(format!(
                "spanner start {:?} is after its stop {:?}",
                start, stop
            )));
        }
        let id = SpannerId(self.next_spanner);
        self.next_spanner += 1;
        self.spanners.insert(id, Spanner { kind, start, stop });
        Ok(id)
    }
    pub fn remove_spanner(&mut self, id: SpannerId) -> Option<Spanner> {
        self.spanners.remove(&id)
    }
    pub fn spanner(&self, id: SpannerId) -> Option<&Spanner> {
        self.spanners.get(&id)
    }
    pub fn spanners(&self) -> impl Iterator<Item = (SpannerId, &Spanner)> + '_ {
        self.spanners.iter().map(|(id, spanner)| (*id, spanner))
    }

    /// Spanners, that cover the leaf.
    pub fn spanners_of(&self, leaf: LeafId) -> TimeResult<Vec<SpannerId>> {
        let index = self.index_of(leaf)?;
        let mut found = Vec::new();
        for (id, spanner) in self.spanners.iter() {
            let (start, stop) =
                (self.index_of(spanner.start)?, self.index_of(spanner.stop)?);
            if start <= index && index <= stop {
                found.push(*id);
            }
        }
        Ok(found)
    }

    /// Replace the run of leaves from `first` to `last` (inclusive) by
    /// the given leaves.
    ///
    /// Tie into `first` goes to the first replacement, tie from `last` goes
    /// from the last one. Ties inside the run are dropped. Spanners, started
    /// inside the run, start at the first replacement; spanners, stopped
    /// inside the run, stop at the last one.
    ///
    /// Nothing is changed if the call fails.
    ///
    /// # Returns
    /// Ids of the replacements, in order.
    pub fn replace_run(
        &mut self,
        first: LeafId,
        last: LeafId,
        replacements: Vec<L>,
    ) -> TimeResult<Vec<LeafId>> {
        let start = self.index_of(first)?;
        let stop = self.index_of(last)?;
        if stop < start {
            return Err(TimeError::InvalidArgument(format!(
                "{:?} is after {:?}",
                first, last
            )));
        }
        if replacements.is_empty() {
            return Err(TimeError::InvalidArgument(
                "can not replace leaves by nothing".to_string(),
            ));
        }
        let new_ids: Vec<LeafId> =
            replacements.iter().map(|_| self.allocate_leaf_id()).collect();
        let (new_first, new_last) = (new_ids[0], new_ids[new_ids.len() - 1]);

        let old_ids: Vec<LeafId> =
            self.leaves[start..=stop].iter().map(|(id, _)| *id).collect();
        let incoming = self.tied_from(first);
        let outgoing = self.tied_to(last);
        for id in old_ids.iter() {
            self.detach_ties(*id);
        }
        self.leaves
            .splice(start..=stop, new_ids.iter().copied().zip(replacements))
            .for_each(drop);
        if let Some(previous) = incoming {
            self.ties.insert(previous, new_first);
            self.tied_from.insert(new_first, previous);
        }
        if let Some(next) = outgoing {
            self.ties.insert(new_last, next);
            self.tied_from.insert(next, new_last);
        }
        for spanner in self.spanners.values_mut() {
            if old_ids.contains(&spanner.start) {
                spanner.start = new_first;
            }
            if old_ids.contains(&spanner.stop) {
                spanner.stop = new_last;
            }
        }
        debug!(
            "replaced {} leaves {:?} by {:?}",
            old_ids.len(),
            old_ids,
            new_ids
        );
        Ok(new_ids)
    }
}

impl<L: TimedEvent> Voice<L> {
    /// Sum of prolated durations of all leaves.
    pub fn duration(&self) -> Rational {
        self.leaves.iter().map(|(_, leaf)| leaf.prolated_duration()).sum()
    }

    /// Offset of the leaf start from the voice start.
    pub fn start_offset(&self, id: LeafId) -> TimeResult<Rational> {
        let index = self.index_of(id)?;
        Ok(self.leaves[..index]
            .iter()
            .map(|(_, leaf)| leaf.prolated_duration())
            .sum())
    }

    /// Every leaf as an interval of its sounding time, starting from
    /// `origin`.
    ///
    /// Fails if some leaf reports a negative duration.
    pub fn timespans(
        &self,
        origin: Rational,
    ) -> TimeResult<TimeIntervalTree<LeafId>> {
        let mut offset = origin;
        let mut tree = TimeIntervalTree::new();
        for (id, leaf) in self.leaves.iter() {
            let stop = offset + leaf.prolated_duration();
            tree.insert(TimeInterval::with_payload(offset, stop, *id)?);
            offset = stop;
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::{SpannerKind, Voice};
    use crate::{
        error::TimeError,
        primitives::{Leaf, Rational},
    };

    fn quarter() -> Leaf {
        Leaf::note(60, Rational::new(1, 4).unwrap()).unwrap()
    }

    #[test]
    fn ties() {
        let mut voice = Voice::new();
        let a = voice.push(quarter());
        let b = voice.push(quarter());
        let c = voice.push(quarter());
        assert!(matches!(voice.tie(a, c), Err(TimeError::InvalidArgument(_))));
        voice.tie(a, b).unwrap();
        assert!(voice.tie(a, b).is_err());
        assert_eq!(voice.tied_to(a), Some(b));
        assert_eq!(voice.tied_from(b), Some(a));
        assert!(voice.insert(1, quarter()).is_err());
        assert_eq!(voice.untie(a).unwrap(), Some(b));
        assert_eq!(voice.tied_from(b), None);
        assert!(voice.insert(1, quarter()).is_ok());
        assert_eq!(voice.len(), 4);
    }

    #[test]
    fn trailing_tie_is_rejected() {
        let result = Voice::from_leaves(vec![(quarter(), false), (quarter(), true)]);
        assert!(matches!(result, Err(TimeError::InvalidArgument(_))));
    }

    #[test]
    fn remove_shrinks_spanners() {
        let mut voice = Voice::new();
        let ids: Vec<_> = (0..4).map(|_| voice.push(quarter())).collect();
        voice.tie(ids[0], ids[1]).unwrap();
        let slur = voice.add_spanner(SpannerKind::Slur, ids[0], ids[3]).unwrap();
        let beam = voice.add_spanner(SpannerKind::Beam, ids[2], ids[2]).unwrap();
        assert!(voice.add_spanner(SpannerKind::Slur, ids[3], ids[0]).is_err());
        assert_eq!(voice.spanners_of(ids[2]).unwrap(), vec![slur, beam]);

        voice.remove(ids[0]).unwrap();
        assert_eq!(voice.tied_from(ids[1]), None);
        assert_eq!(voice.spanner(slur).unwrap().start(), ids[1]);
        voice.remove(ids[3]).unwrap();
        assert_eq!(voice.spanner(slur).unwrap().stop(), ids[2]);
        voice.remove(ids[2]).unwrap();
        assert!(voice.spanner(beam).is_none());
        assert_eq!(
            voice.remove(ids[2]).unwrap_err(),
            TimeError::DetachedLeaf(ids[2])
        );
    }

    #[test]
    fn replace_run_keeps_outer_relations() {
        let mut voice = Voice::new();
        let ids: Vec<_> = (0..4).map(|_| voice.push(quarter())).collect();
        voice.tie(ids[0], ids[1]).unwrap();
        voice.tie(ids[1], ids[2]).unwrap();
        voice.tie(ids[2], ids[3]).unwrap();
        let slur = voice.add_spanner(SpannerKind::Slur, ids[1], ids[2]).unwrap();

        let new = voice
            .replace_run(ids[1], ids[2], vec![quarter(), quarter(), quarter()])
            .unwrap();
        assert_eq!(voice.len(), 5);
        assert_eq!(
            voice.ids().collect::<Vec<_>>(),
            vec![ids[0], new[0], new[1], new[2], ids[3]]
        );
        assert_eq!(voice.tied_to(ids[0]), Some(new[0]));
        assert_eq!(voice.tied_to(new[0]), None);
        assert_eq!(voice.tied_to(new[2]), Some(ids[3]));
        assert_eq!(voice.spanner(slur).unwrap().start(), new[0]);
        assert_eq!(voice.spanner(slur).unwrap().stop(), new[2]);
        assert!(!voice.contains(ids[1]));
        assert!(voice.replace_run(ids[3], ids[0], vec![quarter()]).is_err());
        assert!(voice.replace_run(ids[0], ids[0], vec![]).is_err());
        assert_eq!(voice.len(), 5);
    }

    #[test]
    fn offsets() {
        let mut voice = Voice::new();
        let a = voice.push(quarter());
        let mut triplet = Leaf::note(62, Rational::new(1, 8).unwrap()).unwrap();
        triplet.set_multiplier(Rational::new(2, 3).unwrap()).unwrap();
        let b = voice.push(triplet);
        let c = voice.push(quarter());
        assert_eq!(voice.start_offset(a).unwrap(), Rational::zero());
        assert_eq!(voice.start_offset(c).unwrap(), Rational::new(1, 3).unwrap());
        assert_eq!(voice.duration(), Rational::new(7, 12).unwrap());

        let spans = voice.timespans(Rational::from(1)).unwrap();
        let payloads: Vec<_> = spans.iter().map(|i| *i.payload()).collect();
        assert_eq!(payloads, vec![a, b, c]);
        assert_eq!(spans.latest_stop(), Some(Rational::new(19, 12).unwrap()));
    }
}
