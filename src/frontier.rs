use std::fmt::{Debug, Formatter};
use std::ops::Index;

use smallvec::{smallvec, SmallVec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::causalgraph::graph::Graph;
use crate::{VRange, LV};

/// A frontier names a set of versions with no causal relationship between
/// them - concretely, the dominator set of everything at-or-below it. The
/// frontier of a whole graph is its *heads*: the minimal set of versions
/// which transitively covers every known change.
///
/// Frontiers are always sorted in ascending order and contain no
/// duplicates. The root frontier (before any changes) is empty.
#[derive(Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frontier(pub SmallVec<LV, 2>);

pub(crate) fn is_sorted_slice<const UNIQUE: bool, V: Ord + Copy>(slice: &[V]) -> bool {
    if slice.len() >= 2 {
        let mut last = slice[0];
        for t in &slice[1..] {
            if *t < last || (UNIQUE && *t == last) { return false; }
            last = *t;
        }
    }
    true
}

impl Frontier {
    pub fn root() -> Self {
        Self(smallvec![])
    }

    pub fn new_1(v: LV) -> Self {
        Self(smallvec![v])
    }

    /// The slice must already be sorted ascending with no duplicates.
    pub fn from_sorted(versions: &[LV]) -> Self {
        let result = Self(versions.into());
        result.debug_check_sorted();
        result
    }

    /// Sorts and dedups the passed versions. Note this does *not* reduce
    /// the set to its dominators - mutually reachable versions stay.
    pub fn from_unsorted(versions: &[LV]) -> Self {
        let mut list: SmallVec<LV, 2> = versions.into();
        list.sort_unstable();
        list.dedup();
        Self(list)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_ref(&self) -> &[LV] {
        self.0.as_slice()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LV> {
        self.0.iter()
    }

    pub fn contains(&self, v: LV) -> bool {
        // Frontiers are almost always tiny. A linear scan beats binary
        // search at these sizes.
        self.0.contains(&v)
    }

    pub fn last(&self) -> Option<LV> {
        self.0.last().copied()
    }

    pub fn debug_check_sorted(&self) {
        debug_assert!(is_sorted_slice::<true, _>(self.0.as_slice()));
    }

    pub fn replace_with_1(&mut self, v: LV) {
        self.0.clear();
        self.0.push(v);
    }

    /// Insert the new item, keeping the list sorted.
    pub(crate) fn insert(&mut self, new_item: LV) {
        let idx = self.0.binary_search(&new_item).unwrap_err();
        self.0.insert(idx, new_item);
        self.debug_check_sorted();
    }

    /// Advance the frontier by a run of changes with the given parents.
    /// Any frontier member which is a direct parent of the new run is no
    /// longer a dominator, so it gets removed; the run's last version is
    /// inserted in its place.
    ///
    /// This is ONLY valid when the whole range shares a single parents
    /// list - i.e. the range lies entirely within one graph run.
    pub fn advance_by_known_run(&mut self, parents: &[LV], span: VRange) {
        if parents.len() == 1 && self.0.len() == 1 && parents[0] == self.0[0] {
            // The common case: time advancing linearly.
            self.0[0] = span.last();
            return;
        } else if self.as_ref() == parents {
            self.replace_with_1(span.last());
            return;
        }

        assert!(!self.contains(span.start), "Frontier already contains the new version");
        self.debug_check_sorted();

        self.0.retain(|o| !parents.contains(o)); // Usually removes all elements.
        self.insert(span.last());
    }

    /// Advance the frontier past an arbitrary range of versions, walking
    /// the graph runs the range covers.
    pub fn advance(&mut self, graph: &Graph, mut range: VRange) {
        if range.is_empty() { return; }

        let mut idx = graph.entries.find_index(range.start).unwrap();
        while !range.is_empty() {
            let entry = &graph.entries[idx];
            debug_assert!(entry.contains(range.start));

            let end = entry.span.end.min(range.end);
            entry.with_parents(range.start, |parents| {
                self.advance_by_known_run(parents, (range.start..end).into());
            });

            range.start = end;
            // Entries are ordered, so subsequent spans of the range sit in
            // subsequent entries.
            idx += 1;
        }
    }
}

impl Debug for Frontier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frontier ")?;
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl From<&[LV]> for Frontier {
    fn from(versions: &[LV]) -> Self {
        Self::from_sorted(versions)
    }
}

impl<const N: usize> From<[LV; N]> for Frontier {
    fn from(versions: [LV; N]) -> Self {
        Self::from_sorted(&versions)
    }
}

impl From<SmallVec<LV, 2>> for Frontier {
    fn from(versions: SmallVec<LV, 2>) -> Self {
        let mut f = Self(versions);
        if !is_sorted_slice::<true, _>(f.0.as_slice()) {
            f.0.sort_unstable();
            f.0.dedup();
        }
        f
    }
}

impl FromIterator<LV> for Frontier {
    fn from_iter<T: IntoIterator<Item = LV>>(iter: T) -> Self {
        let list: SmallVec<LV, 2> = iter.into_iter().collect();
        Self::from(list)
    }
}

impl Index<usize> for Frontier {
    type Output = LV;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a Frontier {
    type Item = &'a LV;
    type IntoIter = std::slice::Iter<'a, LV>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
