//! The parents half of the causal graph: for every local version, which
//! versions came immediately before it. Also home to the graph traversal
//! algorithms (diff / containment / dominators / conflict scan).

pub mod tools;
mod check;

use rle::{HasLength, HasRleKey, MergableSpan, SplitableSpan, SplitableSpanHelpers};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::vrange::VRange;
use crate::rle::RleVec;
use crate::{Frontier, LV};

/// Metadata for a run of changes with a linear parent chain: the first
/// change in the run has `parents`, and every subsequent change has the
/// preceding version as its sole parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GraphEntryInternal {
    pub span: VRange,

    /// Every version in `[shadow, span.end)` is a transitive parent of the
    /// run's last change. Derived from the other fields; used to prune
    /// graph traversals early.
    pub shadow: usize,

    /// Parents of the *first* change in the run. Empty when the run hangs
    /// off the root, one entry for a simple change, two or more when the
    /// run starts with a merge.
    pub parents: Frontier,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Graph {
    pub(crate) entries: RleVec<GraphEntryInternal>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_entries(&self) -> usize {
        self.entries.num_entries()
    }

    pub fn len(&self) -> usize {
        self.entries.end()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The parents of the single version `v`.
    pub fn parents_at_version(&self, v: LV) -> Frontier {
        let entry = self.entries.find_packed(v);
        entry.with_parents(v, |p| Frontier::from_sorted(p))
    }

    /// Add a run of versions with the named parents. A run which chains
    /// linearly off the end of the previous one just grows it - which is
    /// also the only way adjacent entries could ever merge, so anything
    /// past this check gets stored as a fresh entry.
    pub(crate) fn push(&mut self, parents: &[LV], range: VRange) {
        if let Some(last) = self.entries.0.last_mut() {
            debug_assert_eq!(last.span.end, range.start);

            if parents.len() == 1 && parents[0] == last.span.last() {
                last.span.end = range.end;
                return;
            }
        }

        let shadow = self.shadow_below(parents, range.start);
        self.entries.0.push(GraphEntryInternal {
            span: range,
            shadow,
            parents: Frontier::from_sorted(parents),
        });
    }

    /// Compute a new run's shadow. Starting from the run itself: whenever
    /// the version directly underneath is one of the parents, the run
    /// linearly extends that parent's run and inherits its shadow, and the
    /// walk repeats from there.
    fn shadow_below(&self, parents: &[LV], start: LV) -> LV {
        let mut shadow = start;
        while shadow > 0 && parents.contains(&(shadow - 1)) {
            shadow = self.entries.find_packed(shadow - 1).shadow;
        }
        shadow
    }
}

impl GraphEntryInternal {
    /// Runs the callback with the parents of version `v` (which must lie
    /// inside this entry), without cloning anything.
    pub fn with_parents<F: FnOnce(&[LV]) -> G, G>(&self, v: usize, f: F) -> G {
        if v > self.span.start {
            f(&[v - 1])
        } else {
            f(self.parents.as_ref())
        }
    }

    pub fn contains(&self, v: usize) -> bool {
        self.span.contains(v)
    }

    pub fn last_version(&self) -> usize {
        self.span.last()
    }

    pub fn shadow_contains(&self, v: usize) -> bool {
        debug_assert!(v <= self.last_version());
        v >= self.shadow
    }
}

impl HasLength for GraphEntryInternal {
    fn len(&self) -> usize {
        self.span.len()
    }
}

impl MergableSpan for GraphEntryInternal {
    fn can_append(&self, other: &Self) -> bool {
        self.span.can_append(&other.span)
            && other.parents.len() == 1
            && other.parents[0] == self.last_version()
            && other.shadow == self.shadow
    }

    fn append(&mut self, other: Self) {
        self.span.append(other.span);
    }

    fn prepend(&mut self, other: Self) {
        self.span.prepend(other.span);
        self.parents = other.parents;
        debug_assert_eq!(self.shadow, other.shadow);
    }
}

impl HasRleKey for GraphEntryInternal {
    fn rle_key(&self) -> usize {
        self.span.start
    }
}

/// A graph entry reduced to what external callers need: the run and the
/// parents of its first change.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GraphEntrySimple {
    pub span: VRange,
    pub parents: Frontier,
}

impl MergableSpan for GraphEntrySimple {
    fn can_append(&self, other: &Self) -> bool {
        self.span.can_append(&other.span)
            && other.parents.len() == 1
            && other.parents[0] == self.span.last()
    }

    fn append(&mut self, other: Self) {
        self.span.append(other.span);
    }

    fn prepend(&mut self, other: Self) {
        self.span.prepend(other.span);
        self.parents = other.parents;
    }
}

impl HasLength for GraphEntrySimple {
    fn len(&self) -> usize { self.span.len() }
}

impl HasRleKey for GraphEntrySimple {
    fn rle_key(&self) -> usize { self.span.start }
}

impl SplitableSpanHelpers for GraphEntrySimple {
    fn truncate_h(&mut self, at: usize) -> Self {
        debug_assert!(at >= 1);

        GraphEntrySimple {
            span: self.span.truncate(at),
            parents: Frontier::new_1(self.span.start + at - 1),
        }
    }
}

impl From<GraphEntryInternal> for GraphEntrySimple {
    fn from(entry: GraphEntryInternal) -> Self {
        Self {
            span: entry.span,
            parents: entry.parents,
        }
    }
}

impl From<&GraphEntryInternal> for GraphEntrySimple {
    fn from(entry: &GraphEntryInternal) -> Self {
        Self {
            span: entry.span,
            parents: entry.parents.clone(),
        }
    }
}

impl Graph {
    pub fn from_simple_items_iter<'a, I: Iterator<Item = &'a GraphEntrySimple>>(iter: I) -> Self {
        let mut graph = Self::new();
        for e in iter {
            graph.push(e.parents.as_ref(), e.span);
        }
        graph
    }

    pub fn from_simple_items(slice: &[GraphEntrySimple]) -> Self {
        Self::from_simple_items_iter(slice.iter())
    }

    pub fn iter_range(&self, range: VRange) -> impl Iterator<Item = GraphEntrySimple> + '_ {
        self.entries.iter_range_map(range, |e| e.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = GraphEntrySimple> + '_ {
        self.entries.iter().map(|e| e.into())
    }
}
