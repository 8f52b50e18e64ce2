//! Graph traversal tools: containment checks, diffs between versions,
//! dominator sets and conflict scans.
//!
//! Every algorithm here runs a max-heap of local versions, repeatedly
//! popping the highest outstanding version and consuming its whole run in
//! one step. That keeps traversals at O((result + frontier) · log) without
//! materialising the reachable set.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use smallvec::{smallvec, SmallVec};
use rle::AppendRle;

use crate::causalgraph::graph::tools::DiffFlag::*;
use crate::causalgraph::graph::Graph;
use crate::vrange::VRange;
use crate::frontier::is_sorted_slice;
use crate::{Frontier, LV};

/// Tags for which side of a diff a queue entry belongs to. The ordering is
/// part of the heap element, so it must not disturb version ordering.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiffFlag { OnlyA, OnlyB, Shared }

impl Graph {
    /// Does `b` sit in the linear run of history directly below `a`? This
    /// is a coarse check - it never false-positives, but a merge between
    /// the two versions can make it miss. Used for short circuiting.
    pub(crate) fn is_direct_descendant_coarse(&self, a: LV, b: LV) -> bool {
        a == b || (a > b && self.entries.find(a).unwrap().contains(b))
    }

    /// Compare two distinct versions. Returns Greater when `v1` causally
    /// follows `v2`, Less when `v2` follows `v1`, and None when the
    /// versions are concurrent.
    pub fn version_cmp(&self, v1: LV, v2: LV) -> Option<Ordering> {
        debug_assert_ne!(v1, v2, "version_cmp requires distinct versions");

        match v1.cmp(&v2) {
            Ordering::Equal => Some(Ordering::Equal),
            Ordering::Less => {
                if self.version_contains(&[v2], v1) {
                    Some(Ordering::Less)
                } else {
                    None
                }
            },
            Ordering::Greater => {
                if self.version_contains(&[v1], v2) {
                    Some(Ordering::Greater)
                } else {
                    None
                }
            },
        }
    }

    /// Calculates whether the specified frontier contains (dominates) the
    /// specified version.
    pub fn version_contains(&self, frontier: &[LV], target: LV) -> bool {
        if frontier.contains(&target) { return true; }
        if frontier.is_empty() { return false; }

        // Fast path without allocating: usually some frontier member's run
        // shadows the target directly.
        for &v in frontier {
            if v > target {
                let entry = self.entries.find(v).unwrap();
                if entry.shadow_contains(target) { return true; }
            }
        }

        let mut queue: BinaryHeap<LV> = frontier.iter()
            .copied()
            .filter(|&v| v > target)
            .collect();

        while let Some(v) = queue.pop() {
            debug_assert!(v > target);

            let entry = self.entries.find_packed(v);
            if entry.shadow_contains(target) { return true; }

            // Anything else queued inside this run tells us nothing new.
            while let Some(&queued) = queue.peek() {
                if queued < entry.span.start { break; }
                queue.pop();
            }

            for &p in entry.parents.iter() {
                match p.cmp(&target) {
                    Ordering::Equal => return true,
                    Ordering::Greater => queue.push(p),
                    // Nothing below the target can reach it.
                    Ordering::Less => {}
                }
            }
        }

        false
    }
}

pub type DiffResult = (SmallVec<VRange, 4>, SmallVec<VRange, 4>);

impl Graph {
    /// Returns (spans only reachable from a, spans only reachable from b).
    /// Spans are returned in ascending order - which is also a valid
    /// causal order.
    pub fn diff(&self, a: &[LV], b: &[LV]) -> DiffResult {
        // Simple short circuit checks first. Most calls to diff end up in
        // one of these cases.
        if a == b { return (smallvec![], smallvec![]); }

        if a.len() == 1 && b.len() == 1 {
            let a = a[0];
            let b = b[0];

            if self.is_direct_descendant_coarse(a, b) {
                // a >= b.
                return (smallvec![(b + 1..a + 1).into()], smallvec![]);
            }
            if self.is_direct_descendant_coarse(b, a) {
                // b >= a.
                return (smallvec![], smallvec![(a + 1..b + 1).into()]);
            }
        }

        self.diff_slow(a, b)
    }

    fn diff_slow(&self, a: &[LV], b: &[LV]) -> DiffResult {
        let mut only_a: SmallVec<VRange, 4> = smallvec![];
        let mut only_b: SmallVec<VRange, 4> = smallvec![];

        // Marks the inclusive range [start..=end] with the given flag.
        let mark_run = |start: LV, end: LV, flag: DiffFlag| {
            let target = match flag {
                OnlyA => &mut only_a,
                OnlyB => &mut only_b,
                Shared => { return; }
            };

            target.push_reversed_rle(VRange::new(start, end + 1));
        };

        self.diff_slow_internal(a, b, mark_run);

        // The traversal walks from the top of the graph downwards, so the
        // accumulated runs come out in descending order.
        only_a.reverse();
        only_b.reverse();
        (only_a, only_b)
    }

    fn diff_slow_internal<F>(&self, a: &[LV], b: &[LV], mut mark: F)
        where F: FnMut(LV, LV, DiffFlag) {
        // A max-heap of versions still to be explained, each tagged with
        // the side(s) that reached it.
        let mut queue: BinaryHeap<(LV, DiffFlag)> = BinaryHeap::new();
        queue.extend(a.iter().map(|&v| (v, OnlyA)));
        queue.extend(b.iter().map(|&v| (v, OnlyB)));

        // Once the queue holds nothing but shared versions, the histories
        // have converged and the walk can stop.
        let mut shared_queued = 0;

        while let Some((mut v, mut flag)) = queue.pop() {
            if flag == Shared { shared_queued -= 1; }

            let entry = self.entries.find_packed(v);

            // Pull in everything else queued within this run. Where the
            // other side lands at queued_v, the stretch above it belongs
            // to one side alone and everything below is shared.
            while let Some(&(queued_v, queued_flag)) = queue.peek() {
                if queued_v < entry.span.start { break; }
                queue.pop();
                if queued_flag == Shared { shared_queued -= 1; }

                if queued_flag != flag {
                    if queued_v < v {
                        mark(queued_v + 1, v, flag);
                        v = queued_v;
                    }
                    flag = Shared;
                }
            }

            mark(entry.span.start, v, flag);

            for &p in entry.parents.iter() {
                queue.push((p, flag));
                if flag == Shared { shared_queued += 1; }
            }

            if queue.len() == shared_queued { break; }
        }
    }

    // *** Conflict scanning ***

    fn find_conflicting_slow<V>(&self, a: &[LV], b: &[LV], mut visit: V) -> Frontier
    where V: FnMut(VRange, DiffFlag) {
        // Heap entries are whole frontiers, stored highest-version-first.
        // The derived lexicographic order gives exactly the scan order we
        // need: the furthest-ahead point pops first, a merged frontier
        // pops just above the bare version at its tip, the root (an empty
        // list) sinks to the very bottom, and the flag breaks whatever
        // ties remain.
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
        struct ScanPoint {
            versions: SmallVec<LV, 2>, // Descending. Empty means root.
            flag: DiffFlag,
        }

        fn point_of(frontier: &[LV], flag: DiffFlag) -> ScanPoint {
            debug_assert!(is_sorted_slice::<true, _>(frontier));
            ScanPoint {
                versions: frontier.iter().rev().copied().collect(),
                flag,
            }
        }

        fn single(v: LV, flag: DiffFlag) -> ScanPoint {
            ScanPoint { versions: smallvec![v], flag }
        }

        let mut queue = BinaryHeap::new();
        queue.push(point_of(a, OnlyA));
        queue.push(point_of(b, OnlyB));

        loop {
            let mut point = queue.pop().unwrap();

            // Collapse queued copies of the same frontier. Disagreeing
            // flags mean both sides got here, so the point is shared.
            while let Some(next) = queue.peek() {
                if next.versions != point.versions { break; }
                if next.flag != point.flag { point.flag = Shared; }
                queue.pop();
            }

            if queue.is_empty() {
                // Everything funnelled down to this one point. Done.
                point.versions.reverse();
                let common = Frontier(point.versions);
                common.debug_check_sorted();
                return common;
            }

            let Some((&tip, rest)) = point.versions.split_first() else {
                // The root only surfaces once nothing else is left, and
                // that case returned just above.
                unreachable!("Conflict scan reached the root with work outstanding");
            };

            // Pull a merged frontier apart: the tip gets walked right now,
            // the other members go back in the queue as plain points.
            for &v in rest {
                queue.push(single(v, point.flag));
            }

            let mut flag = point.flag;
            let entry = self.entries.find_packed(tip);
            let lo = entry.span.start;
            let mut hi = tip + 1; // lo..hi hasn't been visited yet.

            // Eat the run from the tip downward. Other queued points may
            // land inside it, splitting the visited spans.
            loop {
                let next_tip = match queue.peek() {
                    Some(next) => next.versions.first().copied(),
                    None => {
                        // The other side ran dry mid-run; the scan has
                        // collapsed onto the version at the top of whats
                        // left. That version is the common ancestor, so
                        // it doesn't get visited.
                        return Frontier::new_1(hi - 1);
                    }
                };

                match next_tip {
                    Some(v) if v >= lo => {
                        // A queued point sits in this run. Visit the part
                        // above it, then merge its flag in. (When v is
                        // the version we already stopped at, there's
                        // nothing new to show.)
                        let next = queue.pop().unwrap();
                        if v + 1 < hi {
                            visit((v + 1..hi).into(), flag);
                            hi = v + 1;
                        }
                        if next.flag != flag { flag = Shared; }

                        // The point might itself be a merge which uses
                        // part of this run. Its remaining members go back
                        // in the queue like any other frontier.
                        for &m in &next.versions[1..] {
                            queue.push(single(m, next.flag));
                        }
                    }
                    _ => {
                        // Nothing else touches this run. Visit the rest of
                        // it, then queue its parents as one point so the
                        // scan stops cleanly at merges.
                        visit((lo..hi).into(), flag);
                        queue.push(point_of(entry.parents.as_ref(), flag));
                        break;
                    }
                }
            }
        }
    }

    /// Find the operation ranges which might be concurrent with incoming
    /// edits: walk both versions back to a single (possibly merged) point
    /// in time, visiting every (range, flag) span touched on the way.
    /// Returns the common ancestor frontier.
    pub fn find_conflicting<V>(&self, a: &[LV], b: &[LV], mut visit: V) -> Frontier
        where V: FnMut(VRange, DiffFlag) {

        // Short circuits, as in diff().
        if a == b {
            return a.into();
        }

        if a.len() == 1 && b.len() == 1 {
            let a = a[0];
            let b = b[0];

            if self.is_direct_descendant_coarse(a, b) {
                // a >= b.
                visit((b + 1..a + 1).into(), OnlyA);
                return Frontier::new_1(b);
            }
            if self.is_direct_descendant_coarse(b, a) {
                // b >= a.
                visit((a + 1..b + 1).into(), OnlyB);
                return Frontier::new_1(a);
            }
        }

        self.find_conflicting_slow(a, b, visit)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct ConflictZone {
    pub common_ancestor: Frontier,
    pub spans: SmallVec<VRange, 4>,
}

impl Graph {
    /// find_conflicting, gathering the visited spans into a list.
    pub fn find_conflicting_simple(&self, a: &[LV], b: &[LV]) -> ConflictZone {
        let mut spans = smallvec![];
        let common_ancestor = self.find_conflicting(a, b, |span, _flag| {
            spans.push_reversed_rle(span);
        });
        spans.reverse();

        ConflictZone { common_ancestor, spans }
    }

    /// Dominators of a large, fully sorted set of versions, returned in
    /// descending order. Unlike find_dominators_full this doesn't yield
    /// the non-dominator items.
    pub fn find_dominators_wide_rev(&self, versions: &[LV]) -> SmallVec<LV, 2> {
        if versions.len() <= 1 { return versions.into(); }

        debug_assert!(is_sorted_slice::<true, _>(versions));

        let first_v = versions[0];
        let last_v = versions[versions.len() - 1];

        let last_entry = self.entries.find_packed(last_v);

        // Nothing else in the list matters because its all under the
        // shadow of this item. This is the most common case.
        if last_entry.shadow <= first_v { return smallvec![last_v]; }

        let mut result_rev = smallvec![];

        self.find_dominators_full_internal(versions.iter().copied(), Some(first_v), |v, dom| {
            if dom {
                result_rev.push(v);
            }
        });

        result_rev
    }

    /// The dominators of a sorted set of versions: the minimal subset
    /// which transitively covers the whole set.
    pub fn find_dominators(&self, versions: &[LV]) -> Frontier {
        let mut result = self.find_dominators_wide_rev(versions);
        result.reverse();
        Frontier(result)
    }

    /// The shared walk behind the dominator queries. `stop_floor` lets the
    /// sorted-input caller bail out once a run's shadow reaches down to
    /// its lowest input - everything still queued below that is covered.
    fn find_dominators_full_internal<F, I>(&self, versions_iter: I, stop_floor: Option<LV>, mut visit: F)
        where F: FnMut(LV, bool), I: Iterator<Item = LV>
    {
        // Each queue entry remembers how the version got there. An input
        // is only a dominator if nothing above it reaches it, so at equal
        // versions the traversal entry has to pop first - which is why
        // FromAbove sorts higher.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
        enum Arrival { Input, FromAbove }

        let mut queue: BinaryHeap<(LV, Arrival)> =
            versions_iter.map(|v| (v, Arrival::Input)).collect();
        let mut inputs_left = queue.len();

        // Inputs may contain duplicates; each version is reported once.
        let mut last_reported = None;

        while let Some((v, arrival)) = queue.pop() {
            if arrival == Arrival::Input {
                // Popped cleanly: no later version reached this one.
                visit(v, true);
                last_reported = Some(v);
                inputs_left -= 1;
            }

            let entry = self.entries.find_packed(v);

            if let Some(floor) = stop_floor {
                if entry.shadow <= floor { break; }
            }

            // v covers the rest of its run, so any inputs queued inside
            // the run are dominated.
            while let Some(&(queued_v, queued_arrival)) = queue.peek() {
                if queued_v < entry.span.start { break; }
                queue.pop();

                if queued_arrival == Arrival::Input {
                    if last_reported != Some(queued_v) {
                        visit(queued_v, false);
                        last_reported = Some(queued_v);
                    }
                    inputs_left -= 1;
                }
            }
            if inputs_left == 0 { break; }

            for &p in entry.parents.iter() {
                queue.push((p, Arrival::FromAbove));
            }
        }
    }

    /// Given some disparate set of versions, visit each version with a
    /// flag for whether it's a dominator of the set. Versions are visited
    /// in descending order; duplicates are visited once.
    pub fn find_dominators_full<F, I>(&self, versions_iter: I, visit: F)
        where F: FnMut(LV, bool), I: Iterator<Item = LV>
    {
        self.find_dominators_full_internal(versions_iter, None, visit);
    }

    /// Find dominators of an unsorted set of versions.
    pub fn find_dominators_unsorted_rev(&self, versions: &[LV]) -> SmallVec<LV, 2> {
        if versions.len() <= 1 {
            return versions.into();
        }

        let mut result = smallvec![];
        self.find_dominators_full(versions.iter().copied(), |v, is_dom| {
            if is_dom {
                result.push(v);
            }
        });

        result
    }

    pub fn find_dominators_unsorted(&self, versions: &[LV]) -> Frontier {
        let mut result = self.find_dominators_unsorted_rev(versions);
        result.reverse();
        Frontier(result)
    }

    /// Given 2 versions, return a version which contains all the
    /// operations in both.
    pub fn version_union(&self, a: &[LV], b: &[LV]) -> Frontier {
        let mut result = smallvec![];
        self.find_dominators_full(
            a.iter().copied().chain(b.iter().copied()),
            |v, is_dom| {
                if is_dom {
                    result.push(v);
                }
            },
        );
        result.reverse();
        Frontier(result)
    }
}

#[cfg(test)]
pub mod test {
    use std::ops::Range;

    use smallvec::smallvec;
    use rle::{AppendRle, HasLength, MergableSpan};

    use crate::causalgraph::graph::tools::DiffFlag::*;
    use crate::causalgraph::graph::tools::{DiffFlag, DiffResult};
    use crate::causalgraph::graph::{Graph, GraphEntrySimple};
    use crate::vrange::VRange;
    use crate::frontier::is_sorted_slice;
    use crate::{Frontier, LV};

    // The conflict finder doubles as an overly complicated diff function.
    // Check the two agree (this also lets the diff tests cover both).
    fn diff_via_conflicting(graph: &Graph, a: &[LV], b: &[LV]) -> DiffResult {
        let mut only_a = smallvec![];
        let mut only_b = smallvec![];

        graph.find_conflicting(a, b, |span, flag| {
            let target = match flag {
                OnlyA => &mut only_a,
                OnlyB => &mut only_b,
                Shared => { return; }
            };

            target.push_reversed_rle(span);
        });

        only_a.reverse();
        only_b.reverse();
        (only_a, only_b)
    }

    #[derive(Debug, Eq, PartialEq)]
    pub struct ConflictFull {
        pub common_branch: Frontier,
        pub spans: Vec<(VRange, DiffFlag)>,
    }

    fn push_rev_rle(list: &mut Vec<(VRange, DiffFlag)>, span: VRange, flag: DiffFlag) {
        if let Some((last_span, last_flag)) = list.last_mut() {
            if span.can_append(last_span) && flag == *last_flag {
                last_span.prepend(span);
                return;
            }
        }
        list.push((span, flag));
    }

    fn find_conflicting(graph: &Graph, a: &[LV], b: &[LV]) -> ConflictFull {
        let mut spans_fast = Vec::new();
        let mut spans_slow = Vec::new();

        let common_branch_fast = graph.find_conflicting(a, b, |span, flag| {
            debug_assert!(!span.is_empty());
            push_rev_rle(&mut spans_fast, span, flag);
        });
        let common_branch_slow = graph.find_conflicting_slow(a, b, |span, flag| {
            debug_assert!(!span.is_empty());
            push_rev_rle(&mut spans_slow, span, flag);
        });
        assert_eq!(spans_fast, spans_slow);
        assert_eq!(common_branch_fast, common_branch_slow);

        ConflictFull {
            common_branch: common_branch_slow,
            spans: spans_slow,
        }
    }

    fn assert_conflicting(graph: &Graph, a: &[LV], b: &[LV], expect_spans: &[(Range<usize>, DiffFlag)], expect_common: &[LV]) {
        let expect: Vec<(VRange, DiffFlag)> = expect_spans
            .iter()
            .rev()
            .map(|(r, flag)| (r.clone().into(), *flag))
            .collect();
        let actual = find_conflicting(graph, a, b);
        assert_eq!(actual.common_branch.as_ref(), expect_common);
        assert_eq!(actual.spans, expect);
    }

    fn assert_version_contains(graph: &Graph, frontier: &[LV], target: LV, expected: bool) {
        assert_eq!(graph.version_contains(frontier, target), expected);
    }

    fn assert_diff_eq(graph: &Graph, a: &[LV], b: &[LV], expect_a: &[VRange], expect_b: &[VRange]) {
        let slow_result = graph.diff_slow(a, b);
        let fast_result = graph.diff(a, b);
        let c_result = diff_via_conflicting(graph, a, b);

        assert_eq!(slow_result.0.as_slice(), expect_a);
        assert_eq!(slow_result.1.as_slice(), expect_b);

        assert_eq!(slow_result, fast_result);
        assert_eq!(slow_result, c_result);

        // The spans in a diff must be ascending and disjoint.
        for spans in [expect_a, expect_b] {
            assert!(is_sorted_slice::<true, _>(&spans.iter().map(|r| r.start).collect::<Vec<_>>()));
        }

        for &(branch, spans, other) in &[(a, expect_a, b), (b, expect_b, a)] {
            for o in spans {
                assert_version_contains(graph, branch, o.start, true);
                if o.len() > 1 {
                    assert_version_contains(graph, branch, o.last(), true);
                }
            }

            if branch.len() == 1 {
                let expect = spans.is_empty();
                assert_version_contains(graph, other, branch[0], expect);
            }
        }
    }

    // A graph with two roots and a couple of merges:
    //
    //   0 1 2      3 4 5
    //      \ \    /   /
    //       \  6 7 8 /
    //        \  \   /
    //         -> 9 10
    fn fancy_graph() -> Graph {
        let graph = Graph::from_simple_items(&[
            GraphEntrySimple { span: (0..3).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (3..6).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (6..9).into(), parents: Frontier::from_sorted(&[1, 4]) },
            GraphEntrySimple { span: (9..11).into(), parents: Frontier::from_sorted(&[2, 8]) },
        ]);
        graph.dbg_check(true);
        graph
    }

    #[test]
    fn common_item_smoke_test() {
        let graph = fancy_graph();

        for t in 0..=9 {
            // The same item should never conflict with itself.
            assert_conflicting(&graph, &[t], &[t], &[], &[t]);
        }
        assert_conflicting(&graph, &[5, 6], &[5, 6], &[], &[5, 6]);

        assert_conflicting(&graph, &[1], &[2], &[(2..3, OnlyB)], &[1]);
        assert_conflicting(&graph, &[0], &[2], &[(1..3, OnlyB)], &[0]);
        assert_conflicting(&graph, &[], &[], &[], &[]);
        assert_conflicting(&graph, &[], &[2], &[(0..3, OnlyB)], &[]);

        assert_conflicting(&graph, &[2], &[3], &[(0..3, OnlyA), (3..4, OnlyB)], &[]);
        assert_conflicting(&graph, &[1, 4], &[4], &[(0..2, OnlyA), (3..5, Shared)], &[]);
        assert_conflicting(&graph, &[6], &[2], &[(0..2, Shared), (2..3, OnlyB), (3..5, OnlyA), (6..7, OnlyA)], &[]);
        assert_conflicting(&graph, &[6], &[5], &[(0..2, OnlyA), (3..5, Shared), (5..6, OnlyB), (6..7, OnlyA)], &[]);
        assert_conflicting(&graph, &[5, 6], &[5], &[(0..2, OnlyA), (3..6, Shared), (6..7, OnlyA)], &[]);
        assert_conflicting(&graph, &[5, 6], &[2], &[(0..2, Shared), (2..3, OnlyB), (3..7, OnlyA)], &[]);
        assert_conflicting(&graph, &[2, 6], &[5], &[(0..3, OnlyA), (3..5, Shared), (5..6, OnlyB), (6..7, OnlyA)], &[]);
        assert_conflicting(&graph, &[9], &[10], &[(10..11, OnlyB)], &[9]);
        assert_conflicting(&graph, &[6], &[7], &[(7..8, OnlyB)], &[6]);

        // This looks weird, but its right because 9 shares the same parents.
        assert_conflicting(&graph, &[9], &[2, 8], &[(9..10, OnlyA)], &[2, 8]);

        // Everything! Just because we need to rebase operation 8 on top of
        // 7 we can't produce that without basically all of time.
        assert_conflicting(&graph, &[9], &[2, 7], &[(0..5, Shared), (6..8, Shared), (8..10, OnlyA)], &[]);
    }

    #[test]
    fn version_contains_smoke_test() {
        let graph = fancy_graph();

        assert_version_contains(&graph, &[], 0, false);
        assert_version_contains(&graph, &[0], 0, true);

        assert_version_contains(&graph, &[2], 0, true);
        assert_version_contains(&graph, &[2], 1, true);
        assert_version_contains(&graph, &[2], 2, true);

        assert_version_contains(&graph, &[0], 1, false);
        assert_version_contains(&graph, &[1], 2, false);

        assert_version_contains(&graph, &[8], 0, true);
        assert_version_contains(&graph, &[8], 1, true);
        assert_version_contains(&graph, &[8], 2, false);
        assert_version_contains(&graph, &[8], 5, false);

        assert_version_contains(&graph, &[1, 4], 0, true);
        assert_version_contains(&graph, &[1, 4], 1, true);
        assert_version_contains(&graph, &[1, 4], 2, false);
        assert_version_contains(&graph, &[1, 4], 5, false);

        assert_version_contains(&graph, &[9], 2, true);
        assert_version_contains(&graph, &[9], 1, true);
        assert_version_contains(&graph, &[9], 0, true);
    }

    #[test]
    fn version_cmp_smoke_test() {
        let graph = fancy_graph();

        use std::cmp::Ordering;
        assert_eq!(graph.version_cmp(1, 0), Some(Ordering::Greater));
        assert_eq!(graph.version_cmp(0, 1), Some(Ordering::Less));
        assert_eq!(graph.version_cmp(1, 3), None);
        assert_eq!(graph.version_cmp(3, 1), None);
        assert_eq!(graph.version_cmp(9, 4), Some(Ordering::Greater));
        assert_eq!(graph.version_cmp(2, 8), None);
    }

    fn check_dominators(graph: &Graph, input: &[LV], expected_yes: &[LV]) {
        debug_assert!(is_sorted_slice::<true, _>(input));
        debug_assert!(is_sorted_slice::<true, _>(expected_yes));

        let expected_no: Vec<_> = input.iter().filter(|v| !expected_yes.contains(v)).copied().collect();
        assert_eq!(input.len(), expected_yes.len() + expected_no.len());

        assert_eq!(graph.find_dominators(input).as_ref(), expected_yes);

        let mut actual_yes = vec![];
        let mut actual_no = vec![];
        graph.find_dominators_full(input.iter().copied(), |v, dom| {
            if dom { actual_yes.push(v); }
            else { actual_no.push(v); }
        });
        actual_yes.reverse();
        actual_no.reverse();

        assert_eq!(actual_yes, expected_yes);
        assert_eq!(actual_no, expected_no);
    }

    #[test]
    fn dominator_smoke_test() {
        let graph = fancy_graph();

        check_dominators(&graph, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10], &[5, 10]);
        check_dominators(&graph, &[10], &[10]);

        check_dominators(&graph, &[5, 6], &[5, 6]);
        check_dominators(&graph, &[5, 9], &[5, 9]);
        check_dominators(&graph, &[4, 9], &[9]);
        check_dominators(&graph, &[1, 2], &[2]);
        check_dominators(&graph, &[0, 2], &[2]);
        check_dominators(&graph, &[0, 10], &[10]);
        check_dominators(&graph, &[], &[]);
        check_dominators(&graph, &[2], &[2]);
        check_dominators(&graph, &[1, 4], &[1, 4]);
        check_dominators(&graph, &[9, 10], &[10]);
        check_dominators(&graph, &[2, 8, 9], &[9]);
        check_dominators(&graph, &[2, 7, 9], &[9]);
        check_dominators(&graph, &[6, 7], &[7]);
        check_dominators(&graph, &[0], &[0]);
    }

    #[test]
    fn dominator_duplicates() {
        let graph = fancy_graph();
        assert_eq!(graph.find_dominators_unsorted(&[1, 1, 1]).as_ref(), &[1]);
        assert_eq!(graph.version_union(&[1], &[1]).as_ref(), &[1]);

        let mut seen_1 = false;
        graph.find_dominators_full([1, 1, 1].iter().copied(), |_v, _d| {
            if !seen_1 { seen_1 = true; }
            else { panic!("Duplicate version!"); }
        });
    }

    #[test]
    fn version_union_smoke() {
        let graph = fancy_graph();
        assert_eq!(graph.version_union(&[1], &[4]).as_ref(), &[1, 4]);
        assert_eq!(graph.version_union(&[2], &[9]).as_ref(), &[9]);
        assert_eq!(graph.version_union(&[], &[2]).as_ref(), &[2]);
    }

    #[test]
    fn diff_for_flat_txns() {
        // 0 |
        // | 1
        // 2
        let graph = Graph::from_simple_items(&[
            GraphEntrySimple { span: (0..1).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (1..2).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (2..3).into(), parents: Frontier::from_sorted(&[0]) },
        ]);
        graph.dbg_check(true);

        assert_diff_eq(&graph, &[2], &[], &[(0..1).into(), (2..3).into()], &[]);
        assert_diff_eq(&graph, &[2], &[1], &[(0..1).into(), (2..3).into()], &[(1..2).into()]);
    }

    #[test]
    fn diff_three_root_txns() {
        // 0 | |
        //   1 |
        //     2
        let graph = Graph::from_simple_items(&[
            GraphEntrySimple { span: (0..1).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (1..2).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (2..3).into(), parents: Frontier::root() },
        ]);
        graph.dbg_check(true);

        assert_diff_eq(&graph, &[0], &[0, 1], &[], &[(1..2).into()]);

        for v in [0, 1, 2] {
            assert_diff_eq(&graph, &[v], &[], &[(v..v + 1).into()], &[]);
            assert_diff_eq(&graph, &[], &[v], &[], &[(v..v + 1).into()]);
        }

        assert_diff_eq(&graph, &[], &[0, 1], &[], &[(0..2).into()]);
        assert_diff_eq(&graph, &[0], &[1], &[(0..1).into()], &[(1..2).into()]);
    }

    #[test]
    fn diff_shadow_bubble() {
        // 0,1,2   |
        //      \ 3,4
        //       \ /
        //        5,6
        let graph = Graph::from_simple_items(&[
            GraphEntrySimple { span: (0..3).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (3..5).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (5..7).into(), parents: Frontier::from_sorted(&[2, 4]) },
        ]);
        graph.dbg_check(true);

        assert_diff_eq(&graph, &[4], &[5], &[], &[(0..3).into(), (5..6).into()]);
        assert_diff_eq(&graph, &[4], &[], &[(3..5).into()], &[]);
    }

    #[test]
    fn diff_common_branch_is_ordered() {
        // 0 1
        // |x|
        // 2 3
        let graph = Graph::from_simple_items(&[
            GraphEntrySimple { span: (0..1).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (1..2).into(), parents: Frontier::root() },
            GraphEntrySimple { span: (2..3).into(), parents: Frontier::from_sorted(&[0, 1]) },
            GraphEntrySimple { span: (3..4).into(), parents: Frontier::from_sorted(&[0, 1]) },
        ]);
        graph.dbg_check(true);

        assert_version_contains(&graph, &[2], 3, false);
        assert_version_contains(&graph, &[3], 2, false);
        assert_diff_eq(&graph, &[2], &[3], &[(2..3).into()], &[(3..4).into()]);
    }
}
