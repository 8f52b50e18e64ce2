use smallvec::SmallVec;
use tracing::trace;

use rle::HasLength;

use crate::causalgraph::agent_assignment::remote_ids::{
    RemoteFrontierOwned, RemoteVersion, RemoteVersionSpan, VersionConversionError,
};
use crate::causalgraph::agent_span::{AgentSpan, AgentVersion};
use crate::causalgraph::entry::CGEntry;
use crate::rle::{KVPair, RleSpanHelpers};
use crate::{AgentId, CausalGraph, VRange, Frontier, LV};

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.agent_assignment.get_agent_id(name)
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.agent_assignment.get_or_create_agent_id(name)
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.agent_assignment.get_agent_name(agent)
    }

    /// The number of changes stored - which is also the next local version
    /// to be assigned.
    pub fn len(&self) -> usize {
        let len = self.agent_assignment.len();
        debug_assert_eq!(len, self.graph.len());
        len
    }

    pub fn is_empty(&self) -> bool {
        self.agent_assignment.is_empty()
    }

    /// Assign a run of `num` new changes from the local agent, chaining
    /// off the passed parents. The agent's seq continues from wherever it
    /// last got up to.
    pub fn assign_local_op_with_parents(&mut self, parents: &[LV], agent: AgentId, num: usize) -> VRange {
        let start = self.len();
        let span: VRange = (start..start + num).into();

        self.agent_assignment.assign_next_seq_to_lv_span(agent, span);
        self.graph.push(parents, span);
        self.version.advance_by_known_run(parents, span);

        span
    }

    /// Assign a run of `num` new changes from the local agent with the
    /// current frontier as parents.
    pub fn assign_local_op(&mut self, agent: AgentId, num: usize) -> VRange {
        let frontier = self.version.clone();
        self.assign_local_op_with_parents(frontier.as_ref(), agent, num)
    }

    /// Add a (possibly already partially known) run of changes to the
    /// graph. This is the merge workhorse: it is idempotent, so replaying
    /// the same span twice is fine.
    ///
    /// Any prefix of the span we already have is trimmed off, and the
    /// remainder chains off the last known change from the run. Returns
    /// the range of local versions assigned - empty if the whole span was
    /// already known.
    pub fn merge_and_assign(&mut self, parents: &[LV], mut span: AgentSpan) -> VRange {
        let mut trimmed_parent: Option<LV> = None;

        loop {
            if span.seq_range.is_empty() {
                let next = self.len();
                return (next..next).into();
            }

            let client = &self.agent_assignment.client_data[span.agent as usize];
            match client.lv_for_seq.find_with_offset(span.seq_range.start) {
                Some((entry, _offset)) => {
                    let entry_seq_end = entry.end();
                    if entry_seq_end >= span.seq_range.end {
                        trace!(agent = span.agent, seq_start = span.seq_range.start,
                            "span already known, skipping");
                        let next = self.len();
                        return (next..next).into();
                    }

                    // A prefix of the span is already known. The remainder
                    // chains off the last version we have from this run.
                    trimmed_parent = Some(entry.1.last());
                    span.seq_range.start = entry_seq_end;
                }
                None => break,
            }
        }

        let single_parent;
        let parents: &[LV] = match trimmed_parent {
            Some(p) => {
                single_parent = [p];
                &single_parent
            }
            None => parents,
        };

        let lv_start = self.len();
        let lv_span: VRange = (lv_start..lv_start + span.len()).into();

        trace!(agent = span.agent, seq_start = span.seq_range.start, len = span.len(),
            lv_start, "assigning span");

        let client = &mut self.agent_assignment.client_data[span.agent as usize];
        // Insert, not push: an agent which contributed to concurrent
        // branches can arrive here out of seq order.
        client.lv_for_seq.insert(KVPair(span.seq_range.start, lv_span));
        self.agent_assignment.client_with_lv.push(KVPair(lv_start, span));

        self.graph.push(parents, lv_span);
        self.version.advance_by_known_run(parents, lv_span);

        lv_span
    }

    /// merge_and_assign for spans named publicly. When `parents` is None
    /// the span chains off the current frontier.
    pub fn merge_and_assign_remote(&mut self, span: RemoteVersionSpan, parents: Option<&[RemoteVersion]>)
        -> Result<VRange, VersionConversionError>
    {
        let agent = self.get_or_create_agent_id(span.0);

        let parents: Frontier = match parents {
            Some(p) => {
                let list = p.iter()
                    .map(|rv| self.agent_assignment.try_remote_to_local_version(*rv))
                    .collect::<Result<SmallVec<LV, 2>, _>>()?;
                Frontier::from(list)
            }
            None => self.version.clone(),
        };

        Ok(self.merge_and_assign(parents.as_ref(), AgentSpan { agent, seq_range: span.1 }))
    }

    /// Iterate the runs of the graph intersecting `range`, splitting at
    /// every boundary of either index. Boundary runs are clipped to lie
    /// inside the range.
    pub fn iter_range(&self, range: VRange) -> impl Iterator<Item = CGEntry> + '_ {
        self.graph.iter_range(range).flat_map(move |e| {
            let parents = e.parents;
            self.agent_assignment.client_with_lv
                .iter_range(e.span)
                .enumerate()
                .map(move |(i, KVPair(start, span))| CGEntry {
                    start,
                    parents: if i == 0 {
                        parents.clone()
                    } else {
                        Frontier::new_1(start - 1)
                    },
                    span,
                })
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = CGEntry> + '_ {
        self.iter_range((0..self.len()).into())
    }

    /// The maximal run containing `v`, as iter_range would yield it.
    /// Panics if `v` names an unknown version.
    pub fn entry_containing(&self, v: LV) -> CGEntry {
        self.try_entry_containing(v).expect("Unknown version")
    }

    pub fn try_entry_containing(&self, v: LV) -> Option<CGEntry> {
        let entry = self.graph.entries.find(v)?;
        let (pair, _offset) = self.agent_assignment.client_with_lv.find_with_offset(v)?;

        let start = entry.span.start.max(pair.0);
        let end = entry.span.end.min(pair.end());
        debug_assert!(start <= v && v < end);

        let parents = if start == entry.span.start {
            entry.parents.clone()
        } else {
            Frontier::new_1(start - 1)
        };

        let seq_start = pair.1.seq_range.start + (start - pair.0);
        Some(CGEntry {
            start,
            parents,
            span: AgentSpan {
                agent: pair.1.agent,
                seq_range: (seq_start..seq_start + (end - start)).into(),
            },
        })
    }

    pub fn lv_to_agent_version(&self, v: LV) -> AgentVersion {
        self.agent_assignment.lv_to_agent_version(v)
    }

    /// The public version of `v` along with the public versions of its
    /// parents.
    pub fn local_to_remote_version_with_parents(&self, v: LV)
        -> (crate::RemoteVersionOwned, RemoteFrontierOwned)
    {
        let parents = self.graph.parents_at_version(v);
        (
            self.agent_assignment.local_to_remote_version(v).into(),
            self.agent_assignment.local_to_remote_frontier_owned(parents.as_ref()),
        )
    }

}

#[cfg(test)]
mod tests {
    use crate::causalgraph::agent_span::AgentSpan;
    use crate::{CausalGraph, RemoteVersion};
    use rle::HasLength;

    #[test]
    fn smoke_linear_chain() {
        let mut cg = CausalGraph::new();
        let agent = cg.get_or_create_agent_id("a");
        cg.merge_and_assign(&[], AgentSpan { agent, seq_range: (0..3).into() });

        assert_eq!(cg.len(), 3);
        assert_eq!(cg.version.as_ref(), &[2]);

        let entries: Vec<_> = cg.iter().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start, 0);
        assert_eq!(entries[0].span.seq_range, (0..3).into());
        assert!(entries[0].parents.is_root());

        assert_eq!(cg.agent_assignment.local_to_remote_version(1), RemoteVersion("a", 1));
        cg.dbg_check(true);
    }

    #[test]
    fn two_concurrent_branches_then_merge() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");
        let c = cg.get_or_create_agent_id("c");

        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..2).into() });
        cg.merge_and_assign(&[], AgentSpan { agent: b, seq_range: (0..2).into() });

        assert_eq!(cg.version.as_ref(), &[1, 3]);

        let (a_only, b_only) = cg.graph.diff(&[1], &[3]);
        assert_eq!(a_only.as_slice(), &[(0..2).into()]);
        assert_eq!(b_only.as_slice(), &[(2..4).into()]);

        assert_eq!(cg.graph.version_cmp(1, 3), None);
        assert_eq!(cg.graph.find_dominators(&[1, 3]).as_ref(), &[1, 3]);
        assert_eq!(cg.graph.find_dominators(&[0, 1, 2, 3]).as_ref(), &[1, 3]);

        // Now merge the branches.
        cg.merge_and_assign(&[1, 3], AgentSpan { agent: c, seq_range: (0..1).into() });
        assert_eq!(cg.version.as_ref(), &[4]);

        assert!(cg.graph.version_contains(cg.version.as_ref(), 0));
        assert!(!cg.graph.version_contains(&[1], 3));

        use crate::causalgraph::graph::tools::DiffFlag;
        let mut visited = vec![];
        let common = cg.graph.find_conflicting(&[1], &[3], |range, flag| {
            visited.push((range, flag));
        });
        assert!(common.is_root());
        visited.sort_by_key(|(r, _)| r.start);
        assert_eq!(visited, vec![
            ((0..2).into(), DiffFlag::OnlyA),
            ((2..4).into(), DiffFlag::OnlyB),
        ]);

        cg.dbg_check(true);
    }

    #[test]
    fn idempotent_insert() {
        let mut cg = CausalGraph::new();
        let agent = cg.get_or_create_agent_id("a");

        let first = cg.merge_and_assign(&[], AgentSpan { agent, seq_range: (0..5).into() });
        assert_eq!(first, (0..5).into());

        let second = cg.merge_and_assign(&[], AgentSpan { agent, seq_range: (2..5).into() });
        assert!(second.is_empty());
        assert_eq!(cg.len(), 5);

        cg.dbg_check(true);
    }

    #[test]
    fn partial_overlap_extends() {
        let mut cg = CausalGraph::new();
        let agent = cg.get_or_create_agent_id("a");

        cg.merge_and_assign(&[], AgentSpan { agent, seq_range: (0..3).into() });
        // 0..3 known; this shares the prefix and extends to 6.
        let added = cg.merge_and_assign(&[], AgentSpan { agent, seq_range: (0..6).into() });
        assert_eq!(added, (3..6).into());
        assert_eq!(cg.len(), 6);

        // The extension chains off seq 2 / lv 2, so everything merged into
        // one run.
        assert_eq!(cg.iter().count(), 1);
        assert_eq!(cg.version.as_ref(), &[5]);

        cg.dbg_check(true);
    }

    #[test]
    fn seq_holes_left_open() {
        let mut cg = CausalGraph::new();
        let agent = cg.get_or_create_agent_id("a");

        cg.merge_and_assign(&[], AgentSpan { agent, seq_range: (0..3).into() });
        cg.merge_and_assign(&[2], AgentSpan { agent, seq_range: (10..12).into() });

        assert_eq!(cg.agent_assignment.get_next_seq_for("a"), 12);
        assert!(!cg.agent_assignment.has_remote_version(RemoteVersion("a", 5)));
        assert!(cg.agent_assignment.has_remote_version(RemoteVersion("a", 11)));

        let client = &cg.agent_assignment.client_data[agent as usize];
        assert_eq!(client.lv_for_seq.num_entries(), 2);

        cg.dbg_check(true);
    }

    #[test]
    fn entry_containing_splits_at_boundaries() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.merge_and_assign(&[], AgentSpan { agent: a, seq_range: (0..4).into() });

        let e = cg.entry_containing(2);
        assert_eq!(e.start, 0);
        assert_eq!(e.len(), 4);
        assert!(e.parents.is_root());

        assert!(cg.try_entry_containing(10).is_none());
    }

    #[test]
    fn remote_span_merge() {
        use crate::causalgraph::agent_assignment::remote_ids::RemoteVersionSpan;

        let mut cg = CausalGraph::new();
        let added = cg.merge_and_assign_remote(
            RemoteVersionSpan("a", (0..3).into()), Some(&[])).unwrap();
        assert_eq!(added, (0..3).into());

        let added = cg.merge_and_assign_remote(
            RemoteVersionSpan("b", (0..1).into()),
            Some(&[RemoteVersion("a", 2)])).unwrap();
        assert_eq!(added, (3..4).into());
        assert_eq!(cg.version.as_ref(), &[3]);

        // Unknown parents are rejected.
        assert!(cg.merge_and_assign_remote(
            RemoteVersionSpan("c", (0..1).into()),
            Some(&[RemoteVersion("zzz", 0)])).is_err());

        cg.dbg_check(true);
    }
}
