//! Version summaries: a vector-clock-style digest of everything a peer
//! knows, and the intersection logic which turns a remote peer's summary
//! into (what we share, what we're missing).

use smallvec::{smallvec, SmallVec};
use smartstring::alias::String as SmartString;
use rle::{HasLength, MergeableIterator};

use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::rle::RleSpanHelpers;
use crate::{CausalGraph, VRange, Frontier, LV};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VSEntry {
    pub name: SmartString,
    pub seq_ranges: SmallVec<VRange, 2>,
}

/// A version summary names the ranges of known sequence numbers for each
/// agent. Sending a summary to a peer lets it work out exactly which of
/// its changes we're missing.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct VersionSummary(pub(crate) Vec<VSEntry>);

// Serializes as {name1: [[start, end], ...], name2: ...}.
#[cfg(feature = "serde")]
mod serde_encoding {
    use std::fmt::Formatter;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use smallvec::SmallVec;
    use smartstring::alias::String as SmartString;

    use crate::causalgraph::summary::{VSEntry, VersionSummary};
    use crate::VRange;

    impl Serialize for VersionSummary {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for e in &self.0 {
                map.serialize_entry(&e.name, &e.seq_ranges)?;
            }
            map.end()
        }
    }

    struct VSVisitor;

    impl<'de> Visitor<'de> for VSVisitor {
        type Value = VersionSummary;

        fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
            formatter.write_str("a version summary map")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error> where A: MapAccess<'de> {
            let mut vs = VersionSummary(Vec::with_capacity(map.size_hint().unwrap_or(0)));

            while let Some((k, v)) = map.next_entry::<SmartString, SmallVec<VRange, 2>>()? {
                vs.0.push(VSEntry {
                    name: k,
                    seq_ranges: v,
                })
            }
            Ok(vs)
        }
    }

    impl<'de> Deserialize<'de> for VersionSummary {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
            deserializer.deserialize_map(VSVisitor)
        }
    }
}

impl AgentAssignment {
    /// Entries come out sorted by agent name, so two peers with the same
    /// knowledge produce structurally identical summaries - whatever order
    /// they learned about the agents in.
    pub fn summarize_versions(&self) -> VersionSummary {
        let mut entries: Vec<VSEntry> = self.client_data.iter().filter_map(|c| {
            if c.lv_for_seq.is_empty() { None } else {
                Some(VSEntry {
                    name: c.name.clone(),
                    seq_ranges: c.lv_for_seq
                        .iter()
                        .map(|e| e.span())
                        .merge_spans()
                        .collect(),
                })
            }
        }).collect();

        entries.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        VersionSummary(entries)
    }

    /// Walk a remote summary against the local client index. The visitor
    /// is called with (agent name, seq range, Some(base lv)) for locally
    /// known sub-ranges, and (agent name, seq range, None) for sub-ranges
    /// we don't have.
    pub fn intersect_with_summary_full<'a, V>(&self, summary: &'a VersionSummary, mut visitor: V)
        where V: FnMut(&'a str, VRange, Option<LV>)
    {
        for VSEntry { name, seq_ranges } in summary.0.iter() {
            if let Some(agent_id) = self.get_agent_id(name) {
                let client_data = &self.client_data[agent_id as usize];

                for seq_range in seq_ranges {
                    // iter_range skips gaps, so we need to yield those
                    // manually.
                    let mut expect_next_seq = seq_range.start;
                    for entry in client_data.lv_for_seq.iter_range(*seq_range) {
                        let seq_range = entry.span();

                        if seq_range.start > expect_next_seq {
                            visitor(name, (expect_next_seq..seq_range.start).into(), None);
                        }

                        expect_next_seq = seq_range.end;

                        visitor(name, seq_range, Some(entry.1.start));
                    }

                    if expect_next_seq < seq_range.end {
                        visitor(name, (expect_next_seq..seq_range.end).into(), None);
                    }
                }
            } else {
                // We're missing all operations from this agent.
                for seq_range in seq_ranges {
                    visitor(name, *seq_range, None);
                }
            }
        }
    }
}

impl CausalGraph {
    /// Intersect a remote summary with what we have. Returns:
    ///
    /// - The dominators of everything both peers know - a valid starting
    ///   point for a diff, and
    /// - A summary of the versions in `summary` this graph is missing
    ///   entirely (None if the remote summary is fully covered here).
    ///
    /// Versions only *we* know aren't reported - the caller learns what it
    /// is missing from the remote peer, nothing more.
    pub fn intersect_with_summary(&self, summary: &VersionSummary, frontier: &[LV]) -> (Frontier, Option<VersionSummary>) {
        let mut remainder: Option<VersionSummary> = None;
        let graph = &self.graph;

        // Collect the tail version of every graph run the shared spans
        // touch, then reduce the lot to its dominators.
        let mut versions: SmallVec<LV, 4> = frontier.into();

        self.agent_assignment.intersect_with_summary_full(summary, |name, seq_range, v_base| {
            if let Some(v_base) = v_base {
                let lv_range: VRange = (v_base..v_base + seq_range.len()).into();

                let mut idx = graph.entries.find_index(lv_range.start).unwrap();
                loop {
                    let e = &graph.entries[idx];
                    debug_assert!(e.span.start < lv_range.end);

                    versions.push(e.span.end.min(lv_range.end) - 1);

                    if e.span.end >= lv_range.end { break; }
                    idx += 1;
                }
            } else {
                let remainder = remainder.get_or_insert_with(Default::default);
                match remainder.0.last_mut() {
                    Some(entry) if entry.name == name => {
                        entry.seq_ranges.push(seq_range);
                    }
                    _ => {
                        remainder.0.push(VSEntry {
                            name: name.into(),
                            seq_ranges: smallvec![seq_range],
                        })
                    }
                }
            }
        });

        (
            self.graph.find_dominators_unsorted(&versions),
            remainder,
        )
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use crate::causalgraph::agent_span::AgentSpan;
    use crate::causalgraph::summary::{VSEntry, VersionSummary};
    use crate::CausalGraph;

    #[test]
    fn summary_smoke() {
        let mut cg = CausalGraph::new();
        assert_eq!(cg.agent_assignment.summarize_versions(), VersionSummary(vec![]));

        cg.get_or_create_agent_id("seph");
        cg.get_or_create_agent_id("mike");

        // Agents with no changes stay out of the summary.
        assert_eq!(cg.agent_assignment.summarize_versions(), VersionSummary(vec![]));

        cg.merge_and_assign(&[], AgentSpan {
            agent: 0,
            seq_range: (0..5).into(),
        });

        assert_eq!(cg.agent_assignment.summarize_versions(), VersionSummary(vec![
            VSEntry {
                name: "seph".into(),
                seq_ranges: smallvec![(0..5).into()],
            }
        ]));

        cg.merge_and_assign(&[], AgentSpan {
            agent: 1,
            seq_range: (0..5).into(),
        });
        cg.merge_and_assign(&[4], AgentSpan {
            agent: 0,
            seq_range: (5..10).into(),
        });

        // Entries come back sorted by agent name, not creation order.
        assert_eq!(cg.agent_assignment.summarize_versions(), VersionSummary(vec![
            VSEntry {
                name: "mike".into(),
                seq_ranges: smallvec![(0..5).into()],
            },
            VSEntry {
                name: "seph".into(),
                seq_ranges: smallvec![(0..10).into()],
            }
        ]));

        // And with a gap...
        cg.merge_and_assign(&[4, 9], AgentSpan {
            agent: 1,
            seq_range: (15..20).into(),
        });

        assert_eq!(cg.agent_assignment.summarize_versions(), VersionSummary(vec![
            VSEntry {
                name: "mike".into(),
                seq_ranges: smallvec![(0..5).into(), (15..20).into()],
            },
            VSEntry {
                name: "seph".into(),
                seq_ranges: smallvec![(0..10).into()],
            }
        ]));

        cg.dbg_check(true);
    }

    #[test]
    #[cfg(feature = "serde")]
    fn summary_serialization() {
        let mut cg = CausalGraph::new();

        cg.get_or_create_agent_id("seph");
        cg.get_or_create_agent_id("mike");
        cg.merge_and_assign(&[], AgentSpan { agent: 0, seq_range: (0..5).into() });
        cg.merge_and_assign(&[], AgentSpan { agent: 1, seq_range: (0..5).into() });
        cg.merge_and_assign(&[4], AgentSpan { agent: 0, seq_range: (5..10).into() });
        cg.merge_and_assign(&[4], AgentSpan { agent: 1, seq_range: (15..20).into() });

        let summary = cg.agent_assignment.summarize_versions();
        let s = serde_json::to_string(&summary).unwrap();
        assert_eq!(s, r#"{"mike":[[0,5],[15,20]],"seph":[[0,10]]}"#);

        let summary2: VersionSummary = serde_json::from_str(&s).unwrap();
        assert_eq!(summary, summary2);
    }

    #[test]
    fn intersect_summary() {
        let mut cg = CausalGraph::new();
        cg.get_or_create_agent_id("seph");

        let vs = VersionSummary(vec![
            VSEntry {
                name: "seph".into(),
                seq_ranges: smallvec![(0..10).into()],
            },
            VSEntry {
                name: "mike".into(),
                seq_ranges: smallvec![(0..5).into()],
            }
        ]);

        let mut intersect = vec![];
        cg.agent_assignment.intersect_with_summary_full(&vs, |name, seq_range, v_base| {
            intersect.push((name, seq_range, v_base));
        });
        assert_eq!(&intersect, &[
            ("seph", (0..10).into(), None),
            ("mike", (0..5).into(), None),
        ]);

        let (frontier, remainder) = cg.intersect_with_summary(&vs, &[]);
        assert!(frontier.is_empty());
        assert_eq!(remainder.as_ref(), Some(&vs));

        cg.get_or_create_agent_id("mike");
        cg.merge_and_assign(&[], AgentSpan {
            agent: 0,
            seq_range: (1..5).into(),
        });
        cg.merge_and_assign(&[], AgentSpan {
            agent: 0,
            seq_range: (8..9).into(),
        });

        let mut intersect = vec![];
        cg.agent_assignment.intersect_with_summary_full(&vs, |name, seq_range, v_base| {
            intersect.push((name, seq_range, v_base));
        });
        assert_eq!(&intersect, &[
            ("seph", (0..1).into(), None),
            ("seph", (1..5).into(), Some(0)),
            ("seph", (5..8).into(), None),
            ("seph", (8..9).into(), Some(4)),
            ("seph", (9..10).into(), None),
            ("mike", (0..5).into(), None),
        ]);

        let (frontier, remainder) = cg.intersect_with_summary(&vs, &[]);
        assert_eq!(frontier.as_ref(), &[3, 4]);
        assert_eq!(remainder, Some(VersionSummary(vec![
            VSEntry {
                name: "seph".into(),
                seq_ranges: smallvec![(0..1).into(), (5..8).into(), (9..10).into()],
            },
            VSEntry {
                name: "mike".into(),
                seq_ranges: smallvec![(0..5).into()],
            },
        ])));

        let kaarina = cg.get_or_create_agent_id("kaarina");
        let v = cg.assign_local_op_with_parents(&[3, 4], kaarina, 10).last();
        let (frontier, _) = cg.intersect_with_summary(&vs, &[v]);
        assert_eq!(frontier.as_ref(), &[v]);
    }

    #[test]
    fn intersect_collects_every_run() {
        // One agent, but its changes span two graph runs on concurrent
        // branches. The common frontier must cover both runs.
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");

        cg.merge_and_assign(&[], AgentSpan { agent: b, seq_range: (0..1).into() });
        // Two concurrent runs from agent a, both chaining off b0.
        cg.merge_and_assign(&[0], AgentSpan { agent: a, seq_range: (0..2).into() });
        cg.merge_and_assign(&[0], AgentSpan { agent: a, seq_range: (2..4).into() });

        // A peer which knows all of agent a's changes but not agent b's...
        let vs = VersionSummary(vec![
            VSEntry { name: "a".into(), seq_ranges: smallvec![(0..4).into()] },
        ]);

        // ...shares both concurrent runs with us: the common frontier
        // includes the tail of each.
        let (frontier, remainder) = cg.intersect_with_summary(&vs, &[]);
        assert_eq!(frontier.as_ref(), &[2, 4]);
        assert!(remainder.is_none());
    }
}
