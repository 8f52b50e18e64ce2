//! The agent assignment is the identity half of the causal graph: a
//! bidirectional index between local versions and public (agent, seq)
//! pairs.

use std::cmp::Ordering;

use smartstring::alias::String as SmartString;
use rle::HasLength;

use crate::causalgraph::agent_span::{AgentSpan, AgentVersion};
use crate::rle::{KVPair, RleSpanHelpers, RleVec};
use crate::{AgentId, VRange, LV};

pub mod remote_ids;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ClientData {
    /// The agent's name (an opaque, globally unique string).
    pub(crate) name: SmartString,

    /// An in-seq-order list of all operations from this agent, mapping
    /// each seq range to the span of local versions it was assigned.
    ///
    /// The same agent might produce changes on multiple concurrent
    /// branches, and those changes can arrive here in any order. So the
    /// local version spans are *usually*, but not always, monotonically
    /// increasing - and the seq ranges may have gaps which never fill in.
    pub(crate) lv_for_seq: RleVec<KVPair<VRange>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentAssignment {
    /// Maps local versions to (agent, seq) spans. Packed - entry n+1
    /// starts where entry n ends.
    pub(crate) client_with_lv: RleVec<KVPair<AgentSpan>>,

    /// Per-agent data, indexed by AgentId. Maps (agent, seq) back to local
    /// versions.
    pub(crate) client_data: Vec<ClientData>,
}

impl ClientData {
    /// The next seq this agent would assign. Gaps in the seq range are
    /// deliberately skipped, never re-filled.
    pub fn get_next_seq(&self) -> usize {
        self.lv_for_seq.end()
    }

    #[inline]
    pub(crate) fn try_seq_to_lv(&self, seq: usize) -> Option<LV> {
        let (entry, offset) = self.lv_for_seq.find_with_offset(seq)?;
        Some(entry.1.start + offset)
    }

    pub(crate) fn seq_to_lv(&self, seq: usize) -> LV {
        self.try_seq_to_lv(seq).unwrap()
    }
}

impl AgentAssignment {
    pub fn new() -> Self { Self::default() }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.client_data.iter()
            .position(|client_data| client_data.name == name)
            .map(|id| id as AgentId)
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        if let Some(id) = self.get_agent_id(name) {
            id
        } else {
            self.client_data.push(ClientData {
                name: SmartString::from(name),
                lv_for_seq: RleVec::new(),
            });
            (self.client_data.len() - 1) as AgentId
        }
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.client_data[agent as usize].name.as_str()
    }

    /// The next seq the named agent would assign, or 0 for unknown agents.
    pub fn get_next_seq_for(&self, name: &str) -> usize {
        match self.get_agent_id(name) {
            Some(agent) => self.client_data[agent as usize].get_next_seq(),
            None => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.client_with_lv.end()
    }

    pub fn is_empty(&self) -> bool {
        self.client_with_lv.is_empty()
    }

    pub fn lv_to_agent_version(&self, v: LV) -> AgentVersion {
        self.client_with_lv.get(v)
    }

    /// The longest contiguous run of versions starting at `v` which all
    /// belong to one agent span. The result may be shorter than the
    /// passed range.
    pub fn lv_span_to_agent_span(&self, v: VRange) -> AgentSpan {
        let (loc, offset) = self.client_with_lv.find_packed_with_offset(v.start);
        let start = loc.1.seq_range.start + offset;
        let end = usize::min(loc.1.seq_range.end, start + v.len());
        AgentSpan {
            agent: loc.1.agent,
            seq_range: VRange { start, end },
        }
    }

    pub fn try_agent_version_to_lv(&self, (agent, seq): AgentVersion) -> Option<LV> {
        self.client_data.get(agent as usize).and_then(|c| {
            c.try_seq_to_lv(seq)
        })
    }

    /// Assign the next run of local versions to the named agent,
    /// continuing its seq sequence. `span` must start at the current end
    /// of the version range.
    pub(crate) fn assign_next_seq_to_lv_span(&mut self, agent: AgentId, span: VRange) {
        debug_assert_eq!(span.start, self.len());

        let client_data = &mut self.client_data[agent as usize];

        let next_seq = client_data.get_next_seq();
        client_data.lv_for_seq.push(KVPair(next_seq, span));

        self.client_with_lv.push(KVPair(span.start, AgentSpan {
            agent,
            seq_range: VRange { start: next_seq, end: next_seq + span.len() },
        }));
    }

    /// The canonical ordering of concurrent changes: lexicographic by
    /// agent name, then by seq.
    pub fn tie_break_agent_versions(&self, v1: AgentVersion, v2: AgentVersion) -> Ordering {
        if v1 == v2 { Ordering::Equal }
        else {
            let c1 = &self.client_data[v1.0 as usize];
            let c2 = &self.client_data[v2.0 as usize];

            c1.name.cmp(&c2.name)
                .then(v1.1.cmp(&v2.1))
        }
    }

    pub fn tie_break_versions(&self, v1: LV, v2: LV) -> Ordering {
        if v1 == v2 { Ordering::Equal }
        else {
            self.tie_break_agent_versions(
                self.lv_to_agent_version(v1),
                self.lv_to_agent_version(v2),
            )
        }
    }

    pub fn dbg_check(&self, deep: bool) {
        self.client_with_lv.check_packed_from_0();
        self.client_with_lv.check_fully_merged();

        // Every lv -> (agent, seq) mapping must be mirrored in the
        // per-agent index.
        for pair in self.client_with_lv.iter() {
            let expected_lv_range = pair.span();

            let span = pair.1;
            let client = &self.client_data[span.agent as usize];
            let actual = client.lv_for_seq.find_packed_and_split(span.seq_range);

            assert_eq!(actual.1, expected_lv_range);
        }

        if deep {
            // And the other way around.
            for (agent, client) in self.client_data.iter().enumerate() {
                client.lv_for_seq.check_fully_merged();

                for range in client.lv_for_seq.iter() {
                    let actual = self.client_with_lv.find_packed_and_split(range.1);
                    assert_eq!(actual.1.agent as usize, agent);
                    assert_eq!(actual.1.seq_range, range.span());
                }
            }
        }
    }
}
