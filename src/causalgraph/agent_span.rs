use std::ops::Range;

use rle::{HasLength, MergableSpan, Searchable, SplitableSpan, SplitableSpanHelpers};

use crate::vrange::VRange;
use crate::AgentId;

/// An (agent id, seq) pair. The agent id is this peer's interned integer
/// name for the agent - the globally meaningful form is RemoteVersion.
pub type AgentVersion = (AgentId, usize);

/// A contiguous run of (agent, seq) versions from a single agent.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AgentSpan {
    pub agent: AgentId,
    pub seq_range: VRange,
}

impl From<(AgentId, VRange)> for AgentSpan {
    fn from((agent, seq_range): (AgentId, VRange)) -> Self {
        AgentSpan { agent, seq_range }
    }
}

impl From<(AgentId, Range<usize>)> for AgentSpan {
    fn from((agent, seq_range): (AgentId, Range<usize>)) -> Self {
        AgentSpan { agent, seq_range: seq_range.into() }
    }
}

impl From<AgentVersion> for AgentSpan {
    fn from((agent, seq): AgentVersion) -> Self {
        AgentSpan { agent, seq_range: seq.into() }
    }
}

impl Searchable for AgentSpan {
    type Item = AgentVersion;

    fn get_offset(&self, (agent, seq): AgentVersion) -> Option<usize> {
        if self.agent == agent {
            self.seq_range.get_offset(seq)
        } else { None }
    }

    fn at_offset(&self, offset: usize) -> AgentVersion {
        assert!(offset < self.len());
        (self.agent, self.seq_range.start + offset)
    }
}

impl HasLength for AgentSpan {
    fn len(&self) -> usize {
        self.seq_range.len()
    }
}

impl SplitableSpanHelpers for AgentSpan {
    fn truncate_h(&mut self, at: usize) -> Self {
        AgentSpan {
            agent: self.agent,
            seq_range: self.seq_range.truncate(at),
        }
    }

    fn truncate_keeping_right_h(&mut self, at: usize) -> Self {
        AgentSpan {
            agent: self.agent,
            seq_range: self.seq_range.truncate_keeping_right(at),
        }
    }
}

impl MergableSpan for AgentSpan {
    fn can_append(&self, other: &Self) -> bool {
        self.agent == other.agent
            && self.seq_range.end == other.seq_range.start
    }

    fn append(&mut self, other: Self) {
        self.seq_range.end = other.seq_range.end;
    }

    fn prepend(&mut self, other: Self) {
        self.seq_range.start = other.seq_range.start;
    }
}
