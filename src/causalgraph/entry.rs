use rle::{HasLength, HasRleKey, MergableSpan, SplitableSpan, SplitableSpanHelpers};

use crate::causalgraph::agent_span::AgentSpan;
use crate::{VRange, Frontier, LV};

/// The merged view of one run of the causal graph: a contiguous set of
/// local versions from a single agent, where every change after the first
/// has the preceding change as its only parent.
///
/// This is the unit yielded by [`CausalGraph::iter`] and consumed by the
/// serialization codecs.
///
/// [`CausalGraph::iter`]: crate::CausalGraph::iter
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CGEntry {
    pub start: LV,
    pub parents: Frontier,
    pub span: AgentSpan,
}

impl Default for CGEntry {
    fn default() -> Self {
        CGEntry {
            start: 0,
            parents: Default::default(),
            span: AgentSpan {
                agent: 0,
                seq_range: (0..0).into(),
            },
        }
    }
}

impl HasLength for CGEntry {
    fn len(&self) -> usize {
        self.span.len()
    }
}

impl MergableSpan for CGEntry {
    fn can_append(&self, other: &Self) -> bool {
        let end = self.start + self.len();
        (end == other.start)
            && other.parents_are_trivial()
            && self.span.can_append(&other.span)
    }

    fn append(&mut self, other: Self) {
        self.span.append(other.span)
        // Other's parents don't matter - they're implied by the span.
    }
}

impl CGEntry {
    pub fn parents_are_trivial(&self) -> bool {
        self.parents.len() == 1
            && self.parents[0] == self.start - 1
    }

    pub fn lv_span(&self) -> VRange {
        (self.start..self.start + self.len()).into()
    }
}

impl HasRleKey for CGEntry {
    fn rle_key(&self) -> usize {
        self.start
    }
}

impl SplitableSpanHelpers for CGEntry {
    #[inline]
    fn truncate_h(&mut self, at: usize) -> Self {
        let other_span = self.span.truncate(at);

        Self {
            start: self.start + at,
            parents: Frontier::new_1(self.start + at - 1),
            span: other_span,
        }
    }
}
