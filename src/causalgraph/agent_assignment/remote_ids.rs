//! Conversions between local versions and the public versions we can pass
//! to remote peers.

use smartstring::alias::String as SmartString;
use smallvec::SmallVec;
use rle::{HasLength, MergableSpan, SplitableSpanHelpers};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::causalgraph::agent_span::{AgentSpan, AgentVersion};
use crate::vrange::VRange;
use crate::{Frontier, LV};

/// A public (agent, seq) pair - the form of a version which is meaningful
/// to other peers.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteVersionOwned(pub SmartString, pub usize);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteVersion<'a>(pub &'a str, pub usize);

impl<'a> From<&'a RemoteVersionOwned> for RemoteVersion<'a> {
    fn from(rv: &'a RemoteVersionOwned) -> Self {
        RemoteVersion(rv.0.as_str(), rv.1)
    }
}
impl From<&RemoteVersion<'_>> for RemoteVersionOwned {
    fn from(rv: &RemoteVersion) -> Self {
        RemoteVersionOwned(rv.0.into(), rv.1)
    }
}
impl From<RemoteVersion<'_>> for RemoteVersionOwned {
    fn from(rv: RemoteVersion) -> Self {
        RemoteVersionOwned(rv.0.into(), rv.1)
    }
}

impl RemoteVersion<'_> {
    pub fn to_owned(&self) -> RemoteVersionOwned {
        self.into()
    }
}

impl<S> From<(S, usize)> for RemoteVersionOwned where S: Into<SmartString> {
    fn from(r: (S, usize)) -> Self {
        Self(r.0.into(), r.1)
    }
}
impl<'a, S> From<(S, usize)> for RemoteVersion<'a> where S: Into<&'a str> {
    fn from(r: (S, usize)) -> Self {
        Self(r.0.into(), r.1)
    }
}

/// A contiguous run of public versions from a single agent.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteVersionSpanOwned(pub SmartString, pub VRange);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteVersionSpan<'a>(pub &'a str, pub VRange);

impl HasLength for RemoteVersionSpan<'_> {
    fn len(&self) -> usize {
        self.1.len()
    }
}

impl SplitableSpanHelpers for RemoteVersionSpan<'_> {
    fn truncate_h(&mut self, at: usize) -> Self {
        Self(self.0, self.1.truncate_h(at))
    }
}

impl MergableSpan for RemoteVersionSpan<'_> {
    fn can_append(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1.can_append(&other.1)
    }

    fn append(&mut self, other: Self) {
        self.1.append(other.1)
    }
}

pub type RemoteFrontier<'a> = SmallVec<RemoteVersion<'a>, 2>;
pub type RemoteFrontierOwned = SmallVec<RemoteVersionOwned, 2>;

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum VersionConversionError {
    UnknownAgent,
    SeqInFuture,
}

impl AgentAssignment {
    /// Exact membership check: do we know this public version?
    pub fn has_remote_version(&self, rv: RemoteVersion) -> bool {
        self.try_remote_to_local_version(rv).is_ok()
    }

    pub fn try_remote_to_local_version(&self, rv: RemoteVersion) -> Result<LV, VersionConversionError> {
        let agent = self.get_agent_id(rv.0)
            .ok_or(VersionConversionError::UnknownAgent)?;

        self.client_data[agent as usize]
            .try_seq_to_lv(rv.1)
            .ok_or(VersionConversionError::SeqInFuture)
    }

    /// This panics if the version isn't known to the graph.
    pub fn remote_to_local_version(&self, RemoteVersion(name, seq): RemoteVersion) -> LV {
        let agent = self.get_agent_id(name).unwrap();
        self.client_data[agent as usize].seq_to_lv(seq)
    }

    /// The longest contiguous run of known local versions starting at the
    /// passed public version.
    pub fn remote_to_local_version_span(&self, rv: RemoteVersion) -> Result<VRange, VersionConversionError> {
        let agent = self.get_agent_id(rv.0)
            .ok_or(VersionConversionError::UnknownAgent)?;

        let client = &self.client_data[agent as usize];
        let (entry, offset) = client.lv_for_seq.find_with_offset(rv.1)
            .ok_or(VersionConversionError::SeqInFuture)?;

        Ok((entry.1.start + offset..entry.1.end).into())
    }

    pub(crate) fn agent_version_to_remote(&self, (agent, seq): AgentVersion) -> RemoteVersion<'_> {
        RemoteVersion(
            self.get_agent_name(agent),
            seq,
        )
    }

    pub(crate) fn agent_span_to_remote(&self, loc: AgentSpan) -> RemoteVersionSpan<'_> {
        RemoteVersionSpan(
            self.get_agent_name(loc.agent),
            loc.seq_range,
        )
    }

    pub fn local_to_remote_version(&self, v: LV) -> RemoteVersion<'_> {
        let agent_v = self.lv_to_agent_version(v);
        self.agent_version_to_remote(agent_v)
    }

    /// **NOTE:** the returned span covers min(requested len, agent span
    /// len) versions - it is not guaranteed to be as long as the input.
    pub fn local_to_remote_version_span(&self, v: VRange) -> RemoteVersionSpan<'_> {
        let agent_span = self.lv_span_to_agent_span(v);
        self.agent_span_to_remote(agent_span)
    }

    pub fn try_remote_to_local_frontier<'a, B: 'a, I>(&self, ids_iter: I) -> Result<Frontier, VersionConversionError>
        where RemoteVersion<'a>: From<B>, I: Iterator<Item = B> + 'a
    {
        let frontier: Frontier = ids_iter
            .map(|rv| self.try_remote_to_local_version(rv.into()))
            .collect::<Result<Frontier, VersionConversionError>>()?;

        Ok(frontier)
    }

    // This method works for &RemoteVersionOwned, RemoteVersion and friends.
    pub fn remote_to_local_frontier<'a, B: 'a, I>(&self, ids_iter: I) -> Frontier
        where RemoteVersion<'a>: From<B>, I: Iterator<Item = B> + 'a
    {
        ids_iter
            .map(|rv| self.remote_to_local_version(rv.into()))
            .collect()
    }

    pub fn local_to_remote_frontier(&'_ self, local_frontier: &[LV]) -> RemoteFrontier<'_> {
        local_frontier
            .iter()
            .map(|lv| self.local_to_remote_version(*lv))
            .collect()
    }

    pub fn local_to_remote_frontier_owned(&'_ self, local_frontier: &[LV]) -> RemoteFrontierOwned {
        local_frontier
            .iter()
            .map(|lv| self.local_to_remote_version(*lv).into())
            .collect()
    }

    pub fn iter_remote_mappings(&self) -> impl Iterator<Item = RemoteVersionSpan<'_>> + '_ {
        self.client_with_lv
            .iter()
            .map(|item| self.agent_span_to_remote(item.1))
    }

    pub fn iter_remote_mappings_range(&self, range: VRange) -> impl Iterator<Item = RemoteVersionSpan<'_>> + '_ {
        self.client_with_lv
            .iter_range(range)
            .map(|item| self.agent_span_to_remote(item.1))
    }
}

#[cfg(test)]
mod test {
    use crate::causalgraph::agent_assignment::remote_ids::{RemoteVersion, VersionConversionError};
    use crate::CausalGraph;

    #[test]
    fn remote_versions_round_trip() {
        let mut cg = CausalGraph::new();
        cg.get_or_create_agent_id("seph");
        cg.get_or_create_agent_id("mike");
        cg.assign_local_op_with_parents(&[], 0, 2);
        cg.assign_local_op_with_parents(&[], 1, 4);

        let aa = &cg.agent_assignment;
        assert_eq!(0, aa.remote_to_local_version(RemoteVersion("seph", 0)));
        assert_eq!(1, aa.remote_to_local_version(RemoteVersion("seph", 1)));
        assert_eq!(2, aa.remote_to_local_version(RemoteVersion("mike", 0)));

        for lv in 0..cg.len() {
            let rv = aa.local_to_remote_version(lv);
            let expect_lv = aa.remote_to_local_version(rv);
            assert_eq!(lv, expect_lv);
        }
    }

    #[test]
    fn try_versions_err() {
        let mut cg = CausalGraph::new();
        cg.get_or_create_agent_id("seph");
        cg.assign_local_op_with_parents(&[], 0, 2);

        let aa = &cg.agent_assignment;
        assert_eq!(
            aa.try_remote_to_local_version(RemoteVersion("mike", 0)),
            Err(VersionConversionError::UnknownAgent));
        assert_eq!(
            aa.try_remote_to_local_version(RemoteVersion("seph", 5)),
            Err(VersionConversionError::SeqInFuture));
        assert!(aa.has_remote_version(RemoteVersion("seph", 1)));
        assert!(!aa.has_remote_version(RemoteVersion("seph", 2)));
    }

    #[test]
    fn remote_versions_can_be_empty() {
        let cg = CausalGraph::new();
        assert!(cg.agent_assignment
            .remote_to_local_frontier(std::iter::empty::<RemoteVersion>())
            .is_root());
    }

    #[test]
    fn version_span_lookup() {
        let mut cg = CausalGraph::new();
        cg.get_or_create_agent_id("seph");
        cg.assign_local_op_with_parents(&[], 0, 5);

        let aa = &cg.agent_assignment;
        assert_eq!(aa.remote_to_local_version_span(RemoteVersion("seph", 2)), Ok((2..5).into()));
        assert_eq!(aa.remote_to_local_version_span(RemoteVersion("seph", 0)), Ok((0..5).into()));
        assert_eq!(
            aa.remote_to_local_version_span(RemoteVersion("seph", 5)),
            Err(VersionConversionError::SeqInFuture));
    }
}
