//! Snapshot and delta codecs for exchanging causal graphs between peers.
//!
//! All three codecs share the same wire entry shape: `{ agent, seq, len,
//! parents }`, emitted in causal order. They differ in how parents are
//! named:
//!
//! - Snapshot (v2): parents are raw local versions. Valid because a
//!   receiver rebuilding from a full snapshot assigns the same LVs in the
//!   same order.
//! - Delta v2: parents are public (agent, seq) pairs.
//! - Delta v3: parents are packed integers. A non-negative value is an
//!   offset into the delta's own change space (the prefix sums of entry
//!   lengths); a negative value `-k-1` indexes the delta's `ext_refs`
//!   table of public versions. More compact than v2, and a delta over the
//!   whole graph doubles as the v3 snapshot.

use std::error::Error;
use std::fmt::{Display, Formatter};

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;
use tracing::debug;

use rle::HasLength;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::causalgraph::agent_span::AgentSpan;
use crate::rle::RleSpanHelpers;
use crate::{CausalGraph, VRange, Frontier, LV, RemoteVersionOwned};

/// A full snapshot entry. `parents` are the local versions the receiver
/// will have assigned by the time it reads this entry.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SerializedEntry {
    pub agent: SmartString,
    pub seq: usize,
    pub len: usize,
    pub parents: SmallVec<LV, 2>,
}

#[derive(Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SerializedCausalGraph(pub Vec<SerializedEntry>);

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeltaEntryV2 {
    pub agent: SmartString,
    pub seq: usize,
    pub len: usize,
    pub parents: SmallVec<RemoteVersionOwned, 2>,
}

#[derive(Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeltaV2(pub Vec<DeltaEntryV2>);

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeltaEntryV3 {
    pub agent: SmartString,
    pub seq: usize,
    pub len: usize,
    pub parents: SmallVec<isize, 2>,
}

#[derive(Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeltaV3 {
    pub ext_refs: Vec<RemoteVersionOwned>,
    pub entries: Vec<DeltaEntryV3>,
}

/// Errors raised while applying a malformed snapshot or delta. The payload
/// is the index of the offending entry.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[non_exhaustive]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum DeltaError {
    /// A v3 parent offset points at or past the entry naming it.
    InvalidParentOffset(usize),
    /// A negative v3 parent indexes past the end of the ext_refs table.
    InvalidExternalReference(usize),
    /// A parent names a public version this graph doesn't have.
    UnknownParent(usize),
    /// A snapshot entry's parents must name already-assigned versions.
    InvalidSnapshotParent(usize),
}

impl Display for DeltaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeltaError {:?}", self)
    }
}

impl Error for DeltaError {}

impl CausalGraph {
    /// Dump the whole graph as an ordered entry list. The inverse is
    /// [`CausalGraph::from_serialized`].
    pub fn serialize(&self) -> SerializedCausalGraph {
        SerializedCausalGraph(self.iter().map(|e| SerializedEntry {
            agent: self.get_agent_name(e.span.agent).into(),
            seq: e.span.seq_range.start,
            len: e.len(),
            parents: e.parents.0.clone(),
        }).collect())
    }

    /// Rebuild a graph from a snapshot. The rebuilt graph assigns the same
    /// local versions in the same order as the graph that produced it.
    pub fn from_serialized(data: &SerializedCausalGraph) -> Result<Self, DeltaError> {
        let mut cg = Self::new();

        for (idx, e) in data.0.iter().enumerate() {
            for &p in &e.parents {
                if p >= cg.len() {
                    return Err(DeltaError::InvalidSnapshotParent(idx));
                }
            }

            let agent = cg.get_or_create_agent_id(&e.agent);
            cg.merge_and_assign(&e.parents, AgentSpan {
                agent,
                seq_range: (e.seq..e.seq + e.len).into(),
            });
        }

        Ok(cg)
    }

    /// Serialize the graph runs covering `ranges`, naming parents by
    /// public version. Ranges must be ascending (diff output qualifies) -
    /// that makes the emitted entries causally ordered.
    pub fn serialize_diff_v2(&self, ranges: &[VRange]) -> DeltaV2 {
        let mut entries = vec![];

        for range in ranges {
            for e in self.iter_range(*range) {
                entries.push(DeltaEntryV2 {
                    agent: self.get_agent_name(e.span.agent).into(),
                    seq: e.span.seq_range.start,
                    len: e.len(),
                    parents: e.parents.iter()
                        .map(|&p| self.agent_assignment.local_to_remote_version(p).into())
                        .collect(),
                });
            }
        }

        DeltaV2(entries)
    }

    /// Serialize the graph runs covering `ranges` with the packed v3
    /// parent encoding. Parents inside the delta become offsets; parents
    /// outside it go through the ext_refs table.
    pub fn serialize_diff_v3(&self, ranges: &[VRange]) -> DeltaV3 {
        // Delta offsets are the prefix sums of the range lengths.
        let mut offset_starts = Vec::with_capacity(ranges.len());
        let mut next_offset = 0;
        for r in ranges {
            offset_starts.push((*r, next_offset));
            next_offset += r.len();
        }

        let lv_to_offset = |lv: LV| -> Option<usize> {
            let idx = offset_starts.partition_point(|(r, _)| r.end <= lv);
            match offset_starts.get(idx) {
                Some((r, off_start)) if r.start <= lv => Some(off_start + (lv - r.start)),
                _ => None,
            }
        };

        let mut ext_refs: Vec<RemoteVersionOwned> = vec![];
        let mut entries = vec![];

        for range in ranges {
            for e in self.iter_range(*range) {
                let parents = e.parents.iter().map(|&p| {
                    if let Some(off) = lv_to_offset(p) {
                        off as isize
                    } else {
                        let rv: RemoteVersionOwned =
                            self.agent_assignment.local_to_remote_version(p).into();
                        let idx = ext_refs.iter().position(|r| *r == rv)
                            .unwrap_or_else(|| {
                                ext_refs.push(rv);
                                ext_refs.len() - 1
                            });
                        -(idx as isize) - 1
                    }
                }).collect();

                entries.push(DeltaEntryV3 {
                    agent: self.get_agent_name(e.span.agent).into(),
                    seq: e.span.seq_range.start,
                    len: e.len(),
                    parents,
                });
            }
        }

        DeltaV3 { ext_refs, entries }
    }

    /// Everything the graph knows that isn't reachable from `since`, as a
    /// v3 delta.
    pub fn serialize_from_version(&self, since: &[LV]) -> DeltaV3 {
        let (_, missing) = self.graph.diff(since, self.version.as_ref());
        self.serialize_diff_v3(&missing)
    }

    /// Apply a v2 delta. Spans we already know are skipped - duplicate
    /// application is the defined idempotent behaviour, not an error.
    /// Returns the range of local versions assigned.
    pub fn merge_partial_v2(&mut self, delta: &DeltaV2) -> Result<VRange, DeltaError> {
        let start = self.len();

        for (idx, e) in delta.0.iter().enumerate() {
            let parents = e.parents.iter()
                .map(|rv| self.agent_assignment.try_remote_to_local_version(rv.into()))
                .collect::<Result<SmallVec<LV, 2>, _>>()
                .map_err(|_| DeltaError::UnknownParent(idx))?;
            let parents = Frontier::from(parents);

            let agent = self.get_or_create_agent_id(&e.agent);
            self.merge_and_assign(parents.as_ref(), AgentSpan {
                agent,
                seq_range: (e.seq..e.seq + e.len).into(),
            });
        }

        debug!(entries = delta.0.len(), inserted = self.len() - start, "merged v2 delta");
        Ok((start..self.len()).into())
    }

    /// Apply a v3 delta. As with v2, known spans are skipped. Malformed
    /// parent references are rejected with the offending entry index.
    pub fn merge_partial_v3(&mut self, delta: &DeltaV3) -> Result<VRange, DeltaError> {
        let start = self.len();

        // Where each delta offset landed locally. Offsets are dense, but
        // the local versions backing them may be scattered when parts of
        // the delta were already known.
        let mut offset_to_lv: Vec<(usize, VRange)> = vec![];
        let mut next_offset = 0usize;

        fn offset_lookup(table: &[(usize, VRange)], off: usize) -> Option<LV> {
            let idx = table.partition_point(|(o, lvs)| o + lvs.len() <= off);
            match table.get(idx) {
                Some((o, lvs)) if *o <= off => Some(lvs.start + (off - o)),
                _ => None,
            }
        }

        for (idx, e) in delta.entries.iter().enumerate() {
            let mut parents: SmallVec<LV, 2> = SmallVec::new();
            for &p in e.parents.iter() {
                let lv = if p >= 0 {
                    let off = p as usize;
                    if off >= next_offset {
                        return Err(DeltaError::InvalidParentOffset(idx));
                    }
                    offset_lookup(&offset_to_lv, off)
                        .ok_or(DeltaError::InvalidParentOffset(idx))?
                } else {
                    let ext_idx = (-p - 1) as usize;
                    let rv = delta.ext_refs.get(ext_idx)
                        .ok_or(DeltaError::InvalidExternalReference(idx))?;
                    self.agent_assignment.try_remote_to_local_version(rv.into())
                        .map_err(|_| DeltaError::UnknownParent(idx))?
                };
                parents.push(lv);
            }
            let parents = Frontier::from(parents);

            let agent = self.get_or_create_agent_id(&e.agent);
            self.merge_and_assign(parents.as_ref(), AgentSpan {
                agent,
                seq_range: (e.seq..e.seq + e.len).into(),
            });

            // Record where this entry's changes live locally - whether we
            // just assigned them or already had them.
            let seq_end = e.seq + e.len;
            let mut seq = e.seq;
            let mut off = next_offset;
            let client = &self.agent_assignment.client_data[agent as usize];
            while seq < seq_end {
                let (entry, offset) = client.lv_for_seq.find_with_offset(seq).unwrap();
                let lv_start = entry.1.start + offset;
                let piece_len = (entry.end() - seq).min(seq_end - seq);
                offset_to_lv.push((off, (lv_start..lv_start + piece_len).into()));
                seq += piece_len;
                off += piece_len;
            }
            next_offset += e.len;
        }

        debug!(entries = delta.entries.len(), inserted = self.len() - start, "merged v3 delta");
        Ok((start..self.len()).into())
    }

    /// Compute the frontier that applying `delta` would produce, without
    /// inserting anything. The graph must already contain the delta's
    /// entries (eg because an equivalent delta arrived via another
    /// stream). Callers may need to run find_dominators on the result.
    pub fn advance_version_from_serialized(&self, delta: &DeltaV3, mut version: Frontier)
        -> Result<Frontier, DeltaError>
    {
        // Prefix sums of entry lengths, for resolving parent offsets back
        // to (agent, seq) pairs.
        let mut entry_offsets = Vec::with_capacity(delta.entries.len());
        let mut next_offset = 0;
        for e in &delta.entries {
            entry_offsets.push(next_offset);
            next_offset += e.len;
        }

        let offset_to_lv = |off: usize, err_idx: usize| -> Result<LV, DeltaError> {
            let idx = entry_offsets.partition_point(|&o| o <= off) - 1;
            let e = &delta.entries[idx];
            if off - entry_offsets[idx] >= e.len {
                return Err(DeltaError::InvalidParentOffset(err_idx));
            }
            let seq = e.seq + (off - entry_offsets[idx]);
            self.agent_assignment
                .try_remote_to_local_version((e.agent.as_str(), seq).into())
                .map_err(|_| DeltaError::UnknownParent(err_idx))
        };

        for (idx, e) in delta.entries.iter().enumerate() {
            let mut parents: SmallVec<LV, 2> = SmallVec::new();
            for &p in e.parents.iter() {
                let lv = if p >= 0 {
                    let off = p as usize;
                    if off >= entry_offsets[idx] {
                        return Err(DeltaError::InvalidParentOffset(idx));
                    }
                    offset_to_lv(off, idx)?
                } else {
                    let ext_idx = (-p - 1) as usize;
                    let rv = delta.ext_refs.get(ext_idx)
                        .ok_or(DeltaError::InvalidExternalReference(idx))?;
                    self.agent_assignment.try_remote_to_local_version(rv.into())
                        .map_err(|_| DeltaError::UnknownParent(idx))?
                };
                parents.push(lv);
            }
            let parents = Frontier::from(parents);

            let v_last = self.agent_assignment
                .try_remote_to_local_version((e.agent.as_str(), e.seq + e.len - 1).into())
                .map_err(|_| DeltaError::UnknownParent(idx))?;

            version.advance_by_known_run(parents.as_ref(), (v_last..v_last + 1).into());
        }

        Ok(version)
    }
}

/// Merge everything `src` knows into `dest`:
///
/// 1. Summarize dest.
/// 2. Intersect the summary against src to find the common frontier.
/// 3. Diff src against that frontier to find what dest is missing.
/// 4. Serialize the difference (v3) and merge it into dest.
///
/// Returns the range of local versions inserted into dest.
pub fn merge_local(dest: &mut CausalGraph, src: &CausalGraph) -> VRange {
    let summary = dest.agent_assignment.summarize_versions();
    let (common, _remainder) = src.intersect_with_summary(&summary, &[]);

    let (_, src_only) = src.graph.diff(common.as_ref(), src.version.as_ref());
    debug!(ranges = src_only.len(), "merging local graphs");

    let delta = src.serialize_diff_v3(&src_only);
    dest.merge_partial_v3(&delta)
        .expect("A delta built from a consistent graph must apply cleanly")
}
