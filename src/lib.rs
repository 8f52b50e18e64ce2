//! An in-memory causal graph for operation-based CRDTs.
//!
//! A causal graph stores, for every change it knows about:
//!
//! - A globally unique public identity - an `(agent, seq)` pair, and
//! - The set of changes it causally depends on (its *parents*).
//!
//! Changes are named locally by *local version* (LV) numbers: dense
//! integers assigned in insertion order. The graph maps bidirectionally
//! between local versions and public versions, and answers the questions
//! CRDT implementations ask constantly: has this change been seen? How do
//! two histories differ? Does one version dominate another? What minimal
//! frontier summarises this set?
//!
//! The graph stores only the causal skeleton. Operation payloads live
//! elsewhere.

pub mod causalgraph;
mod vrange;
mod frontier;
pub(crate) mod rle;

pub use causalgraph::CausalGraph;
pub use causalgraph::entry::CGEntry;
pub use causalgraph::agent_span::{AgentSpan, AgentVersion};
pub use causalgraph::agent_assignment::remote_ids::{
    RemoteFrontier, RemoteFrontierOwned, RemoteVersion, RemoteVersionOwned, RemoteVersionSpan,
    VersionConversionError,
};
pub use causalgraph::graph::tools::{ConflictZone, DiffFlag, DiffResult};
pub use causalgraph::graph::{Graph, GraphEntrySimple};
pub use causalgraph::summary::VersionSummary;
pub use causalgraph::serialization::{
    merge_local, DeltaEntryV2, DeltaEntryV3, DeltaError, DeltaV2, DeltaV3, SerializedCausalGraph,
    SerializedEntry,
};
pub use vrange::VRange;
pub use frontier::Frontier;

/// A local version: the dense, peer-private integer name of a single
/// change. If a graph holds N changes, its LVs are exactly `0..N`. Local
/// versions must never be sent to another peer.
pub type LV = usize;

/// The locally-interned id of an agent name. Like LVs, agent ids are
/// assigned in first-seen order and are private to this peer.
pub type AgentId = u32;
