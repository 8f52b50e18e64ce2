//! The causal graph itself: the agent assignment (who made each change)
//! joined with the graph (what each change depended on), plus the current
//! frontier.

use crate::causalgraph::agent_assignment::AgentAssignment;
use crate::causalgraph::graph::Graph;
use crate::Frontier;

pub mod agent_assignment;
pub mod agent_span;
pub mod entry;
pub mod graph;
pub mod serialization;
pub mod summary;

#[allow(clippy::module_inception)]
mod causalgraph;
mod check;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CausalGraph {
    /// Maps local versions <-> (agent, seq) pairs.
    pub agent_assignment: AgentAssignment,

    /// Parents information for all known changes. This is the data that
    /// answers diff / containment / dominator queries.
    pub graph: Graph,

    /// The current frontier: the dominator set of everything stored.
    pub version: Frontier,
}
