use crate::CausalGraph;

impl CausalGraph {
    /// Panic if the graph violates any of its invariants. Used liberally
    /// by tests and fuzzers.
    pub fn dbg_check(&self, deep: bool) {
        assert_eq!(self.agent_assignment.len(), self.graph.len(),
            "The two indexes must cover the same versions");

        self.graph.dbg_check(deep);
        self.agent_assignment.dbg_check(deep);

        assert_eq!(self.version, self.graph.dbg_get_frontier_inefficiently(),
            "Stored frontier diverged from the dominator set");

        if deep {
            // The frontier must be exactly the dominator set of every
            // version we hold.
            let all: Vec<_> = (0..self.len()).collect();
            assert_eq!(self.version, self.graph.find_dominators(&all));
        }
    }
}
