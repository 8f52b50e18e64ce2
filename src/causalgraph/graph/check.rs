use crate::causalgraph::graph::Graph;
use crate::frontier::is_sorted_slice;
use crate::Frontier;

impl Graph {
    /// Recompute the frontier from scratch by replaying every entry. Slow;
    /// only used as an oracle in checks and tests.
    pub(crate) fn dbg_get_frontier_inefficiently(&self) -> Frontier {
        let mut f = Frontier::root();
        for entry in self.entries.iter() {
            f.advance_by_known_run(entry.parents.as_ref(), entry.span);
        }
        f
    }

    /// Panic if the graph is internally inconsistent. With `deep` set this
    /// also validates that no entry's parents list contains a redundant
    /// member.
    pub fn dbg_check(&self, deep: bool) {
        // Entries must be dense from 0 and maximally compacted.
        self.entries.check_packed_from_0();
        self.entries.check_fully_merged();

        // The shadow of each entry names the lowest version for which
        // everything in [shadow, span.end) is a transitive parent of the
        // entry's last change. Entries are checked in order, so earlier
        // shadows can be assumed valid by induction.
        let mut next_version = 0;
        for entry in self.entries.iter() {
            assert!(entry.span.end > entry.span.start);

            entry.parents.debug_check_sorted();

            let mut expect_shadow = next_version;
            next_version = entry.span.end;

            if !entry.parents.is_empty() {
                for p in entry.parents.iter().copied().rev() { // Highest to lowest.
                    assert!(p < entry.span.start);

                    // Parents can point into the middle of a run.
                    let parent_idx = self.entries.find_index(p).unwrap();
                    let parent_entry = &self.entries.0[parent_idx];

                    if p + 1 == expect_shadow {
                        expect_shadow = parent_entry.shadow;
                    }
                }

                // And check that none of the parents are redundant.
                if deep {
                    self.find_dominators_full(entry.parents.iter().copied(), |_v, is_dom| {
                        assert!(is_dom, "Entry has a redundant parent");
                    });
                }
            }

            assert_eq!(entry.shadow, expect_shadow);

            assert!(is_sorted_slice::<true, _>(entry.parents.as_ref()));
        }
    }
}
