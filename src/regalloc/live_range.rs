use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use crate::analysis;
use crate::cfg::Graph;
use crate::ir::Name;

/// The span of instruction positions over which a variable is live, in the
/// breadth-first linearisation of the function. Ranges are diagnostic: the
/// allocator decides conflicts from the per-position live sets, which also
/// catch variables that go dead and come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRange {
    pub name: Name,
    pub start: usize,
    pub end: usize,
}

impl Display for LiveRange {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: [{}, {}]", self.name, self.start, self.end)
    }
}

/// Compute one range per variable, from its first live position to its
/// last. Requires up-to-date liveness. Variables live into the entry block
/// start at position 0.
pub fn live_ranges(graph: &Graph) -> Vec<LiveRange> {
    let mut spans: BTreeMap<Name, (usize, usize)> = BTreeMap::new();
    let mut offset = 0;
    for id in graph.bfs_order() {
        let sets = analysis::live_sets(graph, id);
        for (index, set) in sets.iter().enumerate() {
            let position = offset + index / 2;
            for name in set {
                spans
                    .entry(name.clone())
                    .and_modify(|(_, end)| *end = position)
                    .or_insert((position, position));
            }
        }
        offset += sets.len() / 2;
    }

    let mut ranges: Vec<LiveRange> = spans
        .into_iter()
        .map(|(name, (start, end))| LiveRange { name, start, end })
        .collect();
    ranges.sort_by_key(|r| r.start);
    ranges
}
