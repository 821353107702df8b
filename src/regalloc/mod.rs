//! Register allocation by graph colouring.
//!
//! Two variables conflict when some instruction position has both live at
//! once. The allocator colours the conflict graph with Kempe's heuristic:
//! repeatedly set aside the variable with the fewest remaining conflicts,
//! then pop the stack assigning each variable the lowest register its
//! already-coloured neighbours leave free. A variable that finds no free
//! register is given the sentinel 0 and lives in a stack slot instead.

mod live_range;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};

use crate::analysis;
use crate::cfg::Graph;
use crate::ir::Name;

pub use live_range::{live_ranges, LiveRange};

/// Register number 0 marks a spilled variable.
pub const SPILLED: u8 = 0;

/// The result of colouring one function.
#[derive(Debug, Clone)]
pub struct Allocation {
    registers: BTreeMap<Name, u8>,
    num_reg: u8,
}

impl Allocation {
    /// The register holding `name`, or `None` when it is spilled or was
    /// never live.
    pub fn register(&self, name: &Name) -> Option<u8> {
        match self.registers.get(name) {
            Some(&SPILLED) | None => None,
            Some(&reg) => Some(reg),
        }
    }

    pub fn is_spilled(&self, name: &Name) -> bool {
        self.registers.get(name) == Some(&SPILLED)
    }

    /// Spilled variables in name order; their index is their slot number.
    pub fn spilled(&self) -> impl Iterator<Item = &Name> {
        self.registers
            .iter()
            .filter(|(_, &reg)| reg == SPILLED)
            .map(|(name, _)| name)
    }

    /// The register budget this allocation was coloured against.
    pub fn num_reg(&self) -> u8 {
        self.num_reg
    }

    /// Variables holding a register, in name order.
    pub fn in_registers(&self) -> impl Iterator<Item = (&Name, u8)> {
        self.registers
            .iter()
            .filter(|(_, &reg)| reg != SPILLED)
            .map(|(name, &reg)| (name, reg))
    }
}

/// Colour every variable of the function with at most `num_reg` registers.
pub fn allocate(graph: &mut Graph, num_reg: u8) -> Allocation {
    analysis::liveness(graph);
    let conflicts = conflict_graph(graph);

    // Simplify: set variables aside cheapest-first.
    let mut remaining: BTreeSet<Name> = conflicts.keys().cloned().collect();
    let mut stack: Vec<Name> = Vec::with_capacity(remaining.len());
    loop {
        let pick = remaining.iter().min_by_key(|name| {
            conflicts[*name]
                .iter()
                .filter(|c| remaining.contains(*c))
                .count()
        });
        match pick.cloned() {
            Some(pick) => {
                remaining.remove(&pick);
                stack.push(pick);
            }
            None => break,
        }
    }

    // Select: colour in reverse order of removal.
    let mut registers: BTreeMap<Name, u8> = BTreeMap::new();
    while let Some(name) = stack.pop() {
        let taken: BTreeSet<u8> = conflicts[&name]
            .iter()
            .filter_map(|c| registers.get(c).copied())
            .collect();
        let reg = (1..=num_reg).find(|r| !taken.contains(r)).unwrap_or(SPILLED);
        if reg != SPILLED {
            trace!("{}: {} gets R{}", graph.name(), name, reg);
        }
        registers.insert(name, reg);
    }

    let allocation = Allocation { registers, num_reg };
    if allocation.spilled().next().is_some() {
        // Report each spill with the span it could not be coloured over.
        for range in live_ranges(graph) {
            if allocation.is_spilled(&range.name) {
                debug!("{}: spilling {}", graph.name(), range);
            }
        }
    }
    allocation
}

/// Mark every pair of variables that share a live position.
fn conflict_graph(graph: &Graph) -> BTreeMap<Name, BTreeSet<Name>> {
    let mut conflicts: BTreeMap<Name, BTreeSet<Name>> = BTreeMap::new();
    for id in graph.bfs_order() {
        for set in analysis::live_sets(graph, id) {
            for a in &set {
                let entry = conflicts.entry(a.clone()).or_default();
                entry.extend(set.iter().filter(|b| *b != a).cloned());
            }
        }
    }
    conflicts
}
