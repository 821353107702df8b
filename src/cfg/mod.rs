//! Control-flow graph construction.
//!
//! A [`Graph`] partitions one function's flat instruction listing into basic
//! blocks and wires predecessor/successor edges. Blocks live in an arena and
//! are addressed by [`BlockId`]; removing a block marks it and redirects
//! edges, so no stale references can survive a mutation.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use crate::analysis::Avail;
use crate::ir::{Instr, Name, ValueCode};

/// Arena index of a basic block within its function's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "B{}", self.0 + 1)
    }
}

/// A maximal straight-line instruction run. Owns its instructions
/// exclusively and carries the dataflow snapshots computed by the solvers
/// in [`crate::analysis`].
#[derive(Debug, Default)]
pub struct Block {
    pub instrs: Vec<Instr<BlockId>>,
    pub preds: BTreeSet<BlockId>,
    pub succs: BTreeSet<BlockId>,
    removed: bool,

    pub live_in: BTreeSet<Name>,
    pub live_out: BTreeSet<Name>,
    pub avail_in: std::collections::BTreeMap<Name, Avail>,
    pub avail_out: std::collections::BTreeMap<Name, Avail>,
    pub assigned_in: BTreeSet<Name>,
    pub assigned_out: BTreeSet<Name>,
}

impl Block {
    pub fn last(&self) -> Option<&Instr<BlockId>> {
        self.instrs.last()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// One function's control-flow graph.
#[derive(Debug)]
pub struct Graph {
    name: String,
    params: Vec<Name>,
    globals: BTreeSet<Name>,
    blocks: Vec<Block>,
    entry: BlockId,
}

impl Graph {
    /// Build the graph for one function body.
    ///
    /// The listing is normalised first: jumps are moved off no-op
    /// placeholders, interior no-ops are dropped (targets are remapped to
    /// the surviving indices), and a synthetic exit no-op is appended
    /// unless the listing already ends in an unconditional exit point.
    /// A jump whose target index does not name a block leader afterwards is
    /// a contract violation in the front end and panics.
    pub fn build(
        name: impl Into<String>,
        params: Vec<Name>,
        code: ValueCode,
        globals: BTreeSet<Name>,
    ) -> Self {
        let mut instrs = code.instrs;
        retarget_nop_jumps(&mut instrs);
        remove_interior_nops(&mut instrs);
        ensure_exit(&mut instrs);

        let leaders = block_leaders(&instrs);

        // Partition into blocks. `starts[b]` is the flat index of block b's
        // first instruction.
        let mut raw_blocks: Vec<Vec<Instr<usize>>> = vec![];
        let mut starts: Vec<usize> = vec![];
        let mut current: Vec<Instr<usize>> = vec![];
        let mut current_start = 0;
        for (index, instr) in instrs.into_iter().enumerate() {
            if leaders.contains(&index) && !current.is_empty() {
                raw_blocks.push(std::mem::take(&mut current));
                starts.push(current_start);
                current_start = index;
            }
            let ends_block = instr.is_jump();
            current.push(instr);
            if ends_block {
                raw_blocks.push(std::mem::take(&mut current));
                starts.push(current_start);
                current_start = index + 1;
            }
        }
        if !current.is_empty() {
            raw_blocks.push(current);
            starts.push(current_start);
        }

        let block_at = |index: usize| -> BlockId {
            BlockId(
                starts
                    .iter()
                    .position(|&s| s == index)
                    .unwrap_or_else(|| panic!("jump target {} is not a block leader", index)),
            )
        };

        let mut graph = Self {
            name: name.into(),
            params,
            globals,
            blocks: raw_blocks
                .iter()
                .map(|_| Block::default())
                .collect::<Vec<_>>(),
            entry: BlockId(0),
        };

        for (index, raw) in raw_blocks.into_iter().enumerate() {
            let id = BlockId(index);
            let fallthrough = match raw.last() {
                Some(Instr::Jump { .. }) | Some(Instr::Return { .. }) => false,
                Some(Instr::Branch { .. }) => true,
                // Ends without a terminator, so the block boundary came from
                // a jump target on the next instruction.
                _ => index + 1 < graph.blocks.len(),
            };
            if fallthrough {
                graph.add_edge(id, BlockId(index + 1));
            }
            if let Some(&target) = raw.last().and_then(Instr::jump_target) {
                graph.add_edge(id, block_at(target));
            }
            graph.blocks[index].instrs =
                raw.into_iter().map(|i| i.map_target(block_at)).collect();
        }

        graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_main(&self) -> bool {
        self.name == "main"
    }

    pub fn params(&self) -> &[Name] {
        &self.params
    }

    pub fn globals(&self) -> &BTreeSet<Name> {
        &self.globals
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    /// Identifiers of all live blocks, in arena (layout) order. The entry
    /// block always comes first.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.removed)
            .map(|(i, _)| BlockId(i))
            .collect()
    }

    /// Total number of instructions over all live blocks.
    pub fn len(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| !b.removed)
            .map(|b| b.instrs.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Breadth-first order over reachable blocks, starting at the entry.
    pub fn bfs_order(&self) -> Vec<BlockId> {
        let mut order = vec![];
        let mut visited = BTreeSet::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(self.entry);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            queue.extend(self.block(id).succs.iter().copied());
        }
        order
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.0].succs.insert(to);
        self.blocks[to.0].preds.insert(from);
    }

    /// Remove an emptied block from the graph: predecessors inherit its
    /// successors, jumps that targeted it are redirected to its surviving
    /// successor, and the block is marked removed. An emptied block never
    /// ends in a terminator, so it has exactly one successor.
    pub fn splice_block(&mut self, id: BlockId) {
        debug_assert!(self.blocks[id.0].instrs.is_empty());
        let preds: Vec<_> = self.blocks[id.0].preds.iter().copied().collect();
        let succs: Vec<_> = self.blocks[id.0].succs.iter().copied().collect();
        let heir = *succs
            .first()
            .expect("emptied a block with no successor");

        for &pred in &preds {
            self.blocks[pred.0].succs.remove(&id);
            if let Some(last) = self.blocks[pred.0].instrs.last_mut() {
                if last.jump_target() == Some(&id) {
                    last.set_jump_target(heir);
                }
            }
            for &succ in &succs {
                if pred != succ {
                    self.add_edge(pred, succ);
                }
            }
        }
        for &succ in &succs {
            self.blocks[succ.0].preds.remove(&id);
        }
        if self.entry == id {
            self.entry = heir;
        }

        let block = &mut self.blocks[id.0];
        block.removed = true;
        block.preds.clear();
        block.succs.clear();
    }

    /// Render the graph in Graphviz `dot` syntax: one record-shaped node per
    /// reachable block, edges per successor relation.
    pub fn dot(&self) -> String {
        let mut dot = String::new();
        let mut edges = vec![];
        dot.push_str(&format!("digraph {}{{\n", self.name));
        for id in self.bfs_order() {
            let block = self.block(id);
            let body = block
                .instrs
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("|");
            dot.push_str(&format!(
                "\t{} [shape=record, label=\"<b>{} | {{{}}}\"];\n",
                id, id, body
            ));
            for succ in &block.succs {
                edges.push(format!("\t{}:s -> {}:n\n", id, succ));
            }
        }
        for edge in edges {
            dot.push_str(&edge);
        }
        dot.push_str("}\n");
        dot
    }
}

/// Repeatedly retarget jumps pointing at a no-op to the no-op's successor
/// instruction, collapsing chains of eliminated placeholders.
fn retarget_nop_jumps(instrs: &mut [Instr<usize>]) {
    let mut changed = true;
    while changed {
        changed = false;
        for index in 0..instrs.len() {
            let Some(&target) = instrs[index].jump_target() else {
                continue;
            };
            if instrs[target].is_nop() && target < instrs.len() - 1 {
                instrs[index].set_jump_target(target + 1);
                changed = true;
            }
        }
    }
}

/// Drop every no-op except the final instruction, remapping jump targets to
/// the surviving indices.
fn remove_interior_nops(instrs: &mut Vec<Instr<usize>>) {
    let len = instrs.len();
    let keep: Vec<bool> = instrs
        .iter()
        .enumerate()
        .map(|(i, instr)| !instr.is_nop() || i == len - 1)
        .collect();

    let mut remap = vec![0usize; len];
    let mut next = 0;
    for (index, &kept) in keep.iter().enumerate() {
        remap[index] = next;
        if kept {
            next += 1;
        }
    }

    let mut index = 0;
    instrs.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    for instr in instrs.iter_mut() {
        if let Some(&target) = instr.jump_target() {
            instr.set_jump_target(remap[target]);
        }
    }
}

/// Guarantee a well-defined fallthrough exit point. A trailing conditional
/// jump also gets one, since its false edge needs somewhere to land.
fn ensure_exit(instrs: &mut Vec<Instr<usize>>) {
    match instrs.last() {
        None => instrs.push(Instr::Nop),
        Some(Instr::Branch { .. }) => instrs.push(Instr::Nop),
        Some(last) if !last.is_jump() && !last.is_nop() => instrs.push(Instr::Nop),
        _ => (),
    }
}

/// The set of instruction indices that start a new block because some jump
/// targets them.
fn block_leaders(instrs: &[Instr<usize>]) -> BTreeSet<usize> {
    instrs
        .iter()
        .filter_map(Instr::jump_target)
        .copied()
        .collect()
}
