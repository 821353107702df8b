//! Dead code elimination.
//!
//! Walks each block backwards against fresh liveness results. Assignments
//! whose target is dead afterwards are deleted; calls whose result is dead
//! are kept for their side effects but downgraded to void calls. Blocks
//! emptied this way are spliced out of the graph.

use log::trace;

use crate::analysis;
use crate::cfg::Graph;
use crate::ir::Instr;

pub fn run(graph: &mut Graph) -> bool {
    analysis::liveness(graph);
    let globals = graph.globals().clone();
    let mut changed = false;
    let mut emptied = vec![];

    for id in graph.block_ids() {
        let block = graph.block_mut(id);
        let mut live = block.live_out.clone();
        let mut keep = vec![true; block.instrs.len()];
        for (index, instr) in block.instrs.iter_mut().enumerate().rev() {
            match instr {
                Instr::Call { dest, .. } => {
                    if dest.as_ref().is_some_and(|d| !live.contains(d)) {
                        trace!("{}: discarding an unused call result", id);
                        *dest = None;
                        changed = true;
                    }
                }
                _ => {
                    if let Some(dest) = instr.dest() {
                        if !live.contains(dest) {
                            trace!("{}: removing dead {}", id, instr);
                            keep[index] = false;
                            changed = true;
                            continue;
                        }
                    }
                }
            }
            analysis::transfer_liveness(instr, &globals, &mut live);
        }

        if keep.iter().any(|k| !k) {
            let mut index = 0;
            block.instrs.retain(|_| {
                index += 1;
                keep[index - 1]
            });
        }
        if block.instrs.is_empty() {
            emptied.push(id);
        }
    }

    for id in emptied {
        trace!("{}: emptied, splicing out", id);
        graph.splice_block(id);
    }
    changed
}
