//! Common subexpression elimination.
//!
//! When a computation's right-hand side matches one already recorded in the
//! available-expression map, the recomputation is rewritten into a copy of
//! the variable that holds the earlier result. Only genuine computations
//! (NOT and binary operations) are shared; bare copies are propagation's
//! business.

use log::trace;

use crate::analysis::{self, Avail};
use crate::cfg::Graph;
use crate::ir::{Instr, Rhs, Value};

pub fn run(graph: &mut Graph) -> bool {
    analysis::available(graph);
    let globals = graph.globals().clone();
    let mut changed = false;

    for id in graph.block_ids() {
        let mut avail = graph.block(id).avail_in.clone();
        for instr in graph.block_mut(id).instrs.iter_mut() {
            if let (Some(rhs), Some(dest)) = (instr.rhs(), instr.dest().cloned()) {
                if is_computation(&rhs) {
                    let holder = avail.iter().find_map(|(name, entry)| {
                        (*name != dest && *entry == Avail::Rhs(rhs.clone()))
                            .then(|| name.clone())
                    });
                    if let Some(holder) = holder {
                        trace!("{}: {} already holds {}", id, holder, rhs);
                        *instr = Instr::Copy {
                            dest,
                            value: Value::Name(holder),
                        };
                        changed = true;
                    }
                }
            }
            analysis::transfer_available(&*instr, &globals, &mut avail);
        }
    }
    changed
}

fn is_computation(rhs: &Rhs) -> bool {
    matches!(rhs, Rhs::Not(_) | Rhs::Bin(..))
}
