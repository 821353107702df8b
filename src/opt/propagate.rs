//! Constant and copy propagation.
//!
//! Both passes walk each block forward with the available-expression map,
//! replacing reads of a variable whose recorded right-hand side is a bare
//! value. Constant propagation substitutes literals, copy propagation
//! substitutes other variables; conflicting entries are never substituted.

use log::trace;

use crate::analysis::{self, Avail};
use crate::cfg::Graph;
use crate::ir::{Rhs, Value};

/// Which kind of bare value a run substitutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Constants,
    Copies,
}

pub fn run(graph: &mut Graph, mode: Mode) -> bool {
    analysis::available(graph);
    let globals = graph.globals().clone();
    let mut changed = false;

    for id in graph.block_ids() {
        let mut avail = graph.block(id).avail_in.clone();
        for instr in graph.block_mut(id).instrs.iter_mut() {
            let reads: Vec<_> = instr.reads().into_iter().cloned().collect();
            for name in reads {
                let known = match avail.get(&name) {
                    Some(Avail::Rhs(Rhs::Value(value))) => value.clone(),
                    _ => continue,
                };
                let wanted = match mode {
                    Mode::Constants => known.is_const(),
                    Mode::Copies => known.as_name().is_some(),
                };
                if wanted && known != Value::Name(name.clone()) {
                    trace!("{}: replacing {} with {}", id, name, known);
                    instr.replace_uses(&name, &known);
                    changed = true;
                }
            }
            analysis::transfer_available(&*instr, &globals, &mut avail);
        }
    }
    changed
}
