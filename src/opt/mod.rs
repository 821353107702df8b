//! Optimisation passes over the block graph.
//!
//! Each pass re-runs the dataflow analysis it depends on, rewrites the
//! graph in place, and reports whether anything changed. The driver
//! repeats the selected passes until a full round makes no change.

mod cse;
mod dce;
mod fold;
mod propagate;

use log::debug;
use thiserror::Error;

use crate::cfg::Graph;

pub use cse::run as eliminate_common_subexpressions;
pub use dce::run as eliminate_dead_code;
pub use fold::run as fold_constants;
pub use propagate::{run as propagate_assignments, Mode};

#[derive(Debug, Error)]
#[error("unknown optimisation '{0}', expected one of dce, cf, cp, cpp, cse, max")]
pub struct UnknownPass(String);

/// The set of enabled optimisation passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSet {
    pub dead_code: bool,
    pub fold: bool,
    pub const_prop: bool,
    pub copy_prop: bool,
    pub cse: bool,
}

impl PassSet {
    /// Every pass enabled.
    pub fn all() -> Self {
        Self {
            dead_code: true,
            fold: true,
            const_prop: true,
            copy_prop: true,
            cse: true,
        }
    }

    /// Parse command-line pass names. `max` implies every pass.
    pub fn parse<S: AsRef<str>>(flags: &[S]) -> Result<Self, UnknownPass> {
        let mut set = Self::default();
        for flag in flags {
            match flag.as_ref() {
                "dce" => set.dead_code = true,
                "cf" => set.fold = true,
                "cp" => set.const_prop = true,
                "cpp" => set.copy_prop = true,
                "cse" => set.cse = true,
                "max" => set = Self::all(),
                other => return Err(UnknownPass(other.to_string())),
            }
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Run the enabled passes over one function.
pub fn optimise(graph: &mut Graph, passes: PassSet) {
    let mut round = 0;
    loop {
        let mut changed = false;
        if passes.dead_code {
            changed |= dce::run(graph);
        }
        if passes.fold {
            changed |= fold::run(graph);
        }
        if passes.const_prop {
            changed |= propagate::run(graph, Mode::Constants);
        }
        if passes.cse {
            changed |= cse::run(graph);
        }
        if passes.copy_prop {
            changed |= propagate::run(graph, Mode::Copies);
        }
        round += 1;
        if !changed {
            break;
        }
    }
    debug!("optimised {} in {} rounds", graph.name(), round);
}
