//! Three-address intermediate representation.

mod instr;

pub use instr::*;
