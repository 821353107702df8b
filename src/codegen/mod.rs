//! Machine code generation and linking.
//!
//! [`emit_function`] lowers one coloured function to instructions with
//! unresolved BSR call sites; [`link`] lays `main` out first so the machine
//! starts there, patches every call displacement and encodes the image.

mod emit;
mod isa;

use std::collections::BTreeMap;

use log::debug;
use thiserror::Error;

use crate::ir::Name;

pub use emit::{emit_function, FunctionCode, MAX_ALLOC};
pub use isa::{fits_immediate, Format, InternalError, MachineInstr, Op};

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error("no main function to start from")]
    MissingMain,
    #[error("call to undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("function '{0}' is defined twice")]
    DuplicateFunction(String),
    #[error("bad builtin call '{0}'")]
    BuiltinArity(String),
    #[error("variable '{0}' has neither register nor memory home")]
    Unallocated(Name),
    #[error("literal {0} does not fit in a 16-bit immediate")]
    LiteralRange(i32),
    #[error("branch to {0} was never patched")]
    UnpatchedBranch(String),
}

/// Concatenate the functions (`main` first) into one encoded image.
pub fn link(functions: Vec<FunctionCode>) -> Result<Vec<u32>, CodegenError> {
    let main = functions
        .iter()
        .position(|f| f.name == "main")
        .ok_or(CodegenError::MissingMain)?;

    let mut order: Vec<&FunctionCode> = Vec::with_capacity(functions.len());
    order.push(&functions[main]);
    order.extend(
        functions
            .iter()
            .enumerate()
            .filter_map(|(i, f)| (i != main).then_some(f)),
    );

    let mut starts: BTreeMap<&str, i32> = BTreeMap::new();
    let mut offset = 0;
    for function in &order {
        if starts.insert(&function.name, offset).is_some() {
            return Err(CodegenError::DuplicateFunction(function.name.clone()));
        }
        offset += function.instrs.len() as i32;
    }

    let mut image: Vec<MachineInstr> = Vec::with_capacity(offset as usize);
    for function in &order {
        let base = image.len() as i32;
        image.extend(function.instrs.iter().copied());
        for (site, callee) in &function.calls {
            let target = *starts
                .get(callee.as_str())
                .ok_or_else(|| CodegenError::UndefinedFunction(callee.clone()))?;
            let site = base + *site as i32;
            image[site as usize].c = target - site;
        }
        debug!(
            "linked {} at word {} ({} instructions)",
            function.name,
            base,
            function.instrs.len()
        );
    }

    image.iter().map(|i| Ok(i.encode()?)).collect()
}
