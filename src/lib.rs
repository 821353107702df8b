//! An optimising middle and back end for a DLX-style word-addressed
//! machine.
//!
//! The pipeline reads a three-address listing, partitions each function
//! into a control-flow graph, runs the selected optimisation passes over
//! iterative dataflow results, colours variables onto registers with a
//! conflict-graph allocator, and lowers everything to a single linked
//! machine image:
//!
//! ```no_run
//! let source = std::fs::read_to_string("program.tac").unwrap();
//! let image = dlxc::compile(&source, dlxc::opt::PassSet::all(), 24).unwrap();
//! ```

pub mod analysis;
pub mod cfg;
pub mod codegen;
pub mod commandline;
pub mod ir;
pub mod loader;
pub mod opt;
pub mod regalloc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Load(#[from] loader::LoadError),
    #[error(transparent)]
    Codegen(#[from] codegen::CodegenError),
    #[error("register budget {} must be between 1 and {}", .0, codegen::MAX_ALLOC)]
    RegisterBudget(u8),
}

/// Compile a listing into an encoded machine image, one `u32` per word.
pub fn compile(source: &str, passes: opt::PassSet, num_reg: u8) -> Result<Vec<u32>, CompileError> {
    if num_reg == 0 || num_reg > codegen::MAX_ALLOC {
        return Err(CompileError::RegisterBudget(num_reg));
    }

    let mut graphs = loader::parse(source)?.into_graphs();
    let mut functions = Vec::with_capacity(graphs.len());
    for graph in &mut graphs {
        opt::optimise(graph, passes);
        analysis::zero_unassigned(graph);
        let alloc = regalloc::allocate(graph, num_reg);
        functions.push(codegen::emit_function(graph, &alloc)?);
    }
    Ok(codegen::link(functions)?)
}

/// Render every function's optimised control-flow graph in dot form.
pub fn dot(source: &str, passes: opt::PassSet) -> Result<String, CompileError> {
    let mut graphs = loader::parse(source)?.into_graphs();
    let mut out = String::new();
    for graph in &mut graphs {
        opt::optimise(graph, passes);
        out.push_str(&graph.dot());
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::Op;

    fn decode_op(word: u32) -> u32 {
        word >> 26
    }

    #[test]
    fn a_trivial_program_compiles_to_an_image() {
        let image = compile("func main()\n\treturn\n", opt::PassSet::default(), 8).unwrap();
        // Frame setup plus the halting return.
        assert_eq!(3, image.len());
        assert_eq!(Op::Ret.opcode(), decode_op(*image.last().unwrap()));
    }

    #[test]
    fn calls_are_linked_across_functions() {
        let source = "func main()\n\
                      \tr = call double(21)\n\
                      \tcall printInt(r)\n\
                      \treturn\n\
                      \n\
                      func double(n)\n\
                      \tt = n MUL 2\n\
                      \treturn t\n";
        let image = compile(source, opt::PassSet::default(), 8).unwrap();

        let bsr = image
            .iter()
            .position(|w| decode_op(*w) == Op::Bsr.opcode())
            .expect("a BSR in the image");
        let disp = (image[bsr] & 0xFFFF) as i16 as i32;
        // The displacement lands on the callee's first instruction, which
        // installs the parameter from the frame.
        let target = (bsr as i32 + disp) as usize;
        assert_eq!(Op::Ldw.opcode(), decode_op(image[target]));
    }

    #[test]
    fn optimisation_shrinks_the_image() {
        let source = "func main()\n\
                      \ta = 2\n\
                      \tb = 3\n\
                      \tc = a MUL b\n\
                      \tcall printInt(c)\n\
                      \treturn\n";
        let plain = compile(source, opt::PassSet::default(), 8).unwrap();
        let optimised = compile(source, opt::PassSet::all(), 8).unwrap();
        assert!(optimised.len() < plain.len());
    }

    #[test]
    fn loops_branch_backwards() {
        let source = "func main()\n\
                      \ti = 0\n\
                      top:\n\
                      \ti = i ADD 1\n\
                      \tt = i LESS 10\n\
                      \tif t goto top\n\
                      \tcall printInt(i)\n\
                      \treturn\n";
        let image = compile(source, opt::PassSet::default(), 8).unwrap();
        assert!(image
            .iter()
            .any(|w| decode_op(*w) == Op::Bne.opcode() && (*w & 0x8000) != 0));
    }

    #[test]
    fn missing_function_fails_to_link() {
        let err = compile(
            "func main()\n\tcall nowhere()\n",
            opt::PassSet::default(),
            8,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Codegen(codegen::CodegenError::UndefinedFunction(_))
        ));
    }

    #[test]
    fn register_budget_is_validated() {
        assert!(matches!(
            compile("func main()\n\treturn\n", opt::PassSet::default(), 0),
            Err(CompileError::RegisterBudget(0))
        ));
        assert!(matches!(
            compile("func main()\n\treturn\n", opt::PassSet::default(), 30),
            Err(CompileError::RegisterBudget(30))
        ));
    }

    #[test]
    fn dot_output_covers_every_function() {
        let out = dot(
            "func main()\n\treturn\n\nfunc helper()\n\treturn\n",
            opt::PassSet::default(),
        )
        .unwrap();
        assert!(out.contains("digraph main"));
        assert!(out.contains("digraph helper"));
    }
}
