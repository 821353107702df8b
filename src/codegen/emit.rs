//! Lowering a coloured function to machine instructions.
//!
//! Register convention: R1..R24 are allocatable, R25/R26 are scratch for
//! spilled operands and literals, R27 carries return values across calls,
//! R28 is the frame pointer, R29 the stack pointer, R30 the global pointer
//! and R31 the link register. R0 is hardwired zero; the allocator's spill
//! sentinel 0 never reaches an emitted instruction.
//!
//! Frames hang below FP: one shadow slot per allocatable register at
//! `FP - r` (saved across calls), then one slot per spilled local. The
//! stack pointer sits one word below the frame, so the outgoing argument
//! area starting at SP is always free. Globals live below GP, one word
//! each in name order. Offsets and branch displacements are in words.

use std::collections::BTreeMap;

use log::trace;

use super::isa::{fits_immediate, MachineInstr, Op};
use super::CodegenError;
use crate::cfg::{BlockId, Graph};
use crate::ir::{is_builtin, BinOp, Instr, Name, Value};
use crate::regalloc::Allocation;

pub const ZERO: u8 = 0;
/// Default register budget: the highest register the allocator may hand out.
pub const MAX_ALLOC: u8 = 24;
const SCRATCH_A: u8 = 25;
const SCRATCH_B: u8 = 26;
const RETVAL: u8 = 27;
const FP: u8 = 28;
const SP: u8 = 29;
const GP: u8 = 30;
const LINK: u8 = 31;

/// One lowered function, with the call sites the linker must patch.
#[derive(Debug)]
pub struct FunctionCode {
    pub name: String,
    pub instrs: Vec<MachineInstr>,
    /// `(instruction index, callee)` for every BSR placeholder.
    pub calls: Vec<(usize, String)>,
}

/// Where a variable lives: a register, a frame slot, or a global slot.
/// Slot offsets are in words from FP and GP respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Home {
    Reg(u8),
    Frame(i32),
    Global(i32),
}

pub fn emit_function(graph: &Graph, alloc: &Allocation) -> Result<FunctionCode, CodegenError> {
    let mut emitter = Emitter::new(graph, alloc);
    emitter.prologue()?;

    let layout = graph.block_ids();
    for (index, &id) in layout.iter().enumerate() {
        emitter.begin_block(id);
        let next = layout.get(index + 1).copied();
        for instr in &graph.block(id).instrs {
            emitter.lower(instr, next)?;
        }
    }
    if let Some(&(_, target)) = emitter.pending.first() {
        return Err(CodegenError::UnpatchedBranch(target.to_string()));
    }

    trace!(
        "{}: {} instructions, {} call sites",
        graph.name(),
        emitter.code.len(),
        emitter.calls.len()
    );
    Ok(FunctionCode {
        name: graph.name().to_string(),
        instrs: emitter.code,
        calls: emitter.calls,
    })
}

struct Emitter<'a> {
    graph: &'a Graph,
    alloc: &'a Allocation,
    code: Vec<MachineInstr>,
    starts: BTreeMap<BlockId, i32>,
    /// Forward branches waiting for their target block to start.
    pending: Vec<(usize, BlockId)>,
    calls: Vec<(usize, String)>,
    toggle: bool,
    global_slots: BTreeMap<Name, i32>,
    frame_slots: BTreeMap<Name, i32>,
    frame_offset: i32,
}

impl<'a> Emitter<'a> {
    fn new(graph: &'a Graph, alloc: &'a Allocation) -> Self {
        let global_slots: BTreeMap<Name, i32> = graph
            .globals()
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), -(i as i32) - 1))
            .collect();

        let num_reg = alloc.num_reg() as i32;
        let frame_slots: BTreeMap<Name, i32> = alloc
            .spilled()
            .filter(|name| !global_slots.contains_key(*name))
            .enumerate()
            .map(|(i, name)| (name.clone(), -num_reg - 1 - i as i32))
            .collect();
        let frame_offset = -num_reg - 1 - frame_slots.len() as i32;

        Self {
            graph,
            alloc,
            code: vec![],
            starts: BTreeMap::new(),
            pending: vec![],
            calls: vec![],
            toggle: false,
            global_slots,
            frame_slots,
            frame_offset,
        }
    }

    fn push(&mut self, op: Op, a: u8, b: u8, c: i32) -> usize {
        self.code.push(MachineInstr::new(op, a, b, c));
        self.code.len() - 1
    }

    fn next_scratch(&mut self) -> u8 {
        self.toggle = !self.toggle;
        if self.toggle {
            SCRATCH_A
        } else {
            SCRATCH_B
        }
    }

    fn home(&self, name: &Name) -> Result<Home, CodegenError> {
        if let Some(reg) = self.alloc.register(name) {
            return Ok(Home::Reg(reg));
        }
        if let Some(&off) = self.global_slots.get(name) {
            return Ok(Home::Global(off));
        }
        self.frame_slots
            .get(name)
            .map(|&off| Home::Frame(off))
            .ok_or_else(|| CodegenError::Unallocated(name.clone()))
    }

    /// Bring a value into some register, using a scratch when it has none.
    fn load_value(&mut self, value: &Value) -> Result<u8, CodegenError> {
        match value {
            Value::Name(name) => match self.home(name)? {
                Home::Reg(reg) => Ok(reg),
                Home::Frame(off) => {
                    let s = self.next_scratch();
                    self.push(Op::Ldw, s, FP, off);
                    Ok(s)
                }
                Home::Global(off) => {
                    let s = self.next_scratch();
                    self.push(Op::Ldw, s, GP, off);
                    Ok(s)
                }
            },
            literal => {
                let word = self.literal_word(literal)?;
                let s = self.next_scratch();
                self.push(Op::Addi, s, ZERO, word);
                Ok(s)
            }
        }
    }

    /// Bring a value into one specific register.
    fn load_value_into(&mut self, rd: u8, value: &Value) -> Result<(), CodegenError> {
        match value {
            Value::Name(name) => match self.home(name)? {
                Home::Reg(reg) if reg == rd => {}
                Home::Reg(reg) => {
                    self.push(Op::Addi, rd, reg, 0);
                }
                Home::Frame(off) => {
                    self.push(Op::Ldw, rd, FP, off);
                }
                Home::Global(off) => {
                    self.push(Op::Ldw, rd, GP, off);
                }
            },
            literal => {
                let word = self.literal_word(literal)?;
                self.push(Op::Addi, rd, ZERO, word);
            }
        }
        Ok(())
    }

    fn literal_word(&self, literal: &Value) -> Result<i32, CodegenError> {
        let word = literal.as_word().expect("named value is not a literal");
        if fits_immediate(word) {
            Ok(word)
        } else {
            Err(CodegenError::LiteralRange(word))
        }
    }

    /// The register a computation may build its result in.
    fn result_reg(&mut self, dest: &Name) -> Result<u8, CodegenError> {
        match self.home(dest)? {
            Home::Reg(reg) => Ok(reg),
            _ => Ok(self.next_scratch()),
        }
    }

    /// Move a finished result from `src` into the destination's home.
    fn store_result(&mut self, dest: &Name, src: u8) -> Result<(), CodegenError> {
        match self.home(dest)? {
            Home::Reg(reg) if reg == src => {}
            Home::Reg(reg) => {
                self.push(Op::Addi, reg, src, 0);
            }
            Home::Frame(off) => {
                self.push(Op::Stw, src, FP, off);
            }
            Home::Global(off) => {
                self.push(Op::Stw, src, GP, off);
            }
        }
        Ok(())
    }

    fn prologue(&mut self) -> Result<(), CodegenError> {
        if self.graph.is_main() {
            let num_globals = self.graph.globals().len() as i32;
            self.push(Op::Addi, FP, GP, -num_globals);
        } else {
            let nargs = self.graph.params().len() as i32;
            for (i, param) in self.graph.params().iter().enumerate() {
                // A parameter can go entirely unused; it then has no home.
                let incoming = nargs - i as i32;
                match self.home(param) {
                    Ok(Home::Reg(reg)) => {
                        self.push(Op::Ldw, reg, FP, incoming);
                    }
                    Ok(_) => {
                        let s = self.next_scratch();
                        self.push(Op::Ldw, s, FP, incoming);
                        self.store_result(param, s)?;
                    }
                    Err(_) => {}
                }
            }
            for (name, &off) in &self.global_slots.clone() {
                if let Some(reg) = self.alloc.register(name) {
                    self.push(Op::Ldw, reg, GP, off);
                }
            }
        }
        self.push(Op::Addi, SP, FP, self.frame_offset);
        Ok(())
    }

    fn begin_block(&mut self, id: BlockId) {
        let start = self.code.len() as i32;
        self.starts.insert(id, start);
        let resolved: Vec<usize> = self
            .pending
            .iter()
            .filter(|(_, target)| *target == id)
            .map(|(site, _)| *site)
            .collect();
        for site in resolved {
            self.code[site].c = start - site as i32;
        }
        self.pending.retain(|(_, target)| *target != id);
    }

    fn branch_to(&mut self, op: Op, tested: u8, target: BlockId) {
        let site = self.code.len();
        let displacement = match self.starts.get(&target) {
            Some(&start) => start - site as i32,
            None => {
                self.pending.push((site, target));
                0
            }
        };
        self.push(op, tested, 0, displacement);
    }

    fn lower(&mut self, instr: &Instr<BlockId>, next: Option<BlockId>) -> Result<(), CodegenError> {
        match instr {
            Instr::Copy { dest, value } => match self.home(dest)? {
                Home::Reg(reg) => self.load_value_into(reg, value),
                _ => {
                    let src = self.load_value(value)?;
                    self.store_result(dest, src)
                }
            },
            Instr::Not { dest, value } => self.lower_not(dest, value),
            Instr::Bin {
                dest,
                op,
                left,
                right,
            } => {
                if op.is_comparison() {
                    self.lower_compare(dest, *op, left, right)
                } else {
                    self.lower_arith(dest, *op, left, right)
                }
            }
            Instr::Call { dest, callee, args } => {
                if is_builtin(callee) {
                    self.lower_builtin(dest.as_ref(), callee, args)
                } else {
                    self.lower_call(dest.as_ref(), callee, args)
                }
            }
            Instr::Jump { target } => {
                if Some(*target) != next {
                    self.branch_to(Op::Beq, ZERO, *target);
                }
                Ok(())
            }
            Instr::Branch { cond, target } => {
                let tested = self.load_value(cond)?;
                self.branch_to(Op::Bne, tested, *target);
                Ok(())
            }
            Instr::Return { value } => self.lower_exit(value.as_ref()),
            Instr::Nop => self.lower_exit(None),
        }
    }

    fn lower_arith(
        &mut self,
        dest: &Name,
        op: BinOp,
        left: &Value,
        right: &Value,
    ) -> Result<(), CodegenError> {
        let (reg_op, imm_op) = arith_ops(op);
        // Operands load before the result register is claimed, so the
        // scratch rotation never clobbers a pending operand.
        let l = self.load_value(left)?;
        let rd = match right.as_word() {
            Some(imm) if fits_immediate(imm) => {
                let rd = self.result_reg(dest)?;
                self.push(imm_op, rd, l, imm);
                rd
            }
            Some(imm) => return Err(CodegenError::LiteralRange(imm)),
            None => {
                let r = self.load_value(right)?;
                let rd = self.result_reg(dest)?;
                self.push(reg_op, rd, l, r as i32);
                rd
            }
        };
        self.store_result(dest, rd)
    }

    /// `CMP t, l, r` leaves the sign of `l - r` in `t`; the result register
    /// is preset to 1 and zeroed unless the branch skips over the reset.
    fn lower_compare(
        &mut self,
        dest: &Name,
        op: BinOp,
        left: &Value,
        right: &Value,
    ) -> Result<(), CodegenError> {
        let l = self.load_value(left)?;
        let t = match right.as_word() {
            Some(imm) if fits_immediate(imm) => {
                let t = self.next_scratch();
                self.push(Op::Cmpi, t, l, imm);
                t
            }
            Some(imm) => return Err(CodegenError::LiteralRange(imm)),
            None => {
                let r = self.load_value(right)?;
                let t = self.next_scratch();
                self.push(Op::Cmp, t, l, r as i32);
                t
            }
        };
        let rd = self.result_reg(dest)?;
        self.push(Op::Addi, rd, ZERO, 1);
        self.push(compare_branch(op), t, 0, 2);
        self.push(Op::Addi, rd, ZERO, 0);
        self.store_result(dest, rd)
    }

    /// NOT is `1 BIC b`: bit-clear keeps the low bit of 1 unless b has it.
    fn lower_not(&mut self, dest: &Name, value: &Value) -> Result<(), CodegenError> {
        match value.as_word() {
            Some(word) => {
                let rd = self.result_reg(dest)?;
                self.push(Op::Addi, rd, ZERO, (word == 0) as i32);
                self.store_result(dest, rd)
            }
            None => {
                let b = self.load_value(value)?;
                let one = self.next_scratch();
                self.push(Op::Addi, one, ZERO, 1);
                let rd = self.result_reg(dest)?;
                self.push(Op::Bic, rd, one, b as i32);
                self.store_result(dest, rd)
            }
        }
    }

    fn lower_builtin(
        &mut self,
        dest: Option<&Name>,
        callee: &str,
        args: &[Value],
    ) -> Result<(), CodegenError> {
        match callee {
            "readInt" | "readBool" => {
                let op = if callee == "readInt" { Op::Rdi } else { Op::Rdb };
                match dest {
                    Some(dest) => {
                        let rd = self.result_reg(dest)?;
                        self.push(op, rd, 0, 0);
                        self.store_result(dest, rd)
                    }
                    None => {
                        // Result discarded, but the read still consumes input.
                        let s = self.next_scratch();
                        self.push(op, s, 0, 0);
                        Ok(())
                    }
                }
            }
            "printInt" | "printBool" => {
                let op = if callee == "printInt" { Op::Wri } else { Op::Wrb };
                let arg = args
                    .first()
                    .ok_or_else(|| CodegenError::BuiltinArity(callee.to_string()))?;
                let src = self.load_value(arg)?;
                self.push(op, 0, src, 0);
                Ok(())
            }
            "println" => {
                self.push(Op::Wrl, 0, 0, 0);
                Ok(())
            }
            other => Err(CodegenError::BuiltinArity(other.to_string())),
        }
    }

    /// The call protocol: arguments go below SP, every register-resident
    /// variable is saved (globals to their global slot, locals to their
    /// register's shadow slot), the link register is parked at `SP - nargs`
    /// where the callee's FP will point, and everything is undone in
    /// reverse once the callee returns.
    fn lower_call(
        &mut self,
        dest: Option<&Name>,
        callee: &str,
        args: &[Value],
    ) -> Result<(), CodegenError> {
        let nargs = args.len() as i32;
        for (i, arg) in args.iter().enumerate() {
            let src = self.load_value(arg)?;
            self.push(Op::Stw, src, SP, -(i as i32));
        }
        self.save_registers(Op::Stw);
        self.push(Op::Stw, LINK, SP, -nargs);
        self.push(Op::Addi, FP, SP, -nargs);

        self.calls.push((self.code.len(), callee.to_string()));
        self.push(Op::Bsr, 0, 0, 0);

        self.push(Op::Subi, SP, FP, -nargs);
        self.push(Op::Subi, FP, SP, self.frame_offset);
        self.push(Op::Ldw, LINK, SP, -nargs);
        self.save_registers(Op::Ldw);

        match dest {
            Some(dest) => self.store_result(dest, RETVAL),
            None => Ok(()),
        }
    }

    /// Save (`STW`) or restore (`LDW`) every register-resident variable.
    fn save_registers(&mut self, op: Op) {
        let moves: Vec<(u8, u8, i32)> = self
            .alloc
            .in_registers()
            .map(|(name, reg)| match self.global_slots.get(name) {
                Some(&off) => (reg, GP, off),
                None => (reg, FP, -(reg as i32)),
            })
            .collect();
        for (reg, base, off) in moves {
            self.push(op, reg, base, off);
        }
    }

    /// Function exit. `main` halts the machine; other functions flush
    /// register-resident globals back to memory, put the return value in
    /// R27 and jump through the link register.
    fn lower_exit(&mut self, value: Option<&Value>) -> Result<(), CodegenError> {
        if self.graph.is_main() {
            self.push(Op::Ret, 0, 0, 0);
            return Ok(());
        }
        if let Some(value) = value {
            self.load_value_into(RETVAL, value)?;
        }
        for (name, off) in self.global_slots.clone() {
            if let Some(reg) = self.alloc.register(&name) {
                self.push(Op::Stw, reg, GP, off);
            }
        }
        self.push(Op::Ret, 0, 0, LINK as i32);
        Ok(())
    }
}

fn arith_ops(op: BinOp) -> (Op, Op) {
    match op {
        BinOp::Add => (Op::Add, Op::Addi),
        BinOp::Sub => (Op::Sub, Op::Subi),
        BinOp::Mul => (Op::Mul, Op::Muli),
        BinOp::Div => (Op::Div, Op::Divi),
        BinOp::Mod => (Op::Mod, Op::Modi),
        BinOp::Pow => (Op::Pow, Op::Powi),
        BinOp::And => (Op::And, Op::Andi),
        BinOp::Or => (Op::Or, Op::Ori),
        _ => unreachable!("comparisons take the compare path"),
    }
}

fn compare_branch(op: BinOp) -> Op {
    match op {
        BinOp::Equal => Op::Beq,
        BinOp::NotEqual => Op::Bne,
        BinOp::Less => Op::Blt,
        BinOp::LessEqual => Op::Ble,
        BinOp::Greater => Op::Bgt,
        BinOp::GreaterEqual => Op::Bge,
        _ => unreachable!("not a comparison"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueCode;
    use crate::regalloc;
    use std::collections::BTreeSet;

    fn name(s: &str) -> Name {
        Name::from(s)
    }

    fn var(s: &str) -> Value {
        Value::Name(name(s))
    }

    fn emit(graph: &mut Graph, num_reg: u8) -> FunctionCode {
        let alloc = regalloc::allocate(graph, num_reg);
        emit_function(graph, &alloc).unwrap()
    }

    fn ops(code: &FunctionCode) -> Vec<Op> {
        code.instrs.iter().map(|i| i.op).collect()
    }

    #[test]
    fn straight_line_main_lowers_exactly() {
        let mut g = Graph::build(
            "main",
            vec![],
            ValueCode::new(vec![
                Instr::Copy {
                    dest: name("x"),
                    value: Value::Int(5),
                },
                Instr::Call {
                    dest: None,
                    callee: "printInt".to_string(),
                    args: vec![var("x")],
                },
            ]),
            BTreeSet::new(),
        );

        let code = emit(&mut g, 2);
        // FP from GP, SP below the 2 shadow slots, then the body.
        assert_eq!(
            vec![
                MachineInstr::new(Op::Addi, FP, GP, 0),
                MachineInstr::new(Op::Addi, SP, FP, -3),
                MachineInstr::new(Op::Addi, 1, ZERO, 5),
                MachineInstr::new(Op::Wri, 0, 1, 0),
                MachineInstr::new(Op::Ret, 0, 0, 0),
            ],
            code.instrs
        );
    }

    #[test]
    fn comparison_presets_then_conditionally_clears() {
        let mut g = Graph::build(
            "main",
            vec![],
            ValueCode::new(vec![
                Instr::Copy {
                    dest: name("a"),
                    value: Value::Int(3),
                },
                Instr::Bin {
                    dest: name("b"),
                    op: BinOp::Less,
                    left: var("a"),
                    right: Value::Int(7),
                },
                Instr::Call {
                    dest: None,
                    callee: "printBool".to_string(),
                    args: vec![var("b")],
                },
            ]),
            BTreeSet::new(),
        );

        let code = emit(&mut g, 4);
        let cmp = code
            .instrs
            .iter()
            .position(|i| i.op == Op::Cmpi)
            .expect("compare emitted");
        assert_eq!(Op::Addi, code.instrs[cmp + 1].op);
        assert_eq!(1, code.instrs[cmp + 1].c);
        assert_eq!(MachineInstr::new(Op::Blt, SCRATCH_A, 0, 2), code.instrs[cmp + 2]);
        assert_eq!(0, code.instrs[cmp + 3].c);
    }

    #[test]
    fn spilled_variables_round_trip_through_the_frame() {
        // Budget 1 forces one of the two concurrently-live variables out.
        let mut g = Graph::build(
            "main",
            vec![],
            ValueCode::new(vec![
                Instr::Copy {
                    dest: name("a"),
                    value: Value::Int(1),
                },
                Instr::Copy {
                    dest: name("b"),
                    value: Value::Int(2),
                },
                Instr::Bin {
                    dest: name("c"),
                    op: BinOp::Add,
                    left: var("a"),
                    right: var("b"),
                },
                Instr::Call {
                    dest: None,
                    callee: "printInt".to_string(),
                    args: vec![var("c")],
                },
            ]),
            BTreeSet::new(),
        );

        let code = emit(&mut g, 1);
        let lowered = ops(&code);
        assert!(lowered.contains(&Op::Stw), "spill store missing: {:?}", lowered);
        assert!(lowered.contains(&Op::Ldw), "spill load missing: {:?}", lowered);
        // The spill slot sits below the register shadow slot.
        let store = code.instrs.iter().find(|i| i.op == Op::Stw).unwrap();
        assert_eq!(FP, store.b);
        assert_eq!(-2, store.c);
    }

    #[test]
    fn backward_branches_resolve_immediately() {
        // A self-loop: the branch targets its own block.
        let mut g = Graph::build(
            "main",
            vec![],
            ValueCode::new(vec![
                Instr::Call {
                    dest: Some(name("x")),
                    callee: "readInt".to_string(),
                    args: vec![],
                },
                Instr::Branch {
                    cond: var("x"),
                    target: 0,
                },
            ]),
            BTreeSet::new(),
        );

        let code = emit(&mut g, 2);
        let branch = code.instrs.iter().find(|i| i.op == Op::Bne).unwrap();
        assert!(branch.c < 0, "loop displacement points backward");
    }

    #[test]
    fn forward_branches_are_patched() {
        let mut g = Graph::build(
            "main",
            vec![],
            ValueCode::new(vec![
                Instr::Branch {
                    cond: var("c"),
                    target: 2,
                },
                Instr::Copy {
                    dest: name("x"),
                    value: Value::Int(1),
                },
                Instr::Call {
                    dest: None,
                    callee: "println".to_string(),
                    args: vec![],
                },
            ]),
            BTreeSet::new(),
        );
        crate::analysis::zero_unassigned(&mut g);

        let code = emit(&mut g, 2);
        let site = code.instrs.iter().position(|i| i.op == Op::Bne).unwrap();
        let disp = code.instrs[site].c;
        assert!(disp > 0);
        assert_eq!(Op::Wrl, code.instrs[site + disp as usize].op);
    }

    #[test]
    fn call_protocol_brackets_the_jump() {
        let mut g = Graph::build(
            "main",
            vec![],
            ValueCode::new(vec![
                Instr::Call {
                    dest: Some(name("r")),
                    callee: "double".to_string(),
                    args: vec![Value::Int(21)],
                },
                Instr::Call {
                    dest: None,
                    callee: "printInt".to_string(),
                    args: vec![var("r")],
                },
            ]),
            BTreeSet::new(),
        );

        let code = emit(&mut g, 2);
        let bsr = code.instrs.iter().position(|i| i.op == Op::Bsr).unwrap();
        assert_eq!(vec![(bsr, "double".to_string())], code.calls);
        // Link register parked at the callee's future FP, frame registers
        // re-derived after the return.
        assert_eq!(MachineInstr::new(Op::Stw, LINK, SP, -1), code.instrs[bsr - 2]);
        assert_eq!(MachineInstr::new(Op::Addi, FP, SP, -1), code.instrs[bsr - 1]);
        assert_eq!(MachineInstr::new(Op::Subi, SP, FP, -1), code.instrs[bsr + 1]);
        assert_eq!(MachineInstr::new(Op::Subi, FP, SP, -3), code.instrs[bsr + 2]);
        assert_eq!(MachineInstr::new(Op::Ldw, LINK, SP, -1), code.instrs[bsr + 3]);
        // The callee's result lands in the destination's register.
        assert!(code
            .instrs
            .iter()
            .skip(bsr)
            .any(|i| i.op == Op::Addi && i.b == RETVAL));
    }

    #[test]
    fn helper_installs_parameters_and_returns_through_link() {
        let mut g = Graph::build(
            "double",
            vec![name("n")],
            ValueCode::new(vec![
                Instr::Bin {
                    dest: name("t"),
                    op: BinOp::Mul,
                    left: var("n"),
                    right: Value::Int(2),
                },
                Instr::Return {
                    value: Some(var("t")),
                },
            ]),
            BTreeSet::new(),
        );

        let code = emit(&mut g, 2);
        // Parameter 0 of 1 arrives at FP + 1.
        assert_eq!(Op::Ldw, code.instrs[0].op);
        assert_eq!(FP, code.instrs[0].b);
        assert_eq!(1, code.instrs[0].c);
        // The result reaches R27 before the jump through R31.
        let last = code.instrs.last().unwrap();
        assert_eq!(MachineInstr::new(Op::Ret, 0, 0, LINK as i32), *last);
        assert!(code
            .instrs
            .iter()
            .any(|i| i.op == Op::Addi && i.a == RETVAL));
    }

    #[test]
    fn helpers_load_and_flush_register_resident_globals() {
        let mut g = Graph::build(
            "bump",
            vec![],
            ValueCode::new(vec![Instr::Bin {
                dest: name("g"),
                op: BinOp::Add,
                left: var("g"),
                right: Value::Int(1),
            }]),
            [name("g")].into_iter().collect(),
        );
        crate::analysis::zero_unassigned(&mut g);

        let code = emit(&mut g, 2);
        let first = &code.instrs[0];
        assert_eq!(Op::Ldw, first.op);
        assert_eq!(GP, first.b);
        assert_eq!(-1, first.c);
        let flush = &code.instrs[code.instrs.len() - 2];
        assert_eq!(Op::Stw, flush.op);
        assert_eq!(GP, flush.b);
        assert_eq!(-1, flush.c);
    }
}
