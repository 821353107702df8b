//! The DLX-style target instruction set.
//!
//! Two encodings share the word layout `opcode[31:26] a[25:21] b[20:16]`:
//! immediate-format instructions carry a signed 16-bit constant in the low
//! half, register-format instructions a third register in bits 4..0.
//! Operand ranges are validated at encode time; an operand that does not
//! fit is a compiler fault, never silently truncated.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InternalError {
    #[error("register R{0} does not exist")]
    BadRegister(i32),
    #[error("operand {0} does not fit in a 16-bit immediate")]
    BadImmediate(i32),
}

/// Instruction format: where the third operand lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Signed 16-bit immediate in bits 15..0.
    Immediate,
    /// Register number in bits 4..0.
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Register arithmetic and logic.
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Cmp,
    Or,
    And,
    Bic,
    // Immediate forms.
    Addi,
    Subi,
    Muli,
    Divi,
    Modi,
    Powi,
    Cmpi,
    Ori,
    Andi,
    Bici,
    // Memory.
    Ldw,
    Stw,
    // Control, displacements in words relative to the instruction.
    Beq,
    Bne,
    Blt,
    Bge,
    Ble,
    Bgt,
    Bsr,
    Ret,
    // I/O.
    Rdi,
    Rdb,
    Wri,
    Wrb,
    Wrl,
}

impl Op {
    pub fn opcode(self) -> u32 {
        match self {
            Op::Add => 0,
            Op::Sub => 1,
            Op::Mul => 2,
            Op::Div => 3,
            Op::Mod => 4,
            Op::Pow => 5,
            Op::Cmp => 6,
            Op::Or => 13,
            Op::And => 14,
            Op::Bic => 15,
            Op::Addi => 20,
            Op::Subi => 21,
            Op::Muli => 22,
            Op::Divi => 23,
            Op::Modi => 24,
            Op::Powi => 25,
            Op::Cmpi => 26,
            Op::Ori => 33,
            Op::Andi => 34,
            Op::Bici => 35,
            Op::Ldw => 40,
            Op::Stw => 43,
            Op::Beq => 47,
            Op::Bne => 48,
            Op::Blt => 49,
            Op::Bge => 50,
            Op::Ble => 51,
            Op::Bgt => 52,
            Op::Bsr => 53,
            Op::Ret => 55,
            Op::Rdi => 56,
            Op::Rdb => 58,
            Op::Wri => 59,
            Op::Wrb => 61,
            Op::Wrl => 62,
        }
    }

    pub fn format(self) -> Format {
        match self {
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Mod
            | Op::Pow
            | Op::Cmp
            | Op::Or
            | Op::And
            | Op::Bic
            | Op::Ret
            | Op::Rdi
            | Op::Rdb
            | Op::Wri
            | Op::Wrb => Format::Register,
            _ => Format::Immediate,
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = format!("{:?}", self).to_uppercase();
        f.write_str(&name)
    }
}

/// One instruction before encoding. `c` is a register number or a signed
/// immediate depending on the operation's format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineInstr {
    pub op: Op,
    pub a: u8,
    pub b: u8,
    pub c: i32,
}

impl MachineInstr {
    pub fn new(op: Op, a: u8, b: u8, c: i32) -> Self {
        Self { op, a, b, c }
    }

    pub fn encode(&self) -> Result<u32, InternalError> {
        let a = register(self.a as i32)?;
        let b = register(self.b as i32)?;
        let c = match self.op.format() {
            Format::Register => register(self.c)?,
            Format::Immediate => immediate(self.c)?,
        };
        Ok((self.op.opcode() << 26) | (a << 21) | (b << 16) | c)
    }
}

impl Display for MachineInstr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {}, {}, {}", self.op, self.a, self.b, self.c)
    }
}

fn register(r: i32) -> Result<u32, InternalError> {
    if (0..32).contains(&r) {
        Ok(r as u32)
    } else {
        Err(InternalError::BadRegister(r))
    }
}

fn immediate(value: i32) -> Result<u32, InternalError> {
    if (-32768..=32767).contains(&value) {
        Ok(value as u32 & 0xFFFF)
    } else {
        Err(InternalError::BadImmediate(value))
    }
}

/// True when a literal can be an immediate operand.
pub fn fits_immediate(value: i32) -> bool {
    (-32768..=32767).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_format_encodes_low_half() {
        let word = MachineInstr::new(Op::Addi, 1, 0, 5).encode().unwrap();
        assert_eq!((20 << 26) | (1 << 21) | 5, word);
    }

    #[test]
    fn negative_immediates_are_sign_masked() {
        let word = MachineInstr::new(Op::Stw, 31, 29, -3).encode().unwrap();
        assert_eq!((43 << 26) | (31 << 21) | (29 << 16) | 0xFFFD, word);
    }

    #[test]
    fn register_format_uses_low_five_bits() {
        let word = MachineInstr::new(Op::Add, 3, 1, 2).encode().unwrap();
        assert_eq!((3 << 21) | (1 << 16) | 2, word);
        let ret = MachineInstr::new(Op::Ret, 0, 0, 31).encode().unwrap();
        assert_eq!((55 << 26) | 31, ret);
    }

    #[test]
    fn out_of_range_operands_are_rejected() {
        assert_eq!(
            Err(InternalError::BadImmediate(40000)),
            MachineInstr::new(Op::Addi, 1, 0, 40000).encode()
        );
        assert_eq!(
            Err(InternalError::BadRegister(32)),
            MachineInstr::new(Op::Add, 1, 2, 32).encode()
        );
    }

    #[test]
    fn boundary_immediates_encode() {
        assert!(MachineInstr::new(Op::Addi, 1, 0, 32767).encode().is_ok());
        assert!(MachineInstr::new(Op::Addi, 1, 0, -32768).encode().is_ok());
        assert!(MachineInstr::new(Op::Addi, 1, 0, 32768).encode().is_err());
    }
}
