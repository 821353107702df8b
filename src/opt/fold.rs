//! Constant folding and algebraic simplification.
//!
//! Rewrites instructions whose result is decidable from their shape alone:
//! literal-literal arithmetic and comparisons, boolean literals under NOT,
//! and the usual operator identities. Division and modulo by a literal zero
//! are deliberately left alone so the fault surfaces at run time, and POW
//! with a negative literal exponent likewise.

use log::trace;

use crate::cfg::Graph;
use crate::ir::{BinOp, Instr, Value};

pub fn run(graph: &mut Graph) -> bool {
    let mut changed = false;
    for id in graph.block_ids() {
        for instr in graph.block_mut(id).instrs.iter_mut() {
            let folded = match instr {
                Instr::Bin {
                    dest,
                    op,
                    left,
                    right,
                } => fold_bin(*op, left, right).map(|value| Instr::Copy {
                    dest: dest.clone(),
                    value,
                }),
                Instr::Not {
                    dest,
                    value: Value::Bool(b),
                } => Some(Instr::Copy {
                    dest: dest.clone(),
                    value: Value::Bool(!*b),
                }),
                _ => None,
            };
            if let Some(replacement) = folded {
                trace!("{}: folding {} to {}", id, instr, replacement);
                *instr = replacement;
                changed = true;
            }
        }
    }
    changed
}

fn fold_bin(op: BinOp, left: &Value, right: &Value) -> Option<Value> {
    use BinOp::*;
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => fold_ints(op, *a, *b),
        (Value::Bool(a), Value::Bool(b)) => fold_bools(op, *a, *b),
        _ => fold_identity(op, left, right),
    }
    .or(match op {
        // These hold whether or not the repeated operand is known.
        Equal | LessEqual | GreaterEqual if left == right => Some(Value::Bool(true)),
        NotEqual | Less | Greater if left == right => Some(Value::Bool(false)),
        _ => None,
    })
}

fn fold_ints(op: BinOp, a: i32, b: i32) -> Option<Value> {
    use BinOp::*;
    Some(match op {
        Add => Value::Int(a.wrapping_add(b)),
        Sub => Value::Int(a.wrapping_sub(b)),
        Mul => Value::Int(a.wrapping_mul(b)),
        Div if b != 0 => Value::Int(a.wrapping_div(b)),
        Mod if b != 0 => Value::Int(a.wrapping_rem(b)),
        Pow if b >= 0 => Value::Int(a.wrapping_pow(b as u32)),
        Equal => Value::Bool(a == b),
        NotEqual => Value::Bool(a != b),
        Less => Value::Bool(a < b),
        LessEqual => Value::Bool(a <= b),
        Greater => Value::Bool(a > b),
        GreaterEqual => Value::Bool(a >= b),
        _ => return None,
    })
}

fn fold_bools(op: BinOp, a: bool, b: bool) -> Option<Value> {
    use BinOp::*;
    Some(match op {
        Equal => Value::Bool(a == b),
        NotEqual => Value::Bool(a != b),
        And => Value::Bool(a && b),
        Or => Value::Bool(a || b),
        _ => return None,
    })
}

/// Identities with one known operand. The unknown operand is always pure
/// here, so dropping it (as in `x MUL 0`) never loses an effect.
fn fold_identity(op: BinOp, left: &Value, right: &Value) -> Option<Value> {
    use BinOp::*;
    let result = match (op, left, right) {
        (Add, x, Value::Int(0)) | (Add, Value::Int(0), x) => x,
        (Sub, x, Value::Int(0)) => x,
        (Mul, _, Value::Int(0)) | (Mul, Value::Int(0), _) => &Value::Int(0),
        (Mul, x, Value::Int(1)) | (Mul, Value::Int(1), x) => x,
        (Div, x, Value::Int(1)) => x,
        (Mod, _, Value::Int(1)) => &Value::Int(0),
        (Pow, _, Value::Int(0)) => &Value::Int(1),
        (Pow, x, Value::Int(1)) => x,
        (Or, _, Value::Bool(true)) | (Or, Value::Bool(true), _) => &Value::Bool(true),
        (And, _, Value::Bool(false)) | (And, Value::Bool(false), _) => &Value::Bool(false),
        _ => return None,
    };
    Some(result.clone())
}
