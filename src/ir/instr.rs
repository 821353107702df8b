use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A variable name. Names are symbolic addresses produced by the front end;
/// they may refer to source variables or to generated temporaries. The front
/// end guarantees freshness, so plain string equality identifies a variable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(String);

impl Name {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Display for Name {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// An operand: a literal or a reference to a name defined earlier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Int(i32),
    Bool(bool),
    Name(Name),
}

impl Value {
    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Value::Name(n) => Some(n),
            _ => None,
        }
    }

    /// True for literal operands.
    pub fn is_const(&self) -> bool {
        !matches!(self, Value::Name(_))
    }

    /// The machine-word rendition of a literal (`true` is 1, `false` is 0).
    pub fn as_word(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i32),
            Value::Name(_) => None,
        }
    }
}
impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Int(i) => i.fmt(f),
            Value::Bool(b) => b.fmt(f),
            Value::Name(n) => n.fmt(f),
        }
    }
}

/// A binary operator, covering arithmetic, comparison and boolean logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Equal
                | BinOp::NotEqual
                | BinOp::Less
                | BinOp::LessEqual
                | BinOp::Greater
                | BinOp::GreaterEqual
        )
    }

    fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "ADD",
            BinOp::Sub => "SUB",
            BinOp::Mul => "MUL",
            BinOp::Div => "DIV",
            BinOp::Mod => "MOD",
            BinOp::Pow => "POW",
            BinOp::Equal => "EQUAL",
            BinOp::NotEqual => "NOT_EQUAL",
            BinOp::Less => "LESS",
            BinOp::LessEqual => "LESS_EQUAL",
            BinOp::Greater => "GREATER",
            BinOp::GreaterEqual => "GREATER_EQUAL",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }
}
impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
impl FromStr for BinOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        Ok(match s {
            "ADD" => BinOp::Add,
            "SUB" => BinOp::Sub,
            "MUL" => BinOp::Mul,
            "DIV" => BinOp::Div,
            "MOD" => BinOp::Mod,
            "POW" => BinOp::Pow,
            "EQUAL" => BinOp::Equal,
            "NOT_EQUAL" => BinOp::NotEqual,
            "LESS" => BinOp::Less,
            "LESS_EQUAL" => BinOp::LessEqual,
            "GREATER" => BinOp::Greater,
            "GREATER_EQUAL" => BinOp::GreaterEqual,
            "AND" => BinOp::And,
            "OR" => BinOp::Or,
            _ => return Err(()),
        })
    }
}

/// A single three-address instruction, generic over the jump-target label
/// type `L`. The front end produces instructions targeting indices into the
/// flat listing; once the control-flow graph is built, targets refer to
/// basic blocks, so a jump can never point into the middle of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr<L> {
    /// Copy a value to a name.
    Copy { dest: Name, value: Value },
    /// Boolean negation.
    Not { dest: Name, value: Value },
    /// Apply a binary operator.
    Bin {
        dest: Name,
        op: BinOp,
        left: Value,
        right: Value,
    },
    /// Call a function. A call without a destination discards the result.
    Call {
        dest: Option<Name>,
        callee: String,
        args: Vec<Value>,
    },
    /// Unconditional jump.
    Jump { target: L },
    /// Jump if the condition is true.
    Branch { cond: Value, target: L },
    /// Return from the current function.
    Return { value: Option<Value> },
    /// Placeholder. Serves as a collapsible jump anchor in the flat listing
    /// and as the synthetic exit point of a function.
    Nop,
}

/// The built-in I/O functions. Calls to these have no effect on global
/// variables and lower to dedicated machine instructions.
pub const BUILTINS: [&str; 5] = ["readInt", "readBool", "printInt", "printBool", "println"];

pub fn is_builtin(callee: &str) -> bool {
    BUILTINS.contains(&callee)
}

impl<L> Instr<L> {
    /// The name this instruction assigns to, if any.
    pub fn dest(&self) -> Option<&Name> {
        match self {
            Instr::Copy { dest, .. } | Instr::Not { dest, .. } | Instr::Bin { dest, .. } => {
                Some(dest)
            }
            Instr::Call { dest, .. } => dest.as_ref(),
            _ => None,
        }
    }

    /// Every name read by this instruction, in operand order.
    pub fn reads(&self) -> Vec<&Name> {
        fn collect<'v>(values: impl IntoIterator<Item = &'v Value>) -> Vec<&'v Name> {
            values.into_iter().filter_map(Value::as_name).collect()
        }
        match self {
            Instr::Copy { value, .. } | Instr::Not { value, .. } => collect([value]),
            Instr::Bin { left, right, .. } => collect([left, right]),
            Instr::Call { args, .. } => collect(args),
            Instr::Branch { cond, .. } => collect([cond]),
            Instr::Return { value } => collect(value.as_ref()),
            Instr::Jump { .. } | Instr::Nop => vec![],
        }
    }

    /// Replace every read of `name` with `replacement`. Assignments to
    /// `name` are left alone.
    pub fn replace_uses(&mut self, name: &Name, replacement: &Value) {
        let try_replace = |value: &mut Value| {
            if value.as_name() == Some(name) {
                *value = replacement.clone();
            }
        };
        match self {
            Instr::Copy { value, .. } | Instr::Not { value, .. } => try_replace(value),
            Instr::Bin { left, right, .. } => {
                try_replace(left);
                try_replace(right);
            }
            Instr::Call { args, .. } => args.iter_mut().for_each(try_replace),
            Instr::Branch { cond, .. } => try_replace(cond),
            Instr::Return { value: Some(v) } => try_replace(v),
            _ => (),
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Instr::Jump { .. } | Instr::Branch { .. } | Instr::Return { .. }
        )
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Instr::Return { .. })
    }

    pub fn is_nop(&self) -> bool {
        matches!(self, Instr::Nop)
    }

    /// True for instructions that assign a computed value to a name
    /// (calls excluded).
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            Instr::Copy { .. } | Instr::Not { .. } | Instr::Bin { .. }
        )
    }

    pub fn jump_target(&self) -> Option<&L> {
        match self {
            Instr::Jump { target } | Instr::Branch { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn set_jump_target(&mut self, new_target: L) {
        match self {
            Instr::Jump { target } | Instr::Branch { target, .. } => *target = new_target,
            _ => panic!("not a jump instruction"),
        }
    }

    /// Convert the jump-target label type, leaving everything else intact.
    pub fn map_target<M>(self, f: impl FnOnce(L) -> M) -> Instr<M> {
        match self {
            Instr::Copy { dest, value } => Instr::Copy { dest, value },
            Instr::Not { dest, value } => Instr::Not { dest, value },
            Instr::Bin {
                dest,
                op,
                left,
                right,
            } => Instr::Bin {
                dest,
                op,
                left,
                right,
            },
            Instr::Call { dest, callee, args } => Instr::Call { dest, callee, args },
            Instr::Jump { target } => Instr::Jump { target: f(target) },
            Instr::Branch { cond, target } => Instr::Branch {
                cond,
                target: f(target),
            },
            Instr::Return { value } => Instr::Return { value },
            Instr::Nop => Instr::Nop,
        }
    }

    /// The right-hand-side shape of this instruction, if it is a non-call
    /// assignment.
    pub fn rhs(&self) -> Option<Rhs> {
        match self {
            Instr::Copy { value, .. } => Some(Rhs::Value(value.clone())),
            Instr::Not { value, .. } => Some(Rhs::Not(value.clone())),
            Instr::Bin {
                op, left, right, ..
            } => Some(Rhs::Bin(*op, left.clone(), right.clone())),
            _ => None,
        }
    }
}

impl<L: Display> Display for Instr<L> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Instr::Copy { dest, value } => write!(f, "{} = {}", dest, value),
            Instr::Not { dest, value } => write!(f, "{} = NOT {}", dest, value),
            Instr::Bin {
                dest,
                op,
                left,
                right,
            } => write!(f, "{} = {} {} {}", dest, left, op, right),
            Instr::Call {
                dest: Some(dest),
                callee,
                args,
            } => write!(f, "{} = call {}({})", dest, callee, fmt_args(args)),
            Instr::Call {
                dest: None,
                callee,
                args,
            } => write!(f, "call {}({})", callee, fmt_args(args)),
            Instr::Jump { target } => write!(f, "JUMP ({})", target),
            Instr::Branch { cond, target } => write!(f, "JUMP ({}) {}", target, cond),
            Instr::Return { value: Some(v) } => write!(f, "RETURN {}", v),
            Instr::Return { value: None } => f.write_str("RETURN"),
            Instr::Nop => f.write_str("EXIT"),
        }
    }
}

fn fmt_args(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The structural shape of an assignment's right-hand side. Used as the
/// value of the available-expression maps, so two computations compare by
/// operator and operands instead of by formatted text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rhs {
    Value(Value),
    Not(Value),
    Bin(BinOp, Value, Value),
}

impl Rhs {
    /// True if the shape reads the given name.
    pub fn mentions(&self, name: &Name) -> bool {
        let uses = |v: &Value| v.as_name() == Some(name);
        match self {
            Rhs::Value(v) | Rhs::Not(v) => uses(v),
            Rhs::Bin(_, l, r) => uses(l) || uses(r),
        }
    }

    /// The bare value of a plain copy shape.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Rhs::Value(v) => Some(v),
            _ => None,
        }
    }
}
impl Display for Rhs {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Rhs::Value(v) => v.fmt(f),
            Rhs::Not(v) => write!(f, "NOT {}", v),
            Rhs::Bin(op, l, r) => write!(f, "{} {} {}", l, op, r),
        }
    }
}

/// One function body as delivered by the front end: a flat instruction
/// listing with index-based jump targets, plus the name holding the
/// function's return value, if it has one.
#[derive(Debug, Clone)]
pub struct ValueCode {
    pub instrs: Vec<Instr<usize>>,
    pub return_value: Option<Name>,
}

impl ValueCode {
    pub fn new(instrs: Vec<Instr<usize>>) -> Self {
        Self {
            instrs,
            return_value: None,
        }
    }
}
