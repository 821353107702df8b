//! Reading three-address listings from text.
//!
//! The input format is line oriented. `globals` declares global variable
//! names, `func name(a, b)` opens a function, and each following line is a
//! label (`L:`) or one statement:
//!
//! ```text
//! globals counter
//!
//! func main()
//!     x = 1
//! top:
//!     x = x ADD 1
//!     t = x LESS 10
//!     if t goto top
//!     call printInt(x)
//!     return
//! ```
//!
//! Blank lines and `#` comments are skipped. Labels resolve to instruction
//! indices; a label at the end of a function gets a synthetic no-op to
//! land on.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::cfg::Graph;
use crate::ir::{BinOp, Instr, Name, Value, ValueCode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("line {0}: cannot parse statement '{1}'")]
    BadStatement(usize, String),
    #[error("line {0}: malformed function header '{1}'")]
    BadHeader(usize, String),
    #[error("line {0}: statement outside a function")]
    OutsideFunction(usize),
    #[error("line {0}: unknown label '{1}'")]
    UnknownLabel(usize, String),
    #[error("line {0}: duplicate label '{1}'")]
    DuplicateLabel(usize, String),
}

/// A parsed program, ready to be turned into block graphs.
#[derive(Debug)]
pub struct Program {
    pub globals: BTreeSet<Name>,
    pub functions: Vec<Function>,
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Name>,
    pub code: ValueCode,
}

impl Program {
    pub fn into_graphs(self) -> Vec<Graph> {
        let globals = self.globals;
        self.functions
            .into_iter()
            .map(|f| Graph::build(f.name, f.params, f.code, globals.clone()))
            .collect()
    }
}

pub fn parse(source: &str) -> Result<Program, LoadError> {
    let mut globals = BTreeSet::new();
    let mut functions = vec![];
    let mut current: Option<OpenFunction> = None;

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = match raw.find('#') {
            Some(at) => raw[..at].trim(),
            None => raw.trim(),
        };
        if text.is_empty() {
            continue;
        }

        let global_decl = text.strip_prefix("globals ").filter(|_| current.is_none());
        if let Some(names) = global_decl {
            globals.extend(names.split_whitespace().map(Name::from));
        } else if let Some(header) = text.strip_prefix("func ") {
            if let Some(open) = current.take() {
                functions.push(open.close()?);
            }
            current = Some(OpenFunction::begin(header, line)?);
        } else {
            let open = current.as_mut().ok_or(LoadError::OutsideFunction(line))?;
            if let Some(label) = text.strip_suffix(':') {
                open.label(label, line)?;
            } else {
                open.statement(text, line)?;
            }
        }
    }
    if let Some(open) = current.take() {
        functions.push(open.close()?);
    }

    Ok(Program { globals, functions })
}

/// A function being parsed: statements target labels by name until the
/// whole body is known.
struct OpenFunction {
    name: String,
    params: Vec<Name>,
    instrs: Vec<(Instr<String>, usize)>,
    labels: BTreeMap<String, usize>,
}

impl OpenFunction {
    fn begin(header: &str, line: usize) -> Result<Self, LoadError> {
        let bad = || LoadError::BadHeader(line, header.to_string());
        let open = header.find('(').ok_or_else(bad)?;
        let close = header.rfind(')').filter(|c| *c > open).ok_or_else(bad)?;
        let name = header[..open].trim();
        if name.is_empty() || !header[close + 1..].trim().is_empty() {
            return Err(bad());
        }
        let params = split_list(&header[open + 1..close]).map(Name::from).collect();
        Ok(Self {
            name: name.to_string(),
            params,
            instrs: vec![],
            labels: BTreeMap::new(),
        })
    }

    fn label(&mut self, label: &str, line: usize) -> Result<(), LoadError> {
        let previous = self.labels.insert(label.to_string(), self.instrs.len());
        if previous.is_some() {
            return Err(LoadError::DuplicateLabel(line, label.to_string()));
        }
        Ok(())
    }

    fn statement(&mut self, text: &str, line: usize) -> Result<(), LoadError> {
        let instr = parse_statement(text)
            .ok_or_else(|| LoadError::BadStatement(line, text.to_string()))?;
        self.instrs.push((instr, line));
        Ok(())
    }

    fn close(mut self) -> Result<Function, LoadError> {
        if self.labels.values().any(|&i| i == self.instrs.len()) {
            self.instrs.push((Instr::Nop, 0));
        }

        let mut resolved = Vec::with_capacity(self.instrs.len());
        for (instr, line) in self.instrs {
            let target = match instr.jump_target() {
                Some(label) => match self.labels.get(label) {
                    Some(&index) => index,
                    None => return Err(LoadError::UnknownLabel(line, label.clone())),
                },
                None => 0,
            };
            resolved.push(instr.map_target(|_| target));
        }

        Ok(Function {
            name: self.name,
            params: self.params,
            code: ValueCode::new(resolved),
        })
    }
}

fn parse_statement(text: &str) -> Option<Instr<String>> {
    if text == "nop" {
        return Some(Instr::Nop);
    }
    if let Some(label) = text.strip_prefix("goto ") {
        return Some(Instr::Jump {
            target: label.trim().to_string(),
        });
    }
    if let Some(rest) = text.strip_prefix("if ") {
        let (cond, label) = rest.split_once(" goto ")?;
        return Some(Instr::Branch {
            cond: parse_value(cond.trim())?,
            target: label.trim().to_string(),
        });
    }
    if text == "return" {
        return Some(Instr::Return { value: None });
    }
    if let Some(value) = text.strip_prefix("return ") {
        return Some(Instr::Return {
            value: Some(parse_value(value.trim())?),
        });
    }
    if let Some(call) = text.strip_prefix("call ") {
        let (callee, args) = parse_call(call)?;
        return Some(Instr::Call {
            dest: None,
            callee,
            args,
        });
    }
    let (dest, rhs) = text.split_once(" = ")?;
    let dest = parse_name(dest.trim())?;
    let rhs = rhs.trim();
    if let Some(call) = rhs.strip_prefix("call ") {
        let (callee, args) = parse_call(call)?;
        return Some(Instr::Call {
            dest: Some(dest),
            callee,
            args,
        });
    }
    if let Some(value) = rhs.strip_prefix("NOT ") {
        return Some(Instr::Not {
            dest,
            value: parse_value(value.trim())?,
        });
    }
    let tokens: Vec<&str> = rhs.split_whitespace().collect();
    match tokens.as_slice() {
        [value] => Some(Instr::Copy {
            dest,
            value: parse_value(value)?,
        }),
        [left, op, right] => Some(Instr::Bin {
            dest,
            op: op.parse().ok()?,
            left: parse_value(left)?,
            right: parse_value(right)?,
        }),
        _ => None,
    }
}

fn parse_call(text: &str) -> Option<(String, Vec<Value>)> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close < open || !text[close + 1..].trim().is_empty() {
        return None;
    }
    let callee = text[..open].trim();
    if callee.is_empty() {
        return None;
    }
    let args = split_list(&text[open + 1..close])
        .map(parse_value)
        .collect::<Option<Vec<_>>>()?;
    Some((callee.to_string(), args))
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_value(token: &str) -> Option<Value> {
    match token {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => match token.parse::<i32>() {
            Ok(int) => Some(Value::Int(int)),
            Err(_) => parse_name(token).map(Value::Name),
        },
    }
}

fn parse_name(token: &str) -> Option<Name> {
    let mut chars = token.chars();
    let first = chars.next()?;
    if (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
    {
        Some(Name::from(token))
    } else {
        None
    }
}
