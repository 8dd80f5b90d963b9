use crate::ast::BinaryOp;
use crate::memory::Address;
use core::fmt;
use serde_derive::{Deserialize, Serialize};

/// The opcode of a quadruple.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    Assign,
    Print,
    Goto,
    GotoF,
    Era,
    Param,
    Gosub,
    Return,
    EndFunc,
    End,
}

impl Operator {
    /// Does this operator transfer control through its result field?
    pub fn is_jump(&self) -> bool {
        matches!(self, Self::Goto | Self::GotoF | Self::Gosub)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Assign => "=",
            Self::Print => "PRINT",
            Self::Goto => "GOTO",
            Self::GotoF => "GOTOF",
            Self::Era => "ERA",
            Self::Param => "PARAM",
            Self::Gosub => "GOSUB",
            Self::Return => "RETURN",
            Self::EndFunc => "ENDFUNC",
            Self::End => "END",
        }
    }
}

impl From<BinaryOp> for Operator {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => Self::Add,
            BinaryOp::Sub => Self::Sub,
            BinaryOp::Mul => Self::Mul,
            BinaryOp::Div => Self::Div,
            BinaryOp::Gt => Self::Gt,
            BinaryOp::Lt => Self::Lt,
            BinaryOp::Ge => Self::Ge,
            BinaryOp::Le => Self::Le,
            BinaryOp::Eq => Self::Eq,
            BinaryOp::Ne => Self::Ne,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// One field of a quadruple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Address(Address),
    /// A quadruple index (jump target).
    Label(usize),
    /// The name of a function, for `ERA` and `GOSUB`.
    Function(String),
}

impl Operand {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<usize> {
        match self {
            Self::Label(index) => Some(*index),
            _ => None,
        }
    }
}

impl From<Address> for Operand {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::Label(index) => write!(f, "{index}"),
            Self::Function(name) => write!(f, "{name}"),
        }
    }
}

/// A four-field instruction: `(op, arg1, arg2, result)`.
///
/// Jump targets live in the `result` field and are the only fields ever
/// written after the quadruple has been emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quadruple {
    pub op: Operator,
    pub arg1: Option<Operand>,
    pub arg2: Option<Operand>,
    pub result: Option<Operand>,
}

impl Quadruple {
    pub fn new(
        op: Operator,
        arg1: Option<Operand>,
        arg2: Option<Operand>,
        result: Option<Operand>,
    ) -> Self {
        Self {
            op,
            arg1,
            arg2,
            result,
        }
    }

    /// Is this a jump whose target has not been filled in yet?
    pub fn is_unpatched(&self) -> bool {
        self.op.is_jump() && self.result.is_none()
    }

    /// The jump target of this quadruple, if it has one.
    pub fn target(&self) -> Option<usize> {
        self.result.as_ref().and_then(Operand::as_label)
    }

    /// Backpatch the jump target of this quadruple.
    pub fn fill(&mut self, target: usize) {
        self.result = Some(Operand::Label(target));
    }
}

fn field(operand: &Option<Operand>) -> String {
    match operand {
        Some(operand) => operand.to_string(),
        None => String::from("null"),
    }
}

impl fmt::Display for Quadruple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.op,
            field(&self.arg1),
            field(&self.arg2),
            field(&self.result)
        )
    }
}
