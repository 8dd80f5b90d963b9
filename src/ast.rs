//! # Abstract Syntax Tree
//!
//! The tree consumed by the code generator. The node variants mirror the rules
//! of the Patito grammar: a program holds variable groups, function
//! declarations and the `main` body, and expressions are layered in the three
//! precedence tiers of the grammar (relational over additive over
//! multiplicative) so that the generator can reduce each tier as it finishes.
use crate::semantic::Type;
use core::fmt;

/// A complete Patito program.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub name: String,
    pub globals: Vec<VarGroup>,
    pub functions: Vec<Function>,
    pub body: Vec<Statement>,
}

impl Program {
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            globals: vec![],
            functions: vec![],
            body: vec![],
        }
    }

    pub fn with_globals(mut self, globals: Vec<VarGroup>) -> Self {
        self.globals = globals;
        self
    }

    pub fn with_functions(mut self, functions: Vec<Function>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_body(mut self, body: Vec<Statement>) -> Self {
        self.body = body;
        self
    }
}

/// `var a, b, c: int;`
#[derive(Clone, Debug, PartialEq)]
pub struct VarGroup {
    pub names: Vec<String>,
    pub ty: Type,
}

impl VarGroup {
    pub fn new(names: &[&str], ty: Type) -> Self {
        Self {
            names: names.iter().map(|name| name.to_string()).collect(),
            ty,
        }
    }
}

/// A formal parameter of a function.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl ToString, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// A function declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub locals: Vec<VarGroup>,
    pub body: Vec<Statement>,
}

impl Function {
    pub fn new(name: impl ToString, return_type: Type, params: Vec<Param>) -> Self {
        Self {
            name: name.to_string(),
            return_type,
            params,
            locals: vec![],
            body: vec![],
        }
    }

    pub fn with_locals(mut self, locals: Vec<VarGroup>) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_body(mut self, body: Vec<Statement>) -> Self {
        self.body = body;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `target = value;`
    Assign { target: String, value: Expr },
    /// `print(a, "b", c);`
    Print(Vec<PrintArg>),
    /// `if (cond) { ... } else { ... };`
    If {
        cond: Expr,
        then: Vec<Statement>,
        otherwise: Option<Vec<Statement>>,
    },
    /// `while (cond) do { ... };`
    While { cond: Expr, body: Vec<Statement> },
    /// A call whose result, if any, is discarded.
    Call(Call),
    /// `return;` or `return expr;`
    Return(Option<Expr>),
    /// A nested `{ ... }` block.
    Block(Vec<Statement>),
}

impl Statement {
    pub fn assign(target: impl ToString, value: impl Into<Expr>) -> Self {
        Self::Assign {
            target: target.to_string(),
            value: value.into(),
        }
    }

    pub fn print(args: Vec<PrintArg>) -> Self {
        Self::Print(args)
    }

    pub fn if_then(cond: impl Into<Expr>, then: Vec<Statement>) -> Self {
        Self::If {
            cond: cond.into(),
            then,
            otherwise: None,
        }
    }

    pub fn if_else(cond: impl Into<Expr>, then: Vec<Statement>, otherwise: Vec<Statement>) -> Self {
        Self::If {
            cond: cond.into(),
            then,
            otherwise: Some(otherwise),
        }
    }

    pub fn while_loop(cond: impl Into<Expr>, body: Vec<Statement>) -> Self {
        Self::While {
            cond: cond.into(),
            body,
        }
    }

    pub fn call(name: impl ToString, args: Vec<Expr>) -> Self {
        Self::Call(Call::new(name, args))
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::Return(value)
    }
}

/// One argument of a `print` statement.
#[derive(Clone, Debug, PartialEq)]
pub enum PrintArg {
    Str(String),
    Expr(Expr),
}

impl From<Expr> for PrintArg {
    fn from(expr: Expr) -> Self {
        Self::Expr(expr)
    }
}

impl From<Factor> for PrintArg {
    fn from(factor: Factor) -> Self {
        Self::Expr(factor.into())
    }
}

/// A call to a named function.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Expr>,
}

impl Call {
    pub fn new(name: impl ToString, args: Vec<Expr>) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

/// The precedence tier an operator belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Precedence {
    Multiplicative,
    Additive,
    Relational,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
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
}

impl BinaryOp {
    pub fn precedence(&self) -> Precedence {
        match self {
            Self::Mul | Self::Div => Precedence::Multiplicative,
            Self::Add | Self::Sub => Precedence::Additive,
            _ => Precedence::Relational,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
            Self::Gt => write!(f, ">"),
            Self::Lt => write!(f, "<"),
            Self::Ge => write!(f, ">="),
            Self::Le => write!(f, "<="),
            Self::Eq => write!(f, "=="),
            Self::Ne => write!(f, "!="),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Neg,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Plus => write!(f, "+"),
            Self::Neg => write!(f, "-"),
        }
    }
}

/// The relational tier: `exp [relop exp]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub lhs: Exp,
    pub rel: Option<(BinaryOp, Exp)>,
}

impl Expr {
    pub fn compare(lhs: impl Into<Exp>, op: BinaryOp, rhs: impl Into<Exp>) -> Self {
        Self {
            lhs: lhs.into(),
            rel: Some((op, rhs.into())),
        }
    }
}

/// The additive tier: `term (("+" | "-") term)*`.
#[derive(Clone, Debug, PartialEq)]
pub struct Exp {
    pub head: Term,
    pub tail: Vec<(BinaryOp, Term)>,
}

impl Exp {
    pub fn then(mut self, op: BinaryOp, term: impl Into<Term>) -> Self {
        self.tail.push((op, term.into()));
        self
    }
}

/// The multiplicative tier: `factor (("*" | "/") factor)*`.
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub head: Factor,
    pub tail: Vec<(BinaryOp, Factor)>,
}

impl Term {
    pub fn then(mut self, op: BinaryOp, factor: impl Into<Factor>) -> Self {
        self.tail.push((op, factor.into()));
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Factor {
    /// A parenthesized expression.
    Group(Box<Expr>),
    Call(Call),
    Var(String),
    Int(i64),
    Float(f64),
    Str(String),
    Unary(UnaryOp, Box<Factor>),
}

impl Factor {
    pub fn var(name: impl ToString) -> Self {
        Self::Var(name.to_string())
    }

    pub fn group(expr: impl Into<Expr>) -> Self {
        Self::Group(Box::new(expr.into()))
    }

    pub fn call(name: impl ToString, args: Vec<Expr>) -> Self {
        Self::Call(Call::new(name, args))
    }

    pub fn neg(factor: impl Into<Factor>) -> Self {
        Self::Unary(UnaryOp::Neg, Box::new(factor.into()))
    }
}

impl From<i64> for Factor {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for Factor {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<Factor> for Term {
    fn from(head: Factor) -> Self {
        Self { head, tail: vec![] }
    }
}

impl From<Term> for Exp {
    fn from(head: Term) -> Self {
        Self { head, tail: vec![] }
    }
}

impl From<Factor> for Exp {
    fn from(factor: Factor) -> Self {
        Term::from(factor).into()
    }
}

impl From<Exp> for Expr {
    fn from(lhs: Exp) -> Self {
        Self { lhs, rel: None }
    }
}

impl From<Term> for Expr {
    fn from(term: Term) -> Self {
        Exp::from(term).into()
    }
}

impl From<Factor> for Expr {
    fn from(factor: Factor) -> Self {
        Exp::from(factor).into()
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Factor::Int(n).into()
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Factor::Float(n).into()
    }
}
