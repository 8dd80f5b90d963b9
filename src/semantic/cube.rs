//! # The Semantic Cube
//!
//! The type oracle of the compiler. These are pure lookup tables: given an
//! operator and the types of its operands, they answer with the type of the
//! result, or `None` when the combination is undefined. Callers must treat
//! `None` as a type mismatch.
use super::Type;
use crate::ast::{BinaryOp, UnaryOp};
use lazy_static::lazy_static;
use maplit::{hashmap, hashset};
use std::collections::{HashMap, HashSet};

lazy_static! {
    /// `(left, right) -> result` for every arithmetic operator except division.
    static ref ARITHMETIC: HashMap<(Type, Type), Type> = hashmap! {
        (Type::Int, Type::Int) => Type::Int,
        (Type::Int, Type::Float) => Type::Float,
        (Type::Float, Type::Int) => Type::Float,
        (Type::Float, Type::Float) => Type::Float,
    };

    /// Division always promotes to float.
    static ref DIVISION: HashMap<(Type, Type), Type> = hashmap! {
        (Type::Int, Type::Int) => Type::Float,
        (Type::Int, Type::Float) => Type::Float,
        (Type::Float, Type::Int) => Type::Float,
        (Type::Float, Type::Float) => Type::Float,
    };

    /// Relational operators compare numbers and produce a bool.
    static ref RELATIONAL: HashMap<(Type, Type), Type> = hashmap! {
        (Type::Int, Type::Int) => Type::Bool,
        (Type::Int, Type::Float) => Type::Bool,
        (Type::Float, Type::Int) => Type::Bool,
        (Type::Float, Type::Float) => Type::Bool,
    };

    /// Unary `+` and `-` keep the type of their numeric operand.
    static ref SIGN: HashMap<Type, Type> = hashmap! {
        Type::Int => Type::Int,
        Type::Float => Type::Float,
    };

    /// `(destination, source)` pairs that may be assigned.
    static ref ASSIGNABLE: HashSet<(Type, Type)> = hashset! {
        (Type::Int, Type::Int),
        (Type::Float, Type::Float),
        (Type::Float, Type::Int),
        (Type::Bool, Type::Bool),
        (Type::String, Type::String),
    };
}

/// The type produced by `left op right`, or `None` if the combination is undefined.
pub fn binary_result_type(op: BinaryOp, left: Type, right: Type) -> Option<Type> {
    let table: &HashMap<(Type, Type), Type> = match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => &*ARITHMETIC,
        BinaryOp::Div => &*DIVISION,
        BinaryOp::Gt
        | BinaryOp::Lt
        | BinaryOp::Ge
        | BinaryOp::Le
        | BinaryOp::Eq
        | BinaryOp::Ne => &*RELATIONAL,
    };
    table.get(&(left, right)).copied()
}

/// The type produced by `op operand`, or `None` if the combination is undefined.
pub fn unary_result_type(op: UnaryOp, operand: Type) -> Option<Type> {
    match op {
        UnaryOp::Plus | UnaryOp::Neg => SIGN.get(&operand).copied(),
    }
}

/// Can a value of type `src` be stored in a cell of type `dest`?
///
/// Identical types are always assignable, and an `int` widens into a `float`.
/// Narrowing a `float` into an `int` is rejected.
pub fn assignable(dest: Type, src: Type) -> bool {
    ASSIGNABLE.contains(&(dest, src))
}
