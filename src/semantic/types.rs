//! # Types
//!
//! The five types of the Patito language. Only `int` and `float` take part in
//! arithmetic; `bool` is produced by relational operators, `string` by literals,
//! and `void` is only valid as the return type of a function.
use core::fmt;
use serde_derive::{Deserialize, Serialize};

/// The representation of a type in the Patito type system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    /// The return type of a procedure that produces no value.
    Void,
}

impl Type {
    /// Every type that can occupy a storage cell, in address-bucket order.
    pub const STORABLE: [Type; 4] = [Type::Int, Type::Float, Type::Bool, Type::String];

    /// Is this type one of the numeric types?
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// The index of this type's bucket inside a segment, if the type can be stored.
    pub fn bucket(&self) -> Option<usize> {
        Self::STORABLE.iter().position(|t| t == self)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::String => write!(f, "string"),
            Self::Void => write!(f, "void"),
        }
    }
}
