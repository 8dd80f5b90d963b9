//! # Semantic Module
//!
//! This module holds everything the compiler knows about the *meaning* of a
//! program, independent of how it is emitted: the types of the language, the
//! semantic cube that decides which operator/type combinations are legal, and
//! the function directory that records every declared symbol and its address.
//!
//! It also defines the compile-time error taxonomy. Translation stops at the
//! first error; no diagnostics are accumulated.
use crate::memory;
use core::fmt;

mod cube;
pub use cube::*;
mod symbols;
pub use symbols::*;
mod types;
pub use types::*;

/// An error raised while checking or translating a program.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A variable or parameter was declared twice in one scope.
    DuplicateSymbol { name: String, scope: String },
    /// A function was declared twice.
    DuplicateFunction(String),
    /// A name could not be resolved in the current scope or the global scope.
    UndefinedSymbol { name: String, scope: String },
    /// A call names a function that was never declared.
    UndefinedFunction(String),
    /// An illegal combination of types for an operator, assignment, argument,
    /// condition, or return.
    TypeMismatch(String),
    /// A call passed the wrong number of arguments.
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },
    /// A segment/type bucket of the address space ran out of cells.
    AddressCapacity(memory::Error),
    /// A `return` statement appeared in the `main` body.
    ReturnOutsideFunction,
    /// The generator broke one of its own invariants.
    Internal(String),
}

impl Error {
    pub(crate) fn mismatch(message: impl ToString) -> Self {
        Self::TypeMismatch(message.to_string())
    }

    pub(crate) fn internal(message: impl ToString) -> Self {
        Self::Internal(message.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DuplicateSymbol { name, scope } => {
                write!(f, "variable `{name}` is declared more than once in {scope}")
            }
            Self::DuplicateFunction(name) => {
                write!(f, "function `{name}` is declared more than once")
            }
            Self::UndefinedSymbol { name, scope } => {
                write!(f, "variable `{name}` is not defined in {scope}")
            }
            Self::UndefinedFunction(name) => write!(f, "function `{name}` is not defined"),
            Self::TypeMismatch(message) => write!(f, "type mismatch: {message}"),
            Self::ArityMismatch {
                function,
                expected,
                found,
            } => write!(
                f,
                "function `{function}` expects {expected} argument(s), but {found} were given"
            ),
            Self::AddressCapacity(e) => write!(f, "{e}"),
            Self::ReturnOutsideFunction => write!(f, "`return` is only allowed inside a function"),
            Self::Internal(message) => write!(f, "internal compiler error: {message}"),
        }
    }
}

impl From<memory::Error> for Error {
    fn from(e: memory::Error) -> Self {
        Self::AddressCapacity(e)
    }
}
