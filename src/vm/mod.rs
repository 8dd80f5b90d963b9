//! # Virtual Machine Module
//!
//! This module contains the machine that executes compiled Patito programs.
//!
//! ### What is this machine?
//!
//! The machine walks an instruction pointer over a sequence of quadruples.
//! There are no registers: every instruction reads its operands from, and
//! writes its result to, virtual addresses.
//!
//! ### Where does data live?
//!
//! The segment of an address decides where its cell is stored:
//!
//! * constant addresses are read from constant memory, which is filled from
//!   the constant table when a program is loaded;
//! * global addresses live in global memory for the whole run;
//! * local and temporary addresses live in the activation record of the
//!   innermost active call. At the top level, outside of every call,
//!   temporaries live in a separate global-temporaries space, and local
//!   addresses are an error.
//!
//! ### How are functions called?
//!
//! `ERA` creates a pending activation record, `PARAM` writes arguments into it,
//! `GOSUB` activates it and jumps to the function, and `RETURN`/`ENDFUNC`
//! destroy it and resume after the `GOSUB`.
use crate::codegen::Operator;
use crate::memory::Address;
use core::fmt;

mod device;
pub use device::*;
mod machine;
pub use machine::*;
mod memory;
pub use memory::*;

/// What went wrong while executing an instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    /// A cell was read before anything was written to it.
    UninitializedAccess(Address),
    /// The operands of an instruction do not have the shape its opcode needs.
    UnknownInstruction(String),
    /// An address belongs to no segment, or to a segment that is not
    /// accessible here.
    AddressOutOfRange(Address),
    /// A call protocol instruction found no activation record to act on.
    MissingActivationFrame,
    DivisionByZero,
    ArithmeticOverflow,
    /// An operand held a value of the wrong type.
    InvalidOperand(String),
    /// The output device failed.
    Device(String),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UninitializedAccess(address) => {
                write!(f, "read of uninitialized address {address}")
            }
            Self::UnknownInstruction(message) => write!(f, "unknown instruction: {message}"),
            Self::AddressOutOfRange(address) => write!(f, "address {address} is out of range"),
            Self::MissingActivationFrame => write!(f, "no activation record"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ArithmeticOverflow => write!(f, "arithmetic overflow"),
            Self::InvalidOperand(message) => write!(f, "invalid operand: {message}"),
            Self::Device(message) => write!(f, "device error: {message}"),
        }
    }
}

/// A fatal runtime error, with the instruction that caused it.
#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub ip: usize,
    pub op: Operator,
    pub fault: Fault,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "runtime error at quadruple {} ({}): {}",
            self.ip, self.op, self.fault
        )
    }
}
