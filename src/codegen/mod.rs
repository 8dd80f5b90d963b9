//! # Code Generation Module
//!
//! This module lowers a checked AST into a flat sequence of quadruples for the
//! virtual machine. The [`Generator`] performs semantic checking and emission in
//! one walk, consulting the function directory and the semantic cube as it
//! goes, and produces a [`CompiledProgram`].
use crate::{
    ast::Program,
    memory::ConstantPool,
    object::ObjectCode,
    semantic::{Error, FunctionDirectory},
};
use core::fmt;

mod generator;
pub use generator::*;
mod quadruple;
pub use quadruple::*;

/// Compile a program into quadruples.
pub fn compile(program: &Program) -> Result<CompiledProgram, Error> {
    Generator::new().translate(program)
}

/// Everything produced by a successful compilation.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    pub directory: FunctionDirectory,
    pub quads: Vec<Quadruple>,
    pub constants: ConstantPool,
}

impl CompiledProgram {
    /// The executable image of this program.
    pub fn object_code(&self) -> ObjectCode {
        ObjectCode::new(self.quads.clone(), self.constants.table().to_vec())
    }

    /// The operators of every quadruple, in order.
    pub fn operators(&self) -> Vec<Operator> {
        self.quads.iter().map(|quad| quad.op).collect()
    }
}

impl fmt::Display for CompiledProgram {
    /// The numbered, tab-separated quadruple listing.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, quad) in self.quads.iter().enumerate() {
            writeln!(f, "{i}\t{quad}")?;
        }
        Ok(())
    }
}
