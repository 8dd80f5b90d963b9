//! # The Patito Compiler Core
//!
//! This crate implements the semantic analysis, code generation and execution
//! core for Patito, a small statically-typed imperative teaching language.
//!
//! ```text
//! program demo;
//! var x: int;
//!
//! int double(a: int) {
//!     return a * 2;
//! }
//!
//! main {
//!     x = double(5);
//!     print("x is", x);
//! }
//! end
//! ```
//!
//! ## Index
//!
//! 1. [The Abstract Syntax Tree](./ast/index.html)
//! 2. [The Frontend](./frontend/index.html)
//! 3. [Semantic Analysis](./semantic/index.html)
//! 4. [The Address Space](./memory/index.html)
//! 5. [Code Generation](./codegen/index.html)
//! 6. [The Virtual Machine](./vm/index.html)
//!
//! ## Stages
//!
//! 1. Source text is parsed into an AST by the [`frontend`].
//! 2. The [`codegen::Generator`] walks the AST. As it goes, it declares every
//!    symbol in the [`semantic::FunctionDirectory`], checks every operation
//!    against the semantic cube, hands out addresses from the
//!    [`memory::Allocator`], and emits quadruples.
//! 3. The quadruples and the constant table form the [`object::ObjectCode`].
//! 4. The [`vm::VirtualMachine`] executes the object code, writing every
//!    printed value to a [`vm::Device`].
//!
//! Every stage stops at its first error.
use core::fmt;

pub mod ast;
pub mod codegen;
pub mod frontend;
pub mod memory;
pub mod object;
pub mod semantic;
pub mod vm;

/// An error from any stage of the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Syntax(frontend::SyntaxError),
    Compile(semantic::Error),
    Runtime(vm::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Syntax(e) => write!(f, "{e}"),
            Self::Compile(e) => write!(f, "compile error: {e}"),
            Self::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl From<frontend::SyntaxError> for Error {
    fn from(e: frontend::SyntaxError) -> Self {
        Self::Syntax(e)
    }
}

impl From<semantic::Error> for Error {
    fn from(e: semantic::Error) -> Self {
        Self::Compile(e)
    }
}

impl From<vm::Error> for Error {
    fn from(e: vm::Error) -> Self {
        Self::Runtime(e)
    }
}

/// Parse and compile a source program.
pub fn compile_source(code: &str) -> Result<codegen::CompiledProgram, Error> {
    let program = frontend::parse(code)?;
    Ok(codegen::compile(&program)?)
}

/// Parse, compile and run a source program on a device, handing the device
/// back once the program has finished.
pub fn run_source<T: vm::Device>(code: &str, device: T) -> Result<T, Error> {
    let compiled = compile_source(code)?;
    Ok(vm::VirtualMachine::new(device).execute(&compiled.object_code())?)
}
