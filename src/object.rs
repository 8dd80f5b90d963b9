//! # Object Code
//!
//! The executable image consumed by the virtual machine: the quadruple sequence
//! plus the constant table used to pre-populate constant memory. Object code
//! can be written to and read back from JSON, so a compiled program can be run
//! later without its source.
use crate::codegen::Quadruple;
use crate::memory::{Address, Value};
use serde_derive::{Deserialize, Serialize};

/// The file extension used for object files.
pub const OBJECT_EXTENSION: &str = "patobj";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectCode {
    pub quads: Vec<Quadruple>,
    pub constants: Vec<(Address, Value)>,
}

impl ObjectCode {
    pub fn new(quads: Vec<Quadruple>, constants: Vec<(Address, Value)>) -> Self {
        Self { quads, constants }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
