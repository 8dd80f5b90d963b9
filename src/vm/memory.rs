use super::Fault;
use crate::memory::{Address, Value};
use std::collections::{BTreeMap, HashMap};

/// A sparse set of memory cells, keyed by address.
#[derive(Clone, Debug, Default)]
pub struct MemorySpace {
    cells: HashMap<Address, Value>,
}

impl MemorySpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a cell. Reading a cell that was never written is a fault.
    pub fn get(&self, address: Address) -> Result<&Value, Fault> {
        self.cells
            .get(&address)
            .ok_or(Fault::UninitializedAccess(address))
    }

    pub fn set(&mut self, address: Address, value: Value) {
        self.cells.insert(address, value);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy every cell into `into`.
    pub(super) fn dump(&self, into: &mut BTreeMap<Address, Value>) {
        into.extend(self.cells.iter().map(|(k, v)| (*k, v.clone())));
    }
}

/// The storage of one function invocation.
#[derive(Clone, Debug)]
pub struct ActivationRecord {
    pub function: String,
    pub locals: MemorySpace,
    pub temps: MemorySpace,
    /// Where to resume once this call returns. Set by `GOSUB`.
    pub return_ip: Option<usize>,
}

impl ActivationRecord {
    pub fn new(function: impl ToString) -> Self {
        Self {
            function: function.to_string(),
            locals: MemorySpace::new(),
            temps: MemorySpace::new(),
            return_ip: None,
        }
    }
}
