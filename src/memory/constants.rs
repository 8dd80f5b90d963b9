use super::{Address, Allocator, Error, Segment, Value};
use std::collections::HashMap;

use log::*;

/// The identity of a constant. Floats are keyed by their bit pattern so that
/// the key can be hashed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Key {
    Int(i64),
    Float(u64),
    Bool(bool),
    Str(String),
}

impl From<&Value> for Key {
    fn from(value: &Value) -> Self {
        match value {
            Value::Int(n) => Self::Int(*n),
            Value::Float(n) => Self::Float(n.to_bits()),
            Value::Bool(b) => Self::Bool(*b),
            Value::Str(s) => Self::Str(s.clone()),
        }
    }
}

/// Interns literal values into the constant segment. Equal literals of the same
/// type always share one address.
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    addresses: HashMap<Key, Address>,
    values: Vec<(Address, Value)>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the address of a literal, reserving a new constant cell the first
    /// time the literal is seen.
    pub fn intern(&mut self, value: Value, alloc: &mut Allocator) -> Result<Address, Error> {
        let key = Key::from(&value);
        if let Some(address) = self.addresses.get(&key) {
            return Ok(*address);
        }

        let address = alloc.allocate(Segment::Const, value.get_type())?;
        debug!("Interned constant {value:?} at {address}");
        self.addresses.insert(key, address);
        self.values.push((address, value));
        Ok(address)
    }

    /// Look up the address of a literal that was already interned.
    pub fn lookup(&self, value: &Value) -> Option<Address> {
        self.addresses.get(&Key::from(value)).copied()
    }

    /// Every constant, in the order it was interned.
    pub fn table(&self) -> &[(Address, Value)] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
