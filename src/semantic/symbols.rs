//! # Function Directory
//!
//! The two-level scope model of Patito: one global variable table, plus one
//! table per declared function that holds both its parameters and its locals.
//! Every declaration is given its permanent address the moment it is made.
use super::{Error, Type};
use crate::memory::{Address, Allocator, Segment};
use core::fmt;
use std::collections::{BTreeMap, HashMap};

use log::*;

/// The storage class of a declared variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VarKind {
    Global,
    Local,
    Param,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Local => write!(f, "local"),
            Self::Param => write!(f, "param"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableSymbol {
    pub name: String,
    pub ty: Type,
    pub kind: VarKind,
    pub address: Address,
}

/// A table of variables, kept in declaration order.
#[derive(Clone, Debug, Default)]
pub struct VarTable {
    symbols: Vec<VariableSymbol>,
    index: HashMap<String, usize>,
}

impl VarTable {
    pub fn get(&self, name: &str) -> Option<&VariableSymbol> {
        self.index.get(name).map(|i| &self.symbols[*i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableSymbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn insert(&mut self, symbol: VariableSymbol) {
        self.index.insert(symbol.name.clone(), self.symbols.len());
        self.symbols.push(symbol);
    }
}

#[derive(Clone, Debug)]
pub struct FunctionSymbol {
    pub name: String,
    pub return_type: Type,
    /// The formal parameters, in order. Each is also present in `vars`.
    pub params: Vec<VariableSymbol>,
    /// Parameters and locals.
    pub vars: VarTable,
    /// The index of the first quadruple of the body, once it is known.
    pub start: Option<usize>,
    /// Where a non-void function leaves its result.
    pub return_address: Option<Address>,
    /// How many local cells of each type a call to this function uses.
    pub locals: BTreeMap<Type, usize>,
    /// How many temporaries of each type the body uses.
    pub temps: BTreeMap<Type, usize>,
}

impl FunctionSymbol {
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty).collect()
    }

    fn scope(&self) -> String {
        format!("function `{}`", self.name)
    }
}

/// The root owner of every symbol declared in a compilation.
#[derive(Clone, Debug, Default)]
pub struct FunctionDirectory {
    globals: VarTable,
    functions: Vec<FunctionSymbol>,
    index: HashMap<String, usize>,
}

const GLOBAL_SCOPE: &str = "the global scope";

impl FunctionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn globals(&self) -> &VarTable {
        &self.globals
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionSymbol> {
        self.functions.iter()
    }

    pub fn function(&self, name: &str) -> Result<&FunctionSymbol, Error> {
        self.index
            .get(name)
            .map(|i| &self.functions[*i])
            .ok_or_else(|| Error::UndefinedFunction(name.to_string()))
    }

    fn function_mut(&mut self, name: &str) -> Result<&mut FunctionSymbol, Error> {
        match self.index.get(name) {
            Some(i) => Ok(&mut self.functions[*i]),
            None => Err(Error::UndefinedFunction(name.to_string())),
        }
    }

    pub fn declare_global(
        &mut self,
        name: &str,
        ty: Type,
        alloc: &mut Allocator,
    ) -> Result<Address, Error> {
        if self.globals.contains(name) {
            return Err(Error::DuplicateSymbol {
                name: name.to_string(),
                scope: GLOBAL_SCOPE.to_string(),
            });
        }
        if ty == Type::Void {
            return Err(Error::mismatch(format!(
                "variable `{name}` cannot have type void"
            )));
        }

        let address = alloc.allocate(Segment::Global, ty)?;
        debug!("Declared global {name}: {ty} at {address}");
        self.globals.insert(VariableSymbol {
            name: name.to_string(),
            ty,
            kind: VarKind::Global,
            address,
        });
        Ok(address)
    }

    /// Register a function signature. Non-void functions get a global cell
    /// reserved for their return value.
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: Type,
        alloc: &mut Allocator,
    ) -> Result<(), Error> {
        if self.index.contains_key(name) {
            return Err(Error::DuplicateFunction(name.to_string()));
        }

        let return_address = match return_type {
            Type::Void => None,
            ty => Some(alloc.allocate(Segment::Global, ty)?),
        };
        debug!("Declared function {name} -> {return_type} (return value at {return_address:?})");

        self.index.insert(name.to_string(), self.functions.len());
        self.functions.push(FunctionSymbol {
            name: name.to_string(),
            return_type,
            params: vec![],
            vars: VarTable::default(),
            start: None,
            return_address,
            locals: BTreeMap::new(),
            temps: BTreeMap::new(),
        });
        Ok(())
    }

    pub fn declare_param(
        &mut self,
        function: &str,
        name: &str,
        ty: Type,
        alloc: &mut Allocator,
    ) -> Result<Address, Error> {
        let symbol = self.declare_in_function(function, name, ty, VarKind::Param, alloc)?;
        let address = symbol.address;
        self.function_mut(function)?.params.push(symbol);
        Ok(address)
    }

    pub fn declare_local(
        &mut self,
        function: &str,
        name: &str,
        ty: Type,
        alloc: &mut Allocator,
    ) -> Result<Address, Error> {
        self.declare_in_function(function, name, ty, VarKind::Local, alloc)
            .map(|symbol| symbol.address)
    }

    fn declare_in_function(
        &mut self,
        function: &str,
        name: &str,
        ty: Type,
        kind: VarKind,
        alloc: &mut Allocator,
    ) -> Result<VariableSymbol, Error> {
        let func = self.function_mut(function)?;
        if func.vars.contains(name) {
            return Err(Error::DuplicateSymbol {
                name: name.to_string(),
                scope: func.scope(),
            });
        }
        if ty == Type::Void {
            return Err(Error::mismatch(format!(
                "{kind} `{name}` cannot have type void"
            )));
        }

        let address = alloc.allocate(Segment::Local, ty)?;
        debug!("Declared {kind} {name}: {ty} at {address} in {function}");
        let symbol = VariableSymbol {
            name: name.to_string(),
            ty,
            kind,
            address,
        };
        func.vars.insert(symbol.clone());
        *func.locals.entry(ty).or_default() += 1;
        Ok(symbol)
    }

    /// Resolve a variable, looking in the current function first and then in
    /// the global table. With no current function only globals are visible.
    pub fn resolve(&self, name: &str, current: Option<&str>) -> Result<&VariableSymbol, Error> {
        if let Some(function) = current {
            if let Some(symbol) = self.function(function)?.vars.get(name) {
                return Ok(symbol);
            }
        }

        self.globals.get(name).ok_or_else(|| Error::UndefinedSymbol {
            name: name.to_string(),
            scope: match current {
                Some(function) => format!("function `{function}`"),
                None => GLOBAL_SCOPE.to_string(),
            },
        })
    }

    /// The return type and parameter types of a function.
    pub fn signature(&self, name: &str) -> Result<(Type, Vec<Type>), Error> {
        let func = self.function(name)?;
        Ok((func.return_type, func.param_types()))
    }

    pub fn set_start(&mut self, name: &str, start: usize) -> Result<(), Error> {
        debug!("Function {name} starts at quadruple {start}");
        self.function_mut(name)?.start = Some(start);
        Ok(())
    }

    /// Record that the body of `function` uses one more temporary of type `ty`.
    pub fn count_temp(&mut self, function: &str, ty: Type) -> Result<(), Error> {
        *self.function_mut(function)?.temps.entry(ty).or_default() += 1;
        Ok(())
    }
}

fn write_counts(f: &mut fmt::Formatter, label: &str, counts: &BTreeMap<Type, usize>) -> fmt::Result {
    write!(f, "    {label}:")?;
    if counts.is_empty() {
        write!(f, " none")?;
    }
    for (ty, n) in counts {
        write!(f, " {ty}={n}")?;
    }
    writeln!(f)
}

impl fmt::Display for FunctionDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "globals:")?;
        for symbol in self.globals.iter() {
            writeln!(f, "  {}\t{}\t{}", symbol.name, symbol.ty, symbol.address)?;
        }

        for func in &self.functions {
            write!(f, "function {} -> {}", func.name, func.return_type)?;
            if let Some(start) = func.start {
                write!(f, " @ {start}")?;
            }
            if let Some(address) = func.return_address {
                write!(f, " (returns through {address})")?;
            }
            writeln!(f)?;
            for symbol in func.vars.iter() {
                writeln!(
                    f,
                    "  {}\t{}\t{}\t{}",
                    symbol.name, symbol.ty, symbol.kind, symbol.address
                )?;
            }
            write_counts(f, "locals", &func.locals)?;
            write_counts(f, "temps", &func.temps)?;
        }
        Ok(())
    }
}
