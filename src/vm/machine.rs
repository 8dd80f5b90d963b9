use super::{ActivationRecord, Device, Error, Fault, MemorySpace};
use crate::codegen::{Operand, Operator, Quadruple};
use crate::memory::{Address, Segment, Value};
use crate::object::ObjectCode;
use std::{collections::BTreeMap, rc::Rc};

use log::*;

/// The machine which runs compiled programs.
pub struct VirtualMachine<T>
where
    T: Device,
{
    /// The machine's output device.
    device: T,
    /// The loaded program.
    code: Rc<[Quadruple]>,
    constants: MemorySpace,
    globals: MemorySpace,
    /// Temporaries used outside of every call.
    global_temps: MemorySpace,
    /// Records created by `ERA` that have not been activated by `GOSUB` yet.
    pending: Vec<ActivationRecord>,
    /// The call stack of active records.
    calls: Vec<ActivationRecord>,
    /// The instruction pointer.
    ip: usize,
    /// Has the machine halted?
    done: bool,
}

impl<T> VirtualMachine<T>
where
    T: Device,
{
    pub fn new(device: T) -> Self {
        Self {
            device,
            code: Rc::from(vec![]),
            constants: MemorySpace::new(),
            globals: MemorySpace::new(),
            global_temps: MemorySpace::new(),
            pending: vec![],
            calls: vec![],
            ip: 0,
            done: false,
        }
    }

    /// Load a program, resetting all memory and fill constant memory from its
    /// constant table.
    pub fn load(&mut self, object: &ObjectCode) {
        self.code = Rc::from(object.quads.clone());
        self.constants = MemorySpace::new();
        for (address, value) in &object.constants {
            self.constants.set(*address, value.clone());
        }
        self.globals = MemorySpace::new();
        self.global_temps = MemorySpace::new();
        self.pending.clear();
        self.calls.clear();
        self.ip = 0;
        self.done = false;
        info!(
            "Loaded {} quadruples and {} constants",
            self.code.len(),
            self.constants.len()
        );
    }

    /// Load and run a program to completion, handing back the device.
    pub fn execute(mut self, object: &ObjectCode) -> Result<T, Error> {
        self.load(object);
        self.run()?;
        Ok(self.device)
    }

    /// Run until the program halts or faults.
    pub fn run(&mut self) -> Result<(), Error> {
        while self.step()? {}
        Ok(())
    }

    /// Execute one instruction. Returns whether the machine is still running.
    pub fn step(&mut self) -> Result<bool, Error> {
        if self.done {
            return Ok(false);
        }

        let code = Rc::clone(&self.code);
        let Some(quad) = code.get(self.ip) else {
            warn!("Ran past the last instruction at {}", self.ip);
            self.done = true;
            return Ok(false);
        };

        trace!("{}:\t{quad}", self.ip);
        if let Err(fault) = self.dispatch(quad) {
            error!("Fault at {} ({}): {fault}", self.ip, quad.op);
            self.done = true;
            return Err(Error {
                ip: self.ip,
                op: quad.op,
                fault,
            });
        }
        Ok(!self.done)
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The number of active calls.
    pub fn call_depth(&self) -> usize {
        self.calls.len()
    }

    /// Every global cell and every top-level temporary that has been written.
    pub fn snapshot(&self) -> BTreeMap<Address, Value> {
        let mut result = BTreeMap::new();
        self.globals.dump(&mut result);
        self.global_temps.dump(&mut result);
        result
    }

    pub fn device(&self) -> &T {
        &self.device
    }

    pub fn into_device(self) -> T {
        self.device
    }

    fn dispatch(&mut self, quad: &Quadruple) -> Result<(), Fault> {
        let mut next = self.ip + 1;
        match quad.op {
            op @ (Operator::Add | Operator::Sub | Operator::Mul | Operator::Div) => {
                let left = self.read(address(&quad.arg1)?)?;
                let value = match &quad.arg2 {
                    // Unary minus carries no second operand.
                    None if op == Operator::Sub => negate(left)?,
                    arg2 => arithmetic(op, left, self.read(address(arg2)?)?)?,
                };
                self.write(address(&quad.result)?, value)?;
            }

            op @ (Operator::Gt
            | Operator::Lt
            | Operator::Ge
            | Operator::Le
            | Operator::Eq
            | Operator::Ne) => {
                let left = self.read(address(&quad.arg1)?)?;
                let right = self.read(address(&quad.arg2)?)?;
                let value = compare(op, left, right)?;
                self.write(address(&quad.result)?, value)?;
            }

            Operator::Assign => {
                let value = self.read(address(&quad.arg1)?)?.clone();
                self.write(address(&quad.result)?, value)?;
            }

            Operator::Print => {
                let value = self.read(address(&quad.arg1)?)?.clone();
                self.device.put(&value).map_err(Fault::Device)?;
            }

            Operator::Goto => next = label(&quad.result)?,

            Operator::GotoF => match self.read(address(&quad.arg1)?)? {
                Value::Bool(false) => next = label(&quad.result)?,
                Value::Bool(true) => {}
                other => {
                    return Err(Fault::InvalidOperand(format!(
                        "GOTOF expects a bool condition, found {other:?}"
                    )))
                }
            },

            Operator::Era => {
                let name = function(&quad.arg1)?;
                debug!("Reserving a frame for {name}");
                self.pending.push(ActivationRecord::new(name));
            }

            Operator::Param => {
                let value = self.read(address(&quad.arg1)?)?.clone();
                let dest = address(&quad.result)?;
                if dest.segment() != Some(Segment::Local) {
                    return Err(Fault::AddressOutOfRange(dest));
                }
                let value = coerce(value, dest)?;
                let frame = self.pending.last_mut().ok_or(Fault::MissingActivationFrame)?;
                frame.locals.set(dest, value);
            }

            Operator::Gosub => {
                let target = label(&quad.result)?;
                let mut frame = self.pending.pop().ok_or(Fault::MissingActivationFrame)?;
                frame.return_ip = Some(next);
                debug!(
                    "Calling {} at {target}, returning to {next} (depth {})",
                    frame.function,
                    self.calls.len() + 1
                );
                self.calls.push(frame);
                next = target;
            }

            Operator::Return | Operator::EndFunc => {
                let frame = self.calls.pop().ok_or(Fault::MissingActivationFrame)?;
                debug!("Returning from {}", frame.function);
                match frame.return_ip {
                    Some(ip) => next = ip,
                    None => {
                        warn!("Frame for {} has no return address", frame.function);
                        self.done = true;
                    }
                }
            }

            Operator::End => {
                info!("Reached END at {}", self.ip);
                self.done = true;
            }
        }

        self.ip = next;
        Ok(())
    }

    /// Read the cell behind an address.
    fn read(&self, address: Address) -> Result<&Value, Fault> {
        match address.segment() {
            Some(Segment::Const) => self.constants.get(address),
            Some(Segment::Global) => self.globals.get(address),
            Some(Segment::Local) => self
                .calls
                .last()
                .ok_or(Fault::MissingActivationFrame)?
                .locals
                .get(address),
            Some(Segment::Temp) => match self.calls.last() {
                Some(frame) => frame.temps.get(address),
                None => self.global_temps.get(address),
            },
            None => Err(Fault::AddressOutOfRange(address)),
        }
    }

    /// Write a value to an address, widening an `int` stored into a `float` cell.
    fn write(&mut self, address: Address, value: Value) -> Result<(), Fault> {
        let value = coerce(value, address)?;
        let space = match address.segment() {
            Some(Segment::Global) => &mut self.globals,
            Some(Segment::Local) => {
                &mut self
                    .calls
                    .last_mut()
                    .ok_or(Fault::MissingActivationFrame)?
                    .locals
            }
            Some(Segment::Temp) => match self.calls.last_mut() {
                Some(frame) => &mut frame.temps,
                None => &mut self.global_temps,
            },
            Some(Segment::Const) | None => return Err(Fault::AddressOutOfRange(address)),
        };
        space.set(address, value);
        Ok(())
    }
}

fn address(operand: &Option<Operand>) -> Result<Address, Fault> {
    operand
        .as_ref()
        .and_then(Operand::as_address)
        .ok_or_else(|| Fault::UnknownInstruction(format!("expected an address, found {operand:?}")))
}

fn label(operand: &Option<Operand>) -> Result<usize, Fault> {
    operand
        .as_ref()
        .and_then(Operand::as_label)
        .ok_or_else(|| Fault::UnknownInstruction(format!("expected a jump target, found {operand:?}")))
}

fn function(operand: &Option<Operand>) -> Result<&str, Fault> {
    match operand {
        Some(Operand::Function(name)) => Ok(name),
        _ => Err(Fault::UnknownInstruction(format!(
            "expected a function name, found {operand:?}"
        ))),
    }
}

/// Fit a value into the cell at `address`.
fn coerce(value: Value, address: Address) -> Result<Value, Fault> {
    let (_, ty) = address
        .classify()
        .ok_or(Fault::AddressOutOfRange(address))?;
    let found = value.get_type();
    value.coerce(ty).ok_or_else(|| {
        Fault::InvalidOperand(format!("cannot store a {found} in the {ty} cell {address}"))
    })
}

fn negate(value: &Value) -> Result<Value, Fault> {
    match value {
        Value::Int(n) => n.checked_neg().map(Value::Int).ok_or(Fault::ArithmeticOverflow),
        Value::Float(n) => Ok(Value::Float(-n)),
        other => Err(Fault::InvalidOperand(format!("cannot negate {other:?}"))),
    }
}

fn arithmetic(op: Operator, left: &Value, right: &Value) -> Result<Value, Fault> {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let result = match op {
            Operator::Add => a.checked_add(*b),
            Operator::Sub => a.checked_sub(*b),
            Operator::Mul => a.checked_mul(*b),
            // Division always produces a float.
            _ if *b == 0 => return Err(Fault::DivisionByZero),
            _ => return Ok(Value::Float(*a as f64 / *b as f64)),
        };
        return result.map(Value::Int).ok_or(Fault::ArithmeticOverflow);
    }

    let (a, b) = match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(Fault::InvalidOperand(format!(
                "`{op}` cannot be applied to {left:?} and {right:?}"
            )))
        }
    };
    let result = match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mul => a * b,
        _ if b == 0.0 => return Err(Fault::DivisionByZero),
        _ => a / b,
    };
    if result.is_finite() {
        Ok(Value::Float(result))
    } else {
        Err(Fault::ArithmeticOverflow)
    }
}

fn compare(op: Operator, left: &Value, right: &Value) -> Result<Value, Fault> {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(Fault::InvalidOperand(format!(
                    "`{op}` cannot compare {left:?} and {right:?}"
                )))
            }
        },
    };

    // NaN compares unequal to everything.
    let result = match (op, ordering) {
        (Operator::Ne, None) => true,
        (_, None) => false,
        (Operator::Gt, Some(o)) => o == Ordering::Greater,
        (Operator::Lt, Some(o)) => o == Ordering::Less,
        (Operator::Ge, Some(o)) => o != Ordering::Less,
        (Operator::Le, Some(o)) => o != Ordering::Greater,
        (Operator::Eq, Some(o)) => o == Ordering::Equal,
        (_, Some(o)) => o != Ordering::Equal,
    };
    Ok(Value::Bool(result))
}
