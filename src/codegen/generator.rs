//! # Quadruple Generator
//!
//! A syntax-directed translation of the AST into quadruples. Expressions are
//! evaluated with an operand stack, a parallel type stack and an operator
//! stack; control flow uses a jump stack of quadruple indices whose targets are
//! backpatched once they are known.
//!
//! Translation happens in this order:
//!
//! 1. Every global is declared.
//! 2. Every function *signature* is declared, so a function may call any
//!    other function regardless of declaration order.
//! 3. A `GOTO` to the start of `main` is emitted with an unknown target.
//! 4. Each function body is translated, followed by `ENDFUNC`.
//! 5. Calls to functions whose body had not been reached yet are backpatched.
//! 6. The `GOTO` from step 3 is backpatched, `main` is translated, and `END`
//!    is emitted.
use super::{CompiledProgram, Operand, Operator, Quadruple};
use crate::ast::*;
use crate::memory::{Address, Allocator, ConstantPool, Segment, Value};
use crate::semantic::*;

use log::*;

/// An entry on the operator stack.
#[derive(Copy, Clone, Debug, PartialEq)]
enum PendingOp {
    Binary(BinaryOp),
    /// Isolates a parenthesized expression or a call argument, so operators
    /// outside it are never reduced from inside.
    FalseBottom,
}

/// The call currently having its arguments bound.
#[derive(Clone, Debug)]
struct CallContext {
    function: String,
    arg: usize,
}

#[derive(Default)]
pub struct Generator {
    directory: FunctionDirectory,
    alloc: Allocator,
    constants: ConstantPool,
    quads: Vec<Quadruple>,

    operands: Vec<Address>,
    types: Vec<Type>,
    operators: Vec<PendingOp>,
    jumps: Vec<usize>,

    /// The function whose body is being translated, or `None` for `main`.
    current: Option<String>,
    calls: Vec<CallContext>,
    /// `GOSUB`s emitted before their callee's start index was known.
    pending_calls: Vec<(usize, String)>,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate a whole program.
    pub fn translate(mut self, program: &Program) -> Result<CompiledProgram, Error> {
        info!("Translating program `{}`", program.name);

        for group in &program.globals {
            for name in &group.names {
                self.directory.declare_global(name, group.ty, &mut self.alloc)?;
            }
        }

        for function in &program.functions {
            self.directory
                .declare_function(&function.name, function.return_type, &mut self.alloc)?;
            for param in &function.params {
                self.directory.declare_param(
                    &function.name,
                    &param.name,
                    param.ty,
                    &mut self.alloc,
                )?;
            }
        }

        let to_main = self.emit(Operator::Goto, None, None, None);
        self.jumps.push(to_main);

        for function in &program.functions {
            self.function(function)?;
        }
        self.patch_pending_calls()?;

        let to_main = self.pop_jump()?;
        self.patch(to_main, self.quads.len())?;
        self.current = None;
        self.block(&program.body)?;
        self.emit(Operator::End, None, None, None);

        self.finish()
    }

    fn function(&mut self, function: &Function) -> Result<(), Error> {
        debug!("Translating function `{}`", function.name);
        self.current = Some(function.name.clone());
        self.directory.set_start(&function.name, self.quads.len())?;

        for group in &function.locals {
            for name in &group.names {
                self.directory
                    .declare_local(&function.name, name, group.ty, &mut self.alloc)?;
            }
        }

        self.block(&function.body)?;
        self.emit(Operator::EndFunc, None, None, None);
        self.current = None;
        Ok(())
    }

    fn patch_pending_calls(&mut self) -> Result<(), Error> {
        for (index, name) in std::mem::take(&mut self.pending_calls) {
            let start = self.directory.function(&name)?.start.ok_or_else(|| {
                Error::internal(format!("function `{name}` was never given a start index"))
            })?;
            self.patch(index, start)?;
        }
        Ok(())
    }

    /// Check that nothing was left half-done, and package the result.
    fn finish(self) -> Result<CompiledProgram, Error> {
        if let Some(index) = self.quads.iter().position(Quadruple::is_unpatched) {
            return Err(Error::internal(format!(
                "jump at quadruple {index} was never patched"
            )));
        }
        if !self.jumps.is_empty() || !self.operands.is_empty() || !self.operators.is_empty() {
            return Err(Error::internal("translation finished with non-empty stacks"));
        }

        info!(
            "Generated {} quadruples and {} constants",
            self.quads.len(),
            self.constants.len()
        );
        Ok(CompiledProgram {
            directory: self.directory,
            quads: self.quads,
            constants: self.constants,
        })
    }

    ///////////////////////////////////////////////////////////////////////////
    // Statements

    fn block(&mut self, statements: &[Statement]) -> Result<(), Error> {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> Result<(), Error> {
        match statement {
            Statement::Assign { target, value } => {
                let symbol = self.directory.resolve(target, self.current.as_deref())?;
                let (dest, dest_ty) = (symbol.address, symbol.ty);

                self.expr(value)?;
                let (src, src_ty) = self.pop_operand()?;
                if !assignable(dest_ty, src_ty) {
                    return Err(Error::mismatch(format!(
                        "cannot assign a value of type {src_ty} to `{target}` of type {dest_ty}"
                    )));
                }
                self.emit(Operator::Assign, Some(src.into()), None, Some(dest.into()));
            }

            Statement::Print(args) => {
                for arg in args {
                    let address = match arg {
                        PrintArg::Str(text) => self.constant(Value::from(text.as_str()))?,
                        PrintArg::Expr(expr) => {
                            self.expr(expr)?;
                            self.pop_operand()?.0
                        }
                    };
                    self.emit(Operator::Print, Some(address.into()), None, None);
                }
            }

            Statement::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.condition(cond, "if")?;
                let gotof = self.emit(Operator::GotoF, Some(cond.into()), None, None);
                self.jumps.push(gotof);
                self.block(then)?;

                match otherwise {
                    None => {
                        let gotof = self.pop_jump()?;
                        self.patch(gotof, self.quads.len())?;
                    }
                    Some(otherwise) => {
                        let goto = self.emit(Operator::Goto, None, None, None);
                        let gotof = self.pop_jump()?;
                        self.patch(gotof, self.quads.len())?;
                        self.jumps.push(goto);
                        self.block(otherwise)?;
                        let goto = self.pop_jump()?;
                        self.patch(goto, self.quads.len())?;
                    }
                }
            }

            Statement::While { cond, body } => {
                self.jumps.push(self.quads.len());
                let cond = self.condition(cond, "while")?;
                let gotof = self.emit(Operator::GotoF, Some(cond.into()), None, None);
                self.jumps.push(gotof);
                self.block(body)?;

                let gotof = self.pop_jump()?;
                let start = self.pop_jump()?;
                self.emit(Operator::Goto, None, None, Some(Operand::Label(start)));
                self.patch(gotof, self.quads.len())?;
            }

            Statement::Call(call) => self.call(call, false)?,

            Statement::Return(value) => self.ret(value.as_ref())?,

            Statement::Block(statements) => self.block(statements)?,
        }
        Ok(())
    }

    /// Translate the condition of an `if` or `while`, which must be a `bool`.
    fn condition(&mut self, cond: &Expr, construct: &str) -> Result<Address, Error> {
        self.expr(cond)?;
        let (address, ty) = self.pop_operand()?;
        if ty != Type::Bool {
            return Err(Error::mismatch(format!(
                "the condition of `{construct}` must be of type bool, not {ty}"
            )));
        }
        Ok(address)
    }

    fn ret(&mut self, value: Option<&Expr>) -> Result<(), Error> {
        let name = self.current.clone().ok_or(Error::ReturnOutsideFunction)?;
        let function = self.directory.function(&name)?;
        let (return_type, return_address) = (function.return_type, function.return_address);

        match (value, return_address) {
            (None, None) => {}
            (Some(_), None) => {
                return Err(Error::mismatch(format!(
                    "void function `{name}` cannot return a value"
                )))
            }
            (None, Some(_)) => {
                return Err(Error::mismatch(format!(
                    "function `{name}` must return a value of type {return_type}"
                )))
            }
            (Some(expr), Some(dest)) => {
                self.expr(expr)?;
                let (src, ty) = self.pop_operand()?;
                if !assignable(return_type, ty) {
                    return Err(Error::mismatch(format!(
                        "function `{name}` returns {return_type}, but the returned value has type {ty}"
                    )));
                }
                self.emit(Operator::Assign, Some(src.into()), None, Some(dest.into()));
            }
        }

        self.emit(Operator::Return, None, None, None);
        Ok(())
    }

    /// Translate a call. When `as_value` is set the result is left on the
    /// operand stack; otherwise it is discarded.
    fn call(&mut self, call: &Call, as_value: bool) -> Result<(), Error> {
        let function = self.directory.function(&call.name)?;
        let return_type = function.return_type;
        let return_address = function.return_address;
        let start = function.start;
        let params = function
            .params
            .iter()
            .map(|param| (param.ty, param.address))
            .collect::<Vec<_>>();

        if call.args.len() != params.len() {
            return Err(Error::ArityMismatch {
                function: call.name.clone(),
                expected: params.len(),
                found: call.args.len(),
            });
        }
        if as_value && return_type == Type::Void {
            return Err(Error::mismatch(format!(
                "void function `{}` cannot be used as a value",
                call.name
            )));
        }

        let callee = Operand::Function(call.name.clone());
        self.emit(Operator::Era, Some(callee.clone()), None, None);

        self.calls.push(CallContext {
            function: call.name.clone(),
            arg: 0,
        });
        self.operators.push(PendingOp::FalseBottom);
        for (arg, (param_ty, param_address)) in call.args.iter().zip(params) {
            self.expr(arg)?;
            let (address, ty) = self.pop_operand()?;
            let context = self
                .calls
                .last_mut()
                .ok_or_else(|| Error::internal("call context stack underflow"))?;
            if !assignable(param_ty, ty) {
                return Err(Error::mismatch(format!(
                    "argument {} of `{}` must be of type {param_ty}, not {ty}",
                    context.arg + 1,
                    context.function
                )));
            }
            context.arg += 1;
            self.emit(
                Operator::Param,
                Some(address.into()),
                None,
                Some(param_address.into()),
            );
        }
        self.pop_false_bottom()?;
        self.calls.pop();

        let target = start.map(Operand::Label);
        let gosub = self.emit(Operator::Gosub, Some(callee), None, target);
        if start.is_none() {
            debug!("Call to `{}` at {gosub} awaits its start index", call.name);
            self.pending_calls.push((gosub, call.name.clone()));
        }

        if let (true, Some(result)) = (as_value, return_address) {
            // Copy out of the shared return cell before anything else can call
            // this function again.
            let temp = self.temp(return_type)?;
            self.emit(
                Operator::Assign,
                Some(result.into()),
                None,
                Some(temp.into()),
            );
            self.push_operand(temp, return_type);
        }
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////
    // Expressions

    fn expr(&mut self, expr: &Expr) -> Result<(), Error> {
        self.exp(&expr.lhs)?;
        if let Some((op, rhs)) = &expr.rel {
            self.operators.push(PendingOp::Binary(*op));
            self.exp(rhs)?;
            self.reduce(Precedence::Relational)?;
        }
        Ok(())
    }

    fn exp(&mut self, exp: &Exp) -> Result<(), Error> {
        self.term(&exp.head)?;
        for (op, term) in &exp.tail {
            self.operators.push(PendingOp::Binary(*op));
            self.term(term)?;
            self.reduce(Precedence::Additive)?;
        }
        Ok(())
    }

    fn term(&mut self, term: &Term) -> Result<(), Error> {
        self.factor(&term.head)?;
        for (op, factor) in &term.tail {
            self.operators.push(PendingOp::Binary(*op));
            self.factor(factor)?;
            self.reduce(Precedence::Multiplicative)?;
        }
        Ok(())
    }

    fn factor(&mut self, factor: &Factor) -> Result<(), Error> {
        match factor {
            Factor::Group(expr) => {
                self.operators.push(PendingOp::FalseBottom);
                self.expr(expr)?;
                self.pop_false_bottom()?;
            }
            Factor::Call(call) => self.call(call, true)?,
            Factor::Var(name) => {
                let symbol = self.directory.resolve(name, self.current.as_deref())?;
                let (address, ty) = (symbol.address, symbol.ty);
                self.push_operand(address, ty);
            }
            Factor::Int(n) => {
                let address = self.constant(Value::Int(*n))?;
                self.push_operand(address, Type::Int);
            }
            Factor::Float(n) => {
                let address = self.constant(Value::Float(*n))?;
                self.push_operand(address, Type::Float);
            }
            Factor::Str(text) => {
                let address = self.constant(Value::from(text.as_str()))?;
                self.push_operand(address, Type::String);
            }
            Factor::Unary(op, operand) => {
                self.factor(operand)?;
                let (address, ty) = self.pop_operand()?;
                let result_ty = unary_result_type(*op, ty).ok_or_else(|| {
                    Error::mismatch(format!("unary `{op}` cannot be applied to {ty}"))
                })?;

                match op {
                    UnaryOp::Plus => self.push_operand(address, result_ty),
                    UnaryOp::Neg => {
                        let temp = self.temp(result_ty)?;
                        self.emit(
                            Operator::Sub,
                            Some(address.into()),
                            None,
                            Some(temp.into()),
                        );
                        self.push_operand(temp, result_ty);
                    }
                }
            }
        }
        Ok(())
    }

    /// Reduce every pending operator of the given tier on top of the operator
    /// stack.
    fn reduce(&mut self, tier: Precedence) -> Result<(), Error> {
        while let Some(PendingOp::Binary(op)) = self.operators.last().copied() {
            if op.precedence() != tier {
                break;
            }
            self.operators.pop();

            let (right, right_ty) = self.pop_operand()?;
            let (left, left_ty) = self.pop_operand()?;
            let ty = binary_result_type(op, left_ty, right_ty).ok_or_else(|| {
                Error::mismatch(format!(
                    "operator `{op}` cannot be applied to {left_ty} and {right_ty}"
                ))
            })?;

            let temp = self.temp(ty)?;
            self.emit(
                op.into(),
                Some(left.into()),
                Some(right.into()),
                Some(temp.into()),
            );
            self.push_operand(temp, ty);
        }
        Ok(())
    }

    ///////////////////////////////////////////////////////////////////////////
    // Bookkeeping

    fn emit(
        &mut self,
        op: Operator,
        arg1: Option<Operand>,
        arg2: Option<Operand>,
        result: Option<Operand>,
    ) -> usize {
        let index = self.quads.len();
        let quad = Quadruple::new(op, arg1, arg2, result);
        trace!("{index}:\t{quad}");
        self.quads.push(quad);
        index
    }

    fn patch(&mut self, index: usize, target: usize) -> Result<(), Error> {
        let quad = self
            .quads
            .get_mut(index)
            .ok_or_else(|| Error::internal(format!("no quadruple at {index} to patch")))?;
        debug!("Patching {} at {index} to jump to {target}", quad.op);
        quad.fill(target);
        Ok(())
    }

    fn pop_jump(&mut self) -> Result<usize, Error> {
        self.jumps
            .pop()
            .ok_or_else(|| Error::internal("jump stack underflow"))
    }

    fn push_operand(&mut self, address: Address, ty: Type) {
        self.operands.push(address);
        self.types.push(ty);
    }

    fn pop_operand(&mut self) -> Result<(Address, Type), Error> {
        match (self.operands.pop(), self.types.pop()) {
            (Some(address), Some(ty)) => Ok((address, ty)),
            _ => Err(Error::internal("operand stack underflow")),
        }
    }

    fn pop_false_bottom(&mut self) -> Result<(), Error> {
        match self.operators.pop() {
            Some(PendingOp::FalseBottom) => Ok(()),
            other => Err(Error::internal(format!(
                "expected a false bottom on the operator stack, found {other:?}"
            ))),
        }
    }

    fn constant(&mut self, value: Value) -> Result<Address, Error> {
        Ok(self.constants.intern(value, &mut self.alloc)?)
    }

    /// Reserve a temporary, charging it to the current function.
    fn temp(&mut self, ty: Type) -> Result<Address, Error> {
        let address = self.alloc.allocate(Segment::Temp, ty)?;
        if let Some(function) = &self.current {
            self.directory.count_temp(function, ty)?;
        }
        Ok(address)
    }
}
