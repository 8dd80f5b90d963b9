use patito::{
    ast::*,
    codegen::*,
    compile_source,
    memory::{self, Address, Segment, Value},
    semantic::{Error, Type},
    vm::{TestingDevice, VirtualMachine},
    Error as PipelineError,
};

fn compile_ok(code: &str) -> CompiledProgram {
    match compile_source(code) {
        Ok(compiled) => compiled,
        Err(e) => panic!("failed to compile:\n{e}"),
    }
}

fn compile_err(code: &str) -> Error {
    match compile_source(code) {
        Ok(compiled) => panic!("expected a compile error, got:\n{compiled}"),
        Err(PipelineError::Compile(e)) => e,
        Err(e) => panic!("expected a compile error, got: {e}"),
    }
}

fn run(compiled: &CompiledProgram) -> VirtualMachine<TestingDevice> {
    let mut vm = VirtualMachine::new(TestingDevice::new());
    vm.load(&compiled.object_code());
    vm.run().unwrap();
    vm
}

#[test]
fn test_grouping_feeds_temporaries() {
    let compiled = compile_ok(
        r#"program p;
        var x: int;
        main {
            x = (1 + 2) * 3;
            print(x);
        }
        end"#,
    );

    // The leading GOTO jumps over the (empty) function section.
    assert_eq!(
        compiled.operators(),
        vec![
            Operator::Goto,
            Operator::Add,
            Operator::Mul,
            Operator::Assign,
            Operator::Print,
            Operator::End
        ]
    );
    assert_eq!(compiled.quads[0].target(), Some(1));

    let add = &compiled.quads[1];
    let mul = &compiled.quads[2];
    assert_eq!(mul.arg1, add.result);
    assert_eq!(
        add.result.as_ref().and_then(Operand::as_address),
        Some(Address(8000))
    );

    let vm = run(&compiled);
    assert_eq!(vm.device().output_lines(), ["9"]);
}

#[test]
fn test_if_else_backpatching() {
    let compiled = compile_ok(
        r#"program p;
        var a: int;
        main {
            if (1 < 2) { a = 1; } else { a = 2; };
        }
        end"#,
    );

    let gotofs = compiled
        .quads
        .iter()
        .enumerate()
        .filter(|(_, q)| q.op == Operator::GotoF)
        .collect::<Vec<_>>();
    // Skip the jump to main.
    let gotos = compiled
        .quads
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, q)| q.op == Operator::Goto)
        .collect::<Vec<_>>();
    assert_eq!(gotofs.len(), 1);
    assert_eq!(gotos.len(), 1);

    let (goto_index, goto) = gotos[0];
    let (_, gotof) = gotofs[0];
    // The else branch starts right after the GOTO that skips it.
    assert_eq!(gotof.target(), Some(goto_index + 1));
    assert_eq!(compiled.quads[goto_index + 1].op, Operator::Assign);
    // And the GOTO lands right after the else branch.
    assert_eq!(goto.target(), Some(goto_index + 2));
    assert_eq!(compiled.quads[goto_index + 2].op, Operator::End);

    let vm = run(&compiled);
    assert_eq!(vm.snapshot()[&Address(1000)], Value::Int(1));
}

#[test]
fn test_if_without_else() {
    let compiled = compile_ok(
        r#"program p;
        var a: int;
        main {
            a = 0;
            if (a > 1) { a = 5; }
            print(a);
        }
        end"#,
    );
    let (index, gotof) = compiled
        .quads
        .iter()
        .enumerate()
        .find(|(_, q)| q.op == Operator::GotoF)
        .unwrap();
    assert_eq!(gotof.target(), Some(index + 2));
    assert_eq!(compiled.quads[index + 2].op, Operator::Print);

    assert_eq!(run(&compiled).device().output_lines(), ["0"]);
}

#[test]
fn test_while_jumps_backwards() {
    let compiled = compile_ok(
        r#"program p;
        var a: int;
        main {
            a = 0;
            while (a < 3) do { a = a + 1; };
        }
        end"#,
    );

    let (index, back) = compiled
        .quads
        .iter()
        .enumerate()
        .rev()
        .find(|(_, q)| q.op == Operator::Goto)
        .unwrap();
    let start = back.target().unwrap();
    assert!(start < index);
    assert_eq!(compiled.quads[start].op, Operator::Lt);

    let (gotof_index, gotof) = compiled
        .quads
        .iter()
        .enumerate()
        .find(|(_, q)| q.op == Operator::GotoF)
        .unwrap();
    assert_eq!(gotof.target(), Some(index + 1));

    // Count how many times the body is entered.
    let mut vm = VirtualMachine::new(TestingDevice::new());
    vm.load(&compiled.object_code());
    let mut iterations = 0;
    loop {
        if vm.ip() == gotof_index + 1 {
            iterations += 1;
        }
        if !vm.step().unwrap() {
            break;
        }
    }
    assert_eq!(iterations, 3);
    assert_eq!(vm.snapshot()[&Address(1000)], Value::Int(3));
}

#[test]
fn test_call_protocol() {
    let compiled = compile_ok(
        r#"program p;
        var x: int;
        int f(a: int) {
            return a * 2;
        }
        main {
            x = f(5);
            print(x);
        }
        end"#,
    );

    let ops = compiled.operators();
    let era = ops.iter().position(|op| *op == Operator::Era).unwrap();
    assert_eq!(
        &ops[era..era + 3],
        &[Operator::Era, Operator::Param, Operator::Gosub]
    );
    assert_eq!(compiled.directory.function("f").unwrap().start, Some(1));
    assert_eq!(compiled.quads[era + 2].target(), Some(1));
    assert_eq!(
        compiled.quads[era + 2].arg1,
        Some(Operand::Function(String::from("f")))
    );

    let mut vm = VirtualMachine::new(TestingDevice::new());
    vm.load(&compiled.object_code());
    let mut max_depth = 0;
    while vm.step().unwrap() {
        max_depth = max_depth.max(vm.call_depth());
        if vm.ip() == era + 3 {
            // Just returned from the call.
            assert_eq!(vm.call_depth(), 0);
        }
    }
    assert_eq!(max_depth, 1);
    assert_eq!(vm.call_depth(), 0);
    assert_eq!(vm.snapshot()[&Address(1000)], Value::Int(10));
    assert_eq!(vm.device().output_str(), "10\n");
}

#[test]
fn test_forward_calls_are_backpatched() {
    let compiled = compile_ok(
        r#"program p;
        int first(n: int) {
            return second(n) + 1;
        }
        int second(n: int) {
            return n * 10;
        }
        main {
            print(first(4));
        }
        end"#,
    );

    let second = compiled.directory.function("second").unwrap().start;
    assert!(second.is_some());
    assert!(compiled
        .quads
        .iter()
        .filter(|q| q.op == Operator::Gosub)
        .all(|q| q.target().is_some()));
    assert!(compiled.quads.iter().any(|q| q.op == Operator::Gosub
        && q.arg1 == Some(Operand::Function(String::from("second")))
        && q.target() == second));

    assert_eq!(run(&compiled).device().output_lines(), ["41"]);
}

#[test]
fn test_unary_minus_has_no_second_operand() {
    let compiled = compile_ok(
        r#"program p;
        var a: int;
        main {
            a = 4;
            print(-a);
        }
        end"#,
    );
    let neg = compiled
        .quads
        .iter()
        .find(|q| q.op == Operator::Sub)
        .unwrap();
    assert_eq!(neg.arg2, None);
    assert_eq!(run(&compiled).device().output_lines(), ["-4"]);
}

#[test]
fn test_constants_are_interned() {
    let compiled = compile_ok(
        r#"program p;
        var a: int;
        var b: float;
        main {
            a = 5;
            a = 5 + 5;
            b = 5.0;
        }
        end"#,
    );

    let table = compiled.constants.table();
    assert_eq!(table.len(), 2);
    assert_eq!(compiled.constants.lookup(&Value::Int(5)), Some(Address(13000)));
    assert_eq!(
        compiled.constants.lookup(&Value::Float(5.0)),
        Some(Address(13500))
    );
}

#[test]
fn test_quadruple_listing() {
    let compiled = compile_ok(
        r#"program p;
        main {
            print("hola");
        }
        end"#,
    );
    assert_eq!(
        compiled.to_string(),
        "0\tGOTO\tnull\tnull\t1\n1\tPRINT\t14500\tnull\tnull\n2\tEND\tnull\tnull\tnull\n"
    );
}

#[test]
fn test_per_function_resources() {
    let compiled = compile_ok(
        r#"program p;
        float avg(a: int, b: int) {
            var total: int;
            total = a + b;
            return total / 2;
        }
        main {
            print(avg(1, 2));
        }
        end"#,
    );
    let avg = compiled.directory.function("avg").unwrap();
    assert_eq!(avg.locals.get(&Type::Int), Some(&3));
    assert_eq!(avg.temps.get(&Type::Int), Some(&1));
    assert_eq!(avg.temps.get(&Type::Float), Some(&1));
    assert_eq!(run(&compiled).device().output_lines(), ["1.5"]);
}

///////////////////////////////////////////////////////////////////////////////
// Programs built directly as trees

fn compile_tree(program: &Program) -> CompiledProgram {
    match compile(program) {
        Ok(compiled) => compiled,
        Err(e) => panic!("failed to compile tree:\n{e}"),
    }
}

#[test]
fn test_tree_grouping() {
    // x = (1 + 2) * 3; print(x);
    let sum = Exp::from(Factor::from(1i64)).then(BinaryOp::Add, Factor::from(2i64));
    let product = Term::from(Factor::group(sum)).then(BinaryOp::Mul, 3i64);
    let program = Program::new("grouping")
        .with_globals(vec![VarGroup::new(&["x"], Type::Int)])
        .with_body(vec![
            Statement::assign("x", product),
            Statement::print(vec![Factor::var("x").into()]),
        ]);

    let compiled = compile_tree(&program);
    assert_eq!(
        compiled.operators(),
        vec![
            Operator::Goto,
            Operator::Add,
            Operator::Mul,
            Operator::Assign,
            Operator::Print,
            Operator::End
        ]
    );
    assert_eq!(compiled.quads[2].arg1, compiled.quads[1].result);
    assert_eq!(run(&compiled).device().output_lines(), ["9"]);
}

#[test]
fn test_tree_if_else() {
    // if (1 < 2) { a = 1; } else { a = 2; };
    let program = Program::new("branches")
        .with_globals(vec![VarGroup::new(&["a"], Type::Int)])
        .with_body(vec![Statement::if_else(
            Expr::compare(Factor::from(1i64), BinaryOp::Lt, Factor::from(2i64)),
            vec![Statement::assign("a", 1i64)],
            vec![Statement::assign("a", 2i64)],
        )]);

    let compiled = compile_tree(&program);
    let ops = compiled.operators();
    assert_eq!(ops.iter().filter(|op| **op == Operator::GotoF).count(), 1);
    // The leading GOTO to main plus the one skipping the else branch.
    assert_eq!(ops.iter().filter(|op| **op == Operator::Goto).count(), 2);

    let gotof = ops.iter().position(|op| *op == Operator::GotoF).unwrap();
    let goto = gotof + 2;
    assert_eq!(ops[goto], Operator::Goto);
    assert_eq!(compiled.quads[gotof].target(), Some(goto + 1));
    assert_eq!(compiled.quads[goto].target(), Some(goto + 2));
    assert_eq!(run(&compiled).snapshot()[&Address(1000)], Value::Int(1));
}

#[test]
fn test_tree_if_without_else() {
    let program = Program::new("branch")
        .with_globals(vec![VarGroup::new(&["a"], Type::Int)])
        .with_body(vec![
            Statement::assign("a", 0i64),
            Statement::if_then(
                Expr::compare(Factor::var("a"), BinaryOp::Gt, Factor::from(1i64)),
                vec![Statement::assign("a", 5i64)],
            ),
            Statement::print(vec![Factor::var("a").into()]),
        ]);
    assert_eq!(run(&compile_tree(&program)).device().output_lines(), ["0"]);
}

#[test]
fn test_tree_while() {
    // a = 0; while (a < 3) do { a = a + 1; };
    let increment = Exp::from(Factor::var("a")).then(BinaryOp::Add, Factor::from(1i64));
    let program = Program::new("loop")
        .with_globals(vec![VarGroup::new(&["a"], Type::Int)])
        .with_body(vec![
            Statement::assign("a", 0i64),
            Statement::while_loop(
                Expr::compare(Factor::var("a"), BinaryOp::Lt, Factor::from(3i64)),
                vec![Statement::assign("a", increment)],
            ),
        ]);

    let compiled = compile_tree(&program);
    let (index, back) = compiled
        .quads
        .iter()
        .enumerate()
        .rev()
        .find(|(_, q)| q.op == Operator::Goto)
        .unwrap();
    assert!(back.target().unwrap() < index);
    assert_eq!(run(&compiled).snapshot()[&Address(1000)], Value::Int(3));
}

#[test]
fn test_tree_call() {
    // int f(a: int) { return a * 2; }  main { x = f(5); print(x); }
    let double = Term::from(Factor::var("a")).then(BinaryOp::Mul, 2i64);
    let f = Function::new("f", Type::Int, vec![Param::new("a", Type::Int)])
        .with_body(vec![Statement::ret(Some(double.into()))]);
    let program = Program::new("call")
        .with_globals(vec![VarGroup::new(&["x"], Type::Int)])
        .with_functions(vec![f])
        .with_body(vec![
            Statement::assign("x", Factor::call("f", vec![Expr::from(5i64)])),
            Statement::print(vec![Factor::var("x").into()]),
        ]);

    let compiled = compile_tree(&program);
    let vm = run(&compiled);
    assert_eq!(vm.call_depth(), 0);
    assert_eq!(vm.snapshot()[&Address(1000)], Value::Int(10));
    assert_eq!(vm.device().output_lines(), ["10"]);
}

///////////////////////////////////////////////////////////////////////////////
// Rejected programs

#[test]
fn test_arity_mismatch() {
    let e = compile_err(
        r#"program p;
        int f(a: int) { return a; }
        main { print(f(1, 2)); }
        end"#,
    );
    assert_eq!(
        e,
        Error::ArityMismatch {
            function: String::from("f"),
            expected: 1,
            found: 2
        }
    );
}

#[test]
fn test_arity_is_checked_before_the_call_is_emitted() {
    let program = Program::new("p")
        .with_functions(vec![Function::new("f", Type::Void, vec![])])
        .with_body(vec![Statement::call("f", vec![Expr::from(1i64)])]);

    assert!(matches!(
        compile(&program),
        Err(Error::ArityMismatch { found: 1, .. })
    ));
}

#[test]
fn test_type_mismatches() {
    let cases = [
        // Narrowing assignment.
        "program p; var a: int; main { a = 1.5; } end",
        // Non-bool condition.
        "program p; var a: int; main { if (a) { a = 1; } } end",
        "program p; var a: int; main { while (a + 1) { a = 1; } } end",
        // Arithmetic on strings.
        r#"program p; var a: int; main { a = "x" + 1; } end"#,
        // Sign of a bool.
        "program p; var b: bool; main { b = -(1 < 2); } end",
        // Argument type.
        "program p; void f(a: int) { } main { f(1.5); } end",
        // A void call used as a value.
        "program p; var a: int; void f() { } main { a = f(); } end",
        // Returning from a void function with a value.
        "program p; void f() { return 1; } main { f(); } end",
        // Returning nothing from a non-void function.
        "program p; int f() { return; } main { f(); } end",
        // Returning the wrong type.
        "program p; int f() { return 1.0; } main { f(); } end",
    ];

    for code in cases {
        assert!(
            matches!(compile_err(code), Error::TypeMismatch(_)),
            "expected a type mismatch for {code}"
        );
    }
}

#[test]
fn test_scope_errors() {
    assert!(matches!(
        compile_err("program p; var a: int; var a: float; main { } end"),
        Error::DuplicateSymbol { .. }
    ));
    assert!(matches!(
        compile_err("program p; void f(a: int) { var a: int; } main { } end"),
        Error::DuplicateSymbol { .. }
    ));
    assert!(matches!(
        compile_err("program p; void f() { } void f() { } main { } end"),
        Error::DuplicateFunction(_)
    ));
    assert!(matches!(
        compile_err("program p; main { b = 1; } end"),
        Error::UndefinedSymbol { .. }
    ));
    assert!(matches!(
        compile_err("program p; main { g(); } end"),
        Error::UndefinedFunction(_)
    ));
    assert_eq!(
        compile_err("program p; main { return; } end"),
        Error::ReturnOutsideFunction
    );
}

#[test]
fn test_shadowing() {
    let compiled = compile_ok(
        r#"program p;
        var a: int;
        void f() {
            var a: int;
            a = 5;
            print(a);
        }
        main {
            a = 1;
            f();
            print(a);
        }
        end"#,
    );
    assert_eq!(run(&compiled).device().output_lines(), ["5", "1"]);
}

#[test]
fn test_temporaries_run_out() {
    let sum = vec!["1"; 600].join(" + ");
    let code = format!("program p; var x: int; main {{ x = {sum}; }} end");
    assert_eq!(
        compile_err(&code),
        Error::AddressCapacity(memory::Error::Capacity {
            segment: Segment::Temp,
            ty: Type::Int
        })
    );
}
