use patito::{
    codegen::{Operand, Operator, Quadruple},
    memory::{Address, Value},
    object::ObjectCode,
    run_source,
    vm::*,
};

fn addr(n: usize) -> Option<Operand> {
    Some(Operand::Address(Address(n)))
}

fn label(n: usize) -> Option<Operand> {
    Some(Operand::Label(n))
}

fn quad(
    op: Operator,
    arg1: Option<Operand>,
    arg2: Option<Operand>,
    result: Option<Operand>,
) -> Quadruple {
    Quadruple::new(op, arg1, arg2, result)
}

fn end() -> Quadruple {
    quad(Operator::End, None, None, None)
}

fn execute(quads: Vec<Quadruple>, constants: Vec<(Address, Value)>) -> Result<TestingDevice, Error> {
    VirtualMachine::new(TestingDevice::new()).execute(&ObjectCode::new(quads, constants))
}

fn fault(quads: Vec<Quadruple>, constants: Vec<(Address, Value)>) -> Error {
    match execute(quads, constants) {
        Ok(device) => panic!("expected a fault, got output {:?}", device.output),
        Err(e) => e,
    }
}

#[test]
fn test_arithmetic() {
    let constants = vec![
        (Address(13000), Value::Int(32)),
        (Address(13001), Value::Int(35)),
        (Address(13500), Value::Float(0.5)),
    ];
    let quads = vec![
        quad(Operator::Add, addr(13000), addr(13001), addr(8000)),
        quad(Operator::Sub, addr(13000), addr(13001), addr(8001)),
        quad(Operator::Mul, addr(13000), addr(13500), addr(8500)),
        quad(Operator::Div, addr(13001), addr(13000), addr(8501)),
        quad(Operator::Sub, addr(13500), None, addr(8502)),
        quad(Operator::Print, addr(8000), None, None),
        quad(Operator::Print, addr(8001), None, None),
        quad(Operator::Print, addr(8500), None, None),
        quad(Operator::Print, addr(8501), None, None),
        quad(Operator::Print, addr(8502), None, None),
        end(),
    ];

    let device = execute(quads, constants).unwrap();
    assert_eq!(device.output_lines(), ["67", "-3", "16.0", "1.09375", "-0.5"]);
}

#[test]
fn test_relational() {
    let constants = vec![
        (Address(13000), Value::Int(2)),
        (Address(13500), Value::Float(2.0)),
        (Address(13501), Value::Float(2.5)),
    ];
    let quads = vec![
        quad(Operator::Eq, addr(13000), addr(13500), addr(9000)),
        quad(Operator::Lt, addr(13000), addr(13501), addr(9001)),
        quad(Operator::Ge, addr(13501), addr(13000), addr(9002)),
        quad(Operator::Ne, addr(13000), addr(13500), addr(9003)),
        quad(Operator::Print, addr(9000), None, None),
        quad(Operator::Print, addr(9001), None, None),
        quad(Operator::Print, addr(9002), None, None),
        quad(Operator::Print, addr(9003), None, None),
        end(),
    ];

    let device = execute(quads, constants).unwrap();
    assert_eq!(device.output_str(), "true\ntrue\ntrue\nfalse\n");
}

#[test]
fn test_int_widens_into_float_cells() {
    let constants = vec![(Address(13000), Value::Int(3))];
    let quads = vec![
        quad(Operator::Assign, addr(13000), None, addr(1500)),
        quad(Operator::Print, addr(1500), None, None),
        end(),
    ];
    assert_eq!(execute(quads, constants).unwrap().output_lines(), ["3.0"]);
}

#[test]
fn test_goto_and_gotof() {
    let constants = vec![
        (Address(13000), Value::Int(1)),
        (Address(13001), Value::Int(2)),
        (Address(14000), Value::Bool(false)),
    ];
    let quads = vec![
        quad(Operator::GotoF, addr(14000), None, label(3)),
        quad(Operator::Print, addr(13000), None, None),
        end(),
        quad(Operator::Print, addr(13001), None, None),
        quad(Operator::Goto, None, None, label(2)),
    ];
    assert_eq!(execute(quads, constants).unwrap().output_lines(), ["2"]);
}

#[test]
fn test_top_level_temporaries_are_global() {
    let constants = vec![(Address(13000), Value::Int(7))];
    let object = ObjectCode::new(
        vec![
            quad(Operator::Assign, addr(13000), None, addr(8000)),
            quad(Operator::Assign, addr(8000), None, addr(1000)),
            end(),
        ],
        constants,
    );

    let mut vm = VirtualMachine::new(TestingDevice::new());
    vm.load(&object);
    vm.run().unwrap();
    let snapshot = vm.snapshot();
    assert_eq!(snapshot.get(&Address(8000)), Some(&Value::Int(7)));
    assert_eq!(snapshot.get(&Address(1000)), Some(&Value::Int(7)));
    assert!(vm.is_done());
}

#[test]
fn test_running_past_the_end_halts() {
    let constants = vec![(Address(13000), Value::Int(1))];
    let quads = vec![quad(Operator::Print, addr(13000), None, None)];
    assert_eq!(execute(quads, constants).unwrap().output_lines(), ["1"]);
}

#[test]
fn test_call_frames() {
    // f(a) prints its argument from inside its own frame.
    let constants = vec![(Address(13000), Value::Int(42))];
    let quads = vec![
        quad(Operator::Goto, None, None, label(3)),
        quad(Operator::Print, addr(3000), None, None),
        quad(Operator::EndFunc, None, None, None),
        quad(
            Operator::Era,
            Some(Operand::Function(String::from("f"))),
            None,
            None,
        ),
        quad(Operator::Param, addr(13000), None, addr(3000)),
        quad(
            Operator::Gosub,
            Some(Operand::Function(String::from("f"))),
            None,
            label(1),
        ),
        end(),
    ];

    let mut vm = VirtualMachine::new(TestingDevice::new());
    vm.load(&ObjectCode::new(quads, constants));
    let mut depths = vec![];
    while vm.step().unwrap() {
        depths.push(vm.call_depth());
    }
    assert_eq!(depths, [0, 0, 0, 1, 1, 0]);
    assert_eq!(vm.into_device().output_lines(), ["42"]);
}

///////////////////////////////////////////////////////////////////////////////
// Faults

#[test]
fn test_uninitialized_access() {
    let e = fault(
        vec![quad(Operator::Print, addr(1000), None, None), end()],
        vec![],
    );
    assert_eq!(
        e,
        Error {
            ip: 0,
            op: Operator::Print,
            fault: Fault::UninitializedAccess(Address(1000))
        }
    );
}

#[test]
fn test_unknown_instruction() {
    let e = fault(vec![quad(Operator::Goto, None, None, None)], vec![]);
    assert!(matches!(e.fault, Fault::UnknownInstruction(_)));

    let e = fault(
        vec![quad(Operator::Add, addr(13000), None, addr(8000))],
        vec![(Address(13000), Value::Int(1))],
    );
    assert!(matches!(e.fault, Fault::UnknownInstruction(_)));
}

#[test]
fn test_address_out_of_range() {
    let e = fault(vec![quad(Operator::Print, addr(20000), None, None)], vec![]);
    assert_eq!(e.fault, Fault::AddressOutOfRange(Address(20000)));

    // Constant memory cannot be written.
    let e = fault(
        vec![quad(Operator::Assign, addr(13000), None, addr(13001))],
        vec![(Address(13000), Value::Int(1))],
    );
    assert_eq!(e.fault, Fault::AddressOutOfRange(Address(13001)));
}

#[test]
fn test_missing_activation_frame() {
    let constants = vec![(Address(13000), Value::Int(1))];
    for quads in [
        vec![quad(Operator::Return, None, None, None)],
        vec![quad(Operator::EndFunc, None, None, None)],
        vec![quad(Operator::Param, addr(13000), None, addr(3000))],
        vec![quad(
            Operator::Gosub,
            Some(Operand::Function(String::from("f"))),
            None,
            label(0),
        )],
        // Locals do not exist outside of a call.
        vec![quad(Operator::Print, addr(3000), None, None)],
    ] {
        let e = fault(quads, constants.clone());
        assert_eq!(e.fault, Fault::MissingActivationFrame);
        assert_eq!(e.ip, 0);
    }
}

#[test]
fn test_arithmetic_faults() {
    let constants = vec![
        (Address(13000), Value::Int(i64::MAX)),
        (Address(13001), Value::Int(0)),
        (Address(13002), Value::Int(1)),
    ];

    let e = fault(
        vec![quad(Operator::Div, addr(13002), addr(13001), addr(8500))],
        constants.clone(),
    );
    assert_eq!(e.fault, Fault::DivisionByZero);

    let e = fault(
        vec![quad(Operator::Add, addr(13000), addr(13002), addr(8000))],
        constants,
    );
    assert_eq!(e.fault, Fault::ArithmeticOverflow);
}

#[test]
fn test_gotof_needs_a_bool() {
    let e = fault(
        vec![quad(Operator::GotoF, addr(13000), None, label(0))],
        vec![(Address(13000), Value::Int(0))],
    );
    assert!(matches!(e.fault, Fault::InvalidOperand(_)));
}

#[test]
fn test_fault_halts_the_machine() {
    let object = ObjectCode::new(vec![quad(Operator::Print, addr(1000), None, None)], vec![]);
    let mut vm = VirtualMachine::new(TestingDevice::new());
    vm.load(&object);
    assert!(vm.step().is_err());
    assert_eq!(vm.step(), Ok(false));
}

///////////////////////////////////////////////////////////////////////////////
// Whole programs

#[test]
fn test_nested_calls_bind_the_right_frame() {
    let device = run_source(
        r#"program p;
        int add(a: int, b: int) {
            return a + b;
        }
        int twice(n: int) {
            return n * 2;
        }
        main {
            print(add(twice(3), add(1, twice(2))));
        }
        end"#,
        TestingDevice::new(),
    )
    .unwrap();
    assert_eq!(device.output_lines(), ["11"]);
}

#[test]
fn test_repeated_calls_do_not_alias() {
    let device = run_source(
        r#"program p;
        int id(n: int) {
            return n;
        }
        main {
            print(id(1) - id(2));
        }
        end"#,
        TestingDevice::new(),
    )
    .unwrap();
    assert_eq!(device.output_lines(), ["-1"]);
}

#[test]
fn test_division_by_zero_in_source() {
    let result = run_source(
        r#"program p;
        var a: int;
        main {
            a = 0;
            print(1 / a);
        }
        end"#,
        TestingDevice::new(),
    );
    match result {
        Err(patito::Error::Runtime(e)) => {
            assert_eq!(e.op, Operator::Div);
            assert_eq!(e.fault, Fault::DivisionByZero);
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn test_object_files_round_trip() {
    let compiled = patito::compile_source(
        r#"program p;
        var x: float;
        main {
            x = 7 / 2;
            print("x =", x);
        }
        end"#,
    )
    .unwrap();

    let json = compiled.object_code().to_json().unwrap();
    let object = ObjectCode::from_json(&json).unwrap();
    assert_eq!(object, compiled.object_code());

    let device = VirtualMachine::new(TestingDevice::new())
        .execute(&object)
        .unwrap();
    assert_eq!(device.output_lines(), ["x =", "3.5"]);
}
