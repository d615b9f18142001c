use rustc_hash::FxHashMap as HashMap;

use crate::ops::TokenRange;
use crate::parser::parse_program;
use crate::token::{expand_notation, TokenKind};
use crate::vm::RunError::InstructionFailed;
use super::*;

const RANGE: TokenRange = TokenRange { from: 0, to: 0 };

fn label(name: &str) -> Label {
    Label::new(name.chars().map(|c| if c == 'T' { TokenKind::Tab } else { TokenKind::Space }).collect())
}

fn push(n: i64) -> Instruction {
    Instruction::with_number(Opcode::StackPush, RANGE, n)
}

fn op(opcode: Opcode) -> Instruction {
    Instruction::new(opcode, RANGE)
}

fn with_number(opcode: Opcode, n: i64) -> Instruction {
    Instruction::with_number(opcode, RANGE, n)
}

fn flow(opcode: Opcode, name: &str) -> Instruction {
    Instruction::with_label(opcode, RANGE, label(name))
}

fn program(instructions: Vec<Instruction>) -> ParsingResult {
    let mut labels = HashMap::default();
    for (i, instruction) in instructions.iter().enumerate() {
        if let (Opcode::Mark, Some(label)) = (instruction.opcode, instruction.label()) {
            labels.insert(label.clone(), i);
        }
    }
    ParsingResult { instructions, labels }
}

fn run_ops(instructions: Vec<Instruction>, input: &str) -> Result<RunResult, RunError> {
    super::run(&program(instructions), input, VMOptions::new(u64::MAX))
}

fn with_stack(initial_stack: &[i64], opcode: Opcode) -> Vec<Instruction> {
    let mut instructions: Vec<Instruction> = initial_stack.iter().map(|&n| push(n)).collect();
    instructions.push(op(opcode));
    instructions.push(op(Opcode::Exit));
    instructions
}

fn run_op(initial_stack: &[i64], opcode: Opcode) -> Vec<i64> {
    run_ops(with_stack(initial_stack, opcode), "").unwrap().stack
}

fn run_op_err(initial_stack: &[i64], opcode: Opcode) -> OperationError {
    run_ops(with_stack(initial_stack, opcode), "").unwrap_err().kind().cloned().unwrap()
}

fn output(instructions: Vec<Instruction>, input: &str) -> String {
    run_ops(instructions, input).unwrap().output
}

#[test]
fn test_empty() {
    let result = run_ops(vec![op(Opcode::Exit)], "").unwrap();
    assert_eq!(result.output, "");
    assert!(result.stack.is_empty());
    assert_eq!(result.instruction_counter, 1);
    assert_eq!(result.instruction_pointer, 0);
}

#[test]
fn test_push() {
    assert!(run_op(&[], Opcode::Mark).is_empty());
    assert_eq!(run_ops(vec![push(1), push(-2), push(i64::MIN), op(Opcode::Exit)], "").unwrap().stack, [1, -2, i64::MIN]);
}

#[test]
fn test_dup_top() {
    assert_eq!(run_op_err(&[], Opcode::StackDupTop), OperationError::ValueStackTooSmall { required: 1, stack_len: 0 });
    assert_eq!(run_op(&[1, 2], Opcode::StackDupTop), [1, 2, 2]);
}

#[test]
fn test_dup_n() {
    fn dup_n(initial_stack: &[i64], n: i64) -> Result<RunResult, RunError> {
        let mut instructions: Vec<Instruction> = initial_stack.iter().map(|&n| push(n)).collect();
        instructions.push(with_number(Opcode::StackDupN, n));
        instructions.push(op(Opcode::Exit));
        run_ops(instructions, "")
    }

    assert_eq!(dup_n(&[1, 2, 3], 0).unwrap().stack, [1, 2, 3, 3]);
    assert_eq!(dup_n(&[1, 2, 3], 2).unwrap().stack, [1, 2, 3, 1]);
    assert!(matches!(
        dup_n(&[1, 2, 3], 3),
        Err(InstructionFailed { error: OperationError::ValueStackTooSmall { required: 4, stack_len: 3 }, index: 3, .. })
    ));
    assert!(matches!(dup_n(&[1], i64::MAX), Err(InstructionFailed { error: OperationError::ValueStackTooSmall { .. }, .. })));
    // The parser never produces a negative count.
    assert!(matches!(dup_n(&[1], -1), Err(InstructionFailed { error: OperationError::UnknownInstruction, .. })));
}

#[test]
fn test_discard_n() {
    fn discard_n(initial_stack: &[i64], n: i64) -> Vec<i64> {
        let mut instructions: Vec<Instruction> = initial_stack.iter().map(|&n| push(n)).collect();
        instructions.push(with_number(Opcode::StackDiscardN, n));
        instructions.push(op(Opcode::Exit));
        run_ops(instructions, "").unwrap().stack
    }

    assert!(discard_n(&[], 3).is_empty());
    assert_eq!(discard_n(&[1, 2, 3], -1), [3]);
    assert_eq!(discard_n(&[1, 2, 3], 1), [1, 3]);
    assert_eq!(discard_n(&[1, 2, 3], 2), [3]);
    assert_eq!(discard_n(&[1, 2, 3], 10), [3]);
    assert_eq!(discard_n(&[1, 2, 3, 4, 5], 0), [1, 2, 3, 4, 5]);
}

#[test]
fn test_swap() {
    assert_eq!(run_op_err(&[], Opcode::StackSwap), OperationError::ValueStackTooSmall { required: 2, stack_len: 0 });
    assert_eq!(run_op_err(&[1], Opcode::StackSwap), OperationError::ValueStackTooSmall { required: 2, stack_len: 1 });
    assert_eq!(run_op(&[1, 2], Opcode::StackSwap), [2, 1]);
    assert_eq!(run_op(&[1, 2, 3], Opcode::StackSwap), [1, 3, 2]);
}

#[test]
fn test_discard_top() {
    assert_eq!(run_op_err(&[], Opcode::StackDiscardTop), OperationError::ValueStackEmpty);
    assert_eq!(run_op(&[1, 2], Opcode::StackDiscardTop), [1]);
}

#[test]
fn test_add_sub_mul() {
    for opcode in [Opcode::Add, Opcode::Subtract, Opcode::Multiply] {
        assert_eq!(run_op_err(&[], opcode), OperationError::ValueStackEmpty);
        assert_eq!(run_op_err(&[1], opcode), OperationError::ValueStackEmpty);
    }

    assert_eq!(run_op(&[1, 2, 3], Opcode::Add), [1, 5]);
    assert_eq!(run_op(&[7, 2], Opcode::Subtract), [5]);
    assert_eq!(run_op(&[2, 7], Opcode::Subtract), [-5]);
    assert_eq!(run_op(&[-3, 4], Opcode::Multiply), [-12]);

    // Two's complement wrapping
    assert_eq!(run_op(&[i64::MAX, 1], Opcode::Add), [i64::MIN]);
    assert_eq!(run_op(&[i64::MIN, 1], Opcode::Subtract), [i64::MAX]);
    assert_eq!(run_op(&[i64::MAX, 2], Opcode::Multiply), [-2]);
}

#[test]
fn test_divide() {
    assert_eq!(run_op(&[7, 2], Opcode::Divide), [3]);
    assert_eq!(run_op(&[-7, 2], Opcode::Divide), [-4]);
    assert_eq!(run_op(&[7, -2], Opcode::Divide), [-4]);
    assert_eq!(run_op(&[-7, -2], Opcode::Divide), [3]);
    assert_eq!(run_op(&[6, 3], Opcode::Divide), [2]);
    assert_eq!(run_op(&[0, 5], Opcode::Divide), [0]);
    assert_eq!(run_op(&[i64::MIN, -1], Opcode::Divide), [i64::MIN]);
    assert_eq!(run_op(&[i64::MIN, 1], Opcode::Divide), [i64::MIN]);

    assert_eq!(run_op_err(&[5, 0], Opcode::Divide), OperationError::DivisionByZero);
    // The divisor is checked before the dividend is popped.
    assert_eq!(run_op_err(&[0], Opcode::Divide), OperationError::DivisionByZero);
    assert_eq!(run_op_err(&[5], Opcode::Divide), OperationError::ValueStackEmpty);
    assert_eq!(run_op_err(&[], Opcode::Divide), OperationError::ValueStackEmpty);
}

#[test]
fn test_modulo() {
    assert_eq!(run_op(&[7, 2], Opcode::Modulo), [1]);
    assert_eq!(run_op(&[-7, 2], Opcode::Modulo), [1]);
    assert_eq!(run_op(&[7, -2], Opcode::Modulo), [-1]);
    assert_eq!(run_op(&[-7, -2], Opcode::Modulo), [-1]);
    assert_eq!(run_op(&[6, 3], Opcode::Modulo), [0]);
    assert_eq!(run_op(&[i64::MIN, -1], Opcode::Modulo), [0]);

    assert_eq!(run_op_err(&[5, 0], Opcode::Modulo), OperationError::DivisionByZero);
    assert_eq!(run_op_err(&[0], Opcode::Modulo), OperationError::DivisionByZero);
}

#[test]
fn test_floored_helpers() {
    for left in -20..20 {
        for right in (-7..7).filter(|&r| r != 0) {
            let q = floored_div(left, right);
            let m = floored_mod(left, right);
            assert_eq!(q * right + m, left);
            assert!(m == 0 || m.signum() == right.signum(), "{left} mod {right} = {m}");
        }
    }
}

#[test]
fn test_heap() {
    assert_eq!(run_op_err(&[], Opcode::HeapStore), OperationError::ValueStackTooSmall { required: 2, stack_len: 0 });
    assert_eq!(run_op_err(&[1], Opcode::HeapStore), OperationError::ValueStackTooSmall { required: 2, stack_len: 1 });
    assert_eq!(run_op(&[9, 1, 2], Opcode::HeapStore), [9]);

    assert_eq!(run_op_err(&[], Opcode::HeapLoad), OperationError::ValueStackEmpty);
    assert_eq!(run_op_err(&[4], Opcode::HeapLoad), OperationError::UndefinedHeapAccess { address: 4 });

    let stack = run_ops(
        vec![
            push(-3),
            push(42),
            op(Opcode::HeapStore),
            push(-3),
            push(43),
            op(Opcode::HeapStore),
            push(-3),
            op(Opcode::HeapLoad),
            op(Opcode::Exit),
        ],
        "",
    )
    .unwrap()
    .stack;
    assert_eq!(stack, [43]);
}

#[test]
fn test_output() {
    assert_eq!(output(with_stack(&[72], Opcode::OutputChar), ""), "H");
    assert_eq!(output(with_stack(&[-12], Opcode::OutputNum), ""), "-12");
    assert_eq!(output(with_stack(&[0x263A], Opcode::OutputChar), ""), "☺");
    assert_eq!(output(with_stack(&[328], Opcode::OutputChar), ""), "ň");
    assert_eq!(
        output(vec![push(10), push(105), push(72), op(Opcode::OutputChar), op(Opcode::OutputChar), op(Opcode::OutputChar), op(Opcode::Exit)], ""),
        "Hi\n"
    );
}

#[test]
fn test_output_on_empty_stack() {
    let result = run_ops(
        vec![push(65), op(Opcode::OutputChar), op(Opcode::OutputChar), push(66), op(Opcode::OutputChar), op(Opcode::Exit)],
        "",
    );
    assert_eq!(
        result.unwrap_err(),
        InstructionFailed {
            instruction: Opcode::OutputChar,
            index: 2,
            instruction_counter: 2,
            error: OperationError::ValueStackEmpty,
        }
    );
    assert_eq!(run_op_err(&[], Opcode::OutputNum), OperationError::ValueStackEmpty);
}

#[test]
fn test_input_char() {
    let read = vec![
        push(0),
        op(Opcode::InputChar),
        push(1),
        op(Opcode::InputChar),
        push(1),
        op(Opcode::HeapLoad),
        push(0),
        op(Opcode::HeapLoad),
        op(Opcode::Exit),
    ];
    assert_eq!(run_ops(read.clone(), "ab").unwrap().stack, ['b' as i64, 'a' as i64]);
    assert!(matches!(
        run_ops(read, "a"),
        Err(InstructionFailed { error: OperationError::EndOfInput, index: 3, .. })
    ));

    // The address is popped before reading.
    assert_eq!(run_op_err(&[], Opcode::InputChar), OperationError::ValueStackEmpty);
}

#[test]
fn test_input_num() {
    let read = vec![
        push(5),
        op(Opcode::InputNum),
        push(6),
        op(Opcode::InputNum),
        push(5),
        op(Opcode::HeapLoad),
        push(6),
        op(Opcode::HeapLoad),
        op(Opcode::Add),
        op(Opcode::OutputNum),
        op(Opcode::Exit),
    ];
    assert_eq!(output(read.clone(), "40\n2\n"), "42");
    assert_eq!(output(read.clone(), "0x10\n0b11"), "19");
    assert!(matches!(run_ops(read.clone(), "1\n"), Err(InstructionFailed { error: OperationError::EndOfInput, .. })));
    assert!(matches!(
        run_ops(read, "1\nabc\n"),
        Err(InstructionFailed { error: OperationError::NumberFormat { .. }, index: 3, .. })
    ));
}

#[test]
fn test_jump() {
    let result = run_ops(
        vec![
            flow(Opcode::Jump, "S"),
            push(1),
            flow(Opcode::Mark, "S"),
            push(2),
            op(Opcode::Exit),
        ],
        "",
    )
    .unwrap();
    assert_eq!(result.stack, [2]);
    assert_eq!(result.instruction_counter, 3);
    assert_eq!(result.instruction_pointer, 4);
}

#[test]
fn test_conditional_jumps_consume_value() {
    fn branch(value: i64, opcode: Opcode) -> Vec<i64> {
        run_ops(
            vec![
                push(7),
                push(value),
                flow(opcode, "T"),
                push(1),
                op(Opcode::Exit),
                flow(Opcode::Mark, "T"),
                push(2),
                op(Opcode::Exit),
            ],
            "",
        )
        .unwrap()
        .stack
    }

    assert_eq!(branch(0, Opcode::JumpIfZero), [7, 2]);
    assert_eq!(branch(1, Opcode::JumpIfZero), [7, 1]);
    assert_eq!(branch(-1, Opcode::JumpIfZero), [7, 1]);

    assert_eq!(branch(-1, Opcode::JumpIfNegative), [7, 2]);
    assert_eq!(branch(i64::MIN, Opcode::JumpIfNegative), [7, 2]);
    assert_eq!(branch(0, Opcode::JumpIfNegative), [7, 1]);
    assert_eq!(branch(1, Opcode::JumpIfNegative), [7, 1]);

    assert_eq!(run_ops(vec![flow(Opcode::JumpIfZero, "T"), op(Opcode::Exit)], "").unwrap_err().kind(), Some(&OperationError::ValueStackEmpty));
}

#[test]
fn test_missing_label() {
    let missing = OperationError::LabelDoesNotExist { label: label("TT") };
    assert_eq!(run_ops(vec![flow(Opcode::Jump, "TT"), op(Opcode::Exit)], "").unwrap_err().kind(), Some(&missing));
    assert_eq!(run_ops(vec![flow(Opcode::Call, "TT"), op(Opcode::Exit)], "").unwrap_err().kind(), Some(&missing));
    assert_eq!(run_ops(vec![push(0), flow(Opcode::JumpIfZero, "TT"), op(Opcode::Exit)], "").unwrap_err().kind(), Some(&missing));

    // Branches which are not taken do not look the label up.
    assert!(run_ops(vec![push(1), flow(Opcode::JumpIfZero, "TT"), op(Opcode::Exit)], "").is_ok());
    assert!(run_ops(vec![push(0), flow(Opcode::JumpIfNegative, "TT"), op(Opcode::Exit)], "").is_ok());
}

#[test]
fn test_call_and_return() {
    let result = run_ops(
        vec![
            flow(Opcode::Call, "S"),
            flow(Opcode::Call, "S"),
            op(Opcode::Exit),
            flow(Opcode::Mark, "S"),
            push(3),
            op(Opcode::OutputNum),
            op(Opcode::Return),
        ],
        "",
    )
    .unwrap();
    assert_eq!(result.output, "33");
    assert_eq!(result.instruction_pointer, 2);
    assert_eq!(result.instruction_counter, 9);
}

#[test]
fn test_return_without_call() {
    let error = run_ops(vec![op(Opcode::Return), op(Opcode::Exit)], "").unwrap_err();
    assert_eq!(error.kind(), Some(&OperationError::CallStackEmpty));
    assert!(error.kind().unwrap().is_stack_size_error());
}

#[test]
fn test_countdown_loop() {
    let result = run_ops(
        vec![
            push(3),
            flow(Opcode::Mark, "S"),
            op(Opcode::StackDupTop),
            op(Opcode::OutputNum),
            push(1),
            op(Opcode::Subtract),
            op(Opcode::StackDupTop),
            flow(Opcode::JumpIfZero, "T"),
            flow(Opcode::Jump, "S"),
            flow(Opcode::Mark, "T"),
            op(Opcode::Exit),
        ],
        "",
    )
    .unwrap();
    assert_eq!(result.output, "321");
    assert_eq!(result.stack, [0]);
}

#[test]
fn test_unclean_exit() {
    let unclean = InstructionFailed {
        instruction: Opcode::UncleanExit,
        index: 1,
        instruction_counter: 1,
        error: OperationError::UncleanExit,
    };
    assert_eq!(run_ops(vec![push(1), op(Opcode::UncleanExit)], "").unwrap_err(), unclean);
    // Running past the last instruction is reported the same way.
    assert_eq!(run_ops(vec![push(1)], "").unwrap_err(), unclean);
}

#[test]
fn test_malformed_instruction() {
    assert!(matches!(
        run_ops(vec![op(Opcode::StackPush), op(Opcode::Exit)], ""),
        Err(InstructionFailed { error: OperationError::UnknownInstruction, instruction: Opcode::StackPush, .. })
    ));
    assert!(matches!(
        run_ops(vec![op(Opcode::Jump), op(Opcode::Exit)], ""),
        Err(InstructionFailed { error: OperationError::UnknownInstruction, .. })
    ));
}

#[test]
fn test_op_limit() {
    let looping = program(vec![flow(Opcode::Mark, ""), flow(Opcode::Jump, ""), op(Opcode::Exit)]);
    assert_eq!(
        super::run(&looping, "", VMOptions::new(1000)).unwrap_err(),
        RunError::RunTooLong { instruction_counter: 1000 }
    );
    assert_eq!(super::run(&looping, "", VMOptions::new(1000)).unwrap_err().kind(), None);

    let short = program(vec![push(1), op(Opcode::Exit)]);
    assert!(super::run(&short, "", VMOptions::new(2)).is_ok());
    assert!(super::run(&short, "", VMOptions::new(1)).is_err());
}

#[test]
fn test_stack_size_errors() {
    assert!(OperationError::ValueStackEmpty.is_stack_size_error());
    assert!(OperationError::ValueStackTooSmall { required: 2, stack_len: 0 }.is_stack_size_error());
    assert!(OperationError::CallStackEmpty.is_stack_size_error());
    assert!(!OperationError::DivisionByZero.is_stack_size_error());
    assert!(!OperationError::UndefinedHeapAccess { address: 0 }.is_stack_size_error());
}

#[test]
fn test_parsed_hello() {
    // push 72, output char, exit
    let program = parse_program(&expand_notation("SSSTSSTSSSN TNSS NNN")).unwrap();
    assert_eq!(interpret(&program, ""), Ok("H".to_string()));
}

#[test]
fn test_error_message() {
    let error = run_ops(vec![push(1), push(0), op(Opcode::Divide), op(Opcode::Exit)], "").unwrap_err();
    assert_eq!(
        error.to_string(),
        "Instruction 2 (ARITHMETIC::DIVIDE) failed (instruction counter 2): Division by zero"
    );
    assert_eq!(
        OperationError::LabelDoesNotExist { label: label("ST") }.to_string(),
        "Label ST doesn't exist"
    );
}
