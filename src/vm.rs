//! Functions for executing parsed Whitespace programs.
use num_integer::Integer;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::get_config;
use crate::ops::{Instruction, Label, Opcode};
use crate::parser::ParsingResult;

pub mod context;
pub mod input;

#[cfg(test)]
mod tests;

use context::Context;
use input::Input;

/// An error that can occur during the execution of a single instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationError {
    #[error("Value stack is empty")]
    ValueStackEmpty,
    #[error("Expected value stack to be at least {required}, but is only {stack_len}")]
    ValueStackTooSmall { required: usize, stack_len: usize },
    #[error("Call stack is empty")]
    CallStackEmpty,
    #[error("Heap address {address} is undefined")]
    UndefinedHeapAccess { address: i64 },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid number in input: {input:?}")]
    NumberFormat { input: String },
    #[error("Label {label} doesn't exist")]
    LabelDoesNotExist { label: Label },
    /// The instruction's operand does not fit its opcode.
    #[error("Unknown or malformed instruction")]
    UnknownInstruction,
    #[error("Instruction pointer ran past the last instruction")]
    UncleanExit,
    #[error("Unexpected end of input")]
    EndOfInput,
}

impl OperationError {
    /// Whether this is one of the errors caused by a stack holding too few elements.
    pub fn is_stack_size_error(&self) -> bool {
        matches!(
            self,
            Self::ValueStackEmpty | Self::ValueStackTooSmall { .. } | Self::CallStackEmpty
        )
    }
}

#[derive(Debug)]
enum Effect {
    None,
    /// Continue after the instruction at this index.
    Jump(usize),
    Exit,
}

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct VMOptions {
    /// The maximum number of instructions to run, if this is reached,
    /// the program will stop with an error.
    ///
    /// Set to [`u64::MAX`] to disable this limit.
    max_op_count: u64,
}

impl VMOptions {
    pub fn new(max_op_count: u64) -> Self {
        Self { max_op_count }
    }
}

impl Default for VMOptions {
    /// Uses the limit from `WHITESPACE_OP_LIMIT`, unlimited if unset.
    fn default() -> Self {
        Self { max_op_count: get_config().op_limit }
    }
}

/// An error that happened while running a program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    /// A specific instruction failed.
    #[error("Instruction {index} ({instruction}) failed (instruction counter {instruction_counter}): {error}")]
    InstructionFailed {
        /// The instruction which failed.
        instruction: Opcode,
        /// The 0-based index of this instruction in the parsed program.
        index: usize,
        /// The number of instructions which have been run before this one.
        /// May differ from index in case of loops/jumps being present.
        instruction_counter: u64,
        /// The specific error within the instruction.
        error: OperationError,
    },
    /// The program executed more instructions than the limit specified within [`VMOptions`].
    #[error("The program ran for too long ({instruction_counter} instructions had been run).")]
    RunTooLong {
        /// The number of instructions which have been run
        instruction_counter: u64,
    },
}

impl RunError {
    /// The kind of failure, if an instruction failed.
    pub fn kind(&self) -> Option<&OperationError> {
        match self {
            RunError::InstructionFailed { error, .. } => Some(error),
            RunError::RunTooLong { .. } => None,
        }
    }
}

/// The successful result of running a program.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Everything the program printed.
    pub output: String,
    /// The value stack after the program has exited.
    pub stack: Vec<i64>,
    /// The number of instructions which have been run, including the final exit.
    pub instruction_counter: u64,
    /// Index of the exit instruction which ended the program.
    pub instruction_pointer: usize,
}

/// The internal state of the VM.
struct State<'a> {
    program: &'a ParsingResult,
    context: Context,
    input: Input<'a>,
    output: String,
    ip: usize,
    instructions_run: u64,
}

fn number_operand(instruction: &Instruction) -> Result<i64, OperationError> {
    instruction.number().ok_or(OperationError::UnknownInstruction)
}

fn label_operand(instruction: &Instruction) -> Result<&Label, OperationError> {
    instruction.label().ok_or(OperationError::UnknownInstruction)
}

/// Floored division. `i64::MIN / -1` wraps around to `i64::MIN`.
pub(crate) fn floored_div(left: i64, right: i64) -> i64 {
    if right == -1 {
        left.wrapping_neg()
    } else {
        left.div_floor(&right)
    }
}

/// Floored modulo, the result has the sign of `right`.
pub(crate) fn floored_mod(left: i64, right: i64) -> i64 {
    if right == -1 {
        0
    } else {
        left.mod_floor(&right)
    }
}

impl<'a> State<'a> {
    fn new(program: &'a ParsingResult, input: &'a str) -> Self {
        State {
            program,
            context: Context::new(),
            input: Input::new(input),
            output: String::new(),
            ip: 0,
            instructions_run: 0,
        }
    }

    fn resolve(&self, label: &Label) -> Result<usize, OperationError> {
        self.program
            .label_address(label)
            .ok_or_else(|| OperationError::LabelDoesNotExist { label: label.clone() })
    }

    fn binary(&mut self, op: impl FnOnce(i64, i64) -> i64) -> Result<(), OperationError> {
        let right = self.context.pop_num()?;
        let left = self.context.pop_num()?;
        self.context.push_num(op(left, right));
        Ok(())
    }

    fn division(&mut self, op: impl FnOnce(i64, i64) -> i64) -> Result<(), OperationError> {
        let right = self.context.pop_num()?;
        if right == 0 {
            return Err(OperationError::DivisionByZero);
        }
        let left = self.context.pop_num()?;
        self.context.push_num(op(left, right));
        Ok(())
    }

    fn apply(&mut self, instruction: &Instruction) -> Result<Effect, OperationError> {
        let ctx = &mut self.context;
        match instruction.opcode {
            Opcode::StackPush => ctx.push_num(number_operand(instruction)?),
            Opcode::StackDupN => {
                let n = number_operand(instruction)?;
                if n < 0 {
                    return Err(OperationError::UnknownInstruction);
                }
                ctx.dup_n(usize::try_from(n).unwrap_or(usize::MAX))?;
            }
            Opcode::StackDiscardN => ctx.discard_n(number_operand(instruction)?),
            Opcode::StackDupTop => ctx.dup_top()?,
            Opcode::StackSwap => ctx.swap_top()?,
            Opcode::StackDiscardTop => ctx.discard_top()?,

            Opcode::Add => self.binary(i64::wrapping_add)?,
            Opcode::Subtract => self.binary(i64::wrapping_sub)?,
            Opcode::Multiply => self.binary(i64::wrapping_mul)?,
            Opcode::Divide => self.division(floored_div)?,
            Opcode::Modulo => self.division(floored_mod)?,

            Opcode::HeapStore => {
                ctx.require(2)?;
                let value = ctx.pop_num()?;
                let address = ctx.pop_num()?;
                ctx.heap_store(address, value);
            }
            Opcode::HeapLoad => {
                let address = ctx.pop_num()?;
                let value = ctx.heap_load(address)?;
                ctx.push_num(value);
            }

            Opcode::OutputChar => {
                let c = ctx.pop_char()?;
                self.output.push(c);
            }
            Opcode::OutputNum => {
                let n = ctx.pop_num()?;
                self.output.push_str(&n.to_string());
            }
            Opcode::InputChar => {
                let address = ctx.pop_num()?;
                let c = self.input.read_char()?;
                self.context.heap_store(address, c as i64);
            }
            Opcode::InputNum => {
                let address = ctx.pop_num()?;
                let n = self.input.read_number()?;
                self.context.heap_store(address, n);
            }

            Opcode::Mark => {}
            Opcode::Call => {
                let target = self.resolve(label_operand(instruction)?)?;
                self.context.call(self.ip);
                return Ok(Effect::Jump(target));
            }
            Opcode::Jump => {
                return Ok(Effect::Jump(self.resolve(label_operand(instruction)?)?));
            }
            Opcode::JumpIfZero => {
                let label = label_operand(instruction)?;
                if ctx.pop_num()? == 0 {
                    return Ok(Effect::Jump(self.resolve(label)?));
                }
            }
            Opcode::JumpIfNegative => {
                let label = label_operand(instruction)?;
                if ctx.pop_num()? < 0 {
                    return Ok(Effect::Jump(self.resolve(label)?));
                }
            }
            Opcode::Return => return Ok(Effect::Jump(ctx.ret()?)),

            Opcode::Exit => return Ok(Effect::Exit),
            Opcode::UncleanExit => return Err(OperationError::UncleanExit),
        }

        Ok(Effect::None)
    }
}

/// Run a parsed program with the given input and options.
///
/// # Example
/// ```
/// use whitespace::parser::parse_program;
/// use whitespace::token::expand_notation;
/// use whitespace::vm::{run, VMOptions};
///
/// // push 72, output char, exit
/// let program = parse_program(&expand_notation("SSSTSSTSSSN TNSS NNN")).unwrap();
/// let result = run(&program, "", VMOptions::new(u64::MAX)).unwrap();
/// assert_eq!(result.output, "H");
/// assert_eq!(result.instruction_counter, 3);
/// ```
pub fn run(program: &ParsingResult, input: &str, options: VMOptions) -> Result<RunResult, RunError> {
    let mut s = State::new(program, input);
    debug!(instructions = program.len(), input_len = input.len(), "starting program");
    run_state(&mut s, &options)?;
    debug!(
        instruction_counter = s.instructions_run,
        output_len = s.output.len(),
        "program exited"
    );
    Ok(RunResult {
        output: s.output,
        stack: s.context.into_stack(),
        instruction_counter: s.instructions_run,
        instruction_pointer: s.ip,
    })
}

/// Run a parsed program and return its output.
pub fn interpret(program: &ParsingResult, input: &str) -> Result<String, RunError> {
    run(program, input, VMOptions::default()).map(|result| result.output)
}

fn run_state(s: &mut State, options: &VMOptions) -> Result<(), RunError> {
    let program = s.program;
    loop {
        if s.instructions_run >= options.max_op_count {
            return Err(RunError::RunTooLong { instruction_counter: s.instructions_run });
        }

        let ip = s.ip;
        let instruction_counter = s.instructions_run;
        let build_err = |instruction: Opcode, error| RunError::InstructionFailed {
            instruction,
            index: ip,
            instruction_counter,
            error,
        };

        // Running off the end is the same as reaching the unclean exit the parser appends.
        let Some(instruction) = program.instructions.get(ip) else {
            return Err(build_err(Opcode::UncleanExit, OperationError::UncleanExit));
        };

        trace!(ip, opcode = %instruction.opcode, stack = s.context.stack().len(), "executing");
        let result = s.apply(instruction);
        s.instructions_run += 1;

        match result {
            Err(error) => return Err(build_err(instruction.opcode, error)),
            Ok(Effect::None) => s.ip += 1,
            Ok(Effect::Jump(target)) => {
                debug!(from = ip, to = target, opcode = %instruction.opcode, "branching");
                s.ip = target + 1;
            }
            Ok(Effect::Exit) => return Ok(()),
        }
    }
}
