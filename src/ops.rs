//! The instruction model: opcodes, operands and labels.
use std::fmt;

use crate::token::{Token, TokenKind};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Opcode {
    StackPush,
    StackDupN,
    StackDiscardN,
    StackDupTop,
    StackSwap,
    StackDiscardTop,

    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    /// Pops a value and an address and stores the value at that address.
    HeapStore,
    /// Pops an address and pushes the value stored there.
    HeapLoad,

    OutputChar,
    OutputNum,
    InputChar,
    InputNum,

    Mark,
    Call,
    Jump,
    JumpIfZero,
    JumpIfNegative,
    Return,

    Exit,
    /// Appended by the parser when a program does not end with [`Opcode::Exit`].
    /// Executing it is always an error.
    UncleanExit,
}

impl Opcode {
    pub const ALL: [Opcode; 25] = [
        Opcode::StackPush,
        Opcode::StackDupN,
        Opcode::StackDiscardN,
        Opcode::StackDupTop,
        Opcode::StackSwap,
        Opcode::StackDiscardTop,
        Opcode::Add,
        Opcode::Subtract,
        Opcode::Multiply,
        Opcode::Divide,
        Opcode::Modulo,
        Opcode::HeapStore,
        Opcode::HeapLoad,
        Opcode::OutputChar,
        Opcode::OutputNum,
        Opcode::InputChar,
        Opcode::InputNum,
        Opcode::Mark,
        Opcode::Call,
        Opcode::Jump,
        Opcode::JumpIfZero,
        Opcode::JumpIfNegative,
        Opcode::Return,
        Opcode::Exit,
        Opcode::UncleanExit,
    ];

    /// Group-qualified name used in listings and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::StackPush => "STACK::PUSH",
            Opcode::StackDupN => "STACK::DUP::N",
            Opcode::StackDiscardN => "STACK::DISCARD::N",
            Opcode::StackDupTop => "STACK::DUP::TOP",
            Opcode::StackSwap => "STACK::SWAP",
            Opcode::StackDiscardTop => "STACK::DISCARD::TOP",
            Opcode::Add => "ARITHMETIC::ADD",
            Opcode::Subtract => "ARITHMETIC::SUB",
            Opcode::Multiply => "ARITHMETIC::MULTIPLICATE",
            Opcode::Divide => "ARITHMETIC::DIVIDE",
            Opcode::Modulo => "ARITHMETIC::MODULO",
            Opcode::HeapStore => "HEAP::POP",
            Opcode::HeapLoad => "HEAP::PUSH",
            Opcode::OutputChar => "OUTPUT::CHAR",
            Opcode::OutputNum => "OUTPUT::NUM",
            Opcode::InputChar => "INPUT::CHAR",
            Opcode::InputNum => "INPUT::NUM",
            Opcode::Mark => "FLOW::MARK",
            Opcode::Call => "FLOW::CALL",
            Opcode::Jump => "FLOW::JUMP::JMP",
            Opcode::JumpIfZero => "FLOW::JUMP::EZ",
            Opcode::JumpIfNegative => "FLOW::JUMP::LZ",
            Opcode::Return => "FLOW::RETURN",
            Opcode::Exit => "EXIT",
            Opcode::UncleanExit => "UNCLEAN::EXIT",
        }
    }

    /// The operand shape this opcode expects.
    pub fn operand_kind(self) -> OperandKind {
        match self {
            Opcode::StackPush | Opcode::StackDupN | Opcode::StackDiscardN => OperandKind::Number,
            Opcode::Mark | Opcode::Call | Opcode::Jump | Opcode::JumpIfZero | Opcode::JumpIfNegative => {
                OperandKind::Label
            }
            _ => OperandKind::None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An opaque jump target identifier.
///
/// Two labels are equal when their token kinds are equal, source positions do not matter.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Label(Vec<TokenKind>);

impl Label {
    pub fn new(kinds: Vec<TokenKind>) -> Self {
        Label(kinds)
    }

    pub fn from_tokens(tokens: &[Token]) -> Self {
        Label(tokens.iter().map(|t| t.kind).collect())
    }

    pub fn kinds(&self) -> &[TokenKind] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in &self.0 {
            write!(f, "{}", kind.letter())?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperandKind {
    None,
    Number,
    Label,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    None,
    Number(i64),
    Label(Label),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::None => OperandKind::None,
            Operand::Number(_) => OperandKind::Number,
            Operand::Label(_) => OperandKind::Label,
        }
    }
}

/// Token indices an instruction was parsed from, both ends inclusive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TokenRange {
    pub from: usize,
    pub to: usize,
}

impl TokenRange {
    pub fn new(from: usize, to: usize) -> Self {
        TokenRange { from, to }
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub range: TokenRange,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode, range: TokenRange) -> Self {
        Instruction { opcode, range, operand: Operand::None }
    }

    pub fn with_number(opcode: Opcode, range: TokenRange, number: i64) -> Self {
        Instruction { opcode, range, operand: Operand::Number(number) }
    }

    pub fn with_label(opcode: Opcode, range: TokenRange, label: Label) -> Self {
        Instruction { opcode, range, operand: Operand::Label(label) }
    }

    pub fn number(&self) -> Option<i64> {
        match self.operand {
            Operand::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<&Label> {
        match &self.operand {
            Operand::Label(label) => Some(label),
            _ => None,
        }
    }

    /// Whether the operand matches what the opcode expects.
    pub fn is_well_formed(&self) -> bool {
        self.opcode.operand_kind() == self.operand.kind()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}: {}", self.opcode, self.range)?;
        match &self.operand {
            Operand::None => write!(f, "]"),
            Operand::Number(n) => write!(f, "]->({n})"),
            Operand::Label(label) => write!(f, "]->({label})"),
        }
    }
}
