//! Turning a token stream into instructions with resolved label addresses.
use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::get_config;
use crate::ops::{Instruction, Label, Opcode, Operand, TokenRange};
use crate::token::{tokenize, Token, TokenKind};


#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Error at {token}: {reason}")]
    NumberFormat { token: Token, reason: &'static str },
    #[error("Label {label} already exists")]
    LabelAlreadyExists { label: Label },
    #[error("Error at {token}: Unexpected {} token", token.kind)]
    UnexpectedToken { token: Token },
    /// A token kind the grammar has no branch for. The tokenizer only produces the
    /// three known kinds, so this does not occur for tokenized source.
    #[error("Unknown token type found at {position}")]
    UnknownToken { position: usize },
    /// `position` is the token index at which more tokens were needed.
    #[error("Unexpected end of input at {position}")]
    UnexpectedEndOfInput { position: usize },
}

/// The parsed program: instructions and the address of every label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsingResult {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) labels: HashMap<Label, usize>,
}

impl ParsingResult {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn labels(&self) -> &HashMap<Label, usize> {
        &self.labels
    }

    /// Index of the [`Opcode::Mark`] instruction defining `label`.
    pub fn label_address(&self, label: &Label) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn next(&mut self) -> Result<Token, CompileError> {
        let token = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or(CompileError::UnexpectedEndOfInput { position: self.pos })?;
        self.pos += 1;
        Ok(token)
    }

    /// Index of the last consumed token.
    fn last(&self) -> usize {
        self.pos.saturating_sub(1)
    }

    /// Reads a sign token followed by binary digits (most significant first) up to a NEWLINE.
    fn number(&mut self) -> Result<i64, CompileError> {
        let sign = self.next()?;
        let negative = match sign.kind {
            TokenKind::Space => false,
            TokenKind::Tab => true,
            TokenKind::Newline => {
                return Err(CompileError::NumberFormat {
                    token: sign,
                    reason: "Number can't start with a NEWLINE",
                })
            }
        };

        let mut magnitude: u64 = 0;
        loop {
            let token = self.next()?;
            let bit = match token.kind {
                TokenKind::Newline => break,
                TokenKind::Space => 0,
                TokenKind::Tab => 1,
            };
            magnitude = magnitude
                .checked_mul(2)
                .and_then(|m| m.checked_add(bit))
                .ok_or(CompileError::NumberFormat { token, reason: "Number does not fit into 64 bits" })?;
        }

        let value = if negative {
            0i64.checked_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).ok()
        };
        value.ok_or(CompileError::NumberFormat { token: sign, reason: "Number does not fit into 64 bits" })
    }

    /// Reads tokens up to a NEWLINE. The terminator is consumed but is not part of the label.
    fn label(&mut self) -> Result<Label, CompileError> {
        let start = self.pos;
        while self.next()?.kind != TokenKind::Newline {}
        Ok(Label::from_tokens(&self.tokens[start..self.last()]))
    }
}

fn unexpected(token: Token) -> CompileError {
    CompileError::UnexpectedToken { token }
}

fn parse_instruction(cursor: &mut Cursor) -> Result<Instruction, CompileError> {
    use TokenKind::{Newline as N, Space as S, Tab as T};

    let start = cursor.pos;
    let (opcode, operand) = match cursor.next()?.kind {
        // Stack manipulation
        S => match cursor.next()?.kind {
            S => (Opcode::StackPush, Operand::Number(cursor.number()?)),
            T => {
                let selector = cursor.next()?;
                match selector.kind {
                    S => {
                        let sign_pos = cursor.pos;
                        let n = cursor.number()?;
                        if n < 0 {
                            return Err(CompileError::NumberFormat {
                                token: cursor.tokens[sign_pos],
                                reason: "Number must not be negative",
                            });
                        }
                        (Opcode::StackDupN, Operand::Number(n))
                    }
                    N => (Opcode::StackDiscardN, Operand::Number(cursor.number()?)),
                    T => return Err(unexpected(selector)),
                }
            }
            N => match cursor.next()?.kind {
                S => (Opcode::StackDupTop, Operand::None),
                T => (Opcode::StackSwap, Operand::None),
                N => (Opcode::StackDiscardTop, Operand::None),
            },
        },
        // Arithmetic, heap access and I/O
        T => {
            let group = cursor.next()?;
            match group.kind {
                S => {
                    let selector = cursor.next()?;
                    if selector.kind == N {
                        return Err(unexpected(selector));
                    }
                    let t = cursor.next()?;
                    match (selector.kind, t.kind) {
                        (S, S) => (Opcode::Add, Operand::None),
                        (S, T) => (Opcode::Subtract, Operand::None),
                        (S, N) => (Opcode::Multiply, Operand::None),
                        (T, S) => (Opcode::Divide, Operand::None),
                        (T, T) => (Opcode::Modulo, Operand::None),
                        _ => return Err(unexpected(t)),
                    }
                }
                T => {
                    let t = cursor.next()?;
                    match t.kind {
                        S => (Opcode::HeapStore, Operand::None),
                        T => (Opcode::HeapLoad, Operand::None),
                        N => return Err(unexpected(t)),
                    }
                }
                N => {
                    let selector = cursor.next()?;
                    if selector.kind == N {
                        return Err(unexpected(selector));
                    }
                    let t = cursor.next()?;
                    match (selector.kind, t.kind) {
                        (S, S) => (Opcode::OutputChar, Operand::None),
                        (S, T) => (Opcode::OutputNum, Operand::None),
                        (T, S) => (Opcode::InputChar, Operand::None),
                        (T, T) => (Opcode::InputNum, Operand::None),
                        _ => return Err(unexpected(t)),
                    }
                }
            }
        }
        // Flow control
        N => match cursor.next()?.kind {
            S => {
                let selector = cursor.next()?;
                let label = Operand::Label(cursor.label()?);
                match selector.kind {
                    S => (Opcode::Mark, label),
                    T => (Opcode::Call, label),
                    N => (Opcode::Jump, label),
                }
            }
            T => match cursor.next()?.kind {
                S => (Opcode::JumpIfZero, Operand::Label(cursor.label()?)),
                T => (Opcode::JumpIfNegative, Operand::Label(cursor.label()?)),
                N => (Opcode::Return, Operand::None),
            },
            N => {
                let t = cursor.next()?;
                match t.kind {
                    N => (Opcode::Exit, Operand::None),
                    S | T => return Err(unexpected(t)),
                }
            }
        },
    };

    Ok(Instruction { opcode, range: TokenRange::new(start, cursor.last()), operand })
}

/// Parses a token stream into a program.
///
/// The returned instruction list always ends with [`Opcode::Exit`] or [`Opcode::UncleanExit`].
///
/// # Example
/// ```
/// use whitespace::ops::Opcode;
/// use whitespace::parser::parse;
/// use whitespace::token::tokenize;
///
/// // push 1, exit
/// let program = parse(&tokenize("   \t\n\n\n\n")).unwrap();
/// assert_eq!(program.instructions()[0].opcode, Opcode::StackPush);
/// assert_eq!(program.instructions()[0].number(), Some(1));
/// assert_eq!(program.instructions()[1].opcode, Opcode::Exit);
/// ```
pub fn parse(tokens: &[Token]) -> Result<ParsingResult, CompileError> {
    let mut cursor = Cursor::new(tokens);
    let mut instructions: Vec<Instruction> = Vec::new();
    let mut labels: HashMap<Label, usize> = HashMap::default();

    while !cursor.is_at_end() {
        let instruction = parse_instruction(&mut cursor)?;
        if let (Opcode::Mark, Some(label)) = (instruction.opcode, instruction.label()) {
            match labels.entry(label.clone()) {
                Entry::Occupied(_) => {
                    return Err(CompileError::LabelAlreadyExists { label: label.clone() })
                }
                Entry::Vacant(entry) => {
                    entry.insert(instructions.len());
                }
            }
        }
        instructions.push(instruction);
    }

    if instructions.last().map_or(true, |i| i.opcode != Opcode::Exit) {
        let end = cursor.pos;
        instructions.push(Instruction::new(Opcode::UncleanExit, TokenRange::new(end, end)));
    }

    debug!(instructions = instructions.len(), labels = labels.len(), "parsed program");
    let dump = get_config().dump_program;
    for (index, instruction) in instructions.iter().enumerate() {
        if dump {
            debug!(index, "{instruction}");
        } else {
            trace!(index, "{instruction}");
        }
    }

    Ok(ParsingResult { instructions, labels })
}

/// Tokenizes and parses source text.
pub fn parse_program(text: &str) -> Result<ParsingResult, CompileError> {
    parse(&tokenize(text))
}
