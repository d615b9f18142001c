//! Sequential reading of the program's input stream.
use super::OperationError;

/// A cursor over the input text. Characters are consumed front to back.
#[derive(Debug, Clone)]
pub struct Input<'a> {
    rest: &'a str,
}

impl<'a> Input<'a> {
    pub fn new(text: &'a str) -> Self {
        Input { rest: text }
    }

    /// The part of the input which has not been read yet.
    pub fn remaining(&self) -> &'a str {
        self.rest
    }

    pub fn read_char(&mut self) -> Result<char, OperationError> {
        let mut chars = self.rest.chars();
        let c = chars.next().ok_or(OperationError::EndOfInput)?;
        self.rest = chars.as_str();
        Ok(c)
    }

    /// Reads up to the next newline, which is consumed but not returned.
    pub fn read_line(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let (line, rest) = self.rest.split_once('\n').unwrap_or((self.rest, ""));
        self.rest = rest;
        Some(line)
    }

    /// Reads one line and parses it with [`parse_number`]. An empty line counts as the end of input.
    pub fn read_number(&mut self) -> Result<i64, OperationError> {
        match self.read_line() {
            None | Some("") => Err(OperationError::EndOfInput),
            Some(line) => parse_number(line),
        }
    }
}

/// Parses a number typed by the user.
///
/// Accepts `0`, hexadecimal `0x..`, binary `0b..`, octal with a leading `0` and
/// (optionally signed) decimal numbers. Surrounding whitespace is ignored, but the
/// whole line must be a number: `12abc` is rejected rather than read as 12.
///
/// ```
/// use whitespace::vm::input::parse_number;
///
/// assert_eq!(parse_number("0x1f"), Ok(31));
/// assert_eq!(parse_number("017"), Ok(15));
/// assert_eq!(parse_number("-12"), Ok(-12));
/// assert!(parse_number("0x").is_err());
/// ```
pub fn parse_number(text: &str) -> Result<i64, OperationError> {
    let trimmed = text.trim();
    let parsed = if trimmed == "0" {
        Ok(0)
    } else if let Some(hex) = trimmed.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = trimmed.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else if let Some(oct) = trimmed.strip_prefix('0') {
        i64::from_str_radix(oct, 8)
    } else {
        trimmed.parse::<i64>()
    };
    parsed.map_err(|_| OperationError::NumberFormat { input: text.to_string() })
}
