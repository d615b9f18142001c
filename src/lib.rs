//! # whitespace
//! An interpreter for [Whitespace](https://en.wikipedia.org/wiki/Whitespace_(programming_language)),
//! a stack-based language whose only significant characters are space, tab and newline.
//!
//! Running a program goes through three stages:
//! - [`token::tokenize`] drops every character which is not whitespace,
//! - [`parser::parse`] turns the tokens into [`ops::Instruction`]s and resolves labels,
//! - [`vm::run`] executes the instructions against a fresh [`vm::context::Context`].
//!
//! [`run_source`] does all of that in one call:
//! ```
//! use whitespace::run_source;
//! use whitespace::token::expand_notation;
//!
//! // push 72, output char, exit
//! let code = expand_notation("SSSTSSTSSSN TNSS NNN");
//! assert_eq!(run_source(&code, "").unwrap(), "H");
//! ```
use thiserror::Error;

pub mod config;
pub mod ops;
pub mod parser;
pub mod token;
pub mod vm;

use parser::CompileError;
use vm::RunError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RunError),
}

/// Parses and runs `code`, returning everything it printed.
pub fn run_source(code: &str, input: &str) -> Result<String, Error> {
    let program = parser::parse_program(code)?;
    Ok(vm::interpret(&program, input)?)
}
