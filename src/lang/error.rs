use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

/// Everything that can go wrong while evaluating a DNCL statement.
///
/// Each variant carries the offending text so the runtime can report it
/// alongside the line it came from.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid character '{ch}' in formula '{formula}'")]
    InvalidCharacter { ch: char, formula: String },

    #[error("unknown operator '{0}'")]
    UnknownOperator(char),

    #[error("division by zero")]
    DivisionByZero,

    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("index {index} out of range for '{name}' (length {len})")]
    IndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    #[error("malformed expression '{0}'")]
    MalformedExpression(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("numeric overflow computing '{0}'")]
    Overflow(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
