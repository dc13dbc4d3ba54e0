//! Error taxonomy for lexing, value parsing, message (de)serialization and
//! framing: a fine-grained parse error plus a framing error for the
//! byte-stream layer.

use thiserror::Error;

/// A malformed command/reply line: non-UTF-8 bytes or an unterminated quote
/// both collapse to this, since neither is recoverable mid-line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("line is not valid UTF-8")]
    NotUtf8,
    #[error("unterminated quoted string")]
    UnterminatedQuote,
    #[error("empty line")]
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("malformed {kind} literal: {raw:?}")]
    Malformed { kind: &'static str, raw: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageDecodeError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("line exceeds the 512-byte limit")]
    LineTooLong,
}

#[derive(Debug, Error)]
pub enum FramerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line exceeds the 512-byte limit")]
    LineTooLong,
    #[error("connection closed by peer")]
    Closed,
}
