//! Typed failures of the record/compare/score core.
//!
//! Orchestration code wraps these in [`anyhow::Error`]; callers that need to
//! branch on the cause can downcast.

use std::io;

use thiserror::Error;

use crate::joint::JointId;

/// A pattern log line that could not be understood. `line` is 1-based.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: expected 5 ';'-separated fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: unknown joint '{token}'")]
    UnknownJoint { line: usize, token: String },

    #[error("line {line}: invalid {field} value '{value}'")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("line {line}: not valid UTF-8")]
    InvalidEncoding { line: usize },
}

#[derive(Error, Debug)]
pub enum PatternStoreError {
    #[error("malformed pattern log: {0}")]
    Parse(#[from] ParseError),

    #[error("pattern log I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Refused before anything was written, so the log stays loadable.
    #[error("{joint} has a non-finite coordinate")]
    NonFinite { joint: JointId },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No live frames were processed, so scores are undefined.
    #[error("exercise session processed no frames")]
    EmptySession,
}
