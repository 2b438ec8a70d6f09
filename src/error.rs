//! Error types for the policy engine.
//!
//! Two kinds of failure come out of a user policy and they are kept apart:
//!
//! - [`CompileError`] is *expected*: the source text is malformed.  It is
//!   returned synchronously from attach / validate so an editor can reject
//!   the change.
//! - [`RuntimeFault`] is *unexpected*: a compiled policy failed while it
//!   was being evaluated.  It never leaves the execution loop; it is turned
//!   into the fail-safe result there.
//!
//! Storage and configuration errors live next to their port traits in
//! [`crate::app::ports`].

use core::fmt;

// ---------------------------------------------------------------------------
// Compile errors
// ---------------------------------------------------------------------------

/// Policy source could not be turned into an invocable policy.
///
/// `line` and `column` are 1-based; both are 0 when the compiler cannot
/// attribute the error to a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    pub fn at(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
        }
    }
}

impl std::error::Error for CompileError {}

// ---------------------------------------------------------------------------
// Runtime faults
// ---------------------------------------------------------------------------

/// A compiled policy failed during invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFault {
    pub message: String,
}

impl RuntimeFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RuntimeFault {}

/// A lazily compiled policy that fails to compile during a tick is a fault
/// of that tick, not a user-facing error.
impl From<CompileError> for RuntimeFault {
    fn from(e: CompileError) -> Self {
        Self::new(format!("compile failed: {e}"))
    }
}
