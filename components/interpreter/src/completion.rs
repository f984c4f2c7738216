//! Completion records for statement execution.

use core_types::Value;
use memory_manager::HeapError;
use std::fmt;

/// Abrupt completion that unwinds through expressions and calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Abrupt {
    /// A script exception
    Throw(Value),
    /// Uncatchable termination; `catch` and `finally` blocks do not run
    Quit,
    /// A heap handle was stale or of the wrong kind
    Engine(HeapError),
}

impl From<HeapError> for Abrupt {
    fn from(e: HeapError) -> Self {
        Abrupt::Engine(e)
    }
}

impl fmt::Display for Abrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abrupt::Throw(v) => write!(f, "uncaught exception: {:?}", v),
            Abrupt::Quit => f.write_str("script terminated"),
            Abrupt::Engine(e) => write!(f, "engine error: {}", e),
        }
    }
}

/// Result of evaluating an expression.
pub type EvalResult<T = Value> = Result<T, Abrupt>;

/// Normal and loop-control completions of a statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Completion {
    /// Fell through, with the value of the last expression statement
    Normal(Option<Value>),
    /// `return`
    Return(Value),
    /// `break`
    Break,
    /// `continue`
    Continue,
}

impl Completion {
    pub(crate) fn value(&self) -> Option<Value> {
        match self {
            Completion::Normal(v) => *v,
            Completion::Return(v) => Some(*v),
            _ => None,
        }
    }
}
