//! Engine error types.
//!
//! These mirror the script-visible error constructors. They are used for
//! failures detected before a script value exists to carry them, most
//! notably syntax errors from the parser.

use crate::{SourcePosition, StackFrame};
use std::fmt;

/// The kind of engine error.
///
/// These correspond to the script-visible error constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Syntax error in script source
    SyntaxError,
    /// Type error (e.g., calling a non-function)
    TypeError,
    /// Reference to an undefined variable
    ReferenceError,
    /// Value out of allowed range
    RangeError,
    /// Error in eval() function
    EvalError,
    /// Error in URI handling functions
    URIError,
    /// Internal engine error
    InternalError,
}

impl ErrorKind {
    /// Name of the script constructor for this kind.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::URIError => "URIError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An engine error with message and stack trace.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError, SourcePosition};
///
/// let error = JsError::new(ErrorKind::SyntaxError, "Unexpected token")
///     .with_position(SourcePosition::new(3, 7, 40));
///
/// assert_eq!(error.message, "Unexpected token");
/// assert_eq!(error.to_string(), "SyntaxError: Unexpected token (3:7)");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Stack trace (call stack at the time of the error)
    pub stack: Vec<StackFrame>,
    /// Source position where the error occurred
    pub source_position: Option<SourcePosition>,
}

impl JsError {
    /// Create an error without position or stack information.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            stack: vec![],
            source_position: None,
        }
    }

    /// Attach a source position.
    pub fn with_position(mut self, position: SourcePosition) -> Self {
        self.source_position = Some(position);
        self
    }

    /// Line of the error, if known.
    pub fn line(&self) -> Option<u32> {
        self.source_position.as_ref().map(|p| p.line)
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(pos) = &self.source_position {
            write!(f, " ({})", pos)?;
        }
        Ok(())
    }
}

impl std::error::Error for JsError {}
