//! Host-side error type.
//!
//! [`Error`] is what bridge operations return to host code. When an error
//! crosses into script (a native hook or function failed) it becomes a
//! thrown value; when a script throw crosses into the host it becomes
//! [`Error::Script`].

use crate::root::Root;
use crate::value::Value;
use memory_manager::HeapError;
use std::fmt;
use thiserror::Error;

/// Result alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of bridge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine or context is unusable for this call (stale handle, root
    /// table exhausted, destroyed context).
    #[error("engine state error: {0}")]
    EngineState(String),
    /// Surfaces in script as `TypeError`.
    #[error("type error: {0}")]
    Type(String),
    /// Surfaces in script as `RangeError`.
    #[error("range error: {0}")]
    Range(String),
    /// The object carries no native payload.
    #[error("object is not a native object")]
    NotNative,
    /// The object's native payload has another type.
    #[error("wrong native class: expected {expected}, found {found}")]
    WrongClass {
        /// Requested type
        expected: String,
        /// Type actually stored
        found: String,
    },
    /// `load_into` was called on an already associated native object, or the
    /// target object already has a payload.
    #[error("native object is already associated with a script object")]
    AlreadyAssociated,
    /// A call was attempted on something that cannot be called.
    #[error("{0} is not callable")]
    NotCallable(String),
    /// A native object refused to delete a property.
    #[error("cannot delete property {0}")]
    CannotDelete(String),
    /// A script exception reached host code.
    #[error(transparent)]
    Script(#[from] ScriptException),
    /// Uncatchable termination.
    #[error("script execution terminated")]
    Quit,
}

impl Error {
    /// Name given to the script error object this error turns into.
    ///
    /// # Examples
    ///
    /// ```
    /// use bridge::Error;
    ///
    /// assert_eq!(Error::NotNative.kind_name(), "NotNativeError");
    /// assert_eq!(Error::Range("x".into()).kind_name(), "RangeError");
    /// ```
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::EngineState(_) => "EngineStateError",
            Error::Type(_) => "TypeError",
            Error::Range(_) => "RangeError",
            Error::NotNative => "NotNativeError",
            Error::WrongClass { .. } => "WrongClassError",
            Error::AlreadyAssociated => "AlreadyAssociatedError",
            Error::NotCallable(_) => "NotCallableError",
            Error::CannotDelete(_) => "CannotDeleteError",
            Error::Script(_) => "ScriptError",
            Error::Quit => "Quit",
        }
    }

    /// Message used for the script error object.
    pub fn script_message(&self) -> String {
        match self {
            Error::EngineState(m) | Error::Type(m) | Error::Range(m) => m.clone(),
            Error::Script(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }
}

impl From<HeapError> for Error {
    fn from(error: HeapError) -> Self {
        Error::EngineState(error.to_string())
    }
}

/// A script throw seen from the host.
///
/// Holds the thrown value rooted, so it can be inspected or rethrown later.
pub struct ScriptException {
    value: Root<Value>,
    message: String,
    file: Option<String>,
    line: Option<u32>,
}

impl ScriptException {
    pub(crate) fn new(value: Root<Value>, message: String, file: Option<String>, line: Option<u32>) -> Self {
        Self {
            value,
            message,
            file,
            line,
        }
    }

    /// The thrown value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// `name: message` for error objects, the string conversion otherwise.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// `fileName` of the error object.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// `lineNumber` of the error object.
    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file, line, self.message),
            (Some(file), None) => write!(f, "{}: {}", file, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl fmt::Debug for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptException")
            .field("message", &self.message)
            .field("file", &self.file)
            .field("line", &self.line)
            .finish()
    }
}

impl std::error::Error for ScriptException {}
