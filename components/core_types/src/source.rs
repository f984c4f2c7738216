//! Source positions and stack frames for error reporting.

use std::fmt;

/// A position in script source.
///
/// Lines and columns are 1-based; the offset counts characters from the
/// start of the source.
///
/// # Examples
///
/// ```
/// use core_types::SourcePosition;
///
/// let pos = SourcePosition::new(10, 5, 150);
/// assert_eq!(pos.line, 10);
/// assert_eq!(pos.to_string(), "10:5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
    /// Character offset from the start of the source
    pub offset: usize,
}

impl SourcePosition {
    /// Create a position.
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single frame in a script call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the function, or None for anonymous functions
    pub function_name: Option<String>,
    /// File name of the source, or None if not available
    pub source_url: Option<String>,
    /// Line number where the call occurred
    pub line: u32,
    /// Column number where the call occurred
    pub column: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.function_name.as_deref().unwrap_or("<anonymous>");
        let file = self.source_url.as_deref().unwrap_or("<unknown>");
        write!(f, "{}@{}:{}", name, file, self.line)
    }
}
