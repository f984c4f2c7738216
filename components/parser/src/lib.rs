//! Script parser
//!
//! Provides the lexer, recursive descent parser and AST for the script
//! language the interpreter runs: ES3-style statements and expressions with
//! `let`/`const` declarations and object literal accessors.
//!
//! # Overview
//!
//! - [`Lexer`] - Tokenizes source code, tracking line breaks for semicolon insertion
//! - [`Token`] - Token types including identifiers, literals, keywords
//! - [`Parser`] - Recursive descent parser producing a [`Program`]
//! - [`Statement`] / [`Expression`] - AST node types
//!
//! # Example
//!
//! ```
//! use parser::Parser;
//!
//! let program = Parser::new("function add(a, b) { return a + b; }").parse().unwrap();
//! assert_eq!(program.body.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{Expression, FunctionNode, Program, Statement};
pub use lexer::{Keyword, Lexer, Punctuator, Token};
pub use parser::Parser;
