//! Core engine value tags, heap handles and error types.
//!
//! This crate holds the types every other component agrees on: the raw
//! engine [`Value`], the generation-checked handles that point into the
//! heap, and the error/position types used for diagnostics.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of engine values
//! - [`HeapId`], [`ObjectId`], [`StringId`] - Generation-checked heap handles
//! - [`JsError`] - Engine errors with position and stack information
//! - [`ErrorKind`] - Types of engine errors
//! - [`SourcePosition`] - Source code location
//! - [`StackFrame`] - Call stack frame information
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, JsError, Value};
//!
//! let num = Value::from_f64(42.0);
//! assert_eq!(num, Value::Smi(42));
//! assert_eq!(num.as_number(), Some(42.0));
//!
//! let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
//! assert_eq!(error.to_string(), "TypeError: undefined is not a function");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod handle;
mod source;
mod value;

pub use error::{ErrorKind, JsError};
pub use handle::{HeapId, ObjectId, StringId};
pub use source::{SourcePosition, StackFrame};
pub use value::Value;
