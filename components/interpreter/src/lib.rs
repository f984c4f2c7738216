//! Script runtime for embedding
//!
//! This crate provides a tree-walking evaluator over the parser's AST with:
//! - A realm of intrinsic objects (Object, Function, Array, String, errors)
//! - A property protocol that consults per-object host hooks
//! - Exceptions, uncatchable termination and a recursion limit
//! - Local rooting of every temporary so collection can run at any allocation
//!
//! # Example
//!
//! ```
//! use interpreter::Runtime;
//! use core_types::Value;
//! use memory_manager::HeapConfig;
//!
//! let rt = Runtime::new(HeapConfig::default()).unwrap();
//! let value = rt.evaluate("function sq(x) { return x * x; } sq(7)", "sq.js", 1).unwrap();
//! assert_eq!(value, Value::Smi(49));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod api;
mod call;
pub mod completion;
mod eval;
pub mod hooks;
mod intrinsics;
pub mod operations;
mod property;
pub mod runtime;

// Re-export main types at crate root
pub use completion::{Abrupt, EvalResult};
pub use hooks::{HookFailure, HostCall, HostCell, HostHooks, PropertyMode, ResolveFlags};
pub use operations::{array_index, number_to_string, string_to_number};
pub use runtime::{ErrorReport, IntrinsicCall, IntrinsicFn, Runtime, MAX_CALL_DEPTH};
