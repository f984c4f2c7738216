//! Bridge - host side of the embedded script engine
//!
//! This crate lets Rust code drive the engine and be driven by it:
//! - Contexts owning a runtime, with a thread-scoped current context
//! - Values, typed object views and rooting (persistent and scoped)
//! - Compile-time selected conversions between Rust and script values
//! - Native objects and functions dispatched from script
//! - Class registration and process-wide extensions
//!
//! # Example
//!
//! ```
//! use bridge::{Context, NativeFunctionBase};
//!
//! let cx = Context::create().unwrap();
//! let greet = NativeFunctionBase::adapt("greet", |_cx: &Context, name: String| format!("hello {}", name));
//! let greet = cx.create_native_function(greet).unwrap();
//! cx.global().set_property(&cx, "greet", &greet).unwrap();
//! let text = cx.evaluate("greet('world')", "greet.js", 1).unwrap();
//! assert_eq!(text.to_std_string(&cx).unwrap(), "hello world");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod call_context;
pub mod class;
pub mod context;
pub mod convert;
pub mod error;
pub mod extension;
pub mod native_function;
pub mod native_object;
pub mod object;
pub mod property_iterator;
pub mod root;
pub mod value;

// Re-export main types at crate root
pub use call_context::{Arguments, CallContext};
pub use class::{load_class, ClassDescription, ClassProperty};
pub use context::{Context, ContextOptions, CurrentContextScope};
pub use convert::{FromScript, ToScript};
pub use error::{Error, Result, ScriptException};
pub use extension::{load_extension, register_extension, registered_extensions, ExtensionEntry};
pub use native_function::{method, IntoNativeFn, Method, NativeFunction, NativeFunctionBase, NativeReturn, Receiver};
pub use native_object::{get_native, Enumeration, Native, NativeObject, NativeObjectBase, Trace};
pub use object::{Array, Function, JsString, Object};
pub use property_iterator::PropertyIterator;
pub use root::{LocalRootScope, Root, Rootable};
pub use value::Value;

pub use interpreter::{PropertyMode, ResolveFlags};
pub use memory_manager::{GcStats, HeapConfig, PropertyFlags, Tracer};
