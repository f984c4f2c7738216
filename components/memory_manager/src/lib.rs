//! Memory Manager - engine heap and garbage collector
//!
//! This component provides:
//! - Slot-based storage for objects and UTF-16 strings
//! - Generation-checked handles (stale handles are rejected, not reused)
//! - A persistent root table and a LIFO local root stack
//! - Non-moving mark/sweep collection with host payload tracing
//! - Deferred finalization of host payloads

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod gc;
pub mod heap;
pub mod object;

pub use config::HeapConfig;
pub use error::HeapError;
pub use gc::{Collection, GcStats, Tracer};
pub use heap::{Heap, LocalRoot, RootId, ValueSlot};
pub use object::{
    Callable, CodeId, HostObject, ObjectClass, ObjectData, Property, PropertyFlags, PropertySlot,
};
