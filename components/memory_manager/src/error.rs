//! Heap error type.

use core_types::HeapId;
use thiserror::Error;

/// Failures reported by the heap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// The handle's slot was swept; its generation no longer matches.
    #[error("stale handle {0:?}: the referent has been collected")]
    InvalidHandle(HeapId),
    /// The handle names a live slot of the wrong kind.
    #[error("handle {0:?} does not refer to an object")]
    NotAnObject(HeapId),
    /// The handle names a live slot of the wrong kind.
    #[error("handle {0:?} does not refer to a string")]
    NotAString(HeapId),
    /// The persistent root table cannot grow any further.
    #[error("root table exhausted ({0} entries)")]
    RootTableFull(usize),
}
