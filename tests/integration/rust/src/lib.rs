//! Integration test suite for the embedded engine and its host bridge
//!
//! This crate provides integration tests that verify the components work
//! together across component boundaries: parser, runtime, heap and bridge.

/// Re-export components for test convenience
pub mod components {
    pub use bridge;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
    pub use parser;
}
