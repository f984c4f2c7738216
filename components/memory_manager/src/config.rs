//! Heap configuration.

/// Default number of allocations between automatic collections.
pub const DEFAULT_GC_THRESHOLD: usize = 4096;

/// Default capacity of the persistent root table.
pub const DEFAULT_MAX_ROOTS: usize = 65536;

/// Tuning knobs for a [`Heap`](crate::Heap).
///
/// # Examples
///
/// ```
/// use memory_manager::HeapConfig;
///
/// let config = HeapConfig::default().with_gc_threshold(16).with_max_roots(8);
/// assert_eq!(config.gc_threshold, 16);
/// assert_eq!(config.max_roots, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapConfig {
    /// Allocations since the last cycle after which `maybe_gc` collects
    pub gc_threshold: usize,
    /// Maximum number of simultaneously registered persistent roots
    pub max_roots: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            gc_threshold: DEFAULT_GC_THRESHOLD,
            max_roots: DEFAULT_MAX_ROOTS,
        }
    }
}

impl HeapConfig {
    /// Set the automatic collection threshold.
    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = threshold.max(1);
        self
    }

    /// Set the root table capacity.
    pub fn with_max_roots(mut self, max_roots: usize) -> Self {
        self.max_roots = max_roots;
        self
    }
}
