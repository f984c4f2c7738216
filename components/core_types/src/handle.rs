//! Generation-checked handles into the engine heap.
//!
//! A handle names a heap slot by index and remembers the generation the slot
//! had when the handle was issued. The heap bumps a slot's generation when it
//! sweeps the slot, so a handle that outlived its referent can be detected
//! instead of silently aliasing whatever was allocated in its place.

use std::fmt;

/// Index and generation of a heap slot.
///
/// # Examples
///
/// ```
/// use core_types::HeapId;
///
/// let id = HeapId::new(7, 2);
/// assert_eq!(id.index(), 7);
/// assert_eq!(id.generation(), 2);
/// assert_eq!(HeapId::from_bits(id.to_bits()), id);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId {
    index: u32,
    generation: u32,
}

impl HeapId {
    /// Create a handle for slot `index` at `generation`.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the heap.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation the slot had when the handle was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Pack the handle into a single `u64` (generation in the high half).
    pub fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Inverse of [`HeapId::to_bits`].
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

/// Handle to a heap-allocated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub HeapId);

/// Handle to a heap-allocated string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(pub HeapId);

impl ObjectId {
    /// The underlying slot handle.
    pub fn heap_id(self) -> HeapId {
        self.0
    }
}

impl StringId {
    /// The underlying slot handle.
    pub fn heap_id(self) -> HeapId {
        self.0
    }
}
