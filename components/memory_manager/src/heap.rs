//! Slot heap with persistent and local root sets.
//!
//! Objects and strings live in a single vector of slots. Freed slots go on a
//! free list and are reused with a bumped generation. Two root sets feed the
//! collector:
//!
//! - the persistent root table: shared value slots registered and
//!   unregistered in any order, bounded by [`HeapConfig::max_roots`];
//! - the local root stack: pushed while a scope is active and truncated back
//!   to a saved length when it exits, strictly LIFO.

use crate::config::HeapConfig;
use crate::error::HeapError;
use crate::gc::GcStats;
use crate::object::ObjectData;
use core_types::{HeapId, ObjectId, StringId, Value};
use std::cell::Cell;
use std::rc::Rc;

/// A value cell shared between the host and the root table.
///
/// Registering the cell rather than its current contents means later writes
/// through the cell are seen by the collector.
pub type ValueSlot = Rc<Cell<Value>>;

/// Entry in the persistent root table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(u32);

impl RootId {
    /// Position in the root table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Entry on the local root stack.
#[derive(Debug, Clone)]
pub enum LocalRoot {
    /// A value snapshot
    Value(Value),
    /// A shared cell, read at collection time
    Slot(ValueSlot),
}

pub(crate) enum SlotData {
    Free,
    Object(Box<ObjectData>),
    String(Rc<[u16]>),
}

pub(crate) struct Slot {
    pub(crate) generation: u32,
    pub(crate) marked: bool,
    pub(crate) data: SlotData,
}

/// The engine heap.
///
/// # Examples
///
/// ```
/// use memory_manager::{Heap, HeapConfig, ObjectData};
///
/// let mut heap = Heap::new(HeapConfig::default());
/// let obj = heap.alloc_object(ObjectData::ordinary(None));
/// let s = heap.alloc_str("hello");
///
/// assert!(heap.object(obj).is_ok());
/// assert_eq!(heap.string(s).unwrap().len(), 5);
///
/// // Nothing is rooted, so a cycle frees both.
/// heap.collect();
/// assert!(heap.object(obj).is_err());
/// ```
pub struct Heap {
    config: HeapConfig,
    pub(crate) slots: Vec<Slot>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) roots: Vec<Option<ValueSlot>>,
    free_roots: Vec<u32>,
    root_count: usize,
    pub(crate) local_roots: Vec<LocalRoot>,
    pub(crate) scope_roots: Vec<ValueSlot>,
    pub(crate) allocations_since_gc: usize,
    pub(crate) stats: GcStats,
}

impl Heap {
    /// Create an empty heap.
    pub fn new(config: HeapConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            free_list: Vec::new(),
            roots: Vec::new(),
            free_roots: Vec::new(),
            root_count: 0,
            local_roots: Vec::new(),
            scope_roots: Vec::new(),
            allocations_since_gc: 0,
            stats: GcStats::default(),
        }
    }

    /// Configuration the heap was created with.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    fn alloc(&mut self, data: SlotData) -> HeapId {
        self.allocations_since_gc += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = data;
            slot.marked = false;
            HeapId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                marked: false,
                data,
            });
            HeapId::new(index, 0)
        }
    }

    /// Allocate an object.
    pub fn alloc_object(&mut self, data: ObjectData) -> ObjectId {
        ObjectId(self.alloc(SlotData::Object(Box::new(data))))
    }

    /// Allocate a string from UTF-16 code units.
    pub fn alloc_string(&mut self, units: impl Into<Rc<[u16]>>) -> StringId {
        StringId(self.alloc(SlotData::String(units.into())))
    }

    /// Allocate a string from UTF-8 text.
    pub fn alloc_str(&mut self, s: &str) -> StringId {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.alloc_string(units)
    }

    fn live_slot(&self, id: HeapId) -> Result<&Slot, HeapError> {
        match self.slots.get(id.index()) {
            Some(slot) if slot.generation == id.generation() && !matches!(slot.data, SlotData::Free) => Ok(slot),
            _ => Err(HeapError::InvalidHandle(id)),
        }
    }

    /// Whether the handle still names a live slot.
    pub fn is_live(&self, id: HeapId) -> bool {
        self.live_slot(id).is_ok()
    }

    /// Borrow an object.
    pub fn object(&self, id: ObjectId) -> Result<&ObjectData, HeapError> {
        match &self.live_slot(id.heap_id())?.data {
            SlotData::Object(object) => Ok(object),
            _ => Err(HeapError::NotAnObject(id.heap_id())),
        }
    }

    /// Mutably borrow an object.
    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut ObjectData, HeapError> {
        let heap_id = id.heap_id();
        match self.slots.get_mut(heap_id.index()) {
            Some(slot) if slot.generation == heap_id.generation() => match &mut slot.data {
                SlotData::Object(object) => Ok(object),
                SlotData::String(_) => Err(HeapError::NotAnObject(heap_id)),
                SlotData::Free => Err(HeapError::InvalidHandle(heap_id)),
            },
            _ => Err(HeapError::InvalidHandle(heap_id)),
        }
    }

    /// UTF-16 contents of a string.
    pub fn string(&self, id: StringId) -> Result<&Rc<[u16]>, HeapError> {
        match &self.live_slot(id.heap_id())?.data {
            SlotData::String(units) => Ok(units),
            _ => Err(HeapError::NotAString(id.heap_id())),
        }
    }

    /// String contents decoded to UTF-8, replacing unpaired surrogates.
    pub fn string_lossy(&self, id: StringId) -> Result<String, HeapError> {
        Ok(String::from_utf16_lossy(self.string(id)?))
    }

    /// Check that a value's handle, if any, is still live.
    pub fn check_value(&self, value: Value) -> Result<(), HeapError> {
        match value {
            Value::Object(id) => self.object(id).map(|_| ()),
            Value::String(id) => self.string(id).map(|_| ()),
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Persistent roots
    // ------------------------------------------------------------------

    /// Register a value cell as a root.
    ///
    /// # Errors
    ///
    /// [`HeapError::RootTableFull`] when `max_roots` entries are registered.
    pub fn add_root(&mut self, slot: ValueSlot) -> Result<RootId, HeapError> {
        if self.root_count >= self.config.max_roots {
            return Err(HeapError::RootTableFull(self.config.max_roots));
        }
        self.root_count += 1;
        if let Some(index) = self.free_roots.pop() {
            self.roots[index as usize] = Some(slot);
            Ok(RootId(index))
        } else {
            self.roots.push(Some(slot));
            Ok(RootId(self.roots.len() as u32 - 1))
        }
    }

    /// Unregister a root. Returns false if it was not registered.
    pub fn remove_root(&mut self, id: RootId) -> bool {
        match self.roots.get_mut(id.index()) {
            Some(entry @ Some(_)) => {
                *entry = None;
                self.free_roots.push(id.0);
                self.root_count -= 1;
                true
            }
            _ => false,
        }
    }

    /// The cell registered under `id`.
    pub fn root_slot(&self, id: RootId) -> Option<&ValueSlot> {
        self.roots.get(id.index()).and_then(Option::as_ref)
    }

    /// Number of registered persistent roots.
    pub fn root_count(&self) -> usize {
        self.root_count
    }

    // ------------------------------------------------------------------
    // Local roots
    // ------------------------------------------------------------------

    /// Current height of the local root stack, used as a scope mark.
    pub fn local_root_mark(&self) -> usize {
        self.local_roots.len()
    }

    /// Root a value until the stack is truncated below this entry.
    pub fn push_local(&mut self, value: Value) {
        if value.is_gc_thing() {
            self.local_roots.push(LocalRoot::Value(value));
        }
    }

    /// Root a cell until the stack is truncated below this entry.
    pub fn push_local_slot(&mut self, slot: ValueSlot) {
        self.local_roots.push(LocalRoot::Slot(slot));
    }

    /// Pop local roots back to `mark`.
    pub fn truncate_local_roots(&mut self, mark: usize) {
        self.local_roots.truncate(mark);
    }

    // ------------------------------------------------------------------
    // Embedder scope roots
    // ------------------------------------------------------------------

    /// Height of the embedder scope stack. Kept apart from the local root
    /// stack so statement boundaries never release an embedder's values.
    pub fn scope_root_mark(&self) -> usize {
        self.scope_roots.len()
    }

    /// Root a cell until the scope stack is truncated below this entry.
    pub fn push_scope_slot(&mut self, slot: ValueSlot) {
        self.scope_roots.push(slot);
    }

    /// Pop embedder scope roots back to `mark`.
    pub fn truncate_scope_roots(&mut self, mark: usize) {
        self.scope_roots.truncate(mark);
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Whether enough allocation happened since the last cycle to collect.
    pub fn should_collect(&self) -> bool {
        self.allocations_since_gc >= self.config.gc_threshold
    }

    /// Allocations since the last cycle.
    pub fn allocations_since_gc(&self) -> usize {
        self.allocations_since_gc
    }

    /// Collector counters.
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Number of live slots (objects and strings).
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapConfig::default())
    }
}
