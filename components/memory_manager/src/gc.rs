//! Mark/sweep collection.
//!
//! The collector is non-moving: a live object keeps its slot for its whole
//! lifetime, and a swept slot gets a new generation so stale handles are
//! rejected. Marking starts from the persistent root table and the local
//! root stack; host payloads extend the graph through their trace hooks.
//!
//! A cycle whose host payloads could not all be traced is abandoned after
//! marking. Nothing is swept on incomplete information.

use crate::heap::{Heap, LocalRoot, SlotData};
use crate::object::HostObject;
use core_types::{HeapId, ObjectId, StringId, Value};
use std::rc::Rc;

/// Work list handed to trace hooks during marking.
#[derive(Debug, Default)]
pub struct Tracer {
    pending: Vec<HeapId>,
    deferred: bool,
}

impl Tracer {
    /// Create an empty tracer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a value; primitives are ignored.
    pub fn mark_value(&mut self, value: Value) {
        match value {
            Value::Object(id) => self.mark_object(id),
            Value::String(id) => self.mark_string(id),
            _ => {}
        }
    }

    /// Report an object.
    pub fn mark_object(&mut self, id: ObjectId) {
        self.pending.push(id.heap_id());
    }

    /// Report a string.
    pub fn mark_string(&mut self, id: StringId) {
        self.pending.push(id.heap_id());
    }

    /// Signal that a payload could not be inspected; the cycle will not sweep.
    pub fn defer(&mut self) {
        self.deferred = true;
    }

    /// Whether any hook deferred.
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    fn pop(&mut self) -> Option<HeapId> {
        self.pending.pop()
    }
}

/// Counters describing collector activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed cycles
    pub collections: usize,
    /// Cycles abandoned because a host payload deferred
    pub deferred_collections: usize,
    /// Objects freed over the heap's lifetime
    pub objects_freed: usize,
    /// Strings freed over the heap's lifetime
    pub strings_freed: usize,
    /// Slots freed by the most recent completed cycle
    pub last_freed: usize,
}

/// Outcome of one collection cycle.
///
/// Host payloads of swept objects are returned rather than dropped, because
/// their destructors may call back into the runtime, which cannot happen
/// while the heap is borrowed. Drop this value once the borrow is released.
#[derive(Default)]
pub struct Collection {
    /// Payloads detached from swept objects, ready to be dropped
    pub finalized: Vec<Rc<dyn HostObject>>,
    /// Whether the cycle was abandoned
    pub deferred: bool,
    /// Slots freed by this cycle
    pub freed: usize,
}

impl Heap {
    /// Run a full mark/sweep cycle.
    pub fn collect(&mut self) -> Collection {
        let mut tracer = Tracer::new();
        for slot in self.roots.iter().flatten() {
            tracer.mark_value(slot.get());
        }
        for root in &self.local_roots {
            match root {
                LocalRoot::Value(v) => tracer.mark_value(*v),
                LocalRoot::Slot(slot) => tracer.mark_value(slot.get()),
            }
        }
        for slot in &self.scope_roots {
            tracer.mark_value(slot.get());
        }

        while let Some(id) = tracer.pop() {
            let Some(slot) = self.slots.get_mut(id.index()) else {
                continue;
            };
            if slot.generation != id.generation() || slot.marked {
                continue;
            }
            if matches!(slot.data, SlotData::Free) {
                continue;
            }
            slot.marked = true;
            if let SlotData::Object(object) = &slot.data {
                object.trace(&mut tracer);
            }
        }

        self.allocations_since_gc = 0;

        if tracer.is_deferred() {
            for slot in &mut self.slots {
                slot.marked = false;
            }
            self.stats.deferred_collections += 1;
            tracing::warn!(
                deferred = self.stats.deferred_collections,
                "collection deferred: a host payload could not be traced"
            );
            return Collection {
                deferred: true,
                ..Collection::default()
            };
        }

        let mut collection = Collection::default();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot.data, SlotData::Free) {
                continue;
            }
            if slot.marked {
                slot.marked = false;
                continue;
            }
            match std::mem::replace(&mut slot.data, SlotData::Free) {
                SlotData::Object(mut object) => {
                    if let Some(host) = object.host.take() {
                        collection.finalized.push(host);
                    }
                    self.stats.objects_freed += 1;
                }
                SlotData::String(_) => self.stats.strings_freed += 1,
                SlotData::Free => {}
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(index as u32);
            collection.freed += 1;
        }

        self.stats.collections += 1;
        self.stats.last_freed = collection.freed;
        tracing::trace!(
            freed = collection.freed,
            finalized = collection.finalized.len(),
            live = self.live_count(),
            "collection finished"
        );
        collection
    }
}
