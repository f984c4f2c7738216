//! Contract tests verifying the memory_manager API.

use core_types::Value;
use memory_manager::{Heap, HeapConfig, HeapError, ObjectData, Property, PropertyFlags};
use std::cell::Cell;
use std::rc::Rc;

/// Test Heap contract: new(config) -> Self
#[test]
fn contract_heap_new() {
    let heap = Heap::new(HeapConfig::default());
    assert_eq!(heap.live_count(), 0);
    assert_eq!(heap.root_count(), 0);
}

/// Test Heap contract: collect() -> Collection
#[test]
fn contract_heap_collect_empty() {
    let mut heap = Heap::default();
    let collection = heap.collect();
    assert!(!collection.deferred);
    assert_eq!(collection.freed, 0);
    assert_eq!(heap.stats().collections, 1);
}

/// Test Heap contract: add_root fails with RootTableFull at capacity
#[test]
fn contract_root_table_full() {
    let mut heap = Heap::new(HeapConfig::default().with_max_roots(0));
    let err = heap.add_root(Rc::new(Cell::new(Value::Null))).unwrap_err();
    assert_eq!(err, HeapError::RootTableFull(0));
}

/// Test ObjectData contract: define/get_own/remove
#[test]
fn contract_object_properties() {
    let mut heap = Heap::default();
    let id = heap.alloc_object(ObjectData::ordinary(None));
    let obj = heap.object_mut(id).unwrap();
    obj.define("x", Property::data(Value::Smi(1), PropertyFlags::READ_ONLY));
    assert_eq!(obj.get_own("x").and_then(|p| p.value()), Some(Value::Smi(1)));
    assert!(obj.remove("x").is_some());
}

/// Test string contract: alloc_str stores UTF-16 code units
#[test]
fn contract_strings_are_utf16() {
    let mut heap = Heap::default();
    let s = heap.alloc_str("a😀");
    assert_eq!(heap.string(s).unwrap().len(), 3);
    assert_eq!(heap.string_lossy(s).unwrap(), "a😀");
}
