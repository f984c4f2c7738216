//! Unit tests for the heap and collector

use core_types::Value;
use memory_manager::{Callable, Heap, HeapConfig, ObjectClass, ObjectData, Property, PropertySlot};
use std::cell::Cell;
use std::rc::Rc;

// ============================================================================
// Reachability
// ============================================================================

#[test]
fn test_prototype_chain_is_traced() {
    let mut heap = Heap::default();
    let proto = heap.alloc_object(ObjectData::ordinary(None));
    let child = heap.alloc_object(ObjectData::ordinary(Some(proto)));
    heap.push_local(Value::Object(child));
    heap.collect();
    assert!(heap.object(proto).is_ok());
}

#[test]
fn test_property_values_are_traced() {
    let mut heap = Heap::default();
    let s = heap.alloc_str("value");
    let obj = heap.alloc_object(ObjectData::ordinary(None));
    heap.object_mut(obj)
        .unwrap()
        .define("k", Property::plain(Value::String(s)));
    heap.push_local(Value::Object(obj));
    heap.collect();
    assert_eq!(heap.string_lossy(s).unwrap(), "value");
}

#[test]
fn test_accessors_and_elements_are_traced() {
    let mut heap = Heap::default();
    let getter = heap.alloc_object(ObjectData::new(ObjectClass::Function(Callable::Intrinsic(0)), None));
    let element = heap.alloc_str("e");
    let array = heap.alloc_object(ObjectData::new(ObjectClass::Array(vec![Value::String(element)]), None));
    heap.object_mut(array).unwrap().define(
        "g",
        Property {
            slot: PropertySlot::Accessor {
                getter: Some(getter),
                setter: None,
            },
            flags: Default::default(),
        },
    );
    heap.push_local(Value::Object(array));
    heap.collect();
    assert!(heap.object(getter).is_ok());
    assert!(heap.string(element).is_ok());
}

#[test]
fn test_closure_scope_is_traced() {
    let mut heap = Heap::default();
    let env = heap.alloc_object(ObjectData::new(ObjectClass::Environment { outer: None }, None));
    let func = heap.alloc_object(ObjectData::new(
        ObjectClass::Function(Callable::Script {
            code: memory_manager::CodeId(0),
            scope: env,
        }),
        None,
    ));
    heap.push_local(Value::Object(func));
    heap.collect();
    assert!(heap.object(env).is_ok());
}

#[test]
fn test_cycles_are_collected() {
    let mut heap = Heap::default();
    let a = heap.alloc_object(ObjectData::ordinary(None));
    let b = heap.alloc_object(ObjectData::ordinary(Some(a)));
    heap.object_mut(a).unwrap().prototype = Some(b);
    let collection = heap.collect();
    assert_eq!(collection.freed, 2);
    assert_eq!(heap.stats().objects_freed, 2);
}

// ============================================================================
// Roots
// ============================================================================

#[test]
fn test_local_slot_root_reads_current_value() {
    let mut heap = Heap::default();
    let slot = Rc::new(Cell::new(Value::Undefined));
    heap.push_local_slot(slot.clone());
    let s = heap.alloc_str("late");
    slot.set(Value::String(s));
    heap.collect();
    assert!(heap.string(s).is_ok());
}

#[test]
fn test_gc_threshold_configuration() {
    let heap = Heap::new(HeapConfig::default().with_gc_threshold(0));
    assert_eq!(heap.config().gc_threshold, 1);
}
