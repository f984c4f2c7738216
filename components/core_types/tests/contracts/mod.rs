//! Contract tests for the core_types public API.

use core_types::{ErrorKind, HeapId, JsError, ObjectId, StringId, Value};

/// Contract: Value is Copy so it can live in slots and argument vectors
#[test]
fn contract_value_is_copy() {
    fn assert_copy<T: Copy>() {}
    assert_copy::<Value>();
    assert_copy::<ObjectId>();
    assert_copy::<StringId>();
}

/// Contract: handles compare by index and generation
#[test]
fn contract_handles_compare_generation() {
    assert_eq!(ObjectId(HeapId::new(1, 1)), ObjectId(HeapId::new(1, 1)));
    assert_ne!(ObjectId(HeapId::new(1, 1)), ObjectId(HeapId::new(1, 2)));
}

/// Contract: every ErrorKind names its script constructor
#[test]
fn contract_error_kind_names() {
    let kinds = [
        ErrorKind::SyntaxError,
        ErrorKind::TypeError,
        ErrorKind::ReferenceError,
        ErrorKind::RangeError,
        ErrorKind::EvalError,
        ErrorKind::URIError,
        ErrorKind::InternalError,
    ];
    for kind in kinds {
        assert!(kind.name().ends_with("Error"));
    }
}

/// Contract: JsError::new(kind, message) -> JsError
#[test]
fn contract_js_error_new() {
    let err = JsError::new(ErrorKind::TypeError, "bad");
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(err.message, "bad");
    assert!(err.source_position.is_none());
}
