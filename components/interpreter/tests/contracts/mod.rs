//! Contract tests for the runtime API
//!
//! These tests pin down the behavior embedders depend on: evaluation
//! results, property hook order, host calls and collection.

use core_types::{ErrorKind, Value};
use interpreter::{Abrupt, HookFailure, HostCall, HostHooks, PropertyMode, ResolveFlags, Runtime};
use memory_manager::{HeapConfig, PropertyFlags, Tracer, ValueSlot};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn runtime() -> Runtime {
    Runtime::new(HeapConfig::default()).unwrap()
}

/// Records every property operation and answers `magic` reads with 42.
#[derive(Default)]
struct Recorder {
    log: RefCell<Vec<(PropertyMode, String)>>,
}

impl HostHooks for Recorder {
    fn trace(&self, _tracer: &mut Tracer) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn class_name(&self) -> &str {
        "Recorder"
    }

    fn property_op(
        &self,
        _rt: &Runtime,
        _object: core_types::ObjectId,
        mode: PropertyMode,
        key: &str,
        data: &ValueSlot,
    ) -> Result<(), HookFailure> {
        self.log.borrow_mut().push((mode, key.to_string()));
        if mode == PropertyMode::Get && key == "magic" {
            data.set(Value::Smi(42));
        }
        Ok(())
    }
}

/// Defines `lazy` on first lookup.
struct Lazy {
    resolved: Cell<usize>,
}

impl HostHooks for Lazy {
    fn trace(&self, _tracer: &mut Tracer) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn resolve(
        &self,
        rt: &Runtime,
        object: core_types::ObjectId,
        key: &str,
        _flags: ResolveFlags,
    ) -> Result<bool, HookFailure> {
        if key != "lazy" {
            return Ok(false);
        }
        self.resolved.set(self.resolved.get() + 1);
        rt.define(object, key, Value::Smi(9), PropertyFlags::empty())
            .map_err(|_| HookFailure::Exception)?;
        Ok(true)
    }
}

/// Host function with a selectable behavior.
enum Native {
    Add,
    Fail,
    Quit,
}

impl HostHooks for Native {
    fn trace(&self, _tracer: &mut Tracer) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn call(&self, rt: &Runtime, call: HostCall<'_>) -> Result<(), HookFailure> {
        match self {
            Native::Add => {
                let a = call.args.first().and_then(|v| v.as_number()).unwrap_or(0.0);
                let b = call.args.get(1).and_then(|v| v.as_number()).unwrap_or(0.0);
                call.result.set(Value::from_f64(a + b));
                Ok(())
            }
            Native::Fail => rt.throw_type_error("nope"),
            Native::Quit => Err(HookFailure::Quit),
        }
    }
}

/// Sets a flag when dropped.
struct DropFlag(Rc<Cell<bool>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

impl HostHooks for DropFlag {
    fn trace(&self, _tracer: &mut Tracer) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn install(rt: &Runtime, name: &str, native: Native) {
    let function = rt.create_host_function(name, 2, Rc::new(native)).unwrap();
    rt.set(rt.global(), name, Value::Object(function)).unwrap();
}

// ============================================================================
// Evaluation
// ============================================================================

/// Test evaluate contract: returns the completion value of the last statement
#[test]
fn contract_evaluate_completion_value() {
    let rt = runtime();
    assert_eq!(rt.evaluate("1; 2; 3", "c.js", 1).unwrap(), Value::Smi(3));
    assert_eq!(rt.evaluate("var x = 1;", "c.js", 1).unwrap(), Value::Undefined);
}

/// Test evaluate contract: syntax errors are thrown SyntaxError objects with
/// the file name and a line shifted by the starting line
#[test]
fn contract_evaluate_syntax_error_location() {
    let rt = runtime();
    let Err(Abrupt::Throw(error)) = rt.evaluate("var = ;", "bad.js", 5) else {
        panic!("expected a SyntaxError");
    };
    let report = rt.error_report(error);
    assert!(report.message.starts_with("SyntaxError"), "{}", report.message);
    assert_eq!(report.file.as_deref(), Some("bad.js"));
    assert_eq!(report.line, Some(5));
}

/// Test evaluate contract: runtime errors record the executing line
#[test]
fn contract_runtime_error_location() {
    let rt = runtime();
    let Err(Abrupt::Throw(error)) = rt.evaluate("var a = 1;\nundefinedName;", "where.js", 10) else {
        panic!("expected a ReferenceError");
    };
    let report = rt.error_report(error);
    assert_eq!(report.message, "ReferenceError: undefinedName is not defined");
    assert_eq!(report.file.as_deref(), Some("where.js"));
    assert_eq!(report.line, Some(11));
}

/// Test evaluate_in_scope contract: declarations land on the scope object and
/// unresolved names fall back to the global object
#[test]
fn contract_evaluate_in_scope() {
    let rt = runtime();
    let scope = rt.create_object(None).unwrap();
    rt.heap().borrow_mut().push_local(Value::Object(scope));
    let v = rt.evaluate_in_scope("var z = 3; z + 1", "s.js", 1, scope).unwrap();
    assert_eq!(v, Value::Smi(4));
    assert!(rt.has_own(scope, "z").unwrap());
    assert!(!rt.has_own(rt.global(), "z").unwrap());
    let kind = rt.evaluate_in_scope("typeof Array", "s.js", 1, scope).unwrap();
    assert_eq!(rt.to_std_string(kind).unwrap(), "function");
}

/// Test compile_function contract: parameters and length are honored
#[test]
fn contract_compile_function() {
    let rt = runtime();
    let f = rt
        .compile_function("mul", &["a", "b"], "return a * b;", "f.js", 1)
        .unwrap();
    let v = rt
        .call(Value::Object(f), Value::Undefined, &[Value::Smi(6), Value::Smi(7)])
        .unwrap();
    assert_eq!(v, Value::Smi(42));
    assert_eq!(rt.get(f, "length").unwrap(), Value::Smi(2));
}

/// Test compile_function contract: invalid parameter names are SyntaxErrors
#[test]
fn contract_compile_function_rejects_bad_params() {
    let rt = runtime();
    let Err(Abrupt::Throw(error)) = rt.compile_function("f", &["1x"], "", "f.js", 1) else {
        panic!("expected a SyntaxError");
    };
    assert!(rt.error_report(error).message.starts_with("SyntaxError"));
}

// ============================================================================
// Properties
// ============================================================================

/// Test property contract: set/get/has/delete on ordinary objects
#[test]
fn contract_property_round_trip() {
    let rt = runtime();
    let object = rt.create_object(None).unwrap();
    rt.heap().borrow_mut().push_local(Value::Object(object));
    rt.set(object, "a", Value::Smi(1)).unwrap();
    assert_eq!(rt.get(object, "a").unwrap(), Value::Smi(1));
    assert!(rt.has(object, "a").unwrap());
    assert!(rt.has(object, "toString").unwrap());
    assert!(!rt.has_own(object, "toString").unwrap());
    assert!(rt.delete(object, "a").unwrap());
    assert_eq!(rt.get(object, "a").unwrap(), Value::Undefined);
}

/// Test define contract: permanent properties survive delete; read-only ones
/// ignore writes; non-enumerable ones are hidden from own_keys
#[test]
fn contract_define_flags() {
    let rt = runtime();
    let object = rt.create_object(None).unwrap();
    rt.heap().borrow_mut().push_local(Value::Object(object));
    rt.define(object, "p", Value::Smi(1), PropertyFlags::PERMANENT).unwrap();
    rt.define(object, "r", Value::Smi(2), PropertyFlags::READ_ONLY).unwrap();
    rt.define(object, "h", Value::Smi(3), PropertyFlags::DONT_ENUMERATE).unwrap();

    assert!(!rt.delete(object, "p").unwrap());
    rt.set(object, "r", Value::Smi(20)).unwrap();
    assert_eq!(rt.get(object, "r").unwrap(), Value::Smi(2));
    assert_eq!(rt.own_keys(object).unwrap(), vec!["p".to_string(), "r".to_string()]);
}

/// Test array contract: length tracks dense elements
#[test]
fn contract_array_length() {
    let rt = runtime();
    let array = rt.create_array(&[Value::Smi(1), Value::Smi(2)]).unwrap();
    rt.heap().borrow_mut().push_local(Value::Object(array));
    assert_eq!(rt.get(array, "length").unwrap(), Value::Smi(2));
    rt.set(array, "4", Value::Smi(5)).unwrap();
    assert_eq!(rt.get(array, "length").unwrap(), Value::Smi(5));
    assert_eq!(rt.get(array, "3").unwrap(), Value::Undefined);
    rt.set(array, "length", Value::Smi(1)).unwrap();
    assert_eq!(rt.get(array, "1").unwrap(), Value::Undefined);
    assert_eq!(rt.own_keys(array).unwrap(), vec!["0".to_string()]);
}

// ============================================================================
// Host hooks
// ============================================================================

/// Test property_op contract: new keys report Add then Set; reads report Get
/// and may replace the result; deletes report Delete
#[test]
fn contract_property_hook_order() {
    let rt = runtime();
    let recorder = Rc::new(Recorder::default());
    let object = rt.create_host_object(None, recorder.clone()).unwrap();
    rt.heap().borrow_mut().push_local(Value::Object(object));

    rt.set(object, "x", Value::Smi(1)).unwrap();
    rt.set(object, "x", Value::Smi(2)).unwrap();
    assert_eq!(rt.get(object, "x").unwrap(), Value::Smi(2));
    assert_eq!(rt.get(object, "magic").unwrap(), Value::Smi(42));
    assert!(rt.delete(object, "x").unwrap());

    let log = recorder.log.borrow();
    let expected = [
        (PropertyMode::Add, "x"),
        (PropertyMode::Set, "x"),
        (PropertyMode::Set, "x"),
        (PropertyMode::Get, "x"),
        (PropertyMode::Get, "magic"),
        (PropertyMode::Delete, "x"),
    ];
    let actual: Vec<(PropertyMode, &str)> = log.iter().map(|(m, k)| (*m, k.as_str())).collect();
    assert_eq!(actual, expected);
}

/// Test class_name contract: reported by Object.prototype.toString
#[test]
fn contract_host_class_name() {
    let rt = runtime();
    let object = rt.create_host_object(None, Rc::new(Recorder::default())).unwrap();
    rt.set(rt.global(), "rec", Value::Object(object)).unwrap();
    let v = rt
        .evaluate("Object.prototype.toString.call(rec)", "c.js", 1)
        .unwrap();
    assert_eq!(rt.to_std_string(v).unwrap(), "[object Recorder]");
}

/// Test resolve contract: a lazily defined property is found and resolved once
#[test]
fn contract_lazy_resolve() {
    let rt = runtime();
    let lazy = Rc::new(Lazy { resolved: Cell::new(0) });
    let object = rt.create_host_object(None, lazy.clone()).unwrap();
    rt.heap().borrow_mut().push_local(Value::Object(object));
    assert!(!rt.has_own(object, "other").unwrap());
    assert_eq!(rt.get(object, "lazy").unwrap(), Value::Smi(9));
    assert_eq!(rt.get(object, "lazy").unwrap(), Value::Smi(9));
    assert!(rt.has_own(object, "lazy").unwrap());
    assert_eq!(lazy.resolved.get(), 1);
}

/// Test host call contract: the result slot becomes the call's value
#[test]
fn contract_host_function_call() {
    let rt = runtime();
    install(&rt, "add", Native::Add);
    assert_eq!(rt.evaluate("add(2, 3)", "c.js", 1).unwrap(), Value::Smi(5));
    assert_eq!(
        rt.evaluate("typeof add + add.length", "c.js", 1)
            .map(|v| rt.to_std_string(v).unwrap())
            .unwrap(),
        "function2"
    );
}

/// Test host call contract: a pending exception becomes a catchable throw
#[test]
fn contract_host_exception_is_catchable() {
    let rt = runtime();
    install(&rt, "fail", Native::Fail);
    let v = rt
        .evaluate("try { fail(); } catch (e) { e.name + ': ' + e.message }", "c.js", 1)
        .unwrap();
    assert_eq!(rt.to_std_string(v).unwrap(), "TypeError: nope");
    assert!(!rt.has_pending_exception());
}

/// Test quit contract: termination skips catch and finally blocks
#[test]
fn contract_quit_is_uncatchable() {
    let rt = runtime();
    install(&rt, "stop", Native::Quit);
    let result = rt.evaluate(
        "var x = 0; try { stop(); } catch (e) { x = 1; } finally { x = 2; }",
        "c.js",
        1,
    );
    assert_eq!(result, Err(Abrupt::Quit));
    assert_eq!(rt.evaluate("x", "c.js", 1).unwrap(), Value::Smi(0));
}

/// Test call contract: calling a non-callable value is a TypeError
#[test]
fn contract_call_non_callable() {
    let rt = runtime();
    let Err(Abrupt::Throw(error)) = rt.call(Value::Smi(1), Value::Undefined, &[]) else {
        panic!("expected a TypeError");
    };
    assert_eq!(rt.error_report(error).message, "TypeError: 1 is not a function");
}

/// Test construct contract: script constructors receive a fresh object
#[test]
fn contract_construct() {
    let rt = runtime();
    let ctor = rt.evaluate("(function Point(x) { this.x = x; })", "c.js", 1).unwrap();
    rt.heap().borrow_mut().push_local(ctor);
    let instance = rt.construct(ctor, &[Value::Smi(3)]).unwrap();
    let Value::Object(id) = instance else {
        panic!("expected an object");
    };
    assert_eq!(rt.get(id, "x").unwrap(), Value::Smi(3));
    let Value::Object(ctor_id) = ctor else {
        panic!("expected a function");
    };
    assert!(rt.instance_of(instance, ctor_id).unwrap());
}

// ============================================================================
// Errors
// ============================================================================

/// Test create_error contract: kind name and message are reported
#[test]
fn contract_create_error() {
    let rt = runtime();
    let error = rt.create_error(ErrorKind::RangeError, "too big");
    assert_eq!(rt.error_report(error).message, "RangeError: too big");
    assert_eq!(rt.type_of(error), "object");
}

/// Test error_report contract: non-error throws are converted to strings
#[test]
fn contract_error_report_plain_value() {
    let rt = runtime();
    let Err(Abrupt::Throw(thrown)) = rt.evaluate("throw 'boom'", "c.js", 1) else {
        panic!("expected a throw");
    };
    assert_eq!(rt.error_report(thrown).message, "boom");
}

// ============================================================================
// Garbage collection
// ============================================================================

/// Test gc contract: unrooted objects are freed; rooted ones survive
#[test]
fn contract_gc_roots() {
    let rt = runtime();
    let loose = rt.create_object(None).unwrap();
    let kept = rt.create_object(None).unwrap();
    let slot = Rc::new(Cell::new(Value::Object(kept)));
    let root = rt.heap().borrow_mut().add_root(slot).unwrap();

    assert!(rt.gc() > 0);
    assert!(rt.heap().borrow().object(loose).is_err());
    assert!(rt.heap().borrow().object(kept).is_ok());

    assert!(rt.heap().borrow_mut().remove_root(root));
    rt.gc();
    assert!(rt.heap().borrow().object(kept).is_err());
}

/// Test gc contract: host payloads are dropped when their object dies
#[test]
fn contract_gc_finalizes_host_payload() {
    let rt = runtime();
    let dropped = Rc::new(Cell::new(false));
    rt.create_host_object(None, Rc::new(DropFlag(dropped.clone()))).unwrap();
    assert!(!dropped.get());
    rt.gc();
    assert!(dropped.get());
}

/// Test gc contract: script-reachable values survive collection
#[test]
fn contract_gc_keeps_globals() {
    let rt = runtime();
    rt.evaluate("var keep = { n: [1, 2, 3] };", "c.js", 1).unwrap();
    rt.gc();
    assert_eq!(rt.evaluate("keep.n.length", "c.js", 1).unwrap(), Value::Smi(3));
    assert!(rt.gc_stats().collections >= 1);
}
