//! Unit tests for script evaluation

use core_types::Value;
use interpreter::{Abrupt, Runtime};
use memory_manager::HeapConfig;

fn runtime() -> Runtime {
    Runtime::new(HeapConfig::default()).unwrap()
}

/// Evaluate and convert the completion value to a string.
fn eval_str(rt: &Runtime, source: &str) -> String {
    let value = rt.evaluate(source, "unit.js", 1).unwrap();
    rt.to_std_string(value).unwrap()
}

/// Evaluate, expecting a throw; returns the `name: message` text.
fn eval_err(rt: &Runtime, source: &str) -> String {
    match rt.evaluate(source, "unit.js", 1) {
        Err(Abrupt::Throw(value)) => rt.error_report(value).message,
        other => panic!("expected a throw, got {:?}", other),
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_arithmetic_precedence() {
    let rt = runtime();
    assert_eq!(rt.evaluate("1 + 2 * 3 - 4 / 2", "unit.js", 1).unwrap(), Value::Smi(5));
    assert_eq!(rt.evaluate("7 % 3", "unit.js", 1).unwrap(), Value::Smi(1));
}

#[test]
fn test_string_concatenation_is_left_to_right() {
    let rt = runtime();
    assert_eq!(eval_str(&rt, "'a' + 1 + 2"), "a12");
    assert_eq!(eval_str(&rt, "1 + 2 + 'a'"), "3a");
}

#[test]
fn test_number_formatting() {
    let rt = runtime();
    assert_eq!(eval_str(&rt, "0.1 + 0.2"), "0.30000000000000004");
    assert_eq!(eval_str(&rt, "1 / 0"), "Infinity");
    assert_eq!(eval_str(&rt, "0 / 0"), "NaN");
}

#[test]
fn test_equality_operators() {
    let rt = runtime();
    assert_eq!(rt.evaluate("'1' == 1", "unit.js", 1).unwrap(), Value::Boolean(true));
    assert_eq!(rt.evaluate("'1' === 1", "unit.js", 1).unwrap(), Value::Boolean(false));
    assert_eq!(rt.evaluate("null == undefined", "unit.js", 1).unwrap(), Value::Boolean(true));
    assert_eq!(rt.evaluate("'ab' === 'a' + 'b'", "unit.js", 1).unwrap(), Value::Boolean(true));
}

#[test]
fn test_typeof_results() {
    let rt = runtime();
    assert_eq!(eval_str(&rt, "typeof undeclaredName"), "undefined");
    assert_eq!(eval_str(&rt, "typeof function () {}"), "function");
    assert_eq!(eval_str(&rt, "typeof null"), "object");
    assert_eq!(eval_str(&rt, "typeof 'x'"), "string");
}

#[test]
fn test_logical_operators_short_circuit() {
    let rt = runtime();
    assert_eq!(
        rt.evaluate("var hit = false; false && (hit = true); hit", "unit.js", 1).unwrap(),
        Value::Boolean(false)
    );
    assert_eq!(eval_str(&rt, "null || 'fallback'"), "fallback");
}

#[test]
fn test_compound_assignment_and_update() {
    let rt = runtime();
    let v = rt.evaluate("var i = 5; i += 3; i *= 2; i--; i", "unit.js", 1).unwrap();
    assert_eq!(v, Value::Smi(15));
}

#[test]
fn test_bitwise_operators() {
    let rt = runtime();
    assert_eq!(rt.evaluate("(5 & 3) | 8", "unit.js", 1).unwrap(), Value::Smi(9));
    assert_eq!(rt.evaluate("-1 >>> 28", "unit.js", 1).unwrap(), Value::Smi(15));
    assert_eq!(rt.evaluate("1 << 4", "unit.js", 1).unwrap(), Value::Smi(16));
}

// ============================================================================
// Functions and objects
// ============================================================================

#[test]
fn test_closure_keeps_state() {
    let rt = runtime();
    let v = rt
        .evaluate(
            "function counter() { var n = 0; return function () { return ++n; }; }
             var c = counter(); c(); c()",
            "unit.js",
            1,
        )
        .unwrap();
    assert_eq!(v, Value::Smi(2));
}

#[test]
fn test_constructor_and_prototype_method() {
    let rt = runtime();
    let v = rt
        .evaluate(
            "function P(x) { this.x = x; }
             P.prototype.get = function () { return this.x; };
             var p = new P(5);
             p.get() + (p instanceof P ? 1 : 0)",
            "unit.js",
            1,
        )
        .unwrap();
    assert_eq!(v, Value::Smi(6));
}

#[test]
fn test_function_call_and_apply() {
    let rt = runtime();
    let source = "function f(a, b) { return this.v + a + b; }
                  f.call({ v: 1 }, 2, 3) * 10 + f.apply({ v: 0 }, [1, 1])";
    assert_eq!(rt.evaluate(source, "unit.js", 1).unwrap(), Value::Smi(62));
}

#[test]
fn test_arguments_object() {
    let rt = runtime();
    let v = rt
        .evaluate("function n() { return arguments.length; } n(1, 2, 3)", "unit.js", 1)
        .unwrap();
    assert_eq!(v, Value::Smi(3));
}

#[test]
fn test_object_literal_accessors() {
    let rt = runtime();
    let v = rt
        .evaluate(
            "var store = 0;
             var o = { get x() { return 7; }, set x(v) { store = v; } };
             o.x = 4;
             o.x + store",
            "unit.js",
            1,
        )
        .unwrap();
    assert_eq!(v, Value::Smi(11));
}

#[test]
fn test_delete_and_in() {
    let rt = runtime();
    assert_eq!(
        rt.evaluate("var o = { a: 1 }; delete o.a; 'a' in o", "unit.js", 1).unwrap(),
        Value::Boolean(false)
    );
    assert_eq!(
        rt.evaluate("'toString' in {}", "unit.js", 1).unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn test_let_and_const_are_block_scoped() {
    let rt = runtime();
    let v = rt
        .evaluate("var x = 1; { let x = 2; } x", "unit.js", 1)
        .unwrap();
    assert_eq!(v, Value::Smi(1));
    assert_eq!(
        eval_err(&rt, "{ const k = 1; k = 2; }"),
        "TypeError: invalid assignment to const k"
    );
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_loops_with_break_and_continue() {
    let rt = runtime();
    let v = rt
        .evaluate(
            "var sum = 0;
             for (var i = 0; i < 10; i++) {
                 if (i == 3) continue;
                 if (i == 6) break;
                 sum += i;
             }
             var j = 0;
             while (j < 5) { j++; }
             do { j++; } while (false);
             sum * 100 + j",
            "unit.js",
            1,
        )
        .unwrap();
    assert_eq!(v, Value::Smi(1206));
}

#[test]
fn test_for_in_visits_keys_in_order() {
    let rt = runtime();
    assert_eq!(
        eval_str(&rt, "var o = { b: 1, a: 2 }; var k = []; for (var p in o) k.push(p); k.join()"),
        "b,a"
    );
}

#[test]
fn test_for_in_skips_deleted_keys() {
    let rt = runtime();
    assert_eq!(
        eval_str(
            &rt,
            "var o = { a: 1, b: 2, c: 3 }; var k = [];
             for (var p in o) { if (p == 'a') delete o.b; k.push(p); }
             k.join()"
        ),
        "a,c"
    );
}

#[test]
fn test_try_catch_finally_order() {
    let rt = runtime();
    assert_eq!(
        eval_str(
            &rt,
            "var log = [];
             try { throw new TypeError('bad'); }
             catch (e) { log.push(e.name + ':' + e.message); }
             finally { log.push('finally'); }
             log.join(' ')"
        ),
        "TypeError:bad finally"
    );
}

#[test]
fn test_finally_runs_on_return() {
    let rt = runtime();
    let v = rt
        .evaluate(
            "var ran = false;
             function f() { try { return 1; } finally { ran = true; } }
             f() + (ran ? 10 : 0)",
            "unit.js",
            1,
        )
        .unwrap();
    assert_eq!(v, Value::Smi(11));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_reference_error_for_unknown_name() {
    let rt = runtime();
    assert_eq!(eval_err(&rt, "missing + 1"), "ReferenceError: missing is not defined");
}

#[test]
fn test_calling_non_function_is_type_error() {
    let rt = runtime();
    assert_eq!(eval_err(&rt, "var o = {}; o.nope()"), "TypeError: o.nope is not a function");
}

#[test]
fn test_error_objects_are_instances_of_their_kind() {
    let rt = runtime();
    let v = rt
        .evaluate(
            "var e; try { null.x; } catch (caught) { e = caught; }
             e instanceof TypeError && e instanceof Error",
            "unit.js",
            1,
        )
        .unwrap();
    assert_eq!(v, Value::Boolean(true));
}

#[test]
fn test_error_to_string() {
    let rt = runtime();
    assert_eq!(eval_str(&rt, "String(new RangeError('out'))"), "RangeError: out");
    assert_eq!(eval_str(&rt, "new Error('plain').toString()"), "Error: plain");
}

#[test]
fn test_too_much_recursion() {
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let rt = runtime();
            eval_err(&rt, "function f() { return f(); } f()")
        })
        .unwrap();
    assert_eq!(handle.join().unwrap(), "InternalError: too much recursion");
}

// ============================================================================
// Intrinsics
// ============================================================================

#[test]
fn test_array_methods() {
    let rt = runtime();
    assert_eq!(eval_str(&rt, "var a = [1, 2]; a.push(3); a.join('-')"), "1-2-3");
    assert_eq!(rt.evaluate("[4, 5].pop()", "unit.js", 1).unwrap(), Value::Smi(5));
    assert_eq!(rt.evaluate("new Array(3).length", "unit.js", 1).unwrap(), Value::Smi(3));
    assert_eq!(eval_str(&rt, "String([1, [2, 3]])"), "1,2,3");
}

#[test]
fn test_string_methods() {
    let rt = runtime();
    assert_eq!(eval_str(&rt, "'Hello'.toUpperCase()"), "HELLO");
    assert_eq!(eval_str(&rt, "'Hello'.toLowerCase()"), "hello");
    assert_eq!(eval_str(&rt, "'abc'.charAt(1)"), "b");
    assert_eq!(rt.evaluate("'hello'.indexOf('l')", "unit.js", 1).unwrap(), Value::Smi(2));
    assert_eq!(eval_str(&rt, "'hello'.substring(4, 1)"), "ell");
    assert_eq!(rt.evaluate("'h\\u00e9llo'.length", "unit.js", 1).unwrap(), Value::Smi(5));
}

#[test]
fn test_object_prototype_methods() {
    let rt = runtime();
    assert_eq!(
        rt.evaluate("({ a: 1 }).hasOwnProperty('a')", "unit.js", 1).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(eval_str(&rt, "Object.prototype.toString.call([])"), "[object Array]");
}

#[test]
fn test_function_constructor_compiles_source() {
    let rt = runtime();
    let v = rt
        .evaluate("var add = new Function('a', 'b', 'return a + b'); add(2, 3)", "unit.js", 1)
        .unwrap();
    assert_eq!(v, Value::Smi(5));
}
