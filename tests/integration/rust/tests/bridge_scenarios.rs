//! Host Bridge Scenario Tests
//!
//! Exercises the bridge the way an embedder would:
//! - Native classes created and driven from script
//! - Native functions with converted arguments and results
//! - Rooting across forced collections
//! - Errors crossing the boundary in both directions

use bridge::{
    load_class, load_extension, method, register_extension, trace_fields, ClassDescription, Context, Error,
    FromScript, LocalRootScope, Native, NativeFunctionBase, NativeObject, Object, Result, Root, Value,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// =============================================================================
// Fixtures
// =============================================================================

thread_local! {
    static SEEN: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct Counter {
    count: Cell<u32>,
}

trace_fields!(Counter);

impl NativeObject for Counter {
    fn class_name(&self) -> &str {
        "Counter"
    }
}

struct Gauge;

trace_fields!(Gauge);

impl NativeObject for Gauge {
    fn class_name(&self) -> &str {
        "Gauge"
    }
}

fn counter_class() -> ClassDescription<Counter> {
    ClassDescription::new("test.Counter", "Counter")
        .arity(1)
        .constructor(|call| {
            let start = Option::<u32>::from_value(call.context(), &call.arg(0))?;
            Ok(Counter {
                count: Cell::new(start.unwrap_or(0)),
            })
        })
        .method(NativeFunctionBase::adapt(
            "increment",
            method(|_cx: &Context, this: Native<Counter>| -> Result<u32> {
                let counter = this.instance()?;
                SEEN.with(|seen| seen.borrow_mut().push(&*counter as *const Counter as usize));
                counter.count.set(counter.count.get() + 1);
                Ok(counter.count.get())
            }),
        ))
        .accessor(
            "count",
            Some(NativeFunctionBase::adapt(
                "count",
                method(|_cx: &Context, this: Native<Counter>| -> Result<u32> {
                    Ok(this.instance()?.count.get())
                }),
            )),
            None,
        )
        .property("unit", "calls")
        .static_method(NativeFunctionBase::adapt("describe", |_cx: &Context| "counts calls"))
}

fn gauge_class() -> ClassDescription<Gauge> {
    ClassDescription::new("test.Gauge", "Gauge")
        .base("test.Counter")
        .constructor(|_call| Ok(Gauge))
}

fn context_with_counter() -> Context {
    let cx = Context::create().unwrap();
    load_class(&cx, &cx.global(), counter_class()).unwrap();
    cx
}

fn eval(cx: &Context, source: &str) -> Value {
    cx.evaluate(source, "scenario.js", 1).unwrap()
}

fn eval_string(cx: &Context, source: &str) -> String {
    eval(cx, source).to_std_string(cx).unwrap()
}

// =============================================================================
// Native classes
// =============================================================================

#[test]
fn test_counter_increments_the_same_instance() {
    let cx = context_with_counter();
    SEEN.with(|seen| seen.borrow_mut().clear());

    let results = eval(&cx, "var c = new Counter(); [c.increment(), c.increment()]");
    assert_eq!(Vec::<u32>::from_value(&cx, &results).unwrap(), [1, 2]);

    let c = cx.global().get_property(&cx, "c").unwrap().to_object(&cx).unwrap();
    let first = c.get_native::<Counter>(&cx).unwrap();
    let second = c.get_native::<Counter>(&cx).unwrap();
    assert!(Native::ptr_eq(&first, &second));
    let counter = first.instance().unwrap();
    assert_eq!(counter.count.get(), 2);

    let address = &*counter as *const Counter as usize;
    SEEN.with(|seen| assert_eq!(*seen.borrow(), [address, address]));
}

#[test]
fn test_counter_called_without_new() {
    let cx = context_with_counter();
    assert_eq!(eval(&cx, "Counter(5).increment()").get_int().unwrap(), 6);
    assert!(eval(&cx, "Counter(1) instanceof Counter").get_boolean().unwrap());
}

#[test]
fn test_class_members() {
    let cx = context_with_counter();
    assert_eq!(eval(&cx, "var c = new Counter(3); c.increment(); c.count").get_int().unwrap(), 4);
    assert_eq!(eval_string(&cx, "Counter.describe()"), "counts calls");
    assert_eq!(eval_string(&cx, "c.unit"), "calls");
    assert_eq!(eval(&cx, "Counter.length").get_int().unwrap(), 1);
    assert!(eval(&cx, "c.constructor === Counter").get_boolean().unwrap());
    assert_eq!(eval_string(&cx, "Object.prototype.toString.call(c)"), "[object Counter]");
}

#[test]
fn test_class_methods_are_not_enumerable() {
    let cx = context_with_counter();
    let keys = eval_string(&cx, "var keys = []; for (var k in new Counter()) keys.push(k); keys.join(',')");
    let keys: Vec<&str> = keys.split(',').collect();
    assert!(keys.contains(&"unit"), "{:?}", keys);
    assert!(!keys.contains(&"increment"), "{:?}", keys);
    assert!(!keys.contains(&"constructor"), "{:?}", keys);
    let listed = eval(&cx, "var found = false; for (var k in this) { if (k === 'Counter') found = true; } found");
    assert!(!listed.get_boolean().unwrap());
}

#[test]
fn test_loading_a_class_twice_returns_the_registered_constructor() {
    let cx = Context::create().unwrap();
    let first = load_class(&cx, &cx.global(), counter_class()).unwrap();
    let elsewhere = cx.create_object(None).unwrap();
    let second = load_class(&cx, &elsewhere, counter_class()).unwrap();
    assert_eq!(first, second);
    assert!(!elsewhere.has_own_property(&cx, "Counter").unwrap());
    assert_eq!(cx.constructor("test.Counter"), Some(first));
}

#[test]
fn test_derived_class_inherits_methods_but_not_the_native_type() {
    let cx = context_with_counter();
    load_class(&cx, &cx.global(), gauge_class()).unwrap();
    assert!(eval(&cx, "'increment' in new Gauge()").get_boolean().unwrap());
    assert_eq!(
        eval_string(&cx, "var n; try { new Gauge().increment(); } catch (e) { n = e.name; } n"),
        "WrongClassError"
    );
}

#[test]
fn test_derived_class_needs_its_base() {
    let cx = Context::create().unwrap();
    let result = load_class(&cx, &cx.global(), gauge_class());
    assert!(matches!(result, Err(Error::EngineState(_))));
}

#[test]
fn test_class_without_constructor_is_not_constructible() {
    let cx = Context::create().unwrap();
    let description = ClassDescription::<Gauge>::new("test.Sealed", "Sealed");
    assert!(!description.is_constructible());
    load_class(&cx, &cx.global(), description).unwrap();
    assert_eq!(
        eval_string(&cx, "var r; try { new Sealed(); } catch (e) { r = String(e); } r"),
        "TypeError: Sealed is not a constructor"
    );
    let native = cx.create_native_object(Gauge).unwrap();
    cx.global().set_property(&cx, "g", &native).unwrap();
    assert!(eval(&cx, "g instanceof Sealed").get_boolean().unwrap());
}

#[test]
fn test_native_lookup_reports_the_wrong_class() {
    let cx = context_with_counter();
    let counter = eval(&cx, "new Counter()").to_object(&cx).unwrap();
    match counter.get_native::<Gauge>(&cx) {
        Err(Error::WrongClass { expected, found }) => {
            assert!(expected.ends_with("Gauge"), "{}", expected);
            assert!(found.ends_with("Counter"), "{}", found);
        }
        other => panic!("expected WrongClass, got {:?}", other),
    }
    let plain = eval(&cx, "({})").to_object(&cx).unwrap();
    assert!(matches!(plain.get_native::<Counter>(&cx), Err(Error::NotNative)));
}

// =============================================================================
// Native functions
// =============================================================================

#[test]
fn test_returned_string_length_counts_utf16_units() {
    let cx = Context::create().unwrap();
    let text = NativeFunctionBase::adapt("text", |_cx: &Context| "h\u{e9}llo \u{1F600}".to_string());
    let text = cx.create_native_function(text).unwrap();
    cx.global().set_property(&cx, "text", &text).unwrap();
    assert_eq!(eval(&cx, "text().length").get_int().unwrap(), 8);
    let value = eval(&cx, "text()");
    assert_eq!(value.to_js_string(&cx).unwrap().length(&cx).unwrap(), 8);
    assert_eq!(value.to_std_string(&cx).unwrap(), "h\u{e9}llo \u{1F600}");
}

#[test]
fn test_adapted_arity_is_visible_to_scripts() {
    let cx = Context::create().unwrap();
    let clamp = NativeFunctionBase::adapt("clamp", |_cx: &Context, v: f64, lo: f64, hi: f64| v.max(lo).min(hi));
    assert_eq!(clamp.arity(), 3);
    let clamp = cx.create_native_function(clamp).unwrap();
    assert_eq!(clamp.arity(&cx).unwrap(), 3);
    assert_eq!(clamp.name(&cx).unwrap(), "clamp");
    cx.global().set_property(&cx, "clamp", &clamp).unwrap();
    assert_eq!(eval(&cx, "clamp(15, 0, 10)").get_int().unwrap(), 10);
}

#[test]
fn test_out_of_range_argument_raises_range_error() {
    let cx = Context::create().unwrap();
    let byte = NativeFunctionBase::adapt("byte", |_cx: &Context, b: u8| b);
    cx.global()
        .set_property(&cx, "byte", &cx.create_native_function(byte).unwrap())
        .unwrap();
    assert_eq!(eval(&cx, "byte(255)").get_int().unwrap(), 255);
    let caught = eval_string(&cx, "var r; try { byte(256); } catch (e) { r = e.name; } r");
    assert_eq!(caught, "RangeError");
    let uncaught = cx.evaluate("byte(-1)", "range.js", 1);
    match uncaught {
        Err(Error::Script(e)) => assert!(e.message().starts_with("RangeError"), "{}", e.message()),
        other => panic!("expected a script exception, got {:?}", other),
    }
}

#[test]
fn test_quit_is_not_catchable() {
    let cx = Context::create().unwrap();
    let stop = NativeFunctionBase::new(0, "stop", |_call| Err(Error::Quit));
    cx.global()
        .set_property(&cx, "stop", &cx.create_native_function(stop).unwrap())
        .unwrap();
    let result = cx.evaluate("var x = 0; try { stop(); } catch (e) { x = 1; } x = 2;", "quit.js", 1);
    assert!(matches!(result, Err(Error::Quit)));
    assert_eq!(cx.global().get_property(&cx, "x").unwrap().get_int().unwrap(), 0);
}

#[test]
fn test_script_exception_carries_location() {
    let cx = Context::create().unwrap();
    let result = cx.evaluate("\n\nthrow new TypeError('bad');", "thrower.js", 10);
    let Err(Error::Script(exception)) = result else {
        panic!("expected a script exception");
    };
    assert_eq!(exception.message(), "TypeError: bad");
    assert_eq!(exception.file(), Some("thrower.js"));
    assert_eq!(exception.line(), Some(12));
    assert_eq!(exception.to_string(), "thrower.js:12: TypeError: bad");
    let thrown = exception.value().to_object(&cx).unwrap();
    assert_eq!(thrown.get_property(&cx, "message").unwrap().to_std_string(&cx).unwrap(), "bad");
}

#[test]
fn test_host_rethrows_the_original_value() {
    let cx = Context::create().unwrap();
    let relay = NativeFunctionBase::adapt("relay", |cx: &Context, f: bridge::Function| {
        f.call(cx, &Value::undefined(), &[])
    });
    cx.global()
        .set_property(&cx, "relay", &cx.create_native_function(relay).unwrap())
        .unwrap();
    let same = eval(
        &cx,
        "var token = { id: 1 }; var got; try { relay(function () { throw token; }); } catch (e) { got = e; } got === token",
    );
    assert!(same.get_boolean().unwrap());
}

// =============================================================================
// Rooting
// =============================================================================

#[test]
fn test_root_survives_collection_and_transients_go_stale() {
    let cx = Context::create().unwrap();
    let kept = Root::new(&cx, eval(&cx, "({ tag: 'kept' })").to_object(&cx).unwrap()).unwrap();
    let lost = eval(&cx, "({ tag: 'lost' })").to_object(&cx).unwrap();
    cx.gc();
    assert_eq!(kept.get_property(&cx, "tag").unwrap().to_std_string(&cx).unwrap(), "kept");
    match lost.get_property(&cx, "tag") {
        Err(Error::EngineState(message)) => assert_eq!(message, "stale handle"),
        other => panic!("expected a stale handle error, got {:?}", other),
    }
}

#[test]
fn test_local_scopes_keep_inner_values_until_they_close() {
    let cx = Context::create().unwrap();
    let mut outer = LocalRootScope::new(&cx);
    let outer_value = eval(&cx, "({ n: 1 })").to_object(&cx).unwrap();
    let inner_value;
    {
        let _inner = outer.nested();
        inner_value = eval(&cx, "({ n: 2 })").to_object(&cx).unwrap();
        cx.gc();
        assert_eq!(inner_value.get_property(&cx, "n").unwrap().get_int().unwrap(), 2);
    }
    cx.gc();
    assert!(inner_value.get_property(&cx, "n").is_err());
    assert_eq!(outer_value.get_property(&cx, "n").unwrap().get_int().unwrap(), 1);
    assert_eq!(outer.depth(), 1);
}

#[test]
fn test_local_scope_roots_values_made_by_native_code_during_a_script_call() {
    let cx = Context::create().unwrap();
    let made: Rc<RefCell<Option<Object>>> = Rc::default();
    let sink = made.clone();
    let make = NativeFunctionBase::adapt("make", move |cx: &Context| -> Result<()> {
        let object = cx.create_object(None)?;
        object.set_property(cx, "n", 5)?;
        *sink.borrow_mut() = Some(object);
        Ok(())
    });
    cx.global()
        .set_property(&cx, "make", &cx.create_native_function(make).unwrap())
        .unwrap();

    {
        let _scope = LocalRootScope::new(&cx);
        eval(&cx, "make(); var later = { filler: [1, 2, 3] }; 1");
        cx.gc();
        let object = made.borrow().clone().unwrap();
        assert_eq!(object.get_property(&cx, "n").unwrap().get_int().unwrap(), 5);
    }
    cx.gc();
    let object = made.borrow().clone().unwrap();
    assert!(matches!(object.get_property(&cx, "n"), Err(Error::EngineState(_))));
}

#[test]
fn test_native_instance_is_dropped_with_its_object() {
    struct Tracked(Rc<Cell<bool>>);
    trace_fields!(Tracked);
    impl NativeObject for Tracked {}
    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    let cx = Context::create().unwrap();
    let dropped = Rc::new(Cell::new(false));
    let object = cx.create_native_object(Tracked(dropped.clone())).unwrap();
    let native = object.get_native::<Tracked>(&cx).unwrap();
    cx.gc();
    assert!(dropped.get());
    assert!(matches!(object.get_property(&cx, "x"), Err(Error::EngineState(_))));
    match native.instance() {
        Err(Error::EngineState(message)) => assert_eq!(message, "stale handle"),
        other => panic!("expected a stale handle error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_native_payload_keeps_traced_values_alive() {
    struct Holder {
        held: RefCell<Option<Object>>,
    }
    trace_fields!(Holder { held });
    impl NativeObject for Holder {}

    let cx = Context::create().unwrap();
    let holder = Root::new(
        &cx,
        cx.create_native_object(Holder {
            held: RefCell::new(None),
        })
        .unwrap(),
    )
    .unwrap();
    let payload = eval(&cx, "({ deep: true })").to_object(&cx).unwrap();
    let native = holder.get_native::<Holder>(&cx).unwrap();
    *native.instance().unwrap().held.borrow_mut() = Some(payload);
    cx.gc();
    let held = native.instance().unwrap().held.borrow().clone().unwrap();
    assert!(held.get_property(&cx, "deep").unwrap().get_boolean().unwrap());
}

// =============================================================================
// Array-likes
// =============================================================================

#[test]
fn test_vec_from_a_huge_length_fails_on_the_first_element() {
    let cx = Context::create().unwrap();
    let huge = eval(&cx, "({ length: 4294967295 })");
    assert!(matches!(Vec::<i32>::from_value(&cx, &huge), Err(Error::Range(_))));
    let too_long = eval(&cx, "({ length: 4294967296 })");
    assert!(matches!(Vec::<i32>::from_value(&cx, &too_long), Err(Error::Range(_))));
}

#[test]
fn test_vec_from_an_array_like_object() {
    let cx = Context::create().unwrap();
    let like = eval(&cx, "var o = { length: 2 }; o[0] = 'a'; o[1] = 'b'; o");
    assert_eq!(Vec::<String>::from_value(&cx, &like).unwrap(), ["a", "b"]);
    let empty = eval(&cx, "({})");
    assert!(Vec::<String>::from_value(&cx, &empty).unwrap().is_empty());
}

// =============================================================================
// Extensions
// =============================================================================

fn math_extension(exports: &Object, cx: &Context) -> Result<()> {
    let square = NativeFunctionBase::adapt("square", |_cx: &Context, n: f64| n * n);
    exports.set_property(cx, "square", &cx.create_native_function(square)?)?;
    exports.set_property(cx, "name", "math")
}

#[test]
fn test_extension_exports_are_shared_per_context() {
    register_extension("scenario.math", math_extension);
    let cx = Context::create().unwrap();
    let exports = load_extension(&cx, "scenario.math").unwrap();
    cx.global().set_property(&cx, "math", &exports).unwrap();
    assert_eq!(eval(&cx, "math.square(9)").get_int().unwrap(), 81);
    assert_eq!(load_extension(&cx, "scenario.math").unwrap(), exports);

    let other = Context::create().unwrap();
    let fresh = load_extension(&other, "scenario.math").unwrap();
    assert_eq!(fresh.get_property(&other, "name").unwrap().to_std_string(&other).unwrap(), "math");
}
