//! Unit tests for the host bridge

use bridge::{
    Array, Context, CurrentContextScope, Error, FromScript, Function, JsString, LocalRootScope, NativeFunctionBase,
    Object, Root, ToScript, Value,
};

fn eval(cx: &Context, source: &str) -> Value {
    cx.evaluate(source, "unit.js", 1).unwrap()
}

// ============================================================================
// Value Tests
// ============================================================================

#[test]
fn test_value_predicates() {
    let cx = Context::create().unwrap();
    assert!(Value::undefined().is_undefined());
    assert!(Value::null().is_null());
    assert!(Value::null().is_void() && Value::undefined().is_void());
    assert!(Value::from_bool(true).is_boolean());
    assert!(Value::from_int(3).is_int());
    assert!(Value::from_number(0.25).is_double());
    assert!(Value::from_number(4.0).is_int());
    assert!(eval(&cx, "'s'").is_string());
    assert!(eval(&cx, "[]").is_object());
}

#[test]
fn test_typed_accessors_do_not_convert() {
    assert!(Value::from_int(1).get_boolean().is_err());
    assert!(Value::from_number(1.5).get_int().is_err());
    assert_eq!(Value::from_int(7).get_double().unwrap(), 7.0);
    assert!(matches!(Value::null().get_double(), Err(Error::Type(_))));
}

#[test]
fn test_engine_conversions() {
    let cx = Context::create().unwrap();
    assert_eq!(eval(&cx, "'12.5'").to_number(&cx).unwrap(), 12.5);
    assert!(!eval(&cx, "''").to_boolean(&cx).unwrap());
    assert_eq!(Value::from_bool(false).to_std_string(&cx).unwrap(), "false");
    assert_eq!(Value::null().type_of(&cx), "object");
    assert_eq!(eval(&cx, "(function () {})").type_of(&cx), "function");
    assert_eq!(eval(&cx, "'quoted'").to_source(&cx), "\"quoted\"");
}

#[test]
fn test_to_object_rejects_void() {
    let cx = Context::create().unwrap();
    assert!(Value::undefined().to_object(&cx).is_err());
    assert!(Value::null().to_object(&cx).is_err());
}

#[test]
fn test_strict_equals_compares_strings_by_content() {
    let cx = Context::create().unwrap();
    let a = eval(&cx, "'same'");
    let b = cx.create_string("same").unwrap().into_value();
    assert!(a.strict_equals(&cx, &b));
    assert!(!Value::from_int(1).strict_equals(&cx, &eval(&cx, "'1'")));
}

#[test]
fn test_integral_number_bounds() {
    let cx = Context::create().unwrap();
    assert_eq!(Value::from_int(127).to_integral_number(&cx, 8, true).unwrap(), 127.0);
    assert!(Value::from_int(128).to_integral_number(&cx, 8, true).is_err());
    assert_eq!(Value::from_int(-128).to_integral_number(&cx, 8, true).unwrap(), -128.0);
    assert!(matches!(
        Value::from_number(f64::NAN).to_integral_number(&cx, 32, true),
        Err(Error::Range(_))
    ));
}

#[test]
fn test_assign_writes_through_bound_slot() {
    let mut target = Value::undefined();
    let source = Value::from_int(5);
    target.bind(&source);
    target.assign(&Value::from_int(9));
    assert_eq!(source.get_int().unwrap(), 9);
    target.unbind();
    target.assign(&Value::from_int(1));
    assert_eq!(source.get_int().unwrap(), 9);
    assert_eq!(target.get_int().unwrap(), 1);
}

// ============================================================================
// Conversion Tests
// ============================================================================

#[test]
fn test_integer_conversions() {
    let cx = Context::create().unwrap();
    assert_eq!(u16::from_value(&cx, &Value::from_int(65535)).unwrap(), 65535);
    assert!(matches!(u16::from_value(&cx, &Value::from_int(-1)), Err(Error::Range(_))));
    assert_eq!(i64::from_value(&cx, &eval(&cx, "'-42'")).unwrap(), -42);
    assert_eq!(u8::from_value(&cx, &Value::from_number(3.9)).unwrap(), 3);
}

#[test]
fn test_float_and_bool_conversions() {
    let cx = Context::create().unwrap();
    assert_eq!(f64::from_value(&cx, &eval(&cx, "'0.5'")).unwrap(), 0.5);
    assert!(f64::from_value(&cx, &Value::undefined()).unwrap().is_nan());
    assert!(bool::from_value(&cx, &eval(&cx, "({})")).unwrap());
    assert!(!bool::from_value(&cx, &Value::from_int(0)).unwrap());
}

#[test]
fn test_string_conversions_preserve_unicode() {
    let cx = Context::create().unwrap();
    let value = "\u{1F600} ok".to_value(&cx).unwrap();
    assert_eq!(String::from_value(&cx, &value).unwrap(), "\u{1F600} ok");
    assert_eq!(String::from_value(&cx, &Value::from_int(12)).unwrap(), "12");
}

#[test]
fn test_vec_round_trip_through_script() {
    let cx = Context::create().unwrap();
    let array = vec![1, 2, 3].to_value(&cx).unwrap();
    cx.global().set_property(&cx, "input", &array).unwrap();
    let doubled = eval(&cx, "var out = []; for (var i = 0; i < input.length; i++) out.push(input[i] * 2); out");
    assert_eq!(Vec::<i32>::from_value(&cx, &doubled).unwrap(), [2, 4, 6]);
}

#[test]
fn test_option_conversions() {
    let cx = Context::create().unwrap();
    assert_eq!(Option::<i32>::from_value(&cx, &Value::undefined()).unwrap(), None);
    assert_eq!(Option::<i32>::from_value(&cx, &Value::from_int(4)).unwrap(), Some(4));
    assert!(None::<i32>.to_value(&cx).unwrap().is_undefined());
}

#[test]
fn test_view_conversions() {
    let cx = Context::create().unwrap();
    let function = eval(&cx, "(function add(a, b) { return a + b; })");
    assert!(Function::from_value(&cx, &function).is_ok());
    assert!(Array::from_value(&cx, &function).is_err());
    assert!(Function::from_value(&cx, &eval(&cx, "({})")).is_err());
    let text = JsString::from_value(&cx, &Value::from_int(10)).unwrap();
    assert_eq!(text.to_std_string(&cx).unwrap(), "10");
}

// ============================================================================
// Object View Tests
// ============================================================================

#[test]
fn test_object_properties() {
    let cx = Context::create().unwrap();
    let object = cx.create_object(None).unwrap();
    object.set_property(&cx, "name", "box").unwrap();
    assert!(object.has_property(&cx, "name").unwrap());
    assert!(object.has_property(&cx, "toString").unwrap());
    assert!(!object.has_own_property(&cx, "toString").unwrap());
    assert!(object.delete_property(&cx, "name").unwrap());
    assert!(object.get_property(&cx, "name").unwrap().is_undefined());
}

#[test]
fn test_object_prototype() {
    let cx = Context::create().unwrap();
    let base = cx.create_object(None).unwrap();
    base.set_property(&cx, "inherited", true).unwrap();
    let derived = cx.create_object(Some(&base)).unwrap();
    assert_eq!(derived.prototype(&cx).unwrap(), Some(base));
    assert!(derived.get_property(&cx, "inherited").unwrap().get_boolean().unwrap());
}

#[test]
fn test_accessor_property() {
    let cx = Context::create().unwrap();
    let object = cx.create_object(None).unwrap();
    let getter = cx.create_function("get", &[], "return 40 + 2;", "accessor.js", 1).unwrap();
    object
        .define_accessor(&cx, "answer", Some(&getter), None, bridge::PropertyFlags::empty())
        .unwrap();
    assert_eq!(object.get_property(&cx, "answer").unwrap().get_int().unwrap(), 42);
}

#[test]
fn test_function_views() {
    let cx = Context::create().unwrap();
    let add = cx.create_function("add", &["a", "b"], "return a + b;", "add.js", 1).unwrap();
    assert_eq!(add.arity(&cx).unwrap(), 2);
    assert_eq!(add.name(&cx).unwrap(), "add");
    let sum = add
        .call(&cx, &Value::undefined(), &[Value::from_int(2), Value::from_int(3)])
        .unwrap();
    assert_eq!(sum.get_int().unwrap(), 5);

    let args = cx.create_array(0).unwrap();
    args.push(&cx, 10).unwrap();
    args.push(&cx, 20).unwrap();
    assert_eq!(add.apply(&cx, &Value::undefined(), &args).unwrap().get_int().unwrap(), 30);
}

#[test]
fn test_function_construct() {
    let cx = Context::create().unwrap();
    let point = eval(&cx, "(function Point(x) { this.x = x; })");
    let point = Function::from_value(&cx, &point).unwrap();
    let instance = point.construct(&cx, &[Value::from_int(8)]).unwrap();
    assert_eq!(instance.get_property(&cx, "x").unwrap().get_int().unwrap(), 8);
}

#[test]
fn test_array_views() {
    let cx = Context::create().unwrap();
    let array = cx.create_array(2).unwrap();
    assert_eq!(array.length(&cx).unwrap(), 2);
    assert!(array.get_element(&cx, 0).unwrap().is_undefined());
    array.set_element(&cx, 3, "last").unwrap();
    assert_eq!(array.length(&cx).unwrap(), 4);
    array.set_length(&cx, 1).unwrap();
    assert_eq!(array.length(&cx).unwrap(), 1);
    assert!(array.object().is_array(&cx));
}

#[test]
fn test_js_string_units() {
    let cx = Context::create().unwrap();
    let units: Vec<u16> = "a\u{1F600}".encode_utf16().collect();
    let text = JsString::from_utf16(&cx, &units).unwrap();
    assert_eq!(text.length(&cx).unwrap(), 3);
    assert_eq!(text.units(&cx).unwrap(), units);
    assert_eq!(text.to_std_string(&cx).unwrap(), "a\u{1F600}");
}

#[test]
fn test_lone_surrogate_becomes_replacement_character() {
    let cx = Context::create().unwrap();
    let text = JsString::from_utf16(&cx, &[0x61, 0xD800]).unwrap();
    assert_eq!(text.length(&cx).unwrap(), 2);
    assert_eq!(text.to_std_string(&cx).unwrap(), "a\u{FFFD}");
}

// ============================================================================
// Rooting Tests
// ============================================================================

#[test]
fn test_root_into_inner_unroots() {
    let cx = Context::create().unwrap();
    let root = Root::new(&cx, eval(&cx, "({ n: 1 })").to_object(&cx).unwrap()).unwrap();
    cx.gc();
    let object: Object = root.into_inner();
    assert_eq!(object.get_property(&cx, "n").unwrap().get_int().unwrap(), 1);
    cx.gc();
    assert!(object.get_property(&cx, "n").is_err());
}

#[test]
fn test_root_set_replaces_value() {
    let cx = Context::create().unwrap();
    let root = Root::new(&cx, eval(&cx, "({ n: 1 })")).unwrap();
    root.set(&eval(&cx, "({ n: 2 })"));
    cx.gc();
    let object = root.to_object(&cx).unwrap();
    assert_eq!(object.get_property(&cx, "n").unwrap().get_int().unwrap(), 2);
}

#[test]
fn test_scope_depth_tracks_nesting() {
    let cx = Context::create().unwrap();
    let mut outer = LocalRootScope::new(&cx);
    assert_eq!(outer.depth(), 1);
    {
        let inner = outer.nested();
        assert_eq!(inner.depth(), 2);
    }
    assert_eq!(outer.depth(), 1);
}

#[test]
fn test_scope_roots_clones_explicitly() {
    let cx = Context::create().unwrap();
    let original = eval(&cx, "({ n: 3 })");
    let scope = LocalRootScope::new(&cx);
    let copy = original.clone();
    scope.root(&copy);
    cx.gc();
    let object = copy.to_object(&cx).unwrap();
    assert_eq!(object.get_property(&cx, "n").unwrap().get_int().unwrap(), 3);
}

// ============================================================================
// Context Tests
// ============================================================================

#[test]
fn test_current_context_during_native_call() {
    let cx = Context::create().unwrap();
    let is_current_here = NativeFunctionBase::adapt("is_current_here", |cx: &Context| {
        Context::current().is_some_and(|current| Context::ptr_eq(&current, cx))
    });
    cx.global()
        .set_property(&cx, "is_current_here", &cx.create_native_function(is_current_here).unwrap())
        .unwrap();
    assert!(eval(&cx, "is_current_here()").get_boolean().unwrap());
    assert!(Context::current().is_none());
}

#[test]
fn test_current_context_scopes_nest() {
    let a = Context::create().unwrap();
    let b = Context::create().unwrap();
    let _outer = CurrentContextScope::enter(&a);
    {
        let _inner = CurrentContextScope::enter(&b);
        assert!(b.is_current());
        assert!(!a.is_current());
    }
    assert!(a.is_current());
}

#[test]
fn test_destroyed_context_refuses_work() {
    let cx = Context::create().unwrap();
    cx.destroy();
    cx.destroy();
    assert!(matches!(cx.evaluate("1", "late.js", 1), Err(Error::EngineState(_))));
    assert!(matches!(cx.create_object(None), Err(Error::EngineState(_))));
}

#[test]
fn test_evaluate_in_scope_uses_scope_object() {
    let cx = Context::create().unwrap();
    let scope = cx.create_object(None).unwrap();
    scope.set_property(&cx, "local", 5).unwrap();
    let result = cx.evaluate_in_scope("var made = local * 2; made", "scope.js", 1, &scope).unwrap();
    assert_eq!(result.get_int().unwrap(), 10);
    assert_eq!(scope.get_property(&cx, "made").unwrap().get_int().unwrap(), 10);
    assert!(!cx.global().has_own_property(&cx, "made").unwrap());
}

#[test]
fn test_class_registry_is_per_context() {
    let a = Context::create().unwrap();
    let b = Context::create().unwrap();
    let prototype = a.create_object(None).unwrap();
    a.add_prototype("unit.Thing", &prototype).unwrap();
    assert_eq!(a.prototype("unit.Thing"), Some(prototype));
    assert!(b.prototype("unit.Thing").is_none());
}
