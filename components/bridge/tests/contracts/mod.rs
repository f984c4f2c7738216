//! Contract tests for the host bridge
//!
//! These tests pin down what native code can rely on: hook order for
//! property operations, lazy resolution, custom enumeration, callable
//! native objects and how errors cross the boundary.

use bridge::{
    load_class, trace_fields, CallContext, ClassDescription, Context, Enumeration, Error, Native, NativeFunctionBase,
    NativeObject, NativeObjectBase, Object, PropertyFlags, PropertyMode, ResolveFlags, Result, ToScript, Value,
};
use std::any::Any;
use std::cell::RefCell;

// =============================================================================
// Fixtures
// =============================================================================

/// Logs property operations, doubles numbers stored under `double` and
/// refuses to lose `locked`.
#[derive(Default)]
struct Store {
    log: RefCell<Vec<(PropertyMode, String)>>,
}

trace_fields!(Store);

impl NativeObject for Store {
    fn class_name(&self) -> &str {
        "Store"
    }

    fn property_op(&self, cx: &Context, _object: &Object, mode: PropertyMode, key: &str, data: &Value) -> Result<()> {
        self.log.borrow_mut().push((mode, key.to_string()));
        match (mode, key) {
            (PropertyMode::Set, "double") => {
                let n = data.to_number(cx)?;
                data.assign(&Value::from_number(n * 2.0));
            }
            (PropertyMode::Delete, "locked") => return Err(Error::CannotDelete(key.to_string())),
            _ => {}
        }
        Ok(())
    }
}

impl Store {
    fn take_log(&self) -> Vec<(PropertyMode, String)> {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

/// Defines `lazy` the first time it is looked up.
#[derive(Default)]
struct Lazy {
    resolved: RefCell<Vec<String>>,
}

trace_fields!(Lazy);

impl NativeObject for Lazy {
    fn property_resolve(&self, cx: &Context, object: &Object, key: &str, _flags: ResolveFlags) -> Result<bool> {
        if key != "lazy" {
            return Ok(false);
        }
        self.resolved.borrow_mut().push(key.to_string());
        object.define_property(cx, key, 7, PropertyFlags::empty())?;
        Ok(true)
    }
}

/// Lists fixed names and defines each one when it is looked up.
struct Listing {
    names: Vec<&'static str>,
}

trace_fields!(Listing);

impl NativeObject for Listing {
    fn class_name(&self) -> &str {
        "Listing"
    }

    fn property_resolve(&self, cx: &Context, object: &Object, key: &str, _flags: ResolveFlags) -> Result<bool> {
        match self.names.iter().position(|name| *name == key) {
            Some(index) => {
                object.define_property(cx, key, index as i32, PropertyFlags::empty())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn enumerate_start(&self, _cx: &Context, _object: &Object) -> Result<Option<Enumeration>> {
        Ok(Some(Enumeration {
            state: Box::new(0usize),
            count_hint: Some(self.names.len()),
        }))
    }

    fn enumerate_next(&self, cx: &Context, _object: &Object, state: &mut dyn Any) -> Result<Value> {
        let Some(index) = state.downcast_mut::<usize>() else {
            return Err(Error::EngineState("unexpected enumeration state".into()));
        };
        match self.names.get(*index) {
            Some(name) => {
                *index += 1;
                name.to_value(cx)
            }
            None => Ok(Value::undefined()),
        }
    }
}

/// Lists a name it never defines and collects garbage on every lookup miss.
struct Collecting;

trace_fields!(Collecting);

impl NativeObject for Collecting {
    fn property_resolve(&self, cx: &Context, _object: &Object, _key: &str, _flags: ResolveFlags) -> Result<bool> {
        cx.gc();
        Ok(false)
    }

    fn enumerate_start(&self, _cx: &Context, _object: &Object) -> Result<Option<Enumeration>> {
        Ok(Some(Enumeration {
            state: Box::new(["ghost", "real"].into_iter()),
            count_hint: Some(2),
        }))
    }

    fn enumerate_next(&self, cx: &Context, _object: &Object, state: &mut dyn Any) -> Result<Value> {
        let Some(names) = state.downcast_mut::<std::array::IntoIter<&'static str, 2>>() else {
            return Err(Error::EngineState("unexpected enumeration state".into()));
        };
        match names.next() {
            Some(name) => name.to_value(cx),
            None => Ok(Value::undefined()),
        }
    }
}

/// Returns its argument count when called.
struct Counter;

trace_fields!(Counter);

impl NativeObject for Counter {
    fn self_call(&self, call: &mut CallContext<'_>) -> Result<()> {
        let count = call.arguments().len() as i32;
        call.set_result(&Value::from_int(count));
        Ok(())
    }
}

fn store_context() -> (Context, Object) {
    let cx = Context::create().unwrap();
    let store = cx.create_native_object(Store::default()).unwrap();
    cx.global().set_property(&cx, "store", &store).unwrap();
    (cx, store)
}

fn eval(cx: &Context, source: &str) -> Value {
    cx.evaluate(source, "contract.js", 1).unwrap()
}

// =============================================================================
// Property hooks
// =============================================================================

/// Test property_op contract: a new property reports Add then Set
#[test]
fn contract_new_property_reports_add_then_set() {
    let (cx, store) = store_context();
    store.set_property(&cx, "x", 1).unwrap();
    let log = store.get_native::<Store>(&cx).unwrap().instance().unwrap().take_log();
    assert_eq!(log, [(PropertyMode::Add, "x".to_string()), (PropertyMode::Set, "x".to_string())]);
}

/// Test property_op contract: the full lifecycle of a property from script
#[test]
fn contract_property_lifecycle_from_script() {
    let (cx, store) = store_context();
    eval(&cx, "store.x = 1; store.x; store.x = 2; delete store.x;");
    let log = store.get_native::<Store>(&cx).unwrap().instance().unwrap().take_log();
    let modes: Vec<PropertyMode> = log.iter().map(|(mode, _)| *mode).collect();
    assert_eq!(
        modes,
        [
            PropertyMode::Add,
            PropertyMode::Set,
            PropertyMode::Get,
            PropertyMode::Set,
            PropertyMode::Delete
        ]
    );
    assert!(log.iter().all(|(_, key)| key == "x"));
    assert!(!store.has_own_property(&cx, "x").unwrap());
}

/// Test property_op contract: rewriting data changes the stored value
#[test]
fn contract_set_hook_rewrites_the_value() {
    let (cx, store) = store_context();
    eval(&cx, "store.double = 21;");
    assert_eq!(store.get_property(&cx, "double").unwrap().get_int().unwrap(), 42);
    store.set_property(&cx, "double", 5).unwrap();
    assert_eq!(eval(&cx, "store.double").get_int().unwrap(), 10);
}

/// Test property_op contract: a refused delete keeps the property
#[test]
fn contract_refused_delete_throws_and_keeps_property() {
    let (cx, store) = store_context();
    store.set_property(&cx, "locked", "safe").unwrap();
    let name = eval(&cx, "var n; try { delete store.locked; } catch (e) { n = e.name; } n");
    assert_eq!(name.to_std_string(&cx).unwrap(), "CannotDeleteError");
    assert!(store.has_own_property(&cx, "locked").unwrap());
    assert!(matches!(store.delete_property(&cx, "locked"), Err(Error::Script(_))));
}

/// Test property_op contract: permanent properties are not deleted
#[test]
fn contract_permanent_property_is_kept() {
    let cx = Context::create().unwrap();
    let object = cx.create_object(None).unwrap();
    object.define_property(&cx, "fixed", 1, PropertyFlags::PERMANENT).unwrap();
    assert!(!object.delete_property(&cx, "fixed").unwrap());
    assert!(object.has_own_property(&cx, "fixed").unwrap());
}

// =============================================================================
// Lazy resolution
// =============================================================================

/// Test property_resolve contract: a resolved property is defined once
#[test]
fn contract_resolve_defines_on_first_lookup() {
    let cx = Context::create().unwrap();
    let lazy = cx.create_native_object(Lazy::default()).unwrap();
    cx.global().set_property(&cx, "lazy", &lazy).unwrap();
    assert_eq!(eval(&cx, "lazy.lazy + lazy.lazy").get_int().unwrap(), 14);
    assert!(eval(&cx, "lazy.other === undefined").get_boolean().unwrap());
    let native = lazy.get_native::<Lazy>(&cx).unwrap();
    assert_eq!(*native.instance().unwrap().resolved.borrow(), ["lazy"]);
    assert!(lazy.has_own_property(&cx, "lazy").unwrap());
}

// =============================================================================
// Enumeration
// =============================================================================

fn listing_context() -> (Context, Object) {
    let cx = Context::create().unwrap();
    let description = ClassDescription::<Listing>::new("contract.Listing", "Listing").custom_enumerate(true);
    load_class(&cx, &cx.global(), description).unwrap();
    let listing = cx
        .create_native_object(Listing {
            names: vec!["alpha", "beta"],
        })
        .unwrap();
    (cx, listing)
}

/// Test enumerate contract: for-in sees the custom names
#[test]
fn contract_for_in_uses_custom_enumeration() {
    let (cx, listing) = listing_context();
    cx.global().set_property(&cx, "listing", &listing).unwrap();
    let names = eval(&cx, "var seen = []; for (var k in listing) seen.push(k); seen.join(',')");
    assert_eq!(names.to_std_string(&cx).unwrap(), "alpha,beta");
}

/// Test enumerate contract: the host iterator yields virtual names
#[test]
fn contract_property_iterator_yields_virtual_names() {
    let (cx, listing) = listing_context();
    let names: Vec<String> = listing.properties(&cx).unwrap().collect();
    assert_eq!(names, ["alpha", "beta"]);
}

/// Test enumerate contract: without opting in, own keys are used
#[test]
fn contract_enumeration_is_opt_in() {
    let cx = Context::create().unwrap();
    let listing = cx.create_native_object(Listing { names: vec!["ghost"] }).unwrap();
    listing.set_property(&cx, "real", 1).unwrap();
    let names: Vec<String> = listing.properties(&cx).unwrap().collect();
    assert_eq!(names, ["real"]);
}

/// Test PropertyIterator contract: deleted own names are skipped
#[test]
fn contract_property_iterator_skips_deleted_names() {
    let cx = Context::create().unwrap();
    let object = eval(&cx, "({ a: 1, b: 2, c: 3 })").to_object(&cx).unwrap();
    let mut names = object.properties(&cx).unwrap();
    assert_eq!(names.next().as_deref(), Some("a"));
    object.delete_property(&cx, "b").unwrap();
    object.set_property(&cx, "d", 4).unwrap();
    assert_eq!(names.collect::<Vec<_>>(), ["c"]);
}

/// Test PropertyIterator contract: the object survives collections run by its own hooks
#[test]
fn contract_property_iterator_survives_collecting_hooks() {
    let cx = Context::create().unwrap();
    let object = cx.create_object(None).unwrap();
    object.set_property(&cx, "real", 1).unwrap();
    NativeObjectBase::new(Collecting)
        .with_custom_enumerate(true)
        .load_into(&cx, &object)
        .unwrap();
    let names: Vec<String> = object.properties(&cx).unwrap().collect();
    assert_eq!(names, ["ghost", "real"]);
    assert_eq!(object.get_property(&cx, "real").unwrap().get_int().unwrap(), 1);
}

// =============================================================================
// Calls
// =============================================================================

/// Test self_call contract: native objects can be called from script
#[test]
fn contract_native_object_is_callable() {
    let cx = Context::create().unwrap();
    let counter = cx.create_native_object(Counter).unwrap();
    cx.global().set_property(&cx, "count", &counter).unwrap();
    assert_eq!(eval(&cx, "count(1, 'two', null)").get_int().unwrap(), 3);
    let direct = counter.apply(&cx, &Value::undefined(), &[Value::from_int(1)]).unwrap();
    assert_eq!(direct.get_int().unwrap(), 1);
}

/// Test self_call contract: objects without a call hook are not callable
#[test]
fn contract_default_self_call_is_not_callable() {
    let cx = Context::create().unwrap();
    let store = cx.create_native_object(Store::default()).unwrap();
    cx.global().set_property(&cx, "store", &store).unwrap();
    let name = eval(&cx, "var n; try { store(); } catch (e) { n = e.name; } n");
    assert_eq!(name.to_std_string(&cx).unwrap(), "NotCallableError");
}

/// Test Object::call contract: calling a non-function property fails
#[test]
fn contract_call_on_non_function_property() {
    let cx = Context::create().unwrap();
    let object = eval(&cx, "({ n: 1, twice: function (x) { return x * 2; } })")
        .to_object(&cx)
        .unwrap();
    assert_eq!(object.call(&cx, "twice", &[Value::from_int(4)]).unwrap().get_int().unwrap(), 8);
    assert!(matches!(object.call(&cx, "n", &[]), Err(Error::NotCallable(_))));
}

// =============================================================================
// Errors across the boundary
// =============================================================================

/// Test Error contract: host errors surface with their script names
#[test]
fn contract_host_errors_become_named_script_errors() {
    let cx = Context::create().unwrap();
    let plain = cx.evaluate("({})", "plain.js", 1).unwrap().to_object(&cx).unwrap();
    cx.global().set_property(&cx, "plain", &plain).unwrap();
    let listing = cx.create_native_object(Listing { names: Vec::new() }).unwrap();
    cx.global().set_property(&cx, "listing", &listing).unwrap();
    let store = cx.create_native_object(Store::default()).unwrap();
    cx.global().set_property(&cx, "store", &store).unwrap();
    let size = NativeFunctionBase::adapt("storeSize", |_cx: &Context, target: Native<Store>| -> Result<usize> {
        Ok(target.instance()?.log.borrow().len())
    });
    cx.global()
        .set_property(&cx, "storeSize", &cx.create_native_function(size).unwrap())
        .unwrap();
    let name = |source: &str| {
        let script = format!("var n; try {{ {} }} catch (e) {{ n = e.name; }} n", source);
        eval(&cx, &script).to_std_string(&cx).unwrap()
    };
    assert_eq!(name("storeSize(plain);"), "NotNativeError");
    assert_eq!(name("storeSize(listing);"), "WrongClassError");
    assert_eq!(name("storeSize(1);"), "TypeError");
    assert_eq!(eval(&cx, "storeSize(store)").get_int().unwrap(), 0);
}

/// Test Error contract: uncaught throws keep the thrown value
#[test]
fn contract_uncaught_primitive_throw() {
    let cx = Context::create().unwrap();
    let Err(Error::Script(exception)) = cx.evaluate("throw 42;", "primitive.js", 1) else {
        panic!("expected a script exception");
    };
    assert_eq!(exception.value().get_int().unwrap(), 42);
    assert_eq!(exception.message(), "42");
}
