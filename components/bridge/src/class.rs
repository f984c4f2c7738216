//! Script classes backed by native types.
//!
//! A [`ClassDescription`] lists what scripts see of a native type: the
//! constructor, prototype methods and properties, and static methods.
//! [`load_class`] turns it into a constructor function and registers the
//! class with the context, so that [`Context::create_native_object`] and
//! later loads find it.
//!
//! # Examples
//!
//! ```
//! use bridge::{load_class, method, trace_fields, ClassDescription, Context, Native, NativeFunctionBase, NativeObject};
//! use std::cell::Cell;
//!
//! struct Counter {
//!     count: Cell<u32>,
//! }
//!
//! trace_fields!(Counter);
//!
//! impl NativeObject for Counter {
//!     fn class_name(&self) -> &str {
//!         "Counter"
//!     }
//! }
//!
//! let cx = Context::create().unwrap();
//! let description = ClassDescription::new("Counter", "Counter")
//!     .constructor(|_call| Ok(Counter { count: Cell::new(0) }))
//!     .method(NativeFunctionBase::adapt(
//!         "increment",
//!         method(|_cx: &Context, this: Native<Counter>| -> bridge::Result<u32> {
//!             let counter = this.instance()?;
//!             counter.count.set(counter.count.get() + 1);
//!             Ok(counter.count.get())
//!         }),
//!     ));
//! load_class(&cx, &cx.global(), description).unwrap();
//! let count = cx.evaluate("var c = new Counter(); c.increment(); c.increment()", "counter.js", 1).unwrap();
//! assert_eq!(count.get_int().unwrap(), 2);
//! ```

use crate::call_context::CallContext;
use crate::context::Context;
use crate::convert::ToScript;
use crate::error::{Error, Result};
use crate::native_function::NativeFunctionBase;
use crate::native_object::{NativeObject, NativeObjectBase};
use crate::object::{Function, Object};
use memory_manager::PropertyFlags;
use std::any::TypeId;
use std::fmt;

type Factory<T> = Box<dyn Fn(&mut CallContext<'_>) -> Result<T>>;

/// A prototype property of a class.
pub enum ClassProperty {
    /// A plain data property
    Value(Box<dyn ToScript>),
    /// A property computed by host functions
    Accessor {
        /// Called on read with the instance as `this`
        getter: Option<NativeFunctionBase>,
        /// Called on write with the instance as `this` and the new value
        setter: Option<NativeFunctionBase>,
    },
}

/// Everything [`load_class`] needs to expose native type `T` as a class.
pub struct ClassDescription<T: NativeObject> {
    full_name: String,
    constructor_name: String,
    base: Option<String>,
    arity: u32,
    custom_enumerate: bool,
    constructor: Option<Factory<T>>,
    methods: Vec<NativeFunctionBase>,
    properties: Vec<(String, ClassProperty)>,
    static_methods: Vec<NativeFunctionBase>,
}

impl<T: NativeObject> ClassDescription<T> {
    /// Describe a class registered as `full_name` and exposed to scripts as
    /// `constructor_name`.
    ///
    /// Without a [`constructor`](Self::constructor), calling the class from
    /// script throws a `TypeError`.
    pub fn new(full_name: impl Into<String>, constructor_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            constructor_name: constructor_name.into(),
            base: None,
            arity: 0,
            custom_enumerate: false,
            constructor: None,
            methods: Vec::new(),
            properties: Vec::new(),
            static_methods: Vec::new(),
        }
    }

    /// Inherit from the prototype of an already loaded class.
    pub fn base(mut self, class_id: impl Into<String>) -> Self {
        self.base = Some(class_id.into());
        self
    }

    /// The constructor's `length`.
    pub fn arity(mut self, arity: u32) -> Self {
        self.arity = arity;
        self
    }

    /// Route `for-in` through [`NativeObject::enumerate_start`].
    pub fn custom_enumerate(mut self, enabled: bool) -> Self {
        self.custom_enumerate = enabled;
        self
    }

    /// Build instances from the constructor's arguments.
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<T> + 'static,
    {
        self.constructor = Some(Box::new(f));
        self
    }

    /// Add a prototype method, named after the function.
    pub fn method(mut self, function: NativeFunctionBase) -> Self {
        self.methods.push(function);
        self
    }

    /// Add a plain prototype property.
    pub fn property(mut self, name: impl Into<String>, value: impl ToScript + 'static) -> Self {
        self.properties
            .push((name.into(), ClassProperty::Value(Box::new(value))));
        self
    }

    /// Add a prototype accessor.
    pub fn accessor(
        mut self,
        name: impl Into<String>,
        getter: Option<NativeFunctionBase>,
        setter: Option<NativeFunctionBase>,
    ) -> Self {
        self.properties
            .push((name.into(), ClassProperty::Accessor { getter, setter }));
        self
    }

    /// Add a method on the constructor itself.
    pub fn static_method(mut self, function: NativeFunctionBase) -> Self {
        self.static_methods.push(function);
        self
    }

    /// Registry id.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Whether scripts may create instances.
    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }
}

impl<T: NativeObject> fmt::Debug for ClassDescription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescription")
            .field("full_name", &self.full_name)
            .field("constructor_name", &self.constructor_name)
            .field("base", &self.base)
            .field("arity", &self.arity)
            .field("constructible", &self.constructor.is_some())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Create the class described by `description`, define its constructor on
/// `container` and register it with `cx`.
///
/// Loading a class id that is already registered returns the registered
/// constructor and leaves `container` alone.
///
/// # Errors
///
/// [`Error::EngineState`] if the base class is not loaded.
pub fn load_class<T: NativeObject>(
    cx: &Context,
    container: &Object,
    description: ClassDescription<T>,
) -> Result<Function> {
    if let Some(existing) = cx.constructor(&description.full_name) {
        return Ok(existing);
    }
    let ClassDescription {
        full_name,
        constructor_name,
        base,
        arity,
        custom_enumerate,
        constructor,
        methods,
        properties,
        static_methods,
    } = description;

    let temps = cx.temp_roots();
    let base_prototype = match &base {
        Some(base) => Some(
            cx.prototype(base)
                .ok_or_else(|| Error::EngineState(format!("base class {} is not loaded", base)))?,
        ),
        None => None,
    };
    let prototype = cx.create_object(base_prototype.as_ref())?;
    temps.hold(prototype.as_value());

    for function in methods {
        let name = function.name().to_string();
        let function = function.load(cx)?;
        prototype.define_property(cx, &name, &function, PropertyFlags::DONT_ENUMERATE)?;
    }
    for (name, property) in properties {
        match property {
            ClassProperty::Value(value) => {
                prototype.define_property(cx, &name, &*value, PropertyFlags::empty())?;
            }
            ClassProperty::Accessor { getter, setter } => {
                let getter = getter.map(|g| g.load(cx)).transpose()?;
                if let Some(getter) = &getter {
                    temps.hold(getter.as_value());
                }
                let setter = setter.map(|s| s.load(cx)).transpose()?;
                prototype.define_accessor(cx, &name, getter.as_ref(), setter.as_ref(), PropertyFlags::empty())?;
            }
        }
    }

    let class_id = full_name.clone();
    let display_name = constructor_name.clone();
    let construct = move |call: &mut CallContext<'_>| -> Result<()> {
        let Some(factory) = &constructor else {
            return Err(Error::Type(format!("{} is not a constructor", display_name)));
        };
        let native = factory(&mut *call)?;
        let cx = call.context();
        let object = if call.is_construct() {
            call.this_object()?
        } else {
            cx.create_object(cx.prototype(&class_id).as_ref())?
        };
        NativeObjectBase::new(native)
            .with_custom_enumerate(custom_enumerate)
            .load_into(cx, &object)?;
        call.set_result(object.as_value());
        Ok(())
    };
    let function = NativeFunctionBase::new(arity, constructor_name.clone(), construct).load(cx)?;
    temps.hold(function.as_value());

    let ctor = function.object();
    ctor.define_property(
        cx,
        "prototype",
        &prototype,
        PropertyFlags::DONT_ENUMERATE | PropertyFlags::PERMANENT,
    )?;
    prototype.define_property(cx, "constructor", &function, PropertyFlags::DONT_ENUMERATE)?;
    for static_method in static_methods {
        let name = static_method.name().to_string();
        let static_method = static_method.load(cx)?;
        ctor.define_property(cx, &name, &static_method, PropertyFlags::DONT_ENUMERATE)?;
    }

    cx.add_prototype(&full_name, &prototype)?;
    cx.add_constructor(&full_name, &function)?;
    cx.register_class_type(TypeId::of::<T>(), &full_name, custom_enumerate);
    container.define_property(cx, &constructor_name, &function, PropertyFlags::DONT_ENUMERATE)?;
    tracing::debug!(class = %full_name, base = ?base, "class loaded");
    Ok(function)
}
