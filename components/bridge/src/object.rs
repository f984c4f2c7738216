//! Typed views over [`Value`]: [`Object`], [`Function`], [`Array`] and
//! [`JsString`].
//!
//! A view is a `Value` known to hold a particular kind of engine value.
//! Cloning a view copies the reference, so both copies name the same script
//! object.

use crate::context::Context;
use crate::convert::{ToScript, PREALLOCATE_LIMIT};
use crate::error::{Error, Result};
use crate::native_object::{get_native, Native, NativeObject};
use crate::property_iterator::PropertyIterator;
use crate::value::Value;
use core_types::{ObjectId, StringId, Value as RawValue};
use memory_manager::PropertyFlags;
use std::fmt;

/// A script object.
#[derive(Clone, PartialEq)]
pub struct Object {
    value: Value,
}

impl Object {
    pub(crate) fn from_id(cx: &Context, id: ObjectId) -> Self {
        Self {
            value: cx.value(RawValue::Object(id)),
        }
    }

    /// View `value` as an object.
    ///
    /// # Errors
    ///
    /// [`Error::Type`] if `value` is not an object.
    pub fn from_value(value: &Value) -> Result<Self> {
        if value.is_object() {
            Ok(Self { value: value.clone() })
        } else {
            Err(Error::Type(format!("{:?} is not an object", value.raw())))
        }
    }

    /// The underlying value.
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Unwrap into the underlying value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// The engine value.
    pub fn raw(&self) -> RawValue {
        self.value.raw()
    }

    /// The live engine handle.
    pub(crate) fn id(&self, cx: &Context) -> Result<ObjectId> {
        let raw = self.raw();
        cx.check(raw)?;
        raw.as_object()
            .ok_or_else(|| Error::EngineState(format!("{:?} is not an object", raw)))
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read a property.
    pub fn get_property(&self, cx: &Context, name: &str) -> Result<Value> {
        let id = self.id(cx)?;
        let _current = cx.enter()?;
        let raw = cx.engine(cx.runtime().get(id, name))?;
        Ok(cx.value(raw))
    }

    /// Write a property, converting `value` first.
    pub fn set_property<T: ToScript>(&self, cx: &Context, name: &str, value: T) -> Result<()> {
        let id = self.id(cx)?;
        let temps = cx.temp_roots();
        let value = value.to_value(cx)?;
        temps.hold(&value);
        let _current = cx.enter()?;
        cx.engine(cx.runtime().set(id, name, value.raw()))
    }

    /// Define an own property with attributes.
    pub fn define_property<T: ToScript>(
        &self,
        cx: &Context,
        name: &str,
        value: T,
        flags: PropertyFlags,
    ) -> Result<()> {
        let id = self.id(cx)?;
        let temps = cx.temp_roots();
        let value = value.to_value(cx)?;
        temps.hold(&value);
        let _current = cx.enter()?;
        cx.engine(cx.runtime().define(id, name, value.raw(), flags))
    }

    /// Define an accessor property from getter and setter functions.
    pub fn define_accessor(
        &self,
        cx: &Context,
        name: &str,
        getter: Option<&Function>,
        setter: Option<&Function>,
        flags: PropertyFlags,
    ) -> Result<()> {
        let id = self.id(cx)?;
        let getter = getter.map(|g| g.object().id(cx)).transpose()?;
        let setter = setter.map(|s| s.object().id(cx)).transpose()?;
        cx.engine(cx.runtime().define_accessor(id, name, getter, setter, flags))
    }

    /// Delete a property. `Ok(false)` if it is permanent.
    pub fn delete_property(&self, cx: &Context, name: &str) -> Result<bool> {
        let id = self.id(cx)?;
        let _current = cx.enter()?;
        cx.engine(cx.runtime().delete(id, name))
    }

    /// Whether the property exists on the object or its prototype chain.
    pub fn has_property(&self, cx: &Context, name: &str) -> Result<bool> {
        let id = self.id(cx)?;
        let _current = cx.enter()?;
        cx.engine(cx.runtime().has(id, name))
    }

    /// Whether the property is an own property.
    pub fn has_own_property(&self, cx: &Context, name: &str) -> Result<bool> {
        let id = self.id(cx)?;
        let _current = cx.enter()?;
        cx.engine(cx.runtime().has_own(id, name))
    }

    /// Iterate over the own enumerable property names.
    pub fn properties(&self, cx: &Context) -> Result<PropertyIterator> {
        PropertyIterator::new(cx, self)
    }

    /// The prototype, or `None` at the end of the chain.
    pub fn prototype(&self, cx: &Context) -> Result<Option<Object>> {
        let id = self.id(cx)?;
        let proto = cx.engine(cx.runtime().get_prototype(id))?;
        Ok(proto.map(|p| Object::from_id(cx, p)))
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Call the method `name` with this object as receiver.
    ///
    /// # Errors
    ///
    /// [`Error::NotCallable`] if the property is not a function.
    pub fn call(&self, cx: &Context, name: &str, args: &[Value]) -> Result<Value> {
        let method = self.get_property(cx, name)?;
        let temps = cx.temp_roots();
        temps.hold(&method);
        if !cx.runtime().is_callable(method.raw()) {
            return Err(Error::NotCallable(name.to_string()));
        }
        Function { object: Object { value: method } }.call(cx, self.as_value(), args)
    }

    /// Call this object as a function.
    pub fn apply(&self, cx: &Context, this: &Value, args: &[Value]) -> Result<Value> {
        let id = self.id(cx)?;
        if !self.is_function(cx) && cx.runtime().host_hooks(id).is_none() {
            return Err(Error::NotCallable(self.value.to_source(cx)));
        }
        Function { object: self.clone() }.call(cx, this, args)
    }

    /// Whether the object is callable.
    pub fn is_function(&self, cx: &Context) -> bool {
        cx.runtime().is_callable(self.raw())
    }

    /// Whether the object is an array.
    pub fn is_array(&self, cx: &Context) -> bool {
        cx.runtime().is_array_value(self.raw())
    }

    // ------------------------------------------------------------------
    // Native payload
    // ------------------------------------------------------------------

    /// Whether the object is backed by a native object.
    pub fn is_native(&self, cx: &Context) -> bool {
        crate::native_object::is_native(cx, self)
    }

    /// The native object of type `T` backing this object.
    pub fn get_native<T: NativeObject>(&self, cx: &Context) -> Result<Native<T>> {
        get_native::<T>(cx, self)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:?})", self.raw())
    }
}

/// A callable script object.
#[derive(Clone, PartialEq)]
pub struct Function {
    object: Object,
}

impl Function {
    pub(crate) fn from_id(cx: &Context, id: ObjectId) -> Self {
        Self {
            object: Object::from_id(cx, id),
        }
    }

    /// View `value` as a function.
    ///
    /// # Errors
    ///
    /// [`Error::Type`] if `value` is not callable.
    pub fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        if cx.runtime().is_callable(value.raw()) {
            Ok(Self {
                object: Object { value: value.clone() },
            })
        } else {
            Err(Error::Type(format!("{} is not a function", value.to_source(cx))))
        }
    }

    /// The function as a plain object.
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// The underlying value.
    pub fn as_value(&self) -> &Value {
        self.object.as_value()
    }

    /// Unwrap into the underlying value.
    pub fn into_value(self) -> Value {
        self.object.value
    }

    /// The engine value.
    pub fn raw(&self) -> RawValue {
        self.object.raw()
    }

    /// Call with an explicit receiver.
    pub fn call(&self, cx: &Context, this: &Value, args: &[Value]) -> Result<Value> {
        cx.check(self.object.raw())?;
        let raw_args: Vec<RawValue> = args.iter().map(Value::raw).collect();
        let _current = cx.enter()?;
        let raw = cx.engine(cx.runtime().call(self.object.raw(), this.raw(), &raw_args))?;
        Ok(cx.value(raw))
    }

    /// Call with the elements of `args` as arguments.
    pub fn apply(&self, cx: &Context, this: &Value, args: &Array) -> Result<Value> {
        let temps = cx.temp_roots();
        let length = args.length(cx)?;
        let mut values = Vec::with_capacity(length.min(PREALLOCATE_LIMIT));
        for i in 0..length {
            let element = args.get_element(cx, i)?;
            temps.hold(&element);
            values.push(element);
        }
        self.call(cx, this, &values)
    }

    /// Call as a constructor.
    pub fn construct(&self, cx: &Context, args: &[Value]) -> Result<Object> {
        cx.check(self.object.raw())?;
        let raw_args: Vec<RawValue> = args.iter().map(Value::raw).collect();
        let _current = cx.enter()?;
        let raw = cx.engine(cx.runtime().construct(self.object.raw(), &raw_args))?;
        Object::from_value(&cx.value(raw))
    }

    /// The `length` property: number of declared parameters.
    pub fn arity(&self, cx: &Context) -> Result<u32> {
        let length = self.object.get_property(cx, "length")?;
        Ok(length.to_integral_number(cx, 32, false)? as u32)
    }

    /// The `name` property.
    pub fn name(&self, cx: &Context) -> Result<String> {
        self.object.get_property(cx, "name")?.to_std_string(cx)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:?})", self.object.raw())
    }
}

/// A script array.
#[derive(Clone, PartialEq)]
pub struct Array {
    object: Object,
}

impl Array {
    pub(crate) fn from_id(cx: &Context, id: ObjectId) -> Self {
        Self {
            object: Object::from_id(cx, id),
        }
    }

    /// View `value` as an array.
    ///
    /// # Errors
    ///
    /// [`Error::Type`] if `value` is not an array.
    pub fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        if cx.runtime().is_array_value(value.raw()) {
            Ok(Self {
                object: Object { value: value.clone() },
            })
        } else {
            Err(Error::Type(format!("{} is not an array", value.to_source(cx))))
        }
    }

    /// The array as a plain object.
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// The underlying value.
    pub fn as_value(&self) -> &Value {
        self.object.as_value()
    }

    /// Unwrap into the underlying value.
    pub fn into_value(self) -> Value {
        self.object.value
    }

    /// The engine value.
    pub fn raw(&self) -> RawValue {
        self.object.raw()
    }

    /// Number of elements.
    pub fn length(&self, cx: &Context) -> Result<usize> {
        let length = self.object.get_property(cx, "length")?;
        Ok(length.to_integral_number(cx, 32, false)? as usize)
    }

    /// Resize, truncating or padding with `undefined`.
    pub fn set_length(&self, cx: &Context, length: usize) -> Result<()> {
        self.object.set_property(cx, "length", length as f64)
    }

    /// Element `index`; `undefined` past the end.
    pub fn get_element(&self, cx: &Context, index: usize) -> Result<Value> {
        self.object.get_property(cx, &index.to_string())
    }

    /// Store element `index`, growing the array as needed.
    pub fn set_element<T: ToScript>(&self, cx: &Context, index: usize, value: T) -> Result<()> {
        self.object.set_property(cx, &index.to_string(), value)
    }

    /// Append an element.
    pub fn push<T: ToScript>(&self, cx: &Context, value: T) -> Result<()> {
        let length = self.length(cx)?;
        self.set_element(cx, length, value)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array({:?})", self.object.raw())
    }
}

/// A script string: immutable UTF-16 code units.
#[derive(Clone, PartialEq)]
pub struct JsString {
    value: Value,
}

impl JsString {
    pub(crate) fn from_id(cx: &Context, id: StringId) -> Self {
        Self {
            value: cx.value(RawValue::String(id)),
        }
    }

    /// Build a string from UTF-16 code units.
    pub fn from_utf16(cx: &Context, units: &[u16]) -> Result<Self> {
        cx.check_usable()?;
        Ok(Self::from_id(cx, cx.runtime().create_string_utf16(units)))
    }

    /// The underlying value.
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Unwrap into the underlying value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// The engine value.
    pub fn raw(&self) -> RawValue {
        self.value.raw()
    }

    fn id(&self, cx: &Context) -> Result<StringId> {
        let raw = self.value.raw();
        cx.check(raw)?;
        raw.as_string()
            .ok_or_else(|| Error::EngineState(format!("{:?} is not a string", raw)))
    }

    /// The UTF-16 code units.
    pub fn units(&self, cx: &Context) -> Result<Vec<u16>> {
        let id = self.id(cx)?;
        Ok(cx.engine(cx.runtime().string_units(id))?.to_vec())
    }

    /// Length in UTF-16 code units.
    pub fn length(&self, cx: &Context) -> Result<usize> {
        let id = self.id(cx)?;
        Ok(cx.engine(cx.runtime().string_units(id))?.len())
    }

    /// Decode to host text; unpaired surrogates become U+FFFD.
    pub fn to_std_string(&self, cx: &Context) -> Result<String> {
        let id = self.id(cx)?;
        cx.engine(cx.runtime().string_lossy(id))
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsString({:?})", self.value.raw())
    }
}
