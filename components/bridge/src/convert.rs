//! Conversions between host types and script values.
//!
//! [`ToScript`] maps a host value to a [`Value`]; [`FromScript`] maps a
//! `Value` back with checks. Both are selected at compile time by the host
//! type. Conversions that create engine objects keep their intermediates
//! rooted until they return.
//!
//! # Examples
//!
//! ```
//! use bridge::{Context, FromScript, ToScript};
//!
//! let cx = Context::create().unwrap();
//! let value = vec![1u8, 2, 3].to_value(&cx).unwrap();
//! let back = Vec::<u8>::from_value(&cx, &value).unwrap();
//! assert_eq!(back, [1, 2, 3]);
//!
//! let too_big = 300.to_value(&cx).unwrap();
//! assert!(u8::from_value(&cx, &too_big).is_err());
//! ```

use crate::context::Context;
use crate::error::{Error, Result};
use crate::native_object::{get_native, Native, NativeObject};
use crate::object::{Array, Function, JsString, Object};
use crate::value::Value;
use core_types::Value as RawValue;

/// Upper bound on capacity reserved from a script-supplied `length`.
pub(crate) const PREALLOCATE_LIMIT: usize = 1024;

/// Host to script.
pub trait ToScript {
    /// Convert to a script value.
    fn to_value(&self, cx: &Context) -> Result<Value>;
}

/// Script to host.
pub trait FromScript: Sized {
    /// Convert from a script value.
    ///
    /// # Errors
    ///
    /// [`Error::Type`](crate::Error::Type) when the value has the wrong type,
    /// [`Error::Range`](crate::Error::Range) when a number does not fit.
    fn from_value(cx: &Context, value: &Value) -> Result<Self>;
}

impl<T: ToScript + ?Sized> ToScript for &T {
    fn to_value(&self, cx: &Context) -> Result<Value> {
        (**self).to_value(cx)
    }
}

impl<T: ToScript + ?Sized> ToScript for Box<T> {
    fn to_value(&self, cx: &Context) -> Result<Value> {
        (**self).to_value(cx)
    }
}

// ============================================================================
// Primitives
// ============================================================================

impl ToScript for () {
    fn to_value(&self, _cx: &Context) -> Result<Value> {
        Ok(Value::undefined())
    }
}

impl FromScript for () {
    fn from_value(_cx: &Context, _value: &Value) -> Result<Self> {
        Ok(())
    }
}

impl ToScript for bool {
    fn to_value(&self, _cx: &Context) -> Result<Value> {
        Ok(Value::from_bool(*self))
    }
}

impl FromScript for bool {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        value.to_boolean(cx)
    }
}

macro_rules! integral {
    ($($ty:ty => $bits:expr, $signed:expr;)*) => {
        $(
            impl ToScript for $ty {
                /// Fails with [`Error::Range`] when the number has no exact
                /// double representation.
                fn to_value(&self, _cx: &Context) -> Result<Value> {
                    let number = *self as f64;
                    if number as i128 != *self as i128 {
                        return Err(Error::Range(format!("{} cannot be represented exactly", self)));
                    }
                    Ok(Value::from_number(number))
                }
            }

            impl FromScript for $ty {
                fn from_value(cx: &Context, value: &Value) -> Result<Self> {
                    Ok(value.to_integral_number(cx, $bits, $signed)? as $ty)
                }
            }
        )*
    };
}

integral! {
    i8 => 8, true;
    i16 => 16, true;
    i32 => 32, true;
    i64 => 64, true;
    isize => usize::BITS, true;
    u8 => 8, false;
    u16 => 16, false;
    u32 => 32, false;
    u64 => 64, false;
    usize => usize::BITS, false;
}

impl ToScript for f64 {
    fn to_value(&self, _cx: &Context) -> Result<Value> {
        Ok(Value::from_number(*self))
    }
}

impl FromScript for f64 {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        value.to_number(cx)
    }
}

impl ToScript for f32 {
    fn to_value(&self, _cx: &Context) -> Result<Value> {
        Ok(Value::from_number(f64::from(*self)))
    }
}

impl FromScript for f32 {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        Ok(value.to_number(cx)? as f32)
    }
}

impl ToScript for str {
    fn to_value(&self, cx: &Context) -> Result<Value> {
        Ok(cx.create_string(self)?.into_value())
    }
}

impl ToScript for String {
    fn to_value(&self, cx: &Context) -> Result<Value> {
        self.as_str().to_value(cx)
    }
}

impl FromScript for String {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        value.to_std_string(cx)
    }
}

// ============================================================================
// Script values and views
// ============================================================================

impl ToScript for Value {
    fn to_value(&self, _cx: &Context) -> Result<Value> {
        Ok(self.clone())
    }
}

impl FromScript for Value {
    fn from_value(_cx: &Context, value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

macro_rules! view {
    ($($view:ty),*) => {
        $(
            impl ToScript for $view {
                fn to_value(&self, _cx: &Context) -> Result<Value> {
                    Ok(self.as_value().clone())
                }
            }
        )*
    };
}

view!(Object, Function, Array, JsString);

impl FromScript for Object {
    fn from_value(_cx: &Context, value: &Value) -> Result<Self> {
        Object::from_value(value)
    }
}

impl FromScript for Function {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        Function::from_value(cx, value)
    }
}

impl FromScript for Array {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        Array::from_value(cx, value)
    }
}

impl FromScript for JsString {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        value.to_js_string(cx)
    }
}

// ============================================================================
// Containers
// ============================================================================

/// `None` is `undefined`; both `undefined` and `null` read as `None`.
impl<T: ToScript> ToScript for Option<T> {
    fn to_value(&self, cx: &Context) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(cx),
            None => Ok(Value::undefined()),
        }
    }
}

impl<T: FromScript> FromScript for Option<T> {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        if value.is_void() {
            Ok(None)
        } else {
            T::from_value(cx, value).map(Some)
        }
    }
}

impl<T: ToScript> ToScript for [T] {
    fn to_value(&self, cx: &Context) -> Result<Value> {
        let temps = cx.temp_roots();
        let mut elements = Vec::with_capacity(self.len());
        for item in self {
            let value = item.to_value(cx)?;
            temps.hold(&value);
            elements.push(value.raw());
        }
        cx.check_usable()?;
        let id = cx.engine(cx.runtime().create_array(&elements))?;
        Ok(cx.value(RawValue::Object(id)))
    }
}

impl<T: ToScript> ToScript for Vec<T> {
    fn to_value(&self, cx: &Context) -> Result<Value> {
        self.as_slice().to_value(cx)
    }
}

/// Reads `length` once, then each index in turn. Indices the array no longer
/// has read as `undefined` and go through `T`'s converter.
impl<T: FromScript> FromScript for Vec<T> {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        let source = Object::from_value(value)?;
        let temps = cx.temp_roots();
        temps.hold(source.as_value());
        let length = source
            .get_property(cx, "length")?
            .to_integral_number(cx, 32, false)? as usize;
        let mut items = Vec::with_capacity(length.min(PREALLOCATE_LIMIT));
        for index in 0..length {
            let element = source.get_property(cx, &index.to_string())?;
            temps.hold(&element);
            items.push(T::from_value(cx, &element)?);
        }
        Ok(items)
    }
}

// ============================================================================
// Native objects
// ============================================================================

impl<T: NativeObject> ToScript for Native<T> {
    fn to_value(&self, _cx: &Context) -> Result<Value> {
        Ok(self.object().as_value().clone())
    }
}

impl<T: NativeObject> FromScript for Native<T> {
    fn from_value(cx: &Context, value: &Value) -> Result<Self> {
        let object = Object::from_value(value)?;
        get_native::<T>(cx, &object)
    }
}
