//! Script values seen from the host.

use crate::context::{Context, ContextInner};
use crate::error::{Error, Result};
use crate::object::{Object, JsString};
use core_types::Value as RawValue;
use memory_manager::ValueSlot;
use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

/// A script value held by the host.
///
/// A `Value` reads its engine value through a slot. The slot is either
/// private or shared with another value ([`bind`](Value::bind)), a root
/// ([`Root`](crate::Root)) or an engine output slot
/// ([`CallContext::result`](crate::CallContext::result)). Writing through
/// [`assign`](Value::assign) is visible to every alias.
///
/// Cloning copies the engine value into a fresh, unrooted slot; it never
/// copies script data.
///
/// # Examples
///
/// ```
/// use bridge::Value;
///
/// let a = Value::from_int(1);
/// let mut b = Value::undefined();
/// b.bind(&a);
/// a.assign(&Value::from_bool(true));
/// assert!(b.is_boolean());
/// b.unbind();
/// assert!(b.is_undefined());
/// ```
pub struct Value {
    slot: ValueSlot,
    origin: Weak<ContextInner>,
}

impl Value {
    pub(crate) fn with_origin(raw: RawValue, origin: Weak<ContextInner>) -> Self {
        Self {
            slot: Rc::new(Cell::new(raw)),
            origin,
        }
    }

    /// Alias an engine-owned slot.
    pub(crate) fn bound_to(cx: &Context, slot: ValueSlot) -> Self {
        Self {
            slot,
            origin: cx.downgrade(),
        }
    }

    pub(crate) fn slot(&self) -> &ValueSlot {
        &self.slot
    }

    /// `undefined`
    pub fn undefined() -> Self {
        Self::with_origin(RawValue::Undefined, Weak::new())
    }

    /// `null`
    pub fn null() -> Self {
        Self::with_origin(RawValue::Null, Weak::new())
    }

    /// A boolean.
    pub fn from_bool(b: bool) -> Self {
        Self::with_origin(RawValue::Boolean(b), Weak::new())
    }

    /// A number.
    pub fn from_number(n: f64) -> Self {
        Self::with_origin(RawValue::from_f64(n), Weak::new())
    }

    /// An integral number.
    pub fn from_int(n: i32) -> Self {
        Self::with_origin(RawValue::Smi(n), Weak::new())
    }

    /// The engine value currently in the slot.
    pub fn raw(&self) -> RawValue {
        self.slot.get()
    }

    /// Share `other`'s slot.
    pub fn bind(&mut self, other: &Value) {
        self.slot = other.slot.clone();
        self.origin = other.origin.clone();
    }

    /// Detach from any shared slot; the value becomes `undefined`.
    pub fn unbind(&mut self) {
        self.slot = Rc::new(Cell::new(RawValue::Undefined));
        self.origin = Weak::new();
    }

    /// Write `other`'s engine value into this slot.
    pub fn assign(&self, other: &Value) {
        self.slot.set(other.raw());
    }

    // ------------------------------------------------------------------
    // Type tests
    // ------------------------------------------------------------------

    /// `undefined`
    pub fn is_undefined(&self) -> bool {
        self.raw().is_undefined()
    }

    /// `null`
    pub fn is_null(&self) -> bool {
        self.raw().is_null()
    }

    /// `undefined` or `null`
    pub fn is_void(&self) -> bool {
        self.raw().is_void()
    }

    /// Boolean.
    pub fn is_boolean(&self) -> bool {
        self.raw().is_boolean()
    }

    /// Number, integral or not.
    pub fn is_number(&self) -> bool {
        self.raw().is_number()
    }

    /// Number stored as an integer.
    pub fn is_int(&self) -> bool {
        self.raw().is_int()
    }

    /// Number stored as a double.
    pub fn is_double(&self) -> bool {
        self.raw().is_double()
    }

    /// String.
    pub fn is_string(&self) -> bool {
        self.raw().is_string()
    }

    /// Object (functions included).
    pub fn is_object(&self) -> bool {
        self.raw().is_object()
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    /// The boolean payload.
    pub fn get_boolean(&self) -> Result<bool> {
        match self.raw() {
            RawValue::Boolean(b) => Ok(b),
            other => Err(Error::Type(format!("{:?} is not a boolean", other))),
        }
    }

    /// The integer payload.
    pub fn get_int(&self) -> Result<i32> {
        match self.raw() {
            RawValue::Smi(n) => Ok(n),
            other => Err(Error::Type(format!("{:?} is not an integer", other))),
        }
    }

    /// The number payload as a double.
    pub fn get_double(&self) -> Result<f64> {
        self.raw()
            .as_number()
            .ok_or_else(|| Error::Type(format!("{:?} is not a number", self.raw())))
    }

    // ------------------------------------------------------------------
    // Engine conversions
    // ------------------------------------------------------------------

    /// ToNumber.
    pub fn to_number(&self, cx: &Context) -> Result<f64> {
        cx.check(self.raw())?;
        cx.engine(cx.runtime().to_number(self.raw()))
    }

    /// ToBoolean.
    pub fn to_boolean(&self, cx: &Context) -> Result<bool> {
        cx.check(self.raw())?;
        Ok(cx.runtime().to_boolean(self.raw()))
    }

    /// ToString, as host text.
    pub fn to_std_string(&self, cx: &Context) -> Result<String> {
        cx.check(self.raw())?;
        cx.engine(cx.runtime().to_std_string(self.raw()))
    }

    /// ToString, as a script string.
    pub fn to_js_string(&self, cx: &Context) -> Result<JsString> {
        cx.check(self.raw())?;
        let id = cx.engine(cx.runtime().to_string_value(self.raw()))?;
        Ok(JsString::from_id(cx, id))
    }

    /// ToObject. Primitives raise a type error.
    pub fn to_object(&self, cx: &Context) -> Result<Object> {
        cx.check(self.raw())?;
        let id = cx.engine(cx.runtime().to_object(self.raw()))?;
        Ok(Object::from_id(cx, id))
    }

    /// ToNumber truncated toward zero and checked against the range of a
    /// `bits`-wide integer.
    ///
    /// # Errors
    ///
    /// [`Error::Range`] for NaN, infinities and out-of-range numbers.
    ///
    /// # Examples
    ///
    /// ```
    /// use bridge::{Context, Value};
    ///
    /// let cx = Context::create().unwrap();
    /// assert_eq!(Value::from_number(-3.7).to_integral_number(&cx, 8, true).unwrap(), -3.0);
    /// assert!(Value::from_number(256.0).to_integral_number(&cx, 8, false).is_err());
    /// ```
    pub fn to_integral_number(&self, cx: &Context, bits: u32, signed: bool) -> Result<f64> {
        let number = self.to_number(cx)?;
        if !number.is_finite() {
            return Err(Error::Range(format!("{} is not a finite number", number)));
        }
        let truncated = number.trunc();
        let span = 2f64.powi(bits as i32);
        let (min, max_exclusive) = if signed {
            (-span / 2.0, span / 2.0)
        } else {
            (0.0, span)
        };
        if truncated < min || truncated >= max_exclusive {
            return Err(Error::Range(format!(
                "{} is out of range for a {}-bit {} integer",
                number,
                bits,
                if signed { "signed" } else { "unsigned" }
            )));
        }
        Ok(truncated + 0.0)
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self, cx: &Context) -> &'static str {
        cx.runtime().type_of(self.raw())
    }

    /// Source-like rendering for diagnostics.
    pub fn to_source(&self, cx: &Context) -> String {
        cx.runtime().to_source(self.raw())
    }

    /// Script strict equality.
    pub fn strict_equals(&self, cx: &Context, other: &Value) -> bool {
        cx.runtime().strict_equals(self.raw(), other.raw())
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        Self::with_origin(self.raw(), self.origin.clone())
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::undefined()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?})", self.raw())
    }
}

/// Strict equality. Strings compare by content when the owning context is
/// still alive.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.raw(), other.raw());
        match (a, b) {
            (RawValue::String(x), RawValue::String(y)) if x != y => {
                let origin = Context::upgrade(&self.origin).or_else(|| Context::upgrade(&other.origin));
                origin.is_some_and(|cx| cx.runtime().strict_equals(a, b))
            }
            _ => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from_bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::from_int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::from_number(n)
    }
}
