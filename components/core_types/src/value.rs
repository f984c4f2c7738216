//! Engine value representation.
//!
//! [`Value`] is the raw, copyable tag the engine stores in object slots,
//! argument vectors and root tables. Primitive payloads live inline; strings
//! and objects are referenced through generation-checked handles, so a
//! `Value` alone cannot tell you a string's contents. Ask the heap.

use crate::handle::{ObjectId, StringId};

/// Represents any engine value.
///
/// Numbers use two variants: `Smi` for integers that fit in 32 bits and
/// `Double` for everything else. [`Value::from_f64`] picks the right one.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// assert_eq!(Value::from_f64(3.0), Value::Smi(3));
/// assert!(matches!(Value::from_f64(0.5), Value::Double(_)));
/// assert!(matches!(Value::from_f64(-0.0), Value::Double(_)));
/// assert!(Value::Null.is_void());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// `true` or `false`
    Boolean(bool),
    /// Small integer
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// Heap string
    String(StringId),
    /// Heap object
    Object(ObjectId),
}

impl Value {
    /// Build a number value, preferring the `Smi` representation.
    ///
    /// Negative zero stays a `Double` so that `1 / -0` keeps its sign.
    pub fn from_f64(n: f64) -> Self {
        if n.fract() == 0.0
            && n >= i32::MIN as f64
            && n <= i32::MAX as f64
            && !(n == 0.0 && n.is_sign_negative())
        {
            Value::Smi(n as i32)
        } else {
            Value::Double(n)
        }
    }

    /// The numeric payload, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Value::Smi(n) => Some(n as f64),
            Value::Double(n) => Some(n),
            _ => None,
        }
    }

    /// The object handle, if this is an object.
    pub fn as_object(&self) -> Option<ObjectId> {
        match *self {
            Value::Object(id) => Some(id),
            _ => None,
        }
    }

    /// The string handle, if this is a string.
    pub fn as_string(&self) -> Option<StringId> {
        match *self {
            Value::String(id) => Some(id),
            _ => None,
        }
    }

    /// `undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `undefined` or `null`
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// `true` or `false`
    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    /// Either number representation.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Smi(_) | Value::Double(_))
    }

    /// Stored as a small integer.
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Smi(_))
    }

    /// Stored as a double.
    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    /// Heap string.
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Heap object.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Whether the value refers into the heap and therefore needs rooting.
    pub fn is_gc_thing(&self) -> bool {
        matches!(self, Value::String(_) | Value::Object(_))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Smi(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::from_f64(n)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

impl From<StringId> for Value {
    fn from(id: StringId) -> Self {
        Value::String(id)
    }
}
