//! Type conversions and comparisons.

use crate::completion::EvalResult;
use crate::runtime::Runtime;
use core_types::{ErrorKind, ObjectId, StringId, Value};
use memory_manager::{Callable, ObjectClass};
use std::rc::Rc;

/// Hint for [`Runtime::to_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    /// No preference (treated as number)
    Default,
    /// `valueOf` first
    Number,
    /// `toString` first
    String,
}

/// Format a number the way scripts print it.
///
/// # Examples
///
/// ```
/// use interpreter::number_to_string;
///
/// assert_eq!(number_to_string(42.0), "42");
/// assert_eq!(number_to_string(-0.0), "0");
/// assert_eq!(number_to_string(0.1), "0.1");
/// assert_eq!(number_to_string(1e21), "1e+21");
/// assert_eq!(number_to_string(1.5e-7), "1.5e-7");
/// assert_eq!(number_to_string(f64::NAN), "NaN");
/// ```
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 9007199254740992.0 {
        return format!("{}", n as i64);
    }

    // Shortest round-trip digits from ryu, laid out per Number::toString.
    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format_finite(n.abs());
    let (mantissa, exponent) = match formatted.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (formatted, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mut digits: String = format!("{}{}", int_part, frac_part);
    let mut point = int_part.len() as i32 + exponent;
    while digits.len() > 1 && digits.starts_with('0') {
        digits.remove(0);
        point -= 1;
    }
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }

    let k = digits.len() as i32;
    let sign = if n < 0.0 { "-" } else { "" };
    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (head, tail) = digits.split_at(point as usize);
        format!("{}.{}", head, tail)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let e = point - 1;
        let exp_sign = if e >= 0 { "+" } else { "-" };
        let (head, tail) = digits.split_at(1);
        if tail.is_empty() {
            format!("{}e{}{}", head, exp_sign, e.abs())
        } else {
            format!("{}.{}e{}{}", head, tail, exp_sign, e.abs())
        }
    };
    format!("{}{}", sign, body)
}

/// Parse script numeric string syntax. Invalid text yields NaN.
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return f64::NAN;
        }
        return hex
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0.0, |acc, d| acc * 16.0 + d as f64);
    }
    let valid = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Canonical array index of a property key.
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|n| *n != u32::MAX).map(|n| n as usize)
}

pub(crate) fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

pub(crate) fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let n = n.trunc() % 4294967296.0;
    let n = if n < 0.0 { n + 4294967296.0 } else { n };
    n as u32
}

impl Runtime {
    /// UTF-16 contents of a string value.
    pub fn string_units(&self, id: StringId) -> EvalResult<Rc<[u16]>> {
        Ok(self.heap.borrow().string(id)?.clone())
    }

    /// Contents of a string value as UTF-8; unpaired surrogates become U+FFFD.
    pub fn string_lossy(&self, id: StringId) -> EvalResult<String> {
        Ok(self.heap.borrow().string_lossy(id)?)
    }

    pub(crate) fn to_boolean_internal(&self, value: Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => b,
            Value::Smi(n) => n != 0,
            Value::Double(n) => !(n == 0.0 || n.is_nan()),
            Value::String(id) => self
                .heap
                .borrow()
                .string(id)
                .map(|units| !units.is_empty())
                .unwrap_or(false),
            Value::Object(_) => true,
        }
    }

    pub(crate) fn to_primitive(&self, value: Value, hint: PreferredType) -> EvalResult {
        let object = match value {
            Value::Object(id) => id,
            other => return Ok(other),
        };
        let order = match hint {
            PreferredType::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get_property(object, name, value)?;
            if self.is_callable_value(method) {
                let result = self.call_value(method, value, &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        self.throw(ErrorKind::TypeError, "can't convert object to primitive value")
    }

    pub(crate) fn to_number_internal(&self, value: Value) -> EvalResult<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Smi(n) => n as f64,
            Value::Double(n) => n,
            Value::String(id) => string_to_number(&self.string_lossy(id)?),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::Number)?;
                self.to_number_internal(primitive)?
            }
        })
    }

    pub(crate) fn to_string_internal(&self, value: Value) -> EvalResult<String> {
        Ok(match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Smi(n) => n.to_string(),
            Value::Double(n) => number_to_string(n),
            Value::String(id) => self.string_lossy(id)?,
            Value::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                self.to_string_internal(primitive)?
            }
        })
    }

    /// ToString producing a heap string, preserving UTF-16 contents.
    pub(crate) fn to_js_string(&self, value: Value) -> EvalResult<StringId> {
        match value {
            Value::String(id) => Ok(id),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                self.to_js_string(primitive)
            }
            other => {
                let text = self.to_string_internal(other)?;
                Ok(self.alloc_string_units(text.encode_utf16().collect()))
            }
        }
    }

    /// Property key for a value.
    pub(crate) fn to_property_key(&self, value: Value) -> EvalResult<String> {
        self.to_string_internal(value)
    }

    pub(crate) fn to_object_internal(&self, value: Value) -> EvalResult<ObjectId> {
        match value {
            Value::Object(id) => Ok(id),
            Value::Undefined | Value::Null => {
                let name = self.to_string_internal(value)?;
                self.throw(ErrorKind::TypeError, format!("{} has no properties", name))
            }
            other => {
                let text = self.to_source_internal(other);
                self.throw(ErrorKind::TypeError, format!("{} is not an object", text))
            }
        }
    }

    pub(crate) fn is_callable_value(&self, value: Value) -> bool {
        match value {
            Value::Object(id) => self
                .heap
                .borrow()
                .object(id)
                .map(|o| o.is_function())
                .unwrap_or(false),
            _ => false,
        }
    }

    pub(crate) fn type_of_internal(&self, value: Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Smi(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) if self.is_callable_value(value) => "function",
            Value::Object(_) => "object",
        }
    }

    pub(crate) fn strict_equals_internal(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (Value::String(x), Value::String(y)) => {
                if x == y {
                    return true;
                }
                let heap = self.heap.borrow();
                match (heap.string(x), heap.string(y)) {
                    (Ok(x), Ok(y)) => x[..] == y[..],
                    _ => false,
                }
            }
            (Value::Object(x), Value::Object(y)) => x == y,
            _ => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    pub(crate) fn loose_equals(&self, a: Value, b: Value) -> EvalResult<bool> {
        if std::mem::discriminant(&a) == std::mem::discriminant(&b)
            || (a.is_number() && b.is_number())
        {
            return Ok(self.strict_equals_internal(a, b));
        }
        match (a, b) {
            (x, y) if x.is_void() && y.is_void() => Ok(true),
            (x, y) if x.is_void() || y.is_void() => Ok(false),
            (Value::Boolean(_), _) => {
                let n = Value::from_f64(self.to_number_internal(a)?);
                self.loose_equals(n, b)
            }
            (_, Value::Boolean(_)) => {
                let n = Value::from_f64(self.to_number_internal(b)?);
                self.loose_equals(a, n)
            }
            (Value::Object(_), _) => {
                let primitive = self.to_primitive(a, PreferredType::Default)?;
                self.loose_equals(primitive, b)
            }
            (_, Value::Object(_)) => {
                let primitive = self.to_primitive(b, PreferredType::Default)?;
                self.loose_equals(a, primitive)
            }
            _ => Ok(self.to_number_internal(a)? == self.to_number_internal(b)?),
        }
    }

    /// Abstract relational comparison `a < b`. `None` means undefined (NaN involved).
    pub(crate) fn less_than(&self, a: Value, b: Value) -> EvalResult<Option<bool>> {
        let a = self.to_primitive(a, PreferredType::Number)?;
        let b = self.to_primitive(b, PreferredType::Number)?;
        if let (Value::String(x), Value::String(y)) = (a, b) {
            let x = self.string_units(x)?;
            let y = self.string_units(y)?;
            return Ok(Some(x[..] < y[..]));
        }
        let x = self.to_number_internal(a)?;
        let y = self.to_number_internal(b)?;
        if x.is_nan() || y.is_nan() {
            return Ok(None);
        }
        Ok(Some(x < y))
    }

    /// Debug rendering of a value, in source-like form.
    pub(crate) fn to_source_internal(&self, value: Value) -> String {
        match value {
            Value::String(id) => match self.string_lossy(id) {
                Ok(s) => format!("{:?}", s),
                Err(_) => "<stale string>".to_string(),
            },
            Value::Object(id) => {
                let heap = self.heap.borrow();
                match heap.object(id) {
                    Ok(object) => match &object.class {
                        ObjectClass::Function(Callable::Script { .. }) => "function () {...}".to_string(),
                        ObjectClass::Function(_) => "function () {[native code]}".to_string(),
                        ObjectClass::Array(elements) => format!("[array of {}]", elements.len()),
                        ObjectClass::Error => "(new Error(...))".to_string(),
                        _ => "({...})".to_string(),
                    },
                    Err(_) => "<stale object>".to_string(),
                }
            }
            Value::Undefined => "(void 0)".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Smi(n) => n.to_string(),
            Value::Double(n) => {
                if n == 0.0 && n.is_sign_negative() {
                    "-0".to_string()
                } else {
                    number_to_string(n)
                }
            }
        }
    }

    /// Whether `value` is an error object (has an error prototype in its chain).
    pub(crate) fn is_error_object(&self, value: Value) -> bool {
        let Value::Object(mut id) = value else {
            return false;
        };
        let heap = self.heap.borrow();
        loop {
            let Ok(object) = heap.object(id) else {
                return false;
            };
            if matches!(object.class, ObjectClass::Error) || id == self.realm.error_prototype {
                return true;
            }
            match object.prototype {
                Some(proto) => id = proto,
                None => return false,
            }
        }
    }

    pub(crate) fn concat_strings(&self, a: StringId, b: StringId) -> EvalResult {
        let mut units: Vec<u16> = self.string_units(a)?.to_vec();
        units.extend_from_slice(&self.string_units(b)?);
        Ok(Value::String(self.alloc_string_units(units)))
    }
}
