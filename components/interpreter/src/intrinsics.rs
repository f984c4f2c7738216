//! Built-in constructors and prototype methods.

use crate::completion::EvalResult;
use crate::runtime::{IntrinsicCall, IntrinsicFn, Runtime, ERROR_KINDS};
use core_types::{ErrorKind, ObjectId, Value};
use memory_manager::{Callable, HeapError, ObjectClass, ObjectData, PropertyFlags};
use std::rc::Rc;

const HIDDEN: PropertyFlags = PropertyFlags::DONT_ENUMERATE;

fn fixed() -> PropertyFlags {
    PropertyFlags::DONT_ENUMERATE | PropertyFlags::READ_ONLY | PropertyFlags::PERMANENT
}

impl Runtime {
    pub(crate) fn register_intrinsic(&self, function: IntrinsicFn) -> u32 {
        let mut table = self.intrinsics.borrow_mut();
        table.push(function);
        (table.len() - 1) as u32
    }

    /// Create a built-in function object.
    pub(crate) fn intrinsic_function(
        &self,
        name: &str,
        arity: u32,
        function: IntrinsicFn,
    ) -> Result<ObjectId, HeapError> {
        let index = self.register_intrinsic(function);
        let object = self.alloc_object(ObjectData::new(
            ObjectClass::Function(Callable::Intrinsic(index)),
            Some(self.realm.function_prototype),
        ));
        self.define_own(object, "length", Value::from_f64(arity as f64), fixed())?;
        let name = self.alloc_string(name);
        self.define_own(object, "name", name, fixed())?;
        Ok(object)
    }

    fn define_method(
        &self,
        target: ObjectId,
        name: &str,
        arity: u32,
        function: IntrinsicFn,
    ) -> Result<ObjectId, HeapError> {
        let method = self.intrinsic_function(name, arity, function)?;
        self.define_own(target, name, Value::Object(method), HIDDEN)?;
        Ok(method)
    }

    fn define_constructor(
        &self,
        name: &str,
        arity: u32,
        function: IntrinsicFn,
        prototype: ObjectId,
    ) -> Result<ObjectId, HeapError> {
        let constructor = self.define_method(self.realm.global, name, arity, function)?;
        self.define_own(constructor, "prototype", Value::Object(prototype), fixed())?;
        self.define_own(prototype, "constructor", Value::Object(constructor), HIDDEN)?;
        Ok(constructor)
    }

    pub(crate) fn install_intrinsics(&self) -> Result<(), HeapError> {
        // Slot 0 backs Function.prototype itself.
        self.register_intrinsic(noop);

        let realm = &self.realm;
        let global = realm.global;
        self.define_own(global, "undefined", Value::Undefined, fixed())?;
        self.define_own(global, "NaN", Value::Double(f64::NAN), fixed())?;
        self.define_own(global, "Infinity", Value::Double(f64::INFINITY), fixed())?;
        self.define_method(global, "isNaN", 1, global_is_nan)?;

        self.define_constructor("Object", 1, object_constructor, realm.object_prototype)?;
        self.define_method(realm.object_prototype, "hasOwnProperty", 1, object_has_own_property)?;
        self.define_method(realm.object_prototype, "toString", 0, object_to_string)?;
        self.define_method(realm.object_prototype, "valueOf", 0, object_value_of)?;

        self.define_constructor("Function", 1, function_constructor, realm.function_prototype)?;
        self.define_own(realm.function_prototype, "length", Value::Smi(0), fixed())?;
        self.define_method(realm.function_prototype, "call", 1, function_call)?;
        self.define_method(realm.function_prototype, "apply", 2, function_apply)?;
        self.define_method(realm.function_prototype, "toString", 0, function_to_string)?;

        self.define_constructor("Array", 1, array_constructor, realm.array_prototype)?;
        self.define_method(realm.array_prototype, "push", 1, array_push)?;
        self.define_method(realm.array_prototype, "pop", 0, array_pop)?;
        self.define_method(realm.array_prototype, "join", 1, array_join)?;
        self.define_method(realm.array_prototype, "toString", 0, array_to_string)?;

        self.define_constructor("String", 1, string_constructor, realm.string_prototype)?;
        let string_methods: [(&str, u32, IntrinsicFn); 8] = [
            ("charAt", 1, string_char_at),
            ("charCodeAt", 1, string_char_code_at),
            ("indexOf", 1, string_index_of),
            ("substring", 2, string_substring),
            ("toUpperCase", 0, string_to_upper_case),
            ("toLowerCase", 0, string_to_lower_case),
            ("toString", 0, primitive_value_of),
            ("valueOf", 0, primitive_value_of),
        ];
        for (name, arity, function) in string_methods {
            self.define_method(realm.string_prototype, name, arity, function)?;
        }

        self.define_constructor("Number", 1, number_constructor, realm.number_prototype)?;
        self.define_method(realm.number_prototype, "toString", 0, number_to_string)?;
        self.define_method(realm.number_prototype, "valueOf", 0, primitive_value_of)?;

        self.define_constructor("Boolean", 1, boolean_constructor, realm.boolean_prototype)?;
        self.define_method(realm.boolean_prototype, "toString", 0, boolean_to_string)?;
        self.define_method(realm.boolean_prototype, "valueOf", 0, primitive_value_of)?;

        self.define_constructor("Error", 1, error_constructor, realm.error_prototype)?;
        let name = self.alloc_string("Error");
        self.define_own(realm.error_prototype, "name", name, HIDDEN)?;
        let empty = self.alloc_string("");
        self.define_own(realm.error_prototype, "message", empty, HIDDEN)?;
        self.define_method(realm.error_prototype, "toString", 0, error_to_string)?;
        for kind in ERROR_KINDS {
            let prototype = self.error_prototype(kind);
            self.define_constructor(kind.name(), 1, error_constructor, prototype)?;
            let name = self.alloc_string(kind.name());
            self.define_own(prototype, "name", name, HIDDEN)?;
        }
        Ok(())
    }

    /// Define the global `gc(maybe)` function.
    pub fn install_gc_function(&self) -> Result<(), HeapError> {
        self.scoped(|rt| rt.define_method(rt.realm.global, "gc", 1, global_gc).map(|_| ()))
    }

    /// UTF-16 contents of `this` converted to a string.
    fn this_units(&self, call: &IntrinsicCall<'_>) -> EvalResult<Rc<[u16]>> {
        if call.this.is_void() {
            return self.throw(ErrorKind::TypeError, "String.prototype method called on null or undefined");
        }
        let id = self.to_js_string(call.this)?;
        self.string_units(id)
    }

    fn to_integer(&self, value: Value) -> EvalResult<f64> {
        let n = self.to_number_internal(value)?;
        Ok(if n.is_nan() { 0.0 } else { n.trunc() })
    }

    fn array_this(&self, call: &IntrinsicCall<'_>, method: &str) -> EvalResult<ObjectId> {
        match call.this {
            Value::Object(id) if self.heap.borrow().object(id)?.elements().is_some() => Ok(id),
            _ => self.throw(
                ErrorKind::TypeError,
                format!("Array.prototype.{} called on incompatible object", method),
            ),
        }
    }

    /// Elements of an array-like argument list for `apply`.
    fn list_from_array_like(&self, value: Value) -> EvalResult<Vec<Value>> {
        let id = match value {
            Value::Undefined | Value::Null => return Ok(Vec::new()),
            Value::Object(id) => id,
            _ => {
                return self.throw(
                    ErrorKind::TypeError,
                    "second argument to Function.prototype.apply must be an array",
                )
            }
        };
        if let Some(elements) = self.heap.borrow().object(id)?.elements() {
            return Ok(elements.clone());
        }
        let length = self.get_property(id, "length", value)?;
        let length = self.to_integer(length)?.max(0.0) as usize;
        let mut values = Vec::with_capacity(length);
        for i in 0..length {
            let element = self.get_property(id, &i.to_string(), value)?;
            values.push(self.temp(element));
        }
        Ok(values)
    }

    fn join_elements(&self, array: ObjectId, separator: &[u16]) -> EvalResult {
        let elements = match self.heap.borrow().object(array)?.elements() {
            Some(elements) => elements.clone(),
            None => Vec::new(),
        };
        let mut units = Vec::new();
        for (i, element) in elements.into_iter().enumerate() {
            if i > 0 {
                units.extend_from_slice(separator);
            }
            if !element.is_void() {
                let s = self.to_js_string(element)?;
                units.extend_from_slice(&self.string_units(s)?);
            }
        }
        Ok(Value::String(self.alloc_string_units(units)))
    }

    fn class_name_of(&self, value: Value) -> EvalResult<String> {
        Ok(match value {
            Value::Undefined => "Undefined".to_string(),
            Value::Null => "Null".to_string(),
            Value::Boolean(_) => "Boolean".to_string(),
            Value::Smi(_) | Value::Double(_) => "Number".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Object(id) => {
                if let Some(hooks) = self.host_hooks(id) {
                    return Ok(hooks.class_name().to_string());
                }
                match self.heap.borrow().object(id)?.class {
                    ObjectClass::Array(_) => "Array",
                    ObjectClass::Function(_) => "Function",
                    ObjectClass::Error => "Error",
                    _ => "Object",
                }
                .to_string()
            }
        })
    }
}

fn noop(_rt: &Runtime, _call: &IntrinsicCall<'_>) -> EvalResult {
    Ok(Value::Undefined)
}

fn global_gc(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    if rt.to_boolean_internal(call.arg(0)) {
        rt.maybe_gc();
    } else {
        rt.gc();
    }
    Ok(Value::Undefined)
}

fn global_is_nan(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    Ok(Value::Boolean(rt.to_number_internal(call.arg(0))?.is_nan()))
}

// ============================================================================
// Object
// ============================================================================

/// Objects pass through; primitives are returned unchanged since there are no
/// wrapper objects.
fn object_constructor(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    match call.arg(0) {
        Value::Undefined | Value::Null => Ok(Value::Object(
            rt.alloc_object(ObjectData::ordinary(Some(rt.realm.object_prototype))),
        )),
        other => Ok(other),
    }
}

fn object_has_own_property(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let key = rt.to_property_key(call.arg(0))?;
    match call.this {
        Value::Object(id) => Ok(Value::Boolean(rt.has_own_property(id, &key)?)),
        Value::String(id) => {
            let length = rt.string_units(id)?.len();
            let is_index = crate::operations::array_index(&key).map(|i| i < length).unwrap_or(false);
            Ok(Value::Boolean(is_index || key == "length"))
        }
        other => {
            rt.to_object_internal(other)?;
            Ok(Value::Boolean(false))
        }
    }
}

fn object_to_string(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let name = rt.class_name_of(call.this)?;
    Ok(rt.alloc_string(&format!("[object {}]", name)))
}

fn object_value_of(_rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    Ok(call.this)
}

// ============================================================================
// Function
// ============================================================================

fn function_constructor(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let mut params = Vec::new();
    let mut body = String::new();
    if let Some((last, rest)) = call.args.split_last() {
        for param in rest {
            params.push(rt.to_string_internal(*param)?);
        }
        body = rt.to_string_internal(*last)?;
    }
    let (file, line) = rt.current_location();
    let params: Vec<&str> = params.iter().map(String::as_str).collect();
    let function = rt.compile_function_internal("anonymous", &params, &body, &file, line)?;
    Ok(Value::Object(function))
}

fn function_call(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let Value::Object(target) = call.this else {
        return rt.throw(ErrorKind::TypeError, "Function.prototype.call called on incompatible object");
    };
    let args = call.args.get(1..).unwrap_or_default();
    rt.call_value(Value::Object(target), call.arg(0), args)
}

fn function_apply(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let Value::Object(target) = call.this else {
        return rt.throw(ErrorKind::TypeError, "Function.prototype.apply called on incompatible object");
    };
    let args = rt.list_from_array_like(call.arg(1))?;
    rt.call_value(Value::Object(target), call.arg(0), &args)
}

fn function_to_string(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    if !rt.is_callable_value(call.this) {
        return rt.throw(ErrorKind::TypeError, "Function.prototype.toString called on incompatible object");
    }
    let name = match call.this {
        Value::Object(id) => match rt.get_property(id, "name", call.this)? {
            Value::String(s) => rt.string_lossy(s)?,
            _ => String::new(),
        },
        _ => String::new(),
    };
    Ok(rt.alloc_string(&format!("function {}() {{\n    [native code]\n}}", name)))
}

// ============================================================================
// Array
// ============================================================================

fn array_constructor(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let elements = match call.args {
        [length] if length.is_number() => {
            let n = length.as_number().unwrap_or(0.0);
            if n != crate::operations::to_uint32(n) as f64 {
                return rt.throw(ErrorKind::RangeError, "invalid array length");
            }
            vec![Value::Undefined; n as usize]
        }
        args => args.to_vec(),
    };
    Ok(Value::Object(rt.alloc_object(ObjectData::new(
        ObjectClass::Array(elements),
        Some(rt.realm.array_prototype),
    ))))
}

fn array_push(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let array = rt.array_this(call, "push")?;
    let mut heap = rt.heap.borrow_mut();
    let length = match heap.object_mut(array)?.elements_mut() {
        Some(elements) => {
            elements.extend_from_slice(call.args);
            elements.len()
        }
        None => 0,
    };
    Ok(Value::from_f64(length as f64))
}

fn array_pop(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let array = rt.array_this(call, "pop")?;
    let popped = rt
        .heap
        .borrow_mut()
        .object_mut(array)?
        .elements_mut()
        .and_then(Vec::pop);
    Ok(rt.temp(popped.unwrap_or(Value::Undefined)))
}

fn array_join(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let array = rt.array_this(call, "join")?;
    let separator: Vec<u16> = match call.arg(0) {
        Value::Undefined => vec![u16::from(b',')],
        other => {
            let s = rt.to_js_string(other)?;
            rt.string_units(s)?.to_vec()
        }
    };
    rt.join_elements(array, &separator)
}

fn array_to_string(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let array = rt.array_this(call, "toString")?;
    rt.join_elements(array, &[u16::from(b',')])
}

// ============================================================================
// String
// ============================================================================

fn string_constructor(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    if call.args.is_empty() {
        return Ok(rt.alloc_string(""));
    }
    Ok(Value::String(rt.to_js_string(call.arg(0))?))
}

fn string_char_at(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let units = rt.this_units(call)?;
    let index = rt.to_integer(call.arg(0))?;
    let unit = (index >= 0.0).then(|| units.get(index as usize)).flatten();
    Ok(Value::String(rt.alloc_string_units(unit.map(|u| vec![*u]).unwrap_or_default())))
}

fn string_char_code_at(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let units = rt.this_units(call)?;
    let index = rt.to_integer(call.arg(0))?;
    let unit = (index >= 0.0).then(|| units.get(index as usize)).flatten();
    Ok(match unit {
        Some(unit) => Value::Smi(i32::from(*unit)),
        None => Value::Double(f64::NAN),
    })
}

fn string_index_of(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let units = rt.this_units(call)?;
    let search = rt.to_js_string(call.arg(0))?;
    let search = rt.string_units(search)?;
    let start = rt.to_integer(call.arg(1))?.clamp(0.0, units.len() as f64) as usize;
    if search.is_empty() {
        return Ok(Value::from_f64(start as f64));
    }
    let found = (start..units.len())
        .find(|&i| units[i..].starts_with(&search))
        .map(|i| i as f64)
        .unwrap_or(-1.0);
    Ok(Value::from_f64(found))
}

fn string_substring(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let units = rt.this_units(call)?;
    let length = units.len() as f64;
    let start = rt.to_integer(call.arg(0))?.clamp(0.0, length) as usize;
    let end = match call.arg(1) {
        Value::Undefined => units.len(),
        other => rt.to_integer(other)?.clamp(0.0, length) as usize,
    };
    let (from, to) = if start <= end { (start, end) } else { (end, start) };
    Ok(Value::String(rt.alloc_string_units(units[from..to].to_vec())))
}

fn map_case(units: &[u16], upper: bool) -> Vec<u16> {
    let mut out = Vec::with_capacity(units.len());
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) => {
                let mut buffer = [0u16; 2];
                if upper {
                    for mapped in c.to_uppercase() {
                        out.extend_from_slice(mapped.encode_utf16(&mut buffer));
                    }
                } else {
                    for mapped in c.to_lowercase() {
                        out.extend_from_slice(mapped.encode_utf16(&mut buffer));
                    }
                }
            }
            Err(e) => out.push(e.unpaired_surrogate()),
        }
    }
    out
}

fn string_to_upper_case(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let units = rt.this_units(call)?;
    Ok(Value::String(rt.alloc_string_units(map_case(&units, true))))
}

fn string_to_lower_case(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let units = rt.this_units(call)?;
    Ok(Value::String(rt.alloc_string_units(map_case(&units, false))))
}

fn primitive_value_of(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    match call.this {
        Value::Object(_) | Value::Undefined | Value::Null => {
            rt.throw(ErrorKind::TypeError, "valueOf called on incompatible receiver")
        }
        primitive => Ok(primitive),
    }
}

// ============================================================================
// Number and Boolean
// ============================================================================

fn number_constructor(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    if call.args.is_empty() {
        return Ok(Value::Smi(0));
    }
    Ok(Value::from_f64(rt.to_number_internal(call.arg(0))?))
}

fn number_to_string(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    match call.this.as_number() {
        Some(n) => Ok(rt.alloc_string(&crate::operations::number_to_string(n))),
        None => rt.throw(ErrorKind::TypeError, "Number.prototype.toString called on incompatible receiver"),
    }
}

fn boolean_constructor(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    Ok(Value::Boolean(rt.to_boolean_internal(call.arg(0))))
}

fn boolean_to_string(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    match call.this {
        Value::Boolean(b) => Ok(rt.alloc_string(if b { "true" } else { "false" })),
        _ => rt.throw(ErrorKind::TypeError, "Boolean.prototype.toString called on incompatible receiver"),
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Shared by every error constructor; the kind comes from the callee's
/// `prototype` property.
fn error_constructor(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let prototype = match rt.get_property(call.callee, "prototype", Value::Object(call.callee))? {
        Value::Object(p) => p,
        _ => rt.error_prototype(ErrorKind::InternalError),
    };
    let message = match call.arg(0) {
        Value::Undefined => String::new(),
        other => rt.to_string_internal(other)?,
    };
    Ok(rt.make_error_with_prototype(prototype, &message))
}

fn error_to_string(rt: &Runtime, call: &IntrinsicCall<'_>) -> EvalResult {
    let Value::Object(id) = call.this else {
        return rt.throw(ErrorKind::TypeError, "Error.prototype.toString called on incompatible receiver");
    };
    let name = rt.get_property(id, "name", call.this)?;
    let name = match name {
        Value::Undefined => "Error".to_string(),
        other => rt.to_string_internal(other)?,
    };
    let message = rt.get_property(id, "message", call.this)?;
    let message = match message {
        Value::Undefined => String::new(),
        other => rt.to_string_internal(other)?,
    };
    let text = match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{}: {}", name, message),
    };
    Ok(rt.alloc_string(&text))
}
