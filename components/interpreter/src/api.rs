//! Embedding API.
//!
//! Every method here is an entry point: it pops the temporaries it pushed
//! before returning, so gc values it returns are unrooted. Root them (or push
//! them on the local root stack) before allocating again.

use crate::completion::EvalResult;
use crate::eval::Scope;
use crate::hooks::{HostCell, HostHooks, ResolveFlags};
use crate::runtime::{ErrorReport, Location, Runtime};
use core_types::{ErrorKind, ObjectId, SourcePosition, StringId, Value};
use memory_manager::{Callable, ObjectClass, ObjectData, PropertyFlags};
use parser::{FunctionNode, Keyword, Parser};
use std::rc::Rc;

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$');
    starts_well
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && Keyword::from_word(name).is_none()
}

impl Runtime {
    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Evaluate `source` as a program in the global scope.
    ///
    /// `line` is the line number of the first source line, used for error
    /// locations. Returns the completion value of the last expression
    /// statement.
    pub fn evaluate(&self, source: &str, file: &str, line: u32) -> EvalResult {
        self.scoped(|rt| rt.evaluate_with(source, file, line, rt.realm.global))
    }

    /// Evaluate `source` with `scope` as the variable object and `this`.
    /// Names not found on `scope` are looked up on the global object.
    pub fn evaluate_in_scope(&self, source: &str, file: &str, line: u32, scope: ObjectId) -> EvalResult {
        self.scoped(|rt| rt.evaluate_with(source, file, line, scope))
    }

    fn evaluate_with(&self, source: &str, file: &str, line: u32, scope_object: ObjectId) -> EvalResult {
        let line_offset = line.saturating_sub(1);
        let program = Parser::new(source)
            .parse()
            .map_err(|e| self.syntax_error_from(&e, file, line_offset))?;
        let saved = self.location.replace(Location {
            file: Rc::from(file),
            line_offset,
            line,
        });
        let scope = Scope {
            env: scope_object,
            var_env: scope_object,
            this: Value::Object(scope_object),
        };
        let result = self.run_program(&program.body, scope);
        *self.location.borrow_mut() = saved;
        tracing::trace!(file, ok = result.is_ok(), "evaluated");
        result
    }

    /// Compile a function from parameter names and body source. The function
    /// closes over the global scope.
    pub fn compile_function(
        &self,
        name: &str,
        params: &[&str],
        body: &str,
        file: &str,
        line: u32,
    ) -> EvalResult<ObjectId> {
        self.scoped(|rt| rt.compile_function_internal(name, params, body, file, line))
    }

    pub(crate) fn compile_function_internal(
        &self,
        name: &str,
        params: &[&str],
        body: &str,
        file: &str,
        line: u32,
    ) -> EvalResult<ObjectId> {
        let line_offset = line.saturating_sub(1);
        let saved = self.location.replace(Location {
            file: Rc::from(file),
            line_offset,
            line,
        });
        let result = (|| {
            if let Some(bad) = params.iter().find(|p| !is_identifier(p)) {
                return self.throw(ErrorKind::SyntaxError, format!("invalid parameter name '{}'", bad));
            }
            let statements = Parser::new(body)
                .parse_function_body_source()
                .map_err(|e| self.syntax_error_from(&e, file, line_offset))?;
            let node = Rc::new(FunctionNode {
                name: (!name.is_empty()).then(|| name.to_string()),
                params: params.iter().map(|p| p.to_string()).collect(),
                body: statements,
                position: Some(SourcePosition::new(1, 1, 0)),
            });
            self.make_function(&node, self.realm.global)
        })();
        *self.location.borrow_mut() = saved;
        result
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Call a function value with an explicit `this`.
    pub fn call(&self, callee: Value, this: Value, args: &[Value]) -> EvalResult {
        self.scoped(|rt| {
            rt.temp(callee);
            rt.temp(this);
            args.iter().for_each(|a| {
                rt.temp(*a);
            });
            rt.call_value(callee, this, args)
        })
    }

    /// Call a function value as a constructor.
    pub fn construct(&self, callee: Value, args: &[Value]) -> EvalResult {
        self.scoped(|rt| {
            rt.temp(callee);
            args.iter().for_each(|a| {
                rt.temp(*a);
            });
            rt.construct_value(callee, args)
        })
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read a property.
    pub fn get(&self, object: ObjectId, key: &str) -> EvalResult {
        self.scoped(|rt| rt.get_property(object, key, Value::Object(object)))
    }

    /// Read a property of any value (string `length`, prototype methods).
    pub fn get_value(&self, base: Value, key: &str) -> EvalResult {
        self.scoped(|rt| rt.get_value_property(base, key))
    }

    /// Write a property.
    pub fn set(&self, object: ObjectId, key: &str, value: Value) -> EvalResult<()> {
        self.scoped(|rt| {
            rt.temp(value);
            rt.set_property(object, key, value, Value::Object(object))
        })
    }

    /// Delete a property. `Ok(false)` if it is permanent.
    pub fn delete(&self, object: ObjectId, key: &str) -> EvalResult<bool> {
        self.scoped(|rt| rt.delete_property(object, key))
    }

    /// Define an own data property with attributes.
    pub fn define(&self, object: ObjectId, key: &str, value: Value, flags: PropertyFlags) -> EvalResult<()> {
        self.scoped(|rt| {
            rt.temp(value);
            rt.define_property(object, key, value, flags)
        })
    }

    /// Define an accessor property.
    pub fn define_accessor(
        &self,
        object: ObjectId,
        key: &str,
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
        flags: PropertyFlags,
    ) -> EvalResult<()> {
        self.define_accessor_property(object, key, getter, setter, flags)
    }

    /// Whether `key` is an own or inherited property.
    pub fn has(&self, object: ObjectId, key: &str) -> EvalResult<bool> {
        self.scoped(|rt| rt.has_property(object, key, ResolveFlags::DETECTING))
    }

    /// Whether `key` is an own property.
    pub fn has_own(&self, object: ObjectId, key: &str) -> EvalResult<bool> {
        self.scoped(|rt| rt.has_own_property(object, key))
    }

    /// Own enumerable keys, as `for-in` would visit them on this object alone.
    pub fn own_keys(&self, object: ObjectId) -> EvalResult<Vec<String>> {
        self.scoped(|rt| rt.own_enumerable_keys(object))
    }

    /// Prototype link of an object.
    pub fn get_prototype(&self, object: ObjectId) -> EvalResult<Option<ObjectId>> {
        Ok(self.heap.borrow().object(object)?.prototype)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a plain object. `None` selects `Object.prototype`.
    pub fn create_object(&self, prototype: Option<ObjectId>) -> EvalResult<ObjectId> {
        let prototype = prototype.unwrap_or(self.realm.object_prototype);
        self.heap.borrow().object(prototype)?;
        Ok(self.scoped(|rt| rt.alloc_object(ObjectData::ordinary(Some(prototype)))))
    }

    /// Create an array holding `elements`.
    pub fn create_array(&self, elements: &[Value]) -> EvalResult<ObjectId> {
        for element in elements {
            self.heap.borrow().check_value(*element)?;
        }
        Ok(self.scoped(|rt| {
            rt.alloc_object(ObjectData::new(
                ObjectClass::Array(elements.to_vec()),
                Some(rt.realm.array_prototype),
            ))
        }))
    }

    /// Create a string from UTF-8 text.
    pub fn create_string(&self, s: &str) -> Value {
        self.scoped(|rt| rt.alloc_string(s))
    }

    /// Create a string from UTF-16 code units.
    pub fn create_string_utf16(&self, units: &[u16]) -> StringId {
        self.scoped(|rt| rt.alloc_string_units(units.to_vec()))
    }

    /// Create an object backed by `hooks`.
    pub fn create_host_object(
        &self,
        prototype: Option<ObjectId>,
        hooks: Rc<dyn HostHooks>,
    ) -> EvalResult<ObjectId> {
        let object = self.create_object(prototype)?;
        self.heap.borrow_mut().object_mut(object)?.host = Some(Rc::new(HostCell::new(hooks)));
        Ok(object)
    }

    /// Create a function object whose calls go to `hooks`.
    pub fn create_host_function(&self, name: &str, arity: u32, hooks: Rc<dyn HostHooks>) -> EvalResult<ObjectId> {
        self.scoped(|rt| {
            let mut data = ObjectData::new(
                ObjectClass::Function(Callable::Host),
                Some(rt.realm.function_prototype),
            );
            data.host = Some(Rc::new(HostCell::new(hooks)));
            let function = rt.alloc_object(data);
            let fixed = PropertyFlags::DONT_ENUMERATE | PropertyFlags::READ_ONLY | PropertyFlags::PERMANENT;
            rt.define_own(function, "length", Value::from_f64(arity as f64), fixed)?;
            let name = rt.alloc_string(name);
            rt.define_own(function, "name", name, fixed)?;
            Ok(function)
        })
    }

    /// Attach hooks to an existing object. False if it already carries a
    /// host payload.
    pub fn attach_host(&self, object: ObjectId, hooks: Rc<dyn HostHooks>) -> EvalResult<bool> {
        let mut heap = self.heap.borrow_mut();
        let data = heap.object_mut(object)?;
        if data.host.is_some() {
            return Ok(false);
        }
        data.host = Some(Rc::new(HostCell::new(hooks)));
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Conversions
    // ------------------------------------------------------------------

    /// ToNumber.
    pub fn to_number(&self, value: Value) -> EvalResult<f64> {
        self.scoped(|rt| rt.to_number_internal(value))
    }

    /// ToBoolean.
    pub fn to_boolean(&self, value: Value) -> bool {
        self.to_boolean_internal(value)
    }

    /// ToString, decoded to UTF-8 (unpaired surrogates are replaced).
    pub fn to_std_string(&self, value: Value) -> EvalResult<String> {
        self.scoped(|rt| rt.to_string_internal(value))
    }

    /// ToString, as a heap string.
    pub fn to_string_value(&self, value: Value) -> EvalResult<StringId> {
        self.scoped(|rt| rt.to_js_string(value))
    }

    /// ToObject. Primitives have no wrapper objects and raise `TypeError`.
    pub fn to_object(&self, value: Value) -> EvalResult<ObjectId> {
        self.scoped(|rt| rt.to_object_internal(value))
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self, value: Value) -> &'static str {
        self.type_of_internal(value)
    }

    /// `a === b`.
    pub fn strict_equals(&self, a: Value, b: Value) -> bool {
        self.strict_equals_internal(a, b)
    }

    /// Source-like rendering for diagnostics.
    pub fn to_source(&self, value: Value) -> String {
        self.to_source_internal(value)
    }

    /// Whether `value` is a function object.
    pub fn is_callable(&self, value: Value) -> bool {
        self.is_callable_value(value)
    }

    /// Whether `value` is an array object.
    pub fn is_array_value(&self, value: Value) -> bool {
        match value {
            Value::Object(id) => self.is_array(id).unwrap_or(false),
            _ => false,
        }
    }

    /// `value instanceof constructor`.
    pub fn instance_of(&self, value: Value, constructor: ObjectId) -> EvalResult<bool> {
        self.scoped(|rt| rt.instance_of_internal(value, constructor))
    }

    /// Create an error object of `kind` at the current location.
    pub fn create_error(&self, kind: ErrorKind, message: &str) -> Value {
        self.scoped(|rt| rt.make_error(kind, message))
    }

    /// Message and location of a thrown value.
    pub fn error_report(&self, value: Value) -> ErrorReport {
        self.scoped(|rt| {
            rt.temp(value);
            let Value::Object(id) = value else {
                return rt.plain_report(value);
            };
            if !rt.is_error_object(value) {
                return rt.plain_report(value);
            }
            let text = |key: &str| -> Option<String> {
                match rt.get_property(id, key, value) {
                    Ok(Value::Undefined) | Err(_) => None,
                    Ok(v) => rt.to_string_internal(v).ok(),
                }
            };
            let name = text("name").unwrap_or_else(|| "Error".to_string());
            let message = text("message").unwrap_or_default();
            let file = match rt.get_property(id, "fileName", value) {
                Ok(Value::String(s)) => rt.string_lossy(s).ok().filter(|f| !f.is_empty()),
                _ => None,
            };
            let line = match rt.get_property(id, "lineNumber", value) {
                Ok(v) => v.as_number().filter(|n| *n > 0.0).map(|n| n as u32),
                Err(_) => None,
            };
            let message = if message.is_empty() {
                name
            } else {
                format!("{}: {}", name, message)
            };
            ErrorReport { message, file, line }
        })
    }

    fn plain_report(&self, value: Value) -> ErrorReport {
        let message = self
            .to_string_internal(value)
            .unwrap_or_else(|_| self.to_source_internal(value));
        ErrorReport {
            message,
            file: None,
            line: None,
        }
    }
}
