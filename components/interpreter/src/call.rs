//! Function invocation and construction.

use crate::completion::{Completion, EvalResult};
use crate::eval::Scope;
use crate::hooks::HostCall;
use crate::runtime::{IntrinsicCall, Location, Runtime, MAX_CALL_DEPTH};
use core_types::{ErrorKind, ObjectId, Value};
use memory_manager::{Callable, ObjectClass, ObjectData, PropertyFlags};
use std::cell::Cell;
use std::rc::Rc;

/// Decrements the call depth when a frame unwinds.
struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// Restores the executing location when a script frame unwinds.
struct LocationGuard<'a> {
    runtime: &'a Runtime,
    saved: Option<Location>,
}

impl Drop for LocationGuard<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.runtime.location.borrow_mut() = saved;
        }
    }
}

impl Runtime {
    fn enter_frame(&self) -> EvalResult<DepthGuard<'_>> {
        let depth = self.call_depth.get();
        if depth >= MAX_CALL_DEPTH {
            return self.throw(ErrorKind::InternalError, "too much recursion");
        }
        self.call_depth.set(depth + 1);
        Ok(DepthGuard(&self.call_depth))
    }

    /// Call `callee`, which must be a function or a host object with a call hook.
    pub(crate) fn call_value(&self, callee: Value, this: Value, args: &[Value]) -> EvalResult {
        match callee {
            Value::Object(id) if self.is_callable_value(callee) || self.host_hooks(id).is_some() => {
                self.call_function(id, this, args, false)
            }
            other => {
                let text = self.to_source_internal(other);
                self.throw(ErrorKind::TypeError, format!("{} is not a function", text))
            }
        }
    }

    /// Invoke a function object.
    pub(crate) fn call_function(
        &self,
        callee: ObjectId,
        this: Value,
        args: &[Value],
        construct: bool,
    ) -> EvalResult {
        let _depth = self.enter_frame()?;
        let callable = self.heap.borrow().object(callee)?.callable().cloned();
        match callable {
            Some(Callable::Script { code, scope }) => self.call_script(callee, code.0 as usize, scope, this, args),
            Some(Callable::Intrinsic(index)) => {
                let function = self.intrinsics.borrow().get(index as usize).copied();
                let Some(function) = function else {
                    return self.throw(ErrorKind::InternalError, "unknown built-in function");
                };
                function(
                    self,
                    &IntrinsicCall {
                        callee,
                        this,
                        args,
                        construct,
                    },
                )
            }
            Some(Callable::Host) | None => self.call_host(callee, this, args, construct),
        }
    }

    fn call_host(&self, callee: ObjectId, this: Value, args: &[Value], construct: bool) -> EvalResult {
        let Some(hooks) = self.host_hooks(callee) else {
            let text = self.to_source_internal(Value::Object(callee));
            return self.throw(ErrorKind::TypeError, format!("{} is not a function", text));
        };
        let result = Rc::new(Cell::new(Value::Undefined));
        self.heap.borrow_mut().push_local_slot(result.clone());
        hooks
            .call(
                self,
                HostCall {
                    callee,
                    this,
                    args,
                    result: &result,
                    construct,
                },
            )
            .map_err(|f| self.hook_failure(f))?;
        Ok(result.get())
    }

    fn call_script(
        &self,
        callee: ObjectId,
        code: usize,
        closure: ObjectId,
        this: Value,
        args: &[Value],
    ) -> EvalResult {
        let (function, file, line_offset) = {
            let table = self.code.borrow();
            let Some(entry) = table.get(code) else {
                return self.throw(ErrorKind::InternalError, "unknown function code");
            };
            (entry.function.clone(), entry.file.clone(), entry.line_offset)
        };

        let line = function.position.as_ref().map(|p| p.line).unwrap_or(1) + line_offset;
        let _location = LocationGuard {
            runtime: self,
            saved: Some(self.location.replace(Location {
                file,
                line_offset,
                line,
            })),
        };

        let env = self.alloc_object(ObjectData::new(
            ObjectClass::Environment {
                outer: Some(closure),
            },
            None,
        ));
        for (i, name) in function.params.iter().enumerate() {
            let value = args.get(i).copied().unwrap_or(Value::Undefined);
            self.define_own(env, name, value, PropertyFlags::PERMANENT)?;
        }
        if !function.params.iter().any(|p| p == "arguments") {
            let arguments = self.alloc_object(ObjectData::new(
                ObjectClass::Array(args.to_vec()),
                Some(self.realm.array_prototype),
            ));
            self.define_own(env, "arguments", Value::Object(arguments), PropertyFlags::DONT_ENUMERATE)?;
            self.define_own(arguments, "callee", Value::Object(callee), PropertyFlags::DONT_ENUMERATE)?;
        }

        let this = if this.is_void() {
            Value::Object(self.realm.global)
        } else {
            this
        };
        let scope = Scope {
            env,
            var_env: env,
            this,
        };
        self.instantiate(&function.body, scope)?;
        match self.exec_statements(&function.body, scope)? {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    /// `new callee(...args)`.
    pub(crate) fn construct_value(&self, callee: Value, args: &[Value]) -> EvalResult {
        let id = match callee {
            Value::Object(id) if self.is_callable_value(callee) => id,
            other => {
                let text = self.to_source_internal(other);
                return self.throw(ErrorKind::TypeError, format!("{} is not a constructor", text));
            }
        };
        let is_intrinsic = matches!(
            self.heap.borrow().object(id)?.callable(),
            Some(Callable::Intrinsic(_))
        );
        if is_intrinsic {
            return self.call_function(id, Value::Undefined, args, true);
        }

        let prototype = match self.get_property(id, "prototype", callee)? {
            Value::Object(proto) => proto,
            _ => self.realm.object_prototype,
        };
        let this = self.alloc_object(ObjectData::ordinary(Some(prototype)));
        let result = self.call_function(id, Value::Object(this), args, true)?;
        Ok(if result.is_object() {
            result
        } else {
            Value::Object(this)
        })
    }
}
