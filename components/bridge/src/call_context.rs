//! The record a native function or callable native object receives for one
//! invocation.

use crate::context::Context;
use crate::error::Result;
use crate::native_object::{get_native, Native, NativeObject};
use crate::object::{Function, Object};
use crate::value::Value;
use core_types::Value as RawValue;
use interpreter::HostCall;

/// One script-to-host call.
///
/// `result` aliases the engine's output slot: whatever it holds when the
/// native code returns is the call's value.
pub struct CallContext<'a> {
    cx: &'a Context,
    this: Value,
    function: Function,
    arguments: Arguments<'a>,
    result: Value,
    construct: bool,
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(cx: &'a Context, call: &HostCall<'a>) -> Self {
        Self {
            cx,
            this: cx.value(call.this),
            function: Function::from_id(cx, call.callee),
            arguments: Arguments { raw: call.args, cx },
            result: Value::bound_to(cx, call.result.clone()),
            construct: call.construct,
        }
    }

    /// The context the call runs in.
    pub fn context(&self) -> &'a Context {
        self.cx
    }

    /// The receiver.
    pub fn this(&self) -> &Value {
        &self.this
    }

    /// The receiver as an object.
    ///
    /// # Errors
    ///
    /// [`Error::Type`](crate::Error::Type) if `this` is a primitive.
    pub fn this_object(&self) -> Result<Object> {
        Object::from_value(&self.this)
    }

    /// The native instance of type `T` backing the receiver.
    pub fn native_this<T: NativeObject>(&self) -> Result<Native<T>> {
        get_native::<T>(self.cx, &self.this_object()?)
    }

    /// The positional arguments.
    pub fn arguments(&self) -> &Arguments<'a> {
        &self.arguments
    }

    /// Argument `index`, `undefined` past the end.
    pub fn arg(&self, index: usize) -> Value {
        self.arguments.get(index)
    }

    /// The result slot.
    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Store the call's result.
    pub fn set_result(&self, value: &Value) {
        self.result.assign(value);
    }

    /// The function object being invoked.
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Invoked with `new`.
    pub fn is_construct(&self) -> bool {
        self.construct
    }
}

/// Positional arguments of a call, read in place from the engine frame.
pub struct Arguments<'a> {
    raw: &'a [RawValue],
    cx: &'a Context,
}

impl<'a> Arguments<'a> {
    /// Number of arguments passed.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// No arguments were passed.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Argument `index`, `undefined` past the end.
    pub fn get(&self, index: usize) -> Value {
        let raw = self.raw.get(index).copied().unwrap_or(RawValue::Undefined);
        self.cx.value(raw)
    }

    /// All arguments in order.
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.raw.iter().map(|raw| self.cx.value(*raw))
    }

    /// Keep `value` alive until the call returns.
    pub fn push_root(&self, value: &Value) {
        let heap = self.cx.runtime().heap();
        heap.borrow_mut().push_local_slot(value.slot().clone());
    }
}
