//! Host hooks: the seam through which embedders back script objects.
//!
//! An object created with [`Runtime::create_host_object`] or
//! [`Runtime::create_host_function`] carries an `Rc<dyn HostHooks>` in its
//! private slot. The runtime consults it on property access, enumeration,
//! calls and during garbage collection.
//!
//! Hooks never see the heap borrowed: the runtime releases every borrow before
//! calling out, so a hook may call back into the runtime freely.
//!
//! [`Runtime::create_host_object`]: crate::Runtime::create_host_object
//! [`Runtime::create_host_function`]: crate::Runtime::create_host_function

use crate::runtime::Runtime;
use bitflags::bitflags;
use core_types::{ObjectId, Value};
use memory_manager::{HostObject, Tracer, ValueSlot};
use std::any::Any;
use std::rc::Rc;

/// Which property operation a [`HostHooks::property_op`] call reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyMode {
    /// A new own property is being created; `data` holds the initial value
    Add,
    /// An own property is about to be removed; `data` holds its value
    Delete,
    /// A property was read; `data` holds the found value and becomes the result
    Get,
    /// A property is being written; `data` holds the value that will be stored
    Set,
}

bitflags! {
    /// Context of a lazy resolve request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResolveFlags: u8 {
        /// Accessed as `obj.prop` or `obj[prop]`
        const QUALIFIED = 1;
        /// The access is a write
        const ASSIGNING = 2;
        /// Existence test (`in`, `typeof`)
        const DETECTING = 4;
        /// Variable declaration on an object scope
        const DECLARING = 8;
        /// Constructor name lookup for `new`
        const CLASSNAME = 16;
    }
}

/// Failure status returned by a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFailure {
    /// The hook stored an exception with [`Runtime::set_pending_exception`]
    Exception,
    /// Uncatchable termination requested
    Quit,
}

/// Arguments of a host call.
pub struct HostCall<'a> {
    /// The function object being invoked
    pub callee: ObjectId,
    /// Receiver
    pub this: Value,
    /// Positional arguments, owned by the caller's frame
    pub args: &'a [Value],
    /// Output slot; whatever the hook leaves here is the call's result
    pub result: &'a ValueSlot,
    /// Invoked through `new`
    pub construct: bool,
}

/// Behavior attached to a host-backed object.
///
/// Every method except [`trace`](HostHooks::trace) and
/// [`as_any`](HostHooks::as_any) has a default that leaves engine behavior
/// unchanged.
pub trait HostHooks: 'static {
    /// Report every heap value held outside the object graph.
    ///
    /// Runs while the heap is borrowed; must not call into the runtime.
    fn trace(&self, tracer: &mut Tracer);

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Class name reported by `Object.prototype.toString`.
    fn class_name(&self) -> &str {
        "Object"
    }

    /// Intercept a property operation. `data` is read and written in place.
    fn property_op(
        &self,
        _rt: &Runtime,
        _object: ObjectId,
        _mode: PropertyMode,
        _key: &str,
        _data: &ValueSlot,
    ) -> Result<(), HookFailure> {
        Ok(())
    }

    /// Materialize `key` lazily. Returns true if the hook defined it.
    fn resolve(
        &self,
        _rt: &Runtime,
        _object: ObjectId,
        _key: &str,
        _flags: ResolveFlags,
    ) -> Result<bool, HookFailure> {
        Ok(false)
    }

    /// Custom enumeration. `None` selects the default (own enumerable keys).
    fn enumerate(&self, _rt: &Runtime, _object: ObjectId) -> Result<Option<Vec<String>>, HookFailure> {
        Ok(None)
    }

    /// Invoke the object as a function.
    fn call(&self, rt: &Runtime, _call: HostCall<'_>) -> Result<(), HookFailure> {
        rt.throw_type_error("object is not a function")
    }
}

/// Private-slot payload wrapping a set of hooks.
pub struct HostCell {
    hooks: Rc<dyn HostHooks>,
}

impl HostCell {
    /// Wrap hooks for storage in an object's private slot.
    pub fn new(hooks: Rc<dyn HostHooks>) -> Self {
        Self { hooks }
    }

    /// The wrapped hooks.
    pub fn hooks(&self) -> &Rc<dyn HostHooks> {
        &self.hooks
    }
}

impl HostObject for HostCell {
    fn trace(&self, tracer: &mut Tracer) {
        self.hooks.trace(tracer);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
