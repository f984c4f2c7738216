//! Host objects backing script objects.
//!
//! A type implementing [`NativeObject`] is wrapped in a [`NativeObjectBase`]
//! and associated with a script object once, through
//! [`load_into`](NativeObjectBase::load_into). From then on the script object
//! owns the native instance: property access, enumeration and calls on the
//! object are routed to the native hooks, and the instance is dropped when the
//! collector sweeps the object.
//!
//! Every native type states the script values it holds through [`Trace`],
//! usually with [`trace_fields!`](crate::trace_fields).
//!
//! # Examples
//!
//! ```
//! use bridge::{trace_fields, Context, NativeObject, Value};
//! use std::cell::RefCell;
//!
//! struct Holder {
//!     held: RefCell<Value>,
//! }
//!
//! trace_fields!(Holder { held });
//!
//! impl NativeObject for Holder {
//!     fn class_name(&self) -> &str {
//!         "Holder"
//!     }
//! }
//!
//! let cx = Context::create().unwrap();
//! let object = cx.create_native_object(Holder { held: RefCell::new(Value::undefined()) }).unwrap();
//! let payload = cx.evaluate("({ kept: true })", "holder.js", 1).unwrap();
//! let native = object.get_native::<Holder>(&cx).unwrap();
//! *native.instance().unwrap().held.borrow_mut() = payload;
//! cx.gc();
//! let held = native.instance().unwrap().held.borrow().to_object(&cx).unwrap();
//! assert!(held.get_property(&cx, "kept").unwrap().get_boolean().unwrap());
//! ```

use crate::call_context::CallContext;
use crate::context::{Context, ContextInner, CurrentContextScope};
use crate::error::{Error, Result};
use crate::object::{Array, Function, JsString, Object};
use crate::root::{Root, Rootable};
use crate::value::Value;
use core_types::ObjectId;
use interpreter::{HookFailure, HostCall, HostHooks, PropertyMode, ResolveFlags, Runtime};
use memory_manager::{Tracer, ValueSlot};
use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

// ============================================================================
// Tracing
// ============================================================================

/// Reports the script values a host value keeps alive.
pub trait Trace {
    /// Mark every script value reachable from `self`.
    fn trace(&self, tracer: &mut Tracer);
}

/// Implement [`Trace`] by tracing the listed fields.
///
/// ```
/// use bridge::{trace_fields, Object, Value};
///
/// struct Pair {
///     left: Value,
///     right: Option<Object>,
///     label: String,
/// }
///
/// trace_fields!(Pair { left, right });
///
/// struct Plain;
/// trace_fields!(Plain);
/// ```
#[macro_export]
macro_rules! trace_fields {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Trace for $ty {
            fn trace(&self, tracer: &mut $crate::Tracer) {
                $( $crate::Trace::trace(&self.$field, tracer); )*
            }
        }
    };
    ($ty:ty) => {
        impl $crate::Trace for $ty {
            fn trace(&self, _tracer: &mut $crate::Tracer) {}
        }
    };
}

impl Trace for Value {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.mark_value(self.raw());
    }
}

macro_rules! trace_view {
    ($($view:ty),*) => {
        $(
            impl Trace for $view {
                fn trace(&self, tracer: &mut Tracer) {
                    tracer.mark_value(self.as_value().raw());
                }
            }
        )*
    };
}

trace_view!(Object, Function, Array, JsString);

/// Already held by the root table.
impl<T: Rootable> Trace for Root<T> {
    fn trace(&self, _tracer: &mut Tracer) {}
}

impl<T: Trace> Trace for Option<T> {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(inner) = self {
            inner.trace(tracer);
        }
    }
}

impl<T: Trace> Trace for Vec<T> {
    fn trace(&self, tracer: &mut Tracer) {
        self.iter().for_each(|item| item.trace(tracer));
    }
}

impl<T: Trace + ?Sized> Trace for Rc<T> {
    fn trace(&self, tracer: &mut Tracer) {
        (**self).trace(tracer);
    }
}

impl<T: Trace + ?Sized> Trace for Box<T> {
    fn trace(&self, tracer: &mut Tracer) {
        (**self).trace(tracer);
    }
}

/// A value borrowed mutably during marking cannot be inspected; the cycle is
/// abandoned instead of sweeping what it might hold.
impl<T: Trace> Trace for RefCell<T> {
    fn trace(&self, tracer: &mut Tracer) {
        match self.try_borrow() {
            Ok(inner) => inner.trace(tracer),
            Err(_) => tracer.defer(),
        }
    }
}

impl<T: Trace + Copy> Trace for Cell<T> {
    fn trace(&self, tracer: &mut Tracer) {
        self.get().trace(tracer);
    }
}

macro_rules! trace_nothing {
    ($($ty:ty),*) => {
        $(
            impl Trace for $ty {
                fn trace(&self, _tracer: &mut Tracer) {}
            }
        )*
    };
}

trace_nothing!((), bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char, String);

// ============================================================================
// NativeObject
// ============================================================================

/// Custom enumeration in progress.
pub struct Enumeration {
    /// Iterator state handed back to every
    /// [`enumerate_next`](NativeObject::enumerate_next) call
    pub state: Box<dyn Any>,
    /// Expected number of names, if known
    pub count_hint: Option<usize>,
}

/// Behavior of a host object backing a script object.
///
/// Every hook has a default that leaves engine behavior unchanged. Hooks take
/// `&self`: state that changes keeps itself in `Cell`/`RefCell` fields.
pub trait NativeObject: Trace + 'static {
    /// Class name reported by `Object.prototype.toString`.
    fn class_name(&self) -> &str {
        "Object"
    }

    /// Intercept a property operation. `data` aliases the engine's value
    /// slot: [`Value::assign`] rewrites the value being stored or returned.
    ///
    /// Returning [`Error::CannotDelete`] from a `Delete` aborts the deletion.
    fn property_op(
        &self,
        _cx: &Context,
        _object: &Object,
        _mode: PropertyMode,
        _key: &str,
        _data: &Value,
    ) -> Result<()> {
        Ok(())
    }

    /// Define `key` on `object` lazily. Return true if it was defined.
    fn property_resolve(&self, _cx: &Context, _object: &Object, _key: &str, _flags: ResolveFlags) -> Result<bool> {
        Ok(false)
    }

    /// Begin a custom enumeration. `None` selects the default own keys.
    ///
    /// Only consulted for classes registered with custom enumeration.
    fn enumerate_start(&self, _cx: &Context, _object: &Object) -> Result<Option<Enumeration>> {
        Ok(None)
    }

    /// Next property name, or `undefined` when done.
    fn enumerate_next(&self, _cx: &Context, _object: &Object, _state: &mut dyn Any) -> Result<Value> {
        Ok(Value::undefined())
    }

    /// Calling the object as a function.
    fn self_call(&self, _call: &mut CallContext<'_>) -> Result<()> {
        Err(Error::NotCallable(self.class_name().to_string()))
    }
}

struct NativeCell {
    native: Rc<dyn NativeObject>,
    any: Rc<dyn Any>,
    type_id: TypeId,
    type_name: &'static str,
    custom_enumerate: bool,
    context: RefCell<Weak<ContextInner>>,
}

impl NativeCell {
    fn context(&self, rt: &Runtime) -> std::result::Result<Context, HookFailure> {
        match Context::upgrade(&self.context.borrow()) {
            Some(cx) => Ok(cx),
            None => rt.throw_type_error("native object outlived its context"),
        }
    }
}

impl HostHooks for NativeCell {
    fn trace(&self, tracer: &mut Tracer) {
        self.native.trace(tracer);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn class_name(&self) -> &str {
        self.native.class_name()
    }

    fn property_op(
        &self,
        rt: &Runtime,
        object: ObjectId,
        mode: PropertyMode,
        key: &str,
        data: &ValueSlot,
    ) -> std::result::Result<(), HookFailure> {
        let cx = self.context(rt)?;
        let _current = CurrentContextScope::enter(&cx);
        let object = Object::from_id(&cx, object);
        let data = Value::bound_to(&cx, data.clone());
        self.native
            .property_op(&cx, &object, mode, key, &data)
            .map_err(|e| cx.throw_into_script(e))
    }

    fn resolve(
        &self,
        rt: &Runtime,
        object: ObjectId,
        key: &str,
        flags: ResolveFlags,
    ) -> std::result::Result<bool, HookFailure> {
        let cx = self.context(rt)?;
        let _current = CurrentContextScope::enter(&cx);
        let object = Object::from_id(&cx, object);
        self.native
            .property_resolve(&cx, &object, key, flags)
            .map_err(|e| cx.throw_into_script(e))
    }

    fn enumerate(&self, rt: &Runtime, object: ObjectId) -> std::result::Result<Option<Vec<String>>, HookFailure> {
        if !self.custom_enumerate {
            return Ok(None);
        }
        let cx = self.context(rt)?;
        let _current = CurrentContextScope::enter(&cx);
        let object = Object::from_id(&cx, object);
        let run = || -> Result<Option<Vec<String>>> {
            let Some(mut enumeration) = self.native.enumerate_start(&cx, &object)? else {
                return Ok(None);
            };
            let mut names = Vec::with_capacity(enumeration.count_hint.unwrap_or(0));
            loop {
                let next = self.native.enumerate_next(&cx, &object, enumeration.state.as_mut())?;
                if next.is_undefined() {
                    break;
                }
                names.push(next.to_std_string(&cx)?);
            }
            Ok(Some(names))
        };
        run().map_err(|e| cx.throw_into_script(e))
    }

    fn call(&self, rt: &Runtime, call: HostCall<'_>) -> std::result::Result<(), HookFailure> {
        let cx = self.context(rt)?;
        let _current = CurrentContextScope::enter(&cx);
        let mut call = CallContext::new(&cx, &call);
        self.native.self_call(&mut call).map_err(|e| cx.throw_into_script(e))
    }
}

impl Drop for NativeCell {
    fn drop(&mut self) {
        tracing::trace!(class = self.type_name, "native object finalized");
    }
}

/// A native object on its way to, or bound to, a script object.
///
/// Until [`load_into`](Self::load_into) succeeds the base owns the instance.
/// Afterwards only the script object does. Clones share the same instance and
/// association state.
#[derive(Clone)]
pub struct NativeObjectBase {
    state: Rc<BaseState>,
}

struct BaseState {
    pending: RefCell<Option<Rc<NativeCell>>>,
    type_name: &'static str,
}

impl NativeObjectBase {
    /// Wrap `native`.
    pub fn new<T: NativeObject>(native: T) -> Self {
        let native = Rc::new(native);
        let any: Rc<dyn Any> = native.clone();
        let type_name = std::any::type_name::<T>();
        let cell = NativeCell {
            native,
            any,
            type_id: TypeId::of::<T>(),
            type_name,
            custom_enumerate: false,
            context: RefCell::new(Weak::new()),
        };
        Self {
            state: Rc::new(BaseState {
                pending: RefCell::new(Some(Rc::new(cell))),
                type_name,
            }),
        }
    }

    /// Consult [`NativeObject::enumerate_start`] when scripts enumerate the
    /// object. Has no effect after [`load_into`](Self::load_into).
    pub fn with_custom_enumerate(self, enabled: bool) -> Self {
        if let Some(cell) = self.state.pending.borrow_mut().as_mut().and_then(Rc::get_mut) {
            cell.custom_enumerate = enabled;
        }
        self
    }

    /// Whether [`load_into`](Self::load_into) succeeded.
    pub fn is_associated(&self) -> bool {
        self.state.pending.borrow().is_none()
    }

    /// Associate with `object`. The object takes ownership of the native
    /// instance.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyAssociated`] if this instance was already loaded or
    /// `object` already carries a payload.
    pub fn load_into(&self, cx: &Context, object: &Object) -> Result<()> {
        let id = object.id(cx)?;
        let cell = self.state.pending.borrow_mut().take().ok_or(Error::AlreadyAssociated)?;
        *cell.context.borrow_mut() = cx.downgrade();
        let hooks: Rc<dyn HostHooks> = cell.clone();
        match cx.engine(cx.runtime().attach_host(id, hooks)) {
            Ok(true) => {
                tracing::trace!(class = self.state.type_name, "native object associated");
                Ok(())
            }
            Ok(false) => {
                *self.state.pending.borrow_mut() = Some(cell);
                Err(Error::AlreadyAssociated)
            }
            Err(e) => {
                *self.state.pending.borrow_mut() = Some(cell);
                Err(e)
            }
        }
    }
}

impl fmt::Debug for NativeObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObjectBase")
            .field("type", &self.state.type_name)
            .field("associated", &self.is_associated())
            .finish()
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// A script object together with its native instance of type `T`.
///
/// The handle does not own the instance. Once the collector finalizes the
/// script object, [`instance`](Self::instance) reports a stale handle.
pub struct Native<T: NativeObject> {
    object: Object,
    native: Weak<T>,
}

impl<T: NativeObject> Native<T> {
    /// The script object.
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// The native instance.
    ///
    /// # Errors
    ///
    /// [`Error::EngineState`] once the script object was finalized.
    pub fn instance(&self) -> Result<Rc<T>> {
        self.native
            .upgrade()
            .ok_or_else(|| Error::EngineState("stale handle".into()))
    }

    /// Whether both handles reach the same native instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Weak::ptr_eq(&a.native, &b.native)
    }
}

impl<T: NativeObject> Clone for Native<T> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
            native: self.native.clone(),
        }
    }
}

impl<T: NativeObject> fmt::Debug for Native<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native<{}>({:?})", std::any::type_name::<T>(), self.object.raw())
    }
}

fn with_cell<R>(cx: &Context, object: &Object, f: impl FnOnce(&NativeCell) -> R) -> Result<R> {
    let id = object.id(cx)?;
    let hooks = cx.runtime().host_hooks(id).ok_or(Error::NotNative)?;
    let cell = hooks.as_any().downcast_ref::<NativeCell>().ok_or(Error::NotNative)?;
    Ok(f(cell))
}

pub(crate) fn is_native(cx: &Context, object: &Object) -> bool {
    with_cell(cx, object, |_| ()).is_ok()
}

/// The native instance of type `T` backing `object`.
///
/// # Errors
///
/// [`Error::NotNative`] if the object has no native instance,
/// [`Error::WrongClass`] if the instance has another type.
pub fn get_native<T: NativeObject>(cx: &Context, object: &Object) -> Result<Native<T>> {
    let found = with_cell(cx, object, |cell| {
        if cell.type_id == TypeId::of::<T>() {
            Ok(cell.any.clone())
        } else {
            Err(cell.type_name)
        }
    })?;
    let any = found.map_err(|found| Error::WrongClass {
        expected: std::any::type_name::<T>().to_string(),
        found: found.to_string(),
    })?;
    let native = any.downcast::<T>().map_err(|_| Error::NotNative)?;
    Ok(Native {
        object: object.clone(),
        native: Rc::downgrade(&native),
    })
}
