//! Host functions callable from script.
//!
//! A [`NativeFunctionBase`] pairs an implementation with the `name` and
//! `length` scripts see. The implementation either works on the raw
//! [`CallContext`] or is an ordinary Rust function whose parameters and
//! return value go through the conversion traits:
//!
//! ```
//! use bridge::{Context, NativeFunctionBase};
//!
//! fn add(_cx: &Context, a: f64, b: f64) -> f64 {
//!     a + b
//! }
//!
//! let cx = Context::create().unwrap();
//! let function = NativeFunctionBase::adapt("add", add);
//! assert_eq!(function.arity(), 2);
//! let add = cx.create_native_function(function).unwrap();
//! cx.global().set_property(&cx, "add", &add).unwrap();
//! let sum = cx.evaluate("add(40, 2) + add.length", "add.js", 1).unwrap();
//! assert_eq!(sum.get_int().unwrap(), 44);
//! ```

use crate::call_context::CallContext;
use crate::context::{Context, ContextInner, CurrentContextScope};
use crate::convert::{FromScript, ToScript};
use crate::error::Result;
use crate::native_object::{Native, NativeObject};
use crate::object::{Array, Function, JsString, Object};
use crate::value::Value;
use interpreter::{HookFailure, HostCall, HostHooks, Runtime};
use memory_manager::Tracer;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

/// Implementation of a host function.
pub trait NativeFunction: 'static {
    /// Run one call. Leave the result in [`CallContext::result`].
    fn call(&self, call: &mut CallContext<'_>) -> Result<()>;

    /// Mark script values held by the implementation.
    fn trace(&self, _tracer: &mut Tracer) {}
}

struct Closure<F>(F);

impl<F> NativeFunction for Closure<F>
where
    F: Fn(&mut CallContext<'_>) -> Result<()> + 'static,
{
    fn call(&self, call: &mut CallContext<'_>) -> Result<()> {
        (self.0)(call)
    }
}

/// A host function with its script-visible name and arity.
pub struct NativeFunctionBase {
    arity: u32,
    name: String,
    function: Box<dyn NativeFunction>,
}

impl NativeFunctionBase {
    /// A function working on the raw call record.
    ///
    /// # Examples
    ///
    /// ```
    /// use bridge::{Context, NativeFunctionBase, Value};
    ///
    /// let cx = Context::create().unwrap();
    /// let count = NativeFunctionBase::new(0, "count", |call| {
    ///     call.set_result(&Value::from_int(call.arguments().len() as i32));
    ///     Ok(())
    /// });
    /// let count = cx.create_native_function(count).unwrap();
    /// cx.global().set_property(&cx, "count", &count).unwrap();
    /// assert_eq!(cx.evaluate("count(1, 2, 3)", "count.js", 1).unwrap().get_int().unwrap(), 3);
    /// ```
    pub fn new<F>(arity: u32, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<()> + 'static,
    {
        Self::from_native(arity, name, Closure(f))
    }

    /// A function backed by a [`NativeFunction`] implementation.
    pub fn from_native<N: NativeFunction>(arity: u32, name: impl Into<String>, native: N) -> Self {
        Self {
            arity,
            name: name.into(),
            function: Box::new(native),
        }
    }

    /// Adapt a typed Rust function. The arity is its number of script
    /// parameters.
    pub fn adapt<F, Args>(name: impl Into<String>, f: F) -> Self
    where
        F: IntoNativeFn<Args>,
        Args: 'static,
    {
        Self::from_native(
            F::ARITY,
            name,
            Adapted {
                f,
                _args: PhantomData::<fn() -> Args>,
            },
        )
    }

    /// Declared number of parameters.
    pub fn arity(&self) -> u32 {
        self.arity
    }

    /// Script-visible name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the script function object. The object owns the
    /// implementation from now on.
    pub fn load(self, cx: &Context) -> Result<Function> {
        let cell: Rc<dyn HostHooks> = Rc::new(FunctionCell {
            function: self.function,
            name: self.name.clone(),
            context: cx.downgrade(),
        });
        let id = cx.engine(cx.runtime().create_host_function(&self.name, self.arity, cell))?;
        Ok(Function::from_id(cx, id))
    }
}

impl fmt::Debug for NativeFunctionBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunctionBase")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

struct FunctionCell {
    function: Box<dyn NativeFunction>,
    name: String,
    context: Weak<ContextInner>,
}

impl HostHooks for FunctionCell {
    fn trace(&self, tracer: &mut Tracer) {
        self.function.trace(tracer);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn class_name(&self) -> &str {
        "Function"
    }

    fn call(&self, rt: &Runtime, call: HostCall<'_>) -> std::result::Result<(), HookFailure> {
        let Some(cx) = Context::upgrade(&self.context) else {
            return rt.throw_type_error(&format!("{} outlived its context", self.name));
        };
        let _current = CurrentContextScope::enter(&cx);
        let mut call = CallContext::new(&cx, &call);
        self.function.call(&mut call).map_err(|e| cx.throw_into_script(e))
    }
}

impl Drop for FunctionCell {
    fn drop(&mut self) {
        tracing::trace!(function = %self.name, "native function finalized");
    }
}

// ============================================================================
// Typed adapters
// ============================================================================

/// Values a typed host function may return.
pub trait NativeReturn {
    /// Convert into the call's result.
    fn into_result(self, cx: &Context) -> Result<Value>;
}

impl<T: ToScript> NativeReturn for Result<T> {
    fn into_result(self, cx: &Context) -> Result<Value> {
        self?.to_value(cx)
    }
}

macro_rules! native_return {
    ($($ty:ty),*) => {
        $(
            impl NativeReturn for $ty {
                fn into_result(self, cx: &Context) -> Result<Value> {
                    self.to_value(cx)
                }
            }
        )*
    };
}

native_return!(
    (), bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, &str, Value, Object, Function,
    Array, JsString
);

impl<T: ToScript> NativeReturn for Option<T> {
    fn into_result(self, cx: &Context) -> Result<Value> {
        self.to_value(cx)
    }
}

impl<T: ToScript> NativeReturn for Vec<T> {
    fn into_result(self, cx: &Context) -> Result<Value> {
        self.to_value(cx)
    }
}

impl<T: NativeObject> NativeReturn for Native<T> {
    fn into_result(self, cx: &Context) -> Result<Value> {
        self.to_value(cx)
    }
}

/// A Rust function usable as a host function.
///
/// Implemented for `Fn(&Context, A1, .., An) -> R` with up to six script
/// parameters, and for [`method`] wrappers.
pub trait IntoNativeFn<Args>: 'static {
    /// Number of script parameters.
    const ARITY: u32;

    /// Convert the arguments, call, store the result.
    fn invoke(&self, call: &mut CallContext<'_>) -> Result<()>;
}

struct Adapted<F, Args> {
    f: F,
    _args: PhantomData<fn() -> Args>,
}

impl<F, Args> NativeFunction for Adapted<F, Args>
where
    F: IntoNativeFn<Args>,
    Args: 'static,
{
    fn call(&self, call: &mut CallContext<'_>) -> Result<()> {
        self.f.invoke(call)
    }
}

macro_rules! adapt_fn {
    ($arity:expr; $($arg:ident $var:ident $index:tt),*) => {
        impl<F, R, $($arg,)*> IntoNativeFn<($($arg,)*)> for F
        where
            F: Fn(&Context, $($arg),*) -> R + 'static,
            R: NativeReturn,
            $($arg: FromScript,)*
        {
            const ARITY: u32 = $arity;

            fn invoke(&self, call: &mut CallContext<'_>) -> Result<()> {
                let cx = call.context();
                $( let $var = $arg::from_value(cx, &call.arg($index))?; )*
                let value = (self)(cx, $($var),*).into_result(cx)?;
                call.set_result(&value);
                Ok(())
            }
        }
    };
}

adapt_fn!(0;);
adapt_fn!(1; A1 a1 0);
adapt_fn!(2; A1 a1 0, A2 a2 1);
adapt_fn!(3; A1 a1 0, A2 a2 1, A3 a3 2);
adapt_fn!(4; A1 a1 0, A2 a2 1, A3 a3 2, A4 a4 3);
adapt_fn!(5; A1 a1 0, A2 a2 1, A3 a3 2, A4 a4 3, A5 a5 4);
adapt_fn!(6; A1 a1 0, A2 a2 1, A3 a3 2, A4 a4 3, A5 a5 4, A6 a6 5);

/// Receiver types accepted as the first parameter of a [`method`].
pub trait Receiver: Sized {
    /// Extract the receiver from the call's `this`.
    fn from_this(call: &CallContext<'_>) -> Result<Self>;
}

/// `this` as a generic object.
impl Receiver for Object {
    fn from_this(call: &CallContext<'_>) -> Result<Self> {
        call.this_object()
    }
}

/// `this` cast to its native instance.
impl<T: NativeObject> Receiver for Native<T> {
    fn from_this(call: &CallContext<'_>) -> Result<Self> {
        call.native_this::<T>()
    }
}

/// `this` as is, primitives included.
impl Receiver for Value {
    fn from_this(call: &CallContext<'_>) -> Result<Self> {
        Ok(call.this().clone())
    }
}

/// A function whose first parameter after the context is the receiver.
pub struct Method<F>(F);

/// Argument list marker for [`Method`] adapters.
pub struct MethodArgs<T>(PhantomData<T>);

/// Mark `f` as a method: its first parameter receives `this`.
///
/// # Examples
///
/// ```
/// use bridge::{method, Context, NativeFunctionBase, Object};
///
/// let cx = Context::create().unwrap();
/// let get_x = NativeFunctionBase::adapt("getX", method(|cx: &Context, this: Object| {
///     this.get_property(cx, "x")
/// }));
/// assert_eq!(get_x.arity(), 0);
/// let get_x = cx.create_native_function(get_x).unwrap();
/// cx.global().set_property(&cx, "getX", &get_x).unwrap();
/// let x = cx.evaluate("({ x: 7, getX: getX }).getX()", "method.js", 1).unwrap();
/// assert_eq!(x.get_int().unwrap(), 7);
/// ```
pub fn method<F>(f: F) -> Method<F> {
    Method(f)
}

macro_rules! adapt_method {
    ($arity:expr; $($arg:ident $var:ident $index:tt),*) => {
        impl<F, R, Recv, $($arg,)*> IntoNativeFn<MethodArgs<(Recv, $($arg,)*)>> for Method<F>
        where
            F: Fn(&Context, Recv, $($arg),*) -> R + 'static,
            R: NativeReturn,
            Recv: Receiver,
            $($arg: FromScript,)*
        {
            const ARITY: u32 = $arity;

            fn invoke(&self, call: &mut CallContext<'_>) -> Result<()> {
                let cx = call.context();
                let receiver = Recv::from_this(call)?;
                $( let $var = $arg::from_value(cx, &call.arg($index))?; )*
                let value = (self.0)(cx, receiver, $($var),*).into_result(cx)?;
                call.set_result(&value);
                Ok(())
            }
        }
    };
}

adapt_method!(0;);
adapt_method!(1; A1 a1 0);
adapt_method!(2; A1 a1 0, A2 a2 1);
adapt_method!(3; A1 a1 0, A2 a2 1, A3 a3 2);
adapt_method!(4; A1 a1 0, A2 a2 1, A3 a3 2, A4 a4 3);
adapt_method!(5; A1 a1 0, A2 a2 1, A3 a3 2, A4 a4 3, A5 a5 4);
