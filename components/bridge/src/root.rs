//! Persistent and scoped rooting.
//!
//! A [`Root`] keeps one value alive across collections for as long as it
//! exists. A [`LocalRootScope`] roots every value the bridge hands out while
//! it is open and releases them all when it closes. Scopes nest strictly
//! LIFO: an inner scope borrows its outer scope mutably, so closing the
//! outer one first is a compile error.
//!
//! ```compile_fail
//! use bridge::{Context, LocalRootScope};
//!
//! let cx = Context::create().unwrap();
//! let mut outer = LocalRootScope::new(&cx);
//! let inner = outer.nested();
//! drop(outer);
//! drop(inner);
//! ```

use crate::context::{Context, ContextInner};
use crate::error::{Error, Result};
use crate::object::{Array, Function, JsString, Object};
use crate::value::Value;
use memory_manager::{HeapError, RootId, ValueSlot};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Weak;

/// Types whose engine value lives in a slot that can be rooted.
pub trait Rootable: Clone {
    /// The slot holding the engine value.
    fn root_slot(&self) -> &ValueSlot;
}

impl Rootable for Value {
    fn root_slot(&self) -> &ValueSlot {
        self.slot()
    }
}

macro_rules! rootable_view {
    ($($view:ty),*) => {
        $(
            impl Rootable for $view {
                fn root_slot(&self) -> &ValueSlot {
                    self.as_value().slot()
                }
            }
        )*
    };
}

rootable_view!(Object, Function, Array, JsString);

/// A value registered in the collector's root table.
///
/// The entry is removed when the root drops, and only then.
///
/// # Examples
///
/// ```
/// use bridge::{Context, Root};
///
/// let cx = Context::create().unwrap();
/// let object = cx.create_object(None).unwrap();
/// object.set_property(&cx, "kept", 1).unwrap();
/// let root = Root::new(&cx, object).unwrap();
/// cx.gc();
/// assert_eq!(root.get_property(&cx, "kept").unwrap().get_int().unwrap(), 1);
/// ```
pub struct Root<T: Rootable> {
    value: T,
    id: Option<RootId>,
    context: Weak<ContextInner>,
}

impl<T: Rootable> Root<T> {
    /// Root `value`.
    ///
    /// # Errors
    ///
    /// [`Error::EngineState`] if the root table is full.
    pub fn new(cx: &Context, value: T) -> Result<Self> {
        let slot = value.root_slot().clone();
        let id = cx
            .runtime()
            .heap()
            .borrow_mut()
            .add_root(slot)
            .map_err(|e| match e {
                HeapError::RootTableFull(n) => Error::EngineState(format!("root table full ({} entries)", n)),
                other => other.into(),
            })?;
        Ok(Self {
            value,
            id: Some(id),
            context: cx.downgrade(),
        })
    }

    /// The rooted value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Replace the rooted engine value.
    pub fn set(&self, value: &T) {
        self.value.root_slot().set(value.root_slot().get());
    }

    /// Unroot and return a copy of the value.
    pub fn into_inner(mut self) -> T {
        self.release();
        self.value.clone()
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            if let Some(cx) = Context::upgrade(&self.context) {
                cx.release_root(id);
            }
        }
    }
}

impl<T: Rootable> Deref for Root<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Rootable> Drop for Root<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Rootable + fmt::Debug> fmt::Debug for Root<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Root").field(&self.value).finish()
    }
}

/// Roots every value the bridge creates while it is open.
///
/// # Examples
///
/// ```
/// use bridge::{Context, LocalRootScope};
///
/// let cx = Context::create().unwrap();
/// let mut outer = LocalRootScope::new(&cx);
/// let kept = cx.evaluate("({ n: 1 })", "scope.js", 1).unwrap();
/// {
///     let _inner = outer.nested();
///     cx.evaluate("({ n: 2 })", "scope.js", 1).unwrap();
///     cx.gc();
/// }
/// cx.gc();
/// let object = kept.to_object(&cx).unwrap();
/// assert_eq!(object.get_property(&cx, "n").unwrap().get_int().unwrap(), 1);
/// ```
pub struct LocalRootScope<'a> {
    cx: &'a Context,
    mark: usize,
    depth: usize,
    _nested: PhantomData<&'a mut ()>,
}

impl<'a> LocalRootScope<'a> {
    /// Open a scope on `cx`.
    pub fn new(cx: &'a Context) -> Self {
        let depth = cx.scope_depth().get() + 1;
        cx.scope_depth().set(depth);
        let mark = cx.runtime().heap().borrow().scope_root_mark();
        Self {
            cx,
            mark,
            depth,
            _nested: PhantomData,
        }
    }

    /// Open a scope nested in this one. This scope cannot be used or closed
    /// until the nested one is.
    pub fn nested(&mut self) -> LocalRootScope<'_> {
        LocalRootScope::new(self.cx)
    }

    /// Root a value that was not created through the bridge while this scope
    /// was open (a clone, or a value from an outer scope).
    pub fn root(&self, value: &Value) {
        self.cx.track(value);
    }

    /// Nesting depth, 1 for an outermost scope.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for LocalRootScope<'_> {
    fn drop(&mut self) {
        let current = self.cx.scope_depth().get();
        if current != self.depth {
            tracing::error!(
                expected = self.depth,
                found = current,
                "local root scope closed out of order"
            );
        }
        self.cx.scope_depth().set(self.depth - 1);
        match self.cx.runtime().heap().try_borrow_mut() {
            Ok(mut heap) => heap.truncate_scope_roots(self.mark),
            Err(_) => tracing::warn!("local root scope closed while the heap is busy"),
        }
    }
}
