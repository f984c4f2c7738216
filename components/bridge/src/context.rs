//! Contexts.
//!
//! A [`Context`] owns one engine [`Runtime`] together with the host-side
//! registries: class prototypes and constructors keyed by class id, and the
//! exports of loaded extensions. All of them are held through the context's
//! own persistent roots.
//!
//! Every bridge operation takes `&Context` explicitly. The thread-local
//! "current context" only serves code that has no context in hand
//! ([`Context::current`]); entry points set it for their duration with a
//! [`CurrentContextScope`].

use crate::error::{Error, Result, ScriptException};
use crate::native_function::NativeFunctionBase;
use crate::native_object::{NativeObject, NativeObjectBase};
use crate::object::{Array, Function, JsString, Object};
use crate::root::Root;
use crate::value::Value;
use core_types::{ErrorKind, Value as RawValue};
use interpreter::{Abrupt, EvalResult, HookFailure, Runtime};
use memory_manager::{GcStats, HeapConfig, RootId};
use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::{Rc, Weak};

thread_local! {
    static CURRENT: RefCell<Option<Weak<ContextInner>>> = const { RefCell::new(None) };
}

/// Options for [`Context::with_options`].
///
/// # Examples
///
/// ```
/// use bridge::{Context, ContextOptions};
/// use memory_manager::HeapConfig;
///
/// let options = ContextOptions::default()
///     .with_heap(HeapConfig::default().with_gc_threshold(256))
///     .without_gc_function();
/// let cx = Context::with_options(options).unwrap();
/// let kind = cx.evaluate("typeof gc", "options.js", 1).unwrap();
/// assert_eq!(kind.to_std_string(&cx).unwrap(), "undefined");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    /// Heap tuning
    pub heap: HeapConfig,
    /// Define the global script function `gc(maybe)`
    pub install_gc_function: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            heap: HeapConfig::default(),
            install_gc_function: true,
        }
    }
}

impl ContextOptions {
    /// Replace the heap configuration.
    pub fn with_heap(mut self, heap: HeapConfig) -> Self {
        self.heap = heap;
        self
    }

    /// Do not define the global `gc` function.
    pub fn without_gc_function(mut self) -> Self {
        self.install_gc_function = false;
        self
    }
}

pub(crate) struct ContextInner {
    runtime: Runtime,
    prototypes: RefCell<HashMap<String, Root<Object>>>,
    constructors: RefCell<HashMap<String, Root<Function>>>,
    class_ids: RefCell<HashMap<TypeId, (String, bool)>>,
    extensions: RefCell<HashMap<String, Root<Object>>>,
    scope_depth: Cell<usize>,
    pending_unroots: RefCell<Vec<RootId>>,
    destroyed: Cell<bool>,
}

/// Handle to an engine instance and its registries.
///
/// Cloning is cheap and yields another handle to the same context. A
/// context is `!Send`: it lives on the thread that created it.
///
/// ```compile_fail
/// use bridge::Context;
///
/// let cx = Context::create().unwrap();
/// std::thread::spawn(move || cx.evaluate("1", "moved.js", 1));
/// ```
///
/// # Examples
///
/// ```
/// use bridge::Context;
///
/// let cx = Context::create().unwrap();
/// let answer = cx.evaluate("6 * 7", "example.js", 1).unwrap();
/// assert_eq!(answer.get_int().unwrap(), 42);
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("destroyed", &self.inner.destroyed.get())
            .field("scope_depth", &self.inner.scope_depth.get())
            .finish()
    }
}

impl Context {
    /// Create a context with default options.
    pub fn create() -> Result<Self> {
        Self::with_options(ContextOptions::default())
    }

    /// Create a context.
    ///
    /// # Errors
    ///
    /// [`Error::EngineState`] if the root table is too small for the realm.
    pub fn with_options(options: ContextOptions) -> Result<Self> {
        let runtime = Runtime::new(options.heap)?;
        if options.install_gc_function {
            runtime.install_gc_function()?;
        }
        tracing::debug!(gc_function = options.install_gc_function, "context created");
        Ok(Self {
            inner: Rc::new(ContextInner {
                runtime,
                prototypes: RefCell::new(HashMap::new()),
                constructors: RefCell::new(HashMap::new()),
                class_ids: RefCell::new(HashMap::new()),
                extensions: RefCell::new(HashMap::new()),
                scope_depth: Cell::new(0),
                pending_unroots: RefCell::new(Vec::new()),
                destroyed: Cell::new(false),
            }),
        })
    }

    /// The engine this context drives.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Whether two handles name the same context.
    pub fn ptr_eq(a: &Context, b: &Context) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<ContextInner>) -> Option<Context> {
        weak.upgrade().map(|inner| Context { inner })
    }

    // ------------------------------------------------------------------
    // Entry
    // ------------------------------------------------------------------

    /// Fail once the context was destroyed.
    pub(crate) fn check_usable(&self) -> Result<()> {
        if self.inner.destroyed.get() {
            return Err(Error::EngineState("context has been destroyed".into()));
        }
        Ok(())
    }

    /// Check usability, release deferred roots and make this context current
    /// until the returned guard drops.
    pub(crate) fn enter(&self) -> Result<CurrentContextScope> {
        self.check_usable()?;
        self.flush_unroots();
        Ok(CurrentContextScope::enter(self))
    }

    /// The context current on this thread, if any.
    pub fn current() -> Option<Context> {
        CURRENT
            .try_with(|current| current.borrow().as_ref().and_then(Context::upgrade))
            .ok()
            .flatten()
    }

    /// Whether this context is the current one on this thread.
    pub fn is_current(&self) -> bool {
        CURRENT
            .try_with(|current| {
                current
                    .borrow()
                    .as_ref()
                    .is_some_and(|weak| weak.ptr_eq(&self.downgrade()))
            })
            .unwrap_or(false)
    }

    /// Release the registries and refuse further entry. Values and roots
    /// still held by the host stay readable until dropped.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        let prototypes = std::mem::take(&mut *self.inner.prototypes.borrow_mut());
        let constructors = std::mem::take(&mut *self.inner.constructors.borrow_mut());
        let extensions = std::mem::take(&mut *self.inner.extensions.borrow_mut());
        self.inner.class_ids.borrow_mut().clear();
        drop((prototypes, constructors, extensions));
        if self.is_current() {
            let _ = CURRENT.try_with(|current| current.borrow_mut().take());
        }
        tracing::debug!("context destroyed");
    }

    /// Whether [`destroy`](Self::destroy) was called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// The global object.
    pub fn global(&self) -> Object {
        Object::from_id(self, self.runtime().global())
    }

    /// Evaluate `source` in the global scope. `line` numbers the first line.
    ///
    /// # Errors
    ///
    /// [`Error::Script`] for an uncaught throw, [`Error::Quit`] if a native
    /// function terminated the script.
    pub fn evaluate(&self, source: &str, file: &str, line: u32) -> Result<Value> {
        let _current = self.enter()?;
        let raw = self.engine(self.runtime().evaluate(source, file, line))?;
        Ok(self.value(raw))
    }

    /// Evaluate `source` with `scope` as variable object and `this`.
    pub fn evaluate_in_scope(&self, source: &str, file: &str, line: u32, scope: &Object) -> Result<Value> {
        let _current = self.enter()?;
        let scope = scope.id(self)?;
        let raw = self.engine(self.runtime().evaluate_in_scope(source, file, line, scope))?;
        Ok(self.value(raw))
    }

    /// Read and evaluate a script file. A leading `#!` line is skipped
    /// without shifting line numbers.
    pub fn execute(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::EngineState(format!("cannot read {}: {}", path.display(), e)))?;
        let source = match text.strip_prefix("#!") {
            Some(rest) => rest.find('\n').map(|i| &rest[i..]).unwrap_or_default(),
            None => text.as_str(),
        };
        tracing::debug!(path = %path.display(), "executing script file");
        self.evaluate(source, &path.display().to_string(), 1)
    }

    // ------------------------------------------------------------------
    // Garbage collection
    // ------------------------------------------------------------------

    /// Force a collection. Returns the number of freed slots.
    pub fn gc(&self) -> usize {
        self.flush_unroots();
        let freed = self.runtime().gc();
        tracing::trace!(freed, "gc cycle");
        freed
    }

    /// Collect if the allocation threshold was crossed.
    pub fn maybe_gc(&self) -> bool {
        self.flush_unroots();
        self.runtime().maybe_gc()
    }

    /// Collector counters.
    pub fn gc_stats(&self) -> GcStats {
        self.runtime().gc_stats()
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a plain object. `None` selects `Object.prototype`.
    pub fn create_object(&self, prototype: Option<&Object>) -> Result<Object> {
        self.check_usable()?;
        let prototype = prototype.map(|p| p.id(self)).transpose()?;
        let id = self.engine(self.runtime().create_object(prototype))?;
        Ok(Object::from_id(self, id))
    }

    /// Create an array of `length` undefined elements.
    pub fn create_array(&self, length: usize) -> Result<Array> {
        self.check_usable()?;
        let id = self.engine(self.runtime().create_array(&vec![RawValue::Undefined; length]))?;
        Ok(Array::from_id(self, id))
    }

    /// Create a string.
    pub fn create_string(&self, s: &str) -> Result<JsString> {
        self.check_usable()?;
        match self.runtime().create_string(s) {
            RawValue::String(id) => Ok(JsString::from_id(self, id)),
            other => Err(Error::EngineState(format!("unexpected string value {:?}", other))),
        }
    }

    /// Compile a script function from parameter names and body source.
    pub fn create_function(&self, name: &str, params: &[&str], body: &str, file: &str, line: u32) -> Result<Function> {
        let _current = self.enter()?;
        let id = self.engine(self.runtime().compile_function(name, params, body, file, line))?;
        Ok(Function::from_id(self, id))
    }

    /// Expose a native function to scripts.
    pub fn create_native_function(&self, function: NativeFunctionBase) -> Result<Function> {
        self.check_usable()?;
        function.load(self)
    }

    /// Create an object backed by `native`. The prototype is the one
    /// registered for `T` by [`load_class`](crate::load_class), or
    /// `Object.prototype`.
    pub fn create_native_object<T: NativeObject>(&self, native: T) -> Result<Object> {
        self.check_usable()?;
        let prototype = self
            .class_id_of(TypeId::of::<T>())
            .and_then(|class_id| self.prototype(&class_id));
        let object = self.create_object(prototype.as_ref())?;
        NativeObjectBase::new(native)
            .with_custom_enumerate(self.class_enumerates(TypeId::of::<T>()))
            .load_into(self, &object)?;
        Ok(object)
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    /// Register the prototype of class `class_id`.
    pub fn add_prototype(&self, class_id: &str, prototype: &Object) -> Result<()> {
        let root = Root::new(self, prototype.clone())?;
        self.inner.prototypes.borrow_mut().insert(class_id.to_string(), root);
        Ok(())
    }

    /// Registered prototype of class `class_id`.
    pub fn prototype(&self, class_id: &str) -> Option<Object> {
        let raw = self.inner.prototypes.borrow().get(class_id).map(|p| p.raw())?;
        raw.as_object().map(|id| Object::from_id(self, id))
    }

    /// Register the constructor of class `class_id`.
    pub fn add_constructor(&self, class_id: &str, constructor: &Function) -> Result<()> {
        let root = Root::new(self, constructor.clone())?;
        self.inner.constructors.borrow_mut().insert(class_id.to_string(), root);
        Ok(())
    }

    /// Registered constructor of class `class_id`.
    pub fn constructor(&self, class_id: &str) -> Option<Function> {
        let raw = self.inner.constructors.borrow().get(class_id).map(|c| c.raw())?;
        raw.as_object().map(|id| Function::from_id(self, id))
    }

    pub(crate) fn register_class_type(&self, type_id: TypeId, class_id: &str, custom_enumerate: bool) {
        self.inner
            .class_ids
            .borrow_mut()
            .insert(type_id, (class_id.to_string(), custom_enumerate));
    }

    pub(crate) fn class_id_of(&self, type_id: TypeId) -> Option<String> {
        self.inner.class_ids.borrow().get(&type_id).map(|(id, _)| id.clone())
    }

    pub(crate) fn class_enumerates(&self, type_id: TypeId) -> bool {
        self.inner
            .class_ids
            .borrow()
            .get(&type_id)
            .is_some_and(|(_, custom)| *custom)
    }

    pub(crate) fn cached_extension(&self, name: &str) -> Option<Object> {
        let raw = self.inner.extensions.borrow().get(name).map(|e| e.raw())?;
        raw.as_object().map(|id| Object::from_id(self, id))
    }

    pub(crate) fn cache_extension(&self, name: &str, exports: Root<Object>) {
        self.inner.extensions.borrow_mut().insert(name.to_string(), exports);
    }

    // ------------------------------------------------------------------
    // Rooting
    // ------------------------------------------------------------------

    /// Wrap an engine value, rooting it in the innermost open
    /// [`LocalRootScope`](crate::LocalRootScope), if any.
    pub(crate) fn value(&self, raw: RawValue) -> Value {
        let value = Value::with_origin(raw, self.downgrade());
        self.track(&value);
        value
    }

    pub(crate) fn track(&self, value: &Value) {
        if self.inner.scope_depth.get() > 0 && value.raw().is_gc_thing() {
            self.runtime().heap().borrow_mut().push_scope_slot(value.slot().clone());
        }
    }

    pub(crate) fn scope_depth(&self) -> &Cell<usize> {
        &self.inner.scope_depth
    }

    /// Fail with "stale handle" if `raw` refers to a collected slot.
    pub(crate) fn check(&self, raw: RawValue) -> Result<()> {
        self.runtime()
            .heap()
            .borrow()
            .check_value(raw)
            .map_err(|_| Error::EngineState("stale handle".into()))
    }

    /// Keep intermediate values alive until the guard drops.
    pub(crate) fn temp_roots(&self) -> TempRoots<'_> {
        TempRoots {
            cx: self,
            mark: self.runtime().heap().borrow().local_root_mark(),
        }
    }

    pub(crate) fn release_root(&self, id: RootId) {
        match self.runtime().heap().try_borrow_mut() {
            Ok(mut heap) => {
                heap.remove_root(id);
            }
            Err(_) => {
                tracing::warn!(root = id.index(), "root released while the heap is busy; deferring");
                self.inner.pending_unroots.borrow_mut().push(id);
            }
        }
    }

    fn flush_unroots(&self) {
        let pending = std::mem::take(&mut *self.inner.pending_unroots.borrow_mut());
        if pending.is_empty() {
            return;
        }
        let mut heap = self.runtime().heap().borrow_mut();
        for id in pending {
            heap.remove_root(id);
        }
    }

    // ------------------------------------------------------------------
    // Errors across the boundary
    // ------------------------------------------------------------------

    /// Turn a host error into the engine's pending exception.
    pub(crate) fn throw_into_script(&self, error: Error) -> HookFailure {
        let rt = self.runtime();
        let value = match &error {
            Error::Quit => return HookFailure::Quit,
            Error::Script(exception) => exception.value().raw(),
            Error::Type(message) => rt.create_error(ErrorKind::TypeError, message),
            Error::Range(message) => rt.create_error(ErrorKind::RangeError, message),
            other => rt.make_named_error(other.kind_name(), &other.script_message()),
        };
        rt.set_pending_exception(value);
        HookFailure::Exception
    }

    /// Turn an engine failure into a host error.
    pub(crate) fn error_from_abrupt(&self, abrupt: Abrupt) -> Error {
        match abrupt {
            Abrupt::Quit => Error::Quit,
            Abrupt::Engine(e) => e.into(),
            Abrupt::Throw(raw) => {
                let report = self.runtime().error_report(raw);
                match Root::new(self, Value::with_origin(raw, self.downgrade())) {
                    Ok(value) => Error::Script(ScriptException::new(value, report.message, report.file, report.line)),
                    Err(e) => e,
                }
            }
        }
    }

    pub(crate) fn engine<T>(&self, result: EvalResult<T>) -> Result<T> {
        result.map_err(|abrupt| self.error_from_abrupt(abrupt))
    }
}

/// Local roots pushed by bridge internals, popped on drop.
pub(crate) struct TempRoots<'a> {
    cx: &'a Context,
    mark: usize,
}

impl TempRoots<'_> {
    pub(crate) fn hold(&self, value: &Value) {
        if value.raw().is_gc_thing() {
            self.cx
                .runtime()
                .heap()
                .borrow_mut()
                .push_local_slot(value.slot().clone());
        }
    }
}

impl Drop for TempRoots<'_> {
    fn drop(&mut self) {
        if let Ok(mut heap) = self.cx.runtime().heap().try_borrow_mut() {
            heap.truncate_local_roots(self.mark);
        }
    }
}

/// Makes a context current on this thread for its lifetime.
///
/// Leaving restores the previously current context, but only if the context
/// being left is still the current one.
///
/// # Examples
///
/// ```
/// use bridge::{Context, CurrentContextScope};
///
/// let a = Context::create().unwrap();
/// let b = Context::create().unwrap();
/// {
///     let _outer = CurrentContextScope::enter(&a);
///     {
///         let _inner = CurrentContextScope::enter(&b);
///         assert!(b.is_current());
///     }
///     assert!(a.is_current());
/// }
/// assert!(Context::current().is_none());
/// ```
pub struct CurrentContextScope {
    context: Weak<ContextInner>,
    previous: Option<Weak<ContextInner>>,
}

impl CurrentContextScope {
    /// Make `cx` current, remembering the previous context.
    pub fn enter(cx: &Context) -> Self {
        let context = cx.downgrade();
        let previous = CURRENT
            .try_with(|current| current.replace(Some(context.clone())))
            .ok()
            .flatten();
        Self { context, previous }
    }
}

impl Drop for CurrentContextScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = CURRENT.try_with(|current| {
            let mut current = current.borrow_mut();
            let still_ours = current.as_ref().is_some_and(|weak| weak.ptr_eq(&self.context));
            if still_ours {
                *current = previous;
            }
        });
    }
}
