//! The engine runtime.
//!
//! A [`Runtime`] owns the heap, the realm (global object and intrinsic
//! prototypes) and the code of every function literal it has compiled.
//! Everything takes `&self`; mutable state sits behind `RefCell`/`Cell` so
//! that host hooks can re-enter the runtime while a script call is running.
//!
//! # Rooting discipline
//!
//! Values produced while evaluating are pushed on the heap's local root
//! stack and popped at statement boundaries. Public entry points record the
//! stack height on entry and restore it on exit, so a value returned to the
//! embedder is unrooted until the embedder roots it.

use crate::completion::{Abrupt, EvalResult};
use crate::hooks::{HookFailure, HostCell, HostHooks};
use core_types::{ErrorKind, JsError, ObjectId, StringId, Value};
use memory_manager::{
    Callable, CodeId, GcStats, Heap, HeapConfig, HeapError, ObjectClass, ObjectData, Property,
    PropertyFlags,
};
use parser::FunctionNode;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Nesting limit for script calls.
pub const MAX_CALL_DEPTH: usize = 128;

/// Built-in function implementation.
pub type IntrinsicFn = fn(&Runtime, &IntrinsicCall<'_>) -> EvalResult;

/// Arguments of a built-in function call.
pub struct IntrinsicCall<'a> {
    /// The function object being invoked
    pub callee: ObjectId,
    /// Receiver
    pub this: Value,
    /// Positional arguments
    pub args: &'a [Value],
    /// Invoked through `new`
    pub construct: bool,
}

impl IntrinsicCall<'_> {
    /// Argument `index`, or undefined past the end.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).copied().unwrap_or(Value::Undefined)
    }
}

/// Compiled function literal.
pub(crate) struct Code {
    pub(crate) function: Rc<FunctionNode>,
    pub(crate) file: Rc<str>,
    pub(crate) line_offset: u32,
}

/// Source location of the statement being executed.
#[derive(Debug, Clone)]
pub(crate) struct Location {
    pub(crate) file: Rc<str>,
    pub(crate) line_offset: u32,
    pub(crate) line: u32,
}

/// Objects every runtime creates up front. All are persistent roots.
pub(crate) struct Realm {
    pub(crate) global: ObjectId,
    pub(crate) object_prototype: ObjectId,
    pub(crate) function_prototype: ObjectId,
    pub(crate) array_prototype: ObjectId,
    pub(crate) string_prototype: ObjectId,
    pub(crate) number_prototype: ObjectId,
    pub(crate) boolean_prototype: ObjectId,
    pub(crate) error_prototype: ObjectId,
    pub(crate) error_prototypes: HashMap<ErrorKind, ObjectId>,
}

/// Error kinds that get their own constructor.
pub(crate) const ERROR_KINDS: [ErrorKind; 7] = [
    ErrorKind::TypeError,
    ErrorKind::RangeError,
    ErrorKind::ReferenceError,
    ErrorKind::SyntaxError,
    ErrorKind::InternalError,
    ErrorKind::EvalError,
    ErrorKind::URIError,
];

/// Host-visible details of a thrown value.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    /// `name: message` for error objects, the string conversion otherwise
    pub message: String,
    /// `fileName` property, if present
    pub file: Option<String>,
    /// `lineNumber` property, if present
    pub line: Option<u32>,
}

/// The script engine.
///
/// # Examples
///
/// ```
/// use interpreter::Runtime;
/// use core_types::Value;
/// use memory_manager::HeapConfig;
///
/// let rt = Runtime::new(HeapConfig::default()).unwrap();
/// let result = rt.evaluate("var a = [1, 2, 3]; a.length * 2", "example.js", 1).unwrap();
/// assert_eq!(result, Value::Smi(6));
/// ```
pub struct Runtime {
    pub(crate) heap: RefCell<Heap>,
    pub(crate) realm: Realm,
    pub(crate) code: RefCell<Vec<Code>>,
    code_index: RefCell<HashMap<usize, CodeId>>,
    pub(crate) intrinsics: RefCell<Vec<IntrinsicFn>>,
    pending_exception: Rc<Cell<Value>>,
    exception_pending: Cell<bool>,
    pub(crate) location: RefCell<Location>,
    pub(crate) call_depth: Cell<usize>,
}

impl Runtime {
    /// Create a runtime with a fresh heap and realm.
    ///
    /// # Errors
    ///
    /// [`HeapError::RootTableFull`] if the root table cannot hold the realm.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        let mut heap = Heap::new(config);
        let object_prototype = heap.alloc_object(ObjectData::ordinary(None));
        let function_prototype = heap.alloc_object(ObjectData::new(
            ObjectClass::Function(Callable::Intrinsic(0)),
            Some(object_prototype),
        ));
        let array_prototype = heap.alloc_object(ObjectData::new(
            ObjectClass::Array(Vec::new()),
            Some(object_prototype),
        ));
        let string_prototype = heap.alloc_object(ObjectData::ordinary(Some(object_prototype)));
        let number_prototype = heap.alloc_object(ObjectData::ordinary(Some(object_prototype)));
        let boolean_prototype = heap.alloc_object(ObjectData::ordinary(Some(object_prototype)));
        let error_prototype = heap.alloc_object(ObjectData::ordinary(Some(object_prototype)));
        let global = heap.alloc_object(ObjectData::ordinary(Some(object_prototype)));

        let mut error_prototypes = HashMap::new();
        for kind in ERROR_KINDS {
            let proto = heap.alloc_object(ObjectData::ordinary(Some(error_prototype)));
            error_prototypes.insert(kind, proto);
        }

        let mut realm_objects = vec![
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            error_prototype,
            global,
        ];
        realm_objects.extend(error_prototypes.values().copied());
        for id in realm_objects {
            heap.add_root(Rc::new(Cell::new(Value::Object(id))))?;
        }
        let pending_exception = Rc::new(Cell::new(Value::Undefined));
        heap.add_root(pending_exception.clone())?;

        let runtime = Self {
            heap: RefCell::new(heap),
            realm: Realm {
                global,
                object_prototype,
                function_prototype,
                array_prototype,
                string_prototype,
                number_prototype,
                boolean_prototype,
                error_prototype,
                error_prototypes,
            },
            code: RefCell::new(Vec::new()),
            code_index: RefCell::new(HashMap::new()),
            intrinsics: RefCell::new(Vec::new()),
            pending_exception,
            exception_pending: Cell::new(false),
            location: RefCell::new(Location {
                file: Rc::from(""),
                line_offset: 0,
                line: 0,
            }),
            call_depth: Cell::new(0),
        };
        runtime.install_intrinsics()?;
        runtime.heap.borrow_mut().truncate_local_roots(0);
        tracing::debug!(live = runtime.heap.borrow().live_count(), "runtime created");
        Ok(runtime)
    }

    /// The engine heap.
    ///
    /// Embedders use it for persistent and local roots. Do not hold a borrow
    /// across calls back into the runtime.
    pub fn heap(&self) -> &RefCell<Heap> {
        &self.heap
    }

    /// The global object.
    pub fn global(&self) -> ObjectId {
        self.realm.global
    }

    /// `Object.prototype`
    pub fn object_prototype(&self) -> ObjectId {
        self.realm.object_prototype
    }

    /// `Function.prototype`
    pub fn function_prototype(&self) -> ObjectId {
        self.realm.function_prototype
    }

    /// `Array.prototype`
    pub fn array_prototype(&self) -> ObjectId {
        self.realm.array_prototype
    }

    /// Prototype of error objects of `kind`.
    pub fn error_prototype(&self, kind: ErrorKind) -> ObjectId {
        self.realm
            .error_prototypes
            .get(&kind)
            .copied()
            .unwrap_or(self.realm.error_prototype)
    }

    // ------------------------------------------------------------------
    // Local roots
    // ------------------------------------------------------------------

    /// Root `value` until the current statement (or entry point) completes.
    pub fn temp(&self, value: Value) -> Value {
        self.heap.borrow_mut().push_local(value);
        value
    }

    /// Run `f`, then pop every local root it pushed.
    pub(crate) fn scoped<T>(&self, f: impl FnOnce(&Self) -> T) -> T {
        let mark = self.heap.borrow().local_root_mark();
        let result = f(self);
        self.heap.borrow_mut().truncate_local_roots(mark);
        result
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate an object, collecting first if the threshold was crossed.
    /// The new object is rooted as a temporary.
    pub(crate) fn alloc_object(&self, data: ObjectData) -> ObjectId {
        self.maybe_gc();
        let mut heap = self.heap.borrow_mut();
        let id = heap.alloc_object(data);
        heap.push_local(Value::Object(id));
        id
    }

    pub(crate) fn alloc_string_units(&self, units: Vec<u16>) -> StringId {
        self.maybe_gc();
        let mut heap = self.heap.borrow_mut();
        let id = heap.alloc_string(units);
        heap.push_local(Value::String(id));
        id
    }

    pub(crate) fn alloc_string(&self, s: &str) -> Value {
        Value::String(self.alloc_string_units(s.encode_utf16().collect()))
    }

    /// Define a data property directly, bypassing host hooks.
    pub(crate) fn define_own(
        &self,
        object: ObjectId,
        key: &str,
        value: Value,
        flags: PropertyFlags,
    ) -> Result<(), HeapError> {
        self.heap
            .borrow_mut()
            .object_mut(object)?
            .define(key, Property::data(value, flags));
        Ok(())
    }

    /// Hooks attached to `object`, if it is host-backed.
    pub fn host_hooks(&self, object: ObjectId) -> Option<Rc<dyn HostHooks>> {
        let heap = self.heap.borrow();
        let data = heap.object(object).ok()?;
        let cell = data.host.as_ref()?.as_any().downcast_ref::<HostCell>()?;
        Some(cell.hooks().clone())
    }

    // ------------------------------------------------------------------
    // Code table
    // ------------------------------------------------------------------

    /// Code id for a function literal, registering it on first sight.
    pub(crate) fn code_for(&self, function: &Rc<FunctionNode>) -> CodeId {
        let key = Rc::as_ptr(function) as usize;
        if let Some(id) = self.code_index.borrow().get(&key) {
            return *id;
        }
        let location = self.location.borrow().clone();
        let mut code = self.code.borrow_mut();
        let id = CodeId(code.len() as u32);
        code.push(Code {
            function: function.clone(),
            file: location.file,
            line_offset: location.line_offset,
        });
        self.code_index.borrow_mut().insert(key, id);
        id
    }

    // ------------------------------------------------------------------
    // Garbage collection
    // ------------------------------------------------------------------

    /// Run a full collection. Returns the number of freed slots.
    pub fn gc(&self) -> usize {
        let collection = self.heap.borrow_mut().collect();
        let freed = collection.freed;
        if !collection.finalized.is_empty() {
            tracing::debug!(count = collection.finalized.len(), "finalizing host payloads");
        }
        // Payload destructors may re-enter the runtime; the heap is free now.
        drop(collection);
        freed
    }

    /// Collect if enough allocation happened since the last cycle.
    pub fn maybe_gc(&self) -> bool {
        let due = self.heap.borrow().should_collect();
        if due {
            self.gc();
        }
        due
    }

    /// Collector counters.
    pub fn gc_stats(&self) -> GcStats {
        self.heap.borrow().stats().clone()
    }

    // ------------------------------------------------------------------
    // Exceptions
    // ------------------------------------------------------------------

    /// Store the exception a failing hook reports.
    pub fn set_pending_exception(&self, value: Value) {
        self.pending_exception.set(value);
        self.exception_pending.set(true);
    }

    /// Remove and return the pending exception.
    pub fn take_pending_exception(&self) -> Option<Value> {
        let value = self.pending_exception.replace(Value::Undefined);
        self.exception_pending.replace(false).then_some(value)
    }

    /// Whether an exception is pending.
    pub fn has_pending_exception(&self) -> bool {
        self.exception_pending.get()
    }

    /// Set a `TypeError` as the pending exception and fail.
    pub fn throw_type_error<T>(&self, message: &str) -> Result<T, HookFailure> {
        let error = self.make_error(ErrorKind::TypeError, message);
        self.set_pending_exception(error);
        Err(HookFailure::Exception)
    }

    /// Turn a hook failure into an abrupt completion.
    pub(crate) fn hook_failure(&self, failure: HookFailure) -> Abrupt {
        match failure {
            HookFailure::Quit => Abrupt::Quit,
            HookFailure::Exception => match self.take_pending_exception() {
                Some(value) => Abrupt::Throw(self.temp(value)),
                None => Abrupt::Throw(self.make_error(
                    ErrorKind::InternalError,
                    "host hook failed without setting an exception",
                )),
            },
        }
    }

    /// Create an error object of `kind` at the current location.
    pub fn make_error(&self, kind: ErrorKind, message: &str) -> Value {
        self.make_error_with_prototype(self.error_prototype(kind), message)
    }

    /// Create an `Error` object whose own `name` is `name`.
    pub fn make_named_error(&self, name: &str, message: &str) -> Value {
        let error = self.make_error_with_prototype(self.realm.error_prototype, message);
        if let Value::Object(id) = error {
            let name = self.alloc_string(name);
            let _ = self.define_own(id, "name", name, PropertyFlags::DONT_ENUMERATE);
        }
        error
    }

    pub(crate) fn make_error_with_prototype(&self, prototype: ObjectId, message: &str) -> Value {
        let id = self.alloc_object(ObjectData::new(ObjectClass::Error, Some(prototype)));
        let message = self.alloc_string(message);
        let location = self.location.borrow().clone();
        let file = self.alloc_string(&location.file);
        let hidden = PropertyFlags::DONT_ENUMERATE;
        let _ = self.define_own(id, "message", message, hidden);
        let _ = self.define_own(id, "fileName", file, hidden);
        let _ = self.define_own(id, "lineNumber", Value::from_f64(location.line as f64), hidden);
        Value::Object(id)
    }

    /// `Err(Throw(error))` for an error of `kind`.
    pub(crate) fn throw<T>(&self, kind: ErrorKind, message: impl AsRef<str>) -> EvalResult<T> {
        Err(Abrupt::Throw(self.make_error(kind, message.as_ref())))
    }

    /// Convert a parse error into a thrown `SyntaxError`.
    pub(crate) fn syntax_error_from(&self, error: &JsError, file: &str, line_offset: u32) -> Abrupt {
        let saved = self.location.replace(Location {
            file: Rc::from(file),
            line_offset,
            line: error.line().unwrap_or(1) + line_offset,
        });
        let value = self.make_error(ErrorKind::SyntaxError, &error.message);
        *self.location.borrow_mut() = saved;
        Abrupt::Throw(value)
    }

    /// Convert an engine-level failure into a catchable value.
    pub(crate) fn abrupt_to_value(&self, abrupt: Abrupt) -> Result<Value, Abrupt> {
        match abrupt {
            Abrupt::Throw(value) => Ok(value),
            Abrupt::Engine(e) => Ok(self.make_error(ErrorKind::InternalError, &e.to_string())),
            Abrupt::Quit => Err(Abrupt::Quit),
        }
    }

    // ------------------------------------------------------------------
    // Location tracking
    // ------------------------------------------------------------------

    pub(crate) fn set_line(&self, line: u32) {
        let mut location = self.location.borrow_mut();
        location.line = line + location.line_offset;
    }

    /// File and line of the statement being executed.
    pub fn current_location(&self) -> (String, u32) {
        let location = self.location.borrow();
        (location.file.to_string(), location.line)
    }
}
