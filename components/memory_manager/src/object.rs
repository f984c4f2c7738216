//! Object layout stored in heap slots.
//!
//! An object is a class tag, an optional prototype, an insertion-ordered
//! property map and an optional host payload (the "private slot"). Arrays
//! keep their indexed elements in a dense vector next to the named
//! properties.

use crate::gc::Tracer;
use bitflags::bitflags;
use core_types::{ObjectId, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

bitflags! {
    /// Attributes of a property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u8 {
        /// Skipped by enumeration
        const DONT_ENUMERATE = 1;
        /// Assignment is silently ignored
        const READ_ONLY = 2;
        /// Deletion fails
        const PERMANENT = 4;
        /// The property has no storage of its own; reads go through the getter
        const SHARED = 8;
    }
}

/// Identifier of compiled function code owned by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeId(pub u32);

/// What happens when a function object is invoked.
#[derive(Debug, Clone, PartialEq)]
pub enum Callable {
    /// Script function closing over an environment object
    Script {
        /// Compiled body
        code: CodeId,
        /// Environment the function was created in
        scope: ObjectId,
    },
    /// Built-in function, indexed into the runtime's intrinsic table
    Intrinsic(u32),
    /// Implemented by the object's host payload
    Host,
}

/// Class tag of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectClass {
    /// Plain object
    Ordinary,
    /// Array with dense indexed storage
    Array(Vec<Value>),
    /// Callable object
    Function(Callable),
    /// Error instance
    Error,
    /// Variable environment; `outer` is the enclosing environment
    Environment {
        /// Enclosing environment, `None` for the outermost one
        outer: Option<ObjectId>,
    },
}

/// Storage of a property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertySlot {
    /// Plain value
    Data(Value),
    /// Getter/setter pair
    Accessor {
        /// Called on read
        getter: Option<ObjectId>,
        /// Called on write
        setter: Option<ObjectId>,
    },
}

/// A named property: storage plus attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Property {
    /// Value or accessor pair
    pub slot: PropertySlot,
    /// Attributes
    pub flags: PropertyFlags,
}

impl Property {
    /// Data property with the given attributes.
    pub fn data(value: Value, flags: PropertyFlags) -> Self {
        Self {
            slot: PropertySlot::Data(value),
            flags,
        }
    }

    /// Writable, enumerable, deletable data property.
    pub fn plain(value: Value) -> Self {
        Self::data(value, PropertyFlags::empty())
    }

    /// Stored value of a data property.
    pub fn value(&self) -> Option<Value> {
        match self.slot {
            PropertySlot::Data(v) => Some(v),
            PropertySlot::Accessor { .. } => None,
        }
    }

    /// Whether enumeration reports this property.
    pub fn is_enumerable(&self) -> bool {
        !self.flags.contains(PropertyFlags::DONT_ENUMERATE)
    }
}

/// Host payload attached to an object's private slot.
///
/// The collector calls [`HostObject::trace`] during the mark phase. The
/// implementation must report every heap value the payload holds that is not
/// otherwise reachable, and must not touch the heap while doing so. When the
/// payload's state cannot be inspected right now it calls
/// [`Tracer::defer`], and the cycle frees nothing.
pub trait HostObject: Any {
    /// Report heap references held by the payload.
    fn trace(&self, tracer: &mut Tracer);

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

/// Data of a heap object.
pub struct ObjectData {
    /// Class tag
    pub class: ObjectClass,
    /// Prototype link
    pub prototype: Option<ObjectId>,
    /// Host payload
    pub host: Option<Rc<dyn HostObject>>,
    properties: HashMap<String, Property>,
    order: Vec<String>,
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectData")
            .field("class", &self.class)
            .field("prototype", &self.prototype)
            .field("host", &self.host.as_ref().map(|_| "..."))
            .field("properties", &self.order)
            .finish()
    }
}

impl ObjectData {
    /// Create an object with no properties.
    ///
    /// # Arguments
    ///
    /// * `class` - Class tag
    /// * `prototype` - Prototype link, `None` for a null prototype
    pub fn new(class: ObjectClass, prototype: Option<ObjectId>) -> Self {
        Self {
            class,
            prototype,
            host: None,
            properties: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Plain object with the given prototype.
    pub fn ordinary(prototype: Option<ObjectId>) -> Self {
        Self::new(ObjectClass::Ordinary, prototype)
    }

    /// Own property by name.
    pub fn get_own(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Mutable own property by name.
    pub fn get_own_mut(&mut self, key: &str) -> Option<&mut Property> {
        self.properties.get_mut(key)
    }

    /// Whether the object has a named own property (array elements excluded).
    pub fn has_own(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Insert or replace a property, keeping first-insertion order.
    pub fn define(&mut self, key: impl Into<String>, property: Property) {
        let key = key.into();
        if !self.properties.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.properties.insert(key, property);
    }

    /// Remove a property, returning it.
    pub fn remove(&mut self, key: &str) -> Option<Property> {
        let removed = self.properties.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    /// Named property keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of named properties.
    pub fn property_count(&self) -> usize {
        self.order.len()
    }

    /// Dense elements, if this is an array.
    pub fn elements(&self) -> Option<&Vec<Value>> {
        match &self.class {
            ObjectClass::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Mutable dense elements, if this is an array.
    pub fn elements_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.class {
            ObjectClass::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Callable behavior, if this is a function.
    pub fn callable(&self) -> Option<&Callable> {
        match &self.class {
            ObjectClass::Function(callable) => Some(callable),
            _ => None,
        }
    }

    /// Whether this is a function object.
    pub fn is_function(&self) -> bool {
        matches!(self.class, ObjectClass::Function(_))
    }

    /// Report everything this object keeps alive.
    pub fn trace(&self, tracer: &mut Tracer) {
        if let Some(proto) = self.prototype {
            tracer.mark_object(proto);
        }
        for property in self.properties.values() {
            match property.slot {
                PropertySlot::Data(v) => tracer.mark_value(v),
                PropertySlot::Accessor { getter, setter } => {
                    if let Some(g) = getter {
                        tracer.mark_object(g);
                    }
                    if let Some(s) = setter {
                        tracer.mark_object(s);
                    }
                }
            }
        }
        match &self.class {
            ObjectClass::Array(elements) => {
                for v in elements {
                    tracer.mark_value(*v);
                }
            }
            ObjectClass::Function(Callable::Script { scope, .. }) => tracer.mark_object(*scope),
            ObjectClass::Environment { outer: Some(outer) } => tracer.mark_object(*outer),
            _ => {}
        }
        if let Some(host) = &self.host {
            host.trace(tracer);
        }
    }
}
