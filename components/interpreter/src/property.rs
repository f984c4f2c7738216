//! Property access protocol.
//!
//! Ordinary objects keep named properties in their property map and array
//! objects keep indices and `length` in dense storage. Host-backed objects
//! additionally get their hooks consulted in this order:
//!
//! - get: resolve (if the key is not own) → prototype chain lookup → `Get`
//!   on the holder (or on the receiver when nothing was found)
//! - set: resolve with `ASSIGNING` → `Add` for a new key → `Set` → store
//! - delete: `Delete` with the current value → remove
//! - define: `Add` for a new key → store

use crate::completion::EvalResult;
use crate::hooks::{HostHooks, PropertyMode, ResolveFlags};
use crate::operations::{array_index, to_uint32};
use crate::runtime::Runtime;
use core_types::{ErrorKind, ObjectId, Value};
use memory_manager::{ObjectClass, Property, PropertyFlags, PropertySlot};
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

/// Largest gap an index write may open past the end of a dense array.
const MAX_DENSE_GAP: usize = 1 << 20;

impl Runtime {
    /// Own property, including array elements and `length`.
    pub(crate) fn own_property(&self, object: ObjectId, key: &str) -> EvalResult<Option<Property>> {
        let heap = self.heap.borrow();
        let data = heap.object(object)?;
        if let Some(elements) = data.elements() {
            if key == "length" {
                return Ok(Some(Property::data(
                    Value::from_f64(elements.len() as f64),
                    PropertyFlags::DONT_ENUMERATE | PropertyFlags::PERMANENT,
                )));
            }
            if let Some(index) = array_index(key) {
                return Ok(elements.get(index).map(|v| Property::plain(*v)));
            }
        }
        Ok(data.get_own(key).copied())
    }

    fn prototype_of(&self, object: ObjectId) -> EvalResult<Option<ObjectId>> {
        Ok(self.heap.borrow().object(object)?.prototype)
    }

    /// Own lookup that gives host hooks a chance to materialize the key.
    fn lookup_own(
        &self,
        object: ObjectId,
        key: &str,
        flags: ResolveFlags,
    ) -> EvalResult<Option<Property>> {
        if let Some(found) = self.own_property(object, key)? {
            return Ok(Some(found));
        }
        if let Some(hooks) = self.host_hooks(object) {
            let resolved = hooks
                .resolve(self, object, key, flags)
                .map_err(|f| self.hook_failure(f))?;
            if resolved {
                return self.own_property(object, key);
            }
        }
        Ok(None)
    }

    /// Walk the prototype chain. Returns the holder and the property.
    fn lookup(
        &self,
        object: ObjectId,
        key: &str,
        flags: ResolveFlags,
    ) -> EvalResult<Option<(ObjectId, Property)>> {
        let mut current = Some(object);
        while let Some(id) = current {
            if let Some(found) = self.lookup_own(id, key, flags)? {
                return Ok(Some((id, found)));
            }
            current = self.prototype_of(id)?;
        }
        Ok(None)
    }

    /// Run a property hook with `value` in an in/out cell; returns the cell's final value.
    fn run_property_hook(
        &self,
        hooks: &Rc<dyn HostHooks>,
        object: ObjectId,
        mode: PropertyMode,
        key: &str,
        value: Value,
    ) -> EvalResult {
        let data = Rc::new(Cell::new(value));
        self.heap.borrow_mut().push_local_slot(data.clone());
        hooks
            .property_op(self, object, mode, key, &data)
            .map_err(|f| self.hook_failure(f))?;
        Ok(data.get())
    }

    /// `object[key]` with `receiver` as `this` for getters.
    pub(crate) fn get_property(&self, object: ObjectId, key: &str, receiver: Value) -> EvalResult {
        let found = self.lookup(object, key, ResolveFlags::QUALIFIED)?;
        let (holder, value) = match found {
            Some((holder, property)) => match property.slot {
                PropertySlot::Data(v) => (holder, v),
                PropertySlot::Accessor { getter, .. } => {
                    return match getter {
                        Some(getter) => self.call_function(getter, receiver, &[], false),
                        None => Ok(Value::Undefined),
                    };
                }
            },
            None => (object, Value::Undefined),
        };
        match self.host_hooks(holder) {
            Some(hooks) => self.run_property_hook(&hooks, holder, PropertyMode::Get, key, value),
            None => Ok(value),
        }
    }

    /// Property read on any value. Strings expose `length`, indices and
    /// `String.prototype`; numbers and booleans their prototypes.
    pub(crate) fn get_value_property(&self, base: Value, key: &str) -> EvalResult {
        match base {
            Value::Object(id) => self.get_property(id, key, base),
            Value::String(id) => {
                let units = self.string_units(id)?;
                if key == "length" {
                    return Ok(Value::from_f64(units.len() as f64));
                }
                if let Some(index) = array_index(key) {
                    return Ok(match units.get(index) {
                        Some(unit) => Value::String(self.alloc_string_units(vec![*unit])),
                        None => Value::Undefined,
                    });
                }
                self.get_property(self.realm.string_prototype, key, base)
            }
            Value::Smi(_) | Value::Double(_) => self.get_property(self.realm.number_prototype, key, base),
            Value::Boolean(_) => self.get_property(self.realm.boolean_prototype, key, base),
            Value::Undefined | Value::Null => {
                let text = self.to_source_internal(base);
                self.throw(ErrorKind::TypeError, format!("{} has no properties", text))
            }
        }
    }

    fn set_array_element(&self, object: ObjectId, key: &str, value: Value) -> EvalResult<bool> {
        let is_length = key == "length";
        let index = array_index(key);
        if !is_length && index.is_none() {
            return Ok(false);
        }
        let new_length = if is_length {
            let n = self.to_number_internal(value)?;
            if n != to_uint32(n) as f64 {
                return self.throw(ErrorKind::RangeError, "invalid array length");
            }
            Some(n as usize)
        } else {
            None
        };
        let mut heap = self.heap.borrow_mut();
        let Some(elements) = heap.object_mut(object)?.elements_mut() else {
            return Ok(false);
        };
        match (new_length, index) {
            (Some(length), _) => {
                if length > elements.len() + MAX_DENSE_GAP {
                    drop(heap);
                    return self.throw(ErrorKind::RangeError, "array length too large");
                }
                elements.resize(length, Value::Undefined);
            }
            (None, Some(index)) => {
                if index >= elements.len() + MAX_DENSE_GAP {
                    drop(heap);
                    return self.throw(ErrorKind::RangeError, "array index too large");
                }
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
            }
            (None, None) => return Ok(false),
        }
        Ok(true)
    }

    pub(crate) fn is_array(&self, object: ObjectId) -> EvalResult<bool> {
        Ok(matches!(self.heap.borrow().object(object)?.class, ObjectClass::Array(_)))
    }

    /// `object[key] = value`.
    pub(crate) fn set_property(&self, object: ObjectId, key: &str, value: Value, receiver: Value) -> EvalResult<()> {
        let hooks = self.host_hooks(object);
        let element_key = key == "length" || array_index(key).is_some();
        if element_key && self.is_array(object)? {
            let value = match &hooks {
                Some(hooks) => self.run_property_hook(hooks, object, PropertyMode::Set, key, value)?,
                None => value,
            };
            self.set_array_element(object, key, value)?;
            return Ok(());
        }

        let own = self.lookup_own(object, key, ResolveFlags::QUALIFIED | ResolveFlags::ASSIGNING)?;
        match own {
            Some(property) => match property.slot {
                PropertySlot::Accessor { setter, .. } => {
                    if let Some(setter) = setter {
                        self.call_function(setter, receiver, &[value], false)?;
                    }
                    Ok(())
                }
                PropertySlot::Data(_) => {
                    if property.flags.contains(PropertyFlags::READ_ONLY) {
                        return Ok(());
                    }
                    let value = match &hooks {
                        Some(hooks) => self.run_property_hook(hooks, object, PropertyMode::Set, key, value)?,
                        None => value,
                    };
                    let mut heap = self.heap.borrow_mut();
                    if let Some(slot) = heap.object_mut(object)?.get_own_mut(key) {
                        slot.slot = PropertySlot::Data(value);
                    }
                    Ok(())
                }
            },
            None => {
                let mut current = self.prototype_of(object)?;
                while let Some(id) = current {
                    if let Some(property) = self.own_property(id, key)? {
                        match property.slot {
                            PropertySlot::Accessor { setter, .. } => {
                                if let Some(setter) = setter {
                                    self.call_function(setter, receiver, &[value], false)?;
                                }
                                return Ok(());
                            }
                            PropertySlot::Data(_) if property.flags.contains(PropertyFlags::READ_ONLY) => {
                                return Ok(());
                            }
                            PropertySlot::Data(_) => break,
                        }
                    }
                    current = self.prototype_of(id)?;
                }
                let value = match &hooks {
                    Some(hooks) => {
                        let added = self.run_property_hook(hooks, object, PropertyMode::Add, key, value)?;
                        self.run_property_hook(hooks, object, PropertyMode::Set, key, added)?
                    }
                    None => value,
                };
                self.heap
                    .borrow_mut()
                    .object_mut(object)?
                    .define(key, Property::plain(value));
                Ok(())
            }
        }
    }

    /// Property write on any value. Writes to primitives are dropped.
    pub(crate) fn set_value_property(&self, base: Value, key: &str, value: Value) -> EvalResult<()> {
        match base {
            Value::Object(id) => self.set_property(id, key, value, base),
            Value::Undefined | Value::Null => {
                let text = self.to_source_internal(base);
                self.throw(ErrorKind::TypeError, format!("{} has no properties", text))
            }
            _ => Ok(()),
        }
    }

    /// `delete object[key]`. False if the property is permanent.
    pub(crate) fn delete_property(&self, object: ObjectId, key: &str) -> EvalResult<bool> {
        let current = self.own_property(object, key)?;
        if let Some(property) = current {
            if property.flags.contains(PropertyFlags::PERMANENT) {
                return Ok(false);
            }
        }
        if let Some(hooks) = self.host_hooks(object) {
            let value = current.and_then(|p| p.value()).unwrap_or(Value::Undefined);
            self.run_property_hook(&hooks, object, PropertyMode::Delete, key, value)?;
        }
        let mut heap = self.heap.borrow_mut();
        let data = heap.object_mut(object)?;
        if let (Some(index), Some(elements)) = (array_index(key), data.elements_mut()) {
            if let Some(slot) = elements.get_mut(index) {
                *slot = Value::Undefined;
            }
            return Ok(true);
        }
        data.remove(key);
        Ok(true)
    }

    /// Define an own data property, replacing any existing one.
    pub(crate) fn define_property(
        &self,
        object: ObjectId,
        key: &str,
        value: Value,
        flags: PropertyFlags,
    ) -> EvalResult<()> {
        let is_new = self.own_property(object, key)?.is_none();
        let value = match self.host_hooks(object) {
            Some(hooks) if is_new => self.run_property_hook(&hooks, object, PropertyMode::Add, key, value)?,
            _ => value,
        };
        if self.is_array(object)? && self.set_array_element(object, key, value)? {
            return Ok(());
        }
        self.define_own(object, key, value, flags)?;
        Ok(())
    }

    /// Define a getter and/or setter, merging with an existing accessor pair.
    pub(crate) fn define_accessor_property(
        &self,
        object: ObjectId,
        key: &str,
        getter: Option<ObjectId>,
        setter: Option<ObjectId>,
        flags: PropertyFlags,
    ) -> EvalResult<()> {
        let mut heap = self.heap.borrow_mut();
        let data = heap.object_mut(object)?;
        let (old_getter, old_setter) = match data.get_own(key).map(|p| p.slot) {
            Some(PropertySlot::Accessor { getter, setter }) => (getter, setter),
            _ => (None, None),
        };
        data.define(
            key,
            Property {
                slot: PropertySlot::Accessor {
                    getter: getter.or(old_getter),
                    setter: setter.or(old_setter),
                },
                flags: flags | PropertyFlags::SHARED,
            },
        );
        Ok(())
    }

    /// `key in object`.
    pub(crate) fn has_property(&self, object: ObjectId, key: &str, flags: ResolveFlags) -> EvalResult<bool> {
        Ok(self.lookup(object, key, flags)?.is_some())
    }

    /// Own property test, with lazy resolution.
    pub(crate) fn has_own_property(&self, object: ObjectId, key: &str) -> EvalResult<bool> {
        Ok(self.lookup_own(object, key, ResolveFlags::empty())?.is_some())
    }

    /// Own enumerable keys: the host enumerate hook's list, or array indices
    /// followed by named enumerable properties in insertion order.
    pub(crate) fn own_enumerable_keys(&self, object: ObjectId) -> EvalResult<Vec<String>> {
        if let Some(hooks) = self.host_hooks(object) {
            let listed = hooks.enumerate(self, object).map_err(|f| self.hook_failure(f))?;
            if let Some(keys) = listed {
                return Ok(keys);
            }
        }
        let heap = self.heap.borrow();
        let data = heap.object(object)?;
        let mut keys: Vec<String> = match data.elements() {
            Some(elements) => (0..elements.len()).map(|i| i.to_string()).collect(),
            None => Vec::new(),
        };
        keys.extend(
            data.keys()
                .filter(|k| data.get_own(k).map(Property::is_enumerable).unwrap_or(false))
                .map(str::to_string),
        );
        Ok(keys)
    }

    /// Keys visited by `for (k in object)`: own keys first, then inherited
    /// keys not shadowed by an earlier object.
    pub(crate) fn for_in_keys(&self, object: ObjectId) -> EvalResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut current = Some(object);
        while let Some(id) = current {
            for key in self.own_enumerable_keys(id)? {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            let heap = self.heap.borrow();
            let data = heap.object(id)?;
            seen.extend(data.keys().map(str::to_string));
            current = data.prototype;
        }
        Ok(keys)
    }

    /// `value instanceof constructor`.
    pub(crate) fn instance_of_internal(&self, value: Value, constructor: ObjectId) -> EvalResult<bool> {
        let Value::Object(mut object) = value else {
            return Ok(false);
        };
        let prototype = match self.get_property(constructor, "prototype", Value::Object(constructor))? {
            Value::Object(p) => p,
            _ => {
                return self.throw(
                    ErrorKind::TypeError,
                    "'prototype' property of the right-hand side is not an object",
                )
            }
        };
        while let Some(proto) = self.prototype_of(object)? {
            if proto == prototype {
                return Ok(true);
            }
            object = proto;
        }
        Ok(false)
    }
}
