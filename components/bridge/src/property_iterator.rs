//! Iteration over an object's enumerable property names.

use crate::context::Context;
use crate::error::Result;
use crate::object::Object;
use crate::root::Root;
use std::collections::VecDeque;

/// Forward iterator over the own enumerable property names of an object,
/// in `for-in` order.
///
/// The names are listed when the iterator is created, through the object's
/// custom enumeration if it has one. A name whose own property has been
/// deleted by the time it is reached is skipped; properties added later are
/// not visited.
///
/// # Examples
///
/// ```
/// use bridge::Context;
///
/// let cx = Context::create().unwrap();
/// let object = cx.evaluate("({ b: 1, a: 2 })", "iter.js", 1).unwrap().to_object(&cx).unwrap();
/// let names: Vec<String> = object.properties(&cx).unwrap().collect();
/// assert_eq!(names, ["b", "a"]);
/// ```
pub struct PropertyIterator {
    cx: Context,
    object: Root<Object>,
    names: VecDeque<(String, bool)>,
}

impl PropertyIterator {
    pub(crate) fn new(cx: &Context, object: &Object) -> Result<Self> {
        let id = object.id(cx)?;
        // Enumeration and resolve hooks may allocate.
        let object = Root::new(cx, object.clone())?;
        let listed = {
            let _current = cx.enter()?;
            cx.engine(cx.runtime().own_keys(id))?
        };
        let mut names = VecDeque::with_capacity(listed.len());
        for name in listed {
            let own = object.has_own_property(cx, &name)?;
            names.push_back((name, own));
        }
        Ok(Self {
            cx: cx.clone(),
            object,
            names,
        })
    }

    /// Names not yet visited, including ones that may since have been
    /// deleted.
    pub fn remaining(&self) -> usize {
        self.names.len()
    }
}

impl Iterator for PropertyIterator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some((name, own)) = self.names.pop_front() {
            if !own {
                return Some(name);
            }
            match self.object.has_own_property(&self.cx, &name) {
                Ok(true) => return Some(name),
                Ok(false) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "property iteration stopped");
                    self.names.clear();
                    return None;
                }
            }
        }
        None
    }
}
