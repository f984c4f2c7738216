//! Named extensions loaded into a context on demand.
//!
//! An extension is an entry point that fills an `exports` object. Entry
//! points are registered once per process; each context runs an entry point
//! at most once and hands out the same exports object afterwards.
//!
//! # Examples
//!
//! ```
//! use bridge::{load_extension, register_extension, Context, Object, Result};
//!
//! fn answer(exports: &Object, cx: &Context) -> Result<()> {
//!     exports.set_property(cx, "answer", 42)
//! }
//!
//! register_extension("answer", answer);
//! let cx = Context::create().unwrap();
//! let exports = load_extension(&cx, "answer").unwrap();
//! assert_eq!(exports.get_property(&cx, "answer").unwrap().get_int().unwrap(), 42);
//! ```

use crate::context::{Context, CurrentContextScope};
use crate::error::{Error, Result};
use crate::object::Object;
use crate::root::Root;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Entry point of an extension.
pub type ExtensionEntry = fn(&Object, &Context) -> Result<()>;

static EXTENSIONS: RwLock<BTreeMap<String, ExtensionEntry>> = RwLock::new(BTreeMap::new());

/// Make `entry` loadable as `name` in every context. A later registration
/// under the same name replaces the earlier one for contexts that have not
/// loaded it yet.
pub fn register_extension(name: &str, entry: ExtensionEntry) {
    let replaced = EXTENSIONS.write().insert(name.to_string(), entry).is_some();
    tracing::debug!(extension = name, replaced, "extension registered");
}

/// Names of the registered extensions, sorted.
pub fn registered_extensions() -> Vec<String> {
    EXTENSIONS.read().keys().cloned().collect()
}

/// The exports of extension `name` in `cx`, running its entry point on the
/// first load.
///
/// # Errors
///
/// [`Error::EngineState`] if no extension is registered under `name`; any
/// error the entry point returns. A failed load is not cached.
pub fn load_extension(cx: &Context, name: &str) -> Result<Object> {
    if let Some(exports) = cx.cached_extension(name) {
        return Ok(exports);
    }
    let entry = EXTENSIONS
        .read()
        .get(name)
        .copied()
        .ok_or_else(|| Error::EngineState(format!("unknown extension {}", name)))?;
    let exports = Root::new(cx, cx.create_object(None)?)?;
    {
        let _current = CurrentContextScope::enter(cx);
        entry(exports.value(), cx)?;
    }
    let object = exports.value().clone();
    cx.cache_extension(name, exports);
    tracing::debug!(extension = name, "extension loaded");
    Ok(object)
}
