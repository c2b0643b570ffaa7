//! Static type descriptions for translatable types
//!
//! Rust has no runtime reflection, so the facts override resolution needs —
//! a type's base type and the properties declared directly on it — are
//! supplied as `&'static TypeInfo` records, one per participating type,
//! linked through their `base` fields. The `Entity` trait is the single
//! hook a type implements to join in.

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use log::trace;
use once_cell::sync::Lazy;

/// Description of one translatable type.
///
/// Declared as a `static` next to the type it describes:
///
/// ```ignore
/// static EMPLOYEE_INFO: TypeInfo = TypeInfo {
///     name: "Employee",
///     type_id: TypeId::of::<Employee>,
///     base: None,
///     declared: &["first_name", "last_name", "full_name"],
///     init: Some(Employee::register_translations),
/// };
/// ```
pub struct TypeInfo {
    /// Type name, for diagnostics.
    pub name: &'static str,

    /// `TypeId::of::<T>` for the described type. A function pointer because
    /// `TypeId::of` cannot run in a `static` initializer.
    pub type_id: fn() -> TypeId,

    /// The declared base type, if any. Ancestry walks follow this chain
    /// until it ends.
    pub base: Option<&'static TypeInfo>,

    /// Names of the properties declared directly on this type — not the
    /// ones it inherits. Override resolution consults a level only for the
    /// names listed here.
    pub declared: &'static [&'static str],

    /// One-time initialization hook, run before the first lookup that
    /// touches this type. Registrations conventionally live here, next to
    /// the statics that hold the returned definitions.
    pub init: Option<fn()>,
}

impl TypeInfo {
    pub fn id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Is `property` declared directly on this type?
    pub fn declares(&self, property: &str) -> bool {
        self.declared.contains(&property)
    }

    /// This type, then its base, then the base's base, until the chain ends.
    pub fn ancestry(&'static self) -> Ancestry {
        Ancestry(Some(self))
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a type and its ancestors, most specific first.
pub struct Ancestry(Option<&'static TypeInfo>);

impl Iterator for Ancestry {
    type Item = &'static TypeInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.0?;
        self.0 = current.base;
        Some(current)
    }
}

/// A type that participates in translation.
pub trait Entity: 'static {
    fn type_info() -> &'static TypeInfo;
}

static INITIALIZED: Lazy<Mutex<HashSet<TypeId>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Run a type's one-time initialization hook if it has not run yet.
///
/// Lookups call this for every type they touch, so registrations expressed
/// as lazily-initialized statics are in place before the table is searched.
/// The hook runs under the tracker's lock: a concurrent first use of the
/// same type blocks until the hook finishes, and a hook must therefore not
/// perform lookups of its own.
pub fn ensure_initialized(info: &'static TypeInfo) {
    let Some(init) = info.init else { return };
    let mut done = INITIALIZED.lock().expect("type initialization tracker poisoned");
    if done.insert(info.id()) {
        trace!("initializing type {}", info.name);
        init();
    }
}
