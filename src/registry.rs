//! Registry mapping (type, property name) to a definition
//!
//! Subtype and ancestor registrations of the same property name coexist
//! under their own keys; `resolve` picks the most specific one by walking
//! the static ancestry chain. A process-wide default map backs the fluent
//! registration surface.

use std::any::TypeId;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use log::{debug, trace};
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::ast::build::TypedExpr;
use crate::ast::expr::{Expr, Lambda};
use crate::definition::{ComputedProperty, Definition};
use crate::eval::EvalError;
use crate::schema::{Entity, TypeInfo, ensure_initialized};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("a translation for `{owner}.{property}` is already registered")]
    Duplicate {
        owner: &'static str,
        property: String,
    },

    #[error("expected a bare property access as the locator, found `{found}`")]
    NotAProperty { found: String },

    #[error("no translation registered for `{owner}.{property}`")]
    NotRegistered {
        owner: &'static str,
        property: String,
    },

    #[error("failed to compile `{owner}.{property}`: {source}")]
    Compile {
        owner: &'static str,
        property: String,
        source: EvalError,
    },
}

type Key = (TypeId, String);

/// Mapping from properties to their registered definitions.
#[derive(Default)]
pub struct TranslationMap {
    entries: RwLock<IndexMap<Key, Arc<dyn Definition>>>,
}

static DEFAULT_MAP: Lazy<TranslationMap> = Lazy::new(TranslationMap::new);

/// The process-wide default map, used by the fluent registration surface
/// and by [`crate::expand`]. Lives for the life of the process.
pub fn default_map() -> &'static TranslationMap {
    &DEFAULT_MAP
}

impl TranslationMap {
    pub fn new() -> Self {
        TranslationMap {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Register a definition for the property named by `locator`.
    ///
    /// The locator must be a bare property access on its own parameter;
    /// the key's type is the locator parameter's static type, so a subtype
    /// naming an inherited property gets its own entry.
    pub fn define<T, R, L, B>(
        &self,
        locator: L,
        body: B,
    ) -> Result<Arc<ComputedProperty<T, R>>, RegistryError>
    where
        T: Entity,
        R: 'static,
        L: FnOnce(TypedExpr<T>) -> TypedExpr<R>,
        B: FnOnce(TypedExpr<T>) -> TypedExpr<R>,
    {
        let locator = Lambda::new::<T, R, L>(locator);
        let name = match locator.body() {
            Expr::Property { target, name, .. } if **target == Expr::Param(locator.param()) => {
                name.clone()
            }
            other => {
                return Err(RegistryError::NotAProperty {
                    found: other.to_string(),
                });
            }
        };
        self.define_property(&name, body)
    }

    /// Register a definition under an explicit property name.
    pub fn define_property<T, R, B>(
        &self,
        property: &str,
        body: B,
    ) -> Result<Arc<ComputedProperty<T, R>>, RegistryError>
    where
        T: Entity,
        R: 'static,
        B: FnOnce(TypedExpr<T>) -> TypedExpr<R>,
    {
        let definition =
            Arc::new(
                ComputedProperty::<T, R>::new(body).map_err(|source| RegistryError::Compile {
                    owner: T::type_info().name,
                    property: property.to_string(),
                    source,
                })?,
            );
        self.insert(property, Arc::clone(&definition))?;
        Ok(definition)
    }

    /// Store a pre-built definition. A second registration under the same
    /// key fails and leaves the first in place.
    pub fn insert<T, R>(
        &self,
        property: &str,
        definition: Arc<ComputedProperty<T, R>>,
    ) -> Result<(), RegistryError>
    where
        T: Entity,
        R: 'static,
    {
        let key = (TypeId::of::<T>(), property.to_string());
        let mut entries = self.entries.write().expect("translation map poisoned");
        if entries.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                owner: T::type_info().name,
                property: property.to_string(),
            });
        }
        debug!(
            "registered translation for {}.{}",
            T::type_info().name,
            property
        );
        entries.insert(key, definition);
        Ok(())
    }

    /// Exact lookup under `(T, property)`, with no ancestor search. A
    /// definition registered under different type parameters is "not
    /// found".
    pub fn get<T, R>(&self, property: &str) -> Option<Arc<ComputedProperty<T, R>>>
    where
        T: Entity,
        R: 'static,
    {
        ensure_initialized(T::type_info());
        let entry = self.entry(TypeId::of::<T>(), property)?;
        entry.as_any_arc().downcast::<ComputedProperty<T, R>>().ok()
    }

    /// Override-aware lookup: walk `start` and its ancestors, most
    /// specific first, and return the first level that both declares
    /// `property` directly and has a registration for it. A level that
    /// declares the name without registering it does not stop the walk.
    pub fn resolve(
        &self,
        start: &'static TypeInfo,
        property: &str,
    ) -> Option<Arc<dyn Definition>> {
        for info in start.ancestry() {
            ensure_initialized(info);
            if !info.declares(property) {
                continue;
            }
            if let Some(entry) = self.entry(info.id(), property) {
                trace!(
                    "resolved {}.{} to the definition on {}",
                    start.name, property, info.name
                );
                return Some(entry);
            }
        }
        None
    }

    fn entry(&self, type_id: TypeId, property: &str) -> Option<Arc<dyn Definition>> {
        let entries = self.entries.read().expect("translation map poisoned");
        entries.get(&(type_id, property.to_string())).cloned()
    }

    /// Registered (owner, property) pairs, in registration order.
    pub fn definitions(&self) -> Vec<(&'static str, String)> {
        let entries = self.entries.read().expect("translation map poisoned");
        entries
            .iter()
            .map(|((_, property), definition)| (definition.owner().name, property.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("translation map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
