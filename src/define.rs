//! Fluent registration and direct evaluation against the default map
//!
//! The two-step `translation_of::<T>().property("p").is(...)` form exists
//! so the definition can live where the property does — in the owning
//! type's static state — and hand the compiled definition back for direct
//! reads that never touch a query.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::Error;
use crate::definition::ComputedProperty;
use crate::eval::{FromValue, Record};
use crate::registry::{RegistryError, default_map};
use crate::ast::build::TypedExpr;
use crate::schema::Entity;

/// Start a fluent registration for a property of `T`.
pub fn translation_of<T: Entity>() -> TranslationOf<T> {
    TranslationOf(PhantomData)
}

pub struct TranslationOf<T>(PhantomData<fn() -> T>);

impl<T: Entity> TranslationOf<T> {
    /// Name the property being defined; finish with
    /// [`PropertyTranslation::is`].
    pub fn property<R>(self, name: impl Into<String>) -> PropertyTranslation<T, R> {
        PropertyTranslation {
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

/// A named property awaiting its defining expression.
pub struct PropertyTranslation<T, R> {
    name: String,
    _marker: PhantomData<fn(&T) -> R>,
}

impl<T: Entity, R: 'static> PropertyTranslation<T, R> {
    /// Supply the defining expression and register it with the default
    /// map. Returns the definition for storage next to the property.
    pub fn is<B>(self, body: B) -> Result<Arc<ComputedProperty<T, R>>, RegistryError>
    where
        B: FnOnce(TypedExpr<T>) -> TypedExpr<R>,
    {
        default_map().define_property(&self.name, body)
    }
}

/// Evaluate a computed property directly against an instance, using the
/// default map and bypassing any query tree.
///
/// Resolution is override-aware from `T`: an instance whose own type never
/// re-registered the property evaluates the nearest ancestor's definition.
pub fn evaluate<T, R>(instance: &T, property: &str) -> Result<R, Error>
where
    T: Entity + Record,
    R: FromValue,
{
    let definition = default_map()
        .resolve(T::type_info(), property)
        .ok_or_else(|| RegistryError::NotRegistered {
            owner: T::type_info().name,
            property: property.to_string(),
        })?;
    let value = definition.evaluate_value(instance)?;
    Ok(R::from_value(value)?)
}
