//! A computed property: its defining tree and its compiled form
//!
//! Both halves are fixed at construction. The tree feeds expansion, the
//! compiled closure feeds direct evaluation; they are built from the same
//! lambda and neither is ever re-derived from the other.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::ast::build::TypedExpr;
use crate::ast::expr::Lambda;
use crate::eval::{self, CompiledFn, EvalError, FromValue, Record, Value};
use crate::schema::{Entity, TypeInfo};

/// Definition of a computed property on `T`, producing `R`.
pub struct ComputedProperty<T, R> {
    lambda: Lambda,
    compiled: CompiledFn,
    _marker: PhantomData<fn(&T) -> R>,
}

impl<T, R> std::fmt::Debug for ComputedProperty<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedProperty")
            .field("lambda", &self.lambda)
            .finish_non_exhaustive()
    }
}

impl<T: Entity, R: 'static> ComputedProperty<T, R> {
    /// Build the defining lambda and compile it, once.
    ///
    /// Fails when the body cannot run locally (a bare parameter outside a
    /// property access, a provider-side identifier, a nested lambda).
    pub fn new<F>(body: F) -> Result<Self, EvalError>
    where
        F: FnOnce(TypedExpr<T>) -> TypedExpr<R>,
    {
        let lambda = Lambda::new::<T, R, F>(body);
        let compiled = eval::compile(&lambda)?;
        Ok(ComputedProperty {
            lambda,
            compiled,
            _marker: PhantomData,
        })
    }

    /// Evaluate the compiled form directly against an instance, bypassing
    /// any query tree. Errors from the compiled form propagate.
    pub fn evaluate(&self, instance: &T) -> Result<R, EvalError>
    where
        T: Record,
        R: FromValue,
    {
        R::from_value((self.compiled)(instance)?)
    }
}

/// Type-erased view of a definition, as the registry stores it.
///
/// The defining tree is reachable from here for the expander only; callers
/// get the compiled side and the owner's description.
pub trait Definition: Any + Send + Sync {
    /// The type the property is registered on.
    fn owner(&self) -> &'static TypeInfo;

    /// Run the compiled form against a type-erased instance.
    fn evaluate_value(&self, instance: &dyn Record) -> Result<Value, EvalError>;

    #[doc(hidden)]
    fn lambda(&self) -> &Lambda;

    #[doc(hidden)]
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Entity, R: 'static> Definition for ComputedProperty<T, R> {
    fn owner(&self) -> &'static TypeInfo {
        T::type_info()
    }

    fn evaluate_value(&self, instance: &dyn Record) -> Result<Value, EvalError> {
        (self.compiled)(instance)
    }

    fn lambda(&self) -> &Lambda {
        &self.lambda
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
