//! calque - computed properties, expanded for remote query engines
//!
//! A computed property is written once as a pure expression of other
//! properties. Local reads run its compiled form directly; query trees
//! headed to a provider that cannot call local code get the reference
//! expanded — recursively, and override-aware across a declared type
//! hierarchy — into the primitive operations that define it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use calque::{Entity, TypeInfo, lit, translation_of, evaluate, expand_lambda};
//!
//! struct Employee { first_name: String, last_name: String }
//!
//! static EMPLOYEE_INFO: TypeInfo = TypeInfo {
//!     name: "Employee",
//!     type_id: std::any::TypeId::of::<Employee>,
//!     base: None,
//!     declared: &["first_name", "last_name", "full_name"],
//!     init: Some(|| { Lazy::force(&FULL_NAME); }),
//! };
//!
//! impl Entity for Employee {
//!     fn type_info() -> &'static TypeInfo { &EMPLOYEE_INFO }
//! }
//!
//! static FULL_NAME: Lazy<Arc<ComputedProperty<Employee, String>>> = Lazy::new(|| {
//!     translation_of::<Employee>()
//!         .property("full_name")
//!         .is(|e| e.prop::<String>("first_name") + lit(" ") + e.prop("last_name"))
//!         .expect("register full_name")
//! });
//!
//! // Direct read, no query involved:
//! let name: String = evaluate(&employee, "full_name")?;
//!
//! // Query tree: expansion leaves nothing for the provider to guess.
//! let query = Lambda::new::<Employee, _, _>(|e| e.prop::<String>("full_name"));
//! let expanded = expand_lambda(&query, default_map())?;
//! ```
//!
//! ## Overrides
//!
//! A subtype may re-register a property its base defines; each entry lives
//! under its own key. Expansion resolves from the *static* type of the
//! receiver expression, walking the declared ancestry for the nearest
//! type that both declares the name directly and registered a definition
//! for it.

mod ast;
mod define;
mod definition;
mod eval;
mod pretty;
mod registry;
mod schema;
mod transform;

use thiserror::Error;

// ============ Primary Public API ============

pub use ast::build::{IntoLiteral, TypedExpr, lit};
pub use ast::expr::{Expr, Lambda};
pub use ast::{BinOp, Literal, ParamId, UnaryOp};
pub use define::{PropertyTranslation, TranslationOf, evaluate, translation_of};
pub use definition::{ComputedProperty, Definition};
pub use eval::{CompiledFn, EvalError, FromValue, Record, Value, compile, project};
pub use registry::{RegistryError, TranslationMap, default_map};
pub use schema::{Ancestry, Entity, TypeInfo, ensure_initialized};
pub use transform::{ExpandError, expand, expand_lambda, expand_with};

// ============ Errors ============

#[derive(Error, Debug)]
pub enum Error {
    #[error("registration error: {0}")]
    Registry(#[from] RegistryError),
    #[error("expansion error: {0}")]
    Expand(#[from] ExpandError),
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}
