//! Expansion: substitute computed-property accesses into the query tree
//!
//! This pass:
//! - Resolves each property access against the map, override-aware
//! - Splices the registered body in place of the access, binding the
//!   definition's parameter to the original receiver expression
//! - Rebuilds every other node structurally with rewritten children
//!
//! The output tree references only primitive operations the provider can
//! run; every node a translation existed for is gone.

use std::any::TypeId;

use log::trace;
use thiserror::Error;

use crate::ast::ParamId;
use crate::ast::expr::{Expr, Lambda};
use crate::registry::{TranslationMap, default_map};

#[derive(Error, Debug)]
pub enum ExpandError {
    #[error("cyclic translation while expanding `{owner}.{property}`")]
    Cyclic {
        owner: &'static str,
        property: String,
    },
}

/// Expand against the process-wide default map.
pub fn expand(expr: &Expr) -> Result<Expr, ExpandError> {
    expand_with(expr, default_map())
}

/// Expand against a specific map, producing a new tree. The input is never
/// mutated, and repeated calls are independent: nothing is cached.
pub fn expand_with(expr: &Expr, map: &TranslationMap) -> Result<Expr, ExpandError> {
    Expander::new(map).expand(expr)
}

/// Expand a lambda's body, keeping its parameter free.
pub fn expand_lambda(lambda: &Lambda, map: &TranslationMap) -> Result<Lambda, ExpandError> {
    Ok(Lambda {
        param: lambda.param(),
        body: expand_with(lambda.body(), map)?,
    })
}

struct Expander<'m> {
    map: &'m TranslationMap,
    /// Innermost-last stack of (definition parameter -> receiver) pairs,
    /// pushed around each substitution so nested definitions resolve their
    /// parameters against the right receiver, with shadowing.
    bindings: Vec<(ParamId, Expr)>,
    /// Keys of the definitions currently being substituted; re-entering
    /// one means the definitions form a cycle.
    expanding: Vec<(TypeId, String)>,
}

impl<'m> Expander<'m> {
    fn new(map: &'m TranslationMap) -> Self {
        Expander {
            map,
            bindings: Vec::new(),
            expanding: Vec::new(),
        }
    }

    fn expand(&mut self, expr: &Expr) -> Result<Expr, ExpandError> {
        match expr {
            Expr::Param(id) => {
                // The receiver was captured unexpanded; expanding it here,
                // with the full binding stack still in place, resolves any
                // outer parameters it mentions.
                let bound = self
                    .bindings
                    .iter()
                    .rev()
                    .find(|(param, _)| param == id)
                    .map(|(_, receiver)| receiver.clone());
                match bound {
                    Some(receiver) => self.expand(&receiver),
                    None => Ok(expr.clone()),
                }
            }
            Expr::Property {
                target,
                owner,
                name,
            } => {
                let owner = *owner;
                if let Some(definition) = self.map.resolve(owner, name) {
                    let key = (definition.owner().id(), name.clone());
                    if self.expanding.contains(&key) {
                        return Err(ExpandError::Cyclic {
                            owner: definition.owner().name,
                            property: name.clone(),
                        });
                    }
                    trace!(
                        "substituting {}.{} (registered on {})",
                        owner.name,
                        name,
                        definition.owner().name
                    );
                    self.expanding.push(key);
                    self.bindings
                        .push((definition.lambda().param(), (**target).clone()));
                    let body = self.expand(definition.lambda().body());
                    self.bindings.pop();
                    self.expanding.pop();
                    body
                } else {
                    Ok(Expr::Property {
                        target: Box::new(self.expand(target)?),
                        owner,
                        name: name.clone(),
                    })
                }
            }
            Expr::Call {
                target,
                method,
                args,
            } => Ok(Expr::Call {
                target: Box::new(self.expand(target)?),
                method: method.clone(),
                args: args
                    .iter()
                    .map(|arg| self.expand(arg))
                    .collect::<Result<_, _>>()?,
            }),
            Expr::Binary { lhs, op, rhs } => Ok(Expr::Binary {
                lhs: Box::new(self.expand(lhs)?),
                op: *op,
                rhs: Box::new(self.expand(rhs)?),
            }),
            Expr::Unary { op, expr } => Ok(Expr::Unary {
                op: *op,
                expr: Box::new(self.expand(expr)?),
            }),
            Expr::List(items) => Ok(Expr::List(
                items
                    .iter()
                    .map(|item| self.expand(item))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Lambda(inner) => Ok(Expr::Lambda(Box::new(Lambda {
                param: inner.param(),
                body: self.expand(inner.body())?,
            }))),
            Expr::Ident(_) | Expr::Literal(_) => Ok(expr.clone()),
        }
    }
}
