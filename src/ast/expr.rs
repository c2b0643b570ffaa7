//! The expression tree that expansion rewrites
//!
//! Queries and property definitions share one node type. The expander only
//! reasons about `Param` and `Property`; every other variant is rebuilt
//! structurally with rewritten children.

use super::build::TypedExpr;
use super::{BinOp, Literal, ParamId, UnaryOp};
use crate::schema::{Entity, TypeInfo};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a lambda's formal parameter.
    Param(ParamId),

    /// A provider-side source name (`employees`). Opaque to expansion and
    /// not locally evaluable.
    Ident(String),

    /// Literal value
    Literal(Literal),

    /// List expression: `[a, b, c]`
    List(Vec<Expr>),

    /// Property access: `target.name`.
    ///
    /// `owner` is the static type of `target` as recorded by the builder;
    /// override resolution starts its ancestry walk there.
    Property {
        target: Box<Expr>,
        owner: &'static TypeInfo,
        name: String,
    },

    /// Method call: `target.method(args...)`
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },

    /// Binary operation: `a + b`, `a == b`
    Binary {
        lhs: Box<Expr>,
        op: BinOp,
        rhs: Box<Expr>,
    },

    /// Unary operation: `-x`, `!x`
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// A nested lambda, e.g. the argument of a `select` or `filter` call.
    /// Expansion recurses into the body; the lambda's own parameter stays
    /// free unless a substitution bound it.
    Lambda(Box<Lambda>),
}

/// AST of a pure single-parameter function.
///
/// Built through [`TypedExpr`] so the owner and result types are checked
/// where the tree is constructed; the tree itself is untyped.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub(crate) param: ParamId,
    pub(crate) body: Expr,
}

impl Lambda {
    /// Build a lambda from `T` by applying `body` to a fresh parameter.
    pub fn new<T, R, F>(body: F) -> Lambda
    where
        T: Entity,
        F: FnOnce(TypedExpr<T>) -> TypedExpr<R>,
    {
        let param = ParamId::fresh();
        let body = body(TypedExpr::new(Expr::Param(param))).into_expr();
        Lambda { param, body }
    }

    pub fn param(&self) -> ParamId {
        self.param
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Embed this lambda as an expression node (a call argument, usually).
    pub fn into_expr(self) -> Expr {
        Expr::Lambda(Box::new(self))
    }
}
