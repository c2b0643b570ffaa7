//! Local evaluation of definition bodies
//!
//! Compiles a lambda's tree into a closure tree once; the result is the
//! "compiled form" stored inside a definition and the engine behind the
//! in-memory provider used in tests. Instances expose their stored fields
//! through [`Record`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::ast::expr::{Expr, Lambda};
use crate::ast::{BinOp, Literal, ParamId, UnaryOp};

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("unknown identifier: {0}")]
    UnknownIdent(String),

    #[error("unknown field `{field}` on {type_name}")]
    UnknownField {
        type_name: &'static str,
        field: String,
    },

    #[error("unknown method '{method}' on {target}")]
    UnknownMethod {
        target: &'static str,
        method: String,
    },

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("argument error: {0}")]
    ArgError(String),

    #[error("parameter used outside a property access")]
    BareParameter,

    #[error("not locally evaluable: {0}")]
    Unsupported(&'static str),

    #[error("division by zero")]
    DivideByZero,
}

type Result<T> = std::result::Result<T, EvalError>;

/// Runtime value produced by evaluation.
#[derive(Clone)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<Value>),
    /// A nested instance, reached through an entity-typed property.
    Entity(Arc<dyn Record>),
}

impl Value {
    /// Kind name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Entity(_) => "entity",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => f.write_str("null"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Entity(_) => f.write_str("<entity>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Read access to an instance's properties by name.
///
/// Implementations answer computed names too, by delegating to
/// [`crate::evaluate`] the way the original property getters delegate to
/// their compiled expressions; stored fields are returned directly.
pub trait Record: Send + Sync {
    fn field(&self, name: &str) -> Option<Value>;
}

/// Typed recovery of an evaluation result.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(n) => Ok(n),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(n) => Ok(n),
            Value::Int(n) => Ok(n as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

fn mismatch(expected: &'static str, got: &Value) -> EvalError {
    EvalError::TypeError {
        expected,
        got: got.kind(),
    }
}

/// The compiled form of a definition: invocable against any instance that
/// exposes the owner's properties.
pub type CompiledFn = Box<dyn Fn(&dyn Record) -> Result<Value> + Send + Sync>;

/// Compile a lambda into its directly invocable form. Done once per
/// definition, at construction; nothing is re-derived afterwards.
///
/// Bodies are restricted to what runs locally: property access rooted at
/// the parameter, literals, lists, operators, and scalar methods. Source
/// identifiers and nested lambdas belong to the provider and fail here.
pub fn compile(lambda: &Lambda) -> Result<CompiledFn> {
    compile_expr(&lambda.body, lambda.param)
}

fn compile_expr(expr: &Expr, param: ParamId) -> Result<CompiledFn> {
    match expr {
        Expr::Literal(literal) => {
            let constant = value_of(literal);
            Ok(Box::new(move |_| Ok(constant.clone())))
        }
        Expr::Param(_) => Err(EvalError::BareParameter),
        Expr::Ident(name) => Err(EvalError::UnknownIdent(name.clone())),
        Expr::Lambda(_) => Err(EvalError::Unsupported("nested lambda")),
        Expr::List(items) => {
            let compiled: Vec<CompiledFn> = items
                .iter()
                .map(|item| compile_expr(item, param))
                .collect::<Result<_>>()?;
            Ok(Box::new(move |this| {
                compiled
                    .iter()
                    .map(|item| item(this))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }))
        }
        Expr::Property {
            target,
            owner,
            name,
        } => {
            let type_name = owner.name;
            let field = name.clone();
            if matches!(**target, Expr::Param(p) if p == param) {
                // Access rooted directly at the parameter reads the
                // borrowed instance, no boxing of the receiver.
                Ok(Box::new(move |this| {
                    this.field(&field).ok_or_else(|| EvalError::UnknownField {
                        type_name,
                        field: field.clone(),
                    })
                }))
            } else {
                let target = compile_expr(target, param)?;
                Ok(Box::new(move |this| match target(this)? {
                    Value::Entity(record) => {
                        record.field(&field).ok_or_else(|| EvalError::UnknownField {
                            type_name,
                            field: field.clone(),
                        })
                    }
                    other => Err(mismatch("entity", &other)),
                }))
            }
        }
        Expr::Call {
            target,
            method,
            args,
        } => {
            let target = compile_expr(target, param)?;
            let args: Vec<CompiledFn> = args
                .iter()
                .map(|arg| compile_expr(arg, param))
                .collect::<Result<_>>()?;
            let method = method.clone();
            Ok(Box::new(move |this| {
                let target = target(this)?;
                let args = args.iter().map(|arg| arg(this)).collect::<Result<Vec<_>>>()?;
                call_method(target, &method, args)
            }))
        }
        Expr::Binary { lhs, op, rhs } => {
            let lhs = compile_expr(lhs, param)?;
            let rhs = compile_expr(rhs, param)?;
            let op = *op;
            Ok(Box::new(move |this| binary_op(op, lhs(this)?, rhs(this)?)))
        }
        Expr::Unary { op, expr } => {
            let inner = compile_expr(expr, param)?;
            let op = *op;
            Ok(Box::new(move |this| unary_op(op, inner(this)?)))
        }
    }
}

fn value_of(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::Str(s.clone()),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

/// The in-memory substitute provider: compile once, evaluate each instance.
pub fn project(items: &[Arc<dyn Record>], lambda: &Lambda) -> Result<Vec<Value>> {
    let compiled = compile(lambda)?;
    items.iter().map(|item| compiled(item.as_ref())).collect()
}

// ============ Scalar semantics ============

fn numeric_pair(lhs: &Value, rhs: &Value) -> Option<(f64, f64)> {
    let as_float = |v: &Value| match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    };
    Some((as_float(lhs)?, as_float(rhs)?))
}

pub(crate) fn binary_op(op: BinOp, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        BinOp::Add => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => arith(op, &lhs, &rhs, |a, b| a + b),
        },
        BinOp::Sub => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            _ => arith(op, &lhs, &rhs, |a, b| a - b),
        },
        BinOp::Mul => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            _ => arith(op, &lhs, &rhs, |a, b| a * b),
        },
        BinOp::Div => match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivideByZero),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a / b)),
            _ => arith(op, &lhs, &rhs, |a, b| a / b),
        },
        BinOp::Mod => match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivideByZero),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
            (Value::Int(_), other) => Err(mismatch("int operands for `%`", other)),
            (other, _) => Err(mismatch("int operands for `%`", other)),
        },
        BinOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs)?)),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs)?)),
        BinOp::Lt => ordered(&lhs, &rhs, Ordering::is_lt),
        BinOp::Le => ordered(&lhs, &rhs, Ordering::is_le),
        BinOp::Gt => ordered(&lhs, &rhs, Ordering::is_gt),
        BinOp::Ge => ordered(&lhs, &rhs, Ordering::is_ge),
        BinOp::And => match (&lhs, &rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
            (Value::Bool(_), other) => Err(mismatch("bool operands for `&`", other)),
            (other, _) => Err(mismatch("bool operands for `&`", other)),
        },
        BinOp::Or => match (&lhs, &rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
            (Value::Bool(_), other) => Err(mismatch("bool operands for `|`", other)),
            (other, _) => Err(mismatch("bool operands for `|`", other)),
        },
    }
}

fn arith(op: BinOp, lhs: &Value, rhs: &Value, apply: fn(f64, f64) -> f64) -> Result<Value> {
    match numeric_pair(lhs, rhs) {
        Some((a, b)) => Ok(Value::Float(apply(a, b))),
        None => Err(EvalError::TypeError {
            expected: match op {
                BinOp::Add => "numeric or string operands for `+`",
                BinOp::Sub => "numeric operands for `-`",
                BinOp::Mul => "numeric operands for `*`",
                _ => "numeric operands for `/`",
            },
            got: if numeric_pair(lhs, lhs).is_some() {
                rhs.kind()
            } else {
                lhs.kind()
            },
        }),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> Result<bool> {
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => Ok(matches!((lhs, rhs), (Value::Null, Value::Null))),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::List(a), Value::List(b)) => Ok(a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| values_equal(x, y))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .all(|eq| eq)
            && a.len() == b.len()),
        (Value::Entity(a), Value::Entity(b)) => Ok(Arc::ptr_eq(a, b)),
        _ => match numeric_pair(lhs, rhs) {
            Some((a, b)) => Ok(a == b),
            None => Err(EvalError::TypeError {
                expected: lhs.kind(),
                got: rhs.kind(),
            }),
        },
    }
}

fn ordered(lhs: &Value, rhs: &Value, test: fn(Ordering) -> bool) -> Result<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => match numeric_pair(lhs, rhs) {
            Some((a, b)) => a.partial_cmp(&b).ok_or(EvalError::TypeError {
                expected: "comparable numbers",
                got: "nan",
            })?,
            None => {
                return Err(EvalError::TypeError {
                    expected: "comparable operands",
                    got: rhs.kind(),
                });
            }
        },
    };
    Ok(Value::Bool(test(ordering)))
}

fn unary_op(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(-n)),
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, other) => Err(mismatch("numeric operand for `-`", &other)),
        (UnaryOp::Not, other) => Err(mismatch("bool operand for `!`", &other)),
    }
}

fn call_method(target: Value, method: &str, args: Vec<Value>) -> Result<Value> {
    match (method, &target) {
        ("upper", Value::Str(s)) => {
            expect_arity(method, &args, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        ("lower", Value::Str(s)) => {
            expect_arity(method, &args, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        ("len", Value::Str(s)) => {
            expect_arity(method, &args, 0)?;
            Ok(Value::Int(s.chars().count() as i64))
        }
        ("len", Value::List(items)) => {
            expect_arity(method, &args, 0)?;
            Ok(Value::Int(items.len() as i64))
        }
        ("contains", Value::Str(s)) => {
            expect_arity(method, &args, 1)?;
            match &args[0] {
                Value::Str(needle) => Ok(Value::Bool(s.contains(needle.as_str()))),
                other => Err(mismatch("string argument to `contains`", other)),
            }
        }
        ("abs", Value::Int(n)) => {
            expect_arity(method, &args, 0)?;
            Ok(Value::Int(n.abs()))
        }
        ("abs", Value::Float(n)) => {
            expect_arity(method, &args, 0)?;
            Ok(Value::Float(n.abs()))
        }
        ("round", Value::Float(n)) => {
            expect_arity(method, &args, 0)?;
            Ok(Value::Float(n.round()))
        }
        ("round", Value::Int(n)) => {
            expect_arity(method, &args, 0)?;
            Ok(Value::Int(*n))
        }
        _ => Err(EvalError::UnknownMethod {
            target: target.kind(),
            method: method.to_string(),
        }),
    }
}

fn expect_arity(method: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::ArgError(format!(
            "`{method}` takes {expected} argument(s), got {}",
            args.len()
        )))
    }
}
