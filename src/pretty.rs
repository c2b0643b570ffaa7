//! Single-line rendering of expression trees
//!
//! Used by error messages, trace logs, and tests. Parameters render as
//! `it`: trees here are single-parameter lambdas and their expansions, so
//! the shorthand stays unambiguous in practice.

use std::fmt::{self, Display, Write};

use crate::ast::expr::{Expr, Lambda};
use crate::ast::{BinOp, Literal, UnaryOp};

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{n:.1}")
                } else {
                    write!(f, "{}", n)
                }
            }
            Literal::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&",
            BinOp::Or => "|",
        };
        f.write_str(s)
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        })
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, 0)
    }
}

impl Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|it| {}", self.body())
    }
}

// Binding strength, loosest first; postfix forms bind tightest.
fn precedence(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 2,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 3,
        BinOp::Add | BinOp::Sub => 4,
        BinOp::Mul | BinOp::Div | BinOp::Mod => 5,
    }
}

const UNARY_PREC: u8 = 6;
const POSTFIX_PREC: u8 = 7;

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, parent: u8) -> fmt::Result {
    match expr {
        Expr::Param(_) => f.write_str("it"),
        Expr::Ident(name) => f.write_str(name),
        Expr::Literal(literal) => write!(f, "{literal}"),
        Expr::List(items) => {
            f.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_expr(f, item, 0)?;
            }
            f.write_char(']')
        }
        Expr::Property { target, name, .. } => {
            write_expr(f, target, POSTFIX_PREC)?;
            write!(f, ".{name}")
        }
        Expr::Call {
            target,
            method,
            args,
        } => {
            write_expr(f, target, POSTFIX_PREC)?;
            write!(f, ".{method}(")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_expr(f, arg, 0)?;
            }
            f.write_char(')')
        }
        Expr::Binary { lhs, op, rhs } => {
            let prec = precedence(*op);
            let parens = prec < parent;
            if parens {
                f.write_char('(')?;
            }
            write_expr(f, lhs, prec)?;
            write!(f, " {op} ")?;
            write_expr(f, rhs, prec + 1)?;
            if parens {
                f.write_char(')')?;
            }
            Ok(())
        }
        Expr::Unary { op, expr } => {
            write!(f, "{op}")?;
            write_expr(f, expr, UNARY_PREC)
        }
        Expr::Lambda(lambda) => write!(f, "{lambda}"),
    }
}

fn escape_string(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['\\', '"'],
            '\\' => vec!['\\', '\\'],
            '\n' => vec!['\\', 'n'],
            '\t' => vec!['\\', 't'],
            c => vec![c],
        })
        .collect()
}
