//! Expression syntax tree.

use serde_json::Value;

/// Unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    NotEq,
    And,
    Or,
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Literal(Value),
    /// Top-level context property.
    Ident(String),
    /// The context itself.
    This,
    /// `target.name`
    Member(Box<Expr>, String),
    /// `target[index]`
    Index(Box<Expr>, Box<Expr>),
    /// `name(args...)`
    Call { name: String, args: Vec<Expr> },
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    /// `condition ? then : otherwise`
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `value ?: fallback`
    Elvis(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Function name and arguments when the expression is a call.
    #[must_use]
    pub fn as_call(&self) -> Option<(&str, &[Expr])> {
        match self {
            Self::Call { name, args } => Some((name, args)),
            _ => None,
        }
    }
}
