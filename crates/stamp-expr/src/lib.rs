//! Expression language for stamp placeholders and directives.
//!
//! Expressions are evaluated against a `serde_json::Value` context:
//!
//! ```ignore
//! use serde_json::json;
//! use stamp_expr::Evaluator;
//!
//! let evaluator = Evaluator::new();
//! let value = evaluator.resolve("person.name ?: 'unknown'", &json!({"person": {"name": "Homer"}}))?;
//! assert_eq!(value, json!("Homer"));
//! ```
//!
//! The grammar covers literals, property paths (`a.b`, `a[0]`, `a['k']`), `this`,
//! function calls, arithmetic, comparison, logic, `c ? a : b` and `a ?: b`.
//! Directives in templates are plain calls; the engine looks at
//! [`Expr::as_call`] to dispatch them.

mod ast;
mod error;
mod evaluator;
mod functions;
mod lexer;
mod parser;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use error::ExprError;
pub use evaluator::{Evaluator, Function};
pub use functions::{display, truthy, type_name};
pub use parser::parse;
