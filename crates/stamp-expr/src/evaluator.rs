//! Expression evaluation against a JSON context.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Number, Value};

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ExprError;
use crate::functions::{self, display, truthy, type_name};
use crate::parser::parse;

/// A callable registered on an [`Evaluator`].
pub type Function = dyn Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync;

/// Evaluates expressions against a context value.
///
/// Identifiers resolve to properties of the context object and `this` to the
/// context itself. The evaluator keeps no bindings between calls, so one
/// instance can be shared across threads.
#[derive(Clone)]
pub struct Evaluator {
    functions: HashMap<String, Arc<Function>>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("Evaluator")
            .field("functions", &names)
            .finish()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Create an evaluator with the built-in functions.
    #[must_use]
    pub fn new() -> Self {
        let mut registry: HashMap<String, Arc<Function>> = HashMap::new();
        registry.insert("size".to_owned(), Arc::new(functions::size));
        registry.insert("isEmpty".to_owned(), Arc::new(functions::is_empty));
        registry.insert("upper".to_owned(), Arc::new(functions::upper));
        registry.insert("lower".to_owned(), Arc::new(functions::lower));
        registry.insert("trim".to_owned(), Arc::new(functions::trim));
        registry.insert("join".to_owned(), Arc::new(functions::join));
        registry.insert("contains".to_owned(), Arc::new(functions::contains));
        registry.insert("string".to_owned(), Arc::new(functions::string));
        Self {
            functions: registry,
        }
    }

    /// Register a function, replacing any function of the same name.
    #[must_use]
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Whether a function of this name is registered.
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Parse an expression.
    pub fn parse(&self, source: &str) -> Result<Expr, ExprError> {
        parse(source)
    }

    /// Parse and evaluate an expression.
    pub fn resolve(&self, source: &str, context: &Value) -> Result<Value, ExprError> {
        self.eval(&parse(source)?, context)
    }

    /// Evaluate a parsed expression.
    pub fn eval(&self, expr: &Expr, context: &Value) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::This => Ok(context.clone()),
            Expr::Ident(name) => property(context, name).cloned(),
            Expr::Member(target, name) => {
                let target = self.eval(target, context)?;
                property(&target, name).cloned()
            }
            Expr::Index(target, index) => {
                let target = self.eval(target, context)?;
                let index = self.eval(index, context)?;
                element(&target, &index).cloned()
            }
            Expr::Call { name, args } => {
                let function = self
                    .functions
                    .get(name)
                    .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, context))
                    .collect::<Result<Vec<_>, _>>()?;
                function(&args)
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, context)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                    UnaryOp::Neg => negate(&value),
                }
            }
            Expr::Binary(left, BinaryOp::And, right) => {
                let left = self.eval(left, context)?;
                Ok(Value::Bool(truthy(&left) && truthy(&self.eval(right, context)?)))
            }
            Expr::Binary(left, BinaryOp::Or, right) => {
                let left = self.eval(left, context)?;
                Ok(Value::Bool(truthy(&left) || truthy(&self.eval(right, context)?)))
            }
            Expr::Binary(left, op, right) => {
                let left = self.eval(left, context)?;
                let right = self.eval(right, context)?;
                binary(*op, &left, &right)
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if truthy(&self.eval(condition, context)?) {
                    self.eval(then, context)
                } else {
                    self.eval(otherwise, context)
                }
            }
            Expr::Elvis(value, fallback) => {
                let value = self.eval(value, context)?;
                if truthy(&value) {
                    Ok(value)
                } else {
                    self.eval(fallback, context)
                }
            }
        }
    }
}

fn property<'a>(target: &'a Value, name: &str) -> Result<&'a Value, ExprError> {
    target
        .as_object()
        .and_then(|map| map.get(name))
        .ok_or_else(|| ExprError::UnknownProperty(name.to_owned()))
}

fn element<'a>(target: &'a Value, index: &Value) -> Result<&'a Value, ExprError> {
    match (target, index) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n.as_i64().ok_or(ExprError::Type {
                operation: "index with",
                found: "non-integer number",
            })?;
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .ok_or(ExprError::IndexOutOfBounds(i))
        }
        (Value::Object(map), Value::String(key)) => map
            .get(key)
            .ok_or_else(|| ExprError::UnknownProperty(key.clone())),
        (Value::Array(_) | Value::Object(_), other) => Err(ExprError::Type {
            operation: "index with",
            found: type_name(other),
        }),
        (other, _) => Err(ExprError::Type {
            operation: "index into",
            found: type_name(other),
        }),
    }
}

fn negate(value: &Value) -> Result<Value, ExprError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64().and_then(i64::checked_neg) {
                Ok(Value::from(i))
            } else {
                float(-n.as_f64().unwrap_or_default())
            }
        }
        other => Err(ExprError::Type {
            operation: "negate",
            found: type_name(other),
        }),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!equals(left, right))),
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            let ordering = compare(left, right)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Lte => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add if left.is_string() || right.is_string() => {
            Ok(Value::String(display(left) + &display(right)))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, left, right)
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => truthy(left) && truthy(right),
            _ => truthy(left) || truthy(right),
        })),
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, ExprError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            a.partial_cmp(&b).ok_or(ExprError::Type {
                operation: "compare",
                found: "NaN",
            })
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Number(_) | Value::String(_), other) | (other, _) => Err(ExprError::Type {
            operation: "compare",
            found: type_name(other),
        }),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        let offender = if left.is_number() { right } else { left };
        return Err(ExprError::Type {
            operation: "do arithmetic on",
            found: type_name(offender),
        });
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Rem if y == 0 => return Err(ExprError::DivisionByZero),
            BinaryOp::Rem => x.checked_rem(y),
            BinaryOp::Div if y == 0 => return Err(ExprError::DivisionByZero),
            BinaryOp::Div if x.checked_rem(y) == Some(0) => x.checked_div(y),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
    match op {
        BinaryOp::Add => float(x + y),
        BinaryOp::Sub => float(x - y),
        BinaryOp::Mul => float(x * y),
        BinaryOp::Div | BinaryOp::Rem if y == 0.0 => Err(ExprError::DivisionByZero),
        BinaryOp::Div => float(x / y),
        _ => float(x % y),
    }
}

fn float(value: f64) -> Result<Value, ExprError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(ExprError::Type {
            operation: "represent",
            found: "non-finite number",
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn eval(source: &str, context: &Value) -> Result<Value, ExprError> {
        Evaluator::new().resolve(source, context)
    }

    #[test]
    fn test_property_paths() {
        let ctx = json!({"person": {"name": "Homer", "kids": ["Bart", "Lisa"]}});
        assert_eq!(eval("person.name", &ctx).unwrap(), json!("Homer"));
        assert_eq!(eval("person.kids[1]", &ctx).unwrap(), json!("Lisa"));
        assert_eq!(eval("person['name']", &ctx).unwrap(), json!("Homer"));
    }

    #[test]
    fn test_this() {
        assert_eq!(eval("this", &json!("Bart")).unwrap(), json!("Bart"));
        assert_eq!(eval("upper(this)", &json!("Bart")).unwrap(), json!("BART"));
    }

    #[test]
    fn test_unknown_property_is_error() {
        let ctx = json!({"a": 1});
        assert_eq!(
            eval("missing", &ctx),
            Err(ExprError::UnknownProperty("missing".to_owned()))
        );
        assert_eq!(
            eval("a.b", &ctx),
            Err(ExprError::UnknownProperty("b".to_owned()))
        );
    }

    #[test]
    fn test_unknown_function_is_error() {
        assert_eq!(
            eval("nope(1)", &json!({})),
            Err(ExprError::UnknownFunction("nope".to_owned()))
        );
    }

    #[test]
    fn test_arithmetic() {
        let ctx = json!({"x": 7});
        assert_eq!(eval("x + 1", &ctx).unwrap(), json!(8));
        assert_eq!(eval("x / 2", &ctx).unwrap(), json!(3.5));
        assert_eq!(eval("x / 7", &ctx).unwrap(), json!(1));
        assert_eq!(eval("x % 4", &ctx).unwrap(), json!(3));
        assert_eq!(eval("-x * 2", &ctx).unwrap(), json!(-14));
        assert_eq!(eval("x / 0", &ctx), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn test_string_concatenation() {
        let ctx = json!({"first": "Homer", "age": 39});
        assert_eq!(
            eval("first + ' is ' + age", &ctx).unwrap(),
            json!("Homer is 39")
        );
    }

    #[test]
    fn test_comparison_and_logic() {
        let ctx = json!({"n": 3, "s": "b"});
        assert_eq!(eval("n > 2 && s == 'b'", &ctx).unwrap(), json!(true));
        assert_eq!(eval("n <= 2 || s < 'a'", &ctx).unwrap(), json!(false));
        assert_eq!(eval("n == 3.0", &ctx).unwrap(), json!(true));
        assert_eq!(eval("!n", &ctx).unwrap(), json!(false));
        assert!(matches!(eval("n < s", &ctx), Err(ExprError::Type { .. })));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let ctx = json!({"flag": false});
        assert_eq!(eval("flag && missing", &ctx).unwrap(), json!(false));
        assert_eq!(eval("!flag || missing", &ctx).unwrap(), json!(true));
    }

    #[test]
    fn test_conditional_and_elvis() {
        let ctx = json!({"name": "", "n": 5});
        assert_eq!(eval("name ?: 'anonymous'", &ctx).unwrap(), json!("anonymous"));
        assert_eq!(eval("n > 3 ? 'many' : 'few'", &ctx).unwrap(), json!("many"));
    }

    #[test]
    fn test_builtin_functions() {
        let ctx = json!({"items": ["a", "b"], "empty": []});
        assert_eq!(eval("size(items)", &ctx).unwrap(), json!(2));
        assert_eq!(eval("isEmpty(empty)", &ctx).unwrap(), json!(true));
        assert_eq!(eval("join(items, '+')", &ctx).unwrap(), json!("a+b"));
        assert_eq!(eval("contains(items, 'b')", &ctx).unwrap(), json!(true));
        assert_eq!(eval("trim('  x ')", &ctx).unwrap(), json!("x"));
    }

    #[test]
    fn test_custom_function() {
        let evaluator = Evaluator::new().with_function("double", |args: &[Value]| {
            let n = args.first().and_then(Value::as_i64).unwrap_or_default();
            Ok(json!(n * 2))
        });
        assert!(evaluator.has_function("double"));
        assert_eq!(evaluator.resolve("double(21)", &json!({})).unwrap(), json!(42));
    }

    #[test]
    fn test_eval_parsed_once() {
        let evaluator = Evaluator::new();
        let expr = evaluator.parse("name").unwrap();
        assert_eq!(evaluator.eval(&expr, &json!({"name": "a"})).unwrap(), json!("a"));
        assert_eq!(evaluator.eval(&expr, &json!({"name": "b"})).unwrap(), json!("b"));
    }
}
