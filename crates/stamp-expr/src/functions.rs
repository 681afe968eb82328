//! Built-in functions and value helpers.

use serde_json::Value;

use crate::error::ExprError;

/// Truthiness of a value: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text form of a value: strings verbatim, `null` empty, everything else as JSON.
#[must_use]
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON type name, for error messages.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn size(args: &[Value]) -> Result<Value, ExprError> {
    let [value] = exactly::<1>("size", args)?;
    let len = match value {
        Value::Null => 0,
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => {
            return Err(ExprError::Type {
                operation: "take the size of",
                found: type_name(other),
            });
        }
    };
    Ok(Value::from(len))
}

pub(crate) fn is_empty(args: &[Value]) -> Result<Value, ExprError> {
    let [value] = exactly::<1>("isEmpty", args)?;
    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    };
    Ok(Value::Bool(empty))
}

pub(crate) fn upper(args: &[Value]) -> Result<Value, ExprError> {
    let [value] = exactly::<1>("upper", args)?;
    Ok(Value::String(display(value).to_uppercase()))
}

pub(crate) fn lower(args: &[Value]) -> Result<Value, ExprError> {
    let [value] = exactly::<1>("lower", args)?;
    Ok(Value::String(display(value).to_lowercase()))
}

pub(crate) fn trim(args: &[Value]) -> Result<Value, ExprError> {
    let [value] = exactly::<1>("trim", args)?;
    Ok(Value::String(display(value).trim().to_owned()))
}

pub(crate) fn string(args: &[Value]) -> Result<Value, ExprError> {
    let [value] = exactly::<1>("string", args)?;
    Ok(Value::String(display(value)))
}

/// `join(list)` or `join(list, separator)`; the default separator is `", "`.
pub(crate) fn join(args: &[Value]) -> Result<Value, ExprError> {
    let (list, separator) = match args {
        [list] => (list, ", ".to_owned()),
        [list, separator] => (list, display(separator)),
        _ => {
            return Err(ExprError::Arity {
                function: "join".to_owned(),
                expected: "1 or 2".to_owned(),
                found: args.len(),
            });
        }
    };
    match list {
        Value::Null => Ok(Value::String(String::new())),
        Value::Array(items) => Ok(Value::String(
            items.iter().map(display).collect::<Vec<_>>().join(&separator),
        )),
        other => Err(ExprError::Type {
            operation: "join",
            found: type_name(other),
        }),
    }
}

/// Array membership, substring test, or object key test.
pub(crate) fn contains(args: &[Value]) -> Result<Value, ExprError> {
    let [haystack, needle] = exactly::<2>("contains", args)?;
    let found = match haystack {
        Value::Null => false,
        Value::Array(items) => items.contains(needle),
        Value::String(s) => s.contains(display(needle).as_str()),
        Value::Object(map) => map.contains_key(display(needle).as_str()),
        other => {
            return Err(ExprError::Type {
                operation: "search in",
                found: type_name(other),
            });
        }
    };
    Ok(Value::Bool(found))
}

fn exactly<'a, const N: usize>(
    function: &str,
    args: &'a [Value],
) -> Result<&'a [Value; N], ExprError> {
    args.try_into().map_err(|_| ExprError::Arity {
        function: function.to_owned(),
        expected: N.to_string(),
        found: args.len(),
    })
}
