//! Plain text resolvers.

use serde_json::Value;
use stamp_dom::Package;

use super::{Replacement, ValueResolver};
use crate::error::StampError;
use crate::placeholder::Placeholder;

/// `null` becomes a fixed text, empty by default.
#[derive(Debug, Clone, Default)]
pub struct NullResolver {
    text: String,
}

impl NullResolver {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ValueResolver for NullResolver {
    fn name(&self) -> &str {
        "null"
    }

    fn can_resolve(&self, value: &Value) -> bool {
        value.is_null()
    }

    fn resolve(
        &self,
        _package: &mut Package,
        _placeholder: &Placeholder,
        _value: &Value,
    ) -> Result<Replacement, StampError> {
        Ok(Replacement::Text(self.text.clone()))
    }
}

/// Strings, numbers and booleans as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringResolver;

impl ValueResolver for StringResolver {
    fn name(&self) -> &str {
        "string"
    }

    fn can_resolve(&self, value: &Value) -> bool {
        matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
    }

    fn resolve(
        &self,
        _package: &mut Package,
        _placeholder: &Placeholder,
        value: &Value,
    ) -> Result<Replacement, StampError> {
        Ok(Replacement::Text(stamp_expr::display(value)))
    }
}

/// Any value as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResolver;

impl ValueResolver for JsonResolver {
    fn name(&self) -> &str {
        "json"
    }

    fn can_resolve(&self, _value: &Value) -> bool {
        true
    }

    fn resolve(
        &self,
        _package: &mut Package,
        _placeholder: &Placeholder,
        value: &Value,
    ) -> Result<Replacement, StampError> {
        Ok(Replacement::Text(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resolver::tests::{package, placeholder};

    #[test]
    fn test_null_text() {
        let resolver = NullResolver::new("-");
        assert!(resolver.can_resolve(&json!(null)));
        assert!(!resolver.can_resolve(&json!("")));
        assert_eq!(
            resolver.resolve(&mut package(), &placeholder(), &json!(null)).unwrap(),
            Replacement::Text("-".to_owned())
        );
    }

    #[test]
    fn test_string_resolver_scalars_only() {
        assert!(StringResolver.can_resolve(&json!(true)));
        assert!(StringResolver.can_resolve(&json!(1.5)));
        assert!(!StringResolver.can_resolve(&json!([])));
        assert!(!StringResolver.can_resolve(&json!(null)));
        assert_eq!(
            StringResolver
                .resolve(&mut package(), &placeholder(), &json!(false))
                .unwrap(),
            Replacement::Text("false".to_owned())
        );
    }
}
