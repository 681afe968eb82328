//! ISO dates and RFC 3339 timestamps rendered with configurable formats.

use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value;
use stamp_dom::Package;

use super::{Replacement, ValueResolver};
use crate::error::StampError;
use crate::placeholder::Placeholder;

const ISO_DATE: &str = "%Y-%m-%d";

enum Parsed {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

fn parse(value: &Value) -> Option<Parsed> {
    let text = value.as_str()?;
    if let Ok(date) = NaiveDate::parse_from_str(text, ISO_DATE) {
        return Some(Parsed::Date(date));
    }
    DateTime::parse_from_rfc3339(text).ok().map(Parsed::DateTime)
}

/// Formats date strings with `chrono` strftime patterns.
#[derive(Debug, Clone)]
pub struct DateResolver {
    date_format: String,
    datetime_format: String,
}

impl DateResolver {
    #[must_use]
    pub fn new(date_format: impl Into<String>, datetime_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
            datetime_format: datetime_format.into(),
        }
    }
}

impl ValueResolver for DateResolver {
    fn name(&self) -> &str {
        "date"
    }

    fn can_resolve(&self, value: &Value) -> bool {
        parse(value).is_some()
    }

    fn resolve(
        &self,
        _package: &mut Package,
        placeholder: &Placeholder,
        value: &Value,
    ) -> Result<Replacement, StampError> {
        let mut text = String::new();
        // An invalid pattern surfaces as a formatting error instead of a panic.
        let written = match parse(value) {
            Some(Parsed::Date(date)) => write!(text, "{}", date.format(&self.date_format)),
            Some(Parsed::DateTime(datetime)) => {
                write!(text, "{}", datetime.format(&self.datetime_format))
            }
            None => return Ok(Replacement::Text(stamp_expr::display(value))),
        };
        written.map_err(|_| {
            StampError::structural("invalid date format pattern")
                .with_expression(placeholder.expression.clone())
        })?;
        Ok(Replacement::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resolver::tests::{package, placeholder};

    fn resolve(resolver: &DateResolver, value: Value) -> String {
        match resolver.resolve(&mut package(), &placeholder(), &value).unwrap() {
            Replacement::Text(text) => text,
            Replacement::Image(_) => panic!("expected text"),
        }
    }

    #[test]
    fn test_iso_date() {
        let resolver = DateResolver::new("%d.%m.%Y", "%H:%M");
        assert!(resolver.can_resolve(&json!("2024-03-01")));
        assert_eq!(resolve(&resolver, json!("2024-03-01")), "01.03.2024");
    }

    #[test]
    fn test_rfc3339() {
        let resolver = DateResolver::new("%Y", "%Y-%m-%d %H:%M");
        assert_eq!(resolve(&resolver, json!("2024-03-01T09:30:00+01:00")), "2024-03-01 09:30");
    }

    #[test]
    fn test_plain_strings_are_not_dates() {
        let resolver = DateResolver::new(ISO_DATE, ISO_DATE);
        assert!(!resolver.can_resolve(&json!("Bart")));
        assert!(!resolver.can_resolve(&json!("2024-13-01")));
        assert!(!resolver.can_resolve(&json!(20_240_301)));
    }

    #[test]
    fn test_invalid_pattern() {
        let resolver = DateResolver::new("%Q", "%Q");
        let err = resolver
            .resolve(&mut package(), &placeholder(), &json!("2024-03-01"))
            .unwrap_err();
        assert_eq!(err.kind, crate::error::StampErrorKind::Structural);
    }
}
