//! Value resolvers: turn an evaluated placeholder value into replacement content.
//!
//! Resolvers are tried in order and the first whose
//! [`can_resolve`](ValueResolver::can_resolve) accepts the value wins. When none
//! does, the fallback resolver (if any) is used, otherwise resolution fails with
//! [`StampErrorKind::ResolverNotFound`](crate::StampErrorKind::ResolverNotFound).

mod date;
mod image;
mod text;

use serde_json::Value;
use stamp_config::ResolverConfig;
use stamp_dom::{NodeId, Package, Tree};

pub use date::DateResolver;
pub use image::{IMAGE_KEY, ImageResolver};
pub use text::{JsonResolver, NullResolver, StringResolver};

use crate::error::{StampError, StampErrorKind};
use crate::paragraph::create_run;
use crate::placeholder::Placeholder;

/// An image already added to the package, ready to be embedded in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Relationship id of the media part.
    pub rel_id: String,
    /// Width in EMU.
    pub width: u64,
    /// Height in EMU.
    pub height: u64,
    /// Alternative text.
    pub alt: String,
}

/// Content that takes the place of a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    Text(String),
    Image(ImageRef),
}

impl Replacement {
    /// Build a detached run holding this content.
    pub fn into_run(self, tree: &mut Tree) -> NodeId {
        match self {
            Self::Text(text) => create_run(tree, &text, None),
            Self::Image(image) => image::drawing_run(tree, &image),
        }
    }

    /// Length of the text this replacement contributes to the paragraph.
    #[must_use]
    pub fn text_len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Image(_) => 0,
        }
    }
}

/// Turns a placeholder's value into replacement content.
///
/// Resolvers may add parts to the package (images) while resolving.
pub trait ValueResolver: Send + Sync {
    /// Resolver name, for logs.
    fn name(&self) -> &str;

    /// Whether this resolver handles `value`.
    fn can_resolve(&self, value: &Value) -> bool;

    /// Produce the replacement for `value`.
    fn resolve(
        &self,
        package: &mut Package,
        placeholder: &Placeholder,
        value: &Value,
    ) -> Result<Replacement, StampError>;
}

/// Ordered resolver chain with an optional fallback.
pub struct Resolvers {
    chain: Vec<Box<dyn ValueResolver>>,
    fallback: Option<Box<dyn ValueResolver>>,
}

impl Resolvers {
    /// Built-in chain configured from `[resolvers]`.
    #[must_use]
    pub fn from_config(config: &ResolverConfig) -> Self {
        let chain: Vec<Box<dyn ValueResolver>> = vec![
            Box::new(NullResolver::new(config.null_text.clone())),
            Box::new(ImageResolver),
            Box::new(DateResolver::new(
                config.date_format.clone(),
                config.datetime_format.clone(),
            )),
            Box::new(StringResolver),
        ];
        let fallback: Option<Box<dyn ValueResolver>> = config
            .fallback_to_json
            .then(|| Box::new(JsonResolver) as Box<dyn ValueResolver>);
        Self { chain, fallback }
    }

    /// Put a resolver in front of the chain.
    pub fn prepend(&mut self, resolver: Box<dyn ValueResolver>) {
        self.chain.insert(0, resolver);
    }

    /// Replace the fallback resolver.
    pub fn set_fallback(&mut self, fallback: Option<Box<dyn ValueResolver>>) {
        self.fallback = fallback;
    }

    /// Resolve with the first accepting resolver, then the fallback.
    pub fn resolve(
        &self,
        package: &mut Package,
        placeholder: &Placeholder,
        value: &Value,
    ) -> Result<Replacement, StampError> {
        let resolver = self
            .chain
            .iter()
            .find(|r| r.can_resolve(value))
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                StampError::new(
                    StampErrorKind::ResolverNotFound,
                    format!("no resolver accepts a {} value", stamp_expr::type_name(value)),
                )
                .with_expression(placeholder.expression.clone())
            })?;
        tracing::debug!(resolver = resolver.name(), placeholder = %placeholder.expression, "Resolving placeholder");
        resolver.resolve(package, placeholder, value)
    }
}

impl Default for Resolvers {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl std::fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.chain.iter().map(|r| r.name()).collect();
        f.debug_struct("Resolvers")
            .field("chain", &names)
            .field("fallback", &self.fallback.as_ref().map(|r| r.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::placeholder::PlaceholderForm;

    pub(super) fn placeholder() -> Placeholder {
        Placeholder {
            expression: "${value}".to_owned(),
            content: "value".to_owned(),
            start: 0,
            end: 8,
            form: PlaceholderForm::Variable,
        }
    }

    pub(super) fn package() -> Package {
        Package::from_document_xml("<w:document><w:body/></w:document>").unwrap()
    }

    struct Shout;

    impl ValueResolver for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn can_resolve(&self, value: &Value) -> bool {
            value.is_string()
        }

        fn resolve(
            &self,
            _package: &mut Package,
            _placeholder: &Placeholder,
            value: &Value,
        ) -> Result<Replacement, StampError> {
            Ok(Replacement::Text(stamp_expr::display(value).to_uppercase()))
        }
    }

    #[test]
    fn test_default_chain() {
        let resolvers = Resolvers::default();
        let mut package = package();
        let resolve = |package: &mut Package, value: Value| {
            resolvers.resolve(package, &placeholder(), &value).unwrap()
        };
        assert_eq!(resolve(&mut package, json!(null)), Replacement::Text(String::new()));
        assert_eq!(resolve(&mut package, json!("Bart")), Replacement::Text("Bart".to_owned()));
        assert_eq!(resolve(&mut package, json!(42)), Replacement::Text("42".to_owned()));
        assert_eq!(
            resolve(&mut package, json!({"a": [1]})),
            Replacement::Text(r#"{"a":[1]}"#.to_owned())
        );
    }

    #[test]
    fn test_custom_resolver_goes_first() {
        let mut resolvers = Resolvers::default();
        resolvers.prepend(Box::new(Shout));
        let replacement = resolvers
            .resolve(&mut package(), &placeholder(), &json!("bart"))
            .unwrap();
        assert_eq!(replacement, Replacement::Text("BART".to_owned()));
    }

    #[test]
    fn test_no_resolver() {
        let mut resolvers = Resolvers::from_config(&ResolverConfig {
            fallback_to_json: false,
            ..ResolverConfig::default()
        });
        let err = resolvers
            .resolve(&mut package(), &placeholder(), &json!([1, 2]))
            .unwrap_err();
        assert_eq!(err.kind, StampErrorKind::ResolverNotFound);
        assert_eq!(err.expression(), Some("${value}"));

        resolvers.set_fallback(Some(Box::new(JsonResolver)));
        assert!(resolvers.resolve(&mut package(), &placeholder(), &json!([1])).is_ok());
    }

    #[test]
    fn test_text_len() {
        assert_eq!(Replacement::Text("abc".to_owned()).text_len(), 3);
        let image = Replacement::Image(ImageRef {
            rel_id: "rId1".to_owned(),
            width: 1,
            height: 1,
            alt: String::new(),
        });
        assert_eq!(image.text_len(), 0);
    }
}
