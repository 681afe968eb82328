//! Engine error type.

use stamp_dom::DomError;
use stamp_expr::ExprError;

/// Error categories of a stamping call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StampErrorKind {
    /// An expression could not be parsed or evaluated, or named no directive.
    UnresolvedExpression,
    /// The template tree does not have the shape a directive needs.
    Structural,
    /// Reading, writing or piping a package failed.
    Io,
    /// No value resolver accepts a value.
    ResolverNotFound,
}

/// Stamping error with kind, offending expression and source chain.
///
/// Secondary failures that happened while handling the primary one (for
/// example the consumer side of a sub-document pipe) are kept as
/// [`suppressed`](Self::suppressed) errors.
#[derive(Debug)]
pub struct StampError {
    /// Error category.
    pub kind: StampErrorKind,
    message: String,
    expression: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    suppressed: Vec<StampError>,
}

impl StampError {
    /// Create a new error.
    #[must_use]
    pub fn new(kind: StampErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            expression: None,
            source: None,
            suppressed: Vec::new(),
        }
    }

    /// Expression that failed to evaluate.
    #[must_use]
    pub fn unresolved(expression: impl Into<String>, source: ExprError) -> Self {
        Self::new(StampErrorKind::UnresolvedExpression, "cannot resolve expression")
            .with_expression(expression)
            .with_source(source)
    }

    /// Template shape error.
    #[must_use]
    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(StampErrorKind::Structural, message)
    }

    /// I/O failure.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        Self::new(StampErrorKind::Io, "I/O failure").with_source(err)
    }

    /// Attach the offending expression.
    #[must_use]
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Record a secondary error.
    #[must_use]
    pub fn with_suppressed(mut self, error: StampError) -> Self {
        self.suppressed.push(error);
        self
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Offending expression, when known.
    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// Secondary errors.
    #[must_use]
    pub fn suppressed(&self) -> &[StampError] {
        &self.suppressed
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }
}

impl std::fmt::Display for StampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "Kind: message in 'expr': source (+N suppressed)"
        let kind_str = match self.kind {
            StampErrorKind::UnresolvedExpression => "Unresolved expression",
            StampErrorKind::Structural => "Structural error",
            StampErrorKind::Io => "I/O error",
            StampErrorKind::ResolverNotFound => "No resolver",
        };

        write!(f, "{kind_str}: {}", self.message)?;

        if let Some(expression) = &self.expression {
            write!(f, " in '{expression}'")?;
        }

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if !self.suppressed.is_empty() {
            write!(f, " (+{} suppressed)", self.suppressed.len())?;
        }

        Ok(())
    }
}

impl std::error::Error for StampError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<DomError> for StampError {
    fn from(err: DomError) -> Self {
        let kind = match err {
            DomError::Io(_) => StampErrorKind::Io,
            _ => StampErrorKind::Structural,
        };
        Self::new(kind, "cannot read package").with_source(err)
    }
}
