//! The stamping engine.
//!
//! A pass over a set of roots runs in this order:
//!
//! 1. discover comments and record each governing directive, skipping
//!    comments inside subtrees an earlier directive claimed;
//! 2. record inline `#{...}` directives of unclaimed paragraphs and remove
//!    their text;
//! 3. resolve `${...}` placeholders of unclaimed paragraphs;
//! 4. remove the anchors of handled comments and commit every recording in
//!    processor registration order.
//!
//! Claimed subtrees are stamped by the committing processor, usually with a
//! different context, through a nested pass of the same kind.

use std::io::{BufRead, Write};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use stamp_config::{Config, PlaceholderConfig};
use stamp_dom::{NodeId, Package, Tree};
use stamp_expr::{Evaluator, ExprError};

use crate::comment::{self, Comment};
use crate::error::{StampError, StampErrorKind};
use crate::inspect::{self, TemplateReport};
use crate::paragraph;
use crate::placeholder::{Placeholder, PlaceholderForm, PlaceholderMatcher};
use crate::policy::{ResolutionPolicy, UnhandledNodes};
use crate::preprocess::{self, Preprocessor};
use crate::processor::{
    CommitContext, DisplayIfProcessor, Invocation, Processor, Recording, RepeatDocPartProcessor,
    RepeatParagraphProcessor, RepeatTableRowProcessor, ReplaceWordProcessor, Target,
    TableResolverProcessor,
};
use crate::resolver::{Replacement, Resolvers, ValueResolver};
use crate::walker;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Built-in processors in registration (and commit) order.
fn default_processors() -> Vec<Box<dyn Processor>> {
    vec![
        Box::new(DisplayIfProcessor),
        Box::new(ReplaceWordProcessor),
        Box::new(TableResolverProcessor),
        Box::new(RepeatParagraphProcessor),
        Box::new(RepeatTableRowProcessor),
        Box::new(RepeatDocPartProcessor),
    ]
}

/// Fills document templates with data.
///
/// A `Stamper` holds configuration only. It is `Send + Sync` and every call
/// starts from fresh per-pass state, so one instance can stamp many documents
/// concurrently.
///
/// # Example
///
/// ```ignore
/// use serde_json::json;
/// use stamp_engine::{ResolutionPolicy, Stamper};
///
/// let stamper = Stamper::new().with_policy(ResolutionPolicy::Substitute("N/A".to_owned()));
/// let output = stamper.stamp(&std::fs::read("template.xml")?, &json!({"name": "Homer"}))?;
/// ```
pub struct Stamper {
    evaluator: Evaluator,
    matcher: PlaceholderMatcher,
    policy: ResolutionPolicy,
    unhandled: UnhandledNodes,
    processors: Vec<Box<dyn Processor>>,
    resolvers: Resolvers,
    preprocessors: Vec<Box<dyn Preprocessor>>,
}

impl std::fmt::Debug for Stamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let processors: Vec<&str> = self.processors.iter().map(|p| p.name()).collect();
        let preprocessors: Vec<&str> = self.preprocessors.iter().map(|p| p.name()).collect();
        f.debug_struct("Stamper")
            .field("evaluator", &self.evaluator)
            .field("matcher", &self.matcher)
            .field("policy", &self.policy)
            .field("unhandled", &self.unhandled)
            .field("processors", &processors)
            .field("resolvers", &self.resolvers)
            .field("preprocessors", &preprocessors)
            .finish()
    }
}

impl Default for Stamper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stamper {
    /// Engine with the default configuration and all built-in processors.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Engine configured from a loaded [`Config`].
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            evaluator: Evaluator::new(),
            matcher: PlaceholderMatcher::new(&config.placeholders),
            policy: ResolutionPolicy::from(&config.resolution),
            unhandled: UnhandledNodes::from(config.processing.unhandled_nodes),
            processors: default_processors(),
            resolvers: Resolvers::from_config(&config.resolvers),
            preprocessors: preprocess::from_config(&config.preprocess),
        }
    }

    /// Use a custom evaluator, e.g. one with extra functions registered.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Set the policy for unresolved expressions.
    #[must_use]
    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the treatment of unknown elements.
    #[must_use]
    pub fn with_unhandled_nodes(mut self, unhandled: UnhandledNodes) -> Self {
        self.unhandled = unhandled;
        self
    }

    /// Use different placeholder delimiters.
    #[must_use]
    pub fn with_placeholders(mut self, config: &PlaceholderConfig) -> Self {
        self.matcher = PlaceholderMatcher::new(config);
        self
    }

    /// Register a processor after the built-in ones.
    ///
    /// Directive names are matched in registration order, so a built-in
    /// directive cannot be overridden.
    #[must_use]
    pub fn with_processor(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Put a value resolver in front of the built-in chain.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl ValueResolver + 'static) -> Self {
        self.resolvers.prepend(Box::new(resolver));
        self
    }

    /// Replace the fallback resolver. `None` makes unmatched values fail.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<Box<dyn ValueResolver>>) -> Self {
        self.resolvers.set_fallback(fallback);
        self
    }

    /// Append a preprocessor.
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessors.push(Box::new(preprocessor));
        self
    }

    /// Stamp a template package and return the serialized result.
    pub fn stamp(&self, template: &[u8], context: &Value) -> Result<Vec<u8>, StampError> {
        let mut package = Package::parse(template)?;
        self.stamp_package(&mut package, context)?;
        Ok(package.to_bytes())
    }

    /// Stamp a template read from `template` and write the result to `output`.
    pub fn stamp_to<R: BufRead, W: Write>(
        &self,
        template: R,
        context: &Value,
        output: W,
    ) -> Result<(), StampError> {
        let mut package = Package::read_from(template)?;
        self.stamp_package(&mut package, context)?;
        package.write_to(output).map_err(StampError::io)
    }

    /// Stamp with any serializable context.
    pub fn stamp_serializable<T: Serialize>(
        &self,
        template: &[u8],
        context: &T,
    ) -> Result<Vec<u8>, StampError> {
        let context = serde_json::to_value(context).map_err(|e| {
            StampError::structural("context cannot be represented as JSON").with_source(e)
        })?;
        self.stamp(template, &context)
    }

    /// Stamp a parsed package in place.
    pub fn stamp_package(&self, package: &mut Package, context: &Value) -> Result<(), StampError> {
        let start = Instant::now();
        tracing::info!(
            processors = self.processors.len(),
            preprocessors = self.preprocessors.len(),
            "Stamping document"
        );
        self.preprocess(package);
        self.stamp_nested(package, context)?;
        tracing::info!(elapsed_ms = elapsed_ms(start), "Stamped document");
        Ok(())
    }

    /// Describe the comments and placeholders of a template without stamping it.
    pub fn inspect(&self, template: &[u8]) -> Result<TemplateReport, StampError> {
        let mut package = Package::parse(template)?;
        self.preprocess(&mut package);
        inspect::report(&package, &self.matcher, &self.evaluator, self.unhandled)
    }

    fn preprocess(&self, package: &mut Package) {
        for preprocessor in &self.preprocessors {
            tracing::debug!(preprocessor = preprocessor.name(), "Preprocessing template");
            preprocessor.process(package.document_mut());
        }
    }

    /// Stamp the whole body of an already preprocessed package.
    pub(crate) fn stamp_nested(
        &self,
        package: &mut Package,
        context: &Value,
    ) -> Result<(), StampError> {
        let body = package
            .document()
            .body()
            .ok_or_else(|| StampError::structural("document has no body"))?;
        self.run_pass(package, &[body], context)?;
        comment::sweep_orphans(package);
        Ok(())
    }

    /// One recording and commit pass over `roots`.
    pub(crate) fn run_pass(
        &self,
        package: &mut Package,
        roots: &[NodeId],
        context: &Value,
    ) -> Result<(), StampError> {
        let comments = comment::collect(
            package.document(),
            package.comments(),
            roots,
            self.unhandled,
        )?;
        let mut recordings: Vec<Box<dyn Recording + '_>> =
            self.processors.iter().map(|p| p.begin()).collect();
        let mut claims: Vec<NodeId> = Vec::new();
        let mut handled: Vec<&Comment> = Vec::new();

        for comment in &comments {
            let tree = package.document();
            if is_claimed(tree, &claims, comment.start) {
                tracing::debug!(id = %comment.id, "Deferring comment inside claimed region");
                continue;
            }
            let recorded = self.dispatch(
                tree,
                &mut recordings,
                &comment.expression,
                Target::Comment(comment),
                context,
            );
            match recorded {
                Ok(claimed) => {
                    claims.extend(claimed);
                    handled.push(comment);
                }
                Err(err) => {
                    if self.tolerate(err)?.is_some() {
                        handled.push(comment);
                    }
                }
            }
        }

        let paragraphs = walker::paragraphs(package.document(), roots, self.unhandled)?;
        for &p in &paragraphs {
            self.record_inline(package, &mut recordings, &mut claims, p, context)?;
        }
        for &p in &paragraphs {
            if !is_claimed(package.document(), &claims, p) {
                self.resolve_placeholders(package, p, context)?;
            }
        }

        let tree = package.document_mut();
        for comment in handled {
            comment::remove_anchors(tree, comment);
        }
        let mut ctx = CommitContext::new(self, package);
        for recording in recordings {
            recording.commit(&mut ctx)?;
        }
        Ok(())
    }

    /// Record the inline directives of one paragraph and remove their text.
    fn record_inline(
        &self,
        package: &mut Package,
        recordings: &mut [Box<dyn Recording + '_>],
        claims: &mut Vec<NodeId>,
        p: NodeId,
        context: &Value,
    ) -> Result<(), StampError> {
        let mut cursor = 0;
        while !is_claimed(package.document(), claims, p) {
            let text = paragraph::text(package.document(), p);
            let Some(found) = self.matcher.find(&text, PlaceholderForm::Directive, cursor) else {
                break;
            };
            let recorded = self.dispatch(
                package.document(),
                recordings,
                &found.content,
                Target::Paragraph(p),
                context,
            );
            let tree = package.document_mut();
            match recorded {
                Ok(claimed) => {
                    claims.extend(claimed);
                    paragraph::remove_span(tree, p, found.start, found.end);
                    cursor = found.start;
                }
                Err(err) => match self.tolerate(err)? {
                    Some(text) => cursor = substitute(tree, p, &found, text),
                    None => cursor = found.end,
                },
            }
        }
        Ok(())
    }

    /// Replace the `${...}` placeholders of one paragraph, left to right.
    fn resolve_placeholders(
        &self,
        package: &mut Package,
        p: NodeId,
        context: &Value,
    ) -> Result<(), StampError> {
        let mut cursor = 0;
        loop {
            let text = paragraph::text(package.document(), p);
            let Some(found) = self.matcher.find(&text, PlaceholderForm::Variable, cursor) else {
                return Ok(());
            };
            match self.resolve(package, &found, context) {
                Ok(replacement) => {
                    let len = replacement.text_len();
                    let tree = package.document_mut();
                    let run = replacement.into_run(tree);
                    cursor = if paragraph::replace(tree, p, found.start, found.end, run) {
                        found.start + len
                    } else {
                        found.end
                    };
                }
                Err(err) => match self.tolerate(err)? {
                    Some(text) => cursor = substitute(package.document_mut(), p, &found, text),
                    None => cursor = found.end,
                },
            }
        }
    }

    fn resolve(
        &self,
        package: &mut Package,
        placeholder: &Placeholder,
        context: &Value,
    ) -> Result<Replacement, StampError> {
        let value = self
            .evaluator
            .resolve(&placeholder.content, context)
            .map_err(|e| StampError::unresolved(placeholder.expression.clone(), e))?;
        self.resolvers.resolve(package, placeholder, &value)
    }

    /// Evaluate a directive call and hand it to the processor that declares it.
    fn dispatch(
        &self,
        tree: &Tree,
        recordings: &mut [Box<dyn Recording + '_>],
        source: &str,
        target: Target<'_>,
        context: &Value,
    ) -> Result<Vec<NodeId>, StampError> {
        let expr = self
            .evaluator
            .parse(source)
            .map_err(|e| StampError::unresolved(source, e))?;
        let Some((name, args)) = expr.as_call() else {
            return Err(StampError::unresolved(
                source,
                ExprError::Custom("expression is not a directive call".to_owned()),
            ));
        };

        let mut expected = None;
        for (processor, recording) in self.processors.iter().zip(recordings.iter_mut()) {
            for directive in processor.directives() {
                if directive.name != name {
                    continue;
                }
                if directive.arity != args.len() {
                    expected.get_or_insert(directive.arity);
                    continue;
                }
                let args = args
                    .iter()
                    .map(|arg| self.evaluator.eval(arg, context))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StampError::unresolved(source, e))?;
                let invocation = Invocation {
                    directive,
                    args,
                    target,
                    expression: source,
                };
                tracing::debug!(
                    directive = name,
                    processor = processor.name(),
                    "Recording directive"
                );
                return recording.record(tree, &invocation);
            }
        }

        let error = match expected {
            Some(arity) => ExprError::Arity {
                function: name.to_owned(),
                expected: arity.to_string(),
                found: args.len(),
            },
            None => ExprError::UnknownFunction(name.to_owned()),
        };
        Err(StampError::unresolved(source, error))
    }

    /// Apply the resolution policy to a failure.
    ///
    /// Returns the substitution text, `None` to leave the expression in
    /// place, or the error itself when it must abort the call.
    fn tolerate(&self, err: StampError) -> Result<Option<&str>, StampError> {
        if err.kind != StampErrorKind::UnresolvedExpression {
            return Err(err);
        }
        match &self.policy {
            ResolutionPolicy::FailFast => Err(err),
            ResolutionPolicy::Substitute(text) => {
                tracing::warn!(
                    expression = err.expression().unwrap_or_default(),
                    error = %err,
                    "Substituting unresolved expression"
                );
                Ok(Some(text))
            }
            ResolutionPolicy::PassThrough => {
                tracing::warn!(
                    expression = err.expression().unwrap_or_default(),
                    error = %err,
                    "Leaving unresolved expression in place"
                );
                Ok(None)
            }
        }
    }
}

fn is_claimed(tree: &Tree, claims: &[NodeId], node: NodeId) -> bool {
    claims.iter().any(|&claim| tree.is_ancestor(claim, node))
}

/// Replace a placeholder with substitution text. Returns the next search offset.
fn substitute(tree: &mut Tree, p: NodeId, found: &Placeholder, text: &str) -> usize {
    let run = paragraph::create_run(tree, text, None);
    if paragraph::replace(tree, p, found.start, found.end, run) {
        found.start + text.len()
    } else {
        found.end
    }
}
