//! Read-only template report.

use serde::Serialize;
use stamp_dom::Package;
use stamp_expr::Evaluator;

use crate::comment;
use crate::error::StampError;
use crate::paragraph;
use crate::placeholder::{PlaceholderForm, PlaceholderMatcher};
use crate::policy::UnhandledNodes;
use crate::walker;

/// Comments and placeholders found in a template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateReport {
    pub comments: Vec<CommentSummary>,
    pub placeholders: Vec<PlaceholderSummary>,
}

/// A directive comment.
#[derive(Debug, Clone, Serialize)]
pub struct CommentSummary {
    pub id: String,
    pub expression: String,
    /// Called directive, when the expression is a call.
    pub directive: Option<String>,
    /// Number of enclosing comments.
    pub depth: usize,
    /// Number of block elements the comment covers.
    pub elements: usize,
}

/// A placeholder or inline directive.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceholderSummary {
    pub expression: String,
    pub form: PlaceholderForm,
}

pub(crate) fn report(
    package: &Package,
    matcher: &PlaceholderMatcher,
    evaluator: &Evaluator,
    unhandled: UnhandledNodes,
) -> Result<TemplateReport, StampError> {
    let tree = package.document();
    let body = tree
        .body()
        .ok_or_else(|| StampError::structural("document has no body"))?;

    let comments = comment::collect(tree, package.comments(), &[body], unhandled)?
        .into_iter()
        .map(|c| CommentSummary {
            directive: evaluator
                .parse(&c.expression)
                .ok()
                .and_then(|expr| expr.as_call().map(|(name, _)| name.to_owned())),
            elements: c.elements.len(),
            id: c.id,
            expression: c.expression,
            depth: c.depth,
        })
        .collect();

    let mut placeholders = Vec::new();
    for p in walker::paragraphs(tree, &[body], unhandled)? {
        let text = paragraph::text(tree, p);
        let mut found: Vec<_> = matcher
            .find_all(&text, PlaceholderForm::Directive)
            .into_iter()
            .chain(matcher.find_all(&text, PlaceholderForm::Variable))
            .collect();
        found.sort_by_key(|ph| ph.start);
        placeholders.extend(found.into_iter().map(|ph| PlaceholderSummary {
            expression: ph.expression,
            form: ph.form,
        }));
    }

    Ok(TemplateReport {
        comments,
        placeholders,
    })
}
