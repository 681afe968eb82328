//! Terminal output for render status and template reports.

use std::io;
use std::path::Path;

use console::{Style, Term};
use stamp_engine::{PlaceholderForm, TemplateReport};

use crate::error::CliError;

/// Styled writer over one terminal stream.
pub(crate) struct Output {
    term: Term,
    done: Style,
    warn: Style,
    failed: Style,
    title: Style,
    muted: Style,
}

impl Output {
    /// Status messages on stderr, keeping stdout free for documents.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::with_term(Term::stderr())
    }

    /// Reports on stdout.
    #[must_use]
    pub(crate) fn stdout() -> Self {
        Self::with_term(Term::stdout())
    }

    fn with_term(term: Term) -> Self {
        Self {
            term,
            done: Style::new().green(),
            warn: Style::new().yellow(),
            failed: Style::new().red(),
            title: Style::new().cyan().bold(),
            muted: Style::new().dim(),
        }
    }

    /// Unstyled line, failing if the stream is closed.
    pub(crate) fn line(&self, text: &str) -> io::Result<()> {
        self.term.write_line(text)
    }

    pub(crate) fn written(&self, path: &Path) {
        let _ = self
            .term
            .write_line(&format!("{} {}", self.done.apply_to("Wrote"), path.display()));
    }

    pub(crate) fn warning(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&format!("{} {msg}", self.warn.apply_to("Warning:")));
    }

    /// Error line, followed by any causes the engine suppressed.
    pub(crate) fn failure(&self, err: &CliError) {
        let _ = self
            .term
            .write_line(&format!("{} {err}", self.failed.apply_to("Error:")));
        if let CliError::Stamp(stamp) = err {
            for suppressed in stamp.suppressed() {
                let _ = self
                    .term
                    .write_line(&self.muted.apply_to(format!("  suppressed: {suppressed}")).to_string());
            }
        }
    }

    /// Comments indented by nesting depth, then placeholders in document order.
    pub(crate) fn report(&self, report: &TemplateReport) {
        self.heading(&format!("Comments ({})", report.comments.len()));
        for comment in &report.comments {
            let indent = "  ".repeat(comment.depth + 1);
            let directive = match &comment.directive {
                Some(name) => name.clone(),
                None => self.muted.apply_to("(no directive)").to_string(),
            };
            let _ = self.term.write_line(&format!(
                "{indent}#{} {directive}: {} ({} element(s))",
                comment.id, comment.expression, comment.elements
            ));
        }

        self.heading(&format!("Placeholders ({})", report.placeholders.len()));
        for placeholder in &report.placeholders {
            let form = match placeholder.form {
                PlaceholderForm::Variable => "variable",
                PlaceholderForm::Directive => "directive",
            };
            let _ = self
                .term
                .write_line(&format!("  {form:<9} {}", placeholder.expression));
        }
    }

    fn heading(&self, text: &str) {
        let _ = self.term.write_line(&self.title.apply_to(text).to_string());
    }
}
