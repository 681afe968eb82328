//! Placeholder matching in aggregate paragraph text.

use regex::Regex;
use serde::Serialize;
use stamp_config::PlaceholderConfig;

/// Which delimiter pair a placeholder was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaceholderForm {
    /// `${expression}`, replaced by its resolved value.
    Variable,
    /// `#{directive(args)}`, dispatched to a processor with the paragraph as target.
    Directive,
}

/// A delimited expression found in a paragraph's aggregate text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Raw text including delimiters.
    pub expression: String,
    /// Text between the delimiters.
    pub content: String,
    /// Byte offset of the opening delimiter.
    pub start: usize,
    /// Byte offset one past the closing delimiter.
    pub end: usize,
    pub form: PlaceholderForm,
}

/// Finds placeholders of both forms using the configured delimiters.
#[derive(Debug, Clone)]
pub struct PlaceholderMatcher {
    variable: Regex,
    directive: Regex,
}

impl PlaceholderMatcher {
    /// Build a matcher from delimiter pairs.
    #[must_use]
    pub fn new(config: &PlaceholderConfig) -> Self {
        Self {
            variable: delimited(&config.variable_prefix, &config.variable_suffix),
            directive: delimited(&config.directive_prefix, &config.directive_suffix),
        }
    }

    /// Leftmost placeholder of `form` starting at or after byte `from`.
    #[must_use]
    pub fn find(&self, text: &str, form: PlaceholderForm, from: usize) -> Option<Placeholder> {
        if from > text.len() {
            return None;
        }
        let captures = self.regex(form).captures_at(text, from)?;
        let whole = captures.get(0)?;
        let content = captures.get(1)?;
        Some(Placeholder {
            expression: whole.as_str().to_owned(),
            content: content.as_str().to_owned(),
            start: whole.start(),
            end: whole.end(),
            form,
        })
    }

    /// All non-overlapping placeholders of `form`, left to right.
    #[must_use]
    pub fn find_all(&self, text: &str, form: PlaceholderForm) -> Vec<Placeholder> {
        let mut found = Vec::new();
        let mut from = 0;
        while let Some(placeholder) = self.find(text, form, from) {
            from = placeholder.end;
            found.push(placeholder);
        }
        found
    }

    fn regex(&self, form: PlaceholderForm) -> &Regex {
        match form {
            PlaceholderForm::Variable => &self.variable,
            PlaceholderForm::Directive => &self.directive,
        }
    }
}

impl Default for PlaceholderMatcher {
    fn default() -> Self {
        Self::new(&PlaceholderConfig::default())
    }
}

fn delimited(prefix: &str, suffix: &str) -> Regex {
    let pattern = format!("(?s){}(.+?){}", regex::escape(prefix), regex::escape(suffix));
    // Both parts are escaped literals, so the pattern is always valid.
    Regex::new(&pattern).expect("escaped delimiter pattern")
}
