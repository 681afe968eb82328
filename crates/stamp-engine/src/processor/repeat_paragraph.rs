//! Repeat paragraphs once per list item.

use stamp_dom::{NodeId, NodeKind, Tree};

use super::{CommitContext, Directive, Invocation, Processor, Recording, Repetition, Target};
use crate::error::StampError;

const DIRECTIVES: &[Directive] = &[Directive::new("repeatParagraph", 1)];

/// `repeatParagraph(list)`: one copy of the paragraph per item, each stamped
/// with the item as context.
///
/// Inline, the enclosing paragraph is repeated. On a comment, every element
/// the comment spans is repeated as a group.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatParagraphProcessor;

impl Processor for RepeatParagraphProcessor {
    fn name(&self) -> &str {
        "repeat-paragraph"
    }

    fn directives(&self) -> &[Directive] {
        DIRECTIVES
    }

    fn begin(&self) -> Box<dyn Recording + '_> {
        Box::new(Repetitions::default())
    }
}

#[derive(Debug, Default)]
struct Repetitions(Vec<Repetition>);

impl Recording for Repetitions {
    fn record(
        &mut self,
        tree: &Tree,
        invocation: &Invocation<'_>,
    ) -> Result<Vec<NodeId>, StampError> {
        let items = invocation.list_arg(0)?;
        let (parent, elements) = match invocation.target {
            Target::Comment(comment) => (comment.parent, comment.elements.clone()),
            Target::Paragraph(_) => {
                let paragraph = invocation.enclosing(tree, NodeKind::Paragraph)?;
                let parent = tree.parent(paragraph).ok_or_else(|| {
                    StampError::structural("repeated paragraph is detached")
                        .with_expression(invocation.expression)
                })?;
                (parent, vec![paragraph])
            }
        };
        tracing::debug!(count = items.len(), elements = elements.len(), "Recorded paragraph repeat");
        self.0.push(Repetition {
            parent,
            elements: elements.clone(),
            items,
        });
        Ok(elements)
    }

    fn commit(self: Box<Self>, ctx: &mut CommitContext<'_>) -> Result<(), StampError> {
        for repetition in &self.0 {
            repetition.apply_in_place(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::testing::{body_texts, commented_para, document, document_xml, para, stamp};

    #[test]
    fn test_comment_repeats_paragraph() {
        let mut package = document(
            &format!("{}{}", commented_para("1", "Name: ${name}"), para("end")),
            &[("1", "repeatParagraph(people)")],
        );
        stamp(
            &mut package,
            &json!({"people": [{"name": "Homer"}, {"name": "Marge"}]}),
        )
        .unwrap();

        assert_eq!(body_texts(&package), vec!["Name: Homer", "Name: Marge", "end"]);
        assert!(!document_xml(&package).contains("comment"));
        let comments = package.comments().unwrap();
        assert!(comments.children(comments.root()).is_empty());
    }

    #[test]
    fn test_inline_repeat_removes_directive_from_copies() {
        let mut package = document(&para("#{repeatParagraph(xs)}- ${this}"), &[]);
        stamp(&mut package, &json!({"xs": ["a", "b", "c"]})).unwrap();
        assert_eq!(body_texts(&package), vec!["- a", "- b", "- c"]);
    }

    #[test]
    fn test_empty_and_null_lists_remove_paragraph() {
        for items in [json!([]), json!(null)] {
            let mut package = document(
                &format!("{}{}", para("#{repeatParagraph(xs)}${this}"), para("after")),
                &[],
            );
            stamp(&mut package, &json!({ "xs": items })).unwrap();
            assert_eq!(body_texts(&package), vec!["after"]);
        }
    }

    #[test]
    fn test_nested_comment_is_stamped_per_item() {
        let body = concat!(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:r><w:t>${name}</w:t></w:r></w:p>"#,
            r#"<w:p><w:commentRangeStart w:id="2"/><w:r><w:t xml:space="preserve">details ${name}</w:t></w:r>"#,
            r#"<w:commentRangeEnd w:id="2"/><w:r><w:commentReference w:id="2"/></w:r>"#,
            r#"<w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p>"#,
        );
        let mut package = document(
            body,
            &[
                ("1", "repeatParagraph(people)"),
                ("2", "displayParagraphIf(visible)"),
            ],
        );
        stamp(
            &mut package,
            &json!({"people": [
                {"name": "A", "visible": true},
                {"name": "B", "visible": false},
            ]}),
        )
        .unwrap();

        assert_eq!(body_texts(&package), vec!["A", "details A", "B"]);
        assert!(!document_xml(&package).contains("comment"));
    }

    #[test]
    fn test_non_list_argument_is_unresolved() {
        let mut package = document(&para("#{repeatParagraph(xs)}x"), &[]);
        let err = stamp(&mut package, &json!({"xs": 3})).unwrap_err();
        assert_eq!(err.kind, crate::StampErrorKind::UnresolvedExpression);
    }
}
