//! Repeat a comment-bounded document part through the sub-document pipeline.

use stamp_dom::{NodeId, Tree};

use super::{CommitContext, Directive, Invocation, Processor, Recording, Repetition};
use crate::error::StampError;

const DIRECTIVES: &[Directive] = &[Directive::new("repeatDocPart", 1)];

/// `repeatDocPart(list)`: the elements a comment spans are extracted into a
/// standalone document, stamped once per item and spliced back in order.
///
/// Unlike [`RepeatParagraphProcessor`](super::RepeatParagraphProcessor), every
/// copy goes through a serialize and parse round trip, so copies share no
/// structure, carry their own images and keep section breaks intact.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatDocPartProcessor;

impl Processor for RepeatDocPartProcessor {
    fn name(&self) -> &str {
        "repeat-doc-part"
    }

    fn directives(&self) -> &[Directive] {
        DIRECTIVES
    }

    fn begin(&self) -> Box<dyn Recording + '_> {
        Box::new(DocParts::default())
    }
}

#[derive(Debug, Default)]
struct DocParts(Vec<Repetition>);

impl Recording for DocParts {
    fn record(
        &mut self,
        _tree: &Tree,
        invocation: &Invocation<'_>,
    ) -> Result<Vec<NodeId>, StampError> {
        let comment = invocation.comment()?;
        let items = invocation.list_arg(0)?;
        tracing::debug!(id = %comment.id, count = items.len(), "Recorded document part repeat");
        self.0.push(Repetition {
            parent: comment.parent,
            elements: comment.elements.clone(),
            items,
        });
        Ok(comment.elements.clone())
    }

    fn commit(self: Box<Self>, ctx: &mut CommitContext<'_>) -> Result<(), StampError> {
        for repetition in &self.0 {
            let elements = repetition.live_elements(ctx.tree());
            if elements.is_empty() {
                continue;
            }
            ctx.repeat_region(repetition.parent, &elements, &repetition.items)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stamp_dom::{NodeKind, names};

    use crate::testing::{body_texts, commented_para, document, document_xml, para, stamp};

    const SECTION: &str = r#"<w:p><w:pPr><w:sectPr><w:pgSz w:w="12240"/></w:sectPr></w:pPr><w:r><w:t>Intro</w:t></w:r></w:p>"#;

    fn part(first: &str, last: &str) -> String {
        format!(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:r><w:t xml:space="preserve">{first}</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">{last}</w:t></w:r><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p>"#
        )
    }

    #[test]
    fn test_repeats_part_and_section_break() {
        let columns = r#"<w:p><w:pPr><w:sectPr><w:type w:val="continuous"/></w:sectPr></w:pPr><w:r><w:t>Columns</w:t></w:r></w:p>"#;
        let body = format!(
            r#"{SECTION}<w:p><w:commentRangeStart w:id="1"/><w:r><w:t xml:space="preserve">Chapter ${{title}}</w:t></w:r></w:p>{columns}<w:p><w:r><w:t xml:space="preserve">by ${{author}}</w:t></w:r><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p>{}"#,
            para("Outro")
        );
        let mut package = document(&body, &[("1", "repeatDocPart(chapters)")]);
        stamp(
            &mut package,
            &json!({"author": "outer", "chapters": [
                {"title": "One", "author": "Ann"},
                {"title": "Two", "author": "Bob"},
            ]}),
        )
        .unwrap();

        assert_eq!(
            body_texts(&package),
            vec![
                "Intro",
                "Chapter One",
                "Columns",
                "by Ann",
                "Chapter Two",
                "Columns",
                "by Bob",
                "Outro"
            ]
        );
        let tree = package.document();
        let breaks = tree.descendants_of_kind(tree.root(), NodeKind::SectionProperties);
        assert_eq!(breaks.len(), 5);
        let body = tree.body().unwrap();
        let children = tree.children(body);
        for index in [2, 5] {
            assert!(tree.to_xml(children[index]).contains("continuous"));
        }
        for index in [3, 6] {
            assert!(tree.to_xml(children[index]).contains("w:pgSz"));
        }
        assert!(!document_xml(&package).contains("comment"));
    }

    #[test]
    fn test_part_without_breaks_stays_in_section() {
        let body = format!("{SECTION}{}{}", part("Item ${this}", "-"), para("End"));
        let mut package = document(&body, &[("1", "repeatDocPart(xs)")]);
        stamp(&mut package, &json!({"xs": ["a", "b", "c"]})).unwrap();

        assert_eq!(
            body_texts(&package),
            vec!["Intro", "Item a", "-", "Item b", "-", "Item c", "-", "End"]
        );
        let tree = package.document();
        assert_eq!(
            tree.descendants_of_kind(tree.root(), NodeKind::SectionProperties)
                .len(),
            1
        );
    }

    #[test]
    fn test_nested_directives_run_per_copy() {
        let body = format!(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:r><w:t xml:space="preserve">Head ${{name}}</w:t></w:r></w:p>{}{}<w:p><w:r><w:t>tail</w:t></w:r><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p>"#,
            commented_para("2", "kid ${this}"),
            commented_para("3", "hidden"),
        );
        let mut package = document(
            &body,
            &[
                ("1", "repeatDocPart(groups)"),
                ("2", "repeatParagraph(kids)"),
                ("3", "displayParagraphIf(shown)"),
            ],
        );
        stamp(
            &mut package,
            &json!({"groups": [
                {"name": "A", "kids": ["a1", "a2"], "shown": false},
                {"name": "B", "kids": ["b1"], "shown": true},
            ]}),
        )
        .unwrap();

        assert_eq!(
            body_texts(&package),
            vec!["Head A", "kid a1", "kid a2", "tail", "Head B", "kid b1", "hidden", "tail"]
        );
        assert!(!document_xml(&package).contains("comment"));
        let comments = package.comments().unwrap();
        assert!(comments.children(comments.root()).is_empty());
    }

    #[test]
    fn test_part_without_preceding_break() {
        let mut package = document(&part("${this}", "-"), &[("1", "repeatDocPart(xs)")]);
        stamp(&mut package, &json!({"xs": ["a", "b"]})).unwrap();

        assert_eq!(body_texts(&package), vec!["a", "-", "b", "-"]);
        let tree = package.document();
        assert!(
            tree.descendants_of_kind(tree.root(), NodeKind::SectionProperties)
                .is_empty()
        );
    }

    #[test]
    fn test_images_added_in_copies_are_relinked() {
        let mut package = document(&part("${logo}", "${name}"), &[("1", "repeatDocPart(items)")]);
        stamp(
            &mut package,
            &json!({"items": [
                {"name": "first", "logo": {"$image": {"data": "YWJj"}}},
                {"name": "second", "logo": {"$image": {"data": "ZGVm"}}},
            ]}),
        )
        .unwrap();

        let tree = package.document();
        let ids: Vec<&str> = tree
            .descendants_of_kind(tree.root(), NodeKind::Blip)
            .into_iter()
            .filter_map(|blip| tree.attr(blip, names::EMBED_ATTR))
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 2);
        assert_eq!(package.image(ids[0]).unwrap().data, b"abc");
        assert_eq!(package.image(ids[1]).unwrap().data, b"def");
    }

    #[test]
    fn test_inline_use_is_structural() {
        let mut package = document(&para("#{repeatDocPart(xs)}"), &[]);
        let err = stamp(&mut package, &json!({"xs": []})).unwrap_err();
        assert_eq!(err.kind, crate::StampErrorKind::Structural);
    }
}
