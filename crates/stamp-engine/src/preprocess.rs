//! Template hygiene applied once before discovery.
//!
//! Word splits text into runs for reasons invisible to the author (spell check
//! markers, revision ids, cursor history). These passes undo the splits that
//! would otherwise cut placeholders apart.

use stamp_config::PreprocessConfig;
use stamp_dom::{NodeId, NodeKind, Tree};

use crate::paragraph::{run_properties, run_text, set_run_text};

/// A rewrite of the document tree run before stamping.
pub trait Preprocessor: Send + Sync {
    /// Name, for logs.
    fn name(&self) -> &str;

    /// Rewrite the tree in place.
    fn process(&self, tree: &mut Tree);
}

/// Preprocessors enabled by `[preprocess]`, in application order.
#[must_use]
pub fn from_config(config: &PreprocessConfig) -> Vec<Box<dyn Preprocessor>> {
    let mut preprocessors: Vec<Box<dyn Preprocessor>> = Vec::new();
    if config.remove_proof_errors {
        preprocessors.push(Box::new(RemoveProofErrors));
    }
    if config.merge_runs {
        preprocessors.push(Box::new(MergeSameStyleRuns));
    }
    preprocessors
}

/// Strips `w:proofErr` spelling and grammar markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveProofErrors;

impl Preprocessor for RemoveProofErrors {
    fn name(&self) -> &str {
        "remove-proof-errors"
    }

    fn process(&self, tree: &mut Tree) {
        for marker in tree.descendants_of_kind(tree.root(), NodeKind::ProofError) {
            tree.detach(marker);
        }
    }
}

/// Merges adjacent text-only runs that carry identical formatting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeSameStyleRuns;

impl Preprocessor for MergeSameStyleRuns {
    fn name(&self) -> &str {
        "merge-same-style-runs"
    }

    fn process(&self, tree: &mut Tree) {
        for paragraph in tree.descendants_of_kind(tree.root(), NodeKind::Paragraph) {
            merge_runs(tree, paragraph);
        }
    }
}

fn merge_runs(tree: &mut Tree, paragraph: NodeId) {
    let children = tree.children(paragraph).to_vec();
    let mut merged = Vec::new();
    let mut current: Option<(NodeId, String)> = None;

    for child in children {
        if !is_text_only(tree, child) {
            flush(tree, current.take());
            continue;
        }
        match current.as_mut() {
            Some((target, text)) if same_formatting(tree, *target, child) => {
                text.push_str(&run_text(tree, child));
                merged.push(child);
            }
            _ => {
                flush(tree, current.take());
                current = Some((child, run_text(tree, child)));
            }
        }
    }
    flush(tree, current);

    if !merged.is_empty() {
        tree.remove_children(paragraph, &merged);
    }
}

fn flush(tree: &mut Tree, pending: Option<(NodeId, String)>) {
    if let Some((run, text)) = pending
        && text != run_text(tree, run)
    {
        set_run_text(tree, run, &text);
    }
}

/// A run holding at most a `w:rPr` followed by `w:t` elements.
fn is_text_only(tree: &Tree, node: NodeId) -> bool {
    tree.kind(node) == NodeKind::Run
        && tree
            .children(node)
            .iter()
            .enumerate()
            .all(|(i, &c)| match tree.kind(c) {
                NodeKind::Text => true,
                NodeKind::RunProperties => i == 0,
                _ => false,
            })
}

fn same_formatting(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    match (run_properties(tree, a), run_properties(tree, b)) {
        (None, None) => true,
        (Some(x), Some(y)) => tree.same_structure(x, tree, y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use stamp_dom::parse_str;

    use super::*;
    use crate::paragraph::indexed_runs;

    fn texts(tree: &Tree) -> Vec<String> {
        indexed_runs(tree, tree.root())
            .iter()
            .map(|r| run_text(tree, r.run))
            .collect()
    }

    #[test]
    fn test_merges_split_placeholder() {
        let mut tree = parse_str(
            "<w:p><w:r><w:t>Hello $</w:t></w:r><w:r><w:t>{na</w:t></w:r><w:r><w:t>me}</w:t></w:r></w:p>",
        )
        .unwrap();
        MergeSameStyleRuns.process(&mut tree);
        assert_eq!(texts(&tree), vec!["Hello ${name}"]);
    }

    #[test]
    fn test_keeps_different_formatting_apart() {
        let mut tree = parse_str(
            "<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>a</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>b</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>c</w:t></w:r><w:r><w:t>d</w:t></w:r></w:p>",
        )
        .unwrap();
        MergeSameStyleRuns.process(&mut tree);
        assert_eq!(texts(&tree), vec!["ab", "c", "d"]);
    }

    #[test]
    fn test_anchors_and_tabs_break_merging() {
        let mut tree = parse_str(
            r#"<w:p><w:r><w:t>a</w:t></w:r><w:commentRangeStart w:id="1"/><w:r><w:t>b</w:t></w:r><w:r><w:tab/><w:t>c</w:t></w:r><w:r><w:t>d</w:t></w:r></w:p>"#,
        )
        .unwrap();
        MergeSameStyleRuns.process(&mut tree);
        assert_eq!(texts(&tree), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_remove_proof_errors_then_merge() {
        let mut tree = parse_str(
            r#"<w:p><w:r><w:t>${na</w:t></w:r><w:proofErr w:type="spellStart"/><w:r><w:t>me}</w:t></w:r><w:proofErr w:type="spellEnd"/></w:p>"#,
        )
        .unwrap();
        for preprocessor in from_config(&PreprocessConfig::default()) {
            preprocessor.process(&mut tree);
        }
        assert_eq!(texts(&tree), vec!["${name}"]);
        assert!(tree.descendants_of_kind(tree.root(), NodeKind::ProofError).is_empty());
    }
}
