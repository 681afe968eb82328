//! Run addressing and in-place text replacement inside paragraphs.
//!
//! A paragraph's aggregate text is the concatenation of the texts of its direct
//! `w:r` children. Offsets are byte offsets into that text. Nothing here caches
//! offsets: every call recomputes [`IndexedRun`]s from the current tree.

use stamp_dom::{NodeId, NodeKind, Tree, create_text_element, names};

/// A run with its span in the paragraph's aggregate text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedRun {
    /// The `w:r` node.
    pub run: NodeId,
    /// Position among the paragraph's children.
    pub index: usize,
    /// First byte of the run's text in the aggregate text.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
}

impl IndexedRun {
    /// Whether the run shares at least one byte with `[start, end)`.
    #[must_use]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Text of a run: the concatenation of its `w:t` children.
#[must_use]
pub fn run_text(tree: &Tree, run: NodeId) -> String {
    tree.children(run)
        .iter()
        .filter(|&&c| tree.kind(c) == NodeKind::Text)
        .map(|&c| tree.node(c).text.as_str())
        .collect()
}

/// Replace a run's text with a single preserved `w:t`.
pub fn set_run_text(tree: &mut Tree, run: NodeId, text: &str) {
    let texts: Vec<NodeId> = tree
        .children(run)
        .iter()
        .copied()
        .filter(|&c| tree.kind(c) == NodeKind::Text)
        .collect();
    let position = texts
        .first()
        .and_then(|&t| tree.index_in_parent(t))
        .unwrap_or(tree.children(run).len());
    tree.remove_children(run, &texts);
    let t = create_text_element(tree, text);
    tree.insert_child(run, position, t);
}

/// Create a detached run holding `text`, optionally copying formatting.
pub fn create_run(tree: &mut Tree, text: &str, properties: Option<NodeId>) -> NodeId {
    let run = tree.create(names::RUN);
    if let Some(properties) = properties {
        let copy = tree.deep_copy(properties);
        tree.append_child(run, copy);
    }
    let t = create_text_element(tree, text);
    tree.append_child(run, t);
    run
}

/// Formatting descriptor (`w:rPr`) of a run.
#[must_use]
pub fn run_properties(tree: &Tree, run: NodeId) -> Option<NodeId> {
    tree.child_of_kind(run, NodeKind::RunProperties)
}

/// Runs of a paragraph with their aggregate-text spans.
#[must_use]
pub fn indexed_runs(tree: &Tree, paragraph: NodeId) -> Vec<IndexedRun> {
    let mut offset = 0;
    tree.children(paragraph)
        .iter()
        .enumerate()
        .filter(|&(_, &c)| tree.kind(c) == NodeKind::Run)
        .map(|(index, &run)| {
            let len = run_text(tree, run).len();
            let indexed = IndexedRun {
                run,
                index,
                start: offset,
                end: offset + len,
            };
            offset += len;
            indexed
        })
        .collect()
}

/// Aggregate text of a paragraph.
#[must_use]
pub fn text(tree: &Tree, paragraph: NodeId) -> String {
    tree.children(paragraph)
        .iter()
        .filter(|&&c| tree.kind(c) == NodeKind::Run)
        .map(|&run| run_text(tree, run))
        .collect()
}

/// Replace `[start, end)` of the paragraph's aggregate text with `replacement`.
///
/// `replacement` is a detached run of the same tree; it takes over the
/// formatting of the first affected run. Runs outside the span are untouched.
/// Returns `false` (and leaves `replacement` detached) when no run overlaps
/// the span.
pub fn replace(
    tree: &mut Tree,
    paragraph: NodeId,
    start: usize,
    end: usize,
    replacement: NodeId,
) -> bool {
    let affected: Vec<IndexedRun> = indexed_runs(tree, paragraph)
        .into_iter()
        .filter(|r| r.overlaps(start, end))
        .collect();
    let (Some(&first), Some(&last)) = (affected.first(), affected.last()) else {
        return false;
    };

    inherit_properties(tree, first.run, replacement);

    if affected.len() == 1 {
        replace_in_run(tree, paragraph, first, start, end, replacement);
        return true;
    }

    let first_text = run_text(tree, first.run);
    let last_text = run_text(tree, last.run);
    tree.insert_after(first.run, replacement);

    set_run_text(tree, first.run, &first_text[..start - first.start]);
    set_run_text(tree, last.run, &last_text[end - last.start..]);

    let mut removed: Vec<NodeId> = affected[1..affected.len() - 1]
        .iter()
        .map(|r| r.run)
        .collect();
    removed.extend(
        [first.run, last.run]
            .into_iter()
            .filter(|&r| is_empty_text_run(tree, r)),
    );
    tree.remove_children(paragraph, &removed);
    true
}

/// Remove `[start, end)` from the paragraph's aggregate text.
pub fn remove_span(tree: &mut Tree, paragraph: NodeId, start: usize, end: usize) -> bool {
    let placeholder = create_run(tree, "", None);
    let replaced = replace(tree, paragraph, start, end, placeholder);
    tree.detach(placeholder);
    replaced
}

/// Replace all text of a paragraph, keeping the first run's formatting.
pub fn set_text(tree: &mut Tree, paragraph: NodeId, text: &str) {
    let runs = indexed_runs(tree, paragraph);
    match runs.split_first() {
        Some((first, rest)) => {
            set_run_text(tree, first.run, text);
            let rest: Vec<NodeId> = rest.iter().map(|r| r.run).collect();
            tree.remove_children(paragraph, &rest);
        }
        None => {
            let run = create_run(tree, text, None);
            tree.append_child(paragraph, run);
        }
    }
}

fn replace_in_run(
    tree: &mut Tree,
    paragraph: NodeId,
    run: IndexedRun,
    start: usize,
    end: usize,
    replacement: NodeId,
) {
    let text = run_text(tree, run.run);
    let (local_start, local_end) = (start - run.start, end - run.start);

    if local_start == 0 && local_end == text.len() {
        tree.insert_child(paragraph, run.index, replacement);
        tree.detach(run.run);
    } else if local_start == 0 {
        set_run_text(tree, run.run, &text[local_end..]);
        tree.insert_child(paragraph, run.index, replacement);
    } else if local_end == text.len() {
        set_run_text(tree, run.run, &text[..local_start]);
        tree.insert_after(run.run, replacement);
    } else {
        let suffix = tree.deep_copy(run.run);
        set_run_text(tree, run.run, &text[..local_start]);
        set_run_text(tree, suffix, &text[local_end..]);
        tree.insert_after(run.run, replacement);
        tree.insert_after(replacement, suffix);
    }
}

/// Give `replacement` a copy of `source`'s `w:rPr`, replacing its own.
fn inherit_properties(tree: &mut Tree, source: NodeId, replacement: NodeId) {
    let Some(properties) = run_properties(tree, source) else {
        return;
    };
    if let Some(existing) = run_properties(tree, replacement) {
        tree.detach(existing);
    }
    let copy = tree.deep_copy(properties);
    tree.insert_child(replacement, 0, copy);
}

/// A run holding only formatting and empty text.
fn is_empty_text_run(tree: &Tree, run: NodeId) -> bool {
    tree.children(run).iter().all(|&c| match tree.kind(c) {
        NodeKind::RunProperties => true,
        NodeKind::Text => tree.node(c).text.is_empty(),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use stamp_dom::parse_str;

    use super::*;

    fn paragraph(xml: &str) -> (Tree, NodeId) {
        let tree = parse_str(xml).unwrap();
        let root = tree.root();
        (tree, root)
    }

    fn run_texts(tree: &Tree, p: NodeId) -> Vec<String> {
        indexed_runs(tree, p)
            .iter()
            .map(|r| run_text(tree, r.run))
            .collect()
    }

    fn bold(tree: &Tree, run: NodeId) -> bool {
        run_properties(tree, run)
            .is_some_and(|rpr| tree.child_of_kind(rpr, NodeKind::Other).is_some())
    }

    #[test]
    fn test_indexed_runs_are_contiguous() {
        let (tree, p) = paragraph(
            "<w:p><w:r><w:t>Hel</w:t></w:r><w:bookmarkStart/><w:r><w:t>lo</w:t><w:t> you</w:t></w:r><w:r/></w:p>",
        );
        let runs = indexed_runs(&tree, p);
        assert_eq!(
            runs.iter().map(|r| (r.index, r.start, r.end)).collect::<Vec<_>>(),
            vec![(0, 0, 3), (2, 3, 9), (3, 9, 9)]
        );
        assert_eq!(text(&tree, p), "Hello you");
    }

    #[test]
    fn test_replace_inside_single_run() {
        let (mut tree, p) =
            paragraph("<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>A${x}B</w:t></w:r></w:p>");
        let x = create_run(&mut tree, "X", None);

        assert!(replace(&mut tree, p, 1, 5, x));

        assert_eq!(run_texts(&tree, p), vec!["A", "X", "B"]);
        let runs = indexed_runs(&tree, p);
        assert!(runs.iter().all(|r| bold(&tree, r.run)));
    }

    #[test]
    fn test_replace_whole_run() {
        let (mut tree, p) = paragraph("<w:p><w:r><w:t>a</w:t></w:r><w:r><w:t>${x}</w:t></w:r></w:p>");
        let x = create_run(&mut tree, "X", None);
        assert!(replace(&mut tree, p, 1, 5, x));
        assert_eq!(run_texts(&tree, p), vec!["a", "X"]);
        assert_eq!(tree.children(p)[1], x);
    }

    #[test]
    fn test_replace_at_run_start() {
        let (mut tree, p) = paragraph("<w:p><w:r><w:t>${x} tail</w:t></w:r></w:p>");
        let x = create_run(&mut tree, "X", None);
        assert!(replace(&mut tree, p, 0, 4, x));
        assert_eq!(run_texts(&tree, p), vec!["X", " tail"]);
    }

    #[test]
    fn test_replace_at_run_end() {
        let (mut tree, p) = paragraph("<w:p><w:r><w:t>head ${x}</w:t></w:r></w:p>");
        let x = create_run(&mut tree, "X", None);
        assert!(replace(&mut tree, p, 5, 9, x));
        assert_eq!(run_texts(&tree, p), vec!["head ", "X"]);
    }

    #[test]
    fn test_replace_across_runs() {
        let (mut tree, p) = paragraph(
            "<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>Hello ${na</w:t></w:r><w:r><w:t>m</w:t></w:r><w:r><w:t>e}!</w:t></w:r></w:p>",
        );
        let x = create_run(&mut tree, "Bart", None);
        assert!(replace(&mut tree, p, 6, 13, x));
        assert_eq!(run_texts(&tree, p), vec!["Hello ", "Bart", "!"]);
        assert!(run_properties(&tree, x).is_some());
    }

    #[test]
    fn test_replace_across_runs_drops_empty_fragments() {
        let (mut tree, p) =
            paragraph("<w:p><w:r><w:t>${</w:t></w:r><w:r><w:t>x}</w:t></w:r></w:p>");
        let x = create_run(&mut tree, "X", None);
        assert!(replace(&mut tree, p, 0, 4, x));
        assert_eq!(run_texts(&tree, p), vec!["X"]);
        assert_eq!(tree.children(p), &[x]);
    }

    #[test]
    fn test_replace_first_run_formatting_wins() {
        let (mut tree, p) = paragraph(
            "<w:p><w:r><w:t>Hel</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>lo ${name}!</w:t></w:r></w:p>",
        );
        let x = create_run(&mut tree, "Bart", None);
        assert!(replace(&mut tree, p, 6, 13, x));
        assert_eq!(run_texts(&tree, p), vec!["Hel", "lo ", "Bart", "!"]);
        assert!(bold(&tree, x));
        let runs = indexed_runs(&tree, p);
        assert!(!bold(&tree, runs[0].run));
    }

    #[test]
    fn test_replace_outside_text_is_noop() {
        let (mut tree, p) = paragraph("<w:p><w:r><w:t>abc</w:t></w:r></w:p>");
        let before = tree.to_xml(p);
        let x = create_run(&mut tree, "X", None);
        assert!(!replace(&mut tree, p, 10, 12, x));
        assert_eq!(tree.to_xml(p), before);
        assert_eq!(tree.parent(x), None);
    }

    #[test]
    fn test_remove_span() {
        let (mut tree, p) = paragraph("<w:p><w:r><w:t>a #{d()} b</w:t></w:r></w:p>");
        assert!(remove_span(&mut tree, p, 2, 8));
        assert_eq!(text(&tree, p), "a  b");
    }

    #[test]
    fn test_set_text_collapses_runs() {
        let (mut tree, p) = paragraph(
            "<w:p><w:pPr/><w:r><w:rPr><w:b/></w:rPr><w:t>a</w:t></w:r><w:r><w:t>b</w:t></w:r></w:p>",
        );
        set_text(&mut tree, p, "new");
        assert_eq!(run_texts(&tree, p), vec!["new"]);
        assert!(bold(&tree, indexed_runs(&tree, p)[0].run));
    }

    #[test]
    fn test_set_text_creates_run() {
        let (mut tree, p) = paragraph("<w:p/>");
        set_text(&mut tree, p, "x");
        assert_eq!(text(&tree, p), "x");
    }

    #[test]
    fn test_set_run_text_keeps_position() {
        let (mut tree, p) =
            paragraph("<w:p><w:r><w:rPr/><w:t>a</w:t><w:tab/><w:t>b</w:t></w:r></w:p>");
        let run = tree.children(p)[0];
        set_run_text(&mut tree, run, "c");
        assert_eq!(
            tree.to_xml(run),
            r#"<w:r><w:rPr/><w:t xml:space="preserve">c</w:t><w:tab/></w:r>"#
        );
    }
}
