//! Depth-first document-order traversal.
//!
//! Visits body content, tables, rows, cells, paragraphs, runs and comment
//! anchors. A paragraph is reported after its children, so its runs and any
//! anchors inside them come first. Property elements are never entered.

use stamp_dom::{NodeId, NodeKind, Tree};

use crate::error::StampError;
use crate::policy::UnhandledNodes;

/// Callbacks invoked by [`walk`]. Every method defaults to doing nothing.
pub trait Visitor {
    fn paragraph(&mut self, _tree: &Tree, _paragraph: NodeId) {}
    fn run(&mut self, _tree: &Tree, _run: NodeId) {}
    fn table(&mut self, _tree: &Tree, _table: NodeId) {}
    fn row(&mut self, _tree: &Tree, _row: NodeId) {}
    fn cell(&mut self, _tree: &Tree, _cell: NodeId) {}
    fn comment_start(&mut self, _tree: &Tree, _anchor: NodeId) {}
    fn comment_end(&mut self, _tree: &Tree, _anchor: NodeId) {}
    fn comment_reference(&mut self, _tree: &Tree, _reference: NodeId) {}
}

/// Walk each root in order.
///
/// Elements of [`NodeKind::Other`] are descended into under
/// [`UnhandledNodes::Lenient`] and rejected under [`UnhandledNodes::Strict`].
/// Unknown elements inside a run are never inspected.
pub fn walk(
    tree: &Tree,
    roots: &[NodeId],
    unhandled: UnhandledNodes,
    visitor: &mut dyn Visitor,
) -> Result<(), StampError> {
    let mut walker = Walker {
        tree,
        unhandled,
        visitor,
    };
    for &root in roots {
        walker.visit(root)?;
    }
    Ok(())
}

/// Paragraphs beneath `roots` in document order.
pub fn paragraphs(
    tree: &Tree,
    roots: &[NodeId],
    unhandled: UnhandledNodes,
) -> Result<Vec<NodeId>, StampError> {
    struct Collect(Vec<NodeId>);

    impl Visitor for Collect {
        fn paragraph(&mut self, _tree: &Tree, paragraph: NodeId) {
            self.0.push(paragraph);
        }
    }

    let mut collect = Collect(Vec::new());
    walk(tree, roots, unhandled, &mut collect)?;
    Ok(collect.0)
}

struct Walker<'a> {
    tree: &'a Tree,
    unhandled: UnhandledNodes,
    visitor: &'a mut dyn Visitor,
}

impl Walker<'_> {
    fn visit(&mut self, id: NodeId) -> Result<(), StampError> {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::Document | NodeKind::Body | NodeKind::Hyperlink => self.visit_children(id)?,
            NodeKind::Paragraph => {
                self.visit_children(id)?;
                self.visitor.paragraph(tree, id);
            }
            NodeKind::Run => {
                self.visitor.run(tree, id);
                for &child in tree.children(id) {
                    self.visit_anchor(child);
                }
            }
            NodeKind::Table => {
                self.visitor.table(tree, id);
                self.visit_children(id)?;
            }
            NodeKind::TableRow => {
                self.visitor.row(tree, id);
                self.visit_children(id)?;
            }
            NodeKind::TableCell => {
                self.visitor.cell(tree, id);
                self.visit_children(id)?;
            }
            NodeKind::CommentRangeStart
            | NodeKind::CommentRangeEnd
            | NodeKind::CommentReference => self.visit_anchor(id),
            NodeKind::Other => match self.unhandled {
                UnhandledNodes::Lenient => self.visit_children(id)?,
                UnhandledNodes::Strict => {
                    return Err(StampError::structural(format!(
                        "unsupported element <{}>",
                        tree.node(id).name
                    )));
                }
            },
            NodeKind::ParagraphProperties
            | NodeKind::SectionProperties
            | NodeKind::RunProperties
            | NodeKind::Text
            | NodeKind::Tab
            | NodeKind::Break
            | NodeKind::TableProperties
            | NodeKind::TableGrid
            | NodeKind::TableRowProperties
            | NodeKind::TableCellProperties
            | NodeKind::Drawing
            | NodeKind::Blip
            | NodeKind::BookmarkStart
            | NodeKind::BookmarkEnd
            | NodeKind::ProofError
            | NodeKind::Comments
            | NodeKind::Comment => {}
        }
        Ok(())
    }

    fn visit_children(&mut self, id: NodeId) -> Result<(), StampError> {
        for &child in self.tree.children(id) {
            self.visit(child)?;
        }
        Ok(())
    }

    fn visit_anchor(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::CommentRangeStart => self.visitor.comment_start(tree, id),
            NodeKind::CommentRangeEnd => self.visitor.comment_end(tree, id),
            NodeKind::CommentReference => self.visitor.comment_reference(tree, id),
            _ => {}
        }
    }
}
