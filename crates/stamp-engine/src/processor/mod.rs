//! Pluggable directive processors.
//!
//! # Two-Phase Processing
//!
//! Directives are handled in two phases per stamping pass:
//!
//! 1. **Recording**: every resolved directive is handed to the
//!    [`Recording`] of the processor that declared it. The recording stores
//!    what it intends to do and may *claim* subtrees: placeholders and nested
//!    comments inside a claimed subtree are left for a later, nested stamp.
//!    The tree is not modified.
//!
//! 2. **Commit**: once the whole tree is scanned and placeholders resolved,
//!    recordings apply their instructions through a [`CommitContext`], in
//!    processor registration order and, within one processor, in recording order.
//!
//! [`Processor::begin`] creates a fresh [`Recording`] for every pass, so no
//! state survives from one stamping call to the next.
//!
//! # Example
//!
//! ```ignore
//! use stamp_engine::processor::{CommitContext, Directive, Invocation, Processor, Recording};
//!
//! struct Uppercase;
//!
//! impl Processor for Uppercase {
//!     fn name(&self) -> &str { "uppercase" }
//!     fn directives(&self) -> &[Directive] { &[Directive::new("uppercase", 0)] }
//!     fn begin(&self) -> Box<dyn Recording + '_> { Box::new(UppercaseRecording::default()) }
//! }
//! ```

mod display_if;
mod repeat_doc_part;
mod repeat_paragraph;
mod repeat_table_row;
mod replace_word;
mod table_resolver;

use serde_json::Value;
use stamp_dom::{NodeId, NodeKind, Package, Tree};

pub use display_if::DisplayIfProcessor;
pub use repeat_doc_part::RepeatDocPartProcessor;
pub use repeat_paragraph::RepeatParagraphProcessor;
pub use repeat_table_row::RepeatTableRowProcessor;
pub use replace_word::ReplaceWordProcessor;
pub use table_resolver::TableResolverProcessor;

use crate::comment::Comment;
use crate::error::StampError;
use crate::stamper::Stamper;

/// A directive a processor answers to: call name and argument count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    pub name: &'static str,
    pub arity: usize,
}

impl Directive {
    #[must_use]
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }
}

/// Where a directive was written.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Governing expression of a comment.
    Comment(&'a Comment),
    /// Inline `#{...}` directive inside this paragraph.
    Paragraph(NodeId),
}

/// A resolved directive call.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub directive: &'a Directive,
    /// Evaluated arguments.
    pub args: Vec<Value>,
    pub target: Target<'a>,
    /// Source expression, for error messages.
    pub expression: &'a str,
}

impl Invocation<'_> {
    /// Node the directive is attached to: the comment start anchor or the paragraph.
    #[must_use]
    pub fn anchor(&self) -> NodeId {
        match self.target {
            Target::Comment(comment) => comment.start,
            Target::Paragraph(paragraph) => paragraph,
        }
    }

    /// Nearest node of `kind` enclosing the anchor.
    pub fn enclosing(&self, tree: &Tree, kind: NodeKind) -> Result<NodeId, StampError> {
        tree.closest(self.anchor(), kind).ok_or_else(|| {
            StampError::structural(format!(
                "{}() must be placed inside a {}",
                self.directive.name,
                kind_label(kind)
            ))
            .with_expression(self.expression)
        })
    }

    /// Argument `index`, `null` when absent.
    #[must_use]
    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }

    /// Argument `index` as a list. `null` is an empty list.
    pub fn list_arg(&self, index: usize) -> Result<Vec<Value>, StampError> {
        match self.arg(index) {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items.clone()),
            other => Err(StampError::unresolved(
                self.expression,
                stamp_expr::ExprError::Type {
                    operation: "repeat over",
                    found: stamp_expr::type_name(other),
                },
            )),
        }
    }

    /// The comment, or a structural error for inline use.
    pub fn comment(&self) -> Result<&Comment, StampError> {
        match self.target {
            Target::Comment(comment) => Ok(comment),
            Target::Paragraph(_) => Err(StampError::structural(format!(
                "{}() can only be used in a comment",
                self.directive.name
            ))
            .with_expression(self.expression)),
        }
    }
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Paragraph => "paragraph",
        NodeKind::TableRow => "table row",
        NodeKind::Table => "table",
        NodeKind::TableCell => "table cell",
        _ => "container",
    }
}

/// Handler for a family of directives.
///
/// Processors hold configuration only and are shared across threads and calls.
pub trait Processor: Send + Sync {
    /// Processor name, for logs.
    fn name(&self) -> &str;

    /// Directives dispatched to this processor.
    fn directives(&self) -> &[Directive];

    /// Start recording for one stamping pass.
    fn begin(&self) -> Box<dyn Recording + '_>;
}

/// Per-pass state of a [`Processor`].
pub trait Recording {
    /// Store the intent of one invocation. Returns the subtrees it claims.
    ///
    /// Must not modify the tree.
    fn record(
        &mut self,
        tree: &Tree,
        invocation: &Invocation<'_>,
    ) -> Result<Vec<NodeId>, StampError>;

    /// Apply the recorded instructions.
    fn commit(self: Box<Self>, ctx: &mut CommitContext<'_>) -> Result<(), StampError>;
}

/// Access to the package and the engine during commit.
pub struct CommitContext<'a> {
    stamper: &'a Stamper,
    package: &'a mut Package,
}

impl<'a> CommitContext<'a> {
    pub(crate) fn new(stamper: &'a Stamper, package: &'a mut Package) -> Self {
        Self { stamper, package }
    }

    /// Document tree.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        self.package.document()
    }

    /// Mutable document tree.
    pub fn tree_mut(&mut self) -> &mut Tree {
        self.package.document_mut()
    }

    /// The whole package.
    pub fn package_mut(&mut self) -> &mut Package {
        self.package
    }

    /// Stamp attached nodes in place with `context`: a full nested pass over
    /// comments, inline directives and placeholders beneath `roots`.
    pub fn stamp_nodes(&mut self, roots: &[NodeId], context: &Value) -> Result<(), StampError> {
        self.stamper.run_pass(self.package, roots, context)
    }

    /// Replace the sibling run `elements` of `parent` with one independently
    /// stamped copy per item, through a sub-document round trip.
    pub fn repeat_region(
        &mut self,
        parent: NodeId,
        elements: &[NodeId],
        items: &[Value],
    ) -> Result<(), StampError> {
        crate::subdoc::repeat(self.stamper, self.package, parent, elements, items)
    }
}

/// Instruction payload shared by the repeat processors: sibling nodes and items.
#[derive(Debug)]
pub(crate) struct Repetition {
    pub(crate) parent: NodeId,
    pub(crate) elements: Vec<NodeId>,
    pub(crate) items: Vec<Value>,
}

impl Repetition {
    /// Elements still attached under the recorded parent.
    pub(crate) fn live_elements(&self, tree: &Tree) -> Vec<NodeId> {
        self.elements
            .iter()
            .copied()
            .filter(|&e| tree.parent(e) == Some(self.parent) && tree.is_attached(e))
            .collect()
    }

    /// Insert one deep copy of the elements per item before the originals,
    /// stamp each item's copies, then remove the originals.
    pub(crate) fn apply_in_place(&self, ctx: &mut CommitContext<'_>) -> Result<(), StampError> {
        let elements = self.live_elements(ctx.tree());
        let Some(index) = elements.first().and_then(|&e| ctx.tree().index_in_parent(e)) else {
            return Ok(());
        };

        let mut copies = Vec::with_capacity(self.items.len());
        let mut offset = index;
        for _ in &self.items {
            let tree = ctx.tree_mut();
            let group: Vec<NodeId> = elements.iter().map(|&e| tree.deep_copy(e)).collect();
            for &copy in &group {
                tree.insert_child(self.parent, offset, copy);
                offset += 1;
            }
            copies.push(group);
        }

        for (group, item) in copies.iter().zip(&self.items) {
            ctx.stamp_nodes(group, item)?;
        }
        ctx.tree_mut().remove_children(self.parent, &elements);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use stamp_dom::parse_str;

    use super::*;

    pub(crate) fn comment_on(tree: &Tree, start: NodeId) -> Comment {
        Comment {
            id: "0".to_owned(),
            expression: String::new(),
            start,
            end: start,
            reference: None,
            parent: tree.root(),
            elements: Vec::new(),
            children: Vec::new(),
            depth: 0,
        }
    }

    #[test]
    fn test_list_arg() {
        let tree = parse_str("<w:p/>").unwrap();
        let directive = Directive::new("repeatParagraph", 1);
        let invocation = |arg: Value| Invocation {
            directive: &directive,
            args: vec![arg],
            target: Target::Paragraph(tree.root()),
            expression: "repeatParagraph(xs)",
        };
        assert!(invocation(Value::Null).list_arg(0).unwrap().is_empty());
        assert_eq!(
            invocation(serde_json::json!([1, 2])).list_arg(0).unwrap().len(),
            2
        );
        let err = invocation(serde_json::json!("x")).list_arg(0).unwrap_err();
        assert_eq!(err.kind, crate::error::StampErrorKind::UnresolvedExpression);
    }

    #[test]
    fn test_enclosing_and_comment_target() {
        let tree = parse_str("<w:body><w:p><w:r><w:t>x</w:t></w:r></w:p></w:body>").unwrap();
        let paragraph = tree.children(tree.root())[0];
        let directive = Directive::new("displayTableRowIf", 1);
        let inline = Invocation {
            directive: &directive,
            args: Vec::new(),
            target: Target::Paragraph(paragraph),
            expression: "displayTableRowIf(x)",
        };
        assert_eq!(inline.enclosing(&tree, NodeKind::Paragraph).unwrap(), paragraph);
        let err = inline.enclosing(&tree, NodeKind::TableRow).unwrap_err();
        assert!(err.message().contains("table row"));
        assert!(inline.comment().is_err());

        let comment = comment_on(&tree, tree.children(paragraph)[0]);
        let commented = Invocation {
            directive: &directive,
            args: Vec::new(),
            target: Target::Comment(&comment),
            expression: "displayTableRowIf(x)",
        };
        assert_eq!(commented.enclosing(&tree, NodeKind::Paragraph).unwrap(), paragraph);
        assert!(commented.comment().is_ok());
    }
}
