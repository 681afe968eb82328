//! Comment-bounded directive regions.
//!
//! A comment is a `w:commentRangeStart` / `w:commentRangeEnd` pair sharing a
//! `w:id`, usually followed by a `w:commentReference` run, plus an entry in the
//! comments part whose text is the governing expression.

use std::collections::{HashMap, HashSet};

use stamp_dom::{NodeId, NodeKind, Package, Tree, names};

use crate::error::StampError;
use crate::policy::UnhandledNodes;
use crate::walker::{self, Visitor};

/// A directive anchor discovered in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// `w:id` shared by the anchors and the comments-part entry.
    pub id: String,
    /// Trimmed text of the comments-part entry.
    pub expression: String,
    pub start: NodeId,
    pub end: NodeId,
    /// `w:commentReference`, when present.
    pub reference: Option<NodeId>,
    /// Smallest body or table cell holding both anchors.
    pub parent: NodeId,
    /// Children of `parent` from the one holding `start` through the one holding `end`.
    pub elements: Vec<NodeId>,
    /// Indices (in the collected list) of directly nested comments.
    pub children: Vec<usize>,
    /// Number of enclosing comments.
    pub depth: usize,
}

/// Discover comments beneath `roots`, ordered by start anchor.
///
/// Unpaired anchors, duplicate ids, ranges ending before they start and
/// anchors without a comments-part entry are structural errors. A reference
/// without a range is ignored.
pub fn collect(
    tree: &Tree,
    comments: Option<&Tree>,
    roots: &[NodeId],
    unhandled: UnhandledNodes,
) -> Result<Vec<Comment>, StampError> {
    let mut anchors = Anchors::default();
    walker::walk(tree, roots, unhandled, &mut anchors)?;
    if let Some(id) = anchors.duplicate {
        return Err(StampError::structural(format!(
            "comment {id} has more than one range"
        )));
    }

    for id in anchors.references.keys() {
        if !anchors.starts.contains_key(id) && !anchors.ends.contains_key(id) {
            tracing::warn!(id = %id, "Ignoring comment reference without a range");
        }
    }
    if let Some(id) = anchors.ends.keys().find(|id| !anchors.starts.contains_key(*id)) {
        return Err(StampError::structural(format!(
            "comment {id} ends without a start"
        )));
    }

    let mut found = Vec::with_capacity(anchors.order.len());
    let mut spans = Vec::with_capacity(anchors.order.len());
    for id in &anchors.order {
        let (start, start_pos) = anchors.starts[id];
        let Some(&(end, end_pos)) = anchors.ends.get(id) else {
            return Err(StampError::structural(format!(
                "comment {id} starts without an end"
            )));
        };
        if end_pos < start_pos {
            return Err(StampError::structural(format!(
                "comment {id} ends before it starts"
            )));
        }

        let parent = common_container(tree, start, end).ok_or_else(|| {
            StampError::structural(format!("comment {id} has no common body or table cell"))
        })?;
        let expression = comments
            .and_then(|c| entry(c, id).map(|e| c.text_content(e)))
            .ok_or_else(|| StampError::structural(format!("comment {id} has no entry")))?;

        found.push(Comment {
            id: id.clone(),
            expression: expression.trim().to_owned(),
            start,
            end,
            reference: anchors.references.get(id).copied(),
            parent,
            elements: elements_between(tree, parent, start, end),
            children: Vec::new(),
            depth: 0,
        });
        spans.push((start_pos, end_pos));
    }

    link_nesting(&mut found, &spans);
    Ok(found)
}

/// Entry of the comments part with the given id.
#[must_use]
pub fn entry(comments: &Tree, id: &str) -> Option<NodeId> {
    comments
        .children(comments.root())
        .iter()
        .copied()
        .find(|&c| comments.kind(c) == NodeKind::Comment && comments.attr(c, names::ID_ATTR) == Some(id))
}

/// Remove a comment's anchors and its reference run.
///
/// The reference run goes away entirely when it holds nothing but formatting
/// and the reference.
pub fn remove_anchors(tree: &mut Tree, comment: &Comment) {
    tree.detach(comment.start);
    tree.detach(comment.end);
    if let Some(reference) = comment.reference {
        remove_reference(tree, reference);
    }
}

/// Remove every anchor with the given id beneath `root`.
pub fn strip_anchors(tree: &mut Tree, root: NodeId, id: &str) {
    let anchors: Vec<NodeId> = tree
        .descendants(root)
        .into_iter()
        .filter(|&n| is_anchor(tree.kind(n)) && tree.attr(n, names::ID_ATTR) == Some(id))
        .collect();
    for anchor in anchors {
        if tree.kind(anchor) == NodeKind::CommentReference {
            remove_reference(tree, anchor);
        } else {
            tree.detach(anchor);
        }
    }
}

/// Ids of all anchors beneath `root`.
#[must_use]
pub fn anchor_ids(tree: &Tree, root: NodeId) -> HashSet<String> {
    tree.descendants(root)
        .into_iter()
        .filter(|&n| is_anchor(tree.kind(n)))
        .filter_map(|n| tree.attr(n, names::ID_ATTR).map(str::to_owned))
        .collect()
}

/// Drop comments-part entries no anchor in the document refers to.
pub fn sweep_orphans(package: &mut Package) {
    let document = package.document();
    let live = anchor_ids(document, document.root());
    let Some(comments) = package.comments_mut() else {
        return;
    };
    let root = comments.root();
    let orphans: Vec<NodeId> = comments
        .children(root)
        .iter()
        .copied()
        .filter(|&c| {
            comments
                .attr(c, names::ID_ATTR)
                .is_some_and(|id| !live.contains(id))
        })
        .collect();
    if !orphans.is_empty() {
        tracing::debug!(count = orphans.len(), "Removing resolved comment entries");
        comments.remove_children(root, &orphans);
    }
}

fn is_anchor(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::CommentRangeStart | NodeKind::CommentRangeEnd | NodeKind::CommentReference
    )
}

fn remove_reference(tree: &mut Tree, reference: NodeId) {
    let run = tree.parent(reference).filter(|&r| tree.kind(r) == NodeKind::Run);
    tree.detach(reference);
    if let Some(run) = run
        && tree
            .children(run)
            .iter()
            .all(|&c| tree.kind(c) == NodeKind::RunProperties)
    {
        tree.detach(run);
    }
}

/// Nearest body or table cell above `start` that also contains `end`.
fn common_container(tree: &Tree, start: NodeId, end: NodeId) -> Option<NodeId> {
    tree.ancestors(start)
        .find(|&a| tree.kind(a).is_block_container() && tree.is_ancestor(a, end))
}

fn elements_between(tree: &Tree, parent: NodeId, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let position = |node: NodeId| {
        std::iter::once(node)
            .chain(tree.ancestors(node))
            .find(|&n| tree.parent(n) == Some(parent))
            .and_then(|n| tree.index_in_parent(n))
    };
    match (position(start), position(end)) {
        (Some(first), Some(last)) if first <= last => tree.children(parent)[first..=last].to_vec(),
        _ => Vec::new(),
    }
}

/// Fill `children` and `depth` from document-order spans.
fn link_nesting(comments: &mut [Comment], spans: &[(usize, usize)]) {
    let mut open: Vec<usize> = Vec::new();
    for (index, &(start, end)) in spans.iter().enumerate() {
        while let Some(&top) = open.last() {
            if spans[top].1 > end && spans[top].0 < start {
                break;
            }
            open.pop();
        }
        if let Some(&enclosing) = open.last() {
            comments[enclosing].children.push(index);
        }
        comments[index].depth = open.len();
        open.push(index);
    }
}

/// Anchor positions collected in walk order.
#[derive(Default)]
struct Anchors {
    position: usize,
    order: Vec<String>,
    starts: HashMap<String, (NodeId, usize)>,
    ends: HashMap<String, (NodeId, usize)>,
    references: HashMap<String, NodeId>,
    duplicate: Option<String>,
}

impl Anchors {
    fn next(&mut self) -> usize {
        self.position += 1;
        self.position
    }

    fn id(tree: &Tree, anchor: NodeId) -> String {
        tree.attr(anchor, names::ID_ATTR).unwrap_or_default().to_owned()
    }
}

impl Visitor for Anchors {
    fn comment_start(&mut self, tree: &Tree, anchor: NodeId) {
        let id = Self::id(tree, anchor);
        let position = self.next();
        if self.starts.insert(id.clone(), (anchor, position)).is_some() {
            self.duplicate.get_or_insert(id);
        } else {
            self.order.push(id);
        }
    }

    fn comment_end(&mut self, tree: &Tree, anchor: NodeId) {
        let id = Self::id(tree, anchor);
        let position = self.next();
        if self.ends.insert(id.clone(), (anchor, position)).is_some() {
            self.duplicate.get_or_insert(id);
        }
    }

    fn comment_reference(&mut self, tree: &Tree, reference: NodeId) {
        self.references.insert(Self::id(tree, reference), reference);
    }
}
