//! Arena-backed element tree.
//!
//! Nodes live in a single `Vec` and refer to each other through [`NodeId`]
//! indices. Detaching a node only unlinks it from its parent; the slot stays in
//! the arena so ids held elsewhere never dangle, they just stop being attached.

use crate::node::{Node, NodeKind, names};

/// Index of a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Element tree with parent back-references stored as indices.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Create a tree holding a single root element.
    #[must_use]
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node::new(root_name)],
            root: NodeId(0),
        }
    }

    /// Root element id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Kind of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    /// Parent of a node, `None` for the root and for detached nodes.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of a node in document order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Attribute value of a node.
    #[must_use]
    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id).attr(key)
    }

    /// Set an attribute on a node.
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        self.node_mut(id).set_attr(key, value);
    }

    /// Create a detached element.
    pub fn create(&mut self, name: &str) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("arena exceeds u32 nodes"));
        self.nodes.push(Node::new(name));
        id
    }

    /// Create a detached element holding character content.
    pub fn create_text(&mut self, name: &str, text: impl Into<String>) -> NodeId {
        let id = self.create(name);
        self.node_mut(id).text = text.into();
        id
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent.index()].children.push(child);
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Insert `child` at `index` among the children of `parent`, detaching it first.
    ///
    /// An index past the end appends.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.index()].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Insert `node` right after `anchor` under the same parent.
    ///
    /// Does nothing when `anchor` is detached.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        if let (Some(parent), Some(index)) = (self.parent(anchor), self.index_in_parent(anchor)) {
            self.insert_child(parent, index + 1, node);
        }
    }

    /// Unlink a node from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|&c| c != id);
        }
    }

    /// Unlink a batch of children from `parent` in one pass.
    ///
    /// Ids that are not children of `parent` are ignored.
    pub fn remove_children(&mut self, parent: NodeId, ids: &[NodeId]) {
        let removed: std::collections::HashSet<NodeId> = ids.iter().copied().collect();
        self.nodes[parent.index()]
            .children
            .retain(|c| !removed.contains(c));
        for id in ids {
            if self.nodes[id.index()].parent == Some(parent) {
                self.nodes[id.index()].parent = None;
            }
        }
    }

    /// Position of a node among its parent's children.
    #[must_use]
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Ancestors of a node, nearest first, excluding the node itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |&n| self.parent(n))
    }

    /// Nearest ancestor (or the node itself) of the given kind.
    #[must_use]
    pub fn closest(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|&n| self.kind(n) == kind)
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|n| n == ancestor)
    }

    /// Whether the node is reachable from the root.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_ancestor(self.root, id)
    }

    /// The subtree rooted at `id` in pre-order, including `id`.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Descendants of `id` (including itself) with the given kind, in document order.
    #[must_use]
    pub fn descendants_of_kind(&self, id: NodeId, kind: NodeKind) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.kind(n) == kind)
            .collect()
    }

    /// First direct child of the given kind.
    #[must_use]
    pub fn child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| self.kind(c) == kind)
    }

    /// The `w:body` element of a document tree.
    #[must_use]
    pub fn body(&self) -> Option<NodeId> {
        self.child_of_kind(self.root, NodeKind::Body)
    }

    /// Concatenated `w:t` text beneath a node.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.kind(n) == NodeKind::Text)
            .map(|n| self.node(n).text.as_str())
            .collect()
    }

    /// Copy the subtree rooted at `id` within this tree. The copy is detached.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let source = self.clone_subtree_nodes(id);
        self.graft(source)
    }

    /// Copy the subtree rooted at `id` of another tree into this one. The copy is detached.
    pub fn import(&mut self, other: &Tree, id: NodeId) -> NodeId {
        let source = other.clone_subtree_nodes(id);
        self.graft(source)
    }

    /// Extract a standalone tree whose root is a copy of `id`.
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Tree {
        let mut tree = Tree {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.graft(self.clone_subtree_nodes(id));
        tree
    }

    /// Serialize the subtree rooted at `id` as XML without a declaration.
    #[must_use]
    pub fn to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        crate::serializer::write_node(self, id, &mut out);
        out
    }

    /// Structural equality of two subtrees: names, attributes, text and children.
    #[must_use]
    pub fn same_structure(&self, id: NodeId, other: &Tree, other_id: NodeId) -> bool {
        let (a, b) = (self.node(id), other.node(other_id));
        a.name == b.name
            && a.attrs == b.attrs
            && a.text == b.text
            && a.children.len() == b.children.len()
            && a
                .children
                .iter()
                .zip(&b.children)
                .all(|(&x, &y)| self.same_structure(x, other, y))
    }

    /// Subtree nodes in pre-order with parent links as positions in the returned list.
    fn clone_subtree_nodes(&self, id: NodeId) -> Vec<(Node, Option<usize>)> {
        let mut out: Vec<(Node, Option<usize>)> = Vec::new();
        let mut stack = vec![(id, None)];
        while let Some((current, parent_pos)) = stack.pop() {
            let mut node = self.node(current).clone();
            node.parent = None;
            node.children.clear();
            let pos = out.len();
            out.push((node, parent_pos));
            for &child in self.children(current).iter().rev() {
                stack.push((child, Some(pos)));
            }
        }
        out
    }

    /// Append pre-order nodes to the arena, remapping indices. Returns the new root.
    fn graft(&mut self, source: Vec<(Node, Option<usize>)>) -> NodeId {
        let base = self.nodes.len();
        let new_id =
            |pos: usize| NodeId(u32::try_from(base + pos).expect("arena exceeds u32 nodes"));
        // Children are pushed in pre-order, so each child follows its parent and
        // siblings keep their relative order.
        for (pos, (mut node, parent_pos)) in source.into_iter().enumerate() {
            node.parent = parent_pos.map(new_id);
            self.nodes.push(node);
            if let Some(parent_pos) = parent_pos {
                let child = new_id(pos);
                self.nodes[base + parent_pos].children.push(child);
            }
        }
        new_id(0)
    }
}

/// Build a `w:t` element with `xml:space="preserve"`.
pub fn create_text_element(tree: &mut Tree, text: &str) -> NodeId {
    let t = tree.create_text(names::TEXT, text);
    tree.set_attr(t, names::SPACE_ATTR, "preserve");
    t
}
