//! Node kinds and element names of the WordprocessingML subset the engine understands.

/// `WordprocessingML` main namespace.
pub const W_NAMESPACE: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
/// Office document relationships namespace.
pub const R_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Qualified element and attribute names.
pub mod names {
    pub const DOCUMENT: &str = "w:document";
    pub const BODY: &str = "w:body";
    pub const PARAGRAPH: &str = "w:p";
    pub const PARAGRAPH_PROPERTIES: &str = "w:pPr";
    pub const SECTION_PROPERTIES: &str = "w:sectPr";
    pub const RUN: &str = "w:r";
    pub const RUN_PROPERTIES: &str = "w:rPr";
    pub const TEXT: &str = "w:t";
    pub const TAB: &str = "w:tab";
    pub const BREAK: &str = "w:br";
    pub const TABLE: &str = "w:tbl";
    pub const TABLE_PROPERTIES: &str = "w:tblPr";
    pub const TABLE_GRID: &str = "w:tblGrid";
    pub const TABLE_ROW: &str = "w:tr";
    pub const TABLE_ROW_PROPERTIES: &str = "w:trPr";
    pub const TABLE_CELL: &str = "w:tc";
    pub const TABLE_CELL_PROPERTIES: &str = "w:tcPr";
    pub const COMMENT_RANGE_START: &str = "w:commentRangeStart";
    pub const COMMENT_RANGE_END: &str = "w:commentRangeEnd";
    pub const COMMENT_REFERENCE: &str = "w:commentReference";
    pub const DRAWING: &str = "w:drawing";
    pub const BLIP: &str = "a:blip";
    pub const BOOKMARK_START: &str = "w:bookmarkStart";
    pub const BOOKMARK_END: &str = "w:bookmarkEnd";
    pub const PROOF_ERROR: &str = "w:proofErr";
    pub const HYPERLINK: &str = "w:hyperlink";
    pub const COMMENTS: &str = "w:comments";
    pub const COMMENT: &str = "w:comment";

    /// `w:id` attribute shared by comment anchors and comments.
    pub const ID_ATTR: &str = "w:id";
    /// `r:embed` attribute on `a:blip`.
    pub const EMBED_ATTR: &str = "r:embed";
    /// `xml:space` attribute on `w:t`.
    pub const SPACE_ATTR: &str = "xml:space";
}

/// Closed set of node kinds the engine dispatches on.
///
/// Elements outside this set are [`NodeKind::Other`]; how the walker treats them
/// is a caller decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Body,
    Paragraph,
    ParagraphProperties,
    SectionProperties,
    Run,
    RunProperties,
    Text,
    Tab,
    Break,
    Table,
    TableProperties,
    TableGrid,
    TableRow,
    TableRowProperties,
    TableCell,
    TableCellProperties,
    CommentRangeStart,
    CommentRangeEnd,
    CommentReference,
    Drawing,
    Blip,
    BookmarkStart,
    BookmarkEnd,
    ProofError,
    Hyperlink,
    Comments,
    Comment,
    Other,
}

impl NodeKind {
    /// Classify a qualified element name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            names::DOCUMENT => Self::Document,
            names::BODY => Self::Body,
            names::PARAGRAPH => Self::Paragraph,
            names::PARAGRAPH_PROPERTIES => Self::ParagraphProperties,
            names::SECTION_PROPERTIES => Self::SectionProperties,
            names::RUN => Self::Run,
            names::RUN_PROPERTIES => Self::RunProperties,
            names::TEXT => Self::Text,
            names::TAB => Self::Tab,
            names::BREAK => Self::Break,
            names::TABLE => Self::Table,
            names::TABLE_PROPERTIES => Self::TableProperties,
            names::TABLE_GRID => Self::TableGrid,
            names::TABLE_ROW => Self::TableRow,
            names::TABLE_ROW_PROPERTIES => Self::TableRowProperties,
            names::TABLE_CELL => Self::TableCell,
            names::TABLE_CELL_PROPERTIES => Self::TableCellProperties,
            names::COMMENT_RANGE_START => Self::CommentRangeStart,
            names::COMMENT_RANGE_END => Self::CommentRangeEnd,
            names::COMMENT_REFERENCE => Self::CommentReference,
            names::DRAWING => Self::Drawing,
            names::BLIP => Self::Blip,
            names::BOOKMARK_START => Self::BookmarkStart,
            names::BOOKMARK_END => Self::BookmarkEnd,
            names::PROOF_ERROR => Self::ProofError,
            names::HYPERLINK => Self::Hyperlink,
            names::COMMENTS => Self::Comments,
            names::COMMENT => Self::Comment,
            _ => Self::Other,
        }
    }

    /// Whether nodes of this kind may receive a list of block nodes.
    ///
    /// Comment regions are always re-parented under one of these.
    #[must_use]
    pub fn is_block_container(self) -> bool {
        matches!(self, Self::Body | Self::TableCell)
    }

    /// Whether this is a property element (`w:pPr`, `w:rPr`, ...).
    #[must_use]
    pub fn is_properties(self) -> bool {
        matches!(
            self,
            Self::ParagraphProperties
                | Self::SectionProperties
                | Self::RunProperties
                | Self::TableProperties
                | Self::TableGrid
                | Self::TableRowProperties
                | Self::TableCellProperties
        )
    }
}

/// A node stored in a [`Tree`](crate::Tree).
#[derive(Debug, Clone)]
pub struct Node {
    /// Qualified element name (e.g. `w:p`).
    pub name: String,
    /// Kind derived from `name`.
    pub kind: NodeKind,
    /// Attributes in document order, including namespace declarations.
    pub attrs: Vec<(String, String)>,
    /// Character content directly inside the element.
    pub text: String,
    pub(crate) parent: Option<crate::NodeId>,
    pub(crate) children: Vec<crate::NodeId>,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: NodeKind::from_name(&name),
            name,
            attrs: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Look up an attribute value.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute value, keeping its position when present.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.attrs.push((key.to_owned(), value));
        }
    }
}
