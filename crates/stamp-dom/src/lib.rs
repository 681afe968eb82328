//! Document model for the stamp templating engine.
//!
//! This crate turns `WordprocessingML` XML into an arena [`Tree`] the engine can
//! rewrite in place, and reads and writes whole documents as Flat OPC
//! [`Package`]s (one XML file carrying every part, binaries base64 encoded).
//!
//! # Architecture
//!
//! - [`Tree`] stores nodes in a `Vec` addressed by [`NodeId`]; parents and
//!   children are indices, so detached nodes never dangle
//! - [`NodeKind`] is the closed set of element kinds the engine dispatches on;
//!   unknown elements are [`NodeKind::Other`]
//! - [`parse_str`] / [`parse_reader`] build trees with `quick-xml`,
//!   [`serialize`] writes them back
//! - [`Package`] owns the main document, comments, relationships and media
//!
//! # Example
//!
//! ```ignore
//! use stamp_dom::Package;
//!
//! let package = Package::parse(&std::fs::read("template.xml")?)?;
//! let doc = package.document();
//! println!("{}", doc.text_content(doc.root()));
//! ```

mod error;
mod node;
mod package;
mod parser;
mod serializer;
mod tree;

pub use error::DomError;
pub use node::{Node, NodeKind, R_NAMESPACE, W_NAMESPACE, names};
pub use package::{
    COMMENTS_PART, COMMENTS_REL_TYPE, DOCUMENT_PART, DOCUMENT_RELS_PART, IMAGE_REL_TYPE,
    MediaPart, Package, Part, PartData, Relationship,
};
pub use parser::{parse_reader, parse_str};
pub use serializer::{XML_DECLARATION, serialize};
pub use tree::{NodeId, Tree, create_text_element};
