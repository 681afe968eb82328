//! Flat OPC package (`pkg:package`) reading and writing.
//!
//! A package is a single XML file holding every part of a `WordprocessingML`
//! document: XML parts inline under `pkg:xmlData`, binary parts base64 encoded
//! under `pkg:binaryData`. The main document, its comments and relationships
//! and the media parts are parsed into dedicated fields; everything else is
//! carried through untouched.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::DomError;
use crate::node::{NodeKind, W_NAMESPACE, names};
use crate::parser::parse_reader;
use crate::serializer::{XML_DECLARATION, escape_attr};
use crate::tree::Tree;

/// Main document part name.
pub const DOCUMENT_PART: &str = "/word/document.xml";
/// Comments part name.
pub const COMMENTS_PART: &str = "/word/comments.xml";
/// Relationships of the main document part.
pub const DOCUMENT_RELS_PART: &str = "/word/_rels/document.xml.rels";
/// Relationship type of embedded images.
pub const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
/// Relationship type of the comments part.
pub const COMMENTS_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";

const PACKAGE_NAMESPACE: &str = "http://schemas.microsoft.com/office/2006/xmlPackage";
const RELATIONSHIPS_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";
const DOCUMENT_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const COMMENTS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";
const RELS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";
const MEDIA_PREFIX: &str = "/word/media/";

/// A relationship from the main document to another part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship id (e.g. `rId4`).
    pub id: String,
    /// Relationship type URI.
    pub rel_type: String,
    /// Target, relative to `/word/` unless absolute.
    pub target: String,
    /// `External` for links outside the package.
    pub target_mode: Option<String>,
}

/// Binary media part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPart {
    /// MIME content type.
    pub content_type: String,
    /// Raw bytes.
    pub data: Vec<u8>,
}

/// Part content carried through without interpretation.
#[derive(Debug, Clone)]
pub enum PartData {
    /// Inline XML part.
    Xml(Tree),
    /// Base64 encoded binary part.
    Binary(Vec<u8>),
}

/// Package part carried through without interpretation.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part name (e.g. `/word/styles.xml`).
    pub name: String,
    /// MIME content type.
    pub content_type: String,
    /// Content.
    pub data: PartData,
}

/// A `WordprocessingML` document package.
#[derive(Debug, Clone)]
pub struct Package {
    document: Tree,
    comments: Option<Tree>,
    relationships: Vec<Relationship>,
    media: BTreeMap<String, MediaPart>,
    others: Vec<Part>,
}

impl Package {
    /// Parse a package from bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, DomError> {
        Self::read_from(bytes)
    }

    /// Parse a package from a buffered reader.
    pub fn read_from<R: BufRead>(input: R) -> Result<Self, DomError> {
        let outer = parse_reader(input)?;
        let root = outer.root();
        if local_name(&outer.node(root).name) != "package" {
            return Err(DomError::Malformed(format!(
                "expected pkg:package root, found {}",
                outer.node(root).name
            )));
        }

        let mut document = None;
        let mut comments = None;
        let mut relationships = Vec::new();
        let mut media = BTreeMap::new();
        let mut others = Vec::new();

        for &part in outer.children(root) {
            if local_name(&outer.node(part).name) != "part" {
                continue;
            }
            let name = outer.attr(part, "pkg:name").unwrap_or_default().to_owned();
            let content_type = outer
                .attr(part, "pkg:contentType")
                .unwrap_or_default()
                .to_owned();

            for &payload in outer.children(part) {
                match local_name(&outer.node(payload).name) {
                    "xmlData" => {
                        let Some(&xml_root) = outer.children(payload).first() else {
                            continue;
                        };
                        let tree = outer.subtree(xml_root);
                        match name.as_str() {
                            DOCUMENT_PART => document = Some(tree),
                            COMMENTS_PART => comments = Some(tree),
                            DOCUMENT_RELS_PART => relationships = read_relationships(&tree),
                            _ => others.push(Part {
                                name: name.clone(),
                                content_type: content_type.clone(),
                                data: PartData::Xml(tree),
                            }),
                        }
                    }
                    "binaryData" => {
                        let data = decode_base64(&outer.node(payload).text)
                            .map_err(|source| DomError::Base64 {
                                part: name.clone(),
                                source,
                            })?;
                        if name.starts_with(MEDIA_PREFIX) {
                            media.insert(
                                name.clone(),
                                MediaPart {
                                    content_type: content_type.clone(),
                                    data,
                                },
                            );
                        } else {
                            others.push(Part {
                                name: name.clone(),
                                content_type: content_type.clone(),
                                data: PartData::Binary(data),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        let document = document.ok_or_else(|| DomError::MissingPart(DOCUMENT_PART.to_owned()))?;
        tracing::debug!(
            media = media.len(),
            others = others.len(),
            has_comments = comments.is_some(),
            "Parsed package"
        );

        Ok(Self {
            document,
            comments,
            relationships,
            media,
            others,
        })
    }

    /// Build a package around a main document XML string.
    pub fn from_document_xml(xml: &str) -> Result<Self, DomError> {
        let document = crate::parser::parse_str(xml)?;
        if document.kind(document.root()) != NodeKind::Document {
            return Err(DomError::Malformed(format!(
                "expected w:document root, found {}",
                document.node(document.root()).name
            )));
        }
        Ok(Self {
            document,
            comments: None,
            relationships: Vec::new(),
            media: BTreeMap::new(),
            others: Vec::new(),
        })
    }

    /// Attach a comments part parsed from an XML string.
    pub fn with_comments_xml(mut self, xml: &str) -> Result<Self, DomError> {
        self.comments = Some(crate::parser::parse_str(xml)?);
        self.ensure_comments_relationship();
        Ok(self)
    }

    /// A package with an empty body whose document root carries the same
    /// namespace declarations as this one.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        let source_root = self.document.node(self.document.root());
        let mut document = Tree::new(&source_root.name);
        let root = document.root();
        document.node_mut(root).attrs.clone_from(&source_root.attrs);
        let body = document.create(names::BODY);
        document.append_child(root, body);

        Self {
            document,
            comments: None,
            relationships: Vec::new(),
            media: BTreeMap::new(),
            others: Vec::new(),
        }
    }

    /// Main document tree.
    #[must_use]
    pub fn document(&self) -> &Tree {
        &self.document
    }

    /// Mutable main document tree.
    pub fn document_mut(&mut self) -> &mut Tree {
        &mut self.document
    }

    /// Comments tree, if the package has one.
    #[must_use]
    pub fn comments(&self) -> Option<&Tree> {
        self.comments.as_ref()
    }

    /// Mutable comments tree, if the package has one.
    pub fn comments_mut(&mut self) -> Option<&mut Tree> {
        self.comments.as_mut()
    }

    /// Mutable comments tree, created (with its relationship) when absent.
    pub fn ensure_comments(&mut self) -> &mut Tree {
        if self.comments.is_none() {
            let mut tree = Tree::new(names::COMMENTS);
            let root = tree.root();
            tree.set_attr(root, "xmlns:w", W_NAMESPACE);
            self.comments = Some(tree);
            self.ensure_comments_relationship();
        }
        self.comments.get_or_insert_with(|| Tree::new(names::COMMENTS))
    }

    /// Document relationships.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Look up a relationship by id.
    #[must_use]
    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// Media parts keyed by part name.
    #[must_use]
    pub fn media(&self) -> &BTreeMap<String, MediaPart> {
        &self.media
    }

    /// Image referenced by a relationship id.
    #[must_use]
    pub fn image(&self, rel_id: &str) -> Option<&MediaPart> {
        let rel = self.relationship(rel_id)?;
        if rel.rel_type != IMAGE_REL_TYPE {
            return None;
        }
        self.media.get(&part_name(&rel.target))
    }

    /// Add an image as a new media part and return its relationship id.
    pub fn add_image(&mut self, data: Vec<u8>, extension: &str) -> String {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        let mut n = self.media.len() + 1;
        let name = loop {
            let candidate = format!("{MEDIA_PREFIX}image{n}.{extension}");
            if !self.media.contains_key(&candidate) {
                break candidate;
            }
            n += 1;
        };

        self.media.insert(
            name.clone(),
            MediaPart {
                content_type: image_content_type(&extension).to_owned(),
                data,
            },
        );
        let target = name.trim_start_matches("/word/").to_owned();
        self.add_relationship(IMAGE_REL_TYPE, &target)
    }

    /// Copy an image referenced from `source` into this package.
    ///
    /// Returns the new relationship id, or `None` when `rel_id` does not name an
    /// image of `source`.
    pub fn import_image(&mut self, source: &Package, rel_id: &str) -> Option<String> {
        let rel = source.relationship(rel_id)?;
        let image = source.image(rel_id)?;
        let extension = rel.target.rsplit('.').next().unwrap_or("bin").to_owned();
        Some(self.add_image(image.data.clone(), &extension))
    }

    /// Serialize to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8192);
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    /// Stream the package to a writer, one part at a time.
    pub fn write_to<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        out.write_all(XML_DECLARATION.as_bytes())?;
        out.write_all(br#"<?mso-application progid="Word.Document"?>"#)?;
        write!(out, r#"<pkg:package xmlns:pkg="{PACKAGE_NAMESPACE}">"#)?;

        for part in &self.others {
            match &part.data {
                PartData::Xml(tree) => write_xml_part(&mut out, &part.name, &part.content_type, tree)?,
                PartData::Binary(data) => {
                    write_binary_part(&mut out, &part.name, &part.content_type, data)?;
                }
            }
        }
        write_xml_part(&mut out, DOCUMENT_PART, DOCUMENT_CONTENT_TYPE, &self.document)?;
        write_xml_part(
            &mut out,
            DOCUMENT_RELS_PART,
            RELS_CONTENT_TYPE,
            &relationships_tree(&self.relationships),
        )?;
        if let Some(comments) = &self.comments {
            write_xml_part(&mut out, COMMENTS_PART, COMMENTS_CONTENT_TYPE, comments)?;
        }
        for (name, part) in &self.media {
            write_binary_part(&mut out, name, &part.content_type, &part.data)?;
        }

        out.write_all(b"</pkg:package>")?;
        out.flush()
    }

    fn add_relationship(&mut self, rel_type: &str, target: &str) -> String {
        let next = self
            .relationships
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{next}");
        self.relationships.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_owned(),
            target: target.to_owned(),
            target_mode: None,
        });
        id
    }

    fn ensure_comments_relationship(&mut self) {
        if !self
            .relationships
            .iter()
            .any(|r| r.rel_type == COMMENTS_REL_TYPE)
        {
            self.add_relationship(COMMENTS_REL_TYPE, "comments.xml");
        }
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Resolve a relationship target to a part name.
fn part_name(target: &str) -> String {
    if target.starts_with('/') {
        target.to_owned()
    } else {
        format!("/word/{target}")
    }
}

fn image_content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "application/octet-stream",
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}

fn read_relationships(tree: &Tree) -> Vec<Relationship> {
    tree.children(tree.root())
        .iter()
        .map(|&rel| Relationship {
            id: tree.attr(rel, "Id").unwrap_or_default().to_owned(),
            rel_type: tree.attr(rel, "Type").unwrap_or_default().to_owned(),
            target: tree.attr(rel, "Target").unwrap_or_default().to_owned(),
            target_mode: tree.attr(rel, "TargetMode").map(str::to_owned),
        })
        .collect()
}

fn relationships_tree(relationships: &[Relationship]) -> Tree {
    let mut tree = Tree::new("Relationships");
    let root = tree.root();
    tree.set_attr(root, "xmlns", RELATIONSHIPS_NAMESPACE);
    for rel in relationships {
        let node = tree.create("Relationship");
        tree.set_attr(node, "Id", rel.id.as_str());
        tree.set_attr(node, "Type", rel.rel_type.as_str());
        tree.set_attr(node, "Target", rel.target.as_str());
        if let Some(mode) = &rel.target_mode {
            tree.set_attr(node, "TargetMode", mode.as_str());
        }
        tree.append_child(root, node);
    }
    tree
}

fn write_xml_part<W: Write>(
    out: &mut W,
    name: &str,
    content_type: &str,
    tree: &Tree,
) -> std::io::Result<()> {
    write!(
        out,
        r#"<pkg:part pkg:name="{}" pkg:contentType="{}"><pkg:xmlData>"#,
        escape_attr(name),
        escape_attr(content_type)
    )?;
    out.write_all(tree.to_xml(tree.root()).as_bytes())?;
    out.write_all(b"</pkg:xmlData></pkg:part>")
}

fn write_binary_part<W: Write>(
    out: &mut W,
    name: &str,
    content_type: &str,
    data: &[u8],
) -> std::io::Result<()> {
    write!(
        out,
        r#"<pkg:part pkg:name="{}" pkg:contentType="{}" pkg:compression="store"><pkg:binaryData>{}</pkg:binaryData></pkg:part>"#,
        escape_attr(name),
        escape_attr(content_type),
        STANDARD.encode(data)
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const DOC: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn test_from_document_xml() {
        let package = Package::from_document_xml(DOC).unwrap();
        let doc = package.document();
        assert_eq!(doc.text_content(doc.root()), "Hello");
        assert!(package.comments().is_none());
    }

    #[test]
    fn test_from_document_xml_rejects_other_roots() {
        let err = Package::from_document_xml("<w:body/>").unwrap_err();
        assert!(matches!(err, DomError::Malformed(_)));
    }

    #[test]
    fn test_round_trip_with_image_and_comments() {
        let mut package = Package::from_document_xml(DOC)
            .unwrap()
            .with_comments_xml(r#"<w:comments xmlns:w="x"><w:comment w:id="0"><w:p><w:r><w:t>expr</w:t></w:r></w:p></w:comment></w:comments>"#)
            .unwrap();
        let rel_id = package.add_image(vec![1, 2, 3, 255], "png");

        let bytes = package.to_bytes();
        let reparsed = Package::parse(&bytes).unwrap();

        let (a, b) = (package.document(), reparsed.document());
        assert!(a.same_structure(a.root(), b, b.root()));
        let comments = reparsed.comments().unwrap();
        assert_eq!(comments.text_content(comments.root()), "expr");
        assert_eq!(reparsed.image(&rel_id).unwrap().data, vec![1, 2, 3, 255]);
        assert_eq!(reparsed.relationships(), package.relationships());
    }

    #[test]
    fn test_round_trip_keeps_other_parts() {
        let xml = format!(
            r#"<?xml version="1.0"?><pkg:package xmlns:pkg="{PACKAGE_NAMESPACE}"><pkg:part pkg:name="/word/styles.xml" pkg:contentType="text/xml"><pkg:xmlData><w:styles/></pkg:xmlData></pkg:part><pkg:part pkg:name="{DOCUMENT_PART}" pkg:contentType="{DOCUMENT_CONTENT_TYPE}"><pkg:xmlData>{DOC}</pkg:xmlData></pkg:part></pkg:package>"#
        );
        let package = Package::parse(xml.as_bytes()).unwrap();
        let reparsed = Package::parse(&package.to_bytes()).unwrap();
        assert_eq!(reparsed.others.len(), 1);
        assert_eq!(reparsed.others[0].name, "/word/styles.xml");
    }

    #[test]
    fn test_missing_document_part() {
        let xml = format!(r#"<pkg:package xmlns:pkg="{PACKAGE_NAMESPACE}"/>"#);
        let err = Package::parse(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, DomError::MissingPart(_)));
    }

    #[test]
    fn test_add_image_allocates_unique_ids() {
        let mut package = Package::from_document_xml(DOC).unwrap();
        let first = package.add_image(vec![1], "png");
        let second = package.add_image(vec![2], "jpg");
        assert_ne!(first, second);
        assert_eq!(package.media().len(), 2);
        assert_eq!(package.image(&second).unwrap().content_type, "image/jpeg");
    }

    #[test]
    fn test_import_image() {
        let mut source = Package::from_document_xml(DOC).unwrap();
        let rel = source.add_image(vec![9, 9], "gif");
        let mut target = Package::from_document_xml(DOC).unwrap();
        let imported = target.import_image(&source, &rel).unwrap();
        assert_eq!(target.image(&imported).unwrap().data, vec![9, 9]);
        assert!(target.import_image(&source, "rId99").is_none());
    }

    #[test]
    fn test_empty_like_keeps_namespaces() {
        let package = Package::from_document_xml(DOC).unwrap();
        let empty = package.empty_like();
        let doc = empty.document();
        assert_eq!(
            doc.node(doc.root()).attrs,
            package.document().node(package.document().root()).attrs
        );
        assert!(doc.children(doc.body().unwrap()).is_empty());
    }

    #[test]
    fn test_ensure_comments_adds_relationship() {
        let mut package = Package::from_document_xml(DOC).unwrap();
        package.ensure_comments();
        assert!(package.comments().is_some());
        assert!(
            package
                .relationships()
                .iter()
                .any(|r| r.rel_type == COMMENTS_REL_TYPE)
        );
    }
}
