//! XML serializer for arena trees.

use std::fmt::Write;

use crate::tree::{NodeId, Tree};

/// XML declaration written at the top of standalone documents.
pub const XML_DECLARATION: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Serialize a whole tree with an XML declaration.
#[must_use]
pub fn serialize(tree: &Tree) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(XML_DECLARATION);
    write_node(tree, tree.root(), &mut out);
    out
}

/// Serialize a single node recursively.
pub(crate) fn write_node(tree: &Tree, id: NodeId, out: &mut String) {
    let node = tree.node(id);

    out.push('<');
    out.push_str(&node.name);
    for (key, value) in &node.attrs {
        write!(out, r#" {}="{}""#, key, escape_attr(value)).unwrap();
    }

    if node.children.is_empty() && node.text.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    if !node.text.is_empty() {
        out.push_str(&escape_text(&node.text));
    }
    for &child in &node.children {
        write_node(tree, child, out);
    }
    write!(out, "</{}>", node.name).unwrap();
}

/// Escape text for XML content.
fn escape_text(text: &str) -> String {
    escape_xml(text, false)
}

/// Escape text for XML attribute values.
pub(crate) fn escape_attr(text: &str) -> String {
    escape_xml(text, true)
}

/// Escape XML special characters.
fn escape_xml(text: &str, escape_quotes: bool) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' if escape_quotes => result.push_str("&quot;"),
            '\'' if escape_quotes => result.push_str("&apos;"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse_str;

    #[test]
    fn test_serialize_self_closing() {
        let tree = parse_str(r#"<w:p><w:commentRangeStart w:id="1"/></w:p>"#).unwrap();
        assert_eq!(
            tree.to_xml(tree.root()),
            r#"<w:p><w:commentRangeStart w:id="1"/></w:p>"#
        );
    }

    #[test]
    fn test_serialize_escapes() {
        let mut tree = Tree::new("w:t");
        let root = tree.root();
        tree.node_mut(root).text = "a < b & \"c\"".to_owned();
        tree.set_attr(root, "w:val", "x\"y");
        assert_eq!(
            tree.to_xml(root),
            r#"<w:t w:val="x&quot;y">a &lt; b &amp; "c"</w:t>"#
        );
    }

    #[test]
    fn test_serialize_with_declaration() {
        let tree = Tree::new("w:body");
        assert_eq!(serialize(&tree), format!("{XML_DECLARATION}<w:body/>"));
    }

    #[test]
    fn test_round_trip_is_structural_identity() {
        let xml = r#"<w:document xmlns:w="ns"><w:body><w:p><w:pPr><w:sectPr/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Hi &amp; bye </w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl></w:body></w:document>"#;
        let tree = parse_str(xml).unwrap();
        let reparsed = parse_str(&serialize(&tree)).unwrap();
        assert!(tree.same_structure(tree.root(), &reparsed, reparsed.root()));
        assert_eq!(reparsed.to_xml(reparsed.root()), xml);
    }
}
