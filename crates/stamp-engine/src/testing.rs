//! Template builders shared by unit tests.

use std::fmt::Write as _;

use serde_json::Value;
use stamp_dom::Package;

use crate::error::StampError;
use crate::stamper::Stamper;

/// A package whose body holds `body` and whose comments part holds one
/// single-paragraph entry per `(id, text)`.
pub(crate) fn document(body: &str, comments: &[(&str, &str)]) -> Package {
    let package = Package::from_document_xml(&format!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    ))
    .unwrap();
    if comments.is_empty() {
        return package;
    }
    let mut xml = String::from("<w:comments>");
    for (id, text) in comments {
        write!(
            xml,
            r#"<w:comment w:id="{id}"><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:comment>"#
        )
        .unwrap();
    }
    xml.push_str("</w:comments>");
    package.with_comments_xml(&xml).unwrap()
}

/// A paragraph with a single plain run.
pub(crate) fn para(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

/// A paragraph whose whole text is covered by comment `id`.
pub(crate) fn commented_para(id: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:commentRangeStart w:id="{id}"/><w:r><w:t xml:space="preserve">{text}</w:t></w:r><w:commentRangeEnd w:id="{id}"/><w:r><w:commentReference w:id="{id}"/></w:r></w:p>"#
    )
}

/// Text of every body child, in order.
pub(crate) fn body_texts(package: &Package) -> Vec<String> {
    let tree = package.document();
    let body = tree.body().unwrap();
    tree.children(body)
        .iter()
        .map(|&c| tree.text_content(c))
        .collect()
}

/// Stamp with the default engine.
pub(crate) fn stamp(package: &mut Package, context: &Value) -> Result<(), StampError> {
    Stamper::new().stamp_package(package, context)
}

/// Serialized document, for checking that no anchors remain.
pub(crate) fn document_xml(package: &Package) -> String {
    let tree = package.document();
    tree.to_xml(tree.root())
}
