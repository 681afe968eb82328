//! Sub-document pipeline: extract a region, stamp it once per item, splice back.
//!
//! The region is copied into a minimal standalone package together with the
//! comment entries and images it references. Each item gets its own copy by
//! serializing that package once and parsing it again per item on the far side
//! of a [`pipe`](crate::pipe), so copies never share nodes with each other or
//! with the parent document.

use std::collections::HashMap;

use serde_json::Value;
use stamp_dom::{NodeId, NodeKind, Package, Tree, names};

use crate::comment;
use crate::error::StampError;
use crate::pipe;
use crate::stamper::Stamper;

/// A region serialized as a standalone package.
#[derive(Debug)]
pub(crate) struct SubDocument {
    pub(crate) bytes: Vec<u8>,
    /// Sub-document relationship id to the parent relationship it was copied from.
    pub(crate) image_map: HashMap<String, String>,
}

/// Replace `elements` (siblings under `parent`) with one stamped copy per item.
pub(crate) fn repeat(
    stamper: &Stamper,
    package: &mut Package,
    parent: NodeId,
    elements: &[NodeId],
    items: &[Value],
) -> Result<(), StampError> {
    let sub = extract(package, elements)?;
    tracing::debug!(
        elements = elements.len(),
        items = items.len(),
        bytes = sub.bytes.len(),
        "Repeating document part"
    );

    let stamped = items
        .iter()
        .map(|item| pipe::round_trip(&sub.bytes, |copy| stamper.stamp_nested(copy, item)))
        .collect::<Result<Vec<_>, _>>()?;

    splice(package, parent, elements, &stamped, &sub.image_map)
}

/// Copy `elements` into a standalone package.
pub(crate) fn extract(package: &Package, elements: &[NodeId]) -> Result<SubDocument, StampError> {
    let source = package.document();
    let mut sub = package.empty_like();
    let body = sub
        .document()
        .body()
        .ok_or_else(|| StampError::structural("sub-document has no body"))?;

    for &element in elements {
        let tree = sub.document_mut();
        let copy = tree.import(source, element);
        tree.append_child(body, copy);
    }

    // A range cut by the region boundary cannot be stamped on its own.
    let mut ids: Vec<String> = comment::anchor_ids(sub.document(), body)
        .into_iter()
        .collect();
    ids.sort();
    let tree = sub.document_mut();
    ids.retain(|id| {
        let whole = has_range(tree, body, id);
        if !whole {
            tracing::debug!(id = %id, "Dropping comment cut by document part boundary");
            comment::strip_anchors(tree, body, id);
        }
        whole
    });

    if let Some(comments) = package.comments()
        && !ids.is_empty()
    {
        let target = sub.ensure_comments();
        let root = target.root();
        for id in ids {
            if let Some(entry) = comment::entry(comments, &id) {
                let copy = target.import(comments, entry);
                target.append_child(root, copy);
            }
        }
    }

    let mut image_map = HashMap::new();
    let mut imported: HashMap<String, String> = HashMap::new();
    let blips = sub.document().descendants_of_kind(body, NodeKind::Blip);
    for blip in blips {
        let Some(rel_id) = sub.document().attr(blip, names::EMBED_ATTR).map(str::to_owned) else {
            continue;
        };
        let new_id = match imported.get(&rel_id) {
            Some(id) => id.clone(),
            None => {
                let Some(id) = sub.import_image(package, &rel_id) else {
                    tracing::warn!(rel_id = %rel_id, "Picture references no image part");
                    continue;
                };
                imported.insert(rel_id.clone(), id.clone());
                image_map.insert(id.clone(), rel_id);
                id
            }
        };
        sub.document_mut().set_attr(blip, names::EMBED_ATTR, new_id);
    }

    Ok(SubDocument {
        bytes: sub.to_bytes(),
        image_map,
    })
}

fn has_range(tree: &Tree, root: NodeId, id: &str) -> bool {
    let has = |kind| {
        tree.descendants_of_kind(root, kind)
            .into_iter()
            .any(|n| tree.attr(n, names::ID_ATTR) == Some(id))
    };
    has(NodeKind::CommentRangeStart) && has(NodeKind::CommentRangeEnd)
}

/// Insert the stamped copies at the first element's position and remove the originals.
pub(crate) fn splice(
    package: &mut Package,
    parent: NodeId,
    elements: &[NodeId],
    stamped: &[Package],
    image_map: &HashMap<String, String>,
) -> Result<(), StampError> {
    let Some(index) = elements
        .first()
        .and_then(|&e| package.document().index_in_parent(e))
    else {
        return Ok(());
    };
    let section_break = section_break_for(package.document(), parent, elements, index);

    let mut region_images: HashMap<String, String> = HashMap::new();
    let mut inserted = Vec::new();
    for copy in stamped {
        let copy_tree = copy.document();
        let body = copy_tree
            .body()
            .ok_or_else(|| StampError::structural("stamped sub-document has no body"))?;

        let mut copy_images: HashMap<String, String> = HashMap::new();
        let mut nodes = Vec::new();
        for &child in copy_tree.children(body) {
            if copy_tree.kind(child) == NodeKind::SectionProperties {
                continue;
            }
            let node = package.document_mut().import(copy_tree, child);
            relink_images(
                package,
                copy,
                node,
                image_map,
                &mut region_images,
                &mut copy_images,
            );
            nodes.push(node);
        }

        if let Some(section) = section_break {
            carry_section_break(package.document_mut(), &mut nodes, section);
        }
        inserted.extend(nodes);
    }

    let tree = package.document_mut();
    for (offset, node) in inserted.into_iter().enumerate() {
        tree.insert_child(parent, index + offset, node);
    }
    tree.remove_children(parent, elements);
    Ok(())
}

/// Point every picture beneath `node` at an image part of `package`.
///
/// Images that came from the parent are imported once per region; images
/// added while stamping the copy are imported once per copy.
fn relink_images(
    package: &mut Package,
    copy: &Package,
    node: NodeId,
    image_map: &HashMap<String, String>,
    region_images: &mut HashMap<String, String>,
    copy_images: &mut HashMap<String, String>,
) {
    let blips = package.document().descendants_of_kind(node, NodeKind::Blip);
    for blip in blips {
        let Some(rel_id) = package
            .document()
            .attr(blip, names::EMBED_ATTR)
            .map(str::to_owned)
        else {
            continue;
        };
        let cache = if image_map.contains_key(&rel_id) {
            &mut *region_images
        } else {
            &mut *copy_images
        };
        let new_id = match cache.get(&rel_id) {
            Some(id) => id.clone(),
            None => {
                let Some(id) = package.import_image(copy, &rel_id) else {
                    continue;
                };
                cache.insert(rel_id, id.clone());
                id
            }
        };
        package
            .document_mut()
            .set_attr(blip, names::EMBED_ATTR, new_id);
    }
}

/// Section break to re-apply after each copy.
///
/// Only a region holding an odd number of section breaks gets the nearest
/// break before it copied onto every copy. With none, the copies stay in the
/// surrounding section; an even count closes every section it opens.
fn section_break_for(
    tree: &Tree,
    parent: NodeId,
    elements: &[NodeId],
    index: usize,
) -> Option<NodeId> {
    let count: usize = elements
        .iter()
        .map(|&e| tree.descendants_of_kind(e, NodeKind::SectionProperties).len())
        .sum();
    if count % 2 == 0 {
        return None;
    }
    tree.children(parent)[..index]
        .iter()
        .rev()
        .filter(|&&n| tree.kind(n) == NodeKind::Paragraph)
        .find_map(|&p| {
            tree.child_of_kind(p, NodeKind::ParagraphProperties)
                .and_then(|ppr| tree.child_of_kind(ppr, NodeKind::SectionProperties))
        })
}

/// Make the copy end in a paragraph whose properties carry a copy of `section`.
fn carry_section_break(tree: &mut Tree, nodes: &mut Vec<NodeId>, section: NodeId) {
    let last = match nodes.last() {
        Some(&node) if tree.kind(node) == NodeKind::Paragraph => node,
        _ => {
            let paragraph = tree.create(names::PARAGRAPH);
            nodes.push(paragraph);
            paragraph
        }
    };
    let properties = match tree.child_of_kind(last, NodeKind::ParagraphProperties) {
        Some(properties) => properties,
        None => {
            let properties = tree.create(names::PARAGRAPH_PROPERTIES);
            tree.insert_child(last, 0, properties);
            properties
        }
    };
    if let Some(existing) = tree.child_of_kind(properties, NodeKind::SectionProperties) {
        tree.detach(existing);
    }
    let copy = tree.deep_copy(section);
    tree.append_child(properties, copy);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use stamp_dom::parse_str;

    use super::*;

    #[test]
    fn test_section_break_parity() {
        let tree = parse_str(
            r#"<w:body>
                <w:p><w:pPr><w:sectPr w:id="a"/></w:pPr></w:p>
                <w:p><w:pPr><w:sectPr w:id="b"/></w:pPr></w:p>
                <w:p/>
                <w:p><w:pPr><w:sectPr w:id="c"/></w:pPr></w:p>
                <w:p><w:pPr><w:sectPr w:id="d"/></w:pPr></w:p>
            </w:body>"#,
        )
        .unwrap();
        let body = tree.root();
        let children = tree.children(body).to_vec();
        let id = |n: Option<NodeId>| n.and_then(|n| tree.attr(n, "w:id").map(str::to_owned));

        // No break inside: the copies stay in the current section.
        assert_eq!(section_break_for(&tree, body, &children[2..3], 2), None);
        // One break inside: nearest preceding one is re-applied.
        assert_eq!(
            id(section_break_for(&tree, body, &children[2..4], 2)),
            Some("b".to_owned())
        );
        // Two breaks inside: nothing to re-apply.
        assert_eq!(section_break_for(&tree, body, &children[2..5], 2), None);
        // Nothing before the region.
        assert_eq!(section_break_for(&tree, body, &children[0..1], 0), None);
    }

    #[test]
    fn test_carry_section_break_onto_paragraph() {
        let mut tree = parse_str(
            r#"<w:body><w:p><w:pPr><w:sectPr w:id="s"/></w:pPr></w:p><w:p><w:r><w:t>x</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        let children = tree.children(tree.root()).to_vec();
        let section = tree.descendants_of_kind(children[0], NodeKind::SectionProperties)[0];
        let mut nodes = vec![tree.deep_copy(children[1])];

        carry_section_break(&mut tree, &mut nodes, section);

        assert_eq!(nodes.len(), 1);
        assert_eq!(
            tree.to_xml(nodes[0]),
            r#"<w:p><w:pPr><w:sectPr w:id="s"/></w:pPr><w:r><w:t>x</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_carry_section_break_after_table() {
        let mut tree = parse_str(
            r#"<w:body><w:p><w:pPr><w:sectPr/></w:pPr></w:p><w:tbl/></w:body>"#,
        )
        .unwrap();
        let children = tree.children(tree.root()).to_vec();
        let section = tree.descendants_of_kind(children[0], NodeKind::SectionProperties)[0];
        let mut nodes = vec![tree.deep_copy(children[1])];

        carry_section_break(&mut tree, &mut nodes, section);

        assert_eq!(nodes.len(), 2);
        assert_eq!(tree.to_xml(nodes[1]), "<w:p><w:pPr><w:sectPr/></w:pPr></w:p>");
    }

    #[test]
    fn test_extract_drops_cut_ranges() {
        let package = Package::from_document_xml(
            r#"<w:document><w:body><w:p><w:commentRangeStart w:id="1"/><w:r><w:t>a</w:t></w:r></w:p><w:p><w:r><w:t>b</w:t></w:r><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r></w:p></w:body></w:document>"#,
        )
        .unwrap()
        .with_comments_xml(r#"<w:comments><w:comment w:id="1"/></w:comments>"#)
        .unwrap();
        let body = package.document().body().unwrap();
        let first = package.document().children(body)[0];

        let sub = extract(&package, &[first]).unwrap();
        let parsed = Package::parse(&sub.bytes).unwrap();
        let tree = parsed.document();
        assert!(comment::anchor_ids(tree, tree.root()).is_empty());
        assert!(
            parsed
                .comments()
                .is_none_or(|c| comment::entry(c, "1").is_none())
        );
    }

    #[test]
    fn test_extract_copies_comments_and_images() {
        let mut package = Package::from_document_xml(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:commentRangeStart w:id="7"/><w:r><w:drawing><a:blip r:embed="PLACEHOLDER"/></w:drawing></w:r><w:commentRangeEnd w:id="7"/></w:p><w:p/></w:body></w:document>"#,
        )
        .unwrap()
        .with_comments_xml(
            r#"<w:comments><w:comment w:id="7"><w:p><w:r><w:t>displayParagraphIf(x)</w:t></w:r></w:p></w:comment><w:comment w:id="8"/></w:comments>"#,
        )
        .unwrap();
        let rel_id = package.add_image(vec![1, 2, 3], "png");
        let tree = package.document_mut();
        let blip = tree.descendants_of_kind(tree.root(), NodeKind::Blip)[0];
        tree.set_attr(blip, names::EMBED_ATTR, rel_id.clone());
        let body = tree.body().unwrap();
        let first = tree.children(body)[0];

        let sub = extract(&package, &[first]).unwrap();
        let parsed = Package::parse(&sub.bytes).unwrap();

        let sub_tree = parsed.document();
        let sub_body = sub_tree.body().unwrap();
        assert_eq!(sub_tree.children(sub_body).len(), 1);
        let comments = parsed.comments().unwrap();
        assert!(comment::entry(comments, "7").is_some());
        assert!(comment::entry(comments, "8").is_none());

        let sub_blip = sub_tree.descendants_of_kind(sub_body, NodeKind::Blip)[0];
        let sub_rel = sub_tree.attr(sub_blip, names::EMBED_ATTR).unwrap();
        assert_eq!(parsed.image(sub_rel).unwrap().data, vec![1, 2, 3]);
        assert_eq!(sub.image_map.get(sub_rel), Some(&rel_id));
    }
}
