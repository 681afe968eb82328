//! XML parser building an arena [`Tree`].

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::DomError;
use crate::tree::{NodeId, Tree};

/// Parse an XML string into a tree.
pub fn parse_str(xml: &str) -> Result<Tree, DomError> {
    parse_reader(xml.as_bytes())
}

/// Parse XML from a buffered reader into a tree.
///
/// Processing instructions, comments and the XML declaration are dropped.
/// Whitespace-only text inside elements that also hold child elements is
/// dropped; any other character content is kept verbatim.
pub fn parse_reader<R: BufRead>(input: R) -> Result<Tree, DomError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut tree: Option<Tree> = None;
    let mut stack: Vec<NodeId> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let id = open_element(&reader, &e, &mut tree, &stack)?;
                stack.push(id);
            }
            Event::Empty(e) => {
                let id = open_element(&reader, &e, &mut tree, &stack)?;
                if stack.is_empty() {
                    // Self-closing root element
                    stack.push(id);
                    break;
                }
            }
            Event::End(_) => {
                let Some(closed) = stack.pop() else {
                    return Err(DomError::Malformed("unbalanced end tag".to_owned()));
                };
                if let Some(tree) = tree.as_mut() {
                    drop_layout_whitespace(tree, closed);
                }
                if stack.is_empty() {
                    break;
                }
            }
            Event::Text(e) => {
                if let (Some(tree), Some(&current)) = (tree.as_mut(), stack.last()) {
                    let text = reader.decoder().decode(&e)?;
                    tree.node_mut(current).text.push_str(&text);
                }
            }
            Event::GeneralRef(e) => {
                if let (Some(tree), Some(&current)) = (tree.as_mut(), stack.last()) {
                    let entity = reader.decoder().decode(&e)?;
                    tree.node_mut(current).text.push_str(&decode_entity(&entity));
                }
            }
            Event::CData(e) => {
                if let (Some(tree), Some(&current)) = (tree.as_mut(), stack.last()) {
                    tree.node_mut(current)
                        .text
                        .push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => {
                if !stack.is_empty() {
                    return Err(DomError::Malformed(
                        "unexpected end of input inside element".to_owned(),
                    ));
                }
                break;
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }

    tree.ok_or_else(|| DomError::Malformed("document has no root element".to_owned()))
}

fn open_element<R: BufRead>(
    reader: &Reader<R>,
    e: &BytesStart,
    tree: &mut Option<Tree>,
    stack: &[NodeId],
) -> Result<NodeId, DomError> {
    let name = decode_name(reader, e.name().as_ref());
    let attrs = decode_attrs(reader, e)?;

    let id = match (tree.as_mut(), stack.last()) {
        (Some(tree), Some(&parent)) => {
            let id = tree.create(&name);
            tree.append_child(parent, id);
            id
        }
        (None, None) => {
            let new_tree = Tree::new(&name);
            let id = new_tree.root();
            *tree = Some(new_tree);
            id
        }
        _ => {
            return Err(DomError::Malformed(
                "content after the root element".to_owned(),
            ));
        }
    };

    if let Some(tree) = tree.as_mut() {
        tree.node_mut(id).attrs = attrs;
    }
    Ok(id)
}

fn decode_name<R: BufRead>(reader: &Reader<R>, name: &[u8]) -> String {
    reader.decoder().decode(name).map_or_else(
        |_| String::from_utf8_lossy(name).into_owned(),
        std::borrow::Cow::into_owned,
    )
}

fn decode_attrs<R: BufRead>(
    reader: &Reader<R>,
    e: &BytesStart,
) -> Result<Vec<(String, String)>, DomError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = decode_name(reader, attr.key.as_ref());
        let value = attr.unescape_value().map_or_else(
            |_| String::from_utf8_lossy(&attr.value).into_owned(),
            std::borrow::Cow::into_owned,
        );
        attrs.push((key, value));
    }
    Ok(attrs)
}

/// Drop indentation whitespace from elements that hold child elements.
fn drop_layout_whitespace(tree: &mut Tree, id: NodeId) {
    let node = tree.node_mut(id);
    if !node.children.is_empty() && node.text.trim().is_empty() {
        node.text.clear();
    }
}

/// Decode XML entity references to their character values.
fn decode_entity(entity: &str) -> String {
    match entity {
        "lt" => "<".to_owned(),
        "gt" => ">".to_owned(),
        "amp" => "&".to_owned(),
        "apos" => "'".to_owned(),
        "quot" => "\"".to_owned(),
        // Numeric character references
        s if s.starts_with('#') => {
            let code = if s.starts_with("#x") || s.starts_with("#X") {
                u32::from_str_radix(&s[2..], 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
                .map_or_else(|| format!("&{entity};"), |c| c.to_string())
        }
        // Unknown entity - preserve as-is
        _ => format!("&{entity};"),
    }
}
