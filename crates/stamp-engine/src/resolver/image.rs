//! Inline pictures from base64 data in the context.
//!
//! A value of the form
//!
//! ```json
//! {"$image": {"data": "<base64>", "extension": "png", "width": 952500, "height": 952500, "alt": "Logo"}}
//! ```
//!
//! adds a media part to the package and replaces the placeholder with a run
//! holding an inline `w:drawing`. `width` and `height` are in EMU; when absent
//! they come from the PNG header, or default to one inch.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use stamp_dom::{NodeId, NodeKind, Package, Tree, names, parse_str};

use super::{ImageRef, Replacement, ValueResolver};
use crate::error::{StampError, StampErrorKind};
use crate::placeholder::Placeholder;

/// Key marking an object as an image value.
pub const IMAGE_KEY: &str = "$image";

const EMU_PER_PIXEL: u64 = 9525;
const EMU_PER_INCH: u64 = 914_400;
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Embeds images described by `{"$image": {...}}` objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageResolver;

impl ValueResolver for ImageResolver {
    fn name(&self) -> &str {
        "image"
    }

    fn can_resolve(&self, value: &Value) -> bool {
        value.get(IMAGE_KEY).is_some_and(Value::is_object)
    }

    fn resolve(
        &self,
        package: &mut Package,
        placeholder: &Placeholder,
        value: &Value,
    ) -> Result<Replacement, StampError> {
        let invalid = |message: &str| {
            StampError::new(StampErrorKind::UnresolvedExpression, message)
                .with_expression(placeholder.expression.clone())
        };
        let fields = value
            .get(IMAGE_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("image value is not an object"))?;
        let encoded = fields
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("image value has no base64 'data'"))?;
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| invalid("image data is not valid base64").with_source(e))?;
        let extension = fields.get("extension").and_then(Value::as_str).unwrap_or("png");

        let (natural_width, natural_height) =
            png_size(&data).unwrap_or((EMU_PER_INCH, EMU_PER_INCH));
        let width = dimension(fields, "width").unwrap_or(natural_width);
        let height = dimension(fields, "height").unwrap_or(natural_height);
        let alt = fields
            .get("alt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let rel_id = package.add_image(data, extension);
        tracing::debug!(rel_id = %rel_id, width, height, "Embedded image");
        Ok(Replacement::Image(ImageRef {
            rel_id,
            width,
            height,
            alt,
        }))
    }
}

fn dimension(fields: &Map<String, Value>, key: &str) -> Option<u64> {
    fields.get(key).and_then(Value::as_u64).filter(|&v| v > 0)
}

/// Pixel size from a PNG `IHDR` chunk, in EMU.
fn png_size(data: &[u8]) -> Option<(u64, u64)> {
    if !data.starts_with(PNG_SIGNATURE) {
        return None;
    }
    let width = u32::from_be_bytes(data.get(16..20)?.try_into().ok()?);
    let height = u32::from_be_bytes(data.get(20..24)?.try_into().ok()?);
    Some((
        u64::from(width) * EMU_PER_PIXEL,
        u64::from(height) * EMU_PER_PIXEL,
    ))
}

const DRAWING_TEMPLATE: &str = r#"<w:r><w:drawing><wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" distT="0" distB="0" distL="0" distR="0"><wp:extent cx="0" cy="0"/><wp:docPr id="1" name="Picture"/><wp:cNvGraphicFramePr/><a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:nvPicPr><pic:cNvPr id="0" name="Picture"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed=""/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#;

/// Build a detached run embedding `image`.
pub(super) fn drawing_run(tree: &mut Tree, image: &ImageRef) -> NodeId {
    // The template is a constant and always parses.
    let template = parse_str(DRAWING_TEMPLATE).expect("drawing template is well-formed");
    let run = tree.import(&template, template.root());
    let picture_id = tree.descendants_of_kind(tree.root(), NodeKind::Drawing).len() + 1;

    for node in tree.descendants(run) {
        match tree.node(node).name.as_str() {
            "wp:extent" | "a:ext" => {
                tree.set_attr(node, "cx", image.width.to_string());
                tree.set_attr(node, "cy", image.height.to_string());
            }
            "wp:docPr" => {
                tree.set_attr(node, "id", picture_id.to_string());
                tree.set_attr(node, "name", format!("Picture {picture_id}"));
                if !image.alt.is_empty() {
                    tree.set_attr(node, "descr", image.alt.clone());
                }
            }
            names::BLIP => tree.set_attr(node, names::EMBED_ATTR, image.rel_id.clone()),
            _ => {}
        }
    }
    run
}
