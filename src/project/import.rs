// ============================================================================
// FOREIGN LAYER IMPORT: adopt a decoded layered image as a new Document
// ============================================================================
//
// A format reader decodes into `ImportedImage`; `adopt` validates it and
// builds the tree.  Layer pixels are straight alpha with an offset into the
// canvas, the way layered formats store them; opacity arrives in whatever
// range the format uses and is normalized here.

use image::RgbaImage;

use crate::document::{Document, NodeId};
use crate::error::PersistenceError;
use crate::surface::{premultiply, MAX_SURFACE_DIM};

use super::persistence::MAX_PROJECT_NODES;

#[derive(Clone, Debug)]
pub enum ImportedLayer {
    Group {
        name: String,
        visible: bool,
        opacity: f32,
        /// Paint order: first = bottom.
        children: Vec<ImportedLayer>,
    },
    Paint {
        name: String,
        visible: bool,
        opacity: f32,
        /// Canvas position of the pixels' top-left corner.
        offset: (i64, i64),
        pixels: RgbaImage,
    },
}

impl ImportedLayer {
    /// Map an 8-bit format opacity onto `[0, 1]`.
    pub fn opacity_from_u8(value: u8) -> f32 {
        value as f32 / 255.0
    }

    fn name(&self) -> &str {
        match self {
            ImportedLayer::Group { name, .. } | ImportedLayer::Paint { name, .. } => name,
        }
    }

    fn count(&self) -> usize {
        match self {
            ImportedLayer::Group { children, .. } => {
                1 + children.iter().map(ImportedLayer::count).sum::<usize>()
            }
            ImportedLayer::Paint { .. } => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImportedImage {
    pub width: u32,
    pub height: u32,
    /// Top-level layers in paint order.
    pub layers: Vec<ImportedLayer>,
}

/// Normalize an opacity that may be on a 0..=255 or 0..=1 scale.
fn normalize_opacity(opacity: f32) -> f32 {
    if !opacity.is_finite() {
        return 1.0;
    }
    let o = if opacity > 1.0 { opacity / 255.0 } else { opacity };
    o.clamp(0.0, 1.0)
}

/// Build a fresh Document from an imported tree.
pub fn adopt(imported: ImportedImage) -> Result<Document, PersistenceError> {
    let (width, height) = (imported.width, imported.height);
    if width == 0 || height == 0 || width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
        return Err(PersistenceError::InvalidFormat(format!(
            "Imported canvas {}x{} is outside 1..={}",
            width, height, MAX_SURFACE_DIM
        )));
    }
    let count: usize = imported.layers.iter().map(ImportedLayer::count).sum();
    if count + 1 > MAX_PROJECT_NODES {
        return Err(PersistenceError::InvalidFormat(format!(
            "Imported image has {} layers, which exceeds the maximum of {}",
            count, MAX_PROJECT_NODES
        )));
    }

    let mut doc = Document::new(width, height);
    let root = doc.root();
    for layer in &imported.layers {
        adopt_layer(&mut doc, layer, root)?;
    }
    log::info!("imported {} layers ({}x{})", count, width, height);
    Ok(doc)
}

fn adopt_layer(doc: &mut Document, layer: &ImportedLayer, parent: NodeId) -> Result<(), PersistenceError> {
    let id = match layer {
        ImportedLayer::Group { name, .. } => doc.create_group(name.as_str()),
        ImportedLayer::Paint { name, offset, pixels, .. } => {
            let mut canvas = RgbaImage::new(doc.width(), doc.height());
            image::imageops::replace(&mut canvas, pixels, offset.0, offset.1);
            doc.create_paint_layer_from(name.as_str(), premultiply(&canvas))?
        }
    };
    let (visible, opacity) = match layer {
        ImportedLayer::Group { visible, opacity, .. } | ImportedLayer::Paint { visible, opacity, .. } => {
            (*visible, *opacity)
        }
    };
    doc.set_visible(id, visible);
    doc.set_opacity(id, normalize_opacity(opacity));
    doc.try_add_child(parent, id).map_err(|e| {
        PersistenceError::InvalidFormat(format!("cannot attach '{}': {}", layer.name(), e))
    })?;
    if let ImportedLayer::Group { children, .. } = layer {
        for child in children {
            adopt_layer(doc, child, id)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn byte_opacity_is_normalized() {
        assert_eq!(normalize_opacity(255.0), 1.0);
        assert_eq!(normalize_opacity(0.25), 0.25);
        assert!((ImportedLayer::opacity_from_u8(51) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn offset_pixels_land_in_place() {
        let imported = ImportedImage {
            width: 4,
            height: 4,
            layers: vec![ImportedLayer::Group {
                name: "g".into(),
                visible: true,
                opacity: 128.0,
                children: vec![ImportedLayer::Paint {
                    name: "dot".into(),
                    visible: true,
                    opacity: 1.0,
                    offset: (2, 1),
                    pixels: RgbaImage::from_pixel(1, 1, Rgba([0, 0, 255, 255])),
                }],
            }],
        };
        let doc = adopt(imported).unwrap();
        let dot = doc.find_by_name("dot").unwrap();
        assert_eq!(doc.read_pixels(dot).unwrap().get_pixel(2, 1).0, [0, 0, 255, 255]);
        let g = doc.find_by_name("g").unwrap();
        assert!((doc.get(g).unwrap().opacity() - 128.0 / 255.0).abs() < 1e-6);
    }
}
