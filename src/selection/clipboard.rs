// ============================================================================
// CLIPBOARD & MASKED PIXEL EDITS: copy, cut, paste, delete, bucket fill
// ============================================================================
//
// The clipboard lives in-process and holds premultiplied pixels cropped to
// the copied area.  Every edit that changes a layer pushes one Command.

use image::{GrayImage, RgbaImage};

use super::engine::SelectionEngine;
use super::path::{apply_mask, mask_bounds};
use crate::blend::BlendEquation;
use crate::compositor::{self, draw_layer};
use crate::document::{Document, NodeId};
use crate::history::{PixelCommand, UndoStack};

pub const PASTED_LAYER_NAME: &str = "Pasted Layer";

#[derive(Clone, Debug, Default)]
pub struct Clipboard {
    image: Option<RgbaImage>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn set_image(&mut self, image: RgbaImage) {
        self.image = Some(image);
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }

    /// Copy the active node's pixels (a group is flattened) under `mask`,
    /// cropped to the mask's bounds.  Without a mask the whole layer is
    /// taken.  Returns `false` when there was nothing to copy.
    pub fn copy(&mut self, doc: &Document, active: NodeId, mask: Option<&GrayImage>) -> bool {
        let Some(pixels) = source_pixels(doc, active) else {
            log::debug!("copy: nothing to copy from {}", active);
            return false;
        };
        let copied = match mask {
            Some(mask) => {
                let Some((x, y, w, h)) = mask_bounds(mask) else {
                    log::debug!("copy: selection is empty");
                    return false;
                };
                let selected = apply_mask(&pixels, mask, false);
                image::imageops::crop_imm(&selected, x, y, w, h).to_image()
            }
            None => pixels,
        };
        self.image = Some(copied);
        true
    }

    /// Copy, then clear the copied area, push a Command and drop the
    /// selection.  On a group this only copies.
    pub fn cut(
        &mut self,
        doc: &mut Document,
        undo: &mut UndoStack,
        selection: &mut SelectionEngine,
        active: NodeId,
    ) -> bool {
        let mask = selection.mask(doc.width(), doc.height());
        if !self.copy(doc, active, mask.as_ref()) {
            return false;
        }
        if !is_pixel_layer(doc, active) {
            return true;
        }
        let Ok(before) = doc.read_pixels(active) else { return true };
        let after = match &mask {
            Some(m) => apply_mask(&before, m, true),
            None => RgbaImage::new(before.width(), before.height()),
        };
        if let Err(e) = doc.write_pixels(active, &after) {
            log::warn!("cut: clearing {} failed: {}", active, e);
            return true;
        }
        undo.push(PixelCommand::new(active, before, after, "Cut"));
        selection.clear(doc, undo);
        true
    }

    /// Paste with the clipboard's top-left at `(x, y)`.  Onto a paint or text
    /// layer the pixels are blended in place; otherwise a new layer is created
    /// beside the active node.  Returns the layer that received the pixels.
    pub fn paste_at(
        &self,
        doc: &mut Document,
        undo: &mut UndoStack,
        active: NodeId,
        x: i64,
        y: i64,
    ) -> Option<NodeId> {
        let clip = self.image.as_ref()?;
        let mut placed = RgbaImage::new(doc.width(), doc.height());
        image::imageops::replace(&mut placed, clip, x, y);

        if is_pixel_layer(doc, active) {
            let before = doc.read_pixels(active).ok()?;
            let mut after = before.clone();
            draw_layer(&placed, 1.0, &mut after);
            if let Err(e) = doc.write_pixels(active, &after) {
                log::warn!("paste: writing {} failed: {}", active, e);
                return None;
            }
            undo.push(PixelCommand::new(active, before, after, "Paste"));
            return Some(active);
        }

        let parent = doc.parent(active).unwrap_or(doc.root());
        let layer = match doc.create_paint_layer_from(PASTED_LAYER_NAME, placed) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("paste: cannot create layer: {}", e);
                return None;
            }
        };
        if !doc.add_child(parent, layer) {
            doc.delete_node(layer);
            return None;
        }
        Some(layer)
    }

    /// Paste centred on `point`.
    pub fn paste_centered(
        &self,
        doc: &mut Document,
        undo: &mut UndoStack,
        active: NodeId,
        point: (f32, f32),
    ) -> Option<NodeId> {
        let clip = self.image.as_ref()?;
        let x = (point.0 - clip.width() as f32 / 2.0).floor() as i64;
        let y = (point.1 - clip.height() as f32 / 2.0).floor() as i64;
        self.paste_at(doc, undo, active, x, y)
    }
}

fn is_pixel_layer(doc: &Document, id: NodeId) -> bool {
    doc.get(id).is_some_and(|n| n.has_pixels())
}

/// A layer's own pixels, or a group flattened on its own.
fn source_pixels(doc: &Document, id: NodeId) -> Option<RgbaImage> {
    let node = doc.get(id)?;
    if node.has_pixels() {
        return doc.read_pixels(id).ok();
    }
    let mut out = RgbaImage::new(doc.width(), doc.height());
    compositor::composite_into(doc, &compositor::plan_subtree(doc, id), &mut out);
    Some(out)
}

/// Clear the selected pixels of the active layer.
pub fn delete_selection(
    doc: &mut Document,
    undo: &mut UndoStack,
    active: NodeId,
    mask: &GrayImage,
) -> bool {
    if !is_pixel_layer(doc, active) {
        return false;
    }
    let Ok(before) = doc.read_pixels(active) else { return false };
    let after = apply_mask(&before, mask, true);
    if after == before {
        return false;
    }
    if let Err(e) = doc.write_pixels(active, &after) {
        log::warn!("delete: writing {} failed: {}", active, e);
        return false;
    }
    undo.push(PixelCommand::new(active, before, after, "Delete Selection"));
    true
}

/// Fill the selected area (or the whole layer) with an opaque colour.
pub fn bucket_fill(
    doc: &mut Document,
    undo: &mut UndoStack,
    active: NodeId,
    mask: Option<&GrayImage>,
    color: [u8; 3],
) -> bool {
    if !is_pixel_layer(doc, active) {
        log::debug!("bucket fill: {} holds no pixels", active);
        return false;
    }
    let Ok(before) = doc.read_pixels(active) else { return false };
    let fill = image::Rgba([color[0], color[1], color[2], 255]);
    let after = match mask {
        None => RgbaImage::from_pixel(before.width(), before.height(), fill),
        Some(mask) => {
            let mut out = before.clone();
            let rgb = [color[0] as f32 / 255.0, color[1] as f32 / 255.0, color[2] as f32 / 255.0];
            for (x, y, px) in out.enumerate_pixels_mut() {
                let m = mask.get_pixel_checked(x, y).map_or(0, |p| p.0[0]) as f32 / 255.0;
                if m > 0.0 {
                    BlendEquation::PREMULTIPLIED_OVER
                        .apply([rgb[0] * m, rgb[1] * m, rgb[2] * m, m], &mut px.0);
                }
            }
            out
        }
    };
    if let Err(e) = doc.write_pixels(active, &after) {
        log::warn!("bucket fill: writing {} failed: {}", active, e);
        return false;
    }
    undo.push(PixelCommand::new(active, before, after, "Bucket Fill"));
    true
}
