// ============================================================================
// COMPOSITOR: tree walk → draw plan → back-to-front source-over
// ============================================================================
//
// `plan()` resolves visibility and inherited opacity once; both the CPU path
// below and `gpu::GpuRenderer` consume the same plan, and both blend with
// `BlendEquation::PREMULTIPLIED_OVER`.

use image::RgbaImage;
use rayon::prelude::*;

use crate::blend::BlendEquation;
use crate::document::{Document, NodeId, NodeKind};

/// One layer draw: the layer and the effective opacity to draw it with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub opacity: f32,
}

/// Pre-order walk from the root.  Hidden groups drop their whole subtree,
/// fully transparent layers are omitted, and layers whose surface is gone
/// are skipped with a diagnostic.
pub fn plan(doc: &Document) -> Vec<DrawItem> {
    plan_subtree(doc, doc.root())
}

/// Draw plan for the descendants of `id` alone, as if `id` were the root.
pub fn plan_subtree(doc: &Document, id: NodeId) -> Vec<DrawItem> {
    let mut items = Vec::new();
    for &child in doc.children(id) {
        plan_node(doc, child, 1.0, &mut items);
    }
    items
}

fn plan_node(doc: &Document, id: NodeId, inherited: f32, out: &mut Vec<DrawItem>) {
    let Some(node) = doc.get(id) else {
        log::warn!("compositor: dangling child handle {}", id);
        return;
    };
    if !node.visible() {
        return;
    }
    let opacity = inherited * node.opacity();
    match node.kind() {
        NodeKind::Group => {
            for &child in node.children() {
                plan_node(doc, child, opacity, out);
            }
        }
        NodeKind::Paint(_) | NodeKind::Text { .. } => {
            match node.surface() {
                Some(surface) if !surface.is_disposed() => {
                    if opacity > 0.0 {
                        out.push(DrawItem { node: id, opacity });
                    }
                }
                _ => log::warn!("compositor: skipping '{}', surface unavailable", node.name()),
            }
        }
    }
}

/// Flatten the document on the CPU into a new premultiplied buffer.
pub fn composite(doc: &Document) -> RgbaImage {
    let mut out = RgbaImage::new(doc.width(), doc.height());
    composite_into(doc, &plan(doc), &mut out);
    out
}

/// Draw `items` over `dst` in order.  A layer whose pixels cannot be read is
/// treated as invisible.
pub fn composite_into(doc: &Document, items: &[DrawItem], dst: &mut RgbaImage) {
    for item in items {
        let Some(surface) = doc.surface(item.node) else { continue };
        match surface.pixels() {
            Ok(src) => draw_layer(src, item.opacity, dst),
            Err(e) => log::warn!("compositor: layer {} skipped: {}", item.node, e),
        }
    }
}

/// Source-over one premultiplied buffer onto `dst`, anchored at the origin,
/// with all four channels scaled by `opacity`.
pub fn draw_layer(src: &RgbaImage, opacity: f32, dst: &mut RgbaImage) {
    let w = src.width().min(dst.width()) as usize;
    let h = src.height().min(dst.height()) as usize;
    if w == 0 || h == 0 {
        return;
    }
    let src_stride = src.width() as usize * 4;
    let dst_stride = dst.width() as usize * 4;
    let src_raw = src.as_raw();
    let scale = opacity.clamp(0.0, 1.0) / 255.0;

    dst.as_mut()
        .par_chunks_mut(dst_stride)
        .take(h)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = &src_raw[y * src_stride..y * src_stride + w * 4];
            for x in 0..w {
                let s = &src_row[x * 4..x * 4 + 4];
                if s[3] == 0 {
                    continue;
                }
                let frag = [
                    s[0] as f32 * scale,
                    s[1] as f32 * scale,
                    s[2] as f32 * scale,
                    s[3] as f32 * scale,
                ];
                BlendEquation::PREMULTIPLIED_OVER.apply(frag, &mut row[x * 4..x * 4 + 4]);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn hidden_group_drops_subtree() {
        let mut doc = Document::new(2, 2);
        let root = doc.root();
        let g = doc.create_group("g");
        let a = doc.create_paint_layer("a").unwrap();
        let b = doc.create_paint_layer("b").unwrap();
        doc.add_child(root, g);
        doc.add_child(g, a);
        doc.add_child(root, b);
        doc.set_visible(g, false);

        let items = plan(&doc);
        assert_eq!(items, vec![DrawItem { node: b, opacity: 1.0 }]);
    }

    #[test]
    fn half_opacity_scales_every_channel() {
        let src = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 200]));
        let mut dst = RgbaImage::new(1, 1);
        draw_layer(&src, 0.5, &mut dst);
        assert_eq!(dst.get_pixel(0, 0).0, [100, 50, 25, 100]);
    }
}
