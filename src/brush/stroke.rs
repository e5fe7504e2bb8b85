// ============================================================================
// STROKE ENGINE: pointer path → stamped tip quads on a layer surface
// ============================================================================
//
// Each segment is split into evenly spaced stamps.  A stamp is a size×size
// billboard centred on its point; every destination pixel centre inside it
// is mapped into tip space and sampled bilinearly.  The per-pixel blend is
// `BlendEquation::STAMP_NORMAL` or `STAMP_ERASE`.

use image::{GrayImage, RgbaImage};

use super::descriptor::{Brush, BrushBlendMode};
use crate::blend::BlendEquation;
use crate::document::{Document, NodeId};
use crate::error::SurfaceError;
use crate::history::PixelCommand;

/// Stamp centres for the segment `p1 → p2`.  `p2` itself is left for the
/// next segment; a zero-length segment yields exactly one stamp.
pub fn stamp_points(p1: (f32, f32), p2: (f32, f32), step: f32) -> Vec<(f32, f32)> {
    let dx = p2.0 - p1.0;
    let dy = p2.1 - p1.1;
    let distance = (dx * dx + dy * dy).sqrt();
    let steps = ((distance / step.max(1.0)).floor() as usize + 1).max(1);
    (0..steps)
        .map(|i| {
            let t = i as f32 / steps as f32;
            (p1.0 + dx * t, p1.1 + dy * t)
        })
        .collect()
}

/// Rasterize one stamp of `brush` centred at `center`.  `color` is straight
/// RGBA; `mask` (document-sized) scales coverage when a selection is active.
pub fn stamp(
    pixels: &mut RgbaImage,
    brush: &Brush,
    color: [u8; 4],
    center: (f32, f32),
    mask: Option<&GrayImage>,
) {
    let d = &brush.descriptor;
    let size = d.size;
    let left = center.0 - size / 2.0;
    let top = center.1 - size / 2.0;
    let (w, h) = (pixels.width() as i64, pixels.height() as i64);

    let x0 = (left.floor() as i64).max(0);
    let y0 = (top.floor() as i64).max(0);
    let x1 = ((left + size).ceil() as i64).min(w);
    let y1 = ((top + size).ceil() as i64).min(h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let tip_w = brush.tip.width() as f32;
    let tip_h = brush.tip.height() as f32;
    let (equation, strength, rgb) = match d.blend_mode {
        BrushBlendMode::Normal => (
            BlendEquation::STAMP_NORMAL,
            d.flow * d.opacity * color[3] as f32 / 255.0,
            [
                color[0] as f32 / 255.0,
                color[1] as f32 / 255.0,
                color[2] as f32 / 255.0,
            ],
        ),
        BrushBlendMode::Eraser => (BlendEquation::STAMP_ERASE, d.opacity, [0.0; 3]),
    };
    if strength <= 0.0 {
        return;
    }

    for y in y0..y1 {
        let v = ((y as f32 + 0.5) - top) / size * tip_h;
        for x in x0..x1 {
            let u = ((x as f32 + 0.5) - left) / size * tip_w;
            let mut coverage = brush.tip.sample(u, v);
            if let Some(m) = mask {
                coverage *= m
                    .get_pixel_checked(x as u32, y as u32)
                    .map_or(0.0, |p| p.0[0] as f32 / 255.0);
            }
            if coverage <= 0.0 {
                continue;
            }
            let alpha = coverage * strength;
            let px = pixels.get_pixel_mut(x as u32, y as u32);
            equation.apply([rgb[0], rgb[1], rgb[2], alpha], &mut px.0);
        }
    }
}

/// Stamp the segment `p1 → p2` onto `target`'s pixels.  Returns the number
/// of stamps placed.  The surface is changed in place; no Command is made.
pub fn stroke_segment(
    doc: &mut Document,
    target: NodeId,
    brush: &Brush,
    color: [u8; 4],
    p1: (f32, f32),
    p2: (f32, f32),
    mask: Option<&GrayImage>,
) -> Result<usize, SurfaceError> {
    let points = stamp_points(p1, p2, brush.descriptor.step());
    let pixels = doc
        .surface_mut(target)
        .ok_or(SurfaceError::NoPixels)?
        .pixels_mut()?;
    for &p in &points {
        stamp(pixels, brush, color, p, mask);
    }
    doc.notify_pixels_changed(Some(target));
    Ok(points.len())
}

// ============================================================================
// STROKE SESSION: pointer-down → pointer-up, one Command per stroke
// ============================================================================

#[derive(Debug)]
pub struct StrokeSession {
    target: NodeId,
    before: RgbaImage,
    last: (f32, f32),
    erasing: bool,
}

impl StrokeSession {
    /// Snapshot `target` and place the first stamp.  Returns `None` when the
    /// target is a group, hidden or gone.
    pub fn begin(
        doc: &mut Document,
        target: NodeId,
        brush: &Brush,
        color: [u8; 4],
        point: (f32, f32),
        mask: Option<&GrayImage>,
    ) -> Option<Self> {
        let Some(node) = doc.get(target) else {
            log::debug!("stroke refused: layer {} is gone", target);
            return None;
        };
        if !node.has_pixels() {
            log::debug!("stroke refused: '{}' is a group", node.name());
            return None;
        }
        if !doc.effective_visibility(target) {
            log::debug!("stroke refused: '{}' is hidden", node.name());
            return None;
        }
        let before = match doc.read_pixels(target) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("stroke refused: {}", e);
                return None;
            }
        };
        if let Err(e) = stroke_segment(doc, target, brush, color, point, point, mask) {
            log::warn!("stroke refused: {}", e);
            return None;
        }
        Some(Self {
            target,
            before,
            last: point,
            erasing: brush.descriptor.blend_mode == BrushBlendMode::Eraser,
        })
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn extend(
        &mut self,
        doc: &mut Document,
        brush: &Brush,
        color: [u8; 4],
        point: (f32, f32),
        mask: Option<&GrayImage>,
    ) {
        if let Err(e) = stroke_segment(doc, self.target, brush, color, self.last, point, mask) {
            log::warn!("stroke segment dropped: {}", e);
        }
        self.last = point;
    }

    /// End the stroke.  Yields a Command unless the pixels did not change.
    pub fn finish(self, doc: &Document) -> Option<PixelCommand> {
        let after = doc.read_pixels(self.target).ok()?;
        if after == self.before {
            return None;
        }
        let description = if self.erasing { "Eraser Stroke" } else { "Brush Stroke" };
        Some(PixelCommand::new(self.target, self.before, after, description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_is_one_stamp() {
        assert_eq!(stamp_points((3.0, 4.0), (3.0, 4.0), 5.0), vec![(3.0, 4.0)]);
    }

    #[test]
    fn step_count_follows_spacing() {
        // step 5, distance 20 -> floor(4) + 1
        let pts = stamp_points((0.0, 0.0), (20.0, 0.0), 5.0);
        assert_eq!(pts.len(), 5);
        assert_eq!(pts[0], (0.0, 0.0));
        assert_eq!(pts[1], (4.0, 0.0));
        // step below one pixel is raised to one
        assert_eq!(stamp_points((0.0, 0.0), (3.0, 0.0), 0.2).len(), 4);
    }
}
