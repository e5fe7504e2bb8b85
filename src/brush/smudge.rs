// ============================================================================
// SMUDGE: drag a softened patch of a paint layer along the pointer path
// ============================================================================
//
// Each pointer move copies the disc of radius `size` around the previous
// point, softens it with a small gaussian and blends it in around the new
// point at `strength`.  Pixels stay premultiplied throughout.

use image::{GrayImage, RgbaImage};

use crate::document::{Document, LayerType, NodeId};
use crate::error::SurfaceError;
use crate::history::PixelCommand;

pub const DEFAULT_SMUDGE_STRENGTH: f32 = 0.5;
const PATCH_BLUR_SIGMA: f32 = 1.0;

/// Smear the pixels around `p1` onto the area around `p2`.
pub fn smudge_patch(
    pixels: &mut RgbaImage,
    p1: (f32, f32),
    p2: (f32, f32),
    radius: f32,
    strength: f32,
    mask: Option<&GrayImage>,
) {
    let radius = radius.max(1.0);
    let side = (radius * 2.0).round().max(1.0) as u32;
    let (w, h) = (pixels.width() as i64, pixels.height() as i64);

    let sx0 = (p1.0 - radius).floor() as i64;
    let sy0 = (p1.1 - radius).floor() as i64;
    let mut patch = RgbaImage::new(side, side);
    for (i, j, px) in patch.enumerate_pixels_mut() {
        let (x, y) = (sx0 + i as i64, sy0 + j as i64);
        if (0..w).contains(&x) && (0..h).contains(&y) {
            *px = *pixels.get_pixel(x as u32, y as u32);
        }
    }
    let patch = image::imageops::blur(&patch, PATCH_BLUR_SIGMA);

    let dx0 = (p2.0 - radius).floor() as i64;
    let dy0 = (p2.1 - radius).floor() as i64;
    let half = side as f32 / 2.0;
    let strength = strength.clamp(0.0, 1.0);
    for (i, j, src) in patch.enumerate_pixels() {
        let nx = (i as f32 + 0.5 - half) / half;
        let ny = (j as f32 + 0.5 - half) / half;
        if nx * nx + ny * ny > 1.0 {
            continue;
        }
        let (x, y) = (dx0 + i as i64, dy0 + j as i64);
        if !(0..w).contains(&x) || !(0..h).contains(&y) {
            continue;
        }
        let (x, y) = (x as u32, y as u32);
        let coverage = mask.map_or(1.0, |m| m.get_pixel_checked(x, y).map_or(0, |p| p.0[0]) as f32 / 255.0);
        let t = strength * coverage;
        if t <= 0.0 {
            continue;
        }
        let dst = pixels.get_pixel_mut(x, y);
        for c in 0..4 {
            let mixed = src.0[c] as f32 * t + dst.0[c] as f32 * (1.0 - t);
            dst.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// One smudge drag: pointer-down to pointer-up, one Command.
#[derive(Debug)]
pub struct SmudgeSession {
    target: NodeId,
    before: RgbaImage,
    last: (f32, f32),
    radius: f32,
    strength: f32,
}

impl SmudgeSession {
    /// Snapshot `target`.  Only visible plain paint layers can be smudged;
    /// text layers keep pixels derived from their attributes.
    pub fn begin(
        doc: &Document,
        target: NodeId,
        radius: f32,
        strength: f32,
        point: (f32, f32),
    ) -> Option<Self> {
        let node = doc.get(target)?;
        if node.layer_type() != LayerType::Paint {
            log::debug!("smudge refused: '{}' is not a paint layer", node.name());
            return None;
        }
        if !doc.effective_visibility(target) {
            log::debug!("smudge refused: '{}' is hidden", node.name());
            return None;
        }
        let before = doc.read_pixels(target).ok()?;
        Some(Self { target, before, last: point, radius, strength })
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn extend(&mut self, doc: &mut Document, point: (f32, f32), mask: Option<&GrayImage>) {
        if let Err(e) = self.apply(doc, point, mask) {
            log::warn!("smudge segment dropped: {}", e);
        }
        self.last = point;
    }

    fn apply(&self, doc: &mut Document, point: (f32, f32), mask: Option<&GrayImage>) -> Result<(), SurfaceError> {
        let pixels = doc
            .surface_mut(self.target)
            .ok_or(SurfaceError::NoPixels)?
            .pixels_mut()?;
        smudge_patch(pixels, self.last, point, self.radius, self.strength, mask);
        doc.notify_pixels_changed(Some(self.target));
        Ok(())
    }

    /// End the drag.  Yields a Command unless nothing changed.
    pub fn finish(self, doc: &Document) -> Option<PixelCommand> {
        let after = doc.read_pixels(self.target).ok()?;
        if after == self.before {
            return None;
        }
        Some(PixelCommand::new(self.target, self.before, after, "Smudge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn patch_moves_colour_towards_the_pointer() {
        let mut img = RgbaImage::new(40, 20);
        for y in 0..20 {
            for x in 0..10 {
                img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        smudge_patch(&mut img, (5.0, 10.0), (20.0, 10.0), 4.0, 0.5, None);
        let p = img.get_pixel(20, 10).0;
        // half of the (fully red) patch blended over transparency
        assert!((120..=135).contains(&p[3]), "alpha {}", p[3]);
        assert_eq!(p[1], 0);
        // outside the disc nothing changes
        assert_eq!(img.get_pixel(30, 10).0, [0, 0, 0, 0]);
    }

    #[test]
    fn masked_out_pixels_stay() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 255, 255]));
        for x in 0..5 {
            for y in 0..20 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let before = img.clone();
        let mask = GrayImage::new(20, 20);
        smudge_patch(&mut img, (2.0, 10.0), (10.0, 10.0), 4.0, 1.0, Some(&mask));
        assert_eq!(img, before);
    }
}
