// ============================================================================
// CANVAS OPERATIONS: new document, canvas resize, per-layer adjustments
// ============================================================================
//
// Adjustments run on straight-alpha copies (image::imageops expects that)
// and convert back to premultiplied storage.  Each one is a single Command.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::document::{Document, NodeId, NodeKind};
use crate::error::SurfaceError;
use crate::history::{PixelCommand, UndoStack};
use crate::surface::{check_dimensions, premultiply, unpremultiply};

pub const BACKGROUND_LAYER_NAME: &str = "Background";

/// A document with one filled "Background" layer.  Returns the document
/// and that layer, which callers make active.  A zero or oversized side is
/// an `InvalidDimensions` error.
pub fn new_document(
    width: u32,
    height: u32,
    background: [u8; 4],
) -> Result<(Document, NodeId), SurfaceError> {
    check_dimensions(width, height)?;
    let mut doc = Document::new(width, height);
    let straight = RgbaImage::from_pixel(width, height, Rgba(background));
    let layer = doc.create_paint_layer_from(BACKGROUND_LAYER_NAME, premultiply(&straight))?;
    let root = doc.root();
    doc.add_child(root, layer);
    Ok((doc, layer))
}

// ============================================================================
// RESIZE CANVAS
// ============================================================================

/// Where existing content sits in a resized canvas, as fractions of the
/// size change: (0, 0) keeps the top-left, (0.5, 0.5) centres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    pub const TOP_LEFT: Self = Self { x: 0.0, y: 0.0 };
    pub const CENTER: Self = Self { x: 0.5, y: 0.5 };
    pub const BOTTOM_RIGHT: Self = Self { x: 1.0, y: 1.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x: x.clamp(0.0, 1.0), y: y.clamp(0.0, 1.0) }
    }

    /// Pixel offset of the old content inside the new canvas.
    pub fn offset(&self, old: (u32, u32), new: (u32, u32)) -> (i64, i64) {
        (
            ((new.0 as f32 - old.0 as f32) * self.x).floor() as i64,
            ((new.1 as f32 - old.1 as f32) * self.y).floor() as i64,
        )
    }
}

/// Recreate every surface at `width`×`height` with the old content placed
/// per `anchor`.  History is cleared: stored snapshots no longer fit.
pub fn resize_canvas(
    doc: &mut Document,
    undo: &mut UndoStack,
    width: u32,
    height: u32,
    anchor: Anchor,
) -> Result<(), SurfaceError> {
    check_dimensions(width, height)?;
    let old = doc.size();
    let (dx, dy) = anchor.offset(old, (width, height));

    for id in doc.node_ids() {
        let Some(node) = doc.get_mut(id) else { continue };
        if let NodeKind::Text { style, .. } = &mut node.kind {
            style.position.0 += dx as f32;
            style.position.1 += dy as f32;
        }
        let Some(surface) = node.surface_mut() else { continue };
        let Ok(pixels) = surface.pixels() else {
            log::warn!("resize: layer {} has no pixels, skipped", id);
            continue;
        };
        let mut resized = RgbaImage::new(width, height);
        image::imageops::replace(&mut resized, pixels, dx, dy);
        surface.write(&resized)?;
    }

    doc.set_size(width, height);
    undo.clear();
    log::info!("canvas resized {}x{} -> {}x{} (offset {}, {})", old.0, old.1, width, height, dx, dy);
    Ok(())
}

// ============================================================================
// ADJUSTMENTS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum Adjustment {
    FlipHorizontal,
    FlipVertical,
    Rotate180,
    /// Added to every colour channel.
    Brightness(i32),
    /// Percent; positive raises contrast.
    Contrast(f32),
    /// Degrees.
    HueRotate(i32),
    /// `hue` in degrees, `saturation` as a factor (1 = unchanged, 0 = grey),
    /// `lightness` added to every channel (-255..255).
    HueSaturationLightness { hue: f32, saturation: f32, lightness: f32 },
    /// Channel gain: 1 = unchanged, above 1 brighter.
    Exposure(f32),
    /// Replace each pixel's colour by the gradient colour at its luminance.
    GradientMap(GradientMap),
    /// Gaussian sigma in pixels.
    Blur(f32),
    Invert,
}

impl Adjustment {
    pub fn label(&self) -> &'static str {
        match self {
            Adjustment::FlipHorizontal => "Flip Horizontal",
            Adjustment::FlipVertical => "Flip Vertical",
            Adjustment::Rotate180 => "Rotate 180°",
            Adjustment::Brightness(_) => "Brightness",
            Adjustment::Contrast(_) => "Contrast",
            Adjustment::HueRotate(_) => "Hue Rotate",
            Adjustment::HueSaturationLightness { .. } => "Hue/Saturation/Lightness",
            Adjustment::Exposure(_) => "Exposure",
            Adjustment::GradientMap(_) => "Gradient Map",
            Adjustment::Blur(_) => "Gaussian Blur",
            Adjustment::Invert => "Invert Colors",
        }
    }

    fn apply_straight(&self, img: &RgbaImage) -> RgbaImage {
        use image::imageops;
        match self {
            Adjustment::FlipHorizontal => imageops::flip_horizontal(img),
            Adjustment::FlipVertical => imageops::flip_vertical(img),
            Adjustment::Rotate180 => imageops::rotate180(img),
            Adjustment::Brightness(v) => imageops::colorops::brighten(img, *v),
            Adjustment::Contrast(c) => imageops::colorops::contrast(img, *c),
            Adjustment::HueRotate(deg) => imageops::colorops::huerotate(img, *deg),
            &Adjustment::HueSaturationLightness { hue, saturation, lightness } => {
                let saturation = saturation.max(0.0);
                map_pixels(img, move |r, g, b| {
                    let (h, s, l) = rgb_to_hsl(r / 255.0, g / 255.0, b / 255.0);
                    let h = (h + hue / 360.0).rem_euclid(1.0);
                    let s = (s * saturation).clamp(0.0, 1.0);
                    let (r, g, b) = hsl_to_rgb(h, s, l);
                    (r * 255.0 + lightness, g * 255.0 + lightness, b * 255.0 + lightness)
                })
            }
            &Adjustment::Exposure(gain) => {
                let gain = gain.max(0.0);
                map_pixels(img, move |r, g, b| (r * gain, g * gain, b * gain))
            }
            Adjustment::GradientMap(map) => map_pixels(img, |r, g, b| {
                let [r, g, b] = map.sample(luminance(r, g, b));
                (r as f32, g as f32, b as f32)
            }),
            Adjustment::Blur(sigma) => imageops::blur(img, sigma.max(0.1)),
            Adjustment::Invert => {
                let mut out = img.clone();
                imageops::colorops::invert(&mut out);
                out
            }
        }
    }
}

/// Apply `adjustment` to a paint or text layer and push one Command.
/// Returns `false` for groups and unchanged results.
pub fn apply_adjustment(
    doc: &mut Document,
    undo: &mut UndoStack,
    target: NodeId,
    adjustment: Adjustment,
) -> bool {
    if !doc.get(target).is_some_and(|n| n.has_pixels()) {
        log::debug!("{}: {} holds no pixels", adjustment.label(), target);
        return false;
    }
    let Ok(before) = doc.read_pixels(target) else { return false };
    let after = premultiply(&adjustment.apply_straight(&unpremultiply(&before)));
    if after == before {
        return false;
    }
    if let Err(e) = doc.write_pixels(target, &after) {
        log::warn!("{}: writing {} failed: {}", adjustment.label(), target, e);
        return false;
    }
    undo.push(PixelCommand::new(target, before, after, adjustment.label()));
    true
}

/// Run `f` over the colour of every pixel (straight 0..255 floats), rows in
/// parallel.  Alpha is kept.
fn map_pixels<F>(img: &RgbaImage, f: F) -> RgbaImage
where
    F: Fn(f32, f32, f32) -> (f32, f32, f32) + Sync,
{
    let mut out = img.clone();
    let stride = img.width() as usize * 4;
    if stride == 0 {
        return out;
    }
    out.par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            if px[3] == 0 {
                continue;
            }
            let (r, g, b) = f(px[0] as f32, px[1] as f32, px[2] as f32);
            px[0] = r.round().clamp(0.0, 255.0) as u8;
            px[1] = g.round().clamp(0.0, 255.0) as u8;
            px[2] = b.round().clamp(0.0, 255.0) as u8;
        }
    });
    out
}

/// Rec. 709 luma of a straight colour, 0..255.
fn luminance(r: f32, g: f32, b: f32) -> u8 {
    (0.2126 * r + 0.7152 * g + 0.0722 * b).round().clamp(0.0, 255.0) as u8
}

pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d.abs() < 1e-6 {
        return (0.0, 0.0, l);
    }
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if (max - r).abs() < 1e-6 {
        ((g - b) / d).rem_euclid(6.0) / 6.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };
    (h, s, l)
}

pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s.abs() < 1e-6 {
        return (l, l, l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

// ============================================================================
// GRADIENT MAP
// ============================================================================

/// One colour stop; `position` runs 0 (shadows) to 1 (highlights).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub position: f32,
    pub color: [u8; 3],
}

impl GradientStop {
    pub fn new(position: f32, color: [u8; 3]) -> Self {
        Self { position, color }
    }
}

/// A 256-entry lookup table built from colour stops.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientMap {
    lut: Vec<[u8; 3]>,
}

impl Default for GradientMap {
    fn default() -> Self {
        Self::two_color([0, 0, 0], [255, 255, 255])
    }
}

impl GradientMap {
    pub fn two_color(shadows: [u8; 3], highlights: [u8; 3]) -> Self {
        Self::from_stops(&[GradientStop::new(0.0, shadows), GradientStop::new(1.0, highlights)])
    }

    /// Linear interpolation between the stops sorted by position.  Outside
    /// the first and last stop the end colours hold.  No stops maps to black.
    pub fn from_stops(stops: &[GradientStop]) -> Self {
        let mut sorted: Vec<GradientStop> = stops
            .iter()
            .copied()
            .filter(|s| s.position.is_finite())
            .map(|s| GradientStop::new(s.position.clamp(0.0, 1.0), s.color))
            .collect();
        sorted.sort_by(|a, b| a.position.total_cmp(&b.position));

        let lut = (0..256)
            .map(|i| {
                let t = i as f32 / 255.0;
                let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
                    return [0, 0, 0];
                };
                if t <= first.position {
                    return first.color;
                }
                if t >= last.position {
                    return last.color;
                }
                let Some(pair) = sorted.windows(2).find(|w| w[0].position <= t && t <= w[1].position) else {
                    return last.color;
                };
                let (left, right) = (pair[0], pair[1]);
                let span = right.position - left.position;
                let k = if span > 0.0 { (t - left.position) / span } else { 0.0 };
                let mix = |a: u8, b: u8| (a as f32 * (1.0 - k) + b as f32 * k).round() as u8;
                [
                    mix(left.color[0], right.color[0]),
                    mix(left.color[1], right.color[1]),
                    mix(left.color[2], right.color[2]),
                ]
            })
            .collect();
        Self { lut }
    }

    pub fn sample(&self, luma: u8) -> [u8; 3] {
        self.lut.get(luma as usize).copied().unwrap_or([0, 0, 0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_offsets_floor() {
        assert_eq!(Anchor::CENTER.offset((10, 10), (15, 20)), (2, 5));
        assert_eq!(Anchor::BOTTOM_RIGHT.offset((10, 10), (4, 4)), (-6, -6));
        assert_eq!(Anchor::CENTER.offset((10, 10), (7, 7)), (-2, -2));
    }

    #[test]
    fn flip_pushes_one_command() {
        let (mut doc, bg) = new_document(2, 1, [255, 255, 255, 255]).unwrap();
        let mut px = doc.read_pixels(bg).unwrap();
        px.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        doc.write_pixels(bg, &px).unwrap();

        let mut undo = UndoStack::default();
        assert!(apply_adjustment(&mut doc, &mut undo, bg, Adjustment::FlipHorizontal));
        assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(undo.undo_description(), Some("Flip Horizontal"));
    }

    #[test]
    fn hsl_round_trips_primaries() {
        let (h, s, l) = rgb_to_hsl(0.0, 1.0, 0.0);
        assert!((h - 1.0 / 3.0).abs() < 1e-5);
        assert!((s - 1.0).abs() < 1e-5 && (l - 0.5).abs() < 1e-5);
        let (r, g, b) = hsl_to_rgb(h, s, l);
        assert!(r.abs() < 1e-4 && (g - 1.0).abs() < 1e-4 && b.abs() < 1e-4, "{r} {g} {b}");
    }

    #[test]
    fn gradient_lut_interpolates_and_clamps() {
        let map = GradientMap::from_stops(&[
            GradientStop::new(1.0, [255, 0, 0]),
            GradientStop::new(0.5, [0, 0, 255]),
        ]);
        // below the first stop the first colour holds
        assert_eq!(map.sample(0), [0, 0, 255]);
        assert_eq!(map.sample(255), [255, 0, 0]);
        let mid = map.sample(191);
        assert!(mid[0] > 120 && mid[0] < 135 && mid[2] > 120 && mid[2] < 135, "{:?}", mid);
        assert_eq!(GradientMap::from_stops(&[]).sample(99), [0, 0, 0]);
    }
}
