// ============================================================================
// TEXT RASTERIZATION: regenerates text layer pixels from a TextStyle
// ============================================================================

use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::RgbaImage;

use super::node::TextStyle;

/// Glyph rasterizer for text layers.  Holds at most one font; without a font
/// every render is fully transparent.
#[derive(Clone, Default)]
pub struct TextRenderer {
    font: Option<FontArc>,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer").field("has_font", &self.font.is_some()).finish()
    }
}

impl TextRenderer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// A renderer with no font.
    pub fn none() -> Self {
        Self { font: None }
    }

    /// Load a TrueType/OpenType font from memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ab_glyph::InvalidFont> {
        Ok(Self { font: Some(FontArc::try_from_vec(bytes)?) })
    }

    /// Look up `family` among the system fonts, falling back to the default
    /// sans-serif face.
    pub fn system(family: &str) -> Self {
        let font = load_system_font(family).or_else(load_default_sans);
        if font.is_none() {
            log::warn!("no usable system font found for '{}'", family);
        }
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Rasterize `style` into a transparent `width × height` buffer
    /// (premultiplied RGBA).
    pub fn render(&self, style: &TextStyle, width: u32, height: u32) -> RgbaImage {
        let mut out = RgbaImage::new(width, height);
        let Some(font) = self.font.as_ref() else {
            log::warn!("text layer rendered without a font: '{}'", style.text);
            return out;
        };
        if style.text.is_empty() || style.font_size <= 0.0 || style.color[3] == 0 {
            return out;
        }

        let coverage = rasterize_coverage(font, style, width, height);
        let [r, g, b, a] = style.color;
        for (px, &cov) in out.pixels_mut().zip(coverage.iter()) {
            if cov <= 0.0 {
                continue;
            }
            let alpha = cov.min(1.0) * a as f32 / 255.0;
            px.0 = [
                (r as f32 * alpha).round() as u8,
                (g as f32 * alpha).round() as u8,
                (b as f32 * alpha).round() as u8,
                (alpha * 255.0).round() as u8,
            ];
        }
        out
    }
}

/// Lay out one line starting at x = 0, returning `(glyph, x)` pairs.
fn layout_line(font: &FontArc, line: &str, font_size: f32) -> Vec<(GlyphId, f32)> {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::with_capacity(line.len());
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in line.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    glyphs
}

/// Per-pixel glyph coverage for the whole document, row-major.
fn rasterize_coverage(font: &FontArc, style: &TextStyle, width: u32, height: u32) -> Vec<f32> {
    let mut coverage = vec![0.0f32; width as usize * height as usize];
    let scaled = font.as_scaled(style.font_size);
    let ascent = scaled.ascent();
    let line_height = scaled.height() + scaled.line_gap();
    let (origin_x, origin_y) = style.position;

    for (line_idx, line) in style.text.split('\n').enumerate() {
        let baseline = origin_y + ascent + line_idx as f32 * line_height;
        for (id, x) in layout_line(font, line, style.font_size) {
            let glyph = id.with_scale_and_position(style.font_size, point(origin_x + x, baseline));
            let Some(outlined) = font.outline_glyph(glyph) else { continue };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, cov| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                    return;
                }
                let idx = py as usize * width as usize + px as usize;
                coverage[idx] = (coverage[idx] + cov).min(1.0);
            });
        }
    }
    coverage
}

/// Resolve a family name through font-kit and load it for ab_glyph.
pub fn load_system_font(family: &str) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    load_family(&[FamilyName::Title(family.to_string())])
}

fn load_default_sans() -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    load_family(&[FamilyName::SansSerif])
}

fn load_family(families: &[font_kit::family_name::FamilyName]) -> Option<FontArc> {
    use font_kit::properties::Properties;
    use font_kit::source::SystemSource;

    let handle = SystemSource::new()
        .select_best_match(families, &Properties::new())
        .ok()?;
    let font = handle.load().ok()?;
    let data = font.copy_font_data()?;
    FontArc::try_from_vec((*data).clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_transparent_without_font() {
        let r = TextRenderer::none();
        let img = r.render(&TextStyle::default(), 32, 16);
        assert_eq!(img.dimensions(), (32, 16));
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }
}
