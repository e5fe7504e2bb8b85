// ============================================================================
// AFFINE TRANSFORM: 2D matrices and inverse-mapped bilinear rendering
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use super::path::Rect;

/// Row-major 2×3 affine matrix: `x' = a·x + c·y + e`, `y' = b·x + d·y + f`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2 {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn translate(x: f32, y: f32) -> Self {
        Self { e: x, f: y, ..Self::IDENTITY }
    }

    pub fn scale(s: f32) -> Self {
        Self { a: s, d: s, ..Self::IDENTITY }
    }

    /// Clockwise on screen (y points down) for positive degrees.
    pub fn rotate_deg(deg: f32) -> Self {
        let (s, c) = deg.to_radians().sin_cos();
        Self { a: c, b: s, c: -s, d: c, e: 0.0, f: 0.0 }
    }

    /// `self · other`: apply `other` first, then `self`.
    pub fn then_apply(&self, other: &Affine2) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn map(&self, p: (f32, f32)) -> (f32, f32) {
        (
            self.a * p.0 + self.c * p.1 + self.e,
            self.b * p.0 + self.d * p.1 + self.f,
        )
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < 1e-8 {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Self {
            a,
            b,
            c,
            d,
            e: -(a * self.e + c * self.f),
            f: -(b * self.e + d * self.f),
        })
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Position, rotation and uniform scale of the floating selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformState {
    pub pos: (f32, f32),
    pub rotation: f32,
    pub scale: f32,
    /// Untransformed extent of the lifted content, origin at (0, 0).
    pub base: Rect,
}

impl Default for TransformState {
    fn default() -> Self {
        Self { pos: (0.0, 0.0), rotation: 0.0, scale: 1.0, base: Rect::default() }
    }
}

impl TransformState {
    /// `translate(pos) · translate(c) · rotate · scale · translate(−c)`,
    /// `c` being the centre of `base`.
    pub fn matrix(&self) -> Affine2 {
        let (cx, cy) = self.base.center();
        Affine2::translate(self.pos.0, self.pos.1)
            .then_apply(&Affine2::translate(cx, cy))
            .then_apply(&Affine2::rotate_deg(self.rotation))
            .then_apply(&Affine2::scale(self.scale))
            .then_apply(&Affine2::translate(-cx, -cy))
    }
}

/// Render `src` through `t` into a new `width`×`height` buffer.  Each
/// destination pixel centre is mapped back into `src` and sampled
/// bilinearly; samples outside `src` are transparent.
pub fn render_through(src: &RgbaImage, t: &Affine2, width: u32, height: u32) -> RgbaImage {
    let mut dst = RgbaImage::new(width, height);
    let Some(inv) = t.inverse() else {
        log::debug!("render_through: singular transform, nothing drawn");
        return dst;
    };
    if width == 0 || height == 0 {
        return dst;
    }

    let row_bytes = width as usize * 4;
    dst.as_mut().par_chunks_mut(row_bytes).enumerate().for_each(|(dy, row)| {
        let py = dy as f32 + 0.5;
        for dx in 0..width as usize {
            let (sx, sy) = inv.map((dx as f32 + 0.5, py));
            if let Some(px) = bilinear_sample(src, sx - 0.5, sy - 0.5) {
                row[dx * 4..dx * 4 + 4].copy_from_slice(&px);
            }
        }
    });
    dst
}

/// Bilinear fetch at texel-space `(x, y)` (texel centres on integers).
/// `None` when the footprint misses the image entirely.
fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> Option<[u8; 4]> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return None;
    }
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let fetch = |sx: i64, sy: i64| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= w || sy >= h {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32).0;
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };
    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] + (p10[c] - p00[c]) * fx;
        let bottom = p01[c] + (p11[c] - p01[c]) * fx;
        out[c] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}
