// ============================================================================
// STAMP TIP: grayscale coverage texture for a brush
// ============================================================================

use image::{DynamicImage, GrayImage, Luma};

/// Edge length of synthesized tips.
pub const TIP_SIZE: u32 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TipShape {
    Round,
    Square,
}

impl TipShape {
    pub fn label(&self) -> &'static str {
        match self {
            TipShape::Round => "Round",
            TipShape::Square => "Square",
        }
    }
}

/// Coverage texture, 0 = no paint, 255 = full strength.
#[derive(Clone, Debug, PartialEq)]
pub struct StampTip {
    image: GrayImage,
}

impl StampTip {
    pub fn from_image(image: GrayImage) -> Self {
        Self { image }
    }

    /// Tips decoded from a PNG.  Luminance is used as coverage.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image: image.to_luma8() }
    }

    /// Radial (round) or Chebyshev (square) falloff: full strength inside
    /// `hardness` of the radius, then linear down to zero at the edge.
    pub fn synthesize(hardness: f32, shape: TipShape) -> Self {
        let center = (TIP_SIZE / 2) as f32;
        let max_dist = center * 0.95;
        let h = hardness.clamp(0.0, 1.0);

        let image = GrayImage::from_fn(TIP_SIZE, TIP_SIZE, |x, y| {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            let dist = match shape {
                TipShape::Round => (dx * dx + dy * dy).sqrt(),
                TipShape::Square => dx.abs().max(dy.abs()),
            };
            let norm = dist / max_dist;
            let value = if norm > 1.0 {
                0
            } else if h >= 1.0 || norm < h {
                255
            } else {
                (255.0 * (1.0 - (norm - h) / (1.0 - h))) as u8
            };
            Luma([value])
        });
        Self { image }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Bilinear coverage in `[0, 1]` at continuous texel coordinates
    /// (texel `i` has its centre at `i + 0.5`).  Outside the tip is zero.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let fx = u - 0.5;
        let fy = v - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let wx = fx - x0;
        let wy = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let fetch = |x: i64, y: i64| -> f32 {
            if x < 0 || y < 0 || x >= self.image.width() as i64 || y >= self.image.height() as i64 {
                0.0
            } else {
                self.image.get_pixel(x as u32, y as u32).0[0] as f32
            }
        };

        let top = fetch(x0, y0) * (1.0 - wx) + fetch(x0 + 1, y0) * wx;
        let bottom = fetch(x0, y0 + 1) * (1.0 - wx) + fetch(x0 + 1, y0 + 1) * wx;
        (top * (1.0 - wy) + bottom * wy) / 255.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_round_tip_is_binary() {
        let tip = StampTip::synthesize(1.0, TipShape::Round);
        assert_eq!(tip.image().get_pixel(64, 64).0[0], 255);
        assert_eq!(tip.image().get_pixel(64, 5).0[0], 255);
        assert_eq!(tip.image().get_pixel(0, 0).0[0], 0);
        assert_eq!(tip.image().get_pixel(64, 2).0[0], 0);
    }

    #[test]
    fn soft_tip_falls_off_linearly() {
        let tip = StampTip::synthesize(0.0, TipShape::Round);
        let c = tip.image().get_pixel(64, 64).0[0];
        let mid = tip.image().get_pixel(64 + 30, 64).0[0];
        assert_eq!(c, 255);
        // norm = 30 / 60.8
        let expected = (255.0 * (1.0 - 30.0 / 60.8)) as u8;
        assert_eq!(mid, expected);
    }

    #[test]
    fn square_tip_fills_corners() {
        let tip = StampTip::synthesize(1.0, TipShape::Square);
        assert_eq!(tip.image().get_pixel(64 + 50, 64 + 50).0[0], 255);
        let round = StampTip::synthesize(1.0, TipShape::Round);
        assert_eq!(round.image().get_pixel(64 + 50, 64 + 50).0[0], 0);
    }

    #[test]
    fn sampling_outside_is_zero() {
        let tip = StampTip::synthesize(1.0, TipShape::Square);
        assert_eq!(tip.sample(-5.0, 64.0), 0.0);
        assert!((tip.sample(64.5, 64.5) - 1.0).abs() < 1e-6);
    }
}
