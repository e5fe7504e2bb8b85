// ============================================================================
// SELECTION PATH: polygon outline and its coverage mask
// ============================================================================

use image::{GrayImage, RgbaImage};
use rayon::prelude::*;

use super::transform::Affine2;

/// Sub-samples per pixel edge used when rasterizing a path.
const SUPERSAMPLE: usize = 4;

/// Axis-aligned box in document space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Normalized box spanning two corners.
    pub fn from_corners(a: (f32, f32), b: (f32, f32)) -> Self {
        Self {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            w: (a.0 - b.0).abs(),
            h: (a.1 - b.1).abs(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains(&self, p: (f32, f32)) -> bool {
        p.0 >= self.x && p.0 <= self.right() && p.1 >= self.y && p.1 <= self.bottom()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionPath {
    points: Vec<(f32, f32)>,
    closed: bool,
}

impl SelectionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<(f32, f32)>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Closed rectangle through two opposite corners.
    pub fn rect(a: (f32, f32), b: (f32, f32)) -> Self {
        let r = Rect::from_corners(a, b);
        Self {
            points: vec![
                (r.x, r.y),
                (r.right(), r.y),
                (r.right(), r.bottom()),
                (r.x, r.bottom()),
            ],
            closed: true,
        }
    }

    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn push(&mut self, p: (f32, f32)) {
        self.points.push(p);
    }

    /// Close the outline when it can enclose an area (three or more points).
    pub fn finish(&mut self) {
        self.closed = self.points.len() > 2;
    }

    pub fn bbox(&self) -> Option<Rect> {
        let first = *self.points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.0, first.1, first.0, first.1);
        for &(x, y) in &self.points[1..] {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn transformed(&self, t: &Affine2) -> Self {
        Self {
            points: self.points.iter().map(|&p| t.map(p)).collect(),
            closed: self.closed,
        }
    }

    /// Even-odd point-in-polygon test.
    pub fn contains(&self, p: (f32, f32)) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let mut inside = false;
        let n = self.points.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.points[i];
            let (xj, yj) = self.points[j];
            if (yi > p.1) != (yj > p.1) && p.0 < (xj - xi) * (p.1 - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Coverage mask of the enclosed area (even-odd, 4×4 supersampled).
    /// Exact (0 or 255) for rectangles on integer coordinates.
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        if self.points.len() < 3 || width == 0 || height == 0 {
            return mask;
        }
        let edges: Vec<((f32, f32), (f32, f32))> = (0..self.points.len())
            .map(|i| (self.points[i], self.points[(i + 1) % self.points.len()]))
            .collect();
        let sub_w = width as usize * SUPERSAMPLE;
        let full = (SUPERSAMPLE * SUPERSAMPLE) as u32;

        mask.as_mut()
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let mut counts = vec![0u32; width as usize];
                let mut crossings = Vec::new();
                for j in 0..SUPERSAMPLE {
                    let sy = y as f32 + (j as f32 + 0.5) / SUPERSAMPLE as f32;
                    crossings.clear();
                    for &((x0, y0), (x1, y1)) in &edges {
                        if (y0 <= sy) != (y1 <= sy) {
                            crossings.push(x0 + (sy - y0) / (y1 - y0) * (x1 - x0));
                        }
                    }
                    crossings.sort_by(|a, b| a.total_cmp(b));
                    for span in crossings.chunks_exact(2) {
                        let k0 = (span[0] * SUPERSAMPLE as f32 - 0.5).ceil().max(0.0) as usize;
                        let k1 = ((span[1] * SUPERSAMPLE as f32 - 0.5).ceil().max(0.0) as usize)
                            .min(sub_w);
                        for k in k0..k1 {
                            counts[k / SUPERSAMPLE] += 1;
                        }
                    }
                }
                for (out, &c) in row.iter_mut().zip(&counts) {
                    *out = ((c * 255 + full / 2) / full) as u8;
                }
            });
        mask
    }
}

/// Tight integer bounds of the non-zero mask area as `(x, y, w, h)`.
pub fn mask_bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, p) in mask.enumerate_pixels() {
        if p.0[0] > 0 {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
    }
    (x0 != u32::MAX).then(|| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

/// Scale every channel of `pixels` by the mask (premultiplied data stays
/// valid).  `invert` keeps the unselected part instead.
pub fn apply_mask(pixels: &RgbaImage, mask: &GrayImage, invert: bool) -> RgbaImage {
    let mut out = pixels.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let m = mask.get_pixel_checked(x, y).map_or(0, |p| p.0[0]) as u32;
        let m = if invert { 255 - m } else { m };
        if m == 255 {
            continue;
        }
        for c in px.0.iter_mut() {
            *c = ((*c as u32 * m + 127) / 255) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_rect_mask_is_exact() {
        let path = SelectionPath::rect((2.0, 3.0), (6.0, 5.0));
        let mask = path.mask(10, 10);
        assert_eq!(mask.get_pixel(2, 3).0[0], 255);
        assert_eq!(mask.get_pixel(5, 4).0[0], 255);
        assert_eq!(mask.get_pixel(6, 4).0[0], 0);
        assert_eq!(mask.get_pixel(1, 3).0[0], 0);
        assert_eq!(mask_bounds(&mask), Some((2, 3, 4, 2)));
    }

    #[test]
    fn half_covered_pixel_is_grey() {
        let path = SelectionPath::rect((0.0, 0.0), (1.5, 1.0));
        let mask = path.mask(2, 1);
        assert_eq!(mask.get_pixel(0, 0).0[0], 255);
        assert_eq!(mask.get_pixel(1, 0).0[0], 128);
    }

    #[test]
    fn lasso_closes_with_three_points() {
        let mut p = SelectionPath::from_points(vec![(0.0, 0.0), (4.0, 0.0)], false);
        p.finish();
        assert!(!p.is_closed());
        p.push((0.0, 4.0));
        p.finish();
        assert!(p.is_closed());
        assert!(p.contains((1.0, 1.0)));
        assert!(!p.contains((3.5, 3.5)));
    }
}
