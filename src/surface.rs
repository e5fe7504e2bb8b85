// ============================================================================
// RASTER SURFACE: pixel store + render-target binding owned by a paint layer
// ============================================================================
//
// The CPU-side `RgbaImage` is authoritative and always stored top-down in
// premultiplied RGBA8.  A GPU texture (see `gpu::texture::LayerTexture`) is
// attached lazily by the renderer and re-uploaded whenever `generation`
// moves on.  `dispose()` releases both halves exactly once.

use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

use crate::error::SurfaceError;
use crate::gpu::texture::LayerTexture;

/// Largest edge a surface may have, matching common GPU texture limits.
pub const MAX_SURFACE_DIM: u32 = 32_768;

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Row order of a raw pixel buffer handed to `write_rows`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOrder {
    /// First row is the top of the image.
    TopDown,
    /// First row is the bottom of the image (GL-style readback).
    BottomUp,
}

/// GPU half of a surface: the uploaded texture and the generation it holds.
pub(crate) struct GpuBinding {
    pub(crate) texture: LayerTexture,
    pub(crate) generation: u64,
}

pub struct RasterSurface {
    id: u64,
    pixels: Option<RgbaImage>,
    generation: u64,
    gpu: Option<GpuBinding>,
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("id", &self.id)
            .field("size", &self.pixels.as_ref().map(|p| p.dimensions()))
            .field("generation", &self.generation)
            .field("gpu", &self.gpu.is_some())
            .finish()
    }
}

/// Both sides within `1..=MAX_SURFACE_DIM`.
pub fn check_dimensions(width: u32, height: u32) -> Result<(), SurfaceError> {
    if width == 0 || height == 0 || width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
        return Err(SurfaceError::InvalidDimensions { width, height });
    }
    Ok(())
}

impl RasterSurface {
    /// Create zero-initialised (fully transparent) storage.
    pub fn allocate(width: u32, height: u32) -> Result<Self, SurfaceError> {
        check_dimensions(width, height)?;
        Ok(Self {
            id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
            pixels: Some(RgbaImage::new(width, height)),
            generation: 1,
            gpu: None,
        })
    }

    /// Create a surface holding a copy of `image`.
    pub fn from_image(image: RgbaImage) -> Result<Self, SurfaceError> {
        check_dimensions(image.width(), image.height())?;
        Ok(Self {
            id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
            pixels: Some(image),
            generation: 1,
            gpu: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_disposed(&self) -> bool {
        self.pixels.is_none()
    }

    pub fn width(&self) -> u32 {
        self.pixels.as_ref().map_or(0, |p| p.width())
    }

    pub fn height(&self) -> u32 {
        self.pixels.as_ref().map_or(0, |p| p.height())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Borrow the live pixels.
    pub fn pixels(&self) -> Result<&RgbaImage, SurfaceError> {
        self.pixels.as_ref().ok_or(SurfaceError::Disposed(self.id))
    }

    /// Mutably borrow the live pixels.  Counts as a write.
    pub fn pixels_mut(&mut self) -> Result<&mut RgbaImage, SurfaceError> {
        let id = self.id;
        let pixels = self.pixels.as_mut().ok_or(SurfaceError::Disposed(id))?;
        self.generation += 1;
        Ok(pixels)
    }

    /// Capture the current contents, top row first.
    pub fn read(&self) -> Result<RgbaImage, SurfaceError> {
        self.pixels().cloned()
    }

    /// Replace the contents.  A buffer of different dimensions recreates the
    /// backing store (old content and GPU texture are released first).
    pub fn write(&mut self, buffer: &RgbaImage) -> Result<(), SurfaceError> {
        check_dimensions(buffer.width(), buffer.height())?;
        let id = self.id;
        let pixels = self.pixels.as_mut().ok_or(SurfaceError::Disposed(id))?;
        if pixels.dimensions() != buffer.dimensions() {
            log::debug!(
                "surface {} resized {:?} -> {:?}",
                id,
                pixels.dimensions(),
                buffer.dimensions()
            );
            self.gpu = None;
            *pixels = buffer.clone();
        } else {
            pixels.copy_from_slice(buffer.as_raw());
        }
        self.generation += 1;
        Ok(())
    }

    /// Replace the contents from raw RGBA8 rows in the given scan order.
    pub fn write_rows(
        &mut self,
        width: u32,
        height: u32,
        data: &[u8],
        order: ScanOrder,
    ) -> Result<(), SurfaceError> {
        check_dimensions(width, height)?;
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(SurfaceError::SizeMismatch { expected, actual: data.len() });
        }
        let rows = match order {
            ScanOrder::TopDown => data.to_vec(),
            ScanOrder::BottomUp => {
                let stride = width as usize * 4;
                data.chunks_exact(stride).rev().flatten().copied().collect()
            }
        };
        let image = RgbaImage::from_raw(width, height, rows)
            .ok_or(SurfaceError::SizeMismatch { expected, actual: data.len() })?;
        self.write(&image)
    }

    /// Release pixel storage and any GPU texture.  Calling this twice is an
    /// error; using the surface afterwards yields `SurfaceError::Disposed`.
    pub fn dispose(&mut self) -> Result<(), SurfaceError> {
        if self.pixels.take().is_none() {
            return Err(SurfaceError::AlreadyDisposed(self.id));
        }
        self.gpu = None;
        self.generation += 1;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // GPU binding (managed by `gpu::renderer::GpuRenderer`)
    // ------------------------------------------------------------------------

    pub(crate) fn gpu_binding(&self) -> Option<&GpuBinding> {
        self.gpu.as_ref()
    }

    pub(crate) fn gpu_is_current(&self) -> bool {
        self.gpu.as_ref().is_some_and(|g| {
            g.generation == self.generation
                && g.texture.width == self.width()
                && g.texture.height == self.height()
        })
    }

    pub(crate) fn take_gpu(&mut self) -> Option<GpuBinding> {
        self.gpu.take()
    }

    pub(crate) fn set_gpu(&mut self, texture: LayerTexture) {
        self.gpu = Some(GpuBinding { texture, generation: self.generation });
    }
}

// ============================================================================
// ALPHA CONVERSION (storage is premultiplied; files are straight)
// ============================================================================

/// Convert a straight-alpha image (as decoded from PNG) to storage format.
pub fn premultiply(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let a = px.0[3] as u32;
        for c in 0..3 {
            px.0[c] = ((px.0[c] as u32 * a + 127) / 255) as u8;
        }
    }
    out
}

/// Convert storage pixels to straight alpha for export.  Lossless for valid
/// premultiplied data: `premultiply(&unpremultiply(p)) == p`.
pub fn unpremultiply(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        px.0 = unpremultiply_pixel(px.0);
    }
    out
}

pub fn unpremultiply_pixel(px: [u8; 4]) -> [u8; 4] {
    let a = px[3] as u32;
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let c = |v: u8| ((v as u32 * 255 + a / 2) / a).min(255) as u8;
    [c(px[0]), c(px[1]), c(px[2]), px[3]]
}

impl Drop for RasterSurface {
    fn drop(&mut self) {
        if self.pixels.is_some() {
            log::debug!("surface {} dropped without dispose(), releasing", self.id);
            let _ = self.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn allocate_is_transparent() {
        let s = RasterSurface::allocate(4, 3).unwrap();
        assert_eq!(s.dimensions(), (4, 3));
        assert!(s.read().unwrap().pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn rejects_zero_size() {
        assert!(matches!(
            RasterSurface::allocate(0, 5),
            Err(SurfaceError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn write_resizes_on_dimension_change() {
        let mut s = RasterSurface::allocate(2, 2).unwrap();
        let g0 = s.generation();
        let big = RgbaImage::from_pixel(5, 7, Rgba([1, 2, 3, 4]));
        s.write(&big).unwrap();
        assert_eq!(s.dimensions(), (5, 7));
        assert!(s.generation() > g0);
        assert_eq!(s.read().unwrap().get_pixel(4, 6).0, [1, 2, 3, 4]);
    }

    #[test]
    fn bottom_up_rows_are_flipped() {
        let mut s = RasterSurface::allocate(1, 2).unwrap();
        // bottom row red, top row blue
        let data = [255, 0, 0, 255, 0, 0, 255, 255];
        s.write_rows(1, 2, &data, ScanOrder::BottomUp).unwrap();
        let img = s.read().unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn write_rows_checks_length() {
        let mut s = RasterSurface::allocate(2, 2).unwrap();
        let err = s.write_rows(2, 2, &[0; 3], ScanOrder::TopDown).unwrap_err();
        assert_eq!(err, SurfaceError::SizeMismatch { expected: 16, actual: 3 });
    }

    #[test]
    fn dispose_exactly_once() {
        let mut s = RasterSurface::allocate(2, 2).unwrap();
        s.dispose().unwrap();
        assert!(s.is_disposed());
        assert!(matches!(s.dispose(), Err(SurfaceError::AlreadyDisposed(_))));
        assert!(matches!(s.read(), Err(SurfaceError::Disposed(_))));
        assert!(s.write(&RgbaImage::new(2, 2)).is_err());
    }
}
