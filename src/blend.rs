// ============================================================================
// BLEND EQUATIONS: fixed-function blend state shared by CPU and GPU paths
// ============================================================================
//
// The GPU pipelines take their `wgpu::BlendState` from these descriptions and
// the CPU rasterizers evaluate the very same factors per pixel, so both
// back-ends agree on what a stamp or a composite does to the destination.

/// A blend factor, evaluated against the incoming (source) alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

impl BlendFactor {
    #[inline]
    fn weight(self, src_alpha: f32) -> f32 {
        match self {
            BlendFactor::Zero => 0.0,
            BlendFactor::One => 1.0,
            BlendFactor::SrcAlpha => src_alpha,
            BlendFactor::OneMinusSrcAlpha => 1.0 - src_alpha,
        }
    }
}

/// `out = src * src_factor + dst * dst_factor` (additive operation only).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

/// Separate blend components for the color and alpha channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendEquation {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendEquation {
    /// Source-over for premultiplied data. Used by the compositor.
    pub const PREMULTIPLIED_OVER: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
    };

    /// Normal brush stamp: straight source color, alpha accumulated on its
    /// own so overlapping stamps of one stroke do not band.
    pub const STAMP_NORMAL: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
    };

    /// Eraser stamp: the destination is scaled down by the stamp alpha.
    pub const STAMP_ERASE: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::Zero,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::Zero,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
        },
    };

    /// Blend a fragment (`src`, channels in 0..=1) into one RGBA8 pixel.
    #[inline]
    pub fn apply(&self, src: [f32; 4], dst: &mut [u8]) {
        let sa = src[3];
        let cs = self.color.src_factor.weight(sa);
        let cd = self.color.dst_factor.weight(sa);
        for c in 0..3 {
            let d = dst[c] as f32 / 255.0;
            dst[c] = to_u8(src[c] * cs + d * cd);
        }
        let as_ = self.alpha.src_factor.weight(sa);
        let ad = self.alpha.dst_factor.weight(sa);
        let d = dst[3] as f32 / 255.0;
        dst[3] = to_u8(sa * as_ + d * ad);
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

// ============================================================================
// wgpu conversions
// ============================================================================

impl From<BlendFactor> for wgpu::BlendFactor {
    fn from(f: BlendFactor) -> Self {
        match f {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        }
    }
}

impl From<BlendComponent> for wgpu::BlendComponent {
    fn from(c: BlendComponent) -> Self {
        wgpu::BlendComponent {
            src_factor: c.src_factor.into(),
            dst_factor: c.dst_factor.into(),
            operation: wgpu::BlendOperation::Add,
        }
    }
}

impl From<BlendEquation> for wgpu::BlendState {
    fn from(eq: BlendEquation) -> Self {
        wgpu::BlendState {
            color: eq.color.into(),
            alpha: eq.alpha.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_over_replaces_destination() {
        let mut px = [10u8, 200, 30, 255];
        BlendEquation::PREMULTIPLIED_OVER.apply([1.0, 0.0, 0.0, 1.0], &mut px);
        assert_eq!(px, [255, 0, 0, 255]);
    }

    #[test]
    fn stamp_alpha_accumulates_independently() {
        let mut px = [0u8; 4];
        BlendEquation::STAMP_NORMAL.apply([0.0, 0.0, 1.0, 0.4], &mut px);
        assert_eq!(px, [0, 0, 102, 102]);
        BlendEquation::STAMP_NORMAL.apply([0.0, 0.0, 1.0, 0.4], &mut px);
        // 0.4 + 0.4 * (1 - 0.4)
        assert_eq!(px[3], 163);
        assert_eq!(px[2], 163);
    }

    #[test]
    fn erase_scales_whole_pixel() {
        let mut px = [200u8, 100, 50, 200];
        BlendEquation::STAMP_ERASE.apply([0.0, 0.0, 0.0, 1.0], &mut px);
        assert_eq!(px, [0, 0, 0, 0]);

        let mut px = [200u8, 100, 50, 200];
        BlendEquation::STAMP_ERASE.apply([0.0, 0.0, 0.0, 0.5], &mut px);
        assert_eq!(px, [100, 50, 25, 100]);
    }

    #[test]
    fn converts_to_wgpu_state() {
        let state: wgpu::BlendState = BlendEquation::STAMP_NORMAL.into();
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(state.alpha.src_factor, wgpu::BlendFactor::One);
        assert_eq!(state.alpha.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }
}
