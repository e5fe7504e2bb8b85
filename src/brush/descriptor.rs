// ============================================================================
// BRUSH DESCRIPTOR: the parameters stored in a brush's config.json
// ============================================================================

use serde::{Deserialize, Serialize};

use super::tip::StampTip;
use crate::error::BrushError;

/// How a stamp combines with the layer underneath.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushBlendMode {
    #[default]
    Normal,
    Eraser,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushDescriptor {
    pub name: String,
    pub category: String,
    /// Stamp edge length in document pixels.
    pub size: f32,
    pub opacity: f32,
    /// Per-stamp alpha multiplier.
    pub flow: f32,
    /// Distance between stamps as a fraction of `size`.
    pub spacing: f32,
    /// Fraction of the tip radius painted at full strength.
    pub hardness: f32,
    pub blend_mode: BrushBlendMode,
}

impl Default for BrushDescriptor {
    fn default() -> Self {
        Self {
            name: "Brush".to_string(),
            category: "Other".to_string(),
            size: 10.0,
            opacity: 1.0,
            flow: 1.0,
            spacing: 0.1,
            hardness: 1.0,
            blend_mode: BrushBlendMode::Normal,
        }
    }
}

impl BrushDescriptor {
    /// Reject non-finite or non-positive sizes and clamp the unit-range
    /// parameters.
    pub fn validated(mut self) -> Result<Self, BrushError> {
        let finite = [self.size, self.opacity, self.flow, self.spacing, self.hardness]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(BrushError::Invalid(format!("'{}' has non-finite parameters", self.name)));
        }
        if self.size <= 0.0 {
            return Err(BrushError::Invalid(format!("'{}' has size {}", self.name, self.size)));
        }
        self.opacity = self.opacity.clamp(0.0, 1.0);
        self.flow = self.flow.clamp(0.0, 1.0);
        self.hardness = self.hardness.clamp(0.0, 1.0);
        self.spacing = self.spacing.max(0.0);
        Ok(self)
    }

    /// Distance between consecutive stamps, never below one pixel.
    pub fn step(&self) -> f32 {
        (self.size * self.spacing).max(1.0)
    }

    /// Name with spaces replaced, lowercased; used as the asset directory.
    pub fn folder_name(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }
}

/// A loaded brush: parameters plus the tip it stamps with.
#[derive(Clone, Debug)]
pub struct Brush {
    pub descriptor: BrushDescriptor,
    pub tip: StampTip,
}

impl Brush {
    pub fn new(descriptor: BrushDescriptor, tip: StampTip) -> Self {
        Self { descriptor, tip }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let d: BrushDescriptor = serde_json::from_str(r#"{"name":"Soft","size":40}"#).unwrap();
        assert_eq!(d.size, 40.0);
        assert_eq!(d.blend_mode, BrushBlendMode::Normal);
        assert_eq!(d.spacing, 0.1);
    }

    #[test]
    fn validation_clamps_and_rejects() {
        let d = BrushDescriptor { opacity: 3.0, ..Default::default() }.validated().unwrap();
        assert_eq!(d.opacity, 1.0);
        assert!(BrushDescriptor { size: 0.0, ..Default::default() }.validated().is_err());
        assert!(BrushDescriptor { flow: f32::NAN, ..Default::default() }.validated().is_err());
    }

    #[test]
    fn step_has_one_pixel_floor() {
        let d = BrushDescriptor { size: 4.0, spacing: 0.1, ..Default::default() };
        assert_eq!(d.step(), 1.0);
        let d = BrushDescriptor { size: 50.0, spacing: 0.1, ..Default::default() };
        assert_eq!(d.step(), 5.0);
    }
}
