// ============================================================================
// BRUSH LIBRARY: brush assets on disk and the built-in presets
// ============================================================================
//
// Layout: <dir>/<brush_folder>/config.json + optional texture.png.
// A folder that fails to load is logged and skipped.

use std::fs;
use std::path::Path;

use super::descriptor::{Brush, BrushBlendMode, BrushDescriptor};
use super::tip::{StampTip, TipShape};
use crate::error::BrushError;

const CONFIG_FILE: &str = "config.json";
const TEXTURE_FILE: &str = "texture.png";

#[derive(Clone, Debug, Default)]
pub struct BrushLibrary {
    brushes: Vec<Brush>,
}

impl BrushLibrary {
    pub fn new(brushes: Vec<Brush>) -> Self {
        Self { brushes }
    }

    /// The ten built-in presets.
    pub fn defaults() -> Self {
        let brushes = default_presets()
            .into_iter()
            .map(|(descriptor, shape)| {
                let tip = StampTip::synthesize(descriptor.hardness, shape);
                Brush::new(descriptor, tip)
            })
            .collect();
        Self { brushes }
    }

    /// Load every brush folder under `dir`, sorted by folder name.
    pub fn load_dir(dir: &Path) -> Result<Self, BrushError> {
        let mut folders: Vec<_> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        folders.sort();

        let mut brushes = Vec::new();
        for folder in folders {
            match load_brush(&folder) {
                Ok(brush) => brushes.push(brush),
                Err(e) => log::warn!("brush '{}' skipped: {}", folder.display(), e),
            }
        }
        log::info!("loaded {} brushes from {}", brushes.len(), dir.display());
        Ok(Self { brushes })
    }

    /// Load from `dir`, falling back to the built-in presets when the
    /// directory is missing or holds no usable brush.
    pub fn load_or_defaults(dir: &Path) -> Self {
        match Self::load_dir(dir) {
            Ok(lib) if !lib.is_empty() => lib,
            Ok(_) => Self::defaults(),
            Err(e) => {
                log::info!("brush dir {} unavailable ({}), using presets", dir.display(), e);
                Self::defaults()
            }
        }
    }

    /// Write the built-in presets to `dir` in the on-disk layout.
    pub fn write_defaults(dir: &Path) -> Result<usize, BrushError> {
        let lib = Self::defaults();
        for brush in &lib.brushes {
            let folder = dir.join(brush.descriptor.folder_name());
            fs::create_dir_all(&folder)?;
            let json = serde_json::to_string_pretty(&brush.descriptor)?;
            fs::write(folder.join(CONFIG_FILE), json)?;
            brush.tip.image().save(folder.join(TEXTURE_FILE))?;
        }
        Ok(lib.len())
    }

    pub fn brushes(&self) -> &[Brush] {
        &self.brushes
    }

    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Brush> {
        self.brushes.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&Brush> {
        self.brushes.iter().find(|b| b.name() == name)
    }
}

fn load_brush(folder: &Path) -> Result<Brush, BrushError> {
    let text = fs::read_to_string(folder.join(CONFIG_FILE))?;
    let descriptor: BrushDescriptor = serde_json::from_str(&text)?;
    let descriptor = descriptor.validated()?;

    let texture = folder.join(TEXTURE_FILE);
    let tip = if texture.is_file() {
        StampTip::from_dynamic(image::open(&texture)?)
    } else {
        StampTip::synthesize(descriptor.hardness, TipShape::Round)
    };
    Ok(Brush::new(descriptor, tip))
}

// ============================================================================
// PRESETS
// ============================================================================

struct Preset {
    base: &'static str,
    category: &'static str,
    size: f32,
    opacity: f32,
    flow: f32,
    spacing: f32,
    hardness: f32,
    blend_mode: BrushBlendMode,
}

const PRESETS: [Preset; 5] = [
    Preset { base: "2B Pencil", category: "Pencil", size: 4.0, opacity: 0.9, flow: 1.0, spacing: 0.15, hardness: 0.8, blend_mode: BrushBlendMode::Normal },
    Preset { base: "G-Pen", category: "Ink", size: 6.0, opacity: 1.0, flow: 1.0, spacing: 0.05, hardness: 1.0, blend_mode: BrushBlendMode::Normal },
    Preset { base: "Thick Oil", category: "Paint", size: 50.0, opacity: 1.0, flow: 0.15, spacing: 0.05, hardness: 0.6, blend_mode: BrushBlendMode::Normal },
    Preset { base: "Airbrush Soft", category: "Airbrush", size: 80.0, opacity: 0.5, flow: 0.4, spacing: 0.1, hardness: 0.0, blend_mode: BrushBlendMode::Normal },
    Preset { base: "Hard Eraser", category: "Other", size: 30.0, opacity: 1.0, flow: 1.0, spacing: 0.1, hardness: 1.0, blend_mode: BrushBlendMode::Eraser },
];

fn default_presets() -> Vec<(BrushDescriptor, TipShape)> {
    let mut out = Vec::with_capacity(PRESETS.len() * 2);
    for p in &PRESETS {
        for shape in [TipShape::Round, TipShape::Square] {
            let descriptor = BrushDescriptor {
                name: format!("{} {}", p.base, shape.label()),
                category: p.category.to_string(),
                size: p.size,
                opacity: p.opacity,
                flow: p.flow,
                spacing: p.spacing,
                hardness: p.hardness,
                blend_mode: p.blend_mode,
            };
            out.push((descriptor, shape));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_presets_in_both_shapes() {
        let lib = BrushLibrary::defaults();
        assert_eq!(lib.len(), 10);
        assert!(lib.find("G-Pen Round").is_some());
        assert!(lib.find("G-Pen Square").is_some());
        let eraser = lib.find("Hard Eraser Square").unwrap();
        assert_eq!(eraser.descriptor.blend_mode, BrushBlendMode::Eraser);
        assert_eq!(eraser.descriptor.folder_name(), "hard_eraser_square");
    }
}
