// ============================================================================
// EDITOR CONFIG: injected settings, persisted as a key=value file
// ============================================================================

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_UNDO_LIMIT;

const SETTINGS_FILE: &str = "strata_settings.cfg";

/// Settings every core component reads from.  Constructed directly (tests,
/// embedders) or loaded from the user's settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo steps.
    pub undo_limit: usize,
    /// Size of a new document.
    pub document_width: u32,
    pub document_height: u32,
    /// Straight RGBA fill of a new document's Background layer.
    pub background_color: [u8; 4],
    /// Transform handle side length in screen pixels.
    pub handle_size: f32,
    /// Root of the brush presets (`<brush_dir>/<name>/config.json`).
    pub brush_dir: PathBuf,
    pub gpu_acceleration: bool,
    /// Adapter name to prefer, or "Auto".
    pub preferred_gpu: String,
    /// System font family for new text layers; empty = first sans-serif.
    pub default_font: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_limit: DEFAULT_UNDO_LIMIT,
            document_width: 800,
            document_height: 600,
            background_color: [255, 255, 255, 255],
            handle_size: 14.0,
            brush_dir: PathBuf::from("brushes"),
            gpu_acceleration: true,
            preferred_gpu: "Auto".to_string(),
            default_font: String::new(),
        }
    }
}

impl EditorConfig {
    /// Path to the settings file.
    /// On Linux:   ~/.config/strata/strata_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Strata\strata_settings.cfg
    /// On macOS:   ~/Library/Application Support/Strata/strata_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("Strata").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Strata")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let base = match std::env::var("XDG_CONFIG_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
            };
            Some(base.join("strata").join(SETTINGS_FILE))
        }
    }

    /// Settings from the user's settings file, or defaults when it is
    /// missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("settings: {} not read ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Parse `key=value` lines.  Unknown keys are ignored and a malformed
    /// value leaves that field at its default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "undo_limit" => {
                    s.undo_limit = val.parse().unwrap_or(DEFAULT_UNDO_LIMIT);
                }
                "document_width" => {
                    if let Some(w) = parse_dimension(val) { s.document_width = w; }
                }
                "document_height" => {
                    if let Some(h) = parse_dimension(val) { s.document_height = h; }
                }
                "background_color" => {
                    if let Some(c) = str_to_color(val) { s.background_color = c; }
                }
                "handle_size" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.handle_size = v;
                    }
                }
                "brush_dir" => {
                    if !val.is_empty() { s.brush_dir = PathBuf::from(val); }
                }
                "gpu_acceleration" => {
                    s.gpu_acceleration = val == "true";
                }
                "preferred_gpu" => {
                    s.preferred_gpu = val.to_string();
                }
                "default_font" => {
                    s.default_font = val.to_string();
                }
                other => log::debug!("settings: unknown key '{}' ignored", other),
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "undo_limit={}\n\
             document_width={}\n\
             document_height={}\n\
             background_color={}\n\
             handle_size={}\n\
             brush_dir={}\n\
             gpu_acceleration={}\n\
             preferred_gpu={}\n\
             default_font={}\n",
            self.undo_limit,
            self.document_width,
            self.document_height,
            color_to_str(self.background_color),
            self.handle_size,
            self.brush_dir.display(),
            self.gpu_acceleration,
            self.preferred_gpu,
            self.default_font,
        )
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Write to the user's settings file.
    pub fn save(&self) -> std::io::Result<()> {
        match Self::settings_path() {
            Some(path) => self.save_to(&path),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no settings directory on this platform",
            )),
        }
    }
}

fn parse_dimension(val: &str) -> Option<u32> {
    val.parse::<u32>()
        .ok()
        .filter(|&v| (1..=crate::surface::MAX_SURFACE_DIM).contains(&v))
}

/// "r,g,b,a"
fn color_to_str(c: [u8; 4]) -> String {
    format!("{},{},{},{}", c[0], c[1], c[2], c[3])
}

fn str_to_color(s: &str) -> Option<[u8; 4]> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut out = [0u8; 4];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = part.trim().parse().ok()?;
    }
    Some(out)
}
