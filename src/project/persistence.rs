// ============================================================================
// PROJECT FILES (.strata): manifest + one PNG per pixel layer
// ============================================================================
//
// Container: a bincode-encoded `ProjectArchive`
//   magic     "STR1"
//   width, height
//   manifest  project.json text: {width, height, root: <node record>}
//   entries   (name, bytes) pairs, one `<uuid>.png` per paint/text layer
//
// PNGs hold straight alpha; surfaces are premultiplied, so pixels are
// converted on the way in and out.  A load builds a complete fresh Document
// before returning it, so a failed load never reaches the caller's document.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

use bincode::Options;
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{Document, LayerType, NodeId, TextStyle};
use crate::error::PersistenceError;
use crate::surface::{premultiply, unpremultiply, MAX_SURFACE_DIM};

pub const PROJECT_MAGIC: &str = "STR1";
pub const PROJECT_EXTENSION: &str = "strata";
pub const MANIFEST_NAME: &str = "project.json";
/// Maximum number of node records in one project, root included.
pub const MAX_PROJECT_NODES: usize = 1024;

#[derive(Serialize, Deserialize)]
pub struct ProjectArchive {
    magic: String,
    width: u32,
    height: u32,
    manifest: String,
    entries: Vec<(String, Vec<u8>)>,
}

impl ProjectArchive {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn manifest(&self) -> &str {
        &self.manifest
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

#[derive(Serialize, Deserialize)]
struct Manifest {
    width: u32,
    height: u32,
    root: NodeRecord,
}

/// One node of the manifest tree.  Text attributes are only present on
/// `TextLayer` records.
#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    #[serde(rename = "type")]
    layer_type: LayerType,
    name: String,
    visible: bool,
    opacity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_color: Option<[u8; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pos_x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pos_y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    font_family: Option<String>,
    #[serde(default)]
    children: Vec<NodeRecord>,
}

impl NodeRecord {
    fn count(&self) -> usize {
        1 + self.children.iter().map(NodeRecord::count).sum::<usize>()
    }

    fn text_style(&self) -> TextStyle {
        let d = TextStyle::default();
        TextStyle {
            text: self.text_content.clone().unwrap_or(d.text),
            font_size: self.font_size.unwrap_or(d.font_size),
            color: self.text_color.unwrap_or(d.color),
            position: (self.pos_x.unwrap_or(0.0), self.pos_y.unwrap_or(0.0)),
            font_family: self.font_family.clone(),
        }
    }
}

// ============================================================================
// SAVE
// ============================================================================

pub fn save(doc: &Document, path: &Path) -> Result<(), PersistenceError> {
    let archive = build_archive(doc)?;
    write_archive(&archive, path)?;
    log::info!(
        "saved project {} ({} layers, {}x{})",
        path.display(),
        archive.entries.len(),
        archive.width,
        archive.height
    );
    Ok(())
}

/// Snapshot the document into an archive.  Reads pixels only.
pub fn build_archive(doc: &Document) -> Result<ProjectArchive, PersistenceError> {
    let mut entries = Vec::new();
    let root = record_for(doc, doc.root(), &mut entries)?;
    let manifest = Manifest { width: doc.width(), height: doc.height(), root };
    Ok(ProjectArchive {
        magic: PROJECT_MAGIC.to_string(),
        width: doc.width(),
        height: doc.height(),
        manifest: serde_json::to_string_pretty(&manifest)?,
        entries,
    })
}

/// Serialize + write a pre-built archive to disk.
pub fn write_archive(archive: &ProjectArchive, path: &Path) -> Result<(), PersistenceError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, archive)?;
    Ok(())
}

pub fn to_bytes(doc: &Document) -> Result<Vec<u8>, PersistenceError> {
    Ok(bincode::serialize(&build_archive(doc)?)?)
}

fn record_for(
    doc: &Document,
    id: NodeId,
    entries: &mut Vec<(String, Vec<u8>)>,
) -> Result<NodeRecord, PersistenceError> {
    let node = doc
        .get(id)
        .ok_or_else(|| PersistenceError::InvalidFormat(format!("dangling node handle {}", id)))?;
    let mut record = NodeRecord {
        layer_type: node.layer_type(),
        name: node.name().to_string(),
        visible: node.visible(),
        opacity: node.opacity(),
        uuid: node.uuid(),
        text_content: None,
        font_size: None,
        text_color: None,
        pos_x: None,
        pos_y: None,
        font_family: None,
        children: Vec::new(),
    };
    if let Some(style) = node.text_style() {
        record.text_content = Some(style.text.clone());
        record.font_size = Some(style.font_size);
        record.text_color = Some(style.color);
        record.pos_x = Some(style.position.0);
        record.pos_y = Some(style.position.1);
        record.font_family = style.font_family.clone();
    }
    if let (Some(uuid), Some(surface)) = (node.uuid(), node.surface()) {
        let straight = unpremultiply(surface.pixels()?);
        entries.push((png_name(uuid), encode_png(&straight)?));
    }
    for &child in node.children() {
        record.children.push(record_for(doc, child, entries)?);
    }
    Ok(record)
}

fn png_name(uuid: Uuid) -> String {
    format!("{}.png", uuid)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PersistenceError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

// ============================================================================
// LOAD
// ============================================================================

pub fn load(path: &Path) -> Result<Document, PersistenceError> {
    let raw = std::fs::read(path)?;
    let doc = from_bytes(&raw)?;
    log::info!(
        "loaded project {} ({} nodes, {}x{})",
        path.display(),
        doc.node_count(),
        doc.width(),
        doc.height()
    );
    Ok(doc)
}

pub fn from_bytes(raw: &[u8]) -> Result<Document, PersistenceError> {
    if raw.len() < 12 {
        return Err(PersistenceError::InvalidFormat("File too small".into()));
    }
    // bincode writes a String as an 8-byte length then the UTF-8 bytes, so
    // the 4-character magic sits at 8..12.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != PROJECT_MAGIC {
        return Err(PersistenceError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }

    let archive: ProjectArchive = bincode::options()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(raw.len() as u64)
        .deserialize(raw)?;
    build_document(archive)
}

fn build_document(archive: ProjectArchive) -> Result<Document, PersistenceError> {
    let (width, height) = (archive.width, archive.height);
    if width == 0 || height == 0 {
        return Err(PersistenceError::InvalidFormat("Canvas dimensions cannot be zero".into()));
    }
    if width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
        return Err(PersistenceError::InvalidFormat(format!(
            "Canvas size {}x{} exceeds maximum allowed {}x{}",
            width, height, MAX_SURFACE_DIM, MAX_SURFACE_DIM
        )));
    }

    let manifest: Manifest = serde_json::from_str(&archive.manifest)?;
    if manifest.width != width || manifest.height != height {
        return Err(PersistenceError::InvalidFormat(format!(
            "Manifest size {}x{} does not match archive size {}x{}",
            manifest.width, manifest.height, width, height
        )));
    }
    if manifest.root.layer_type != LayerType::Group {
        return Err(PersistenceError::InvalidFormat(format!(
            "Root record is a {}, expected GroupLayer",
            manifest.root.layer_type.as_str()
        )));
    }
    let count = manifest.root.count();
    if count > MAX_PROJECT_NODES {
        return Err(PersistenceError::InvalidFormat(format!(
            "Project contains {} nodes, which exceeds the maximum of {}",
            count, MAX_PROJECT_NODES
        )));
    }

    let entries: HashMap<&str, &[u8]> = archive
        .entries
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
        .collect();

    let mut loader = Loader { doc: Document::new(width, height), entries, seen: HashSet::new() };
    let root = loader.doc.root();
    for child in &manifest.root.children {
        loader.build(child, root)?;
    }
    Ok(loader.doc)
}

struct Loader<'a> {
    doc: Document,
    entries: HashMap<&'a str, &'a [u8]>,
    seen: HashSet<Uuid>,
}

impl Loader<'_> {
    fn build(&mut self, record: &NodeRecord, parent: NodeId) -> Result<(), PersistenceError> {
        let id = match record.layer_type {
            LayerType::Group => self.doc.create_group(record.name.as_str()),
            LayerType::Paint | LayerType::Text => {
                if !record.children.is_empty() {
                    return Err(PersistenceError::InvalidFormat(format!(
                        "{} '{}' cannot have children",
                        record.layer_type.as_str(),
                        record.name
                    )));
                }
                let uuid = record.uuid.ok_or_else(|| {
                    PersistenceError::InvalidFormat(format!("Layer '{}' has no uuid", record.name))
                })?;
                if !self.seen.insert(uuid) {
                    return Err(PersistenceError::InvalidFormat(format!(
                        "Duplicate layer uuid {}",
                        uuid
                    )));
                }
                let pixels = self.layer_pixels(uuid)?;
                if record.layer_type == LayerType::Text {
                    self.doc
                        .create_text_layer_with(record.name.as_str(), record.text_style(), pixels, uuid)?
                } else {
                    self.doc.create_paint_layer_with_uuid(record.name.as_str(), pixels, uuid)?
                }
            }
        };
        self.doc.set_visible(id, record.visible);
        self.doc.set_opacity(id, record.opacity);
        self.doc.try_add_child(parent, id).map_err(|e| {
            PersistenceError::InvalidFormat(format!("cannot attach '{}': {}", record.name, e))
        })?;
        if record.layer_type == LayerType::Group {
            for child in &record.children {
                self.build(child, id)?;
            }
        }
        Ok(())
    }

    fn layer_pixels(&self, uuid: Uuid) -> Result<RgbaImage, PersistenceError> {
        let name = png_name(uuid);
        let bytes = self
            .entries
            .get(name.as_str())
            .ok_or_else(|| PersistenceError::MissingEntry(name.clone()))?;
        let straight = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
        let expected = self.doc.size();
        if straight.dimensions() != expected {
            return Err(PersistenceError::InvalidFormat(format!(
                "Entry '{}' is {}x{}, expected {}x{}",
                name,
                straight.width(),
                straight.height(),
                expected.0,
                expected.1
            )));
        }
        Ok(premultiply(&straight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_uses_layer_type_tags() {
        let mut doc = Document::new(4, 4);
        let root = doc.root();
        let g = doc.create_group("g");
        let a = doc.create_paint_layer("a").unwrap();
        doc.add_child(root, g);
        doc.add_child(g, a);

        let archive = build_archive(&doc).unwrap();
        assert!(archive.manifest().contains("\"type\": \"GroupLayer\""));
        assert!(archive.manifest().contains("\"type\": \"PaintLayer\""));
        assert_eq!(archive.entry_names().count(), 1);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut raw = to_bytes(&Document::new(2, 2)).unwrap();
        raw[8..12].copy_from_slice(b"XXXX");
        assert!(matches!(from_bytes(&raw), Err(PersistenceError::InvalidFormat(_))));
    }

    #[test]
    fn missing_png_is_reported() {
        let mut doc = Document::new(2, 2);
        let root = doc.root();
        let a = doc.create_paint_layer("a").unwrap();
        doc.add_child(root, a);
        let mut archive = build_archive(&doc).unwrap();
        archive.entries.clear();
        let raw = bincode::serialize(&archive).unwrap();
        assert!(matches!(from_bytes(&raw), Err(PersistenceError::MissingEntry(_))));
    }
}
