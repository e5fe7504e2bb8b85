// ============================================================================
// NODE: one entry of the document layer tree
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::surface::RasterSurface;

/// Stable handle into the document arena.  A handle whose slot has been
/// reused carries an older generation and never resolves to the new node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Type tag used by tree walks and the project manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    #[serde(rename = "GroupLayer")]
    Group,
    #[serde(rename = "PaintLayer")]
    Paint,
    #[serde(rename = "TextLayer")]
    Text,
}

impl LayerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Group => "GroupLayer",
            LayerType::Paint => "PaintLayer",
            LayerType::Text => "TextLayer",
        }
    }
}

/// Attributes a text layer's pixels are regenerated from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub text: String,
    /// Pixel height of one line.
    pub font_size: f32,
    /// Straight (non-premultiplied) RGBA.
    pub color: [u8; 4],
    /// Top-left corner of the text box in document space.
    pub position: (f32, f32),
    #[serde(default)]
    pub font_family: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            text: "Text".to_string(),
            font_size: 50.0,
            color: [0, 0, 0, 255],
            position: (100.0, 100.0),
            font_family: None,
        }
    }
}

/// Pixel storage shared by paint and text layers.
#[derive(Debug)]
pub struct PaintData {
    pub(crate) uuid: Uuid,
    pub(crate) surface: RasterSurface,
}

#[derive(Debug)]
pub enum NodeKind {
    Group,
    Paint(PaintData),
    /// A paint layer whose pixels are derived from `style`.
    Text { paint: PaintData, style: TextStyle },
}

#[derive(Debug)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) visible: bool,
    pub(crate) opacity: f32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(name: String, kind: NodeKind) -> Self {
        Self {
            name,
            visible: true,
            opacity: 1.0,
            parent: None,
            children: Vec::new(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn layer_type(&self) -> LayerType {
        match self.kind {
            NodeKind::Group => LayerType::Group,
            NodeKind::Paint(_) => LayerType::Paint,
            NodeKind::Text { .. } => LayerType::Text,
        }
    }

    /// Paint and text layers own a raster surface; groups never do.
    pub fn has_pixels(&self) -> bool {
        !matches!(self.kind, NodeKind::Group)
    }

    pub fn can_have_children(&self) -> bool {
        matches!(self.kind, NodeKind::Group)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text { .. })
    }

    fn paint(&self) -> Option<&PaintData> {
        match &self.kind {
            NodeKind::Group => None,
            NodeKind::Paint(p) | NodeKind::Text { paint: p, .. } => Some(p),
        }
    }

    pub(crate) fn paint_mut(&mut self) -> Option<&mut PaintData> {
        match &mut self.kind {
            NodeKind::Group => None,
            NodeKind::Paint(p) | NodeKind::Text { paint: p, .. } => Some(p),
        }
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.paint().map(|p| p.uuid)
    }

    pub fn surface(&self) -> Option<&RasterSurface> {
        self.paint().map(|p| &p.surface)
    }

    pub(crate) fn surface_mut(&mut self) -> Option<&mut RasterSurface> {
        self.paint_mut().map(|p| &mut p.surface)
    }

    pub fn text_style(&self) -> Option<&TextStyle> {
        match &self.kind {
            NodeKind::Text { style, .. } => Some(style),
            _ => None,
        }
    }
}
