// ============================================================================
// EDITOR: the single owner that routes input into the core
// ============================================================================
//
// The editor holds the document and everything that edits it.  Front ends
// (a GUI, the CLI, tests) feed it tool changes, pointer events in document
// coordinates and key chords; it routes them to the stroke engine, the
// selection engine, the clipboard and the undo stack.

use std::path::Path;

use image::RgbaImage;

use crate::brush::{Brush, BrushLibrary, SmudgeSession, StrokeSession, DEFAULT_SMUDGE_STRENGTH};
use crate::compositor::{self, draw_layer};
use crate::config::EditorConfig;
use crate::document::{Document, LayerType, NodeId, TextRenderer, TextStyle};
use crate::error::{GpuError, PersistenceError, SurfaceError};
use crate::gpu::GpuRenderer;
use crate::history::{PixelCommand, UndoStack};
use crate::ops::{self, Adjustment, Anchor};
use crate::project::{self, ImageInbox};
use crate::surface::unpremultiply_pixel;
use crate::selection::{bucket_fill, delete_selection, Clipboard, CreateShape, SelectionEngine};

const DEFAULT_BRUSH: &str = "G-Pen Round";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Brush,
    RectSelect,
    Lasso,
    Bucket,
    /// Sample the composite into the foreground colour.
    Picker,
    Smudge,
    /// Place text layers; a secondary click resizes the active one.
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    Delete,
    Z,
    Y,
    C,
    X,
    V,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { ctrl: false, shift: false };
    pub const CTRL: Self = Self { ctrl: true, shift: false };
    pub const CTRL_SHIFT: Self = Self { ctrl: true, shift: true };
}

#[derive(Debug)]
pub struct Editor {
    config: EditorConfig,
    document: Document,
    undo: UndoStack,
    selection: SelectionEngine,
    brushes: BrushLibrary,
    brush: Option<Brush>,
    /// Straight RGBA.
    color: [u8; 4],
    clipboard: Clipboard,
    active: NodeId,
    inbox: ImageInbox,
    tool: Tool,
    stroke: Option<StrokeSession>,
    smudge: Option<SmudgeSession>,
    smudge_strength: f32,
    /// Content and size the text tool places; stands in for the prompt a
    /// front end shows.
    text_content: String,
    text_font_size: f32,
    /// Colour under the pointer while the picker hovers.
    picker_preview: Option<[u8; 4]>,
    zoom: f32,
    last_pointer: Option<(f32, f32)>,
    text_renderer: Option<TextRenderer>,
}

impl Editor {
    /// A new document per `config`, with brushes from `config.brush_dir`.
    pub fn new(config: EditorConfig) -> Result<Self, SurfaceError> {
        let (document, background) = ops::new_document(
            config.document_width,
            config.document_height,
            config.background_color,
        )?;
        let brushes = BrushLibrary::load_or_defaults(&config.brush_dir);
        Ok(Self::assemble(config, document, background, brushes))
    }

    /// Wrap an existing document (a loaded project, an import).  The top-most
    /// layer becomes active.
    pub fn with_document(config: EditorConfig, document: Document, brushes: BrushLibrary) -> Self {
        let active = document.layers().last().copied().unwrap_or(document.root());
        Self::assemble(config, document, active, brushes)
    }

    fn assemble(config: EditorConfig, document: Document, active: NodeId, brushes: BrushLibrary) -> Self {
        let brush = brushes.find(DEFAULT_BRUSH).or_else(|| brushes.get(0)).cloned();
        Self {
            undo: UndoStack::new(config.undo_limit),
            selection: SelectionEngine::new(config.handle_size),
            document,
            brushes,
            brush,
            color: [0, 0, 0, 255],
            clipboard: Clipboard::new(),
            active,
            inbox: ImageInbox::new(),
            tool: Tool::default(),
            stroke: None,
            smudge: None,
            smudge_strength: DEFAULT_SMUDGE_STRENGTH,
            text_content: TextStyle::default().text,
            text_font_size: TextStyle::default().font_size,
            picker_preview: None,
            zoom: 1.0,
            last_pointer: None,
            text_renderer: None,
            config,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionEngine {
        &mut self.selection
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn brushes(&self) -> &BrushLibrary {
        &self.brushes
    }

    pub fn brush(&self) -> Option<&Brush> {
        self.brush.as_ref()
    }

    /// Select a brush from the library by name.
    pub fn select_brush(&mut self, name: &str) -> bool {
        match self.brushes.find(name) {
            Some(b) => {
                self.brush = Some(b.clone());
                true
            }
            None => {
                log::debug!("no brush named '{}'", name);
                false
            }
        }
    }

    /// Use `brush` directly, or no brush at all.
    pub fn set_brush(&mut self, brush: Option<Brush>) {
        self.brush = brush;
    }

    pub fn color(&self) -> [u8; 4] {
        self.color
    }

    pub fn set_color(&mut self, color: [u8; 4]) {
        self.color = color;
    }

    pub fn active(&self) -> NodeId {
        self.active
    }

    pub fn set_active(&mut self, id: NodeId) -> bool {
        if !self.document.contains(id) {
            log::debug!("set_active: {} is stale", id);
            return false;
        }
        self.active = id;
        true
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = zoom;
        }
    }

    pub fn inbox(&self) -> &ImageInbox {
        &self.inbox
    }

    pub fn smudge_strength(&self) -> f32 {
        self.smudge_strength
    }

    pub fn set_smudge_strength(&mut self, strength: f32) {
        if strength.is_finite() {
            self.smudge_strength = strength.clamp(0.0, 1.0);
        }
    }

    /// What the text tool places next.  An empty string disables placing.
    pub fn set_text_content(&mut self, text: impl Into<String>) {
        self.text_content = text.into();
    }

    /// Size used for new text and for a secondary click on a text layer.
    pub fn set_text_font_size(&mut self, size: f32) {
        if size.is_finite() && size > 0.0 {
            self.text_font_size = size;
        }
    }

    pub fn picker_preview(&self) -> Option<[u8; 4]> {
        self.picker_preview
    }

    /// Use `renderer` for text layers instead of looking up the configured
    /// system font.
    pub fn set_text_renderer(&mut self, renderer: TextRenderer) {
        self.text_renderer = Some(renderer);
    }

    // ========================================================================
    // TOOLS & POINTER
    // ========================================================================

    /// Switch tools.  Anything floating is committed first.
    pub fn set_tool(&mut self, tool: Tool) {
        self.finish_stroke();
        self.selection.commit(&mut self.document, &mut self.undo);
        match tool {
            Tool::RectSelect => self.selection.set_shape(CreateShape::Rectangle),
            Tool::Lasso => self.selection.set_shape(CreateShape::Lasso),
            Tool::Brush | Tool::Bucket | Tool::Picker | Tool::Smudge | Tool::Text => {}
        }
        self.picker_preview = None;
        self.tool = tool;
    }

    pub fn pointer_down(&mut self, pos: (f32, f32)) {
        self.last_pointer = Some(pos);
        match self.tool {
            Tool::Brush => {
                self.finish_stroke();
                let Some(brush) = self.brush.as_ref() else {
                    log::debug!("stroke refused: no brush selected");
                    return;
                };
                let mask = self.selection.mask(self.document.width(), self.document.height());
                self.stroke = StrokeSession::begin(
                    &mut self.document,
                    self.active,
                    brush,
                    self.color,
                    pos,
                    mask.as_ref(),
                );
            }
            Tool::Bucket => {
                let mask = self.selection.mask(self.document.width(), self.document.height());
                let rgb = [self.color[0], self.color[1], self.color[2]];
                bucket_fill(&mut self.document, &mut self.undo, self.active, mask.as_ref(), rgb);
            }
            Tool::RectSelect | Tool::Lasso => {
                self.selection.pointer_down(
                    &mut self.document,
                    &mut self.undo,
                    self.active,
                    pos,
                    self.zoom,
                );
            }
            Tool::Picker => {
                if let Some(color) = self.pick_color(pos) {
                    self.color = color;
                }
            }
            Tool::Smudge => {
                self.finish_stroke();
                let Some(brush) = self.brush.as_ref() else {
                    log::debug!("smudge refused: no brush selected");
                    return;
                };
                self.smudge = SmudgeSession::begin(
                    &self.document,
                    self.active,
                    brush.descriptor.size,
                    self.smudge_strength,
                    pos,
                );
            }
            Tool::Text => {
                self.place_text(pos);
            }
        }
    }

    pub fn pointer_move(&mut self, pos: (f32, f32)) {
        self.last_pointer = Some(pos);
        match self.tool {
            Tool::Brush => {
                let (Some(stroke), Some(brush)) = (self.stroke.as_mut(), self.brush.as_ref()) else {
                    return;
                };
                let mask = self.selection.mask(self.document.width(), self.document.height());
                stroke.extend(&mut self.document, brush, self.color, pos, mask.as_ref());
            }
            Tool::RectSelect | Tool::Lasso => self.selection.pointer_move(pos),
            Tool::Picker => self.picker_preview = self.pick_color(pos),
            Tool::Smudge => {
                let Some(smudge) = self.smudge.as_mut() else { return };
                let mask = self.selection.mask(self.document.width(), self.document.height());
                smudge.extend(&mut self.document, pos, mask.as_ref());
            }
            Tool::Bucket | Tool::Text => {}
        }
    }

    pub fn pointer_up(&mut self, pos: (f32, f32)) {
        self.last_pointer = Some(pos);
        match self.tool {
            Tool::Brush | Tool::Smudge => self.finish_stroke(),
            Tool::RectSelect | Tool::Lasso => self.selection.pointer_up(pos),
            Tool::Bucket | Tool::Picker | Tool::Text => {}
        }
    }

    /// Secondary (right) button.  With the text tool over a text layer this
    /// applies the current text size.  Returns whether anything happened.
    pub fn secondary_click(&mut self, pos: (f32, f32)) -> bool {
        self.last_pointer = Some(pos);
        match self.tool {
            Tool::Text => self.set_active_font_size(self.text_font_size),
            _ => false,
        }
    }

    /// End a brush stroke or smudge drag, pushing its Command.
    fn finish_stroke(&mut self) {
        if let Some(stroke) = self.stroke.take()
            && let Some(command) = stroke.finish(&self.document)
        {
            self.undo.push(command);
        }
        if let Some(smudge) = self.smudge.take()
            && let Some(command) = smudge.finish(&self.document)
        {
            self.undo.push(command);
        }
    }

    /// Straight colour of the composite (floating pixels included) at `pos`,
    /// made opaque.  `None` off the canvas or over full transparency.
    pub fn pick_color(&self, pos: (f32, f32)) -> Option<[u8; 4]> {
        let (w, h) = self.document.size();
        if pos.0 < 0.0 || pos.1 < 0.0 {
            return None;
        }
        let (x, y) = (pos.0.floor() as u32, pos.1.floor() as u32);
        if x >= w || y >= h {
            return None;
        }
        let px = *self.composite().get_pixel(x, y);
        if px.0[3] == 0 {
            return None;
        }
        let [r, g, b, _] = unpremultiply_pixel(px.0);
        Some([r, g, b, 255])
    }

    /// The window lost focus: end strokes and commit floating content.
    pub fn focus_lost(&mut self) {
        self.finish_stroke();
        self.selection.commit(&mut self.document, &mut self.undo);
    }

    // ========================================================================
    // KEYS
    // ========================================================================

    /// Handle a key chord.  Returns whether it was bound to anything.
    pub fn key(&mut self, key: Key, mods: Modifiers) -> bool {
        match (key, mods.ctrl, mods.shift) {
            (Key::Escape, _, _) => {
                self.finish_stroke();
                self.selection.escape(&mut self.document, &mut self.undo);
                true
            }
            (Key::Delete, false, _) => {
                self.delete();
                true
            }
            (Key::Z, true, false) => {
                self.undo();
                true
            }
            (Key::Z, true, true) | (Key::Y, true, _) => {
                self.redo();
                true
            }
            (Key::C, true, _) => {
                self.copy();
                true
            }
            (Key::X, true, _) => {
                self.cut();
                true
            }
            (Key::V, true, _) => {
                let (w, h) = self.document.size();
                let at = self.last_pointer.unwrap_or((w as f32 / 2.0, h as f32 / 2.0));
                self.paste_centered(at);
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Undo the last Command, or cancel the lift while pixels are floating.
    pub fn undo(&mut self) -> bool {
        self.finish_stroke();
        if self.selection.is_floating() {
            return self.selection.cancel(&mut self.document);
        }
        self.undo.undo(&mut self.document)
    }

    pub fn redo(&mut self) -> bool {
        self.finish_stroke();
        if self.selection.is_floating() {
            log::debug!("redo ignored while a selection is floating");
            return false;
        }
        self.undo.redo(&mut self.document)
    }

    // ========================================================================
    // CLIPBOARD & MASKED EDITS
    // ========================================================================

    fn settle(&mut self) {
        self.finish_stroke();
        self.selection.commit(&mut self.document, &mut self.undo);
    }

    pub fn copy(&mut self) -> bool {
        self.settle();
        let mask = self.selection.mask(self.document.width(), self.document.height());
        self.clipboard.copy(&self.document, self.active, mask.as_ref())
    }

    pub fn cut(&mut self) -> bool {
        self.settle();
        self.clipboard
            .cut(&mut self.document, &mut self.undo, &mut self.selection, self.active)
    }

    pub fn paste_at(&mut self, x: i64, y: i64) -> Option<NodeId> {
        self.settle();
        let layer = self.clipboard.paste_at(&mut self.document, &mut self.undo, self.active, x, y)?;
        self.active = layer;
        Some(layer)
    }

    pub fn paste_centered(&mut self, point: (f32, f32)) -> Option<NodeId> {
        self.settle();
        let layer =
            self.clipboard
                .paste_centered(&mut self.document, &mut self.undo, self.active, point)?;
        self.active = layer;
        Some(layer)
    }

    /// Clear the selected pixels of the active layer.
    pub fn delete(&mut self) -> bool {
        self.settle();
        let Some(mask) = self.selection.mask(self.document.width(), self.document.height()) else {
            log::debug!("delete: nothing selected");
            return false;
        };
        delete_selection(&mut self.document, &mut self.undo, self.active, &mask)
    }

    /// Rotate the selected pixels by `degrees` and commit.
    pub fn rotate_selection(&mut self, degrees: f32) -> bool {
        self.finish_stroke();
        self.selection
            .rotate_by(&mut self.document, &mut self.undo, self.active, degrees)
    }

    // ========================================================================
    // LAYERS & CANVAS
    // ========================================================================

    /// Where a new layer goes: above the active node inside its parent, or
    /// inside the active group.
    fn insertion_point(&self) -> (NodeId, usize) {
        let doc = &self.document;
        if doc.get(self.active).is_some_and(|n| n.layer_type() == LayerType::Group) {
            return (self.active, usize::MAX);
        }
        match doc.parent(self.active) {
            Some(parent) => {
                let index = doc.children(parent).iter().position(|&c| c == self.active);
                (parent, index.map_or(usize::MAX, |i| i + 1))
            }
            None => (doc.root(), usize::MAX),
        }
    }

    fn insert_new(&mut self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.insertion_point();
        if !self.document.insert_child(parent, index, id) {
            self.document.delete_node(id);
            return None;
        }
        self.active = id;
        Some(id)
    }

    pub fn add_paint_layer(&mut self, name: &str) -> Option<NodeId> {
        self.settle();
        let id = match self.document.create_paint_layer(name) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("add layer: {}", e);
                return None;
            }
        };
        self.insert_new(id)
    }

    pub fn add_group(&mut self, name: &str) -> Option<NodeId> {
        self.settle();
        let id = self.document.create_group(name);
        self.insert_new(id)
    }

    /// A text layer in the configured default font.
    pub fn add_text_layer(&mut self, name: &str, style: TextStyle) -> Option<NodeId> {
        self.settle();
        let renderer = self.text_renderer().clone();
        let id = match self.document.create_text_layer(name, style, &renderer) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("add text layer: {}", e);
                return None;
            }
        };
        self.insert_new(id)
    }

    fn text_renderer(&mut self) -> &TextRenderer {
        let family = &self.config.default_font;
        self.text_renderer.get_or_insert_with(|| TextRenderer::system(family))
    }

    /// Text tool press: a new text layer at `pos` on top of the active
    /// node's parent, in the foreground colour.  Undo empties it.
    pub fn place_text(&mut self, pos: (f32, f32)) -> Option<NodeId> {
        self.settle();
        if self.text_content.is_empty() {
            log::debug!("text tool: nothing to place");
            return None;
        }
        let style = TextStyle {
            text: self.text_content.clone(),
            font_size: self.text_font_size,
            color: self.color,
            position: (pos.0.floor(), pos.1.floor()),
            font_family: None,
        };
        let parent = self.document.parent(self.active).unwrap_or(self.document.root());
        let renderer = self.text_renderer().clone();
        let id = match self.document.create_text_layer("Text", style.clone(), &renderer) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("text tool: {}", e);
                return None;
            }
        };
        if !self.document.add_child(parent, id) {
            self.document.delete_node(id);
            return None;
        }
        let (w, h) = self.document.size();
        let rendered = self.document.read_pixels(id).unwrap_or_else(|_| RgbaImage::new(w, h));
        let empty = TextStyle { text: String::new(), ..style.clone() };
        self.undo.push(
            PixelCommand::new(id, RgbaImage::new(w, h), rendered, "Add Text").with_text_styles(empty, style),
        );
        self.active = id;
        Some(id)
    }

    /// Re-render the active text layer at `size`, one Command.  `false`
    /// when the active node is not a text layer or the size is unchanged.
    pub fn set_active_font_size(&mut self, size: f32) -> bool {
        self.settle();
        let id = self.active;
        let Some(before_style) = self.document.get(id).and_then(|n| n.text_style()).cloned() else {
            log::debug!("font size: {} is not a text layer", id);
            return false;
        };
        if !(size.is_finite() && size > 0.0) || before_style.font_size == size {
            return false;
        }
        let Ok(before) = self.document.read_pixels(id) else { return false };
        let after_style = TextStyle { font_size: size, ..before_style.clone() };
        let renderer = self.text_renderer().clone();
        if let Err(e) = self.document.set_text_style(id, after_style.clone(), &renderer) {
            log::warn!("font size: {}", e);
            return false;
        }
        let Ok(after) = self.document.read_pixels(id) else { return false };
        self.undo.push(
            PixelCommand::new(id, before, after, "Font Size").with_text_styles(before_style, after_style),
        );
        true
    }

    /// Delete the active node and its subtree.  The parent becomes active.
    pub fn delete_active(&mut self) -> bool {
        self.settle();
        let parent = self.document.parent(self.active).unwrap_or(self.document.root());
        if !self.document.delete_node(self.active) {
            return false;
        }
        self.active = parent;
        true
    }

    pub fn resize_canvas(&mut self, width: u32, height: u32, anchor: Anchor) -> Result<(), SurfaceError> {
        self.settle();
        self.selection.clear(&mut self.document, &mut self.undo);
        ops::resize_canvas(&mut self.document, &mut self.undo, width, height, anchor)
    }

    pub fn adjust(&mut self, adjustment: Adjustment) -> bool {
        self.settle();
        ops::apply_adjustment(&mut self.document, &mut self.undo, self.active, adjustment)
    }

    /// Append every finished background image as a centred layer.  The last
    /// one becomes active.
    pub fn poll_inbox(&mut self) -> Vec<NodeId> {
        let added = self.inbox.poll(&mut self.document);
        if let Some(&last) = added.last() {
            self.active = last;
        }
        added
    }

    // ========================================================================
    // FILES
    // ========================================================================

    pub fn save(&mut self, path: &Path) -> Result<(), PersistenceError> {
        self.settle();
        project::save(&self.document, path)
    }

    /// Replace the document with a project from disk.  On failure nothing
    /// changes.
    pub fn open(&mut self, path: &Path) -> Result<(), PersistenceError> {
        let document = project::load(path)?;
        self.stroke = None;
        self.smudge = None;
        self.selection = SelectionEngine::new(self.config.handle_size);
        self.undo.clear();
        self.active = document.layers().last().copied().unwrap_or(document.root());
        self.document = document;
        Ok(())
    }

    // ========================================================================
    // COMPOSITING
    // ========================================================================

    /// Flatten the document on the CPU with floating pixels drawn on top.
    pub fn composite(&self) -> RgbaImage {
        let mut out = compositor::composite(&self.document);
        self.draw_floating(&mut out);
        out
    }

    /// Same as `composite`, with the tree flattened on the GPU.
    pub fn composite_gpu(&mut self, renderer: &mut GpuRenderer) -> Result<RgbaImage, GpuError> {
        let mut out = renderer.composite(&mut self.document)?;
        self.draw_floating(&mut out);
        Ok(out)
    }

    fn draw_floating(&self, out: &mut RgbaImage) {
        if !self.selection.is_floating() {
            return;
        }
        let (w, h) = self.document.size();
        for (node, pixels) in self.selection.render_floating(w, h) {
            let opacity = self.document.effective_opacity(node);
            if opacity > 0.0 {
                draw_layer(&pixels, opacity, out);
            }
        }
    }
}
