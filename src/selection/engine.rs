// ============================================================================
// SELECTION ENGINE: create / lift / transform / commit state machine
// ============================================================================
//
//   IDLE ──down outside handles──▶ CREATING ──up──▶ IDLE
//   IDLE ──down on a handle──────▶ TRANSFORMING ──up──▶ IDLE (still floating)
//
// The first transform drag lifts the selected pixels of every paint or text
// layer under the active node into floating buffers.  Later drags keep working on
// the same buffers until `commit` (bake + one Command per layer) or `cancel`
// (restore snapshots, no Command).

use image::{GrayImage, RgbaImage};

use super::path::{apply_mask, Rect, SelectionPath};
use super::transform::{render_through, Affine2, TransformState};
use crate::compositor::draw_layer;
use crate::document::{Document, NodeId};
use crate::history::{PixelCommand, UndoStack};

/// Distance (screen pixels) of the rotate handle above the selection box.
const ROTATE_HANDLE_OFFSET: f32 = 30.0;
const MIN_SCALE: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Creating,
    Transforming,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CreateShape {
    #[default]
    Rectangle,
    Lasso,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Rotate,
    Move,
}

impl Handle {
    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            Handle::TopLeft | Handle::TopRight | Handle::BottomLeft | Handle::BottomRight
        )
    }
}

/// Pixels lifted out of one layer, in base (crop-local) coordinates.
#[derive(Clone, Debug)]
pub struct FloatingItem {
    pub node: NodeId,
    pub pixels: RgbaImage,
    snapshot: RgbaImage,
}

/// Values captured at the start of one transform drag.
#[derive(Clone, Copy, Debug)]
struct Drag {
    handle: Handle,
    start: (f32, f32),
    cached_pos: (f32, f32),
    cached_rotation: f32,
    cached_scale: f32,
    center: (f32, f32),
}

#[derive(Debug)]
pub struct SelectionEngine {
    state: SelectionState,
    shape: CreateShape,
    handle_size: f32,
    /// Current outline in document space.
    path: SelectionPath,
    /// Outline relative to the lift crop, mapped through the transform.
    base_path: SelectionPath,
    /// Outline before the lift, restored on cancel.
    pre_lift_path: SelectionPath,
    create_start: (f32, f32),
    items: Vec<FloatingItem>,
    lifted: bool,
    transform: TransformState,
    drag: Option<Drag>,
}

impl SelectionEngine {
    pub fn new(handle_size: f32) -> Self {
        Self {
            state: SelectionState::Idle,
            shape: CreateShape::Rectangle,
            handle_size,
            path: SelectionPath::new(),
            base_path: SelectionPath::new(),
            pre_lift_path: SelectionPath::new(),
            create_start: (0.0, 0.0),
            items: Vec::new(),
            lifted: false,
            transform: TransformState::default(),
            drag: None,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn shape(&self) -> CreateShape {
        self.shape
    }

    pub fn set_shape(&mut self, shape: CreateShape) {
        self.shape = shape;
    }

    pub fn selection_path(&self) -> &SelectionPath {
        &self.path
    }

    /// A finished, closed outline exists.
    pub fn has_selection(&self) -> bool {
        self.state != SelectionState::Creating && self.path.is_closed() && self.path.len() > 2
    }

    pub fn is_floating(&self) -> bool {
        self.lifted
    }

    pub fn floating_items(&self) -> &[FloatingItem] {
        &self.items
    }

    pub fn transform(&self) -> &TransformState {
        &self.transform
    }

    /// Replace the outline programmatically (no lift, no Command).
    pub fn set_selection(&mut self, path: SelectionPath) {
        self.path = path;
        self.state = SelectionState::Idle;
    }

    /// Coverage mask of the current selection at document size.
    pub fn mask(&self, width: u32, height: u32) -> Option<GrayImage> {
        self.has_selection().then(|| self.path.mask(width, height))
    }

    // ========================================================================
    // HIT TESTING
    // ========================================================================

    /// Handle under `pos`.  Corners and the rotate handle win over the
    /// interior.  Handle squares keep a constant on-screen size.
    pub fn hit_test(&self, pos: (f32, f32), zoom: f32) -> Option<Handle> {
        if !self.has_selection() {
            return None;
        }
        let bbox = self.path.bbox()?;
        let zoom = if zoom > 0.0 { zoom } else { 1.0 };
        let s = self.handle_size / zoom;
        let square = |c: (f32, f32)| Rect::new(c.0 - s / 2.0, c.1 - s / 2.0, s, s);

        let corners = [
            (Handle::TopLeft, (bbox.x, bbox.y)),
            (Handle::TopRight, (bbox.right(), bbox.y)),
            (Handle::BottomLeft, (bbox.x, bbox.bottom())),
            (Handle::BottomRight, (bbox.right(), bbox.bottom())),
        ];
        for (handle, c) in corners {
            if square(c).contains(pos) {
                return Some(handle);
            }
        }
        let rotate = (bbox.center().0, bbox.y - ROTATE_HANDLE_OFFSET / zoom);
        if square(rotate).contains(pos) {
            return Some(Handle::Rotate);
        }
        bbox.contains(pos).then_some(Handle::Move)
    }

    // ========================================================================
    // POINTER EVENTS
    // ========================================================================

    pub fn pointer_down(
        &mut self,
        doc: &mut Document,
        undo: &mut UndoStack,
        active: NodeId,
        pos: (f32, f32),
        zoom: f32,
    ) {
        if let Some(handle) = self.hit_test(pos, zoom) {
            self.begin_transform(doc, active, handle, pos);
            return;
        }
        self.clear(doc, undo);
        self.state = SelectionState::Creating;
        self.create_start = pos;
        self.path = match self.shape {
            CreateShape::Rectangle => SelectionPath::rect(pos, pos),
            CreateShape::Lasso => SelectionPath::from_points(vec![pos], false),
        };
    }

    pub fn pointer_move(&mut self, pos: (f32, f32)) {
        match self.state {
            SelectionState::Idle => {}
            SelectionState::Creating => match self.shape {
                CreateShape::Rectangle => self.path = SelectionPath::rect(self.create_start, pos),
                CreateShape::Lasso => self.path.push(pos),
            },
            SelectionState::Transforming => self.update_transform(pos),
        }
    }

    pub fn pointer_up(&mut self, pos: (f32, f32)) {
        match self.state {
            SelectionState::Idle => {}
            SelectionState::Creating => {
                match self.shape {
                    CreateShape::Rectangle => self.path = SelectionPath::rect(self.create_start, pos),
                    CreateShape::Lasso => self.path.finish(),
                }
                self.state = SelectionState::Idle;
                let degenerate = self.path.bbox().is_none_or(|b| b.w <= 0.0 || b.h <= 0.0);
                if !self.path.is_closed() || degenerate {
                    log::debug!("selection: outline too small, discarded");
                    self.path = SelectionPath::new();
                }
            }
            SelectionState::Transforming => {
                self.update_transform(pos);
                self.state = SelectionState::Idle;
                self.drag = None;
            }
        }
    }

    // ========================================================================
    // LIFT / TRANSFORM
    // ========================================================================

    fn begin_transform(&mut self, doc: &mut Document, active: NodeId, handle: Handle, pos: (f32, f32)) {
        if !self.lifted {
            self.lift(doc, active);
        }
        let center = self.path.bbox().map_or(pos, |b| b.center());
        self.drag = Some(Drag {
            handle,
            start: pos,
            cached_pos: self.transform.pos,
            cached_rotation: self.transform.rotation,
            cached_scale: self.transform.scale,
            center,
        });
        self.state = SelectionState::Transforming;
    }

    /// Move the selected pixels of every pixel-bearing layer (paint or text)
    /// under `active` into floating buffers.  Layers with nothing selected
    /// are skipped.
    pub fn lift(&mut self, doc: &mut Document, active: NodeId) {
        if self.lifted {
            return;
        }
        let Some(bbox) = self.path.bbox() else { return };
        let (dw, dh) = doc.size();
        let x0 = bbox.x.floor().clamp(0.0, dw as f32) as u32;
        let y0 = bbox.y.floor().clamp(0.0, dh as f32) as u32;
        let x1 = bbox.right().ceil().clamp(0.0, dw as f32) as u32;
        let y1 = bbox.bottom().ceil().clamp(0.0, dh as f32) as u32;
        let (w, h) = (x1.saturating_sub(x0), y1.saturating_sub(y0));

        self.pre_lift_path = self.path.clone();
        self.transform = TransformState {
            pos: (x0 as f32, y0 as f32),
            rotation: 0.0,
            scale: 1.0,
            base: Rect::new(0.0, 0.0, w as f32, h as f32),
        };
        self.base_path = self
            .path
            .transformed(&Affine2::translate(-(x0 as f32), -(y0 as f32)));
        self.lifted = true;
        if w == 0 || h == 0 {
            return;
        }

        let mask = self.path.mask(dw, dh);
        for id in doc.paint_targets(active) {
            let Ok(snapshot) = doc.read_pixels(id) else { continue };
            let selected = apply_mask(&snapshot, &mask, false);
            let floating = image::imageops::crop_imm(&selected, x0, y0, w, h).to_image();
            if floating.pixels().all(|p| p.0[3] == 0) {
                continue;
            }
            let remaining = apply_mask(&snapshot, &mask, true);
            if let Err(e) = doc.write_pixels(id, &remaining) {
                log::warn!("selection: lift from {} failed: {}", id, e);
                continue;
            }
            self.items.push(FloatingItem { node: id, pixels: floating, snapshot });
        }
        log::debug!("selection: lifted {} layer(s), {}x{} at ({}, {})", self.items.len(), w, h, x0, y0);
    }

    fn update_transform(&mut self, pos: (f32, f32)) {
        let Some(drag) = self.drag else { return };
        let t = &mut self.transform;
        match drag.handle {
            Handle::Move => {
                t.pos = (
                    drag.cached_pos.0 + pos.0 - drag.start.0,
                    drag.cached_pos.1 + pos.1 - drag.start.1,
                );
            }
            Handle::Rotate => {
                let pivot = (
                    drag.cached_pos.0 + t.base.w / 2.0,
                    drag.cached_pos.1 + t.base.h / 2.0,
                );
                let a0 = (drag.start.1 - pivot.1).atan2(drag.start.0 - pivot.0);
                let a1 = (pos.1 - pivot.1).atan2(pos.0 - pivot.0);
                t.rotation = drag.cached_rotation + (a1 - a0).to_degrees();
            }
            _ => {
                let manhattan = |p: (f32, f32)| (p.0 - drag.center.0).abs() + (p.1 - drag.center.1).abs();
                let d0 = manhattan(drag.start);
                let d0 = if d0 == 0.0 { 1.0 } else { d0 };
                t.scale = (drag.cached_scale * manhattan(pos) / d0).max(MIN_SCALE);
            }
        }
        self.path = self.base_path.transformed(&self.transform.matrix());
    }

    /// Floating items rendered at document size through the current
    /// transform, for previews.
    pub fn render_floating(&self, width: u32, height: u32) -> Vec<(NodeId, RgbaImage)> {
        let m = self.transform.matrix();
        self.items
            .iter()
            .map(|item| (item.node, render_through(&item.pixels, &m, width, height)))
            .collect()
    }

    // ========================================================================
    // COMMIT / CANCEL / CLEAR
    // ========================================================================

    /// Bake the floating items into their layers, one Command each.
    /// Returns the number of Commands pushed.
    pub fn commit(&mut self, doc: &mut Document, undo: &mut UndoStack) -> usize {
        if !self.lifted {
            return 0;
        }
        let (w, h) = doc.size();
        let rendered = self.render_floating(w, h);
        let mut pushed = 0;
        for (item, (node, layer)) in self.items.drain(..).zip(rendered) {
            let Ok(mut current) = doc.read_pixels(node) else {
                log::warn!("selection: commit target {} is gone", node);
                continue;
            };
            draw_layer(&layer, 1.0, &mut current);
            if let Err(e) = doc.write_pixels(node, &current) {
                log::warn!("selection: commit to {} failed: {}", node, e);
                continue;
            }
            undo.push(PixelCommand::new(node, item.snapshot, current, "Transform Selection"));
            pushed += 1;
        }
        self.lifted = false;
        self.transform.rotation = 0.0;
        self.transform.scale = 1.0;
        self.state = SelectionState::Idle;
        self.drag = None;
        pushed
    }

    /// Put every lifted layer back as it was.  Returns `false` when nothing
    /// was floating.
    pub fn cancel(&mut self, doc: &mut Document) -> bool {
        if !self.lifted {
            return false;
        }
        for item in self.items.drain(..) {
            if let Err(e) = doc.write_pixels(item.node, &item.snapshot) {
                log::warn!("selection: restoring {} failed: {}", item.node, e);
            }
        }
        self.path = std::mem::take(&mut self.pre_lift_path);
        self.lifted = false;
        self.transform = TransformState::default();
        self.state = SelectionState::Idle;
        self.drag = None;
        true
    }

    /// Commit anything floating, then drop the outline.
    pub fn clear(&mut self, doc: &mut Document, undo: &mut UndoStack) {
        self.commit(doc, undo);
        self.path = SelectionPath::new();
        self.base_path = SelectionPath::new();
        self.state = SelectionState::Idle;
    }

    /// Escape: commit a floating selection, otherwise drop the outline.
    pub fn escape(&mut self, doc: &mut Document, undo: &mut UndoStack) {
        if self.lifted {
            self.commit(doc, undo);
        } else {
            self.clear(doc, undo);
        }
    }

    /// Lift, rotate by `degrees` and commit in one step.  Returns `false`
    /// without a selection.
    pub fn rotate_by(
        &mut self,
        doc: &mut Document,
        undo: &mut UndoStack,
        active: NodeId,
        degrees: f32,
    ) -> bool {
        if !self.has_selection() {
            log::debug!("selection: rotate_by with no selection");
            return false;
        }
        self.lift(doc, active);
        self.transform.rotation += degrees;
        self.path = self.base_path.transformed(&self.transform.matrix());
        self.commit(doc, undo);
        true
    }
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new(14.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_rect() -> SelectionEngine {
        let mut e = SelectionEngine::new(14.0);
        e.set_selection(SelectionPath::rect((10.0, 10.0), (50.0, 30.0)));
        e
    }

    #[test]
    fn handles_scale_with_zoom() {
        let e = engine_with_rect();
        assert_eq!(e.hit_test((10.0, 10.0), 1.0), Some(Handle::TopLeft));
        assert_eq!(e.hit_test((56.0, 30.0), 1.0), Some(Handle::BottomRight));
        // at zoom 2 the square is only 7 document pixels wide
        assert_eq!(e.hit_test((56.0, 30.0), 2.0), None);
        assert_eq!(e.hit_test((30.0, -20.0), 1.0), Some(Handle::Rotate));
        assert_eq!(e.hit_test((30.0, 20.0), 1.0), Some(Handle::Move));
        assert_eq!(e.hit_test((90.0, 90.0), 1.0), None);
    }

    #[test]
    fn corners_beat_move() {
        let e = engine_with_rect();
        // inside the box but within the corner square
        assert_eq!(e.hit_test((12.0, 12.0), 1.0), Some(Handle::TopLeft));
    }

    #[test]
    fn commit_without_lift_is_noop() {
        let mut doc = Document::new(8, 8);
        let mut undo = UndoStack::default();
        let mut e = engine_with_rect();
        assert_eq!(e.commit(&mut doc, &mut undo), 0);
        assert!(!undo.can_undo());
    }
}
