// ============================================================================
// DOCUMENT TREE: arena-backed layer hierarchy
// ============================================================================
//
// Nodes live in a slot arena addressed by `NodeId`.  Each node stores its
// parent as a handle and owns the ordered list of its children's handles.
// Children order is paint order: first = bottom, last = top.

use image::RgbaImage;
use uuid::Uuid;

use super::node::{LayerType, Node, NodeId, NodeKind, PaintData, TextStyle};
use super::text::TextRenderer;
use crate::error::{StructuralViolation, SurfaceError};
use crate::events::{DocumentEvent, EventBus};
use crate::surface::RasterSurface;

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// One step of a pre-order walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    pub id: NodeId,
    pub depth: usize,
    pub layer_type: LayerType,
}

pub struct Document {
    width: u32,
    height: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    events: EventBus,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("nodes", &self.node_count())
            .finish()
    }
}

impl Document {
    /// An empty document: just the (always visible) root group.
    pub fn new(width: u32, height: u32) -> Self {
        let mut doc = Self {
            width,
            height,
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            events: EventBus::new(),
        };
        doc.root = doc.alloc(Node::new("Root".to_string(), NodeKind::Group));
        doc
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub(crate) fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.events.emit(DocumentEvent::ViewChanged);
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// Every live node, attached or not, in arena order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.node.is_some())
            .map(|(i, s)| NodeId { index: i as u32, generation: s.generation })
            .collect()
    }

    // ========================================================================
    // ARENA
    // ========================================================================

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    // ========================================================================
    // NODE CREATION (nodes start detached; attach with add_child)
    // ========================================================================

    pub fn create_group(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(Node::new(name.into(), NodeKind::Group))
    }

    /// A transparent paint layer sized to the document.
    pub fn create_paint_layer(&mut self, name: impl Into<String>) -> Result<NodeId, SurfaceError> {
        let surface = RasterSurface::allocate(self.width, self.height)?;
        Ok(self.alloc_paint(name.into(), surface, Uuid::new_v4()))
    }

    /// A paint layer holding `pixels` (premultiplied).
    pub fn create_paint_layer_from(
        &mut self,
        name: impl Into<String>,
        pixels: RgbaImage,
    ) -> Result<NodeId, SurfaceError> {
        self.create_paint_layer_with_uuid(name, pixels, Uuid::new_v4())
    }

    pub(crate) fn create_paint_layer_with_uuid(
        &mut self,
        name: impl Into<String>,
        pixels: RgbaImage,
        uuid: Uuid,
    ) -> Result<NodeId, SurfaceError> {
        let surface = RasterSurface::from_image(pixels)?;
        Ok(self.alloc_paint(name.into(), surface, uuid))
    }

    fn alloc_paint(&mut self, name: String, surface: RasterSurface, uuid: Uuid) -> NodeId {
        self.alloc(Node::new(name, NodeKind::Paint(PaintData { uuid, surface })))
    }

    /// A text layer rendered from `style` at document size.
    pub fn create_text_layer(
        &mut self,
        name: impl Into<String>,
        style: TextStyle,
        renderer: &TextRenderer,
    ) -> Result<NodeId, SurfaceError> {
        let pixels = renderer.render(&style, self.width, self.height);
        self.create_text_layer_with(name, style, pixels, Uuid::new_v4())
    }

    /// A text layer with pixels supplied by the caller (e.g. from a project
    /// archive) instead of re-rendered.
    pub(crate) fn create_text_layer_with(
        &mut self,
        name: impl Into<String>,
        style: TextStyle,
        pixels: RgbaImage,
        uuid: Uuid,
    ) -> Result<NodeId, SurfaceError> {
        let surface = RasterSurface::from_image(pixels)?;
        let kind = NodeKind::Text { paint: PaintData { uuid, surface }, style };
        Ok(self.alloc(Node::new(name.into(), kind)))
    }

    // ========================================================================
    // STRUCTURE EDITS
    // ========================================================================

    /// Append `child` as the top-most child of `parent`.  Invalid edits are
    /// logged and dropped; the return value says whether the edit happened.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert_child(parent, usize::MAX, child)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> bool {
        match self.try_insert_child(parent, index, child) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("tree edit dropped: {}", e);
                false
            }
        }
    }

    pub fn try_add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), StructuralViolation> {
        self.try_insert_child(parent, usize::MAX, child)
    }

    /// Insert `child` under `parent` at `index` (clamped).  An attached
    /// child is detached from its previous parent first.
    pub fn try_insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), StructuralViolation> {
        let parent_node = self.get(parent).ok_or(StructuralViolation::StaleHandle(parent))?;
        if !self.contains(child) {
            return Err(StructuralViolation::StaleHandle(child));
        }
        if child == self.root {
            return Err(StructuralViolation::RootImmovable);
        }
        if !parent_node.can_have_children() {
            return Err(StructuralViolation::LeafParent(parent));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(StructuralViolation::Cycle { parent, child });
        }

        self.detach(child);
        if let Some(p) = self.get_mut(parent) {
            let at = index.min(p.children.len());
            p.children.insert(at, child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        self.events.emit(DocumentEvent::StructureChanged);
        Ok(())
    }

    /// Detach `child` from `parent`.  The child stays alive, parentless.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        match self.try_remove_child(parent, child) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("tree edit dropped: {}", e);
                false
            }
        }
    }

    pub fn try_remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), StructuralViolation> {
        if !self.contains(parent) {
            return Err(StructuralViolation::StaleHandle(parent));
        }
        let c = self.get(child).ok_or(StructuralViolation::StaleHandle(child))?;
        if c.parent != Some(parent) {
            return Err(StructuralViolation::NotAChild { parent, child });
        }
        self.detach(child);
        self.events.emit(DocumentEvent::StructureChanged);
        Ok(())
    }

    /// Move `node` to position `index` among `new_parent`'s children.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId, index: usize) -> bool {
        self.insert_child(new_parent, index, node)
    }

    /// Detach and destroy `id` with its whole subtree, disposing every
    /// surface it owns.  Handles to the deleted nodes become stale.
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        if id == self.root {
            log::warn!("tree edit dropped: {}", StructuralViolation::RootImmovable);
            return false;
        }
        if !self.contains(id) {
            log::warn!("tree edit dropped: {}", StructuralViolation::StaleHandle(id));
            return false;
        }
        self.detach(id);
        for victim in self.subtree(id) {
            let slot = &mut self.slots[victim.index as usize];
            if let Some(mut node) = slot.node.take()
                && let Some(surface) = node.surface_mut()
                && let Err(e) = surface.dispose()
            {
                log::warn!("disposing surface of '{}': {}", node.name, e);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(victim.index);
        }
        self.events.emit(DocumentEvent::StructureChanged);
        true
    }

    fn detach(&mut self, child: NodeId) {
        let Some(old_parent) = self.get(child).and_then(|c| c.parent) else { return };
        if let Some(p) = self.get_mut(old_parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
    }

    /// True when `ancestor` lies on the parent chain of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.get(node).and_then(|n| n.parent);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.get(id).and_then(|n| n.parent);
        }
        false
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children())
    }

    /// False when the node or any ancestor below the root is hidden, or the
    /// node is not attached to this document's root.
    pub fn effective_visibility(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            let Some(node) = self.get(cur) else { return false };
            if cur == self.root {
                return true;
            }
            if !node.visible {
                return false;
            }
            match node.parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// Product of the node's and its ancestors' opacities (root excluded);
    /// zero whenever the node is not effectively visible.
    pub fn effective_opacity(&self, id: NodeId) -> f32 {
        if !self.effective_visibility(id) {
            return 0.0;
        }
        let mut opacity = 1.0;
        let mut cur = id;
        while cur != self.root {
            let Some(node) = self.get(cur) else { return 0.0 };
            opacity *= node.opacity;
            match node.parent {
                Some(p) => cur = p,
                None => break,
            }
        }
        opacity
    }

    /// Pre-order walk of the whole tree, root first (depth 0).
    pub fn walk(&self) -> Vec<WalkEntry> {
        self.walk_from(self.root)
    }

    pub fn walk_from(&self, start: NodeId) -> Vec<WalkEntry> {
        let mut out = Vec::new();
        let mut stack = vec![(start, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            out.push(WalkEntry { id, depth, layer_type: node.layer_type() });
            for &child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    /// `id` and all of its descendants, pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        self.walk_from(id).into_iter().map(|e| e.id).collect()
    }

    /// Layers with pixels that an edit on `id` applies to: the node itself,
    /// or every pixel-owning descendant of a group, in paint order.
    pub fn paint_targets(&self, id: NodeId) -> Vec<NodeId> {
        self.subtree(id)
            .into_iter()
            .filter(|&n| self.get(n).is_some_and(|node| node.has_pixels()))
            .collect()
    }

    /// Pixel-owning layers attached under the root, in paint order.
    pub fn layers(&self) -> Vec<NodeId> {
        self.paint_targets(self.root)
    }

    /// First node in pre-order with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.walk().into_iter().map(|e| e.id).find(|&id| {
            self.get(id).is_some_and(|n| n.name == name)
        })
    }

    // ========================================================================
    // PIXELS
    // ========================================================================

    pub fn surface(&self, id: NodeId) -> Option<&RasterSurface> {
        self.get(id).and_then(|n| n.surface())
    }

    pub fn surface_mut(&mut self, id: NodeId) -> Option<&mut RasterSurface> {
        self.get_mut(id).and_then(|n| n.surface_mut())
    }

    pub fn read_pixels(&self, id: NodeId) -> Result<RgbaImage, SurfaceError> {
        self.surface(id).ok_or(SurfaceError::NoPixels)?.read()
    }

    /// Replace a layer's pixels and notify listeners.
    pub fn write_pixels(&mut self, id: NodeId, pixels: &RgbaImage) -> Result<(), SurfaceError> {
        self.surface_mut(id).ok_or(SurfaceError::NoPixels)?.write(pixels)?;
        self.events.emit(DocumentEvent::CanvasChanged(Some(id)));
        Ok(())
    }

    pub(crate) fn notify_pixels_changed(&self, id: Option<NodeId>) {
        self.events.emit(DocumentEvent::CanvasChanged(id));
    }

    // ========================================================================
    // ATTRIBUTES
    // ========================================================================

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> bool {
        let Some(node) = self.get_mut(id) else { return false };
        node.name = name.into();
        self.events.emit(DocumentEvent::ViewChanged);
        true
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> bool {
        let Some(node) = self.get_mut(id) else { return false };
        node.visible = visible;
        self.events.emit(DocumentEvent::ViewChanged);
        true
    }

    /// Set opacity, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) -> bool {
        let Some(node) = self.get_mut(id) else { return false };
        node.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
        self.events.emit(DocumentEvent::ViewChanged);
        true
    }

    /// Change a text layer's attributes and regenerate its pixels.
    pub fn set_text_style(
        &mut self,
        id: NodeId,
        new_style: TextStyle,
        renderer: &TextRenderer,
    ) -> Result<(), SurfaceError> {
        let (w, h) = (self.width, self.height);
        let node = self.get_mut(id).ok_or(SurfaceError::NoPixels)?;
        let NodeKind::Text { paint, style } = &mut node.kind else {
            return Err(SurfaceError::NoPixels);
        };
        let pixels = renderer.render(&new_style, w, h);
        paint.surface.write(&pixels)?;
        *style = new_style;
        self.events.emit(DocumentEvent::CanvasChanged(Some(id)));
        Ok(())
    }

    /// Put back a text layer's attributes without re-rendering; the caller
    /// restores the matching pixels.
    pub(crate) fn restore_text_style(&mut self, id: NodeId, new_style: TextStyle) -> bool {
        let Some(NodeKind::Text { style, .. }) = self.get_mut(id).map(|n| &mut n.kind) else {
            return false;
        };
        *style = new_style;
        self.events.emit(DocumentEvent::ViewChanged);
        true
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        for slot in &mut self.slots {
            if let Some(surface) = slot.node.as_mut().and_then(|n| n.surface_mut())
                && !surface.is_disposed()
            {
                let _ = surface.dispose();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_is_preorder_with_tags() {
        let mut doc = Document::new(8, 8);
        let g = doc.create_group("g");
        let a = doc.create_paint_layer("a").unwrap();
        let b = doc.create_paint_layer("b").unwrap();
        let root = doc.root();
        assert!(doc.add_child(root, g));
        assert!(doc.add_child(g, a));
        assert!(doc.add_child(root, b));

        let walk = doc.walk();
        let ids: Vec<_> = walk.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![root, g, a, b]);
        assert_eq!(walk[2].depth, 2);
        assert_eq!(walk[1].layer_type, LayerType::Group);
        assert_eq!(walk[3].layer_type, LayerType::Paint);
    }

    #[test]
    fn deleted_handles_go_stale() {
        let mut doc = Document::new(4, 4);
        let a = doc.create_paint_layer("a").unwrap();
        let root = doc.root();
        doc.add_child(root, a);
        assert!(doc.delete_node(a));
        assert!(!doc.contains(a));

        // slot is reused with a new generation
        let b = doc.create_group("b");
        assert_eq!(b.index, a.index);
        assert_ne!(b, a);
        assert!(doc.get(a).is_none());
    }
}
