// ============================================================================
// HISTORY: pixel-snapshot commands and the bounded undo stack
// ============================================================================

use std::collections::VecDeque;

use image::RgbaImage;

use crate::document::{Document, NodeId, TextStyle};

/// Default number of undo steps kept.
pub const DEFAULT_UNDO_LIMIT: usize = 30;

/// An undoable edit of one layer: its whole pixel buffer before and after.
/// Text edits also carry the attributes the pixels were rendered from.
/// Immutable once built.
#[derive(Clone, Debug)]
pub struct PixelCommand {
    target: NodeId,
    before: RgbaImage,
    after: RgbaImage,
    description: String,
    text_styles: Option<Box<(TextStyle, TextStyle)>>,
}

impl PixelCommand {
    pub fn new(
        target: NodeId,
        before: RgbaImage,
        after: RgbaImage,
        description: impl Into<String>,
    ) -> Self {
        Self {
            target,
            before,
            after,
            description: description.into(),
            text_styles: None,
        }
    }

    /// Restore `before` / `after` text attributes together with the pixels.
    pub fn with_text_styles(mut self, before: TextStyle, after: TextStyle) -> Self {
        self.text_styles = Some(Box::new((before, after)));
        self
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn before(&self) -> &RgbaImage {
        &self.before
    }

    pub fn after(&self) -> &RgbaImage {
        &self.after
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Bytes held by both snapshots.
    pub fn memory_size(&self) -> usize {
        self.before.as_raw().len() + self.after.as_raw().len()
    }

    fn restore(&self, doc: &mut Document, undoing: bool) {
        let pixels = if undoing { &self.before } else { &self.after };
        if let Err(e) = doc.write_pixels(self.target, pixels) {
            log::warn!(
                "'{}': target layer {} could not be restored: {}",
                self.description,
                self.target,
                e
            );
            return;
        }
        if let Some(styles) = &self.text_styles {
            let style = if undoing { &styles.0 } else { &styles.1 };
            doc.restore_text_style(self.target, style.clone());
        }
    }
}

/// Two-list undo history.  A push clears the redo list and evicts the
/// oldest entry once `limit` is exceeded.
#[derive(Debug)]
pub struct UndoStack {
    undo_list: VecDeque<PixelCommand>,
    redo_list: VecDeque<PixelCommand>,
    limit: usize,
    total_memory: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl UndoStack {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_list: VecDeque::new(),
            redo_list: VecDeque::new(),
            limit,
            total_memory: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn push(&mut self, command: PixelCommand) {
        for cmd in self.redo_list.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }
        self.total_memory += command.memory_size();
        self.undo_list.push_back(command);

        while self.undo_list.len() > self.limit {
            if let Some(evicted) = self.undo_list.pop_front() {
                log::debug!("history limit reached, dropping '{}'", evicted.description);
                self.total_memory = self.total_memory.saturating_sub(evicted.memory_size());
            }
        }
    }

    /// Restore the most recent command's before-buffer.  Returns `false`
    /// when there is nothing to undo.
    pub fn undo(&mut self, doc: &mut Document) -> bool {
        let Some(command) = self.undo_list.pop_back() else {
            log::debug!("undo: history empty");
            return false;
        };
        command.restore(doc, true);
        self.redo_list.push_back(command);
        true
    }

    /// Re-apply the most recently undone command's after-buffer.
    pub fn redo(&mut self, doc: &mut Document) -> bool {
        let Some(command) = self.redo_list.pop_back() else {
            log::debug!("redo: nothing to redo");
            return false;
        };
        command.restore(doc, false);
        self.undo_list.push_back(command);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_list.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_list.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_list.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_list.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_list.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_list.back().map(|c| c.description())
    }

    /// Undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<&str> {
        self.undo_list.iter().rev().map(|c| c.description()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_list.clear();
        self.redo_list.clear();
        self.total_memory = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn layer(doc: &mut Document) -> NodeId {
        let id = doc.create_paint_layer("l").unwrap();
        let root = doc.root();
        doc.add_child(root, id);
        id
    }

    #[test]
    fn push_clears_redo() {
        let mut doc = Document::new(2, 2);
        let id = layer(&mut doc);
        let blank = RgbaImage::new(2, 2);
        let full = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));

        let mut stack = UndoStack::new(5);
        stack.push(PixelCommand::new(id, blank.clone(), full.clone(), "a"));
        assert!(stack.undo(&mut doc));
        assert!(stack.can_redo());
        stack.push(PixelCommand::new(id, blank, full, "b"));
        assert!(!stack.can_redo());
        assert_eq!(stack.undo_description(), Some("b"));
    }

    #[test]
    fn memory_tracks_both_lists() {
        let mut doc = Document::new(2, 2);
        let id = layer(&mut doc);
        let mut stack = UndoStack::new(1);
        let img = RgbaImage::new(2, 2);
        stack.push(PixelCommand::new(id, img.clone(), img.clone(), "a"));
        assert_eq!(stack.memory_usage(), 32);
        stack.push(PixelCommand::new(id, img.clone(), img, "b"));
        assert_eq!(stack.undo_len(), 1);
        assert_eq!(stack.memory_usage(), 32);
        stack.undo(&mut doc);
        stack.clear();
        assert_eq!(stack.memory_usage(), 0);
    }
}
