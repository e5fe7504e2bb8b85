// ============================================================================
// IMAGE INBOX: finished background images waiting to become layers
// ============================================================================
//
// Generators run on their own threads and send straight-alpha buffers
// through `ImageInbox::sender()`.  The editor thread drains the inbox with
// `poll`, which appends each image as a new paint layer centred on the
// canvas.

use std::sync::mpsc;

use image::RgbaImage;

use crate::document::{Document, NodeId};
use crate::surface::premultiply;

pub const GENERATED_LAYER_NAME: &str = "Generated";

#[derive(Debug)]
pub struct ImageInbox {
    tx: mpsc::Sender<RgbaImage>,
    rx: mpsc::Receiver<RgbaImage>,
}

impl Default for ImageInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageInbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    /// A `Send` handle for a worker thread.
    pub fn sender(&self) -> mpsc::Sender<RgbaImage> {
        self.tx.clone()
    }

    /// Append every image received so far under the root.  Returns the new
    /// layers in arrival order.
    pub fn poll(&self, doc: &mut Document) -> Vec<NodeId> {
        let mut added = Vec::new();
        while let Ok(image) = self.rx.try_recv() {
            if let Some(id) = append_centered(doc, &image) {
                added.push(id);
            }
        }
        added
    }
}

/// Canvas offset that centres a `w`×`h` image (floored; may be negative).
pub fn centered_offset(canvas: (u32, u32), image: (u32, u32)) -> (i64, i64) {
    (
        (canvas.0 as i64 - image.0 as i64).div_euclid(2),
        (canvas.1 as i64 - image.1 as i64).div_euclid(2),
    )
}

fn append_centered(doc: &mut Document, image: &RgbaImage) -> Option<NodeId> {
    let (x, y) = centered_offset(doc.size(), image.dimensions());
    let mut canvas = RgbaImage::new(doc.width(), doc.height());
    image::imageops::replace(&mut canvas, image, x, y);
    let layer = match doc.create_paint_layer_from(GENERATED_LAYER_NAME, premultiply(&canvas)) {
        Ok(id) => id,
        Err(e) => {
            log::warn!("inbox: cannot create layer: {}", e);
            return None;
        }
    };
    let root = doc.root();
    if !doc.add_child(root, layer) {
        doc.delete_node(layer);
        return None;
    }
    log::info!("inbox: added {}x{} image at ({}, {})", image.width(), image.height(), x, y);
    Some(layer)
}
