use std::fs;
use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use strata::compositor;
use strata::document::{Document, TextRenderer, TextStyle};
use strata::error::SurfaceError;
use strata::history::UndoStack;
use strata::ops::{self, Adjustment, Anchor, GradientMap, GradientStop};
use strata::surface::{premultiply, unpremultiply, RasterSurface, ScanOrder, MAX_SURFACE_DIM};
use strata::{Editor, EditorConfig};

const RED: [u8; 4] = [255, 0, 0, 255];

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("strata-test-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================================
// Surfaces
// ============================================================================

#[test]
fn test_surface_dimension_limits() {
    assert_eq!(
        RasterSurface::allocate(0, 5).unwrap_err(),
        SurfaceError::InvalidDimensions { width: 0, height: 5 }
    );
    assert!(RasterSurface::allocate(MAX_SURFACE_DIM + 1, 1).is_err());
    let s = RasterSurface::allocate(3, 2).unwrap();
    assert_eq!(s.dimensions(), (3, 2));
    assert!(s.read().unwrap().pixels().all(|p| p.0 == [0, 0, 0, 0]));
}

#[test]
fn test_dispose_is_single_shot() {
    let mut s = RasterSurface::allocate(2, 2).unwrap();
    let id = s.id();
    s.dispose().unwrap();
    assert!(s.is_disposed());
    assert_eq!(s.dispose(), Err(SurfaceError::AlreadyDisposed(id)));
    assert_eq!(s.read(), Err(SurfaceError::Disposed(id)));
    assert!(s.write(&RgbaImage::new(2, 2)).is_err());
}

#[test]
fn test_write_with_new_size_recreates_storage() {
    let mut s = RasterSurface::allocate(2, 2).unwrap();
    let g = s.generation();
    s.write(&RgbaImage::from_pixel(3, 1, Rgba(RED))).unwrap();
    assert_eq!(s.dimensions(), (3, 1));
    assert!(s.generation() > g);
    assert_eq!(s.read().unwrap().get_pixel(2, 0).0, RED);
}

#[test]
fn test_bottom_up_rows_are_flipped() {
    let mut s = RasterSurface::allocate(1, 2).unwrap();
    let data = [1, 2, 3, 4, 5, 6, 7, 8];
    s.write_rows(1, 2, &data, ScanOrder::BottomUp).unwrap();
    let px = s.read().unwrap();
    assert_eq!(px.get_pixel(0, 0).0, [5, 6, 7, 8]);
    assert_eq!(px.get_pixel(0, 1).0, [1, 2, 3, 4]);

    s.write_rows(1, 2, &data, ScanOrder::TopDown).unwrap();
    assert_eq!(s.read().unwrap().get_pixel(0, 0).0, [1, 2, 3, 4]);
    assert_eq!(
        s.write_rows(1, 2, &data[..4], ScanOrder::TopDown),
        Err(SurfaceError::SizeMismatch { expected: 8, actual: 4 })
    );
}

#[test]
fn test_alpha_conversion_is_lossless() {
    let straight = RgbaImage::from_fn(256, 4, |x, y| {
        let a = x as u8;
        Rgba([(y * 80) as u8, 255 - a, 17, a])
    });
    let stored = premultiply(&straight);
    for p in stored.pixels() {
        assert!(p.0[0] <= p.0[3] && p.0[1] <= p.0[3] && p.0[2] <= p.0[3]);
    }
    assert_eq!(premultiply(&unpremultiply(&stored)), stored);
}

// ============================================================================
// Compositor
// ============================================================================

#[test]
fn test_disposed_layer_is_skipped_by_compositor() {
    let mut doc = Document::new(4, 4);
    let root = doc.root();
    let bottom = doc.create_paint_layer_from("bottom", RgbaImage::from_pixel(4, 4, Rgba(RED))).unwrap();
    let top = doc
        .create_paint_layer_from("top", RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255])))
        .unwrap();
    doc.add_child(root, bottom);
    doc.add_child(root, top);
    assert_eq!(compositor::composite(&doc).get_pixel(0, 0).0, [0, 0, 255, 255]);

    doc.surface_mut(top).unwrap().dispose().unwrap();
    assert_eq!(compositor::plan(&doc).len(), 1);
    assert_eq!(compositor::composite(&doc).get_pixel(0, 0).0, RED);
    assert!(doc.read_pixels(top).is_err());
}

#[test]
fn test_group_opacity_multiplies_into_layers() {
    let mut doc = Document::new(2, 2);
    let root = doc.root();
    let group = doc.create_group("g");
    let layer = doc.create_paint_layer_from("l", RgbaImage::from_pixel(2, 2, Rgba(RED))).unwrap();
    doc.add_child(root, group);
    doc.add_child(group, layer);
    doc.set_opacity(group, 0.5);
    doc.set_opacity(layer, 0.5);

    let plan = compositor::plan(&doc);
    assert_eq!(plan.len(), 1);
    assert!((plan[0].opacity - 0.25).abs() < 1e-6);
    let px = compositor::composite(&doc).get_pixel(1, 1).0;
    assert!((63..=64).contains(&px[3]), "alpha {}", px[3]);
    assert_eq!(px[0], px[3]);
}

// ============================================================================
// Canvas operations
// ============================================================================

#[test]
fn test_new_document_has_filled_background() {
    let (doc, bg) = ops::new_document(5, 3, [255, 255, 255, 255]).unwrap();
    assert_eq!(doc.size(), (5, 3));
    assert_eq!(doc.get(bg).unwrap().name(), "Background");
    assert_eq!(doc.layers(), vec![bg]);
    assert!(doc.read_pixels(bg).unwrap().pixels().all(|p| p.0 == [255, 255, 255, 255]));
}

#[test]
fn test_resize_canvas_anchors_content() {
    let (mut doc, bg) = ops::new_document(10, 10, [0, 0, 0, 0]).unwrap();
    let mut px = doc.read_pixels(bg).unwrap();
    px.put_pixel(0, 0, Rgba(RED));
    doc.write_pixels(bg, &px).unwrap();
    let text = doc
        .create_text_layer("Caption", TextStyle::default(), &TextRenderer::none())
        .unwrap();
    let root = doc.root();
    doc.add_child(root, text);

    let mut undo = UndoStack::default();
    undo.push(strata::history::PixelCommand::new(bg, px.clone(), px.clone(), "Noop"));

    ops::resize_canvas(&mut doc, &mut undo, 20, 20, Anchor::CENTER).unwrap();
    assert_eq!(doc.size(), (20, 20));
    assert!(!undo.can_undo());
    let resized = doc.read_pixels(bg).unwrap();
    assert_eq!(resized.dimensions(), (20, 20));
    assert_eq!(resized.get_pixel(5, 5).0, RED);
    assert_eq!(resized.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(doc.read_pixels(text).unwrap().dimensions(), (20, 20));
    assert_eq!(doc.get(text).unwrap().text_style().unwrap().position, (105.0, 105.0));

    // shrinking towards the bottom-right crops the top-left away
    ops::resize_canvas(&mut doc, &mut undo, 4, 4, Anchor::BOTTOM_RIGHT).unwrap();
    assert!(doc.read_pixels(bg).unwrap().pixels().all(|p| p.0 == [0, 0, 0, 0]));

    assert_eq!(
        ops::resize_canvas(&mut doc, &mut undo, 0, 4, Anchor::TOP_LEFT),
        Err(SurfaceError::InvalidDimensions { width: 0, height: 4 })
    );
    assert_eq!(doc.size(), (4, 4));
}

#[test]
fn test_adjustments_are_undoable_and_skip_groups() {
    let (mut doc, bg) = ops::new_document(4, 4, [200, 100, 50, 255]).unwrap();
    let mut undo = UndoStack::default();
    let group = doc.create_group("g");
    let root = doc.root();
    doc.add_child(root, group);

    assert!(!ops::apply_adjustment(&mut doc, &mut undo, group, Adjustment::Invert));
    assert!(!ops::apply_adjustment(&mut doc, &mut undo, bg, Adjustment::Brightness(0)));
    assert!(!undo.can_undo());

    assert!(ops::apply_adjustment(&mut doc, &mut undo, bg, Adjustment::Invert));
    assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(0, 0).0, [55, 155, 205, 255]);
    assert_eq!(undo.undo_description(), Some("Invert Colors"));
    assert!(undo.undo(&mut doc));
    assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(0, 0).0, [200, 100, 50, 255]);
}

#[test]
fn test_new_document_rejects_zero_size() {
    assert_eq!(
        ops::new_document(0, 0, [255, 255, 255, 255]).err(),
        Some(SurfaceError::InvalidDimensions { width: 0, height: 0 })
    );
    assert!(matches!(
        ops::new_document(8, MAX_SURFACE_DIM + 1, [0, 0, 0, 0]),
        Err(SurfaceError::InvalidDimensions { .. })
    ));
}

#[test]
fn test_hsl_saturation_and_lightness() {
    let (mut doc, bg) = ops::new_document(2, 2, RED).unwrap();
    let mut undo = UndoStack::default();
    let grey = Adjustment::HueSaturationLightness { hue: 0.0, saturation: 0.0, lightness: 0.0 };
    assert!(ops::apply_adjustment(&mut doc, &mut undo, bg, grey));
    assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(0, 0).0, [128, 128, 128, 255]);
    assert_eq!(undo.undo_description(), Some("Hue/Saturation/Lightness"));

    let lighter = Adjustment::HueSaturationLightness { hue: 0.0, saturation: 1.0, lightness: 20.0 };
    assert!(ops::apply_adjustment(&mut doc, &mut undo, bg, lighter));
    assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(1, 1).0, [148, 148, 148, 255]);

    // a half-turn of hue takes red to cyan
    assert!(undo.undo(&mut doc) && undo.undo(&mut doc));
    let cyan = Adjustment::HueSaturationLightness { hue: 180.0, saturation: 1.0, lightness: 0.0 };
    assert!(ops::apply_adjustment(&mut doc, &mut undo, bg, cyan));
    assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(0, 0).0, [0, 255, 255, 255]);
}

#[test]
fn test_exposure_multiplies_channels() {
    let (mut doc, bg) = ops::new_document(3, 3, [100, 50, 20, 255]).unwrap();
    let mut undo = UndoStack::default();
    assert!(!ops::apply_adjustment(&mut doc, &mut undo, bg, Adjustment::Exposure(1.0)));
    assert!(ops::apply_adjustment(&mut doc, &mut undo, bg, Adjustment::Exposure(2.0)));
    assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(2, 2).0, [200, 100, 40, 255]);
    assert!(ops::apply_adjustment(&mut doc, &mut undo, bg, Adjustment::Exposure(2.0)));
    assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(2, 2).0, [255, 200, 80, 255]);
    assert_eq!(undo.undo_len(), 2);
    assert!(undo.undo(&mut doc) && undo.undo(&mut doc));
    assert_eq!(doc.read_pixels(bg).unwrap().get_pixel(0, 0).0, [100, 50, 20, 255]);
}

#[test]
fn test_gradient_map_follows_luminance_and_keeps_alpha() {
    let (mut doc, bg) = ops::new_document(3, 1, [255, 255, 255, 255]).unwrap();
    let mut px = doc.read_pixels(bg).unwrap();
    px.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
    px.put_pixel(2, 0, Rgba([0, 0, 0, 0]));
    doc.write_pixels(bg, &px).unwrap();

    let map = GradientMap::from_stops(&[
        GradientStop::new(0.0, [0, 0, 255]),
        GradientStop::new(1.0, [255, 255, 0]),
    ]);
    let mut undo = UndoStack::default();
    assert!(ops::apply_adjustment(&mut doc, &mut undo, bg, Adjustment::GradientMap(map)));
    let out = doc.read_pixels(bg).unwrap();
    assert_eq!(out.get_pixel(0, 0).0, [255, 255, 0, 255]);
    assert_eq!(out.get_pixel(1, 0).0, [0, 0, 255, 255]);
    assert_eq!(out.get_pixel(2, 0).0, [0, 0, 0, 0]);
    assert_eq!(undo.undo_description(), Some("Gradient Map"));
    assert!(undo.undo(&mut doc));
    assert_eq!(doc.read_pixels(bg).unwrap(), px);
}

#[test]
fn test_adjustments_apply_to_text_layers() {
    let (mut doc, _) = ops::new_document(4, 4, [255, 255, 255, 255]).unwrap();
    let text = doc
        .create_text_layer("Caption", TextStyle::default(), &TextRenderer::none())
        .unwrap();
    let root = doc.root();
    doc.add_child(root, text);
    doc.write_pixels(text, &RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]))).unwrap();
    let mut undo = UndoStack::default();
    assert!(ops::apply_adjustment(&mut doc, &mut undo, text, Adjustment::Invert));
    assert_eq!(doc.read_pixels(text).unwrap().get_pixel(3, 3).0, [245, 235, 225, 255]);
}

#[test]
fn test_editor_resize_clears_history_and_selection() {
    let config = EditorConfig {
        document_width: 30,
        document_height: 20,
        brush_dir: scratch_dir().join("none"),
        ..Default::default()
    };
    let mut editor = Editor::new(config).unwrap();
    assert_eq!(editor.document().size(), (30, 20));
    assert_eq!(editor.brush().unwrap().name(), "G-Pen Round");
    assert!(editor.adjust(Adjustment::Invert));
    editor
        .selection_mut()
        .set_selection(strata::selection::SelectionPath::rect((1.0, 1.0), (5.0, 5.0)));

    editor.resize_canvas(40, 40, Anchor::TOP_LEFT).unwrap();
    assert!(!editor.undo_stack().can_undo());
    assert!(!editor.selection().has_selection());
    assert_eq!(editor.composite().dimensions(), (40, 40));
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_settings_file_round_trip() {
    let dir = scratch_dir();
    let path = dir.join("nested").join("strata_settings.cfg");
    let config = EditorConfig {
        undo_limit: 12,
        document_width: 1024,
        document_height: 768,
        background_color: [10, 20, 30, 40],
        handle_size: 9.5,
        brush_dir: PathBuf::from("my brushes"),
        gpu_acceleration: false,
        preferred_gpu: "Some Adapter".into(),
        default_font: "DejaVu Sans".into(),
    };
    config.save_to(&path).unwrap();
    assert_eq!(EditorConfig::load_from(&path).unwrap(), config);
    assert!(EditorConfig::load_from(&dir.join("missing.cfg")).is_err());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_malformed_settings_keep_defaults() {
    let parsed = EditorConfig::parse(
        "# comment\n\
         document_width=0\n\
         document_height=abc\n\
         background_color=1,2,3\n\
         handle_size=-4\n\
         mystery=1\n\
         undo_limit=7\n",
    );
    let defaults = EditorConfig::default();
    assert_eq!(parsed.document_width, defaults.document_width);
    assert_eq!(parsed.document_height, defaults.document_height);
    assert_eq!(parsed.background_color, defaults.background_color);
    assert_eq!(parsed.handle_size, defaults.handle_size);
    assert_eq!(parsed.undo_limit, 7);
}
