use std::fs;
use std::path::PathBuf;

use image::{GrayImage, Rgba, RgbaImage};
use strata::brush::{
    stroke_segment, Brush, BrushBlendMode, BrushDescriptor, BrushLibrary, StampTip, StrokeSession,
    TipShape,
};
use strata::document::Document;

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("strata-test-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn doc_with_layer(fill: Option<[u8; 4]>) -> (Document, strata::NodeId) {
    let mut doc = Document::new(100, 100);
    let root = doc.root();
    let layer = match fill {
        Some(c) => doc.create_paint_layer_from("Layer", RgbaImage::from_pixel(100, 100, Rgba(c))),
        None => doc.create_paint_layer("Layer"),
    }
    .unwrap();
    doc.add_child(root, layer);
    (doc, layer)
}

fn brush(size: f32, hardness: f32, blend_mode: BrushBlendMode) -> Brush {
    let descriptor = BrushDescriptor {
        name: "Test".into(),
        size,
        hardness,
        blend_mode,
        ..Default::default()
    };
    Brush::new(descriptor, StampTip::synthesize(hardness, TipShape::Round))
}

#[test]
fn test_segment_stamp_count_follows_spacing() {
    let (mut doc, layer) = doc_with_layer(None);
    let b = brush(50.0, 1.0, BrushBlendMode::Normal);
    // step = 50 × 0.1 = 5 px, distance 20
    let placed = stroke_segment(&mut doc, layer, &b, [0, 0, 0, 255], (10.0, 50.0), (30.0, 50.0), None)
        .unwrap();
    assert_eq!(placed, 5);
    let placed = stroke_segment(&mut doc, layer, &b, [0, 0, 0, 255], (30.0, 50.0), (30.0, 50.0), None)
        .unwrap();
    assert_eq!(placed, 1);
}

#[test]
fn test_segment_on_group_is_rejected() {
    let mut doc = Document::new(10, 10);
    let group = doc.create_group("g");
    let b = brush(4.0, 1.0, BrushBlendMode::Normal);
    assert!(stroke_segment(&mut doc, group, &b, [0, 0, 0, 255], (1.0, 1.0), (2.0, 2.0), None).is_err());
}

#[test]
fn test_soft_tip_fades_toward_the_edge() {
    let (mut doc, layer) = doc_with_layer(None);
    let b = brush(40.0, 0.0, BrushBlendMode::Normal);
    stroke_segment(&mut doc, layer, &b, [0, 0, 0, 255], (50.0, 50.0), (50.0, 50.0), None).unwrap();
    let px = doc.read_pixels(layer).unwrap();
    let center = px.get_pixel(50, 50).0[3];
    let mid = px.get_pixel(60, 50).0[3];
    let outside = px.get_pixel(72, 50).0[3];
    assert!(center > mid, "{} <= {}", center, mid);
    assert!(mid > 0);
    assert_eq!(outside, 0);
}

#[test]
fn test_opacity_and_color_alpha_scale_the_stamp() {
    let (mut doc, layer) = doc_with_layer(None);
    let mut b = brush(10.0, 1.0, BrushBlendMode::Normal);
    b.descriptor.opacity = 0.5;
    stroke_segment(&mut doc, layer, &b, [255, 255, 255, 255], (50.0, 50.0), (50.0, 50.0), None).unwrap();
    let a = doc.read_pixels(layer).unwrap().get_pixel(50, 50).0[3];
    assert!((127..=128).contains(&a), "alpha {}", a);
}

#[test]
fn test_eraser_session_produces_one_command() {
    let (mut doc, layer) = doc_with_layer(Some([0, 0, 255, 255]));
    let eraser = brush(10.0, 1.0, BrushBlendMode::Eraser);
    let mut session =
        StrokeSession::begin(&mut doc, layer, &eraser, [0, 0, 0, 255], (20.0, 20.0), None).unwrap();
    session.extend(&mut doc, &eraser, [0, 0, 0, 255], (60.0, 20.0), None);
    let command = session.finish(&doc).unwrap();
    assert_eq!(command.description(), "Eraser Stroke");
    assert_eq!(command.before().get_pixel(40, 20).0, [0, 0, 255, 255]);

    let px = doc.read_pixels(layer).unwrap();
    assert_eq!(px.get_pixel(40, 20).0, [0, 0, 0, 0]);
    assert_eq!(px.get_pixel(40, 40).0, [0, 0, 255, 255]);
}

#[test]
fn test_masked_out_stroke_yields_no_command() {
    let (mut doc, layer) = doc_with_layer(None);
    let b = brush(10.0, 1.0, BrushBlendMode::Normal);
    let empty = GrayImage::new(100, 100);
    let session =
        StrokeSession::begin(&mut doc, layer, &b, [255, 0, 0, 255], (50.0, 50.0), Some(&empty)).unwrap();
    assert!(session.finish(&doc).is_none());
}

#[test]
fn test_written_presets_load_back() {
    let dir = scratch_dir();
    assert_eq!(BrushLibrary::write_defaults(&dir).unwrap(), 10);
    assert!(dir.join("g-pen_round").join("config.json").is_file());
    assert!(dir.join("g-pen_round").join("texture.png").is_file());

    let loaded = BrushLibrary::load_dir(&dir).unwrap();
    let defaults = BrushLibrary::defaults();
    assert_eq!(loaded.len(), defaults.len());
    for original in defaults.brushes() {
        let back = loaded.find(original.name()).unwrap();
        assert_eq!(back.descriptor, original.descriptor);
        assert_eq!(back.tip, original.tip);
    }
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_broken_brush_folders_are_skipped() {
    let dir = scratch_dir();
    BrushLibrary::write_defaults(&dir).unwrap();

    let garbled = dir.join("garbled");
    fs::create_dir_all(&garbled).unwrap();
    fs::write(garbled.join("config.json"), "{ not json").unwrap();

    let zero = dir.join("zero");
    fs::create_dir_all(&zero).unwrap();
    fs::write(zero.join("config.json"), r#"{"name":"Zero","size":0}"#).unwrap();

    fs::create_dir_all(dir.join("empty")).unwrap();

    // no texture: a round tip is synthesized from hardness
    let plain = dir.join("plain");
    fs::create_dir_all(&plain).unwrap();
    fs::write(plain.join("config.json"), r#"{"name":"Plain","size":12,"hardness":0.5}"#).unwrap();

    let lib = BrushLibrary::load_dir(&dir).unwrap();
    assert_eq!(lib.len(), 11);
    assert!(lib.find("Zero").is_none());
    let plain = lib.find("Plain").unwrap();
    assert_eq!(plain.tip, StampTip::synthesize(0.5, TipShape::Round));
    assert_eq!(plain.descriptor.category, "Other");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_or_empty_dir_falls_back_to_presets() {
    let dir = scratch_dir();
    assert_eq!(BrushLibrary::load_or_defaults(&dir).len(), 10);
    assert_eq!(BrushLibrary::load_or_defaults(&dir.join("missing")).len(), 10);
    assert!(BrushLibrary::load_dir(&dir.join("missing")).is_err());
    fs::remove_dir_all(&dir).ok();
}
