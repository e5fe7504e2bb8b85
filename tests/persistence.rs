use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use strata::document::{Document, LayerType, TextStyle};
use strata::error::PersistenceError;
use strata::project::{self, persistence};
use strata::surface::premultiply;
use strata::{Editor, EditorConfig};

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("strata-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn sample_document() -> Document {
    let mut doc = Document::new(16, 12);
    let root = doc.root();

    let mut straight = RgbaImage::new(16, 12);
    for (x, y, px) in straight.enumerate_pixels_mut() {
        *px = Rgba([(x * 15) as u8, (y * 20) as u8, 90, ((x + y) * 9) as u8]);
    }
    let background = doc.create_paint_layer_from("Background", premultiply(&straight)).unwrap();
    doc.add_child(root, background);

    let group = doc.create_group("Ink");
    doc.set_opacity(group, 0.6);
    doc.add_child(root, group);

    let lines = doc
        .create_paint_layer_from("Lines", RgbaImage::from_pixel(16, 12, Rgba([0, 0, 128, 128])))
        .unwrap();
    doc.set_visible(lines, false);
    doc.add_child(group, lines);

    let style = TextStyle { text: "Hello".into(), position: (2.0, 3.0), ..Default::default() };
    let caption = doc
        .create_text_layer("Caption", style, &strata::document::TextRenderer::none())
        .unwrap();
    doc.add_child(group, caption);
    doc
}

#[test]
fn test_round_trip_preserves_tree_and_pixels() {
    let dir = scratch_dir();
    let path = dir.join("scene.strata");
    let original = sample_document();
    project::save(&original, &path).unwrap();
    let loaded = project::load(&path).unwrap();

    assert_eq!(loaded.size(), original.size());
    let a = original.walk();
    let b = loaded.walk();
    assert_eq!(a.len(), b.len());
    for (ea, eb) in a.iter().zip(&b) {
        assert_eq!(ea.depth, eb.depth);
        assert_eq!(ea.layer_type, eb.layer_type);
        let (na, nb) = (original.get(ea.id).unwrap(), loaded.get(eb.id).unwrap());
        assert_eq!(na.name(), nb.name());
        assert_eq!(na.visible(), nb.visible());
        assert_eq!(na.opacity(), nb.opacity());
        assert_eq!(na.uuid(), nb.uuid());
        assert_eq!(na.text_style(), nb.text_style());
        if na.has_pixels() {
            assert_eq!(
                original.read_pixels(ea.id).unwrap(),
                loaded.read_pixels(eb.id).unwrap(),
                "pixels of '{}'",
                na.name()
            );
        }
    }
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_manifest_lists_every_layer_png() {
    let doc = sample_document();
    let archive = persistence::build_archive(&doc).unwrap();
    let names: Vec<_> = archive.entry_names().collect();
    assert_eq!(names.len(), 3);
    for id in doc.layers() {
        let uuid = doc.get(id).unwrap().uuid().unwrap();
        assert!(names.contains(&format!("{}.png", uuid).as_str()));
    }
    let manifest: serde_json::Value = serde_json::from_str(archive.manifest()).unwrap();
    assert_eq!(manifest["width"], 16);
    assert_eq!(manifest["root"]["type"], LayerType::Group.as_str());
    assert_eq!(manifest["root"]["children"][1]["children"][1]["text_content"], "Hello");
}

#[test]
fn test_corrupt_archives_are_rejected() {
    let raw = persistence::to_bytes(&sample_document()).unwrap();

    assert!(matches!(
        persistence::from_bytes(&raw[..8]),
        Err(PersistenceError::InvalidFormat(_))
    ));

    let truncated = &raw[..raw.len() / 2];
    assert!(persistence::from_bytes(truncated).is_err());

    let mut garbled = raw.clone();
    let mid = garbled.len() / 3;
    for b in &mut garbled[mid..mid + 64] {
        *b = 0xFF;
    }
    assert!(persistence::from_bytes(&garbled).is_err());
}

#[test]
fn test_failed_open_keeps_current_document() {
    let dir = scratch_dir();
    let bogus = dir.join("bogus.strata");
    std::fs::write(&bogus, b"definitely not a project file").unwrap();

    let config = EditorConfig {
        document_width: 20,
        document_height: 10,
        brush_dir: dir.join("no-brushes"),
        ..Default::default()
    };
    let mut editor = Editor::new(config).unwrap();
    let before = editor.document().walk();
    assert!(editor.open(&bogus).is_err());
    assert_eq!(editor.document().walk(), before);
    assert_eq!(editor.document().size(), (20, 10));
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_editor_save_then_open() {
    let dir = scratch_dir();
    let path = dir.join("doc.strata");
    let config = EditorConfig {
        document_width: 8,
        document_height: 8,
        background_color: [10, 200, 30, 255],
        brush_dir: dir.join("no-brushes"),
        ..Default::default()
    };
    let mut editor = Editor::new(config.clone()).unwrap();
    editor.save(&path).unwrap();

    let mut other = Editor::new(EditorConfig { document_width: 3, document_height: 3, ..config }).unwrap();
    other.open(&path).unwrap();
    assert_eq!(other.document().size(), (8, 8));
    let bg = other.document().find_by_name("Background").unwrap();
    assert_eq!(other.active(), bg);
    assert_eq!(other.document().read_pixels(bg).unwrap().get_pixel(4, 4).0, [10, 200, 30, 255]);
    std::fs::remove_dir_all(dir).ok();
}
