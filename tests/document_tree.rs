use strata::compositor;
use strata::document::{Document, LayerType};
use strata::error::StructuralViolation;
use strata::events::DocumentEvent;

fn three_levels() -> (Document, [strata::NodeId; 3]) {
    let mut doc = Document::new(4, 4);
    let root = doc.root();
    let outer = doc.create_group("outer");
    let inner = doc.create_group("inner");
    let leaf = doc.create_paint_layer("leaf").unwrap();
    assert!(doc.add_child(root, outer));
    assert!(doc.add_child(outer, inner));
    assert!(doc.add_child(inner, leaf));
    (doc, [outer, inner, leaf])
}

#[test]
fn test_effective_opacity_is_product_of_chain() {
    let (mut doc, [outer, inner, leaf]) = three_levels();
    doc.set_opacity(outer, 0.5);
    doc.set_opacity(inner, 0.8);
    doc.set_opacity(leaf, 0.25);
    assert!((doc.effective_opacity(leaf) - 0.5 * 0.8 * 0.25).abs() < 1e-6);

    doc.set_visible(inner, false);
    assert_eq!(doc.effective_opacity(leaf), 0.0);
    assert!(!doc.effective_visibility(leaf));
    assert!(compositor::plan(&doc).is_empty());
}

#[test]
fn test_paint_layer_cannot_have_children() {
    let (mut doc, [_, _, leaf]) = three_levels();
    let extra = doc.create_paint_layer("extra").unwrap();
    assert_eq!(doc.try_add_child(leaf, extra), Err(StructuralViolation::LeafParent(leaf)));
    assert!(!doc.add_child(leaf, extra));
    assert!(doc.children(leaf).is_empty());
    assert_eq!(doc.parent(extra), None);
}

#[test]
fn test_cycles_are_refused() {
    let (mut doc, [outer, inner, _]) = three_levels();
    assert_eq!(
        doc.try_add_child(inner, outer),
        Err(StructuralViolation::Cycle { parent: inner, child: outer })
    );
    assert!(!doc.add_child(outer, outer));
    let root = doc.root();
    assert_eq!(doc.try_add_child(outer, root), Err(StructuralViolation::RootImmovable));
    assert_eq!(doc.parent(inner), Some(outer));
}

#[test]
fn test_add_child_reparents() {
    let (mut doc, [outer, inner, leaf]) = three_levels();
    assert!(doc.add_child(outer, leaf));
    assert_eq!(doc.parent(leaf), Some(outer));
    assert!(doc.children(inner).is_empty());
    assert_eq!(doc.children(outer), &[inner, leaf]);
}

#[test]
fn test_remove_child_detaches_and_clears_parent() {
    let (mut doc, [_, inner, leaf]) = three_levels();
    assert!(doc.remove_child(inner, leaf));
    assert_eq!(doc.parent(leaf), None);
    assert!(doc.contains(leaf));
    // detached nodes draw nothing
    assert!(!doc.effective_visibility(leaf));
    assert!(!doc.remove_child(inner, leaf));
}

#[test]
fn test_stale_handles_are_rejected() {
    let (mut doc, [outer, inner, leaf]) = three_levels();
    assert!(doc.delete_node(inner));
    assert!(!doc.contains(inner));
    assert!(!doc.contains(leaf));
    assert_eq!(doc.children(outer), &[] as &[strata::NodeId]);
    assert_eq!(doc.try_add_child(outer, leaf), Err(StructuralViolation::StaleHandle(leaf)));
    assert!(doc.read_pixels(leaf).is_err());
    assert!(!doc.delete_node(leaf));
}

#[test]
fn test_walk_reports_types_in_preorder() {
    let (doc, [outer, inner, leaf]) = three_levels();
    let walk = doc.walk();
    let ids: Vec<_> = walk.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![doc.root(), outer, inner, leaf]);
    assert_eq!(walk[3].layer_type, LayerType::Paint);
    assert_eq!(walk[3].depth, 3);
    assert_eq!(doc.layers(), vec![leaf]);
}

#[test]
fn test_events_reach_channel_subscribers() {
    let mut doc = Document::new(2, 2);
    let rx = doc.events().channel();
    let root = doc.root();
    let a = doc.create_paint_layer("a").unwrap();
    doc.add_child(root, a);
    doc.set_opacity(a, 0.5);
    let px = doc.read_pixels(a).unwrap();
    doc.write_pixels(a, &px).unwrap();

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        events,
        vec![
            DocumentEvent::StructureChanged,
            DocumentEvent::ViewChanged,
            DocumentEvent::CanvasChanged(Some(a)),
        ]
    );
}
