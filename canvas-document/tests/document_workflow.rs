//! Document Workflow Integration Tests
//!
//! Exercises the public API end to end:
//! - Parse, validate and canonicalize
//! - Hit testing on nested frames
//! - Patches, reverse patches and history
//! - Diff and three-way merge

use canvas_document::canonical::{self, would_be_identical};
use canvas_document::merge::{AutoResolver, ManualResolver, PreferLocalResolver, Severity};
use canvas_document::patch::value_at;
use canvas_document::tree::FieldCategory;
use canvas_document::{
    apply_patches, apply_patches_with_reverse, diff_documents, hit_test, hit_test_rect,
    merge_documents, Artboard, CanvasDocument, DiffKind, DiffOptions, History, HitTestOptions, Id,
    MergeOptions, Node, Patch, PatchError, Point, Rect, ResolverPipeline, Validator,
};
use serde_json::json;

const TITLE: &str = "/artboards/0/children/0/children/0";

/// Hero frame with a title, and a footer frame further down.
fn landing_page() -> CanvasDocument {
    let title = Node::text("Title", Rect::new(32.0, 40.0, 600.0, 64.0), "Welcome")
        .with_id(Id::from_u128(3));
    let hero = Node::frame("Hero", Rect::new(0.0, 0.0, 1440.0, 480.0))
        .with_id(Id::from_u128(2))
        .with_children([title]);
    let footer = Node::frame("Footer", Rect::new(0.0, 520.0, 1440.0, 200.0))
        .with_id(Id::from_u128(4));
    let artboard = Artboard::new("Desktop", Rect::new(0.0, 0.0, 1440.0, 900.0))
        .with_id(Id::from_u128(1))
        .with_children([hero, footer]);
    CanvasDocument::with_id(Id::from_u128(100), "Landing", vec![artboard])
        .expect("valid document")
}

// ============================================================================
// Codec Tests
// ============================================================================

#[test]
fn test_canonical_text_parses_and_validates() {
    let doc = landing_page();
    let text = canonical::serialize(&doc).expect("serialize");
    assert!(text.ends_with('\n'));

    let result = Validator::default().validate_str(&text);
    assert!(result.valid, "errors: {:?}", result.errors);
    let parsed = result.document.expect("typed document");
    assert_eq!(canonical::serialize(&parsed).expect("serialize"), text);
}

#[test]
fn test_validator_reports_every_problem() {
    let mut value = landing_page().to_value().expect("value");
    value["artboards"][0]["children"][0]["frame"]["width"] = json!(-1);
    value["artboards"][0]["children"][1]["type"] = json!("sticker");

    let result = Validator::default().validate_value(&value);
    assert!(!result.valid);
    assert!(result.document.is_none());
    assert!(result.errors.len() >= 2);
}

// ============================================================================
// Hit Testing Tests
// ============================================================================

#[test]
fn test_hit_test_finds_innermost_node() {
    let doc = landing_page();
    let options = HitTestOptions::default();

    let hit = hit_test(&doc, Point::new(100.0, 100.0), &options).expect("hit");
    assert_eq!(hit.node.name(), "Title");
    assert_eq!(hit.path, TITLE);
    assert_eq!(hit.depth, 1);

    assert!(hit_test(&doc, Point::new(-10.0, -10.0), &options).is_none());
}

#[test]
fn test_rect_in_gap_hits_nothing() {
    let doc = landing_page();
    let hits = hit_test_rect(&doc, Rect::new(0.0, 500.0, 10.0, 10.0), &HitTestOptions::default());
    assert!(hits.is_empty());
}

// ============================================================================
// Patch and History Tests
// ============================================================================

#[test]
fn test_append_then_reverse_restores_document() {
    let doc = landing_page();
    let badge = serde_json::to_value(Node::vector("Badge", Rect::new(0.0, 0.0, 8.0, 8.0), "M0 0"))
        .expect("node");

    let outcome =
        apply_patches_with_reverse(&doc, &[Patch::add("/artboards/0/children/-", badge)])
            .expect("apply");
    assert_eq!(
        outcome.reverse_patches,
        vec![Patch::remove("/artboards/0/children/2")]
    );

    let restored = apply_patches(&outcome.document, &outcome.reverse_patches).expect("reverse");
    assert!(would_be_identical(&restored, &doc));
}

#[test]
fn test_failed_sequence_leaves_input_untouched() {
    let doc = landing_page();
    let before = canonical::serialize(&doc).expect("serialize");
    let result = apply_patches(
        &doc,
        &[
            Patch::replace(format!("{TITLE}/text"), json!("Changed")),
            Patch::test(format!("{TITLE}/text"), json!("Welcome")),
        ],
    );
    assert!(result.is_err());
    assert_eq!(canonical::serialize(&doc).expect("serialize"), before);
}

#[test]
fn test_history_walks_back_and_forth() {
    let mut history = History::new();
    let doc = landing_page();
    let renamed = history
        .apply(&doc, &[Patch::replace("/name", json!("Home"))])
        .expect("apply");
    let moved = history
        .apply(&renamed, &[Patch::replace(format!("{TITLE}/frame/x"), json!(64))])
        .expect("apply");

    let back = history.undo(&moved).expect("entry").expect("undo");
    let back = history.undo(&back).expect("entry").expect("undo");
    assert!(would_be_identical(&back, &doc));
    assert!(!history.can_undo());

    let forward = history.redo(&back).expect("entry").expect("redo");
    assert_eq!(forward.name, "Home");
}

#[test]
fn test_history_refuses_edits_the_model_cannot_hold() {
    let mut history = History::new();
    let doc = landing_page();
    let err = history
        .apply(&doc, &[Patch::add("/artboards/0/children/0/colour", json!("red"))])
        .expect_err("unknown key");
    assert!(matches!(err, PatchError::InvalidResult { .. }));
    assert!(!history.can_undo());

    let edited = history
        .apply(&doc, &[Patch::add("/artboards/0/children/0/semanticKey", json!("hero"))])
        .expect("known key");
    let back = history.undo(&edited).expect("entry").expect("undo");
    assert!(would_be_identical(&back, &doc));
}

// ============================================================================
// Diff and Merge Tests
// ============================================================================

#[test]
fn test_diff_reports_field_and_structure_changes() {
    let doc = landing_page();
    let edited = apply_patches(
        &doc,
        &[
            Patch::replace(format!("{TITLE}/frame/x"), json!(48)),
            Patch::remove("/artboards/0/children/1"),
        ],
    )
    .expect("apply");

    let result = diff_documents(&doc, &edited, &DiffOptions::default());
    assert_eq!(result.summary.total, 2);
    assert!(result
        .operations
        .iter()
        .any(|op| op.kind == DiffKind::Remove && op.node_id == Id::from_u128(4)));
    assert!(result
        .operations
        .iter()
        .any(|op| op.kind == DiffKind::Modify && op.field.as_deref() == Some("/frame/x")));
}

#[test]
fn test_concurrent_geometry_edits_conflict() {
    let base = landing_page();
    let local =
        apply_patches(&base, &[Patch::replace(format!("{TITLE}/frame/x"), json!(10))]).expect("l");
    let remote =
        apply_patches(&base, &[Patch::replace(format!("{TITLE}/frame/x"), json!(20))]).expect("r");

    let pipeline = ResolverPipeline::new().with(PreferLocalResolver);
    let outcome = merge_documents(&base, &local, &remote, &MergeOptions::default(), &pipeline)
        .expect("merge");

    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = &outcome.conflicts[0];
    assert_eq!(conflict.category, FieldCategory::Property);
    assert_eq!(conflict.code, "P-GEOMETRY");
    assert_eq!(conflict.severity, Severity::Warning);

    let resolution = &outcome.resolutions[0];
    assert_eq!(resolution.resolved_value, Some(json!(10)));
    assert!(resolution.applied);
    assert!(!resolution.requires_review);
    assert_eq!(
        value_at(&outcome.document, &format!("{TITLE}/frame/x"))
            .expect("x")
            .as_f64(),
        Some(10.0)
    );
}

#[test]
fn test_merge_combines_independent_edits() {
    let base = landing_page();
    let local = apply_patches(&base, &[Patch::replace(format!("{TITLE}/text"), json!("Hi"))])
        .expect("local");
    let remote = apply_patches(&base, &[Patch::remove("/artboards/0/children/1")]).expect("remote");

    let pipeline = ResolverPipeline::new().with(AutoResolver).with(ManualResolver);
    let outcome = merge_documents(&base, &local, &remote, &MergeOptions::default(), &pipeline)
        .expect("merge");

    assert!(outcome.conflicts.is_empty());
    assert!(!outcome.needs_review());
    assert_eq!(
        value_at(&outcome.document, &format!("{TITLE}/text")).expect("text"),
        json!("Hi")
    );
    assert!(outcome.document.find_node(Id::from_u128(4)).is_none());
}

#[test]
fn test_merge_flags_content_added_under_a_deleted_frame() {
    let base = landing_page();
    let note = serde_json::to_value(
        Node::text("Note", Rect::new(0.0, 540.0, 200.0, 20.0), "Contact us").with_id(Id::from_u128(9)),
    )
    .expect("node");
    let local = apply_patches(&base, &[Patch::remove("/artboards/0/children/1")]).expect("local");
    let remote = apply_patches(&base, &[Patch::add("/artboards/0/children/1/children/-", note)])
        .expect("remote");

    let pipeline = ResolverPipeline::new().with(AutoResolver).with(ManualResolver);
    for (ours, theirs) in [(&local, &remote), (&remote, &local)] {
        let outcome = merge_documents(&base, ours, theirs, &MergeOptions::default(), &pipeline)
            .expect("merge");
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].code, "S-DEL-MOD");
        assert!(outcome.needs_review());
    }
}
