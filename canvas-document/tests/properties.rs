//! Property tests for the codec, patches and hit testing.

use canvas_document::canonical::{self, would_be_identical};
use canvas_document::{
    apply_patches, apply_patches_with_reverse, hit_test, merge_documents, Artboard,
    CanvasDocument, ConflictDetector, HitTestOptions, Id, MergeOptions, Node, Patch, PatchError,
    Point, Rect, ResolverPipeline,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn sample() -> CanvasDocument {
    let label = Node::text("Label", Rect::new(20.0, 20.0, 200.0, 40.0), "Buy")
        .with_id(Id::from_u128(3));
    let card = Node::frame("Card", Rect::new(0.0, 0.0, 400.0, 300.0))
        .with_id(Id::from_u128(2))
        .with_children([label]);
    let icon = Node::vector("Icon", Rect::new(500.0, 500.0, 32.0, 32.0), "M0 0L1 1")
        .with_id(Id::from_u128(4));
    let artboard = Artboard::new("Phone", Rect::new(0.0, 0.0, 800.0, 800.0))
        .with_id(Id::from_u128(1))
        .with_children([card, icon]);
    CanvasDocument::with_id(Id::from_u128(100), "Sample", vec![artboard]).expect("document")
}

fn object_text(entries: &[(String, i64)]) -> String {
    let body: Vec<String> = entries
        .iter()
        .map(|(key, value)| format!("{}:{value}", Value::String(key.clone())))
        .collect();
    format!("{{{}}}", body.join(","))
}

/// One edit against [`sample`]. Writes to arbitrary keys may be refused.
fn edit() -> impl Strategy<Value = Patch> {
    prop_oneof![
        "[a-zA-Z ]{0,12}".prop_map(|name| Patch::replace("/name", json!(name))),
        (-500i32..500).prop_map(|x| Patch::replace("/artboards/0/children/0/frame/x", json!(x))),
        any::<bool>().prop_map(|v| Patch::replace("/artboards/0/children/1/visible", json!(v))),
        "[a-z]{1,8}".prop_map(|text| {
            Patch::replace("/artboards/0/children/0/children/0/text", json!(text))
        }),
        Just(Patch::copy_to("/artboards/0/children/1/name", "/name")),
        "[a-z]{1,6}".prop_map(|key| {
            Patch::add("/artboards/0/children/0/children/0/semanticKey", json!(key))
        }),
        ("[a-z]{1,8}", "[a-z0-9 ]{0,6}").prop_map(|(key, value)| {
            Patch::add(format!("/artboards/0/children/1/{key}"), json!(value))
        }),
    ]
}

/// One collaborator's edit, drawn from a small domain so both sides collide.
fn side_edit() -> impl Strategy<Value = Vec<Patch>> {
    prop_oneof![
        prop::sample::select(vec!["A", "B"])
            .prop_map(|name| vec![Patch::replace("/artboards/0/children/0/name", json!(name))]),
        prop::sample::select(vec![0, 10, 20])
            .prop_map(|x| vec![Patch::replace("/artboards/0/children/0/frame/x", json!(x))]),
        prop::sample::select(vec!["a", "b"]).prop_map(|text| {
            vec![Patch::replace("/artboards/0/children/0/children/0/text", json!(text))]
        }),
        Just(vec![Patch::replace("/artboards/0/children/1/visible", json!(false))]),
        Just(vec![Patch::remove("/artboards/0/children/1")]),
        Just(vec![Patch::replace("/artboards/0/children/0/type", json!("group"))]),
    ]
}

/// Apply each edit that still fits the document.
fn collaborate(edits: &[Vec<Patch>]) -> CanvasDocument {
    edits.iter().fold(sample(), |doc, patches| {
        apply_patches(&doc, patches).unwrap_or(doc)
    })
}

proptest! {
    #[test]
    fn prop_canonical_form_ignores_key_order(
        entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8)
    ) {
        let forward: Vec<(String, i64)> = entries.into_iter().collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a: Value = serde_json::from_str(&object_text(&forward)).expect("json");
        let b: Value = serde_json::from_str(&object_text(&backward)).expect("json");
        prop_assert_eq!(
            canonical::serialize_value(&a).expect("serialize"),
            canonical::serialize_value(&b).expect("serialize")
        );
    }

    #[test]
    fn prop_reverse_patches_restore_document(edits in proptest::collection::vec(edit(), 1..6)) {
        let doc = sample();
        match apply_patches_with_reverse(&doc, &edits) {
            Ok(outcome) => {
                let restored =
                    apply_patches(&outcome.document, &outcome.reverse_patches).expect("undo");
                prop_assert!(would_be_identical(&restored, &doc));
            }
            Err(err) => prop_assert!(matches!(err, PatchError::InvalidResult { .. }), "{}", err),
        }
    }

    #[test]
    fn prop_merge_is_symmetric(
        ours in proptest::collection::vec(side_edit(), 0..4),
        theirs in proptest::collection::vec(side_edit(), 0..4),
    ) {
        let base = sample();
        let (local, remote) = (collaborate(&ours), collaborate(&theirs));

        let detector = ConflictDetector::default();
        let forward = detector.detect(&base, &local, &remote);
        let backward = detector.detect(&base, &remote, &local);
        prop_assert_eq!(forward.len(), backward.len());
        for (f, b) in forward.iter().zip(&backward) {
            prop_assert_eq!(&f.id, &b.id);
            prop_assert_eq!(&f.local_value, &b.remote_value);
        }

        if forward.is_empty() {
            let pipeline = ResolverPipeline::new();
            let options = MergeOptions::default();
            let a = merge_documents(&base, &local, &remote, &options, &pipeline).expect("merge");
            let b = merge_documents(&base, &remote, &local, &options, &pipeline).expect("merge");
            prop_assert!(!a.needs_review());
            prop_assert!(would_be_identical(&a.document, &b.document));
        }
    }

    #[test]
    fn prop_hits_contain_the_point(x in -50.0f64..900.0, y in -50.0f64..900.0) {
        let doc = sample();
        let point = Point::new(x, y);
        if let Some(hit) = hit_test(&doc, point, &HitTestOptions::default()) {
            prop_assert!(hit.node.frame_rect().contains(point));
            prop_assert!(hit.node.is_visible());
        }
    }
}
