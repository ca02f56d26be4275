//! Conflict detection over `{base, local, remote}`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Conflict, ConflictCategory, ResolutionStrategy, Severity};
use crate::canonical::values_identical;
use crate::diff::{diff_documents, DiffKind, DiffOptions};
use crate::tree::{field_value, FieldCategory, IndexEntry, NodeIndex};
use crate::{CanvasDocument, Id};

/// Which conflict categories are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConflictDetectionOptions {
    /// Deletions, moves, duplicate additions and kind changes.
    pub structural: bool,
    /// Property fields.
    pub property: bool,
    /// Content fields.
    pub content: bool,
    /// Metadata fields.
    pub metadata: bool,
}

impl Default for ConflictDetectionOptions {
    fn default() -> Self {
        Self {
            structural: true,
            property: true,
            content: true,
            metadata: true,
        }
    }
}

impl ConflictDetectionOptions {
    /// Enable or disable a category.
    #[must_use]
    pub const fn with_category(mut self, category: ConflictCategory, enabled: bool) -> Self {
        match category {
            FieldCategory::Structural => self.structural = enabled,
            FieldCategory::Property => self.property = enabled,
            FieldCategory::Content => self.content = enabled,
            FieldCategory::Metadata => self.metadata = enabled,
        }
        self
    }

    const fn includes(&self, category: ConflictCategory) -> bool {
        match category {
            FieldCategory::Structural => self.structural,
            FieldCategory::Property => self.property,
            FieldCategory::Content => self.content,
            FieldCategory::Metadata => self.metadata,
        }
    }
}

/// Finds overlapping edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    options: ConflictDetectionOptions,
}

impl ConflictDetector {
    /// Create a detector.
    #[must_use]
    pub const fn new(options: ConflictDetectionOptions) -> Self {
        Self { options }
    }

    /// Active options.
    #[must_use]
    pub const fn options(&self) -> &ConflictDetectionOptions {
        &self.options
    }

    /// Report conflicts in `base` document order, then additions by id.
    #[must_use]
    pub fn detect(
        &self,
        base: &CanvasDocument,
        local: &CanvasDocument,
        remote: &CanvasDocument,
    ) -> Vec<Conflict> {
        let views = ThreeWay::build(base, local, remote);
        self.detect_in(&views)
    }

    pub(super) fn detect_in(&self, views: &ThreeWay<'_>) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for &id in views.base.ids() {
            let Some(base) = views.base.get(id) else {
                continue;
            };
            match (views.local.get(id), views.remote.get(id)) {
                (None, None) => {}
                (None, Some(remote)) => {
                    if self.options.structural && views.modified(Side::Remote, base, remote) {
                        conflicts.push(deleted_modified(base, None, Some(remote), "locally"));
                    }
                }
                (Some(local), None) => {
                    if self.options.structural && views.modified(Side::Local, base, local) {
                        conflicts.push(deleted_modified(base, Some(local), None, "remotely"));
                    }
                }
                (Some(local), Some(remote)) => {
                    self.both_present(views, base, local, remote, &mut conflicts);
                }
            }
        }

        if self.options.structural {
            let mut added: Vec<Id> = views
                .local
                .ids()
                .iter()
                .copied()
                .filter(|id| !views.base.contains(*id) && views.remote.contains(*id))
                .collect();
            added.sort_unstable();
            added.dedup();
            for id in added {
                let (Some(local), Some(remote)) = (views.local.get(id), views.remote.get(id)) else {
                    continue;
                };
                let (lv, rv) = (local.item.to_value(), remote.item.to_value());
                let same_place = local.placement == remote.placement;
                if values_identical(&lv, &rv) && same_place {
                    continue;
                }
                conflicts.push(build(
                    "S-ADD-ADD",
                    ConflictCategory::Structural,
                    local,
                    None,
                    Values {
                        base: None,
                        local: Some(lv),
                        remote: Some(rv),
                    },
                    format!("{id} was added on both sides with different content"),
                ));
            }
        }

        tracing::debug!(conflicts = conflicts.len(), "detected merge conflicts");
        conflicts
    }

    fn both_present(
        &self,
        views: &ThreeWay<'_>,
        base: &IndexEntry<'_>,
        local: &IndexEntry<'_>,
        remote: &IndexEntry<'_>,
        out: &mut Vec<Conflict>,
    ) {
        let id = base.item.id();
        if self.options.structural {
            if let (Some(to_local), Some(to_remote)) =
                (views.local_moves.get(&id), views.remote_moves.get(&id))
            {
                if !values_identical(to_local, to_remote) {
                    out.push(build(
                        "S-MOVE-MOVE",
                        ConflictCategory::Structural,
                        base,
                        None,
                        Values {
                            base: Some(base.placement.to_value()),
                            local: Some(to_local.clone()),
                            remote: Some(to_remote.clone()),
                        },
                        format!("{id} was moved to different places on each side"),
                    ));
                }
            }
        }

        let (bv, lv, rv) = (
            base.item.own_value(),
            local.item.own_value(),
            remote.item.own_value(),
        );
        if self.options.structural && kind_conflict(base, &bv, &lv, &rv) {
            let (l, r) = (field_value(&lv, "/type"), field_value(&rv, "/type"));
            out.push(build(
                "S-TYPE",
                ConflictCategory::Structural,
                base,
                Some("/type"),
                Values {
                    base: Some(bv.clone()),
                    local: Some(lv.clone()),
                    remote: Some(rv.clone()),
                },
                format!("{id} changed kind to {l} locally and {r} remotely"),
            ));
            return;
        }
        for spec in base.item.fields() {
            if spec.pointer == "/type" {
                continue;
            }
            if !self.options.includes(spec.category) {
                continue;
            }
            let b = field_value(&bv, spec.pointer);
            let l = field_value(&lv, spec.pointer);
            let r = field_value(&rv, spec.pointer);
            if values_identical(&l, &b) || values_identical(&r, &b) || values_identical(&l, &r) {
                continue;
            }
            out.push(build(
                spec.code,
                spec.category,
                base,
                Some(spec.pointer),
                Values {
                    base: Some(b),
                    local: Some(l),
                    remote: Some(r),
                },
                format!("{} of {id} changed differently on each side", spec.pointer),
            ));
        }
    }
}

/// The node's kind diverged: both sides picked different kinds, or one side
/// changed the kind while the other edited its fields.
fn kind_conflict(base: &IndexEntry<'_>, bv: &Value, lv: &Value, rv: &Value) -> bool {
    if base.item.is_artboard() {
        return false;
    }
    let b = field_value(bv, "/type");
    let (l, r) = (field_value(lv, "/type"), field_value(rv, "/type"));
    match (values_identical(&l, &b), values_identical(&r, &b)) {
        (true, true) => false,
        (false, false) => !values_identical(&l, &r),
        (true, false) => fields_edited(base, bv, lv),
        (false, true) => fields_edited(base, bv, rv),
    }
}

/// Whether `side` changed any catalogued field of `base` other than its kind.
pub(super) fn fields_edited(base: &IndexEntry<'_>, bv: &Value, side: &Value) -> bool {
    base.item
        .fields()
        .iter()
        .filter(|spec| spec.pointer != "/type")
        .any(|spec| !values_identical(&field_value(bv, spec.pointer), &field_value(side, spec.pointer)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    Local,
    Remote,
}

/// Indices of the three documents plus each side's moves.
pub(super) struct ThreeWay<'a> {
    pub(super) base: NodeIndex<'a>,
    pub(super) local: NodeIndex<'a>,
    pub(super) remote: NodeIndex<'a>,
    /// New `{parent, index}` per moved id.
    pub(super) local_moves: HashMap<Id, Value>,
    pub(super) remote_moves: HashMap<Id, Value>,
}

impl<'a> ThreeWay<'a> {
    pub(super) fn build(
        base: &'a CanvasDocument,
        local: &'a CanvasDocument,
        remote: &'a CanvasDocument,
    ) -> Self {
        Self {
            base: NodeIndex::build(base),
            local: NodeIndex::build(local),
            remote: NodeIndex::build(remote),
            local_moves: moves(base, local),
            remote_moves: moves(base, remote),
        }
    }

    pub(super) fn moves_of(&self, side: Side) -> &HashMap<Id, Value> {
        match side {
            Side::Local => &self.local_moves,
            Side::Remote => &self.remote_moves,
        }
    }

    pub(super) const fn index_of(&self, side: Side) -> &NodeIndex<'a> {
        match side {
            Side::Local => &self.local,
            Side::Remote => &self.remote,
        }
    }

    /// Whether `side` moved the item, added a child to it or changed any
    /// catalogued field.
    pub(super) fn modified(&self, side: Side, base: &IndexEntry<'_>, other: &IndexEntry<'_>) -> bool {
        let id = base.item.id();
        if self.moves_of(side).contains_key(&id) {
            return true;
        }
        let gained_child = self
            .index_of(side)
            .children(Some(id))
            .iter()
            .any(|child| !self.base.contains(*child));
        if gained_child {
            return true;
        }
        let (bv, ov) = (base.item.own_value(), other.item.own_value());
        base.item.fields().iter().any(|spec| {
            !values_identical(&field_value(&bv, spec.pointer), &field_value(&ov, spec.pointer))
        })
    }
}

fn moves(base: &CanvasDocument, side: &CanvasDocument) -> HashMap<Id, Value> {
    let options = DiffOptions {
        include_property: false,
        include_content: false,
        include_metadata: false,
        match_semantic_keys: false,
        ..DiffOptions::default()
    };
    diff_documents(base, side, &options)
        .operations
        .into_iter()
        .filter(|op| op.kind == DiffKind::Move)
        .filter_map(|op| op.new_value.map(|placement| (op.node_id, placement)))
        .collect()
}

struct Values {
    base: Option<Value>,
    local: Option<Value>,
    remote: Option<Value>,
}

fn deleted_modified(
    base: &IndexEntry<'_>,
    local: Option<&IndexEntry<'_>>,
    remote: Option<&IndexEntry<'_>>,
    deleter: &str,
) -> Conflict {
    let id = base.item.id();
    build(
        "S-DEL-MOD",
        ConflictCategory::Structural,
        base,
        None,
        Values {
            base: Some(base.item.to_value()),
            local: local.map(|e| e.item.to_value()),
            remote: remote.map(|e| e.item.to_value()),
        },
        format!("{id} was deleted {deleter} and modified on the other side"),
    )
}

/// Severity, auto-resolvability and suggested strategy per category/code.
fn classify(category: ConflictCategory, code: &str) -> (Severity, bool, ResolutionStrategy) {
    match category {
        FieldCategory::Structural => (Severity::Error, false, ResolutionStrategy::Manual),
        FieldCategory::Property if code == "P-GEOMETRY" => {
            (Severity::Warning, true, ResolutionStrategy::Average)
        }
        FieldCategory::Property | FieldCategory::Content => {
            (Severity::Warning, false, ResolutionStrategy::Manual)
        }
        FieldCategory::Metadata => (Severity::Info, true, ResolutionStrategy::PreferLocal),
    }
}

fn build(
    code: &str,
    category: ConflictCategory,
    entry: &IndexEntry<'_>,
    field: Option<&str>,
    values: Values,
    message: String,
) -> Conflict {
    let (severity, auto_resolvable, strategy) = classify(category, code);
    let node_id = entry.item.id();
    let path = format!("{}{}", entry.path, field.unwrap_or_default());
    Conflict {
        id: format!("{code}:{node_id}{}", field.unwrap_or_default()),
        category,
        code: code.to_string(),
        severity,
        path,
        node_id,
        field: field.map(str::to_string),
        auto_resolvable,
        resolution_strategy: Some(strategy),
        base_value: values.base,
        local_value: values.local,
        remote_value: values.remote,
        message,
    }
}
