//! Two-way semantic diff.
//!
//! Items are matched by id, then (optionally) unmatched nodes of the same
//! kind are paired by `semanticKey`. Matched items are compared field by
//! field over the catalogue in [`crate::tree`].
//!
//! Output order:
//!
//! ```text
//! removes (from-document order)
//! then, per item of the to-document in document order:
//!     add | move? modify*
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::values_identical;
use crate::document::ParentId;
use crate::history::current_timestamp_ms;
use crate::tree::{FieldCategory, IndexEntry, Item, NodeIndex};
use crate::{CanvasDocument, Id, NodeKind};

/// What the diff compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffOptions {
    /// Report adds, removes, moves and kind changes.
    pub include_structural: bool,
    /// Report property field changes.
    pub include_property: bool,
    /// Report content field changes.
    pub include_content: bool,
    /// Report metadata field changes.
    pub include_metadata: bool,
    /// Cap on reported operations.
    pub max_operations: Option<usize>,
    /// Node kinds whose own changes are not reported.
    pub ignore_node_types: Vec<NodeKind>,
    /// Pair otherwise unmatched nodes by semantic key.
    pub match_semantic_keys: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            include_structural: true,
            include_property: true,
            include_content: true,
            include_metadata: true,
            max_operations: None,
            ignore_node_types: Vec::new(),
            match_semantic_keys: true,
        }
    }
}

impl DiffOptions {
    /// Cap the number of operations.
    #[must_use]
    pub const fn with_max_operations(mut self, max: usize) -> Self {
        self.max_operations = Some(max);
        self
    }

    /// Skip a node kind.
    #[must_use]
    pub fn with_ignored_type(mut self, kind: NodeKind) -> Self {
        self.ignore_node_types.push(kind);
        self
    }

    /// Enable or disable semantic key pairing.
    #[must_use]
    pub const fn with_semantic_keys(mut self, enabled: bool) -> Self {
        self.match_semantic_keys = enabled;
        self
    }

    /// Enable or disable a field category.
    #[must_use]
    pub const fn with_category(mut self, category: FieldCategory, enabled: bool) -> Self {
        match category {
            FieldCategory::Structural => self.include_structural = enabled,
            FieldCategory::Property => self.include_property = enabled,
            FieldCategory::Content => self.include_content = enabled,
            FieldCategory::Metadata => self.include_metadata = enabled,
        }
        self
    }

    const fn includes(&self, category: FieldCategory) -> bool {
        match category {
            FieldCategory::Structural => self.include_structural,
            FieldCategory::Property => self.include_property,
            FieldCategory::Content => self.include_content,
            FieldCategory::Metadata => self.include_metadata,
        }
    }

    fn ignores(&self, item: &Item<'_>) -> bool {
        item.as_node()
            .is_some_and(|node| self.ignore_node_types.contains(&node.kind()))
    }
}

/// Kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// Present only in the target.
    Add,
    /// Present only in the source.
    Remove,
    /// A field changed.
    Modify,
    /// Parent or sibling position changed.
    Move,
}

/// One reported change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOperation {
    /// Kind of change.
    pub kind: DiffKind,
    /// Id of the changed item (target id for paired items).
    pub node_id: Id,
    /// Pointer to the item (source path for removes, target path otherwise).
    pub path: String,
    /// Field pointer relative to the item, for modifies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Previous value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// New value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

/// Counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Adds.
    pub additions: usize,
    /// Removes.
    pub removals: usize,
    /// Field modifications.
    pub modifications: usize,
    /// Moves.
    pub moves: usize,
    /// All operations.
    pub total: usize,
}

impl DiffSummary {
    fn from_operations(operations: &[DiffOperation]) -> Self {
        let count = |kind| operations.iter().filter(|op| op.kind == kind).count();
        Self {
            additions: count(DiffKind::Add),
            removals: count(DiffKind::Remove),
            modifications: count(DiffKind::Modify),
            moves: count(DiffKind::Move),
            total: operations.len(),
        }
    }
}

/// Provenance of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffMetadata {
    /// Source document id.
    pub source_id: Id,
    /// Target document id.
    pub target_id: Id,
    /// When the diff was computed (ms since epoch).
    pub timestamp: u64,
    /// Time spent computing it.
    pub duration_ms: u64,
}

/// A computed diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    /// Operations in report order.
    pub operations: Vec<DiffOperation>,
    /// Counts of `operations`.
    pub summary: DiffSummary,
    /// Provenance.
    pub metadata: DiffMetadata,
    /// Whether `max_operations` cut the output.
    pub truncated: bool,
}

impl DiffResult {
    /// Check if no differences were reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Compare two documents.
#[must_use]
pub fn diff_documents(
    from: &CanvasDocument,
    to: &CanvasDocument,
    options: &DiffOptions,
) -> DiffResult {
    let started = Instant::now();
    let from_index = NodeIndex::build(from);
    let to_index = NodeIndex::build(to);
    let pairing = Pairing::build(&from_index, &to_index, options.match_semantic_keys);

    let mut differ = Differ {
        from: &from_index,
        to: &to_index,
        pairing: &pairing,
        options,
        positions: HashMap::new(),
        operations: Vec::new(),
    };
    differ.removals();
    differ.additions_and_changes();

    let mut operations = differ.operations;
    let truncated = options
        .max_operations
        .is_some_and(|max| operations.len() > max);
    if let Some(max) = options.max_operations {
        operations.truncate(max);
    }

    let summary = DiffSummary::from_operations(&operations);
    // Diffs never run anywhere near u64::MAX milliseconds
    #[allow(clippy::cast_possible_truncation)]
    let duration_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(
        total = summary.total,
        truncated,
        duration_ms,
        "diffed documents"
    );
    DiffResult {
        operations,
        summary,
        metadata: DiffMetadata {
            source_id: from.id,
            target_id: to.id,
            timestamp: current_timestamp_ms(),
            duration_ms,
        },
        truncated,
    }
}

/// Correspondence between source and target ids.
struct Pairing {
    to_from: HashMap<Id, Id>,
    from_to: HashMap<Id, Id>,
}

impl Pairing {
    fn build(from: &NodeIndex<'_>, to: &NodeIndex<'_>, semantic: bool) -> Self {
        let mut pairing = Self {
            to_from: HashMap::new(),
            from_to: HashMap::new(),
        };
        for &id in to.ids() {
            if from.contains(id) {
                pairing.link(id, id);
            }
        }
        if !semantic {
            return pairing;
        }

        let mut candidates: HashMap<(NodeKind, &str), VecDeque<Id>> = HashMap::new();
        for &id in from.ids() {
            if to.contains(id) {
                continue;
            }
            let Some(node) = from.get(id).and_then(|e| e.item.as_node()) else {
                continue;
            };
            if let Some(key) = node.semantic_key() {
                candidates.entry((node.kind(), key)).or_default().push_back(id);
            }
        }
        for &id in to.ids() {
            if from.contains(id) {
                continue;
            }
            let Some(node) = to.get(id).and_then(|e| e.item.as_node()) else {
                continue;
            };
            let matched = node
                .semantic_key()
                .and_then(|key| candidates.get_mut(&(node.kind(), key)))
                .and_then(VecDeque::pop_front);
            if let Some(from_id) = matched {
                tracing::trace!(from = %from_id, to = %id, "paired nodes by semantic key");
                pairing.link(from_id, id);
            }
        }
        pairing
    }

    fn link(&mut self, from: Id, to: Id) {
        self.to_from.insert(to, from);
        self.from_to.insert(from, to);
    }

    /// The target-side id of a source parent; `Some(None)` for the root.
    fn map_parent(&self, from_parent: Option<ParentId>) -> Option<Option<ParentId>> {
        match from_parent {
            None => Some(None),
            Some(parent) => self.from_to.get(&parent).map(|&p| Some(p)),
        }
    }
}

/// Positions among siblings present in both documents, per target parent.
struct CommonPositions {
    to: HashMap<Id, usize>,
    from: HashMap<Id, usize>,
}

struct Differ<'d, 'a> {
    from: &'d NodeIndex<'a>,
    to: &'d NodeIndex<'a>,
    pairing: &'d Pairing,
    options: &'d DiffOptions,
    positions: HashMap<Option<ParentId>, CommonPositions>,
    operations: Vec<DiffOperation>,
}

impl<'a> Differ<'_, 'a> {
    fn removals(&mut self) {
        if !self.options.include_structural {
            return;
        }
        let from = self.from;
        let mut reported: HashSet<Id> = HashSet::new();
        for &id in from.ids() {
            if self.pairing.from_to.contains_key(&id) {
                continue;
            }
            let Some(entry) = from.get(id) else {
                continue;
            };
            let covered = entry
                .placement
                .parent
                .is_some_and(|parent| reported.contains(&parent));
            if covered || self.options.ignores(&entry.item) {
                continue;
            }
            reported.insert(id);
            self.operations.push(DiffOperation {
                kind: DiffKind::Remove,
                node_id: id,
                path: entry.path.clone(),
                field: None,
                old_value: Some(entry.item.to_value()),
                new_value: None,
            });
        }
    }

    fn additions_and_changes(&mut self) {
        let (from, to, pairing) = (self.from, self.to, self.pairing);
        let mut added: HashSet<Id> = HashSet::new();
        for &id in to.ids() {
            let Some(entry) = to.get(id) else {
                continue;
            };
            let source = pairing
                .to_from
                .get(&id)
                .and_then(|from_id| from.get(*from_id));
            match source {
                None => {
                    if !self.options.include_structural {
                        continue;
                    }
                    let covered = entry
                        .placement
                        .parent
                        .is_some_and(|parent| added.contains(&parent));
                    if covered || self.options.ignores(&entry.item) {
                        continue;
                    }
                    added.insert(id);
                    self.operations.push(DiffOperation {
                        kind: DiffKind::Add,
                        node_id: id,
                        path: entry.path.clone(),
                        field: None,
                        old_value: None,
                        new_value: Some(entry.item.to_value()),
                    });
                }
                Some(source) => {
                    if self.options.ignores(&entry.item) || self.options.ignores(&source.item) {
                        continue;
                    }
                    if self.options.include_structural && self.moved(source, entry) {
                        self.operations.push(DiffOperation {
                            kind: DiffKind::Move,
                            node_id: id,
                            path: entry.path.clone(),
                            field: None,
                            old_value: Some(source.placement.to_value()),
                            new_value: Some(entry.placement.to_value()),
                        });
                    }
                    self.modifications(source, entry);
                }
            }
        }
    }

    fn modifications(&mut self, source: &IndexEntry<'a>, target: &IndexEntry<'a>) {
        let before = source.item.field_values();
        let after = target.item.field_values();
        for (spec, new_value) in after {
            if !self.options.includes(spec.category) {
                continue;
            }
            let old_value = before
                .iter()
                .find(|(s, _)| s.pointer == spec.pointer)
                .map_or(Value::Null, |(_, v)| v.clone());
            if values_identical(&old_value, &new_value) {
                continue;
            }
            self.operations.push(DiffOperation {
                kind: DiffKind::Modify,
                node_id: target.item.id(),
                path: target.path.clone(),
                field: Some(spec.pointer.to_string()),
                old_value: Some(old_value),
                new_value: Some(new_value),
            });
        }
    }

    fn moved(&mut self, source: &IndexEntry<'a>, target: &IndexEntry<'a>) -> bool {
        let to_parent = target.placement.parent;
        if self.pairing.map_parent(source.placement.parent) != Some(to_parent) {
            return true;
        }
        let (from, to, pairing) = (self.from, self.to, self.pairing);
        let source_parent = source.placement.parent;
        let positions = self
            .positions
            .entry(to_parent)
            .or_insert_with(|| common_positions(from, to, pairing, source_parent, to_parent));
        positions.to.get(&target.item.id()) != positions.from.get(&source.item.id())
    }
}

fn common_positions(
    from: &NodeIndex<'_>,
    to: &NodeIndex<'_>,
    pairing: &Pairing,
    from_parent: Option<ParentId>,
    to_parent: Option<ParentId>,
) -> CommonPositions {
    let to_common = to.children(to_parent).iter().filter(|id| {
        pairing
            .to_from
            .get(*id)
            .and_then(|f| from.get(*f))
            .is_some_and(|e| pairing.map_parent(e.placement.parent) == Some(to_parent))
    });
    let from_common = from.children(from_parent).iter().filter(|id| {
        pairing
            .from_to
            .get(*id)
            .and_then(|t| to.get(*t))
            .is_some_and(|e| e.placement.parent == to_parent)
    });
    CommonPositions {
        to: to_common.enumerate().map(|(i, id)| (*id, i)).collect(),
        from: from_common.enumerate().map(|(i, id)| (*id, i)).collect(),
    }
}
