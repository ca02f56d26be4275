//! Building the merged document.
//!
//! Starts from a copy of `local` and replays, in this order:
//!
//! 1. deletions only `remote` made,
//! 2. moves only `remote` made,
//! 3. additions only `remote` made,
//! 4. field changes only `remote` made,
//! 5. every applied resolution.
//!
//! A step that cannot be replayed on the merged tree (missing parent, last
//! artboard, subtree still in use locally) is skipped with a warning and
//! the local state is kept.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::detector::{fields_edited, ConflictDetectionOptions, ConflictDetector, Side, ThreeWay};
use super::resolver::ResolverPipeline;
use super::{Conflict, MergeContext, MergeError, MergeResolution};
use crate::canonical::values_identical;
use crate::patch::{field_segments, set_in_object};
use crate::tree::{field_value, Placement};
use crate::{Artboard, CanvasDocument, Id, Node};

/// Merge configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeOptions {
    /// Which conflicts are detected.
    pub detection: ConflictDetectionOptions,
}

impl MergeOptions {
    /// Set detection options.
    #[must_use]
    pub const fn with_detection(mut self, detection: ConflictDetectionOptions) -> Self {
        self.detection = detection;
        self
    }
}

/// Result of a three-way merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    /// The merged document.
    pub document: CanvasDocument,
    /// Every detected conflict.
    pub conflicts: Vec<Conflict>,
    /// Resolutions produced by the pipeline.
    pub resolutions: Vec<MergeResolution>,
    /// Conflicts no resolver accepted.
    pub unresolved: Vec<Conflict>,
}

impl MergeOutcome {
    /// Whether a human should look at the result.
    #[must_use]
    pub fn needs_review(&self) -> bool {
        !self.unresolved.is_empty() || self.resolutions.iter().any(|r| r.requires_review)
    }
}

/// Merge `local` and `remote` against their common ancestor `base`.
///
/// # Errors
///
/// Returns [`MergeError::InvalidResolution`] when a resolver produced a value
/// that is not a valid field, node or artboard.
pub fn merge_documents(
    base: &CanvasDocument,
    local: &CanvasDocument,
    remote: &CanvasDocument,
    options: &MergeOptions,
    pipeline: &ResolverPipeline,
) -> Result<MergeOutcome, MergeError> {
    let views = ThreeWay::build(base, local, remote);
    let conflicts = ConflictDetector::new(options.detection).detect_in(&views);
    let context = MergeContext::new(base, local, remote);
    let (mut resolutions, unresolved) = pipeline.resolve_all(&conflicts, &context);

    let mut merger = Merger {
        views: &views,
        merged: local.clone(),
    };
    merger.remote_deletions();
    merger.remote_moves();
    merger.remote_additions();
    merger.remote_field_changes();

    // Tree-shape resolutions first so field resolutions land on the final node.
    resolutions.sort_by_key(|r| r.conflict.is_field_conflict());
    for resolution in resolutions.iter_mut().filter(|r| r.applied) {
        if let Err(reason) = merger.apply(resolution)? {
            tracing::warn!(conflict = %resolution.conflict.id, %reason, "resolution not applied");
            resolution.applied = false;
            resolution.requires_review = true;
            resolution.explanation = format!("{}; not applied: {reason}", resolution.explanation);
        }
    }

    tracing::debug!(
        conflicts = conflicts.len(),
        resolutions = resolutions.len(),
        unresolved = unresolved.len(),
        "merged documents"
    );
    Ok(MergeOutcome {
        document: merger.merged,
        conflicts,
        resolutions,
        unresolved,
    })
}

/// Outcome of a single edit on the merged tree: `Err` means skipped.
type Step = Result<(), String>;

struct Merger<'v, 'a> {
    views: &'v ThreeWay<'a>,
    merged: CanvasDocument,
}

impl Merger<'_, '_> {
    fn remote_deletions(&mut self) {
        let views = self.views;
        for &id in views.base.ids() {
            if views.remote.contains(id) || !views.local.contains(id) {
                continue;
            }
            // Keep the subtree if anything in it is still used locally.
            let kept = views.local.subtree(id).into_iter().find(|&member| {
                match (views.base.get(member), views.local.get(member)) {
                    (Some(base), Some(local)) => {
                        views.remote.contains(member) || views.modified(Side::Local, base, local)
                    }
                    _ => true,
                }
            });
            if let Some(member) = kept {
                tracing::warn!(%id, %member, "remote deletion skipped, subtree changed locally");
                continue;
            }
            if let Err(reason) = self.remove(id) {
                tracing::warn!(%id, %reason, "remote deletion skipped");
            }
        }
    }

    fn remote_moves(&mut self) {
        let views = self.views;
        for &id in views.remote.ids() {
            let Some(target) = views.remote_moves.get(&id) else {
                continue;
            };
            if views.local_moves.contains_key(&id) || !views.local.contains(id) {
                continue;
            }
            let step = serde_json::from_value::<Placement>(target.clone())
                .map_err(|e| e.to_string())
                .and_then(|placement| self.relocate(id, placement));
            if let Err(reason) = step {
                tracing::warn!(%id, %reason, "remote move skipped");
            }
        }
    }

    fn remote_additions(&mut self) {
        let views = self.views;
        for &id in views.remote.ids() {
            if views.base.contains(id) || views.local.contains(id) {
                continue;
            }
            let Some(entry) = views.remote.get(id) else {
                continue;
            };
            let parent = entry.placement.parent;
            if parent.is_some_and(|p| !views.base.contains(p) && !views.local.contains(p)) {
                // Inserted together with its added parent.
                continue;
            }
            if let Err(reason) = self.insert(parent, entry.placement.index, entry.item.to_value()) {
                tracing::warn!(%id, %reason, "remote addition skipped");
            }
        }
    }

    fn remote_field_changes(&mut self) {
        let views = self.views;
        for &id in views.base.ids() {
            let (Some(base), Some(local), Some(remote)) =
                (views.base.get(id), views.local.get(id), views.remote.get(id))
            else {
                continue;
            };
            let (bv, lv, rv) = (
                base.item.own_value(),
                local.item.own_value(),
                remote.item.own_value(),
            );
            let changed = |pointer: &str| {
                let b = field_value(&bv, pointer);
                values_identical(&field_value(&lv, pointer), &b)
                    && !values_identical(&field_value(&rv, pointer), &b)
            };

            let (kb, kl, kr) = (
                field_value(&bv, "/type"),
                field_value(&lv, "/type"),
                field_value(&rv, "/type"),
            );
            if !base.item.is_artboard() && !values_identical(&kl, &kr) {
                // A remote kind change merges only when the node is otherwise
                // untouched locally; any other divergence waits for S-TYPE.
                if values_identical(&kl, &kb) && !fields_edited(base, &bv, &lv) {
                    if let Err(reason) = self.replace_own(id, &rv) {
                        tracing::warn!(%id, %reason, "remote kind change skipped");
                    }
                } else if !values_identical(&kr, &kb) || fields_edited(base, &bv, &rv) {
                    tracing::debug!(%id, "node kind diverged, kept local node");
                }
                continue;
            }
            let updates: Vec<(&str, Value)> = base
                .item
                .fields()
                .iter()
                .filter(|spec| changed(spec.pointer))
                .map(|spec| (spec.pointer, field_value(&rv, spec.pointer)))
                .collect();
            if updates.is_empty() {
                continue;
            }
            let step = self.edit(id, |object| {
                for (pointer, value) in updates {
                    let value = (!value.is_null()).then_some(value);
                    set_in_object(object, &field_segments(pointer), value);
                }
            });
            if let Err(reason) = step {
                tracing::warn!(%id, %reason, "remote field changes skipped");
            }
        }
    }

    /// Write one resolution. The outer error aborts the merge, the inner
    /// one marks the resolution as not applied.
    fn apply(&mut self, resolution: &MergeResolution) -> Result<Step, MergeError> {
        let conflict = &resolution.conflict;
        let id = conflict.node_id;
        let invalid = |reason: String| MergeError::InvalidResolution {
            conflict_id: conflict.id.clone(),
            reason,
        };
        let value = resolution.resolved_value.clone();

        let step = match conflict.code.as_str() {
            "S-DEL-MOD" | "S-ADD-ADD" => match value {
                None if self.merged.contains(id) => self.remove(id),
                None => Ok(()),
                Some(value) if self.merged.contains(id) => {
                    self.replace(id, value).map_err(invalid)?;
                    Ok(())
                }
                Some(value) => {
                    let Some(placement) = self.views.remote.get(id).map(|e| e.placement) else {
                        return Ok(Err("no placement for re-inserted item".to_string()));
                    };
                    self.insert(placement.parent, placement.index, value)
                }
            },
            "S-MOVE-MOVE" => {
                let Some(value) = value else {
                    return Ok(Err("no placement".to_string()));
                };
                let placement: Placement =
                    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
                self.relocate(id, placement)
            }
            "S-TYPE" => {
                let Some(value) = value else {
                    return Ok(Err("no node".to_string()));
                };
                self.replace_own(id, &value).map_err(invalid)?;
                Ok(())
            }
            _ => {
                let Some(field) = conflict.field.as_deref() else {
                    return Ok(Err("field conflict without field".to_string()));
                };
                let value = value.filter(|v| !v.is_null());
                let segments = field_segments(field);
                self.edit(id, |object| {
                    set_in_object(object, &segments, value);
                })
                .map_err(invalid)?;
                Ok(())
            }
        };
        Ok(step)
    }

    // ── Tree edits on the merged document ─────────────────────────────────

    fn artboard_position(&self, id: Id) -> Option<usize> {
        self.merged.artboards().iter().position(|a| a.id == id)
    }

    fn can_own_children(&self, parent: Id) -> bool {
        self.artboard_position(parent).is_some()
            || self
                .merged
                .find_node(parent)
                .is_some_and(|n| n.kind().is_container())
    }

    fn remove(&mut self, id: Id) -> Step {
        if self.artboard_position(id).is_some() {
            self.merged.remove_artboard(id).map_err(|e| e.to_string())?;
            return Ok(());
        }
        self.merged
            .remove_node(id)
            .map(|_| ())
            .ok_or_else(|| format!("{id} not in merged document"))
    }

    fn insert(&mut self, parent: Option<Id>, index: usize, value: Value) -> Step {
        match parent {
            None => {
                let artboard: Artboard = serde_json::from_value(value).map_err(|e| e.to_string())?;
                self.merged.insert_artboard(index, artboard);
                Ok(())
            }
            Some(parent) => {
                if !self.can_own_children(parent) {
                    return Err(format!("parent {parent} missing or cannot own children"));
                }
                let node: Node = serde_json::from_value(value).map_err(|e| e.to_string())?;
                self.merged
                    .insert_node(parent, index, node)
                    .map_err(|e| e.to_string())
            }
        }
    }

    fn relocate(&mut self, id: Id, placement: Placement) -> Step {
        match placement.parent {
            None => {
                let (_, artboard) = self.merged.remove_artboard(id).map_err(|e| e.to_string())?;
                self.merged.insert_artboard(placement.index, artboard);
                Ok(())
            }
            Some(parent) => {
                let node = self
                    .merged
                    .find_node(id)
                    .ok_or_else(|| format!("{id} not in merged document"))?;
                if parent == id || subtree_contains(node, parent) {
                    return Err(format!("cannot move {id} into its own subtree"));
                }
                if !self.can_own_children(parent) {
                    return Err(format!("parent {parent} missing or cannot own children"));
                }
                let (_, _, node) = self
                    .merged
                    .remove_node(id)
                    .ok_or_else(|| format!("{id} not in merged document"))?;
                self.merged
                    .insert_node(parent, placement.index, node)
                    .map_err(|e| e.to_string())
            }
        }
    }

    /// Edit an item's JSON in place and read it back.
    fn edit(&mut self, id: Id, f: impl FnOnce(&mut Map<String, Value>)) -> Step {
        if let Some(index) = self.artboard_position(id) {
            let artboard = self
                .merged
                .artboard_mut(index)
                .ok_or_else(|| format!("artboard {id} vanished"))?;
            let mut value = serde_json::to_value(&*artboard).map_err(|e| e.to_string())?;
            if let Value::Object(object) = &mut value {
                f(object);
            }
            *artboard = serde_json::from_value(value).map_err(|e| e.to_string())?;
            return Ok(());
        }
        let node = self
            .merged
            .find_node_mut(id)
            .ok_or_else(|| format!("{id} not in merged document"))?;
        let mut value = serde_json::to_value(&*node).map_err(|e| e.to_string())?;
        if let Value::Object(object) = &mut value {
            f(object);
        }
        *node = serde_json::from_value(value).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Replace an item, children included.
    fn replace(&mut self, id: Id, value: Value) -> Step {
        self.edit(id, |object| {
            if let Value::Object(replacement) = value {
                *object = replacement;
            }
        })
    }

    /// Replace an item's own fields, keeping its merged children when the
    /// new kind can own them.
    fn replace_own(&mut self, id: Id, own: &Value) -> Step {
        let Value::Object(own) = own else {
            return Err("replacement is not an object".to_string());
        };
        let container = own
            .get("type")
            .and_then(Value::as_str)
            .and_then(crate::NodeKind::from_tag)
            .is_some_and(|kind| kind.is_container());
        self.edit(id, |object| {
            let children = object.remove("children");
            *object = own.clone();
            object.remove("children");
            if container {
                object.insert("children".to_string(), children.unwrap_or(Value::Array(Vec::new())));
            }
        })
    }
}

fn subtree_contains(node: &Node, id: Id) -> bool {
    node.children()
        .iter()
        .any(|child| child.id() == id || subtree_contains(child, id))
}
