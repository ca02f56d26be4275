//! Reversible structural edits addressed by JSON Pointers.
//!
//! ## Transactions
//!
//! ```text
//! caller's document ──clone──▶ working JSON buffer ──op 1..n──▶ typed document
//!                                     │
//!                                     └── any failure: buffer dropped, caller's
//!                                         document untouched
//! ```
//!
//! Every sequence runs against its own working buffer. Nothing is committed
//! until the last op succeeded and the buffer converted back into a valid
//! [`CanvasDocument`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::canonical::values_identical;
use crate::CanvasDocument;

/// Patch operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert or set a value.
    Add,
    /// Delete a value.
    Remove,
    /// Overwrite an existing value.
    Replace,
    /// Remove at `from`, add at `path`.
    Move,
    /// Add at `path` the value found at `from`.
    Copy,
    /// Guard: the value at `path` must equal `value`.
    Test,
}

impl PatchOp {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Test => "test",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "replace" => Some(Self::Replace),
            "move" => Some(Self::Move),
            "copy" => Some(Self::Copy),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the patch engine. Each names the op and the path.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PatchError {
    /// The op kind is not one of the six supported kinds.
    #[error("unknown patch op {op:?}")]
    UnknownOp {
        /// The op name as received.
        op: String,
    },

    /// The patch is not a JSON object or has mistyped fields.
    #[error("malformed patch: {reason}")]
    Malformed {
        /// What was wrong.
        reason: String,
    },

    /// A field the op needs is absent.
    #[error("{op} at {path:?}: missing required field '{field}'")]
    MissingField {
        /// Operation.
        op: PatchOp,
        /// Target path.
        path: String,
        /// Missing field name.
        field: &'static str,
    },

    /// A pointer does not follow the JSON Pointer grammar.
    #[error("{op}: invalid pointer {pointer:?}")]
    InvalidPointer {
        /// Operation.
        op: PatchOp,
        /// The rejected pointer.
        pointer: String,
    },

    /// A pointer segment does not resolve.
    #[error("{op}: path not found {path:?}")]
    NotFound {
        /// Operation.
        op: PatchOp,
        /// Unresolved pointer.
        path: String,
    },

    /// An array index is malformed or out of range.
    #[error("{op}: invalid array index in {path:?}")]
    InvalidIndex {
        /// Operation.
        op: PatchOp,
        /// Offending pointer.
        path: String,
    },

    /// The target cannot take this op (scalar parent, root removal, move into
    /// own descendant).
    #[error("{op}: invalid target {path:?}")]
    InvalidTarget {
        /// Operation.
        op: PatchOp,
        /// Offending pointer.
        path: String,
    },

    /// A `test` guard did not match.
    #[error("test failed at {path:?}")]
    TestFailed {
        /// Tested pointer.
        path: String,
    },

    /// A reverse patch needs the value the op overwrote or removed.
    #[error("{op} at {path:?}: reverse requires the pre-operation value")]
    MissingReverseValue {
        /// Operation.
        op: PatchOp,
        /// Target path.
        path: String,
    },

    /// The edited buffer is no longer a valid document.
    #[error("patched document is invalid: {reason}")]
    InvalidResult {
        /// Why the document was rejected.
        reason: String,
    },
}

/// A single structural edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Operation.
    pub op: PatchOp,
    /// Target pointer.
    pub path: String,
    /// Operand for `add`, `replace` and `test`. JSON `null` is a value.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    /// Source pointer for `move` and `copy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

fn present<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl Patch {
    fn new(op: PatchOp, path: impl Into<String>) -> Self {
        Self {
            op,
            path: path.into(),
            value: None,
            from: None,
        }
    }

    /// `add` patch.
    #[must_use]
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new(PatchOp::Add, path)
        }
    }

    /// `remove` patch.
    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self::new(PatchOp::Remove, path)
    }

    /// `replace` patch.
    #[must_use]
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new(PatchOp::Replace, path)
        }
    }

    /// `move` patch.
    #[must_use]
    pub fn move_to(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            ..Self::new(PatchOp::Move, path)
        }
    }

    /// `copy` patch.
    #[must_use]
    pub fn copy_to(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            ..Self::new(PatchOp::Copy, path)
        }
    }

    /// `test` patch.
    #[must_use]
    pub fn test(path: impl Into<String>, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new(PatchOp::Test, path)
        }
    }

    /// Read a patch from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::UnknownOp`] for an unsupported op,
    /// [`PatchError::MissingField`] when `path`, `value` or `from` is absent
    /// where the op needs it, and [`PatchError::Malformed`] for mistyped
    /// fields.
    pub fn from_value(value: &Value) -> Result<Self, PatchError> {
        let obj = value.as_object().ok_or_else(|| PatchError::Malformed {
            reason: "patch must be an object".to_string(),
        })?;
        let name = match obj.get("op") {
            Some(Value::String(name)) => name,
            Some(_) => {
                return Err(PatchError::Malformed {
                    reason: "op must be a string".to_string(),
                })
            }
            None => {
                return Err(PatchError::Malformed {
                    reason: "missing op".to_string(),
                })
            }
        };
        let op = PatchOp::from_name(name).ok_or_else(|| PatchError::UnknownOp { op: name.clone() })?;
        let path = match obj.get("path") {
            Some(Value::String(path)) => path.clone(),
            Some(_) => {
                return Err(PatchError::Malformed {
                    reason: format!("{op}: path must be a string"),
                })
            }
            None => {
                return Err(PatchError::MissingField {
                    op,
                    path: String::new(),
                    field: "path",
                })
            }
        };
        let from = match obj.get("from") {
            Some(Value::String(from)) => Some(from.clone()),
            Some(_) => {
                return Err(PatchError::Malformed {
                    reason: format!("{op} at {path:?}: from must be a string"),
                })
            }
            None => None,
        };
        let patch = Self {
            op,
            path,
            value: obj.get("value").cloned(),
            from,
        };
        patch.check_fields()?;
        Ok(patch)
    }

    /// Check the op has the operands it needs.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::MissingField`] naming the absent operand.
    pub fn check_fields(&self) -> Result<(), PatchError> {
        let missing = |field| PatchError::MissingField {
            op: self.op,
            path: self.path.clone(),
            field,
        };
        match self.op {
            PatchOp::Add | PatchOp::Replace | PatchOp::Test if self.value.is_none() => {
                Err(missing("value"))
            }
            PatchOp::Move | PatchOp::Copy if self.from.is_none() => Err(missing("from")),
            _ => Ok(()),
        }
    }
}

/// Parse one patch object or an array of patches.
///
/// # Errors
///
/// Returns an error if the JSON is invalid or any patch is malformed.
pub fn parse_patches(json: &str) -> Result<Vec<Patch>, PatchError> {
    let value: Value = serde_json::from_str(json).map_err(|e| PatchError::Malformed {
        reason: e.to_string(),
    })?;
    match value {
        Value::Array(items) => items.iter().map(Patch::from_value).collect(),
        single => Ok(vec![Patch::from_value(&single)?]),
    }
}

/// Result of a transactional sequence with its undo patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOutcome {
    /// The new document.
    pub document: CanvasDocument,
    /// The patches that were applied.
    pub patches: Vec<Patch>,
    /// Patches that restore the input, in the order they must be applied.
    pub reverse_patches: Vec<Patch>,
}

/// Apply a single patch.
///
/// A failed `test` returns an unchanged copy of the document instead of an
/// error. Use [`apply_patches`] to make a `test` a hard precondition.
///
/// # Errors
///
/// Returns an error if the patch cannot be applied; `document` is untouched.
pub fn apply_patch(document: &CanvasDocument, patch: &Patch) -> Result<CanvasDocument, PatchError> {
    match apply_patches(document, std::slice::from_ref(patch)) {
        Err(PatchError::TestFailed { path }) => {
            tracing::debug!(path = %path, "standalone test patch failed, document unchanged");
            Ok(document.clone())
        }
        other => other,
    }
}

/// Apply a patch sequence atomically.
///
/// # Errors
///
/// Returns the first failure, including a failed `test`. The input document
/// is never modified.
pub fn apply_patches(
    document: &CanvasDocument,
    patches: &[Patch],
) -> Result<CanvasDocument, PatchError> {
    let mut working = to_buffer(document)?;
    for patch in patches {
        apply_to_value(&mut working, patch).inspect_err(|e| {
            tracing::warn!(op = %patch.op, path = %patch.path, error = %e, "patch sequence rolled back");
        })?;
    }
    let result = from_buffer(working)?;
    tracing::debug!(ops = patches.len(), "applied patch sequence");
    Ok(result)
}

/// Apply a sequence atomically and derive its reverse.
///
/// Pre-operation values are captured while applying and `-` append tokens
/// are resolved to concrete indices, so the reverse patches replay exactly.
///
/// # Errors
///
/// Returns the first failure; the input document is never modified.
pub fn apply_patches_with_reverse(
    document: &CanvasDocument,
    patches: &[Patch],
) -> Result<PatchOutcome, PatchError> {
    let mut working = to_buffer(document)?;
    let mut reverse_patches = Vec::with_capacity(patches.len());
    for patch in patches {
        let effect = apply_to_value(&mut working, patch).inspect_err(|e| {
            tracing::warn!(op = %patch.op, path = %patch.path, error = %e, "patch sequence rolled back");
        })?;
        reverse_patches.push(reverse_from_effect(patch, effect)?);
    }
    reverse_patches.reverse();
    let result = from_buffer(working)?;
    tracing::debug!(ops = patches.len(), "applied patch sequence with reverse");
    Ok(PatchOutcome {
        document: result,
        patches: patches.to_vec(),
        reverse_patches,
    })
}

/// Derive the patch that undoes `patch`.
///
/// `remove` and `replace` need `previous`, the value found at `path` before
/// the patch was applied; the engine cannot reconstruct it afterwards.
///
/// # Errors
///
/// Returns [`PatchError::MissingReverseValue`] when `previous` is required
/// but absent, and [`PatchError::MissingField`] when a `move` has no `from`.
pub fn create_reverse_patch(patch: &Patch, previous: Option<Value>) -> Result<Patch, PatchError> {
    let needs_previous = || PatchError::MissingReverseValue {
        op: patch.op,
        path: patch.path.clone(),
    };
    let reverse = match patch.op {
        PatchOp::Add | PatchOp::Copy => Patch::remove(patch.path.clone()),
        PatchOp::Remove => Patch::add(patch.path.clone(), previous.ok_or_else(needs_previous)?),
        PatchOp::Replace => {
            Patch::replace(patch.path.clone(), previous.ok_or_else(needs_previous)?)
        }
        PatchOp::Move => {
            let from = patch.from.clone().ok_or_else(|| PatchError::MissingField {
                op: patch.op,
                path: patch.path.clone(),
                field: "from",
            })?;
            Patch::move_to(patch.path.clone(), from)
        }
        PatchOp::Test => patch.clone(),
    };
    Ok(reverse)
}

/// What an applied op did, for reverse derivation.
struct Effect {
    /// Target path with `-` resolved to the index actually used.
    path: String,
    /// Value displaced at `path` (overwritten or removed).
    previous: Option<Value>,
}

fn reverse_from_effect(patch: &Patch, effect: Effect) -> Result<Patch, PatchError> {
    let reverse = match (patch.op, effect.previous) {
        // add/copy onto an existing object key overwrote a value
        (PatchOp::Add | PatchOp::Copy, Some(previous)) => Patch::replace(effect.path, previous),
        (PatchOp::Add | PatchOp::Copy, None) => Patch::remove(effect.path),
        (PatchOp::Move, _) => {
            let from = patch.from.clone().unwrap_or_default();
            Patch::move_to(effect.path, from)
        }
        (op, previous) => {
            let resolved = Patch {
                path: effect.path,
                ..patch.clone()
            };
            return create_reverse_patch(&resolved, previous).map_err(|e| match e {
                PatchError::MissingReverseValue { .. } => PatchError::MissingReverseValue {
                    op,
                    path: patch.path.clone(),
                },
                other => other,
            });
        }
    };
    Ok(reverse)
}

fn to_buffer(document: &CanvasDocument) -> Result<Value, PatchError> {
    document.to_value().map_err(|e| PatchError::InvalidResult {
        reason: e.to_string(),
    })
}

fn from_buffer(working: Value) -> Result<CanvasDocument, PatchError> {
    let reject = |reason: String| {
        tracing::warn!(reason = %reason, "patch sequence produced an invalid document, rolled back");
        PatchError::InvalidResult { reason }
    };
    let document = CanvasDocument::from_value(working.clone()).map_err(|e| reject(e.to_string()))?;
    // Every key the patches left behind must survive the typed model, or the
    // recorded reverse patches would address keys that no longer exist.
    let typed = to_buffer(&document)?;
    if let Some(path) = dropped_key(&working, &typed, "") {
        return Err(reject(format!("{path} is not part of the document model")));
    }
    Ok(document)
}

/// First pointer present in `edited` that has no counterpart in `typed`.
fn dropped_key(edited: &Value, typed: &Value, path: &str) -> Option<String> {
    match (edited, typed) {
        (Value::Object(edited), Value::Object(typed)) => edited.iter().find_map(|(key, value)| {
            let child = format!("{path}/{}", key.replace('~', "~0").replace('/', "~1"));
            match typed.get(key) {
                Some(kept) => dropped_key(value, kept, &child),
                None => Some(child),
            }
        }),
        (Value::Array(edited), Value::Array(typed)) => edited
            .iter()
            .zip(typed)
            .enumerate()
            .find_map(|(i, (value, kept))| dropped_key(value, kept, &format!("{path}/{i}"))),
        _ => None,
    }
}

// ── Pointer navigation ────────────────────────────────────────────────────

/// Why a pointer operation failed, before op/path context is attached.
enum Fault {
    NotFound,
    InvalidIndex,
    InvalidTarget,
}

impl Fault {
    fn with(self, op: PatchOp, path: &str) -> PatchError {
        let path = path.to_string();
        match self {
            Self::NotFound => PatchError::NotFound { op, path },
            Self::InvalidIndex => PatchError::InvalidIndex { op, path },
            Self::InvalidTarget => PatchError::InvalidTarget { op, path },
        }
    }
}

/// Split a JSON Pointer into unescaped segments. `""` is the root.
fn parse_pointer(op: PatchOp, pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PatchError::InvalidPointer {
            op,
            pointer: pointer.to_string(),
        });
    };
    Ok(rest
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Format segments back into a pointer.
fn format_pointer(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| format!("/{}", s.replace('~', "~0").replace('/', "~1")))
        .collect()
}

/// Parse an array index: digits only, no leading zeros.
fn parse_index(segment: &str) -> Result<usize, Fault> {
    let canonical = segment == "0" || (!segment.starts_with('0') && !segment.is_empty());
    if !canonical || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Fault::InvalidIndex);
    }
    segment.parse().map_err(|_| Fault::InvalidIndex)
}

fn get<'a>(doc: &'a Value, segments: &[String]) -> Result<&'a Value, Fault> {
    segments.iter().try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment).ok_or(Fault::NotFound),
        Value::Array(items) => items.get(parse_index(segment)?).ok_or(Fault::NotFound),
        _ => Err(Fault::NotFound),
    })
}

fn get_mut<'a>(doc: &'a mut Value, segments: &[String]) -> Result<&'a mut Value, Fault> {
    segments.iter().try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get_mut(segment).ok_or(Fault::NotFound),
        Value::Array(items) => {
            let index = parse_index(segment)?;
            items.get_mut(index).ok_or(Fault::NotFound)
        }
        _ => Err(Fault::NotFound),
    })
}

/// Insert at `segments`; returns the displaced value and the resolved path.
fn add_at(doc: &mut Value, segments: &[String], value: Value) -> Result<Effect, Fault> {
    let Some((key, parent_path)) = segments.split_last() else {
        let previous = std::mem::replace(doc, value);
        return Ok(Effect {
            path: String::new(),
            previous: Some(previous),
        });
    };
    let parent = get_mut(doc, parent_path)?;
    match parent {
        Value::Object(map) => {
            let previous = map.insert(key.clone(), value);
            Ok(Effect {
                path: format_pointer(segments),
                previous,
            })
        }
        Value::Array(items) => {
            let index = if key == "-" {
                items.len()
            } else {
                parse_index(key)?
            };
            if index > items.len() {
                return Err(Fault::InvalidIndex);
            }
            items.insert(index, value);
            let mut resolved = parent_path.to_vec();
            resolved.push(index.to_string());
            Ok(Effect {
                path: format_pointer(&resolved),
                previous: None,
            })
        }
        _ => Err(Fault::InvalidTarget),
    }
}

fn remove_at(doc: &mut Value, segments: &[String]) -> Result<Value, Fault> {
    let (key, parent_path) = segments.split_last().ok_or(Fault::InvalidTarget)?;
    match get_mut(doc, parent_path)? {
        Value::Object(map) => map.remove(key).ok_or(Fault::NotFound),
        Value::Array(items) => {
            let index = parse_index(key)?;
            if index >= items.len() {
                return Err(Fault::NotFound);
            }
            Ok(items.remove(index))
        }
        _ => Err(Fault::InvalidTarget),
    }
}

fn replace_at(doc: &mut Value, segments: &[String], value: Value) -> Result<Value, Fault> {
    let target = get_mut(doc, segments)?;
    Ok(std::mem::replace(target, value))
}

/// Apply one op to the working buffer.
fn apply_to_value(doc: &mut Value, patch: &Patch) -> Result<Effect, PatchError> {
    patch.check_fields()?;
    let op = patch.op;
    let path = parse_pointer(op, &patch.path)?;
    let value = || patch.value.clone().unwrap_or(Value::Null);
    tracing::trace!(op = %op, path = %patch.path, "applying patch");

    match op {
        PatchOp::Add => add_at(doc, &path, value()).map_err(|f| f.with(op, &patch.path)),
        PatchOp::Remove => {
            let previous = remove_at(doc, &path).map_err(|f| f.with(op, &patch.path))?;
            Ok(Effect {
                path: patch.path.clone(),
                previous: Some(previous),
            })
        }
        PatchOp::Replace => {
            let previous = replace_at(doc, &path, value()).map_err(|f| f.with(op, &patch.path))?;
            Ok(Effect {
                path: patch.path.clone(),
                previous: Some(previous),
            })
        }
        PatchOp::Copy => {
            let from_ptr = patch.from.as_deref().unwrap_or_default();
            let from = parse_pointer(op, from_ptr)?;
            let source = get(doc, &from).map_err(|f| f.with(op, from_ptr))?.clone();
            add_at(doc, &path, source).map_err(|f| f.with(op, &patch.path))
        }
        PatchOp::Move => {
            let from_ptr = patch.from.as_deref().unwrap_or_default();
            let from = parse_pointer(op, from_ptr)?;
            if from == path {
                get(doc, &from).map_err(|f| f.with(op, from_ptr))?;
                return Ok(Effect {
                    path: patch.path.clone(),
                    previous: None,
                });
            }
            if path.len() > from.len() && path.starts_with(&from) {
                return Err(Fault::InvalidTarget.with(op, &patch.path));
            }
            let moved = remove_at(doc, &from).map_err(|f| f.with(op, from_ptr))?;
            add_at(doc, &path, moved).map_err(|f| f.with(op, &patch.path))
        }
        PatchOp::Test => {
            let actual = get(doc, &path).map_err(|f| f.with(op, &patch.path))?;
            if values_identical(actual, &value()) {
                Ok(Effect {
                    path: patch.path.clone(),
                    previous: None,
                })
            } else {
                Err(PatchError::TestFailed {
                    path: patch.path.clone(),
                })
            }
        }
    }
}

/// Read the value at a pointer in a document.
///
/// # Errors
///
/// Returns an error if the pointer is malformed or does not resolve.
pub fn value_at(document: &CanvasDocument, pointer: &str) -> Result<Value, PatchError> {
    let op = PatchOp::Test;
    let segments = parse_pointer(op, pointer)?;
    let doc = to_buffer(document)?;
    get(&doc, &segments)
        .cloned()
        .map_err(|f| f.with(op, pointer))
}

/// Set or clear a field inside a JSON object, creating nothing above it.
///
/// Used when a merge writes a resolved field value into a node.
pub(crate) fn set_in_object(
    target: &mut Map<String, Value>,
    segments: &[String],
    value: Option<Value>,
) -> bool {
    let Some((key, parents)) = segments.split_last() else {
        return false;
    };
    let mut current = target;
    for segment in parents {
        match current.get_mut(segment) {
            Some(Value::Object(next)) => current = next,
            _ => return false,
        }
    }
    match value {
        Some(v) => {
            current.insert(key.clone(), v);
        }
        None => {
            current.remove(key);
        }
    }
    true
}

/// Split a relative field pointer such as `/frame/x`.
pub(crate) fn field_segments(pointer: &str) -> Vec<String> {
    parse_pointer(PatchOp::Replace, pointer).unwrap_or_default()
}
