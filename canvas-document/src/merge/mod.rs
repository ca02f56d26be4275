//! Three-way merge of canvas documents.
//!
//! The merge subsystem is split in three:
//! 1. **Detection** ([`ConflictDetector`]) compares `local` and `remote`
//!    against their common ancestor `base` and reports overlapping edits.
//! 2. **Resolution** ([`ConflictResolver`], [`ResolverPipeline`]) turns each
//!    conflict into a [`MergeResolution`].
//! 3. **Merging** ([`merge_documents`]) starts from `local`, replays the
//!    changes only `remote` made and applies the accepted resolutions.
//!
//! One-sided changes never conflict. Ambiguity is reported as data
//! (`requires_review`), never as an error.

mod detector;
mod merger;
mod resolver;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tree::FieldCategory;
use crate::{CanvasDocument, Id};

pub use detector::{ConflictDetectionOptions, ConflictDetector};
pub use merger::{merge_documents, MergeOptions, MergeOutcome};
pub use resolver::{
    AutoResolver, AverageResolver, ConflictResolver, ManualResolver, PreferLocalResolver,
    PreferRemoteResolver, ResolverPipeline,
};

/// Conflicts share the field categories of the catalogue.
pub type ConflictCategory = FieldCategory;

/// How urgent a conflict is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The merged tree shape is undecided.
    Error,
    /// Rendered output differs between sides.
    Warning,
    /// Cosmetic.
    Info,
}

/// How a conflict was or should be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Keep the local value.
    PreferLocal,
    /// Take the remote value.
    PreferRemote,
    /// Leave for a human.
    Manual,
    /// Resolved by the suggested strategy without review.
    AutoResolve,
    /// Mean of two numbers.
    Average,
}

impl ResolutionStrategy {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PreferLocal => "prefer-local",
            Self::PreferRemote => "prefer-remote",
            Self::Manual => "manual",
            Self::AutoResolve => "auto-resolve",
            Self::Average => "average",
        }
    }
}

/// An overlapping edit between `local` and `remote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Stable identifier: code, item id and field.
    pub id: String,
    /// Category.
    pub category: ConflictCategory,
    /// Conflict code such as `P-GEOMETRY`.
    pub code: String,
    /// Severity.
    pub severity: Severity,
    /// Pointer to the conflicting item or field.
    pub path: String,
    /// Artboard or node concerned.
    pub node_id: Id,
    /// Field pointer relative to the item, for field conflicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Whether a resolver may settle it without review.
    pub auto_resolvable: bool,
    /// Suggested strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_strategy: Option<ResolutionStrategy>,
    /// Value in `base`; absent for additions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_value: Option<Value>,
    /// Value in `local`; absent when local deleted the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_value: Option<Value>,
    /// Value in `remote`; absent when remote deleted the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_value: Option<Value>,
    /// Human-readable description.
    pub message: String,
}

impl Conflict {
    /// Whether this conflict is about one field of an item.
    #[must_use]
    pub fn is_field_conflict(&self) -> bool {
        self.field.is_some() && self.code != "S-TYPE"
    }
}

/// The outcome of resolving one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResolution {
    /// The conflict resolved.
    pub conflict: Conflict,
    /// Strategy that produced the value.
    pub strategy: ResolutionStrategy,
    /// Chosen value; absent means the item is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<Value>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether a human should confirm the result.
    pub requires_review: bool,
    /// Why this value was chosen.
    pub explanation: String,
    /// Whether the merged document carries `resolved_value`.
    pub applied: bool,
}

/// The three documents of a merge, handed to resolvers.
#[derive(Debug, Clone, Copy)]
pub struct MergeContext<'a> {
    /// Common ancestor.
    pub base: &'a CanvasDocument,
    /// Our version.
    pub local: &'a CanvasDocument,
    /// Their version.
    pub remote: &'a CanvasDocument,
}

impl<'a> MergeContext<'a> {
    /// Bundle the three documents.
    #[must_use]
    pub const fn new(
        base: &'a CanvasDocument,
        local: &'a CanvasDocument,
        remote: &'a CanvasDocument,
    ) -> Self {
        Self {
            base,
            local,
            remote,
        }
    }
}

/// Errors raised while building a merged document.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A resolved value could not be written into the document.
    #[error("cannot apply resolution {conflict_id}: {reason}")]
    InvalidResolution {
        /// Conflict id.
        conflict_id: String,
        /// Why it failed.
        reason: String,
    },
}
