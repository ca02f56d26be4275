//! # Canvas Document
//!
//! Document engine for design canvases: a typed tree of artboards and
//! nodes with a canonical JSON form, reversible patches, undo history,
//! semantic diff and three-way merge.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               CanvasDocument                │
//! │   artboards → nodes (frame, group, text…)   │
//! ├──────────────────────┬──────────────────────┤
//! │  Codec               │  Editing             │
//! │  - canonical JSON    │  - patches + reverse │
//! │  - validation        │  - history           │
//! ├──────────────────────┼──────────────────────┤
//! │  Queries             │  Collaboration       │
//! │  - tree index        │  - semantic diff     │
//! │  - hit testing       │  - three-way merge   │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! Every operation takes documents by reference and returns new values;
//! nothing here mutates an input in place.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod canonical;
pub mod diff;
pub mod document;
pub mod error;
pub mod geometry;
pub mod history;
pub mod hit_test;
pub mod id;
pub mod merge;
pub mod node;
pub mod patch;
pub mod tree;
pub mod validate;

pub use diff::{diff_documents, DiffKind, DiffOperation, DiffOptions, DiffResult, DiffSummary};
pub use document::{Artboard, CanvasDocument, ParentId, SCHEMA_VERSION};
pub use error::{DocumentError, DocumentResult};
pub use geometry::{Point, Rect};
pub use history::{History, HistoryEntry};
pub use hit_test::{hit_test, hit_test_proximity, hit_test_rect, Hit, HitTestOptions};
pub use id::Id;
pub use merge::{
    merge_documents, Conflict, ConflictDetector, ConflictResolver, MergeOptions, MergeOutcome,
    MergeResolution, ResolutionStrategy, ResolverPipeline,
};
pub use node::{Node, NodeKind};
pub use patch::{
    apply_patch, apply_patches, apply_patches_with_reverse, Patch, PatchError, PatchOp,
    PatchOutcome,
};
pub use tree::{flatten, FlatNode, NodeIndex};
pub use validate::{ValidationResult, Validator, ValidatorConfig};

/// Canvas document version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
