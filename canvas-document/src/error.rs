//! Error types for document operations.

use thiserror::Error;

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur when building, parsing or editing documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// An identifier is not a valid ULID.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    /// A document was declared without any artboards.
    #[error("Document must contain at least one artboard")]
    NoArtboards,

    /// The document declares a schema version this engine does not read.
    #[error("Unsupported schema version: expected {expected}, found {found}")]
    SchemaVersion {
        /// Version this engine reads and writes.
        expected: &'static str,
        /// Version declared by the input.
        found: String,
    },

    /// A node referenced by id does not exist.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A field could not be read or written on a node.
    #[error("Invalid field {field} on {id}: {reason}")]
    InvalidField {
        /// Node or artboard id.
        id: String,
        /// Field pointer relative to the node.
        field: String,
        /// Why the field was rejected.
        reason: String,
    },

    /// Document serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
