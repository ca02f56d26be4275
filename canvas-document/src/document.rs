//! Artboards and canvas documents.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::id::Id;
use crate::node::Node;
use crate::{DocumentError, DocumentResult};

/// Schema version written by this engine.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// A top-level drawing surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artboard {
    /// Unique identifier.
    pub id: Id,
    /// Display name.
    pub name: String,
    /// Position and size in document space.
    pub frame: Rect,
    /// Root nodes in z-order (later is on top).
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Artboard {
    /// Create an empty artboard with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, frame: Rect) -> Self {
        Self {
            id: Id::new(),
            name: name.into(),
            frame,
            children: Vec::new(),
        }
    }

    /// Set the id.
    #[must_use]
    pub fn with_id(mut self, id: Id) -> Self {
        self.id = id;
        self
    }

    /// Append children.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Id of an artboard or container node that owns children.
pub type ParentId = Id;

/// A canvas document.
///
/// Always holds at least one artboard. Deserialization and every constructor
/// enforce this together with the schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DocumentRepr")]
pub struct CanvasDocument {
    schema_version: String,
    /// Unique identifier.
    pub id: Id,
    /// Display name.
    pub name: String,
    artboards: Vec<Artboard>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRepr {
    schema_version: String,
    id: Id,
    name: String,
    artboards: Vec<Artboard>,
}

impl TryFrom<DocumentRepr> for CanvasDocument {
    type Error = DocumentError;

    fn try_from(repr: DocumentRepr) -> Result<Self, Self::Error> {
        if repr.schema_version != SCHEMA_VERSION {
            return Err(DocumentError::SchemaVersion {
                expected: SCHEMA_VERSION,
                found: repr.schema_version,
            });
        }
        if repr.artboards.is_empty() {
            return Err(DocumentError::NoArtboards);
        }
        Ok(Self {
            schema_version: repr.schema_version,
            id: repr.id,
            name: repr.name,
            artboards: repr.artboards,
        })
    }
}

impl CanvasDocument {
    /// Create a document with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NoArtboards`] if `artboards` is empty.
    pub fn new(name: impl Into<String>, artboards: Vec<Artboard>) -> DocumentResult<Self> {
        Self::with_id(Id::new(), name, artboards)
    }

    /// Create a document with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NoArtboards`] if `artboards` is empty.
    pub fn with_id(
        id: Id,
        name: impl Into<String>,
        artboards: Vec<Artboard>,
    ) -> DocumentResult<Self> {
        if artboards.is_empty() {
            return Err(DocumentError::NoArtboards);
        }
        Ok(Self {
            schema_version: SCHEMA_VERSION.to_string(),
            id,
            name: name.into(),
            artboards,
        })
    }

    /// Declared schema version.
    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Artboards in order.
    #[must_use]
    pub fn artboards(&self) -> &[Artboard] {
        &self.artboards
    }

    /// Artboard by index.
    #[must_use]
    pub fn artboard(&self, index: usize) -> Option<&Artboard> {
        self.artboards.get(index)
    }

    /// Mutable artboard by index.
    pub fn artboard_mut(&mut self, index: usize) -> Option<&mut Artboard> {
        self.artboards.get_mut(index)
    }

    /// Insert an artboard, clamping `index` to the end.
    pub fn insert_artboard(&mut self, index: usize, artboard: Artboard) {
        let index = index.min(self.artboards.len());
        self.artboards.insert(index, artboard);
    }

    /// Remove an artboard by id.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NodeNotFound`] if no artboard has this id and
    /// [`DocumentError::NoArtboards`] if it is the last one.
    pub fn remove_artboard(&mut self, id: Id) -> DocumentResult<(usize, Artboard)> {
        let index = self
            .artboards
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| DocumentError::NodeNotFound(id.to_string()))?;
        if self.artboards.len() == 1 {
            return Err(DocumentError::NoArtboards);
        }
        Ok((index, self.artboards.remove(index)))
    }

    /// Find a node anywhere in the document.
    #[must_use]
    pub fn find_node(&self, id: Id) -> Option<&Node> {
        self.artboards
            .iter()
            .find_map(|artboard| find_in(&artboard.children, id))
    }

    /// Find a node anywhere in the document, mutably.
    pub fn find_node_mut(&mut self, id: Id) -> Option<&mut Node> {
        self.artboards
            .iter_mut()
            .find_map(|artboard| find_in_mut(&mut artboard.children, id))
    }

    /// Check whether an artboard or node with this id exists.
    #[must_use]
    pub fn contains(&self, id: Id) -> bool {
        self.artboards.iter().any(|a| a.id == id) || self.find_node(id).is_some()
    }

    /// Detach a node (with its subtree) from wherever it sits.
    ///
    /// Returns the parent id, the index it had, and the node.
    pub fn remove_node(&mut self, id: Id) -> Option<(ParentId, usize, Node)> {
        self.artboards.iter_mut().find_map(|artboard| {
            let parent = artboard.id;
            remove_in(parent, &mut artboard.children, id)
        })
    }

    /// Insert a node under an artboard or container, clamping `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NodeNotFound`] if `parent` does not exist and
    /// [`DocumentError::InvalidField`] if it is a leaf node.
    pub fn insert_node(&mut self, parent: ParentId, index: usize, node: Node) -> DocumentResult<()> {
        let children = self.children_mut(parent)?;
        let index = index.min(children.len());
        children.insert(index, node);
        Ok(())
    }

    /// Mutable child list of an artboard or container node.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NodeNotFound`] if `parent` does not exist and
    /// [`DocumentError::InvalidField`] if it is a leaf node.
    pub fn children_mut(&mut self, parent: ParentId) -> DocumentResult<&mut Vec<Node>> {
        if let Some(pos) = self.artboards.iter().position(|a| a.id == parent) {
            return Ok(&mut self.artboards[pos].children);
        }
        let node = self
            .find_node_mut(parent)
            .ok_or_else(|| DocumentError::NodeNotFound(parent.to_string()))?;
        let kind = node.kind();
        node.children_mut().ok_or_else(|| DocumentError::InvalidField {
            id: parent.to_string(),
            field: "/children".to_string(),
            reason: format!("{kind} nodes cannot own children"),
        })
    }

    /// Total number of nodes across all artboards.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.artboards
            .iter()
            .flat_map(|a| a.children.iter())
            .map(Node::subtree_len)
            .sum()
    }

    /// Convert to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_value(&self) -> DocumentResult<serde_json::Value> {
        serde_json::to_value(self).map_err(DocumentError::Serialization)
    }

    /// Build a document from a JSON value, enforcing document invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not describe a valid document.
    pub fn from_value(value: serde_json::Value) -> DocumentResult<Self> {
        serde_json::from_value(value).map_err(DocumentError::Serialization)
    }
}

fn find_in(nodes: &[Node], id: Id) -> Option<&Node> {
    nodes.iter().find_map(|node| {
        if node.id() == id {
            Some(node)
        } else {
            find_in(node.children(), id)
        }
    })
}

fn find_in_mut(nodes: &mut [Node], id: Id) -> Option<&mut Node> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let Some(children) = node.children_mut() {
            if let Some(found) = find_in_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_in(parent: Id, nodes: &mut Vec<Node>, id: Id) -> Option<(ParentId, usize, Node)> {
    if let Some(index) = nodes.iter().position(|n| n.id() == id) {
        return Some((parent, index, nodes.remove(index)));
    }
    nodes.iter_mut().find_map(|node| {
        let node_id = node.id();
        node.children_mut()
            .and_then(|children| remove_in(node_id, children, id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> CanvasDocument {
        let title = Node::text("Title", Rect::new(32.0, 40.0, 600.0, 64.0), "Hi")
            .with_id(Id::from_u128(3));
        let hero = Node::frame("Hero", Rect::new(0.0, 0.0, 1440.0, 480.0))
            .with_id(Id::from_u128(2))
            .with_children([title]);
        let artboard = Artboard::new("Desktop", Rect::new(0.0, 0.0, 1440.0, 900.0))
            .with_id(Id::from_u128(1))
            .with_children([hero]);
        CanvasDocument::with_id(Id::from_u128(100), "Landing", vec![artboard]).expect("doc")
    }

    #[test]
    fn test_new_rejects_empty_artboards() {
        assert!(matches!(
            CanvasDocument::new("Empty", vec![]),
            Err(DocumentError::NoArtboards)
        ));
    }

    #[test]
    fn test_deserialize_enforces_invariants() {
        let mut value = sample().to_value().expect("value");
        value["artboards"] = json!([]);
        assert!(CanvasDocument::from_value(value).is_err());

        let mut value = sample().to_value().expect("value");
        value["schemaVersion"] = json!("0.9.0");
        assert!(CanvasDocument::from_value(value).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let doc = sample();
        let value = doc.to_value().expect("value");
        assert_eq!(value["schemaVersion"], SCHEMA_VERSION);
        let back = CanvasDocument::from_value(value).expect("doc");
        assert_eq!(back, doc);
    }

    #[test]
    fn test_find_and_remove_node() {
        let mut doc = sample();
        assert_eq!(doc.node_count(), 2);
        assert_eq!(doc.find_node(Id::from_u128(3)).map(Node::name), Some("Title"));

        let (parent, index, node) = doc.remove_node(Id::from_u128(3)).expect("removed");
        assert_eq!(parent, Id::from_u128(2));
        assert_eq!(index, 0);
        assert_eq!(node.name(), "Title");
        assert_eq!(doc.node_count(), 1);
        assert!(doc.remove_node(Id::from_u128(3)).is_none());
    }

    #[test]
    fn test_insert_node_under_artboard_and_leaf() {
        let mut doc = sample();
        let badge = Node::text("Badge", Rect::default(), "New").with_id(Id::from_u128(9));
        doc.insert_node(Id::from_u128(1), 99, badge.clone())
            .expect("insert under artboard");
        assert_eq!(doc.artboards()[0].children[1].id(), Id::from_u128(9));

        let err = doc.insert_node(Id::from_u128(3), 0, badge);
        assert!(matches!(err, Err(DocumentError::InvalidField { .. })));
        let err = doc.insert_node(Id::from_u128(77), 0, Node::group("G", Rect::default()));
        assert!(matches!(err, Err(DocumentError::NodeNotFound(_))));
    }

    #[test]
    fn test_cannot_remove_last_artboard() {
        let mut doc = sample();
        assert!(matches!(
            doc.remove_artboard(Id::from_u128(1)),
            Err(DocumentError::NoArtboards)
        ));
        doc.insert_artboard(5, Artboard::new("Mobile", Rect::default()).with_id(Id::from_u128(50)));
        let (index, removed) = doc.remove_artboard(Id::from_u128(1)).expect("remove");
        assert_eq!(index, 0);
        assert_eq!(removed.name, "Desktop");
        assert_eq!(doc.artboards().len(), 1);
    }
}
