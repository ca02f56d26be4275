//! Tree traversal and indexing shared by hit testing, diff and merge.
//!
//! Two views of a document:
//!
//! - [`flatten`] walks nodes in document order (artboard by artboard,
//!   parent before children, siblings in z-order).
//! - [`NodeIndex`] maps every artboard and node id to its placement, and
//!   every parent to its ordered child ids. Artboards are children of the
//!   document root, keyed as `None`.
//!
//! The field catalogue ([`NODE_FIELDS`], [`ARTBOARD_FIELDS`]) is the single
//! list of comparable fields with their category and conflict code.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::ParentId;
use crate::geometry::{to_document_space, Rect};
use crate::{Artboard, CanvasDocument, Id, Node};

/// A node visited by [`flatten`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode<'a> {
    /// The node.
    pub node: &'a Node,
    /// JSON Pointer from the document root.
    pub path: String,
    /// Index of the owning artboard.
    pub artboard_index: usize,
    /// Id of the artboard or container holding the node.
    pub parent: ParentId,
    /// Position among its siblings.
    pub index: usize,
    /// Ancestor nodes above this one, artboard excluded.
    pub depth: usize,
    /// Frame in document space.
    pub bounds: Rect,
}

/// Flatten all nodes in document order.
#[must_use]
pub fn flatten(document: &CanvasDocument) -> Vec<FlatNode<'_>> {
    let mut out = Vec::with_capacity(document.node_count());
    for (artboard_index, artboard) in document.artboards().iter().enumerate() {
        let path = format!("/artboards/{artboard_index}");
        walk(
            &artboard.children,
            &path,
            artboard_index,
            artboard.id,
            &artboard.frame,
            0,
            &mut out,
        );
    }
    out
}

fn walk<'a>(
    nodes: &'a [Node],
    parent_path: &str,
    artboard_index: usize,
    parent: ParentId,
    parent_frame: &Rect,
    depth: usize,
    out: &mut Vec<FlatNode<'a>>,
) {
    for (index, node) in nodes.iter().enumerate() {
        let path = format!("{parent_path}/children/{index}");
        let bounds = to_document_space(node.frame_rect(), Some(parent_frame));
        out.push(FlatNode {
            node,
            path: path.clone(),
            artboard_index,
            parent,
            index,
            depth,
            bounds,
        });
        walk(
            node.children(),
            &path,
            artboard_index,
            node.id(),
            node.frame_rect(),
            depth + 1,
            out,
        );
    }
}

// ── Field catalogue ───────────────────────────────────────────────────────

/// Broad class of a comparable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldCategory {
    /// Tree shape and node kind.
    Structural,
    /// Geometry, visibility, style and other rendered properties.
    Property,
    /// Text body and component content.
    Content,
    /// Names and semantic keys.
    Metadata,
}

impl FieldCategory {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Property => "property",
            Self::Content => "content",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalogued field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Pointer relative to the node object.
    pub pointer: &'static str,
    /// Category.
    pub category: FieldCategory,
    /// Conflict code.
    pub code: &'static str,
}

const fn field(pointer: &'static str, category: FieldCategory, code: &'static str) -> FieldSpec {
    FieldSpec {
        pointer,
        category,
        code,
    }
}

/// Comparable node fields.
pub const NODE_FIELDS: &[FieldSpec] = &[
    field("/type", FieldCategory::Structural, "S-TYPE"),
    field("/frame/x", FieldCategory::Property, "P-GEOMETRY"),
    field("/frame/y", FieldCategory::Property, "P-GEOMETRY"),
    field("/frame/width", FieldCategory::Property, "P-GEOMETRY"),
    field("/frame/height", FieldCategory::Property, "P-GEOMETRY"),
    field("/visible", FieldCategory::Property, "P-VISIBILITY"),
    field("/style", FieldCategory::Property, "P-STYLE"),
    field("/layout", FieldCategory::Property, "P-LAYOUT"),
    field("/typography", FieldCategory::Property, "P-TYPOGRAPHY"),
    field("/path", FieldCategory::Property, "P-VALUE"),
    field("/windingRule", FieldCategory::Property, "P-VALUE"),
    field("/src", FieldCategory::Property, "P-VALUE"),
    field("/fit", FieldCategory::Property, "P-VALUE"),
    field("/data", FieldCategory::Property, "P-VALUE"),
    field("/bind", FieldCategory::Property, "P-VALUE"),
    field("/text", FieldCategory::Content, "C-TEXT"),
    field("/componentKey", FieldCategory::Content, "C-COMPONENT"),
    field("/props", FieldCategory::Content, "C-COMPONENT"),
    field("/name", FieldCategory::Metadata, "M-NAME"),
    field("/semanticKey", FieldCategory::Metadata, "M-SEMANTIC-KEY"),
];

/// Comparable artboard fields.
pub const ARTBOARD_FIELDS: &[FieldSpec] = &[
    field("/frame/x", FieldCategory::Property, "P-GEOMETRY"),
    field("/frame/y", FieldCategory::Property, "P-GEOMETRY"),
    field("/frame/width", FieldCategory::Property, "P-GEOMETRY"),
    field("/frame/height", FieldCategory::Property, "P-GEOMETRY"),
    field("/name", FieldCategory::Metadata, "M-NAME"),
];

/// Read a catalogued field, `null` when absent.
#[must_use]
pub fn field_value(object: &Value, pointer: &str) -> Value {
    object.pointer(pointer).cloned().unwrap_or(Value::Null)
}

// ── Index ─────────────────────────────────────────────────────────────────

/// An indexed artboard or node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    /// A top-level artboard.
    Artboard(&'a Artboard),
    /// A node.
    Node(&'a Node),
}

impl<'a> Item<'a> {
    /// Id.
    #[must_use]
    pub fn id(&self) -> Id {
        match self {
            Self::Artboard(a) => a.id,
            Self::Node(n) => n.id(),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            Self::Artboard(a) => &a.name,
            Self::Node(n) => n.name(),
        }
    }

    /// Whether this is an artboard.
    #[must_use]
    pub const fn is_artboard(&self) -> bool {
        matches!(self, Self::Artboard(_))
    }

    /// The node, if this is one.
    #[must_use]
    pub const fn as_node(&self) -> Option<&'a Node> {
        match self {
            Self::Artboard(_) => None,
            Self::Node(n) => Some(*n),
        }
    }

    /// Fields that can be compared on this item.
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::Artboard(_) => ARTBOARD_FIELDS,
            Self::Node(_) => NODE_FIELDS,
        }
    }

    /// The `type` tag, `"artboard"` for artboards.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Artboard(_) => "artboard",
            Self::Node(n) => n.kind().as_str(),
        }
    }

    /// Semantic key, artboards have none.
    #[must_use]
    pub fn semantic_key(&self) -> Option<&'a str> {
        self.as_node().and_then(Node::semantic_key)
    }

    /// Full JSON including children.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let value = match self {
            Self::Artboard(a) => serde_json::to_value(a),
            Self::Node(n) => serde_json::to_value(n),
        };
        value.unwrap_or(Value::Null)
    }

    /// JSON without `children`, the object catalogued fields are read from.
    #[must_use]
    pub fn own_value(&self) -> Value {
        let mut value = self.to_value();
        if let Value::Object(map) = &mut value {
            map.remove("children");
        }
        value
    }

    /// Values of every catalogued field, in catalogue order.
    #[must_use]
    pub fn field_values(&self) -> Vec<(FieldSpec, Value)> {
        let own = self.own_value();
        self.fields()
            .iter()
            .map(|spec| (*spec, field_value(&own, spec.pointer)))
            .collect()
    }
}

/// Where an item sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    /// Owning artboard or container; `None` for artboards.
    pub parent: Option<ParentId>,
    /// Position among its siblings.
    pub index: usize,
}

impl Placement {
    /// JSON form `{parent, index}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "parent": self.parent.map(|p| p.to_string()),
            "index": self.index,
        })
    }
}

/// Index entry for one artboard or node.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry<'a> {
    /// The item.
    pub item: Item<'a>,
    /// Parent and position.
    pub placement: Placement,
    /// JSON Pointer from the document root.
    pub path: String,
    /// Position in document order.
    pub order: usize,
}

/// Id lookups over one document.
#[derive(Debug, Clone, Default)]
pub struct NodeIndex<'a> {
    by_id: HashMap<Id, IndexEntry<'a>>,
    by_parent: HashMap<Option<ParentId>, Vec<Id>>,
    order: Vec<Id>,
}

impl<'a> NodeIndex<'a> {
    /// Index every artboard and node of `document`.
    #[must_use]
    pub fn build(document: &'a CanvasDocument) -> Self {
        let mut index = Self::default();
        for (i, artboard) in document.artboards().iter().enumerate() {
            let path = format!("/artboards/{i}");
            index.insert(
                Item::Artboard(artboard),
                Placement {
                    parent: None,
                    index: i,
                },
                path.clone(),
            );
            index.insert_children(artboard.id, &artboard.children, &path);
        }
        tracing::trace!(entries = index.order.len(), "built node index");
        index
    }

    fn insert(&mut self, item: Item<'a>, placement: Placement, path: String) {
        let id = item.id();
        self.by_parent.entry(placement.parent).or_default().push(id);
        let order = self.order.len();
        self.order.push(id);
        // First occurrence wins when ids are duplicated.
        self.by_id.entry(id).or_insert(IndexEntry {
            item,
            placement,
            path,
            order,
        });
    }

    fn insert_children(&mut self, parent: ParentId, nodes: &'a [Node], parent_path: &str) {
        self.by_parent.entry(Some(parent)).or_default();
        for (i, node) in nodes.iter().enumerate() {
            let path = format!("{parent_path}/children/{i}");
            self.insert(
                Item::Node(node),
                Placement {
                    parent: Some(parent),
                    index: i,
                },
                path.clone(),
            );
            if node.kind().is_container() {
                self.insert_children(node.id(), node.children(), &path);
            }
        }
    }

    /// Entry for `id`.
    #[must_use]
    pub fn get(&self, id: Id) -> Option<&IndexEntry<'a>> {
        self.by_id.get(&id)
    }

    /// Whether `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: Id) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Ordered child ids of `parent` (`None` lists artboards).
    #[must_use]
    pub fn children(&self, parent: Option<ParentId>) -> &[Id] {
        self.by_parent.get(&parent).map_or(&[][..], Vec::as_slice)
    }

    /// All ids in document order.
    #[must_use]
    pub fn ids(&self) -> &[Id] {
        &self.order
    }

    /// Number of indexed artboards and nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Ids of `id` and all of its descendants.
    #[must_use]
    pub fn subtree(&self, id: Id) -> Vec<Id> {
        let mut out = vec![id];
        let mut cursor = 0;
        while cursor < out.len() {
            out.extend_from_slice(self.children(Some(out[cursor])));
            cursor += 1;
        }
        out
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: Id, id: Id) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.get(cur).and_then(|e| e.placement.parent);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeKind, Rect};
    use serde_json::json;

    fn sample() -> CanvasDocument {
        let title = Node::text("Title", Rect::new(32.0, 40.0, 600.0, 64.0), "Hello")
            .with_id(Id::from_u128(3));
        let hero = Node::frame("Hero", Rect::new(0.0, 0.0, 1440.0, 480.0))
            .with_id(Id::from_u128(2))
            .with_children([title]);
        let badge = Node::vector("Badge", Rect::new(10.0, 10.0, 20.0, 20.0), "M0 0L10 10")
            .with_id(Id::from_u128(4));
        let desktop = Artboard::new("Desktop", Rect::new(0.0, 0.0, 1440.0, 900.0))
            .with_id(Id::from_u128(1))
            .with_children([hero, badge]);
        let mobile = Artboard::new("Mobile", Rect::new(1600.0, 0.0, 390.0, 844.0))
            .with_id(Id::from_u128(10));
        CanvasDocument::with_id(Id::from_u128(100), "Landing", vec![desktop, mobile]).expect("doc")
    }

    #[test]
    fn test_flatten_document_order() {
        let doc = sample();
        let flat = flatten(&doc);
        let ids: Vec<_> = flat.iter().map(|f| f.node.id()).collect();
        assert_eq!(ids, vec![Id::from_u128(2), Id::from_u128(3), Id::from_u128(4)]);
        assert_eq!(flat[1].path, "/artboards/0/children/0/children/0");
        assert_eq!(flat[1].depth, 1);
        assert_eq!(flat[1].parent, Id::from_u128(2));
        assert_eq!(flat[2].index, 1);
        assert_eq!(flat[1].bounds, Rect::new(32.0, 40.0, 600.0, 64.0));
    }

    #[test]
    fn test_index_parents_and_order() {
        let doc = sample();
        let index = NodeIndex::build(&doc);
        assert_eq!(index.len(), 5);
        assert_eq!(index.children(None), &[Id::from_u128(1), Id::from_u128(10)]);
        assert_eq!(
            index.children(Some(Id::from_u128(1))),
            &[Id::from_u128(2), Id::from_u128(4)]
        );
        assert!(index.children(Some(Id::from_u128(10))).is_empty());

        let title = index.get(Id::from_u128(3)).expect("title");
        assert_eq!(title.placement.parent, Some(Id::from_u128(2)));
        assert_eq!(title.path, "/artboards/0/children/0/children/0");
        assert!(index.get(Id::from_u128(10)).expect("mobile").item.is_artboard());
    }

    #[test]
    fn test_subtree_and_ancestry() {
        let doc = sample();
        let index = NodeIndex::build(&doc);
        assert_eq!(
            index.subtree(Id::from_u128(2)),
            vec![Id::from_u128(2), Id::from_u128(3)]
        );
        assert!(index.is_ancestor_or_self(Id::from_u128(1), Id::from_u128(3)));
        assert!(!index.is_ancestor_or_self(Id::from_u128(4), Id::from_u128(3)));
    }

    #[test]
    fn test_field_values_absent_is_null() {
        let doc = sample();
        let index = NodeIndex::build(&doc);
        let item = index.get(Id::from_u128(3)).expect("title").item;
        let fields = item.field_values();
        assert_eq!(fields.len(), NODE_FIELDS.len());
        let lookup = |p: &str| {
            fields
                .iter()
                .find(|(spec, _)| spec.pointer == p)
                .map(|(_, v)| v.clone())
                .expect("field")
        };
        assert_eq!(lookup("/type"), json!("text"));
        assert_eq!(lookup("/text"), json!("Hello"));
        assert_eq!(lookup("/path"), Value::Null);
        assert_eq!(lookup("/frame/x"), json!(32.0));
        assert_eq!(item.as_node().map(Node::kind), Some(NodeKind::Text));
    }

    #[test]
    fn test_catalogue_codes() {
        let code = |p: &str| NODE_FIELDS.iter().find(|f| f.pointer == p).map(|f| f.code);
        assert_eq!(code("/frame/width"), Some("P-GEOMETRY"));
        assert_eq!(code("/props"), Some("C-COMPONENT"));
        assert_eq!(code("/semanticKey"), Some("M-SEMANTIC-KEY"));
        assert!(ARTBOARD_FIELDS.iter().all(|f| f.pointer != "/type"));
    }

    #[test]
    fn test_placement_json() {
        let placement = Placement {
            parent: Some(Id::from_u128(1)),
            index: 2,
        };
        assert_eq!(
            placement.to_value(),
            json!({"parent": Id::from_u128(1).to_string(), "index": 2})
        );
    }
}
