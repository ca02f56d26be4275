//! Canvas nodes - the building blocks of artboards.
//!
//! A [`Node`] is a closed set of variants sharing a [`NodeBase`]. The base is
//! flattened into each variant's JSON object and the variant is selected by
//! the `type` field:
//!
//! ```text
//! {"type": "text", "id": "01J...", "name": "Title", "frame": {...}, "text": "Hello"}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::id::Id;

const fn default_visible() -> bool {
    true
}

/// Fields shared by every node variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeBase {
    /// Unique identifier.
    pub id: Id,
    /// Display name shown in the layers list.
    pub name: String,
    /// Whether the node is rendered and hit-testable.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Position and size in absolute document coordinates.
    pub frame: Rect,
    /// Optional visual style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    /// Free-form data payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, PropValue>>,
    /// Data-binding payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<BTreeMap<String, PropValue>>,
    /// Stable cross-version identity such as `hero.title` or `items[2].label`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_key: Option<String>,
}

impl NodeBase {
    /// Create a visible base with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, frame: Rect) -> Self {
        Self {
            id: Id::new(),
            name: name.into(),
            visible: true,
            frame,
            style: None,
            data: None,
            bind: None,
            semantic_key: None,
        }
    }
}

/// A container that owns children and may carry a layout descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameNode {
    /// Shared fields.
    #[serde(flatten)]
    pub base: NodeBase,
    /// Children in z-order (later is on top).
    #[serde(default)]
    pub children: Vec<Node>,
    /// Layout descriptor. Never resolved by this crate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
}

/// A plain grouping container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    /// Shared fields.
    #[serde(flatten)]
    pub base: NodeBase,
    /// Children in z-order (later is on top).
    #[serde(default)]
    pub children: Vec<Node>,
}

/// An SVG-style vector path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorNode {
    /// Shared fields.
    #[serde(flatten)]
    pub base: NodeBase,
    /// SVG path data.
    pub path: String,
    /// Fill rule.
    #[serde(default)]
    pub winding_rule: WindingRule,
}

/// A text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    /// Shared fields.
    #[serde(flatten)]
    pub base: NodeBase,
    /// Text content.
    pub text: String,
    /// Font settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typography: Option<Typography>,
}

/// A raster or vector image reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageNode {
    /// Shared fields.
    #[serde(flatten)]
    pub base: NodeBase,
    /// Image source URI.
    pub src: String,
    /// How the image fills its frame.
    #[serde(default)]
    pub fit: ImageFit,
}

/// An instance of a reusable component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstanceNode {
    /// Shared fields.
    #[serde(flatten)]
    pub base: NodeBase,
    /// Key of the component definition.
    pub component_key: String,
    /// Property overrides.
    #[serde(default)]
    pub props: BTreeMap<String, PropValue>,
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    /// Container with optional layout.
    Frame(FrameNode),
    /// Plain container.
    Group(GroupNode),
    /// Vector path.
    Vector(VectorNode),
    /// Text run.
    Text(TextNode),
    /// Image reference.
    Image(ImageNode),
    /// Component instance.
    ComponentInstance(ComponentInstanceNode),
}

/// The variant tag of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// [`Node::Frame`].
    Frame,
    /// [`Node::Group`].
    Group,
    /// [`Node::Vector`].
    Vector,
    /// [`Node::Text`].
    Text,
    /// [`Node::Image`].
    Image,
    /// [`Node::ComponentInstance`].
    ComponentInstance,
}

impl NodeKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Frame,
        Self::Group,
        Self::Vector,
        Self::Text,
        Self::Image,
        Self::ComponentInstance,
    ];

    /// The `type` tag used in JSON.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Group => "group",
            Self::Vector => "vector",
            Self::Text => "text",
            Self::Image => "image",
            Self::ComponentInstance => "componentInstance",
        }
    }

    /// Parse a JSON `type` tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Whether nodes of this kind own children.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Frame | Self::Group)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Node {
    /// Create a frame container.
    #[must_use]
    pub fn frame(name: impl Into<String>, frame: Rect) -> Self {
        Self::Frame(FrameNode {
            base: NodeBase::new(name, frame),
            children: Vec::new(),
            layout: None,
        })
    }

    /// Create a group container.
    #[must_use]
    pub fn group(name: impl Into<String>, frame: Rect) -> Self {
        Self::Group(GroupNode {
            base: NodeBase::new(name, frame),
            children: Vec::new(),
        })
    }

    /// Create a vector node.
    #[must_use]
    pub fn vector(name: impl Into<String>, frame: Rect, path: impl Into<String>) -> Self {
        Self::Vector(VectorNode {
            base: NodeBase::new(name, frame),
            path: path.into(),
            winding_rule: WindingRule::default(),
        })
    }

    /// Create a text node.
    #[must_use]
    pub fn text(name: impl Into<String>, frame: Rect, text: impl Into<String>) -> Self {
        Self::Text(TextNode {
            base: NodeBase::new(name, frame),
            text: text.into(),
            typography: None,
        })
    }

    /// Create an image node.
    #[must_use]
    pub fn image(name: impl Into<String>, frame: Rect, src: impl Into<String>) -> Self {
        Self::Image(ImageNode {
            base: NodeBase::new(name, frame),
            src: src.into(),
            fit: ImageFit::default(),
        })
    }

    /// Create a component instance.
    #[must_use]
    pub fn component(
        name: impl Into<String>,
        frame: Rect,
        component_key: impl Into<String>,
    ) -> Self {
        Self::ComponentInstance(ComponentInstanceNode {
            base: NodeBase::new(name, frame),
            component_key: component_key.into(),
            props: BTreeMap::new(),
        })
    }

    /// Set the id.
    #[must_use]
    pub fn with_id(mut self, id: Id) -> Self {
        self.base_mut().id = id;
        self
    }

    /// Set visibility.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.base_mut().visible = visible;
        self
    }

    /// Set the semantic key.
    #[must_use]
    pub fn with_semantic_key(mut self, key: impl Into<String>) -> Self {
        self.base_mut().semantic_key = Some(key.into());
        self
    }

    /// Set the style.
    #[must_use]
    pub fn with_style(mut self, style: Style) -> Self {
        self.base_mut().style = Some(style);
        self
    }

    /// Append children. Leaf variants ignore them.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        if let Some(own) = self.children_mut() {
            own.extend(children);
        }
        self
    }

    /// Shared fields.
    #[must_use]
    pub const fn base(&self) -> &NodeBase {
        match self {
            Self::Frame(n) => &n.base,
            Self::Group(n) => &n.base,
            Self::Vector(n) => &n.base,
            Self::Text(n) => &n.base,
            Self::Image(n) => &n.base,
            Self::ComponentInstance(n) => &n.base,
        }
    }

    /// Mutable shared fields.
    pub fn base_mut(&mut self) -> &mut NodeBase {
        match self {
            Self::Frame(n) => &mut n.base,
            Self::Group(n) => &mut n.base,
            Self::Vector(n) => &mut n.base,
            Self::Text(n) => &mut n.base,
            Self::Image(n) => &mut n.base,
            Self::ComponentInstance(n) => &mut n.base,
        }
    }

    /// Node id.
    #[must_use]
    pub const fn id(&self) -> Id {
        self.base().id
    }

    /// Node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.base().name
    }

    /// Node frame in stored coordinates.
    #[must_use]
    pub const fn frame_rect(&self) -> &Rect {
        &self.base().frame
    }

    /// Whether the node is visible.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.base().visible
    }

    /// The semantic key, if any.
    #[must_use]
    pub fn semantic_key(&self) -> Option<&str> {
        self.base().semantic_key.as_deref()
    }

    /// The variant tag.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Frame(_) => NodeKind::Frame,
            Self::Group(_) => NodeKind::Group,
            Self::Vector(_) => NodeKind::Vector,
            Self::Text(_) => NodeKind::Text,
            Self::Image(_) => NodeKind::Image,
            Self::ComponentInstance(_) => NodeKind::ComponentInstance,
        }
    }

    /// Children in z-order. Leaves have none.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        match self {
            Self::Frame(n) => &n.children,
            Self::Group(n) => &n.children,
            Self::Vector(_) | Self::Text(_) | Self::Image(_) | Self::ComponentInstance(_) => &[],
        }
    }

    /// Mutable children, `None` for leaf variants.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Self::Frame(n) => Some(&mut n.children),
            Self::Group(n) => Some(&mut n.children),
            Self::Vector(_) | Self::Text(_) | Self::Image(_) | Self::ComponentInstance(_) => None,
        }
    }

    /// Count this node and all descendants.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Node::subtree_len).sum::<usize>()
    }
}

/// Visual style shared by all node kinds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    /// Fill paints, bottom to top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fills: Option<Vec<Paint>>,
    /// Strokes, bottom to top.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strokes: Option<Vec<Stroke>>,
    /// Corner radius in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
    /// Opacity in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Drop shadow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
}

/// A fill or stroke paint.
///
/// Paints this engine does not know are kept verbatim in [`Paint::Opaque`]
/// so they survive a parse/serialize cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Paint {
    /// A recognised paint.
    Known(KnownPaint),
    /// Any other JSON payload.
    Opaque(serde_json::Value),
}

/// Paint variants understood by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum KnownPaint {
    /// Flat color.
    Solid {
        /// Color as hex.
        color: String,
        /// Paint opacity in `[0, 1]`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opacity: Option<f64>,
    },
    /// Linear gradient.
    LinearGradient {
        /// Angle in degrees.
        angle: f64,
        /// Color stops.
        stops: Vec<GradientStop>,
    },
    /// Image fill.
    Image {
        /// Image source URI.
        src: String,
        /// How the image fills the shape.
        #[serde(default)]
        fit: ImageFit,
    },
}

impl Paint {
    /// A solid color paint.
    #[must_use]
    pub fn solid(color: impl Into<String>) -> Self {
        Self::Known(KnownPaint::Solid {
            color: color.into(),
            opacity: None,
        })
    }
}

/// A gradient color stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position in `[0, 1]`.
    pub offset: f64,
    /// Color as hex.
    pub color: String,
}

/// A stroke around a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Stroke paint.
    pub paint: Paint,
    /// Stroke width in pixels.
    pub width: f64,
    /// Stroke alignment relative to the outline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<StrokeAlign>,
}

/// Stroke alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeAlign {
    /// Inside the outline.
    Inside,
    /// Centered on the outline.
    Center,
    /// Outside the outline.
    Outside,
}

/// Drop shadow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
    /// Blur radius.
    pub blur: f64,
    /// Spread radius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread: Option<f64>,
    /// Color as hex.
    pub color: String,
}

/// Font settings for text nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    /// Font family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// Font size in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Numeric font weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<u16>,
    /// Line height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    /// Letter spacing in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<f64>,
    /// Text color as hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Layout descriptor carried by frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Layout mode.
    pub mode: LayoutMode,
    /// Gap between children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<f64>,
    /// Inner padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<Padding>,
    /// Cross-axis alignment keyword.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
}

/// Layout modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Children keep their frames.
    None,
    /// Children flow left to right.
    Horizontal,
    /// Children flow top to bottom.
    Vertical,
    /// Children sit in a grid.
    Grid,
}

/// Padding on four sides.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Padding {
    /// Top padding.
    pub top: f64,
    /// Right padding.
    pub right: f64,
    /// Bottom padding.
    pub bottom: f64,
    /// Left padding.
    pub left: f64,
}

/// Fill rule for vector paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindingRule {
    /// Non-zero winding.
    #[default]
    Nonzero,
    /// Even-odd winding.
    Evenodd,
}

/// How an image fills its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    /// Stretch to the frame.
    #[default]
    Fill,
    /// Fit inside, preserving aspect ratio.
    Contain,
    /// Cover the frame, preserving aspect ratio.
    Cover,
    /// Natural size.
    None,
}

/// A value in a data, bind or props payload.
///
/// Scalars are typed; anything else (arrays, objects, null) is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    /// Boolean.
    Bool(bool),
    /// Number, kept in its original JSON representation.
    Number(serde_json::Number),
    /// String.
    Text(String),
    /// Any other JSON payload.
    Opaque(serde_json::Value),
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_text() -> Node {
        Node::text("Title", Rect::new(32.0, 40.0, 600.0, 64.0), "Hello").with_id(Id::from_u128(1))
    }

    #[test]
    fn test_text_node_json_shape() {
        let value = serde_json::to_value(sample_text()).expect("serialize");
        assert_eq!(value["type"], "text");
        assert_eq!(value["name"], "Title");
        assert_eq!(value["text"], "Hello");
        assert_eq!(value["visible"], true);
        assert_eq!(value["frame"]["width"], 600.0);
        assert!(value.get("style").is_none());
        assert!(value.get("semanticKey").is_none());
    }

    #[test]
    fn test_visible_defaults_to_true() {
        let node: Node = serde_json::from_value(json!({
            "type": "group",
            "id": Id::from_u128(5).to_string(),
            "name": "G",
            "frame": {"x": 0, "y": 0, "width": 10, "height": 10}
        }))
        .expect("deserialize");
        assert!(node.is_visible());
        assert_eq!(node.kind(), NodeKind::Group);
        assert!(node.children().is_empty());
    }

    #[test]
    fn test_component_instance_tag() {
        let node = Node::component("Button", Rect::new(0.0, 0.0, 80.0, 32.0), "ui/button");
        let value = serde_json::to_value(&node).expect("serialize");
        assert_eq!(value["type"], "componentInstance");
        assert_eq!(value["componentKey"], "ui/button");
        assert_eq!(NodeKind::from_tag("componentInstance"), Some(NodeKind::ComponentInstance));
        assert_eq!(NodeKind::from_tag("widget"), None);
    }

    #[test]
    fn test_unknown_paint_is_preserved() {
        let style: Style = serde_json::from_value(json!({
            "fills": [
                {"type": "solid", "color": "#ff0000"},
                {"type": "noise", "seed": 4}
            ]
        }))
        .expect("deserialize");
        let fills = style.fills.as_ref().expect("fills");
        assert!(matches!(fills[0], Paint::Known(KnownPaint::Solid { .. })));
        assert!(matches!(fills[1], Paint::Opaque(_)));

        let back = serde_json::to_value(&style).expect("serialize");
        assert_eq!(back["fills"][1], json!({"type": "noise", "seed": 4}));
    }

    #[test]
    fn test_prop_values_keep_their_shape() {
        let props: BTreeMap<String, PropValue> = serde_json::from_value(json!({
            "count": 3,
            "label": "Go",
            "primary": true,
            "items": [1, 2]
        }))
        .expect("deserialize");
        assert!(matches!(props["count"], PropValue::Number(_)));
        assert!(matches!(props["label"], PropValue::Text(_)));
        assert!(matches!(props["primary"], PropValue::Bool(true)));
        assert!(matches!(props["items"], PropValue::Opaque(_)));
        assert_eq!(serde_json::to_value(&props["count"]).expect("serialize"), json!(3));
    }

    #[test]
    fn test_with_children_on_leaf_is_ignored() {
        let leaf = sample_text().with_children([Node::group("G", Rect::default())]);
        assert!(leaf.children().is_empty());

        let frame = Node::frame("F", Rect::default())
            .with_children([sample_text(), Node::group("G", Rect::default())]);
        assert_eq!(frame.children().len(), 2);
        assert_eq!(frame.subtree_len(), 3);
    }
}
