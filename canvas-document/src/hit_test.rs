//! Spatial queries against the document tree.
//!
//! Nodes are scanned in document order; the last node in that order is the
//! topmost, so point queries scan in reverse. Containment is inclusive on all
//! four edges. Each node's own `visible` flag decides eligibility.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::tree::{flatten, FlatNode};
use crate::{CanvasDocument, Node};

/// Filters applied by every query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HitTestOptions {
    /// Consider nodes whose `visible` flag is false.
    pub include_invisible: bool,
    /// Restrict results to one artboard.
    pub artboard_index: Option<usize>,
}

impl HitTestOptions {
    /// Include invisible nodes.
    #[must_use]
    pub const fn with_include_invisible(mut self, include: bool) -> Self {
        self.include_invisible = include;
        self
    }

    /// Restrict to one artboard.
    #[must_use]
    pub const fn with_artboard_index(mut self, index: usize) -> Self {
        self.artboard_index = Some(index);
        self
    }

    fn accepts(&self, flat: &FlatNode<'_>) -> bool {
        (self.include_invisible || flat.node.is_visible())
            && !matches!(self.artboard_index, Some(i) if i != flat.artboard_index)
    }
}

/// A node returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<'a> {
    /// The node.
    pub node: &'a Node,
    /// JSON Pointer from the document root.
    pub path: String,
    /// Index of the owning artboard.
    pub artboard_index: usize,
    /// Ancestor nodes above this one, artboard excluded.
    pub depth: usize,
}

impl<'a> From<FlatNode<'a>> for Hit<'a> {
    fn from(flat: FlatNode<'a>) -> Self {
        Self {
            node: flat.node,
            path: flat.path,
            artboard_index: flat.artboard_index,
            depth: flat.depth,
        }
    }
}

/// Topmost eligible node containing `point`.
#[must_use]
pub fn hit_test<'a>(
    document: &'a CanvasDocument,
    point: Point,
    options: &HitTestOptions,
) -> Option<Hit<'a>> {
    let hit = flatten(document)
        .into_iter()
        .rev()
        .find(|flat| options.accepts(flat) && flat.bounds.contains(point))
        .map(Hit::from);
    tracing::debug!(x = point.x, y = point.y, hit = hit.is_some(), "hit test");
    hit
}

/// Eligible nodes overlapping `rect`, in document order.
///
/// Rectangles that only share an edge do not overlap.
#[must_use]
pub fn hit_test_rect<'a>(
    document: &'a CanvasDocument,
    rect: Rect,
    options: &HitTestOptions,
) -> Vec<Hit<'a>> {
    let hits: Vec<_> = flatten(document)
        .into_iter()
        .filter(|flat| options.accepts(flat) && flat.bounds.intersects(&rect))
        .map(Hit::from)
        .collect();
    tracing::debug!(hits = hits.len(), "rect hit test");
    hits
}

/// Eligible nodes containing `point` or within `max_distance` of it, in
/// document order.
#[must_use]
pub fn hit_test_proximity<'a>(
    document: &'a CanvasDocument,
    point: Point,
    max_distance: f64,
    options: &HitTestOptions,
) -> Vec<Hit<'a>> {
    let hits: Vec<_> = flatten(document)
        .into_iter()
        .filter(|flat| {
            options.accepts(flat)
                && (flat.bounds.contains(point) || flat.bounds.distance_to(point) <= max_distance)
        })
        .map(Hit::from)
        .collect();
    tracing::debug!(hits = hits.len(), max_distance, "proximity hit test");
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Artboard, Id};

    fn hero_doc() -> CanvasDocument {
        let title = Node::text("Title", Rect::new(32.0, 40.0, 600.0, 64.0), "Hello")
            .with_id(Id::from_u128(3));
        let hero = Node::frame("Hero", Rect::new(0.0, 0.0, 1440.0, 480.0))
            .with_id(Id::from_u128(2))
            .with_children([title]);
        let features = Node::frame("Features", Rect::new(0.0, 520.0, 1440.0, 300.0))
            .with_id(Id::from_u128(4));
        let artboard = Artboard::new("Desktop", Rect::new(0.0, 0.0, 1440.0, 900.0))
            .with_id(Id::from_u128(1))
            .with_children([hero, features]);
        CanvasDocument::with_id(Id::from_u128(100), "Landing", vec![artboard]).expect("doc")
    }

    #[test]
    fn test_point_hits_innermost_topmost() {
        let doc = hero_doc();
        let hit = hit_test(&doc, Point::new(100.0, 100.0), &HitTestOptions::default())
            .expect("hit");
        assert_eq!(hit.node.name(), "Title");
        assert_eq!(hit.depth, 1);
        assert_eq!(hit.path, "/artboards/0/children/0/children/0");
    }

    #[test]
    fn test_point_outside_misses() {
        let doc = hero_doc();
        assert!(hit_test(&doc, Point::new(-10.0, -10.0), &HitTestOptions::default()).is_none());
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let doc = hero_doc();
        let options = HitTestOptions::default();
        let corner = hit_test(&doc, Point::new(632.0, 104.0), &options).expect("corner");
        assert_eq!(corner.node.name(), "Title");
        let edge = hit_test(&doc, Point::new(1440.0, 480.0), &options).expect("edge");
        assert_eq!(edge.node.name(), "Hero");
    }

    #[test]
    fn test_rect_gap_has_no_hits() {
        let doc = hero_doc();
        let hits = hit_test_rect(&doc, Rect::new(0.0, 500.0, 10.0, 10.0), &HitTestOptions::default());
        assert!(hits.is_empty());

        let hits = hit_test_rect(&doc, Rect::new(0.0, 470.0, 10.0, 60.0), &HitTestOptions::default());
        let names: Vec<_> = hits.iter().map(|h| h.node.name()).collect();
        assert_eq!(names, vec!["Hero", "Features"]);
    }

    #[test]
    fn test_invisible_nodes_are_skipped() {
        let title = Node::text("Title", Rect::new(0.0, 0.0, 100.0, 100.0), "Hi").with_visible(false);
        let artboard = Artboard::new("A", Rect::new(0.0, 0.0, 100.0, 100.0)).with_children([title]);
        let doc = CanvasDocument::new("Doc", vec![artboard]).expect("doc");
        let point = Point::new(50.0, 50.0);

        assert!(hit_test(&doc, point, &HitTestOptions::default()).is_none());
        let options = HitTestOptions::default().with_include_invisible(true);
        assert!(hit_test(&doc, point, &options).is_some());
    }

    #[test]
    fn test_artboard_filter() {
        let a = Artboard::new("A", Rect::new(0.0, 0.0, 100.0, 100.0))
            .with_children([Node::group("First", Rect::new(0.0, 0.0, 100.0, 100.0))]);
        let b = Artboard::new("B", Rect::new(0.0, 0.0, 100.0, 100.0))
            .with_children([Node::group("Second", Rect::new(0.0, 0.0, 100.0, 100.0))]);
        let doc = CanvasDocument::new("Doc", vec![a, b]).expect("doc");
        let point = Point::new(10.0, 10.0);

        let top = hit_test(&doc, point, &HitTestOptions::default()).expect("hit");
        assert_eq!(top.node.name(), "Second");
        let first = hit_test(&doc, point, &HitTestOptions::default().with_artboard_index(0))
            .expect("hit");
        assert_eq!(first.node.name(), "First");
        assert_eq!(first.artboard_index, 0);
        assert!(hit_test(&doc, point, &HitTestOptions::default().with_artboard_index(5)).is_none());
    }

    #[test]
    fn test_empty_artboard_has_no_hits() {
        let doc = CanvasDocument::new("Doc", vec![Artboard::new("A", Rect::new(0.0, 0.0, 10.0, 10.0))])
            .expect("doc");
        assert!(hit_test(&doc, Point::new(1.0, 1.0), &HitTestOptions::default()).is_none());
    }

    #[test]
    fn test_proximity() {
        let doc = hero_doc();
        let options = HitTestOptions::default();
        let near = hit_test_proximity(&doc, Point::new(0.0, 500.0), 20.0, &options);
        let names: Vec<_> = near.iter().map(|h| h.node.name()).collect();
        assert_eq!(names, vec!["Hero", "Features"]);

        let far = hit_test_proximity(&doc, Point::new(2000.0, 2000.0), 10.0, &options);
        assert!(far.is_empty());
    }
}
