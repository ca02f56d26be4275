//! Axis-aligned geometry used by frames and spatial queries.

use serde::{Deserialize, Serialize};

/// A point in document space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X position (pixels from left).
    pub x: f64,
    /// Y position (pixels from top).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle used for node and artboard frames.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// X position (pixels from left).
    pub x: f64,
    /// Y position (pixels from top).
    pub y: f64,
    /// Width in pixels, never negative.
    pub width: f64,
    /// Height in pixels, never negative.
    pub height: f64,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check if a point is within this rectangle. All four edges are inclusive.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Check if two rectangles overlap.
    ///
    /// Rectangles that only touch along an edge do not intersect.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y)
    }

    /// Euclidean distance from a point to the nearest edge, `0.0` inside.
    #[must_use]
    pub fn distance_to(&self, point: Point) -> f64 {
        let dx = (self.x - point.x).max(point.x - self.right()).max(0.0);
        let dy = (self.y - point.y).max(point.y - self.bottom()).max(0.0);
        dx.hypot(dy)
    }
}

/// Map a node's stored frame into document space.
///
/// Frames are stored in absolute document coordinates, so the parent frame is
/// not composed in. Every spatial consumer goes through this function; a
/// switch to parent-relative frames only has to change it.
#[must_use]
pub fn to_document_space(frame: &Rect, _parent: Option<&Rect>) -> Rect {
    *frame
}

/// Round coordinates to two decimals and dimensions to whole pixels.
///
/// Producers call this before handing geometry to the canonical codec so
/// float noise does not change the serialized bytes. The codec itself never
/// normalizes.
#[must_use]
pub fn normalize_rect(rect: &Rect) -> Rect {
    let round2 = |v: f64| (v * 100.0).round() / 100.0;
    Rect {
        x: round2(rect.x),
        y: round2(rect.y),
        width: rect.width.round().max(0.0),
        height: rect.height.round().max(0.0),
    }
}
