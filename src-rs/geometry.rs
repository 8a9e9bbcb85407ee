//! Pixel-space geometry shared by the layout engine and the hosts.
//!
//! Outlines are expressed the way layered-document hosts take vector paths:
//! closed sub-paths of anchor points, each carrying a `left` and a `right`
//! Bézier direction handle.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin(origin: Point, width: f64, height: f64) -> Self {
        Self::new(origin.x, origin.y, origin.x + width, origin.y + height)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Moves every edge inward by `inset`. A negative inset grows the box.
    pub fn inset(&self, inset: f64) -> Self {
        Self {
            left: self.left + inset,
            top: self.top + inset,
            right: self.right - inset,
            bottom: self.bottom - inset,
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width() >= 0.0 && self.height() >= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    #[default]
    Smooth,
    Corner,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub anchor: Point,
    pub left: Point,
    pub right: Point,
    #[serde(default)]
    pub kind: PointKind,
}

impl PathPoint {
    pub fn smooth(anchor: Point, left: Point, right: Point) -> Self {
        Self {
            anchor,
            left,
            right,
            kind: PointKind::Smooth,
        }
    }

    /// Smooth point whose handles sit on the anchor, i.e. a sharp vertex.
    pub fn flat(anchor: Point) -> Self {
        Self::smooth(anchor, anchor, anchor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPath {
    pub points: Vec<PathPoint>,
    pub closed: bool,
}

impl SubPath {
    /// Bounding box of anchors and handles (a superset of the curve).
    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self
            .points
            .iter()
            .flat_map(|p| [p.anchor, p.left, p.right]);
        let first = iter.next()?;
        let seed = Bounds::new(first.x, first.y, first.x, first.y);
        Some(iter.fold(seed, |acc, p| acc.union(&Bounds::new(p.x, p.y, p.x, p.y))))
    }

    /// Samples each cubic segment into `steps` line segments.
    ///
    /// Hosts store handles in reverse of path order: a segment runs from
    /// `a.anchor` through `a.left` and `b.right` to `b.anchor`. Segments
    /// whose handles coincide with their anchors collapse to a single edge.
    pub fn flatten(&self, steps: usize) -> Vec<Point> {
        let steps = steps.max(1);
        let count = self.points.len();
        if count == 0 {
            return Vec::new();
        }
        let segments = if self.closed { count } else { count - 1 };
        let mut out = vec![self.points[0].anchor];
        for seg in 0..segments {
            let a = &self.points[seg];
            let b = &self.points[(seg + 1) % count];
            let straight = a.left == a.anchor && b.right == b.anchor;
            if straight {
                out.push(b.anchor);
                continue;
            }
            for step in 1..=steps {
                let t = step as f64 / steps as f64;
                out.push(cubic_point(a.anchor, a.left, b.right, b.anchor, t));
            }
        }
        if self.closed && out.len() > 1 && out.first() == out.last() {
            out.pop();
        }
        out
    }
}

fn cubic_point(p0: Point, p1: Point, p2: Point, p3: Point, t: f64) -> Point {
    let u = 1.0 - t;
    let b0 = u * u * u;
    let b1 = 3.0 * u * u * t;
    let b2 = 3.0 * u * t * t;
    let b3 = t * t * t;
    Point::new(
        b0 * p0.x + b1 * p1.x + b2 * p2.x + b3 * p3.x,
        b0 * p0.y + b1 * p1.y + b2 * p2.y + b3 * p3.y,
    )
}

/// Closed circle outline inscribed in the square at (`left`, `top`) with
/// side `2 * radius`.
///
/// Anchors sit at the top, right, bottom and left extremes. Handles are
/// placed half a radius away from each anchor along the tangent.
pub fn circle_path(left: f64, top: f64, radius: f64) -> SubPath {
    let r = radius;
    let p = |x: f64, y: f64| Point::new(left + x, top + y);
    let points = vec![
        PathPoint {
            anchor: p(r, 0.0),
            right: p(r / 2.0, 0.0),
            left: p(r * 1.5, 0.0),
            kind: PointKind::Smooth,
        },
        PathPoint {
            anchor: p(r * 2.0, r),
            right: p(r * 2.0, r / 2.0),
            left: p(r * 2.0, r * 1.5),
            kind: PointKind::Smooth,
        },
        PathPoint {
            anchor: p(r, r * 2.0),
            right: p(r * 1.5, r * 2.0),
            left: p(r / 2.0, r * 2.0),
            kind: PointKind::Smooth,
        },
        PathPoint {
            anchor: p(0.0, r),
            right: p(0.0, r * 1.5),
            left: p(0.0, r / 2.0),
            kind: PointKind::Smooth,
        },
    ];
    SubPath {
        points,
        closed: true,
    }
}

/// Closed rectangle outline following the edges of `bounds` clockwise.
pub fn rect_path(bounds: &Bounds) -> SubPath {
    let corners = [
        Point::new(bounds.left, bounds.top),
        Point::new(bounds.right, bounds.top),
        Point::new(bounds.right, bounds.bottom),
        Point::new(bounds.left, bounds.bottom),
    ];
    SubPath {
        points: corners.into_iter().map(PathPoint::flat).collect(),
        closed: true,
    }
}
