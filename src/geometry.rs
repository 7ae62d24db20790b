//! Plane geometry for node boxes and straight link segments.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::scene::Node;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle stored as its extremes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn from_origin(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect {
            min_x: x,
            min_y: y,
            max_x: x + width,
            max_y: y + height,
        }
    }

    pub fn from_center(center: Point, size: Size) -> Self {
        Rect {
            min_x: center.x - size.width / 2.0,
            min_y: center.y - size.height / 2.0,
            max_x: center.x + size.width / 2.0,
            max_y: center.y + size.height / 2.0,
        }
    }

    /// Rectangle spanned by two arbitrary corners, e.g. a marquee drag.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Rect {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn origin(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn inflate(self, amount: f64) -> Rect {
        Rect {
            min_x: self.min_x - amount,
            min_y: self.min_y - amount,
            max_x: self.max_x + amount,
            max_y: self.max_y + amount,
        }
    }

    /// Inclusive containment, used for marquee selection.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// Exclusive containment, used when deciding subgraph membership.
    pub fn contains_strict(&self, point: Point) -> bool {
        point.x > self.min_x && point.x < self.max_x && point.y > self.min_y && point.y < self.max_y
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn midpoint(&self) -> Point {
        Point::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }

    pub fn distance_to(&self, point: Point) -> f64 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let length_sq = dx * dx + dy * dy;
        if length_sq <= f64::EPSILON {
            return self.start.distance(point);
        }

        let t = (((point.x - self.start.x) * dx + (point.y - self.start.y) * dy) / length_sq)
            .clamp(0.0, 1.0);
        Point::new(self.start.x + t * dx, self.start.y + t * dy).distance(point)
    }
}

/// Point where a ray leaving `center` at `angle` crosses the boundary of a
/// `size` box centred there.
///
/// On the exact diagonal the ray is treated as leaving through the left or
/// right edge.
pub fn intersect(center: Point, size: Size, angle: f64) -> Point {
    let w = size.width / 2.0;
    let h = size.height / 2.0;
    let (sin, cos) = angle.sin_cos();
    let tan = angle.tan();

    if (h * cos).abs() >= (w * sin).abs() {
        let dx = if cos > 0.0 { w } else { -w };
        Point::new(center.x + dx, center.y + dx * tan)
    } else {
        let dy = if sin > 0.0 { h } else { -h };
        Point::new(center.x + dy / tan, center.y + dy)
    }
}

/// Boundary point of `node` in the direction of `angle`.
pub fn intersect_node(node: &Node, angle: f64) -> Point {
    intersect(node.center(), node.size(), angle)
}

/// Straight segment between the facing borders of two nodes.
///
/// Returns `None` when either endpoint is missing so dangling links can be
/// skipped by callers.
pub fn link_path(source: Option<&Node>, target: Option<&Node>) -> Option<Segment> {
    let (source, target) = (source?, target?);
    let angle = (target.y - source.y).atan2(target.x - source.x);
    Some(Segment {
        start: intersect_node(source, angle),
        end: intersect_node(target, angle + PI),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn assert_point(actual: Point, x: f64, y: f64) {
        assert!(
            approx_eq!(f64, actual.x, x, epsilon = 1e-9) && approx_eq!(f64, actual.y, y, epsilon = 1e-9),
            "expected ({x}, {y}), got ({}, {})",
            actual.x,
            actual.y
        );
    }

    #[test]
    fn horizontal_angles_hit_side_midpoints() {
        let center = Point::new(100.0, 50.0);
        let size = Size::new(120.0, 60.0);
        assert_point(intersect(center, size, 0.0), 160.0, 50.0);
        assert_point(intersect(center, size, PI), 40.0, 50.0);
    }

    #[test]
    fn vertical_angles_hit_top_and_bottom() {
        let center = Point::new(0.0, 0.0);
        let size = Size::new(120.0, 60.0);
        assert_point(intersect(center, size, PI / 2.0), 0.0, 30.0);
        assert_point(intersect(center, size, -PI / 2.0), 0.0, -30.0);
    }

    #[test]
    fn square_diagonal_prefers_side_edge() {
        let size = Size::new(100.0, 100.0);
        let hit = intersect(Point::new(0.0, 0.0), size, PI / 4.0);
        assert!(approx_eq!(f64, hit.x, 50.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, hit.y, 50.0, epsilon = 1e-6));
    }

    #[test]
    fn steep_angle_exits_through_bottom() {
        let hit = intersect(Point::new(0.0, 0.0), Size::new(120.0, 60.0), 1.2);
        assert!(approx_eq!(f64, hit.y, 30.0, epsilon = 1e-9));
        assert!(hit.x > 0.0 && hit.x < 60.0);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let segment = Segment {
            start: Point::new(0.0, 0.0),
            end: Point::new(10.0, 0.0),
        };
        assert_eq!(segment.distance_to(Point::new(5.0, 3.0)), 3.0);
        assert_eq!(segment.distance_to(Point::new(13.0, 4.0)), 5.0);
        assert_eq!(segment.midpoint(), Point::new(5.0, 0.0));
    }

    #[test]
    fn membership_containment_is_strict() {
        let rect = Rect::from_origin(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(!rect.contains_strict(Point::new(10.0, 5.0)));
        assert!(rect.contains_strict(Point::new(5.0, 5.0)));
    }
}

#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn size_strategy() -> impl Strategy<Value = Size> {
        (1.0f64..600.0, 1.0f64..600.0).prop_map(|(w, h)| Size::new(w, h))
    }

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f64..1000.0, -1000.0f64..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    fn check_intersect_lies_on_border(center: Point, size: Size, angle: f64) -> Result<(), TestCaseError> {
        let hit = intersect(center, size, angle);
        let (dx, dy) = ((hit.x - center.x).abs(), (hit.y - center.y).abs());
        let (w, h) = (size.width / 2.0, size.height / 2.0);

        let on_side = approx_eq!(f64, dx, w, epsilon = 1e-6) && dy <= h + 1e-6;
        let on_cap = approx_eq!(f64, dy, h, epsilon = 1e-6) && dx <= w + 1e-6;
        prop_assert!(on_side || on_cap, "({}, {}) off the border of {size:?}", hit.x, hit.y);
        Ok(())
    }

    proptest! {
        #[test]
        fn intersect_lies_on_border(
            center in point_strategy(),
            size in size_strategy(),
            angle in -PI..PI,
        ) {
            check_intersect_lies_on_border(center, size, angle)?;
        }

        #[test]
        fn link_endpoints_stay_on_their_nodes(
            a in point_strategy(),
            b in point_strategy(),
        ) {
            let size = Size::new(120.0, 60.0);
            let start = Rect::from_center(a, size);
            let end = Rect::from_center(b, size);
            let angle = (b.y - a.y).atan2(b.x - a.x);
            let segment = Segment {
                start: intersect(a, size, angle),
                end: intersect(b, size, angle + PI),
            };
            prop_assert!(start.inflate(1e-6).contains(segment.start));
            prop_assert!(end.inflate(1e-6).contains(segment.end));
        }
    }
}
