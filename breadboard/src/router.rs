//! Orthogonal Wire Router
//!
//! Routes one wire at a time as a grid-aligned polyline:
//!
//! ```text
//!   pin A ──stub──┐
//!                 │  (lane at the snapped midpoint, or a nearby free lane)
//!                 └──stub── pin B
//! ```
//!
//! The router is a local, greedy, first-fit heuristic. Each new route only
//! avoids the lanes it actually tries against the routes placed before it,
//! so the output depends on the order of `existing`. For identical inputs
//! (including that order) the output is identical, which keeps unrelated
//! wires from moving when the circuit is re-routed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::PinSide;

/// Length of the straight segment leaving a pin before routing starts.
pub const STUB: f64 = 18.0;
/// Routing grid pitch.
pub const GRID: f64 = 8.0;
/// Parallel segments closer than this are considered overlapping.
pub const MARGIN: f64 = 6.0;
/// Number of alternative lanes tried when both midpoint shapes collide.
pub const LANE_ATTEMPTS: usize = 12;

/// A point in world (canvas) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Shortest distance from this point to the segment `a`-`b`.
    pub fn distance_to_segment(&self, a: &Point, b: &Point) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let len2 = dx * dx + dy * dy;
        let t = if len2 > 0.0 {
            (((self.x - a.x) * dx + (self.y - a.y) * dy) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.distance_to(&Point::new(a.x + t * dx, a.y + t * dy))
    }
}

/// Where a wire leaves a pin: world position plus the side it exits from.
#[derive(Debug, Clone, PartialEq)]
pub struct PinAnchor {
    pub position: Point,
    pub side: PinSide,
}

impl PinAnchor {
    pub fn new(position: Point, side: PinSide) -> Self {
        Self { position, side }
    }

    /// Grid-snapped end of the stub leaving this pin.
    pub fn stub_end(&self) -> Point {
        let (dx, dy) = self.side.outward();
        Point::new(
            snap(self.position.x + dx * STUB),
            snap(self.position.y + dy * STUB),
        )
    }
}

/// Rendered polyline for one wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route {
    pub points: Vec<Point>,
}

impl Route {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn segments(&self) -> impl Iterator<Item = (&Point, &Point)> {
        self.points.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Distance from `p` to the nearest segment, `None` for a degenerate route.
    pub fn distance_to(&self, p: &Point) -> Option<f64> {
        self.segments()
            .map(|(a, b)| p.distance_to_segment(a, b))
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Round to the nearest grid line; exact halves go to the even multiple.
pub fn snap(v: f64) -> f64 {
    (v / GRID).round_ties_even() * GRID
}

fn overlaps(a0: f64, a1: f64, b0: f64, b1: f64) -> bool {
    a0.min(a1) < b0.max(b1) && a0.max(a1) > b0.min(b1)
}

/// Whether the straight segment `a`-`b` runs within [`MARGIN`] of a parallel,
/// overlapping segment of any existing route. Crossing segments never conflict.
fn conflicts(a: Point, b: Point, existing: &[Route]) -> bool {
    existing.iter().flat_map(Route::segments).any(|(c, d)| {
        let horizontal = a.y == b.y && c.y == d.y && (a.y - c.y).abs() < MARGIN && overlaps(a.x, b.x, c.x, d.x);
        let vertical = a.x == b.x && c.x == d.x && (a.x - c.x).abs() < MARGIN && overlaps(a.y, b.y, c.y, d.y);
        horizontal || vertical
    })
}

fn path_is_free(from: Point, corner: Point, to: Point, existing: &[Route]) -> bool {
    !conflicts(from, corner, existing) && !conflicts(corner, to, existing)
}

/// Lane offsets tried in order: +G, -G, +2G, -2G, ...
fn lane_offsets() -> impl Iterator<Item = f64> {
    (0..LANE_ATTEMPTS).map(|i| {
        let k = (i / 2 + 1) as f64;
        if i % 2 == 0 {
            k * GRID
        } else {
            -k * GRID
        }
    })
}

/// Route a wire between two pins, avoiding the given earlier routes where a
/// free lane is found. Never fails; falls back to the plain midpoint lane.
pub fn route(a: &PinAnchor, b: &PinAnchor, existing: &[Route]) -> Route {
    let start = a.stub_end();
    let end = b.stub_end();
    let mx = snap(((start.x + end.x) / 2.0).floor());
    let my = snap(((start.y + end.y) / 2.0).floor());

    let mut points = vec![a.position, start];

    let h_corner = Point::new(mx, start.y);
    let v_corner = Point::new(start.x, my);

    if path_is_free(start, h_corner, Point::new(mx, end.y), existing) {
        points.extend([h_corner, Point::new(mx, end.y)]);
    } else if path_is_free(start, v_corner, Point::new(end.x, my), existing) {
        points.extend([v_corner, Point::new(end.x, my)]);
    } else {
        let lane = lane_offsets().map(|off| mx + off).find(|&lx| {
            path_is_free(start, Point::new(lx, start.y), Point::new(lx, end.y), existing)
        });
        match lane {
            Some(lx) => {
                debug!(lane = lx, midpoint = mx, "routed on alternative lane");
                points.extend([Point::new(lx, start.y), Point::new(lx, end.y)]);
            }
            None => {
                debug!(midpoint = mx, "no free lane, overlapping midpoint lane used");
                points.extend([h_corner, Point::new(mx, end.y)]);
            }
        }
    }

    points.extend([end, b.position]);
    Route::new(simplify(&points))
}

/// Drop every point that sits on a straight horizontal or vertical line
/// between the previously kept point and the next one.
fn simplify(points: &[Point]) -> Vec<Point> {
    let Some((first, rest)) = points.split_first() else {
        return Vec::new();
    };
    let mut clean = vec![*first];
    for i in 1..points.len().saturating_sub(1) {
        let prev = clean[clean.len() - 1];
        let cur = points[i];
        let next = points[i + 1];
        let on_row = prev.y == cur.y && cur.y == next.y;
        let on_column = prev.x == cur.x && cur.x == next.x;
        if !(on_row || on_column) {
            clean.push(cur);
        }
    }
    if let Some(last) = rest.last() {
        clean.push(*last);
    }
    clean
}
