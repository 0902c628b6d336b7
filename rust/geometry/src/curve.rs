// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary and wall curves
//!
//! Hosts hand boundaries over as lines and three-point arcs. Both are
//! parametrized by a normalized `t` in `[0, 1]` that is proportional to arc
//! length, which is what the resampler relies on.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Curves shorter than this are not bound
pub const LENGTH_EPSILON: f64 = 1e-9;

/// A line segment or circular arc
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Curve {
    Line {
        start: Point3<f64>,
        end: Point3<f64>,
    },
    /// Circular arc through three points, running `start -> mid -> end`
    Arc {
        start: Point3<f64>,
        mid: Point3<f64>,
        end: Point3<f64>,
    },
}

/// Circle parameters of a non-degenerate arc
#[derive(Debug, Clone, Copy)]
struct ArcFrame {
    center: Point3<f64>,
    radius: f64,
    x_axis: Vector3<f64>,
    y_axis: Vector3<f64>,
    sweep: f64,
}

impl ArcFrame {
    fn from_points(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Self> {
        let ab = b - a;
        let ac = c - a;
        let n = ab.cross(&ac);
        let n_sq = n.norm_squared();
        if n_sq < LENGTH_EPSILON * LENGTH_EPSILON {
            return None;
        }

        let offset = (n.cross(&ab) * ac.norm_squared() + ac.cross(&n) * ab.norm_squared())
            / (2.0 * n_sq);
        let center = a + offset;
        let radius = offset.norm();
        if !radius.is_finite() || radius < LENGTH_EPSILON {
            return None;
        }

        let x_axis = (a - center) / radius;
        let y_axis = n.normalize().cross(&x_axis);

        let rel = c - center;
        let mut sweep = rel.dot(&y_axis).atan2(rel.dot(&x_axis));
        if sweep <= 0.0 {
            sweep += std::f64::consts::TAU;
        }

        Some(Self {
            center,
            radius,
            x_axis,
            y_axis,
            sweep,
        })
    }

    fn point_at(&self, t: f64) -> Point3<f64> {
        let angle = t * self.sweep;
        self.center + (self.x_axis * angle.cos() + self.y_axis * angle.sin()) * self.radius
    }
}

impl Curve {
    /// Create a line segment
    pub fn line(start: Point3<f64>, end: Point3<f64>) -> Self {
        Curve::Line { start, end }
    }

    /// Create a three-point arc
    pub fn arc(start: Point3<f64>, mid: Point3<f64>, end: Point3<f64>) -> Self {
        Curve::Arc { start, mid, end }
    }

    pub fn start(&self) -> Point3<f64> {
        match self {
            Curve::Line { start, .. } | Curve::Arc { start, .. } => *start,
        }
    }

    pub fn end(&self) -> Point3<f64> {
        match self {
            Curve::Line { end, .. } | Curve::Arc { end, .. } => *end,
        }
    }

    /// Arc length of the curve
    ///
    /// Collinear arcs are measured as the two-segment polyline through `mid`.
    pub fn length(&self) -> f64 {
        match self {
            Curve::Line { start, end } => (end - start).norm(),
            Curve::Arc { start, mid, end } => match ArcFrame::from_points(start, mid, end) {
                Some(frame) => frame.radius * frame.sweep,
                None => (mid - start).norm() + (end - mid).norm(),
            },
        }
    }

    /// Evaluate at normalized parameter `t` (clamped to `[0, 1]`)
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        let t = t.clamp(0.0, 1.0);
        match self {
            Curve::Line { start, end } => start + (end - start) * t,
            Curve::Arc { start, mid, end } => match ArcFrame::from_points(start, mid, end) {
                Some(frame) => frame.point_at(t),
                None => {
                    let first = (mid - start).norm();
                    let total = first + (end - mid).norm();
                    if total < LENGTH_EPSILON {
                        return *start;
                    }
                    let along = t * total;
                    if along <= first {
                        start + (mid - start) * (along / first)
                    } else {
                        mid + (end - mid) * ((along - first) / (total - first))
                    }
                }
            },
        }
    }

    /// True when the curve has finite endpoints and a usable length
    pub fn is_bound(&self) -> bool {
        let finite = |p: &Point3<f64>| p.iter().all(|c| c.is_finite());
        let points_finite = match self {
            Curve::Line { start, end } => finite(start) && finite(end),
            Curve::Arc { start, mid, end } => finite(start) && finite(mid) && finite(end),
        };
        points_finite && self.length() > LENGTH_EPSILON
    }

    /// Same curve traversed from end to start
    pub fn reversed(&self) -> Self {
        match *self {
            Curve::Line { start, end } => Curve::Line {
                start: end,
                end: start,
            },
            Curve::Arc { start, mid, end } => Curve::Arc {
                start: end,
                mid,
                end: start,
            },
        }
    }

    /// Copy with every defining point moved to elevation `z`
    pub fn flattened(&self, z: f64) -> Self {
        let flat = |p: Point3<f64>| Point3::new(p.x, p.y, z);
        match *self {
            Curve::Line { start, end } => Curve::Line {
                start: flat(start),
                end: flat(end),
            },
            Curve::Arc { start, mid, end } => Curve::Arc {
                start: flat(start),
                mid: flat(mid),
                end: flat(end),
            },
        }
    }
}
