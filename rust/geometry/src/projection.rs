// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Projection of boundary points onto terrain
//!
//! Points are dropped onto the terrain along a vertical line and validated
//! against the terrain faces they look at along the reference normal.

use nalgebra::{Point3, Vector2, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::surface::{face_normal, horizontal_edge, is_projectable_normal, Face};

const EPSILON: f64 = 1e-9;

/// Outcome of projecting one boundary point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    /// Index of the terrain face that validated the ray
    pub reference_face: Option<usize>,
    /// Resampled boundary point
    pub source: Point3<f64>,
    /// Terrain point vertically above or below `source`
    pub projected: Option<Point3<f64>>,
}

impl ProjectionResult {
    fn gap(source: Point3<f64>) -> Self {
        Self {
            reference_face: None,
            source,
            projected: None,
        }
    }

    /// True when no terrain face accepted the point
    pub fn is_gap(&self) -> bool {
        self.projected.is_none()
    }
}

/// Drop a point onto the terrain along the vertical line through its XY.
///
/// The line is unbounded, so terrain below the point is found as well as
/// terrain above it. Faces are tested in order and the first hit wins;
/// faces with a non-projectable or missing normal are skipped.
pub fn project_onto_terrain(faces: &[Face], point: &Point3<f64>) -> Option<Point3<f64>> {
    faces.iter().find_map(|face| {
        let normal = face_normal(face)?.normal;
        if !is_projectable_normal(&normal) {
            return None;
        }
        vertical_hit(face, &normal, point.x, point.y)
    })
}

/// Project every start point onto the terrain faces it faces along `normal`.
///
/// For each point, candidate faces are tried in order. A face is accepted
/// when it has a vertex ahead of the point along the flattened normal and
/// the flattened ray from the point meets the face's flat representative
/// edge; the point is then projected vertically onto the terrain. Points
/// without an accepted face come back as gaps.
///
/// Results are in input order.
pub fn intersect_boundary_with_face(
    start_points: &[Point3<f64>],
    normal: &Vector3<f64>,
    faces: &[Face],
) -> Vec<ProjectionResult> {
    let dir = Vector2::new(normal.x, normal.y);
    let dir_len = dir.norm();
    if !dir_len.is_finite() || dir_len < EPSILON {
        tracing::warn!(
            points = start_points.len(),
            "Reference normal has no horizontal direction, every point is a gap"
        );
        return start_points.iter().map(|p| ProjectionResult::gap(*p)).collect();
    }
    let dir = dir / dir_len;

    let edges: Vec<Option<Curve>> = faces.iter().map(|f| horizontal_edge(f, true)).collect();

    start_points
        .par_iter()
        .map(|point| {
            let origin = Vector2::new(point.x, point.y);
            let accepted = faces.iter().zip(&edges).position(|(face, edge)| {
                let Some(edge) = edge else {
                    return false;
                };
                faces_forward(face, &origin, &dir)
                    && ray_meets_segment(
                        &origin,
                        &dir,
                        &Vector2::new(edge.start().x, edge.start().y),
                        &Vector2::new(edge.end().x, edge.end().y),
                    )
            });

            // the vertical drop does not depend on which face accepted the ray
            let projected = accepted.and_then(|_| project_onto_terrain(faces, point));
            match projected {
                Some(hit) => ProjectionResult {
                    reference_face: accepted,
                    source: *point,
                    projected: Some(hit),
                },
                None => ProjectionResult::gap(*point),
            }
        })
        .collect()
}

/// Intersection of the vertical line through `(x, y)` with a face
fn vertical_hit(face: &Face, normal: &Vector3<f64>, x: f64, y: f64) -> Option<Point3<f64>> {
    if normal.z.abs() < EPSILON {
        return None;
    }
    let v0 = face.vertices()[0];
    let z = v0.z - (normal.x * (x - v0.x) + normal.y * (y - v0.y)) / normal.z;

    contains_xy(face.vertices(), x, y).then(|| Point3::new(x, y, z))
}

/// Even-odd point-in-polygon test in XY, boundary inclusive
fn contains_xy(vertices: &[Point3<f64>], x: f64, y: f64) -> bool {
    let p = Vector2::new(x, y);
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let a = Vector2::new(vertices[i].x, vertices[i].y);
        let b = Vector2::new(vertices[j].x, vertices[j].y);
        if on_segment(&a, &b, &p) {
            return true;
        }
        if (a.y > y) != (b.y > y) {
            let cross_x = a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y);
            if x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

fn on_segment(a: &Vector2<f64>, b: &Vector2<f64>, p: &Vector2<f64>) -> bool {
    let ab = b - a;
    let ap = p - a;
    let len = ab.norm();
    if len < EPSILON {
        return ap.norm() < EPSILON;
    }
    if cross2(&ab, &ap).abs() > EPSILON * len {
        return false;
    }
    let along = ab.dot(&ap);
    along >= -EPSILON && along <= len * len + EPSILON
}

/// At least one face vertex lies on or ahead of the origin along `dir`
fn faces_forward(face: &Face, origin: &Vector2<f64>, dir: &Vector2<f64>) -> bool {
    face.vertices()
        .iter()
        .any(|v| (Vector2::new(v.x, v.y) - origin).dot(dir) >= -EPSILON)
}

/// Whether the ray `origin + t * dir` (t >= 0) meets segment `a..b`.
///
/// Collinear overlap counts as a hit.
fn ray_meets_segment(
    origin: &Vector2<f64>,
    dir: &Vector2<f64>,
    a: &Vector2<f64>,
    b: &Vector2<f64>,
) -> bool {
    let edge = b - a;
    let to_a = a - origin;
    let denom = cross2(dir, &edge);
    let scale = edge.norm().max(to_a.norm()).max(1.0);

    if denom.abs() < EPSILON * scale {
        // parallel: only a collinear edge can be hit
        if cross2(&to_a, dir).abs() > EPSILON * scale {
            return false;
        }
        let ta = to_a.dot(dir);
        let tb = (b - origin).dot(dir);
        return ta.max(tb) >= -EPSILON;
    }

    let t = cross2(&to_a, &edge) / denom;
    let s = cross2(&to_a, dir) / denom;
    t >= -EPSILON && (-EPSILON..=1.0 + EPSILON).contains(&s)
}

fn cross2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}
