// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terrain and building faces
//!
//! A [`Face`] is a planar polygon handed over by the host. Faces are never
//! mutated once extracted; transforms produce new faces.
//!
//! The representative horizontal edge is an approximation of a face's
//! footprint: the line through the face's average vertex spanning its X
//! extent. Boundary ray tests run against this edge instead of the exact
//! face boundary.

use nalgebra::{Matrix4, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::triangulation::{plane_basis, polygon_normal, triangulate_planar};

/// Tolerance for the axis-aligned orientation checks
const AXIS_EPSILON: f64 = 1e-9;

/// Planar polygon face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point3<f64>>", into = "Vec<Point3<f64>>")]
pub struct Face {
    vertices: Vec<Point3<f64>>,
}

impl Face {
    /// Create a face from its boundary loop (no repeated closing vertex).
    ///
    /// Requires at least three finite vertices. Planarity and area are not
    /// checked here; degenerate faces surface later as a missing normal.
    pub fn new(vertices: Vec<Point3<f64>>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(Error::DegenerateGeometry(format!(
                "face needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if !vertices.iter().all(|p| p.iter().all(|c| c.is_finite())) {
            return Err(Error::DegenerateGeometry(
                "face has non-finite vertex coordinates".to_string(),
            ));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Unit plane normal following the vertex winding
    pub fn plane_normal(&self) -> Option<Vector3<f64>> {
        polygon_normal(&self.vertices)
    }

    /// Triangulate the face into a mesh
    pub fn triangulate(&self) -> Result<Mesh> {
        triangulate_planar(&self.vertices)
    }

    /// Copy of the face with every vertex transformed
    pub fn transformed(&self, transform: &Matrix4<f64>) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|p| transform.transform_point(p))
                .collect(),
        }
    }
}

impl TryFrom<Vec<Point3<f64>>> for Face {
    type Error = Error;

    fn try_from(vertices: Vec<Point3<f64>>) -> Result<Self> {
        Face::new(vertices)
    }
}

impl From<Face> for Vec<Point3<f64>> {
    fn from(face: Face) -> Self {
        face.vertices
    }
}

/// Normal of a face and where it was evaluated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceNormal {
    pub normal: Vector3<f64>,
    /// Midpoint of the face's in-plane UV bounding box
    pub uv: Point2<f64>,
    /// The UV midpoint mapped back onto the face plane
    pub point: Point3<f64>,
}

/// Face normal evaluated at the midpoint of the face's parametric bounds.
///
/// The parametric space is the face plane with an orthonormal UV basis
/// anchored at the first vertex. Returns `None` when the normal cannot be
/// computed (collinear or coincident vertices).
pub fn face_normal(face: &Face) -> Option<FaceNormal> {
    let normal = face.plane_normal()?;
    let (u_axis, v_axis) = plane_basis(&normal);
    let origin = face.vertices[0];

    let mut min = Point2::new(f64::MAX, f64::MAX);
    let mut max = Point2::new(f64::MIN, f64::MIN);
    for p in &face.vertices {
        let d = p - origin;
        let (u, v) = (d.dot(&u_axis), d.dot(&v_axis));
        min.x = min.x.min(u);
        min.y = min.y.min(v);
        max.x = max.x.max(u);
        max.y = max.y.max(v);
    }

    let uv = Point2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);
    Some(FaceNormal {
        normal,
        uv,
        point: origin + u_axis * uv.x + v_axis * uv.y,
    })
}

/// Whether a face with this normal can receive a vertical projection.
///
/// Rejects faces whose normal is exactly along ±X, ±Y or -Z.
pub fn is_projectable_normal(normal: &Vector3<f64>) -> bool {
    let along = |c: f64| (c - 1.0).abs() < AXIS_EPSILON;
    !(along(normal.x.abs()) || along(normal.y.abs()) || along(-normal.z))
}

/// Representative horizontal edge of a face.
///
/// Built from the triangulated hull: the edge runs from the minimum to the
/// maximum X of the hull vertices at the Y of their average vertex, at
/// `z = 0` when `flat` is set and at the average vertex's Z otherwise.
/// Returns `None` when the face cannot be triangulated or has no X extent.
pub fn horizontal_edge(face: &Face, flat: bool) -> Option<Curve> {
    let mesh = match face.triangulate() {
        Ok(mesh) => mesh,
        Err(e) => {
            tracing::debug!(error = %e, "No horizontal edge for untriangulable face");
            return None;
        }
    };

    let center = mesh.centroid();
    let (min, max) = mesh.bounds();
    if max.x - min.x < AXIS_EPSILON {
        return None;
    }

    let z = if flat { 0.0 } else { center.z };
    Some(Curve::line(
        Point3::new(min.x, center.y, z),
        Point3::new(max.x, center.y, z),
    ))
}

/// Keep the faces of a terrain surface that can receive a vertical projection.
///
/// Every face is triangulated; a face survives when its triangles exist and
/// share a projectable orientation. Faces that fail to triangulate are
/// skipped.
pub fn filter_terrain_faces(faces: &[Face]) -> Vec<Face> {
    let mut kept = Vec::with_capacity(faces.len());
    let mut skipped = 0usize;

    for face in faces {
        let mesh = match face.triangulate() {
            Ok(mesh) => mesh,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping degenerate terrain face");
                skipped += 1;
                continue;
            }
        };

        let projectable = mesh.triangle_count() > 0
            && mesh.triangles().all(|tri| {
                let raw = tri.raw_normal();
                let len = raw.norm();
                // sliver triangles carry no orientation
                len < AXIS_EPSILON || is_projectable_normal(&(raw / len))
            });

        if projectable {
            kept.push(face.clone());
        } else {
            skipped += 1;
        }
    }

    tracing::debug!(
        input = faces.len(),
        kept = kept.len(),
        skipped,
        "Filtered terrain faces"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad(z: f64) -> Face {
        Face::new(vec![
            Point3::new(-10.0, -10.0, z),
            Point3::new(60.0, -10.0, z),
            Point3::new(60.0, 10.0, z),
            Point3::new(-10.0, 10.0, z),
        ])
        .unwrap()
    }

    #[test]
    fn face_requires_three_vertices() {
        assert!(Face::new(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]).is_err());
    }

    #[test]
    fn face_deserializes_through_validation() {
        let face: Face = serde_json::from_str("[[0,0,0],[1,0,0],[0,1,0]]").unwrap();
        assert_eq!(face.vertices().len(), 3);
        assert!(serde_json::from_str::<Face>("[[0,0,0],[1,0,0]]").is_err());
    }

    #[test]
    fn normal_at_parametric_midpoint() {
        let n = face_normal(&quad(5.0)).unwrap();
        assert_relative_eq!(n.normal.z, 1.0);
        assert_relative_eq!(n.point.x, 25.0, epsilon = 1e-9);
        assert_relative_eq!(n.point.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(n.point.z, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn normal_of_collinear_face_is_none() {
        let face = Face::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 2.0, 2.0),
        ])
        .unwrap();
        assert!(face_normal(&face).is_none());
    }

    #[test]
    fn projectable_orientations() {
        assert!(is_projectable_normal(&Vector3::new(0.0, 0.0, 1.0)));
        assert!(is_projectable_normal(&Vector3::new(0.0, 0.6, 0.8)));
        assert!(!is_projectable_normal(&Vector3::new(1.0, 0.0, 0.0)));
        assert!(!is_projectable_normal(&Vector3::new(0.0, -1.0, 0.0)));
        assert!(!is_projectable_normal(&Vector3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn horizontal_edge_spans_x_extent() {
        let edge = horizontal_edge(&quad(5.0), false).unwrap();
        assert_eq!(edge.start(), Point3::new(-10.0, 0.0, 5.0));
        assert_eq!(edge.end(), Point3::new(60.0, 0.0, 5.0));

        let flat = horizontal_edge(&quad(5.0), true).unwrap();
        assert_eq!(flat.start().z, 0.0);
    }

    #[test]
    fn horizontal_edge_of_x_facing_wall_is_degenerate() {
        let wall = Face::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(0.0, 10.0, 3.0),
            Point3::new(0.0, 0.0, 3.0),
        ])
        .unwrap();
        assert!(horizontal_edge(&wall, true).is_none());
    }

    #[test]
    fn filter_drops_walls_and_downward_faces() {
        let up = quad(5.0);
        let down = Face::new(up.vertices().iter().rev().copied().collect()).unwrap();
        let wall = Face::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 3.0),
            Point3::new(0.0, 0.0, 3.0),
        ])
        .unwrap();
        let slope = Face::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 5.0),
            Point3::new(0.0, 10.0, 5.0),
        ])
        .unwrap();

        let kept = filter_terrain_faces(&[up.clone(), down, wall, slope.clone()]);
        assert_eq!(kept, vec![up, slope]);
    }

    #[test]
    fn transformed_face_moves_vertices() {
        let moved = quad(0.0).transformed(&Matrix4::new_translation(&Vector3::new(0.0, 0.0, 3.0)));
        assert!(moved.vertices().iter().all(|p| (p.z - 3.0).abs() < 1e-12));
    }
}
