// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon triangulation utilities
//!
//! Wrapper around earcutr for triangulating planar terrain and building
//! faces. Faces are projected into their own plane first, so sloped terrain
//! patches triangulate the same way flat ones do.

use crate::mesh::Mesh;
use crate::{Error, Point2, Point3, Result, Vector3};

/// Below this length a polygon normal is treated as non-computable
const NORMAL_EPSILON: f64 = 1e-10;

/// Check if a polygon is convex (all cross products have same sign)
#[inline]
fn is_convex(points: &[Point2<f64>]) -> bool {
    if points.len() < 3 {
        return false;
    }

    let n = points.len();
    let mut sign = 0i8;

    for i in 0..n {
        let p0 = &points[i];
        let p1 = &points[(i + 1) % n];
        let p2 = &points[(i + 2) % n];

        let cross = (p1.x - p0.x) * (p2.y - p1.y) - (p1.y - p0.y) * (p2.x - p1.x);

        if cross.abs() > 1e-10 {
            let current_sign = if cross > 0.0 { 1i8 } else { -1i8 };
            if sign == 0 {
                sign = current_sign;
            } else if sign != current_sign {
                return false;
            }
        }
    }

    true
}

/// Simple fan triangulation for convex polygons
#[inline]
fn fan_triangulate(n: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity((n - 2) * 3);
    for i in 1..n - 1 {
        indices.push(0);
        indices.push(i);
        indices.push(i + 1);
    }
    indices
}

/// Triangulate a simple polygon (no holes)
/// Returns triangle indices into the input points
#[inline]
pub fn triangulate_polygon(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();

    if n < 3 {
        return Err(Error::TriangulationError(
            "Need at least 3 points to triangulate".to_string(),
        ));
    }

    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }

    // Convex faces (the common case for terrain quads) use a plain fan
    if n <= 8 && is_convex(points) {
        return Ok(fan_triangulate(n));
    }

    let mut vertices = Vec::with_capacity(n * 2);
    for p in points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    let indices = earcutr::earcut(&vertices, &[], 2)
        .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

    if indices.is_empty() {
        return Err(Error::TriangulationError(
            "Polygon produced no triangles".to_string(),
        ));
    }

    Ok(indices)
}

/// Triangulate a planar 3D polygon into a mesh
///
/// Triangles keep the winding of the input polygon, so their normals agree
/// with [`polygon_normal`] of the source points.
pub fn triangulate_planar(points: &[Point3<f64>]) -> Result<Mesh> {
    let normal = polygon_normal(points).ok_or_else(|| {
        Error::DegenerateGeometry("Polygon normal is not computable".to_string())
    })?;

    let (points_2d, _, _, _) = project_to_2d(points, &normal);
    let indices = triangulate_polygon(&points_2d)?;

    let mut mesh = Mesh::with_capacity(points.len(), indices.len());
    for p in points {
        mesh.add_vertex(*p);
    }
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0], tri[1], tri[2]);
        let raw = (points[b] - points[a]).cross(&(points[c] - points[a]));
        // earcut does not guarantee orientation
        if raw.dot(&normal) < 0.0 {
            mesh.add_triangle(a as u32, c as u32, b as u32);
        } else {
            mesh.add_triangle(a as u32, b as u32, c as u32);
        }
    }

    Ok(mesh)
}

/// Project 3D points onto a 2D plane defined by a normal
/// Returns 2D points and the coordinate system (u_axis, v_axis, origin)
#[inline]
pub fn project_to_2d(
    points_3d: &[Point3<f64>],
    normal: &Vector3<f64>,
) -> (Vec<Point2<f64>>, Vector3<f64>, Vector3<f64>, Point3<f64>) {
    if points_3d.is_empty() {
        return (
            Vec::new(),
            Vector3::zeros(),
            Vector3::zeros(),
            Point3::origin(),
        );
    }

    let origin = points_3d[0];
    let (u_axis, v_axis) = plane_basis(normal);

    let points_2d = points_3d
        .iter()
        .map(|p| {
            let v = p - origin;
            Point2::new(v.dot(&u_axis), v.dot(&v_axis))
        })
        .collect();

    (points_2d, u_axis, v_axis, origin)
}

/// Orthonormal in-plane axes for a plane normal
///
/// `u x v` points along `normal`, so 2D winding is preserved.
pub fn plane_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    // Pick the axis least parallel to the normal for a stable cross product
    let abs_x = normal.x.abs();
    let abs_y = normal.y.abs();
    let abs_z = normal.z.abs();

    let reference = if abs_x <= abs_y && abs_x <= abs_z {
        Vector3::new(1.0, 0.0, 0.0)
    } else if abs_y <= abs_z {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    };

    let v_axis = normal.cross(&reference).normalize();
    let u_axis = v_axis.cross(normal).normalize();
    (u_axis, v_axis)
}

/// Calculate the unit normal of a polygon using Newell's method
///
/// Returns `None` for polygons with fewer than 3 points or zero area.
#[inline]
pub fn polygon_normal(points: &[Point3<f64>]) -> Option<Vector3<f64>> {
    let n = points.len();
    if n < 3 {
        return None;
    }

    let mut normal = Vector3::<f64>::zeros();
    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];

        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }

    let len = normal.norm();
    if len > NORMAL_EPSILON && len.is_finite() {
        Some(normal / len)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangulate_square() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];

        let indices = triangulate_polygon(&points).unwrap();
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_triangulate_concave() {
        // L-shaped lot
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 2.0),
            Point2::new(2.0, 2.0),
            Point2::new(2.0, 4.0),
            Point2::new(0.0, 4.0),
        ];

        let indices = triangulate_polygon(&points).unwrap();
        assert_eq!(indices.len(), 12);
    }

    #[test]
    fn test_triangulate_insufficient_points() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert!(triangulate_polygon(&points).is_err());
    }

    #[test]
    fn test_polygon_normal_xy_plane() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];

        let normal = polygon_normal(&points).unwrap();
        assert!((normal.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_polygon_normal_collinear_is_none() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        assert!(polygon_normal(&points).is_none());
    }

    #[test]
    fn test_triangulate_planar_keeps_winding() {
        let points = vec![
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(10.0, 0.0, 5.0),
            Point3::new(10.0, 10.0, 6.0),
            Point3::new(0.0, 10.0, 6.0),
        ];

        let mesh = triangulate_planar(&points).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        for tri in mesh.triangles() {
            assert!(tri.raw_normal().z > 0.0);
        }
    }

    #[test]
    fn test_plane_basis_is_right_handed() {
        let normal = Vector3::new(0.0, 0.6, 0.8);
        let (u, v) = plane_basis(&normal);
        assert!((u.cross(&v) - normal).norm() < 1e-9);
    }
}
