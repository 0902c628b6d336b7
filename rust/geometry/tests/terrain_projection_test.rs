// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary-to-wall geometry across resampling, projection, segmentation
//! and the offset rules.

use approx::assert_relative_eq;
use sitegrade_geometry::{
    connect_segments, divide_curves, filter_terrain_faces, intersect_boundary_with_face, Curve,
    Face, OffsetConstants, Point3, RuleInput, RuleKind, RuleSet, SegmentOptions, Vector3,
};

fn flat_terrain(z: f64) -> Vec<Face> {
    vec![Face::new(vec![
        Point3::new(-10.0, -10.0, z),
        Point3::new(60.0, -10.0, z),
        Point3::new(60.0, 10.0, z),
        Point3::new(-10.0, 10.0, z),
    ])
    .unwrap()]
}

#[test]
fn test_flat_terrain_above_boundary() {
    let faces = filter_terrain_faces(&flat_terrain(5.0));
    assert_eq!(faces.len(), 1);

    let boundary = vec![Curve::line(
        Point3::new(0.0, 0.0, -5.0),
        Point3::new(40.0, 0.0, -5.0),
    )];
    let points = divide_curves(&boundary, 4).unwrap();
    assert_eq!(points.len(), 5);
    for (i, p) in points.iter().enumerate() {
        assert_relative_eq!(p.x, 10.0 * i as f64, epsilon = 1e-9);
    }

    let normal = Vector3::new(1.0, 0.0, 0.0);
    let projections = intersect_boundary_with_face(&points, &normal, &faces);
    assert!(projections.iter().all(|r| !r.is_gap()));
    for r in &projections {
        assert_relative_eq!(r.projected.unwrap().z, 5.0);
    }

    let projected: Vec<Point3<f64>> = projections.iter().filter_map(|r| r.projected).collect();
    let segments = connect_segments(&projected, &SegmentOptions::default());
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].len(), 5);

    let starts: Vec<_> = projections.iter().map(|r| Some(r.source)).collect();
    let bounds: Vec<_> = projections.iter().map(|r| r.projected).collect();
    let outputs = RuleSet::default().execute(&RuleInput {
        start_points: &starts,
        boundary_points: &bounds,
        normal,
        base_elevation: 0.0,
        level_elevation: 0.0,
        draw: true,
        constants: OffsetConstants::new(2.0, 3.0),
    });

    assert_eq!(outputs.len(), 2);
    let worst = outputs[0].worst_case.unwrap();
    assert_relative_eq!(worst.height_delta, 5.0);
    assert_relative_eq!(worst.distance, 0.0);

    // (5 - 0) / 2 beats the 2.0 minimum
    for wall in &outputs[0].walls {
        assert_relative_eq!(wall.offset, 2.5);
        assert_relative_eq!(wall.end.x, wall.start.x + 2.5);
    }

    let wall_curves = &outputs
        .iter()
        .find(|o| o.rule == RuleKind::StructuralWall)
        .unwrap()
        .curves;
    assert_eq!(wall_curves.len(), 4);
    let total: f64 = wall_curves.iter().map(Curve::length).sum();
    assert_relative_eq!(total, 40.0, epsilon = 1e-9);
}

#[test]
fn test_boundary_past_terrain_edge_leaves_gaps() {
    let faces = filter_terrain_faces(&flat_terrain(2.0));
    let boundary = vec![Curve::line(
        Point3::new(40.0, 0.0, 0.0),
        Point3::new(80.0, 0.0, 0.0),
    )];
    let points = divide_curves(&boundary, 4).unwrap();
    let projections = intersect_boundary_with_face(&points, &Vector3::x(), &faces);

    // x = 40, 50, 60 lie on the quad; 70 and 80 lie beyond it
    let gaps: Vec<bool> = projections.iter().map(|r| r.is_gap()).collect();
    assert_eq!(gaps, vec![false, false, false, true, true]);
}

#[test]
fn test_sloped_terrain_heights_follow_plane() {
    // z = 0.1 * x
    let faces = filter_terrain_faces(&[Face::new(vec![
        Point3::new(0.0, -5.0, 0.0),
        Point3::new(100.0, -5.0, 10.0),
        Point3::new(100.0, 5.0, 10.0),
        Point3::new(0.0, 5.0, 0.0),
    ])
    .unwrap()]);
    assert_eq!(faces.len(), 1);

    let points = divide_curves(
        &[Curve::line(Point3::new(10.0, 0.0, 0.0), Point3::new(90.0, 0.0, 0.0))],
        8,
    )
    .unwrap();
    let projections = intersect_boundary_with_face(&points, &Vector3::x(), &faces);
    for r in &projections {
        let hit = r.projected.unwrap();
        assert_relative_eq!(hit.z, 0.1 * hit.x, epsilon = 1e-9);
    }
}
