// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SiteGrade Geometry
//!
//! Terrain projection and retaining-wall offset geometry: even resampling of
//! boundary curves, vertical projection onto faceted terrain, segmentation
//! of projected points into wall chains and the offset rules that turn them
//! into wall geometry. Uses earcutr for face triangulation and nalgebra for
//! all vector math.

pub mod curve;
pub mod error;
pub mod mesh;
pub mod projection;
pub mod resample;
pub mod rules;
pub mod segment;
pub mod spatial_index;
pub mod surface;
pub mod terrain_features;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use curve::Curve;
pub use error::{Error, Result};
pub use mesh::{Mesh, Triangle};
pub use projection::{intersect_boundary_with_face, project_onto_terrain, ProjectionResult};
pub use resample::divide_curves;
pub use rules::{
    OffsetConstants, Rule, RuleInput, RuleKind, RuleOutput, RuleSet, WallResult, WorstCase,
};
pub use segment::{
    connect_points, connect_segments, AdaptiveOptions, Segment, SegmentOptions, SegmentStrategy,
};
pub use spatial_index::SpatialIndex;
pub use surface::{
    face_normal, filter_terrain_faces, horizontal_edge, is_projectable_normal, Face, FaceNormal,
};
pub use terrain_features::{FeatureOptions, TerrainFeatures};
pub use triangulation::{polygon_normal, triangulate_planar, triangulate_polygon};
