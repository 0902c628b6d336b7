// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terrain analysis run and wall commit.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sitegrade_geometry::{
    divide_curves, face_normal, filter_terrain_faces, horizontal_edge,
    intersect_boundary_with_face, Curve, Face, Point3, ProjectionResult, RuleInput, RuleKind,
    RuleOutput, Segment, TerrainFeatures, Vector3, WallResult, WorstCase,
};

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::host::{ElementId, HostTransaction, SelectionHost, SurfaceGeometry, WallSpec};

/// Where the boundary curves come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySource {
    /// Curves of user-picked boundary elements
    Elements,
    /// Representative edge of a user-picked face
    Face,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub terrain: ElementId,
    pub boundary: BoundarySource,
}

/// Counters and timing of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub terrain_faces: usize,
    pub boundary_points: usize,
    pub gaps: usize,
    pub segments: usize,
    pub walls: usize,
    pub analysis_time_ms: u64,
}

/// Everything an analysis run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub reference_normal: Vector3<f64>,
    /// One result per resampled boundary point, in boundary order
    pub projections: Vec<ProjectionResult>,
    /// Index ranges into the non-gap projections
    pub segments: Vec<Segment>,
    /// Offset wall endpoints; `index` refers to `projections`
    pub walls: Vec<WallResult>,
    pub slope_curves: Vec<Curve>,
    pub wall_curves: Vec<Curve>,
    /// `index` refers to `projections`
    pub worst_case: Option<WorstCase>,
    pub terrain_features: Option<TerrainFeatures>,
    pub stats: AnalysisStats,
}

impl AnalysisReport {
    /// Number of boundary points with no terrain below or above them
    pub fn gaps(&self) -> usize {
        self.stats.gaps
    }
}

/// Run the terrain analysis against a host.
///
/// Fails before touching the document when the configuration is invalid,
/// the terrain has no usable faces, or a selection is missing. Degenerate
/// items inside valid input are skipped.
pub fn analyze<H>(
    host: &H,
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisReport>
where
    H: SurfaceGeometry + SelectionHost + ?Sized,
{
    let start = std::time::Instant::now();
    config.validate()?;

    let faces = host.surface_faces(request.terrain).map_err(|e| {
        Error::InvalidSelection(format!("terrain element {}: {}", request.terrain, e))
    })?;
    let terrain = filter_terrain_faces(&faces);
    if terrain.is_empty() {
        return Err(Error::NoTerrainFaces(request.terrain));
    }

    let normal = reference_normal(host)?;
    let curves = boundary_curves(host, request.boundary)?;
    let points = divide_curves(&curves, config.subdivision_level).ok_or_else(|| {
        Error::DegenerateGeometry(format!(
            "boundary of {} curves has no length to resample",
            curves.len()
        ))
    })?;

    tracing::info!(
        terrain_faces = terrain.len(),
        skipped_faces = faces.len() - terrain.len(),
        boundary_curves = curves.len(),
        boundary_points = points.len(),
        "Resampled boundary"
    );

    let projections = intersect_boundary_with_face(&points, &normal, &terrain);
    let gaps = projections.iter().filter(|r| r.is_gap()).count();
    if gaps > 0 {
        tracing::warn!(gaps, points = projections.len(), "Boundary points without terrain");
    }

    // Indices of projections that reached the terrain
    let valid: Vec<usize> = projections
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_gap())
        .map(|(i, _)| i)
        .collect();
    let projected: Vec<Point3<f64>> = valid
        .iter()
        .filter_map(|&i| projections[i].projected)
        .collect();
    let segments = config
        .strategy
        .segment(&projected, &config.segment, &config.adaptive);

    let constants = config.offset_constants();
    let outputs: Vec<Vec<RuleOutput>> = segments
        .par_iter()
        .map(|segment| {
            let indices = segment.slice(&valid);
            let starts: Vec<Option<Point3<f64>>> =
                indices.iter().map(|&i| Some(projections[i].source)).collect();
            let bounds: Vec<Option<Point3<f64>>> =
                indices.iter().map(|&i| projections[i].projected).collect();

            let mut outputs = config.rules.execute(&RuleInput {
                start_points: &starts,
                boundary_points: &bounds,
                normal,
                base_elevation: config.platform_elevation,
                level_elevation: config.level_elevation,
                draw: config.draw,
                constants,
            });
            for output in &mut outputs {
                remap_indices(output, indices);
            }
            outputs
        })
        .collect();

    let mut walls = Vec::new();
    let mut slope_curves = Vec::new();
    let mut wall_curves = Vec::new();
    let mut worst_case = None;
    for segment_outputs in outputs {
        // every rule derives the same endpoints
        if let Some(first) = segment_outputs.first() {
            walls.extend_from_slice(&first.walls);
        }
        for output in segment_outputs {
            worst_case = WorstCase::max(worst_case, output.worst_case);
            match output.rule {
                RuleKind::Slope => slope_curves.extend(output.curves),
                RuleKind::StructuralWall => wall_curves.extend(output.curves),
            }
        }
    }

    let terrain_features = if config.classify_terrain {
        Some(classify_terrain(host, &terrain, config)?)
    } else {
        None
    };

    let stats = AnalysisStats {
        terrain_faces: terrain.len(),
        boundary_points: points.len(),
        gaps,
        segments: segments.len(),
        walls: wall_curves.len(),
        analysis_time_ms: start.elapsed().as_millis() as u64,
    };

    match &worst_case {
        Some(worst) => tracing::info!(
            segments = stats.segments,
            walls = stats.walls,
            worst_distance = worst.distance,
            worst_height_delta = worst.height_delta,
            analysis_time_ms = stats.analysis_time_ms,
            "Analysis complete"
        ),
        None => tracing::info!(
            segments = stats.segments,
            analysis_time_ms = stats.analysis_time_ms,
            "Analysis complete without walls"
        ),
    }

    Ok(AnalysisReport {
        reference_normal: normal,
        projections,
        segments,
        walls,
        slope_curves,
        wall_curves,
        worst_case,
        terrain_features,
        stats,
    })
}

/// Create one host wall per wall curve inside a single transaction.
///
/// Either every wall is committed or, on the first failure, the
/// transaction is rolled back and nothing is left behind.
pub fn commit_walls<T>(
    tx: &mut T,
    report: &AnalysisReport,
    spec: &WallSpec,
) -> Result<Vec<ElementId>>
where
    T: HostTransaction + ?Sized,
{
    if report.wall_curves.is_empty() {
        tracing::info!("No wall curves to commit");
        return Ok(Vec::new());
    }

    tx.begin("Create retaining walls")?;

    let mut created = Vec::with_capacity(report.wall_curves.len());
    for curve in &report.wall_curves {
        match tx.create_wall(curve, spec) {
            Ok(id) => created.push(id),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    created = created.len(),
                    "Wall creation failed, rolling back"
                );
                rollback(tx);
                return Err(e.into());
            }
        }
    }

    if let Err(e) = tx.commit() {
        tracing::warn!(error = %e, "Commit failed, rolling back");
        rollback(tx);
        return Err(e.into());
    }

    tracing::info!(
        walls = created.len(),
        wall_type = %spec.wall_type,
        level = %spec.level,
        "Committed retaining walls"
    );
    Ok(created)
}

fn rollback<T: HostTransaction + ?Sized>(tx: &mut T) {
    if let Err(e) = tx.rollback() {
        tracing::warn!(error = %e, "Rollback failed");
    }
}

fn reference_normal<H: SelectionHost + ?Sized>(host: &H) -> Result<Vector3<f64>> {
    let (face, transform) = host
        .pick_reference_face()
        .ok_or_else(|| Error::InvalidSelection("no reference face selected".into()))?;
    let placed = face.transformed(&transform);

    face_normal(&placed).map(|n| n.normal).ok_or_else(|| {
        Error::InvalidSelection(format!(
            "reference face with {} vertices has no computable normal",
            placed.vertices().len()
        ))
    })
}

fn boundary_curves<H>(host: &H, source: BoundarySource) -> Result<Vec<Curve>>
where
    H: SelectionHost + ?Sized,
{
    match source {
        BoundarySource::Elements => {
            let elements = host
                .pick_boundary_elements()
                .filter(|e| !e.is_empty())
                .ok_or_else(|| Error::InvalidSelection("no boundary elements selected".into()))?;
            Ok(elements.into_iter().flat_map(|e| e.curves).collect())
        }
        BoundarySource::Face => {
            let face = host
                .pick_boundary_face()
                .ok_or_else(|| Error::InvalidSelection("no boundary face selected".into()))?;
            horizontal_edge(&face, false).map(|edge| vec![edge]).ok_or_else(|| {
                Error::DegenerateGeometry("boundary face has no horizontal extent".into())
            })
        }
    }
}

/// Point indices inside a rule output are relative to its segment
fn remap_indices(output: &mut RuleOutput, indices: &[usize]) {
    for wall in &mut output.walls {
        wall.index = indices[wall.index];
    }
    if let Some(worst) = &mut output.worst_case {
        worst.index = indices[worst.index];
    }
}

fn classify_terrain<H>(
    host: &H,
    terrain: &[Face],
    config: &AnalysisConfig,
) -> Result<TerrainFeatures>
where
    H: SurfaceGeometry + ?Sized,
{
    let mut samples = Vec::new();
    for face in terrain {
        match host.triangulate(face) {
            Ok(mesh) => samples.extend_from_slice(&mesh.vertices),
            Err(e) => tracing::debug!(error = %e, "Skipping terrain face in classification"),
        }
    }
    Ok(TerrainFeatures::from_points(&samples, &config.features)?)
}
