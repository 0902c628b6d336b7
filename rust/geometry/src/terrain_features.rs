// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Peak and valley classification of terrain samples.
//!
//! A sample is a valley when none of its grid neighbors sits more than
//! `tolerance` below it, and a peak when none sits more than `tolerance`
//! above it. Neighbors closer than `tolerance` are treated as duplicates of
//! the sample and ignored.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::spatial_index::SpatialIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Valley,
    Peak,
}

/// Parameters for terrain feature detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureOptions {
    /// Base grid cell size; pass `k` uses `cell_size * k`
    pub cell_size: f64,
    /// Elevation and duplicate tolerance
    pub tolerance: f64,
    /// Maximum refinement passes
    pub iterations: u32,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self {
            cell_size: 5.0,
            tolerance: 0.05,
            iterations: 3,
        }
    }
}

/// Peaks and valleys found on a terrain surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainFeatures {
    pub peaks: Vec<Point3<f64>>,
    pub valleys: Vec<Point3<f64>>,
}

impl TerrainFeatures {
    /// Classify a cloud of terrain samples.
    ///
    /// Samples are merged within `tolerance` first so shared face vertices
    /// are reported once.
    pub fn from_points(points: &[Point3<f64>], options: &FeatureOptions) -> Result<Self> {
        let samples = dedup_points(points, options.tolerance)?;
        let peaks =
            refine_peaks(&samples, options.cell_size, options.tolerance, options.iterations)?;
        let valleys =
            refine_valleys(&samples, options.cell_size, options.tolerance, options.iterations)?;

        tracing::debug!(
            samples = samples.len(),
            peaks = peaks.len(),
            valleys = valleys.len(),
            "Classified terrain features"
        );

        Ok(Self {
            peaks: peaks.into_iter().map(|i| samples[i]).collect(),
            valleys: valleys.into_iter().map(|i| samples[i]).collect(),
        })
    }
}

/// Single-pass valley filter over all points
pub fn find_valleys(points: &[Point3<f64>], cell_size: f64, tolerance: f64) -> Result<Vec<usize>> {
    let all: Vec<usize> = (0..points.len()).collect();
    classify(points, &all, cell_size, tolerance, Extremum::Valley)
}

/// Single-pass peak filter over all points
pub fn find_peaks(points: &[Point3<f64>], cell_size: f64, tolerance: f64) -> Result<Vec<usize>> {
    let all: Vec<usize> = (0..points.len()).collect();
    classify(points, &all, cell_size, tolerance, Extremum::Peak)
}

/// Repeated valley filtering with a growing neighborhood.
///
/// Each pass keeps the candidates that are still valleys at cell size
/// `cell_size * pass`, judged against `tolerance * tolerance`. Stops as soon
/// as a pass empties the candidate set and returns the last non-empty set.
pub fn refine_valleys(
    points: &[Point3<f64>],
    cell_size: f64,
    tolerance: f64,
    max_iterations: u32,
) -> Result<Vec<usize>> {
    let tolerance = tolerance * tolerance;
    let mut candidates: Vec<usize> = (0..points.len()).collect();
    let mut result = Vec::new();

    for pass in 1..=max_iterations {
        let next = classify(
            points,
            &candidates,
            cell_size * pass as f64,
            tolerance,
            Extremum::Valley,
        )?;
        if next.is_empty() {
            break;
        }
        result = next.clone();
        candidates = next;
    }

    Ok(result)
}

/// Repeated peak search with a growing neighborhood.
///
/// Passes use the squared tolerance like [`refine_valleys`], but this stops
/// at the first pass that finds any peak at all.
pub fn refine_peaks(
    points: &[Point3<f64>],
    cell_size: f64,
    tolerance: f64,
    max_iterations: u32,
) -> Result<Vec<usize>> {
    let tolerance = tolerance * tolerance;
    let all: Vec<usize> = (0..points.len()).collect();

    for pass in 1..=max_iterations {
        let peaks = classify(points, &all, cell_size * pass as f64, tolerance, Extremum::Peak)?;
        if !peaks.is_empty() {
            return Ok(peaks);
        }
    }

    Ok(Vec::new())
}

/// Merge points closer than `tolerance`, keeping the first occurrence.
pub fn dedup_points(points: &[Point3<f64>], tolerance: f64) -> Result<Vec<Point3<f64>>> {
    let tol_sq = tolerance * tolerance;
    let mut index = SpatialIndex::new(tolerance.max(1e-9))?;
    let mut kept: Vec<Point3<f64>> = Vec::with_capacity(points.len());

    for p in points {
        let duplicate = index
            .neighbors(p, 1)
            .into_iter()
            .any(|k| (kept[k] - p).norm_squared() <= tol_sq);
        if !duplicate {
            index.insert(kept.len(), p);
            kept.push(*p);
        }
    }

    Ok(kept)
}

fn classify(
    points: &[Point3<f64>],
    candidates: &[usize],
    cell_size: f64,
    tolerance: f64,
    kind: Extremum,
) -> Result<Vec<usize>> {
    let index = SpatialIndex::from_points(points, cell_size)?;
    let tol_sq = tolerance * tolerance;

    let result = candidates
        .iter()
        .copied()
        .filter(|&i| {
            let p = &points[i];
            index.neighbors(p, 1).into_iter().all(|j| {
                if j == i {
                    return true;
                }
                let q = &points[j];
                if (q - p).norm_squared() <= tol_sq {
                    return true;
                }
                match kind {
                    Extremum::Valley => q.z >= p.z - tolerance,
                    Extremum::Peak => q.z <= p.z + tolerance,
                }
            })
        })
        .collect();

    Ok(result)
}
