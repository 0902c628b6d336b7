// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Grouping of projected points into continuous wall chains.

use std::ops::Range;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

/// Thresholds for [`connect_segments`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOptions {
    /// Largest gap between consecutive points
    pub max_distance: f64,
    /// Largest turn between consecutive edges, in degrees
    pub max_angle_deg: f64,
    /// Largest cumulative length of one segment
    pub max_segment_length: f64,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            max_distance: 20.0,
            max_angle_deg: 30.0,
            max_segment_length: 200.0,
        }
    }
}

/// Thresholds for [`connect_points`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveOptions {
    /// Largest absolute gap between consecutive points
    pub max_distance: f64,
    /// Largest gap relative to the running average gap of the current run
    pub max_relative_factor: f64,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            max_distance: 20.0,
            max_relative_factor: 20.0,
        }
    }
}

/// Half-open index range `[start, end)` into the segmented point slice.
///
/// Produced segments always hold at least two points and never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The slice of `items` covered by this segment
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.range()]
    }
}

/// Which segmentation algorithm to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStrategy {
    /// Distance, turn angle and length limits ([`connect_segments`])
    #[default]
    AngleAware,
    /// Distance limit relative to the running average gap ([`connect_points`])
    Adaptive,
}

impl SegmentStrategy {
    pub fn segment(
        &self,
        points: &[Point3<f64>],
        angle_aware: &SegmentOptions,
        adaptive: &AdaptiveOptions,
    ) -> Vec<Segment> {
        match self {
            SegmentStrategy::AngleAware => connect_segments(points, angle_aware),
            SegmentStrategy::Adaptive => connect_points(points, adaptive),
        }
    }
}

/// Accumulates segments, dropping runs too short to form a wall
#[derive(Default)]
struct SegmentCollector {
    segments: Vec<Segment>,
}

impl SegmentCollector {
    fn close(&mut self, start: usize, end: usize) {
        if end >= start + 2 {
            self.segments.push(Segment { start, end });
        }
    }
}

/// Split an ordered point run on distance, turn angle and length limits.
///
/// A point joins the current segment when its distance to the previous
/// point is within `max_distance`, the turn against the previous edge is
/// within `max_angle_deg` (checked once the segment holds two points), and
/// the segment length stays within `max_segment_length`. Otherwise the
/// segment is closed and a new one starts at that point.
pub fn connect_segments(points: &[Point3<f64>], options: &SegmentOptions) -> Vec<Segment> {
    let mut out = SegmentCollector::default();
    if points.len() < 2 {
        return out.segments;
    }

    let mut start = 0;
    let mut length = 0.0;
    let mut direction: Option<Vector3<f64>> = None;

    for i in 1..points.len() {
        let edge = points[i] - points[i - 1];
        let distance = edge.norm();

        let turn_ok = match direction {
            Some(prev) if i - start >= 2 && distance > EPSILON => {
                turn_angle_deg(&prev, &edge) <= options.max_angle_deg
            }
            _ => true,
        };
        let joins = distance <= options.max_distance
            && turn_ok
            && length + distance <= options.max_segment_length;

        if joins {
            length += distance;
            if distance > EPSILON {
                direction = Some(edge);
            }
        } else {
            out.close(start, i);
            start = i;
            length = 0.0;
            direction = None;
        }
    }
    out.close(start, points.len());

    tracing::debug!(
        points = points.len(),
        segments = out.segments.len(),
        "Connected segments"
    );
    out.segments
}

/// Split an ordered point run on absolute and relative gap limits.
///
/// A gap is rejected when it exceeds `max_distance` or
/// `max_relative_factor` times the average gap of the current run. A
/// rejection closes the run and starts a new one at the rejected point.
pub fn connect_points(points: &[Point3<f64>], options: &AdaptiveOptions) -> Vec<Segment> {
    let mut out = SegmentCollector::default();
    if points.len() < 2 {
        return out.segments;
    }

    let mut start = 0;
    let mut gap_sum = 0.0;
    let mut gap_count = 0usize;

    for i in 1..points.len() {
        let gap = (points[i] - points[i - 1]).norm();
        let average = (gap_count > 0).then(|| gap_sum / gap_count as f64);
        let too_far = gap > options.max_distance
            || average.is_some_and(|avg| avg > EPSILON && gap > options.max_relative_factor * avg);

        if too_far {
            out.close(start, i);
            start = i;
            gap_sum = 0.0;
            gap_count = 0;
        } else {
            gap_sum += gap;
            gap_count += 1;
        }
    }
    out.close(start, points.len());

    out.segments
}

fn turn_angle_deg(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let denom = a.norm() * b.norm();
    if denom < EPSILON {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}
