// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Even arc-length resampling of boundary curve chains.

use nalgebra::Point3;

use crate::curve::Curve;

/// Divide an ordered chain of curves into `subdivisions` equal arc-length steps.
///
/// Returns `subdivisions + 1` points: the first bound curve's start point
/// followed by one point per step, walking across curve boundaries as the
/// cumulative length grows. Unbound curves (zero length, non-finite) are
/// dropped before walking.
///
/// Returns `None` when `subdivisions < 2` or no bound length remains.
pub fn divide_curves(curves: &[Curve], subdivisions: usize) -> Option<Vec<Point3<f64>>> {
    if subdivisions < 2 {
        return None;
    }

    let bound: Vec<&Curve> = curves.iter().filter(|c| c.is_bound()).collect();
    if bound.len() < curves.len() {
        tracing::debug!(
            skipped = curves.len() - bound.len(),
            "Skipping unbound boundary curves"
        );
    }

    let lengths: Vec<f64> = bound.iter().map(|c| c.length()).collect();
    let total: f64 = lengths.iter().sum();
    if bound.is_empty() || !(total > 0.0) {
        return None;
    }

    let step = total / subdivisions as f64;
    let last = bound[bound.len() - 1];

    let mut points = Vec::with_capacity(subdivisions + 1);
    points.push(bound[0].start());

    let mut curve_index = 0;
    let mut curve_offset = 0.0;

    for k in 1..=subdivisions {
        let target = step * k as f64;

        while curve_index < bound.len() && target > curve_offset + lengths[curve_index] {
            curve_offset += lengths[curve_index];
            curve_index += 1;
        }

        // Accumulated rounding can push the final target past the chain end
        if curve_index >= bound.len() {
            points.push(last.end());
            continue;
        }

        let t = (target - curve_offset) / lengths[curve_index];
        points.push(bound[curve_index].point_at(t));
    }

    Some(points)
}
