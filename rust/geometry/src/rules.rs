// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Offset rules
//!
//! Each rule turns pairs of (start point, projected terrain point) into wall
//! endpoints pushed out along the reference normal. The push distance grows
//! with the height of the terrain above the platform base, bounded below by
//! a minimum offset.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;

/// Hard floor for the minimum offset distance
pub const MIN_OFFSET_FLOOR: f64 = 2.0;

/// Minimum offset derived from the configured distance and wall height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetConstants {
    pub minimum_distance: f64,
    pub wall_height: f64,
}

impl OffsetConstants {
    /// The minimum is at least [`MIN_OFFSET_FLOOR`], and at least
    /// `wall_height - 1` for walls taller than that.
    pub fn new(configured_minimum: f64, wall_height: f64) -> Self {
        let mut minimum_distance = configured_minimum.max(MIN_OFFSET_FLOOR);
        if wall_height > minimum_distance {
            minimum_distance = wall_height - 1.0;
        }
        Self {
            minimum_distance,
            wall_height,
        }
    }

    /// Offset for a terrain point at elevation `boundary_z`
    pub fn offset_for(&self, boundary_z: f64, base_elevation: f64) -> f64 {
        self.minimum_distance.max((boundary_z - base_elevation) / 2.0)
    }
}

/// Wall endpoint geometry for one point pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallResult {
    /// Index of the pair in the rule input
    pub index: usize,
    pub start: Point3<f64>,
    pub boundary: Point3<f64>,
    pub end: Point3<f64>,
    pub offset: f64,
    /// Derived while the rule runs; never read back from serialized data
    #[serde(skip_deserializing)]
    connecting_curve: Option<Curve>,
}

impl WallResult {
    /// Line from the previous pair's end point, when that pair was valid
    pub fn connecting_curve(&self) -> Option<&Curve> {
        self.connecting_curve.as_ref()
    }
}

/// Pair with the greatest terrain height above the platform base
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorstCase {
    pub index: usize,
    /// Planar distance between start and terrain point
    pub distance: f64,
    pub height_delta: f64,
}

impl WorstCase {
    /// Keep the first strict maximum
    pub fn max(current: Option<Self>, candidate: Option<Self>) -> Option<Self> {
        match (current, candidate) {
            (Some(a), Some(b)) if b.height_delta > a.height_delta => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        }
    }
}

/// Everything a rule reads
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub start_points: &'a [Option<Point3<f64>>],
    pub boundary_points: &'a [Option<Point3<f64>>],
    pub normal: Vector3<f64>,
    pub base_elevation: f64,
    pub level_elevation: f64,
    pub draw: bool,
    pub constants: OffsetConstants,
}

/// What a rule produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutput {
    pub rule: RuleKind,
    pub walls: Vec<WallResult>,
    /// Drawn geometry: slope lines or wall curves, depending on the rule
    pub curves: Vec<Curve>,
    pub worst_case: Option<WorstCase>,
}

impl RuleOutput {
    fn empty(rule: RuleKind) -> Self {
        Self {
            rule,
            walls: Vec::new(),
            curves: Vec::new(),
            worst_case: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Slope lines from terrain point to wall end
    Slope,
    /// Wall curves along the offset end points
    StructuralWall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub kind: RuleKind,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Rule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            is_active: true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            RuleKind::Slope => "Slope",
            RuleKind::StructuralWall => "Structural Wall",
        }
    }

    pub fn execute(&self, input: &RuleInput<'_>) -> RuleOutput {
        let Some((walls, worst_case)) = compute_walls(input) else {
            return RuleOutput::empty(self.kind);
        };

        let curves = if input.draw {
            match self.kind {
                RuleKind::Slope => walls
                    .iter()
                    .map(|w| Curve::line(w.boundary, w.end))
                    .collect(),
                RuleKind::StructuralWall => walls
                    .iter()
                    .filter_map(|w| w.connecting_curve)
                    .map(|c| c.flattened(input.level_elevation))
                    .collect(),
            }
        } else {
            Vec::new()
        };

        RuleOutput {
            rule: self.kind,
            walls,
            curves,
            worst_case,
        }
    }
}

/// Ordered collection of rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(vec![Rule::new(RuleKind::Slope), Rule::new(RuleKind::StructuralWall)])
    }
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn active(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.is_active)
    }

    /// Run every active rule in declaration order
    pub fn execute(&self, input: &RuleInput<'_>) -> Vec<RuleOutput> {
        self.active()
            .map(|rule| {
                let output = rule.execute(input);
                tracing::debug!(
                    rule = rule.name(),
                    walls = output.walls.len(),
                    curves = output.curves.len(),
                    "Executed rule"
                );
                output
            })
            .collect()
    }
}

/// Shared offset computation of all rules.
///
/// Returns `None` when the normal has no direction.
fn compute_walls(input: &RuleInput<'_>) -> Option<(Vec<WallResult>, Option<WorstCase>)> {
    let length = input.normal.norm();
    if !length.is_finite() || length < 1e-12 {
        tracing::debug!("Skipping rule evaluation for a zero-length normal");
        return None;
    }
    let direction = input.normal / length;

    let count = input.start_points.len().min(input.boundary_points.len());
    let mut walls = Vec::with_capacity(count);
    let mut worst: Option<WorstCase> = None;
    let mut previous_end: Option<Point3<f64>> = None;

    for i in 0..count {
        let (Some(start), Some(boundary)) = (input.start_points[i], input.boundary_points[i])
        else {
            previous_end = None;
            continue;
        };

        let offset = input.constants.offset_for(boundary.z, input.base_elevation);
        let end = start + direction * offset;

        let height_delta = boundary.z - input.base_elevation;
        worst = WorstCase::max(
            worst,
            Some(WorstCase {
                index: i,
                distance: (boundary.xy() - start.xy()).norm(),
                height_delta,
            }),
        );

        walls.push(WallResult {
            index: i,
            start,
            boundary,
            end,
            offset,
            connecting_curve: previous_end.map(|prev| Curve::line(prev, end)),
        });
        previous_end = Some(end);
    }

    Some((walls, worst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pts(coords: &[(f64, f64, f64)]) -> Vec<Option<Point3<f64>>> {
        coords
            .iter()
            .map(|&(x, y, z)| Some(Point3::new(x, y, z)))
            .collect()
    }

    fn input<'a>(
        starts: &'a [Option<Point3<f64>>],
        boundaries: &'a [Option<Point3<f64>>],
    ) -> RuleInput<'a> {
        RuleInput {
            start_points: starts,
            boundary_points: boundaries,
            normal: Vector3::new(2.0, 0.0, 0.0),
            base_elevation: 0.0,
            level_elevation: 0.0,
            draw: true,
            constants: OffsetConstants::new(2.0, 3.0),
        }
    }

    #[test]
    fn constants_floor_and_wall_height() {
        assert_relative_eq!(OffsetConstants::new(0.5, 1.0).minimum_distance, 2.0);
        assert_relative_eq!(OffsetConstants::new(2.0, 3.0).minimum_distance, 2.0);
        assert_relative_eq!(OffsetConstants::new(2.0, 6.0).minimum_distance, 5.0);
        assert_relative_eq!(OffsetConstants::new(4.0, 3.0).minimum_distance, 4.0);
    }

    #[test]
    fn flat_terrain_uses_minimum_offset() {
        let starts = pts(&[(0.0, 0.0, 0.0)]);
        let bounds = pts(&[(0.0, 0.0, 0.0)]);
        let out = Rule::new(RuleKind::Slope).execute(&input(&starts, &bounds));

        assert_eq!(out.walls.len(), 1);
        assert_relative_eq!(out.walls[0].offset, 2.0);
        assert_relative_eq!(out.walls[0].end.x, 2.0);
    }

    #[test]
    fn tall_terrain_pushes_further() {
        let starts = pts(&[(0.0, 0.0, 0.0)]);
        let bounds = pts(&[(0.0, 0.0, 10.0)]);
        let out = Rule::new(RuleKind::Slope).execute(&input(&starts, &bounds));
        assert_relative_eq!(out.walls[0].offset, 5.0);
        assert_eq!(out.curves, vec![Curve::line(bounds[0].unwrap(), Point3::new(5.0, 0.0, 0.0))]);
    }

    #[test]
    fn gaps_break_connecting_chain() {
        let starts = vec![
            Some(Point3::new(0.0, 0.0, 0.0)),
            Some(Point3::new(0.0, 1.0, 0.0)),
            None,
            Some(Point3::new(0.0, 3.0, 0.0)),
            Some(Point3::new(0.0, 4.0, 0.0)),
        ];
        let bounds = pts(&[
            (0.0, 0.0, 1.0),
            (0.0, 1.0, 1.0),
            (0.0, 2.0, 1.0),
            (0.0, 3.0, 1.0),
            (0.0, 4.0, 1.0),
        ]);
        let out = Rule::new(RuleKind::StructuralWall).execute(&input(&starts, &bounds));

        assert_eq!(out.walls.len(), 4);
        let connected: Vec<usize> = out
            .walls
            .iter()
            .filter(|w| w.connecting_curve().is_some())
            .map(|w| w.index)
            .collect();
        assert_eq!(connected, vec![1, 4]);
        assert_eq!(out.curves.len(), 2);
    }

    #[test]
    fn connecting_curve_is_not_restored_from_json() {
        let starts = pts(&[(0.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        let out = Rule::new(RuleKind::StructuralWall).execute(&input(&starts, &starts));
        assert!(out.walls[1].connecting_curve().is_some());

        let json = serde_json::to_value(out.walls[1]).unwrap();
        assert!(json.get("connecting_curve").is_some());
        let back: WallResult = serde_json::from_value(json).unwrap();
        assert!(back.connecting_curve().is_none());
        assert_eq!(back.end, out.walls[1].end);
    }

    #[test]
    fn wall_curves_are_flattened_to_level() {
        let starts = pts(&[(0.0, 0.0, 3.0), (0.0, 5.0, 3.0)]);
        let bounds = pts(&[(0.0, 0.0, 1.0), (0.0, 5.0, 1.0)]);
        let mut rule_input = input(&starts, &bounds);
        rule_input.level_elevation = -1.5;

        let out = Rule::new(RuleKind::StructuralWall).execute(&rule_input);
        let curve = out.curves[0];
        assert_eq!(curve.start(), Point3::new(2.0, 0.0, -1.5));
        assert_eq!(curve.end(), Point3::new(2.0, 5.0, -1.5));
    }

    #[test]
    fn worst_case_keeps_first_maximum() {
        let starts = pts(&[(0.0, 0.0, 0.0), (0.0, 1.0, 0.0), (0.0, 2.0, 0.0)]);
        let bounds = pts(&[(3.0, 4.0, 2.0), (0.0, 1.0, 6.0), (0.0, 2.0, 6.0)]);
        let out = Rule::new(RuleKind::Slope).execute(&input(&starts, &bounds));

        let worst = out.worst_case.unwrap();
        assert_eq!(worst.index, 1);
        assert_relative_eq!(worst.height_delta, 6.0);
        assert_relative_eq!(worst.distance, 0.0);

        let first = WorstCase::max(
            Some(WorstCase {
                index: 0,
                distance: 5.0,
                height_delta: 2.0,
            }),
            Some(WorstCase {
                index: 9,
                distance: 1.0,
                height_delta: 2.0,
            }),
        );
        assert_eq!(first.unwrap().index, 0);
    }

    #[test]
    fn no_drawing_without_draw_flag() {
        let starts = pts(&[(0.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        let bounds = pts(&[(0.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        let mut rule_input = input(&starts, &bounds);
        rule_input.draw = false;

        for output in RuleSet::default().execute(&rule_input) {
            assert_eq!(output.walls.len(), 2);
            assert!(output.curves.is_empty());
        }
    }

    #[test]
    fn zero_normal_yields_nothing() {
        let starts = pts(&[(0.0, 0.0, 0.0)]);
        let mut rule_input = input(&starts, &starts);
        rule_input.normal = Vector3::zeros();
        let out = Rule::new(RuleKind::Slope).execute(&rule_input);
        assert!(out.walls.is_empty());
        assert!(out.worst_case.is_none());
    }

    #[test]
    fn inactive_rules_are_skipped() {
        let rules = RuleSet::new(vec![
            Rule {
                kind: RuleKind::Slope,
                is_active: false,
            },
            Rule::new(RuleKind::StructuralWall),
        ]);
        let starts = pts(&[(0.0, 0.0, 0.0)]);
        let outputs = rules.execute(&input(&starts, &starts));
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].rule, RuleKind::StructuralWall);
    }

    #[test]
    fn mismatched_lengths_use_shorter() {
        let starts = pts(&[(0.0, 0.0, 0.0), (0.0, 1.0, 0.0), (0.0, 2.0, 0.0)]);
        let bounds = pts(&[(0.0, 0.0, 0.0)]);
        let out = Rule::new(RuleKind::Slope).execute(&input(&starts, &bounds));
        assert_eq!(out.walls.len(), 1);
    }
}
