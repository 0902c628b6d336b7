// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Analysis configuration
//!
//! Loaded from JSON with per-field defaults, then optionally overridden from
//! `SITEGRADE_*` environment variables.

use serde::{Deserialize, Serialize};
use sitegrade_geometry::{
    AdaptiveOptions, FeatureOptions, OffsetConstants, RuleSet, SegmentOptions, SegmentStrategy,
};

use crate::error::{Error, Result};
use crate::host::WallSpec;

/// User-visible analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of equal steps the boundary is resampled into
    pub subdivision_level: usize,
    /// Configured minimum wall offset (m), floored at 2.0
    pub minimum_distance: f64,
    /// Retaining wall height (m)
    pub wall_height: f64,
    /// Platform base elevation the terrain is measured against (m)
    pub platform_elevation: f64,
    /// Elevation drawn wall curves are placed at (m)
    pub level_elevation: f64,
    /// Emit slope lines and wall curves
    pub draw: bool,
    pub strategy: SegmentStrategy,
    pub segment: SegmentOptions,
    pub adaptive: AdaptiveOptions,
    pub rules: RuleSet,
    /// Report terrain peaks and valleys
    pub classify_terrain: bool,
    pub features: FeatureOptions,
    /// Host wall type used when committing walls
    pub wall_type: String,
    /// Host level name used when committing walls
    pub level: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            subdivision_level: 20,
            minimum_distance: 2.0,
            wall_height: 3.0,
            platform_elevation: 0.0,
            level_elevation: 0.0,
            draw: true,
            strategy: SegmentStrategy::default(),
            segment: SegmentOptions::default(),
            adaptive: AdaptiveOptions::default(),
            rules: RuleSet::default(),
            classify_terrain: false,
            features: FeatureOptions::default(),
            wall_type: "Retaining - 300mm Concrete".into(),
            level: "Level 0".into(),
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SITEGRADE_*` overrides from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "Ignoring unparsable override");
                    None
                }
            }
        }
        let lookup: &dyn Fn(&str) -> Option<String> = &lookup;

        if let Some(v) = parsed(lookup, "SITEGRADE_SUBDIVISION_LEVEL") {
            self.subdivision_level = v;
        }
        if let Some(v) = parsed(lookup, "SITEGRADE_MINIMUM_DISTANCE") {
            self.minimum_distance = v;
        }
        if let Some(v) = parsed(lookup, "SITEGRADE_WALL_HEIGHT") {
            self.wall_height = v;
        }
        if let Some(v) = parsed(lookup, "SITEGRADE_PLATFORM_ELEVATION") {
            self.platform_elevation = v;
        }
        if let Some(v) = parsed(lookup, "SITEGRADE_LEVEL_ELEVATION") {
            self.level_elevation = v;
        }
        if let Some(v) = parsed(lookup, "SITEGRADE_DRAW") {
            self.draw = v;
        }
        if let Some(v) = parsed(lookup, "SITEGRADE_CLASSIFY_TERRAIN") {
            self.classify_terrain = v;
        }
        if let Some(raw) = lookup("SITEGRADE_STRATEGY") {
            match parse_strategy(&raw) {
                Some(strategy) => self.strategy = strategy,
                None => tracing::warn!(value = %raw, "Ignoring unknown segment strategy"),
            }
        }
        self
    }

    /// Reject values the analysis cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.subdivision_level < 2 {
            return Err(invalid(format!(
                "subdivision_level must be at least 2, got {}",
                self.subdivision_level
            )));
        }

        for (name, value) in [
            ("minimum_distance", self.minimum_distance),
            ("wall_height", self.wall_height),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{name} must be finite and non-negative, got {value}")));
            }
        }

        for (name, value) in [
            ("platform_elevation", self.platform_elevation),
            ("level_elevation", self.level_elevation),
        ] {
            if !value.is_finite() {
                return Err(invalid(format!("{name} must be finite, got {value}")));
            }
        }

        for (name, value) in [
            ("segment.max_distance", self.segment.max_distance),
            ("segment.max_angle_deg", self.segment.max_angle_deg),
            ("segment.max_segment_length", self.segment.max_segment_length),
            ("adaptive.max_distance", self.adaptive.max_distance),
            ("adaptive.max_relative_factor", self.adaptive.max_relative_factor),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }

        if self.classify_terrain
            && !(self.features.cell_size.is_finite() && self.features.cell_size > 0.0)
        {
            return Err(invalid(format!(
                "features.cell_size must be positive, got {}",
                self.features.cell_size
            )));
        }

        Ok(())
    }

    pub fn offset_constants(&self) -> OffsetConstants {
        OffsetConstants::new(self.minimum_distance, self.wall_height)
    }

    pub fn wall_spec(&self) -> WallSpec {
        WallSpec {
            wall_type: self.wall_type.clone(),
            level: self.level.clone(),
            height: self.wall_height,
        }
    }
}

/// Accepts `angle`, `angle_aware` and `adaptive`, case-insensitive
pub fn parse_strategy(value: &str) -> Option<SegmentStrategy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "angle" | "angle_aware" | "angle-aware" => Some(SegmentStrategy::AngleAware),
        "adaptive" => Some(SegmentStrategy::Adaptive),
        _ => None,
    }
}

fn invalid(message: String) -> Error {
    Error::ConfigurationInvalid(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;
    use sitegrade_geometry::RuleKind;

    #[test]
    fn defaults_validate() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.subdivision_level, 20);
        assert_eq!(config.rules.rules().len(), 2);
        assert_eq!(config.offset_constants().minimum_distance, 2.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            AnalysisConfig::from_json_str(r#"{ "wall_height": 6.0, "strategy": "adaptive" }"#)
                .unwrap();
        assert_eq!(config.wall_height, 6.0);
        assert_eq!(config.strategy, SegmentStrategy::Adaptive);
        assert_eq!(config.minimum_distance, 2.0);
        assert_eq!(config.offset_constants().minimum_distance, 5.0);
    }

    #[test]
    fn rules_from_json() {
        let config = AnalysisConfig::from_json_str(
            r#"{"rules": [{"kind": "structural_wall"}, {"kind": "slope", "is_active": false}]}"#,
        )
        .unwrap();
        let kinds: Vec<RuleKind> = config.rules.active().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RuleKind::StructuralWall]);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AnalysisConfig::from_json_str(r#"{ "subdivision_level": 0 }"#),
            Err(Error::ConfigurationInvalid(_))
        ));

        let mut config = AnalysisConfig::default();
        config.wall_height = -1.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.segment.max_angle_deg = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.platform_elevation = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_scene_error() {
        assert!(matches!(
            AnalysisConfig::from_json_str("{ not json"),
            Err(Error::Scene(_))
        ));
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let mut env = FxHashMap::default();
        env.insert("SITEGRADE_WALL_HEIGHT", "4.5");
        env.insert("SITEGRADE_SUBDIVISION_LEVEL", "many");
        env.insert("SITEGRADE_STRATEGY", "Adaptive");
        env.insert("SITEGRADE_DRAW", "false");

        let config = AnalysisConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.wall_height, 4.5);
        assert_eq!(config.subdivision_level, 20);
        assert_eq!(config.strategy, SegmentStrategy::Adaptive);
        assert!(!config.draw);
    }
}
