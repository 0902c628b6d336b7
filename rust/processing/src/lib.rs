// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SiteGrade Processing
//!
//! Runs the terrain analysis against a host environment: reads terrain and
//! selections through the host traits, drives the geometry crate and commits
//! the resulting retaining walls in one transaction.

pub mod config;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod scene;

pub use config::{parse_strategy, AnalysisConfig};
pub use error::{Error, Result};
pub use host::{
    ElementId, ElementRef, HostError, HostResult, HostTransaction, SelectionHost,
    SurfaceGeometry, WallSpec,
};
pub use pipeline::{
    analyze, commit_walls, AnalysisReport, AnalysisRequest, AnalysisStats, BoundarySource,
};
pub use scene::{CreatedWall, PlacedFace, Scene, SceneElement, SceneHost, SceneOutput};
