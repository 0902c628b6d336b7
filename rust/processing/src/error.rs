// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::host::{ElementId, HostError};

/// Result type for analysis runs
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an analysis run.
///
/// All of these are raised before any wall is written to the host, except
/// [`Error::HostTransaction`] which is raised after the transaction was
/// rolled back.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Terrain element {0} has no faces that can receive a projection")]
    NoTerrainFaces(ElementId),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("Host transaction failed: {0}")]
    HostTransaction(#[from] HostError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] sitegrade_geometry::Error),

    #[error("Scene error: {0}")]
    Scene(#[from] serde_json::Error),
}
