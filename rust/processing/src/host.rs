// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host environment interfaces
//!
//! The analysis never talks to a BIM document directly. It reads geometry
//! and selections through [`SurfaceGeometry`] and [`SelectionHost`] and
//! writes walls through [`HostTransaction`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sitegrade_geometry::{Curve, Face, Matrix4, Mesh};
use thiserror::Error;

/// Identifier of a host document element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A selected element and the curves that make up its boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
    pub id: ElementId,
    pub curves: Vec<Curve>,
}

/// Wall parameters passed to [`HostTransaction::create_wall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallSpec {
    pub wall_type: String,
    pub level: String,
    pub height: f64,
}

/// Errors reported by a host
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Element {0} not found")]
    ElementNotFound(ElementId),

    #[error("No transaction is open")]
    NoTransaction,

    #[error("Transaction '{0}' is already open")]
    TransactionOpen(String),

    #[error("Wall creation failed: {0}")]
    WallCreation(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] sitegrade_geometry::Error),
}

/// Result type for host calls
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Read access to element geometry
pub trait SurfaceGeometry {
    /// Planar faces of a surface element
    fn surface_faces(&self, element: ElementId) -> HostResult<Vec<Face>>;

    /// Triangulate a face. Hosts with their own tessellator override this.
    fn triangulate(&self, face: &Face) -> HostResult<Mesh> {
        Ok(face.triangulate()?)
    }
}

/// Interactive picks. `None` means the user cancelled.
pub trait SelectionHost {
    fn pick_boundary_elements(&self) -> Option<Vec<ElementRef>>;

    /// Reference face in element coordinates with its placement transform
    fn pick_reference_face(&self) -> Option<(Face, Matrix4<f64>)>;

    fn pick_boundary_face(&self) -> Option<Face>;
}

/// Document mutation scoped to one undoable transaction
pub trait HostTransaction {
    fn begin(&mut self, name: &str) -> HostResult<()>;

    fn create_wall(&mut self, curve: &Curve, spec: &WallSpec) -> HostResult<ElementId>;

    fn commit(&mut self) -> HostResult<()>;

    fn rollback(&mut self) -> HostResult<()>;
}
