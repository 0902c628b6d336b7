// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory host backed by a JSON scene
//!
//! A scene carries the terrain, the selections a user would make
//! interactively and the analysis configuration. [`SceneHost`] serves it
//! through the host traits and records walls committed into it.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sitegrade_geometry::{Curve, Face, Matrix4};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::host::{
    ElementId, ElementRef, HostError, HostResult, HostTransaction, SelectionHost,
    SurfaceGeometry, WallSpec,
};
use crate::pipeline::{AnalysisReport, AnalysisRequest, BoundarySource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneElement {
    pub id: ElementId,
    #[serde(default)]
    pub faces: Vec<Face>,
    #[serde(default)]
    pub curves: Vec<Curve>,
}

/// A picked face and its placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedFace {
    pub face: Face,
    /// Column-major placement matrix, identity when omitted
    #[serde(default = "identity")]
    pub transform: Matrix4<f64>,
}

fn identity() -> Matrix4<f64> {
    Matrix4::identity()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Element holding the terrain faces
    pub terrain: ElementId,
    pub elements: Vec<SceneElement>,
    /// Picked boundary elements, in pick order
    #[serde(default)]
    pub boundary_elements: Vec<ElementId>,
    #[serde(default)]
    pub reference_face: Option<PlacedFace>,
    #[serde(default)]
    pub boundary_face: Option<Face>,
    #[serde(default)]
    pub config: AnalysisConfig,
}

impl Scene {
    /// Parse a scene; the embedded configuration is validated as well
    pub fn from_json_str(json: &str) -> Result<Self> {
        let scene: Self = serde_json::from_str(json)?;
        scene.config.validate()?;
        Ok(scene)
    }

    /// Request implied by the scene's selections.
    ///
    /// Boundary elements win over a boundary face when both are present.
    pub fn request(&self) -> AnalysisRequest {
        let boundary = if self.boundary_elements.is_empty() && self.boundary_face.is_some() {
            BoundarySource::Face
        } else {
            BoundarySource::Elements
        };
        AnalysisRequest {
            terrain: self.terrain,
            boundary,
        }
    }
}

/// A wall committed into a [`SceneHost`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedWall {
    pub id: ElementId,
    pub curve: Curve,
    #[serde(flatten)]
    pub spec: WallSpec,
}

/// Analysis report of a scene run with the walls committed from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneOutput {
    pub report: AnalysisReport,
    pub created_walls: Vec<CreatedWall>,
}

impl SceneOutput {
    pub fn new(report: AnalysisReport, host: &SceneHost) -> Self {
        Self {
            report,
            created_walls: host.created_walls().to_vec(),
        }
    }
}

#[derive(Debug)]
struct OpenTransaction {
    name: String,
    walls: Vec<CreatedWall>,
}

/// Host implementation over a [`Scene`]
#[derive(Debug)]
pub struct SceneHost {
    scene: Scene,
    index: FxHashMap<ElementId, usize>,
    next_id: u64,
    open: Option<OpenTransaction>,
    committed: Vec<CreatedWall>,
    fail_after: Option<usize>,
}

impl SceneHost {
    pub fn new(scene: Scene) -> Self {
        let index: FxHashMap<ElementId, usize> = scene
            .elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
        let next_id = scene.elements.iter().map(|e| e.id.0 + 1).max().unwrap_or(1);

        Self {
            scene,
            index,
            next_id,
            open: None,
            committed: Vec::new(),
            fail_after: None,
        }
    }

    /// Make `create_wall` fail once `walls` walls exist in the open transaction
    pub fn fail_after(mut self, walls: usize) -> Self {
        self.fail_after = Some(walls);
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Walls that survived a commit
    pub fn created_walls(&self) -> &[CreatedWall] {
        &self.committed
    }

    pub fn in_transaction(&self) -> bool {
        self.open.is_some()
    }

    fn element(&self, id: ElementId) -> HostResult<&SceneElement> {
        self.index
            .get(&id)
            .map(|&i| &self.scene.elements[i])
            .ok_or(HostError::ElementNotFound(id))
    }
}

impl SurfaceGeometry for SceneHost {
    fn surface_faces(&self, element: ElementId) -> HostResult<Vec<Face>> {
        Ok(self.element(element)?.faces.clone())
    }
}

impl SelectionHost for SceneHost {
    fn pick_boundary_elements(&self) -> Option<Vec<ElementRef>> {
        if self.scene.boundary_elements.is_empty() {
            return None;
        }

        let picked: Vec<ElementRef> = self
            .scene
            .boundary_elements
            .iter()
            .filter_map(|&id| match self.element(id) {
                Ok(element) => Some(ElementRef {
                    id,
                    curves: element.curves.clone(),
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unknown boundary element");
                    None
                }
            })
            .collect();

        (!picked.is_empty()).then_some(picked)
    }

    fn pick_reference_face(&self) -> Option<(Face, Matrix4<f64>)> {
        self.scene
            .reference_face
            .as_ref()
            .map(|placed| (placed.face.clone(), placed.transform))
    }

    fn pick_boundary_face(&self) -> Option<Face> {
        self.scene.boundary_face.clone()
    }
}

impl HostTransaction for SceneHost {
    fn begin(&mut self, name: &str) -> HostResult<()> {
        if let Some(open) = &self.open {
            return Err(HostError::TransactionOpen(open.name.clone()));
        }
        self.open = Some(OpenTransaction {
            name: name.to_string(),
            walls: Vec::new(),
        });
        Ok(())
    }

    fn create_wall(&mut self, curve: &Curve, spec: &WallSpec) -> HostResult<ElementId> {
        let fail_after = self.fail_after;
        let open = self.open.as_mut().ok_or(HostError::NoTransaction)?;

        if fail_after.is_some_and(|limit| open.walls.len() >= limit) {
            return Err(HostError::WallCreation(format!(
                "scene refused wall {} in '{}'",
                open.walls.len() + 1,
                open.name
            )));
        }

        let id = ElementId(self.next_id);
        self.next_id += 1;
        open.walls.push(CreatedWall {
            id,
            curve: *curve,
            spec: spec.clone(),
        });
        Ok(id)
    }

    fn commit(&mut self) -> HostResult<()> {
        let open = self.open.take().ok_or(HostError::NoTransaction)?;
        self.committed.extend(open.walls);
        Ok(())
    }

    fn rollback(&mut self) -> HostResult<()> {
        let open = self.open.take().ok_or(HostError::NoTransaction)?;
        tracing::debug!(
            transaction = %open.name,
            discarded = open.walls.len(),
            "Rolled back scene transaction"
        );
        Ok(())
    }
}
