// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Uniform grid index over terrain sample points.
//!
//! The grid divides 3D space into cubic cells of side `cell_size` and stores
//! indices into a caller-owned point slice. Neighbor queries return every
//! registered index whose cell lies within a Chebyshev window of the query
//! cell, so results over-approximate a Euclidean radius of
//! `range * cell_size` and callers filter by exact distance when they need
//! to. The index is rebuilt per query batch; there is no removal.

use nalgebra::Point3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Integer cell coordinates
pub type CellKey = (i64, i64, i64);

/// A spatial hash grid of point indices.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    grid: FxHashMap<CellKey, SmallVec<[usize; 4]>>,
    len: usize,
}

impl SpatialIndex {
    /// Creates an empty index with the given cell size.
    ///
    /// `cell_size` must be finite and strictly positive.
    pub fn new(cell_size: f64) -> Result<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "cell size must be finite and positive, got {}",
                cell_size
            )));
        }
        Ok(Self {
            cell_size,
            grid: FxHashMap::default(),
            len: 0,
        })
    }

    /// Builds an index registering every point under its slice position.
    pub fn from_points(points: &[Point3<f64>], cell_size: f64) -> Result<Self> {
        let mut index = Self::new(cell_size)?;
        for (i, p) in points.iter().enumerate() {
            index.insert(i, p);
        }
        Ok(index)
    }

    /// Registers `key` at the cell containing `point`.
    pub fn insert(&mut self, key: usize, point: &Point3<f64>) {
        let cell = self.cell_of(point);
        self.grid.entry(cell).or_default().push(key);
        self.len += 1;
    }

    /// All keys whose cell is within `range` cells (Chebyshev) of `point`'s cell.
    ///
    /// Keys come back grouped by cell, in no particular cell order.
    pub fn neighbors(&self, point: &Point3<f64>, range: u32) -> Vec<usize> {
        let (cx, cy, cz) = self.cell_of(point);
        let r = range as i64;
        let reach = u64::from(range);
        let mut result = Vec::new();

        // Sparse grids: walking occupied cells beats scanning a large window
        let window = (2 * r + 1).saturating_pow(3);
        if window as usize > self.grid.len() {
            for (&(x, y, z), keys) in &self.grid {
                if x.abs_diff(cx) <= reach && y.abs_diff(cy) <= reach && z.abs_diff(cz) <= reach {
                    result.extend_from_slice(keys);
                }
            }
            return result;
        }

        // Cells are saturated at the i64 range, so the window is clipped there
        for dx in -r..=r {
            let Some(x) = cx.checked_add(dx) else {
                continue;
            };
            for dy in -r..=r {
                let Some(y) = cy.checked_add(dy) else {
                    continue;
                };
                for dz in -r..=r {
                    let Some(z) = cz.checked_add(dz) else {
                        continue;
                    };
                    if let Some(keys) = self.grid.get(&(x, y, z)) {
                        result.extend_from_slice(keys);
                    }
                }
            }
        }

        result
    }

    /// Cell coordinates `floor(coord / cell_size)` per axis.
    pub fn cell_of(&self, point: &Point3<f64>) -> CellKey {
        (
            (point.x / self.cell_size).floor() as i64,
            (point.y / self.cell_size).floor() as i64,
            (point.z / self.cell_size).floor() as i64,
        )
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
