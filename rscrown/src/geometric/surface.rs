use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::collect::global_variables::{NEIGHBORS, PATCH_RADIUS};
use crate::error::SurfaceError;
use crate::geometric::extraction::Extraction;
use crate::geometric::spatial_index::SpatialIndex;

/// Regular grid in the rebased frame, anchored at (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub cell_size: f64,
    /// Horizontal extent (x, y) the grid must cover
    pub extent: (f64, f64),
}

impl GridSpec {
    pub fn new(extent: (f64, f64), cell_size: f64) -> Result<Self, SurfaceError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SurfaceError::InvalidCellSize(cell_size));
        }
        let grid = GridSpec { cell_size, extent };
        if grid.columns() == 0 || grid.rows() == 0 {
            return Err(SurfaceError::EmptyGrid(extent.0, extent.1));
        }
        Ok(grid)
    }

    /// Node count along x: the half-open steps `0, cs, 2cs, ... < extent.0`
    pub fn columns(&self) -> usize {
        axis_steps(self.extent.0, self.cell_size)
    }

    /// Node count along y
    pub fn rows(&self) -> usize {
        axis_steps(self.extent.1, self.cell_size)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.columns())
    }

    /// Rebased (x, y) of the node at `row`, `column`
    #[inline]
    pub fn node(&self, row: usize, column: usize) -> [f64; 2] {
        [column as f64 * self.cell_size, row as f64 * self.cell_size]
    }
}

fn axis_steps(extent: f64, cell_size: f64) -> usize {
    if extent > 0.0 {
        (extent / cell_size).ceil() as usize
    } else {
        0
    }
}

/// Neighbor rule settings for the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterParams {
    /// Neighbors fetched per node
    pub neighbors: usize,
    /// Neighbors strictly closer than this count as the node's local patch
    pub patch_radius: f64,
}

impl Default for RasterParams {
    fn default() -> Self {
        RasterParams {
            neighbors: NEIGHBORS,
            patch_radius: PATCH_RADIUS,
        }
    }
}

/// Row-major elevation grid. Row follows y, column follows x.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationRaster {
    pub(crate) rows: usize,
    pub(crate) columns: usize,
    pub(crate) values: Vec<f64>,
}

impl ElevationRaster {
    /// Wrap row-major `values`; `None` if the length does not match the shape.
    pub fn from_vec(rows: usize, columns: usize, values: Vec<f64>) -> Option<Self> {
        (values.len() == rows * columns).then_some(ElevationRaster {
            rows,
            columns,
            values,
        })
    }

    pub fn filled(rows: usize, columns: usize, value: f64) -> Self {
        ElevationRaster {
            rows,
            columns,
            values: vec![value; rows * columns],
        }
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        (row < self.rows && column < self.columns).then(|| self.values[row * self.columns + column])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// (min, max) over all cells
    pub fn range(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// Elevation of one grid node: the highest neighbor inside the patch radius,
/// or the nearest neighbor when the patch is empty.
///
/// This is a distance-gated maximum, not an inverse-distance average.
pub fn node_elevation(
    index: &SpatialIndex,
    extraction: &Extraction,
    node: [f64; 2],
    params: &RasterParams,
) -> f64 {
    let points = extraction.points();
    let hits = index.k_nearest(node, params.neighbors);

    let patch_max = hits
        .iter()
        .filter(|n| n.distance < params.patch_radius)
        .map(|n| points[n.index].z)
        .fold(None, |acc: Option<f64>, z| Some(acc.map_or(z, |m| m.max(z))));

    // An extraction is never empty, so the nearest hit always exists.
    patch_max.unwrap_or_else(|| points[hits[0].index].z)
}

/// Rasterize `extraction` over `grid`.
///
/// Builds the spatial index, then fills every node independently; with the
/// `rayon` feature the nodes are computed on the global thread pool.
pub fn build_surface(
    extraction: &Extraction,
    grid: &GridSpec,
    params: &RasterParams,
) -> Result<ElevationRaster, SurfaceError> {
    let (rows, columns) = grid.shape();
    if rows == 0 || columns == 0 {
        return Err(SurfaceError::EmptyGrid(grid.extent.0, grid.extent.1));
    }
    let params = RasterParams {
        neighbors: params.neighbors.max(1),
        ..*params
    };

    let index = SpatialIndex::build(extraction);
    log::debug!(
        "Rasterizing {} points ({}) onto {}x{} grid (cell size {})",
        index.len(),
        extraction.selector(),
        rows,
        columns,
        grid.cell_size
    );

    let fill = |cell: usize| {
        let node = grid.node(cell / columns, cell % columns);
        node_elevation(&index, extraction, node, &params)
    };

    #[cfg(feature = "rayon")]
    let values: Vec<f64> = (0..rows * columns).into_par_iter().map(fill).collect();

    #[cfg(not(feature = "rayon"))]
    let values: Vec<f64> = (0..rows * columns).map(fill).collect();

    Ok(ElevationRaster {
        rows,
        columns,
        values,
    })
}
