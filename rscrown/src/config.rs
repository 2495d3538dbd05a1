use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::collect::global_variables::{
    get_result_path, get_work_path, CELL_SIZE, GROUND_CODE, MIN_POINTS, NEIGHBORS, PATCH_RADIUS,
    VEGETATION_CODE,
};
use crate::export::handoff::{DelineationParams, ExternalCommand};
use crate::geometric::surface::RasterParams;

/// Settings for one processing run.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Grid spacing of the rasters, in point-cloud units
    pub cell_size: f64,
    /// Neighbors fetched per grid node
    pub neighbors: usize,
    /// Local patch radius of the elevation rule
    pub patch_radius: f64,
    /// Files with fewer points are skipped
    pub min_points: usize,
    pub vegetation_code: i32,
    pub ground_code: i32,
    /// Scratch directory for the per-file rasters and point artifacts
    pub work_dir: PathBuf,
    /// Directory handed to the crown delineation engine
    pub output_dir: PathBuf,
    /// Batch position of the first file to process
    pub resume_from: u64,
    pub delineation: DelineationParams,
    pub collaborator: Option<ExternalCommand>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        ProcessingConfig {
            cell_size: CELL_SIZE,
            neighbors: NEIGHBORS,
            patch_radius: PATCH_RADIUS,
            min_points: MIN_POINTS,
            vegetation_code: VEGETATION_CODE,
            ground_code: GROUND_CODE,
            work_dir: get_work_path(),
            output_dir: get_result_path(),
            resume_from: 0,
            delineation: DelineationParams::default(),
            collaborator: None,
        }
    }
}

impl ProcessingConfig {
    /// Load from a JSON file and validate.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        let config: ProcessingConfig =
            serde_json::from_str(&text).context(format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            bail!("cell_size must be positive, got {}", self.cell_size);
        }
        if !(self.patch_radius.is_finite() && self.patch_radius > 0.0) {
            bail!("patch_radius must be positive, got {}", self.patch_radius);
        }
        if self.neighbors == 0 {
            bail!("neighbors must be at least 1");
        }
        if self.vegetation_code == self.ground_code {
            bail!(
                "vegetation and ground share classification code {}",
                self.ground_code
            );
        }
        Ok(())
    }

    pub fn raster_params(&self) -> RasterParams {
        RasterParams {
            neighbors: self.neighbors,
            patch_radius: self.patch_radius,
        }
    }
}
