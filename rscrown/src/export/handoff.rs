use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Crown delineation algorithms the downstream engine offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrownAlgorithm {
    #[serde(rename = "dalponte_cython")]
    DalponteCython,
    #[serde(rename = "dalponte_numba")]
    DalponteNumba,
    #[serde(rename = "dalponteCIRC_numba")]
    DalponteCircNumba,
    #[serde(rename = "watershed_skimage")]
    WatershedSkimage,
}

/// Settings forwarded untouched to the crown delineation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelineationParams {
    /// Median filter window applied to the CHM, in pixels
    pub chm_filter_window: u32,
    /// Local maximum window for tree-top detection, in pixels
    pub detection_window: u32,
    /// Minimum height of a tree top
    pub detection_hmin: f64,
    /// Inward buffer when clipping trees to the raster edge
    pub clip_inward_buffer: f64,
    pub algorithm: CrownAlgorithm,
    pub th_tree: f64,
    pub th_seed: f64,
    pub th_crown: f64,
    pub max_crown: f64,
    /// Trees lower than this are screened out
    pub screen_hmin: f64,
    /// Write the classified crown points next to the polygons
    pub store_las: bool,
}

impl Default for DelineationParams {
    fn default() -> Self {
        DelineationParams {
            chm_filter_window: 2,
            detection_window: 3,
            detection_hmin: 2.0,
            clip_inward_buffer: 1.0,
            algorithm: CrownAlgorithm::DalponteCircNumba,
            th_tree: 2.0,
            th_seed: 0.4,
            th_crown: 0.5,
            max_crown: 10.0,
            screen_hmin: 5.0,
            store_las: true,
        }
    }
}

/// Name of the crown point file for the file at batch position `counter`,
/// and the sub-folder it goes into.
///
/// The sub-folder is the three digits before the last three of the
/// zero-padded counter, which spreads the outputs over 1000 folders.
pub fn crown_file_name(counter: u64) -> (String, String) {
    let name = format!("trees_increment_{:06}.las", counter);
    let folder = format!("{:03}", (counter / 1000) % 1000);
    (name, folder)
}

/// Everything the crown delineation engine needs for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffManifest {
    pub source: PathBuf,
    pub counter: u64,
    pub chm: PathBuf,
    pub dtm: PathBuf,
    pub dsm: PathBuf,
    /// Vegetation point artifact
    pub points: PathBuf,
    /// Reclassified ground point artifact
    pub ground_points: PathBuf,
    pub all_points: PathBuf,
    pub output_dir: PathBuf,
    pub crown_folder: String,
    pub crown_file: String,
    /// Snapped minimum of all returns; origin of the raster frame
    pub offset: [f64; 3],
    /// Snapped maximum of all returns
    pub maximum: [f64; 3],
    /// (rows, columns)
    pub shape: (usize, usize),
    pub cell_size: f64,
    pub params: DelineationParams,
}

impl HandoffManifest {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create output directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        std::fs::write(path, json).context(format!("Failed to write manifest {:?}", path))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).context(format!("Failed to read manifest {:?}", path))?;
        serde_json::from_str(&text).context(format!("Failed to parse manifest {:?}", path))
    }
}

/// The crown delineation engine, seen from this side of the boundary.
pub trait CrownDelineator {
    /// Run delineation for one file described by the manifest at `manifest_path`.
    fn delineate(&self, manifest_path: &Path, manifest: &HandoffManifest) -> Result<()>;
}

/// Runs an external program, passing the manifest path as last argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        ExternalCommand {
            program: program.into(),
            args,
        }
    }
}

impl CrownDelineator for ExternalCommand {
    fn delineate(&self, manifest_path: &Path, manifest: &HandoffManifest) -> Result<()> {
        log::info!(
            "Running {:?} for {:?} (crown file {}/{})",
            self.program,
            manifest.source,
            manifest.crown_folder,
            manifest.crown_file
        );
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(manifest_path)
            .status()
            .context(format!("Failed to start {:?}", self.program))?;

        if !status.success() {
            bail!("{:?} exited with {}", self.program, status);
        }
        Ok(())
    }
}
