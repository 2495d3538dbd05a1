use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::collect::global_variables::{
    ALL_POINTS_FILE, CHM_FILE, DSM_FILE, DTM_FILE, GROUND_POINTS_FILE, HANDOFF_FILE,
    VEGETATION_POINTS_FILE,
};
use crate::collect::point_cloud::PointRecord;
use crate::collect::reader::load_point_cloud;
use crate::config::ProcessingConfig;
use crate::error::SurfaceError;
use crate::export::handoff::{crown_file_name, CrownDelineator, HandoffManifest};
use crate::export::point_artifact::write_point_artifact;
use crate::export::raster::write_raster;
use crate::geometric::canopy::combine;
use crate::geometric::extraction::{extract, Extraction, Selector};
use crate::geometric::reclassify::mark_ground;
use crate::geometric::surface::{build_surface, ElevationRaster, GridSpec};

/// Extractions and rasters produced for one point cloud
#[derive(Debug, Clone)]
pub struct SurfaceSet {
    pub all: Extraction,
    pub vegetation: Extraction,
    /// Ground returns, already carrying the ground marker
    pub ground: Extraction,
    pub grid: GridSpec,
    pub dsm: ElevationRaster, // Digital Surface Model
    pub dtm: ElevationRaster, // Digital Terrain Model
    pub chm: ElevationRaster, // Canopy Height Model
}

/// Build DSM, DTM and CHM for one point cloud.
///
/// Both surfaces are laid on the grid of the all-returns extent so their
/// shapes agree. Too few points or an empty class selection come back as
/// skip conditions (see [`SurfaceError::is_skip`]).
pub fn build_surfaces(
    points: &[PointRecord],
    config: &ProcessingConfig,
) -> Result<SurfaceSet, SurfaceError> {
    if points.len() < config.min_points {
        return Err(SurfaceError::InsufficientData {
            count: points.len(),
            required: config.min_points,
        });
    }

    let all = extract(points, Selector::All)?;
    let vegetation = extract(points, Selector::Code(config.vegetation_code))?;
    let mut ground = extract(points, Selector::Code(config.ground_code))?;
    mark_ground(&mut ground);

    let grid = GridSpec::new(all.bounds().horizontal_extent(), config.cell_size)?;
    let params = config.raster_params();
    log::debug!(
        "Grid dimensions: {}x{} (cell size: {})",
        grid.rows(),
        grid.columns(),
        grid.cell_size
    );

    let dsm = build_surface(&all, &grid, &params)?;
    let dtm = build_surface(&ground, &grid, &params)?;
    let chm = combine(&dsm, &dtm)?;

    Ok(SurfaceSet {
        all,
        vegetation,
        ground,
        grid,
        dsm,
        dtm,
        chm,
    })
}

/// What became of one input file
#[derive(Debug)]
pub enum FileOutcome {
    Processed(FileSummary),
    /// Expected data problem; nothing was handed off
    Skipped(SurfaceError),
    Failed(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub source: PathBuf,
    pub counter: u64,
    pub point_count: usize,
    /// (rows, columns) of the rasters
    pub shape: (usize, usize),
    /// (min, max) canopy height
    pub chm_range: (f64, f64),
    pub manifest: PathBuf,
    pub delineated: bool,
}

/// Per-file surface pipeline: load, rasterize, export, hand off.
pub struct Lidar {
    config: ProcessingConfig,
    delineator: Option<Box<dyn CrownDelineator>>,
}

impl Lidar {
    /// Create a pipeline from a validated config; the configured external
    /// command, if any, becomes the delineator.
    pub fn new(config: ProcessingConfig) -> Result<Self> {
        config.validate()?;
        let delineator = config
            .collaborator
            .clone()
            .map(|command| Box::new(command) as Box<dyn CrownDelineator>);
        Ok(Lidar { config, delineator })
    }

    pub fn with_delineator(mut self, delineator: Box<dyn CrownDelineator>) -> Self {
        self.delineator = Some(delineator);
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Run the whole pipeline on the file at `path`, batch position `counter`.
    pub fn process_file(&self, path: &Path, counter: u64) -> FileOutcome {
        let start = std::time::Instant::now();
        let points = match load_point_cloud(path) {
            Ok(points) => points,
            Err(e) => return FileOutcome::Failed(e),
        };
        log::info!("Loaded {} points from {:?}", points.len(), path);

        let outcome = self.process_points(&points, path, counter);
        log::debug!("{:?} done in {:?}", path, start.elapsed());
        outcome
    }

    /// Run the pipeline on points already in memory.
    pub fn process_points(&self, points: &[PointRecord], source: &Path, counter: u64) -> FileOutcome {
        let surfaces = match build_surfaces(points, &self.config) {
            Ok(surfaces) => surfaces,
            Err(e) if e.is_skip() => return FileOutcome::Skipped(e),
            Err(e) => return FileOutcome::Failed(e.into()),
        };

        match self.export(&surfaces, source, counter) {
            Ok(summary) => FileOutcome::Processed(summary),
            Err(e) => FileOutcome::Failed(e),
        }
    }

    /// Write rasters, point artifacts and the hand-off manifest, then run
    /// the delineator if one is configured.
    fn export(&self, surfaces: &SurfaceSet, source: &Path, counter: u64) -> Result<FileSummary> {
        let work = &self.config.work_dir;
        std::fs::create_dir_all(work)
            .context(format!("Failed to create work directory: {:?}", work))?;

        let all_points = write_point_artifact(&surfaces.all, &work.join(ALL_POINTS_FILE))?;
        let points = write_point_artifact(&surfaces.vegetation, &work.join(VEGETATION_POINTS_FILE))?;
        let ground_points = write_point_artifact(&surfaces.ground, &work.join(GROUND_POINTS_FILE))?;

        let dsm = write_raster(&surfaces.dsm, &work.join(DSM_FILE))?;
        let dtm = write_raster(&surfaces.dtm, &work.join(DTM_FILE))?;
        let chm = write_raster(&surfaces.chm, &work.join(CHM_FILE))?;

        let (crown_file, crown_folder) = crown_file_name(counter);
        let bounds = surfaces.all.bounds();
        let manifest = HandoffManifest {
            source: source.to_path_buf(),
            counter,
            chm,
            dtm,
            dsm,
            points,
            ground_points,
            all_points,
            output_dir: self.config.output_dir.clone(),
            crown_folder,
            crown_file,
            offset: bounds.min,
            maximum: bounds.max,
            shape: surfaces.chm.shape(),
            cell_size: surfaces.grid.cell_size,
            params: self.config.delineation.clone(),
        };
        let manifest_path = work.join(HANDOFF_FILE);
        manifest.write(&manifest_path)?;

        let delineated = match &self.delineator {
            Some(delineator) => {
                delineator
                    .delineate(&manifest_path, &manifest)
                    .context(format!("Crown delineation failed for {:?}", source))?;
                true
            }
            None => false,
        };

        let chm_range = surfaces.chm.range();
        log::info!(
            "{:?}: {}x{} rasters, canopy height {:.2}..{:.2}",
            source,
            manifest.shape.0,
            manifest.shape.1,
            chm_range.0,
            chm_range.1
        );

        Ok(FileSummary {
            source: source.to_path_buf(),
            counter,
            point_count: surfaces.all.len(),
            shape: manifest.shape,
            chm_range,
            manifest: manifest_path,
            delineated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn plot(n_side: usize) -> Vec<PointRecord> {
        // Ground at z=100 and canopy at z=112 on interleaved lattices
        let step = 10.0 / n_side as f64;
        let mut points = Vec::new();
        for i in 0..n_side {
            for j in 0..n_side {
                let x = 500.0 + (i as f64 + 0.25) * step;
                let y = 800.0 + (j as f64 + 0.25) * step;
                points.push(PointRecord::new(x, y, 100.0, 10, 2));
                points.push(PointRecord::new(x + step / 2.0, y + step / 2.0, 112.0, 50, 1));
            }
        }
        points
    }

    fn config(dir: &Path) -> ProcessingConfig {
        ProcessingConfig {
            work_dir: dir.join("data"),
            output_dir: dir.join("result"),
            ..ProcessingConfig::default()
        }
    }

    #[test]
    fn test_build_surfaces_flat_canopy() {
        let dir = tempfile::tempdir().unwrap();
        let surfaces = build_surfaces(&plot(25), &config(dir.path())).unwrap();

        assert_eq!(surfaces.grid.shape(), (10, 10));
        assert_eq!(surfaces.dsm.shape(), surfaces.dtm.shape());
        assert!(surfaces.dsm.values().iter().all(|&v| (v - 12.0).abs() < 1e-9));
        assert!(surfaces.dtm.values().iter().all(|&v| v.abs() < 1e-9));
        assert!(surfaces.chm.values().iter().all(|&v| (v - 12.0).abs() < 1e-9));
        assert!(surfaces.ground.points().iter().all(|p| p.classification == -1));
        assert!(surfaces.vegetation.points().iter().all(|p| p.classification == 1));
    }

    #[test]
    fn test_build_surfaces_gate() {
        let dir = tempfile::tempdir().unwrap();
        let points = plot(20); // 800 points
        let err = build_surfaces(&points, &config(dir.path())).unwrap_err();
        assert_eq!(
            err,
            SurfaceError::InsufficientData {
                count: 800,
                required: 1000
            }
        );
        assert!(err.is_skip());
    }

    #[test]
    fn test_build_surfaces_no_ground() {
        let dir = tempfile::tempdir().unwrap();
        let points: Vec<PointRecord> = plot(25).into_iter().filter(|p| p.classification != 2).collect();
        let mut config = config(dir.path());
        config.min_points = 100;
        let err = build_surfaces(&points, &config).unwrap_err();
        assert_eq!(
            err,
            SurfaceError::NoPoints {
                selector: Selector::Code(2)
            }
        );
    }

    struct Recorder {
        seen: RefCell<Vec<HandoffManifest>>,
    }

    impl CrownDelineator for std::rc::Rc<Recorder> {
        fn delineate(&self, manifest_path: &Path, manifest: &HandoffManifest) -> Result<()> {
            assert!(manifest_path.exists());
            self.seen.borrow_mut().push(manifest.clone());
            Ok(())
        }
    }

    #[test]
    fn test_process_points_exports_and_hands_off() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = std::rc::Rc::new(Recorder {
            seen: RefCell::new(Vec::new()),
        });
        let lidar = Lidar::new(config(dir.path()))
            .unwrap()
            .with_delineator(Box::new(recorder.clone()));

        let outcome = lidar.process_points(&plot(25), Path::new("plots/a/tile.las"), 66941);
        let summary = match outcome {
            FileOutcome::Processed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(summary.point_count, 1250);
        assert_eq!(summary.shape, (10, 10));
        assert!(summary.delineated);
        assert!((summary.chm_range.0 - 12.0).abs() < 1e-9);

        let work = dir.path().join("data");
        let expected = [
            DSM_FILE,
            DTM_FILE,
            CHM_FILE,
            ALL_POINTS_FILE,
            VEGETATION_POINTS_FILE,
            GROUND_POINTS_FILE,
            HANDOFF_FILE,
        ];
        for name in expected {
            assert!(work.join(name).exists(), "{} missing", name);
        }

        let seen = recorder.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].crown_file, "trees_increment_066941.las");
        assert_eq!(seen[0].crown_folder, "066");
        assert_eq!(seen[0].offset, [500.0, 800.0, 100.0]);
        assert_eq!(seen[0].maximum, [510.0, 810.0, 112.0]);
        assert_eq!(HandoffManifest::from_path(&summary.manifest).unwrap(), seen[0]);
    }

    #[test]
    fn test_process_points_skip_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let lidar = Lidar::new(config(dir.path())).unwrap();
        let outcome = lidar.process_points(&plot(10), Path::new("tile.las"), 0);
        assert!(matches!(
            outcome,
            FileOutcome::Skipped(SurfaceError::InsufficientData { .. })
        ));
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_process_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let lidar = Lidar::new(config(dir.path())).unwrap();
        let outcome = lidar.process_file(&dir.path().join("absent.las"), 0);
        assert!(matches!(outcome, FileOutcome::Failed(_)));
    }
}
