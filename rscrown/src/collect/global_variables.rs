use std::path::PathBuf;

pub const WORK_PATH: &str = "./data";
pub const RESULT_PATH: &str = "./result";

/// Classification codes of the input clouds
pub const VEGETATION_CODE: i32 = 1;
pub const GROUND_CODE: i32 = 2;

/// Point sets smaller than this are not worth a surface
pub const MIN_POINTS: usize = 1000;

pub const CELL_SIZE: f64 = 1.0;
pub const NEIGHBORS: usize = 20;
/// Neighbors closer than this belong to the same local patch
pub const PATCH_RADIUS: f64 = 0.66;

pub const DSM_FILE: &str = "DSM.tif";
pub const DTM_FILE: &str = "DTM.tif";
pub const CHM_FILE: &str = "CHM.tif";
pub const ALL_POINTS_FILE: &str = "all.las";
pub const VEGETATION_POINTS_FILE: &str = "points.las";
pub const GROUND_POINTS_FILE: &str = "ground.las";
pub const HANDOFF_FILE: &str = "handoff.json";

pub fn get_work_path() -> PathBuf {
    PathBuf::from(WORK_PATH)
}

pub fn get_result_path() -> PathBuf {
    PathBuf::from(RESULT_PATH)
}
