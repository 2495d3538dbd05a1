//! Canopy surface reconstruction from classified LiDAR point clouds.
//!
//! Points are filtered by classification and rebased to a local origin, then
//! rasterized into a surface model from all returns (DSM) and a terrain model
//! from ground returns (DTM). Their difference is the canopy height model
//! (CHM). Rasters and point artifacts are written for an external crown
//! delineation engine, described to it by a JSON hand-off manifest.

pub mod batch;
pub mod collect;
pub mod config;
pub mod error;
pub mod export;
pub mod geo_core;
pub mod geometric;

pub use config::ProcessingConfig;
pub use error::SurfaceError;
pub use geometric::lidar::{build_surfaces, FileOutcome, Lidar, SurfaceSet};
