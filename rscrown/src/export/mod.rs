pub mod handoff;
pub mod point_artifact;
pub mod raster;
