pub mod canopy;
pub mod extraction;
pub mod lidar;
pub mod reclassify;
pub mod spatial_index;
pub mod surface;
