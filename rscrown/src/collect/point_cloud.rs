use serde::{Deserialize, Serialize};

/// A single LiDAR return with the minimal field set the surfaces need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub intensity: u16,
    /// Classification code; signed so the ground marker fits
    pub classification: i32,
}

impl PointRecord {
    pub fn new(x: f64, y: f64, z: f64, intensity: u16, classification: i32) -> Self {
        PointRecord {
            x,
            y,
            z,
            intensity,
            classification,
        }
    }

    #[inline]
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Points of one input file, in file order
pub type PointCloud = Vec<PointRecord>;
