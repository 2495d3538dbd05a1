use serde::{Deserialize, Serialize};

/// Axis-aligned 3D bounding box snapped to whole units.
///
/// `min` is floored and `max` is ceiled per axis, so a grid laid over the box
/// always covers every point it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Bounds {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Bounds { min, max }
    }

    /// Snapped bounds of a set of coordinates; `None` when the set is empty.
    pub fn from_coords<I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let (mut min, mut max) = (first, first);
        for c in iter {
            for axis in 0..3 {
                min[axis] = min[axis].min(c[axis]);
                max[axis] = max[axis].max(c[axis]);
            }
        }
        Some(Bounds {
            min: min.map(f64::floor),
            max: max.map(f64::ceil),
        })
    }

    /// Size of the box per axis (max - min)
    pub fn extent(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Horizontal extent, used to size the elevation grid
    pub fn horizontal_extent(&self) -> (f64, f64) {
        let e = self.extent();
        (e[0], e[1])
    }

    pub fn contains(&self, c: [f64; 3]) -> bool {
        (0..3).all(|axis| c[axis] >= self.min[axis] && c[axis] <= self.max[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_snap() {
        let bounds =
            Bounds::from_coords([[1.2, -3.7, 100.01], [4.0, 2.5, 120.9]]).unwrap();
        assert_eq!(bounds.min, [1.0, -4.0, 100.0]);
        assert_eq!(bounds.max, [4.0, 3.0, 121.0]);
        assert_eq!(bounds.extent(), [3.0, 7.0, 21.0]);
        assert_eq!(bounds.horizontal_extent(), (3.0, 7.0));
    }

    #[test]
    fn test_bounds_empty() {
        assert!(Bounds::from_coords(std::iter::empty()).is_none());
    }

    #[test]
    fn test_bounds_contains_all_points() {
        let coords = [
            [651_234.567, 5_467_301.25, 312.4],
            [651_240.001, 5_467_299.99, 298.0],
            [651_239.5, 5_467_310.75, 330.75],
        ];
        let bounds = Bounds::from_coords(coords).unwrap();
        for c in coords {
            assert!(bounds.contains(c));
        }
    }
}
