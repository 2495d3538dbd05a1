use serde::{Deserialize, Serialize};
use std::fmt;

use crate::collect::point_cloud::{PointCloud, PointRecord};
use crate::error::SurfaceError;
use crate::geo_core::Bounds;

/// Which returns an extraction keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// Every point, unfiltered
    All,
    /// Points whose classification equals the code exactly
    Code(i32),
}

impl Selector {
    #[inline]
    pub fn matches(&self, point: &PointRecord) -> bool {
        match self {
            Selector::All => true,
            Selector::Code(code) => point.classification == *code,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "all"),
            Selector::Code(code) => write!(f, "class {}", code),
        }
    }
}

/// A filtered point set rebased to its own snapped minimum.
///
/// `bounds` keeps the original (un-rebased) offset and maximum; the points
/// themselves start at or near zero on every axis.
#[derive(Debug, Clone)]
pub struct Extraction {
    selector: Selector,
    bounds: Bounds,
    points: PointCloud,
}

impl Extraction {
    pub fn selector(&self) -> Selector {
        self.selector
    }

    /// Original bounds: `min` is the offset subtracted from every point
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut [PointRecord] {
        &mut self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Filter `points` with `selector`, snap the bounding box and rebase.
///
/// An empty selection is reported as [`SurfaceError::NoPoints`] rather than a
/// degenerate box. NaN or infinite coordinates are refused, so every
/// extraction can be indexed.
pub fn extract(points: &[PointRecord], selector: Selector) -> Result<Extraction, SurfaceError> {
    let mut selected: PointCloud = points.iter().filter(|p| selector.matches(p)).copied().collect();

    if let Some(index) = selected
        .iter()
        .position(|p| !p.coords().iter().all(|c| c.is_finite()))
    {
        return Err(SurfaceError::NonFiniteCoordinate { selector, index });
    }

    let bounds = Bounds::from_coords(selected.iter().map(PointRecord::coords))
        .ok_or(SurfaceError::NoPoints { selector })?;

    let [ox, oy, oz] = bounds.min;
    for p in selected.iter_mut() {
        p.x -= ox;
        p.y -= oy;
        p.z -= oz;
    }

    log::debug!(
        "Extracted {} points for {} (offset {:?}, maximum {:?})",
        selected.len(),
        selector,
        bounds.min,
        bounds.max
    );

    Ok(Extraction {
        selector,
        bounds,
        points: selected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> PointCloud {
        vec![
            PointRecord::new(1000.4, 2000.6, 50.2, 10, 2),
            PointRecord::new(1003.9, 2001.1, 57.8, 20, 1),
            PointRecord::new(1001.4, 2004.5, 49.9, 30, 2),
            PointRecord::new(1002.2, 2002.2, 61.3, 40, 5),
        ]
    }

    #[test]
    fn test_extract_all() {
        let extraction = extract(&cloud(), Selector::All).unwrap();
        assert_eq!(extraction.len(), 4);
        assert_eq!(extraction.bounds().min, [1000.0, 2000.0, 49.0]);
        assert_eq!(extraction.bounds().max, [1004.0, 2005.0, 62.0]);
    }

    #[test]
    fn test_extract_exact_code() {
        let extraction = extract(&cloud(), Selector::Code(2)).unwrap();
        assert_eq!(extraction.len(), 2);
        assert!(extraction.points().iter().all(|p| p.classification == 2));
        assert_eq!(extraction.bounds().min, [1000.0, 2000.0, 49.0]);
        assert_eq!(extraction.bounds().max, [1002.0, 2005.0, 51.0]);
    }

    #[test]
    fn test_extract_rebases_to_offset() {
        let source = cloud();
        let extraction = extract(&source, Selector::All).unwrap();
        let offset = extraction.bounds().min;
        let extent = extraction.bounds().extent();
        for (rebased, original) in extraction.points().iter().zip(&source) {
            assert!((rebased.x + offset[0] - original.x).abs() < 1e-9);
            assert!((rebased.y + offset[1] - original.y).abs() < 1e-9);
            assert!((rebased.z + offset[2] - original.z).abs() < 1e-9);
            assert!(rebased.x >= 0.0 && rebased.x <= extent[0]);
            assert!(rebased.y >= 0.0 && rebased.y <= extent[1]);
            assert!(rebased.z >= 0.0 && rebased.z <= extent[2]);
            assert_eq!(rebased.intensity, original.intensity);
        }
    }

    #[test]
    fn test_extract_no_points() {
        let err = extract(&cloud(), Selector::Code(9)).unwrap_err();
        assert_eq!(
            err,
            SurfaceError::NoPoints {
                selector: Selector::Code(9)
            }
        );
        assert!(extract(&[], Selector::All).is_err());
    }

    #[test]
    fn test_extract_non_finite() {
        let mut points = cloud();
        points[3].y = f64::NAN;
        assert_eq!(
            extract(&points, Selector::All).unwrap_err(),
            SurfaceError::NonFiniteCoordinate {
                selector: Selector::All,
                index: 3
            }
        );
        // Outside the selection, so it does not matter
        assert!(extract(&points, Selector::Code(2)).is_ok());

        points[0].z = f64::INFINITY;
        assert!(extract(&points, Selector::Code(2)).is_err());
    }
}
