use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::geometric::extraction::Extraction;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// One k-NN hit: position in the extraction and horizontal distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// 2D nearest-neighbor index over an extraction's rebased (x, y).
///
/// Bulk-loaded once, never mutated, so it can be shared across worker
/// threads by reference. Coordinates are finite, [`extract`] guarantees it.
///
/// [`extract`]: crate::geometric::extraction::extract
pub struct SpatialIndex {
    tree: RTree<IndexedPoint>,
}

impl SpatialIndex {
    pub fn build(extraction: &Extraction) -> Self {
        let entries: Vec<IndexedPoint> = extraction
            .points()
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new([p.x, p.y], i))
            .collect();
        SpatialIndex {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The `k` points closest to `query`, nearest first.
    ///
    /// Returns fewer than `k` entries when the index holds fewer points.
    /// Order among equidistant points is unspecified.
    pub fn k_nearest(&self, query: [f64; 2], k: usize) -> Vec<Neighbor> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&query)
            .take(k)
            .map(|(entry, distance_2)| Neighbor {
                index: entry.data,
                distance: distance_2.sqrt(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::point_cloud::PointRecord;
    use crate::geometric::extraction::{extract, Selector};

    fn line_extraction(n: usize) -> Extraction {
        let points: Vec<PointRecord> = (0..n)
            .map(|i| PointRecord::new(i as f64, 0.0, i as f64 * 0.5, 0, 1))
            .collect();
        extract(&points, Selector::All).unwrap()
    }

    #[test]
    fn test_k_nearest_sorted() {
        let extraction = line_extraction(10);
        let index = SpatialIndex::build(&extraction);
        assert_eq!(index.len(), 10);

        let hits = index.k_nearest([3.2, 0.0], 4);
        let order: Vec<usize> = hits.iter().map(|n| n.index).collect();
        assert_eq!(order, vec![3, 4, 2, 5]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((hits[0].distance - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_k_nearest_euclidean() {
        let extraction = line_extraction(3);
        let index = SpatialIndex::build(&extraction);
        let hits = index.k_nearest([0.0, 4.0], 1);
        assert_eq!(hits[0].index, 0);
        assert!((hits[0].distance - 4.0).abs() < 1e-9);

        let hits = index.k_nearest([1.0, 1.0], 3);
        assert!((hits[2].distance - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_k_larger_than_index() {
        let extraction = line_extraction(5);
        let index = SpatialIndex::build(&extraction);
        assert_eq!(index.k_nearest([2.0, 2.0], 20).len(), 5);
    }
}
