use geo::Coord;
use rstar::{RTree, primitives::GeomWithData};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Sentinel for a cell with no node within the distance cap.
pub const UNASSIGNED: i32 = -1;

type IndexedPoint = GeomWithData<[f64; 2], i32>;

/// Nearest-neighbour index over node coordinates, all in one reference system.
#[derive(Debug, Clone)]
pub struct NodeIndex {
    rtree: RTree<IndexedPoint>,
    fingerprint: String,
    len: usize,
}

impl NodeIndex {
    /// Index `points`; query results are positions into this slice.
    ///
    /// Positions are stored as the `i32` block assignments use, so more than
    /// `i32::MAX` points is a data error.
    pub fn new(points: &[Coord<f64>]) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut indexed = Vec::with_capacity(points.len());
        for (i, p) in points.iter().enumerate() {
            hasher.update(p.x.to_le_bytes());
            hasher.update(p.y.to_le_bytes());
            indexed.push(GeomWithData::new([p.x, p.y], node_slot(i)?));
        }
        Ok(Self {
            rtree: RTree::bulk_load(indexed),
            fingerprint: hex::encode(hasher.finalize()),
            len: points.len(),
        })
    }

    #[inline] pub fn len(&self) -> usize { self.len }
    #[inline] pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Digest of the indexed coordinates, in order.
    #[inline] pub fn fingerprint(&self) -> &str { &self.fingerprint }

    /// Closest node to `at`.
    pub fn nearest(&self, at: Coord<f64>) -> Option<usize> {
        self.closest(at, None).map(|p| p.data as usize)
    }

    /// Node index for a cell center, or [`UNASSIGNED`] beyond `max_distance`.
    #[inline]
    pub fn assign(&self, at: Coord<f64>, max_distance: Option<f64>) -> i32 {
        self.closest(at, max_distance).map_or(UNASSIGNED, |p| p.data)
    }

    fn closest(&self, at: Coord<f64>, max_distance: Option<f64>) -> Option<&IndexedPoint> {
        let query = [at.x, at.y];
        match max_distance {
            None => self.rtree.nearest_neighbor(&query),
            Some(d) => self.rtree.nearest_neighbor_iter_with_distance_2(&query)
                .next()
                .filter(|(_, d2)| *d2 <= d * d)
                .map(|(p, _)| p),
        }
    }
}

fn node_slot(i: usize) -> Result<i32> {
    i32::try_from(i).map_err(|_| Error::data(format!("node {i} does not fit a block assignment (max {})", i32::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> NodeIndex {
        NodeIndex::new(&[Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 0.0 }, Coord { x: 0.0, y: 10.0 }]).unwrap()
    }

    #[test]
    fn nearest_node_wins() {
        let idx = index();
        assert_eq!(idx.nearest(Coord { x: 7.0, y: 1.0 }), Some(1));
        assert_eq!(idx.assign(Coord { x: 1.0, y: 8.0 }, None), 2);
    }

    #[test]
    fn distance_cap_yields_sentinel() {
        let idx = index();
        assert_eq!(idx.assign(Coord { x: 13.0, y: 4.0 }, Some(5.0)), 1);
        assert_eq!(idx.assign(Coord { x: 20.0, y: 20.0 }, Some(5.0)), UNASSIGNED);
    }

    #[test]
    fn node_positions_must_fit_an_assignment() {
        assert_eq!(node_slot(i32::MAX as usize).unwrap(), i32::MAX);
        let err = node_slot(i32::MAX as usize + 1).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Data);
    }

    #[test]
    fn fingerprint_tracks_coordinates() {
        let a = index();
        let b = index();
        let c = NodeIndex::new(&[Coord { x: 0.0, y: 0.0 }]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
        assert!(NodeIndex::new(&[]).unwrap().nearest(Coord { x: 0.0, y: 0.0 }).is_none());
    }
}
