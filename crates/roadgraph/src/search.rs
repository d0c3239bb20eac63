use std::{cmp::Ordering, collections::{BinaryHeap, hash_map::Entry}};

use ahash::{AHashMap, AHashSet};

use crate::{DiGraph, GraphError};

/// Heap entry ordered so that `BinaryHeap` pops the smallest distance first.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist: f64,
    node: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.dist.total_cmp(&self.dist).then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl DiGraph {
    /// Shortest-path distances from `source` to every node reachable within
    /// `cutoff` (inclusive), in order of increasing distance.
    ///
    /// The source itself is always reported at distance 0. Bookkeeping is
    /// sparse, so a search touching a small neighborhood of a country-scale
    /// graph costs time proportional to that neighborhood only.
    pub fn distances_within(&self, source: usize, cutoff: f64) -> Result<Vec<(usize, f64)>, GraphError> {
        if source >= self.node_count() {
            return Err(GraphError::NodeOutOfRange { node: source, size: self.node_count() })
        }
        if cutoff.is_nan() || cutoff < 0.0 { return Err(GraphError::InvalidCutoff(cutoff)) }

        let mut best: AHashMap<usize, f64> = AHashMap::new();
        let mut settled: AHashSet<usize> = AHashSet::new();
        let mut heap = BinaryHeap::new();
        let mut reached = Vec::new();

        best.insert(source, 0.0);
        heap.push(Candidate { dist: 0.0, node: source });

        while let Some(Candidate { dist, node }) = heap.pop() {
            if !settled.insert(node) { continue }
            reached.push((node, dist));

            for (next, weight) in self.edges_with_weights(node) {
                let candidate = dist + weight;
                if candidate > cutoff || settled.contains(&next) { continue }
                match best.entry(next) {
                    Entry::Occupied(mut entry) => {
                        if *entry.get() <= candidate { continue }
                        entry.insert(candidate);
                    }
                    Entry::Vacant(entry) => { entry.insert(candidate); }
                }
                heap.push(Candidate { dist: candidate, node: next });
            }
        }

        Ok(reached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_pops_smallest_distance_first() {
        let mut heap = BinaryHeap::new();
        heap.push(Candidate { dist: 3.0, node: 0 });
        heap.push(Candidate { dist: 1.0, node: 1 });
        heap.push(Candidate { dist: 2.0, node: 2 });
        assert_eq!(heap.pop().map(|c| c.node), Some(1));
        assert_eq!(heap.pop().map(|c| c.node), Some(2));
        assert_eq!(heap.pop().map(|c| c.node), Some(0));
    }

    #[test]
    fn isolated_source_reaches_only_itself() {
        let graph = DiGraph::from_arcs(2, &[]).unwrap();
        assert_eq!(graph.distances_within(1, 100.0).unwrap(), vec![(1, 0.0)]);
    }
}
