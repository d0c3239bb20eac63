use crate::GraphError;

/// A weighted, directed multigraph in compressed sparse row format.
///
/// Parallel arcs between the same pair of nodes are kept as separate entries,
/// so a road network with several ways between two junctions keeps all of them.
#[derive(Debug, Default, Clone)]
pub struct DiGraph {
    size: usize,
    offsets: Vec<u32>,
    targets: Vec<u32>,
    weights: Vec<f64>,
}

impl DiGraph {
    /// Construct a graph from `(source, target, weight)` arcs.
    ///
    /// Arcs leaving the same node keep their relative input order.
    pub fn from_arcs(num_nodes: usize, arcs: &[(usize, usize, f64)]) -> Result<Self, GraphError> {
        for (i, &(u, v, w)) in arcs.iter().enumerate() {
            if u >= num_nodes { return Err(GraphError::NodeOutOfRange { node: u, size: num_nodes }) }
            if v >= num_nodes { return Err(GraphError::NodeOutOfRange { node: v, size: num_nodes }) }
            if !w.is_finite() || w < 0.0 { return Err(GraphError::InvalidWeight { arc: i, weight: w }) }
        }
        Ok(Self::build(num_nodes, arcs.iter().copied()))
    }

    /// Counting-sort arcs by source into CSR arrays. Inputs are assumed valid.
    fn build(num_nodes: usize, arcs: impl Iterator<Item = (usize, usize, f64)> + Clone) -> Self {
        let mut degree = vec![0u32; num_nodes];
        arcs.clone().for_each(|(u, _, _)| degree[u] += 1);

        let offsets = std::iter::once(0u32)
            .chain(degree.iter().scan(0u32, |acc, &d| { *acc += d; Some(*acc) }))
            .collect::<Vec<u32>>();

        let total = offsets[num_nodes] as usize;
        let mut cursor = offsets[..num_nodes].to_vec();
        let mut targets = vec![0u32; total];
        let mut weights = vec![0.0; total];
        for (u, v, w) in arcs {
            let slot = cursor[u] as usize;
            targets[slot] = v as u32;
            weights[slot] = w;
            cursor[u] += 1;
        }

        Self { size: num_nodes, offsets, targets, weights }
    }

    /// Get the number of nodes in the graph.
    #[inline] pub fn node_count(&self) -> usize { self.size }

    /// Get the number of arcs in the graph.
    #[inline] pub fn edge_count(&self) -> usize { self.targets.len() }

    /// Get the range of arcs leaving a given node.
    #[inline]
    fn range(&self, node: usize) -> std::ops::Range<usize> {
        self.offsets[node] as usize .. self.offsets[node + 1] as usize
    }

    /// Get the number of arcs leaving a given node.
    #[inline] pub fn out_degree(&self, node: usize) -> usize { self.range(node).len() }

    /// Get an iterator over the successors of a given node.
    #[inline]
    pub fn successors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.range(node).map(move |i| self.targets[i] as usize)
    }

    /// Get an iterator over the successors and arc weights of a given node.
    #[inline]
    pub fn edges_with_weights(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.range(node).map(move |i| (self.targets[i] as usize, self.weights[i]))
    }

    /// Iterate over every arc as `(source, target, weight)`.
    pub fn arcs(&self) -> impl Iterator<Item = (usize, usize, f64)> + Clone + '_ {
        (0..self.size).flat_map(move |u| {
            self.range(u).map(move |i| (u, self.targets[i] as usize, self.weights[i]))
        })
    }

    /// Build the transpose graph, with every arc pointing the other way.
    pub fn reversed(&self) -> Self {
        Self::build(self.size, self.arcs().map(|(u, v, w)| (v, u, w)))
    }
}
