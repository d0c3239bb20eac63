use std::collections::BTreeSet;

use ahash::AHashMap;
use geo::{Coord, Geometry};
use roadgraph::DiGraph;

use crate::crs::SpatialRef;
use crate::error::{Error, Result};
use crate::store::FeatureStore;

pub const NODES_LAYER: &str = "nodes";
pub const EDGES_LAYER: &str = "edges";

pub const OSMID: &str = "osmid";
pub const FACILITY_COUNT: &str = "EVCSNum";
pub const FACILITY_FIDS: &str = "EVCSFids";
pub const EDGE_FROM: &str = "u";
pub const EDGE_TO: &str = "v";
pub const EDGE_LENGTH: &str = "length";
pub const AFFECT_DAYS: &str = "affectDays";

/// One road node as stored in the `nodes` layer.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub fid: i64,
    pub osmid: i64,
    pub demand: f64,
    /// Facility count; `None` when the node is not a supply node.
    pub capacity: Option<f64>,
    /// Comma-separated facility ids served at this node.
    pub facility_fids: Option<String>,
}

/// One directed road segment of the `edges` layer.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub fid: i64,
    pub u: i64,
    pub v: i64,
    pub length: Option<f64>,
    pub affect_days: Option<f64>,
}

/// Which state of the network to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scenario {
    #[default]
    Baseline,
    /// Flooded roads are cut and facilities in `affected` are out of service.
    PostEvent { affected: BTreeSet<String> },
}

impl Scenario {
    /// Column suffix for the scores of this scenario.
    pub fn suffix(&self) -> &'static str {
        match self {
            Scenario::Baseline => "noFlooding",
            Scenario::PostEvent { .. } => "afterFlooding",
        }
    }
}

/// Directed road graph with per-node demand and supply.
///
/// Vertex `i` is the `i`-th node in fid order.
#[derive(Debug, Clone)]
pub struct RoadNetwork {
    graph: DiGraph,
    fids: Vec<i64>,
    demand: Vec<f64>,
    capacity: Vec<Option<f64>>,
    dropped_edges: usize,
}

impl RoadNetwork {
    /// Build the graph for `scenario`. Edges must reference known `osmid`s and
    /// carry a length.
    pub fn build(nodes: &[NodeRecord], edges: &[EdgeRecord], scenario: &Scenario) -> Result<Self> {
        let mut by_osmid = AHashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if by_osmid.insert(node.osmid, i).is_some() {
                return Err(Error::data(format!("duplicate osmid {} in nodes", node.osmid)))
            }
        }

        let mut arcs = Vec::with_capacity(edges.len());
        let mut dropped_edges = 0;
        for edge in edges {
            // Post-event distances only use edges known to be dry; NULL counts as unknown.
            let dry = edge.affect_days == Some(0.0);
            if !dry && matches!(scenario, Scenario::PostEvent { .. }) {
                dropped_edges += 1;
                continue
            }
            let resolve = |osmid: i64| by_osmid.get(&osmid).copied().ok_or_else(|| {
                Error::data(format!("edge fid {} references unknown node {osmid}", edge.fid))
            });
            let length = edge.length.ok_or_else(|| {
                Error::data(format!("edge fid {} has no {EDGE_LENGTH}", edge.fid))
            })?;
            arcs.push((resolve(edge.u)?, resolve(edge.v)?, length));
        }

        let capacity = nodes.iter().map(|n| match (scenario, n.capacity) {
            (Scenario::PostEvent { affected }, Some(cap)) => {
                let lost = n.facility_fids.as_deref().map_or(0, |fids| {
                    facility_ids(fids).filter(|id| affected.contains(*id)).count()
                });
                Some((cap - lost as f64).max(0.0))
            }
            (_, cap) => cap,
        }).collect();

        Ok(Self {
            graph: DiGraph::from_arcs(nodes.len(), &arcs)?,
            fids: nodes.iter().map(|n| n.fid).collect(),
            demand: nodes.iter().map(|n| n.demand).collect(),
            capacity,
            dropped_edges,
        })
    }

    /// Read `nodes` and `edges` from a feature store and build the graph.
    pub fn load(store: &dyn FeatureStore, demand_field: &str, scenario: &Scenario) -> Result<Self> {
        let nodes = store.features(NODES_LAYER, &[OSMID, demand_field, FACILITY_COUNT, FACILITY_FIDS])?
            .into_iter()
            .map(|f| {
                let osmid = f.get_i64(OSMID)
                    .ok_or_else(|| Error::data(format!("node fid {} has no {OSMID}", f.fid)))?;
                Ok(NodeRecord {
                    fid: f.fid,
                    osmid,
                    demand: f.get_f64(demand_field).unwrap_or(0.0),
                    capacity: f.get_f64(FACILITY_COUNT),
                    facility_fids: f.get_str(FACILITY_FIDS).map(str::to_string),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let edges = store.features(EDGES_LAYER, &[EDGE_FROM, EDGE_TO, EDGE_LENGTH, AFFECT_DAYS])?
            .into_iter()
            .map(|f| {
                let endpoint = |name: &str| f.get_i64(name)
                    .ok_or_else(|| Error::data(format!("edge fid {} has no {name}", f.fid)));
                Ok(EdgeRecord {
                    fid: f.fid,
                    u: endpoint(EDGE_FROM)?,
                    v: endpoint(EDGE_TO)?,
                    length: f.get_f64(EDGE_LENGTH),
                    affect_days: f.get_f64(AFFECT_DAYS),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let network = Self::build(&nodes, &edges, scenario)?;
        log::info!(
            "road network: {} nodes, {} edges ({} cut as flooded), {} supply nodes",
            network.len(), network.graph.edge_count(), network.dropped_edges, network.supply_nodes().count()
        );
        Ok(network)
    }

    #[inline] pub fn graph(&self) -> &DiGraph { &self.graph }
    #[inline] pub fn len(&self) -> usize { self.fids.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.fids.is_empty() }
    #[inline] pub fn fid(&self, node: usize) -> i64 { self.fids[node] }
    #[inline] pub fn demand(&self, node: usize) -> f64 { self.demand[node] }
    #[inline] pub fn capacity(&self, node: usize) -> Option<f64> { self.capacity[node] }
    #[inline] pub fn dropped_edges(&self) -> usize { self.dropped_edges }

    /// Nodes that carry a capacity.
    pub fn supply_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&i| self.capacity[i].is_some())
    }

    /// Nodes with non-zero demand.
    pub fn demand_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&i| self.demand[i] != 0.0)
    }
}

/// Point locations of the `nodes` layer, in fid order.
#[derive(Debug, Clone)]
pub struct NodePoints {
    pub fids: Vec<i64>,
    pub coords: Vec<Coord<f64>>,
    pub srs: SpatialRef,
}

impl NodePoints {
    pub fn load(store: &dyn FeatureStore) -> Result<Self> {
        let srs = store.spatial_ref(NODES_LAYER)?;
        let nodes = store.features(NODES_LAYER, &[])?;
        let mut fids = Vec::with_capacity(nodes.len());
        let mut coords = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node.geometry {
                Some(Geometry::Point(p)) => coords.push(p.0),
                _ => return Err(Error::data(format!("node fid {} is not a point", node.fid))),
            }
            fids.push(node.fid);
        }
        Ok(Self { fids, coords, srs })
    }

    #[inline] pub fn len(&self) -> usize { self.fids.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.fids.is_empty() }
}

/// Trimmed, non-empty ids of a comma-separated list.
pub(crate) fn facility_ids(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}
