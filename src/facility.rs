//! Attach facility points (charging stations) to their nearest road node.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use geo::{Coord, Geometry};
use shapefile::{Reader, Shape};

use crate::access::network::{FACILITY_COUNT, FACILITY_FIDS, NODES_LAYER, NodePoints};
use crate::aggregate::NodeIndex;
use crate::crs::{CoordinateFrame, SpatialRef};
use crate::error::{Error, Result, ResultExt};
use crate::raster::{RasterSource, sample_points};
use crate::store::{AttributeStore, ColumnType, FeatureStore, GeoPackage, UpsertPolicy, Value};

/// Where facility points are read from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FacilitySource {
    /// A point layer of a GeoPackage.
    Gpkg { path: PathBuf, layer: String },
    /// A point shapefile; `.shp` carries no usable reference, so it is given here.
    Shapefile { path: PathBuf, srs: Option<SpatialRef> },
}

/// One facility, with its 1-based id in the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacilityPoint {
    pub fid: i64,
    pub at: Coord<f64>,
}

impl FacilitySource {
    /// Read the points and their reference system.
    pub fn read(&self) -> Result<(Vec<FacilityPoint>, SpatialRef)> {
        match self {
            FacilitySource::Gpkg { path, layer } => {
                let store = GeoPackage::open(path)?;
                let srs = store.spatial_ref(layer)?;
                let points = store.features(layer, &[])?.into_iter()
                    .map(|f| match f.geometry {
                        Some(Geometry::Point(p)) => Ok(FacilityPoint { fid: f.fid, at: p.0 }),
                        Some(Geometry::MultiPoint(mp)) if mp.0.len() == 1 => Ok(FacilityPoint { fid: f.fid, at: mp.0[0].0 }),
                        _ => Err(Error::data(format!("facility fid {} of {layer} is not a point", f.fid))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((points, srs))
            }
            FacilitySource::Shapefile { path, srs } => {
                let srs = srs.clone().ok_or_else(|| Error::data(format!(
                    "facility shapefile {} has no spatial reference", path.display()
                )))?;
                Ok((read_shapefile_points(path)?, srs))
            }
        }
    }

    /// Short label for logs and checkpoint entries.
    pub fn label(&self) -> String {
        match self {
            FacilitySource::Gpkg { path, layer } => format!("{}:{layer}", path.display()),
            FacilitySource::Shapefile { path, .. } => path.display().to_string(),
        }
    }
}

fn read_shapefile_points(path: &Path) -> Result<Vec<FacilityPoint>> {
    let mut reader = Reader::from_path(path)
        .map_err(|e| Error::data(format!("failed to open shapefile {}: {e}", path.display())))?;

    let mut points = Vec::new();
    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, _) = result
            .map_err(|e| Error::data(format!("error reading shape {} of {}: {e}", i + 1, path.display())))?;
        let at = match shape {
            Shape::Point(p) => Coord { x: p.x, y: p.y },
            Shape::PointM(p) => Coord { x: p.x, y: p.y },
            Shape::PointZ(p) => Coord { x: p.x, y: p.y },
            other => return Err(Error::data(format!(
                "shape {} of {} is a {:?}, expected a point", i + 1, path.display(), other.shapetype()
            ))),
        };
        points.push(FacilityPoint { fid: i as i64 + 1, at });
    }
    Ok(points)
}

/// Facility fids grouped by nearest node index, facilities in input order.
///
/// Facilities are moved into the nodes' reference system first.
pub fn link_facilities(nodes: &[Coord<f64>], nodes_srs: &SpatialRef, facilities: &[FacilityPoint], facilities_srs: &SpatialRef) -> Result<BTreeMap<usize, Vec<i64>>> {
    let frame = CoordinateFrame::new(facilities_srs, nodes_srs)?;
    let index = NodeIndex::new(nodes)?;
    let mut links: BTreeMap<usize, Vec<i64>> = BTreeMap::new();
    for facility in facilities {
        let at = frame.transform_coord(facility.at)
            .with_context(|| format!("facility {}", facility.fid))?;
        if let Some(node) = index.nearest(at) {
            links.entry(node).or_default().push(facility.fid);
        }
    }
    Ok(links)
}

/// Write facility counts and id lists onto the nodes layer.
///
/// `node_fids[i]` is the fid of node index `i`. Nodes without facilities keep
/// the column default (count 0, no ids).
pub fn write_links(store: &dyn AttributeStore, node_fids: &[i64], links: &BTreeMap<usize, Vec<i64>>) -> Result<usize> {
    store.ensure_column(NODES_LAYER, FACILITY_COUNT, ColumnType::Integer, Some(&Value::Integer(0)), false)?;
    store.ensure_column(NODES_LAYER, FACILITY_FIDS, ColumnType::Text, None, false)?;

    let mut counts = Vec::with_capacity(links.len());
    let mut lists = Vec::with_capacity(links.len());
    for (&node, fids) in links {
        let fid = node_fids[node];
        counts.push((fid, Value::Integer(fids.len() as i64)));
        lists.push((fid, Value::Text(fids.iter().map(i64::to_string).collect::<Vec<_>>().join(","))));
    }
    store.bulk_upsert(NODES_LAYER, FACILITY_FIDS, &lists, UpsertPolicy::Overwrite)?;
    store.bulk_upsert(NODES_LAYER, FACILITY_COUNT, &counts, UpsertPolicy::Overwrite)
}

/// Link `facilities` to the nodes of `store`; returns the number of nodes written.
pub fn link_store(store: &GeoPackage, facilities: &[FacilityPoint], facilities_srs: &SpatialRef) -> Result<usize> {
    let nodes = NodePoints::load(store)?;
    let links = link_facilities(&nodes.coords, &nodes.srs, facilities, facilities_srs)?;
    log::info!(
        "{}: {} facilities linked to {} nodes", store.path().display(), facilities.len(), links.len()
    );
    write_links(store, &nodes.fids, &links)
}

/// Raster value under each facility, paired with its fid.
///
/// Feeds the `fid,values` table of facilities an event puts out of service.
pub fn sample_facilities(raster: &dyn RasterSource, facilities: &[FacilityPoint], facilities_srs: &SpatialRef) -> Result<Vec<(i64, Option<f64>)>> {
    let coords = facilities.iter().map(|f| f.at).collect::<Vec<_>>();
    let values = sample_points(raster, &coords, facilities_srs)?;
    let hit = values.iter().filter(|v| v.is_some_and(|v| v != 0.0)).count();
    log::debug!("{hit} of {} facilities sampled a non-zero value", facilities.len());
    Ok(facilities.iter().map(|f| f.fid).zip(values).collect())
}
