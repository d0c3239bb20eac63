//! Geodesic road segment lengths.

use geo::{Distance, Geodesic, Geometry, LineString, Point};

use crate::access::network::{EDGE_LENGTH, EDGES_LAYER};
use crate::crs::{CoordinateFrame, SpatialRef};
use crate::error::{Error, Result, ResultExt};
use crate::store::{AttributeStore, ColumnType, FeatureStore, UpsertPolicy, Value};

/// Length in metres on the WGS84 ellipsoid of a lon/lat line geometry.
pub fn geodesic_length(geometry: &Geometry<f64>) -> Result<f64> {
    fn line(ls: &LineString<f64>) -> f64 {
        ls.0.windows(2).map(|w| Geodesic.distance(Point(w[0]), Point(w[1]))).sum()
    }
    match geometry {
        Geometry::Line(l) => Ok(Geodesic.distance(Point(l.start), Point(l.end))),
        Geometry::LineString(ls) => Ok(line(ls)),
        Geometry::MultiLineString(mls) => Ok(mls.0.iter().map(line).sum()),
        Geometry::GeometryCollection(gc) => gc.0.iter().map(geodesic_length).sum(),
        Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(0.0),
        _ => Err(Error::data("road length is only defined for line geometries")),
    }
}

/// Recompute `edges.length` for every edge of `store`; returns the rows written.
pub fn update_lengths<S: FeatureStore + AttributeStore>(store: &S) -> Result<usize> {
    let srs = store.spatial_ref(EDGES_LAYER)?;
    let frame = CoordinateFrame::new(&srs, &SpatialRef::WGS84)?;

    let mut rows = Vec::new();
    for edge in store.features(EDGES_LAYER, &[])? {
        let Some(geometry) = edge.geometry else {
            log::warn!("edge fid {} has no geometry; length left unchanged", edge.fid);
            continue
        };
        let lonlat = frame.transform_geometry(&geometry).with_context(|| format!("edge fid {}", edge.fid))?;
        rows.push((edge.fid, Value::Real(geodesic_length(&lonlat).with_context(|| format!("edge fid {}", edge.fid))?)));
    }

    store.ensure_column(EDGES_LAYER, EDGE_LENGTH, ColumnType::Real, None, false)?;
    store.bulk_upsert(EDGES_LAYER, EDGE_LENGTH, &rows, UpsertPolicy::Overwrite)
}
