use geo::{Coord, Geometry, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::crs::SpatialRef;
use crate::error::{Error, Result};

/// A pair of reference systems with the machinery to move coordinates between them.
///
/// When both sides describe the same system the frame is an identity and
/// coordinates pass through untouched, bit for bit.
pub struct CoordinateFrame {
    source: SpatialRef,
    target: SpatialRef,
    projs: Option<(Proj4, Proj4)>,
    source_geographic: bool,
    target_geographic: bool,
}

impl std::fmt::Debug for CoordinateFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateFrame")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("identity", &self.is_identity())
            .finish()
    }
}

impl CoordinateFrame {
    /// Build a frame transforming from `source` into `target`.
    pub fn new(source: &SpatialRef, target: &SpatialRef) -> Result<Self> {
        let projs = if source.is_same(target) { None } else {
            Some((build_proj(source)?, build_proj(target)?))
        };
        Ok(Self {
            source: source.clone(),
            target: target.clone(),
            projs,
            source_geographic: source.is_geographic(),
            target_geographic: target.is_geographic(),
        })
    }

    /// Frame for the opposite direction.
    pub fn inverse(&self) -> Result<Self> { Self::new(&self.target, &self.source) }

    #[inline] pub fn source(&self) -> &SpatialRef { &self.source }
    #[inline] pub fn target(&self) -> &SpatialRef { &self.target }
    #[inline] pub fn is_identity(&self) -> bool { self.projs.is_none() }

    /// Transform one coordinate. Geographic coordinates are in degrees on both ends.
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let Some((from, to)) = &self.projs else { return Ok(coord) };

        let mut point = if self.source_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(from, to, &mut point)
            .map_err(|e| Error::computation(format!(
                "failed to transform ({}, {}) from {} to {}: {e}", coord.x, coord.y, self.source, self.target
            )))?;

        let out = if self.target_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        };
        if !out.x.is_finite() || !out.y.is_finite() {
            return Err(Error::computation(format!(
                "transform of ({}, {}) from {} to {} is not finite", coord.x, coord.y, self.source, self.target
            )))
        }
        Ok(out)
    }

    /// Transform every vertex of a geometry.
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() { return Ok(geometry.clone()) }
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }

    /// Transform a batch of coordinates.
    pub fn transform_coords(&self, coords: &[Coord<f64>]) -> Result<Vec<Coord<f64>>> {
        coords.iter().map(|&coord| self.transform_coord(coord)).collect()
    }
}

fn build_proj(srs: &SpatialRef) -> Result<Proj4> {
    let proj_string = srs.proj4()?;
    Proj4::from_proj_string(&proj_string)
        .map_err(|e| Error::data(format!("failed to build PROJ.4 for {srs} ({proj_string}): {e}")))
}

#[cfg(test)]
mod tests {
    use geo::{LineString, point};

    use super::*;

    fn close(a: Coord<f64>, b: Coord<f64>, tol: f64) -> bool {
        (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol
    }

    #[test]
    fn identical_references_are_identity() {
        let frame = CoordinateFrame::new(&SpatialRef::WGS84, &SpatialRef::WGS84).unwrap();
        assert!(frame.is_identity());
        let c = Coord { x: 118.78, y: 32.04 };
        assert_eq!(frame.transform_coord(c).unwrap(), c);
    }

    #[test]
    fn wgs84_to_web_mercator() {
        let frame = CoordinateFrame::new(&SpatialRef::WGS84, &SpatialRef::Epsg(3857)).unwrap();
        let origin = frame.transform_coord(Coord { x: 0.0, y: 0.0 }).unwrap();
        assert!(close(origin, Coord { x: 0.0, y: 0.0 }, 1e-6));

        // 180 degrees of longitude is half the equator of the WGS84 sphere
        let edge = frame.transform_coord(Coord { x: 180.0, y: 0.0 }).unwrap();
        assert!((edge.x - 20_037_508.342789244).abs() < 1e-3);
    }

    #[test]
    fn utm_round_trip() {
        let there = CoordinateFrame::new(&SpatialRef::WGS84, &SpatialRef::Epsg(32650)).unwrap();
        let back = there.inverse().unwrap();
        let c = Coord { x: 118.78, y: 32.04 };
        let projected = there.transform_coord(c).unwrap();
        assert!(projected.x > 100_000.0 && projected.x < 900_000.0);
        assert!(close(back.transform_coord(projected).unwrap(), c, 1e-6));
    }

    #[test]
    fn transforms_whole_geometries() {
        let frame = CoordinateFrame::new(&SpatialRef::WGS84, &SpatialRef::Epsg(3857)).unwrap();
        let line: Geometry<f64> = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]).into();
        let Geometry::LineString(out) = frame.transform_geometry(&line).unwrap() else { panic!("kind changed") };
        assert_eq!(out.0.len(), 2);
        assert!(out.0[1].x > 100_000.0);

        let p: Geometry<f64> = point! { x: 2.0, y: 3.0 }.into();
        let identity = CoordinateFrame::new(&SpatialRef::Epsg(3857), &SpatialRef::Epsg(3857)).unwrap();
        assert_eq!(identity.transform_geometry(&p).unwrap(), p);
    }

    #[test]
    fn unknown_codes_are_data_errors() {
        let err = CoordinateFrame::new(&SpatialRef::WGS84, &SpatialRef::Epsg(2000)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Data);
    }
}
